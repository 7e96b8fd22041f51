//! The Hexagon device API.
//!
//! [`HexagonDeviceApi`] is the single entry point the host runtime talks to.
//! Every operation validates the target device first and only then touches
//! the allocation table, the VTCM region or the stream lanes.
//!
//! ```ignore
//! let api = hexagon_device::global()?;
//! let device = Device::hexagon(0);
//!
//! let ptr = api.alloc_data_space(device, 4096, 0, None)?;
//! let stream = api.create_stream(device)?;
//! api.start(device)?;
//!
//! let slot = ResultSlot::new();
//! api.dispatch(device, |x: u32| x * 2, 21, Some(&slot), Some(stream))?;
//! api.sync_stream_from_to(device, stream, stream)?;
//! assert_eq!(slot.take(), Some(42));
//!
//! api.free_stream(device, stream)?;
//! api.free_data_space(device, ptr)?;
//! ```

use std::sync::Arc;

use hexagon_dtype::{DType, Device, DeviceKind};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use snafu::{OptionExt, ensure};
use strum::{EnumIter, IntoStaticStr};

use crate::allocator::HostAllocator;
use crate::buffer::{Buffer, DataPtr, MemoryScope, flat_size};
use crate::config::{DeviceConfig, Threading};
use crate::error::{
    CopyMismatchSnafu, InvalidAlignmentSnafu, InvalidDeviceSnafu, NoActiveStreamSnafu, NonContiguousSnafu,
    NonZeroOffsetSnafu, Result, UnknownAllocationSnafu,
};
use crate::stream::{StreamHandle, StreamPool};
use crate::table::{BufferTable, CopyEnds};
use crate::tensor::TensorDesc;
use crate::thread_manager::{InlineManager, Job, ResultSlot, ThreadManager, WorkerPool};
use crate::vtcm::{VtcmAllocator, VtcmManager};
use crate::workspace::WorkspacePool;

/// Device attributes the host runtime may query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
pub enum AttrKind {
    Exist,
    MaxThreadsPerBlock,
    WarpSize,
    MaxSharedMemoryPerBlock,
    ComputeVersion,
    DeviceName,
    MaxClockRate,
    MultiProcessorCount,
    MaxThreadDimensions,
    MaxRegistersPerBlock,
    GcnArch,
    ApiVersion,
    DriverVersion,
    L2CacheSizeBytes,
    TotalGlobalMemory,
    AvailableGlobalMemory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Int(i64),
    Str(String),
}

/// Snapshot of the memory held by the device API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub live_buffers: usize,
    pub live_bytes: usize,
    pub vtcm_used: usize,
    pub vtcm_capacity: usize,
}

#[derive(Debug)]
pub struct HexagonDeviceApi {
    config: DeviceConfig,
    table: Arc<BufferTable>,
    host: Arc<HostAllocator>,
    vtcm: VtcmManager,
    workspace: WorkspacePool,
    threads: Box<dyn ThreadManager>,
    streams: StreamPool,
    active_stream: Mutex<Option<StreamHandle>>,
}

impl HexagonDeviceApi {
    #[tracing::instrument(skip_all, fields(lanes = config.lanes, vtcm = config.vtcm_capacity))]
    pub fn new(config: DeviceConfig) -> Result<Self> {
        ensure!(config.min_alignment.is_power_of_two(), InvalidAlignmentSnafu { alignment: config.min_alignment });

        let table = Arc::new(BufferTable::new());
        let host = Arc::new(HostAllocator);
        let vtcm = VtcmManager::new(
            Arc::clone(&table),
            Arc::new(VtcmAllocator::new(config.vtcm_capacity)),
            config.min_alignment,
        );
        let workspace = WorkspacePool::new(Arc::clone(&table), host.clone(), config.min_alignment);

        let threads: Box<dyn ThreadManager> = match config.threading {
            Threading::Workers => Box::new(WorkerPool::new(config.lanes, config.stack_size, config.queue_depth)?),
            Threading::Inline => Box::new(InlineManager::new(config.lanes)),
        };
        let streams = StreamPool::new(threads.stream_handles());

        tracing::debug!(threads = threads.name(), "Hexagon device API initialized");
        Ok(Self { config, table, host, vtcm, workspace, threads, streams, active_stream: Mutex::new(None) })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Hexagon itself and the CPU sub-target are the only devices served.
    pub fn is_valid_device(device: Device) -> bool {
        matches!(device.kind, DeviceKind::Hexagon | DeviceKind::Cpu)
    }

    fn validate(device: Device) -> Result<()> {
        ensure!(Self::is_valid_device(device), InvalidDeviceSnafu { device });
        Ok(())
    }

    /// `0` selects the configured minimum; anything else must be a power of
    /// two and is raised to at least the minimum.
    fn effective_alignment(&self, alignment: usize) -> Result<usize> {
        if alignment == 0 {
            return Ok(self.config.min_alignment);
        }
        ensure!(alignment.is_power_of_two(), InvalidAlignmentSnafu { alignment });
        Ok(alignment.max(self.config.min_alignment))
    }

    // ---------------------------------------------------------------------
    // Attributes
    // ---------------------------------------------------------------------

    pub fn get_attr(&self, device: Device, kind: AttrKind) -> Result<Option<AttrValue>> {
        Self::validate(device)?;

        let value = match kind {
            AttrKind::Exist => Some(AttrValue::Int(1)),
            AttrKind::MaxThreadsPerBlock => Some(AttrValue::Int(self.streams.lanes() as i64)),
            AttrKind::WarpSize => Some(AttrValue::Int(1)),
            AttrKind::DeviceName => Some(AttrValue::Str("hexagon".to_string())),
            AttrKind::MaxSharedMemoryPerBlock => Some(AttrValue::Int(self.config.vtcm_capacity as i64)),
            _ => None,
        };
        Ok(value)
    }

    // ---------------------------------------------------------------------
    // Memory
    // ---------------------------------------------------------------------

    /// Flat allocation of `nbytes` in global memory.
    pub fn alloc_data_space(
        &self,
        device: Device,
        nbytes: usize,
        alignment: usize,
        dtype_hint: Option<DType>,
    ) -> Result<DataPtr> {
        Self::validate(device)?;
        let alignment = self.effective_alignment(alignment)?;

        let buffer = Buffer::flat(self.host.clone(), nbytes, alignment)?;
        let ptr = self.table.register(buffer);
        tracing::debug!(%ptr, nbytes, alignment, dtype = ?dtype_hint, "data space allocated");
        Ok(ptr)
    }

    /// Allocation for a logical shape.
    ///
    /// Global scope (or no scope) flattens the shape into one region. Any
    /// other scope keeps the N-d layout and is limited to 2 dimensions.
    pub fn alloc_data_space_nd(
        &self,
        device: Device,
        shape: &[i64],
        dtype: DType,
        mem_scope: Option<&str>,
    ) -> Result<DataPtr> {
        Self::validate(device)?;
        let scope = MemoryScope::parse(mem_scope)?;
        let alignment = self.config.min_alignment;

        let buffer = match scope {
            MemoryScope::Global => {
                let nbytes = flat_size(shape, dtype.bytes())?;
                Buffer::flat(self.host.clone(), nbytes, alignment)?
            }
            MemoryScope::Vtcm => Buffer::from_shape(self.vtcm.allocator().clone(), shape, dtype, alignment)?,
        };

        let nbytes = buffer.size();
        let ptr = self.table.register(buffer);
        tracing::debug!(%ptr, nbytes, %scope, ?shape, "N-d data space allocated");
        Ok(ptr)
    }

    pub fn free_data_space(&self, device: Device, ptr: DataPtr) -> Result<()> {
        Self::validate(device)?;
        self.table.release(ptr)?;
        tracing::debug!(%ptr, "data space freed");
        Ok(())
    }

    pub fn alloc_workspace(&self, device: Device, nbytes: usize, dtype_hint: Option<DType>) -> Result<DataPtr> {
        Self::validate(device)?;
        tracing::trace!(nbytes, dtype = ?dtype_hint, "workspace request");
        self.workspace.alloc(nbytes)
    }

    pub fn free_workspace(&self, device: Device, ptr: DataPtr) -> Result<()> {
        Self::validate(device)?;
        self.workspace.free(ptr)
    }

    /// VTCM-backed allocation with the N-d layout of `shape`. The requested
    /// scope is accepted for signature compatibility; storage is always VTCM.
    pub fn alloc_vtcm_workspace(
        &self,
        device: Device,
        shape: &[i64],
        dtype: DType,
        mem_scope: Option<&str>,
    ) -> Result<DataPtr> {
        Self::validate(device)?;
        tracing::trace!(?mem_scope, "VTCM workspace request");
        self.vtcm.alloc(shape, dtype)
    }

    pub fn free_vtcm_workspace(&self, device: Device, ptr: DataPtr) -> Result<()> {
        Self::validate(device)?;
        self.vtcm.free(ptr)
    }

    /// Copy the contents of `from` into `to`.
    ///
    /// At least one side must be a registered allocation; registered buffers
    /// are walked region by region, so 2-d layouts copy correctly. Both
    /// descriptors must be compact row-major (`NonContiguous` otherwise).
    ///
    /// # Safety
    ///
    /// A side whose data pointer is not registered is treated as host memory:
    /// it must be valid for reads (`from`) or writes (`to`) of
    /// `from.data_size()` bytes and must not overlap the other side.
    pub unsafe fn copy_data_from_to(
        &self,
        from: &TensorDesc,
        to: &TensorDesc,
        stream: Option<StreamHandle>,
    ) -> Result<()> {
        Self::validate(from.device)?;
        Self::validate(to.device)?;
        ensure!(from.byte_offset == 0, NonZeroOffsetSnafu { offset: from.byte_offset });
        ensure!(to.byte_offset == 0, NonZeroOffsetSnafu { offset: to.byte_offset });

        let nbytes = from.data_size()?;
        let to_nbytes = to.data_size()?;
        ensure!(nbytes == to_nbytes, CopyMismatchSnafu { from: nbytes, to: to_nbytes });
        ensure!(from.is_contiguous(), NonContiguousSnafu { ptr: from.data });
        ensure!(to.is_contiguous(), NonContiguousSnafu { ptr: to.data });
        tracing::trace!(from = %from.data, to = %to.data, nbytes, ?stream, "tensor copy");
        if nbytes == 0 {
            return Ok(());
        }

        self.table.with_copy_ends(from.data, to.data, |ends| match ends {
            CopyEnds::Same => Ok(()),
            CopyEnds::Both { src, dst } => dst.copy_from(src, nbytes),
            CopyEnds::ToBuffer(dst) => {
                // SAFETY: the caller guarantees `from.data` is readable for `nbytes`.
                let src = unsafe { std::slice::from_raw_parts(from.data.as_ptr(), nbytes) };
                dst.copy_from_host(src)
            }
            CopyEnds::FromBuffer(src) => {
                // SAFETY: the caller guarantees `to.data` is writable for `nbytes`.
                let dst = unsafe { std::slice::from_raw_parts_mut(to.data.as_mut_ptr(), nbytes) };
                src.copy_to_host(dst)
            }
            CopyEnds::Neither => UnknownAllocationSnafu { ptr: to.data }.fail(),
        })
    }

    /// Copy `size` bytes between two flat ranges.
    ///
    /// # Safety
    ///
    /// `from + from_offset` must be valid for reads and `to + to_offset` valid
    /// for writes of `size` bytes. The ranges may overlap.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn copy_data_from_to_raw(
        &self,
        from: DataPtr,
        from_offset: usize,
        to: DataPtr,
        to_offset: usize,
        size: usize,
        dev_from: Device,
        dev_to: Device,
        type_hint: Option<DType>,
        stream: Option<StreamHandle>,
    ) -> Result<()> {
        Self::validate(dev_from)?;
        Self::validate(dev_to)?;
        tracing::trace!(%from, from_offset, %to, to_offset, size, dtype = ?type_hint, ?stream, "raw copy");
        if size == 0 {
            return Ok(());
        }

        // SAFETY: upheld by the caller.
        unsafe { std::ptr::copy(from.as_ptr().add(from_offset), to.as_mut_ptr().add(to_offset), size) };
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Streams
    // ---------------------------------------------------------------------

    pub fn create_stream(&self, device: Device) -> Result<StreamHandle> {
        Self::validate(device)?;
        let handle = self.streams.acquire()?;
        tracing::debug!(stream = %handle, available = self.streams.available(), "stream created");
        Ok(handle)
    }

    pub fn free_stream(&self, device: Device, handle: StreamHandle) -> Result<()> {
        Self::validate(device)?;
        self.streams.release(handle)?;

        let mut active = self.active_stream.lock();
        if *active == Some(handle) {
            *active = None;
        }
        tracing::debug!(stream = %handle, "stream freed");
        Ok(())
    }

    /// Make `handle` the stream used by dispatches that name none.
    pub fn set_stream(&self, device: Device, handle: StreamHandle) -> Result<()> {
        Self::validate(device)?;
        self.streams.ensure_claimed(handle)?;
        *self.active_stream.lock() = Some(handle);
        Ok(())
    }

    pub fn active_stream(&self) -> Option<StreamHandle> {
        *self.active_stream.lock()
    }

    /// Block until all work enqueued on `src` so far has run. Work dispatched
    /// to `dst` afterwards observes its effects. Before [`Self::start`], a
    /// stream with pending work fails with `NotStarted`.
    pub fn sync_stream_from_to(&self, device: Device, src: StreamHandle, dst: StreamHandle) -> Result<()> {
        Self::validate(device)?;
        self.streams.ensure_claimed(src)?;
        self.streams.ensure_claimed(dst)?;
        self.threads.sync_from_to(src, dst)
    }

    /// Enqueue `f(args)` and return immediately.
    ///
    /// `stream = None` targets the active stream. The result lands in
    /// `result` once the work has run; read it after syncing the stream.
    pub fn dispatch<F, A, R>(
        &self,
        device: Device,
        f: F,
        args: A,
        result: Option<&ResultSlot<R>>,
        stream: Option<StreamHandle>,
    ) -> Result<()>
    where
        F: FnOnce(A) -> R + Send + 'static,
        A: Send + 'static,
        R: Send + 'static,
    {
        Self::validate(device)?;
        let stream = stream.or_else(|| self.active_stream()).context(NoActiveStreamSnafu)?;
        self.streams.ensure_claimed(stream)?;

        let result = result.cloned();
        let job: Job = Box::new(move || {
            let value = f(args);
            if let Some(slot) = result {
                slot.fill(value);
            }
        });
        self.threads.dispatch(stream, job)
    }

    /// Let the worker lanes run. Idempotent.
    pub fn start(&self, device: Device) -> Result<()> {
        Self::validate(device)?;
        self.threads.start();
        Ok(())
    }

    pub fn set_device(&self, device: Device) -> Result<()> {
        Self::validate(device)
    }

    /// Copies complete before returning, so there is nothing to drain here.
    /// Use [`Self::sync_stream_from_to`] to wait for dispatched work.
    pub fn stream_sync(&self, device: Device, stream: Option<StreamHandle>) -> Result<()> {
        Self::validate(device)?;
        tracing::trace!(?stream, "stream sync");
        Ok(())
    }

    pub fn stats(&self) -> MemoryStats {
        let vtcm = self.vtcm.allocator();
        MemoryStats {
            live_buffers: self.table.len(),
            live_bytes: self.table.live_bytes(),
            vtcm_used: vtcm.used(),
            vtcm_capacity: vtcm.capacity(),
        }
    }
}

impl Drop for HexagonDeviceApi {
    fn drop(&mut self) {
        let reclaimed = self.streams.reclaim_all();
        if reclaimed > 0 {
            tracing::warn!(reclaimed, "streams still claimed at teardown");
        }
    }
}

static GLOBAL: OnceCell<HexagonDeviceApi> = OnceCell::new();

/// Process-wide device API, configured from the environment on first use.
pub fn global() -> Result<&'static HexagonDeviceApi> {
    GLOBAL.get_or_try_init(|| HexagonDeviceApi::new(DeviceConfig::from_env()))
}
