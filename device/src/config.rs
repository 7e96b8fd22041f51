//! Device API configuration.
//!
//! Defaults describe the current Hexagon generation: six hardware threads,
//! 16 KiB stacks, a 1024-deep command queue per thread, 2 KiB allocation
//! alignment and a 4 MiB VTCM region. Everything can be overridden through the
//! builder or through environment variables.

use bon::bon;

pub const DEFAULT_LANES: usize = 6;
pub const DEFAULT_STACK_SIZE: usize = 16 * (1 << 10);
pub const DEFAULT_QUEUE_DEPTH: usize = 1 << 10;
pub const DEFAULT_MIN_ALIGNMENT: usize = 2048;
pub const DEFAULT_VTCM_CAPACITY: usize = 4 * (1 << 20);

/// How dispatched work is executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Threading {
    /// One worker thread per stream lane.
    #[default]
    Workers,

    /// Host simulation: work runs on the dispatching thread.
    Inline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Number of stream lanes (worker threads).
    pub lanes: usize,
    /// Stack size of each worker, in bytes.
    pub stack_size: usize,
    /// Commands each lane may hold before dispatch blocks.
    pub queue_depth: usize,
    /// Lower bound applied to every allocation alignment.
    pub min_alignment: usize,
    /// Size of the VTCM region in bytes.
    pub vtcm_capacity: usize,
    pub threading: Threading,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            lanes: DEFAULT_LANES,
            stack_size: DEFAULT_STACK_SIZE,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            min_alignment: DEFAULT_MIN_ALIGNMENT,
            vtcm_capacity: DEFAULT_VTCM_CAPACITY,
            threading: Threading::default(),
        }
    }
}

#[bon]
impl DeviceConfig {
    /// Start a configuration builder; unset fields take the defaults above.
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_LANES)] lanes: usize,
        #[builder(default = DEFAULT_STACK_SIZE)] stack_size: usize,
        #[builder(default = DEFAULT_QUEUE_DEPTH)] queue_depth: usize,
        #[builder(default = DEFAULT_MIN_ALIGNMENT)] min_alignment: usize,
        #[builder(default = DEFAULT_VTCM_CAPACITY)] vtcm_capacity: usize,
        #[builder(default)] threading: Threading,
    ) -> Self {
        Self { lanes, stack_size, queue_depth, min_alignment, vtcm_capacity, threading }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `HEXAGON_STREAM_LANES` - Worker/stream count (default: 6)
    /// * `HEXAGON_STACK_SIZE` - Worker stack size in bytes (default: 16384)
    /// * `HEXAGON_QUEUE_DEPTH` - Per-lane command queue depth (default: 1024)
    /// * `HEXAGON_VTCM_SIZE` - VTCM capacity in bytes (default: 4 MiB)
    /// * `HEXAGON_INLINE_DISPATCH` - Run dispatched work on the caller if set
    pub fn from_env() -> Self {
        let lanes = std::env::var("HEXAGON_STREAM_LANES").ok().and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_LANES);
        let stack_size =
            std::env::var("HEXAGON_STACK_SIZE").ok().and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_STACK_SIZE);
        let queue_depth =
            std::env::var("HEXAGON_QUEUE_DEPTH").ok().and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_QUEUE_DEPTH);
        let vtcm_capacity =
            std::env::var("HEXAGON_VTCM_SIZE").ok().and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_VTCM_CAPACITY);
        let threading =
            if std::env::var("HEXAGON_INLINE_DISPATCH").is_ok() { Threading::Inline } else { Threading::Workers };

        Self { lanes, stack_size, queue_depth, min_alignment: DEFAULT_MIN_ALIGNMENT, vtcm_capacity, threading }
    }
}
