use hexagon_dtype::Device;
use snafu::Snafu;

use crate::buffer::DataPtr;
use crate::stream::StreamHandle;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Device kind is neither Hexagon nor the CPU sub-target.
    #[snafu(display("invalid device for the Hexagon device API: {device}"))]
    InvalidDevice { device: Device },

    /// Pointer is not tracked by the allocation table.
    #[snafu(display("no Hexagon allocation registered at {ptr}"))]
    UnknownAllocation { ptr: DataPtr },

    /// VTCM cannot hold the request.
    #[snafu(display("VTCM capacity exceeded: requested {requested} bytes, {available} of {capacity} available"))]
    CapacityExceeded { requested: usize, available: usize, capacity: usize },

    /// Every stream lane is already claimed.
    #[snafu(display("all {lanes} stream lanes are in use"))]
    ResourceExhausted { lanes: usize },

    /// Stream handle is unknown or not currently claimed.
    #[snafu(display("stream handle {handle} is not owned by the caller"))]
    InvalidHandle { handle: StreamHandle },

    #[snafu(display("no stream given and no active stream set"))]
    NoActiveStream,

    #[snafu(display("command queue of stream {stream} is full ({depth} pending) and workers are not started"))]
    QueueFull { stream: StreamHandle, depth: usize },

    #[snafu(display("worker for stream {stream} has shut down"))]
    WorkerDisconnected { stream: StreamHandle },

    #[snafu(display("failed to spawn worker thread: {source}"))]
    ThreadSpawn { source: std::io::Error },

    #[snafu(display("alignment {alignment} is not a power of two"))]
    InvalidAlignment { alignment: usize },

    #[snafu(display("invalid allocation shape {shape:?}"))]
    InvalidShape { shape: Vec<i64> },

    #[snafu(display("Hexagon buffers support only 0-d, 1-d and 2-d allocations, got {ndim}-d"))]
    UnsupportedDimensions { ndim: usize },

    #[snafu(display("unsupported memory scope '{scope}'"))]
    UnsupportedScope { scope: String },

    #[snafu(display("host allocation of {size} bytes aligned to {alignment} failed"))]
    AllocationFailed { size: usize, alignment: usize },

    /// Source and destination tensors hold a different number of bytes.
    #[snafu(display("copy size mismatch: source has {from} bytes, destination {to}"))]
    CopyMismatch { from: usize, to: usize },

    #[snafu(display("copy of {requested} bytes exceeds buffer size {available}"))]
    CopyOutOfBounds { requested: usize, available: usize },

    /// Strides describe a layout other than compact row-major.
    #[snafu(display("tensor at {ptr} is not contiguous"))]
    NonContiguous { ptr: DataPtr },

    /// Waiting on a lane whose queued work cannot run until `start`.
    #[snafu(display("stream {stream} has pending work but the workers are not started"))]
    NotStarted { stream: StreamHandle },

    #[snafu(display("tensor byte offset must be zero, got {offset}"))]
    NonZeroOffset { offset: u64 },
}
