//! Resource manager behind the Hexagon device API.
//!
//! Owns every allocation made on behalf of the host runtime (flat buffers,
//! N-d buffers with a memory scope, VTCM workspaces) behind one pointer-keyed
//! table, and maps stream handles onto a fixed pool of worker lanes.

pub mod allocator;
pub mod api;
pub mod buffer;
pub mod config;
pub mod error;
pub mod stream;
pub mod sync;
pub mod table;
pub mod tensor;
pub mod thread_manager;
pub mod vtcm;
pub mod workspace;

#[cfg(test)]
mod test;

pub use api::{AttrKind, AttrValue, HexagonDeviceApi, MemoryStats, global};
pub use buffer::{Buffer, DataPtr, MemoryScope};
pub use config::{DeviceConfig, Threading};
pub use error::{Error, Result};
pub use stream::StreamHandle;
pub use tensor::TensorDesc;
pub use thread_manager::ResultSlot;
