use std::sync::Arc;

use crate::allocator::Allocator;
use crate::buffer::{Buffer, DataPtr};
use crate::error::Result;
use crate::table::BufferTable;

/// Scratch allocations for the duration of a kernel launch.
///
/// Workspaces are ordinary global-scope buffers tracked in the shared table;
/// they have their own entry point so that reuse policy can diverge from
/// long-lived tensor allocations later.
#[derive(Debug)]
pub struct WorkspacePool {
    table: Arc<BufferTable>,
    allocator: Arc<dyn Allocator>,
    alignment: usize,
}

impl WorkspacePool {
    pub fn new(table: Arc<BufferTable>, allocator: Arc<dyn Allocator>, alignment: usize) -> Self {
        Self { table, allocator, alignment }
    }

    pub fn alloc(&self, nbytes: usize) -> Result<DataPtr> {
        let buffer = Buffer::flat(self.allocator.clone(), nbytes, self.alignment)?;
        let ptr = self.table.register(buffer);
        tracing::debug!(%ptr, nbytes, "workspace allocated");
        Ok(ptr)
    }

    pub fn free(&self, ptr: DataPtr) -> Result<()> {
        self.table.release(ptr)?;
        tracing::debug!(%ptr, "workspace freed");
        Ok(())
    }
}
