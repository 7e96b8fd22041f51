use std::sync::Arc;

use hexagon_dtype::DType;

use crate::Error;
use crate::allocator::Allocator;
use crate::buffer::{Buffer, MemoryScope};
use crate::table::BufferTable;
use crate::vtcm::{VtcmAllocator, VtcmManager};

fn manager(capacity: usize) -> (Arc<BufferTable>, VtcmManager) {
    let table = Arc::new(BufferTable::new());
    let manager = VtcmManager::new(Arc::clone(&table), Arc::new(VtcmAllocator::new(capacity)), 2048);
    (table, manager)
}

#[test]
fn test_request_over_capacity_always_fails() {
    let allocator = VtcmAllocator::new(1024);

    let result = allocator.alloc(1025, 64);
    assert!(matches!(result, Err(Error::CapacityExceeded { requested: 1025, available: 1024, capacity: 1024 })));
    assert_eq!(allocator.used(), 0);
}

#[test]
fn test_capacity_is_exact() {
    let allocator = VtcmAllocator::new(1024);
    let a = allocator.alloc(1000, 64).unwrap();
    let b = allocator.alloc(24, 64).unwrap();
    assert_eq!(allocator.available(), 0);
    assert!(allocator.alloc(1, 64).is_err());

    allocator.free(a);
    allocator.free(b);
    assert_eq!(allocator.used(), 0);
}

#[test]
fn test_alloc_many_is_all_or_nothing() {
    let allocator = VtcmAllocator::new(1000);

    assert!(allocator.alloc_many(3, 400, 64).is_err());
    assert_eq!(allocator.used(), 0);

    let regions = allocator.alloc_many(2, 400, 64).unwrap();
    assert_eq!(regions.len(), 2);
    assert_eq!(allocator.used(), 800);
}

#[test]
fn test_dropping_buffer_returns_capacity() {
    let allocator = Arc::new(VtcmAllocator::new(4096));
    let buffer = Buffer::from_shape(allocator.clone(), &[4, 256], DType::UInt8, 2048).unwrap();

    assert_eq!(buffer.scope(), MemoryScope::Vtcm);
    assert_eq!(allocator.used(), 1024);
    drop(buffer);
    assert_eq!(allocator.used(), 0);
}

#[test]
fn test_alloc_free_alloc_within_capacity() {
    let (table, manager) = manager(64 * 1024);

    for _ in 0..4 {
        let ptr = manager.alloc(&[16, 1024], DType::Float32).unwrap();
        assert_eq!(manager.allocator().used(), 64 * 1024);
        assert!(table.contains(ptr));

        manager.free(ptr).unwrap();
        assert_eq!(manager.allocator().used(), 0);
    }
}

#[test]
fn test_manager_rejects_oversized_shape() {
    let (table, manager) = manager(4096);

    let result = manager.alloc(&[2048], DType::Float32);
    assert!(matches!(result, Err(Error::CapacityExceeded { requested: 8192, .. })));
    assert!(table.is_empty());
}

#[test]
fn test_manager_free_unknown() {
    let (_, manager) = manager(4096);
    let other = BufferTable::new();
    let ptr = other.register(Buffer::flat(manager.allocator().clone(), 16, 64).unwrap());

    assert!(matches!(manager.free(ptr), Err(Error::UnknownAllocation { .. })));
}
