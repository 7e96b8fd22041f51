use std::sync::Arc;

use hexagon_dtype::DType;
use test_case::test_case;

use crate::Error;
use crate::allocator::{HostAllocator, RawBuffer};
use crate::buffer::{Buffer, MemoryScope, NdLayout};

const ALIGN: usize = 2048;

#[test_case(&[], DType::Float32 => (1, 4, false); "scalar holds one element")]
#[test_case(&[8], DType::Float32 => (1, 32, false); "vector is one region")]
#[test_case(&[0], DType::Int8 => (1, 0, false); "empty vector")]
#[test_case(&[3, 5], DType::Int16 => (3, 10, true); "matrix is one region per row")]
#[test_case(&[2, 0], DType::Float64 => (2, 0, true); "matrix with empty rows")]
fn test_nd_layout(shape: &[i64], dtype: DType) -> (usize, usize, bool) {
    let layout = NdLayout::from_shape(shape, dtype).unwrap();
    (layout.nallocs, layout.nbytes, layout.discontiguous)
}

#[test]
fn test_nd_layout_rejects_three_dimensions() {
    let result = NdLayout::from_shape(&[2, 2, 2], DType::Float32);
    assert!(matches!(result, Err(Error::UnsupportedDimensions { ndim: 3 })));
}

#[test_case(&[-1]; "negative extent")]
#[test_case(&[4, -2]; "negative column count")]
#[test_case(&[0, 4]; "row table without rows")]
fn test_nd_layout_rejects_bad_shape(shape: &[i64]) {
    let result = NdLayout::from_shape(shape, DType::Float32);
    assert!(matches!(result, Err(Error::InvalidShape { .. })), "{result:?}");
}

#[test_case(None => MemoryScope::Global; "absent")]
#[test_case(Some("global") => MemoryScope::Global; "global")]
#[test_case(Some("global.vtcm") => MemoryScope::Vtcm; "vtcm")]
fn test_scope_parse(tag: Option<&str>) -> MemoryScope {
    MemoryScope::parse(tag).unwrap()
}

#[test]
fn test_scope_parse_unknown() {
    let result = MemoryScope::parse(Some("local.texture"));
    assert!(matches!(result, Err(Error::UnsupportedScope { scope }) if scope == "local.texture"));
}

#[test_case(1)]
#[test_case(64)]
#[test_case(2048)]
#[test_case(4096)]
fn test_raw_buffer_alignment(alignment: usize) {
    let raw = RawBuffer::aligned(100, alignment).unwrap();
    assert_eq!(raw.addr() % alignment, 0);
    assert_eq!(raw.size(), 100);
    assert!(raw.as_slice().iter().all(|&b| b == 0));
}

#[test]
fn test_raw_buffer_rejects_non_power_of_two() {
    assert!(matches!(RawBuffer::aligned(16, 24), Err(Error::InvalidAlignment { alignment: 24 })));
}

#[test]
fn test_zero_sized_buffers_have_distinct_pointers() {
    let allocator = Arc::new(HostAllocator);
    let a = Buffer::flat(allocator.clone(), 0, ALIGN).unwrap();
    let b = Buffer::flat(allocator, 0, ALIGN).unwrap();

    assert_ne!(a.pointer(), b.pointer());
    assert_eq!(a.size(), 0);
}

#[test]
fn test_flat_pointer_is_data_pointer() {
    let buffer = Buffer::flat(Arc::new(HostAllocator), 256, ALIGN).unwrap();

    assert_eq!(buffer.nallocs(), 1);
    assert_eq!(buffer.pointer().addr(), buffer.region_addrs().next().unwrap());
    assert_eq!(buffer.pointer().addr() % ALIGN, 0);
    assert_eq!(buffer.scope(), MemoryScope::Global);
    assert_eq!(buffer.allocator().name(), "DDR");
}

#[test]
fn test_discontiguous_pointer_is_row_table() {
    let buffer = Buffer::from_shape(Arc::new(HostAllocator), &[3, 4], DType::Float32, ALIGN).unwrap();
    let rows: Vec<usize> = buffer.region_addrs().collect();

    assert_eq!(buffer.nallocs(), 3);
    assert_eq!(buffer.size(), 48);
    assert!(rows.iter().all(|addr| addr % ALIGN == 0));

    let table = buffer.pointer().as_ptr() as *const usize;
    for (i, &row) in rows.iter().enumerate() {
        assert_eq!(unsafe { *table.add(i) }, row);
    }
}

#[test]
fn test_host_round_trip_through_rows() {
    let mut buffer = Buffer::from_shape(Arc::new(HostAllocator), &[3, 4], DType::Int8, ALIGN).unwrap();
    let src: Vec<u8> = (0..12).collect();
    buffer.copy_from_host(&src).unwrap();

    let mut dst = vec![0u8; 12];
    buffer.copy_to_host(&mut dst).unwrap();
    assert_eq!(dst, src);
}

#[test]
fn test_partial_copy_to_host() {
    let mut buffer = Buffer::from_shape(Arc::new(HostAllocator), &[2, 3], DType::UInt8, ALIGN).unwrap();
    buffer.copy_from_host(&[1, 2, 3, 4, 5, 6]).unwrap();

    let mut dst = [0u8; 4];
    buffer.copy_to_host(&mut dst).unwrap();
    assert_eq!(dst, [1, 2, 3, 4]);
}

#[test]
fn test_copy_out_of_bounds() {
    let mut buffer = Buffer::flat(Arc::new(HostAllocator), 8, ALIGN).unwrap();

    let result = buffer.copy_from_host(&[0u8; 9]);
    assert!(matches!(result, Err(Error::CopyOutOfBounds { requested: 9, available: 8 })));

    let mut dst = [0u8; 16];
    assert!(buffer.copy_to_host(&mut dst).is_err());
}

#[test]
fn test_copy_between_layouts() {
    let allocator = Arc::new(HostAllocator);
    let mut flat = Buffer::flat(allocator.clone(), 8, ALIGN).unwrap();
    flat.copy_from_host(&[10, 11, 12, 13, 14, 15, 16, 17]).unwrap();

    let mut rows = Buffer::from_shape(allocator, &[4, 2], DType::UInt8, ALIGN).unwrap();
    rows.copy_from(&flat, 8).unwrap();

    let mut out = [0u8; 8];
    rows.copy_to_host(&mut out).unwrap();
    assert_eq!(out, [10, 11, 12, 13, 14, 15, 16, 17]);

    assert!(matches!(rows.copy_from(&flat, 9), Err(Error::CopyOutOfBounds { .. })));
}
