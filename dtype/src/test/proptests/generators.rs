use crate::*;
use proptest::prelude::*;

pub fn int_dtype() -> impl Strategy<Value = ScalarDType> {
    prop_oneof![
        Just(ScalarDType::Int8),
        Just(ScalarDType::Int16),
        Just(ScalarDType::Int32),
        Just(ScalarDType::Int64),
        Just(ScalarDType::UInt8),
        Just(ScalarDType::UInt16),
        Just(ScalarDType::UInt32),
        Just(ScalarDType::UInt64)
    ]
}

pub fn float_dtype() -> impl Strategy<Value = ScalarDType> {
    prop_oneof![
        Just(ScalarDType::Float16),
        Just(ScalarDType::BFloat16),
        Just(ScalarDType::Float32),
        Just(ScalarDType::Float64)
    ]
}

pub fn scalar_dtype() -> impl Strategy<Value = ScalarDType> {
    prop_oneof![Just(ScalarDType::Bool), int_dtype(), float_dtype()]
}

/// Element types as they reach the device API: scalars or HVX-style vectors.
pub fn dtype() -> impl Strategy<Value = DType> {
    (scalar_dtype(), prop_oneof![Just(1u16), Just(4u16), Just(32u16)])
        .prop_map(|(scalar, lanes)| DType::new(scalar, lanes))
}
