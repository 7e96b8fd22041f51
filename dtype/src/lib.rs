//! Element types and device identities shared by the Hexagon runtime crates.
//!
//! These are plain value types: the device crate consumes them to size
//! allocations and to route calls, it never extends them.

pub mod ext;


use std::fmt;

/// Scalar element types understood by the device API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray, strum::FromRepr, strum::IntoStaticStr)]
#[cfg_attr(any(test, feature = "proptest"), derive(proptest_derive::Arbitrary))]
pub enum ScalarDType {
    Bool = 0,

    Int8 = 1,
    UInt8 = 2,
    Int16 = 3,
    UInt16 = 4,
    Int32 = 5,
    UInt32 = 6,
    Int64 = 7,
    UInt64 = 8,

    Float16 = 9,
    BFloat16 = 10,
    Float32 = 11,
    Float64 = 12,
}

impl ScalarDType {
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Bool => 1,
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 => 4,
            Self::Int64 | Self::UInt64 => 8,
            Self::Float16 | Self::BFloat16 => 2,
            Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    pub const fn bits(&self) -> usize {
        self.bytes() * 8
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub const fn is_unsigned(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float16 | Self::BFloat16 | Self::Float32 | Self::Float64)
    }
}

/// Element type of a tensor: a scalar repeated over `lanes` (HVX vector lanes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DType {
    pub scalar: ScalarDType,
    pub lanes: u16,
}

impl DType {
    pub const fn new(scalar: ScalarDType, lanes: u16) -> Self {
        Self { scalar, lanes }
    }

    /// Vectorize this element type. `lanes == 1` yields the scalar type back.
    pub const fn with_lanes(self, lanes: u16) -> Self {
        Self { scalar: self.scalar, lanes }
    }

    pub const fn is_vector(&self) -> bool {
        self.lanes > 1
    }

    /// Storage size of a single element in bytes.
    pub const fn bytes(&self) -> usize {
        self.scalar.bytes() * self.lanes as usize
    }
}

impl From<ScalarDType> for DType {
    fn from(scalar: ScalarDType) -> Self {
        Self::new(scalar, 1)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &'static str = self.scalar.into();
        if self.lanes == 1 { write!(f, "{name}") } else { write!(f, "{name}x{}", self.lanes) }
    }
}

#[allow(non_upper_case_globals)]
impl DType {
    pub const Bool: Self = Self::new(ScalarDType::Bool, 1);
    pub const Int8: Self = Self::new(ScalarDType::Int8, 1);
    pub const Int16: Self = Self::new(ScalarDType::Int16, 1);
    pub const Int32: Self = Self::new(ScalarDType::Int32, 1);
    pub const Int64: Self = Self::new(ScalarDType::Int64, 1);
    pub const UInt8: Self = Self::new(ScalarDType::UInt8, 1);
    pub const UInt16: Self = Self::new(ScalarDType::UInt16, 1);
    pub const UInt32: Self = Self::new(ScalarDType::UInt32, 1);
    pub const UInt64: Self = Self::new(ScalarDType::UInt64, 1);
    pub const Float16: Self = Self::new(ScalarDType::Float16, 1);
    pub const BFloat16: Self = Self::new(ScalarDType::BFloat16, 1);
    pub const Float32: Self = Self::new(ScalarDType::Float32, 1);
    pub const Float64: Self = Self::new(ScalarDType::Float64, 1);
}

/// Device kinds, numbered as in DLPack so that codes coming from a host
/// runtime map directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumIter, strum::VariantArray, strum::IntoStaticStr)]
#[repr(i32)]
pub enum DeviceKind {
    Cpu = 1,
    Cuda = 2,
    CudaHost = 3,
    OpenCl = 4,
    Vulkan = 7,
    Metal = 8,
    Vpi = 9,
    Rocm = 10,
    ExtDev = 12,
    Hexagon = 16,
}

impl DeviceKind {
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub const fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            1 => Self::Cpu,
            2 => Self::Cuda,
            3 => Self::CudaHost,
            4 => Self::OpenCl,
            7 => Self::Vulkan,
            8 => Self::Metal,
            9 => Self::Vpi,
            10 => Self::Rocm,
            12 => Self::ExtDev,
            16 => Self::Hexagon,
            _ => return None,
        })
    }
}

/// A concrete device: kind plus ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Device {
    pub kind: DeviceKind,
    pub index: usize,
}

impl Device {
    pub const fn new(kind: DeviceKind, index: usize) -> Self {
        Self { kind, index }
    }

    pub const fn cpu() -> Self {
        Self::new(DeviceKind::Cpu, 0)
    }

    pub const fn hexagon(index: usize) -> Self {
        Self::new(DeviceKind::Hexagon, index)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind: &'static str = self.kind.into();
        write!(f, "{}:{}", kind.to_uppercase(), self.index)
    }
}
