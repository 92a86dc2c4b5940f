//! Shared type vocabulary for CrossCall.
//!
//! This crate owns the runtime type tags ([`FfiType`]), the descriptors used
//! to declare method signatures, the host-facing value representation
//! ([`HostValue`]), the borrowed buffer views passed into native callables,
//! and the two traits ([`FfiReturn`], [`FfiScalar`]) that tie each tag to
//! exactly one native storage type. Every other CrossCall crate builds on this
//! vocabulary.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod error;

pub use error::FfiError;

/// Runtime tag identifying one supported native storage type.
///
/// Tags round-trip through a stable integer code (`code`/`from_code`) and a
/// stable lowercase name (`name`/`from_name`); both mappings are bijections
/// over the supported set, and anything outside it fails with
/// [`FfiError::UnsupportedType`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum FfiType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    /// Opaque byte payload.
    Buffer,
    /// Named record of tagged fields; valid in return position only.
    Compound,
}

impl FfiType {
    /// Every supported tag, in tag order.
    pub const ALL: [FfiType; 13] = [
        FfiType::Bool,
        FfiType::Int8,
        FfiType::Int16,
        FfiType::Int32,
        FfiType::Int64,
        FfiType::UInt8,
        FfiType::UInt16,
        FfiType::UInt32,
        FfiType::UInt64,
        FfiType::Float32,
        FfiType::Float64,
        FfiType::Buffer,
        FfiType::Compound,
    ];

    /// Stable integer code used when tags cross the host boundary.
    pub fn code(self) -> u32 {
        match self {
            FfiType::Bool => 0,
            FfiType::Int8 => 1,
            FfiType::Int16 => 2,
            FfiType::Int32 => 3,
            FfiType::Int64 => 4,
            FfiType::UInt8 => 5,
            FfiType::UInt16 => 6,
            FfiType::UInt32 => 7,
            FfiType::UInt64 => 8,
            FfiType::Float32 => 9,
            FfiType::Float64 => 10,
            FfiType::Buffer => 11,
            FfiType::Compound => 12,
        }
    }

    pub fn from_code(code: u32) -> Result<Self, FfiError> {
        Self::ALL
            .iter()
            .copied()
            .find(|tag| tag.code() == code)
            .ok_or_else(|| FfiError::UnsupportedType {
                tag: format!("code {code}"),
            })
    }

    pub fn name(self) -> &'static str {
        match self {
            FfiType::Bool => "bool",
            FfiType::Int8 => "int8",
            FfiType::Int16 => "int16",
            FfiType::Int32 => "int32",
            FfiType::Int64 => "int64",
            FfiType::UInt8 => "uint8",
            FfiType::UInt16 => "uint16",
            FfiType::UInt32 => "uint32",
            FfiType::UInt64 => "uint64",
            FfiType::Float32 => "float32",
            FfiType::Float64 => "float64",
            FfiType::Buffer => "buffer",
            FfiType::Compound => "compound",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, FfiError> {
        Self::ALL
            .iter()
            .copied()
            .find(|tag| tag.name() == name)
            .ok_or_else(|| FfiError::UnsupportedType {
                tag: name.to_string(),
            })
    }
}

impl fmt::Display for FfiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One named, tagged field of a compound return type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundField {
    pub name: String,
    pub ty: FfiType,
    pub shape: Vec<usize>,
}

impl CompoundField {
    pub fn new(name: impl Into<String>, ty: FfiType, shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            ty,
            shape,
        }
    }
}

/// Descriptor for a structured return value built from tagged primitives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundType {
    pub fields: Vec<CompoundField>,
}

impl CompoundType {
    pub fn new(fields: Vec<CompoundField>) -> Self {
        Self { fields }
    }
}

/// Declared return type of a registered method: either a single primitive tag
/// or a compound descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnType {
    Primitive(FfiType),
    Compound(CompoundType),
}

impl ReturnType {
    /// The runtime tag identifying this return type.
    pub fn tag(&self) -> FfiType {
        match self {
            ReturnType::Primitive(tag) => *tag,
            ReturnType::Compound(_) => FfiType::Compound,
        }
    }
}

/// Declared argument: name, tag, and expected shape (empty shape = scalar).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FfiArgument {
    pub name: String,
    pub ty: FfiType,
    pub shape: Vec<usize>,
}

impl FfiArgument {
    pub fn new(name: impl Into<String>, ty: FfiType, shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            ty,
            shape,
        }
    }

    /// Scalar argument: empty shape.
    pub fn scalar(name: impl Into<String>, ty: FfiType) -> Self {
        Self::new(name, ty, Vec::new())
    }
}

/// Opaque byte payload carried through the boundary without interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OpaqueBuffer(pub Vec<u8>);

impl From<Vec<u8>> for OpaqueBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        OpaqueBuffer(bytes)
    }
}

/// Named heterogeneous fields: the native return value for compound methods
/// and the host record representation. Field agreement with the declared
/// `CompoundType` is the method author's responsibility; tags are the checked
/// contract.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompoundValue {
    pub fields: Vec<(String, HostValue)>,
}

impl CompoundValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<HostValue>) {
        self.fields.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&HostValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }
}

/// Owned, dtype-tagged element storage for a [`HostArray`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayData {
    Bool(Vec<bool>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl ArrayData {
    pub fn tag(&self) -> FfiType {
        match self {
            ArrayData::Bool(_) => FfiType::Bool,
            ArrayData::Int8(_) => FfiType::Int8,
            ArrayData::Int16(_) => FfiType::Int16,
            ArrayData::Int32(_) => FfiType::Int32,
            ArrayData::Int64(_) => FfiType::Int64,
            ArrayData::UInt8(_) => FfiType::UInt8,
            ArrayData::UInt16(_) => FfiType::UInt16,
            ArrayData::UInt32(_) => FfiType::UInt32,
            ArrayData::UInt64(_) => FfiType::UInt64,
            ArrayData::Float32(_) => FfiType::Float32,
            ArrayData::Float64(_) => FfiType::Float64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayData::Bool(values) => values.len(),
            ArrayData::Int8(values) => values.len(),
            ArrayData::Int16(values) => values.len(),
            ArrayData::Int32(values) => values.len(),
            ArrayData::Int64(values) => values.len(),
            ArrayData::UInt8(values) => values.len(),
            ArrayData::UInt16(values) => values.len(),
            ArrayData::UInt32(values) => values.len(),
            ArrayData::UInt64(values) => values.len(),
            ArrayData::Float32(values) => values.len(),
            ArrayData::Float64(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shaped, dtype-tagged numeric array handed back to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostArray {
    pub shape: Vec<usize>,
    pub data: ArrayData,
}

impl HostArray {
    pub fn new(data: ArrayData, shape: Vec<usize>) -> Result<Self, String> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(format!(
                "host array data length {} doesn't match shape {:?} ({} elements)",
                data.len(),
                shape,
                expected
            ));
        }
        Ok(HostArray { shape, data })
    }

    pub fn tag(&self) -> FfiType {
        self.data.tag()
    }

    /// Typed access to the element storage, `None` when `C` disagrees with
    /// the array's dtype tag.
    pub fn values<C: FfiScalar>(&self) -> Option<&[C]> {
        C::from_array(&self.data)
    }
}

/// A value in the shape the host embedding layer consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostValue {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Buffer(OpaqueBuffer),
    Array(HostArray),
    Record(CompoundValue),
    /// Ordered sequence, used for vectorized buffer/record results.
    List(Vec<HostValue>),
}

impl From<OpaqueBuffer> for HostValue {
    fn from(buffer: OpaqueBuffer) -> Self {
        HostValue::Buffer(buffer)
    }
}

impl From<CompoundValue> for HostValue {
    fn from(record: CompoundValue) -> Self {
        HostValue::Record(record)
    }
}

impl From<HostArray> for HostValue {
    fn from(array: HostArray) -> Self {
        HostValue::Array(array)
    }
}

/// Non-owning, dtype-tagged view over a contiguous host-owned buffer.
///
/// The view never outlives the buffer it borrows; slices cut from it for
/// chunked execution carry the same lifetime as their parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BufferView<'a> {
    Bool(&'a [bool]),
    Int8(&'a [i8]),
    Int16(&'a [i16]),
    Int32(&'a [i32]),
    Int64(&'a [i64]),
    UInt8(&'a [u8]),
    UInt16(&'a [u16]),
    UInt32(&'a [u32]),
    UInt64(&'a [u64]),
    Float32(&'a [f32]),
    Float64(&'a [f64]),
    Opaque(&'a [u8]),
}

impl<'a> BufferView<'a> {
    pub fn tag(&self) -> FfiType {
        match self {
            BufferView::Bool(_) => FfiType::Bool,
            BufferView::Int8(_) => FfiType::Int8,
            BufferView::Int16(_) => FfiType::Int16,
            BufferView::Int32(_) => FfiType::Int32,
            BufferView::Int64(_) => FfiType::Int64,
            BufferView::UInt8(_) => FfiType::UInt8,
            BufferView::UInt16(_) => FfiType::UInt16,
            BufferView::UInt32(_) => FfiType::UInt32,
            BufferView::UInt64(_) => FfiType::UInt64,
            BufferView::Float32(_) => FfiType::Float32,
            BufferView::Float64(_) => FfiType::Float64,
            BufferView::Opaque(_) => FfiType::Buffer,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            BufferView::Bool(values) => values.len(),
            BufferView::Int8(values) => values.len(),
            BufferView::Int16(values) => values.len(),
            BufferView::Int32(values) => values.len(),
            BufferView::Int64(values) => values.len(),
            BufferView::UInt8(values) => values.len(),
            BufferView::UInt16(values) => values.len(),
            BufferView::UInt32(values) => values.len(),
            BufferView::UInt64(values) => values.len(),
            BufferView::Float32(values) => values.len(),
            BufferView::Float64(values) => values.len(),
            BufferView::Opaque(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compile-time side of the tag/type correspondence: a native type that can
/// be returned from a registered method and converted into a [`HostValue`].
///
/// `TYPE` pairs each implementing type with exactly one [`FfiType`]; the
/// mapping is a bijection over the supported set.
pub trait FfiReturn: Send + Sync + Sized + 'static {
    const TYPE: FfiType;

    fn into_host(self) -> HostValue;

    /// Convert an ordered sequence of results (a vectorized return or a
    /// chunked batch) into a single host value.
    fn seq_into_host(values: Vec<Self>) -> HostValue;
}

/// A returnable type that is also storable in argument buffers: the element
/// types a [`BufferView`] can hold and a chunked parameter can be split over.
pub trait FfiScalar: FfiReturn + Copy + PartialEq + fmt::Debug {
    fn from_view<'a>(view: BufferView<'a>) -> Option<&'a [Self]>;

    fn as_view(slice: &[Self]) -> BufferView<'_>;

    fn from_array(data: &ArrayData) -> Option<&[Self]>;
}

macro_rules! ffi_scalar {
    ($ty:ty, $variant:ident) => {
        impl FfiReturn for $ty {
            const TYPE: FfiType = FfiType::$variant;

            fn into_host(self) -> HostValue {
                HostValue::$variant(self)
            }

            fn seq_into_host(values: Vec<Self>) -> HostValue {
                let shape = vec![values.len()];
                HostValue::Array(HostArray {
                    shape,
                    data: ArrayData::$variant(values),
                })
            }
        }

        impl FfiScalar for $ty {
            fn from_view<'a>(view: BufferView<'a>) -> Option<&'a [Self]> {
                match view {
                    BufferView::$variant(values) => Some(values),
                    _ => None,
                }
            }

            fn as_view(slice: &[Self]) -> BufferView<'_> {
                BufferView::$variant(slice)
            }

            fn from_array(data: &ArrayData) -> Option<&[Self]> {
                match data {
                    ArrayData::$variant(values) => Some(values),
                    _ => None,
                }
            }
        }

        impl From<$ty> for HostValue {
            fn from(value: $ty) -> Self {
                HostValue::$variant(value)
            }
        }
    };
}

ffi_scalar!(bool, Bool);
ffi_scalar!(i8, Int8);
ffi_scalar!(i16, Int16);
ffi_scalar!(i32, Int32);
ffi_scalar!(i64, Int64);
ffi_scalar!(u8, UInt8);
ffi_scalar!(u16, UInt16);
ffi_scalar!(u32, UInt32);
ffi_scalar!(u64, UInt64);
ffi_scalar!(f32, Float32);
ffi_scalar!(f64, Float64);

impl FfiReturn for OpaqueBuffer {
    const TYPE: FfiType = FfiType::Buffer;

    fn into_host(self) -> HostValue {
        HostValue::Buffer(self)
    }

    fn seq_into_host(values: Vec<Self>) -> HostValue {
        HostValue::List(values.into_iter().map(HostValue::Buffer).collect())
    }
}

impl FfiReturn for CompoundValue {
    const TYPE: FfiType = FfiType::Compound;

    fn into_host(self) -> HostValue {
        HostValue::Record(self)
    }

    fn seq_into_host(values: Vec<Self>) -> HostValue {
        HostValue::List(values.into_iter().map(HostValue::Record).collect())
    }
}
