//! The closed set of KSL value and resource types.

use crate::IrError;

/// The component kind of a scalar, vector or matrix.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum ScalarKind {
    /// 32-bit float.
    Float,
    /// 32-bit signed integer.
    Int,
    /// 32-bit unsigned integer.
    Uint,
    /// Boolean.
    Bool,
}

impl ScalarKind {
    /// Returns `true` for every kind except [`ScalarKind::Bool`].
    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Bool)
    }
}

/// Number of components in a vector (and columns of a square matrix).
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum VectorSize {
    /// 2 components.
    Bi = 2,
    /// 3 components.
    Tri = 3,
    /// 4 components.
    Quad = 4,
}

impl VectorSize {
    /// Returns the vector size with `dimens` components, if there is one.
    pub fn from_dimens(dimens: usize) -> Option<Self> {
        match dimens {
            2 => Some(Self::Bi),
            3 => Some(Self::Tri),
            4 => Some(Self::Quad),
            _ => None,
        }
    }

    /// Number of components.
    pub fn dimens(self) -> usize {
        self as usize
    }
}

/// A plain value type: the subset of [`KslType`] allowed as array elements.
///
/// Arrays of arrays and arrays of resources are not expressible.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum ValueType {
    Scalar(ScalarKind),
    Vector { size: VectorSize, scalar: ScalarKind },
    Matrix { size: VectorSize },
}

/// Texture dimensionality of a sampler.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum SamplerDim {
    D1,
    D2,
    D3,
    Cube,
    D2Array,
    CubeArray,
}

/// Whether a sampler returns colors or depth-compare results.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum SamplerKind {
    /// Samples a `float4` color.
    Color,
    /// Samples a `float1` depth comparison result.
    Depth,
}

/// A texture sampler type.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct SamplerType {
    dim: SamplerDim,
    kind: SamplerKind,
}

impl SamplerType {
    pub const COLOR_1D: Self = Self::color(SamplerDim::D1);
    pub const COLOR_2D: Self = Self::color(SamplerDim::D2);
    pub const COLOR_3D: Self = Self::color(SamplerDim::D3);
    pub const COLOR_CUBE: Self = Self::color(SamplerDim::Cube);
    pub const COLOR_2D_ARRAY: Self = Self::color(SamplerDim::D2Array);
    pub const COLOR_CUBE_ARRAY: Self = Self::color(SamplerDim::CubeArray);
    pub const DEPTH_2D: Self = Self::depth(SamplerDim::D2);
    pub const DEPTH_CUBE: Self = Self::depth(SamplerDim::Cube);
    pub const DEPTH_2D_ARRAY: Self = Self::depth(SamplerDim::D2Array);
    pub const DEPTH_CUBE_ARRAY: Self = Self::depth(SamplerDim::CubeArray);

    const fn color(dim: SamplerDim) -> Self {
        Self {
            dim,
            kind: SamplerKind::Color,
        }
    }

    const fn depth(dim: SamplerDim) -> Self {
        Self {
            dim,
            kind: SamplerKind::Depth,
        }
    }

    /// Creates a sampler type, rejecting 1D and 3D depth samplers.
    pub fn new(dim: SamplerDim, kind: SamplerKind) -> Result<Self, IrError> {
        if kind == SamplerKind::Depth && matches!(dim, SamplerDim::D1 | SamplerDim::D3) {
            return Err(IrError::UnsupportedType(format!(
                "depth sampler with dimension {dim:?}"
            )));
        }
        Ok(Self { dim, kind })
    }

    pub fn dim(self) -> SamplerDim {
        self.dim
    }

    pub fn kind(self) -> SamplerKind {
        self.kind
    }

    /// The type of the texture coordinate passed when sampling.
    ///
    /// Depth samplers fold the comparison reference into the last component.
    pub fn coord_type(self) -> KslType {
        match (self.kind, self.dim) {
            (SamplerKind::Color, SamplerDim::D1) => KslType::FLOAT1,
            (SamplerKind::Color, SamplerDim::D2) => KslType::FLOAT2,
            (SamplerKind::Color, SamplerDim::D3 | SamplerDim::Cube | SamplerDim::D2Array) => {
                KslType::FLOAT3
            }
            (SamplerKind::Color, SamplerDim::CubeArray) => KslType::FLOAT4,
            (SamplerKind::Depth, SamplerDim::D2) => KslType::FLOAT3,
            (SamplerKind::Depth, _) => KslType::FLOAT4,
        }
    }

    /// The type produced by sampling.
    pub fn sample_type(self) -> KslType {
        match self.kind {
            SamplerKind::Color => KslType::FLOAT4,
            SamplerKind::Depth => KslType::FLOAT1,
        }
    }
}

/// Dimensionality of a storage texture.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum StorageDim {
    D1,
    D2,
    D3,
}

/// A read-write storage texture with a numeric texel type.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct StorageType {
    dim: StorageDim,
    texel: ValueType,
}

impl StorageType {
    /// Creates a storage type. The texel must be a numeric scalar or vector.
    pub fn new(dim: StorageDim, texel: KslType) -> Result<Self, IrError> {
        match texel.value_type() {
            Some(value @ (ValueType::Scalar(kind) | ValueType::Vector { scalar: kind, .. }))
                if kind.is_numeric() =>
            {
                Ok(Self { dim, texel: value })
            }
            _ => Err(IrError::UnsupportedType(format!(
                "storage texture with texel type {texel}"
            ))),
        }
    }

    pub fn dim(self) -> StorageDim {
        self.dim
    }

    pub fn texel_type(self) -> KslType {
        self.texel.into()
    }

    /// Integer texel coordinate type for loads and stores.
    pub fn coord_type(self) -> KslType {
        match self.dim {
            StorageDim::D1 => KslType::INT1,
            StorageDim::D2 => KslType::INT2,
            StorageDim::D3 => KslType::INT3,
        }
    }
}

/// A KSL data type.
///
/// Types are plain values: two independently constructed types are equal
/// (and hash equally) iff they are structurally the same, which is what
/// lets ad-hoc array types serve as map keys.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum KslType {
    /// No value.
    Void,
    /// A single scalar.
    Scalar(ScalarKind),
    /// A vector of 2 to 4 scalars.
    Vector { size: VectorSize, scalar: ScalarKind },
    /// A square float matrix of `size` column vectors.
    Matrix { size: VectorSize },
    /// A fixed-size array of plain values.
    Array { elem: ValueType, size: u32 },
    /// A texture sampler.
    Sampler(SamplerType),
    /// A storage texture.
    Storage(StorageType),
}

impl KslType {
    pub const FLOAT1: Self = Self::Scalar(ScalarKind::Float);
    pub const FLOAT2: Self = Self::vector(ScalarKind::Float, VectorSize::Bi);
    pub const FLOAT3: Self = Self::vector(ScalarKind::Float, VectorSize::Tri);
    pub const FLOAT4: Self = Self::vector(ScalarKind::Float, VectorSize::Quad);
    pub const INT1: Self = Self::Scalar(ScalarKind::Int);
    pub const INT2: Self = Self::vector(ScalarKind::Int, VectorSize::Bi);
    pub const INT3: Self = Self::vector(ScalarKind::Int, VectorSize::Tri);
    pub const INT4: Self = Self::vector(ScalarKind::Int, VectorSize::Quad);
    pub const UINT1: Self = Self::Scalar(ScalarKind::Uint);
    pub const UINT2: Self = Self::vector(ScalarKind::Uint, VectorSize::Bi);
    pub const UINT3: Self = Self::vector(ScalarKind::Uint, VectorSize::Tri);
    pub const UINT4: Self = Self::vector(ScalarKind::Uint, VectorSize::Quad);
    pub const BOOL1: Self = Self::Scalar(ScalarKind::Bool);
    pub const BOOL2: Self = Self::vector(ScalarKind::Bool, VectorSize::Bi);
    pub const BOOL3: Self = Self::vector(ScalarKind::Bool, VectorSize::Tri);
    pub const BOOL4: Self = Self::vector(ScalarKind::Bool, VectorSize::Quad);
    pub const MAT2: Self = Self::Matrix {
        size: VectorSize::Bi,
    };
    pub const MAT3: Self = Self::Matrix {
        size: VectorSize::Tri,
    };
    pub const MAT4: Self = Self::Matrix {
        size: VectorSize::Quad,
    };

    /// A vector type.
    pub const fn vector(scalar: ScalarKind, size: VectorSize) -> Self {
        Self::Vector { size, scalar }
    }

    /// A scalar (`dimens == 1`) or vector type with `dimens` components.
    pub fn with_dimens(scalar: ScalarKind, dimens: usize) -> Option<Self> {
        if dimens == 1 {
            return Some(Self::Scalar(scalar));
        }
        VectorSize::from_dimens(dimens).map(|size| Self::vector(scalar, size))
    }

    /// The matrix whose columns are `column`. Only float vectors qualify.
    pub fn matrix(column: KslType) -> Result<Self, IrError> {
        match column {
            Self::Vector {
                size,
                scalar: ScalarKind::Float,
            } => Ok(Self::Matrix { size }),
            other => Err(IrError::UnsupportedType(format!(
                "matrix with column type {other}"
            ))),
        }
    }

    /// An array of `size` elements of type `elem`.
    pub fn array(elem: KslType, size: u32) -> Result<Self, IrError> {
        if size == 0 {
            return Err(IrError::UnsupportedType(format!(
                "zero-length array of {elem}"
            )));
        }
        match elem.value_type() {
            Some(elem) => Ok(Self::Array { elem, size }),
            None => Err(IrError::UnsupportedType(format!("array of {elem}"))),
        }
    }

    /// Returns the plain value type, or `None` for void, arrays and resources.
    pub fn value_type(self) -> Option<ValueType> {
        match self {
            Self::Scalar(kind) => Some(ValueType::Scalar(kind)),
            Self::Vector { size, scalar } => Some(ValueType::Vector { size, scalar }),
            Self::Matrix { size } => Some(ValueType::Matrix { size }),
            _ => None,
        }
    }

    pub fn is_scalar(self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    pub fn is_vector(self) -> bool {
        matches!(self, Self::Vector { .. })
    }

    pub fn is_matrix(self) -> bool {
        matches!(self, Self::Matrix { .. })
    }

    pub fn is_array(self) -> bool {
        matches!(self, Self::Array { .. })
    }

    /// Samplers and storage textures.
    pub fn is_opaque(self) -> bool {
        matches!(self, Self::Sampler(_) | Self::Storage(_))
    }

    /// The component kind of a scalar, vector or matrix.
    pub fn scalar_kind(self) -> Option<ScalarKind> {
        match self {
            Self::Scalar(kind) | Self::Vector { scalar: kind, .. } => Some(kind),
            Self::Matrix { .. } => Some(ScalarKind::Float),
            _ => None,
        }
    }

    /// Returns `true` for numeric scalars, vectors and matrices.
    pub fn is_numeric(self) -> bool {
        self.scalar_kind().is_some_and(ScalarKind::is_numeric)
    }

    /// Returns `true` for float scalars and vectors.
    pub fn is_float(self) -> bool {
        matches!(
            self,
            Self::Scalar(ScalarKind::Float)
                | Self::Vector {
                    scalar: ScalarKind::Float,
                    ..
                }
        )
    }

    /// The number of components of a vector.
    pub fn vector_size(self) -> Option<VectorSize> {
        match self {
            Self::Vector { size, .. } => Some(size),
            _ => None,
        }
    }

    /// The scalar component type of a vector.
    pub fn component_type(self) -> Option<KslType> {
        match self {
            Self::Vector { scalar, .. } => Some(Self::Scalar(scalar)),
            _ => None,
        }
    }

    /// The column vector type of a matrix.
    pub fn matrix_column(self) -> Option<KslType> {
        match self {
            Self::Matrix { size } => Some(Self::vector(ScalarKind::Float, size)),
            _ => None,
        }
    }

    /// The element type and length of an array.
    pub fn array_element(self) -> Option<(KslType, u32)> {
        match self {
            Self::Array { elem, size } => Some((elem.into(), size)),
            _ => None,
        }
    }

    /// Number of scalar components making up a scalar, vector or matrix.
    pub fn component_count(self) -> Option<usize> {
        match self {
            Self::Scalar(_) => Some(1),
            Self::Vector { size, .. } => Some(size.dimens()),
            Self::Matrix { size } => Some(size.dimens() * size.dimens()),
            _ => None,
        }
    }
}

impl From<ValueType> for KslType {
    fn from(value: ValueType) -> Self {
        match value {
            ValueType::Scalar(kind) => Self::Scalar(kind),
            ValueType::Vector { size, scalar } => Self::Vector { size, scalar },
            ValueType::Matrix { size } => Self::Matrix { size },
        }
    }
}

impl From<SamplerType> for KslType {
    fn from(value: SamplerType) -> Self {
        Self::Sampler(value)
    }
}

impl From<StorageType> for KslType {
    fn from(value: StorageType) -> Self {
        Self::Storage(value)
    }
}
