//! Expressions: typed, side-effect free nodes of the shader graph.

use crate::IrError;
use crate::arena::Handle;
use crate::block::BlockInput;
use crate::state::Variable;
use crate::types::{KslType, ScalarKind};

/// A vector swizzle component.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum SwizzleComponent {
    X = 0,
    Y = 1,
    Z = 2,
    W = 3,
}

impl SwizzleComponent {
    /// Parses a swizzle pattern written with either `xyzw` or `rgba` letters.
    pub fn parse(pattern: &str) -> Result<Vec<Self>, IrError> {
        const XYZW: &str = "xyzw";
        const RGBA: &str = "rgba";

        if pattern.is_empty() || pattern.len() > 4 {
            return Err(IrError::InvalidSwizzle(format!(
                "'{pattern}' must have 1 to 4 components"
            )));
        }
        let set = if pattern.chars().all(|c| XYZW.contains(c)) {
            XYZW
        } else if pattern.chars().all(|c| RGBA.contains(c)) {
            RGBA
        } else {
            return Err(IrError::InvalidSwizzle(format!(
                "'{pattern}' mixes or uses unknown component letters"
            )));
        };
        Ok(pattern
            .chars()
            .filter_map(|c| set.find(c))
            .map(|i| match i {
                0 => Self::X,
                1 => Self::Y,
                2 => Self::Z,
                _ => Self::W,
            })
            .collect())
    }
}

/// A literal constant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Literal {
    Float(f32),
    Int(i32),
    Uint(u32),
    Bool(bool),
}

impl Literal {
    pub fn ty(self) -> KslType {
        match self {
            Self::Float(_) => KslType::FLOAT1,
            Self::Int(_) => KslType::INT1,
            Self::Uint(_) => KslType::UINT1,
            Self::Bool(_) => KslType::BOOL1,
        }
    }

    /// The value of an integer literal, used by generators to special-case
    /// constant indices.
    pub fn as_index(self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(i64::from(v)),
            Self::Uint(v) => Some(i64::from(v)),
            _ => None,
        }
    }
}

/// A unary operator.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum UnaryOp {
    Negate,
    Not,
}

impl UnaryOp {
    /// The result type of applying this operator to `operand`.
    pub fn result_type(self, operand: KslType) -> Result<KslType, IrError> {
        let ok = match self {
            Self::Negate => operand.is_numeric(),
            Self::Not => operand == KslType::BOOL1,
        };
        if ok {
            Ok(operand)
        } else {
            Err(IrError::mismatch(
                format!("operand valid for unary '{self}'"),
                operand,
            ))
        }
    }
}

/// A binary operator.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::Less
                | Self::LessEqual
                | Self::Greater
                | Self::GreaterEqual
        )
    }

    /// The result type of `left op right`.
    ///
    /// Arithmetic accepts equal operand types, a vector with a scalar of its
    /// component kind, and the usual matrix/vector and matrix/scalar products.
    pub fn result_type(self, left: KslType, right: KslType) -> Result<KslType, IrError> {
        let result = match self {
            Self::And | Self::Or => {
                (left == KslType::BOOL1 && right == KslType::BOOL1).then_some(KslType::BOOL1)
            }
            Self::Equal | Self::NotEqual => {
                (left == right && left.is_scalar()).then_some(KslType::BOOL1)
            }
            Self::Less | Self::LessEqual | Self::Greater | Self::GreaterEqual => {
                (left == right && left.is_scalar() && left.is_numeric()).then_some(KslType::BOOL1)
            }
            _ => self.arithmetic_type(left, right),
        };
        result.ok_or_else(|| {
            IrError::mismatch(
                format!("operands valid for '{self}'"),
                format!("{left} {self} {right}"),
            )
        })
    }

    fn arithmetic_type(self, left: KslType, right: KslType) -> Option<KslType> {
        if !left.is_numeric() || !right.is_numeric() {
            return None;
        }
        match (left, right) {
            (KslType::Matrix { .. }, KslType::Matrix { .. }) if left == right => {
                matches!(self, Self::Add | Self::Subtract | Self::Multiply).then_some(left)
            }
            (KslType::Matrix { size }, KslType::Vector { size: vs, .. }) => {
                (self == Self::Multiply && size == vs).then_some(right)
            }
            (KslType::Vector { size: vs, .. }, KslType::Matrix { size }) => {
                (self == Self::Multiply && size == vs).then_some(left)
            }
            (KslType::Matrix { .. }, KslType::FLOAT1) => {
                matches!(self, Self::Multiply | Self::Divide).then_some(left)
            }
            (KslType::FLOAT1, KslType::Matrix { .. }) => (self == Self::Multiply).then_some(right),
            (KslType::Matrix { .. }, _) | (_, KslType::Matrix { .. }) => None,
            _ if left == right => Some(left),
            (KslType::Vector { scalar, .. }, KslType::Scalar(kind)) if scalar == kind => Some(left),
            (KslType::Scalar(kind), KslType::Vector { scalar, .. }) if scalar == kind => {
                Some(right)
            }
            _ => None,
        }
    }
}

/// A built-in shader function.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum BuiltinFunction {
    Abs,
    Sign,
    Floor,
    Ceil,
    Fract,
    Sqrt,
    InverseSqrt,
    Sin,
    Cos,
    Tan,
    Exp,
    Log,
    Pow,
    Min,
    Max,
    Clamp,
    Mix,
    Step,
    SmoothStep,
    Dot,
    Cross,
    Length,
    Distance,
    Normalize,
    Reflect,
    Transpose,
    Determinant,
}

impl BuiltinFunction {
    /// Number of arguments the function takes.
    pub fn arity(self) -> usize {
        match self {
            Self::Pow
            | Self::Min
            | Self::Max
            | Self::Step
            | Self::Dot
            | Self::Cross
            | Self::Distance
            | Self::Reflect => 2,
            Self::Clamp | Self::Mix | Self::SmoothStep => 3,
            _ => 1,
        }
    }

    /// The result type for the given argument types.
    pub fn result_type(self, args: &[KslType]) -> Result<KslType, IrError> {
        let found = || {
            args.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        if args.len() != self.arity() {
            return Err(IrError::mismatch(
                format!("{} argument(s) for {self}", self.arity()),
                format!("({})", found()),
            ));
        }
        self.check(args)
            .ok_or_else(|| IrError::mismatch(format!("valid arguments for {self}"), found()))
    }

    fn check(self, args: &[KslType]) -> Option<KslType> {
        let x = args[0];
        // a second/third argument may be `x` itself or, for vectors, its scalar
        let same_or_component = |t: KslType| t == x || Some(t) == x.component_type();
        match self {
            Self::Floor
            | Self::Ceil
            | Self::Fract
            | Self::Sqrt
            | Self::InverseSqrt
            | Self::Sin
            | Self::Cos
            | Self::Tan
            | Self::Exp
            | Self::Log => x.is_float().then_some(x),
            Self::Abs | Self::Sign => (x.is_numeric()
                && !x.is_matrix()
                && x.scalar_kind() != Some(ScalarKind::Uint))
            .then_some(x),
            Self::Normalize => (x.is_float() && x.is_vector()).then_some(x),
            Self::Length => x.is_float().then_some(KslType::FLOAT1),
            Self::Pow | Self::Step => (x.is_float() && args[1] == x).then_some(x),
            Self::Min | Self::Max => {
                (x.is_numeric() && !x.is_matrix() && same_or_component(args[1])).then_some(x)
            }
            Self::Clamp => (x.is_numeric()
                && !x.is_matrix()
                && same_or_component(args[1])
                && same_or_component(args[2]))
            .then_some(x),
            Self::Mix => (x.is_float() && args[1] == x && same_or_component(args[2])).then_some(x),
            Self::SmoothStep => {
                let x = args[2];
                let edge_ok = |t: KslType| t == x || t == KslType::FLOAT1;
                (x.is_float() && edge_ok(args[0]) && edge_ok(args[1])).then_some(x)
            }
            Self::Dot => (x.is_float() && x.is_vector() && args[1] == x).then_some(KslType::FLOAT1),
            Self::Distance => (x.is_float() && args[1] == x).then_some(KslType::FLOAT1),
            Self::Cross => (x == KslType::FLOAT3 && args[1] == x).then_some(x),
            Self::Reflect => (x.is_float() && x.is_vector() && args[1] == x).then_some(x),
            Self::Transpose => x.is_matrix().then_some(x),
            Self::Determinant => x.is_matrix().then_some(KslType::FLOAT1),
        }
    }
}

/// The operation an [`Expression`] node performs.
#[derive(Clone, Debug)]
pub enum ExpressionKind {
    /// A literal constant.
    Literal(Literal),
    /// Construct a vector or matrix from scalar/vector components.
    Compose { components: Vec<Handle<Expression>> },
    /// Read a variable.
    Variable(Handle<Variable>),
    /// Read whatever is currently bound to a block input.
    BlockInput(Handle<BlockInput>),
    Unary {
        op: UnaryOp,
        expr: Handle<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Handle<Expression>,
        right: Handle<Expression>,
    },
    Swizzle {
        vector: Handle<Expression>,
        pattern: Vec<SwizzleComponent>,
    },
    /// One column of a matrix, selected by an `int1` index.
    MatrixColumn {
        matrix: Handle<Expression>,
        index: Handle<Expression>,
    },
    /// One element of an array, selected by an `int1` index.
    ArrayElement {
        array: Handle<Expression>,
        index: Handle<Expression>,
    },
    Builtin {
        fun: BuiltinFunction,
        args: Vec<Handle<Expression>>,
    },
    /// Numeric conversion to the node's type.
    Convert { expr: Handle<Expression> },
    /// Sample a texture.
    Sample {
        sampler: Handle<Expression>,
        coord: Handle<Expression>,
    },
    /// Read one texel of a storage texture at an integer coordinate.
    StorageLoad {
        storage: Handle<Expression>,
        coord: Handle<Expression>,
    },
}

/// A typed expression node.
///
/// `ty` is fixed at construction. `state_vars` caches the mutable
/// variables the node reads, directly or through its operands; it is
/// computed once from the operands' caches, so collecting dependencies never
/// walks the subtree again.
#[derive(Clone, Debug)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub ty: KslType,
    pub(crate) state_vars: Box<[Handle<Variable>]>,
}

impl ExpressionKind {
    /// Direct operand handles, in evaluation order.
    pub fn operands(&self) -> Vec<Handle<Expression>> {
        match self {
            Self::Literal(_) | Self::Variable(_) | Self::BlockInput(_) => Vec::new(),
            Self::Compose { components } => components.clone(),
            Self::Builtin { args, .. } => args.clone(),
            Self::Unary { expr, .. } | Self::Convert { expr } => vec![*expr],
            Self::Swizzle { vector, .. } => vec![*vector],
            Self::Binary { left, right, .. } => vec![*left, *right],
            Self::MatrixColumn { matrix, index } => vec![*matrix, *index],
            Self::ArrayElement { array, index } => vec![*array, *index],
            Self::Sample { sampler, coord } => vec![*sampler, *coord],
            Self::StorageLoad { storage, coord } => vec![*storage, *coord],
        }
    }
}

impl Expression {
    /// The mutable variables this node transitively reads.
    pub fn state_variables(&self) -> &[Handle<Variable>] {
        &self.state_vars
    }

    pub fn operands(&self) -> Vec<Handle<Expression>> {
        self.kind.operands()
    }
}
