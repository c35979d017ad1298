//! Error types for building and validating KSL programs.

use crate::stmt::StageKind;

/// Errors raised while constructing, validating or rendering a program.
///
/// All of them are authoring errors: the program that produced one cannot
/// be generated.
#[derive(Debug, thiserror::Error)]
pub enum IrError {
    /// A handle does not belong to the program it was used with.
    #[error("handle index {index} out of bounds (arena size: {size})")]
    BadHandle { index: usize, size: usize },

    /// An expression of the wrong static type was supplied.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// A type or operand combination the closed type system cannot express.
    #[error("unsupported type combination: {0}")]
    UnsupportedType(String),

    /// A block input has neither a bound value nor a default.
    #[error("missing input value for input {input} of block {block}")]
    UnboundInput { input: String, block: String },

    /// A block input's bound expression refers back to the input itself.
    #[error("input {input} of block {block} depends on itself")]
    CyclicInput { input: String, block: String },

    /// The left-hand side of an assignment is not assignable.
    #[error("not assignable: {0}")]
    NotAssignable(String),

    /// A swizzle pattern is malformed or out of range.
    #[error("invalid swizzle: {0}")]
    InvalidSwizzle(String),

    /// A stage was added twice.
    #[error("{0} stage already exists")]
    DuplicateStage(StageKind),

    /// A stage was referenced before it was added.
    #[error("{0} stage does not exist")]
    MissingStage(StageKind),

    /// A statement reads or writes a variable owned by another stage.
    #[error("{variable} belongs to the {owner} stage but is used in the {used_in} stage")]
    WrongStage {
        variable: String,
        owner: StageKind,
        used_in: StageKind,
    },

    /// A local variable is used where its declaration is not in effect.
    #[error("{variable} is not declared in scope {scope}")]
    OutOfScope { variable: String, scope: String },

    /// A compute stage has a zero workgroup dimension.
    #[error("invalid workgroup size: [{}, {}, {}]", .0[0], .0[1], .0[2])]
    InvalidWorkgroupSize([u32; 3]),
}

impl IrError {
    pub(crate) fn mismatch(expected: impl ToString, found: impl ToString) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}
