//! KSL intermediate representation.
//!
//! A typed shader graph: expressions over a closed type system, statements
//! grouped into scopes, reusable blocks with rebindable inputs, and a
//! mutated-state tracker recording which version of each variable every
//! statement was computed from. Programs are built through [`Program`],
//! frozen into a [`ValidatedProgram`] and rendered by a [`KslGenerator`].

pub mod arena;
mod block;
mod display;
mod error;
mod expr;
mod generate;
mod program;
mod state;
mod stmt;
mod types;
mod validate;

pub use arena::{Arena, Handle};
pub use block::{Block, BlockInput};
pub use display::dump_program;
pub use error::IrError;
pub use expr::{
    BinaryOp, BuiltinFunction, Expression, ExpressionKind, Literal, SwizzleComponent, UnaryOp,
};
pub use generate::{IndexOperand, KslGenerator};
pub use program::{Branch, Loop, Program, StorageUsage};
pub use state::{BuiltinValue, DependencySet, MutatedState, Variable, VariableKind};
pub use stmt::{Scope, Stage, StageKind, Statement, StatementKind};
pub use types::{
    KslType, SamplerDim, SamplerKind, SamplerType, ScalarKind, StorageDim, StorageType, ValueType,
    VectorSize,
};
pub use validate::ValidatedProgram;
