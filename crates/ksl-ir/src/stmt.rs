//! Statements, scopes and shader stages.

use crate::arena::Handle;
use crate::block::Block;
use crate::expr::Expression;
use crate::state::{DependencySet, MutatedState, Variable};

/// A shader pipeline stage.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum StageKind {
    Vertex,
    Fragment,
    Compute,
}

/// One stage of a program: its main scope and its interface variables.
#[derive(Clone, Debug)]
pub struct Stage {
    pub kind: StageKind,
    pub main: Handle<Scope>,
    /// Location-bound inputs, in location order.
    pub inputs: Vec<Handle<Variable>>,
    /// Location-bound outputs, in location order.
    pub outputs: Vec<Handle<Variable>>,
    /// Built-ins used by the stage, in first-use order.
    pub builtins: Vec<Handle<Variable>>,
    /// Workgroup dimensions of a compute stage.
    pub workgroup_size: Option<[u32; 3]>,
}

/// An ordered list of statements; the body of a stage, block, branch or loop.
#[derive(Clone, Debug)]
pub struct Scope {
    /// Readable name, used in dumps and generated comments.
    pub name: String,
    pub stage: StageKind,
    pub parent: Option<Handle<Scope>>,
    /// The statement this scope belongs to (`None` for a stage's main scope).
    pub owner: Option<Handle<Statement>>,
    pub(crate) statements: Vec<Handle<Statement>>,
}

impl Scope {
    /// Statements in program order.
    pub fn statements(&self) -> &[Handle<Statement>] {
        &self.statements
    }
}

/// What a statement does.
#[derive(Clone, Debug)]
pub enum StatementKind {
    /// Declare a local variable with an optional initializer.
    Declare {
        variable: Handle<Variable>,
        init: Option<Handle<Expression>>,
    },
    /// Write `value` through the assignable `target`.
    Assign {
        target: Handle<Expression>,
        value: Handle<Expression>,
    },
    /// Conditional; an empty `reject` scope means no else branch.
    If {
        condition: Handle<Expression>,
        accept: Handle<Scope>,
        reject: Handle<Scope>,
    },
    /// Counted loop: `counter` runs from `start` (inclusive) to `end` (exclusive).
    Loop {
        counter: Handle<Variable>,
        start: Handle<Expression>,
        end: Handle<Expression>,
        body: Handle<Scope>,
    },
    /// A block with its own body scope.
    Block(Handle<Block>),
    /// Write `value` into the texel of `storage` at `coord`.
    StorageStore {
        storage: Handle<Expression>,
        coord: Handle<Expression>,
        value: Handle<Expression>,
    },
}

/// A statement in some scope.
#[derive(Clone, Debug)]
pub struct Statement {
    pub kind: StatementKind,
    pub scope: Handle<Scope>,
    pub(crate) dependencies: DependencySet,
    pub(crate) mutations: Vec<MutatedState>,
}

impl Statement {
    /// Mutable state the statement's inputs depend on.
    pub fn dependencies(&self) -> &DependencySet {
        &self.dependencies
    }

    /// States written by this statement itself (not by nested scopes).
    pub fn mutations(&self) -> &[MutatedState] {
        &self.mutations
    }
}
