//! Program variables and mutated-state dependency tracking.
//!
//! Every assignment bumps the mutation counter of the variable it writes
//! (through whatever accessor it writes). A [`MutatedState`] records the
//! counter observed when a dependency was collected, so later code can tell
//! whether a value read earlier has gone stale.

use std::collections::BTreeMap;

use crate::Program;
use crate::arena::Handle;
use crate::stmt::{Scope, StageKind};
use crate::types::KslType;

/// Stage built-in values.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum BuiltinValue {
    /// Vertex stage clip-space position output, `float4`.
    Position,
    /// Vertex stage vertex index, `int1`.
    VertexIndex,
    /// Vertex stage instance index, `int1`.
    InstanceIndex,
    /// Fragment stage window coordinate, `float4`.
    FragCoord,
    /// Fragment stage depth output, `float1`.
    FragDepth,
    /// Compute stage global invocation id, `uint3`.
    GlobalInvocationId,
    /// Compute stage local invocation id, `uint3`.
    LocalInvocationId,
}

impl BuiltinValue {
    pub fn ty(self) -> KslType {
        match self {
            Self::Position | Self::FragCoord => KslType::FLOAT4,
            Self::VertexIndex | Self::InstanceIndex => KslType::INT1,
            Self::FragDepth => KslType::FLOAT1,
            Self::GlobalInvocationId | Self::LocalInvocationId => KslType::UINT3,
        }
    }

    /// The only stage this built-in exists in.
    pub fn stage(self) -> StageKind {
        match self {
            Self::Position | Self::VertexIndex | Self::InstanceIndex => StageKind::Vertex,
            Self::FragCoord | Self::FragDepth => StageKind::Fragment,
            Self::GlobalInvocationId | Self::LocalInvocationId => StageKind::Compute,
        }
    }

    /// Output built-ins are written by the shader.
    pub fn is_output(self) -> bool {
        matches!(self, Self::Position | Self::FragDepth)
    }
}

/// Where a variable lives and who may write it.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum VariableKind {
    /// A function-local variable declared in some scope.
    Local,
    /// A program-wide uniform, read-only to every stage.
    Uniform,
    /// A stage input at the given location.
    StageInput { location: u32 },
    /// A stage output at the given location.
    StageOutput { location: u32 },
    /// A stage built-in.
    Builtin(BuiltinValue),
}

/// A named piece of program state.
#[derive(Clone, Debug)]
pub struct Variable {
    pub name: String,
    pub ty: KslType,
    pub kind: VariableKind,
    /// The stage a stage-bound variable belongs to (`None` for uniforms).
    pub stage: Option<StageKind>,
    /// The declaring scope of a local variable.
    pub scope: Option<Handle<Scope>>,
    pub(crate) mutations: u32,
}

impl Variable {
    /// Returns `true` if statements may assign to this variable.
    pub fn is_mutable(&self) -> bool {
        match self.kind {
            VariableKind::Local | VariableKind::StageOutput { .. } => true,
            VariableKind::Builtin(b) => b.is_output(),
            VariableKind::Uniform | VariableKind::StageInput { .. } => false,
        }
    }

    /// How many assignments to this variable have been built so far.
    pub fn mutations(&self) -> u32 {
        self.mutations
    }
}

/// One mutable variable together with the mutation count observed for it.
///
/// Equality and hashing consider only the variable, so a set of states
/// holds at most one entry per variable.
#[derive(Clone, Copy, Debug)]
pub struct MutatedState {
    pub variable: Handle<Variable>,
    pub mutation: u32,
}

impl PartialEq for MutatedState {
    fn eq(&self, other: &Self) -> bool {
        self.variable == other.variable
    }
}

impl Eq for MutatedState {}

impl std::hash::Hash for MutatedState {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.variable.hash(state);
    }
}

/// A set of [`MutatedState`]s keyed by variable.
///
/// Iteration is ordered by variable handle so anything derived from a
/// dependency set is deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencySet {
    states: BTreeMap<Handle<Variable>, MutatedState>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `state`, replacing any earlier entry for the same variable.
    pub fn insert(&mut self, state: MutatedState) {
        self.states.insert(state.variable, state);
    }

    /// Merges `other` into `self`; entries of `other` win on conflicts.
    pub fn extend(&mut self, other: &DependencySet) {
        for state in other.iter() {
            self.insert(*state);
        }
    }

    pub fn contains(&self, variable: Handle<Variable>) -> bool {
        self.states.contains_key(&variable)
    }

    pub fn get(&self, variable: Handle<Variable>) -> Option<&MutatedState> {
        self.states.get(&variable)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MutatedState> {
        self.states.values()
    }

    /// The variables in this set, in handle order.
    pub fn variables(&self) -> impl Iterator<Item = Handle<Variable>> + '_ {
        self.states.keys().copied()
    }

    /// States whose variable has been assigned again since they were recorded.
    pub fn stale(&self, program: &Program) -> Vec<MutatedState> {
        self.iter()
            .filter(|s| program.variable(s.variable).mutations > s.mutation)
            .copied()
            .collect()
    }

    /// States whose variable is at a later mutation in `current`, for callers
    /// replaying statements in order instead of asking the finished program.
    pub fn stale_in(&self, current: &DependencySet) -> Vec<MutatedState> {
        self.iter()
            .filter(|s| current.get(s.variable).is_some_and(|c| c.mutation > s.mutation))
            .copied()
            .collect()
    }
}

impl FromIterator<MutatedState> for DependencySet {
    fn from_iter<I: IntoIterator<Item = MutatedState>>(iter: I) -> Self {
        let mut set = Self::new();
        for state in iter {
            set.insert(state);
        }
        set
    }
}
