//! The program builder: owns every node and enforces typing on construction.

use crate::IrError;
use crate::arena::{Arena, Handle};
use crate::block::{Block, BlockInput};
use crate::expr::{
    BinaryOp, BuiltinFunction, Expression, ExpressionKind, Literal, SwizzleComponent, UnaryOp,
};
use crate::state::{BuiltinValue, DependencySet, MutatedState, Variable, VariableKind};
use crate::stmt::{Scope, Stage, StageKind, Statement, StatementKind};
use crate::types::{KslType, ScalarKind, StorageType};

/// A shader program under construction.
///
/// Nodes are appended to per-kind arenas and referenced by [`Handle`]s. The
/// arenas are private: every mutation goes through a builder method so
/// typing and dependency bookkeeping cannot be bypassed. Call
/// [`Program::freeze`] once construction is complete.
#[derive(Clone, Debug)]
pub struct Program {
    name: String,
    pub(crate) variables: Arena<Variable>,
    pub(crate) expressions: Arena<Expression>,
    pub(crate) statements: Arena<Statement>,
    pub(crate) scopes: Arena<Scope>,
    pub(crate) blocks: Arena<Block>,
    pub(crate) inputs: Arena<BlockInput>,
    uniforms: Vec<Handle<Variable>>,
    stages: Vec<Stage>,
    name_counter: u32,
}

/// The scopes created by [`Program::add_if`].
#[derive(Clone, Copy, Debug)]
pub struct Branch {
    pub statement: Handle<Statement>,
    pub accept: Handle<Scope>,
    pub reject: Handle<Scope>,
}

/// Which directions a storage texture is accessed in.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StorageUsage {
    pub loads: bool,
    pub stores: bool,
}

/// The scope and counter created by [`Program::add_loop`].
#[derive(Clone, Copy, Debug)]
pub struct Loop {
    pub statement: Handle<Statement>,
    pub body: Handle<Scope>,
    pub counter: Handle<Variable>,
}

impl Program {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: Arena::new(),
            expressions: Arena::new(),
            statements: Arena::new(),
            scopes: Arena::new(),
            blocks: Arena::new(),
            inputs: Arena::new(),
            uniforms: Vec::new(),
            stages: Vec::new(),
            name_counter: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a program-unique name of the form `"{prefix}_{n}"`.
    pub fn next_name(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}_{}", self.name_counter);
        self.name_counter += 1;
        name
    }

    // -----------------------------------------------------------------------
    // Read access
    //
    // Handles come from the builder of this program; the accessors index
    // directly and panic on a handle from another program.
    // -----------------------------------------------------------------------

    pub fn variable(&self, handle: Handle<Variable>) -> &Variable {
        &self.variables[handle]
    }

    pub fn expression(&self, handle: Handle<Expression>) -> &Expression {
        &self.expressions[handle]
    }

    pub fn statement(&self, handle: Handle<Statement>) -> &Statement {
        &self.statements[handle]
    }

    pub fn scope(&self, handle: Handle<Scope>) -> &Scope {
        &self.scopes[handle]
    }

    pub fn block(&self, handle: Handle<Block>) -> &Block {
        &self.blocks[handle]
    }

    pub fn input(&self, handle: Handle<BlockInput>) -> &BlockInput {
        &self.inputs[handle]
    }

    pub fn variables(&self) -> &Arena<Variable> {
        &self.variables
    }

    pub fn expressions(&self) -> &Arena<Expression> {
        &self.expressions
    }

    pub fn statements(&self) -> &Arena<Statement> {
        &self.statements
    }

    pub fn blocks(&self) -> &Arena<Block> {
        &self.blocks
    }

    pub fn uniforms(&self) -> &[Handle<Variable>] {
        &self.uniforms
    }

    /// Stages in the order they were added.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage(&self, kind: StageKind) -> Option<&Stage> {
        self.stages.iter().find(|s| s.kind == kind)
    }

    fn stage_mut(&mut self, kind: StageKind) -> Result<&mut Stage, IrError> {
        self.stages
            .iter_mut()
            .find(|s| s.kind == kind)
            .ok_or(IrError::MissingStage(kind))
    }

    /// The main scope of a stage.
    pub fn stage_main(&self, kind: StageKind) -> Result<Handle<Scope>, IrError> {
        self.stage(kind)
            .map(|s| s.main)
            .ok_or(IrError::MissingStage(kind))
    }

    /// Scopes nested directly under a statement.
    pub fn child_scopes(&self, statement: Handle<Statement>) -> Vec<Handle<Scope>> {
        match &self.statements[statement].kind {
            StatementKind::If { accept, reject, .. } => vec![*accept, *reject],
            StatementKind::Loop { body, .. } => vec![*body],
            StatementKind::Block(block) => vec![self.blocks[*block].body()],
            StatementKind::Declare { .. }
            | StatementKind::Assign { .. }
            | StatementKind::StorageStore { .. } => Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Stages and interface variables
    // -----------------------------------------------------------------------

    /// Adds a vertex or fragment stage and returns its main scope.
    pub fn add_stage(&mut self, kind: StageKind) -> Result<Handle<Scope>, IrError> {
        if kind == StageKind::Compute {
            return self.add_compute_stage([1, 1, 1]);
        }
        self.push_stage(kind, None)
    }

    /// Adds the compute stage with the given workgroup size.
    pub fn add_compute_stage(
        &mut self,
        workgroup_size: [u32; 3],
    ) -> Result<Handle<Scope>, IrError> {
        if workgroup_size.contains(&0) {
            return Err(IrError::InvalidWorkgroupSize(workgroup_size));
        }
        self.push_stage(StageKind::Compute, Some(workgroup_size))
    }

    fn push_stage(
        &mut self,
        kind: StageKind,
        workgroup_size: Option<[u32; 3]>,
    ) -> Result<Handle<Scope>, IrError> {
        if self.stage(kind).is_some() {
            return Err(IrError::DuplicateStage(kind));
        }
        let main = self.scopes.append(Scope {
            name: format!("{kind}Main"),
            stage: kind,
            parent: None,
            owner: None,
            statements: Vec::new(),
        });
        self.stages.push(Stage {
            kind,
            main,
            inputs: Vec::new(),
            outputs: Vec::new(),
            builtins: Vec::new(),
            workgroup_size,
        });
        Ok(main)
    }

    /// Declares a program-wide uniform. The name is used verbatim.
    pub fn uniform(&mut self, name: &str, ty: KslType) -> Result<Handle<Variable>, IrError> {
        if ty == KslType::Void {
            return Err(IrError::UnsupportedType("void uniform".into()));
        }
        let var = self.variables.append(Variable {
            name: name.to_owned(),
            ty,
            kind: VariableKind::Uniform,
            stage: None,
            scope: None,
            mutations: 0,
        });
        self.uniforms.push(var);
        Ok(var)
    }

    /// Declares the next location-bound input of a stage.
    pub fn stage_input(
        &mut self,
        stage: StageKind,
        name: &str,
        ty: KslType,
    ) -> Result<Handle<Variable>, IrError> {
        check_interface_type(ty)?;
        let location = self.stage_mut(stage)?.inputs.len() as u32;
        let var = self.variables.append(Variable {
            name: name.to_owned(),
            ty,
            kind: VariableKind::StageInput { location },
            stage: Some(stage),
            scope: None,
            mutations: 0,
        });
        self.stage_mut(stage)?.inputs.push(var);
        Ok(var)
    }

    /// Declares the next location-bound output of a stage.
    pub fn stage_output(
        &mut self,
        stage: StageKind,
        name: &str,
        ty: KslType,
    ) -> Result<Handle<Variable>, IrError> {
        check_interface_type(ty)?;
        let location = self.stage_mut(stage)?.outputs.len() as u32;
        let var = self.variables.append(Variable {
            name: name.to_owned(),
            ty,
            kind: VariableKind::StageOutput { location },
            stage: Some(stage),
            scope: None,
            mutations: 0,
        });
        self.stage_mut(stage)?.outputs.push(var);
        Ok(var)
    }

    /// Returns the variable for a stage built-in, creating it on first use.
    pub fn builtin(&mut self, value: BuiltinValue) -> Result<Handle<Variable>, IrError> {
        let stage = value.stage();
        let used = &self.stage(stage).ok_or(IrError::MissingStage(stage))?.builtins;
        if let Some(existing) = used.iter().copied().find(|v| {
            matches!(self.variables[*v].kind, VariableKind::Builtin(b) if b == value)
        }) {
            return Ok(existing);
        }
        let var = self.variables.append(Variable {
            name: format!("{value}"),
            ty: value.ty(),
            kind: VariableKind::Builtin(value),
            stage: Some(stage),
            scope: None,
            mutations: 0,
        });
        self.stage_mut(stage)?.builtins.push(var);
        Ok(var)
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn expr(&self, handle: Handle<Expression>) -> Result<&Expression, IrError> {
        self.expressions.check(handle)?;
        Ok(&self.expressions[handle])
    }

    pub(crate) fn push_expression(
        &mut self,
        kind: ExpressionKind,
        ty: KslType,
    ) -> Handle<Expression> {
        let mut vars: Vec<Handle<Variable>> = Vec::new();
        // block inputs contribute nothing here; the owning block tracks the bound value
        if let ExpressionKind::Variable(v) = &kind {
            if self.variables[*v].is_mutable() {
                vars.push(*v);
            }
        }
        for operand in kind.operands() {
            vars.extend_from_slice(&self.expressions[operand].state_vars);
        }
        vars.sort();
        vars.dedup();
        self.expressions.append(Expression {
            kind,
            ty,
            state_vars: vars.into_boxed_slice(),
        })
    }

    pub fn literal(&mut self, literal: Literal) -> Handle<Expression> {
        self.push_expression(ExpressionKind::Literal(literal), literal.ty())
    }

    pub fn float1(&mut self, value: f32) -> Handle<Expression> {
        self.literal(Literal::Float(value))
    }

    pub fn int1(&mut self, value: i32) -> Handle<Expression> {
        self.literal(Literal::Int(value))
    }

    pub fn uint1(&mut self, value: u32) -> Handle<Expression> {
        self.literal(Literal::Uint(value))
    }

    pub fn bool1(&mut self, value: bool) -> Handle<Expression> {
        self.literal(Literal::Bool(value))
    }

    /// An expression reading `variable`.
    pub fn var(&mut self, variable: Handle<Variable>) -> Result<Handle<Expression>, IrError> {
        self.variables.check(variable)?;
        let ty = self.variables[variable].ty;
        Ok(self.push_expression(ExpressionKind::Variable(variable), ty))
    }

    /// Constructs a vector or matrix from components whose scalar counts add
    /// up to the target, or splats a single scalar into a vector.
    pub fn compose(
        &mut self,
        ty: KslType,
        components: &[Handle<Expression>],
    ) -> Result<Handle<Expression>, IrError> {
        let (Some(target_kind), Some(target_count)) = (ty.scalar_kind(), ty.component_count())
        else {
            return Err(IrError::UnsupportedType(format!("constructing {ty}")));
        };
        let mut count = 0;
        let mut found = Vec::with_capacity(components.len());
        for &c in components {
            let cty = self.expr(c)?.ty;
            found.push(cty.to_string());
            if cty.is_matrix() || cty.scalar_kind() != Some(target_kind) {
                return Err(IrError::mismatch(
                    format!("{target_kind:?} components for {ty}"),
                    cty,
                ));
            }
            count += cty.component_count().unwrap_or(0);
        }
        let splat = ty.is_vector() && components.len() == 1 && count == 1;
        if count != target_count && !splat {
            return Err(IrError::mismatch(
                format!("{target_count} components for {ty}"),
                format!("({})", found.join(", ")),
            ));
        }
        Ok(self.push_expression(
            ExpressionKind::Compose {
                components: components.to_vec(),
            },
            ty,
        ))
    }

    pub fn unary(
        &mut self,
        op: UnaryOp,
        expr: Handle<Expression>,
    ) -> Result<Handle<Expression>, IrError> {
        let ty = op.result_type(self.expr(expr)?.ty)?;
        Ok(self.push_expression(ExpressionKind::Unary { op, expr }, ty))
    }

    pub fn binary(
        &mut self,
        op: BinaryOp,
        left: Handle<Expression>,
        right: Handle<Expression>,
    ) -> Result<Handle<Expression>, IrError> {
        let ty = op.result_type(self.expr(left)?.ty, self.expr(right)?.ty)?;
        Ok(self.push_expression(ExpressionKind::Binary { op, left, right }, ty))
    }

    /// Selects vector components by a pattern such as `"xyz"` or `"rg"`.
    pub fn swizzle(
        &mut self,
        vector: Handle<Expression>,
        pattern: &str,
    ) -> Result<Handle<Expression>, IrError> {
        let vty = self.expr(vector)?.ty;
        let (Some(size), Some(scalar)) = (vty.vector_size(), vty.scalar_kind()) else {
            return Err(IrError::mismatch("vector", vty));
        };
        let pattern = SwizzleComponent::parse(pattern)?;
        if let Some(c) = pattern.iter().find(|c| **c as usize >= size.dimens()) {
            return Err(IrError::InvalidSwizzle(format!(
                "component {c:?} out of range for {vty}"
            )));
        }
        let ty = KslType::with_dimens(scalar, pattern.len())
            .ok_or_else(|| IrError::InvalidSwizzle(format!("{} components", pattern.len())))?;
        Ok(self.push_expression(ExpressionKind::Swizzle { vector, pattern }, ty))
    }

    /// Column `index` of `matrix`. The result has the matrix's column type.
    pub fn matrix_column(
        &mut self,
        matrix: Handle<Expression>,
        index: Handle<Expression>,
    ) -> Result<Handle<Expression>, IrError> {
        let mty = self.expr(matrix)?.ty;
        let column = mty
            .matrix_column()
            .ok_or_else(|| IrError::mismatch("matrix", mty))?;
        self.check_index(index)?;
        Ok(self.push_expression(ExpressionKind::MatrixColumn { matrix, index }, column))
    }

    /// Column `column` of `matrix`, with the index wrapped in a literal.
    pub fn matrix_column_const(
        &mut self,
        matrix: Handle<Expression>,
        column: i32,
    ) -> Result<Handle<Expression>, IrError> {
        let index = self.int1(column);
        self.matrix_column(matrix, index)
    }

    /// Element `index` of `array`.
    pub fn array_element(
        &mut self,
        array: Handle<Expression>,
        index: Handle<Expression>,
    ) -> Result<Handle<Expression>, IrError> {
        let aty = self.expr(array)?.ty;
        let (elem, _) = aty
            .array_element()
            .ok_or_else(|| IrError::mismatch("array", aty))?;
        self.check_index(index)?;
        Ok(self.push_expression(ExpressionKind::ArrayElement { array, index }, elem))
    }

    pub fn array_element_const(
        &mut self,
        array: Handle<Expression>,
        element: i32,
    ) -> Result<Handle<Expression>, IrError> {
        let index = self.int1(element);
        self.array_element(array, index)
    }

    fn check_index(&self, index: Handle<Expression>) -> Result<(), IrError> {
        let ity = self.expr(index)?.ty;
        if ity == KslType::INT1 {
            Ok(())
        } else {
            Err(IrError::mismatch(KslType::INT1, ity))
        }
    }

    pub fn builtin_call(
        &mut self,
        fun: BuiltinFunction,
        args: &[Handle<Expression>],
    ) -> Result<Handle<Expression>, IrError> {
        let types = args
            .iter()
            .map(|a| self.expr(*a).map(|e| e.ty))
            .collect::<Result<Vec<_>, _>>()?;
        let ty = fun.result_type(&types)?;
        Ok(self.push_expression(
            ExpressionKind::Builtin {
                fun,
                args: args.to_vec(),
            },
            ty,
        ))
    }

    /// Converts a scalar or vector to another scalar kind of the same dimension.
    pub fn convert(
        &mut self,
        expr: Handle<Expression>,
        to: ScalarKind,
    ) -> Result<Handle<Expression>, IrError> {
        let from = self.expr(expr)?.ty;
        let dimens = match from {
            KslType::Scalar(_) => 1,
            KslType::Vector { size, .. } => size.dimens(),
            other => return Err(IrError::mismatch("scalar or vector", other)),
        };
        let ty = KslType::with_dimens(to, dimens)
            .ok_or_else(|| IrError::UnsupportedType(format!("converting {from}")))?;
        Ok(self.push_expression(ExpressionKind::Convert { expr }, ty))
    }

    /// Samples `sampler` at `coord`.
    pub fn sample(
        &mut self,
        sampler: Handle<Expression>,
        coord: Handle<Expression>,
    ) -> Result<Handle<Expression>, IrError> {
        let sty = self.expr(sampler)?.ty;
        let KslType::Sampler(sampler_ty) = sty else {
            return Err(IrError::mismatch("sampler", sty));
        };
        let cty = self.expr(coord)?.ty;
        if cty != sampler_ty.coord_type() {
            return Err(IrError::mismatch(sampler_ty.coord_type(), cty));
        }
        Ok(self.push_expression(
            ExpressionKind::Sample { sampler, coord },
            sampler_ty.sample_type(),
        ))
    }

    /// Loads the texel of a storage texture at an integer coordinate.
    pub fn storage_load(
        &mut self,
        storage: Handle<Expression>,
        coord: Handle<Expression>,
    ) -> Result<Handle<Expression>, IrError> {
        let storage_ty = self.storage_operand(storage, coord)?;
        Ok(self.push_expression(
            ExpressionKind::StorageLoad { storage, coord },
            storage_ty.texel_type(),
        ))
    }

    fn storage_operand(
        &self,
        storage: Handle<Expression>,
        coord: Handle<Expression>,
    ) -> Result<StorageType, IrError> {
        let sty = self.expr(storage)?.ty;
        let KslType::Storage(storage_ty) = sty else {
            return Err(IrError::mismatch("storage texture", sty));
        };
        let cty = self.expr(coord)?.ty;
        if cty != storage_ty.coord_type() {
            return Err(IrError::mismatch(storage_ty.coord_type(), cty));
        }
        Ok(storage_ty)
    }

    /// How the program accesses the storage uniform `variable`.
    pub fn storage_usage(&self, variable: Handle<Variable>) -> StorageUsage {
        let is_var = |expr: Handle<Expression>| {
            matches!(self.expressions[expr].kind, ExpressionKind::Variable(v) if v == variable)
        };
        let loads = self.expressions.iter().any(|(_, e)| {
            matches!(e.kind, ExpressionKind::StorageLoad { storage, .. } if is_var(storage))
        });
        let stores = self.statements.iter().any(|(_, s)| {
            matches!(s.kind, StatementKind::StorageStore { storage, .. } if is_var(storage))
        });
        StorageUsage { loads, stores }
    }

    // -----------------------------------------------------------------------
    // Dependencies
    // -----------------------------------------------------------------------

    /// The mutable state the current value of `expr` depends on, stamped
    /// with each variable's current mutation count.
    ///
    /// # Panics
    ///
    /// Panics if `expr` was not created by this program.
    pub fn collect_state_dependencies(&self, expr: Handle<Expression>) -> DependencySet {
        self.expressions[expr]
            .state_vars
            .iter()
            .map(|&variable| MutatedState {
                variable,
                mutation: self.variables[variable].mutations,
            })
            .collect()
    }

    /// The variable an assignment through `expr` mutates.
    ///
    /// Column, element and swizzle views resolve to the variable backing the
    /// whole value: writing `m[k]` mutates `m`.
    ///
    /// # Panics
    ///
    /// Panics if `expr` was not created by this program.
    pub fn mutating_state(&self, expr: Handle<Expression>) -> Option<Handle<Variable>> {
        match &self.expressions[expr].kind {
            ExpressionKind::Variable(v) => self.variables[*v].is_mutable().then_some(*v),
            ExpressionKind::MatrixColumn { matrix, .. } => self.mutating_state(*matrix),
            ExpressionKind::ArrayElement { array, .. } => self.mutating_state(*array),
            ExpressionKind::Swizzle { vector, pattern } => {
                let mut seen = pattern.clone();
                seen.sort();
                seen.dedup();
                if seen.len() == pattern.len() {
                    self.mutating_state(*vector)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Reads performed by the target side of an assignment (index operands).
    fn target_dependencies(&self, target: Handle<Expression>) -> DependencySet {
        match &self.expressions[target].kind {
            ExpressionKind::MatrixColumn {
                matrix: base,
                index,
            }
            | ExpressionKind::ArrayElement { array: base, index } => {
                let mut deps = self.target_dependencies(*base);
                deps.extend(&self.collect_state_dependencies(*index));
                deps
            }
            ExpressionKind::Swizzle { vector, .. } => self.target_dependencies(*vector),
            _ => DependencySet::new(),
        }
    }

    /// All mutations recorded by statements in `scope` and its nested scopes.
    pub fn scope_mutations(&self, scope: Handle<Scope>) -> DependencySet {
        let mut out = DependencySet::new();
        for &stmt in &self.scopes[scope].statements {
            for state in &self.statements[stmt].mutations {
                out.insert(*state);
            }
            for child in self.child_scopes(stmt) {
                out.extend(&self.scope_mutations(child));
            }
        }
        out
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    pub(crate) fn push_statement(
        &mut self,
        scope: Handle<Scope>,
        kind: StatementKind,
        dependencies: DependencySet,
        mutations: Vec<MutatedState>,
    ) -> Handle<Statement> {
        let stmt = self.statements.append(Statement {
            kind,
            scope,
            dependencies,
            mutations,
        });
        self.scopes[scope].statements.push(stmt);
        stmt
    }

    pub(crate) fn new_scope(
        &mut self,
        name: String,
        parent: Handle<Scope>,
        owner: Handle<Statement>,
    ) -> Handle<Scope> {
        let stage = self.scopes[parent].stage;
        self.scopes.append(Scope {
            name,
            stage,
            parent: Some(parent),
            owner: Some(owner),
            statements: Vec::new(),
        })
    }

    pub(crate) fn new_local(
        &mut self,
        scope: Handle<Scope>,
        name: String,
        ty: KslType,
    ) -> Result<Handle<Variable>, IrError> {
        if ty.value_type().is_none() && !ty.is_array() {
            return Err(IrError::UnsupportedType(format!("local variable of type {ty}")));
        }
        let stage = self.scopes[scope].stage;
        Ok(self.variables.append(Variable {
            name,
            ty,
            kind: VariableKind::Local,
            stage: Some(stage),
            scope: Some(scope),
            mutations: 0,
        }))
    }

    /// Declares a local variable named `next_name(prefix)` in `scope`.
    pub fn declare(
        &mut self,
        scope: Handle<Scope>,
        prefix: &str,
        ty: KslType,
        init: Option<Handle<Expression>>,
    ) -> Result<Handle<Variable>, IrError> {
        self.scopes.check(scope)?;
        if let Some(init) = init {
            let ity = self.expr(init)?.ty;
            if ity != ty {
                return Err(IrError::mismatch(ty, ity));
            }
        }
        let name = self.next_name(prefix);
        let variable = self.new_local(scope, name, ty)?;
        let deps = init
            .map(|e| self.collect_state_dependencies(e))
            .unwrap_or_default();
        let declared = MutatedState {
            variable,
            mutation: 0,
        };
        self.push_statement(
            scope,
            StatementKind::Declare { variable, init },
            deps,
            vec![declared],
        );
        Ok(variable)
    }

    /// Appends `target = value` to `scope`.
    pub fn assign(
        &mut self,
        scope: Handle<Scope>,
        target: Handle<Expression>,
        value: Handle<Expression>,
    ) -> Result<Handle<Statement>, IrError> {
        self.scopes.check(scope)?;
        let tty = self.expr(target)?.ty;
        let vty = self.expr(value)?.ty;
        let Some(variable) = self.mutating_state(target) else {
            return Err(IrError::NotAssignable(self.to_pseudo_code(target)));
        };
        if tty != vty {
            return Err(IrError::mismatch(tty, vty));
        }
        let mut deps = self.collect_state_dependencies(value);
        deps.extend(&self.target_dependencies(target));

        let var = &mut self.variables[variable];
        var.mutations += 1;
        let mutated = MutatedState {
            variable,
            mutation: var.mutations,
        };
        Ok(self.push_statement(
            scope,
            StatementKind::Assign { target, value },
            deps,
            vec![mutated],
        ))
    }

    /// Appends a store of `value` into `storage` at `coord`.
    pub fn storage_store(
        &mut self,
        scope: Handle<Scope>,
        storage: Handle<Expression>,
        coord: Handle<Expression>,
        value: Handle<Expression>,
    ) -> Result<Handle<Statement>, IrError> {
        self.scopes.check(scope)?;
        let storage_ty = self.storage_operand(storage, coord)?;
        let vty = self.expr(value)?.ty;
        if vty != storage_ty.texel_type() {
            return Err(IrError::mismatch(storage_ty.texel_type(), vty));
        }
        let mut deps = self.collect_state_dependencies(coord);
        deps.extend(&self.collect_state_dependencies(value));
        Ok(self.push_statement(
            scope,
            StatementKind::StorageStore {
                storage,
                coord,
                value,
            },
            deps,
            Vec::new(),
        ))
    }

    /// Appends an if/else statement; fill the returned scopes afterwards.
    pub fn add_if(
        &mut self,
        scope: Handle<Scope>,
        condition: Handle<Expression>,
    ) -> Result<Branch, IrError> {
        self.scopes.check(scope)?;
        let cty = self.expr(condition)?.ty;
        if cty != KslType::BOOL1 {
            return Err(IrError::mismatch(KslType::BOOL1, cty));
        }
        let name = self.next_name("if");
        let statement = self.statements.next_handle();
        let accept = self.new_scope(format!("{name}_accept"), scope, statement);
        let reject = self.new_scope(format!("{name}_reject"), scope, statement);
        let deps = self.collect_state_dependencies(condition);
        let pushed = self.push_statement(
            scope,
            StatementKind::If {
                condition,
                accept,
                reject,
            },
            deps,
            Vec::new(),
        );
        debug_assert_eq!(pushed, statement);
        Ok(Branch {
            statement,
            accept,
            reject,
        })
    }

    /// Appends a counted loop over `start..end` (both `int1`).
    pub fn add_loop(
        &mut self,
        scope: Handle<Scope>,
        start: Handle<Expression>,
        end: Handle<Expression>,
    ) -> Result<Loop, IrError> {
        self.scopes.check(scope)?;
        self.check_index(start)?;
        self.check_index(end)?;
        let name = self.next_name("loop");
        let statement = self.statements.next_handle();
        let body = self.new_scope(format!("{name}_body"), scope, statement);
        let counter_name = self.next_name("i");
        let counter = self.new_local(body, counter_name, KslType::INT1)?;
        let mut deps = self.collect_state_dependencies(start);
        deps.extend(&self.collect_state_dependencies(end));
        let pushed = self.push_statement(
            scope,
            StatementKind::Loop {
                counter,
                start,
                end,
                body,
            },
            deps,
            vec![MutatedState {
                variable: counter,
                mutation: 0,
            }],
        );
        debug_assert_eq!(pushed, statement);
        Ok(Loop {
            statement,
            body,
            counter,
        })
    }
}

fn check_interface_type(ty: KslType) -> Result<(), IrError> {
    match ty.scalar_kind() {
        Some(kind) if kind != ScalarKind::Bool && !ty.is_matrix() => Ok(()),
        _ => Err(IrError::UnsupportedType(format!(
            "stage interface variable of type {ty}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex_program() -> (Program, Handle<Scope>) {
        let mut program = Program::new("test");
        let main = program.add_stage(StageKind::Vertex).unwrap();
        (program, main)
    }

    #[test]
    fn next_name_is_sequential() {
        let mut program = Program::new("p");
        assert_eq!(program.next_name("color"), "color_0");
        assert_eq!(program.next_name("color"), "color_1");
        assert_eq!(program.next_name("blend"), "blend_2");
    }

    #[test]
    fn duplicate_stage_rejected() {
        let (mut program, _) = vertex_program();
        assert!(matches!(
            program.add_stage(StageKind::Vertex),
            Err(IrError::DuplicateStage(StageKind::Vertex))
        ));
        assert!(matches!(
            program.add_compute_stage([0, 1, 1]),
            Err(IrError::InvalidWorkgroupSize(_))
        ));
    }

    #[test]
    fn compose_counts_components() {
        let (mut program, _) = vertex_program();
        let x = program.float1(1.0);
        let xy = program.compose(KslType::FLOAT2, &[x, x]).unwrap();
        let v4 = program.compose(KslType::FLOAT4, &[xy, x, x]).unwrap();
        assert_eq!(program.expression(v4).ty, KslType::FLOAT4);
        let splat = program.compose(KslType::FLOAT3, &[x]).unwrap();
        assert_eq!(program.expression(splat).ty, KslType::FLOAT3);

        assert!(program.compose(KslType::FLOAT3, &[xy, xy]).is_err());
        let i = program.int1(1);
        assert!(program.compose(KslType::FLOAT2, &[x, i]).is_err());
        assert!(program.compose(KslType::MAT2, &[x]).is_err());
    }

    #[test]
    fn literal_and_uniform_have_no_dependencies() {
        let (mut program, _) = vertex_program();
        let u = program.uniform("uTint", KslType::FLOAT4).unwrap();
        let read = program.var(u).unwrap();
        let lit = program.float1(2.0);
        assert!(program.collect_state_dependencies(read).is_empty());
        assert!(program.collect_state_dependencies(lit).is_empty());
    }

    #[test]
    fn dependencies_propagate_through_operators() {
        let (mut program, main) = vertex_program();
        let one = program.float1(1.0);
        let a = program.declare(main, "a", KslType::FLOAT1, Some(one)).unwrap();
        let b = program.declare(main, "b", KslType::FLOAT1, None).unwrap();
        let ra = program.var(a).unwrap();
        let rb = program.var(b).unwrap();
        let sum = program.binary(BinaryOp::Add, ra, rb).unwrap();
        let neg = program.unary(UnaryOp::Negate, sum).unwrap();
        let deps = program.collect_state_dependencies(neg);
        assert_eq!(deps.variables().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn assignment_through_matrix_column_mutates_matrix() {
        let (mut program, main) = vertex_program();
        let m = program.declare(main, "m", KslType::MAT4, None).unwrap();
        let rm = program.var(m).unwrap();
        let col = program.matrix_column_const(rm, 2).unwrap();
        assert_eq!(program.mutating_state(col), Some(m));

        let one = program.float1(1.0);
        let value = program.compose(KslType::FLOAT4, &[one]).unwrap();
        let stmt = program.assign(main, col, value).unwrap();
        assert_eq!(program.variable(m).mutations(), 1);
        assert_eq!(program.statement(stmt).mutations()[0].variable, m);
    }

    #[test]
    fn assignment_type_and_target_checks() {
        let (mut program, main) = vertex_program();
        let u = program.uniform("uScale", KslType::FLOAT1).unwrap();
        let ru = program.var(u).unwrap();
        let one = program.float1(1.0);
        assert!(matches!(
            program.assign(main, ru, one),
            Err(IrError::NotAssignable(_))
        ));

        let v = program.declare(main, "v", KslType::FLOAT3, None).unwrap();
        let rv = program.var(v).unwrap();
        assert!(matches!(
            program.assign(main, rv, one),
            Err(IrError::TypeMismatch { .. })
        ));

        let dup = program.swizzle(rv, "xx").unwrap();
        let pair = program.compose(KslType::FLOAT2, &[one]).unwrap();
        assert!(matches!(
            program.assign(main, dup, pair),
            Err(IrError::NotAssignable(_))
        ));
        let xy = program.swizzle(rv, "xy").unwrap();
        assert!(program.assign(main, xy, pair).is_ok());
    }

    #[test]
    fn stale_reads_are_detected() {
        let (mut program, main) = vertex_program();
        let zero = program.float1(0.0);
        let v = program.declare(main, "v", KslType::FLOAT1, Some(zero)).unwrap();
        let rv = program.var(v).unwrap();
        let before = program.collect_state_dependencies(rv);
        assert!(before.stale(&program).is_empty());

        let one = program.float1(1.0);
        program.assign(main, rv, one).unwrap();
        let stale = before.stale(&program);
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].variable, v);
        assert!(program.collect_state_dependencies(rv).stale(&program).is_empty());
    }

    #[test]
    fn if_and_loop_scopes() {
        let (mut program, main) = vertex_program();
        let t = program.bool1(true);
        let branch = program.add_if(main, t).unwrap();
        assert_eq!(program.scope(branch.accept).owner, Some(branch.statement));
        assert_eq!(program.scope(branch.reject).parent, Some(main));

        let start = program.int1(0);
        let end = program.int1(4);
        let lp = program.add_loop(branch.accept, start, end).unwrap();
        assert_eq!(program.variable(lp.counter).ty, KslType::INT1);
        assert_eq!(program.scope(lp.body).stage, StageKind::Vertex);

        let f = program.float1(1.0);
        assert!(program.add_if(main, f).is_err());
        assert!(program.add_loop(main, f, end).is_err());
    }

    #[test]
    fn scope_mutations_include_nested_statements() {
        let (mut program, main) = vertex_program();
        let v = program.declare(main, "v", KslType::FLOAT1, None).unwrap();
        let t = program.bool1(true);
        let branch = program.add_if(main, t).unwrap();
        let rv = program.var(v).unwrap();
        let one = program.float1(1.0);
        program.assign(branch.accept, rv, one).unwrap();
        let muts = program.scope_mutations(main);
        assert_eq!(muts.get(v).unwrap().mutation, 1);
    }

    #[test]
    fn builtins_are_deduplicated_and_stage_checked() {
        let (mut program, _) = vertex_program();
        let a = program.builtin(BuiltinValue::Position).unwrap();
        let b = program.builtin(BuiltinValue::Position).unwrap();
        assert_eq!(a, b);
        assert!(matches!(
            program.builtin(BuiltinValue::FragCoord),
            Err(IrError::MissingStage(StageKind::Fragment))
        ));
    }

    #[test]
    fn sample_checks_coordinates() {
        use crate::types::SamplerType;
        let mut program = Program::new("p");
        let main = program.add_stage(StageKind::Fragment).unwrap();
        let tex = program
            .uniform("tAlbedo", SamplerType::COLOR_2D.into())
            .unwrap();
        let rt = program.var(tex).unwrap();
        let uv_in = program
            .stage_input(StageKind::Fragment, "uv", KslType::FLOAT2)
            .unwrap();
        let uv = program.var(uv_in).unwrap();
        let color = program.sample(rt, uv).unwrap();
        assert_eq!(program.expression(color).ty, KslType::FLOAT4);
        let c = program.float1(0.0);
        assert!(program.sample(rt, c).is_err());
        let _ = main;
    }

    #[test]
    fn storage_access_checks_coordinates_and_texels() {
        use crate::types::{StorageDim, StorageType};
        let mut program = Program::new("p");
        let main = program.add_compute_stage([1, 1, 1]).unwrap();
        let storage = StorageType::new(StorageDim::D2, KslType::FLOAT1).unwrap();
        let image = program.uniform("image", storage.into()).unwrap();
        let other = program.uniform("other", storage.into()).unwrap();
        let ri = program.var(image).unwrap();
        assert_eq!(program.storage_usage(image), StorageUsage::default());

        let x = program.int1(1);
        let coord = program.compose(KslType::INT2, &[x]).unwrap();
        let texel = program.storage_load(ri, coord).unwrap();
        assert_eq!(program.expression(texel).ty, KslType::FLOAT1);
        assert!(program.storage_load(ri, x).is_err());
        let f = program.float1(0.0);
        assert!(program.storage_load(f, coord).is_err());

        let v = program.compose(KslType::FLOAT2, &[f]).unwrap();
        assert!(matches!(
            program.storage_store(main, ri, coord, v),
            Err(IrError::TypeMismatch { .. })
        ));
        let stmt = program.storage_store(main, ri, coord, texel).unwrap();
        assert!(program.child_scopes(stmt).is_empty());
        assert_eq!(
            program.storage_usage(image),
            StorageUsage {
                loads: true,
                stores: true
            }
        );
        assert_eq!(program.storage_usage(other), StorageUsage::default());
    }

    #[test]
    #[should_panic]
    fn foreign_expression_handle_panics_in_dependency_queries() {
        let (mut big, _) = vertex_program();
        for _ in 0..4 {
            big.float1(1.0);
        }
        let foreign = big.float1(2.0);
        let (small, _) = vertex_program();
        small.collect_state_dependencies(foreign);
    }

    #[test]
    #[should_panic]
    fn foreign_expression_handle_panics_in_mutating_state() {
        let (mut big, _) = vertex_program();
        let foreign = big.float1(2.0);
        let (small, _) = vertex_program();
        small.mutating_state(foreign);
    }
}
