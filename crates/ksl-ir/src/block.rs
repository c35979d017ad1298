//! Blocks: named, reusable sub-graphs with typed inputs and outputs.
//!
//! A block is a statement with its own body scope. Its inputs are
//! expression slots that can be rebound after construction; the block
//! statement's dependency set is always the union of whatever its inputs
//! are currently bound to. Outputs are ordinary local variables declared in
//! the parent scope just before the block, so code following the block can
//! read them.

use crate::IrError;
use crate::arena::Handle;
use crate::expr::{Expression, ExpressionKind};
use crate::program::Program;
use crate::state::{DependencySet, MutatedState, Variable};
use crate::stmt::{Scope, Statement, StatementKind};
use crate::types::{KslType, ScalarKind, ValueType, VectorSize};

/// A block instance.
#[derive(Clone, Debug)]
pub struct Block {
    op_name: String,
    name: String,
    statement: Handle<Statement>,
    parent: Handle<Scope>,
    body: Handle<Scope>,
    inputs: Vec<Handle<BlockInput>>,
    outputs: Vec<Handle<Variable>>,
}

impl Block {
    /// The operation name the block was created with, e.g. `"blinnPhong"`.
    pub fn op_name(&self) -> &str {
        &self.op_name
    }

    /// The program-unique instance name, e.g. `"blinnPhong_3"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn statement(&self) -> Handle<Statement> {
        self.statement
    }

    pub fn parent(&self) -> Handle<Scope> {
        self.parent
    }

    pub fn body(&self) -> Handle<Scope> {
        self.body
    }

    /// Inputs in creation order.
    pub fn inputs(&self) -> &[Handle<BlockInput>] {
        &self.inputs
    }

    /// Output variables in creation order.
    pub fn outputs(&self) -> &[Handle<Variable>] {
        &self.outputs
    }
}

/// A typed input slot of a block.
///
/// Slots are created only through [`Program::add_input`] and friends, which
/// tie them to their owning block.
#[derive(Clone, Debug)]
pub struct BlockInput {
    name: String,
    ty: KslType,
    block: Handle<Block>,
    expression: Handle<Expression>,
    value: Option<Handle<Expression>>,
    dependencies: DependencySet,
}

impl BlockInput {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> KslType {
        self.ty
    }

    /// The block owning this slot.
    pub fn block(&self) -> Handle<Block> {
        self.block
    }

    /// The expression node reading this slot, for use inside the block body.
    pub fn expression(&self) -> Handle<Expression> {
        self.expression
    }

    /// The currently bound expression, if any.
    pub fn value(&self) -> Option<Handle<Expression>> {
        self.value
    }

    /// Dependencies of the bound expression, captured when it was bound.
    pub fn dependencies(&self) -> &DependencySet {
        &self.dependencies
    }
}

/// Name suffix for an unnamed input or output of type `ty`.
fn slot_suffix(direction: &str, ty: KslType) -> String {
    fn letter(kind: ScalarKind) -> &'static str {
        match kind {
            ScalarKind::Float => "F",
            ScalarKind::Int => "I",
            ScalarKind::Uint => "U",
            ScalarKind::Bool => "B",
        }
    }
    fn value(v: ValueType) -> String {
        match v {
            ValueType::Scalar(kind) => format!("{}1", letter(kind)),
            ValueType::Vector { size, scalar } => format!("{}{}", letter(scalar), size.dimens()),
            ValueType::Matrix { size } => format!("M{}", size.dimens()),
        }
    }
    match ty {
        KslType::Array {
            elem: ValueType::Matrix { size },
            ..
        } => format!("{direction}ArrMat{}", size.dimens()),
        KslType::Array { elem, .. } => format!("{direction}Arr{}", value(elem)),
        other => match other.value_type() {
            Some(v) => format!("{direction}{}", value(v)),
            None => direction.to_owned(),
        },
    }
}

impl Program {
    /// Appends a block statement to `scope` and creates its body scope.
    pub fn add_block(
        &mut self,
        scope: Handle<Scope>,
        op_name: &str,
    ) -> Result<Handle<Block>, IrError> {
        self.scopes.check(scope)?;
        let name = self.next_name(op_name);
        let handle = self.blocks.next_handle();
        let statement = self.statements.next_handle();
        let body = self.new_scope(name.clone(), scope, statement);
        let pushed = self.push_statement(
            scope,
            StatementKind::Block(handle),
            DependencySet::new(),
            Vec::new(),
        );
        debug_assert_eq!(pushed, statement);
        log::debug!("added block {name}");
        Ok(self.blocks.append(Block {
            op_name: op_name.to_owned(),
            name,
            statement,
            parent: scope,
            body,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }))
    }

    /// Adds an input slot to `block`.
    ///
    /// Without a `name` the slot is named `next_name("{op}_{suffix}")`, where
    /// the suffix encodes the type (`inF3`, `inM4`, `inArrF1`, ...). A
    /// `default` counts as an initial binding.
    pub fn add_input(
        &mut self,
        block: Handle<Block>,
        name: Option<&str>,
        ty: KslType,
        default: Option<Handle<Expression>>,
    ) -> Result<Handle<BlockInput>, IrError> {
        self.blocks.check(block)?;
        if ty.value_type().is_none() && !ty.is_array() {
            return Err(IrError::UnsupportedType(format!("block input of type {ty}")));
        }
        if let Some(default) = default {
            self.check_bind_type(ty, default)?;
        }
        let name = match name {
            Some(name) => name.to_owned(),
            None => {
                let prefix = format!("{}_{}", self.blocks[block].op_name, slot_suffix("in", ty));
                self.next_name(&prefix)
            }
        };
        let handle = self.inputs.next_handle();
        let expression = self.push_expression(ExpressionKind::BlockInput(handle), ty);
        let appended = self.inputs.append(BlockInput {
            name,
            ty,
            block,
            expression,
            value: None,
            dependencies: DependencySet::new(),
        });
        debug_assert_eq!(appended, handle);
        self.blocks[block].inputs.push(handle);
        self.set_input(handle, default);
        Ok(handle)
    }

    pub fn in_scalar(
        &mut self,
        block: Handle<Block>,
        name: Option<&str>,
        kind: ScalarKind,
        default: Option<Handle<Expression>>,
    ) -> Result<Handle<BlockInput>, IrError> {
        self.add_input(block, name, KslType::Scalar(kind), default)
    }

    pub fn in_vector(
        &mut self,
        block: Handle<Block>,
        name: Option<&str>,
        kind: ScalarKind,
        size: VectorSize,
        default: Option<Handle<Expression>>,
    ) -> Result<Handle<BlockInput>, IrError> {
        self.add_input(block, name, KslType::vector(kind, size), default)
    }

    pub fn in_matrix(
        &mut self,
        block: Handle<Block>,
        name: Option<&str>,
        size: VectorSize,
        default: Option<Handle<Expression>>,
    ) -> Result<Handle<BlockInput>, IrError> {
        self.add_input(block, name, KslType::Matrix { size }, default)
    }

    /// An array input. Array inputs have no default and must be bound.
    pub fn in_array(
        &mut self,
        block: Handle<Block>,
        name: Option<&str>,
        elem: KslType,
        size: u32,
    ) -> Result<Handle<BlockInput>, IrError> {
        let ty = KslType::array(elem, size)?;
        self.add_input(block, name, ty, None)
    }

    /// Binds `value` to `input`, replacing any previous binding.
    pub fn bind_input(
        &mut self,
        input: Handle<BlockInput>,
        value: Handle<Expression>,
    ) -> Result<(), IrError> {
        self.inputs.check(input)?;
        self.check_bind_type(self.inputs[input].ty, value)?;
        log::debug!(
            "rebinding input {} of block {}",
            self.inputs[input].name,
            self.blocks[self.inputs[input].block].name
        );
        self.set_input(input, Some(value));
        Ok(())
    }

    /// Removes the binding of `input`. Validation fails until it is rebound.
    pub fn clear_input(&mut self, input: Handle<BlockInput>) -> Result<(), IrError> {
        self.inputs.check(input)?;
        self.set_input(input, None);
        Ok(())
    }

    /// The expression node for reading `input` inside its block's body.
    ///
    /// # Panics
    ///
    /// Panics if `input` was not created by this program.
    pub fn input_expr(&self, input: Handle<BlockInput>) -> Handle<Expression> {
        self.inputs[input].expression
    }

    fn check_bind_type(&self, ty: KslType, value: Handle<Expression>) -> Result<(), IrError> {
        self.expressions.check(value)?;
        let found = self.expressions[value].ty;
        if found == ty {
            Ok(())
        } else {
            Err(IrError::mismatch(ty, found))
        }
    }

    fn set_input(&mut self, input: Handle<BlockInput>, value: Option<Handle<Expression>>) {
        let deps = value
            .map(|v| self.collect_state_dependencies(v))
            .unwrap_or_default();
        let slot = &mut self.inputs[input];
        slot.value = value;
        slot.dependencies = deps;
        let block = slot.block;
        self.update_dependencies(block);
    }

    /// Recomputes a block's dependency set as the union of its inputs'.
    fn update_dependencies(&mut self, block: Handle<Block>) {
        let mut deps = DependencySet::new();
        for &input in &self.blocks[block].inputs {
            deps.extend(&self.inputs[input].dependencies);
        }
        log::trace!(
            "block {} now depends on {} variable(s)",
            self.blocks[block].name,
            deps.len()
        );
        let statement = self.blocks[block].statement;
        self.statements[statement].dependencies = deps;
    }

    /// Adds an output variable to `block`, declared in the block's parent
    /// scope immediately before the block statement.
    pub fn add_output(
        &mut self,
        block: Handle<Block>,
        name: Option<&str>,
        ty: KslType,
    ) -> Result<Handle<Variable>, IrError> {
        self.blocks.check(block)?;
        let suffix = match name {
            Some(name) => name.to_owned(),
            None => slot_suffix("out", ty),
        };
        let prefix = format!("{}_{suffix}", self.blocks[block].op_name);
        let var_name = self.next_name(&prefix);
        let parent = self.blocks[block].parent;
        let variable = self.new_local(parent, var_name, ty)?;

        let declare = self.statements.append(Statement {
            kind: StatementKind::Declare {
                variable,
                init: None,
            },
            scope: parent,
            dependencies: DependencySet::new(),
            mutations: vec![MutatedState {
                variable,
                mutation: 0,
            }],
        });
        let block_stmt = self.blocks[block].statement;
        let statements = &mut self.scopes[parent].statements;
        let at = statements
            .iter()
            .position(|s| *s == block_stmt)
            .unwrap_or(statements.len());
        statements.insert(at, declare);

        self.blocks[block].outputs.push(variable);
        Ok(variable)
    }

    pub fn out_scalar(
        &mut self,
        block: Handle<Block>,
        name: Option<&str>,
        kind: ScalarKind,
    ) -> Result<Handle<Variable>, IrError> {
        self.add_output(block, name, KslType::Scalar(kind))
    }

    pub fn out_vector(
        &mut self,
        block: Handle<Block>,
        name: Option<&str>,
        kind: ScalarKind,
        size: VectorSize,
    ) -> Result<Handle<Variable>, IrError> {
        self.add_output(block, name, KslType::vector(kind, size))
    }

    pub fn out_matrix(
        &mut self,
        block: Handle<Block>,
        name: Option<&str>,
        size: VectorSize,
    ) -> Result<Handle<Variable>, IrError> {
        self.add_output(block, name, KslType::Matrix { size })
    }

    /// The current dependency set of a block statement.
    ///
    /// # Panics
    ///
    /// Panics if `block` was not created by this program.
    pub fn block_dependencies(&self, block: Handle<Block>) -> &DependencySet {
        &self.statements[self.blocks[block].statement].dependencies
    }

    /// Finds the first block with operation name `op_name` in `scope` or any
    /// scope nested in it, in statement order.
    ///
    /// # Panics
    ///
    /// Panics if `scope` was not created by this program.
    pub fn find_block(&self, scope: Handle<Scope>, op_name: &str) -> Option<Handle<Block>> {
        for &stmt in &self.scopes[scope].statements {
            if let StatementKind::Block(block) = self.statements[stmt].kind {
                if self.blocks[block].op_name == op_name {
                    return Some(block);
                }
            }
            for child in self.child_scopes(stmt) {
                if let Some(found) = self.find_block(child, op_name) {
                    return Some(found);
                }
            }
        }
        None
    }
}

macro_rules! typed_slots {
    ($($input:ident, $output:ident => $ty:expr;)*) => {
        impl Program {
            $(
                pub fn $input(
                    &mut self,
                    block: Handle<Block>,
                    name: Option<&str>,
                    default: Option<Handle<Expression>>,
                ) -> Result<Handle<BlockInput>, IrError> {
                    self.add_input(block, name, $ty, default)
                }

                pub fn $output(
                    &mut self,
                    block: Handle<Block>,
                    name: Option<&str>,
                ) -> Result<Handle<Variable>, IrError> {
                    self.add_output(block, name, $ty)
                }
            )*
        }
    };
}

typed_slots! {
    in_float1, out_float1 => KslType::FLOAT1;
    in_float2, out_float2 => KslType::FLOAT2;
    in_float3, out_float3 => KslType::FLOAT3;
    in_float4, out_float4 => KslType::FLOAT4;
    in_int1, out_int1 => KslType::INT1;
    in_int2, out_int2 => KslType::INT2;
    in_int3, out_int3 => KslType::INT3;
    in_int4, out_int4 => KslType::INT4;
    in_mat2, out_mat2 => KslType::MAT2;
    in_mat3, out_mat3 => KslType::MAT3;
    in_mat4, out_mat4 => KslType::MAT4;
}
