//! Finalization: whole-program checks and the frozen program wrapper.

use std::ops::Deref;

use crate::IrError;
use crate::Program;
use crate::arena::Handle;
use crate::block::BlockInput;
use crate::expr::{Expression, ExpressionKind};
use crate::state::{Variable, VariableKind};
use crate::stmt::{Scope, StageKind, StatementKind};

/// A program that passed [`Program::check`] and can no longer be modified.
///
/// Backends only accept this type, so everything they see is complete.
#[derive(Clone, Debug)]
pub struct ValidatedProgram {
    program: Program,
}

impl ValidatedProgram {
    /// Gives the program back for further editing; it must be frozen again
    /// before generating code.
    pub fn into_inner(self) -> Program {
        self.program
    }
}

impl Deref for ValidatedProgram {
    type Target = Program;

    fn deref(&self) -> &Program {
        &self.program
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl Program {
    /// Checks that the program is complete and can be generated.
    ///
    /// Input bindings are checked for cycles first. Scopes are then walked in
    /// statement order, so the first failing block input or variable read is
    /// the one that appears first in the program.
    pub fn check(&self) -> Result<(), IrError> {
        let mut marks = vec![Mark::Unvisited; self.inputs.len()];
        for (input, _) in self.inputs.iter() {
            self.check_cycles(input, &mut marks)?;
        }

        for stage in self.stages() {
            if stage.kind == StageKind::Compute {
                let size = stage.workgroup_size.unwrap_or([0; 3]);
                if size.contains(&0) {
                    return Err(IrError::InvalidWorkgroupSize(size));
                }
            }
            self.check_scope(stage.main, &mut Vec::new())?;
        }

        for (_, block) in self.blocks.iter() {
            for &output in block.outputs() {
                let var = self.variable(output);
                if var.mutations() == 0 {
                    log::warn!(
                        "output {} of block {} is never assigned",
                        var.name,
                        block.name()
                    );
                }
            }
        }
        Ok(())
    }

    /// `visible` holds the locals declared so far on the path to `scope`.
    fn check_scope(
        &self,
        scope: Handle<Scope>,
        visible: &mut Vec<Handle<Variable>>,
    ) -> Result<(), IrError> {
        let outer = visible.len();
        for &stmt in self.scope(scope).statements() {
            let before = visible.len();
            match self.statement(stmt).kind {
                StatementKind::Declare { variable, init } => {
                    if let Some(init) = init {
                        self.check_reads(init, scope, visible)?;
                    }
                    visible.push(variable);
                }
                StatementKind::Assign { target, value } => {
                    self.check_reads(target, scope, visible)?;
                    self.check_reads(value, scope, visible)?;
                }
                StatementKind::If { condition, .. } => {
                    self.check_reads(condition, scope, visible)?;
                }
                StatementKind::Loop {
                    counter, start, end, ..
                } => {
                    self.check_reads(start, scope, visible)?;
                    self.check_reads(end, scope, visible)?;
                    visible.push(counter);
                }
                StatementKind::Block(block) => {
                    let block = self.block(block);
                    for &input in block.inputs() {
                        let slot = self.input(input);
                        let Some(value) = slot.value() else {
                            return Err(IrError::UnboundInput {
                                input: slot.name().to_owned(),
                                block: block.name().to_owned(),
                            });
                        };
                        self.check_reads(value, scope, visible)?;
                    }
                }
                StatementKind::StorageStore {
                    storage,
                    coord,
                    value,
                } => {
                    self.check_reads(storage, scope, visible)?;
                    self.check_reads(coord, scope, visible)?;
                    self.check_reads(value, scope, visible)?;
                }
            }
            for child in self.child_scopes(stmt) {
                self.check_scope(child, visible)?;
            }
            if matches!(self.statement(stmt).kind, StatementKind::Loop { .. }) {
                visible.truncate(before);
            }
        }
        visible.truncate(outer);
        Ok(())
    }

    /// Checks that every variable `expr` reads belongs to the stage of `scope`
    /// and, for locals, is declared on the path to it. Bound block inputs are
    /// followed, since their value is rendered where the input is read.
    fn check_reads(
        &self,
        expr: Handle<Expression>,
        scope: Handle<Scope>,
        visible: &[Handle<Variable>],
    ) -> Result<(), IrError> {
        match self.expression(expr).kind {
            ExpressionKind::Variable(v) => {
                let var = self.variable(v);
                let used_in = self.scope(scope).stage;
                if let Some(owner) = var.stage {
                    if owner != used_in {
                        return Err(IrError::WrongStage {
                            variable: var.name.clone(),
                            owner,
                            used_in,
                        });
                    }
                }
                if var.kind == VariableKind::Local && !visible.contains(&v) {
                    return Err(IrError::OutOfScope {
                        variable: var.name.clone(),
                        scope: self.scope(scope).name.clone(),
                    });
                }
                Ok(())
            }
            ExpressionKind::BlockInput(input) => {
                let slot = self.input(input);
                match slot.value() {
                    Some(value) => self.check_reads(value, scope, visible),
                    None => Err(IrError::UnboundInput {
                        input: slot.name().to_owned(),
                        block: self.block(slot.block()).name().to_owned(),
                    }),
                }
            }
            _ => self
                .expression(expr)
                .operands()
                .into_iter()
                .try_for_each(|operand| self.check_reads(operand, scope, visible)),
        }
    }

    /// Depth-first search over "input is bound to an expression reading
    /// input" edges.
    fn check_cycles(&self, input: Handle<BlockInput>, marks: &mut [Mark]) -> Result<(), IrError> {
        match marks[input.index()] {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                let slot = self.input(input);
                return Err(IrError::CyclicInput {
                    input: slot.name().to_owned(),
                    block: self.block(slot.block()).name().to_owned(),
                });
            }
            Mark::Unvisited => {}
        }
        marks[input.index()] = Mark::InProgress;
        if let Some(value) = self.input(input).value() {
            let mut referenced = Vec::new();
            self.referenced_inputs(value, &mut referenced);
            for next in referenced {
                self.check_cycles(next, marks)?;
            }
        }
        marks[input.index()] = Mark::Done;
        Ok(())
    }

    fn referenced_inputs(&self, expr: Handle<Expression>, out: &mut Vec<Handle<BlockInput>>) {
        let node = self.expression(expr);
        if let ExpressionKind::BlockInput(input) = node.kind {
            if !out.contains(&input) {
                out.push(input);
            }
            return;
        }
        for operand in node.operands() {
            self.referenced_inputs(operand, out);
        }
    }

    /// Runs [`Program::check`] and freezes the program.
    pub fn freeze(self) -> Result<ValidatedProgram, IrError> {
        self.check()?;
        log::debug!(
            "froze program {}: {} expressions, {} statements, {} blocks",
            self.name(),
            self.expressions.len(),
            self.statements.len(),
            self.blocks.len()
        );
        Ok(ValidatedProgram { program: self })
    }
}
