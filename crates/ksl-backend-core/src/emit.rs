//! Shared statement emission for text backends.
//!
//! Expressions are spelled by a [`KslGenerator`]; statements differ between
//! targets only in declarations, loop headers and a few assignment forms, which
//! a [`StatementSyntax`] supplies. [`emit_scope`] walks a scope in statement
//! order and writes the result into a [`SourceWriter`].

use ksl_ir::{
    DependencySet, Expression, Handle, IrError, KslGenerator, Program, Scope, StatementKind,
    Variable,
};

use crate::{BackendError, Diagnostic};

/// An indenting line writer.
#[derive(Clone, Debug)]
pub struct SourceWriter {
    out: String,
    level: usize,
    indent: &'static str,
}

impl Default for SourceWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceWriter {
    /// Creates an empty writer indenting by four spaces.
    pub fn new() -> Self {
        Self {
            out: String::new(),
            level: 0,
            indent: "    ",
        }
    }

    /// Writes one line at the current indentation.
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.level {
                self.out.push_str(self.indent);
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    /// Writes an empty line.
    pub fn blank(&mut self) {
        self.out.push('\n');
    }

    /// Increases the indentation by one level.
    pub fn indent(&mut self) {
        self.level += 1;
    }

    /// Decreases the indentation by one level.
    pub fn dedent(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    /// Returns the written text.
    pub fn finish(self) -> String {
        self.out
    }
}

/// Target-specific statement spelling.
pub trait StatementSyntax {
    /// The expression generator for this target.
    fn generator(&self) -> &dyn KslGenerator;

    /// A local variable declaration, including the terminating `;`.
    fn declare(&self, variable: &Variable, init: Option<&str>) -> String;

    /// The opening line of a counted loop, ending in `{`.
    fn loop_header(&self, counter: &Variable, start: &str, end: &str) -> String;

    /// Writes `target = value`.
    fn assign(
        &self,
        program: &Program,
        target: Handle<Expression>,
        value: Handle<Expression>,
        out: &mut SourceWriter,
    ) -> Result<(), IrError> {
        let generator = self.generator();
        let target = program.generate_assignable(target, generator)?;
        let value = program.generate_expression(value, generator)?;
        out.line(format!("{target} = {value};"));
        Ok(())
    }
}

/// Formats a dependency set as `name@mutation` pairs for annotations.
pub fn format_dependencies(program: &Program, deps: &DependencySet) -> String {
    deps.iter()
        .map(|s| format!("{}@{}", program.variable(s.variable).name, s.mutation))
        .collect::<Vec<_>>()
        .join(", ")
}

/// State carried through one [`emit_scope`] walk of a stage.
///
/// Tracks the mutation each variable has reached at the current statement,
/// so blocks whose inputs were bound against an older state can be reported.
#[derive(Debug, Default)]
pub struct EmitContext {
    annotate: bool,
    reached: DependencySet,
    diagnostics: Vec<Diagnostic>,
}

impl EmitContext {
    /// With `annotate` set, blocks are preceded by a comment naming them and
    /// statements with dependencies by a comment listing them.
    pub fn new(annotate: bool) -> Self {
        Self {
            annotate,
            ..Self::default()
        }
    }

    /// Warnings collected so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Consumes the context, returning its warnings.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// Emits every statement of `scope` (and nested scopes) in program order.
///
/// A block whose input bindings read a variable that was assigned again
/// between binding and the block statement produces a warning in `ctx`: the
/// generated block sees the later value.
pub fn emit_scope<S: StatementSyntax + ?Sized>(
    program: &Program,
    scope: Handle<Scope>,
    syntax: &S,
    ctx: &mut EmitContext,
    out: &mut SourceWriter,
) -> Result<(), BackendError> {
    let generator = syntax.generator();
    let annotate = ctx.annotate;
    for &handle in program.scope(scope).statements() {
        let stmt = program.statement(handle);
        if annotate && !stmt.dependencies().is_empty() {
            out.line(format!(
                "// deps: {}",
                format_dependencies(program, stmt.dependencies())
            ));
        }
        match &stmt.kind {
            StatementKind::Declare { variable, init } => {
                let init = init
                    .map(|e| program.generate_expression(e, generator))
                    .transpose()?;
                out.line(syntax.declare(program.variable(*variable), init.as_deref()));
            }
            StatementKind::Assign { target, value } => {
                syntax.assign(program, *target, *value, out)?;
            }
            StatementKind::If {
                condition,
                accept,
                reject,
            } => {
                let condition = program.generate_expression(*condition, generator)?;
                out.line(format!("if ({condition}) {{"));
                out.indent();
                emit_scope(program, *accept, syntax, ctx, out)?;
                out.dedent();
                if !program.scope(*reject).statements().is_empty() {
                    out.line("} else {");
                    out.indent();
                    emit_scope(program, *reject, syntax, ctx, out)?;
                    out.dedent();
                }
                out.line("}");
            }
            StatementKind::Loop {
                counter,
                start,
                end,
                body,
            } => {
                let start = program.generate_expression(*start, generator)?;
                let end = program.generate_expression(*end, generator)?;
                out.line(syntax.loop_header(program.variable(*counter), &start, &end));
                out.indent();
                emit_scope(program, *body, syntax, ctx, out)?;
                out.dedent();
                out.line("}");
            }
            StatementKind::Block(block) => {
                let block = program.block(*block);
                for state in stmt.dependencies().stale_in(&ctx.reached) {
                    let var = program.variable(state.variable);
                    let reached = ctx.reached.get(state.variable).map_or(0, |s| s.mutation);
                    log::warn!("block {} reads stale {}", block.name(), var.name);
                    ctx.diagnostics.push(Diagnostic::stage_warning(
                        program.scope(scope).stage,
                        format!(
                            "block {} was bound to {}@{} but runs after {}@{reached}",
                            block.name(),
                            var.name,
                            state.mutation,
                            var.name
                        ),
                    ));
                }
                if annotate {
                    out.line(format!("// block {}", block.name()));
                }
                out.line("{");
                out.indent();
                emit_scope(program, block.body(), syntax, ctx, out)?;
                out.dedent();
                out.line("}");
            }
            StatementKind::StorageStore {
                storage,
                coord,
                value,
            } => {
                let ty = program.storage_type(*storage)?;
                let storage = program.generate_expression(*storage, generator)?;
                let coord = program.generate_expression(*coord, generator)?;
                let value = program.generate_expression(*value, generator)?;
                out.line(format!(
                    "{};",
                    generator.storage_store(&storage, ty, &coord, &value)
                ));
            }
        }
        for state in stmt.mutations() {
            ctx.reached.insert(*state);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ksl_ir::{BinaryOp, KslType, SamplerType, StageKind};

    struct CLike;

    impl KslGenerator for CLike {
        fn type_name(&self, ty: KslType) -> String {
            ty.to_string()
        }

        fn sample(&self, sampler: &str, _ty: SamplerType, coord: &str) -> String {
            format!("texture({sampler}, {coord})")
        }
    }

    impl StatementSyntax for CLike {
        fn generator(&self) -> &dyn KslGenerator {
            self
        }

        fn declare(&self, variable: &Variable, init: Option<&str>) -> String {
            match init {
                Some(init) => format!("{} {} = {init};", variable.ty, variable.name),
                None => format!("{} {};", variable.ty, variable.name),
            }
        }

        fn loop_header(&self, counter: &Variable, start: &str, end: &str) -> String {
            let i = &counter.name;
            format!("for (int {i} = {start}; {i} < {end}; {i}++) {{")
        }
    }

    #[test]
    fn writer_indents_non_empty_lines() {
        let mut w = SourceWriter::new();
        w.line("a {");
        w.indent();
        w.line("b;");
        w.line("");
        w.dedent();
        w.dedent();
        w.line("}");
        assert_eq!(w.finish(), "a {\n    b;\n\n}\n");
    }

    #[test]
    fn emits_nested_control_flow() {
        let mut program = Program::new("p");
        let main = program.add_stage(StageKind::Fragment).unwrap();
        let zero = program.float1(0.0);
        let acc = program.declare(main, "acc", KslType::FLOAT1, Some(zero)).unwrap();
        let start = program.int1(0);
        let end = program.int1(3);
        let lp = program.add_loop(main, start, end).unwrap();
        let racc = program.var(acc).unwrap();
        let one = program.float1(1.0);
        let sum = program.binary(BinaryOp::Add, racc, one).unwrap();
        program.assign(lp.body, racc, sum).unwrap();
        let t = program.bool1(true);
        let branch = program.add_if(main, t).unwrap();
        program.assign(branch.reject, racc, one).unwrap();

        let mut out = SourceWriter::new();
        emit_scope(&program, main, &CLike, &mut EmitContext::new(false), &mut out).unwrap();
        let expected = "\
float1 acc_0 = 0.0;
for (int i_2 = 0; i_2 < 3; i_2++) {
    acc_0 = (acc_0 + 1.0);
}
if (true) {
} else {
    acc_0 = 1.0;
}
";
        assert_eq!(out.finish(), expected);
    }

    #[test]
    fn annotations_name_blocks_and_dependencies() {
        let mut program = Program::new("p");
        let main = program.add_stage(StageKind::Fragment).unwrap();
        let v = program.declare(main, "v", KslType::FLOAT1, None).unwrap();
        let block = program.add_block(main, "copy").unwrap();
        let rv = program.var(v).unwrap();
        program.in_float1(block, Some("src"), Some(rv)).unwrap();

        let mut out = SourceWriter::new();
        let mut ctx = EmitContext::new(true);
        emit_scope(&program, main, &CLike, &mut ctx, &mut out).unwrap();
        let text = out.finish();
        assert!(text.contains("// deps: v_0@0\n// block copy_1\n{\n}\n"));
        assert!(ctx.diagnostics().is_empty());
    }

    #[test]
    fn block_reached_after_a_later_assignment_is_reported() {
        let mut program = Program::new("p");
        let main = program.add_stage(StageKind::Fragment).unwrap();
        let zero = program.float1(0.0);
        let v = program.declare(main, "v", KslType::FLOAT1, Some(zero)).unwrap();
        let t = program.bool1(true);
        let branch = program.add_if(main, t).unwrap();
        let block = program.add_block(main, "copy").unwrap();
        let rv = program.var(v).unwrap();
        program.in_float1(block, Some("src"), Some(rv)).unwrap();
        // emitted before the block, but built after the binding
        let one = program.float1(1.0);
        program.assign(branch.accept, rv, one).unwrap();

        let mut ctx = EmitContext::new(false);
        let mut out = SourceWriter::new();
        emit_scope(&program, main, &CLike, &mut ctx, &mut out).unwrap();
        let diagnostics = ctx.into_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].stage, Some(StageKind::Fragment));
        assert_eq!(
            diagnostics[0].message,
            "block copy_2 was bound to v_0@0 but runs after v_0@1"
        );
    }

    #[test]
    fn block_after_its_binding_is_not_reported() {
        let mut program = Program::new("p");
        let main = program.add_stage(StageKind::Fragment).unwrap();
        let zero = program.float1(0.0);
        let v = program.declare(main, "v", KslType::FLOAT1, Some(zero)).unwrap();
        let rv = program.var(v).unwrap();
        let one = program.float1(1.0);
        program.assign(main, rv, one).unwrap();
        let block = program.add_block(main, "copy").unwrap();
        program.in_float1(block, Some("src"), Some(rv)).unwrap();
        program.assign(main, rv, zero).unwrap();

        let mut ctx = EmitContext::new(true);
        let mut out = SourceWriter::new();
        emit_scope(&program, main, &CLike, &mut ctx, &mut out).unwrap();
        assert!(ctx.diagnostics().is_empty());
        assert!(out.finish().contains("// deps: v_0@1\n// block copy_1\n"));
    }

    #[test]
    fn storage_store_uses_generator_spelling() {
        use ksl_ir::{StorageDim, StorageType};
        let mut program = Program::new("p");
        let main = program.add_compute_stage([1, 1, 1]).unwrap();
        let storage = StorageType::new(StorageDim::D1, KslType::FLOAT1).unwrap();
        let data = program.uniform("data", storage.into()).unwrap();
        let rd = program.var(data).unwrap();
        let at = program.int1(0);
        let one = program.float1(1.0);
        program.storage_store(main, rd, at, one).unwrap();

        let mut out = SourceWriter::new();
        emit_scope(&program, main, &CLike, &mut EmitContext::new(false), &mut out).unwrap();
        assert_eq!(out.finish(), "data[0] = 1.0;\n");
    }
}
