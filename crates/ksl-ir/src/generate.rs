//! Rendering expressions into target source text.
//!
//! A [`KslGenerator`] knows how one target language spells each kind of
//! expression. [`Program::generate_expression`] walks the expression graph
//! and hands already-rendered operands to the generator, so implementors
//! only deal with strings. Default methods produce C-like syntax that
//! GLSL, WGSL and the pseudocode dump mostly share.

use crate::IrError;
use crate::arena::Handle;
use crate::block::{Block, BlockInput};
use crate::expr::{
    BinaryOp, BuiltinFunction, Expression, ExpressionKind, Literal, SwizzleComponent, UnaryOp,
};
use crate::program::Program;
use crate::state::Variable;
use crate::types::{KslType, SamplerType, StorageType};

/// A rendered index operand, plus its value when it is an integer literal.
#[derive(Clone, Copy, Debug)]
pub struct IndexOperand<'a> {
    pub source: &'a str,
    pub constant: Option<i64>,
}

/// Target-specific spelling of expressions.
pub trait KslGenerator {
    /// The source name of a type.
    fn type_name(&self, ty: KslType) -> String;

    fn literal(&self, literal: Literal) -> String {
        match literal {
            Literal::Float(v) => format!("{v:?}"),
            Literal::Int(v) => v.to_string(),
            Literal::Uint(v) => format!("{v}u"),
            Literal::Bool(v) => v.to_string(),
        }
    }

    fn variable(&self, variable: &Variable) -> String {
        variable.name.clone()
    }

    fn compose(&self, ty: KslType, components: &[String]) -> String {
        format!("{}({})", self.type_name(ty), components.join(", "))
    }

    fn unary(&self, op: UnaryOp, operand: &str) -> String {
        match op {
            UnaryOp::Negate => format!("-({operand})"),
            UnaryOp::Not => format!("!({operand})"),
        }
    }

    /// `_left_ty` and `_right_ty` are the operand types; they differ when a
    /// scalar is combined with a vector.
    fn binary(
        &self,
        op: BinaryOp,
        _left_ty: KslType,
        _right_ty: KslType,
        left: &str,
        right: &str,
    ) -> String {
        format!("({left} {op} {right})")
    }

    fn swizzle(&self, vector: &str, pattern: &[SwizzleComponent]) -> String {
        let letters: String = pattern
            .iter()
            .map(|c| match c {
                SwizzleComponent::X => 'x',
                SwizzleComponent::Y => 'y',
                SwizzleComponent::Z => 'z',
                SwizzleComponent::W => 'w',
            })
            .collect();
        format!("{vector}.{letters}")
    }

    /// A matrix column read.
    fn matrix_col_expression(&self, matrix: &str, index: IndexOperand<'_>) -> String {
        format!("{matrix}[{}]", index.source)
    }

    /// A matrix column as the target of an assignment.
    fn matrix_col_assignable(&self, matrix: &str, index: IndexOperand<'_>) -> String {
        self.matrix_col_expression(matrix, index)
    }

    fn array_element(&self, array: &str, index: IndexOperand<'_>) -> String {
        format!("{array}[{}]", index.source)
    }

    fn array_element_assignable(&self, array: &str, index: IndexOperand<'_>) -> String {
        self.array_element(array, index)
    }

    fn builtin(&self, fun: BuiltinFunction, args: &[String]) -> String {
        format!("{fun}({})", args.join(", "))
    }

    fn convert(&self, ty: KslType, expr: &str) -> String {
        format!("{}({expr})", self.type_name(ty))
    }

    fn sample(&self, sampler: &str, ty: SamplerType, coord: &str) -> String;

    /// Reads one texel of a storage texture.
    fn storage_load(&self, storage: &str, _ty: StorageType, coord: &str) -> String {
        format!("{storage}[{coord}]")
    }

    /// A statement writing one texel, without the terminating `;`.
    fn storage_store(&self, storage: &str, _ty: StorageType, coord: &str, value: &str) -> String {
        format!("{storage}[{coord}] = {value}")
    }

    /// Called for an input slot with nothing bound. Code generators fail;
    /// dumps may render a placeholder.
    fn unbound_input(&self, input: &BlockInput, block: &Block) -> Result<String, IrError> {
        Err(IrError::UnboundInput {
            input: input.name().to_owned(),
            block: block.name().to_owned(),
        })
    }
}

impl Program {
    /// Renders `expr` with `generator`.
    ///
    /// Block inputs render as whatever they are bound to. Fails with
    /// `UnboundInput` for empty slots and `CyclicInput` if expanding a slot
    /// leads back to itself.
    pub fn generate_expression(
        &self,
        expr: Handle<Expression>,
        generator: &dyn KslGenerator,
    ) -> Result<String, IrError> {
        self.expressions.check(expr)?;
        self.render(expr, generator, &mut Vec::new())
    }

    /// Renders `target` as the left-hand side of an assignment.
    pub fn generate_assignable(
        &self,
        target: Handle<Expression>,
        generator: &dyn KslGenerator,
    ) -> Result<String, IrError> {
        self.expressions.check(target)?;
        self.render_assignable(target, generator, &mut Vec::new())
    }

    fn render_assignable(
        &self,
        target: Handle<Expression>,
        generator: &dyn KslGenerator,
        expanding: &mut Vec<Handle<BlockInput>>,
    ) -> Result<String, IrError> {
        match &self.expressions[target].kind {
            ExpressionKind::Variable(v) => Ok(generator.variable(&self.variables[*v])),
            ExpressionKind::MatrixColumn { matrix, index } => {
                let matrix = self.render_assignable(*matrix, generator, expanding)?;
                let source = self.render(*index, generator, expanding)?;
                Ok(generator.matrix_col_assignable(&matrix, self.index_operand(*index, &source)))
            }
            ExpressionKind::ArrayElement { array, index } => {
                let array = self.render_assignable(*array, generator, expanding)?;
                let source = self.render(*index, generator, expanding)?;
                Ok(generator.array_element_assignable(&array, self.index_operand(*index, &source)))
            }
            ExpressionKind::Swizzle { vector, pattern } => {
                let vector = self.render_assignable(*vector, generator, expanding)?;
                Ok(generator.swizzle(&vector, pattern))
            }
            _ => Err(IrError::NotAssignable(self.to_pseudo_code(target))),
        }
    }

    fn index_operand<'a>(&self, index: Handle<Expression>, source: &'a str) -> IndexOperand<'a> {
        let constant = match self.expressions[index].kind {
            ExpressionKind::Literal(lit) => lit.as_index(),
            _ => None,
        };
        IndexOperand { source, constant }
    }

    fn render(
        &self,
        expr: Handle<Expression>,
        generator: &dyn KslGenerator,
        expanding: &mut Vec<Handle<BlockInput>>,
    ) -> Result<String, IrError> {
        let node = &self.expressions[expr];
        let out = match &node.kind {
            ExpressionKind::Literal(lit) => generator.literal(*lit),
            ExpressionKind::Variable(v) => generator.variable(&self.variables[*v]),
            ExpressionKind::BlockInput(input) => {
                let slot = &self.inputs[*input];
                let block = &self.blocks[slot.block()];
                if expanding.contains(input) {
                    return Err(IrError::CyclicInput {
                        input: slot.name().to_owned(),
                        block: block.name().to_owned(),
                    });
                }
                match slot.value() {
                    Some(value) => {
                        expanding.push(*input);
                        let rendered = self.render(value, generator, expanding);
                        expanding.pop();
                        rendered?
                    }
                    None => generator.unbound_input(slot, block)?,
                }
            }
            ExpressionKind::Compose { components } => {
                let parts = self.render_all(components, generator, expanding)?;
                generator.compose(node.ty, &parts)
            }
            ExpressionKind::Unary { op, expr } => {
                let operand = self.render(*expr, generator, expanding)?;
                generator.unary(*op, &operand)
            }
            ExpressionKind::Binary { op, left, right } => {
                let l = self.render(*left, generator, expanding)?;
                let r = self.render(*right, generator, expanding)?;
                let (lty, rty) = (self.expressions[*left].ty, self.expressions[*right].ty);
                generator.binary(*op, lty, rty, &l, &r)
            }
            ExpressionKind::Swizzle { vector, pattern } => {
                let vector = self.render(*vector, generator, expanding)?;
                generator.swizzle(&vector, pattern)
            }
            ExpressionKind::MatrixColumn { matrix, index } => {
                let matrix = self.render(*matrix, generator, expanding)?;
                let source = self.render(*index, generator, expanding)?;
                generator.matrix_col_expression(&matrix, self.index_operand(*index, &source))
            }
            ExpressionKind::ArrayElement { array, index } => {
                let array = self.render(*array, generator, expanding)?;
                let source = self.render(*index, generator, expanding)?;
                generator.array_element(&array, self.index_operand(*index, &source))
            }
            ExpressionKind::Builtin { fun, args } => {
                let args = self.render_all(args, generator, expanding)?;
                generator.builtin(*fun, &args)
            }
            ExpressionKind::Convert { expr } => {
                let inner = self.render(*expr, generator, expanding)?;
                generator.convert(node.ty, &inner)
            }
            ExpressionKind::Sample { sampler, coord } => {
                let KslType::Sampler(ty) = self.expressions[*sampler].ty else {
                    return Err(IrError::mismatch("sampler", self.expressions[*sampler].ty));
                };
                let s = self.render(*sampler, generator, expanding)?;
                let c = self.render(*coord, generator, expanding)?;
                generator.sample(&s, ty, &c)
            }
            ExpressionKind::StorageLoad { storage, coord } => {
                let ty = self.storage_type(*storage)?;
                let s = self.render(*storage, generator, expanding)?;
                let c = self.render(*coord, generator, expanding)?;
                generator.storage_load(&s, ty, &c)
            }
        };
        Ok(out)
    }

    /// The storage type of a texture operand.
    pub fn storage_type(&self, storage: Handle<Expression>) -> Result<StorageType, IrError> {
        match self.expressions[storage].ty {
            KslType::Storage(ty) => Ok(ty),
            other => Err(IrError::mismatch("storage texture", other)),
        }
    }

    fn render_all(
        &self,
        exprs: &[Handle<Expression>],
        generator: &dyn KslGenerator,
        expanding: &mut Vec<Handle<BlockInput>>,
    ) -> Result<Vec<String>, IrError> {
        exprs
            .iter()
            .map(|e| self.render(*e, generator, expanding))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stmt::StageKind;

    /// Brackets column accesses differently when read and written, and
    /// folds constant indices.
    struct Bracketed;

    impl KslGenerator for Bracketed {
        fn type_name(&self, ty: KslType) -> String {
            format!("T<{ty}>")
        }

        fn matrix_col_expression(&self, matrix: &str, index: IndexOperand<'_>) -> String {
            match index.constant {
                Some(c) => format!("col{c}({matrix})"),
                None => format!("col({matrix}, {})", index.source),
            }
        }

        fn matrix_col_assignable(&self, matrix: &str, index: IndexOperand<'_>) -> String {
            format!("&{matrix}[{}]", index.source)
        }

        fn sample(&self, sampler: &str, _ty: SamplerType, coord: &str) -> String {
            format!("sample({sampler}, {coord})")
        }
    }

    #[test]
    fn matrix_column_uses_both_forms() {
        let mut program = Program::new("p");
        let main = program.add_stage(StageKind::Vertex).unwrap();
        let m = program.declare(main, "m", KslType::MAT3, None).unwrap();
        let rm = program.var(m).unwrap();
        let c1 = program.matrix_column_const(rm, 1).unwrap();
        assert_eq!(program.generate_expression(c1, &Bracketed).unwrap(), "col1(m_0)");
        assert_eq!(program.generate_assignable(c1, &Bracketed).unwrap(), "&m_0[1]");

        let i = program.declare(main, "i", KslType::INT1, None).unwrap();
        let ri = program.var(i).unwrap();
        let ci = program.matrix_column(rm, ri).unwrap();
        assert_eq!(program.generate_expression(ci, &Bracketed).unwrap(), "col(m_0, i_1)");
    }

    #[test]
    fn non_assignable_target_is_rejected() {
        let mut program = Program::new("p");
        let one = program.float1(1.0);
        assert!(matches!(
            program.generate_assignable(one, &Bracketed),
            Err(IrError::NotAssignable(_))
        ));
    }

    #[test]
    fn inputs_render_their_binding() {
        let mut program = Program::new("p");
        let main = program.add_stage(StageKind::Fragment).unwrap();
        let block = program.add_block(main, "scale").unwrap();
        let input = program.in_float1(block, Some("factor"), None).unwrap();
        let node = program.input_expr(input);
        let two = program.float1(2.0);
        let doubled = program.binary(BinaryOp::Multiply, node, two).unwrap();

        assert!(matches!(
            program.generate_expression(doubled, &Bracketed),
            Err(IrError::UnboundInput { .. })
        ));
        let half = program.float1(0.5);
        program.bind_input(input, half).unwrap();
        assert_eq!(
            program.generate_expression(doubled, &Bracketed).unwrap(),
            "(0.5 * 2.0)"
        );
    }

    #[test]
    fn self_bound_input_is_cyclic() {
        let mut program = Program::new("p");
        let main = program.add_stage(StageKind::Fragment).unwrap();
        let block = program.add_block(main, "loopy").unwrap();
        let input = program.in_float1(block, None, None).unwrap();
        let node = program.input_expr(input);
        let neg = program.unary(UnaryOp::Negate, node).unwrap();
        program.bind_input(input, neg).unwrap();
        assert!(matches!(
            program.generate_expression(neg, &Bracketed),
            Err(IrError::CyclicInput { .. })
        ));
    }

    #[test]
    fn storage_load_uses_default_indexing() {
        use crate::types::{StorageDim, StorageType};
        let mut program = Program::new("p");
        let storage = StorageType::new(StorageDim::D1, KslType::UINT1).unwrap();
        let counts = program.uniform("counts", storage.into()).unwrap();
        let rc = program.var(counts).unwrap();
        let at = program.int1(3);
        let texel = program.storage_load(rc, at).unwrap();
        assert_eq!(
            program.generate_expression(texel, &Bracketed).unwrap(),
            "counts[3]"
        );
    }

    #[test]
    fn default_syntax() {
        let mut program = Program::new("p");
        let x = program.float1(1.0);
        let v = program.compose(KslType::FLOAT3, &[x]).unwrap();
        let yz = program.swizzle(v, "yz").unwrap();
        let n = program.uint1(7);
        assert_eq!(
            program.generate_expression(yz, &Bracketed).unwrap(),
            "T<float3>(1.0).yz"
        );
        assert_eq!(program.generate_expression(n, &Bracketed).unwrap(), "7u");
    }
}
