//! Display implementations, pseudocode rendering and a text dump for debugging.

use std::fmt;

use crate::IrError;
use crate::Program;
use crate::arena::Handle;
use crate::block::{Block, BlockInput};
use crate::expr::{BinaryOp, BuiltinFunction, Expression, Literal, UnaryOp};
use crate::generate::KslGenerator;
use crate::state::{BuiltinValue, DependencySet, VariableKind};
use crate::stmt::{Scope, StageKind, StatementKind};
use crate::types::{
    KslType, SamplerDim, SamplerKind, SamplerType, ScalarKind, StorageDim, StorageType, ValueType,
    VectorSize,
};

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float => write!(f, "float"),
            Self::Int => write!(f, "int"),
            Self::Uint => write!(f, "uint"),
            Self::Bool => write!(f, "bool"),
        }
    }
}

impl fmt::Display for VectorSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dimens())
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&KslType::from(*self), f)
    }
}

impl fmt::Display for SamplerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim = match self.dim() {
            SamplerDim::D1 => "1d",
            SamplerDim::D2 => "2d",
            SamplerDim::D3 => "3d",
            SamplerDim::Cube => "Cube",
            SamplerDim::D2Array => "2dArray",
            SamplerDim::CubeArray => "CubeArray",
        };
        match self.kind() {
            SamplerKind::Color => write!(f, "sampler{dim}"),
            SamplerKind::Depth => write!(f, "depthSampler{dim}"),
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim = match self.dim() {
            StorageDim::D1 => "1d",
            StorageDim::D2 => "2d",
            StorageDim::D3 => "3d",
        };
        write!(f, "storage{dim}<{}>", self.texel_type())
    }
}

impl fmt::Display for KslType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "void"),
            Self::Scalar(kind) => write!(f, "{kind}1"),
            Self::Vector { size, scalar } => write!(f, "{scalar}{size}"),
            Self::Matrix { size } => write!(f, "mat{size}"),
            Self::Array { elem, size } => write!(f, "{elem}[{size}]"),
            Self::Sampler(s) => fmt::Display::fmt(s, f),
            Self::Storage(s) => fmt::Display::fmt(s, f),
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => write!(f, "vertex"),
            Self::Fragment => write!(f, "fragment"),
            Self::Compute => write!(f, "compute"),
        }
    }
}

impl fmt::Display for BuiltinValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Position => "position",
            Self::VertexIndex => "vertexIndex",
            Self::InstanceIndex => "instanceIndex",
            Self::FragCoord => "fragCoord",
            Self::FragDepth => "fragDepth",
            Self::GlobalInvocationId => "globalInvocationId",
            Self::LocalInvocationId => "localInvocationId",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}u"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Negate => write!(f, "-"),
            Self::Not => write!(f, "!"),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::And => "&&",
            Self::Or => "||",
        };
        f.write_str(s)
    }
}

impl fmt::Display for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Abs => "abs",
            Self::Sign => "sign",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Fract => "fract",
            Self::Sqrt => "sqrt",
            Self::InverseSqrt => "inverseSqrt",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Pow => "pow",
            Self::Min => "min",
            Self::Max => "max",
            Self::Clamp => "clamp",
            Self::Mix => "mix",
            Self::Step => "step",
            Self::SmoothStep => "smoothStep",
            Self::Dot => "dot",
            Self::Cross => "cross",
            Self::Length => "length",
            Self::Distance => "distance",
            Self::Normalize => "normalize",
            Self::Reflect => "reflect",
            Self::Transpose => "transpose",
            Self::Determinant => "determinant",
        };
        f.write_str(s)
    }
}

/// Renders expressions with KSL type names; unbound inputs show by name.
struct PseudoCode;

impl KslGenerator for PseudoCode {
    fn type_name(&self, ty: KslType) -> String {
        ty.to_string()
    }

    fn sample(&self, sampler: &str, _ty: SamplerType, coord: &str) -> String {
        format!("sample({sampler}, {coord})")
    }

    fn unbound_input(&self, input: &BlockInput, _block: &Block) -> Result<String, IrError> {
        Ok(format!("<{}>", input.name()))
    }
}

impl Program {
    /// A readable rendering of `expr`, e.g. `m_0[1]` for a matrix column.
    pub fn to_pseudo_code(&self, expr: Handle<Expression>) -> String {
        self.generate_expression(expr, &PseudoCode)
            .unwrap_or_else(|e| format!("<{e}>"))
    }

    fn assignable_pseudo_code(&self, target: Handle<Expression>) -> String {
        self.generate_assignable(target, &PseudoCode)
            .unwrap_or_else(|e| format!("<{e}>"))
    }
}

fn format_deps(program: &Program, deps: &DependencySet) -> String {
    if deps.is_empty() {
        return String::new();
    }
    let states: Vec<_> = deps
        .iter()
        .map(|s| format!("{}@{}", program.variable(s.variable).name, s.mutation))
        .collect();
    format!("  // deps: {}", states.join(", "))
}

fn write_scope(out: &mut String, program: &Program, scope: Handle<Scope>, indent: usize) {
    let pad = " ".repeat(indent);
    for &handle in program.scope(scope).statements() {
        let stmt = program.statement(handle);
        let deps = format_deps(program, stmt.dependencies());
        match &stmt.kind {
            StatementKind::Declare { variable, init } => {
                let var = program.variable(*variable);
                let init = match init {
                    Some(e) => format!(" = {}", program.to_pseudo_code(*e)),
                    None => String::new(),
                };
                out.push_str(&format!("{pad}{} {}{init}{deps}\n", var.ty, var.name));
            }
            StatementKind::Assign { target, value } => {
                out.push_str(&format!(
                    "{pad}{} = {}{deps}\n",
                    program.assignable_pseudo_code(*target),
                    program.to_pseudo_code(*value)
                ));
            }
            StatementKind::If {
                condition,
                accept,
                reject,
            } => {
                out.push_str(&format!(
                    "{pad}if ({}) {{{deps}\n",
                    program.to_pseudo_code(*condition)
                ));
                write_scope(out, program, *accept, indent + 4);
                if !program.scope(*reject).statements().is_empty() {
                    out.push_str(&format!("{pad}}} else {{\n"));
                    write_scope(out, program, *reject, indent + 4);
                }
                out.push_str(&format!("{pad}}}\n"));
            }
            StatementKind::Loop {
                counter,
                start,
                end,
                body,
            } => {
                let i = &program.variable(*counter).name;
                out.push_str(&format!(
                    "{pad}for ({i} = {}; {i} < {}; {i}++) {{{deps}\n",
                    program.to_pseudo_code(*start),
                    program.to_pseudo_code(*end)
                ));
                write_scope(out, program, *body, indent + 4);
                out.push_str(&format!("{pad}}}\n"));
            }
            StatementKind::Block(block) => {
                let block = program.block(*block);
                out.push_str(&format!("{pad}block {} {{{deps}\n", block.name()));
                for &input in block.inputs() {
                    let slot = program.input(input);
                    let value = match slot.value() {
                        Some(v) => program.to_pseudo_code(v),
                        None => "<unbound>".to_owned(),
                    };
                    out.push_str(&format!(
                        "{pad}    in {} {} = {value}\n",
                        slot.ty(),
                        slot.name()
                    ));
                }
                write_scope(out, program, block.body(), indent + 4);
                out.push_str(&format!("{pad}}}\n"));
            }
            StatementKind::StorageStore {
                storage,
                coord,
                value,
            } => {
                out.push_str(&format!(
                    "{pad}{}[{}] = {}{deps}\n",
                    program.to_pseudo_code(*storage),
                    program.to_pseudo_code(*coord),
                    program.to_pseudo_code(*value)
                ));
            }
        }
    }
}

/// Produces a human-readable text dump of a [`Program`] for debugging.
///
/// Statements carry a `// deps:` comment listing the `variable@mutation`
/// states their inputs were computed from.
pub fn dump_program(program: &Program) -> String {
    let mut out = format!("Program {}:\n", program.name());

    if !program.uniforms().is_empty() {
        out.push_str("\nUniforms:\n");
        for &u in program.uniforms() {
            let var = program.variable(u);
            out.push_str(&format!("  uniform {} {}\n", var.ty, var.name));
        }
    }

    for stage in program.stages() {
        out.push_str(&format!("\nStage {}", stage.kind));
        if let Some([x, y, z]) = stage.workgroup_size {
            out.push_str(&format!(" @workgroup_size({x}, {y}, {z})"));
        }
        out.push_str(":\n");
        for &v in stage.inputs.iter().chain(&stage.outputs).chain(&stage.builtins) {
            let var = program.variable(v);
            let decl = match var.kind {
                VariableKind::StageInput { location } => format!("@location({location}) in"),
                VariableKind::StageOutput { location } => format!("@location({location}) out"),
                VariableKind::Builtin(b) => format!("@builtin({b})"),
                VariableKind::Local | VariableKind::Uniform => continue,
            };
            out.push_str(&format!("  {decl} {} {}\n", var.ty, var.name));
        }
        out.push_str(&format!("  {} {{\n", program.scope(stage.main).name));
        write_scope(&mut out, program, stage.main, 4);
        out.push_str("  }\n");
    }

    out
}
