//! GLSL spelling of KSL expressions and statements.

use ksl_backend_core::StatementSyntax;
use ksl_ir::{
    BinaryOp, BuiltinFunction, BuiltinValue, KslGenerator, KslType, SamplerDim, SamplerKind,
    SamplerType, ScalarKind, StorageDim, StorageType, Variable, VariableKind,
};

/// Renders expressions and statements as GLSL.
#[derive(Debug, Default)]
pub struct GlslGenerator;

fn scalar_name(kind: ScalarKind) -> &'static str {
    match kind {
        ScalarKind::Float => "float",
        ScalarKind::Int => "int",
        ScalarKind::Uint => "uint",
        ScalarKind::Bool => "bool",
    }
}

fn vector_prefix(kind: ScalarKind) -> &'static str {
    match kind {
        ScalarKind::Float => "",
        ScalarKind::Int => "i",
        ScalarKind::Uint => "u",
        ScalarKind::Bool => "b",
    }
}

pub(crate) fn sampler_name(ty: SamplerType) -> &'static str {
    match (ty.kind(), ty.dim()) {
        (SamplerKind::Color, SamplerDim::D1) => "sampler1D",
        (SamplerKind::Color, SamplerDim::D2) => "sampler2D",
        (SamplerKind::Color, SamplerDim::D3) => "sampler3D",
        (SamplerKind::Color, SamplerDim::Cube) => "samplerCube",
        (SamplerKind::Color, SamplerDim::D2Array) => "sampler2DArray",
        (SamplerKind::Color, SamplerDim::CubeArray) => "samplerCubeArray",
        (SamplerKind::Depth, SamplerDim::Cube) => "samplerCubeShadow",
        (SamplerKind::Depth, SamplerDim::D2Array) => "sampler2DArrayShadow",
        (SamplerKind::Depth, SamplerDim::CubeArray) => "samplerCubeArrayShadow",
        (SamplerKind::Depth, _) => "sampler2DShadow",
    }
}

pub(crate) fn builtin_name(value: BuiltinValue) -> &'static str {
    match value {
        BuiltinValue::Position => "gl_Position",
        BuiltinValue::VertexIndex => "gl_VertexID",
        BuiltinValue::InstanceIndex => "gl_InstanceID",
        BuiltinValue::FragCoord => "gl_FragCoord",
        BuiltinValue::FragDepth => "gl_FragDepth",
        BuiltinValue::GlobalInvocationId => "gl_GlobalInvocationID",
        BuiltinValue::LocalInvocationId => "gl_LocalInvocationID",
    }
}

/// Image loads and stores always move four components.
fn image_texel_components(ty: StorageType) -> (usize, ScalarKind) {
    let texel = ty.texel_type();
    (
        texel.component_count().unwrap_or(4),
        texel.scalar_kind().unwrap_or(ScalarKind::Float),
    )
}

impl KslGenerator for GlslGenerator {
    fn type_name(&self, ty: KslType) -> String {
        match ty {
            KslType::Void => "void".into(),
            KslType::Scalar(kind) => scalar_name(kind).into(),
            KslType::Vector { size, scalar } => format!("{}vec{size}", vector_prefix(scalar)),
            KslType::Matrix { size } => format!("mat{size}"),
            KslType::Array { elem, size } => format!("{}[{size}]", self.type_name(elem.into())),
            KslType::Sampler(s) => sampler_name(s).into(),
            KslType::Storage(s) => {
                let prefix = s
                    .texel_type()
                    .scalar_kind()
                    .map(vector_prefix)
                    .unwrap_or_default();
                let dim = match s.dim() {
                    StorageDim::D1 => "1D",
                    StorageDim::D2 => "2D",
                    StorageDim::D3 => "3D",
                };
                format!("{prefix}image{dim}")
            }
        }
    }

    fn variable(&self, variable: &Variable) -> String {
        match variable.kind {
            VariableKind::Builtin(b) => builtin_name(b).into(),
            _ => variable.name.clone(),
        }
    }

    fn binary(
        &self,
        op: BinaryOp,
        left_ty: KslType,
        right_ty: KslType,
        left: &str,
        right: &str,
    ) -> String {
        if op != BinaryOp::Modulo || !left_ty.is_float() {
            return format!("({left} {op} {right})");
        }
        // mod() has no (float, vecN) overload
        if !left_ty.is_vector() && right_ty.is_vector() {
            format!("mod({}({left}), {right})", self.type_name(right_ty))
        } else {
            format!("mod({left}, {right})")
        }
    }

    fn builtin(&self, fun: BuiltinFunction, args: &[String]) -> String {
        let name = match fun {
            BuiltinFunction::InverseSqrt => "inversesqrt".to_owned(),
            BuiltinFunction::SmoothStep => "smoothstep".to_owned(),
            other => other.to_string(),
        };
        format!("{name}({})", args.join(", "))
    }

    fn sample(&self, sampler: &str, _ty: SamplerType, coord: &str) -> String {
        format!("texture({sampler}, {coord})")
    }

    fn storage_load(&self, storage: &str, ty: StorageType, coord: &str) -> String {
        let components = match image_texel_components(ty).0 {
            1 => ".x",
            2 => ".xy",
            _ => "",
        };
        format!("imageLoad({storage}, {coord}){components}")
    }

    fn storage_store(&self, storage: &str, ty: StorageType, coord: &str, value: &str) -> String {
        let (count, kind) = image_texel_components(ty);
        let texel = if count >= 4 {
            value.to_owned()
        } else {
            let zero = match kind {
                ScalarKind::Float => "0.0",
                ScalarKind::Uint => "0u",
                _ => "0",
            };
            let padding = vec![zero; 4 - count].join(", ");
            format!("{}vec4({value}, {padding})", vector_prefix(kind))
        };
        format!("imageStore({storage}, {coord}, {texel})")
    }
}

impl StatementSyntax for GlslGenerator {
    fn generator(&self) -> &dyn KslGenerator {
        self
    }

    fn declare(&self, variable: &Variable, init: Option<&str>) -> String {
        let ty = self.type_name(variable.ty);
        match init {
            Some(init) => format!("{ty} {} = {init};", variable.name),
            None => format!("{ty} {};", variable.name),
        }
    }

    fn loop_header(&self, counter: &Variable, start: &str, end: &str) -> String {
        let i = &counter.name;
        format!("for (int {i} = {start}; {i} < {end}; {i}++) {{")
    }
}
