//! WGSL spelling of KSL expressions and statements.

use ksl_backend_core::{SourceWriter, StatementSyntax};
use ksl_ir::{
    BuiltinFunction, Expression, ExpressionKind, Handle, IrError, KslGenerator, KslType, Program,
    SamplerDim, SamplerKind, SamplerType, ScalarKind, StageKind, StorageDim, StorageType,
    SwizzleComponent, Variable, VariableKind,
};

/// Renders expressions and statements as WGSL for one entry point.
///
/// Sampling differs between fragment and other stages, so a generator is
/// bound to the stage whose body it renders.
#[derive(Debug)]
pub struct WgslGenerator {
    stage: StageKind,
}

impl WgslGenerator {
    pub fn new(stage: StageKind) -> Self {
        Self { stage }
    }
}

fn scalar_name(kind: ScalarKind) -> &'static str {
    match kind {
        ScalarKind::Float => "f32",
        ScalarKind::Int => "i32",
        ScalarKind::Uint => "u32",
        ScalarKind::Bool => "bool",
    }
}

pub(crate) fn texture_name(ty: SamplerType) -> &'static str {
    match (ty.kind(), ty.dim()) {
        (SamplerKind::Color, SamplerDim::D1) => "texture_1d<f32>",
        (SamplerKind::Color, SamplerDim::D2) => "texture_2d<f32>",
        (SamplerKind::Color, SamplerDim::D3) => "texture_3d<f32>",
        (SamplerKind::Color, SamplerDim::Cube) => "texture_cube<f32>",
        (SamplerKind::Color, SamplerDim::D2Array) => "texture_2d_array<f32>",
        (SamplerKind::Color, SamplerDim::CubeArray) => "texture_cube_array<f32>",
        (SamplerKind::Depth, SamplerDim::Cube) => "texture_depth_cube",
        (SamplerKind::Depth, SamplerDim::D2Array) => "texture_depth_2d_array",
        (SamplerKind::Depth, SamplerDim::CubeArray) => "texture_depth_cube_array",
        (SamplerKind::Depth, _) => "texture_depth_2d",
    }
}

/// The texel format of a storage texture, `None` for three-component texels.
pub(crate) fn texel_format(texel: KslType) -> Option<&'static str> {
    let format = match (texel.component_count()?, texel.scalar_kind()?) {
        (1, ScalarKind::Float) => "r32float",
        (1, ScalarKind::Int) => "r32sint",
        (1, ScalarKind::Uint) => "r32uint",
        (2, ScalarKind::Float) => "rg32float",
        (2, ScalarKind::Int) => "rg32sint",
        (2, ScalarKind::Uint) => "rg32uint",
        (4, ScalarKind::Float) => "rgba32float",
        (4, ScalarKind::Int) => "rgba32sint",
        (4, ScalarKind::Uint) => "rgba32uint",
        _ => return None,
    };
    Some(format)
}

/// `texture_storage_*` with the given access mode.
pub(crate) fn storage_texture_name(ty: StorageType, access: &str) -> String {
    let dim = match ty.dim() {
        StorageDim::D1 => "1d",
        StorageDim::D2 => "2d",
        StorageDim::D3 => "3d",
    };
    let format = texel_format(ty.texel_type()).unwrap_or("rgba32float");
    format!("texture_storage_{dim}<{format}, {access}>")
}

/// `textureLoad` and `textureStore` always move a four-component vector.
fn texel_shape(ty: StorageType) -> (usize, ScalarKind) {
    let texel = ty.texel_type();
    (
        texel.component_count().unwrap_or(4),
        texel.scalar_kind().unwrap_or(ScalarKind::Float),
    )
}

/// The module-scope name of a stage-bound variable.
///
/// Interface variables of different stages may share a name, so each is
/// mirrored into a private prefixed with its stage.
pub(crate) fn private_name(variable: &Variable) -> String {
    match (variable.kind, variable.stage) {
        (VariableKind::Local | VariableKind::Uniform, _) | (_, None) => variable.name.clone(),
        (_, Some(stage)) => format!("{stage}_{}", variable.name),
    }
}

const LETTERS: [char; 4] = ['x', 'y', 'z', 'w'];

fn letter(c: SwizzleComponent) -> char {
    LETTERS[c as usize]
}

impl KslGenerator for WgslGenerator {
    fn type_name(&self, ty: KslType) -> String {
        match ty {
            KslType::Void => String::new(),
            KslType::Scalar(kind) => scalar_name(kind).into(),
            KslType::Vector { size, scalar } => format!("vec{size}<{}>", scalar_name(scalar)),
            KslType::Matrix { size } => format!("mat{size}x{size}<f32>"),
            KslType::Array { elem, size } => {
                format!("array<{}, {size}>", self.type_name(elem.into()))
            }
            KslType::Sampler(s) => texture_name(s).into(),
            KslType::Storage(s) => storage_texture_name(s, "write"),
        }
    }

    fn variable(&self, variable: &Variable) -> String {
        private_name(variable)
    }

    fn builtin(&self, fun: BuiltinFunction, args: &[String]) -> String {
        let name = match fun {
            BuiltinFunction::SmoothStep => "smoothstep".to_owned(),
            other => other.to_string(),
        };
        format!("{name}({})", args.join(", "))
    }

    fn sample(&self, sampler: &str, ty: SamplerType, coord: &str) -> String {
        let fragment = self.stage == StageKind::Fragment;
        // array layers are passed separately as an integer
        let coords = match (ty.kind(), ty.dim()) {
            (SamplerKind::Color, SamplerDim::D2Array) => format!("({coord}).xy, i32(({coord}).z)"),
            (SamplerKind::Color, SamplerDim::CubeArray) => {
                format!("({coord}).xyz, i32(({coord}).w)")
            }
            (SamplerKind::Color, _) => coord.to_owned(),
            // depth cube arrays have no room for a layer and are rejected at declaration
            (SamplerKind::Depth, SamplerDim::Cube | SamplerDim::CubeArray) => {
                format!("({coord}).xyz, ({coord}).w")
            }
            (SamplerKind::Depth, SamplerDim::D2Array) => {
                format!("({coord}).xy, i32(({coord}).z), ({coord}).w")
            }
            (SamplerKind::Depth, _) => format!("({coord}).xy, ({coord}).z"),
        };
        match (ty.kind(), fragment) {
            (SamplerKind::Color, true) => {
                format!("textureSample({sampler}, {sampler}_sampler, {coords})")
            }
            (SamplerKind::Color, false) => {
                format!("textureSampleLevel({sampler}, {sampler}_sampler, {coords}, 0.0)")
            }
            (SamplerKind::Depth, true) => {
                format!("textureSampleCompare({sampler}, {sampler}_sampler, {coords})")
            }
            (SamplerKind::Depth, false) => {
                format!("textureSampleCompareLevel({sampler}, {sampler}_sampler, {coords})")
            }
        }
    }

    fn storage_load(&self, storage: &str, ty: StorageType, coord: &str) -> String {
        let components = match texel_shape(ty).0 {
            1 => ".x",
            2 => ".xy",
            _ => "",
        };
        format!("textureLoad({storage}, {coord}){components}")
    }

    fn storage_store(&self, storage: &str, ty: StorageType, coord: &str, value: &str) -> String {
        let (count, kind) = texel_shape(ty);
        let texel = if count >= 4 {
            value.to_owned()
        } else {
            let zero = match kind {
                ScalarKind::Float => "0.0",
                ScalarKind::Uint => "0u",
                _ => "0",
            };
            let padding = vec![zero; 4 - count].join(", ");
            format!("vec4<{}>({value}, {padding})", scalar_name(kind))
        };
        format!("textureStore({storage}, {coord}, {texel})")
    }
}

impl StatementSyntax for WgslGenerator {
    fn generator(&self) -> &dyn KslGenerator {
        self
    }

    fn declare(&self, variable: &Variable, init: Option<&str>) -> String {
        let ty = self.type_name(variable.ty);
        match init {
            Some(init) => format!("var {}: {ty} = {init};", variable.name),
            None => format!("var {}: {ty};", variable.name),
        }
    }

    fn loop_header(&self, counter: &Variable, start: &str, end: &str) -> String {
        let i = &counter.name;
        format!("for (var {i}: i32 = {start}; {i} < {end}; {i}++) {{")
    }

    /// WGSL only assigns single swizzle components, so a multi-component
    /// swizzle target is written one component at a time from a temporary.
    fn assign(
        &self,
        program: &Program,
        target: Handle<Expression>,
        value: Handle<Expression>,
        out: &mut SourceWriter,
    ) -> Result<(), IrError> {
        let value = program.generate_expression(value, self)?;
        match &program.expression(target).kind {
            ExpressionKind::Swizzle { vector, pattern } if pattern.len() > 1 => {
                let base = program.generate_assignable(*vector, self)?;
                out.line("{");
                out.indent();
                out.line(format!("let swizzled = {value};"));
                for (i, c) in pattern.iter().enumerate() {
                    out.line(format!("{base}.{} = swizzled.{};", letter(*c), LETTERS[i]));
                }
                out.dedent();
                out.line("}");
            }
            _ => {
                let target = program.generate_assignable(target, self)?;
                out.line(format!("{target} = {value};"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ksl_ir::{BuiltinValue, StorageType};

    #[test]
    fn type_names() {
        let g = WgslGenerator::new(StageKind::Fragment);
        assert_eq!(g.type_name(KslType::FLOAT1), "f32");
        assert_eq!(g.type_name(KslType::INT3), "vec3<i32>");
        assert_eq!(g.type_name(KslType::MAT3), "mat3x3<f32>");
        assert_eq!(
            g.type_name(KslType::array(KslType::FLOAT4, 8).unwrap()),
            "array<vec4<f32>, 8>"
        );
        assert_eq!(g.type_name(SamplerType::DEPTH_2D.into()), "texture_depth_2d");
        let storage = StorageType::new(StorageDim::D2, KslType::INT1).unwrap();
        assert_eq!(
            g.type_name(storage.into()),
            "texture_storage_2d<r32sint, write>"
        );
    }

    #[test]
    fn sampling_depends_on_stage() {
        let fs = WgslGenerator::new(StageKind::Fragment);
        let vs = WgslGenerator::new(StageKind::Vertex);
        assert_eq!(
            fs.sample("tAlbedo", SamplerType::COLOR_2D, "uv"),
            "textureSample(tAlbedo, tAlbedo_sampler, uv)"
        );
        assert_eq!(
            vs.sample("tAlbedo", SamplerType::COLOR_2D, "uv"),
            "textureSampleLevel(tAlbedo, tAlbedo_sampler, uv, 0.0)"
        );
        assert_eq!(
            fs.sample("tShadow", SamplerType::DEPTH_2D, "p"),
            "textureSampleCompare(tShadow, tShadow_sampler, (p).xy, (p).z)"
        );
    }

    #[test]
    fn storage_access_pads_to_four_components() {
        let g = WgslGenerator::new(StageKind::Compute);
        let r32 = StorageType::new(StorageDim::D1, KslType::UINT1).unwrap();
        let rgba = StorageType::new(StorageDim::D2, KslType::FLOAT4).unwrap();
        assert_eq!(g.storage_load("img", r32, "i"), "textureLoad(img, i).x");
        assert_eq!(
            g.storage_store("img", r32, "i", "v"),
            "textureStore(img, i, vec4<u32>(v, 0u, 0u, 0u))"
        );
        assert_eq!(g.storage_store("img", rgba, "p", "c"), "textureStore(img, p, c)");
        assert_eq!(
            storage_texture_name(r32, "read_write"),
            "texture_storage_1d<r32uint, read_write>"
        );
    }

    #[test]
    fn interface_variables_are_stage_prefixed() {
        let mut program = Program::new("p");
        program.add_stage(StageKind::Vertex).unwrap();
        let pos = program.builtin(BuiltinValue::Position).unwrap();
        let input = program
            .stage_input(StageKind::Vertex, "aUv", KslType::FLOAT2)
            .unwrap();
        assert_eq!(private_name(program.variable(pos)), "vertex_position");
        assert_eq!(private_name(program.variable(input)), "vertex_aUv");
    }

    #[test]
    fn swizzle_assignment_is_split() {
        let mut program = Program::new("p");
        let main = program.add_stage(StageKind::Fragment).unwrap();
        let v = program.declare(main, "v", KslType::FLOAT4, None).unwrap();
        let rv = program.var(v).unwrap();
        let target = program.swizzle(rv, "zx").unwrap();
        let one = program.float1(1.0);
        let two = program.float1(2.0);
        let value = program.compose(KslType::FLOAT2, &[one, two]).unwrap();

        let mut out = SourceWriter::new();
        WgslGenerator::new(StageKind::Fragment)
            .assign(&program, target, value, &mut out)
            .unwrap();
        let expected = "\
{
    let swizzled = vec2<f32>(1.0, 2.0);
    v_0.z = swizzled.x;
    v_0.x = swizzled.y;
}
";
        assert_eq!(out.finish(), expected);
    }
}
