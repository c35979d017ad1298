//! GLSL backend for KSL.
//!
//! Emits one shader per stage (`.vert`, `.frag`, `.comp`) for desktop GLSL
//! or GLSL ES, depending on the registered flavor and
//! [`BackendOptions::glsl_version`].

use ksl_backend_core::{
    Backend, BackendError, BackendOptions, BackendOutput, Diagnostic, GlslVersion, OutputFile,
    EmitContext, SourceWriter, emit_scope,
};
use ksl_ir::{
    BuiltinValue, KslGenerator, KslType, Program, SamplerDim, ScalarKind, Stage, StageKind,
    StorageUsage, ValidatedProgram, VariableKind,
};

mod generator;

pub use generator::GlslGenerator;

/// Which family of GLSL versions a backend instance emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlslFlavor {
    /// Desktop OpenGL (`#version ... core`).
    Desktop,
    /// OpenGL ES / WebGL 2 (`#version ... es`).
    Es,
}

/// GLSL source backend.
#[derive(Debug)]
pub struct GlslBackend {
    flavor: GlslFlavor,
}

impl GlslBackend {
    /// Desktop GLSL, target `glsl`.
    pub fn desktop() -> Self {
        Self {
            flavor: GlslFlavor::Desktop,
        }
    }

    /// GLSL ES, target `glsl-es`.
    pub fn es() -> Self {
        Self {
            flavor: GlslFlavor::Es,
        }
    }

    /// The version to emit: the requested one if it belongs to this flavor,
    /// otherwise the flavor's default.
    fn resolve_version(
        &self,
        requested: GlslVersion,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> GlslVersion {
        let fallback = match self.flavor {
            GlslFlavor::Desktop => GlslVersion::Core450,
            GlslFlavor::Es => GlslVersion::Es300,
        };
        if requested.is_es() == (self.flavor == GlslFlavor::Es) {
            requested
        } else {
            diagnostics.push(Diagnostic::warning(format!(
                "GLSL version {requested} does not match target, using {fallback}"
            )));
            fallback
        }
    }
}

impl Backend for GlslBackend {
    fn name(&self) -> &str {
        match self.flavor {
            GlslFlavor::Desktop => "GLSL",
            GlslFlavor::Es => "GLSL ES",
        }
    }

    fn targets(&self) -> &[&str] {
        match self.flavor {
            GlslFlavor::Desktop => &["glsl"],
            GlslFlavor::Es => &["glsl-es"],
        }
    }

    fn compile(
        &self,
        program: &ValidatedProgram,
        opts: &BackendOptions,
    ) -> Result<BackendOutput, BackendError> {
        if program.stages().is_empty() {
            return Err(BackendError::Other("program has no stages".into()));
        }
        let mut diagnostics = Vec::new();
        let version = self.resolve_version(opts.glsl_version, &mut diagnostics);

        let mut files = Vec::new();
        for stage in program.stages() {
            if stage.kind == StageKind::Vertex
                && !uses_builtin(program, stage, BuiltinValue::Position)
            {
                diagnostics.push(Diagnostic::stage_warning(
                    stage.kind,
                    "never writes the position built-in",
                ));
            }
            let source = emit_stage(program, stage, version, opts, &mut diagnostics)?;
            let ext = match stage.kind {
                StageKind::Vertex => "vert",
                StageKind::Fragment => "frag",
                StageKind::Compute => "comp",
            };
            log::debug!("generated {} GLSL {} shader", program.name(), stage.kind);
            files.push(OutputFile::for_stage(
                format!("{}.{ext}", program.name()),
                stage.kind,
                source,
            ));
        }
        Ok(BackendOutput { files, diagnostics })
    }
}

fn uses_builtin(program: &Program, stage: &Stage, value: BuiltinValue) -> bool {
    stage
        .builtins
        .iter()
        .any(|v| program.variable(*v).kind == VariableKind::Builtin(value))
}

/// Integer varyings must not be interpolated.
fn interpolation(ty: KslType) -> &'static str {
    match ty.scalar_kind() {
        Some(ScalarKind::Int | ScalarKind::Uint) => "flat ",
        _ => "",
    }
}

fn uniform_decl(
    generator: &GlslGenerator,
    name: &str,
    ty: KslType,
    usage: StorageUsage,
    version: GlslVersion,
    opts: &BackendOptions,
) -> Result<String, BackendError> {
    let ty_name = generator.type_name(ty);
    match ty {
        KslType::Sampler(s) => {
            if version.is_es() && matches!(s.dim(), SamplerDim::D1 | SamplerDim::CubeArray) {
                return Err(BackendError::Unsupported(format!(
                    "{ty_name} in GLSL ES ({name})"
                )));
            }
            if s == ksl_ir::SamplerType::DEPTH_CUBE_ARRAY {
                return Err(BackendError::Unsupported(format!(
                    "depth cube array sampling ({name})"
                )));
            }
            if version.is_es() {
                Ok(format!("uniform {} {ty_name} {name};", opts.precision))
            } else {
                Ok(format!("uniform {ty_name} {name};"))
            }
        }
        KslType::Storage(s) => {
            if version == GlslVersion::Es300 {
                return Err(BackendError::Unsupported(format!(
                    "storage textures in GLSL 300 es ({name})"
                )));
            }
            let format = image_format(s.texel_type()).ok_or_else(|| {
                BackendError::Unsupported(format!("storage texel type {}", s.texel_type()))
            })?;
            let access = match (usage.loads, usage.stores) {
                (true, false) => "readonly ",
                (false, true) => "writeonly ",
                _ => "",
            };
            // ES only allows read-write access to single-channel 32-bit images
            if version.is_es() && access.is_empty() && !format.starts_with("r32") {
                return Err(BackendError::Unsupported(format!(
                    "read-write {format} image in GLSL ES ({name})"
                )));
            }
            Ok(format!(
                "layout({format}) uniform {access}highp {ty_name} {name};"
            ))
        }
        KslType::Array { elem, size } => Ok(format!(
            "uniform {} {name}[{size}];",
            generator.type_name(elem.into())
        )),
        _ => Ok(format!("uniform {ty_name} {name};")),
    }
}

/// The `layout` format qualifier of an image, `None` for three-component texels.
fn image_format(texel: KslType) -> Option<&'static str> {
    let format = match (texel.component_count()?, texel.scalar_kind()?) {
        (1, ScalarKind::Float) => "r32f",
        (1, ScalarKind::Int) => "r32i",
        (1, ScalarKind::Uint) => "r32ui",
        (2, ScalarKind::Float) => "rg32f",
        (2, ScalarKind::Int) => "rg32i",
        (2, ScalarKind::Uint) => "rg32ui",
        (4, ScalarKind::Float) => "rgba32f",
        (4, ScalarKind::Int) => "rgba32i",
        (4, ScalarKind::Uint) => "rgba32ui",
        _ => return None,
    };
    Some(format)
}

fn emit_stage(
    program: &Program,
    stage: &Stage,
    version: GlslVersion,
    opts: &BackendOptions,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<String, BackendError> {
    let generator = GlslGenerator;
    let mut out = SourceWriter::new();
    out.line(format!("#version {}", version.directive()));
    if version.is_es() {
        out.line(format!("precision {} float;", opts.precision));
        out.line(format!("precision {} int;", opts.precision));
    }

    if let Some([x, y, z]) = stage.workgroup_size {
        if !version.supports_compute() {
            return Err(BackendError::Unsupported(format!(
                "compute shaders in GLSL {version}"
            )));
        }
        out.blank();
        out.line(format!(
            "layout(local_size_x = {x}, local_size_y = {y}, local_size_z = {z}) in;"
        ));
    }

    if !program.uniforms().is_empty() {
        out.blank();
        for &u in program.uniforms() {
            let var = program.variable(u);
            let usage = program.storage_usage(u);
            out.line(uniform_decl(&generator, &var.name, var.ty, usage, version, opts)?);
        }
    }

    if !stage.inputs.is_empty() || !stage.outputs.is_empty() {
        out.blank();
    }
    for (&v, direction) in stage
        .inputs
        .iter()
        .map(|v| (v, "in"))
        .chain(stage.outputs.iter().map(|v| (v, "out")))
    {
        let var = program.variable(v);
        let location = match var.kind {
            VariableKind::StageInput { location } | VariableKind::StageOutput { location } => {
                location
            }
            _ => continue,
        };
        // vertex inputs and fragment outputs are attribute/attachment bound
        let varying = matches!(
            (stage.kind, direction),
            (StageKind::Vertex, "out") | (StageKind::Fragment, "in")
        );
        let layout = if !varying || version.supports_varying_locations() {
            format!("layout(location = {location}) ")
        } else {
            String::new()
        };
        let flat = if varying { interpolation(var.ty) } else { "" };
        out.line(format!(
            "{layout}{flat}{direction} {} {};",
            generator.type_name(var.ty),
            var.name
        ));
    }

    out.blank();
    out.line("void main() {");
    out.indent();
    let mut ctx = EmitContext::new(opts.annotate);
    emit_scope(program, stage.main, &generator, &mut ctx, &mut out)?;
    diagnostics.extend(ctx.into_diagnostics());
    out.dedent();
    out.line("}");
    Ok(out.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ksl_backend_core::FloatPrecision;
    use ksl_ir::{BinaryOp, SamplerType};

    fn tinted_quad() -> ValidatedProgram {
        let mut program = Program::new("quad");
        let vs = program.add_stage(StageKind::Vertex).unwrap();
        let fs = program.add_stage(StageKind::Fragment).unwrap();
        let tint = program.uniform("uTint", KslType::FLOAT4).unwrap();
        let pos_in = program
            .stage_input(StageKind::Vertex, "aPosition", KslType::FLOAT4)
            .unwrap();
        let id_out = program
            .stage_output(StageKind::Vertex, "vId", KslType::INT1)
            .unwrap();
        let position = program.builtin(BuiltinValue::Position).unwrap();
        let target = program.var(position).unwrap();
        let value = program.var(pos_in).unwrap();
        program.assign(vs, target, value).unwrap();
        let id = program.builtin(BuiltinValue::VertexIndex).unwrap();
        let id_target = program.var(id_out).unwrap();
        let id_value = program.var(id).unwrap();
        program.assign(vs, id_target, id_value).unwrap();

        program
            .stage_input(StageKind::Fragment, "vId", KslType::INT1)
            .unwrap();
        let color = program
            .stage_output(StageKind::Fragment, "fColor", KslType::FLOAT4)
            .unwrap();
        let c = program.var(color).unwrap();
        let t = program.var(tint).unwrap();
        let half = program.float1(0.5);
        let scaled = program.binary(BinaryOp::Multiply, t, half).unwrap();
        program.assign(fs, c, scaled).unwrap();
        program.freeze().unwrap()
    }

    #[test]
    fn desktop_stages() {
        let program = tinted_quad();
        let output = GlslBackend::desktop()
            .compile(&program, &BackendOptions::default())
            .unwrap();
        assert_eq!(output.files.len(), 2);
        assert!(output.diagnostics.is_empty());

        let vert = output.file("quad.vert").map(|f| f.source.as_str()).unwrap();
        let expected = "\
#version 450 core

uniform vec4 uTint;

layout(location = 0) in vec4 aPosition;
layout(location = 0) flat out int vId;

void main() {
    gl_Position = aPosition;
    vId = gl_VertexID;
}
";
        assert_eq!(vert, expected);

        let frag = output.file("quad.frag").map(|f| f.source.as_str()).unwrap();
        assert!(frag.contains("layout(location = 0) flat in int vId;"));
        assert!(frag.contains("fColor = (uTint * 0.5);"));
    }

    #[test]
    fn es_precision_and_locations() {
        let program = tinted_quad();
        let opts = BackendOptions {
            precision: FloatPrecision::Medium,
            ..BackendOptions::default()
        };
        let output = GlslBackend::es().compile(&program, &opts).unwrap();
        // 450 core was requested, which is not an ES version
        assert_eq!(output.diagnostics.len(), 1);
        let frag = output.file("quad.frag").map(|f| f.source.as_str()).unwrap();
        assert!(frag.starts_with("#version 300 es\nprecision mediump float;\n"));
        assert!(frag.contains("\nflat in int vId;"));
        assert!(frag.contains("layout(location = 0) out vec4 fColor;"));
    }

    #[test]
    fn compute_stage_layout() {
        let mut program = Program::new("fill");
        program.add_compute_stage([8, 4, 1]).unwrap();
        let program = program.freeze().unwrap();
        let output = GlslBackend::desktop()
            .compile(&program, &BackendOptions::default())
            .unwrap();
        let comp = output.file("fill.comp").map(|f| f.source.as_str()).unwrap();
        assert!(comp.contains("layout(local_size_x = 8, local_size_y = 4, local_size_z = 1) in;"));

        let opts = BackendOptions {
            glsl_version: GlslVersion::Es300,
            ..BackendOptions::default()
        };
        assert!(matches!(
            GlslBackend::es().compile(&program, &opts),
            Err(BackendError::Unsupported(_))
        ));
    }

    #[test]
    fn depth_cube_array_is_rejected() {
        let mut program = Program::new("shadow");
        program.add_stage(StageKind::Fragment).unwrap();
        program
            .uniform("tShadow", SamplerType::DEPTH_CUBE_ARRAY.into())
            .unwrap();
        let program = program.freeze().unwrap();
        assert!(matches!(
            GlslBackend::desktop().compile(&program, &BackendOptions::default()),
            Err(BackendError::Unsupported(_))
        ));
    }

    #[test]
    fn missing_position_is_reported() {
        let mut program = Program::new("empty");
        program.add_stage(StageKind::Vertex).unwrap();
        let program = program.freeze().unwrap();
        let output = GlslBackend::desktop()
            .compile(&program, &BackendOptions::default())
            .unwrap();
        assert_eq!(output.diagnostics.len(), 1);
    }

    fn copy_image(texel: KslType, load: bool) -> ValidatedProgram {
        let mut program = Program::new("copy");
        let main = program.add_compute_stage([8, 8, 1]).unwrap();
        let storage = ksl_ir::StorageType::new(ksl_ir::StorageDim::D2, texel).unwrap();
        let image = program.uniform("image", storage.into()).unwrap();
        let gid = program.builtin(BuiltinValue::GlobalInvocationId).unwrap();
        let rg = program.var(gid).unwrap();
        let xy = program.swizzle(rg, "xy").unwrap();
        let coord = program.convert(xy, ScalarKind::Int).unwrap();
        let ri = program.var(image).unwrap();
        let value = if load {
            let texel = program.storage_load(ri, coord).unwrap();
            program.binary(BinaryOp::Add, texel, texel).unwrap()
        } else {
            let one = program.float1(1.0);
            program.compose(texel, &[one]).unwrap()
        };
        program.storage_store(main, ri, coord, value).unwrap();
        program.freeze().unwrap()
    }

    #[test]
    fn write_only_image_store() {
        let program = copy_image(KslType::FLOAT4, false);
        let output = GlslBackend::desktop()
            .compile(&program, &BackendOptions::default())
            .unwrap();
        let comp = output.file("copy.comp").map(|f| f.source.as_str()).unwrap();
        assert!(comp.contains("layout(rgba32f) uniform writeonly highp image2D image;"));
        assert!(comp.contains(
            "imageStore(image, ivec2(gl_GlobalInvocationID.xy), vec4(1.0));"
        ));
    }

    #[test]
    fn read_write_image_in_es_needs_single_channel() {
        let opts = BackendOptions {
            glsl_version: GlslVersion::Es310,
            ..BackendOptions::default()
        };
        let single = copy_image(KslType::FLOAT1, true);
        let output = GlslBackend::es().compile(&single, &opts).unwrap();
        let comp = output.file("copy.comp").map(|f| f.source.as_str()).unwrap();
        assert!(comp.contains("layout(r32f) uniform highp image2D image;"));
        assert!(comp.contains("(imageLoad(image, ivec2(gl_GlobalInvocationID.xy)).x + "));

        let wide = copy_image(KslType::FLOAT2, true);
        assert!(matches!(
            GlslBackend::es().compile(&wide, &opts),
            Err(BackendError::Unsupported(_))
        ));
        assert!(GlslBackend::desktop()
            .compile(&wide, &BackendOptions::default())
            .is_ok());
    }

    #[test]
    fn image_formats() {
        assert_eq!(image_format(KslType::FLOAT4), Some("rgba32f"));
        assert_eq!(image_format(KslType::INT1), Some("r32i"));
        assert_eq!(image_format(KslType::UINT2), Some("rg32ui"));
        assert_eq!(image_format(KslType::FLOAT3), None);
    }
}
