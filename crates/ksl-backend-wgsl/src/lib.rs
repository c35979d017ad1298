//! WGSL backend for KSL.
//!
//! All stages go into one module. Uniforms become bindings in group 0;
//! each sampler takes two consecutive bindings, the texture and its
//! `_sampler`. Stage interface variables are mirrored into module-scope
//! privates so statement bodies read and write them by name, and each entry
//! point copies its input struct in and its output struct out.

use ksl_backend_core::{
    Backend, BackendError, BackendOptions, BackendOutput, Diagnostic, EmitContext, OutputFile,
    SourceWriter, emit_scope,
};
use ksl_ir::{
    BuiltinValue, KslGenerator, KslType, Program, SamplerKind, SamplerType, ScalarKind, Stage,
    StageKind, StatementKind, ValidatedProgram, Variable, VariableKind,
};

mod generator;

pub use generator::WgslGenerator;

use generator::{private_name, storage_texture_name, texel_format};

/// WGSL source backend, target `wgsl`.
#[derive(Debug, Default)]
pub struct WgslBackend;

impl Backend for WgslBackend {
    fn name(&self) -> &str {
        "WGSL"
    }

    fn targets(&self) -> &[&str] {
        &["wgsl"]
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
        let mut out = SourceWriter::new();

        let types = WgslGenerator::new(StageKind::Fragment);
        emit_uniforms(program, &types, &mut out)?;
        for stage in program.stages() {
            if stage.kind == StageKind::Vertex
                && builtin_of(program, stage, BuiltinValue::Position).is_none()
            {
                diagnostics.push(Diagnostic::stage_warning(
                    stage.kind,
                    "never writes the position built-in; it is left at zero",
                ));
            }
            if stage.kind == StageKind::Vertex && stores_to_storage(program, stage.kind) {
                return Err(BackendError::Unsupported(
                    "storage texture writes in a vertex stage".into(),
                ));
            }
            emit_stage(program, stage, opts, &mut out, &mut diagnostics)?;
            log::debug!("generated {} WGSL {} entry point", program.name(), stage.kind);
        }

        Ok(BackendOutput {
            files: vec![OutputFile::whole_program(
                format!("{}.wgsl", program.name()),
                out.finish(),
            )],
            diagnostics,
        })
    }
}

fn builtin_of<'a>(
    program: &'a Program,
    stage: &Stage,
    value: BuiltinValue,
) -> Option<&'a Variable> {
    stage
        .builtins
        .iter()
        .map(|v| program.variable(*v))
        .find(|var| var.kind == VariableKind::Builtin(value))
}

fn stores_to_storage(program: &Program, kind: StageKind) -> bool {
    program.statements().iter().any(|(_, stmt)| {
        matches!(stmt.kind, StatementKind::StorageStore { .. })
            && program.scope(stmt.scope).stage == kind
    })
}

fn emit_uniforms(
    program: &Program,
    types: &WgslGenerator,
    out: &mut SourceWriter,
) -> Result<(), BackendError> {
    let mut binding = 0u32;
    for &u in program.uniforms() {
        let var = program.variable(u);
        let name = &var.name;
        match var.ty {
            KslType::Sampler(s) => {
                if s == SamplerType::DEPTH_CUBE_ARRAY {
                    return Err(BackendError::Unsupported(format!(
                        "depth cube array sampling ({name})"
                    )));
                }
                let sampler = match s.kind() {
                    SamplerKind::Color => "sampler",
                    SamplerKind::Depth => "sampler_comparison",
                };
                out.line(format!(
                    "@group(0) @binding({binding}) var {name}: {};",
                    types.type_name(var.ty)
                ));
                out.line(format!(
                    "@group(0) @binding({}) var {name}_sampler: {sampler};",
                    binding + 1
                ));
                binding += 2;
            }
            KslType::Storage(s) => {
                if texel_format(s.texel_type()).is_none() {
                    return Err(BackendError::Unsupported(format!(
                        "storage texel type {} ({name})",
                        s.texel_type()
                    )));
                }
                let usage = program.storage_usage(u);
                let access = match (usage.loads, usage.stores) {
                    (true, true) => "read_write",
                    (true, false) => "read",
                    _ => "write",
                };
                if access == "read_write" && s.texel_type().component_count() != Some(1) {
                    return Err(BackendError::Unsupported(format!(
                        "read_write storage texture of {} ({name})",
                        s.texel_type()
                    )));
                }
                out.line(format!(
                    "@group(0) @binding({binding}) var {name}: {};",
                    storage_texture_name(s, access)
                ));
                binding += 1;
            }
            ty => {
                check_uniform_type(name, ty)?;
                out.line(format!(
                    "@group(0) @binding({binding}) var<uniform> {name}: {};",
                    types.type_name(ty)
                ));
                binding += 1;
            }
        }
    }
    if binding > 0 {
        out.blank();
    }
    Ok(())
}

/// Uniform buffers hold no booleans, and array elements must be 16-byte
/// aligned.
fn check_uniform_type(name: &str, ty: KslType) -> Result<(), BackendError> {
    if ty.scalar_kind() == Some(ScalarKind::Bool)
        || ty.array_element().and_then(|(e, _)| e.scalar_kind()) == Some(ScalarKind::Bool)
    {
        return Err(BackendError::Unsupported(format!("bool uniform {name}")));
    }
    if let Some((elem, _)) = ty.array_element() {
        let aligned = elem.is_matrix() || elem.component_count().is_some_and(|n| n >= 3);
        if !aligned {
            return Err(BackendError::Unsupported(format!(
                "uniform array {name} of {elem}"
            )));
        }
    }
    Ok(())
}

/// The `@builtin(..)` attribute name and WGSL type of a built-in, when they
/// differ from the KSL ones.
fn builtin_attribute(value: BuiltinValue) -> (&'static str, Option<&'static str>) {
    match value {
        BuiltinValue::Position | BuiltinValue::FragCoord => ("position", None),
        BuiltinValue::VertexIndex => ("vertex_index", Some("u32")),
        BuiltinValue::InstanceIndex => ("instance_index", Some("u32")),
        BuiltinValue::FragDepth => ("frag_depth", None),
        BuiltinValue::GlobalInvocationId => ("global_invocation_id", None),
        BuiltinValue::LocalInvocationId => ("local_invocation_id", None),
    }
}

/// One member of an entry point's input or output struct.
struct Member<'a> {
    variable: &'a Variable,
    attribute: String,
    /// Interface type, if it differs from the variable's.
    wire_type: Option<&'static str>,
}

fn struct_name(kind: StageKind, suffix: &str) -> String {
    let stage = kind.to_string();
    let mut chars = stage.chars();
    match chars.next() {
        Some(first) => format!("{}{}{suffix}", first.to_ascii_uppercase(), chars.as_str()),
        None => suffix.to_owned(),
    }
}

fn members<'a>(
    program: &'a Program,
    stage: &Stage,
    output: bool,
) -> Result<Vec<Member<'a>>, BackendError> {
    let located = if output { &stage.outputs } else { &stage.inputs };
    if stage.kind == StageKind::Compute && !located.is_empty() {
        return Err(BackendError::Unsupported(
            "location-bound variables in a compute stage".into(),
        ));
    }

    let mut members = Vec::new();
    for &v in located {
        let variable = program.variable(v);
        let location = match variable.kind {
            VariableKind::StageInput { location } | VariableKind::StageOutput { location } => {
                location
            }
            _ => continue,
        };
        let varying = matches!(
            (stage.kind, output),
            (StageKind::Vertex, true) | (StageKind::Fragment, false)
        );
        let flat = varying
            && matches!(
                variable.ty.scalar_kind(),
                Some(ScalarKind::Int | ScalarKind::Uint)
            );
        let attribute = if flat {
            format!("@location({location}) @interpolate(flat)")
        } else {
            format!("@location({location})")
        };
        members.push(Member {
            variable,
            attribute,
            wire_type: None,
        });
    }
    for &v in &stage.builtins {
        let variable = program.variable(v);
        let VariableKind::Builtin(value) = variable.kind else {
            continue;
        };
        if value.is_output() != output {
            continue;
        }
        let (attribute, wire_type) = builtin_attribute(value);
        members.push(Member {
            variable,
            attribute: format!("@builtin({attribute})"),
            wire_type,
        });
    }
    Ok(members)
}

fn emit_struct(
    name: &str,
    members: &[Member<'_>],
    extra: Option<&str>,
    generator: &WgslGenerator,
    out: &mut SourceWriter,
) {
    out.line(format!("struct {name} {{"));
    out.indent();
    if let Some(extra) = extra {
        out.line(extra);
    }
    for m in members {
        let ty = match m.wire_type {
            Some(t) => t.to_owned(),
            None => generator.type_name(m.variable.ty),
        };
        out.line(format!("{} {}: {ty},", m.attribute, m.variable.name));
    }
    out.dedent();
    out.line("}");
    out.blank();
}

fn emit_stage(
    program: &Program,
    stage: &Stage,
    opts: &BackendOptions,
    out: &mut SourceWriter,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<(), BackendError> {
    let generator = WgslGenerator::new(stage.kind);
    let inputs = members(program, stage, false)?;
    let outputs = members(program, stage, true)?;
    let input_struct = struct_name(stage.kind, "Input");
    let output_struct = struct_name(stage.kind, "Output");

    // a vertex stage must produce a position even if nothing writes it
    let missing_position = stage.kind == StageKind::Vertex
        && builtin_of(program, stage, BuiltinValue::Position).is_none();
    let has_output = !outputs.is_empty() || missing_position;

    if !inputs.is_empty() {
        emit_struct(&input_struct, &inputs, None, &generator, out);
    }
    if has_output {
        let extra = missing_position.then_some("@builtin(position) position: vec4<f32>,");
        emit_struct(&output_struct, &outputs, extra, &generator, out);
    }

    let privates: Vec<&Variable> = inputs.iter().chain(&outputs).map(|m| m.variable).collect();
    for var in &privates {
        out.line(format!(
            "var<private> {}: {};",
            private_name(var),
            generator.type_name(var.ty)
        ));
    }
    if !privates.is_empty() {
        out.blank();
    }

    match stage.workgroup_size {
        Some([x, y, z]) => out.line(format!("@compute @workgroup_size({x}, {y}, {z})")),
        None => out.line(format!("@{}", stage.kind)),
    }
    let params = if inputs.is_empty() {
        String::new()
    } else {
        format!("input: {input_struct}")
    };
    let ret = if has_output {
        format!(" -> {output_struct}")
    } else {
        String::new()
    };
    out.line(format!("fn {}Main({params}){ret} {{", stage.kind));
    out.indent();

    for m in &inputs {
        let field = format!("input.{}", m.variable.name);
        let value = match m.wire_type {
            Some(_) => generator.convert(m.variable.ty, &field),
            None => field,
        };
        out.line(format!("{} = {value};", private_name(m.variable)));
    }

    let mut ctx = EmitContext::new(opts.annotate);
    emit_scope(program, stage.main, &generator, &mut ctx, out)?;
    diagnostics.extend(ctx.into_diagnostics());

    if has_output {
        out.line(format!("var output: {output_struct};"));
        if missing_position {
            out.line("output.position = vec4<f32>(0.0);");
        }
        for m in &outputs {
            out.line(format!(
                "output.{} = {};",
                m.variable.name,
                private_name(m.variable)
            ));
        }
        out.line("return output;");
    }
    out.dedent();
    out.line("}");
    out.blank();
    Ok(())
}
