use ksl_backend_core::{Backend, BackendError, BackendOptions, BackendOutput};
use ksl_ir::{
    BinaryOp, BuiltinFunction, BuiltinValue, Handle, KslType, Program, StageKind, ValidatedProgram,
    Variable,
};

/// Handles of interest in [`blend_program`].
#[allow(dead_code)]
pub struct BlendProgram {
    pub program: Program,
    pub tint: Handle<Variable>,
    pub mixed: Handle<Variable>,
}

/// A vertex + fragment program whose fragment stage mixes the interpolated
/// color with a uniform tint in a `blend` block.
pub fn blend_program() -> BlendProgram {
    let mut p = Program::new("blend");
    let vs = p.add_stage(StageKind::Vertex).unwrap();
    let fs = p.add_stage(StageKind::Fragment).unwrap();
    let u_tint = p.uniform("uTint", KslType::FLOAT4).unwrap();
    let u_amount = p.uniform("uAmount", KslType::FLOAT1).unwrap();

    let a_position = p
        .stage_input(StageKind::Vertex, "aPosition", KslType::FLOAT4)
        .unwrap();
    let a_color = p
        .stage_input(StageKind::Vertex, "aColor", KslType::FLOAT4)
        .unwrap();
    let v_color = p
        .stage_output(StageKind::Vertex, "vColor", KslType::FLOAT4)
        .unwrap();
    let position = p.builtin(BuiltinValue::Position).unwrap();
    let target = p.var(position).unwrap();
    let value = p.var(a_position).unwrap();
    p.assign(vs, target, value).unwrap();
    let target = p.var(v_color).unwrap();
    let value = p.var(a_color).unwrap();
    p.assign(vs, target, value).unwrap();

    let f_color = p
        .stage_input(StageKind::Fragment, "vColor", KslType::FLOAT4)
        .unwrap();
    let out_color = p
        .stage_output(StageKind::Fragment, "fColor", KslType::FLOAT4)
        .unwrap();

    let tint = p.declare(fs, "tint", KslType::FLOAT4, None).unwrap();
    let target = p.var(tint).unwrap();
    let value = p.var(u_tint).unwrap();
    p.assign(fs, target, value).unwrap();

    let block = p.add_block(fs, "blend").unwrap();
    let base = p.var(f_color).unwrap();
    let tint_read = p.var(tint).unwrap();
    let amount = p.var(u_amount).unwrap();
    let a = p.in_float4(block, Some("base"), Some(base)).unwrap();
    let b = p.in_float4(block, Some("overlay"), None).unwrap();
    p.bind_input(b, tint_read).unwrap();
    let t = p.in_float1(block, Some("amount"), Some(amount)).unwrap();
    let mixed = p.out_float4(block, Some("mixed")).unwrap();

    let body = p.block(block).body();
    let a = p.input_expr(a);
    let b = p.input_expr(b);
    let t = p.input_expr(t);
    let mix = p.builtin_call(BuiltinFunction::Mix, &[a, b, t]).unwrap();
    let target = p.var(mixed).unwrap();
    p.assign(body, target, mix).unwrap();

    let target = p.var(out_color).unwrap();
    let value = p.var(mixed).unwrap();
    let two = p.float1(2.0);
    let doubled = p.binary(BinaryOp::Multiply, value, two).unwrap();
    p.assign(fs, target, doubled).unwrap();

    BlendProgram {
        program: p,
        tint,
        mixed,
    }
}

/// Freeze a program, panicking on validation errors.
#[allow(dead_code)]
pub fn freeze(program: Program) -> ValidatedProgram {
    program.freeze().expect("validation failed")
}

/// Compile with the given backend and options.
#[allow(dead_code)]
pub fn try_compile(
    program: &ValidatedProgram,
    backend: &dyn Backend,
    opts: &BackendOptions,
) -> Result<BackendOutput, BackendError> {
    backend.compile(program, opts)
}

/// Compile with default options, panicking on failure.
#[allow(dead_code)]
pub fn compile(program: &ValidatedProgram, backend: &dyn Backend) -> BackendOutput {
    try_compile(program, backend, &BackendOptions::default()).expect("code generation failed")
}

/// The text of the named output file.
#[allow(dead_code)]
pub fn text<'a>(output: &'a BackendOutput, name: &str) -> &'a str {
    output
        .file(name)
        .map(|f| f.source.as_str())
        .unwrap_or_else(|| panic!("no text output named {name}"))
}
