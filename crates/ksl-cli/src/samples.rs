//! Sample programs bundled with `kslc`.

use ksl_ir::{
    BinaryOp, BuiltinFunction, BuiltinValue, IrError, KslType, Program, SamplerType, ScalarKind,
    StageKind, StorageDim, StorageType,
};

/// A bundled sample: its name, a one-line summary and its builder.
pub struct Sample {
    pub name: &'static str,
    pub summary: &'static str,
    pub build: fn() -> Result<Program, IrError>,
}

pub const SAMPLES: &[Sample] = &[
    Sample {
        name: "lit",
        summary: "textured mesh with a diffuse lighting block",
        build: lit,
    },
    Sample {
        name: "skinned",
        summary: "bone matrices, column access, loops and a transform block",
        build: skinned,
    },
    Sample {
        name: "gradient",
        summary: "compute stage writing a coordinate gradient",
        build: gradient,
    },
];

pub fn find(name: &str) -> Option<&'static Sample> {
    SAMPLES.iter().find(|s| s.name == name)
}

fn lit() -> Result<Program, IrError> {
    let mut p = Program::new("lit");
    let vs = p.add_stage(StageKind::Vertex)?;
    let fs = p.add_stage(StageKind::Fragment)?;

    let u_model = p.uniform("uModel", KslType::MAT4)?;
    let u_view_proj = p.uniform("uViewProj", KslType::MAT4)?;
    let u_light_dir = p.uniform("uLightDir", KslType::FLOAT3)?;
    let u_color = p.uniform("uColor", KslType::FLOAT4)?;
    let t_albedo = p.uniform("tAlbedo", SamplerType::COLOR_2D.into())?;

    // vertex
    let a_position = p.stage_input(StageKind::Vertex, "aPosition", KslType::FLOAT4)?;
    let a_normal = p.stage_input(StageKind::Vertex, "aNormal", KslType::FLOAT3)?;
    let a_uv = p.stage_input(StageKind::Vertex, "aUv", KslType::FLOAT2)?;
    let v_normal = p.stage_output(StageKind::Vertex, "vNormal", KslType::FLOAT3)?;
    let v_uv = p.stage_output(StageKind::Vertex, "vUv", KslType::FLOAT2)?;
    let position = p.builtin(BuiltinValue::Position)?;

    let model = p.var(u_model)?;
    let pos = p.var(a_position)?;
    let world_pos = p.binary(BinaryOp::Multiply, model, pos)?;
    let world = p.declare(vs, "world", KslType::FLOAT4, Some(world_pos))?;
    let view_proj = p.var(u_view_proj)?;
    let world = p.var(world)?;
    let clip = p.binary(BinaryOp::Multiply, view_proj, world)?;
    let target = p.var(position)?;
    p.assign(vs, target, clip)?;

    let normal = p.var(a_normal)?;
    let zero = p.float1(0.0);
    let normal4 = p.compose(KslType::FLOAT4, &[normal, zero])?;
    let world_normal = p.binary(BinaryOp::Multiply, model, normal4)?;
    let world_normal = p.swizzle(world_normal, "xyz")?;
    let target = p.var(v_normal)?;
    p.assign(vs, target, world_normal)?;
    let target = p.var(v_uv)?;
    let uv = p.var(a_uv)?;
    p.assign(vs, target, uv)?;

    // fragment
    let f_normal = p.stage_input(StageKind::Fragment, "vNormal", KslType::FLOAT3)?;
    let f_uv = p.stage_input(StageKind::Fragment, "vUv", KslType::FLOAT2)?;
    let f_color = p.stage_output(StageKind::Fragment, "fColor", KslType::FLOAT4)?;

    let lambert = p.add_block(fs, "lambert")?;
    let n = p.var(f_normal)?;
    let n = p.builtin_call(BuiltinFunction::Normalize, &[n])?;
    let light = p.var(u_light_dir)?;
    let in_normal = p.in_float3(lambert, Some("normal"), Some(n))?;
    let in_light = p.in_float3(lambert, Some("light"), Some(light))?;
    let diffuse = p.out_float1(lambert, Some("diffuse"))?;

    let body = p.block(lambert).body();
    let n = p.input_expr(in_normal);
    let l = p.input_expr(in_light);
    let n_dot_l = p.builtin_call(BuiltinFunction::Dot, &[n, l])?;
    let floor = p.float1(0.0);
    let clamped = p.builtin_call(BuiltinFunction::Max, &[n_dot_l, floor])?;
    let target = p.var(diffuse)?;
    p.assign(body, target, clamped)?;

    let sampler = p.var(t_albedo)?;
    let uv = p.var(f_uv)?;
    let texel = p.sample(sampler, uv)?;
    let tint = p.var(u_color)?;
    let tinted = p.binary(BinaryOp::Multiply, texel, tint)?;
    let color = p.declare(fs, "color", KslType::FLOAT4, Some(tinted))?;

    let out = p.var(f_color)?;
    let color = p.var(color)?;
    p.assign(fs, out, color)?;
    let out_rgb = p.swizzle(out, "xyz")?;
    let rgb = p.swizzle(color, "xyz")?;
    let diffuse = p.var(diffuse)?;
    let shaded = p.binary(BinaryOp::Multiply, rgb, diffuse)?;
    p.assign(fs, out_rgb, shaded)?;
    Ok(p)
}

fn skinned() -> Result<Program, IrError> {
    let mut p = Program::new("skinned");
    let vs = p.add_stage(StageKind::Vertex)?;
    let fs = p.add_stage(StageKind::Fragment)?;

    let u_bones = p.uniform("uBones", KslType::array(KslType::MAT4, 4)?)?;
    let u_view_proj = p.uniform("uViewProj", KslType::MAT4)?;
    let a_position = p.stage_input(StageKind::Vertex, "aPosition", KslType::FLOAT4)?;
    let a_bone = p.stage_input(StageKind::Vertex, "aBone", KslType::INT1)?;
    let v_bone = p.stage_output(StageKind::Vertex, "vBone", KslType::INT1)?;
    let position = p.builtin(BuiltinValue::Position)?;

    let bones = p.var(u_bones)?;
    let bone_index = p.var(a_bone)?;
    let bone = p.array_element(bones, bone_index)?;
    let skin = p.declare(vs, "skin", KslType::MAT4, Some(bone))?;
    let skin = p.var(skin)?;

    // sum the rotation columns, then add the translation column
    let zero = p.float1(0.0);
    let splat = p.compose(KslType::FLOAT4, &[zero])?;
    let acc = p.declare(vs, "acc", KslType::FLOAT4, Some(splat))?;
    let acc = p.var(acc)?;
    let start = p.int1(0);
    let end = p.int1(3);
    let columns = p.add_loop(vs, start, end)?;
    let i = p.var(columns.counter)?;
    let column = p.matrix_column(skin, i)?;
    let sum = p.binary(BinaryOp::Add, acc, column)?;
    p.assign(columns.body, acc, sum)?;
    let translation = p.matrix_column_const(skin, 3)?;
    let pos = p.var(a_position)?;
    let moved = p.binary(BinaryOp::Add, pos, translation)?;
    p.assign(vs, acc, moved)?;

    let transform = p.add_block(vs, "transform")?;
    let view_proj = p.var(u_view_proj)?;
    let matrix = p.in_mat4(transform, Some("matrix"), Some(view_proj))?;
    let point = p.in_float4(transform, Some("point"), Some(acc))?;
    let result = p.out_float4(transform, Some("result"))?;
    let body = p.block(transform).body();
    let m = p.input_expr(matrix);
    let v = p.input_expr(point);
    let product = p.binary(BinaryOp::Multiply, m, v)?;
    let target = p.var(result)?;
    p.assign(body, target, product)?;

    let no_bone = p.int1(0);
    let unskinned = p.binary(BinaryOp::Less, bone_index, no_bone)?;
    let branch = p.add_if(vs, unskinned)?;
    let target = p.var(position)?;
    p.assign(branch.accept, target, pos)?;
    let result = p.var(result)?;
    p.assign(branch.reject, target, result)?;
    let target = p.var(v_bone)?;
    p.assign(vs, target, bone_index)?;

    p.stage_input(StageKind::Fragment, "vBone", KslType::INT1)?;
    let f_color = p.stage_output(StageKind::Fragment, "fColor", KslType::FLOAT4)?;
    let one = p.float1(1.0);
    let white = p.compose(KslType::FLOAT4, &[one])?;
    let target = p.var(f_color)?;
    p.assign(fs, target, white)?;
    Ok(p)
}

fn gradient() -> Result<Program, IrError> {
    let mut p = Program::new("gradient");
    let cs = p.add_compute_stage([8, 8, 1])?;
    let image = p.uniform(
        "image",
        StorageType::new(StorageDim::D2, KslType::FLOAT4)?.into(),
    )?;
    let gid = p.builtin(BuiltinValue::GlobalInvocationId)?;
    let gid = p.var(gid)?;
    let xy = p.swizzle(gid, "xy")?;
    let texel = p.convert(xy, ScalarKind::Int)?;
    let coord = p.convert(xy, ScalarKind::Float)?;
    let scale = p.float1(0.125);
    let uv = p.binary(BinaryOp::Multiply, coord, scale)?;
    let uv = p.builtin_call(BuiltinFunction::Fract, &[uv])?;
    let uv = p.declare(cs, "uv", KslType::FLOAT2, Some(uv))?;
    let uv = p.var(uv)?;
    let blue = p.float1(0.5);
    let alpha = p.float1(1.0);
    let color = p.compose(KslType::FLOAT4, &[uv, blue, alpha])?;
    let color = p.declare(cs, "color", KslType::FLOAT4, Some(color))?;
    let image = p.var(image)?;
    let color = p.var(color)?;
    p.storage_store(cs, image, texel, color)?;
    Ok(p)
}
