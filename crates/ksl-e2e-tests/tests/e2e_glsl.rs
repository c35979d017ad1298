mod common;

use ksl_backend_core::{BackendOptions, DiagnosticLevel, FloatPrecision, GlslVersion};
use ksl_backend_glsl::GlslBackend;

#[test]
fn blend_fragment_shader() {
    let program = common::freeze(common::blend_program().program);
    let output = common::compile(&program, &GlslBackend::desktop());
    assert_eq!(output.files.len(), 2);

    let expected = "\
#version 450 core

uniform vec4 uTint;
uniform float uAmount;

layout(location = 0) in vec4 vColor;
layout(location = 0) out vec4 fColor;

void main() {
    vec4 tint_0;
    tint_0 = uTint;
    vec4 blend_mixed_2;
    {
        blend_mixed_2 = mix(vColor, tint_0, uAmount);
    }
    fColor = (blend_mixed_2 * 2.0);
}
";
    assert_eq!(common::text(&output, "blend.frag"), expected);
}

#[test]
fn blend_vertex_shader_forwards_color() {
    let program = common::freeze(common::blend_program().program);
    let output = common::compile(&program, &GlslBackend::desktop());
    let vert = common::text(&output, "blend.vert");
    assert!(vert.contains("layout(location = 1) in vec4 aColor;"));
    assert!(vert.contains("layout(location = 0) out vec4 vColor;"));
    assert!(vert.contains("    gl_Position = aPosition;\n    vColor = aColor;\n"));
}

#[test]
fn annotations_name_blocks_and_dependencies() {
    let program = common::freeze(common::blend_program().program);
    let opts = BackendOptions {
        annotate: true,
        ..BackendOptions::default()
    };
    let output = common::try_compile(&program, &GlslBackend::desktop(), &opts).unwrap();
    let frag = common::text(&output, "blend.frag");
    assert!(frag.contains("    // deps: tint_0@1\n    // block blend_1\n    {\n"));
    assert!(frag.contains("    // deps: blend_mixed_2@1\n    fColor = (blend_mixed_2 * 2.0);"));
}

#[test]
fn es_target_uses_requested_es_version() {
    let program = common::freeze(common::blend_program().program);
    let opts = BackendOptions {
        glsl_version: GlslVersion::Es310,
        precision: FloatPrecision::Medium,
        ..BackendOptions::default()
    };
    let output = common::try_compile(&program, &GlslBackend::es(), &opts).unwrap();
    assert!(output.diagnostics.is_empty());
    let frag = common::text(&output, "blend.frag");
    assert!(frag.starts_with(
        "#version 310 es\nprecision mediump float;\nprecision mediump int;\n"
    ));
    // 310 es allows locations on varyings
    assert!(frag.contains("layout(location = 0) in vec4 vColor;"));
}

#[test]
fn mismatched_version_falls_back_with_warning() {
    let program = common::freeze(common::blend_program().program);
    let opts = BackendOptions {
        glsl_version: GlslVersion::Es300,
        ..BackendOptions::default()
    };
    let output = common::try_compile(&program, &GlslBackend::desktop(), &opts).unwrap();
    assert_eq!(output.diagnostics.len(), 1);
    assert_eq!(output.diagnostics[0].level, DiagnosticLevel::Warning);
    assert!(common::text(&output, "blend.vert").starts_with("#version 450 core\n"));
}
