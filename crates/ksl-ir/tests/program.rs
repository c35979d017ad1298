//! Integration tests: build programs through the public API and check
//! validation, dependency tracking and the text dump.

use ksl_ir::*;
use proptest::prelude::*;

/// A fragment program with one `mix`-like block whose inputs are left to
/// the caller.
fn program_with_block() -> (Program, Handle<Scope>, Handle<Block>) {
    let mut program = Program::new("lit_quad");
    let main = program.add_stage(StageKind::Fragment).unwrap();
    let block = program.add_block(main, "weighted").unwrap();
    (program, main, block)
}

#[test]
fn block_with_missing_input_fails_validation() {
    let (mut program, _, block) = program_with_block();
    let one = program.float1(1.0);
    program.in_float1(block, Some("weight"), Some(one)).unwrap();
    program.in_float1(block, Some("value"), None).unwrap();

    let err = program.freeze().unwrap_err();
    match err {
        IrError::UnboundInput { input, block } => {
            assert_eq!(input, "value");
            assert_eq!(block, "weighted_0");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn bound_block_dumps_inputs_and_body_in_order() {
    let (mut program, _, block) = program_with_block();
    let one = program.float1(1.0);
    let half = program.float1(0.5);
    let weight = program.in_float1(block, Some("weight"), Some(one)).unwrap();
    let value = program.in_float1(block, Some("value"), None).unwrap();
    program.bind_input(value, half).unwrap();
    let out = program.out_float1(block, Some("result")).unwrap();

    let body = program.block(block).body();
    let w = program.input_expr(weight);
    let v = program.input_expr(value);
    let product = program.binary(BinaryOp::Multiply, w, v).unwrap();
    let scaled = program.declare(body, "scaled", KslType::FLOAT1, Some(product)).unwrap();
    let target = program.var(out).unwrap();
    let read = program.var(scaled).unwrap();
    program.assign(body, target, read).unwrap();

    let frozen = program.freeze().unwrap();
    let dump = dump_program(&frozen);
    assert!(dump.contains("in float1 weight = 1.0"));
    assert!(dump.contains("in float1 value = 0.5"));
    let declare = dump.find("float1 scaled_2 = (1.0 * 0.5)").unwrap();
    let assign = dump.find("weighted_result_1 = scaled_2").unwrap();
    assert!(declare < assign);
    // the output is declared before the block that writes it
    let output = dump.find("float1 weighted_result_1").unwrap();
    assert!(output < dump.find("block weighted_0").unwrap());
}

#[test]
fn array_types_are_structural() {
    let a = KslType::array(KslType::FLOAT3, 4).unwrap();
    let b = KslType::array(KslType::FLOAT3, 4).unwrap();
    assert_eq!(a, b);
    let mut set = std::collections::HashSet::new();
    set.insert(a);
    assert!(set.contains(&b));
    assert_ne!(a, KslType::array(KslType::FLOAT3, 5).unwrap());
}

#[test]
fn rebinding_moves_block_dependencies() {
    let (mut program, main, block) = program_with_block();
    let v1 = program.declare(main, "v", KslType::FLOAT1, None).unwrap();
    let v2 = program.declare(main, "v", KslType::FLOAT1, None).unwrap();
    let x = program.in_float1(block, Some("x"), None).unwrap();

    let r1 = program.var(v1).unwrap();
    let two = program.float1(2.0);
    let e1 = program.binary(BinaryOp::Multiply, r1, two).unwrap();
    program.bind_input(x, e1).unwrap();
    assert_eq!(
        program.block_dependencies(block).variables().collect::<Vec<_>>(),
        vec![v1]
    );

    let r2 = program.var(v2).unwrap();
    let e2 = program.unary(UnaryOp::Negate, r2).unwrap();
    program.bind_input(x, e2).unwrap();
    assert_eq!(
        program.block_dependencies(block).variables().collect::<Vec<_>>(),
        vec![v2]
    );
}

#[test]
fn matrix_accessor_unions_matrix_and_index_dependencies() {
    let mut program = Program::new("matrix");
    let main = program.add_stage(StageKind::Vertex).unwrap();
    let vm = program.declare(main, "m", KslType::MAT4, None).unwrap();
    let vi = program.declare(main, "i", KslType::INT1, None).unwrap();
    let m = program.var(vm).unwrap();
    let i = program.var(vi).unwrap();
    let column = program.matrix_column(m, i).unwrap();

    assert_eq!(program.expression(column).ty, KslType::FLOAT4);
    let deps = program.collect_state_dependencies(column);
    assert_eq!(deps.variables().collect::<Vec<_>>(), vec![vm, vi]);
    assert_eq!(program.mutating_state(column), Some(vm));
    assert_eq!(program.mutating_state(m), Some(vm));
}

#[test]
fn dependencies_record_mutation_counts() {
    let mut program = Program::new("counts");
    let main = program.add_stage(StageKind::Vertex).unwrap();
    let zero = program.float1(0.0);
    let v = program.declare(main, "v", KslType::FLOAT1, Some(zero)).unwrap();
    let rv = program.var(v).unwrap();
    let one = program.float1(1.0);
    let bumped = program.binary(BinaryOp::Add, rv, one).unwrap();
    program.assign(main, rv, bumped).unwrap();
    let second = program.assign(main, rv, bumped).unwrap();

    let dep = *program.statement(second).dependencies().get(v).unwrap();
    assert_eq!(dep.mutation, 1);
    assert_eq!(program.statement(second).mutations()[0].mutation, 2);
    assert_eq!(program.variable(v).mutations(), 2);
}

#[test]
fn inputs_reject_resources() {
    let (mut program, _, block) = program_with_block();
    let ty = KslType::from(SamplerType::COLOR_2D);
    assert!(matches!(
        program.add_input(block, None, ty, None),
        Err(IrError::UnsupportedType(_))
    ));
}

#[test]
fn input_bound_to_local_declared_after_block_fails() {
    let (mut program, main, block) = program_with_block();
    let x = program.in_float1(block, Some("x"), None).unwrap();
    let one = program.float1(1.0);
    let late = program.declare(main, "late", KslType::FLOAT1, Some(one)).unwrap();
    let read = program.var(late).unwrap();
    program.bind_input(x, read).unwrap();
    assert!(matches!(
        program.check(),
        Err(IrError::OutOfScope { variable, .. }) if variable == "late_1"
    ));
}

#[test]
fn uniforms_are_shared_across_stages() {
    let mut program = Program::new("shared");
    let vertex = program.add_stage(StageKind::Vertex).unwrap();
    let fragment = program.add_stage(StageKind::Fragment).unwrap();
    let tint = program.uniform("uTint", KslType::FLOAT4).unwrap();
    for scope in [vertex, fragment] {
        let read = program.var(tint).unwrap();
        program.declare(scope, "tint", KslType::FLOAT4, Some(read)).unwrap();
    }
    assert!(program.freeze().is_ok());
}

#[test]
fn fragment_reading_vertex_builtin_fails() {
    let mut program = Program::new("crossed");
    program.add_stage(StageKind::Vertex).unwrap();
    let fragment = program.add_stage(StageKind::Fragment).unwrap();
    let position = program.builtin(BuiltinValue::Position).unwrap();
    let read = program.var(position).unwrap();
    program.declare(fragment, "p", KslType::FLOAT4, Some(read)).unwrap();
    assert!(matches!(
        program.freeze(),
        Err(IrError::WrongStage {
            owner: StageKind::Vertex,
            used_in: StageKind::Fragment,
            ..
        })
    ));
}

fn value_type() -> impl Strategy<Value = KslType> {
    prop_oneof![
        Just(KslType::FLOAT1),
        Just(KslType::FLOAT2),
        Just(KslType::FLOAT3),
        Just(KslType::FLOAT4),
        Just(KslType::INT1),
        Just(KslType::INT3),
        Just(KslType::UINT2),
        Just(KslType::BOOL4),
        Just(KslType::MAT2),
        Just(KslType::MAT4),
    ]
}

proptest! {
    #[test]
    fn array_equality_follows_element_and_size(
        t1 in value_type(),
        t2 in value_type(),
        n1 in 1u32..64,
        n2 in 1u32..64,
    ) {
        let a = KslType::array(t1, n1).unwrap();
        let b = KslType::array(t1, n1).unwrap();
        prop_assert_eq!(a, b);

        let c = KslType::array(t2, n2).unwrap();
        prop_assert_eq!(a == c, t1 == t2 && n1 == n2);
    }

    /// Each input is bound to a read of one of a pool of variables or to a
    /// literal; after every rebind the block's dependency set must be the
    /// union of what the inputs currently read.
    #[test]
    fn block_dependencies_track_current_bindings(
        binds in prop::collection::vec((0usize..3, prop::option::of(0usize..4)), 1..24),
    ) {
        let (mut program, main, block) = program_with_block();
        let vars: Vec<_> = (0..4)
            .map(|_| program.declare(main, "v", KslType::FLOAT1, None).unwrap())
            .collect();
        let inputs: Vec<_> = (0..3)
            .map(|_| program.in_float1(block, None, None).unwrap())
            .collect();
        let mut bound: Vec<Option<usize>> = vec![None; inputs.len()];

        for (slot, source) in binds {
            let expr = match source {
                Some(v) => program.var(vars[v]).unwrap(),
                None => program.float1(1.0),
            };
            program.bind_input(inputs[slot], expr).unwrap();
            bound[slot] = source;

            let mut expected: Vec<_> = bound.iter().flatten().map(|v| vars[*v]).collect();
            expected.sort();
            expected.dedup();
            let actual: Vec<_> = program.block_dependencies(block).variables().collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
