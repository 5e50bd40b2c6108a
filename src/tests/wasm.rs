use super::parse_wat;
use crate::{
    Error, ImportsBuilder, ModuleInstance, ModuleRef, NopExternals, RuntimeValue, TrapKind,
};
use assert_matches::assert_matches;

fn instantiate(source: &str) -> ModuleRef {
    ModuleInstance::new(&parse_wat(source), &ImportsBuilder::default())
        .expect("Failed to instantiate module")
        .assert_no_start()
}

fn run(instance: &ModuleRef, name: &str, args: &[RuntimeValue]) -> Option<RuntimeValue> {
    instance
        .invoke_export(name, args, &mut NopExternals)
        .expect("Failed to run export")
}

fn run_err(instance: &ModuleRef, name: &str, args: &[RuntimeValue]) -> Error {
    instance
        .invoke_export(name, args, &mut NopExternals)
        .expect_err("invocation expected to fail")
}

fn trap_message(error: &Error) -> &'static str {
    match error {
        Error::Trap(trap) => trap.kind().trap_message(),
        other => panic!("expected trap, got {:?}", other),
    }
}

#[test]
fn interpreter_wrapping_arithmetic() {
    let instance = instantiate(
        r#"
(module
    (func (export "add") (param i32 i32) (result i32)
        (i32.add (get_local 0) (get_local 1)))
    (func (export "mul64") (param i64 i64) (result i64)
        (i64.mul (get_local 0) (get_local 1)))
)
"#,
    );
    assert_eq!(
        run(&instance, "add", &[RuntimeValue::I32(i32::max_value()), RuntimeValue::I32(1)]),
        Some(RuntimeValue::I32(i32::min_value())),
    );
    assert_eq!(
        run(
            &instance,
            "mul64",
            &[RuntimeValue::I64(i64::max_value()), RuntimeValue::I64(2)]
        ),
        Some(RuntimeValue::I64(-2)),
    );
}

#[test]
fn shifts_take_amount_modulo_width() {
    let instance = instantiate(
        r#"
(module
    (func (export "shl") (param i32 i32) (result i32)
        (i32.shl (get_local 0) (get_local 1)))
    (func (export "shr_u") (param i32 i32) (result i32)
        (i32.shr_u (get_local 0) (get_local 1)))
    (func (export "rotl64") (param i64 i64) (result i64)
        (i64.rotl (get_local 0) (get_local 1)))
)
"#,
    );
    assert_eq!(
        run(&instance, "shl", &[RuntimeValue::I32(1), RuntimeValue::I32(33)]),
        Some(RuntimeValue::I32(2)),
    );
    assert_eq!(
        run(&instance, "shr_u", &[RuntimeValue::I32(-1), RuntimeValue::I32(1)]),
        Some(RuntimeValue::I32(0x7FFF_FFFF)),
    );
    assert_eq!(
        run(
            &instance,
            "rotl64",
            &[RuntimeValue::I64(1 << 63), RuntimeValue::I64(65)]
        ),
        Some(RuntimeValue::I64(1)),
    );
}

#[test]
fn division_trap_messages() {
    let instance = instantiate(
        r#"
(module
    (func (export "div_s") (param i32 i32) (result i32)
        (i32.div_s (get_local 0) (get_local 1)))
)
"#,
    );
    let err = run_err(
        &instance,
        "div_s",
        &[RuntimeValue::I32(7), RuntimeValue::I32(0)],
    );
    assert_eq!(trap_message(&err), "integer divide by zero");

    let err = run_err(
        &instance,
        "div_s",
        &[RuntimeValue::I32(i32::min_value()), RuntimeValue::I32(-1)],
    );
    assert_eq!(trap_message(&err), "integer overflow");

    assert_eq!(
        run(&instance, "div_s", &[RuntimeValue::I32(-7), RuntimeValue::I32(2)]),
        Some(RuntimeValue::I32(-3)),
    );
}

#[test]
fn br_in_block_exits_br_in_loop_reenters() {
    // Counts down with a loop; the `br 0` inside the loop re-enters it,
    // the `br_if 1` exits through the enclosing block.
    let instance = instantiate(
        r#"
(module
    (func (export "count") (param i32) (result i32)
        (local i32)
        (block
            (loop
                (br_if 1 (i32.eqz (get_local 0)))
                (set_local 0 (i32.sub (get_local 0) (i32.const 1)))
                (set_local 1 (i32.add (get_local 1) (i32.const 1)))
                (br 0)
            )
        )
        (get_local 1)
    )
)
"#,
    );
    assert_eq!(
        run(&instance, "count", &[RuntimeValue::I32(10)]),
        Some(RuntimeValue::I32(10)),
    );
    assert_eq!(
        run(&instance, "count", &[RuntimeValue::I32(0)]),
        Some(RuntimeValue::I32(0)),
    );
}

#[test]
fn br_table_clamps_to_default() {
    let instance = instantiate(
        r#"
(module
    (func (export "classify") (param i32) (result i32)
        (block
            (block
                (block
                    (br_table 0 1 2 (get_local 0))
                )
                (return (i32.const 100))
            )
            (return (i32.const 101))
        )
        (i32.const 102)
    )
)
"#,
    );
    assert_eq!(
        run(&instance, "classify", &[RuntimeValue::I32(0)]),
        Some(RuntimeValue::I32(100)),
    );
    assert_eq!(
        run(&instance, "classify", &[RuntimeValue::I32(1)]),
        Some(RuntimeValue::I32(101)),
    );
    // Out-of-range indices, including the table length itself, take the
    // default target.
    assert_eq!(
        run(&instance, "classify", &[RuntimeValue::I32(2)]),
        Some(RuntimeValue::I32(102)),
    );
    assert_eq!(
        run(&instance, "classify", &[RuntimeValue::I32(1000)]),
        Some(RuntimeValue::I32(102)),
    );
}

#[test]
fn if_without_else_and_select() {
    let instance = instantiate(
        r#"
(module
    (func (export "max") (param i32 i32) (result i32)
        (select
            (get_local 0)
            (get_local 1)
            (i32.gt_s (get_local 0) (get_local 1))))
    (func (export "maybe_bump") (param i32) (result i32)
        (if (i32.lt_s (get_local 0) (i32.const 0))
            (then (set_local 0 (i32.const 0))))
        (get_local 0))
)
"#,
    );
    assert_eq!(
        run(&instance, "max", &[RuntimeValue::I32(3), RuntimeValue::I32(9)]),
        Some(RuntimeValue::I32(9)),
    );
    assert_eq!(
        run(&instance, "maybe_bump", &[RuntimeValue::I32(-5)]),
        Some(RuntimeValue::I32(0)),
    );
    assert_eq!(
        run(&instance, "maybe_bump", &[RuntimeValue::I32(5)]),
        Some(RuntimeValue::I32(5)),
    );
}

#[test]
fn globals_are_readable_and_writable() {
    let instance = instantiate(
        r#"
(module
    (global $counter (mut i32) (i32.const 100))
    (func (export "bump") (result i32)
        (set_global $counter (i32.add (get_global $counter) (i32.const 1)))
        (get_global $counter))
)
"#,
    );
    assert_eq!(run(&instance, "bump", &[]), Some(RuntimeValue::I32(101)));
    assert_eq!(run(&instance, "bump", &[]), Some(RuntimeValue::I32(102)));
}

#[test]
fn memory_grow_and_size() {
    let instance = instantiate(
        r#"
(module
    (memory 1 3)
    (func (export "grow") (param i32) (result i32)
        (grow_memory (get_local 0)))
    (func (export "size") (result i32)
        (current_memory))
)
"#,
    );
    assert_eq!(run(&instance, "size", &[]), Some(RuntimeValue::I32(1)));
    // Growing reports the previous size.
    assert_eq!(
        run(&instance, "grow", &[RuntimeValue::I32(1)]),
        Some(RuntimeValue::I32(1)),
    );
    assert_eq!(run(&instance, "size", &[]), Some(RuntimeValue::I32(2)));
    // Growing past the declared maximum fails with -1 and leaves the size
    // untouched.
    assert_eq!(
        run(&instance, "grow", &[RuntimeValue::I32(5)]),
        Some(RuntimeValue::I32(-1)),
    );
    assert_eq!(run(&instance, "size", &[]), Some(RuntimeValue::I32(2)));
}

#[test]
fn memory_out_of_bounds_traps() {
    let instance = instantiate(
        r#"
(module
    (memory 1)
    (func (export "peek") (param i32) (result i32)
        (i32.load (get_local 0)))
)
"#,
    );
    assert_eq!(
        run(&instance, "peek", &[RuntimeValue::I32(0)]),
        Some(RuntimeValue::I32(0)),
    );
    // Aligned, but the four byte read overruns the single page.
    let err = run_err(&instance, "peek", &[RuntimeValue::I32(65536)]);
    assert_eq!(trap_message(&err), "out of bounds memory access");
}

#[test]
fn misaligned_access_traps() {
    let instance = instantiate(
        r#"
(module
    (memory 1)
    (func (export "peek") (param i32) (result i32)
        (i32.load (get_local 0)))
)
"#,
    );
    let err = run_err(&instance, "peek", &[RuntimeValue::I32(2)]);
    assert_eq!(trap_message(&err), "misaligned memory access");
}

#[test]
fn loads_extend_with_correct_sign() {
    let instance = instantiate(
        r#"
(module
    (memory 1)
    (data (i32.const 0) "\ff\7f")
    (func (export "s8") (result i32) (i32.load8_s (i32.const 0)))
    (func (export "u8") (result i32) (i32.load8_u (i32.const 0)))
    (func (export "s16") (result i32) (i32.load16_s (i32.const 0)))
    (func (export "u64_32") (result i64) (i64.load32_u (i32.const 0)))
)
"#,
    );
    assert_eq!(run(&instance, "s8", &[]), Some(RuntimeValue::I32(-1)));
    assert_eq!(run(&instance, "u8", &[]), Some(RuntimeValue::I32(255)));
    assert_eq!(run(&instance, "s16", &[]), Some(RuntimeValue::I32(0x7FFF)));
    assert_eq!(run(&instance, "u64_32", &[]), Some(RuntimeValue::I64(0x7FFF)));
}

#[test]
fn stores_wrap_to_width() {
    let instance = instantiate(
        r#"
(module
    (memory 1)
    (func (export "wrap8") (result i32)
        (i32.store8 (i32.const 0) (i32.const 0x1FF))
        (i32.load8_u (i32.const 0)))
)
"#,
    );
    assert_eq!(run(&instance, "wrap8", &[]), Some(RuntimeValue::I32(0xFF)));
}

#[test]
fn float_semantics() {
    let instance = instantiate(
        r#"
(module
    (func (export "min") (param f32 f32) (result f32)
        (f32.min (get_local 0) (get_local 1)))
    (func (export "copysign") (param f64 f64) (result f64)
        (f64.copysign (get_local 0) (get_local 1)))
    (func (export "trunc") (param f64) (result i32)
        (i32.trunc_s/f64 (get_local 0)))
)
"#,
    );

    let nan = f32::NAN;
    let result = run(
        &instance,
        "min",
        &[RuntimeValue::F32(nan.into()), RuntimeValue::F32(1.0f32.into())],
    );
    match result {
        Some(RuntimeValue::F32(value)) => assert!(value.is_nan()),
        other => panic!("expected F32 result, got {:?}", other),
    }

    assert_eq!(
        run(
            &instance,
            "copysign",
            &[
                RuntimeValue::F64(1.0f64.into()),
                RuntimeValue::F64((-2.0f64).into())
            ]
        ),
        Some(RuntimeValue::F64((-1.0f64).into())),
    );

    let err = run_err(&instance, "trunc", &[RuntimeValue::F64(f64::NAN.into())]);
    assert_eq!(trap_message(&err), "invalid conversion to integer");
    assert_eq!(
        run(&instance, "trunc", &[RuntimeValue::F64(3.9f64.into())]),
        Some(RuntimeValue::I32(3)),
    );
}

#[test]
fn bit_counting_operators() {
    let instance = instantiate(
        r#"
(module
    (func (export "clz") (param i32) (result i32) (i32.clz (get_local 0)))
    (func (export "ctz") (param i32) (result i32) (i32.ctz (get_local 0)))
    (func (export "popcnt") (param i64) (result i64) (i64.popcnt (get_local 0)))
)
"#,
    );
    assert_eq!(
        run(&instance, "clz", &[RuntimeValue::I32(0)]),
        Some(RuntimeValue::I32(32)),
    );
    assert_eq!(
        run(&instance, "ctz", &[RuntimeValue::I32(0)]),
        Some(RuntimeValue::I32(32)),
    );
    assert_eq!(
        run(&instance, "popcnt", &[RuntimeValue::I64(-1)]),
        Some(RuntimeValue::I64(64)),
    );
}

#[test]
fn immutable_global_write_traps() {
    // The text format validator would reject `set_global` on an immutable
    // global, so construct the module through the builder instead.
    use crate::builder;
    use crate::elements::{Instruction, Instructions, ValueType as EValueType};

    let module = builder::module()
        .global()
        .with_type(EValueType::I32)
        .init_expr(Instruction::I32Const(5))
        .build()
        .function()
        .signature()
        .build()
        .body()
        .with_instructions(Instructions::new(vec![
            Instruction::I32Const(1),
            Instruction::SetGlobal(0),
        ]))
        .build()
        .build()
        .export()
        .field("poke")
        .internal()
        .func(0)
        .build()
        .build();

    let module = crate::Module::from_elements(module).unwrap();
    let instance = ModuleInstance::new(&module, &ImportsBuilder::default())
        .unwrap()
        .assert_no_start();

    let err = run_err(&instance, "poke", &[]);
    assert_eq!(trap_message(&err), "global is immutable");
}

#[test]
fn wrong_argument_types_are_rejected() {
    let instance = instantiate(
        r#"
(module
    (func (export "id") (param i32) (result i32) (get_local 0))
)
"#,
    );
    let err = run_err(&instance, "id", &[RuntimeValue::I64(1)]);
    assert_matches!(
        err,
        Error::Trap(ref trap) if matches!(trap.kind(), TrapKind::UnexpectedSignature)
    );
    let err = run_err(&instance, "id", &[]);
    assert_matches!(
        err,
        Error::Trap(ref trap) if matches!(trap.kind(), TrapKind::UnexpectedSignature)
    );
}

#[test]
fn runaway_recursion_traps_with_stack_exhaustion() {
    let instance = instantiate(
        r#"
(module
    (func $f (export "loop") (call $f))
)
"#,
    );
    let err = run_err(&instance, "loop", &[]);
    assert_eq!(trap_message(&err), "call stack exhausted");
}

#[test]
fn imported_globals_are_visible_to_initializers() {
    use crate::{GlobalDescriptor, GlobalInstance, GlobalRef, ModuleImportResolver};

    struct BaseResolver(GlobalRef);

    impl ModuleImportResolver for BaseResolver {
        fn resolve_global(
            &self,
            _field_name: &str,
            _descriptor: &GlobalDescriptor,
        ) -> Result<GlobalRef, Error> {
            Ok(self.0.clone())
        }
    }

    let resolver = BaseResolver(GlobalInstance::alloc(RuntimeValue::I32(40), false));

    let module = parse_wat(
        r#"
(module
    (import "env" "base" (global i32))
    (global $derived i32 (get_global 0))
    (func (export "get") (result i32) (get_global $derived))
)
"#,
    );

    let instance =
        ModuleInstance::new(&module, &ImportsBuilder::new().with_resolver("env", &resolver))
            .unwrap()
            .assert_no_start();
    assert_eq!(run(&instance, "get", &[]), Some(RuntimeValue::I32(40)));
}
