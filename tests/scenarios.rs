//! End-to-end scenarios driving whole modules through instantiation and
//! execution.

use wasmite::{
    Error, ImportsBuilder, Module, ModuleInstance, ModuleRef, NopExternals, RuntimeValue,
    TrapKind,
};

fn instantiate(source: &str) -> ModuleRef {
    let wasm_binary = wat::parse_str(source).expect("Failed to parse wat source");
    let module = Module::from_buffer(wasm_binary).expect("Failed to load module");
    ModuleInstance::new(&module, &ImportsBuilder::default())
        .expect("Failed to instantiate module")
        .assert_no_start()
}

fn trap_message(error: Error) -> &'static str {
    match error {
        Error::Trap(trap) => trap.kind().trap_message(),
        other => panic!("expected a trap, got {:?}", other),
    }
}

#[test]
fn add() {
    let instance = instantiate(
        r#"
(module
    (func (export "add") (param i32 i32) (result i32)
        get_local 0
        get_local 1
        i32.add
        return
    )
)
"#,
    );
    assert_eq!(
        instance
            .invoke_export(
                "add",
                &[RuntimeValue::I32(2), RuntimeValue::I32(3)],
                &mut NopExternals,
            )
            .unwrap(),
        Some(RuntimeValue::I32(5)),
    );
}

#[test]
fn factorial_loop() {
    let instance = instantiate(
        r#"
(module
    (func (export "fac") (param i64) (result i64)
        (local $acc i64)
        (set_local $acc (i64.const 1))
        (block
            (loop
                (br_if 1 (i64.eqz (get_local 0)))
                (set_local $acc (i64.mul (get_local $acc) (get_local 0)))
                (set_local 0 (i64.sub (get_local 0) (i64.const 1)))
                (br 0)
            )
        )
        (get_local $acc)
    )
)
"#,
    );
    let fac = |n: i64| {
        instance
            .invoke_export("fac", &[RuntimeValue::I64(n)], &mut NopExternals)
            .unwrap()
    };
    assert_eq!(fac(5), Some(RuntimeValue::I64(120)));
    assert_eq!(fac(10), Some(RuntimeValue::I64(3628800)));
}

#[test]
fn factorial_recursive() {
    let instance = instantiate(
        r#"
(module
    (func $fac (export "fac") (param i64) (result i64)
        (if (result i64) (i64.le_u (get_local 0) (i64.const 1))
            (then (i64.const 1))
            (else
                (i64.mul
                    (get_local 0)
                    (call $fac (i64.sub (get_local 0) (i64.const 1)))
                )
            )
        )
    )
)
"#,
    );
    assert_eq!(
        instance
            .invoke_export("fac", &[RuntimeValue::I64(10)], &mut NopExternals)
            .unwrap(),
        Some(RuntimeValue::I64(3628800)),
    );
}

#[test]
fn memory_init_and_load() {
    let instance = instantiate(
        r#"
(module
    (memory 1)
    (data (i32.const 0) "abc")
    (func (export "load_byte") (param i32) (result i32)
        (i32.load8_u (get_local 0))
    )
)
"#,
    );
    assert_eq!(
        instance
            .invoke_export("load_byte", &[RuntimeValue::I32(1)], &mut NopExternals)
            .unwrap(),
        Some(RuntimeValue::I32(98)),
    );
}

#[test]
fn indirect_call_success_and_mismatch() {
    let instance = instantiate(
        r#"
(module
    (type $ret_i32 (func (result i32)))
    (type $ret_i64 (func (result i64)))
    (table 2 anyfunc)
    (elem (i32.const 0) $answer)
    (func $answer (result i32) (i32.const 42))

    (func (export "call_matching") (result i32)
        (call_indirect (type $ret_i32) (i32.const 0)))
    (func (export "call_mismatching") (result i64)
        (call_indirect (type $ret_i64) (i32.const 0)))
    (func (export "call_uninitialized") (result i32)
        (call_indirect (type $ret_i32) (i32.const 1)))
    (func (export "call_out_of_bounds") (result i32)
        (call_indirect (type $ret_i32) (i32.const 7)))
)
"#,
    );

    assert_eq!(
        instance
            .invoke_export("call_matching", &[], &mut NopExternals)
            .unwrap(),
        Some(RuntimeValue::I32(42)),
    );

    let err = instance
        .invoke_export("call_mismatching", &[], &mut NopExternals)
        .unwrap_err();
    assert_eq!(trap_message(err), "indirect call signature mismatch");

    let err = instance
        .invoke_export("call_uninitialized", &[], &mut NopExternals)
        .unwrap_err();
    assert_eq!(trap_message(err), "uninitialized element");

    let err = instance
        .invoke_export("call_out_of_bounds", &[], &mut NopExternals)
        .unwrap_err();
    assert_eq!(trap_message(err), "undefined element");
}

#[test]
fn trap_unreachable() {
    let instance = instantiate(
        r#"
(module
    (func (export "oops") unreachable)
)
"#,
    );
    let err = instance
        .invoke_export("oops", &[], &mut NopExternals)
        .unwrap_err();
    assert_eq!(trap_message(err), "unreachable executed");
    match instance.invoke_export("oops", &[], &mut NopExternals) {
        Err(Error::Trap(trap)) => {
            assert!(matches!(trap.kind(), TrapKind::Unreachable));
        }
        other => panic!("expected unreachable trap, got {:?}", other),
    }
}

#[test]
fn start_function_runs_on_instantiation() {
    let wasm_binary = wat::parse_str(
        r#"
(module
    (global $g (mut i32) (i32.const 0))
    (func $init (set_global $g (i32.const 42)))
    (start $init)
    (func (export "get") (result i32) (get_global $g))
)
"#,
    )
    .unwrap();
    let module = Module::from_buffer(wasm_binary).unwrap();
    let instance = ModuleInstance::new(&module, &ImportsBuilder::default())
        .expect("Failed to instantiate module")
        .run_start(&mut NopExternals)
        .expect("start function should not trap");

    assert_eq!(
        instance.invoke_export("get", &[], &mut NopExternals).unwrap(),
        Some(RuntimeValue::I32(42)),
    );
}

#[test]
fn elements_segment_out_of_bounds_aborts_instantiation() {
    let wasm_binary = wat::parse_str(
        r#"
(module
    (table 1 anyfunc)
    (elem (i32.const 1) $f)
    (func $f)
)
"#,
    )
    .unwrap();
    let module = Module::from_buffer(wasm_binary).unwrap();
    let result = ModuleInstance::new(&module, &ImportsBuilder::default());
    match result {
        Err(Error::Instantiation(message)) => {
            assert!(message.contains("does not fit"), "message: {}", message)
        }
        other => panic!("expected instantiation failure, got {:?}", other.err()),
    }
}
