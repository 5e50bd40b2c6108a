//! Whole-module round-trips through the binary codec.

use wasmite::builder;
use wasmite::elements::{
    deserialize_buffer, serialize, CustomSection, Instruction, Instructions, Local, Module,
    Section, ValueType,
};

fn assert_roundtrip(module: Module) {
    let bytes = serialize(module.clone()).expect("serialization succeeds");
    let reparsed: Module = deserialize_buffer(&bytes).expect("deserialization succeeds");
    assert_eq!(reparsed, module);
}

#[test]
fn empty_module_roundtrip() {
    assert_roundtrip(builder::module().build());
}

#[test]
fn full_module_roundtrip() {
    let module = builder::module()
        .import()
        .path("env", "print")
        .external()
        .func(0)
        .build()
        .function()
        .signature()
        .with_param(ValueType::I32)
        .with_result(ValueType::I32)
        .build()
        .body()
        .with_locals(vec![Local::new(1, ValueType::I64)])
        .with_instructions(Instructions::new(vec![
            Instruction::Block(
                wasmite::elements::BlockType::Value(ValueType::I32),
                Instructions::new(vec![
                    Instruction::GetLocal(0),
                    Instruction::If(
                        wasmite::elements::BlockType::NoResult,
                        Instructions::new(vec![Instruction::Nop]),
                        Some(Instructions::new(vec![Instruction::Unreachable])),
                    ),
                    Instruction::GetLocal(0),
                ]),
            ),
        ]))
        .build()
        .build()
        .memory()
        .with_min(1)
        .with_max(Some(2))
        .build()
        .table()
        .with_min(2)
        .with_element(0, vec![1])
        .build()
        .global()
        .with_type(ValueType::I64)
        .mutable()
        .init_expr(Instruction::I64Const(-1))
        .build()
        .data()
        .offset(Instruction::I32Const(16))
        .value(b"payload".to_vec())
        .build()
        .export()
        .field("run")
        .internal()
        .func(1)
        .build()
        .with_start(1)
        .build();

    assert_roundtrip(module);
}

#[test]
fn custom_sections_are_preserved_in_place() {
    let mut module = builder::module()
        .function()
        .body()
        .build()
        .build()
        .build();
    module.sections_mut().push(Section::Custom(CustomSection::new(
        "tooling".into(),
        vec![9, 9, 9],
    )));

    let bytes = serialize(module).unwrap();
    let reparsed: Module = deserialize_buffer(&bytes).unwrap();
    let custom = reparsed
        .custom_section("tooling")
        .expect("custom section survives the roundtrip");
    assert_eq!(custom.payload(), &[9, 9, 9]);
}

#[test]
fn wat_produced_binary_roundtrips() {
    let wasm_binary = wat::parse_str(
        r#"
(module
    (memory 1)
    (data (i32.const 0) "abc")
    (table 2 anyfunc)
    (func $f (param i32) (result i32)
        (block (result i32)
            (loop
                (br_if 1 (i32.const 0))
                (br 0)
            )
            (i32.const 1)
        ))
    (elem (i32.const 0) $f)
    (export "f" (func $f))
)
"#,
    )
    .expect("valid wat");

    let module: Module = deserialize_buffer(&wasm_binary).expect("wat output deserializes");
    let reencoded = serialize(module.clone()).expect("serialization succeeds");
    let reparsed: Module = deserialize_buffer(&reencoded).expect("reencoded module deserializes");
    assert_eq!(reparsed, module);
}

#[test]
fn float_const_bits_are_preserved() {
    let module = builder::module()
        .function()
        .signature()
        .with_result(ValueType::F64)
        .build()
        .body()
        .with_instructions(Instructions::new(vec![Instruction::F64Const(
            0x7FF8_0000_0000_1234, // NaN with a payload
        )]))
        .build()
        .build()
        .build();

    let bytes = serialize(module).unwrap();
    let reparsed: Module = deserialize_buffer(&bytes).unwrap();
    let code = reparsed.code_section().unwrap();
    assert_eq!(
        code.bodies()[0].code().elements()[0],
        Instruction::F64Const(0x7FF8_0000_0000_1234),
    );
}
