//! The conventional `spectest` host module the spec test scripts link
//! against: a `print` function, one pre-initialized global per scalar kind,
//! a small memory and a table.

use wasmite::memory_units::Pages;
use wasmite::{
    Error, Externals, FuncInstance, FuncRef, GlobalDescriptor, GlobalInstance, GlobalRef,
    ImportsBuilder, MemoryDescriptor, MemoryInstance, MemoryRef, Module, ModuleImportResolver,
    ModuleInstance, RuntimeArgs, RuntimeValue, Signature, TableDescriptor, TableInstance,
    TableRef, Trap, ValueType,
};

const PRINT_FUNC_INDEX: usize = 0;

struct SpecModule {
    table: TableRef,
    memory: MemoryRef,
    global_i32: GlobalRef,
    global_i64: GlobalRef,
    global_f32: GlobalRef,
    global_f64: GlobalRef,
}

impl SpecModule {
    fn new() -> Self {
        SpecModule {
            table: TableInstance::alloc(10, Some(20)).unwrap(),
            memory: MemoryInstance::alloc(Pages(1), Some(Pages(2))).unwrap(),
            global_i32: GlobalInstance::alloc(RuntimeValue::I32(666), false),
            global_i64: GlobalInstance::alloc(RuntimeValue::I64(666), false),
            global_f32: GlobalInstance::alloc(RuntimeValue::F32(666.0f32.into()), false),
            global_f64: GlobalInstance::alloc(RuntimeValue::F64(666.0f64.into()), false),
        }
    }
}

impl Externals for SpecModule {
    fn invoke_index(
        &mut self,
        index: usize,
        args: RuntimeArgs,
    ) -> Result<Option<RuntimeValue>, Trap> {
        match index {
            PRINT_FUNC_INDEX => {
                println!("print: {:?}", args);
                Ok(None)
            }
            _ => panic!("SpecModule doesn't provide function at index {}", index),
        }
    }
}

impl ModuleImportResolver for SpecModule {
    fn resolve_func(&self, field_name: &str, func_type: &Signature) -> Result<FuncRef, Error> {
        if field_name == "print" {
            if func_type.return_type().is_some() {
                return Err(Error::Instantiation(
                    "Function `print` have unit return type".into(),
                ));
            }

            let func = FuncInstance::alloc_host(func_type.clone(), PRINT_FUNC_INDEX);
            return Ok(func);
        }

        Err(Error::Instantiation(format!(
            "Unknown host func import {}",
            field_name
        )))
    }

    fn resolve_global(
        &self,
        field_name: &str,
        global_type: &GlobalDescriptor,
    ) -> Result<GlobalRef, Error> {
        if field_name == "global" {
            return match global_type.value_type() {
                ValueType::I32 => Ok(self.global_i32.clone()),
                ValueType::I64 => Ok(self.global_i64.clone()),
                ValueType::F32 => Ok(self.global_f32.clone()),
                ValueType::F64 => Ok(self.global_f64.clone()),
            };
        }

        Err(Error::Instantiation(format!(
            "Unknown host global import {}",
            field_name
        )))
    }

    fn resolve_memory(
        &self,
        field_name: &str,
        _memory_type: &MemoryDescriptor,
    ) -> Result<MemoryRef, Error> {
        if field_name == "memory" {
            return Ok(self.memory.clone());
        }

        Err(Error::Instantiation(format!(
            "Unknown host memory import {}",
            field_name
        )))
    }

    fn resolve_table(
        &self,
        field_name: &str,
        _table_type: &TableDescriptor,
    ) -> Result<TableRef, Error> {
        if field_name == "table" {
            return Ok(self.table.clone());
        }

        Err(Error::Instantiation(format!(
            "Unknown host table import {}",
            field_name
        )))
    }
}

fn load_module(source: &str) -> Module {
    let wasm_binary = wat::parse_str(source).expect("Failed to parse wat source");
    Module::from_buffer(wasm_binary).expect("Failed to load module")
}

#[test]
fn globals_have_conventional_values() {
    let module = load_module(
        r#"
(module
    (import "spectest" "global" (global $gi i32))
    (import "spectest" "global" (global $gl i64))
    (func (export "get_i32") (result i32) (get_global $gi))
    (func (export "get_i64") (result i64) (get_global $gl))
)
"#,
    );

    let mut spectest = SpecModule::new();
    let instance = ModuleInstance::new(
        &module,
        &ImportsBuilder::new().with_resolver("spectest", &spectest),
    )
    .unwrap()
    .assert_no_start();

    assert_eq!(
        instance
            .invoke_export("get_i32", &[], &mut spectest)
            .unwrap(),
        Some(RuntimeValue::I32(666)),
    );
    assert_eq!(
        instance
            .invoke_export("get_i64", &[], &mut spectest)
            .unwrap(),
        Some(RuntimeValue::I64(666)),
    );
}

#[test]
fn print_is_callable() {
    let module = load_module(
        r#"
(module
    (import "spectest" "print" (func $print (param i32)))
    (func (export "run") (call $print (i32.const 7)))
)
"#,
    );

    let mut spectest = SpecModule::new();
    let instance = ModuleInstance::new(
        &module,
        &ImportsBuilder::new().with_resolver("spectest", &spectest),
    )
    .unwrap()
    .assert_no_start();

    assert_eq!(
        instance.invoke_export("run", &[], &mut spectest).unwrap(),
        None,
    );
}

#[test]
fn memory_and_table_have_conventional_limits() {
    let module = load_module(
        r#"
(module
    (import "spectest" "memory" (memory 1 2))
    (import "spectest" "table" (table 10 20 anyfunc))
    (func (export "size") (result i32) (current_memory))
)
"#,
    );

    let mut spectest = SpecModule::new();
    let instance = ModuleInstance::new(
        &module,
        &ImportsBuilder::new().with_resolver("spectest", &spectest),
    )
    .unwrap()
    .assert_no_start();

    assert_eq!(
        instance.invoke_export("size", &[], &mut spectest).unwrap(),
        Some(RuntimeValue::I32(1)),
    );
}

#[test]
fn shared_state_is_visible_across_instances() {
    // Two instances importing the same spectest memory observe each other's
    // writes.
    let writer = load_module(
        r#"
(module
    (import "spectest" "memory" (memory 1 2))
    (func (export "poke") (i32.store8 (i32.const 0) (i32.const 99)))
)
"#,
    );
    let reader = load_module(
        r#"
(module
    (import "spectest" "memory" (memory 1 2))
    (func (export "peek") (result i32) (i32.load8_u (i32.const 0)))
)
"#,
    );

    let mut spectest = SpecModule::new();
    let imports = ImportsBuilder::new().with_resolver("spectest", &spectest);
    let writer = ModuleInstance::new(&writer, &imports)
        .unwrap()
        .assert_no_start();
    let reader = ModuleInstance::new(&reader, &imports)
        .unwrap()
        .assert_no_start();
    drop(imports);

    writer.invoke_export("poke", &[], &mut spectest).unwrap();
    assert_eq!(
        reader.invoke_export("peek", &[], &mut spectest).unwrap(),
        Some(RuntimeValue::I32(99)),
    );
}
