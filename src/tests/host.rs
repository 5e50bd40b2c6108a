use super::parse_wat;
use crate::memory_units::Pages;
use crate::{
    Error, Externals, FuncInstance, FuncRef, HostError, ImportsBuilder, MemoryDescriptor,
    MemoryInstance, MemoryRef, ModuleImportResolver, ModuleInstance, NopExternals, RuntimeArgs,
    RuntimeValue, Signature, Trap, TrapKind, ValueType,
};
use assert_matches::assert_matches;

#[derive(Debug, Clone, PartialEq)]
struct HostErrorWithCode {
    error_code: u32,
}

impl ::core::fmt::Display for HostErrorWithCode {
    fn fmt(&self, f: &mut ::core::fmt::Formatter) -> Result<(), ::core::fmt::Error> {
        write!(f, "{}", self.error_code)
    }
}

impl HostError for HostErrorWithCode {}

/// Host state for the test environment.
///
/// This struct can be used as an external function executor and
/// as an imports provider.
struct TestHost {
    memory: Option<MemoryRef>,
}

impl TestHost {
    fn new() -> TestHost {
        TestHost {
            memory: Some(MemoryInstance::alloc(Pages(1), Some(Pages(1))).unwrap()),
        }
    }
}

/// sub(a: i32, b: i32) -> i32
///
/// Just subtracts one integer from another, returning the result.
const SUB_FUNC_INDEX: usize = 0;

/// err(error_code: i32) -> !
///
/// Traps with a host error that carries the given code.
const ERR_FUNC_INDEX: usize = 1;

/// inc_mem(ptr: i32)
///
/// Increments the byte at the given address in the host-owned memory.
const INC_MEM_FUNC_INDEX: usize = 2;

/// get_mem(ptr: i32) -> i32
///
/// Returns the byte at the given address in the host-owned memory.
const GET_MEM_FUNC_INDEX: usize = 3;

impl Externals for TestHost {
    fn invoke_index(
        &mut self,
        index: usize,
        args: RuntimeArgs,
    ) -> Result<Option<RuntimeValue>, Trap> {
        match index {
            SUB_FUNC_INDEX => {
                let a: i32 = args.nth_checked(0)?;
                let b: i32 = args.nth_checked(1)?;

                let result: RuntimeValue = (a - b).into();

                Ok(Some(result))
            }
            ERR_FUNC_INDEX => {
                let error_code: u32 = args.nth_checked(0)?;
                let error = HostErrorWithCode { error_code };
                Err(Trap::from(error))
            }
            INC_MEM_FUNC_INDEX => {
                let ptr: u32 = args.nth_checked(0)?;

                let memory = self
                    .memory
                    .as_ref()
                    .expect("memory attached before invocation");
                let mut buf = [0u8; 1];
                memory.get_into(ptr, &mut buf).unwrap();
                buf[0] += 1;
                memory.set(ptr, &buf).unwrap();

                Ok(None)
            }
            GET_MEM_FUNC_INDEX => {
                let ptr: u32 = args.nth_checked(0)?;

                let memory = self
                    .memory
                    .as_ref()
                    .expect("memory attached before invocation");
                let mut buf = [0u8; 1];
                memory.get_into(ptr, &mut buf).unwrap();

                Ok(Some(RuntimeValue::I32(buf[0] as i32)))
            }
            _ => panic!("env doesn't provide function at index {}", index),
        }
    }
}

impl TestHost {
    fn check_signature(&self, index: usize, signature: &Signature) -> bool {
        let (params, ret_ty): (&[ValueType], Option<ValueType>) = match index {
            SUB_FUNC_INDEX => (&[ValueType::I32, ValueType::I32], Some(ValueType::I32)),
            ERR_FUNC_INDEX => (&[ValueType::I32], None),
            INC_MEM_FUNC_INDEX => (&[ValueType::I32], None),
            GET_MEM_FUNC_INDEX => (&[ValueType::I32], Some(ValueType::I32)),
            _ => return false,
        };

        signature.params() == params && signature.return_type() == ret_ty
    }
}

impl ModuleImportResolver for TestHost {
    fn resolve_func(&self, field_name: &str, signature: &Signature) -> Result<FuncRef, Error> {
        let index = match field_name {
            "sub" => SUB_FUNC_INDEX,
            "err" => ERR_FUNC_INDEX,
            "inc_mem" => INC_MEM_FUNC_INDEX,
            "get_mem" => GET_MEM_FUNC_INDEX,
            _ => {
                return Err(Error::Instantiation(format!(
                    "Export {} not found",
                    field_name
                )));
            }
        };

        if !self.check_signature(index, signature) {
            return Err(Error::Instantiation(format!(
                "Export `{}` doesnt match expected type {:?}",
                field_name, signature
            )));
        }

        Ok(FuncInstance::alloc_host(signature.clone(), index))
    }

    fn resolve_memory(
        &self,
        field_name: &str,
        _memory_type: &MemoryDescriptor,
    ) -> Result<MemoryRef, Error> {
        match field_name {
            "memory" => Ok(self
                .memory
                .as_ref()
                .expect("host memory exists for the test")
                .clone()),
            _ => Err(Error::Instantiation(format!(
                "Export {} not found",
                field_name
            ))),
        }
    }
}

#[test]
fn call_host_func() {
    let module = parse_wat(
        r#"
(module
    (import "env" "sub" (func $sub (param i32 i32) (result i32)))

    (func (export "test") (result i32)
        (call $sub
            (i32.const 5)
            (i32.const 7)
        )
    )
)
"#,
    );

    let mut env = TestHost::new();

    let instance = ModuleInstance::new(&module, &ImportsBuilder::new().with_resolver("env", &env))
        .expect("Failed to instantiate module")
        .assert_no_start();

    assert_eq!(
        instance
            .invoke_export("test", &[], &mut env)
            .expect("Failed to invoke 'test' function"),
        Some(RuntimeValue::I32(-2))
    );
}

#[test]
fn host_err() {
    let module = parse_wat(
        r#"
(module
    (import "env" "err" (func $err (param i32)))

    (func (export "test")
        (call $err
            (i32.const 228)
        )
    )
)
"#,
    );

    let mut env = TestHost::new();

    let instance = ModuleInstance::new(&module, &ImportsBuilder::new().with_resolver("env", &env))
        .expect("Failed to instantiate module")
        .assert_no_start();

    let error = instance
        .invoke_export("test", &[], &mut env)
        .expect_err("`test` expected to return error");

    let host_error: Box<dyn HostError> = match error {
        Error::Trap(trap) => match trap.into_kind() {
            TrapKind::Host(err) => err,
            kind => panic!("Unexpected trap kind: {:?}", kind),
        },
        err => panic!("Unexpected error {:?}", err),
    };

    let error_with_code = host_error
        .downcast_ref::<HostErrorWithCode>()
        .expect("Failed to downcast to expected error type");
    assert_eq!(error_with_code.error_code, 228);
}

#[test]
fn host_function_mutates_imported_memory() {
    let module = parse_wat(
        r#"
(module
    (import "env" "memory" (memory 1))
    (import "env" "inc_mem" (func $inc_mem (param i32)))
    (import "env" "get_mem" (func $get_mem (param i32) (result i32)))

    (func (export "modify") (result i32)
        ;; write 42 directly, then increment it through the host
        (i32.store8 (i32.const 12) (i32.const 42))
        (call $inc_mem (i32.const 12))
        (call $get_mem (i32.const 12))
    )
)
"#,
    );

    let mut env = TestHost::new();

    let instance = ModuleInstance::new(&module, &ImportsBuilder::new().with_resolver("env", &env))
        .expect("Failed to instantiate module")
        .assert_no_start();

    assert_eq!(
        instance.invoke_export("modify", &[], &mut env).unwrap(),
        Some(RuntimeValue::I32(43)),
    );

    // The write is visible on the host side as well.
    let byte = env
        .memory
        .as_ref()
        .unwrap()
        .get(12, 1)
        .expect("memory is readable");
    assert_eq!(byte[0], 43);
}

#[test]
fn import_signature_mismatch_fails_instantiation() {
    // `sub` is imported with a wrong signature.
    let module = parse_wat(
        r#"
(module
    (import "env" "sub" (func $sub (param i64) (result i64)))
)
"#,
    );

    let env = TestHost::new();

    let result = ModuleInstance::new(&module, &ImportsBuilder::new().with_resolver("env", &env));
    match result {
        Err(Error::Instantiation(_)) => {}
        other => panic!("expected instantiation error, got {:?}", other.err()),
    }
}

#[test]
fn unresolved_import_fails_instantiation() {
    let module = parse_wat(
        r#"
(module
    (import "env" "no_such_fn" (func $f))
)
"#,
    );

    let env = TestHost::new();

    let result = ModuleInstance::new(&module, &ImportsBuilder::new().with_resolver("env", &env));
    match result {
        Err(Error::Instantiation(message)) => {
            assert!(message.contains("no_such_fn"), "message: {}", message)
        }
        other => panic!("expected instantiation error, got {:?}", other.err()),
    }
}

#[test]
fn host_functions_trap_on_bad_nop_externals() {
    let module = parse_wat(
        r#"
(module
    (func (export "trap") unreachable)
)
"#,
    );

    let instance = ModuleInstance::new(&module, &ImportsBuilder::default())
        .expect("Failed to instantiate module")
        .assert_no_start();

    let error = instance
        .invoke_export("trap", &[], &mut NopExternals)
        .expect_err("invocation should trap");
    assert_matches!(
        error,
        Error::Trap(ref trap) if matches!(trap.kind(), TrapKind::Unreachable)
    );
}
