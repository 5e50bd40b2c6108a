//! # wasmite
//!
//! This library allows WebAssembly modules to be loaded in binary format,
//! inspected and edited in memory, written back out, and their functions
//! invoked by a tree-walking interpreter.
//!
//! # Introduction
//!
//! WebAssembly (wasm) is a safe, portable and compact format that is designed
//! for efficient execution.
//!
//! Wasm code is distributed in the form of modules that contains definitions of:
//!
//! - functions,
//! - global variables,
//! - linear memory instances and
//! - tables.
//!
//! Each of these definitions can be imported and exported.
//!
//! In addition to these definitions, modules can define initialization data
//! for their memory or tables. This initialization data can take the form of
//! segments, copied to given offsets. They can also define a `start` function
//! that is automatically executed when the module is loaded.
//!
//! ## Loading
//!
//! The [`elements`](elements/index.html) module decodes the binary format
//! into a module structure, and the [`builder`](builder/index.html) module
//! constructs one programmatically. Both feed [`Module::from_elements`].
//!
//! ## Instantiation
//!
//! In order to execute code from a wasm module, it must be instantiated.
//! Instantiation includes the following steps:
//!
//! 1. Creating an empty module instance.
//! 2. Resolving the definition instances for each declared import in the module.
//! 3. Instantiating definitions declared in the module (e.g. allocate global
//!    variables, allocate linear memory, etc.).
//! 4. Initializing memory and table contents by copying segments into them.
//! 5. Executing the `start` function, if any.
//!
//! After these steps, the module instance is ready to execute functions.
//!
//! ## Execution
//!
//! It only is allowed to call functions which are exported by the module.
//! Functions can either return a result or trap. Traps abort the whole
//! invocation in one shot and are reported to the embedder.
//!
//! # Examples
//!
//! ```rust
//! use wasmite::{ImportsBuilder, ModuleInstance, NopExternals, RuntimeValue};
//!
//! // Parse WAT (WebAssembly Text format) into wasm bytecode.
//! let wasm_binary = wat::parse_str(
//!     r#"
//!     (module
//!         (func (export "test") (result i32)
//!             i32.const 1337
//!         )
//!     )
//!     "#,
//! )
//! .expect("failed to parse wat");
//!
//! // Load wasm binary and prepare it for instantiation.
//! let module = wasmite::Module::from_buffer(&wasm_binary).expect("failed to load wasm");
//!
//! // Instantiate a module with empty imports and
//! // assert that there is no `start` function.
//! let instance = ModuleInstance::new(&module, &ImportsBuilder::default())
//!     .expect("failed to instantiate wasm module")
//!     .assert_no_start();
//!
//! // Finally, invoke the exported function "test" with no parameters
//! // and empty external function executor.
//! assert_eq!(
//!     instance
//!         .invoke_export("test", &[], &mut NopExternals)
//!         .expect("failed to execute export"),
//!     Some(RuntimeValue::I32(1337)),
//! );
//! ```

#![warn(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::new_ret_no_self)]

#[cfg(not(feature = "std"))]
#[macro_use]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std as alloc;

#[cfg(feature = "std")]
#[macro_use]
extern crate core;

#[cfg(test)]
extern crate assert_matches;

use alloc::{
    boxed::Box,
    string::{String, ToString},
};
use core::fmt;
#[cfg(feature = "std")]
use std::error;

#[cfg(not(feature = "std"))]
extern crate libm;

extern crate num_rational;
extern crate num_traits;

pub mod builder;
pub mod elements;

mod func;
mod global;
mod host;
mod imports;
mod memory;
mod module;
pub mod nan_preserving_float;
mod runner;
mod table;
mod types;
mod value;

#[cfg(test)]
mod tests;

pub use self::func::{FuncInstance, FuncRef};
pub use self::global::{GlobalInstance, GlobalRef};
pub use self::host::{Externals, HostError, NopExternals, RuntimeArgs};
pub use self::imports::{ImportResolver, ImportsBuilder, ModuleImportResolver};
pub use self::memory::{MemoryInstance, MemoryRef, LINEAR_MEMORY_PAGE_SIZE};
pub use self::module::{ExternVal, ModuleInstance, ModuleRef, NotStartedModuleRef};
pub use self::runner::{DEFAULT_CALL_STACK_LIMIT, DEFAULT_VALUE_STACK_LIMIT};
pub use self::table::{TableInstance, TableRef};
pub use self::types::{GlobalDescriptor, MemoryDescriptor, Signature, TableDescriptor, ValueType};
pub use self::value::{Error as ValueError, FromRuntimeValue, LittleEndianConvert, RuntimeValue};

/// WebAssembly-specific sizes and units.
pub mod memory_units {
    pub use memory_units::wasm32::*;
    pub use memory_units::{size_of, ByteSize, Bytes, RoundUpTo};
}

/// Error type which can be thrown by wasm code or by host environment.
///
/// Under some conditions, wasm execution may produce a `Trap`, which
/// immediately aborts execution. Traps can't be handled by WebAssembly code,
/// but are reported to the embedder.
#[derive(Debug)]
pub struct Trap {
    kind: TrapKind,
}

impl Trap {
    /// Create new trap.
    pub fn new(kind: TrapKind) -> Trap {
        Trap { kind }
    }

    /// Returns kind of this trap.
    pub fn kind(&self) -> &TrapKind {
        &self.kind
    }

    /// Converts into kind of this trap.
    pub fn into_kind(self) -> TrapKind {
        self.kind
    }
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Trap: {}", self.kind)
    }
}

#[cfg(feature = "std")]
impl error::Error for Trap {
    fn description(&self) -> &str {
        "runtime trap"
    }
}

/// Error type which can be thrown by wasm code or by host environment.
///
/// See [`Trap`] for details.
///
/// [`Trap`]: struct.Trap.html
#[derive(Debug)]
pub enum TrapKind {
    /// Wasm code executed `unreachable` opcode.
    ///
    /// `unreachable` is a special opcode which always traps upon execution.
    /// This opcode have a similar purpose as `ud2` in x86.
    Unreachable,

    /// Attempt to load or store at the address which
    /// lies outside of bounds of the memory.
    ///
    /// Since addresses are interpreted as unsigned integers, out of bounds
    /// access can't happen with negative addresses (i.e. they will always wrap).
    MemoryAccessOutOfBounds,

    /// Attempt to load or store at an address that is not a multiple of the
    /// alignment the instruction declares.
    MisalignedAccess,

    /// Attempt to access table element at index which
    /// lies outside of bounds.
    ///
    /// This typically can happen when `call_indirect` is executed
    /// with index that lies out of bounds.
    TableAccessOutOfBounds,

    /// Attempt to access table element which is uninitialized.
    ///
    /// This typically can happen when `call_indirect` is executed.
    ElemUninitialized,

    /// Attempt to divide by zero.
    ///
    /// This trap typically can happen if `div` or `rem` is executed with
    /// zero as divider.
    DivisionByZero,

    /// Signed division overflowed.
    ///
    /// -2<sup>N-1</sup> divided by -1 has no representable N-bit signed
    /// result.
    IntegerOverflow,

    /// Attempt to make a conversion to an int failed.
    ///
    /// This can happen when trying to truncate NaNs, infinity, or a value for
    /// which the result is out of range into an integer.
    InvalidConversionToInt,

    /// Stack overflow.
    ///
    /// This is likely caused by some infinite or very deep recursion.
    StackOverflow,

    /// Attempt to invoke a function with mismatching signature.
    ///
    /// This can always happen with indirect calls. `call_indirect` instruction
    /// always specifies the expected signature of function. If `call_indirect`
    /// is executed with index that points on function with signature different
    /// from what is expected by this `call_indirect`, this trap is raised.
    UnexpectedSignature,

    /// Attempt to write to an immutable global.
    ImmutableGlobal,

    /// Error specified by the host.
    ///
    /// Typically returned from an implementation of [`Externals`].
    ///
    /// [`Externals`]: trait.Externals.html
    Host(Box<dyn host::HostError>),
}

impl PartialEq for TrapKind {
    fn eq(&self, other: &Self) -> bool {
        use TrapKind::*;
        match (self, other) {
            (Unreachable, Unreachable) => true,
            (MemoryAccessOutOfBounds, MemoryAccessOutOfBounds) => true,
            (MisalignedAccess, MisalignedAccess) => true,
            (TableAccessOutOfBounds, TableAccessOutOfBounds) => true,
            (ElemUninitialized, ElemUninitialized) => true,
            (DivisionByZero, DivisionByZero) => true,
            (IntegerOverflow, IntegerOverflow) => true,
            (InvalidConversionToInt, InvalidConversionToInt) => true,
            (StackOverflow, StackOverflow) => true,
            (UnexpectedSignature, UnexpectedSignature) => true,
            (ImmutableGlobal, ImmutableGlobal) => true,
            (Host(_), Host(_)) => false,
            _ => false,
        }
    }
}

impl TrapKind {
    /// Whether this trap is specified by the host.
    pub fn is_host(&self) -> bool {
        matches!(self, TrapKind::Host(_))
    }

    /// The canonical short message identifying this trap category.
    ///
    /// These strings are stable; spec-test harnesses compare against them.
    pub fn trap_message(&self) -> &'static str {
        match *self {
            TrapKind::Unreachable => "unreachable executed",
            TrapKind::MemoryAccessOutOfBounds => "out of bounds memory access",
            TrapKind::MisalignedAccess => "misaligned memory access",
            TrapKind::TableAccessOutOfBounds => "undefined element",
            TrapKind::ElemUninitialized => "uninitialized element",
            TrapKind::DivisionByZero => "integer divide by zero",
            TrapKind::IntegerOverflow => "integer overflow",
            TrapKind::InvalidConversionToInt => "invalid conversion to integer",
            TrapKind::StackOverflow => "call stack exhausted",
            TrapKind::UnexpectedSignature => "indirect call signature mismatch",
            TrapKind::ImmutableGlobal => "global is immutable",
            TrapKind::Host(_) => "host error",
        }
    }
}

impl fmt::Display for TrapKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            TrapKind::Host(ref host_error) => write!(f, "{}", host_error),
            ref kind => write!(f, "{}", kind.trap_message()),
        }
    }
}

/// Internal interpreter error.
#[derive(Debug)]
pub enum Error {
    /// Module loading error. Might occur only at load time.
    Validation(String),
    /// Error while instantiating a module. Might occur when provided
    /// with incorrect exports (i.e. linkage failure).
    Instantiation(String),
    /// Function-level error.
    Function(String),
    /// Table-level error.
    Table(String),
    /// Memory-level error.
    Memory(String),
    /// Global-level error.
    Global(String),
    /// Value-level error.
    Value(String),
    /// Trap.
    Trap(Trap),
    /// Custom embedder error.
    Host(Box<dyn host::HostError>),
}

impl Error {
    /// Returns a reference to a [`HostError`] if this `Error` represents some
    /// host error.
    ///
    /// I.e. if this error have variant [`Host`] or [`Trap`][`Trap`] with
    /// [host][`TrapKind::Host`] error.
    ///
    /// [`HostError`]: trait.HostError.html
    /// [`Host`]: enum.Error.html#variant.Host
    /// [`Trap`]: enum.Error.html#variant.Trap
    /// [`TrapKind::Host`]: enum.TrapKind.html#variant.Host
    pub fn as_host_error(&self) -> Option<&dyn host::HostError> {
        match self {
            Error::Host(host_err) => Some(&**host_err),
            Error::Trap(Trap {
                kind: TrapKind::Host(host_err),
            }) => Some(&**host_err),
            _ => None,
        }
    }

    /// Returns [`HostError`] if this `Error` represents some host error,
    /// otherwise returns the original error.
    ///
    /// [`HostError`]: trait.HostError.html
    pub fn try_into_host_error(self) -> Result<Box<dyn host::HostError>, Self> {
        match self {
            Error::Host(host_err) => Ok(host_err),
            Error::Trap(Trap {
                kind: TrapKind::Host(host_err),
            }) => Ok(host_err),
            other => Err(other),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Validation(ref s) => write!(f, "Validation: {}", s),
            Error::Instantiation(ref s) => write!(f, "Instantiation: {}", s),
            Error::Function(ref s) => write!(f, "Function: {}", s),
            Error::Table(ref s) => write!(f, "Table: {}", s),
            Error::Memory(ref s) => write!(f, "Memory: {}", s),
            Error::Global(ref s) => write!(f, "Global: {}", s),
            Error::Value(ref s) => write!(f, "Value: {}", s),
            Error::Trap(ref trap) => write!(f, "{}", trap),
            Error::Host(ref e) => write!(f, "User: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl error::Error for Error {
    fn description(&self) -> &str {
        match *self {
            Error::Validation(ref s) => s,
            Error::Instantiation(ref s) => s,
            Error::Function(ref s) => s,
            Error::Table(ref s) => s,
            Error::Memory(ref s) => s,
            Error::Global(ref s) => s,
            Error::Value(ref s) => s,
            Error::Trap(_) => "Trap",
            Error::Host(_) => "Host error",
        }
    }
}

impl<U> From<U> for Error
where
    U: host::HostError + Sized,
{
    fn from(e: U) -> Self {
        Error::Host(Box::new(e))
    }
}

impl<U> From<U> for Trap
where
    U: host::HostError + Sized,
{
    fn from(e: U) -> Self {
        Trap::new(TrapKind::Host(Box::new(e)))
    }
}

impl From<Trap> for Error {
    fn from(e: Trap) -> Error {
        Error::Trap(e)
    }
}

impl From<TrapKind> for Trap {
    fn from(e: TrapKind) -> Trap {
        Trap::new(e)
    }
}

impl From<elements::Error> for Error {
    fn from(e: elements::Error) -> Error {
        Error::Validation(e.to_string())
    }
}

/// Deserialized module prepared for instantiation.
pub struct Module {
    module: elements::Module,
}

impl Module {
    /// Create `Module` from [`elements::Module`](elements/struct.Module.html).
    ///
    /// This function will load and prepare a module structure produced by the
    /// codec or by the [builder](builder/index.html).
    ///
    /// # Errors
    ///
    /// Returns `Err` if the module declares a different number of functions
    /// than it provides bodies for.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let elements_module = wasmite::builder::module()
    ///     .function()
    ///         .signature().with_param(wasmite::elements::ValueType::I32).build()
    ///         .body().build()
    ///     .build()
    ///     .build();
    ///
    /// let module = wasmite::Module::from_elements(elements_module)
    ///     .expect("builder generated invalid module!");
    ///
    /// // Instantiate `module`, etc...
    /// ```
    pub fn from_elements(module: elements::Module) -> Result<Module, Error> {
        let declared = module
            .function_section()
            .map(|fs| fs.entries().len())
            .unwrap_or(0);
        let defined = module
            .code_section()
            .map(|cs| cs.bodies().len())
            .unwrap_or(0);
        if declared != defined {
            return Err(Error::Validation(format!(
                "function and code section counts differ: {} declarations, {} bodies",
                declared, defined,
            )));
        }

        Ok(Module { module })
    }

    /// Create `Module` from a given buffer.
    ///
    /// This function will deserialize a wasm module from a given buffer and
    /// prepare it for instantiation.
    ///
    /// # Errors
    ///
    /// Returns `Err` if wasm binary in provided `buffer` is not valid wasm
    /// binary.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let module =
    ///     wasmite::Module::from_buffer(
    ///         // Minimal module:
    ///         //   \0asm - magic
    ///         //    0x01 - version (in little-endian)
    ///         &[0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00]
    ///     ).expect("Failed to load minimal module");
    ///
    /// // Instantiate `module`, etc...
    /// ```
    pub fn from_buffer<B: AsRef<[u8]>>(buffer: B) -> Result<Module, Error> {
        let module = elements::deserialize_buffer::<elements::Module>(buffer.as_ref())?;
        Module::from_elements(module)
    }

    /// Fail if the module contains any floating-point declarations or
    /// operations.
    ///
    /// Some embedders forbid floats for determinism; the operator catalog
    /// makes the scan a plain tree walk.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let wasm_binary = wat::parse_str(
    ///     r#"
    ///     (module
    ///      (func $add (param $lhs f32) (param $rhs f32) (result f32)
    ///            get_local $lhs
    ///            get_local $rhs
    ///            f32.add))
    ///     "#,
    /// )
    /// .expect("failed to parse wat");
    ///
    /// let module = wasmite::Module::from_buffer(&wasm_binary).expect("Parsing failed");
    /// assert!(module.deny_floating_point().is_err());
    /// ```
    pub fn deny_floating_point(&self) -> Result<(), Error> {
        use elements::{Instruction, Type, ValueType as EValueType};

        fn has_float_instruction(instructions: &[elements::Instruction]) -> bool {
            instructions.iter().any(|instruction| match *instruction {
                Instruction::Block(_, ref body) | Instruction::Loop(_, ref body) => {
                    has_float_instruction(body.elements())
                }
                Instruction::If(_, ref then_body, ref else_body) => {
                    has_float_instruction(then_body.elements())
                        || else_body
                            .as_ref()
                            .map(|body| has_float_instruction(body.elements()))
                            .unwrap_or(false)
                }
                ref other => other.is_floating(),
            })
        }

        fn is_float_type(ty: EValueType) -> bool {
            matches!(ty, EValueType::F32 | EValueType::F64)
        }

        if let Some(code) = self.module.code_section() {
            for body in code.bodies() {
                if body
                    .locals()
                    .iter()
                    .any(|local| is_float_type(local.value_type()))
                    || has_float_instruction(body.code().elements())
                {
                    return Err(Error::Validation("Floating point is not allowed".into()));
                }
            }
        }

        if let Some(types) = self.module.type_section() {
            for ty in types.types() {
                let Type::Function(ref func_type) = *ty;
                if func_type.params().iter().copied().any(is_float_type)
                    || func_type.results().iter().copied().any(is_float_type)
                {
                    return Err(Error::Validation("Floating point is not allowed".into()));
                }
            }
        }

        if let Some(globals) = self.module.global_section() {
            for global in globals.entries() {
                if is_float_type(global.global_type().content_type()) {
                    return Err(Error::Validation("Floating point is not allowed".into()));
                }
            }
        }

        Ok(())
    }

    /// The underlying module structure.
    pub fn module(&self) -> &elements::Module {
        &self.module
    }

    /// Turn the wrapper back into the underlying module structure.
    pub fn into_module(self) -> elements::Module {
        self.module
    }
}
