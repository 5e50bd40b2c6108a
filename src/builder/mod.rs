//! Builders of various WebAssembly module entities.
//!
//! Chained builders producing [`elements::Module`](crate::elements::Module)
//! values programmatically, without going through the binary format. This is
//! the construction surface editing tools and tests use:
//!
//! ```
//! use wasmite::builder;
//! use wasmite::elements::{Instruction, Instructions, ValueType};
//!
//! let module = builder::module()
//!     .function()
//!         .signature()
//!             .with_param(ValueType::I32)
//!             .with_result(ValueType::I32)
//!             .build()
//!         .body()
//!             .with_instructions(Instructions::new(vec![
//!                 Instruction::GetLocal(0),
//!             ]))
//!             .build()
//!         .build()
//!     .export().field("id").internal().func(0).build()
//!     .build();
//!
//! assert!(module.code_section().is_some());
//! ```

mod code;
mod data;
mod export;
mod global;
mod import;
mod invoke;
mod memory;
mod module;
mod table;

pub use self::code::{
    signature, FuncBodyBuilder, FunctionBuilder, FunctionDefinition, Signature, SignatureBuilder,
};
pub use self::data::DataSegmentBuilder;
pub use self::export::{ExportBuilder, ExportInternalBuilder};
pub use self::global::GlobalBuilder;
pub use self::import::{ImportBuilder, ImportExternalBuilder};
pub use self::invoke::{Identity, Invoke};
pub use self::memory::MemoryBuilder;
pub use self::module::{module, ModuleBuilder};
pub use self::table::{TableBuilder, TableDefinition, TableEntryDefinition};
