//! Elements of the WebAssembly binary format.
//!
//! This module owns the whole binary codec: LEB128 primitives, section
//! framing, and the in-memory module structure with its instruction tree.
//! Deserialization and serialization are exact inverses for well-formed
//! modules, including custom sections and any unparsed payload tails that
//! known sections may carry.

use alloc::{string::String, vec::Vec};
use core::fmt;

pub mod io;

mod export_entry;
mod func;
mod global_entry;
mod import_entry;
mod module;
mod ops;
mod primitives;
mod section;
mod segment;
mod types;

pub use self::export_entry::{ExportEntry, Internal};
pub use self::func::{coalesce_locals, expand_locals, Func, FuncBody, Local};
pub use self::global_entry::GlobalEntry;
pub use self::import_entry::{External, ImportEntry, ResizableLimits};
pub use self::module::Module;
pub use self::ops::{
    opcodes, BrTableData, ImmediateKind, InitExpr, Instruction, Instructions, Operator,
};
pub use self::primitives::{
    CountedList, CountedListWriter, Uint32, Uint64, VarInt32, VarInt64, VarInt7, VarUint1,
    VarUint32, VarUint7,
};
pub use self::section::{
    CodeSection, CustomSection, DataSection, ElementSection, ExportSection, FunctionSection,
    GlobalSection, ImportSection, MemorySection, Section, StartSection, TableSection, TypeSection,
};
pub use self::segment::{DataSegment, ElementSegment};
pub use self::types::{
    BlockType, FunctionType, GlobalType, MemoryType, TableElementType, TableType, Type, ValueType,
};

/// Deserialization from the binary format.
pub trait Deserialize: Sized {
    /// Deserialize type from serial i/o
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error>;
}

/// Serialization into the binary format.
pub trait Serialize {
    /// Serialize type to serial i/o
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error>;
}

/// Deserialization/serialization error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Unexpected end of input.
    UnexpectedEof,
    /// Invalid magic.
    InvalidMagic,
    /// Unsupported version.
    UnsupportedVersion(u32),
    /// Inconsistence between declared and actual length.
    InconsistentLength {
        /// Expected length of the definition.
        expected: usize,
        /// Actual length of the definition.
        actual: usize,
    },
    /// Unknown opcode encountered.
    UnknownOpcode(u8),
    /// Invalid/unknown value type declaration.
    UnknownValueType(i8),
    /// Invalid/unknown table element type declaration.
    UnknownTableElementType(i8),
    /// Unknown external kind code.
    UnknownExternalKind(u8),
    /// Unknown internal kind code.
    UnknownInternalKind(u8),
    /// Unknown section id.
    UnknownSectionId(u8),
    /// Invalid VarUint1 value.
    InvalidVarUint1(u8),
    /// Invalid VarInt7 value.
    InvalidVarInt7(u8),
    /// Invalid VarUint7 value.
    InvalidVarUint7(u8),
    /// Not a minimal/in-range signed 32-bit LEB128.
    InvalidVarInt32,
    /// Not a minimal/in-range signed 64-bit LEB128.
    InvalidVarInt64,
    /// Not a minimal/in-range unsigned 32-bit LEB128.
    InvalidVarUint32,
    /// A second `else` inside one `if` block.
    DuplicatedElse,
    /// A string is not valid UTF-8.
    NonUtf8String,
    /// Any other error.
    Other(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::UnexpectedEof => write!(f, "Unexpected end of input"),
            Error::InvalidMagic => write!(f, "Invalid magic number at start of file"),
            Error::UnsupportedVersion(v) => write!(f, "Unsupported wasm version {}", v),
            Error::InconsistentLength { expected, actual } => {
                write!(f, "Expected length {}, found {}", expected, actual)
            }
            Error::UnknownOpcode(opcode) => write!(f, "Unknown opcode 0x{:02x}", opcode),
            Error::UnknownValueType(ty) => write!(f, "Invalid value type {}", ty),
            Error::UnknownTableElementType(ty) => write!(f, "Unknown table element type {}", ty),
            Error::UnknownExternalKind(kind) => write!(f, "Unknown external kind {}", kind),
            Error::UnknownInternalKind(kind) => write!(f, "Unknown internal kind {}", kind),
            Error::UnknownSectionId(id) => write!(f, "Unknown section id {}", id),
            Error::InvalidVarUint1(val) => write!(f, "Not a boolean value: {}", val),
            Error::InvalidVarInt7(val) => write!(f, "Not a signed 7-bit value: {}", val),
            Error::InvalidVarUint7(val) => write!(f, "Not an unsigned 7-bit value: {}", val),
            Error::InvalidVarInt32 => write!(f, "Not a signed 32-bit LEB128 value"),
            Error::InvalidVarInt64 => write!(f, "Not a signed 64-bit LEB128 value"),
            Error::InvalidVarUint32 => write!(f, "Not an unsigned 32-bit LEB128 value"),
            Error::DuplicatedElse => write!(f, "Duplicated else operator in if block"),
            Error::NonUtf8String => write!(f, "Non-UTF-8 string"),
            Error::Other(msg) => write!(f, "{}", msg),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {
    fn description(&self) -> &str {
        "wasm binary format error"
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err {
            io::Error::UnexpectedEof => Error::UnexpectedEof,
            io::Error::InvalidData => Error::Other("invalid data"),
            io::Error::TrailingData => Error::Other("trailing data"),
        }
    }
}

/// Deserialize a module from a buffer, requiring the whole buffer to be consumed.
pub fn deserialize_buffer<T: Deserialize>(contents: &[u8]) -> Result<T, Error> {
    let mut reader = io::Cursor::new(contents);
    let result = T::deserialize(&mut reader)?;
    if reader.position() != contents.len() {
        return Err(Error::Other("trailing data after module"));
    }
    Ok(result)
}

/// Create a buffer with serialized value.
pub fn serialize<T: Serialize>(val: T) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    val.serialize(&mut buf)?;
    Ok(buf)
}

/// Deserialize a UTF-8 string with a `varuint32` length prefix.
fn deserialize_string<R: io::Read>(reader: &mut R) -> Result<String, Error> {
    let length = u32::from(VarUint32::deserialize(reader)?) as usize;
    let mut bytes = alloc::vec![0u8; length];
    reader.read(&mut bytes[..])?;
    String::from_utf8(bytes).map_err(|_| Error::NonUtf8String)
}

/// Serialize a string with a `varuint32` length prefix.
fn serialize_string<W: io::Write>(value: &str, writer: &mut W) -> Result<(), Error> {
    VarUint32::from(value.len() as u32).serialize(writer)?;
    writer.write(value.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_roundtrip() {
        let mut buf = Vec::new();
        serialize_string("memory", &mut buf).unwrap();
        assert_eq!(buf[0], 6);
        let mut cursor = io::Cursor::new(&buf[..]);
        assert_eq!(deserialize_string(&mut cursor).unwrap(), "memory");
    }

    #[test]
    fn non_utf8_string_rejected() {
        let buf = [2u8, 0xFF, 0xFE];
        let mut cursor = io::Cursor::new(&buf[..]);
        assert_eq!(deserialize_string(&mut cursor), Err(Error::NonUtf8String));
    }
}
