use super::{
    io, BlockType, Deserialize, Error, Serialize, Uint32, Uint64, ValueType, VarInt32, VarInt64,
    VarUint1, VarUint32,
};
use alloc::{boxed::Box, vec::Vec};
use core::fmt;

/// Raw opcode values of every MVP operator plus the two structural
/// pseudo-opcodes (`else`, `end`) that terminate nested blocks.
#[allow(missing_docs)]
pub mod opcodes {
    pub const UNREACHABLE: u8 = 0x00;
    pub const NOP: u8 = 0x01;
    pub const BLOCK: u8 = 0x02;
    pub const LOOP: u8 = 0x03;
    pub const IF: u8 = 0x04;
    pub const ELSE: u8 = 0x05;
    pub const END: u8 = 0x0b;
    pub const BR: u8 = 0x0c;
    pub const BRIF: u8 = 0x0d;
    pub const BRTABLE: u8 = 0x0e;
    pub const RETURN: u8 = 0x0f;
    pub const CALL: u8 = 0x10;
    pub const CALLINDIRECT: u8 = 0x11;
    pub const DROP: u8 = 0x1a;
    pub const SELECT: u8 = 0x1b;
    pub const GETLOCAL: u8 = 0x20;
    pub const SETLOCAL: u8 = 0x21;
    pub const TEELOCAL: u8 = 0x22;
    pub const GETGLOBAL: u8 = 0x23;
    pub const SETGLOBAL: u8 = 0x24;
    pub const I32LOAD: u8 = 0x28;
    pub const I64LOAD: u8 = 0x29;
    pub const F32LOAD: u8 = 0x2a;
    pub const F64LOAD: u8 = 0x2b;
    pub const I32LOAD8S: u8 = 0x2c;
    pub const I32LOAD8U: u8 = 0x2d;
    pub const I32LOAD16S: u8 = 0x2e;
    pub const I32LOAD16U: u8 = 0x2f;
    pub const I64LOAD8S: u8 = 0x30;
    pub const I64LOAD8U: u8 = 0x31;
    pub const I64LOAD16S: u8 = 0x32;
    pub const I64LOAD16U: u8 = 0x33;
    pub const I64LOAD32S: u8 = 0x34;
    pub const I64LOAD32U: u8 = 0x35;
    pub const I32STORE: u8 = 0x36;
    pub const I64STORE: u8 = 0x37;
    pub const F32STORE: u8 = 0x38;
    pub const F64STORE: u8 = 0x39;
    pub const I32STORE8: u8 = 0x3a;
    pub const I32STORE16: u8 = 0x3b;
    pub const I64STORE8: u8 = 0x3c;
    pub const I64STORE16: u8 = 0x3d;
    pub const I64STORE32: u8 = 0x3e;
    pub const CURRENTMEMORY: u8 = 0x3f;
    pub const GROWMEMORY: u8 = 0x40;
    pub const I32CONST: u8 = 0x41;
    pub const I64CONST: u8 = 0x42;
    pub const F32CONST: u8 = 0x43;
    pub const F64CONST: u8 = 0x44;
    pub const I32EQZ: u8 = 0x45;
    pub const I32EQ: u8 = 0x46;
    pub const I32NE: u8 = 0x47;
    pub const I32LTS: u8 = 0x48;
    pub const I32LTU: u8 = 0x49;
    pub const I32GTS: u8 = 0x4a;
    pub const I32GTU: u8 = 0x4b;
    pub const I32LES: u8 = 0x4c;
    pub const I32LEU: u8 = 0x4d;
    pub const I32GES: u8 = 0x4e;
    pub const I32GEU: u8 = 0x4f;
    pub const I64EQZ: u8 = 0x50;
    pub const I64EQ: u8 = 0x51;
    pub const I64NE: u8 = 0x52;
    pub const I64LTS: u8 = 0x53;
    pub const I64LTU: u8 = 0x54;
    pub const I64GTS: u8 = 0x55;
    pub const I64GTU: u8 = 0x56;
    pub const I64LES: u8 = 0x57;
    pub const I64LEU: u8 = 0x58;
    pub const I64GES: u8 = 0x59;
    pub const I64GEU: u8 = 0x5a;
    pub const F32EQ: u8 = 0x5b;
    pub const F32NE: u8 = 0x5c;
    pub const F32LT: u8 = 0x5d;
    pub const F32GT: u8 = 0x5e;
    pub const F32LE: u8 = 0x5f;
    pub const F32GE: u8 = 0x60;
    pub const F64EQ: u8 = 0x61;
    pub const F64NE: u8 = 0x62;
    pub const F64LT: u8 = 0x63;
    pub const F64GT: u8 = 0x64;
    pub const F64LE: u8 = 0x65;
    pub const F64GE: u8 = 0x66;
    pub const I32CLZ: u8 = 0x67;
    pub const I32CTZ: u8 = 0x68;
    pub const I32POPCNT: u8 = 0x69;
    pub const I32ADD: u8 = 0x6a;
    pub const I32SUB: u8 = 0x6b;
    pub const I32MUL: u8 = 0x6c;
    pub const I32DIVS: u8 = 0x6d;
    pub const I32DIVU: u8 = 0x6e;
    pub const I32REMS: u8 = 0x6f;
    pub const I32REMU: u8 = 0x70;
    pub const I32AND: u8 = 0x71;
    pub const I32OR: u8 = 0x72;
    pub const I32XOR: u8 = 0x73;
    pub const I32SHL: u8 = 0x74;
    pub const I32SHRS: u8 = 0x75;
    pub const I32SHRU: u8 = 0x76;
    pub const I32ROTL: u8 = 0x77;
    pub const I32ROTR: u8 = 0x78;
    pub const I64CLZ: u8 = 0x79;
    pub const I64CTZ: u8 = 0x7a;
    pub const I64POPCNT: u8 = 0x7b;
    pub const I64ADD: u8 = 0x7c;
    pub const I64SUB: u8 = 0x7d;
    pub const I64MUL: u8 = 0x7e;
    pub const I64DIVS: u8 = 0x7f;
    pub const I64DIVU: u8 = 0x80;
    pub const I64REMS: u8 = 0x81;
    pub const I64REMU: u8 = 0x82;
    pub const I64AND: u8 = 0x83;
    pub const I64OR: u8 = 0x84;
    pub const I64XOR: u8 = 0x85;
    pub const I64SHL: u8 = 0x86;
    pub const I64SHRS: u8 = 0x87;
    pub const I64SHRU: u8 = 0x88;
    pub const I64ROTL: u8 = 0x89;
    pub const I64ROTR: u8 = 0x8a;
    pub const F32ABS: u8 = 0x8b;
    pub const F32NEG: u8 = 0x8c;
    pub const F32CEIL: u8 = 0x8d;
    pub const F32FLOOR: u8 = 0x8e;
    pub const F32TRUNC: u8 = 0x8f;
    pub const F32NEAREST: u8 = 0x90;
    pub const F32SQRT: u8 = 0x91;
    pub const F32ADD: u8 = 0x92;
    pub const F32SUB: u8 = 0x93;
    pub const F32MUL: u8 = 0x94;
    pub const F32DIV: u8 = 0x95;
    pub const F32MIN: u8 = 0x96;
    pub const F32MAX: u8 = 0x97;
    pub const F32COPYSIGN: u8 = 0x98;
    pub const F64ABS: u8 = 0x99;
    pub const F64NEG: u8 = 0x9a;
    pub const F64CEIL: u8 = 0x9b;
    pub const F64FLOOR: u8 = 0x9c;
    pub const F64TRUNC: u8 = 0x9d;
    pub const F64NEAREST: u8 = 0x9e;
    pub const F64SQRT: u8 = 0x9f;
    pub const F64ADD: u8 = 0xa0;
    pub const F64SUB: u8 = 0xa1;
    pub const F64MUL: u8 = 0xa2;
    pub const F64DIV: u8 = 0xa3;
    pub const F64MIN: u8 = 0xa4;
    pub const F64MAX: u8 = 0xa5;
    pub const F64COPYSIGN: u8 = 0xa6;
    pub const I32WRAPI64: u8 = 0xa7;
    pub const I32TRUNCSF32: u8 = 0xa8;
    pub const I32TRUNCUF32: u8 = 0xa9;
    pub const I32TRUNCSF64: u8 = 0xaa;
    pub const I32TRUNCUF64: u8 = 0xab;
    pub const I64EXTENDSI32: u8 = 0xac;
    pub const I64EXTENDUI32: u8 = 0xad;
    pub const I64TRUNCSF32: u8 = 0xae;
    pub const I64TRUNCUF32: u8 = 0xaf;
    pub const I64TRUNCSF64: u8 = 0xb0;
    pub const I64TRUNCUF64: u8 = 0xb1;
    pub const F32CONVERTSI32: u8 = 0xb2;
    pub const F32CONVERTUI32: u8 = 0xb3;
    pub const F32CONVERTSI64: u8 = 0xb4;
    pub const F32CONVERTUI64: u8 = 0xb5;
    pub const F32DEMOTEF64: u8 = 0xb6;
    pub const F64CONVERTSI32: u8 = 0xb7;
    pub const F64CONVERTUI32: u8 = 0xb8;
    pub const F64CONVERTSI64: u8 = 0xb9;
    pub const F64CONVERTUI64: u8 = 0xba;
    pub const F64PROMOTEF32: u8 = 0xbb;
    pub const I32REINTERPRETF32: u8 = 0xbc;
    pub const I64REINTERPRETF64: u8 = 0xbd;
    pub const F32REINTERPRETI32: u8 = 0xbe;
    pub const F64REINTERPRETI64: u8 = 0xbf;
}

/// Shape of the immediates that follow an opcode in the byte stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImmediateKind {
    /// No immediates.
    None,
    /// A single `varuint32` (indices, break depths, reserved flags).
    VarUint32,
    /// A single `varint32` constant.
    VarInt32,
    /// A single `varint64` constant.
    VarInt64,
    /// A little-endian 32-bit float bit pattern.
    Float32,
    /// A little-endian 64-bit float bit pattern.
    Float64,
    /// `log2(alignment)` and byte offset, both `varuint32`.
    Memory,
    /// Type index plus a reserved byte.
    CallIndirect,
    /// Block type followed by a body terminated by `end`.
    Block,
    /// Block type, a then-body up to `else` or `end`, an optional else-body.
    IfElse,
    /// Target table: count, `count` targets, default target.
    BrTable,
}

/// A catalog entry describing one operator: how it is written in text form,
/// which scalar kind declares it (if any), and how its immediates are
/// encoded.
#[derive(Clone, Copy, Debug)]
pub struct Operator {
    /// Opcode this operator is keyed by.
    pub opcode: u8,
    /// Text-format mnemonic.
    pub mnemonic: &'static str,
    /// The scalar kind the operator belongs to, if it has one.
    pub kind: Option<ValueType>,
    /// Encoding shape of the operator's immediates.
    pub immediates: ImmediateKind,
}

macro_rules! operator_catalog {
    ($( $opcode:ident => $mnemonic:expr, $kind:expr, $imm:ident; )*) => {
        const fn build_catalog() -> [Option<Operator>; 0x100] {
            let mut catalog: [Option<Operator>; 0x100] = [None; 0x100];
            $(
                catalog[opcodes::$opcode as usize] = Some(Operator {
                    opcode: opcodes::$opcode,
                    mnemonic: $mnemonic,
                    kind: $kind,
                    immediates: ImmediateKind::$imm,
                });
            )*
            catalog
        }
    };
}

use self::ValueType::{F32, F64, I32, I64};

operator_catalog! {
    UNREACHABLE => "unreachable", None, None;
    NOP => "nop", None, None;
    BLOCK => "block", None, Block;
    LOOP => "loop", None, Block;
    IF => "if", None, IfElse;
    BR => "br", None, VarUint32;
    BRIF => "br_if", None, VarUint32;
    BRTABLE => "br_table", None, BrTable;
    RETURN => "return", None, None;
    CALL => "call", None, VarUint32;
    CALLINDIRECT => "call_indirect", None, CallIndirect;
    DROP => "drop", None, None;
    SELECT => "select", None, None;
    GETLOCAL => "get_local", None, VarUint32;
    SETLOCAL => "set_local", None, VarUint32;
    TEELOCAL => "tee_local", None, VarUint32;
    GETGLOBAL => "get_global", None, VarUint32;
    SETGLOBAL => "set_global", None, VarUint32;
    I32LOAD => "i32.load", Some(I32), Memory;
    I64LOAD => "i64.load", Some(I64), Memory;
    F32LOAD => "f32.load", Some(F32), Memory;
    F64LOAD => "f64.load", Some(F64), Memory;
    I32LOAD8S => "i32.load8_s", Some(I32), Memory;
    I32LOAD8U => "i32.load8_u", Some(I32), Memory;
    I32LOAD16S => "i32.load16_s", Some(I32), Memory;
    I32LOAD16U => "i32.load16_u", Some(I32), Memory;
    I64LOAD8S => "i64.load8_s", Some(I64), Memory;
    I64LOAD8U => "i64.load8_u", Some(I64), Memory;
    I64LOAD16S => "i64.load16_s", Some(I64), Memory;
    I64LOAD16U => "i64.load16_u", Some(I64), Memory;
    I64LOAD32S => "i64.load32_s", Some(I64), Memory;
    I64LOAD32U => "i64.load32_u", Some(I64), Memory;
    I32STORE => "i32.store", Some(I32), Memory;
    I64STORE => "i64.store", Some(I64), Memory;
    F32STORE => "f32.store", Some(F32), Memory;
    F64STORE => "f64.store", Some(F64), Memory;
    I32STORE8 => "i32.store8", Some(I32), Memory;
    I32STORE16 => "i32.store16", Some(I32), Memory;
    I64STORE8 => "i64.store8", Some(I64), Memory;
    I64STORE16 => "i64.store16", Some(I64), Memory;
    I64STORE32 => "i64.store32", Some(I64), Memory;
    CURRENTMEMORY => "current_memory", None, VarUint32;
    GROWMEMORY => "grow_memory", None, VarUint32;
    I32CONST => "i32.const", Some(I32), VarInt32;
    I64CONST => "i64.const", Some(I64), VarInt64;
    F32CONST => "f32.const", Some(F32), Float32;
    F64CONST => "f64.const", Some(F64), Float64;
    I32EQZ => "i32.eqz", Some(I32), None;
    I32EQ => "i32.eq", Some(I32), None;
    I32NE => "i32.ne", Some(I32), None;
    I32LTS => "i32.lt_s", Some(I32), None;
    I32LTU => "i32.lt_u", Some(I32), None;
    I32GTS => "i32.gt_s", Some(I32), None;
    I32GTU => "i32.gt_u", Some(I32), None;
    I32LES => "i32.le_s", Some(I32), None;
    I32LEU => "i32.le_u", Some(I32), None;
    I32GES => "i32.ge_s", Some(I32), None;
    I32GEU => "i32.ge_u", Some(I32), None;
    I64EQZ => "i64.eqz", Some(I64), None;
    I64EQ => "i64.eq", Some(I64), None;
    I64NE => "i64.ne", Some(I64), None;
    I64LTS => "i64.lt_s", Some(I64), None;
    I64LTU => "i64.lt_u", Some(I64), None;
    I64GTS => "i64.gt_s", Some(I64), None;
    I64GTU => "i64.gt_u", Some(I64), None;
    I64LES => "i64.le_s", Some(I64), None;
    I64LEU => "i64.le_u", Some(I64), None;
    I64GES => "i64.ge_s", Some(I64), None;
    I64GEU => "i64.ge_u", Some(I64), None;
    F32EQ => "f32.eq", Some(F32), None;
    F32NE => "f32.ne", Some(F32), None;
    F32LT => "f32.lt", Some(F32), None;
    F32GT => "f32.gt", Some(F32), None;
    F32LE => "f32.le", Some(F32), None;
    F32GE => "f32.ge", Some(F32), None;
    F64EQ => "f64.eq", Some(F64), None;
    F64NE => "f64.ne", Some(F64), None;
    F64LT => "f64.lt", Some(F64), None;
    F64GT => "f64.gt", Some(F64), None;
    F64LE => "f64.le", Some(F64), None;
    F64GE => "f64.ge", Some(F64), None;
    I32CLZ => "i32.clz", Some(I32), None;
    I32CTZ => "i32.ctz", Some(I32), None;
    I32POPCNT => "i32.popcnt", Some(I32), None;
    I32ADD => "i32.add", Some(I32), None;
    I32SUB => "i32.sub", Some(I32), None;
    I32MUL => "i32.mul", Some(I32), None;
    I32DIVS => "i32.div_s", Some(I32), None;
    I32DIVU => "i32.div_u", Some(I32), None;
    I32REMS => "i32.rem_s", Some(I32), None;
    I32REMU => "i32.rem_u", Some(I32), None;
    I32AND => "i32.and", Some(I32), None;
    I32OR => "i32.or", Some(I32), None;
    I32XOR => "i32.xor", Some(I32), None;
    I32SHL => "i32.shl", Some(I32), None;
    I32SHRS => "i32.shr_s", Some(I32), None;
    I32SHRU => "i32.shr_u", Some(I32), None;
    I32ROTL => "i32.rotl", Some(I32), None;
    I32ROTR => "i32.rotr", Some(I32), None;
    I64CLZ => "i64.clz", Some(I64), None;
    I64CTZ => "i64.ctz", Some(I64), None;
    I64POPCNT => "i64.popcnt", Some(I64), None;
    I64ADD => "i64.add", Some(I64), None;
    I64SUB => "i64.sub", Some(I64), None;
    I64MUL => "i64.mul", Some(I64), None;
    I64DIVS => "i64.div_s", Some(I64), None;
    I64DIVU => "i64.div_u", Some(I64), None;
    I64REMS => "i64.rem_s", Some(I64), None;
    I64REMU => "i64.rem_u", Some(I64), None;
    I64AND => "i64.and", Some(I64), None;
    I64OR => "i64.or", Some(I64), None;
    I64XOR => "i64.xor", Some(I64), None;
    I64SHL => "i64.shl", Some(I64), None;
    I64SHRS => "i64.shr_s", Some(I64), None;
    I64SHRU => "i64.shr_u", Some(I64), None;
    I64ROTL => "i64.rotl", Some(I64), None;
    I64ROTR => "i64.rotr", Some(I64), None;
    F32ABS => "f32.abs", Some(F32), None;
    F32NEG => "f32.neg", Some(F32), None;
    F32CEIL => "f32.ceil", Some(F32), None;
    F32FLOOR => "f32.floor", Some(F32), None;
    F32TRUNC => "f32.trunc", Some(F32), None;
    F32NEAREST => "f32.nearest", Some(F32), None;
    F32SQRT => "f32.sqrt", Some(F32), None;
    F32ADD => "f32.add", Some(F32), None;
    F32SUB => "f32.sub", Some(F32), None;
    F32MUL => "f32.mul", Some(F32), None;
    F32DIV => "f32.div", Some(F32), None;
    F32MIN => "f32.min", Some(F32), None;
    F32MAX => "f32.max", Some(F32), None;
    F32COPYSIGN => "f32.copysign", Some(F32), None;
    F64ABS => "f64.abs", Some(F64), None;
    F64NEG => "f64.neg", Some(F64), None;
    F64CEIL => "f64.ceil", Some(F64), None;
    F64FLOOR => "f64.floor", Some(F64), None;
    F64TRUNC => "f64.trunc", Some(F64), None;
    F64NEAREST => "f64.nearest", Some(F64), None;
    F64SQRT => "f64.sqrt", Some(F64), None;
    F64ADD => "f64.add", Some(F64), None;
    F64SUB => "f64.sub", Some(F64), None;
    F64MUL => "f64.mul", Some(F64), None;
    F64DIV => "f64.div", Some(F64), None;
    F64MIN => "f64.min", Some(F64), None;
    F64MAX => "f64.max", Some(F64), None;
    F64COPYSIGN => "f64.copysign", Some(F64), None;
    I32WRAPI64 => "i32.wrap/i64", Some(I32), None;
    I32TRUNCSF32 => "i32.trunc_s/f32", Some(I32), None;
    I32TRUNCUF32 => "i32.trunc_u/f32", Some(I32), None;
    I32TRUNCSF64 => "i32.trunc_s/f64", Some(I32), None;
    I32TRUNCUF64 => "i32.trunc_u/f64", Some(I32), None;
    I64EXTENDSI32 => "i64.extend_s/i32", Some(I64), None;
    I64EXTENDUI32 => "i64.extend_u/i32", Some(I64), None;
    I64TRUNCSF32 => "i64.trunc_s/f32", Some(I64), None;
    I64TRUNCUF32 => "i64.trunc_u/f32", Some(I64), None;
    I64TRUNCSF64 => "i64.trunc_s/f64", Some(I64), None;
    I64TRUNCUF64 => "i64.trunc_u/f64", Some(I64), None;
    F32CONVERTSI32 => "f32.convert_s/i32", Some(F32), None;
    F32CONVERTUI32 => "f32.convert_u/i32", Some(F32), None;
    F32CONVERTSI64 => "f32.convert_s/i64", Some(F32), None;
    F32CONVERTUI64 => "f32.convert_u/i64", Some(F32), None;
    F32DEMOTEF64 => "f32.demote/f64", Some(F32), None;
    F64CONVERTSI32 => "f64.convert_s/i32", Some(F64), None;
    F64CONVERTUI32 => "f64.convert_u/i32", Some(F64), None;
    F64CONVERTSI64 => "f64.convert_s/i64", Some(F64), None;
    F64CONVERTUI64 => "f64.convert_u/i64", Some(F64), None;
    F64PROMOTEF32 => "f64.promote/f32", Some(F64), None;
    I32REINTERPRETF32 => "i32.reinterpret/f32", Some(I32), None;
    I64REINTERPRETF64 => "i64.reinterpret/f64", Some(I64), None;
    F32REINTERPRETI32 => "f32.reinterpret/i32", Some(F32), None;
    F64REINTERPRETI64 => "f64.reinterpret/i64", Some(F64), None;
}

/// The process-wide operator catalog, built once at compile time and keyed
/// by opcode. `else` and `end` are structural and deliberately absent.
static CATALOG: [Option<Operator>; 0x100] = build_catalog();

impl Operator {
    /// Look up the descriptor for an opcode.
    ///
    /// Total over the opcodes the MVP defines; anything else (including the
    /// structural `else`/`end` bytes) is an [`Error::UnknownOpcode`].
    pub fn lookup(opcode: u8) -> Result<&'static Operator, Error> {
        CATALOG[opcode as usize]
            .as_ref()
            .ok_or(Error::UnknownOpcode(opcode))
    }
}

/// Targets of a `br_table` instruction: the jump table itself plus the
/// default break depth taken when the index is out of range.
#[derive(Debug, Clone, PartialEq)]
pub struct BrTableData {
    /// Break depths selected by in-range indices.
    pub table: Box<[u32]>,
    /// Break depth taken for any out-of-range index.
    pub default: u32,
}

/// A single instruction with its immediates. Structured operators own their
/// nested bodies, so a function body forms a tree.
#[derive(Clone, Debug, PartialEq)]
#[allow(missing_docs)]
pub enum Instruction {
    Unreachable,
    Nop,
    Block(BlockType, Instructions),
    Loop(BlockType, Instructions),
    If(BlockType, Instructions, Option<Instructions>),
    Br(u32),
    BrIf(u32),
    BrTable(Box<BrTableData>),
    Return,

    Call(u32),
    CallIndirect(u32, u8),

    Drop,
    Select,

    GetLocal(u32),
    SetLocal(u32),
    TeeLocal(u32),
    GetGlobal(u32),
    SetGlobal(u32),

    // All memory operators carry `log2(alignment)` and a byte offset.
    I32Load(u32, u32),
    I64Load(u32, u32),
    F32Load(u32, u32),
    F64Load(u32, u32),
    I32Load8S(u32, u32),
    I32Load8U(u32, u32),
    I32Load16S(u32, u32),
    I32Load16U(u32, u32),
    I64Load8S(u32, u32),
    I64Load8U(u32, u32),
    I64Load16S(u32, u32),
    I64Load16U(u32, u32),
    I64Load32S(u32, u32),
    I64Load32U(u32, u32),
    I32Store(u32, u32),
    I64Store(u32, u32),
    F32Store(u32, u32),
    F64Store(u32, u32),
    I32Store8(u32, u32),
    I32Store16(u32, u32),
    I64Store8(u32, u32),
    I64Store16(u32, u32),
    I64Store32(u32, u32),

    CurrentMemory(u8),
    GrowMemory(u8),

    I32Const(i32),
    I64Const(i64),
    F32Const(u32),
    F64Const(u64),

    I32Eqz,
    I32Eq,
    I32Ne,
    I32LtS,
    I32LtU,
    I32GtS,
    I32GtU,
    I32LeS,
    I32LeU,
    I32GeS,
    I32GeU,

    I64Eqz,
    I64Eq,
    I64Ne,
    I64LtS,
    I64LtU,
    I64GtS,
    I64GtU,
    I64LeS,
    I64LeU,
    I64GeS,
    I64GeU,

    F32Eq,
    F32Ne,
    F32Lt,
    F32Gt,
    F32Le,
    F32Ge,

    F64Eq,
    F64Ne,
    F64Lt,
    F64Gt,
    F64Le,
    F64Ge,

    I32Clz,
    I32Ctz,
    I32Popcnt,
    I32Add,
    I32Sub,
    I32Mul,
    I32DivS,
    I32DivU,
    I32RemS,
    I32RemU,
    I32And,
    I32Or,
    I32Xor,
    I32Shl,
    I32ShrS,
    I32ShrU,
    I32Rotl,
    I32Rotr,

    I64Clz,
    I64Ctz,
    I64Popcnt,
    I64Add,
    I64Sub,
    I64Mul,
    I64DivS,
    I64DivU,
    I64RemS,
    I64RemU,
    I64And,
    I64Or,
    I64Xor,
    I64Shl,
    I64ShrS,
    I64ShrU,
    I64Rotl,
    I64Rotr,

    F32Abs,
    F32Neg,
    F32Ceil,
    F32Floor,
    F32Trunc,
    F32Nearest,
    F32Sqrt,
    F32Add,
    F32Sub,
    F32Mul,
    F32Div,
    F32Min,
    F32Max,
    F32Copysign,

    F64Abs,
    F64Neg,
    F64Ceil,
    F64Floor,
    F64Trunc,
    F64Nearest,
    F64Sqrt,
    F64Add,
    F64Sub,
    F64Mul,
    F64Div,
    F64Min,
    F64Max,
    F64Copysign,

    I32WrapI64,
    I32TruncSF32,
    I32TruncUF32,
    I32TruncSF64,
    I32TruncUF64,
    I64ExtendSI32,
    I64ExtendUI32,
    I64TruncSF32,
    I64TruncUF32,
    I64TruncSF64,
    I64TruncUF64,
    F32ConvertSI32,
    F32ConvertUI32,
    F32ConvertSI64,
    F32ConvertUI64,
    F32DemoteF64,
    F64ConvertSI32,
    F64ConvertUI32,
    F64ConvertSI64,
    F64ConvertUI64,
    F64PromoteF32,
    I32ReinterpretF32,
    I64ReinterpretF64,
    F32ReinterpretI32,
    F64ReinterpretI64,
}

/// An instruction sequence forming a function body or a nested block body.
/// The terminating `end` byte is implicit and not part of the sequence.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Instructions(Vec<Instruction>);

impl Instructions {
    /// New sequence from a list of instructions.
    pub fn new(elements: Vec<Instruction>) -> Self {
        Instructions(elements)
    }

    /// Empty sequence.
    pub fn empty() -> Self {
        Instructions(Vec::new())
    }

    /// List of the instructions.
    pub fn elements(&self) -> &[Instruction] {
        &self.0
    }

    /// Mutable list of the instructions.
    pub fn elements_mut(&mut self) -> &mut Vec<Instruction> {
        &mut self.0
    }
}

/// An initializer expression: a constant instruction sequence whose
/// evaluation on an empty stack yields exactly one value. Used for global
/// initial values and segment offsets.
#[derive(Clone, Debug, PartialEq)]
pub struct InitExpr(Vec<Instruction>);

impl InitExpr {
    /// New initializer expression from a list of instructions.
    pub fn new(code: Vec<Instruction>) -> Self {
        InitExpr(code)
    }

    /// List of the instructions.
    pub fn code(&self) -> &[Instruction] {
        &self.0
    }

    /// Mutable list of the instructions.
    pub fn code_mut(&mut self) -> &mut Vec<Instruction> {
        &mut self.0
    }
}

/// What terminated a nested instruction sequence.
enum Terminator {
    End,
    Else,
}

/// Who is consuming a nested instruction sequence; decides whether an
/// `else` byte switches arms or is malformed.
#[derive(Clone, Copy, PartialEq)]
enum SequenceKind {
    /// Function body, block or loop body, or initializer expression.
    Plain,
    /// The then-arm of an `if`: `else` switches to the else-arm.
    IfThen,
    /// The else-arm of an `if`: a second `else` is a format error.
    IfElse,
}

fn deserialize_sequence<R: io::Read>(
    reader: &mut R,
    kind: SequenceKind,
) -> Result<(Vec<Instruction>, Terminator), Error> {
    let mut instructions = Vec::new();
    loop {
        let mut opcode_buf = [0u8; 1];
        reader.read(&mut opcode_buf)?;
        match opcode_buf[0] {
            opcodes::END => return Ok((instructions, Terminator::End)),
            opcodes::ELSE => match kind {
                SequenceKind::IfThen => return Ok((instructions, Terminator::Else)),
                SequenceKind::IfElse => return Err(Error::DuplicatedElse),
                SequenceKind::Plain => {
                    return Err(Error::Other("else opcode outside of if block"))
                }
            },
            opcode => instructions.push(deserialize_instruction(opcode, reader)?),
        }
    }
}

fn deserialize_instruction<R: io::Read>(opcode: u8, reader: &mut R) -> Result<Instruction, Error> {
    use self::opcodes::*;
    use self::Instruction::*;

    let operator = Operator::lookup(opcode)?;
    let instruction = match operator.immediates {
        ImmediateKind::None => match opcode {
            UNREACHABLE => Unreachable,
            NOP => Nop,
            RETURN => Return,
            DROP => Drop,
            SELECT => Select,
            I32EQZ => I32Eqz,
            I32EQ => I32Eq,
            I32NE => I32Ne,
            I32LTS => I32LtS,
            I32LTU => I32LtU,
            I32GTS => I32GtS,
            I32GTU => I32GtU,
            I32LES => I32LeS,
            I32LEU => I32LeU,
            I32GES => I32GeS,
            I32GEU => I32GeU,
            I64EQZ => I64Eqz,
            I64EQ => I64Eq,
            I64NE => I64Ne,
            I64LTS => I64LtS,
            I64LTU => I64LtU,
            I64GTS => I64GtS,
            I64GTU => I64GtU,
            I64LES => I64LeS,
            I64LEU => I64LeU,
            I64GES => I64GeS,
            I64GEU => I64GeU,
            F32EQ => F32Eq,
            F32NE => F32Ne,
            F32LT => F32Lt,
            F32GT => F32Gt,
            F32LE => F32Le,
            F32GE => F32Ge,
            F64EQ => F64Eq,
            F64NE => F64Ne,
            F64LT => F64Lt,
            F64GT => F64Gt,
            F64LE => F64Le,
            F64GE => F64Ge,
            I32CLZ => I32Clz,
            I32CTZ => I32Ctz,
            I32POPCNT => I32Popcnt,
            I32ADD => I32Add,
            I32SUB => I32Sub,
            I32MUL => I32Mul,
            I32DIVS => I32DivS,
            I32DIVU => I32DivU,
            I32REMS => I32RemS,
            I32REMU => I32RemU,
            I32AND => I32And,
            I32OR => I32Or,
            I32XOR => I32Xor,
            I32SHL => I32Shl,
            I32SHRS => I32ShrS,
            I32SHRU => I32ShrU,
            I32ROTL => I32Rotl,
            I32ROTR => I32Rotr,
            I64CLZ => I64Clz,
            I64CTZ => I64Ctz,
            I64POPCNT => I64Popcnt,
            I64ADD => I64Add,
            I64SUB => I64Sub,
            I64MUL => I64Mul,
            I64DIVS => I64DivS,
            I64DIVU => I64DivU,
            I64REMS => I64RemS,
            I64REMU => I64RemU,
            I64AND => I64And,
            I64OR => I64Or,
            I64XOR => I64Xor,
            I64SHL => I64Shl,
            I64SHRS => I64ShrS,
            I64SHRU => I64ShrU,
            I64ROTL => I64Rotl,
            I64ROTR => I64Rotr,
            F32ABS => F32Abs,
            F32NEG => F32Neg,
            F32CEIL => F32Ceil,
            F32FLOOR => F32Floor,
            F32TRUNC => F32Trunc,
            F32NEAREST => F32Nearest,
            F32SQRT => F32Sqrt,
            F32ADD => F32Add,
            F32SUB => F32Sub,
            F32MUL => F32Mul,
            F32DIV => F32Div,
            F32MIN => F32Min,
            F32MAX => F32Max,
            F32COPYSIGN => F32Copysign,
            F64ABS => F64Abs,
            F64NEG => F64Neg,
            F64CEIL => F64Ceil,
            F64FLOOR => F64Floor,
            F64TRUNC => F64Trunc,
            F64NEAREST => F64Nearest,
            F64SQRT => F64Sqrt,
            F64ADD => F64Add,
            F64SUB => F64Sub,
            F64MUL => F64Mul,
            F64DIV => F64Div,
            F64MIN => F64Min,
            F64MAX => F64Max,
            F64COPYSIGN => F64Copysign,
            I32WRAPI64 => I32WrapI64,
            I32TRUNCSF32 => I32TruncSF32,
            I32TRUNCUF32 => I32TruncUF32,
            I32TRUNCSF64 => I32TruncSF64,
            I32TRUNCUF64 => I32TruncUF64,
            I64EXTENDSI32 => I64ExtendSI32,
            I64EXTENDUI32 => I64ExtendUI32,
            I64TRUNCSF32 => I64TruncSF32,
            I64TRUNCUF32 => I64TruncUF32,
            I64TRUNCSF64 => I64TruncSF64,
            I64TRUNCUF64 => I64TruncUF64,
            F32CONVERTSI32 => F32ConvertSI32,
            F32CONVERTUI32 => F32ConvertUI32,
            F32CONVERTSI64 => F32ConvertSI64,
            F32CONVERTUI64 => F32ConvertUI64,
            F32DEMOTEF64 => F32DemoteF64,
            F64CONVERTSI32 => F64ConvertSI32,
            F64CONVERTUI32 => F64ConvertUI32,
            F64CONVERTSI64 => F64ConvertSI64,
            F64CONVERTUI64 => F64ConvertUI64,
            F64PROMOTEF32 => F64PromoteF32,
            I32REINTERPRETF32 => I32ReinterpretF32,
            I64REINTERPRETF64 => I64ReinterpretF64,
            F32REINTERPRETI32 => F32ReinterpretI32,
            F64REINTERPRETI64 => F64ReinterpretI64,
            other => return Err(Error::UnknownOpcode(other)),
        },
        ImmediateKind::VarUint32 => {
            match opcode {
                // The memory size operators encode a reserved flag that
                // must currently be zero.
                CURRENTMEMORY => CurrentMemory(u8::from(bool::from(VarUint1::deserialize(reader)?))),
                GROWMEMORY => GrowMemory(u8::from(bool::from(VarUint1::deserialize(reader)?))),
                _ => {
                    let index = u32::from(VarUint32::deserialize(reader)?);
                    match opcode {
                        BR => Br(index),
                        BRIF => BrIf(index),
                        CALL => Call(index),
                        GETLOCAL => GetLocal(index),
                        SETLOCAL => SetLocal(index),
                        TEELOCAL => TeeLocal(index),
                        GETGLOBAL => GetGlobal(index),
                        SETGLOBAL => SetGlobal(index),
                        other => return Err(Error::UnknownOpcode(other)),
                    }
                }
            }
        }
        ImmediateKind::VarInt32 => I32Const(VarInt32::deserialize(reader)?.into()),
        ImmediateKind::VarInt64 => I64Const(VarInt64::deserialize(reader)?.into()),
        ImmediateKind::Float32 => F32Const(Uint32::deserialize(reader)?.into()),
        ImmediateKind::Float64 => F64Const(Uint64::deserialize(reader)?.into()),
        ImmediateKind::Memory => {
            let align = u32::from(VarUint32::deserialize(reader)?);
            let offset = u32::from(VarUint32::deserialize(reader)?);
            match opcode {
                I32LOAD => I32Load(align, offset),
                I64LOAD => I64Load(align, offset),
                F32LOAD => F32Load(align, offset),
                F64LOAD => F64Load(align, offset),
                I32LOAD8S => I32Load8S(align, offset),
                I32LOAD8U => I32Load8U(align, offset),
                I32LOAD16S => I32Load16S(align, offset),
                I32LOAD16U => I32Load16U(align, offset),
                I64LOAD8S => I64Load8S(align, offset),
                I64LOAD8U => I64Load8U(align, offset),
                I64LOAD16S => I64Load16S(align, offset),
                I64LOAD16U => I64Load16U(align, offset),
                I64LOAD32S => I64Load32S(align, offset),
                I64LOAD32U => I64Load32U(align, offset),
                I32STORE => I32Store(align, offset),
                I64STORE => I64Store(align, offset),
                F32STORE => F32Store(align, offset),
                F64STORE => F64Store(align, offset),
                I32STORE8 => I32Store8(align, offset),
                I32STORE16 => I32Store16(align, offset),
                I64STORE8 => I64Store8(align, offset),
                I64STORE16 => I64Store16(align, offset),
                I64STORE32 => I64Store32(align, offset),
                other => return Err(Error::UnknownOpcode(other)),
            }
        }
        ImmediateKind::CallIndirect => {
            let type_index = u32::from(VarUint32::deserialize(reader)?);
            let reserved = u8::from(bool::from(VarUint1::deserialize(reader)?));
            CallIndirect(type_index, reserved)
        }
        ImmediateKind::Block => {
            let block_type = BlockType::deserialize(reader)?;
            let (body, _) = deserialize_sequence(reader, SequenceKind::Plain)?;
            match opcode {
                BLOCK => Block(block_type, Instructions(body)),
                LOOP => Loop(block_type, Instructions(body)),
                other => return Err(Error::UnknownOpcode(other)),
            }
        }
        ImmediateKind::IfElse => {
            let block_type = BlockType::deserialize(reader)?;
            let (then_body, terminator) = deserialize_sequence(reader, SequenceKind::IfThen)?;
            let else_body = match terminator {
                Terminator::End => None,
                Terminator::Else => {
                    let (body, _) = deserialize_sequence(reader, SequenceKind::IfElse)?;
                    Some(Instructions(body))
                }
            };
            If(block_type, Instructions(then_body), else_body)
        }
        ImmediateKind::BrTable => {
            let targets: Vec<u32> = super::CountedList::<VarUint32>::deserialize(reader)?
                .into_inner()
                .into_iter()
                .map(Into::into)
                .collect();
            let default = u32::from(VarUint32::deserialize(reader)?);
            BrTable(Box::new(BrTableData {
                table: targets.into_boxed_slice(),
                default,
            }))
        }
    };
    Ok(instruction)
}

impl Deserialize for Instructions {
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let (body, _) = deserialize_sequence(reader, SequenceKind::Plain)?;
        Ok(Instructions(body))
    }
}

impl Deserialize for InitExpr {
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let (code, _) = deserialize_sequence(reader, SequenceKind::Plain)?;
        Ok(InitExpr(code))
    }
}

impl Instruction {
    /// Opcode this instruction is encoded with.
    pub fn opcode(&self) -> u8 {
        use self::opcodes::*;
        use self::Instruction::*;

        match *self {
            Unreachable => UNREACHABLE,
            Nop => NOP,
            Block(..) => BLOCK,
            Loop(..) => LOOP,
            If(..) => IF,
            Br(_) => BR,
            BrIf(_) => BRIF,
            BrTable(_) => BRTABLE,
            Return => RETURN,
            Call(_) => CALL,
            CallIndirect(..) => CALLINDIRECT,
            Drop => DROP,
            Select => SELECT,
            GetLocal(_) => GETLOCAL,
            SetLocal(_) => SETLOCAL,
            TeeLocal(_) => TEELOCAL,
            GetGlobal(_) => GETGLOBAL,
            SetGlobal(_) => SETGLOBAL,
            I32Load(..) => I32LOAD,
            I64Load(..) => I64LOAD,
            F32Load(..) => F32LOAD,
            F64Load(..) => F64LOAD,
            I32Load8S(..) => I32LOAD8S,
            I32Load8U(..) => I32LOAD8U,
            I32Load16S(..) => I32LOAD16S,
            I32Load16U(..) => I32LOAD16U,
            I64Load8S(..) => I64LOAD8S,
            I64Load8U(..) => I64LOAD8U,
            I64Load16S(..) => I64LOAD16S,
            I64Load16U(..) => I64LOAD16U,
            I64Load32S(..) => I64LOAD32S,
            I64Load32U(..) => I64LOAD32U,
            I32Store(..) => I32STORE,
            I64Store(..) => I64STORE,
            F32Store(..) => F32STORE,
            F64Store(..) => F64STORE,
            I32Store8(..) => I32STORE8,
            I32Store16(..) => I32STORE16,
            I64Store8(..) => I64STORE8,
            I64Store16(..) => I64STORE16,
            I64Store32(..) => I64STORE32,
            CurrentMemory(_) => CURRENTMEMORY,
            GrowMemory(_) => GROWMEMORY,
            I32Const(_) => I32CONST,
            I64Const(_) => I64CONST,
            F32Const(_) => F32CONST,
            F64Const(_) => F64CONST,
            I32Eqz => I32EQZ,
            I32Eq => I32EQ,
            I32Ne => I32NE,
            I32LtS => I32LTS,
            I32LtU => I32LTU,
            I32GtS => I32GTS,
            I32GtU => I32GTU,
            I32LeS => I32LES,
            I32LeU => I32LEU,
            I32GeS => I32GES,
            I32GeU => I32GEU,
            I64Eqz => I64EQZ,
            I64Eq => I64EQ,
            I64Ne => I64NE,
            I64LtS => I64LTS,
            I64LtU => I64LTU,
            I64GtS => I64GTS,
            I64GtU => I64GTU,
            I64LeS => I64LES,
            I64LeU => I64LEU,
            I64GeS => I64GES,
            I64GeU => I64GEU,
            F32Eq => F32EQ,
            F32Ne => F32NE,
            F32Lt => F32LT,
            F32Gt => F32GT,
            F32Le => F32LE,
            F32Ge => F32GE,
            F64Eq => F64EQ,
            F64Ne => F64NE,
            F64Lt => F64LT,
            F64Gt => F64GT,
            F64Le => F64LE,
            F64Ge => F64GE,
            I32Clz => I32CLZ,
            I32Ctz => I32CTZ,
            I32Popcnt => I32POPCNT,
            I32Add => I32ADD,
            I32Sub => I32SUB,
            I32Mul => I32MUL,
            I32DivS => I32DIVS,
            I32DivU => I32DIVU,
            I32RemS => I32REMS,
            I32RemU => I32REMU,
            I32And => I32AND,
            I32Or => I32OR,
            I32Xor => I32XOR,
            I32Shl => I32SHL,
            I32ShrS => I32SHRS,
            I32ShrU => I32SHRU,
            I32Rotl => I32ROTL,
            I32Rotr => I32ROTR,
            I64Clz => I64CLZ,
            I64Ctz => I64CTZ,
            I64Popcnt => I64POPCNT,
            I64Add => I64ADD,
            I64Sub => I64SUB,
            I64Mul => I64MUL,
            I64DivS => I64DIVS,
            I64DivU => I64DIVU,
            I64RemS => I64REMS,
            I64RemU => I64REMU,
            I64And => I64AND,
            I64Or => I64OR,
            I64Xor => I64XOR,
            I64Shl => I64SHL,
            I64ShrS => I64SHRS,
            I64ShrU => I64SHRU,
            I64Rotl => I64ROTL,
            I64Rotr => I64ROTR,
            F32Abs => F32ABS,
            F32Neg => F32NEG,
            F32Ceil => F32CEIL,
            F32Floor => F32FLOOR,
            F32Trunc => F32TRUNC,
            F32Nearest => F32NEAREST,
            F32Sqrt => F32SQRT,
            F32Add => F32ADD,
            F32Sub => F32SUB,
            F32Mul => F32MUL,
            F32Div => F32DIV,
            F32Min => F32MIN,
            F32Max => F32MAX,
            F32Copysign => F32COPYSIGN,
            F64Abs => F64ABS,
            F64Neg => F64NEG,
            F64Ceil => F64CEIL,
            F64Floor => F64FLOOR,
            F64Trunc => F64TRUNC,
            F64Nearest => F64NEAREST,
            F64Sqrt => F64SQRT,
            F64Add => F64ADD,
            F64Sub => F64SUB,
            F64Mul => F64MUL,
            F64Div => F64DIV,
            F64Min => F64MIN,
            F64Max => F64MAX,
            F64Copysign => F64COPYSIGN,
            I32WrapI64 => I32WRAPI64,
            I32TruncSF32 => I32TRUNCSF32,
            I32TruncUF32 => I32TRUNCUF32,
            I32TruncSF64 => I32TRUNCSF64,
            I32TruncUF64 => I32TRUNCUF64,
            I64ExtendSI32 => I64EXTENDSI32,
            I64ExtendUI32 => I64EXTENDUI32,
            I64TruncSF32 => I64TRUNCSF32,
            I64TruncUF32 => I64TRUNCUF32,
            I64TruncSF64 => I64TRUNCSF64,
            I64TruncUF64 => I64TRUNCUF64,
            F32ConvertSI32 => F32CONVERTSI32,
            F32ConvertUI32 => F32CONVERTUI32,
            F32ConvertSI64 => F32CONVERTSI64,
            F32ConvertUI64 => F32CONVERTUI64,
            F32DemoteF64 => F32DEMOTEF64,
            F64ConvertSI32 => F64CONVERTSI32,
            F64ConvertUI32 => F64CONVERTUI32,
            F64ConvertSI64 => F64CONVERTSI64,
            F64ConvertUI64 => F64CONVERTUI64,
            F64PromoteF32 => F64PROMOTEF32,
            I32ReinterpretF32 => I32REINTERPRETF32,
            I64ReinterpretF64 => I64REINTERPRETF64,
            F32ReinterpretI32 => F32REINTERPRETI32,
            F64ReinterpretI64 => F64REINTERPRETI64,
        }
    }

    /// The catalog descriptor for this instruction's operator.
    pub fn operator(&self) -> &'static Operator {
        Operator::lookup(self.opcode())
            .expect("every instruction variant carries a cataloged opcode; qed")
    }

    /// Whether the instruction belongs to a float operator or carries a
    /// float immediate.
    pub fn is_floating(&self) -> bool {
        matches!(self.operator().kind, Some(ValueType::F32) | Some(ValueType::F64))
    }
}

impl Serialize for Instruction {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        use self::Instruction::*;

        let opcode = self.opcode();
        writer.write(&[opcode])?;
        match self {
            Block(block_type, body) | Loop(block_type, body) => {
                block_type.serialize(writer)?;
                serialize_sequence(body.0, writer)?;
                writer.write(&[opcodes::END])?;
            }
            If(block_type, then_body, else_body) => {
                block_type.serialize(writer)?;
                serialize_sequence(then_body.0, writer)?;
                if let Some(else_body) = else_body {
                    writer.write(&[opcodes::ELSE])?;
                    serialize_sequence(else_body.0, writer)?;
                }
                writer.write(&[opcodes::END])?;
            }
            Br(depth) | BrIf(depth) => VarUint32::from(depth).serialize(writer)?,
            BrTable(data) => {
                let BrTableData { table, default } = *data;
                let targets: Vec<u32> = table.into_vec();
                super::CountedListWriter(
                    targets.len(),
                    targets.into_iter().map(VarUint32::from),
                )
                .serialize(writer)?;
                VarUint32::from(default).serialize(writer)?;
            }
            Call(index) => VarUint32::from(index).serialize(writer)?,
            CallIndirect(type_index, reserved) => {
                VarUint32::from(type_index).serialize(writer)?;
                VarUint1::from(reserved != 0).serialize(writer)?;
            }
            GetLocal(index) | SetLocal(index) | TeeLocal(index) | GetGlobal(index)
            | SetGlobal(index) => VarUint32::from(index).serialize(writer)?,
            I32Load(align, offset)
            | I64Load(align, offset)
            | F32Load(align, offset)
            | F64Load(align, offset)
            | I32Load8S(align, offset)
            | I32Load8U(align, offset)
            | I32Load16S(align, offset)
            | I32Load16U(align, offset)
            | I64Load8S(align, offset)
            | I64Load8U(align, offset)
            | I64Load16S(align, offset)
            | I64Load16U(align, offset)
            | I64Load32S(align, offset)
            | I64Load32U(align, offset)
            | I32Store(align, offset)
            | I64Store(align, offset)
            | F32Store(align, offset)
            | F64Store(align, offset)
            | I32Store8(align, offset)
            | I32Store16(align, offset)
            | I64Store8(align, offset)
            | I64Store16(align, offset)
            | I64Store32(align, offset) => {
                VarUint32::from(align).serialize(writer)?;
                VarUint32::from(offset).serialize(writer)?;
            }
            CurrentMemory(reserved) | GrowMemory(reserved) => {
                VarUint1::from(reserved != 0).serialize(writer)?;
            }
            I32Const(value) => VarInt32::from(value).serialize(writer)?,
            I64Const(value) => VarInt64::from(value).serialize(writer)?,
            F32Const(bits) => Uint32::from(bits).serialize(writer)?,
            F64Const(bits) => Uint64::from(bits).serialize(writer)?,
            _ => {}
        }
        Ok(())
    }
}

fn serialize_sequence<W: io::Write>(
    instructions: Vec<Instruction>,
    writer: &mut W,
) -> Result<(), Error> {
    for instruction in instructions {
        instruction.serialize(writer)?;
    }
    Ok(())
}

impl Serialize for Instructions {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        serialize_sequence(self.0, writer)?;
        writer.write(&[opcodes::END])?;
        Ok(())
    }
}

impl Serialize for InitExpr {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        serialize_sequence(self.0, writer)?;
        writer.write(&[opcodes::END])?;
        Ok(())
    }
}

impl Instruction {
    fn fmt_at(&self, f: &mut fmt::Formatter, indent: usize) -> fmt::Result {
        use self::Instruction::*;

        for _ in 0..indent {
            write!(f, "  ")?;
        }
        let mnemonic = self.operator().mnemonic;
        match *self {
            Block(block_type, ref body) | Loop(block_type, ref body) => {
                writeln!(f, "{}{}", mnemonic, block_type)?;
                fmt_sequence(body.elements(), f, indent + 1)?;
                for _ in 0..indent {
                    write!(f, "  ")?;
                }
                write!(f, "end")
            }
            If(block_type, ref then_body, ref else_body) => {
                writeln!(f, "{}{}", mnemonic, block_type)?;
                fmt_sequence(then_body.elements(), f, indent + 1)?;
                if let Some(ref else_body) = *else_body {
                    for _ in 0..indent {
                        write!(f, "  ")?;
                    }
                    writeln!(f, "else")?;
                    fmt_sequence(else_body.elements(), f, indent + 1)?;
                }
                for _ in 0..indent {
                    write!(f, "  ")?;
                }
                write!(f, "end")
            }
            Br(depth) | BrIf(depth) => write!(f, "{} {}", mnemonic, depth),
            BrTable(ref data) => {
                write!(f, "{}", mnemonic)?;
                for target in data.table.iter() {
                    write!(f, " {}", target)?;
                }
                write!(f, " {}", data.default)
            }
            Call(index) => write!(f, "{} {}", mnemonic, index),
            CallIndirect(type_index, _) => write!(f, "{} {}", mnemonic, type_index),
            GetLocal(index) | SetLocal(index) | TeeLocal(index) | GetGlobal(index)
            | SetGlobal(index) => write!(f, "{} {}", mnemonic, index),
            I32Load(align, offset)
            | I64Load(align, offset)
            | F32Load(align, offset)
            | F64Load(align, offset)
            | I32Load8S(align, offset)
            | I32Load8U(align, offset)
            | I32Load16S(align, offset)
            | I32Load16U(align, offset)
            | I64Load8S(align, offset)
            | I64Load8U(align, offset)
            | I64Load16S(align, offset)
            | I64Load16U(align, offset)
            | I64Load32S(align, offset)
            | I64Load32U(align, offset)
            | I32Store(align, offset)
            | I64Store(align, offset)
            | F32Store(align, offset)
            | F64Store(align, offset)
            | I32Store8(align, offset)
            | I32Store16(align, offset)
            | I64Store8(align, offset)
            | I64Store16(align, offset)
            | I64Store32(align, offset) => {
                write!(
                    f,
                    "{} offset={} align={}",
                    mnemonic,
                    offset,
                    1u64 << align.min(63)
                )
            }
            I32Const(value) => write!(f, "{} {}", mnemonic, value),
            I64Const(value) => write!(f, "{} {}", mnemonic, value),
            F32Const(bits) => write!(f, "{} {}", mnemonic, f32::from_bits(bits)),
            F64Const(bits) => write!(f, "{} {}", mnemonic, f64::from_bits(bits)),
            _ => write!(f, "{}", mnemonic),
        }
    }
}

fn fmt_sequence(
    instructions: &[Instruction],
    f: &mut fmt::Formatter,
    indent: usize,
) -> fmt::Result {
    for instruction in instructions {
        instruction.fmt_at(f, indent)?;
        writeln!(f)?;
    }
    Ok(())
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_at(f, 0)
    }
}

impl fmt::Display for Instructions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt_sequence(self.elements(), f, 0)
    }
}

impl fmt::Display for InitExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(")?;
        for (index, instruction) in self.0.iter().enumerate() {
            if index != 0 {
                write!(f, "; ")?;
            }
            instruction.fmt_at(f, 0)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::super::{deserialize_buffer, serialize};
    use super::*;
    use alloc::string::ToString;

    fn roundtrip(instructions: Instructions) {
        let bytes = serialize(instructions.clone()).expect("serialize instruction sequence");
        let parsed: Instructions = deserialize_buffer(&bytes).expect("deserialize what we wrote");
        assert_eq!(parsed, instructions);
    }

    #[test]
    fn nullary_roundtrip() {
        roundtrip(Instructions::new(vec![
            Instruction::Nop,
            Instruction::I32Add,
            Instruction::F64Copysign,
            Instruction::Unreachable,
        ]));
    }

    #[test]
    fn nested_block_roundtrip() {
        roundtrip(Instructions::new(vec![Instruction::Block(
            BlockType::NoResult,
            Instructions::new(vec![
                Instruction::Loop(
                    BlockType::Value(ValueType::I32),
                    Instructions::new(vec![Instruction::I32Const(1), Instruction::Br(1)]),
                ),
                Instruction::Drop,
            ]),
        )]));
    }

    #[test]
    fn if_without_else_roundtrip() {
        roundtrip(Instructions::new(vec![
            Instruction::I32Const(0),
            Instruction::If(
                BlockType::NoResult,
                Instructions::new(vec![Instruction::Nop]),
                None,
            ),
        ]));
    }

    #[test]
    fn if_with_else_roundtrip() {
        roundtrip(Instructions::new(vec![
            Instruction::I32Const(1),
            Instruction::If(
                BlockType::Value(ValueType::I32),
                Instructions::new(vec![Instruction::I32Const(1)]),
                Some(Instructions::new(vec![Instruction::I32Const(2)])),
            ),
        ]));
    }

    #[test]
    fn else_absent_is_not_empty_else() {
        // `if ... end` and `if ... else end` encode differently and must
        // decode to distinct trees.
        let without = serialize(Instructions::new(vec![Instruction::If(
            BlockType::NoResult,
            Instructions::empty(),
            None,
        )]))
        .unwrap();
        let with = serialize(Instructions::new(vec![Instruction::If(
            BlockType::NoResult,
            Instructions::empty(),
            Some(Instructions::empty()),
        )]))
        .unwrap();
        assert_ne!(without, with);

        let parsed: Instructions = deserialize_buffer(&with).unwrap();
        assert_eq!(
            parsed.elements()[0],
            Instruction::If(
                BlockType::NoResult,
                Instructions::empty(),
                Some(Instructions::empty())
            ),
        );
    }

    #[test]
    fn duplicated_else_is_rejected() {
        // if .. else .. else .. end
        let bytes = [
            opcodes::IF,
            0x40,
            opcodes::ELSE,
            opcodes::ELSE,
            opcodes::END,
            opcodes::END,
        ];
        assert_eq!(
            deserialize_buffer::<Instructions>(&bytes),
            Err(Error::DuplicatedElse),
        );
    }

    #[test]
    fn br_table_roundtrip() {
        roundtrip(Instructions::new(vec![
            Instruction::GetLocal(0),
            Instruction::BrTable(Box::new(BrTableData {
                table: vec![0, 1, 2].into_boxed_slice(),
                default: 3,
            })),
        ]));
    }

    #[test]
    fn unknown_opcode_is_reported() {
        let bytes = [0xFEu8, opcodes::END];
        assert_eq!(
            deserialize_buffer::<Instructions>(&bytes),
            Err(Error::UnknownOpcode(0xFE)),
        );
    }

    #[test]
    fn catalog_has_no_structural_opcodes() {
        assert_eq!(
            Operator::lookup(opcodes::END).map(|op| op.opcode),
            Err(Error::UnknownOpcode(opcodes::END)),
        );
        assert_eq!(
            Operator::lookup(opcodes::ELSE).map(|op| op.opcode),
            Err(Error::UnknownOpcode(opcodes::ELSE)),
        );
    }

    #[test]
    fn catalog_lookup_matches_opcode() {
        let op = Operator::lookup(opcodes::I32ADD).unwrap();
        assert_eq!(op.mnemonic, "i32.add");
        assert_eq!(op.kind, Some(ValueType::I32));
        assert_eq!(op.immediates, ImmediateKind::None);

        let op = Operator::lookup(opcodes::F64CONST).unwrap();
        assert_eq!(op.immediates, ImmediateKind::Float64);
    }

    #[test]
    fn dump_indents_blocks() {
        let instructions = Instructions::new(vec![Instruction::Block(
            BlockType::NoResult,
            Instructions::new(vec![Instruction::Nop]),
        )]);
        assert_eq!(instructions.to_string(), "block\n  nop\nend\n");
    }
}
