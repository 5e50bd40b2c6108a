use super::{io, CountedList, CountedListWriter, Deserialize, Error, Serialize, VarInt7};
use alloc::vec::Vec;
use core::fmt;

/// Type of a scalar value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// 32-bit signed integer
    I32,
    /// 64-bit signed integer
    I64,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
}

impl ValueType {
    fn from_varint7(val: i8) -> Result<ValueType, Error> {
        match val {
            -0x01 => Ok(ValueType::I32),
            -0x02 => Ok(ValueType::I64),
            -0x03 => Ok(ValueType::F32),
            -0x04 => Ok(ValueType::F64),
            ty => Err(Error::UnknownValueType(ty)),
        }
    }

    fn into_varint7(self) -> i8 {
        match self {
            ValueType::I32 => -0x01,
            ValueType::I64 => -0x02,
            ValueType::F32 => -0x03,
            ValueType::F64 => -0x04,
        }
    }
}

impl Deserialize for ValueType {
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let val = VarInt7::deserialize(reader)?;
        ValueType::from_varint7(val.into())
    }
}

impl Serialize for ValueType {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        VarInt7::from(self.into_varint7()).serialize(writer)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ValueType::I32 => write!(f, "i32"),
            ValueType::I64 => write!(f, "i64"),
            ValueType::F32 => write!(f, "f32"),
            ValueType::F64 => write!(f, "f64"),
        }
    }
}

/// Result type of a block, loop or if: either a single value or nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockType {
    /// Value-producing block.
    Value(ValueType),
    /// Block producing no value.
    NoResult,
}

impl Deserialize for BlockType {
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let val = VarInt7::deserialize(reader)?;
        match val.into() {
            -0x40 => Ok(BlockType::NoResult),
            ty => Ok(BlockType::Value(ValueType::from_varint7(ty)?)),
        }
    }
}

impl Serialize for BlockType {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        let val: i8 = match self {
            BlockType::NoResult => -0x40,
            BlockType::Value(ty) => ty.into_varint7(),
        };
        VarInt7::from(val).serialize(writer)
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            BlockType::NoResult => Ok(()),
            BlockType::Value(ty) => write!(f, " (result {})", ty),
        }
    }
}

/// Function signature: parameter types and result types.
///
/// The MVP restricts results to at most one entry; the model nonetheless
/// keeps a full sequence so editing tools can express extended forms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FunctionType {
    params: Vec<ValueType>,
    results: Vec<ValueType>,
}

impl FunctionType {
    /// New function type given parameters and results.
    pub fn new(params: Vec<ValueType>, results: Vec<ValueType>) -> Self {
        FunctionType { params, results }
    }

    /// Parameters in the function signature.
    pub fn params(&self) -> &[ValueType] {
        &self.params
    }

    /// Mutable parameters in the function signature.
    pub fn params_mut(&mut self) -> &mut Vec<ValueType> {
        &mut self.params
    }

    /// Results in the function signature.
    pub fn results(&self) -> &[ValueType] {
        &self.results
    }

    /// Mutable results in the function signature.
    pub fn results_mut(&mut self) -> &mut Vec<ValueType> {
        &mut self.results
    }
}

/// The `func` form tag that starts an encoded function type.
const FUNCTION_TYPE_FORM: i8 = -0x20;

impl Deserialize for FunctionType {
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let form: i8 = VarInt7::deserialize(reader)?.into();
        if form != FUNCTION_TYPE_FORM {
            return Err(Error::UnknownValueType(form));
        }

        let params: Vec<ValueType> = CountedList::deserialize(reader)?.into_inner();
        let results: Vec<ValueType> = CountedList::deserialize(reader)?.into_inner();
        Ok(FunctionType { params, results })
    }
}

impl Serialize for FunctionType {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        VarInt7::from(FUNCTION_TYPE_FORM).serialize(writer)?;
        CountedListWriter(self.params.len(), self.params.into_iter()).serialize(writer)?;
        CountedListWriter(self.results.len(), self.results.into_iter()).serialize(writer)?;
        Ok(())
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(func")?;
        for param in &self.params {
            write!(f, " (param {})", param)?;
        }
        for result in &self.results {
            write!(f, " (result {})", result)?;
        }
        write!(f, ")")
    }
}

/// Type of the elements a table can hold. The MVP defines `anyfunc` only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableElementType {
    /// A reference to a function with any signature.
    AnyFunc,
}

impl Deserialize for TableElementType {
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let val = VarInt7::deserialize(reader)?;
        match val.into() {
            -0x10 => Ok(TableElementType::AnyFunc),
            ty => Err(Error::UnknownTableElementType(ty)),
        }
    }
}

impl Serialize for TableElementType {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        let TableElementType::AnyFunc = self;
        VarInt7::from(-0x10).serialize(writer)
    }
}

/// Type of a global variable: content kind plus mutability.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlobalType {
    content_type: ValueType,
    is_mutable: bool,
}

impl GlobalType {
    /// New global type.
    pub fn new(content_type: ValueType, is_mutable: bool) -> Self {
        GlobalType {
            content_type,
            is_mutable,
        }
    }

    /// Type of the global entry.
    pub fn content_type(&self) -> ValueType {
        self.content_type
    }

    /// Is the global entry mutable.
    pub fn is_mutable(&self) -> bool {
        self.is_mutable
    }
}

impl Deserialize for GlobalType {
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let content_type = ValueType::deserialize(reader)?;
        let is_mutable = super::VarUint1::deserialize(reader)?;
        Ok(GlobalType {
            content_type,
            is_mutable: is_mutable.into(),
        })
    }
}

impl Serialize for GlobalType {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        self.content_type.serialize(writer)?;
        super::VarUint1::from(self.is_mutable).serialize(writer)?;
        Ok(())
    }
}

/// Type of a table: element type plus limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableType {
    elem_type: TableElementType,
    limits: super::ResizableLimits,
}

impl TableType {
    /// New table definition with `anyfunc` elements.
    pub fn new(min: u32, max: Option<u32>) -> Self {
        TableType {
            elem_type: TableElementType::AnyFunc,
            limits: super::ResizableLimits::new(min, max),
        }
    }

    /// Table memory specification.
    pub fn limits(&self) -> &super::ResizableLimits {
        &self.limits
    }

    /// Table element type.
    pub fn elem_type(&self) -> TableElementType {
        self.elem_type
    }
}

impl Deserialize for TableType {
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let elem_type = TableElementType::deserialize(reader)?;
        let limits = super::ResizableLimits::deserialize(reader)?;
        Ok(TableType { elem_type, limits })
    }
}

impl Serialize for TableType {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        self.elem_type.serialize(writer)?;
        self.limits.serialize(writer)
    }
}

/// Type of a linear memory: its limits, counted in 64 KiB pages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryType(super::ResizableLimits);

impl MemoryType {
    /// New memory definition.
    pub fn new(min: u32, max: Option<u32>) -> Self {
        MemoryType(super::ResizableLimits::new(min, max))
    }

    /// Limits of the memory entry.
    pub fn limits(&self) -> &super::ResizableLimits {
        &self.0
    }
}

impl Deserialize for MemoryType {
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let limits = super::ResizableLimits::deserialize(reader)?;
        Ok(MemoryType(limits))
    }
}

impl Serialize for MemoryType {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        self.0.serialize(writer)
    }
}

/// An entry in the Type section. The MVP only defines function types.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// Function type.
    Function(FunctionType),
}

impl Deserialize for Type {
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        Ok(Type::Function(FunctionType::deserialize(reader)?))
    }
}

impl Serialize for Type {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        match self {
            Type::Function(fn_type) => fn_type.serialize(writer),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Type::Function(ref fn_type) => fmt::Display::fmt(fn_type, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{deserialize_buffer, serialize};
    use super::*;

    #[test]
    fn value_type_roundtrip() {
        for (byte, ty) in [
            (0x7Fu8, ValueType::I32),
            (0x7E, ValueType::I64),
            (0x7D, ValueType::F32),
            (0x7C, ValueType::F64),
        ] {
            let parsed: ValueType = deserialize_buffer(&[byte]).unwrap();
            assert_eq!(parsed, ty);
            assert_eq!(serialize(ty).unwrap(), vec![byte]);
        }
    }

    #[test]
    fn block_type_empty() {
        let parsed: BlockType = deserialize_buffer(&[0x40]).unwrap();
        assert_eq!(parsed, BlockType::NoResult);
        assert_eq!(serialize(BlockType::NoResult).unwrap(), vec![0x40]);
    }

    #[test]
    fn function_type_roundtrip() {
        let ty = FunctionType::new(
            vec![ValueType::I32, ValueType::I64],
            vec![ValueType::F64],
        );
        let bytes = serialize(ty.clone()).unwrap();
        assert_eq!(bytes[0], 0x60);
        let parsed: FunctionType = deserialize_buffer(&bytes).unwrap();
        assert_eq!(parsed, ty);
    }
}
