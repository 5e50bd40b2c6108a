use super::{
    io, CountedList, CountedListWriter, Deserialize, Error, InitExpr, Serialize, VarUint32,
};
use alloc::vec::Vec;
use core::fmt;

/// One entry of the Element section: function indices to be copied into a
/// table slot range whose start is given by a constant offset expression.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementSegment {
    index: u32,
    offset: InitExpr,
    members: Vec<u32>,
}

impl ElementSegment {
    /// New element segment.
    pub fn new(index: u32, offset: InitExpr, members: Vec<u32>) -> Self {
        ElementSegment {
            index,
            offset,
            members,
        }
    }

    /// Index of the table this segment initializes.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Offset expression yielding the first slot to write.
    pub fn offset(&self) -> &InitExpr {
        &self.offset
    }

    /// Mutable offset expression.
    pub fn offset_mut(&mut self) -> &mut InitExpr {
        &mut self.offset
    }

    /// Function indices to copy into the table.
    pub fn members(&self) -> &[u32] {
        &self.members
    }

    /// Mutable function indices.
    pub fn members_mut(&mut self) -> &mut Vec<u32> {
        &mut self.members
    }
}

impl Deserialize for ElementSegment {
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let index = u32::from(VarUint32::deserialize(reader)?);
        let offset = InitExpr::deserialize(reader)?;
        let members: Vec<u32> = CountedList::<VarUint32>::deserialize(reader)?
            .into_inner()
            .into_iter()
            .map(Into::into)
            .collect();
        Ok(ElementSegment {
            index,
            offset,
            members,
        })
    }
}

impl Serialize for ElementSegment {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        VarUint32::from(self.index).serialize(writer)?;
        self.offset.serialize(writer)?;
        let members = self.members;
        CountedListWriter(members.len(), members.into_iter().map(VarUint32::from))
            .serialize(writer)
    }
}

impl fmt::Display for ElementSegment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(elem (table {}) {} funcs", self.index, self.offset)?;
        for member in &self.members {
            write!(f, " {}", member)?;
        }
        write!(f, ")")
    }
}

/// One entry of the Data section: raw bytes to be copied into a linear
/// memory at a constant offset.
#[derive(Clone, Debug, PartialEq)]
pub struct DataSegment {
    index: u32,
    offset: InitExpr,
    value: Vec<u8>,
}

impl DataSegment {
    /// New data segment.
    pub fn new(index: u32, offset: InitExpr, value: Vec<u8>) -> Self {
        DataSegment {
            index,
            offset,
            value,
        }
    }

    /// Index of the linear memory this segment initializes.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Offset expression yielding the first byte address to write.
    pub fn offset(&self) -> &InitExpr {
        &self.offset
    }

    /// Mutable offset expression.
    pub fn offset_mut(&mut self) -> &mut InitExpr {
        &mut self.offset
    }

    /// Initial bytes of the segment.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Mutable initial bytes.
    pub fn value_mut(&mut self) -> &mut Vec<u8> {
        &mut self.value
    }
}

impl Deserialize for DataSegment {
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let index = u32::from(VarUint32::deserialize(reader)?);
        let offset = InitExpr::deserialize(reader)?;

        let value_len = usize::from(VarUint32::deserialize(reader)?);
        let mut value = alloc::vec![0u8; value_len];
        reader.read(&mut value[..])?;

        Ok(DataSegment {
            index,
            offset,
            value,
        })
    }
}

impl Serialize for DataSegment {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        VarUint32::from(self.index).serialize(writer)?;
        self.offset.serialize(writer)?;
        let value = self.value;
        VarUint32::from(value.len()).serialize(writer)?;
        writer.write(&value[..])?;
        Ok(())
    }
}

impl fmt::Display for DataSegment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "(data (memory {}) {} [{} bytes])",
            self.index,
            self.offset,
            self.value.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::{deserialize_buffer, serialize, Instruction};
    use super::*;

    #[test]
    fn data_segment_roundtrip() {
        let segment = DataSegment::new(
            0,
            InitExpr::new(vec![Instruction::I32Const(0)]),
            b"abc".to_vec(),
        );
        let bytes = serialize(segment.clone()).unwrap();
        let parsed: DataSegment = deserialize_buffer(&bytes).unwrap();
        assert_eq!(parsed, segment);
    }

    #[test]
    fn element_segment_roundtrip() {
        let segment = ElementSegment::new(
            0,
            InitExpr::new(vec![Instruction::I32Const(4)]),
            vec![0, 1, 2],
        );
        let bytes = serialize(segment.clone()).unwrap();
        let parsed: ElementSegment = deserialize_buffer(&bytes).unwrap();
        assert_eq!(parsed, segment);
    }
}
