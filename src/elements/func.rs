use super::{
    io, CountedList, CountedListWriter, Deserialize, Error, Instructions, Serialize, ValueType,
    VarUint32,
};
use alloc::vec::Vec;
use core::fmt;

/// One entry of the Function section: an index into the Type section
/// declaring the signature of the function whose body lives at the same
/// position in the Code section.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Func(u32);

impl Func {
    /// New function declaration with the given type index.
    pub fn new(type_ref: u32) -> Self {
        Func(type_ref)
    }

    /// Index of the signature in the Type section.
    pub fn type_ref(&self) -> u32 {
        self.0
    }

    /// Mutable index of the signature.
    pub fn type_ref_mut(&mut self) -> &mut u32 {
        &mut self.0
    }
}

impl Deserialize for Func {
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        Ok(Func(VarUint32::deserialize(reader)?.into()))
    }
}

impl Serialize for Func {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        VarUint32::from(self.0).serialize(writer)
    }
}

/// A run of local variables sharing one value kind.
///
/// `count` can be zero, in which case the entry declares nothing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Local {
    count: u32,
    value_type: ValueType,
}

impl Local {
    /// New local entry.
    pub fn new(count: u32, value_type: ValueType) -> Self {
        Local { count, value_type }
    }

    /// Number of locals this entry declares.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Kind of the declared locals.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }
}

impl Deserialize for Local {
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let count = u32::from(VarUint32::deserialize(reader)?);
        let value_type = ValueType::deserialize(reader)?;
        Ok(Local { count, value_type })
    }
}

impl Serialize for Local {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        VarUint32::from(self.count).serialize(writer)?;
        self.value_type.serialize(writer)
    }
}

/// Merge adjacent local entries of the same kind and drop empty entries.
///
/// The total count per position and the kind ordering are preserved.
pub fn coalesce_locals(locals: &[Local]) -> Vec<Local> {
    let mut result: Vec<Local> = Vec::new();
    for local in locals {
        if local.count() == 0 {
            continue;
        }
        match result.last_mut() {
            Some(last) if last.value_type() == local.value_type() => {
                last.count = last.count.saturating_add(local.count());
            }
            _ => result.push(*local),
        }
    }
    result
}

/// Split local entries into single-count entries, one per declared local.
pub fn expand_locals(locals: &[Local]) -> Vec<Local> {
    let mut result = Vec::new();
    for local in locals {
        for _ in 0..local.count() {
            result.push(Local::new(1, local.value_type()));
        }
    }
    result
}

/// One entry of the Code section: the declared locals and the instruction
/// tree of a function body.
///
/// Bodies are length-prefixed on the wire; any bytes between the body's
/// terminating `end` and its declared length are retained verbatim and
/// re-emitted on write.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncBody {
    locals: Vec<Local>,
    instructions: Instructions,
    extra_payload: Vec<u8>,
}

impl FuncBody {
    /// New function body with given locals and instructions.
    pub fn new(locals: Vec<Local>, instructions: Instructions) -> Self {
        FuncBody {
            locals,
            instructions,
            extra_payload: Vec::new(),
        }
    }

    /// Empty function body.
    pub fn empty() -> Self {
        FuncBody {
            locals: Vec::new(),
            instructions: Instructions::empty(),
            extra_payload: Vec::new(),
        }
    }

    /// Locals declared in the function body.
    pub fn locals(&self) -> &[Local] {
        &self.locals
    }

    /// Mutable locals declared in the function body.
    pub fn locals_mut(&mut self) -> &mut Vec<Local> {
        &mut self.locals
    }

    /// Instruction list of the function body.
    pub fn code(&self) -> &Instructions {
        &self.instructions
    }

    /// Mutable instruction list of the function body.
    pub fn code_mut(&mut self) -> &mut Instructions {
        &mut self.instructions
    }

    /// Bytes that followed the terminating `end` within the declared body
    /// length, preserved for lossless round-trips.
    pub fn extra_payload(&self) -> &[u8] {
        &self.extra_payload
    }
}

impl Deserialize for FuncBody {
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let body_size = usize::from(VarUint32::deserialize(reader)?);
        let mut body = alloc::vec![0u8; body_size];
        reader.read(&mut body[..])?;

        let mut body_reader = io::Cursor::new(&body[..]);
        let locals: Vec<Local> = CountedList::deserialize(&mut body_reader)?.into_inner();
        let instructions = Instructions::deserialize(&mut body_reader)?;
        let extra_payload = body[body_reader.position()..].to_vec();

        Ok(FuncBody {
            locals,
            instructions,
            extra_payload,
        })
    }
}

impl Serialize for FuncBody {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        let FuncBody {
            locals,
            instructions,
            extra_payload,
        } = self;

        let mut data = Vec::new();
        CountedListWriter(locals.len(), locals.into_iter()).serialize(&mut data)?;
        instructions.serialize(&mut data)?;
        data.extend_from_slice(&extra_payload);

        VarUint32::from(data.len()).serialize(writer)?;
        writer.write(&data[..])?;
        Ok(())
    }
}

impl fmt::Display for FuncBody {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for local in &self.locals {
            writeln!(f, "(local {} {})", local.count(), local.value_type())?;
        }
        fmt::Display::fmt(&self.instructions, f)
    }
}

#[cfg(test)]
mod tests {
    use super::super::{deserialize_buffer, serialize, Instruction};
    use super::*;

    #[test]
    fn body_roundtrip() {
        let body = FuncBody::new(
            vec![Local::new(2, ValueType::I32), Local::new(1, ValueType::F64)],
            Instructions::new(vec![Instruction::GetLocal(0), Instruction::Drop]),
        );
        let bytes = serialize(body.clone()).unwrap();
        let parsed: FuncBody = deserialize_buffer(&bytes).unwrap();
        assert_eq!(parsed, body);
    }

    #[test]
    fn body_extra_payload_preserved() {
        let plain = serialize(FuncBody::empty()).unwrap();
        // Append two trailing bytes inside the declared length.
        let mut bytes = plain.clone();
        bytes[0] += 2;
        bytes.extend_from_slice(&[0xDE, 0xAD]);

        let parsed: FuncBody = deserialize_buffer(&bytes).unwrap();
        assert_eq!(parsed.extra_payload(), &[0xDE, 0xAD]);
        assert_eq!(serialize(parsed).unwrap(), bytes);
    }

    #[test]
    fn coalesce_merges_adjacent_and_drops_empty() {
        let locals = [
            Local::new(1, ValueType::I32),
            Local::new(2, ValueType::I32),
            Local::new(0, ValueType::F32),
            Local::new(1, ValueType::I64),
            Local::new(1, ValueType::I64),
        ];
        let coalesced = coalesce_locals(&locals);
        assert_eq!(
            coalesced,
            vec![Local::new(3, ValueType::I32), Local::new(2, ValueType::I64)],
        );
    }

    #[test]
    fn expand_yields_single_entries_with_same_total() {
        let locals = [
            Local::new(3, ValueType::I32),
            Local::new(0, ValueType::F64),
            Local::new(2, ValueType::I64),
        ];
        let expanded = expand_locals(&locals);
        assert_eq!(expanded.len(), 5);
        assert!(expanded.iter().all(|local| local.count() == 1));
        let total_before: u32 = locals.iter().map(Local::count).sum();
        let total_after: u32 = expanded.iter().map(Local::count).sum();
        assert_eq!(total_before, total_after);
        // Kind ordering preserved.
        assert_eq!(expanded[2].value_type(), ValueType::I32);
        assert_eq!(expanded[3].value_type(), ValueType::I64);
    }

    #[test]
    fn expand_then_coalesce_restores_totals() {
        let locals = [Local::new(2, ValueType::I32), Local::new(3, ValueType::I32)];
        let roundtrip = coalesce_locals(&expand_locals(&locals));
        assert_eq!(roundtrip, vec![Local::new(5, ValueType::I32)]);
    }
}
