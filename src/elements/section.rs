use super::{
    deserialize_string, io, serialize_string, CountedList, CountedListWriter, DataSegment,
    Deserialize, ElementSegment, Error, ExportEntry, Func, FuncBody, GlobalEntry, ImportEntry,
    MemoryType, Serialize, TableType, Type, VarUint32, VarUint7,
};
use alloc::{string::String, vec::Vec};
use core::fmt;

/// Every section declares more payload bytes than its entries consume in
/// some real-world binaries; the unparsed tail is kept verbatim so the
/// module re-serializes losslessly.
macro_rules! counted_section {
    ($(#[$doc:meta])* $name:ident, $entry:ty, $entries:ident, $entries_mut:ident, $id:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Default)]
        pub struct $name {
            entries: Vec<$entry>,
            extra_payload: Vec<u8>,
        }

        impl $name {
            /// Section id in the binary format.
            pub(crate) const ID: u8 = $id;

            /// New section with the given entries.
            pub fn with_entries(entries: Vec<$entry>) -> Self {
                $name {
                    entries,
                    extra_payload: Vec::new(),
                }
            }

            /// Entries of the section.
            pub fn $entries(&self) -> &[$entry] {
                &self.entries
            }

            /// Mutable entries of the section.
            pub fn $entries_mut(&mut self) -> &mut Vec<$entry> {
                &mut self.entries
            }

            /// Unparsed bytes between the last entry and the declared
            /// payload length.
            pub fn extra_payload(&self) -> &[u8] {
                &self.extra_payload
            }

            fn from_payload(payload: &[u8]) -> Result<Self, Error> {
                let mut reader = io::Cursor::new(payload);
                let entries = CountedList::<$entry>::deserialize(&mut reader)?.into_inner();
                let extra_payload = payload[reader.position()..].to_vec();
                Ok($name {
                    entries,
                    extra_payload,
                })
            }

            fn payload_bytes(self) -> Result<Vec<u8>, Error> {
                let $name {
                    entries,
                    extra_payload,
                } = self;
                let mut payload = Vec::new();
                CountedListWriter(entries.len(), entries.into_iter())
                    .serialize(&mut payload)?;
                payload.extend_from_slice(&extra_payload);
                Ok(payload)
            }
        }
    };
}

counted_section! {
    /// Type section: the function signatures the module refers to by index.
    TypeSection, Type, types, types_mut, 1
}

counted_section! {
    /// Import section: entities the module requires from its environment.
    ImportSection, ImportEntry, entries, entries_mut, 2
}

counted_section! {
    /// Function section: type indices of the module-defined functions.
    FunctionSection, Func, entries, entries_mut, 3
}

counted_section! {
    /// Table section: module-defined tables.
    TableSection, TableType, entries, entries_mut, 4
}

counted_section! {
    /// Memory section: module-defined linear memories.
    MemorySection, MemoryType, entries, entries_mut, 5
}

counted_section! {
    /// Global section: module-defined globals with their initializers.
    GlobalSection, GlobalEntry, entries, entries_mut, 6
}

counted_section! {
    /// Export section: entities the module makes visible by name.
    ExportSection, ExportEntry, entries, entries_mut, 7
}

counted_section! {
    /// Element section: initial content of the module's tables.
    ElementSection, ElementSegment, entries, entries_mut, 9
}

counted_section! {
    /// Code section: bodies of the module-defined functions.
    CodeSection, FuncBody, bodies, bodies_mut, 10
}

counted_section! {
    /// Data section: initial content of the module's linear memories.
    DataSection, DataSegment, entries, entries_mut, 11
}

/// Start section: index of a function run automatically once the module
/// instance is fully initialized.
#[derive(Debug, Clone, PartialEq)]
pub struct StartSection {
    index: u32,
    extra_payload: Vec<u8>,
}

impl StartSection {
    pub(crate) const ID: u8 = 8;

    /// New start section referring to the given function index.
    pub fn new(index: u32) -> Self {
        StartSection {
            index,
            extra_payload: Vec::new(),
        }
    }

    /// Index of the start function.
    pub fn entry(&self) -> u32 {
        self.index
    }

    /// Unparsed payload tail.
    pub fn extra_payload(&self) -> &[u8] {
        &self.extra_payload
    }

    fn from_payload(payload: &[u8]) -> Result<Self, Error> {
        let mut reader = io::Cursor::new(payload);
        let index = u32::from(VarUint32::deserialize(&mut reader)?);
        let extra_payload = payload[reader.position()..].to_vec();
        Ok(StartSection {
            index,
            extra_payload,
        })
    }

    fn payload_bytes(self) -> Result<Vec<u8>, Error> {
        let mut payload = Vec::new();
        VarUint32::from(self.index).serialize(&mut payload)?;
        payload.extend_from_slice(&self.extra_payload);
        Ok(payload)
    }
}

/// Custom section: a name plus arbitrary bytes, ignored by the rest of
/// the toolchain and preserved verbatim.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CustomSection {
    name: String,
    payload: Vec<u8>,
}

impl CustomSection {
    pub(crate) const ID: u8 = 0;

    /// Creates a new custom section with the given name and payload.
    pub fn new(name: String, payload: Vec<u8>) -> CustomSection {
        CustomSection { name, payload }
    }

    /// Name of the custom section.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Payload of the custom section.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Mutable name of the custom section.
    pub fn name_mut(&mut self) -> &mut String {
        &mut self.name
    }

    /// Mutable payload of the custom section.
    pub fn payload_mut(&mut self) -> &mut Vec<u8> {
        &mut self.payload
    }

    fn from_payload(payload: Vec<u8>) -> Result<Self, Error> {
        let mut reader = io::Cursor::new(&payload[..]);
        let name = deserialize_string(&mut reader)?;
        let payload = payload[reader.position()..].to_vec();
        Ok(CustomSection { name, payload })
    }

    fn payload_bytes(self) -> Result<Vec<u8>, Error> {
        let mut bytes = Vec::new();
        serialize_string(&self.name, &mut bytes)?;
        bytes.extend_from_slice(&self.payload);
        Ok(bytes)
    }
}

/// A section of a module.
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    /// Custom section (`id` 0).
    Custom(CustomSection),
    /// Type section.
    Type(TypeSection),
    /// Import section.
    Import(ImportSection),
    /// Function section.
    Function(FunctionSection),
    /// Table section.
    Table(TableSection),
    /// Memory section.
    Memory(MemorySection),
    /// Global section.
    Global(GlobalSection),
    /// Export section.
    Export(ExportSection),
    /// Start section.
    Start(StartSection),
    /// Element section.
    Element(ElementSection),
    /// Code section.
    Code(CodeSection),
    /// Data section.
    Data(DataSection),
}

impl Section {
    /// Section id in the binary format. Custom sections share id 0.
    pub fn id(&self) -> u8 {
        match *self {
            Section::Custom(_) => CustomSection::ID,
            Section::Type(_) => TypeSection::ID,
            Section::Import(_) => ImportSection::ID,
            Section::Function(_) => FunctionSection::ID,
            Section::Table(_) => TableSection::ID,
            Section::Memory(_) => MemorySection::ID,
            Section::Global(_) => GlobalSection::ID,
            Section::Export(_) => ExportSection::ID,
            Section::Start(_) => StartSection::ID,
            Section::Element(_) => ElementSection::ID,
            Section::Code(_) => CodeSection::ID,
            Section::Data(_) => DataSection::ID,
        }
    }
}

impl Deserialize for Section {
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let id = u8::from(VarUint7::deserialize(reader)?);
        Section::deserialize_after_id(id, reader)
    }
}

impl Section {
    /// Deserialize the remainder of a section whose id byte has already
    /// been consumed. The module reader uses this to tell a clean end of
    /// stream apart from a truncated section.
    pub(crate) fn deserialize_after_id<R: io::Read>(id: u8, reader: &mut R) -> Result<Self, Error> {
        if id & 0x80 != 0 {
            return Err(Error::InvalidVarUint7(id));
        }
        let payload_len = usize::from(VarUint32::deserialize(reader)?);
        let mut payload = alloc::vec![0u8; payload_len];
        reader.read(&mut payload[..])?;

        let section = match id {
            0 => Section::Custom(CustomSection::from_payload(payload)?),
            1 => Section::Type(TypeSection::from_payload(&payload)?),
            2 => Section::Import(ImportSection::from_payload(&payload)?),
            3 => Section::Function(FunctionSection::from_payload(&payload)?),
            4 => Section::Table(TableSection::from_payload(&payload)?),
            5 => Section::Memory(MemorySection::from_payload(&payload)?),
            6 => Section::Global(GlobalSection::from_payload(&payload)?),
            7 => Section::Export(ExportSection::from_payload(&payload)?),
            8 => Section::Start(StartSection::from_payload(&payload)?),
            9 => Section::Element(ElementSection::from_payload(&payload)?),
            10 => Section::Code(CodeSection::from_payload(&payload)?),
            11 => Section::Data(DataSection::from_payload(&payload)?),
            invalid => return Err(Error::UnknownSectionId(invalid)),
        };
        Ok(section)
    }
}

impl Serialize for Section {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        let id = self.id();
        let payload = match self {
            Section::Custom(section) => section.payload_bytes()?,
            Section::Type(section) => section.payload_bytes()?,
            Section::Import(section) => section.payload_bytes()?,
            Section::Function(section) => section.payload_bytes()?,
            Section::Table(section) => section.payload_bytes()?,
            Section::Memory(section) => section.payload_bytes()?,
            Section::Global(section) => section.payload_bytes()?,
            Section::Export(section) => section.payload_bytes()?,
            Section::Start(section) => section.payload_bytes()?,
            Section::Element(section) => section.payload_bytes()?,
            Section::Code(section) => section.payload_bytes()?,
            Section::Data(section) => section.payload_bytes()?,
        };

        VarUint7::from(id).serialize(writer)?;
        VarUint32::from(payload.len()).serialize(writer)?;
        writer.write(&payload[..])?;
        Ok(())
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Section::Custom(ref section) => writeln!(
                f,
                "(custom \"{}\" [{} bytes])",
                section.name(),
                section.payload().len()
            ),
            Section::Type(ref section) => {
                for (index, ty) in section.types().iter().enumerate() {
                    writeln!(f, "(type {} {})", index, ty)?;
                }
                Ok(())
            }
            Section::Import(ref section) => {
                for entry in section.entries() {
                    writeln!(f, "{}", entry)?;
                }
                Ok(())
            }
            Section::Function(ref section) => {
                for (index, func) in section.entries().iter().enumerate() {
                    writeln!(f, "(func {} (type {}))", index, func.type_ref())?;
                }
                Ok(())
            }
            Section::Table(ref section) => {
                for table in section.entries() {
                    match table.limits().maximum() {
                        Some(max) => {
                            writeln!(f, "(table {} {} anyfunc)", table.limits().initial(), max)?
                        }
                        None => writeln!(f, "(table {} anyfunc)", table.limits().initial())?,
                    }
                }
                Ok(())
            }
            Section::Memory(ref section) => {
                for memory in section.entries() {
                    match memory.limits().maximum() {
                        Some(max) => writeln!(f, "(memory {} {})", memory.limits().initial(), max)?,
                        None => writeln!(f, "(memory {})", memory.limits().initial())?,
                    }
                }
                Ok(())
            }
            Section::Global(ref section) => {
                for entry in section.entries() {
                    writeln!(f, "{}", entry)?;
                }
                Ok(())
            }
            Section::Export(ref section) => {
                for entry in section.entries() {
                    writeln!(f, "{}", entry)?;
                }
                Ok(())
            }
            Section::Start(ref section) => writeln!(f, "(start {})", section.entry()),
            Section::Element(ref section) => {
                for entry in section.entries() {
                    writeln!(f, "{}", entry)?;
                }
                Ok(())
            }
            Section::Code(ref section) => {
                for body in section.bodies() {
                    writeln!(f, "(body")?;
                    fmt::Display::fmt(body, f)?;
                    writeln!(f, ")")?;
                }
                Ok(())
            }
            Section::Data(ref section) => {
                for entry in section.entries() {
                    writeln!(f, "{}", entry)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{
        deserialize_buffer, serialize, FunctionType, Instruction, Instructions, ValueType,
    };
    use super::*;

    #[test]
    fn type_section_roundtrip() {
        let section = TypeSection::with_entries(vec![
            Type::Function(FunctionType::new(vec![ValueType::I32], vec![ValueType::I32])),
            Type::Function(FunctionType::default()),
        ]);
        let bytes = serialize(Section::Type(section.clone())).unwrap();
        let parsed: Section = deserialize_buffer(&bytes).unwrap();
        assert_eq!(parsed, Section::Type(section));
    }

    #[test]
    fn section_extra_payload_roundtrip() {
        // A function section with one entry and two trailing payload bytes.
        let bytes = [3u8, 4, 1, 0, 0xAA, 0xBB];
        let parsed: Section = deserialize_buffer(&bytes).unwrap();
        match parsed {
            Section::Function(ref section) => {
                assert_eq!(section.entries().len(), 1);
                assert_eq!(section.extra_payload(), &[0xAA, 0xBB]);
            }
            ref other => panic!("expected function section, got {:?}", other),
        }
        assert_eq!(serialize(parsed).unwrap(), bytes.to_vec());
    }

    #[test]
    fn section_overrun_is_eof() {
        // Declared payload of one byte, but the entry count promises more.
        let bytes = [10u8, 1, 2];
        assert_eq!(
            deserialize_buffer::<Section>(&bytes),
            Err(super::super::Error::UnexpectedEof),
        );
    }

    #[test]
    fn unknown_section_id() {
        let bytes = [12u8, 0];
        assert_eq!(
            deserialize_buffer::<Section>(&bytes),
            Err(super::super::Error::UnknownSectionId(12)),
        );
    }

    #[test]
    fn custom_section_roundtrip() {
        let section = CustomSection::new("name".into(), vec![1, 2, 3]);
        let bytes = serialize(Section::Custom(section.clone())).unwrap();
        let parsed: Section = deserialize_buffer(&bytes).unwrap();
        assert_eq!(parsed, Section::Custom(section));
    }

    #[test]
    fn code_section_roundtrip() {
        let section = CodeSection::with_entries(vec![FuncBody::new(
            vec![],
            Instructions::new(vec![Instruction::I32Const(7)]),
        )]);
        let bytes = serialize(Section::Code(section.clone())).unwrap();
        let parsed: Section = deserialize_buffer(&bytes).unwrap();
        assert_eq!(parsed, Section::Code(section));
    }
}
