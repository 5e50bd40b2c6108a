use super::{
    io, CodeSection, CustomSection, DataSection, Deserialize, ElementSection, Error,
    ExportSection, FunctionSection, GlobalSection, ImportSection, MemorySection, Section,
    Serialize, TableSection, TypeSection, Uint32,
};
use alloc::vec::Vec;
use core::fmt;

const WASM_MAGIC_NUMBER: [u8; 4] = [0x00, 0x61, 0x73, 0x6d];
const WASM_SUPPORTED_VERSION: u32 = 1;

/// A deserialized WebAssembly module: the magic/version framing plus an
/// ordered list of sections.
///
/// Known section kinds appear at most once in well-formed modules; custom
/// sections may repeat and are preserved in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    version: u32,
    sections: Vec<Section>,
}

impl Default for Module {
    fn default() -> Self {
        Module {
            version: WASM_SUPPORTED_VERSION,
            sections: Vec::new(),
        }
    }
}

impl Module {
    /// New module with the given sections.
    pub fn new(sections: Vec<Section>) -> Self {
        Module {
            version: WASM_SUPPORTED_VERSION,
            sections,
        }
    }

    /// Version of the module.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// All sections in file order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Mutable list of all sections.
    pub fn sections_mut(&mut self) -> &mut Vec<Section> {
        &mut self.sections
    }

    /// Insert a section keeping known sections in canonical order.
    ///
    /// Custom sections are appended at the end.
    pub fn insert_section(&mut self, section: Section) {
        let id = section.id();
        if id == 0 {
            self.sections.push(section);
            return;
        }
        let position = self
            .sections
            .iter()
            .position(|existing| existing.id() != 0 && existing.id() > id)
            .unwrap_or(self.sections.len());
        self.sections.insert(position, section);
    }

    /// Type section, if any.
    pub fn type_section(&self) -> Option<&TypeSection> {
        for section in &self.sections {
            if let Section::Type(ref section) = *section {
                return Some(section);
            }
        }
        None
    }

    /// Import section, if any.
    pub fn import_section(&self) -> Option<&ImportSection> {
        for section in &self.sections {
            if let Section::Import(ref section) = *section {
                return Some(section);
            }
        }
        None
    }

    /// Function (declaration) section, if any.
    pub fn function_section(&self) -> Option<&FunctionSection> {
        for section in &self.sections {
            if let Section::Function(ref section) = *section {
                return Some(section);
            }
        }
        None
    }

    /// Table section, if any.
    pub fn table_section(&self) -> Option<&TableSection> {
        for section in &self.sections {
            if let Section::Table(ref section) = *section {
                return Some(section);
            }
        }
        None
    }

    /// Memory section, if any.
    pub fn memory_section(&self) -> Option<&MemorySection> {
        for section in &self.sections {
            if let Section::Memory(ref section) = *section {
                return Some(section);
            }
        }
        None
    }

    /// Global section, if any.
    pub fn global_section(&self) -> Option<&GlobalSection> {
        for section in &self.sections {
            if let Section::Global(ref section) = *section {
                return Some(section);
            }
        }
        None
    }

    /// Export section, if any.
    pub fn export_section(&self) -> Option<&ExportSection> {
        for section in &self.sections {
            if let Section::Export(ref section) = *section {
                return Some(section);
            }
        }
        None
    }

    /// Index of the start function, if a Start section is present.
    pub fn start_section(&self) -> Option<u32> {
        for section in &self.sections {
            if let Section::Start(ref section) = *section {
                return Some(section.entry());
            }
        }
        None
    }

    /// Element section, if any.
    pub fn elements_section(&self) -> Option<&ElementSection> {
        for section in &self.sections {
            if let Section::Element(ref section) = *section {
                return Some(section);
            }
        }
        None
    }

    /// Code section, if any.
    pub fn code_section(&self) -> Option<&CodeSection> {
        for section in &self.sections {
            if let Section::Code(ref section) = *section {
                return Some(section);
            }
        }
        None
    }

    /// Data section, if any.
    pub fn data_section(&self) -> Option<&DataSection> {
        for section in &self.sections {
            if let Section::Data(ref section) = *section {
                return Some(section);
            }
        }
        None
    }

    /// All custom sections in file order.
    pub fn custom_sections(&self) -> impl Iterator<Item = &CustomSection> {
        self.sections.iter().filter_map(|section| match *section {
            Section::Custom(ref custom) => Some(custom),
            _ => None,
        })
    }

    /// The first custom section with the given name, if any.
    pub fn custom_section(&self, name: &str) -> Option<&CustomSection> {
        self.custom_sections().find(|custom| custom.name() == name)
    }
}

impl Deserialize for Module {
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let mut magic = [0u8; 4];
        reader.read(&mut magic)?;
        if magic != WASM_MAGIC_NUMBER {
            return Err(Error::InvalidMagic);
        }

        let version = u32::from(Uint32::deserialize(reader)?);
        if version != WASM_SUPPORTED_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let mut sections = Vec::new();
        loop {
            // A clean end of stream before a section id byte terminates the
            // module; end of stream anywhere else is a truncation error.
            let mut id = [0u8; 1];
            match reader.read(&mut id) {
                Ok(()) => {}
                Err(io::Error::UnexpectedEof) => break,
                Err(other) => return Err(other.into()),
            }
            sections.push(Section::deserialize_after_id(id[0], reader)?);
        }

        Ok(Module { version, sections })
    }
}

impl Serialize for Module {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        writer.write(&WASM_MAGIC_NUMBER)?;
        Uint32::from(self.version).serialize(writer)?;
        for section in self.sections {
            section.serialize(writer)?;
        }
        Ok(())
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "(module ;; version {}", self.version)?;
        for section in &self.sections {
            fmt::Display::fmt(section, f)?;
        }
        writeln!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::super::{deserialize_buffer, serialize};
    use super::*;

    const MINIMAL_MODULE: &[u8] = &[0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];

    #[test]
    fn minimal_module() {
        let module: Module = deserialize_buffer(MINIMAL_MODULE).unwrap();
        assert_eq!(module.version(), 1);
        assert!(module.sections().is_empty());
        assert_eq!(serialize(module).unwrap(), MINIMAL_MODULE.to_vec());
    }

    #[test]
    fn bad_magic() {
        let bytes = [0x01u8, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
        assert_eq!(
            deserialize_buffer::<Module>(&bytes),
            Err(Error::InvalidMagic),
        );
    }

    #[test]
    fn unsupported_version() {
        let bytes = [0x00u8, 0x61, 0x73, 0x6d, 0x0d, 0x00, 0x00, 0x00];
        assert_eq!(
            deserialize_buffer::<Module>(&bytes),
            Err(Error::UnsupportedVersion(13)),
        );
    }

    #[test]
    fn truncated_section_is_an_error() {
        // Section id 1 declaring a 10-byte payload that is absent.
        let mut bytes = MINIMAL_MODULE.to_vec();
        bytes.extend_from_slice(&[0x01, 0x0A]);
        assert_eq!(
            deserialize_buffer::<Module>(&bytes),
            Err(Error::UnexpectedEof),
        );
    }

    #[test]
    fn insert_section_keeps_canonical_order() {
        let mut module = Module::default();
        module.insert_section(Section::Code(CodeSection::default()));
        module.insert_section(Section::Type(TypeSection::default()));
        module.insert_section(Section::Memory(MemorySection::default()));
        let ids: Vec<u8> = module.sections().iter().map(Section::id).collect();
        assert_eq!(ids, vec![1, 5, 10]);
    }

    #[test]
    fn custom_section_lookup() {
        let mut module = Module::default();
        module.insert_section(Section::Custom(CustomSection::new(
            "producers".into(),
            vec![1, 2],
        )));
        assert!(module.custom_section("producers").is_some());
        assert!(module.custom_section("name").is_none());
        assert_eq!(module.custom_sections().count(), 1);
    }
}
