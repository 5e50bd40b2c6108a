use super::{
    deserialize_string, io, serialize_string, Deserialize, Error, GlobalType, MemoryType,
    Serialize, TableType, VarUint1, VarUint32, VarUint7,
};
use alloc::string::String;
use core::fmt;

/// Size bounds of a growable entity: mandatory initial size and an
/// optional maximum the entity must never outgrow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResizableLimits {
    initial: u32,
    maximum: Option<u32>,
}

impl ResizableLimits {
    /// New limits.
    pub fn new(min: u32, max: Option<u32>) -> Self {
        ResizableLimits {
            initial: min,
            maximum: max,
        }
    }

    /// Initial size.
    pub fn initial(&self) -> u32 {
        self.initial
    }

    /// Maximum size.
    pub fn maximum(&self) -> Option<u32> {
        self.maximum
    }
}

impl Deserialize for ResizableLimits {
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let has_max = bool::from(VarUint1::deserialize(reader)?);
        let initial = u32::from(VarUint32::deserialize(reader)?);
        let maximum = if has_max {
            Some(u32::from(VarUint32::deserialize(reader)?))
        } else {
            None
        };

        Ok(ResizableLimits { initial, maximum })
    }
}

impl Serialize for ResizableLimits {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        VarUint1::from(self.maximum.is_some()).serialize(writer)?;
        VarUint32::from(self.initial).serialize(writer)?;
        if let Some(max) = self.maximum {
            VarUint32::from(max).serialize(writer)?;
        }
        Ok(())
    }
}

/// What an import brings into the module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum External {
    /// Function with a type index.
    Function(u32),
    /// Table with the given descriptor.
    Table(TableType),
    /// Linear memory with the given descriptor.
    Memory(MemoryType),
    /// Global with the given descriptor.
    Global(GlobalType),
}

impl Deserialize for External {
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let kind = VarUint7::deserialize(reader)?;
        match kind.into() {
            0x00 => Ok(External::Function(VarUint32::deserialize(reader)?.into())),
            0x01 => Ok(External::Table(TableType::deserialize(reader)?)),
            0x02 => Ok(External::Memory(MemoryType::deserialize(reader)?)),
            0x03 => Ok(External::Global(GlobalType::deserialize(reader)?)),
            kind => Err(Error::UnknownExternalKind(kind)),
        }
    }
}

impl Serialize for External {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        match self {
            External::Function(index) => {
                VarUint7::from(0x00).serialize(writer)?;
                VarUint32::from(index).serialize(writer)?;
            }
            External::Table(tt) => {
                VarUint7::from(0x01).serialize(writer)?;
                tt.serialize(writer)?;
            }
            External::Memory(mt) => {
                VarUint7::from(0x02).serialize(writer)?;
                mt.serialize(writer)?;
            }
            External::Global(gt) => {
                VarUint7::from(0x03).serialize(writer)?;
                gt.serialize(writer)?;
            }
        }
        Ok(())
    }
}

/// One entry of the Import section: where the entity comes from
/// (module/field names) and what kind of entity it is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportEntry {
    module_str: String,
    field_str: String,
    external: External,
}

impl ImportEntry {
    /// New import entry.
    pub fn new(module_str: String, field_str: String, external: External) -> Self {
        ImportEntry {
            module_str,
            field_str,
            external,
        }
    }

    /// Module name the import comes from.
    pub fn module(&self) -> &str {
        &self.module_str
    }

    /// Field name of the import within its module.
    pub fn field(&self) -> &str {
        &self.field_str
    }

    /// The imported entity description.
    pub fn external(&self) -> &External {
        &self.external
    }

    /// Mutable imported entity description.
    pub fn external_mut(&mut self) -> &mut External {
        &mut self.external
    }
}

impl Deserialize for ImportEntry {
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let module_str = deserialize_string(reader)?;
        let field_str = deserialize_string(reader)?;
        let external = External::deserialize(reader)?;

        Ok(ImportEntry {
            module_str,
            field_str,
            external,
        })
    }
}

impl Serialize for ImportEntry {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        serialize_string(&self.module_str, writer)?;
        serialize_string(&self.field_str, writer)?;
        self.external.serialize(writer)
    }
}

impl fmt::Display for ImportEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.external {
            External::Function(idx) => write!(
                f,
                "(import \"{}\" \"{}\" (func (type {})))",
                self.module_str, self.field_str, idx
            ),
            External::Table(_) => write!(
                f,
                "(import \"{}\" \"{}\" (table))",
                self.module_str, self.field_str
            ),
            External::Memory(_) => write!(
                f,
                "(import \"{}\" \"{}\" (memory))",
                self.module_str, self.field_str
            ),
            External::Global(gt) => write!(
                f,
                "(import \"{}\" \"{}\" (global {}))",
                self.module_str,
                self.field_str,
                gt.content_type()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{deserialize_buffer, serialize};
    use super::*;

    #[test]
    fn limits_without_max() {
        let limits = ResizableLimits::new(1, None);
        let bytes = serialize(limits).unwrap();
        assert_eq!(bytes, vec![0x00, 0x01]);
        let parsed: ResizableLimits = deserialize_buffer(&bytes).unwrap();
        assert_eq!(parsed, limits);
    }

    #[test]
    fn limits_with_max() {
        let limits = ResizableLimits::new(1, Some(2));
        let bytes = serialize(limits).unwrap();
        assert_eq!(bytes, vec![0x01, 0x01, 0x02]);
        let parsed: ResizableLimits = deserialize_buffer(&bytes).unwrap();
        assert_eq!(parsed, limits);
    }

    #[test]
    fn import_entry_roundtrip() {
        let entry = ImportEntry::new("env".into(), "memory".into(), External::Memory(MemoryType::new(1, Some(2))));
        let bytes = serialize(entry.clone()).unwrap();
        let parsed: ImportEntry = deserialize_buffer(&bytes).unwrap();
        assert_eq!(parsed, entry);
    }
}
