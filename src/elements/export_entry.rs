use super::{
    deserialize_string, io, serialize_string, Deserialize, Error, Serialize, VarUint32, VarUint7,
};
use alloc::string::String;
use core::fmt;

/// Destination of an export: an index into one of the module index spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Internal {
    /// Function index.
    Function(u32),
    /// Table index.
    Table(u32),
    /// Memory index.
    Memory(u32),
    /// Global index.
    Global(u32),
}

impl Deserialize for Internal {
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let kind = VarUint7::deserialize(reader)?;
        let index = u32::from(VarUint32::deserialize(reader)?);
        match kind.into() {
            0x00 => Ok(Internal::Function(index)),
            0x01 => Ok(Internal::Table(index)),
            0x02 => Ok(Internal::Memory(index)),
            0x03 => Ok(Internal::Global(index)),
            kind => Err(Error::UnknownInternalKind(kind)),
        }
    }
}

impl Serialize for Internal {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        let (kind, index) = match self {
            Internal::Function(index) => (0x00, index),
            Internal::Table(index) => (0x01, index),
            Internal::Memory(index) => (0x02, index),
            Internal::Global(index) => (0x03, index),
        };
        VarUint7::from(kind).serialize(writer)?;
        VarUint32::from(index).serialize(writer)
    }
}

impl fmt::Display for Internal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Internal::Function(index) => write!(f, "(func {})", index),
            Internal::Table(index) => write!(f, "(table {})", index),
            Internal::Memory(index) => write!(f, "(memory {})", index),
            Internal::Global(index) => write!(f, "(global {})", index),
        }
    }
}

/// One entry of the Export section: a name and the entity it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    field_str: String,
    internal: Internal,
}

impl ExportEntry {
    /// New export entry.
    pub fn new(field: String, internal: Internal) -> Self {
        ExportEntry {
            field_str: field,
            internal,
        }
    }

    /// Public name of the export.
    pub fn field(&self) -> &str {
        &self.field_str
    }

    /// Internal reference of the export entry.
    pub fn internal(&self) -> &Internal {
        &self.internal
    }

    /// Mutable internal reference of the export entry.
    pub fn internal_mut(&mut self) -> &mut Internal {
        &mut self.internal
    }
}

impl Deserialize for ExportEntry {
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let field_str = deserialize_string(reader)?;
        let internal = Internal::deserialize(reader)?;
        Ok(ExportEntry {
            field_str,
            internal,
        })
    }
}

impl Serialize for ExportEntry {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        serialize_string(&self.field_str, writer)?;
        self.internal.serialize(writer)
    }
}

impl fmt::Display for ExportEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(export \"{}\" {})", self.field_str, self.internal)
    }
}

#[cfg(test)]
mod tests {
    use super::super::{deserialize_buffer, serialize, Error};
    use super::*;

    #[test]
    fn export_entry_roundtrip() {
        let entry = ExportEntry::new("fac".into(), Internal::Function(3));
        let bytes = serialize(entry.clone()).unwrap();
        let parsed: ExportEntry = deserialize_buffer(&bytes).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn unknown_internal_kind() {
        // "f" exported with kind 4.
        let bytes = [1u8, b'f', 0x04, 0x00];
        assert_eq!(
            deserialize_buffer::<ExportEntry>(&bytes),
            Err(Error::UnknownInternalKind(4)),
        );
    }
}
