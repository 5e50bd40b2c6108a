use super::invoke::{Identity, Invoke};
use crate::elements::TableType;
use alloc::vec::Vec;

/// A table definition together with its element segments.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    /// Table limits and element type.
    pub table_type: TableType,
    /// Element segments filling the table.
    pub elements: Vec<TableEntryDefinition>,
}

/// One run of function indices written into a table at a fixed offset.
#[derive(Debug, Clone, PartialEq)]
pub struct TableEntryDefinition {
    /// First slot the values are written to.
    pub offset: u32,
    /// Function indices to write.
    pub values: Vec<u32>,
}

/// Builder of a table definition with optional element segments.
pub struct TableBuilder<F = Identity> {
    callback: F,
    min: u32,
    max: Option<u32>,
    elements: Vec<TableEntryDefinition>,
}

impl TableBuilder {
    /// New table builder with no callback.
    pub fn new() -> Self {
        TableBuilder::with_callback(Identity)
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        TableBuilder::new()
    }
}

impl<F> TableBuilder<F>
where
    F: Invoke<TableDefinition>,
{
    /// New table builder finalized by the given callback.
    pub fn with_callback(callback: F) -> Self {
        TableBuilder {
            callback,
            min: 0,
            max: None,
            elements: Vec::new(),
        }
    }

    /// Set the initial slot count.
    pub fn with_min(mut self, min: u32) -> Self {
        self.min = min;
        self
    }

    /// Set the maximum slot count.
    pub fn with_max(mut self, max: Option<u32>) -> Self {
        self.max = max;
        self
    }

    /// Add an element segment writing `values` starting at `offset`.
    pub fn with_element(mut self, offset: u32, values: Vec<u32>) -> Self {
        self.elements.push(TableEntryDefinition { offset, values });
        self
    }

    /// Finish the table definition.
    pub fn build(self) -> F::Result {
        self.callback.invoke(TableDefinition {
            table_type: TableType::new(self.min, self.max),
            elements: self.elements,
        })
    }
}
