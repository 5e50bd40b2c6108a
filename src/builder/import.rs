use super::invoke::{Identity, Invoke};
use crate::elements::{External, GlobalType, ImportEntry, MemoryType, TableType, ValueType};
use alloc::string::String;

/// Builder of an import entry.
pub struct ImportBuilder<F = Identity> {
    callback: F,
    module: String,
    field: String,
    binding: External,
}

impl ImportBuilder {
    /// New import builder with no callback.
    pub fn new() -> Self {
        ImportBuilder::with_callback(Identity)
    }
}

impl Default for ImportBuilder {
    fn default() -> Self {
        ImportBuilder::new()
    }
}

impl<F> ImportBuilder<F>
where
    F: Invoke<ImportEntry>,
{
    /// New import builder finalized by the given callback.
    pub fn with_callback(callback: F) -> Self {
        ImportBuilder {
            callback,
            module: String::new(),
            field: String::new(),
            binding: External::Function(0),
        }
    }

    /// Set the module name of the import.
    pub fn module(mut self, name: &str) -> Self {
        self.module = name.into();
        self
    }

    /// Set the field name of the import.
    pub fn field(mut self, name: &str) -> Self {
        self.field = name.into();
        self
    }

    /// Set both names of the import.
    pub fn path(self, module: &str, field: &str) -> Self {
        self.module(module).field(field)
    }

    /// Set the external binding directly.
    pub fn with_external(mut self, external: External) -> Self {
        self.binding = external;
        self
    }

    /// Start describing what kind of entity is imported.
    pub fn external(self) -> ImportExternalBuilder<Self> {
        ImportExternalBuilder::with_callback(self)
    }

    /// Finish the import entry.
    pub fn build(self) -> F::Result {
        self.callback
            .invoke(ImportEntry::new(self.module, self.field, self.binding))
    }
}

impl<F> Invoke<External> for ImportBuilder<F>
where
    F: Invoke<ImportEntry>,
{
    type Result = Self;

    fn invoke(self, binding: External) -> Self {
        self.with_external(binding)
    }
}

/// Builder of the external (kind-specific) part of an import entry.
pub struct ImportExternalBuilder<F = Identity> {
    callback: F,
}

impl<F> ImportExternalBuilder<F>
where
    F: Invoke<External>,
{
    /// New builder finalized by the given callback.
    pub fn with_callback(callback: F) -> Self {
        ImportExternalBuilder { callback }
    }

    /// Import a function with the given type index.
    pub fn func(self, type_index: u32) -> F::Result {
        self.callback.invoke(External::Function(type_index))
    }

    /// Import a table with the given limits.
    pub fn table(self, min: u32, max: Option<u32>) -> F::Result {
        self.callback.invoke(External::Table(TableType::new(min, max)))
    }

    /// Import a memory with the given limits.
    pub fn memory(self, min: u32, max: Option<u32>) -> F::Result {
        self.callback.invoke(External::Memory(MemoryType::new(min, max)))
    }

    /// Import a global of the given kind.
    pub fn global(self, value_type: ValueType, is_mutable: bool) -> F::Result {
        self.callback
            .invoke(External::Global(GlobalType::new(value_type, is_mutable)))
    }
}
