use super::invoke::{Identity, Invoke};
use crate::elements::{ExportEntry, Internal};
use alloc::string::String;

/// Builder of an export entry.
pub struct ExportBuilder<F = Identity> {
    callback: F,
    field: String,
    binding: Internal,
}

impl ExportBuilder {
    /// New export builder with no callback.
    pub fn new() -> Self {
        ExportBuilder::with_callback(Identity)
    }
}

impl Default for ExportBuilder {
    fn default() -> Self {
        ExportBuilder::new()
    }
}

impl<F> ExportBuilder<F>
where
    F: Invoke<ExportEntry>,
{
    /// New export builder finalized by the given callback.
    pub fn with_callback(callback: F) -> Self {
        ExportBuilder {
            callback,
            field: String::new(),
            binding: Internal::Function(0),
        }
    }

    /// Set the public name of the export.
    pub fn field(mut self, name: &str) -> Self {
        self.field = name.into();
        self
    }

    /// Set the internal binding directly.
    pub fn with_internal(mut self, internal: Internal) -> Self {
        self.binding = internal;
        self
    }

    /// Start describing what the export refers to.
    pub fn internal(self) -> ExportInternalBuilder<Self> {
        ExportInternalBuilder::with_callback(self)
    }

    /// Finish the export entry.
    pub fn build(self) -> F::Result {
        self.callback
            .invoke(ExportEntry::new(self.field, self.binding))
    }
}

impl<F> Invoke<Internal> for ExportBuilder<F>
where
    F: Invoke<ExportEntry>,
{
    type Result = Self;

    fn invoke(self, binding: Internal) -> Self {
        self.with_internal(binding)
    }
}

/// Builder of the internal reference of an export entry.
pub struct ExportInternalBuilder<F = Identity> {
    callback: F,
}

impl<F> ExportInternalBuilder<F>
where
    F: Invoke<Internal>,
{
    /// New builder finalized by the given callback.
    pub fn with_callback(callback: F) -> Self {
        ExportInternalBuilder { callback }
    }

    /// Export a function by index.
    pub fn func(self, index: u32) -> F::Result {
        self.callback.invoke(Internal::Function(index))
    }

    /// Export a table by index.
    pub fn table(self, index: u32) -> F::Result {
        self.callback.invoke(Internal::Table(index))
    }

    /// Export a memory by index.
    pub fn memory(self, index: u32) -> F::Result {
        self.callback.invoke(Internal::Memory(index))
    }

    /// Export a global by index.
    pub fn global(self, index: u32) -> F::Result {
        self.callback.invoke(Internal::Global(index))
    }
}
