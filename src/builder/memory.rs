use super::invoke::{Identity, Invoke};
use crate::elements::MemoryType;

/// Builder of a memory definition.
pub struct MemoryBuilder<F = Identity> {
    callback: F,
    min: u32,
    max: Option<u32>,
}

impl MemoryBuilder {
    /// New memory builder with no callback.
    pub fn new() -> Self {
        MemoryBuilder::with_callback(Identity)
    }
}

impl Default for MemoryBuilder {
    fn default() -> Self {
        MemoryBuilder::new()
    }
}

impl<F> MemoryBuilder<F>
where
    F: Invoke<MemoryType>,
{
    /// New memory builder finalized by the given callback.
    pub fn with_callback(callback: F) -> Self {
        MemoryBuilder {
            callback,
            min: 1,
            max: None,
        }
    }

    /// Set the initial size, in pages.
    pub fn with_min(mut self, min: u32) -> Self {
        self.min = min;
        self
    }

    /// Set the maximum size, in pages.
    pub fn with_max(mut self, max: Option<u32>) -> Self {
        self.max = max;
        self
    }

    /// Finish the memory definition.
    pub fn build(self) -> F::Result {
        self.callback.invoke(MemoryType::new(self.min, self.max))
    }
}
