use super::invoke::{Identity, Invoke};
use crate::elements::{DataSegment, InitExpr, Instruction};
use alloc::vec::Vec;

/// Builder of a data segment.
pub struct DataSegmentBuilder<F = Identity> {
    callback: F,
    mem_index: u32,
    offset: InitExpr,
    value: Vec<u8>,
}

impl DataSegmentBuilder {
    /// New data segment builder with no callback.
    pub fn new() -> Self {
        DataSegmentBuilder::with_callback(Identity)
    }
}

impl Default for DataSegmentBuilder {
    fn default() -> Self {
        DataSegmentBuilder::new()
    }
}

impl<F> DataSegmentBuilder<F>
where
    F: Invoke<DataSegment>,
{
    /// New data segment builder finalized by the given callback.
    pub fn with_callback(callback: F) -> Self {
        DataSegmentBuilder {
            callback,
            mem_index: 0,
            offset: InitExpr::new(alloc::vec![Instruction::I32Const(0)]),
            value: Vec::new(),
        }
    }

    /// Set the target memory index.
    pub fn with_index(mut self, index: u32) -> Self {
        self.mem_index = index;
        self
    }

    /// Set the single-instruction offset expression.
    pub fn offset(mut self, instruction: Instruction) -> Self {
        self.offset = InitExpr::new(alloc::vec![instruction]);
        self
    }

    /// Set the bytes to copy.
    pub fn value(mut self, value: Vec<u8>) -> Self {
        self.value = value;
        self
    }

    /// Finish the data segment.
    pub fn build(self) -> F::Result {
        self.callback
            .invoke(DataSegment::new(self.mem_index, self.offset, self.value))
    }
}
