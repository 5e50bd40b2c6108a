use super::invoke::{Identity, Invoke};
use crate::elements::{GlobalEntry, GlobalType, InitExpr, Instruction, ValueType};

/// Builder of a global entry.
pub struct GlobalBuilder<F = Identity> {
    callback: F,
    value_type: ValueType,
    is_mutable: bool,
    init_expr: InitExpr,
}

impl GlobalBuilder {
    /// New global builder with no callback.
    pub fn new() -> Self {
        GlobalBuilder::with_callback(Identity)
    }
}

impl Default for GlobalBuilder {
    fn default() -> Self {
        GlobalBuilder::new()
    }
}

impl<F> GlobalBuilder<F>
where
    F: Invoke<GlobalEntry>,
{
    /// New global builder finalized by the given callback.
    pub fn with_callback(callback: F) -> Self {
        GlobalBuilder {
            callback,
            value_type: ValueType::I32,
            is_mutable: false,
            init_expr: InitExpr::new(alloc::vec![Instruction::I32Const(0)]),
        }
    }

    /// Set the content kind of the global.
    pub fn with_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    /// Make the global mutable.
    pub fn mutable(mut self) -> Self {
        self.is_mutable = true;
        self
    }

    /// Set the single-instruction initializer.
    pub fn init_expr(mut self, instruction: Instruction) -> Self {
        self.init_expr = InitExpr::new(alloc::vec![instruction]);
        self
    }

    /// Finish the global entry.
    pub fn build(self) -> F::Result {
        self.callback.invoke(GlobalEntry::new(
            GlobalType::new(self.value_type, self.is_mutable),
            self.init_expr,
        ))
    }
}
