use super::{io, Deserialize, Error, GlobalType, InitExpr, Serialize};
use core::fmt;

/// One entry of the Global section: the global's type and the constant
/// expression producing its initial value.
#[derive(Clone, Debug, PartialEq)]
pub struct GlobalEntry {
    global_type: GlobalType,
    init_expr: InitExpr,
}

impl GlobalEntry {
    /// New global entry.
    pub fn new(global_type: GlobalType, init_expr: InitExpr) -> Self {
        GlobalEntry {
            global_type,
            init_expr,
        }
    }

    /// Global type.
    pub fn global_type(&self) -> &GlobalType {
        &self.global_type
    }

    /// Initializer expression.
    pub fn init_expr(&self) -> &InitExpr {
        &self.init_expr
    }

    /// Mutable initializer expression.
    pub fn init_expr_mut(&mut self) -> &mut InitExpr {
        &mut self.init_expr
    }
}

impl Deserialize for GlobalEntry {
    fn deserialize<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        let global_type = GlobalType::deserialize(reader)?;
        let init_expr = InitExpr::deserialize(reader)?;
        Ok(GlobalEntry {
            global_type,
            init_expr,
        })
    }
}

impl Serialize for GlobalEntry {
    fn serialize<W: io::Write>(self, writer: &mut W) -> Result<(), Error> {
        self.global_type.serialize(writer)?;
        self.init_expr.serialize(writer)
    }
}

impl fmt::Display for GlobalEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mutability = if self.global_type.is_mutable() {
            "mut "
        } else {
            ""
        };
        write!(
            f,
            "(global ({}{}) {})",
            mutability,
            self.global_type.content_type(),
            self.init_expr
        )
    }
}
