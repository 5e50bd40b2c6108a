//! The chaining glue: a finished sub-builder hands its product back to
//! whoever created it.

/// Callback a nested builder invokes with its finished product.
pub trait Invoke<A> {
    /// What the callback produces, usually the parent builder.
    type Result;

    /// Consume the product of the nested builder.
    fn invoke(self, arg: A) -> Self::Result;
}

/// Terminal callback that just returns the product itself.
pub struct Identity;

impl<A> Invoke<A> for Identity {
    type Result = A;

    fn invoke(self, arg: A) -> A {
        arg
    }
}
