use super::invoke::{Identity, Invoke};
use crate::elements::{FuncBody, FunctionType, Instructions, Local, ValueType};
use alloc::vec::Vec;

/// How a function definition refers to its signature.
#[derive(Debug, Clone, PartialEq)]
pub enum Signature {
    /// Index into the module's type collection.
    TypeReference(u32),
    /// Inline signature, pushed into the type collection on build.
    Inline(FunctionType),
}

/// A complete function definition: signature plus body.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    /// Signature of the function.
    pub signature: Signature,
    /// Body of the function.
    pub body: FuncBody,
}

impl Default for FunctionDefinition {
    fn default() -> Self {
        FunctionDefinition {
            signature: Signature::Inline(FunctionType::default()),
            body: FuncBody::empty(),
        }
    }
}

/// Builder of a function signature.
pub struct SignatureBuilder<F = Identity> {
    callback: F,
    signature: FunctionType,
}

impl SignatureBuilder {
    /// New signature builder with no callback.
    pub fn new() -> Self {
        SignatureBuilder::with_callback(Identity)
    }
}

impl Default for SignatureBuilder {
    fn default() -> Self {
        SignatureBuilder::new()
    }
}

impl<F> SignatureBuilder<F>
where
    F: Invoke<FunctionType>,
{
    /// New signature builder finalized by the given callback.
    pub fn with_callback(callback: F) -> Self {
        SignatureBuilder {
            callback,
            signature: FunctionType::default(),
        }
    }

    /// Add a parameter of the given kind.
    pub fn with_param(mut self, value_type: ValueType) -> Self {
        self.signature.params_mut().push(value_type);
        self
    }

    /// Add several parameters.
    pub fn with_params(mut self, value_types: Vec<ValueType>) -> Self {
        self.signature.params_mut().extend(value_types);
        self
    }

    /// Add a result of the given kind.
    pub fn with_result(mut self, value_type: ValueType) -> Self {
        self.signature.results_mut().push(value_type);
        self
    }

    /// Finish the signature.
    pub fn build(self) -> F::Result {
        self.callback.invoke(self.signature)
    }
}

/// Start building a standalone signature.
pub fn signature() -> SignatureBuilder {
    SignatureBuilder::new()
}

/// Builder of a function body.
pub struct FuncBodyBuilder<F = Identity> {
    callback: F,
    body: FuncBody,
}

impl<F> FuncBodyBuilder<F>
where
    F: Invoke<FuncBody>,
{
    /// New body builder finalized by the given callback.
    pub fn with_callback(callback: F) -> Self {
        FuncBodyBuilder {
            callback,
            body: FuncBody::empty(),
        }
    }

    /// Replace the declared locals.
    pub fn with_locals(mut self, locals: Vec<Local>) -> Self {
        *self.body.locals_mut() = locals;
        self
    }

    /// Replace the instruction list.
    pub fn with_instructions(mut self, instructions: Instructions) -> Self {
        *self.body.code_mut() = instructions;
        self
    }

    /// Finish the body.
    pub fn build(self) -> F::Result {
        self.callback.invoke(self.body)
    }
}

/// Builder of a whole function: signature and body.
pub struct FunctionBuilder<F = Identity> {
    callback: F,
    func: FunctionDefinition,
}

impl FunctionBuilder {
    /// New function builder with no callback.
    pub fn new() -> Self {
        FunctionBuilder::with_callback(Identity)
    }
}

impl Default for FunctionBuilder {
    fn default() -> Self {
        FunctionBuilder::new()
    }
}

impl<F> FunctionBuilder<F>
where
    F: Invoke<FunctionDefinition>,
{
    /// New function builder finalized by the given callback.
    pub fn with_callback(callback: F) -> Self {
        FunctionBuilder {
            callback,
            func: FunctionDefinition::default(),
        }
    }

    /// Start building the signature inline.
    pub fn signature(self) -> SignatureBuilder<Self> {
        SignatureBuilder::with_callback(self)
    }

    /// Use an already registered type as the signature.
    pub fn with_signature_ref(mut self, type_index: u32) -> Self {
        self.func.signature = Signature::TypeReference(type_index);
        self
    }

    /// Start building the body.
    pub fn body(self) -> FuncBodyBuilder<Self> {
        FuncBodyBuilder::with_callback(self)
    }

    /// Replace the body wholesale.
    pub fn with_body(mut self, body: FuncBody) -> Self {
        self.func.body = body;
        self
    }

    /// Finish the function definition.
    pub fn build(self) -> F::Result {
        self.callback.invoke(self.func)
    }
}

impl<F> Invoke<FunctionType> for FunctionBuilder<F>
where
    F: Invoke<FunctionDefinition>,
{
    type Result = Self;

    fn invoke(mut self, signature: FunctionType) -> Self {
        self.func.signature = Signature::Inline(signature);
        self
    }
}

impl<F> Invoke<FuncBody> for FunctionBuilder<F>
where
    F: Invoke<FunctionDefinition>,
{
    type Result = Self;

    fn invoke(mut self, body: FuncBody) -> Self {
        self.func.body = body;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::Instruction;

    #[test]
    fn standalone_signature() {
        let sig = signature()
            .with_param(ValueType::I32)
            .with_result(ValueType::I64)
            .build();
        assert_eq!(sig.params(), &[ValueType::I32]);
        assert_eq!(sig.results(), &[ValueType::I64]);
    }

    #[test]
    fn function_definition() {
        let func = FunctionBuilder::new()
            .signature()
            .with_param(ValueType::I32)
            .build()
            .body()
            .with_instructions(Instructions::new(vec![Instruction::GetLocal(0)]))
            .build()
            .build();

        match func.signature {
            Signature::Inline(ref sig) => assert_eq!(sig.params(), &[ValueType::I32]),
            ref other => panic!("expected inline signature, got {:?}", other),
        }
        assert_eq!(func.body.code().elements().len(), 1);
    }
}
