use crate::elements::{BrTableData, InitExpr, Instruction, Instructions};
use crate::func::{FuncInstanceInternal, FuncRef};
use crate::host::Externals;
use crate::memory::MemoryRef;
use crate::memory_units::Pages;
use crate::module::{ModuleInstance, ModuleRef, DEFAULT_MEMORY_INDEX, DEFAULT_TABLE_INDEX};
use crate::nan_preserving_float::{F32, F64};
use crate::value::{
    ArithmeticOps, ExtendInto, Float, FromRuntimeValue, Integer, LittleEndianConvert,
    TransmuteInto, TryTruncateInto, WrapInto,
};
use crate::{Error, RuntimeValue, Signature, Trap, TrapKind};
use alloc::vec::Vec;
use core::ops;

/// Maximum number of entries on the value stack of a single invocation.
pub const DEFAULT_VALUE_STACK_LIMIT: usize = 64 * 1024;

/// Maximum number of nested function calls.
///
/// The executor walks instruction trees recursively, so every wasm frame
/// costs native stack as well. The limit is picked to trap with
/// [`StackOverflow`](crate::TrapKind::StackOverflow) well before the native
/// stack of a spawned thread runs out.
pub const DEFAULT_CALL_STACK_LIMIT: usize = 512;

/// Interpreter action to execute after executing an instruction.
#[derive(Debug, PartialEq, Eq)]
enum InstructionOutcome {
    /// Continue with the next instruction.
    RunNextInstruction,
    /// A break is pending: the given number of enclosing structured blocks
    /// still have to be unwound. Each block, loop or if the outcome passes
    /// through decrements the depth; whoever sees depth zero is the target.
    Branch(u32),
    /// `return` was executed; unwind the whole frame.
    Return,
}

/// State of one function activation: its module, the locals vector and the
/// evaluation stack. The stack lives exactly as long as the invocation.
struct FunctionContext {
    module: ModuleRef,
    locals: Vec<RuntimeValue>,
    value_stack: ValueStack,
    return_slot: Option<Vec<RuntimeValue>>,
}

impl FunctionContext {
    fn new(module: ModuleRef, locals: Vec<RuntimeValue>) -> FunctionContext {
        FunctionContext {
            module,
            locals,
            value_stack: ValueStack::with_limit(DEFAULT_VALUE_STACK_LIMIT),
            return_slot: None,
        }
    }

    fn memory(&self) -> Result<MemoryRef, Trap> {
        // With no memory declared every access is out of bounds.
        self.module
            .memory_by_index(DEFAULT_MEMORY_INDEX)
            .ok_or_else(|| TrapKind::MemoryAccessOutOfBounds.into())
    }
}

/// Function interpreter: a recursive tree walker over the instruction
/// structure of wasm functions.
///
/// The interpreter assumes the module is well-formed in the sense of wasm
/// validation; executing type-invalid code may panic instead of trapping.
pub(crate) struct Interpreter<'a, E: Externals + 'a> {
    externals: &'a mut E,
    call_depth: usize,
}

impl<'a, E: Externals> Interpreter<'a, E> {
    pub fn new(externals: &'a mut E) -> Interpreter<'a, E> {
        Interpreter {
            externals,
            call_depth: 0,
        }
    }

    pub fn invoke(
        &mut self,
        func: &FuncRef,
        args: &[RuntimeValue],
    ) -> Result<Option<RuntimeValue>, Trap> {
        self.invoke_internal(func, args.to_vec())
    }

    fn invoke_any(
        &mut self,
        func: &FuncRef,
        args: Vec<RuntimeValue>,
    ) -> Result<Option<RuntimeValue>, Trap> {
        match *func.as_internal() {
            FuncInstanceInternal::Internal { .. } => self.invoke_internal(func, args),
            FuncInstanceInternal::Host {
                ref host_func_index,
                ..
            } => {
                let result = self
                    .externals
                    .invoke_index(*host_func_index, (&args[..]).into())?;
                if result.map(|value| value.value_type()) != func.signature().return_type() {
                    return Err(TrapKind::UnexpectedSignature.into());
                }
                Ok(result)
            }
        }
    }

    fn invoke_internal(
        &mut self,
        func: &FuncRef,
        args: Vec<RuntimeValue>,
    ) -> Result<Option<RuntimeValue>, Trap> {
        if self.call_depth == DEFAULT_CALL_STACK_LIMIT {
            return Err(TrapKind::StackOverflow.into());
        }

        let body = func
            .body()
            .expect("internal functions always have a body; qed");
        let module = func
            .module()
            .expect("internal functions always belong to a module; qed");

        // The locals vector is the parameters followed by the declared
        // locals, the latter zero-initialized, each entry expanded to
        // `count` variables of its kind.
        let mut locals = args;
        for local in &body.locals {
            for _ in 0..local.count() {
                locals.push(RuntimeValue::default(local.value_type()));
            }
        }

        let mut context = FunctionContext::new(module, locals);

        self.call_depth += 1;
        let outcome = self.run_sequence(&mut context, body.code.elements());
        self.call_depth -= 1;
        outcome?;

        let returns = match context.return_slot.take() {
            Some(values) => values,
            None => context.value_stack.into_values(),
        };
        check_function_returns(func.signature(), &returns)?;
        Ok(returns.first().copied())
    }

    fn run_sequence(
        &mut self,
        context: &mut FunctionContext,
        instructions: &[Instruction],
    ) -> Result<InstructionOutcome, Trap> {
        for instruction in instructions {
            match self.run_instruction(context, instruction)? {
                InstructionOutcome::RunNextInstruction => {}
                outcome => return Ok(outcome),
            }
        }
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_instruction(
        &mut self,
        context: &mut FunctionContext,
        instruction: &Instruction,
    ) -> Result<InstructionOutcome, Trap> {
        use crate::elements::Instruction::*;

        match *instruction {
            Unreachable => Err(TrapKind::Unreachable.into()),
            Nop => Ok(InstructionOutcome::RunNextInstruction),
            Block(_, ref body) => self.run_block(context, body),
            Loop(_, ref body) => self.run_loop(context, body),
            If(_, ref then_body, ref else_body) => {
                self.run_if(context, then_body, else_body.as_ref())
            }
            Br(depth) => Ok(InstructionOutcome::Branch(depth)),
            BrIf(depth) => self.run_br_if(context, depth),
            BrTable(ref data) => self.run_br_table(context, data),
            Return => self.run_return(context),

            Call(index) => self.run_call(context, index),
            CallIndirect(type_index, _) => self.run_call_indirect(context, type_index),

            Drop => self.run_drop(context),
            Select => self.run_select(context),

            GetLocal(index) => self.run_get_local(context, index),
            SetLocal(index) => self.run_set_local(context, index),
            TeeLocal(index) => self.run_tee_local(context, index),
            GetGlobal(index) => self.run_get_global(context, index),
            SetGlobal(index) => self.run_set_global(context, index),

            I32Load(align, offset) => self.run_load::<i32>(context, align, offset),
            I64Load(align, offset) => self.run_load::<i64>(context, align, offset),
            F32Load(align, offset) => self.run_load::<F32>(context, align, offset),
            F64Load(align, offset) => self.run_load::<F64>(context, align, offset),
            I32Load8S(align, offset) => self.run_load_extend::<i8, i32>(context, align, offset),
            I32Load8U(align, offset) => self.run_load_extend::<u8, i32>(context, align, offset),
            I32Load16S(align, offset) => self.run_load_extend::<i16, i32>(context, align, offset),
            I32Load16U(align, offset) => self.run_load_extend::<u16, i32>(context, align, offset),
            I64Load8S(align, offset) => self.run_load_extend::<i8, i64>(context, align, offset),
            I64Load8U(align, offset) => self.run_load_extend::<u8, i64>(context, align, offset),
            I64Load16S(align, offset) => self.run_load_extend::<i16, i64>(context, align, offset),
            I64Load16U(align, offset) => self.run_load_extend::<u16, i64>(context, align, offset),
            I64Load32S(align, offset) => self.run_load_extend::<i32, i64>(context, align, offset),
            I64Load32U(align, offset) => self.run_load_extend::<u32, i64>(context, align, offset),
            I32Store(align, offset) => self.run_store::<i32>(context, align, offset),
            I64Store(align, offset) => self.run_store::<i64>(context, align, offset),
            F32Store(align, offset) => self.run_store::<F32>(context, align, offset),
            F64Store(align, offset) => self.run_store::<F64>(context, align, offset),
            I32Store8(align, offset) => self.run_store_wrap::<i32, i8>(context, align, offset),
            I32Store16(align, offset) => self.run_store_wrap::<i32, i16>(context, align, offset),
            I64Store8(align, offset) => self.run_store_wrap::<i64, i8>(context, align, offset),
            I64Store16(align, offset) => self.run_store_wrap::<i64, i16>(context, align, offset),
            I64Store32(align, offset) => self.run_store_wrap::<i64, i32>(context, align, offset),

            CurrentMemory(_) => self.run_current_memory(context),
            GrowMemory(_) => self.run_grow_memory(context),

            I32Const(val) => self.run_const(context, val.into()),
            I64Const(val) => self.run_const(context, val.into()),
            F32Const(val) => self.run_const(context, RuntimeValue::decode_f32(val)),
            F64Const(val) => self.run_const(context, RuntimeValue::decode_f64(val)),

            I32Eqz => self.run_eqz::<i32>(context),
            I32Eq => self.run_relop::<i32, _>(context, |left, right| left == right),
            I32Ne => self.run_relop::<i32, _>(context, |left, right| left != right),
            I32LtS => self.run_relop::<i32, _>(context, |left, right| left < right),
            I32LtU => self.run_relop::<u32, _>(context, |left, right| left < right),
            I32GtS => self.run_relop::<i32, _>(context, |left, right| left > right),
            I32GtU => self.run_relop::<u32, _>(context, |left, right| left > right),
            I32LeS => self.run_relop::<i32, _>(context, |left, right| left <= right),
            I32LeU => self.run_relop::<u32, _>(context, |left, right| left <= right),
            I32GeS => self.run_relop::<i32, _>(context, |left, right| left >= right),
            I32GeU => self.run_relop::<u32, _>(context, |left, right| left >= right),

            I64Eqz => self.run_eqz::<i64>(context),
            I64Eq => self.run_relop::<i64, _>(context, |left, right| left == right),
            I64Ne => self.run_relop::<i64, _>(context, |left, right| left != right),
            I64LtS => self.run_relop::<i64, _>(context, |left, right| left < right),
            I64LtU => self.run_relop::<u64, _>(context, |left, right| left < right),
            I64GtS => self.run_relop::<i64, _>(context, |left, right| left > right),
            I64GtU => self.run_relop::<u64, _>(context, |left, right| left > right),
            I64LeS => self.run_relop::<i64, _>(context, |left, right| left <= right),
            I64LeU => self.run_relop::<u64, _>(context, |left, right| left <= right),
            I64GeS => self.run_relop::<i64, _>(context, |left, right| left >= right),
            I64GeU => self.run_relop::<u64, _>(context, |left, right| left >= right),

            F32Eq => self.run_relop::<F32, _>(context, |left, right| left == right),
            F32Ne => self.run_relop::<F32, _>(context, |left, right| left != right),
            F32Lt => self.run_relop::<F32, _>(context, |left, right| left < right),
            F32Gt => self.run_relop::<F32, _>(context, |left, right| left > right),
            F32Le => self.run_relop::<F32, _>(context, |left, right| left <= right),
            F32Ge => self.run_relop::<F32, _>(context, |left, right| left >= right),

            F64Eq => self.run_relop::<F64, _>(context, |left, right| left == right),
            F64Ne => self.run_relop::<F64, _>(context, |left, right| left != right),
            F64Lt => self.run_relop::<F64, _>(context, |left, right| left < right),
            F64Gt => self.run_relop::<F64, _>(context, |left, right| left > right),
            F64Le => self.run_relop::<F64, _>(context, |left, right| left <= right),
            F64Ge => self.run_relop::<F64, _>(context, |left, right| left >= right),

            I32Clz => self.run_clz::<i32>(context),
            I32Ctz => self.run_ctz::<i32>(context),
            I32Popcnt => self.run_popcnt::<i32>(context),
            I32Add => self.run_add::<i32>(context),
            I32Sub => self.run_sub::<i32>(context),
            I32Mul => self.run_mul::<i32>(context),
            I32DivS => self.run_div::<i32, i32>(context),
            I32DivU => self.run_div::<i32, u32>(context),
            I32RemS => self.run_rem::<i32, i32>(context),
            I32RemU => self.run_rem::<i32, u32>(context),
            I32And => self.run_and::<i32>(context),
            I32Or => self.run_or::<i32>(context),
            I32Xor => self.run_xor::<i32>(context),
            I32Shl => self.run_shl::<i32>(context, 0x1F),
            I32ShrS => self.run_shr::<i32, i32>(context, 0x1F),
            I32ShrU => self.run_shr::<i32, u32>(context, 0x1F),
            I32Rotl => self.run_rotl::<i32>(context),
            I32Rotr => self.run_rotr::<i32>(context),

            I64Clz => self.run_clz::<i64>(context),
            I64Ctz => self.run_ctz::<i64>(context),
            I64Popcnt => self.run_popcnt::<i64>(context),
            I64Add => self.run_add::<i64>(context),
            I64Sub => self.run_sub::<i64>(context),
            I64Mul => self.run_mul::<i64>(context),
            I64DivS => self.run_div::<i64, i64>(context),
            I64DivU => self.run_div::<i64, u64>(context),
            I64RemS => self.run_rem::<i64, i64>(context),
            I64RemU => self.run_rem::<i64, u64>(context),
            I64And => self.run_and::<i64>(context),
            I64Or => self.run_or::<i64>(context),
            I64Xor => self.run_xor::<i64>(context),
            I64Shl => self.run_shl::<i64>(context, 0x3F),
            I64ShrS => self.run_shr::<i64, i64>(context, 0x3F),
            I64ShrU => self.run_shr::<i64, u64>(context, 0x3F),
            I64Rotl => self.run_rotl::<i64>(context),
            I64Rotr => self.run_rotr::<i64>(context),

            F32Abs => self.run_abs::<F32>(context),
            F32Neg => self.run_neg::<F32>(context),
            F32Ceil => self.run_ceil::<F32>(context),
            F32Floor => self.run_floor::<F32>(context),
            F32Trunc => self.run_trunc::<F32>(context),
            F32Nearest => self.run_nearest::<F32>(context),
            F32Sqrt => self.run_sqrt::<F32>(context),
            F32Add => self.run_add::<F32>(context),
            F32Sub => self.run_sub::<F32>(context),
            F32Mul => self.run_mul::<F32>(context),
            F32Div => self.run_div::<F32, F32>(context),
            F32Min => self.run_min::<F32>(context),
            F32Max => self.run_max::<F32>(context),
            F32Copysign => self.run_copysign::<F32>(context),

            F64Abs => self.run_abs::<F64>(context),
            F64Neg => self.run_neg::<F64>(context),
            F64Ceil => self.run_ceil::<F64>(context),
            F64Floor => self.run_floor::<F64>(context),
            F64Trunc => self.run_trunc::<F64>(context),
            F64Nearest => self.run_nearest::<F64>(context),
            F64Sqrt => self.run_sqrt::<F64>(context),
            F64Add => self.run_add::<F64>(context),
            F64Sub => self.run_sub::<F64>(context),
            F64Mul => self.run_mul::<F64>(context),
            F64Div => self.run_div::<F64, F64>(context),
            F64Min => self.run_min::<F64>(context),
            F64Max => self.run_max::<F64>(context),
            F64Copysign => self.run_copysign::<F64>(context),

            I32WrapI64 => self.run_wrap::<i64, i32>(context),
            I32TruncSF32 => self.run_trunc_to_int::<F32, i32, i32>(context),
            I32TruncUF32 => self.run_trunc_to_int::<F32, u32, i32>(context),
            I32TruncSF64 => self.run_trunc_to_int::<F64, i32, i32>(context),
            I32TruncUF64 => self.run_trunc_to_int::<F64, u32, i32>(context),
            I64ExtendSI32 => self.run_extend::<i32, i64, i64>(context),
            I64ExtendUI32 => self.run_extend::<u32, u64, i64>(context),
            I64TruncSF32 => self.run_trunc_to_int::<F32, i64, i64>(context),
            I64TruncUF32 => self.run_trunc_to_int::<F32, u64, i64>(context),
            I64TruncSF64 => self.run_trunc_to_int::<F64, i64, i64>(context),
            I64TruncUF64 => self.run_trunc_to_int::<F64, u64, i64>(context),
            F32ConvertSI32 => self.run_extend::<i32, F32, F32>(context),
            F32ConvertUI32 => self.run_extend::<u32, F32, F32>(context),
            F32ConvertSI64 => self.run_wrap::<i64, F32>(context),
            F32ConvertUI64 => self.run_wrap::<u64, F32>(context),
            F32DemoteF64 => self.run_wrap::<F64, F32>(context),
            F64ConvertSI32 => self.run_extend::<i32, F64, F64>(context),
            F64ConvertUI32 => self.run_extend::<u32, F64, F64>(context),
            F64ConvertSI64 => self.run_extend::<i64, F64, F64>(context),
            F64ConvertUI64 => self.run_extend::<u64, F64, F64>(context),
            F64PromoteF32 => self.run_extend::<F32, F64, F64>(context),
            I32ReinterpretF32 => self.run_reinterpret::<F32, i32>(context),
            I64ReinterpretF64 => self.run_reinterpret::<F64, i64>(context),
            F32ReinterpretI32 => self.run_reinterpret::<i32, F32>(context),
            F64ReinterpretI64 => self.run_reinterpret::<i64, F64>(context),
        }
    }

    fn run_block(
        &mut self,
        context: &mut FunctionContext,
        body: &Instructions,
    ) -> Result<InstructionOutcome, Trap> {
        match self.run_sequence(context, body.elements())? {
            InstructionOutcome::Branch(0) => Ok(InstructionOutcome::RunNextInstruction),
            InstructionOutcome::Branch(depth) => Ok(InstructionOutcome::Branch(depth - 1)),
            other => Ok(other),
        }
    }

    fn run_loop(
        &mut self,
        context: &mut FunctionContext,
        body: &Instructions,
    ) -> Result<InstructionOutcome, Trap> {
        loop {
            match self.run_sequence(context, body.elements())? {
                // Branching to a loop re-enters it from the first child;
                // this is what distinguishes it from a block.
                InstructionOutcome::Branch(0) => continue,
                InstructionOutcome::Branch(depth) => {
                    return Ok(InstructionOutcome::Branch(depth - 1))
                }
                InstructionOutcome::RunNextInstruction => {
                    return Ok(InstructionOutcome::RunNextInstruction)
                }
                InstructionOutcome::Return => return Ok(InstructionOutcome::Return),
            }
        }
    }

    fn run_if(
        &mut self,
        context: &mut FunctionContext,
        then_body: &Instructions,
        else_body: Option<&Instructions>,
    ) -> Result<InstructionOutcome, Trap> {
        let condition: bool = context.value_stack.pop_as();
        let body = if condition { Some(then_body) } else { else_body };
        match body {
            Some(body) => self.run_block(context, body),
            None => Ok(InstructionOutcome::RunNextInstruction),
        }
    }

    fn run_br_if(
        &mut self,
        context: &mut FunctionContext,
        depth: u32,
    ) -> Result<InstructionOutcome, Trap> {
        let condition: bool = context.value_stack.pop_as();
        if condition {
            Ok(InstructionOutcome::Branch(depth))
        } else {
            Ok(InstructionOutcome::RunNextInstruction)
        }
    }

    fn run_br_table(
        &mut self,
        context: &mut FunctionContext,
        data: &BrTableData,
    ) -> Result<InstructionOutcome, Trap> {
        let index: u32 = context.value_stack.pop_as();
        // Indices at or past the table length take the default target.
        let depth = data
            .table
            .get(index as usize)
            .copied()
            .unwrap_or(data.default);
        Ok(InstructionOutcome::Branch(depth))
    }

    fn run_return(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap> {
        context.return_slot = Some(context.value_stack.drain());
        Ok(InstructionOutcome::Return)
    }

    fn run_call(
        &mut self,
        context: &mut FunctionContext,
        func_index: u32,
    ) -> Result<InstructionOutcome, Trap> {
        let func = context
            .module
            .func_by_index(func_index)
            .ok_or(TrapKind::TableAccessOutOfBounds)?;
        self.do_call(context, func)
    }

    fn run_call_indirect(
        &mut self,
        context: &mut FunctionContext,
        signature_index: u32,
    ) -> Result<InstructionOutcome, Trap> {
        let table_func_index: u32 = context.value_stack.pop_as();
        let table = context
            .module
            .table_by_index(DEFAULT_TABLE_INDEX)
            .ok_or(TrapKind::TableAccessOutOfBounds)?;
        let func_ref = table
            .get(table_func_index)
            .map_err(|_| TrapKind::TableAccessOutOfBounds)?
            .ok_or(TrapKind::ElemUninitialized)?;

        let required_signature = context
            .module
            .signature_by_index(signature_index)
            .ok_or(TrapKind::UnexpectedSignature)?;
        if *required_signature != *func_ref.signature() {
            return Err(TrapKind::UnexpectedSignature.into());
        }

        self.do_call(context, func_ref)
    }

    fn do_call(
        &mut self,
        context: &mut FunctionContext,
        func: FuncRef,
    ) -> Result<InstructionOutcome, Trap> {
        // Parameters sit deepest-first on the stack.
        let param_count = func.signature().params().len();
        let args = context.value_stack.pop_args(param_count);

        if let Some(return_value) = self.invoke_any(&func, args)? {
            context.value_stack.push(return_value)?;
        }
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_drop(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap> {
        let _ = context.value_stack.pop();
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_select(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap> {
        let condition: bool = context.value_stack.pop_as();
        let right = context.value_stack.pop();
        let left = context.value_stack.pop();
        context
            .value_stack
            .push(if condition { left } else { right })?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_get_local(
        &mut self,
        context: &mut FunctionContext,
        index: u32,
    ) -> Result<InstructionOutcome, Trap> {
        let value = *context
            .locals
            .get(index as usize)
            .expect("local index in bounds on well-formed code; qed");
        context.value_stack.push(value)?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_set_local(
        &mut self,
        context: &mut FunctionContext,
        index: u32,
    ) -> Result<InstructionOutcome, Trap> {
        let value = context.value_stack.pop();
        *context
            .locals
            .get_mut(index as usize)
            .expect("local index in bounds on well-formed code; qed") = value;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_tee_local(
        &mut self,
        context: &mut FunctionContext,
        index: u32,
    ) -> Result<InstructionOutcome, Trap> {
        // Writes the top of the stack without popping it.
        let value = context.value_stack.top();
        *context
            .locals
            .get_mut(index as usize)
            .expect("local index in bounds on well-formed code; qed") = value;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_get_global(
        &mut self,
        context: &mut FunctionContext,
        index: u32,
    ) -> Result<InstructionOutcome, Trap> {
        let global = context
            .module
            .global_by_index(index)
            .expect("global index in bounds on well-formed code; qed");
        context.value_stack.push(global.get())?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_set_global(
        &mut self,
        context: &mut FunctionContext,
        index: u32,
    ) -> Result<InstructionOutcome, Trap> {
        let value = context.value_stack.pop();
        let global = context
            .module
            .global_by_index(index)
            .expect("global index in bounds on well-formed code; qed");
        if !global.is_mutable() {
            return Err(TrapKind::ImmutableGlobal.into());
        }
        global
            .set(value)
            .expect("mutability checked above and kinds match on well-formed code; qed");
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_load<T>(
        &mut self,
        context: &mut FunctionContext,
        align: u32,
        offset: u32,
    ) -> Result<InstructionOutcome, Trap>
    where
        RuntimeValue: From<T>,
        T: LittleEndianConvert,
    {
        let raw_address: u32 = context.value_stack.pop_as();
        let address = effective_address(offset, raw_address)?;
        check_alignment(address, align)?;
        let m = context.memory()?;
        let n: T = m
            .get_value(address)
            .map_err(|_| Trap::from(TrapKind::MemoryAccessOutOfBounds))?;
        context.value_stack.push(n.into())?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_load_extend<T, U>(
        &mut self,
        context: &mut FunctionContext,
        align: u32,
        offset: u32,
    ) -> Result<InstructionOutcome, Trap>
    where
        T: ExtendInto<U> + LittleEndianConvert,
        RuntimeValue: From<U>,
    {
        let raw_address: u32 = context.value_stack.pop_as();
        let address = effective_address(offset, raw_address)?;
        check_alignment(address, align)?;
        let m = context.memory()?;
        let v: T = m
            .get_value(address)
            .map_err(|_| Trap::from(TrapKind::MemoryAccessOutOfBounds))?;
        let stack_value: U = v.extend_into();
        context.value_stack.push(stack_value.into())?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_store<T>(
        &mut self,
        context: &mut FunctionContext,
        align: u32,
        offset: u32,
    ) -> Result<InstructionOutcome, Trap>
    where
        T: FromRuntimeValue + LittleEndianConvert,
    {
        let stack_value: T = context.value_stack.pop_as();
        let raw_address: u32 = context.value_stack.pop_as();
        let address = effective_address(offset, raw_address)?;
        check_alignment(address, align)?;
        let m = context.memory()?;
        m.set_value(address, stack_value)
            .map_err(|_| Trap::from(TrapKind::MemoryAccessOutOfBounds))?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_store_wrap<T, U>(
        &mut self,
        context: &mut FunctionContext,
        align: u32,
        offset: u32,
    ) -> Result<InstructionOutcome, Trap>
    where
        T: FromRuntimeValue + WrapInto<U>,
        U: LittleEndianConvert,
    {
        let stack_value: T = context.value_stack.pop_as();
        let stack_value = stack_value.wrap_into();
        let raw_address: u32 = context.value_stack.pop_as();
        let address = effective_address(offset, raw_address)?;
        check_alignment(address, align)?;
        let m = context.memory()?;
        m.set_value(address, stack_value)
            .map_err(|_| Trap::from(TrapKind::MemoryAccessOutOfBounds))?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_current_memory(
        &mut self,
        context: &mut FunctionContext,
    ) -> Result<InstructionOutcome, Trap> {
        let m = context.memory()?;
        let pages = m.current_size().0;
        context.value_stack.push(RuntimeValue::I32(pages as i32))?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_grow_memory(
        &mut self,
        context: &mut FunctionContext,
    ) -> Result<InstructionOutcome, Trap> {
        let pages: u32 = context.value_stack.pop_as();
        let m = context.memory()?;
        let result = match m.grow(Pages(pages as usize)) {
            Ok(Pages(previous)) => previous as u32,
            // Returns -1 (i.e. 0xFFFFFFFF) in case of error.
            Err(_) => u32::MAX,
        };
        context.value_stack.push(RuntimeValue::from(result))?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_const(
        &mut self,
        context: &mut FunctionContext,
        value: RuntimeValue,
    ) -> Result<InstructionOutcome, Trap> {
        context.value_stack.push(value)?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_relop<T, F>(
        &mut self,
        context: &mut FunctionContext,
        f: F,
    ) -> Result<InstructionOutcome, Trap>
    where
        T: FromRuntimeValue,
        F: FnOnce(T, T) -> bool,
    {
        let (left, right) = context.value_stack.pop_pair_as::<T>();
        let result = if f(left, right) {
            RuntimeValue::I32(1)
        } else {
            RuntimeValue::I32(0)
        };
        context.value_stack.push(result)?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_eqz<T>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: FromRuntimeValue + PartialEq<T> + Default,
    {
        let v: T = context.value_stack.pop_as();
        let result = if v == Default::default() {
            RuntimeValue::I32(1)
        } else {
            RuntimeValue::I32(0)
        };
        context.value_stack.push(result)?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_unop<T, U, F>(
        &mut self,
        context: &mut FunctionContext,
        f: F,
    ) -> Result<InstructionOutcome, Trap>
    where
        F: FnOnce(T) -> U,
        T: FromRuntimeValue,
        RuntimeValue: From<U>,
    {
        let v: T = context.value_stack.pop_as();
        context.value_stack.push(f(v).into())?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_clz<T>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: Integer<T> + FromRuntimeValue,
        RuntimeValue: From<T>,
    {
        self.run_unop(context, |v: T| v.leading_zeros())
    }

    fn run_ctz<T>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: Integer<T> + FromRuntimeValue,
        RuntimeValue: From<T>,
    {
        self.run_unop(context, |v: T| v.trailing_zeros())
    }

    fn run_popcnt<T>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: Integer<T> + FromRuntimeValue,
        RuntimeValue: From<T>,
    {
        self.run_unop(context, |v: T| v.count_ones())
    }

    fn run_add<T>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: ArithmeticOps<T> + FromRuntimeValue,
        RuntimeValue: From<T>,
    {
        let (left, right) = context.value_stack.pop_pair_as::<T>();
        context.value_stack.push(left.add(right).into())?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_sub<T>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: ArithmeticOps<T> + FromRuntimeValue,
        RuntimeValue: From<T>,
    {
        let (left, right) = context.value_stack.pop_pair_as::<T>();
        context.value_stack.push(left.sub(right).into())?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_mul<T>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: ArithmeticOps<T> + FromRuntimeValue,
        RuntimeValue: From<T>,
    {
        let (left, right) = context.value_stack.pop_pair_as::<T>();
        context.value_stack.push(left.mul(right).into())?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_div<T, U>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: FromRuntimeValue + TransmuteInto<U>,
        U: ArithmeticOps<U> + TransmuteInto<T>,
        RuntimeValue: From<T>,
    {
        let (left, right) = context.value_stack.pop_pair_as::<T>();
        let (left, right): (U, U) = (left.transmute_into(), right.transmute_into());
        let result = left.div(right)?;
        let result: T = result.transmute_into();
        context.value_stack.push(result.into())?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_rem<T, U>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: FromRuntimeValue + TransmuteInto<U>,
        U: Integer<U> + TransmuteInto<T>,
        RuntimeValue: From<T>,
    {
        let (left, right) = context.value_stack.pop_pair_as::<T>();
        let (left, right): (U, U) = (left.transmute_into(), right.transmute_into());
        let result = left.rem(right)?;
        let result: T = result.transmute_into();
        context.value_stack.push(result.into())?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_and<T>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: ops::BitAnd<T, Output = T> + FromRuntimeValue,
        RuntimeValue: From<T>,
    {
        let (left, right) = context.value_stack.pop_pair_as::<T>();
        context.value_stack.push(left.bitand(right).into())?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_or<T>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: ops::BitOr<T, Output = T> + FromRuntimeValue,
        RuntimeValue: From<T>,
    {
        let (left, right) = context.value_stack.pop_pair_as::<T>();
        context.value_stack.push(left.bitor(right).into())?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_xor<T>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: ops::BitXor<T, Output = T> + FromRuntimeValue,
        RuntimeValue: From<T>,
    {
        let (left, right) = context.value_stack.pop_pair_as::<T>();
        context.value_stack.push(left.bitxor(right).into())?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_shl<T>(
        &mut self,
        context: &mut FunctionContext,
        mask: T,
    ) -> Result<InstructionOutcome, Trap>
    where
        T: ops::Shl<T, Output = T> + ops::BitAnd<T, Output = T> + FromRuntimeValue,
        RuntimeValue: From<T>,
    {
        // The shift amount is taken modulo the bit width.
        let (left, right) = context.value_stack.pop_pair_as::<T>();
        context.value_stack.push((left << (right & mask)).into())?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_shr<T, U>(
        &mut self,
        context: &mut FunctionContext,
        mask: U,
    ) -> Result<InstructionOutcome, Trap>
    where
        T: FromRuntimeValue + TransmuteInto<U>,
        U: ops::Shr<U, Output = U> + ops::BitAnd<U, Output = U> + TransmuteInto<T>,
        RuntimeValue: From<T>,
    {
        let (left, right) = context.value_stack.pop_pair_as::<T>();
        let (left, right): (U, U) = (left.transmute_into(), right.transmute_into());
        let result = left >> (right & mask);
        let result: T = result.transmute_into();
        context.value_stack.push(result.into())?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_rotl<T>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: Integer<T> + FromRuntimeValue,
        RuntimeValue: From<T>,
    {
        let (left, right) = context.value_stack.pop_pair_as::<T>();
        context.value_stack.push(left.rotl(right).into())?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_rotr<T>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: Integer<T> + FromRuntimeValue,
        RuntimeValue: From<T>,
    {
        let (left, right) = context.value_stack.pop_pair_as::<T>();
        context.value_stack.push(left.rotr(right).into())?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_abs<T>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: Float<T> + FromRuntimeValue,
        RuntimeValue: From<T>,
    {
        self.run_unop(context, |v: T| v.abs())
    }

    fn run_neg<T>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: ops::Neg<Output = T> + FromRuntimeValue,
        RuntimeValue: From<T>,
    {
        self.run_unop(context, |v: T| v.neg())
    }

    fn run_ceil<T>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: Float<T> + FromRuntimeValue,
        RuntimeValue: From<T>,
    {
        self.run_unop(context, |v: T| v.ceil())
    }

    fn run_floor<T>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: Float<T> + FromRuntimeValue,
        RuntimeValue: From<T>,
    {
        self.run_unop(context, |v: T| v.floor())
    }

    fn run_trunc<T>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: Float<T> + FromRuntimeValue,
        RuntimeValue: From<T>,
    {
        self.run_unop(context, |v: T| v.trunc())
    }

    fn run_nearest<T>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: Float<T> + FromRuntimeValue,
        RuntimeValue: From<T>,
    {
        self.run_unop(context, |v: T| v.nearest())
    }

    fn run_sqrt<T>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: Float<T> + FromRuntimeValue,
        RuntimeValue: From<T>,
    {
        self.run_unop(context, |v: T| v.sqrt())
    }

    fn run_min<T>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: Float<T> + FromRuntimeValue,
        RuntimeValue: From<T>,
    {
        let (left, right) = context.value_stack.pop_pair_as::<T>();
        context.value_stack.push(left.min(right).into())?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_max<T>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: Float<T> + FromRuntimeValue,
        RuntimeValue: From<T>,
    {
        let (left, right) = context.value_stack.pop_pair_as::<T>();
        context.value_stack.push(left.max(right).into())?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_copysign<T>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: Float<T> + FromRuntimeValue,
        RuntimeValue: From<T>,
    {
        let (left, right) = context.value_stack.pop_pair_as::<T>();
        context.value_stack.push(left.copysign(right).into())?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_wrap<T, U>(&mut self, context: &mut FunctionContext) -> Result<InstructionOutcome, Trap>
    where
        T: WrapInto<U> + FromRuntimeValue,
        RuntimeValue: From<U>,
    {
        self.run_unop(context, |v: T| v.wrap_into())
    }

    fn run_trunc_to_int<T, U, V>(
        &mut self,
        context: &mut FunctionContext,
    ) -> Result<InstructionOutcome, Trap>
    where
        T: TryTruncateInto<U, TrapKind> + FromRuntimeValue,
        U: TransmuteInto<V>,
        RuntimeValue: From<V>,
    {
        let v: T = context.value_stack.pop_as();
        let result: V = v.try_truncate_into()?.transmute_into();
        context.value_stack.push(result.into())?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_extend<T, U, V>(
        &mut self,
        context: &mut FunctionContext,
    ) -> Result<InstructionOutcome, Trap>
    where
        T: ExtendInto<U> + FromRuntimeValue,
        U: TransmuteInto<V>,
        RuntimeValue: From<V>,
    {
        let v: T = context.value_stack.pop_as();
        let result: V = v.extend_into().transmute_into();
        context.value_stack.push(result.into())?;
        Ok(InstructionOutcome::RunNextInstruction)
    }

    fn run_reinterpret<T, U>(
        &mut self,
        context: &mut FunctionContext,
    ) -> Result<InstructionOutcome, Trap>
    where
        T: TransmuteInto<U> + FromRuntimeValue,
        RuntimeValue: From<U>,
    {
        self.run_unop(context, |v: T| v.transmute_into())
    }
}

fn effective_address(offset: u32, base: u32) -> Result<u32, Trap> {
    base.checked_add(offset)
        .ok_or_else(|| TrapKind::MemoryAccessOutOfBounds.into())
}

fn check_alignment(address: u32, log2_align: u32) -> Result<(), Trap> {
    // The declared alignment is `2^log2_align`; it must divide the effective
    // address.
    if u64::from(address) % (1u64 << log2_align.min(63)) != 0 {
        return Err(TrapKind::MisalignedAccess.into());
    }
    Ok(())
}

/// The evaluation stack of one invocation: a bounded LIFO of scalar values.
struct ValueStack {
    values: Vec<RuntimeValue>,
    limit: usize,
}

impl ValueStack {
    fn with_limit(limit: usize) -> ValueStack {
        ValueStack {
            values: Vec::new(),
            limit,
        }
    }

    fn push(&mut self, value: RuntimeValue) -> Result<(), Trap> {
        if self.values.len() == self.limit {
            return Err(TrapKind::StackOverflow.into());
        }
        self.values.push(value);
        Ok(())
    }

    fn pop(&mut self) -> RuntimeValue {
        self.values
            .pop()
            .expect("stack is non-empty when popped on well-formed code; qed")
    }

    fn pop_as<T: FromRuntimeValue>(&mut self) -> T {
        let value = self.pop();
        debug_assert!(
            value.try_into::<T>().is_some(),
            "popped value has the kind the operator expects"
        );
        value
            .try_into()
            .expect("kind of the popped value matches the operator on well-formed code; qed")
    }

    fn pop_pair_as<T: FromRuntimeValue>(&mut self) -> (T, T) {
        let right = self.pop_as();
        let left = self.pop_as();
        (left, right)
    }

    fn pop_args(&mut self, count: usize) -> Vec<RuntimeValue> {
        let split_at = self
            .values
            .len()
            .checked_sub(count)
            .expect("enough values on the stack for the call on well-formed code; qed");
        self.values.split_off(split_at)
    }

    fn top(&self) -> RuntimeValue {
        *self
            .values
            .last()
            .expect("stack is non-empty when peeked on well-formed code; qed")
    }

    fn drain(&mut self) -> Vec<RuntimeValue> {
        self.values.split_off(0)
    }

    fn into_values(self) -> Vec<RuntimeValue> {
        self.values
    }
}

/// Check that the arguments match the parameter list of the signature, in
/// arity and in kind.
pub(crate) fn check_function_args(signature: &Signature, args: &[RuntimeValue]) -> Result<(), Trap> {
    if signature.params().len() != args.len() {
        return Err(TrapKind::UnexpectedSignature.into());
    }

    if signature
        .params()
        .iter()
        .zip(args)
        .any(|(expected_type, param_value)| {
            let actual_type = param_value.value_type();
            &actual_type != expected_type
        })
    {
        return Err(TrapKind::UnexpectedSignature.into());
    }

    Ok(())
}

/// Check that the values an invocation produced match the result list of the
/// signature.
fn check_function_returns(signature: &Signature, returns: &[RuntimeValue]) -> Result<(), Trap> {
    match signature.return_type() {
        Some(expected_type) => {
            if returns.len() != 1 || returns[0].value_type() != expected_type {
                return Err(TrapKind::UnexpectedSignature.into());
            }
        }
        None => {
            if !returns.is_empty() {
                return Err(TrapKind::UnexpectedSignature.into());
            }
        }
    }
    Ok(())
}

/// Evaluate an initializer expression against a partially built module
/// instance.
///
/// Only single-instruction constant expressions are accepted: a constant of
/// one of the four scalar kinds, or a read of an already installed global.
pub(crate) fn eval_init_expr(
    init_expr: &InitExpr,
    module: &ModuleInstance,
) -> Result<RuntimeValue, Error> {
    let code = init_expr.code();
    let instruction = match code {
        [single] => single,
        _ => {
            return Err(Error::Instantiation(
                "initializer expression must consist of a single constant instruction".into(),
            ))
        }
    };

    let value = match *instruction {
        Instruction::I32Const(v) => v.into(),
        Instruction::I64Const(v) => v.into(),
        Instruction::F32Const(v) => RuntimeValue::decode_f32(v),
        Instruction::F64Const(v) => RuntimeValue::decode_f64(v),
        Instruction::GetGlobal(idx) => {
            let global = module.global_by_index(idx).ok_or_else(|| {
                Error::Instantiation(format!(
                    "initializer expression refers to non-existent global {}",
                    idx
                ))
            })?;
            global.get()
        }
        ref other => {
            return Err(Error::Instantiation(format!(
                "non-constant instruction {} in initializer expression",
                other.operator().mnemonic,
            )))
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::{check_function_args, ValueStack, DEFAULT_VALUE_STACK_LIMIT};
    use crate::{RuntimeValue, Signature, ValueType};

    #[test]
    fn value_stack_is_lifo() {
        let mut stack = ValueStack::with_limit(DEFAULT_VALUE_STACK_LIMIT);
        stack.push(RuntimeValue::I32(1)).unwrap();
        stack.push(RuntimeValue::I32(2)).unwrap();
        assert_eq!(stack.pop_as::<i32>(), 2);
        assert_eq!(stack.pop_as::<i32>(), 1);
    }

    #[test]
    fn value_stack_limit_is_enforced() {
        let mut stack = ValueStack::with_limit(2);
        stack.push(RuntimeValue::I32(1)).unwrap();
        stack.push(RuntimeValue::I32(2)).unwrap();
        assert!(stack.push(RuntimeValue::I32(3)).is_err());
    }

    #[test]
    fn pop_args_preserves_declaration_order() {
        let mut stack = ValueStack::with_limit(DEFAULT_VALUE_STACK_LIMIT);
        stack.push(RuntimeValue::I32(1)).unwrap();
        stack.push(RuntimeValue::I32(2)).unwrap();
        stack.push(RuntimeValue::I32(3)).unwrap();
        let args = stack.pop_args(2);
        assert_eq!(args, vec![RuntimeValue::I32(2), RuntimeValue::I32(3)]);
        assert_eq!(stack.pop_as::<i32>(), 1);
    }

    #[test]
    fn function_args_are_checked() {
        let signature = Signature::new(&[ValueType::I32][..], None);
        assert!(check_function_args(&signature, &[RuntimeValue::I32(1)]).is_ok());
        assert!(check_function_args(&signature, &[RuntimeValue::I64(1)]).is_err());
        assert!(check_function_args(&signature, &[]).is_err());
    }
}
