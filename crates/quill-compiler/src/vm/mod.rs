//! A reference interpreter for compiled scripts.
//!
//! Executes AVM bytecode against an in-memory storage area so compiled
//! contracts can be exercised without a node. The evaluation stack and the
//! alt stack are shared across `CALL`s; a `RET` with no caller halts.
//!
//! ## Structure
//!
//! - `stack_item` - machine values and their conversions
//! - `interop` - interop services and item serialization

mod interop;
mod stack_item;

pub use interop::{MAX_ITEM_SIZE, MAX_STORAGE_KEY_SIZE, deserialize, serialize};
pub use stack_item::{ArrayRef, InteropItem, MapRef, StackItem};

use crate::compiler::bytecode::{
    self, DecodeError, Decoded, Instruction, MAX_INTEGER_SIZE, OpCode, Operand, ScriptReader,
};
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Reasons execution faults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    /// The script is malformed
    #[error("malformed script: {0}")]
    Decode(#[from] DecodeError),
    /// An unassigned opcode byte was executed
    #[error("unknown opcode 0x{byte:02x} at {address}")]
    UnknownOpcode {
        /// Offset of the byte
        address: u32,
        /// The byte
        byte: u8,
    },
    /// An opcode this machine does not implement
    #[error("unsupported opcode {0}")]
    UnsupportedOpcode(OpCode),
    /// THROW, or THROWIFNOT on a false value
    #[error("script threw at {address}")]
    Throw {
        /// Offset of the throwing instruction
        address: u32,
    },
    /// Popped from an empty stack
    #[error("stack underflow")]
    StackUnderflow,
    /// Too many items on the stacks
    #[error("stack size exceeds {0}")]
    StackOverflow(usize),
    /// Too many nested calls
    #[error("invocation depth exceeds {0}")]
    CallDepth(usize),
    /// An item of the wrong kind
    #[error("expected {expected}, found {found}")]
    InvalidType {
        /// What the instruction needed
        expected: &'static str,
        /// What it got
        found: &'static str,
    },
    /// An integer wider than the machine allows
    #[error("integer exceeds {MAX_INTEGER_SIZE} bytes")]
    IntegerOverflow,
    /// DIV or MOD by zero
    #[error("division by zero")]
    DivisionByZero,
    /// An index or count outside its container
    #[error("index {0} out of range")]
    IndexOutOfRange(BigInt),
    /// PICKITEM of a missing map key
    #[error("key not found")]
    KeyNotFound,
    /// A jump leaving the script
    #[error("jump from {from} to {target} leaves the script")]
    InvalidJump {
        /// Offset of the jump
        from: u32,
        /// Computed target
        target: i64,
    },
    /// An interop service the host does not offer
    #[error("unknown syscall '{0}'")]
    UnknownSyscall(String),
    /// An item too large to create or store
    #[error("item of {0} bytes is too large")]
    ItemTooLarge(usize),
    /// Bad input to serialization or deserialization
    #[error("serialization failed: {0}")]
    Serialization(String),
    /// The step limit was reached
    #[error("step limit of {0} exceeded")]
    StepLimit(u64),
}

/// Machine limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Instructions executed before giving up
    pub max_steps: u64,
    /// Items on the evaluation and alt stacks together
    pub max_stack_size: usize,
    /// Nested `CALL`s
    pub max_invocation_depth: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            max_stack_size: 2048,
            max_invocation_depth: 1024,
        }
    }
}

/// Where execution continues after an instruction.
enum Flow {
    Next,
    Jump(usize),
    Halt,
}

/// Executes scripts against persistent storage.
///
/// Storage and logs outlive a single invocation, so a contract can be
/// deployed and then called on the same engine.
pub struct ExecutionEngine {
    config: VmConfig,
    stack: Vec<StackItem>,
    alt_stack: Vec<StackItem>,
    /// Return addresses of active `CALL`s
    invocation: Vec<usize>,
    storage: BTreeMap<Vec<u8>, Vec<u8>>,
    logs: Vec<String>,
    steps: u64,
}

impl ExecutionEngine {
    /// Creates an engine with default limits.
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    /// Creates an engine with the given limits.
    pub fn with_config(config: VmConfig) -> Self {
        Self {
            config,
            stack: Vec::new(),
            alt_stack: Vec::new(),
            invocation: Vec::new(),
            storage: BTreeMap::new(),
            logs: Vec::new(),
            steps: 0,
        }
    }

    /// Invokes a contract entry point the way a node does: `params` packed
    /// into an array under the method name.
    pub fn invoke(
        &mut self,
        script: &[u8],
        method: &str,
        params: Vec<StackItem>,
    ) -> Result<Option<StackItem>, VmError> {
        tracing::debug!("invoking '{}' with {} params", method, params.len());
        self.execute(script, vec![StackItem::array(params), StackItem::from(method)])
    }

    /// Runs `script` with `initial` on the evaluation stack (last item on
    /// top) and returns the top item once it halts.
    ///
    /// Storage writes of a run that faults are discarded.
    pub fn execute(
        &mut self,
        script: &[u8],
        initial: Vec<StackItem>,
    ) -> Result<Option<StackItem>, VmError> {
        self.stack = initial;
        self.alt_stack.clear();
        self.invocation.clear();
        self.steps = 0;

        let snapshot = self.storage.clone();
        let result = self.run(script);
        if result.is_err() {
            self.storage = snapshot;
        }
        result
    }

    fn run(&mut self, script: &[u8]) -> Result<Option<StackItem>, VmError> {
        let mut reader = ScriptReader::new(script);
        let mut ip = 0;
        while ip < script.len() {
            self.steps += 1;
            if self.steps > self.config.max_steps {
                return Err(VmError::StepLimit(self.config.max_steps));
            }
            reader.seek(ip);
            let instruction = match bytecode::decode_next(&mut reader)? {
                Decoded::Instruction(instruction) => instruction,
                Decoded::Unknown { address, byte } => {
                    return Err(VmError::UnknownOpcode { address, byte });
                }
            };
            let next = reader.position();
            tracing::trace!("{:04} {}", instruction.address, instruction.opcode);

            let flow = self.step(&instruction, next, script.len()).inspect_err(|e| {
                tracing::debug!("fault at {}: {}", instruction.address, e);
            })?;
            if self.stack.len() + self.alt_stack.len() > self.config.max_stack_size {
                return Err(VmError::StackOverflow(self.config.max_stack_size));
            }
            match flow {
                Flow::Next => ip = next,
                Flow::Jump(target) => ip = target,
                Flow::Halt => break,
            }
        }
        tracing::debug!("halted after {} steps", self.steps);
        Ok(self.stack.pop())
    }

    /// Storage contents, key to value.
    pub fn storage(&self) -> &BTreeMap<Vec<u8>, Vec<u8>> {
        &self.storage
    }

    /// Messages passed to `Neo.Runtime.Log`, oldest first.
    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    /// Instructions executed by the last run.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    fn step(&mut self, instruction: &Instruction, next: usize, script_len: usize) -> Result<Flow, VmError> {
        let address = instruction.address;
        match instruction.opcode {
            OpCode::Push0 => self.push(StackItem::ByteArray(Vec::new())),
            OpCode::PushBytes(_) | OpCode::PushData1 | OpCode::PushData2 | OpCode::PushData4 => {
                let Operand::Data(data) = &instruction.operand else {
                    return Err(VmError::InvalidType {
                        expected: "push data",
                        found: "operand",
                    });
                };
                self.push(StackItem::ByteArray(data.clone()));
            }
            op if op.small_value().is_some() => {
                let value = op.small_value().unwrap_or_default();
                self.push(StackItem::from(value));
            }

            // Flow control
            OpCode::Nop => {}
            OpCode::Jmp => return Ok(Flow::Jump(jump_target(instruction, script_len)?)),
            OpCode::JmpIf | OpCode::JmpIfNot => {
                let condition = self.pop()?.to_bool();
                if condition == (instruction.opcode == OpCode::JmpIf) {
                    return Ok(Flow::Jump(jump_target(instruction, script_len)?));
                }
            }
            OpCode::Call => {
                if self.invocation.len() >= self.config.max_invocation_depth {
                    return Err(VmError::CallDepth(self.config.max_invocation_depth));
                }
                let target = jump_target(instruction, script_len)?;
                self.invocation.push(next);
                return Ok(Flow::Jump(target));
            }
            OpCode::Ret => {
                return Ok(match self.invocation.pop() {
                    Some(return_address) => Flow::Jump(return_address),
                    None => Flow::Halt,
                });
            }
            OpCode::Syscall => {
                let Operand::Name(name) = &instruction.operand else {
                    return Err(VmError::UnknownSyscall(String::new()));
                };
                self.syscall(name)?;
            }

            // Stack
            OpCode::DupFromAltStack => {
                let item = self.alt_stack.last().cloned().ok_or(VmError::StackUnderflow)?;
                self.push(item);
            }
            OpCode::ToAltStack => {
                let item = self.pop()?;
                self.alt_stack.push(item);
            }
            OpCode::FromAltStack => {
                let item = self.alt_stack.pop().ok_or(VmError::StackUnderflow)?;
                self.push(item);
            }
            OpCode::XDrop => {
                let n = self.pop_index()?;
                let at = self.position(n)?;
                self.stack.remove(at);
            }
            OpCode::XSwap => {
                let n = self.pop_index()?;
                let at = self.position(n)?;
                let top = self.position(0)?;
                self.stack.swap(at, top);
            }
            OpCode::XTuck => {
                let n = self.pop_index()?;
                if n == 0 || n > self.stack.len() {
                    return Err(VmError::IndexOutOfRange(BigInt::from(n)));
                }
                let top = self.peek(0)?;
                let at = self.stack.len() - n;
                self.stack.insert(at, top);
            }
            OpCode::Depth => self.push(StackItem::from(self.stack.len() as i64)),
            OpCode::Drop => {
                self.pop()?;
            }
            OpCode::Dup => {
                let top = self.peek(0)?;
                self.push(top);
            }
            OpCode::Nip => {
                let at = self.position(1)?;
                self.stack.remove(at);
            }
            OpCode::Over => {
                let item = self.peek(1)?;
                self.push(item);
            }
            OpCode::Pick => {
                let n = self.pop_index()?;
                let item = self.peek(n)?;
                self.push(item);
            }
            OpCode::Roll => {
                let n = self.pop_index()?;
                let at = self.position(n)?;
                let item = self.stack.remove(at);
                self.push(item);
            }
            OpCode::Rot => {
                let at = self.position(2)?;
                let item = self.stack.remove(at);
                self.push(item);
            }
            OpCode::Swap => {
                let at = self.position(1)?;
                let top = self.position(0)?;
                self.stack.swap(at, top);
            }
            OpCode::Tuck => {
                let at = self.position(1)?;
                let top = self.peek(0)?;
                self.stack.insert(at, top);
            }

            // Splice
            OpCode::Cat => {
                let x2 = self.pop_bytes()?;
                let mut x1 = self.pop_bytes()?;
                if x1.len() + x2.len() > MAX_ITEM_SIZE {
                    return Err(VmError::ItemTooLarge(x1.len() + x2.len()));
                }
                x1.extend_from_slice(&x2);
                self.push(StackItem::ByteArray(x1));
            }
            OpCode::Substr => {
                let count = self.pop_index()?;
                let index = self.pop_index()?;
                let bytes = self.pop_bytes()?;
                let start = index.min(bytes.len());
                let end = start.saturating_add(count).min(bytes.len());
                self.push(StackItem::ByteArray(bytes[start..end].to_vec()));
            }
            OpCode::Left => {
                let count = self.pop_index()?;
                let bytes = self.pop_bytes()?;
                let end = count.min(bytes.len());
                self.push(StackItem::ByteArray(bytes[..end].to_vec()));
            }
            OpCode::Right => {
                let count = self.pop_index()?;
                let bytes = self.pop_bytes()?;
                if count > bytes.len() {
                    return Err(VmError::IndexOutOfRange(BigInt::from(count)));
                }
                self.push(StackItem::ByteArray(bytes[bytes.len() - count..].to_vec()));
            }
            OpCode::Size => {
                let bytes = self.pop_bytes()?;
                self.push(StackItem::from(bytes.len() as i64));
            }

            // Bitwise logic
            OpCode::Invert => self.unary_op(|x| !x)?,
            OpCode::And => self.binary_op(|a, b| Ok(a & b))?,
            OpCode::Or => self.binary_op(|a, b| Ok(a | b))?,
            OpCode::Xor => self.binary_op(|a, b| Ok(a ^ b))?,
            OpCode::Equal => {
                let x2 = self.pop()?;
                let x1 = self.pop()?;
                self.push(StackItem::Boolean(x1.equals(&x2)));
            }

            // Arithmetic
            OpCode::Inc => self.unary_op(|x| x + 1)?,
            OpCode::Dec => self.unary_op(|x| x - 1)?,
            OpCode::Sign => self.unary_op(|x| x.signum())?,
            OpCode::Negate => self.unary_op(|x| -x)?,
            OpCode::Abs => self.unary_op(|x| x.abs())?,
            OpCode::Not => {
                let value = self.pop()?.to_bool();
                self.push(StackItem::Boolean(!value));
            }
            OpCode::Nz => {
                let value = self.pop_integer()?;
                self.push(StackItem::Boolean(!value.is_zero()));
            }
            OpCode::Add => self.binary_op(|a, b| Ok(a + b))?,
            OpCode::Sub => self.binary_op(|a, b| Ok(a - b))?,
            OpCode::Mul => self.binary_op(|a, b| Ok(a * b))?,
            OpCode::Div => self.binary_op(|a, b| {
                if b.is_zero() {
                    return Err(VmError::DivisionByZero);
                }
                Ok(a / b)
            })?,
            OpCode::Mod => self.binary_op(|a, b| {
                if b.is_zero() {
                    return Err(VmError::DivisionByZero);
                }
                Ok(a % b)
            })?,
            OpCode::Shl => self.binary_op(|a, b| Ok(a << shift_amount(&b)?))?,
            OpCode::Shr => self.binary_op(|a, b| Ok(a >> shift_amount(&b)?))?,
            OpCode::BoolAnd | OpCode::BoolOr => {
                let x2 = self.pop()?.to_bool();
                let x1 = self.pop()?.to_bool();
                let result = if instruction.opcode == OpCode::BoolAnd {
                    x1 && x2
                } else {
                    x1 || x2
                };
                self.push(StackItem::Boolean(result));
            }
            OpCode::NumEqual => self.compare_op(|a, b| a == b)?,
            OpCode::NumNotEqual => self.compare_op(|a, b| a != b)?,
            OpCode::Lt => self.compare_op(|a, b| a < b)?,
            OpCode::Gt => self.compare_op(|a, b| a > b)?,
            OpCode::Lte => self.compare_op(|a, b| a <= b)?,
            OpCode::Gte => self.compare_op(|a, b| a >= b)?,
            OpCode::Min => self.binary_op(|a, b| Ok(a.min(b)))?,
            OpCode::Max => self.binary_op(|a, b| Ok(a.max(b)))?,
            OpCode::Within => {
                let upper = self.pop_integer()?;
                let lower = self.pop_integer()?;
                let x = self.pop_integer()?;
                self.push(StackItem::Boolean(lower <= x && x < upper));
            }

            // Arrays and maps
            OpCode::ArraySize => {
                let size = match self.pop()? {
                    StackItem::Array(items) => items.borrow().len(),
                    StackItem::Map(entries) => entries.borrow().len(),
                    other => other.to_bytes()?.len(),
                };
                self.push(StackItem::from(size as i64));
            }
            OpCode::Pack => {
                let count = self.pop_index()?;
                if count > self.stack.len() {
                    return Err(VmError::StackUnderflow);
                }
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.pop()?);
                }
                self.push(StackItem::array(items));
            }
            OpCode::Unpack => {
                let items = self.pop_array()?;
                let items = items.borrow().clone();
                let count = items.len();
                for item in items.into_iter().rev() {
                    self.push(item);
                }
                self.push(StackItem::from(count as i64));
            }
            OpCode::PickItem => {
                let key = self.pop()?;
                let item = match self.pop()? {
                    StackItem::Array(items) => {
                        let index = array_index(&key, items.borrow().len())?;
                        items.borrow()[index].clone()
                    }
                    StackItem::Map(entries) => entries
                        .borrow()
                        .iter()
                        .find(|(k, _)| k.equals(&key))
                        .map(|(_, v)| v.clone())
                        .ok_or(VmError::KeyNotFound)?,
                    other => {
                        return Err(VmError::InvalidType {
                            expected: "array or map",
                            found: other.kind(),
                        });
                    }
                };
                self.push(item);
            }
            OpCode::SetItem => {
                let value = self.pop()?;
                let key = self.pop()?;
                match self.pop()? {
                    StackItem::Array(items) => {
                        let index = array_index(&key, items.borrow().len())?;
                        items.borrow_mut()[index] = value;
                    }
                    StackItem::Map(entries) => {
                        if key.is_container() {
                            return Err(VmError::InvalidType {
                                expected: "primitive map key",
                                found: key.kind(),
                            });
                        }
                        let mut entries = entries.borrow_mut();
                        match entries.iter_mut().find(|(k, _)| k.equals(&key)) {
                            Some(entry) => entry.1 = value,
                            None => entries.push((key, value)),
                        }
                    }
                    other => {
                        return Err(VmError::InvalidType {
                            expected: "array or map",
                            found: other.kind(),
                        });
                    }
                }
            }
            OpCode::NewArray | OpCode::NewStruct => {
                let array = match self.pop()? {
                    StackItem::Array(items) => StackItem::array(items.borrow().clone()),
                    count => {
                        let count = index_value(&count.to_integer()?)?;
                        if count > self.config.max_stack_size {
                            return Err(VmError::ItemTooLarge(count));
                        }
                        StackItem::array(vec![StackItem::Boolean(false); count])
                    }
                };
                self.push(array);
            }
            OpCode::NewMap => self.push(StackItem::map()),
            OpCode::Append => {
                let item = self.pop()?;
                let items = self.pop_array()?;
                items.borrow_mut().push(item);
            }
            OpCode::Reverse => {
                let items = self.pop_array()?;
                items.borrow_mut().reverse();
            }
            OpCode::Remove => {
                let key = self.pop()?;
                match self.pop()? {
                    StackItem::Array(items) => {
                        let index = array_index(&key, items.borrow().len())?;
                        items.borrow_mut().remove(index);
                    }
                    StackItem::Map(entries) => entries.borrow_mut().retain(|(k, _)| !k.equals(&key)),
                    other => {
                        return Err(VmError::InvalidType {
                            expected: "array or map",
                            found: other.kind(),
                        });
                    }
                }
            }
            OpCode::HasKey => {
                let key = self.pop()?;
                let found = match self.pop()? {
                    StackItem::Array(items) => {
                        let index = index_value(&key.to_integer()?)?;
                        index < items.borrow().len()
                    }
                    StackItem::Map(entries) => entries.borrow().iter().any(|(k, _)| k.equals(&key)),
                    other => {
                        return Err(VmError::InvalidType {
                            expected: "array or map",
                            found: other.kind(),
                        });
                    }
                };
                self.push(StackItem::Boolean(found));
            }
            OpCode::Keys | OpCode::Values => {
                let items = match self.pop()? {
                    StackItem::Map(entries) => entries
                        .borrow()
                        .iter()
                        .map(|(k, v)| {
                            if instruction.opcode == OpCode::Keys {
                                k.clone()
                            } else {
                                v.clone()
                            }
                        })
                        .collect(),
                    StackItem::Array(items) if instruction.opcode == OpCode::Values => {
                        items.borrow().clone()
                    }
                    other => {
                        return Err(VmError::InvalidType {
                            expected: "map",
                            found: other.kind(),
                        });
                    }
                };
                self.push(StackItem::array(items));
            }

            // Exceptions
            OpCode::Throw => return Err(VmError::Throw { address }),
            OpCode::ThrowIfNot => {
                if !self.pop()?.to_bool() {
                    return Err(VmError::Throw { address });
                }
            }

            other => return Err(VmError::UnsupportedOpcode(other)),
        }
        Ok(Flow::Next)
    }

    fn push(&mut self, item: StackItem) {
        self.stack.push(item);
    }

    fn pop(&mut self) -> Result<StackItem, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    fn pop_bytes(&mut self) -> Result<Vec<u8>, VmError> {
        self.pop()?.to_bytes()
    }

    fn pop_integer(&mut self) -> Result<BigInt, VmError> {
        self.pop()?.to_integer()
    }

    fn pop_index(&mut self) -> Result<usize, VmError> {
        index_value(&self.pop_integer()?)
    }

    fn pop_array(&mut self) -> Result<ArrayRef, VmError> {
        match self.pop()? {
            StackItem::Array(items) => Ok(items),
            other => Err(VmError::InvalidType {
                expected: "array",
                found: other.kind(),
            }),
        }
    }

    /// Vector position of the item `n` places below the top.
    fn position(&self, n: usize) -> Result<usize, VmError> {
        self.stack
            .len()
            .checked_sub(n + 1)
            .ok_or(VmError::StackUnderflow)
    }

    fn peek(&self, n: usize) -> Result<StackItem, VmError> {
        let at = self.position(n)?;
        Ok(self.stack[at].clone())
    }

    fn push_integer(&mut self, value: BigInt) -> Result<(), VmError> {
        if bytecode::integer_bytes(&value).len() > MAX_INTEGER_SIZE {
            return Err(VmError::IntegerOverflow);
        }
        self.push(StackItem::Integer(value));
        Ok(())
    }

    fn unary_op<F>(&mut self, op: F) -> Result<(), VmError>
    where
        F: Fn(BigInt) -> BigInt,
    {
        let x = self.pop_integer()?;
        self.push_integer(op(x))
    }

    fn binary_op<F>(&mut self, op: F) -> Result<(), VmError>
    where
        F: Fn(BigInt, BigInt) -> Result<BigInt, VmError>,
    {
        let b = self.pop_integer()?;
        let a = self.pop_integer()?;
        let result = op(a, b)?;
        self.push_integer(result)
    }

    fn compare_op<F>(&mut self, op: F) -> Result<(), VmError>
    where
        F: Fn(&BigInt, &BigInt) -> bool,
    {
        let b = self.pop_integer()?;
        let a = self.pop_integer()?;
        self.push(StackItem::Boolean(op(&a, &b)));
        Ok(())
    }
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Absolute target of a jump, which may be the end of the script.
fn jump_target(instruction: &Instruction, script_len: usize) -> Result<usize, VmError> {
    let Operand::Offset(offset) = instruction.operand else {
        return Err(VmError::InvalidJump {
            from: instruction.address,
            target: -1,
        });
    };
    let target = instruction.address as i64 + offset as i64;
    if target < 0 || target > script_len as i64 {
        return Err(VmError::InvalidJump {
            from: instruction.address,
            target,
        });
    }
    Ok(target as usize)
}

fn index_value(value: &BigInt) -> Result<usize, VmError> {
    value
        .to_usize()
        .ok_or_else(|| VmError::IndexOutOfRange(value.clone()))
}

fn array_index(key: &StackItem, len: usize) -> Result<usize, VmError> {
    let value = key.to_integer()?;
    match value.to_usize() {
        Some(index) if index < len => Ok(index),
        _ => Err(VmError::IndexOutOfRange(value)),
    }
}

/// Shift counts are capped at the widest integer the machine holds.
fn shift_amount(value: &BigInt) -> Result<usize, VmError> {
    match value.to_usize() {
        Some(shift) if shift <= MAX_INTEGER_SIZE * 8 => Ok(shift),
        _ => Err(VmError::IndexOutOfRange(value.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::bytecode::encode;

    fn script(instructions: &[(OpCode, Operand)]) -> Vec<u8> {
        let mut address = 0;
        let mut assembled = Vec::new();
        for (opcode, operand) in instructions {
            let instruction = Instruction::with_operand(address, *opcode, operand.clone());
            address += instruction.size() as u32;
            assembled.push(instruction);
        }
        encode(&assembled).unwrap()
    }

    fn ops(opcodes: &[OpCode]) -> Vec<u8> {
        opcodes.iter().map(|op| op.byte()).collect()
    }

    fn run(bytes: &[u8]) -> Result<Option<StackItem>, VmError> {
        ExecutionEngine::new().execute(bytes, Vec::new())
    }

    fn run_int(bytes: &[u8]) -> i64 {
        run(bytes)
            .unwrap()
            .expect("a result")
            .to_integer()
            .unwrap()
            .to_i64()
            .unwrap()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(run_int(&ops(&[OpCode::Push5, OpCode::Push3, OpCode::Sub])), 2);
        assert_eq!(run_int(&ops(&[OpCode::Push7, OpCode::Push2, OpCode::Div])), 3);
        assert_eq!(
            run_int(&ops(&[OpCode::PushM1, OpCode::Push7, OpCode::Mul, OpCode::Push2, OpCode::Mod])),
            -1
        );
        assert_eq!(run_int(&ops(&[OpCode::Push1, OpCode::Push4, OpCode::Shl])), 16);
    }

    #[test]
    fn test_division_by_zero_faults() {
        assert_eq!(
            run(&ops(&[OpCode::Push1, OpCode::Push0, OpCode::Div])),
            Err(VmError::DivisionByZero)
        );
    }

    #[test]
    fn test_stack_shuffles() {
        // [3, 2, 1] top first -> ROT -> [1, 3, 2]
        let rot = ops(&[OpCode::Push1, OpCode::Push2, OpCode::Push3, OpCode::Rot]);
        assert_eq!(run_int(&rot), 1);
        // TUCK copies the top under the second item
        let tuck = ops(&[
            OpCode::Push1,
            OpCode::Push2,
            OpCode::Tuck,
            OpCode::Drop,
            OpCode::Drop,
        ]);
        assert_eq!(run_int(&tuck), 2);
        let pick = ops(&[OpCode::Push9, OpCode::Push1, OpCode::Push2, OpCode::Push2, OpCode::Pick]);
        assert_eq!(run_int(&pick), 9);
    }

    #[test]
    fn test_pack_and_unpack_order() {
        // PACK takes the top item first
        let first = ops(&[
            OpCode::Push1,
            OpCode::Push2,
            OpCode::Push2,
            OpCode::Pack,
            OpCode::Push0,
            OpCode::PickItem,
        ]);
        assert_eq!(run_int(&first), 2);
        // UNPACK then PACK rebuilds the same order
        let rebuilt = ops(&[
            OpCode::Push1,
            OpCode::Push2,
            OpCode::Push2,
            OpCode::Pack,
            OpCode::Unpack,
            OpCode::Pack,
            OpCode::Push1,
            OpCode::PickItem,
        ]);
        assert_eq!(run_int(&rebuilt), 1);
    }

    #[test]
    fn test_arrays_are_shared() {
        // NEWARRAY(1), DUP, set [0] = 5 through the copy, read it back
        let bytes = ops(&[
            OpCode::Push1,
            OpCode::NewArray,
            OpCode::Dup,
            OpCode::Push0,
            OpCode::Push5,
            OpCode::SetItem,
            OpCode::Push0,
            OpCode::PickItem,
        ]);
        assert_eq!(run_int(&bytes), 5);
    }

    #[test]
    fn test_map_operations() {
        let bytes = script(&[
            (OpCode::NewMap, Operand::None),
            (OpCode::Dup, Operand::None),
            (OpCode::PushBytes(1), Operand::Data(b"k".to_vec())),
            (OpCode::Push7, Operand::None),
            (OpCode::SetItem, Operand::None),
            (OpCode::Dup, Operand::None),
            (OpCode::PushBytes(1), Operand::Data(b"k".to_vec())),
            (OpCode::HasKey, Operand::None),
            (OpCode::ThrowIfNot, Operand::None),
            (OpCode::PushBytes(1), Operand::Data(b"k".to_vec())),
            (OpCode::PickItem, Operand::None),
        ]);
        assert_eq!(run_int(&bytes), 7);

        let missing = ops(&[OpCode::NewMap, OpCode::Push1, OpCode::PickItem]);
        assert_eq!(run(&missing), Err(VmError::KeyNotFound));
    }

    #[test]
    fn test_jumps_and_calls() {
        // 0: CALL +4 -> 4; 3: RET (halts); 4: PUSH5; 5: RET (returns to 3)
        let bytes = script(&[
            (OpCode::Call, Operand::Offset(4)),
            (OpCode::Ret, Operand::None),
            (OpCode::Push5, Operand::None),
            (OpCode::Ret, Operand::None),
        ]);
        assert_eq!(run_int(&bytes), 5);

        let out_of_script = script(&[(OpCode::Jmp, Operand::Offset(-1))]);
        assert!(matches!(run(&out_of_script), Err(VmError::InvalidJump { .. })));
    }

    #[test]
    fn test_throw_if_not() {
        assert_eq!(
            run(&ops(&[OpCode::Push0, OpCode::ThrowIfNot])),
            Err(VmError::Throw { address: 1 })
        );
        assert_eq!(run(&ops(&[OpCode::Push1, OpCode::ThrowIfNot])), Ok(None));
    }

    #[test]
    fn test_unknown_and_unsupported_opcodes_fault() {
        assert_eq!(
            run(&[0x50]),
            Err(VmError::UnknownOpcode {
                address: 0,
                byte: 0x50
            })
        );
        assert_eq!(
            run(&ops(&[OpCode::Push1, OpCode::Sha256])),
            Err(VmError::UnsupportedOpcode(OpCode::Sha256))
        );
    }

    #[test]
    fn test_step_limit() {
        let forever = script(&[(OpCode::Jmp, Operand::Offset(0))]);
        let mut engine = ExecutionEngine::with_config(VmConfig {
            max_steps: 100,
            ..VmConfig::default()
        });
        assert_eq!(engine.execute(&forever, Vec::new()), Err(VmError::StepLimit(100)));
    }

    #[test]
    fn test_storage_persists_between_runs() {
        let put = script(&[
            (OpCode::Push5, Operand::None),
            (OpCode::PushBytes(1), Operand::Data(b"k".to_vec())),
            (OpCode::Syscall, Operand::Name("Neo.Storage.GetContext".into())),
            (OpCode::Syscall, Operand::Name("Neo.Storage.Put".into())),
        ]);
        let get = script(&[
            (OpCode::PushBytes(1), Operand::Data(b"k".to_vec())),
            (OpCode::Syscall, Operand::Name("Neo.Storage.GetContext".into())),
            (OpCode::Syscall, Operand::Name("Neo.Storage.Get".into())),
        ]);
        let mut engine = ExecutionEngine::new();
        engine.execute(&put, Vec::new()).unwrap();
        let value = engine.execute(&get, Vec::new()).unwrap().unwrap();
        assert_eq!(value.to_bytes().unwrap(), vec![5]);
        assert_eq!(engine.storage().len(), 1);
    }

    #[test]
    fn test_fault_discards_storage_writes() {
        let bytes = script(&[
            (OpCode::Push5, Operand::None),
            (OpCode::PushBytes(1), Operand::Data(b"k".to_vec())),
            (OpCode::Syscall, Operand::Name("Neo.Storage.GetContext".into())),
            (OpCode::Syscall, Operand::Name("Neo.Storage.Put".into())),
            (OpCode::Throw, Operand::None),
        ]);
        let mut engine = ExecutionEngine::new();
        assert!(matches!(engine.execute(&bytes, Vec::new()), Err(VmError::Throw { .. })));
        assert!(engine.storage().is_empty());
    }

    #[test]
    fn test_log_records_message() {
        let bytes = script(&[
            (OpCode::PushBytes(2), Operand::Data(b"hi".to_vec())),
            (OpCode::Syscall, Operand::Name("Neo.Runtime.Log".into())),
        ]);
        let mut engine = ExecutionEngine::new();
        engine.execute(&bytes, Vec::new()).unwrap();
        assert_eq!(engine.logs().to_vec(), vec!["hi".to_string()]);
    }
}
