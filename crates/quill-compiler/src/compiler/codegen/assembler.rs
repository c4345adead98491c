//! Pending instruction stream with symbolic jump targets.
//!
//! Code generation appends [`Pending`] items; nothing has an address until
//! [`Assembler::assemble`] runs. Assembly is two passes: the first fixes
//! every instruction's size (frame sizes are substituted first, since they
//! change push widths) and records label addresses, the second fills in the
//! relative jump offsets.

use super::super::bytecode::{Instruction, OpCode, Operand};
use crate::{Error, Result};
use num_bigint::BigInt;
use rustc_hash::FxHashMap;

/// A symbolic jump target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(usize);

/// Identifies a runtime frame whose slot count is known only after its body
/// has been compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub usize);

/// An instruction before addresses are known.
#[derive(Debug, Clone, PartialEq)]
enum Pending {
    Op(OpCode),
    PushData(Vec<u8>),
    PushInt(BigInt),
    Jump(OpCode, Label),
    Syscall(String),
    FrameSize(FrameId),
    Mark(Label),
}

/// Collects instructions and resolves labels.
#[derive(Debug, Default)]
pub struct Assembler {
    pending: Vec<Pending>,
    labels: usize,
    frame_sizes: FxHashMap<FrameId, usize>,
}

impl Assembler {
    /// Creates an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh, unplaced label.
    pub fn new_label(&mut self) -> Label {
        let label = Label(self.labels);
        self.labels += 1;
        label
    }

    /// Places `label` at the next instruction.
    pub fn mark(&mut self, label: Label) {
        self.pending.push(Pending::Mark(label));
    }

    /// Emits an operand-less opcode.
    pub fn op(&mut self, opcode: OpCode) {
        self.pending.push(Pending::Op(opcode));
    }

    /// Emits several operand-less opcodes.
    pub fn ops(&mut self, opcodes: &[OpCode]) {
        for &opcode in opcodes {
            self.op(opcode);
        }
    }

    /// Pushes raw bytes.
    pub fn push_data(&mut self, data: impl Into<Vec<u8>>) {
        self.pending.push(Pending::PushData(data.into()));
    }

    /// Pushes an integer in its shortest form.
    pub fn push_int(&mut self, value: impl Into<BigInt>) {
        self.pending.push(Pending::PushInt(value.into()));
    }

    /// Pushes a raw boolean (1 / 0).
    pub fn push_bool(&mut self, value: bool) {
        self.push_int(if value { 1 } else { 0 });
    }

    /// Pushes a string's bytes.
    pub fn push_string(&mut self, value: &str) {
        self.push_data(value.as_bytes().to_vec());
    }

    /// Emits a jump or call to `target`.
    pub fn jump(&mut self, opcode: OpCode, target: Label) {
        debug_assert!(opcode.is_jump());
        self.pending.push(Pending::Jump(opcode, target));
    }

    /// Emits a SYSCALL.
    pub fn syscall(&mut self, name: &str) {
        self.pending.push(Pending::Syscall(name.to_string()));
    }

    /// Pushes the slot count of `frame`, resolved at assembly.
    pub fn push_frame_size(&mut self, frame: FrameId) {
        self.pending.push(Pending::FrameSize(frame));
    }

    /// Fixes the slot count of `frame`.
    pub fn set_frame_size(&mut self, frame: FrameId, size: usize) {
        self.frame_sizes.insert(frame, size);
    }

    /// Number of pending items, useful for tests.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True when nothing has been emitted.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Resolves addresses and jump offsets.
    pub fn assemble(self) -> Result<Vec<Instruction>> {
        let mut instructions = Vec::with_capacity(self.pending.len());
        let mut jumps = Vec::new();
        let mut addresses: FxHashMap<Label, u32> = FxHashMap::default();
        let mut address: u32 = 0;

        for item in self.pending {
            let instruction = match item {
                Pending::Mark(label) => {
                    addresses.insert(label, address);
                    continue;
                }
                Pending::Op(opcode) => Instruction::simple(address, opcode),
                Pending::PushData(data) => Instruction::push_data(address, data),
                Pending::PushInt(value) => Instruction::push_int(address, &value),
                Pending::FrameSize(frame) => {
                    let size = self.frame_sizes.get(&frame).copied().ok_or_else(|| {
                        Error::Internal(format!("frame {} was never sized", frame.0))
                    })?;
                    Instruction::push_int(address, &BigInt::from(size))
                }
                Pending::Jump(opcode, label) => {
                    jumps.push((instructions.len(), label));
                    Instruction::with_operand(address, opcode, Operand::Offset(0))
                }
                Pending::Syscall(name) => {
                    Instruction::with_operand(address, OpCode::Syscall, Operand::Name(name))
                }
            };
            address += instruction.size() as u32;
            instructions.push(instruction);
        }

        for (index, label) in jumps {
            let from = instructions[index].address;
            let to = *addresses
                .get(&label)
                .ok_or(Error::UnresolvedLabel(label.0))?;
            let offset = i16::try_from(to as i64 - from as i64)
                .map_err(|_| Error::JumpOutOfRange { from, to })?;
            instructions[index].operand = Operand::Offset(offset);
        }

        tracing::trace!(
            "assembled {} instructions, {} bytes",
            instructions.len(),
            address
        );
        Ok(instructions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_and_backward_jumps() {
        let mut asm = Assembler::new();
        let top = asm.new_label();
        let end = asm.new_label();
        asm.mark(top);
        asm.op(OpCode::Push1);
        asm.jump(OpCode::JmpIfNot, end);
        asm.jump(OpCode::Jmp, top);
        asm.mark(end);
        asm.op(OpCode::Ret);

        let instructions = asm.assemble().unwrap();
        assert_eq!(instructions[1].address, 1);
        assert_eq!(instructions[1].operand, Operand::Offset(6));
        assert_eq!(instructions[2].operand, Operand::Offset(-4));
        assert_eq!(instructions[3].address, 7);
    }

    #[test]
    fn test_frame_size_substituted_before_addresses() {
        let mut asm = Assembler::new();
        let end = asm.new_label();
        asm.push_frame_size(FrameId(0));
        asm.jump(OpCode::Jmp, end);
        asm.mark(end);
        asm.op(OpCode::Ret);
        asm.set_frame_size(FrameId(0), 20);

        let instructions = asm.assemble().unwrap();
        assert_eq!(instructions[0].opcode, OpCode::PushBytes(1));
        assert_eq!(instructions[1].address, 2);
        assert_eq!(instructions[1].operand, Operand::Offset(3));
    }

    #[test]
    fn test_unplaced_label_is_an_error() {
        let mut asm = Assembler::new();
        let nowhere = asm.new_label();
        asm.jump(OpCode::Jmp, nowhere);
        assert!(matches!(asm.assemble(), Err(Error::UnresolvedLabel(_))));
    }

    #[test]
    fn test_jump_out_of_range() {
        let mut asm = Assembler::new();
        let end = asm.new_label();
        asm.jump(OpCode::Jmp, end);
        asm.push_data(vec![0u8; 40_000]);
        asm.mark(end);
        assert!(matches!(asm.assemble(), Err(Error::JumpOutOfRange { .. })));
    }
}
