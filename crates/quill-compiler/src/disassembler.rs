//! Bytecode disassembler.
//!
//! Turns a script back into a listing, one line per instruction:
//!
//! ```text
//! 0000:PUSHBYTES3 0x010203
//! 0004:JMP 3
//! 0007:SYSCALL Neo.Storage.GetContext
//! ```
//!
//! Unassigned opcode bytes are listed as `UNKNOWN` and decoding resumes at
//! the next byte; an operand running past the end of the script is an error.

use crate::compiler::bytecode::{self, DecodeError, Decoded, Operand, ScriptReader};
use std::fmt;

/// One line of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisassembledInstruction {
    /// Byte offset of the opcode
    pub pc: u32,
    /// Opcode mnemonic, or `UNKNOWN`
    pub mnemonic: String,
    /// Rendered operand
    pub operand: Option<String>,
}

impl fmt::Display for DisassembledInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}:{}", self.pc, self.mnemonic)?;
        if let Some(operand) = &self.operand {
            write!(f, " {}", operand)?;
        }
        Ok(())
    }
}

/// Renders an operand the way listings show it.
pub fn format_operand(operand: &Operand) -> Option<String> {
    match operand {
        Operand::None => None,
        Operand::Data(data) => Some(format!("0x{}", hex::encode(data))),
        Operand::Offset(offset) => Some(offset.to_string()),
        Operand::Hash(hash) => {
            let mut reversed = *hash;
            reversed.reverse();
            Some(format!("0x{}", hex::encode(reversed)))
        }
        Operand::Name(name) => Some(name.clone()),
    }
}

/// Decodes a whole script.
pub fn disassemble(bytes: &[u8]) -> Result<Vec<DisassembledInstruction>, DecodeError> {
    let mut reader = ScriptReader::new(bytes);
    let mut listing = Vec::new();
    while !reader.is_at_end() {
        let line = match bytecode::decode_next(&mut reader)? {
            Decoded::Instruction(instruction) => DisassembledInstruction {
                pc: instruction.address,
                mnemonic: instruction.opcode.to_string(),
                operand: format_operand(&instruction.operand),
            },
            Decoded::Unknown { address, byte } => {
                tracing::trace!("unknown opcode 0x{:02x} at {}", byte, address);
                DisassembledInstruction {
                    pc: address,
                    mnemonic: "UNKNOWN".to_string(),
                    operand: None,
                }
            }
        };
        listing.push(line);
    }
    Ok(listing)
}

/// Decodes a script into newline separated text.
pub fn listing(bytes: &[u8]) -> Result<String, DecodeError> {
    let lines = disassemble(bytes)?;
    Ok(lines
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::bytecode::{encode, Instruction, OpCode};

    fn lines(bytes: &[u8]) -> Vec<String> {
        disassemble(bytes)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_pushbytes_operand_is_hex() {
        assert_eq!(lines(&[0x03, 0x01, 0x02, 0x03]), vec!["0000:PUSHBYTES3 0x010203"]);
    }

    #[test]
    fn test_appcall_hash_is_reversed() {
        let mut script = vec![0x67];
        script.extend(0u8..20);
        assert_eq!(
            lines(&script),
            vec!["0000:APPCALL 0x131211100f0e0d0c0b0a09080706050403020100"]
        );
    }

    #[test]
    fn test_jump_offsets_are_signed_decimal() {
        let script = [0x62, 0x03, 0x00, 0x64, 0xFD, 0xFF];
        assert_eq!(lines(&script), vec!["0000:JMP 3", "0003:JMPIFNOT -3"]);
    }

    #[test]
    fn test_syscall_name_and_offsets() {
        let mut script = vec![0x00, 0x68, 22];
        script.extend_from_slice(b"Neo.Storage.GetContext");
        script.push(0x66);
        assert_eq!(
            lines(&script),
            vec!["0000:PUSH0", "0001:SYSCALL Neo.Storage.GetContext", "0025:RET"]
        );
    }

    #[test]
    fn test_pushdata_prefixes() {
        let mut script = vec![0x4C, 0x02, 0xAB, 0xCD, 0x4D, 0x01, 0x00, 0xEF];
        script.extend_from_slice(&[0x4E, 0x01, 0x00, 0x00, 0x00, 0x42]);
        assert_eq!(
            lines(&script),
            vec!["0000:PUSHDATA1 0xabcd", "0004:PUSHDATA2 0xef", "0008:PUSHDATA4 0x42"]
        );
    }

    #[test]
    fn test_unknown_opcode_continues() {
        assert_eq!(lines(&[0x50, 0x51]), vec!["0000:UNKNOWN", "0001:PUSH1"]);
    }

    #[test]
    fn test_truncated_operand_fails() {
        assert!(matches!(
            disassemble(&[0x05, 0x01, 0x02]),
            Err(DecodeError::UnexpectedEnd { needed: 3, .. })
        ));
        assert!(disassemble(&[0x62, 0x01]).is_err());
        assert!(disassemble(&[0x67, 0x00]).is_err());
    }

    #[test]
    fn test_encoded_instructions_disassemble_to_intended_text() {
        let instructions = vec![
            Instruction::push_data(0, vec![0xDE, 0xAD]),
            Instruction::with_operand(3, OpCode::Call, Operand::Offset(5)),
            Instruction::with_operand(6, OpCode::Syscall, Operand::Name("Neo.Runtime.Log".into())),
            Instruction::with_operand(23, OpCode::TailCall, Operand::Hash([0xAA; 20])),
            Instruction::simple(44, OpCode::Ret),
        ];
        let script = encode(&instructions).unwrap();
        assert_eq!(
            lines(&script),
            vec![
                "0000:PUSHBYTES2 0xdead",
                "0003:CALL 5",
                "0006:SYSCALL Neo.Runtime.Log",
                "0023:TAILCALL 0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
                "0044:RET",
            ]
        );
    }
}
