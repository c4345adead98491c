//! Bytecode definitions.
//!
//! The instruction set of the target stack machine: one opcode byte followed
//! by an operand whose shape is fixed by the opcode. Integers in operands are
//! little-endian.

use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use std::fmt;
use thiserror::Error;

/// Maximum length of an interop service name.
pub const MAX_SYSCALL_NAME: usize = 252;

/// Maximum size in bytes of an integer the machine operates on.
pub const MAX_INTEGER_SIZE: usize = 32;

macro_rules! opcodes {
    ($($(#[$doc:meta])* $variant:ident = $byte:literal => $name:literal,)*) => {
        /// Operation codes of the target machine.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum OpCode {
            /// Push the next `n` bytes (1..=75)
            PushBytes(u8),
            $($(#[$doc])* $variant,)*
        }

        impl OpCode {
            /// The byte this opcode encodes to.
            pub fn byte(self) -> u8 {
                match self {
                    OpCode::PushBytes(n) => n,
                    $(OpCode::$variant => $byte,)*
                }
            }

            /// Decodes an opcode byte. Unassigned bytes yield `None`.
            pub fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    0x01..=0x4B => Some(OpCode::PushBytes(byte)),
                    $($byte => Some(OpCode::$variant),)*
                    _ => None,
                }
            }

            /// Mnemonic for fixed opcodes.
            fn fixed_name(self) -> Option<&'static str> {
                match self {
                    OpCode::PushBytes(_) => None,
                    $(OpCode::$variant => Some($name),)*
                }
            }
        }
    };
}

opcodes! {
    /// Push an empty byte array (zero / false)
    Push0 = 0x00 => "PUSH0",
    /// Push data with a 1 byte length prefix
    PushData1 = 0x4C => "PUSHDATA1",
    /// Push data with a 2 byte length prefix
    PushData2 = 0x4D => "PUSHDATA2",
    /// Push data with a 4 byte length prefix
    PushData4 = 0x4E => "PUSHDATA4",
    /// Push -1
    PushM1 = 0x4F => "PUSHM1",
    Push1 = 0x51 => "PUSH1",
    Push2 = 0x52 => "PUSH2",
    Push3 = 0x53 => "PUSH3",
    Push4 = 0x54 => "PUSH4",
    Push5 = 0x55 => "PUSH5",
    Push6 = 0x56 => "PUSH6",
    Push7 = 0x57 => "PUSH7",
    Push8 = 0x58 => "PUSH8",
    Push9 = 0x59 => "PUSH9",
    Push10 = 0x5A => "PUSH10",
    Push11 = 0x5B => "PUSH11",
    Push12 = 0x5C => "PUSH12",
    Push13 = 0x5D => "PUSH13",
    Push14 = 0x5E => "PUSH14",
    Push15 = 0x5F => "PUSH15",
    Push16 = 0x60 => "PUSH16",

    // Flow control
    Nop = 0x61 => "NOP",
    Jmp = 0x62 => "JMP",
    JmpIf = 0x63 => "JMPIF",
    JmpIfNot = 0x64 => "JMPIFNOT",
    Call = 0x65 => "CALL",
    Ret = 0x66 => "RET",
    AppCall = 0x67 => "APPCALL",
    Syscall = 0x68 => "SYSCALL",
    TailCall = 0x69 => "TAILCALL",

    // Stack
    DupFromAltStack = 0x6A => "DUPFROMALTSTACK",
    ToAltStack = 0x6B => "TOALTSTACK",
    FromAltStack = 0x6C => "FROMALTSTACK",
    XDrop = 0x6D => "XDROP",
    XSwap = 0x72 => "XSWAP",
    XTuck = 0x73 => "XTUCK",
    Depth = 0x74 => "DEPTH",
    Drop = 0x75 => "DROP",
    Dup = 0x76 => "DUP",
    Nip = 0x77 => "NIP",
    Over = 0x78 => "OVER",
    Pick = 0x79 => "PICK",
    Roll = 0x7A => "ROLL",
    Rot = 0x7B => "ROT",
    Swap = 0x7C => "SWAP",
    Tuck = 0x7D => "TUCK",

    // Splice
    Cat = 0x7E => "CAT",
    Substr = 0x7F => "SUBSTR",
    Left = 0x80 => "LEFT",
    Right = 0x81 => "RIGHT",
    Size = 0x82 => "SIZE",

    // Bitwise logic
    Invert = 0x83 => "INVERT",
    And = 0x84 => "AND",
    Or = 0x85 => "OR",
    Xor = 0x86 => "XOR",
    Equal = 0x87 => "EQUAL",

    // Arithmetic
    Inc = 0x8B => "INC",
    Dec = 0x8C => "DEC",
    Sign = 0x8D => "SIGN",
    Negate = 0x8F => "NEGATE",
    Abs = 0x90 => "ABS",
    Not = 0x91 => "NOT",
    Nz = 0x92 => "NZ",
    Add = 0x93 => "ADD",
    Sub = 0x94 => "SUB",
    Mul = 0x95 => "MUL",
    Div = 0x96 => "DIV",
    Mod = 0x97 => "MOD",
    Shl = 0x98 => "SHL",
    Shr = 0x99 => "SHR",
    BoolAnd = 0x9A => "BOOLAND",
    BoolOr = 0x9B => "BOOLOR",
    NumEqual = 0x9C => "NUMEQUAL",
    NumNotEqual = 0x9E => "NUMNOTEQUAL",
    Lt = 0x9F => "LT",
    Gt = 0xA0 => "GT",
    Lte = 0xA1 => "LTE",
    Gte = 0xA2 => "GTE",
    Min = 0xA3 => "MIN",
    Max = 0xA4 => "MAX",
    Within = 0xA5 => "WITHIN",

    // Crypto
    Sha1 = 0xA7 => "SHA1",
    Sha256 = 0xA8 => "SHA256",
    Hash160 = 0xA9 => "HASH160",
    Hash256 = 0xAA => "HASH256",
    CheckSig = 0xAC => "CHECKSIG",
    Verify = 0xAD => "VERIFY",
    CheckMultiSig = 0xAE => "CHECKMULTISIG",

    // Arrays and maps
    ArraySize = 0xC0 => "ARRAYSIZE",
    Pack = 0xC1 => "PACK",
    Unpack = 0xC2 => "UNPACK",
    PickItem = 0xC3 => "PICKITEM",
    SetItem = 0xC4 => "SETITEM",
    NewArray = 0xC5 => "NEWARRAY",
    NewStruct = 0xC6 => "NEWSTRUCT",
    NewMap = 0xC7 => "NEWMAP",
    Append = 0xC8 => "APPEND",
    Reverse = 0xC9 => "REVERSE",
    Remove = 0xCA => "REMOVE",
    HasKey = 0xCB => "HASKEY",
    Keys = 0xCC => "KEYS",
    Values = 0xCD => "VALUES",

    // Exceptions
    Throw = 0xF0 => "THROW",
    ThrowIfNot = 0xF1 => "THROWIFNOT",
}

/// The operand shape an opcode expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// No operand
    None,
    /// Exactly `n` bytes of push data
    Fixed(usize),
    /// Length-prefixed push data, prefix width in bytes
    Prefixed(usize),
    /// Signed 16-bit offset relative to the instruction start
    Offset,
    /// 20-byte script hash
    Hash,
    /// Variable-length interop name
    Name,
}

impl OpCode {
    /// The operand shape of this opcode.
    pub fn operand_kind(self) -> OperandKind {
        match self {
            OpCode::PushBytes(n) => OperandKind::Fixed(n as usize),
            OpCode::PushData1 => OperandKind::Prefixed(1),
            OpCode::PushData2 => OperandKind::Prefixed(2),
            OpCode::PushData4 => OperandKind::Prefixed(4),
            OpCode::Jmp | OpCode::JmpIf | OpCode::JmpIfNot | OpCode::Call => OperandKind::Offset,
            OpCode::AppCall | OpCode::TailCall => OperandKind::Hash,
            OpCode::Syscall => OperandKind::Name,
            _ => OperandKind::None,
        }
    }

    /// The opcode pushing the small integer `n`, for -1..=16.
    pub fn push_small(n: i64) -> Option<Self> {
        Some(match n {
            -1 => OpCode::PushM1,
            0 => OpCode::Push0,
            1 => OpCode::Push1,
            2 => OpCode::Push2,
            3 => OpCode::Push3,
            4 => OpCode::Push4,
            5 => OpCode::Push5,
            6 => OpCode::Push6,
            7 => OpCode::Push7,
            8 => OpCode::Push8,
            9 => OpCode::Push9,
            10 => OpCode::Push10,
            11 => OpCode::Push11,
            12 => OpCode::Push12,
            13 => OpCode::Push13,
            14 => OpCode::Push14,
            15 => OpCode::Push15,
            16 => OpCode::Push16,
            _ => return None,
        })
    }

    /// The small integer a PUSHM1/PUSH1..PUSH16 opcode pushes.
    pub fn small_value(self) -> Option<i64> {
        match self {
            OpCode::PushM1 => Some(-1),
            _ => {
                let byte = self.byte();
                (0x51..=0x60).contains(&byte).then(|| (byte - 0x50) as i64)
            }
        }
    }

    /// True for the relative jump family (including CALL).
    pub fn is_jump(self) -> bool {
        self.operand_kind() == OperandKind::Offset
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fixed_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "PUSHBYTES{}", self.byte()),
        }
    }
}

/// Instruction operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// No operand
    None,
    /// Push data
    Data(Vec<u8>),
    /// Jump offset
    Offset(i16),
    /// Script hash, in wire order
    Hash([u8; 20]),
    /// Interop service name
    Name(String),
}

/// Errors raised while decoding bytecode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The stream ended inside an operand
    #[error("unexpected end of script at offset {offset}: needed {needed} more byte(s)")]
    UnexpectedEnd {
        /// Offset the read started at
        offset: usize,
        /// Bytes missing
        needed: usize,
    },
    /// A length prefix that is negative when read as signed
    #[error("negative push length {length} at offset {offset}")]
    NegativeLength {
        /// Offset of the prefix
        offset: usize,
        /// The decoded length
        length: i64,
    },
    /// A variable-length field longer than allowed
    #[error("length {length} at offset {offset} exceeds maximum {max}")]
    LengthTooLarge {
        /// Offset of the prefix
        offset: usize,
        /// The decoded length
        length: u64,
        /// The allowed maximum
        max: usize,
    },
}

/// Errors raised while encoding instructions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// The operand does not match the opcode's shape
    #[error("operand {operand:?} does not fit opcode {opcode}")]
    OperandMismatch {
        /// The opcode
        opcode: OpCode,
        /// The offending operand
        operand: Operand,
    },
    /// Interop name too long
    #[error("syscall name of {0} bytes exceeds {MAX_SYSCALL_NAME}")]
    NameTooLong(usize),
}

/// A single decoded or assembled instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Byte offset of the opcode within the script
    pub address: u32,
    /// The operation code
    pub opcode: OpCode,
    /// Operand, shaped per the opcode
    pub operand: Operand,
}

impl Instruction {
    /// Creates an instruction with no operand.
    pub fn simple(address: u32, opcode: OpCode) -> Self {
        Self {
            address,
            opcode,
            operand: Operand::None,
        }
    }

    /// Creates an instruction with an operand.
    pub fn with_operand(address: u32, opcode: OpCode, operand: Operand) -> Self {
        Self {
            address,
            opcode,
            operand,
        }
    }

    /// The shortest instruction pushing `data`.
    pub fn push_data(address: u32, data: Vec<u8>) -> Self {
        let opcode = match data.len() {
            0 => OpCode::Push0,
            n @ 1..=0x4B => OpCode::PushBytes(n as u8),
            n if n <= 0xFF => OpCode::PushData1,
            n if n <= 0xFFFF => OpCode::PushData2,
            _ => OpCode::PushData4,
        };
        if opcode == OpCode::Push0 {
            return Self::simple(address, opcode);
        }
        Self::with_operand(address, opcode, Operand::Data(data))
    }

    /// The shortest instruction pushing the integer `value`.
    pub fn push_int(address: u32, value: &BigInt) -> Self {
        if let Some(opcode) = value.to_i64().and_then(OpCode::push_small) {
            return Self::simple(address, opcode);
        }
        Self::push_data(address, integer_bytes(value))
    }

    /// Encoded size in bytes.
    pub fn size(&self) -> usize {
        1 + match (&self.operand, self.opcode.operand_kind()) {
            (Operand::Data(data), OperandKind::Prefixed(width)) => width + data.len(),
            (Operand::Data(data), _) => data.len(),
            (Operand::Offset(_), _) => 2,
            (Operand::Hash(_), _) => 20,
            (Operand::Name(name), _) => 1 + name.len(),
            (Operand::None, _) => 0,
        }
    }

    /// Appends the encoded instruction to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        let mismatch = || EncodeError::OperandMismatch {
            opcode: self.opcode,
            operand: self.operand.clone(),
        };
        out.push(self.opcode.byte());
        match (self.opcode.operand_kind(), &self.operand) {
            (OperandKind::None, Operand::None) => {}
            (OperandKind::Fixed(n), Operand::Data(data)) if data.len() == n => {
                out.extend_from_slice(data);
            }
            (OperandKind::Prefixed(width), Operand::Data(data)) => {
                let len = data.len() as u64;
                if width < 8 && len >= 1u64 << (width * 8) {
                    return Err(mismatch());
                }
                out.extend_from_slice(&len.to_le_bytes()[..width]);
                out.extend_from_slice(data);
            }
            (OperandKind::Offset, Operand::Offset(offset)) => {
                out.extend_from_slice(&offset.to_le_bytes());
            }
            (OperandKind::Hash, Operand::Hash(hash)) => out.extend_from_slice(hash),
            (OperandKind::Name, Operand::Name(name)) => {
                if name.len() > MAX_SYSCALL_NAME {
                    return Err(EncodeError::NameTooLong(name.len()));
                }
                out.push(name.len() as u8);
                out.extend_from_slice(name.as_bytes());
            }
            _ => return Err(mismatch()),
        }
        Ok(())
    }
}

/// Encodes a sequence of instructions into a script.
pub fn encode(instructions: &[Instruction]) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::with_capacity(instructions.iter().map(Instruction::size).sum());
    for instruction in instructions {
        instruction.encode(&mut out)?;
    }
    Ok(out)
}

/// Minimal little-endian two's complement bytes of an integer; zero is empty.
pub fn integer_bytes(value: &BigInt) -> Vec<u8> {
    if value.is_zero() {
        return Vec::new();
    }
    value.to_signed_bytes_le()
}

/// Integer value of little-endian two's complement bytes.
pub fn integer_from_bytes(bytes: &[u8]) -> BigInt {
    if bytes.is_empty() {
        return BigInt::zero();
    }
    BigInt::from_signed_bytes_le(bytes)
}

/// True when the integer fits the machine's 32-byte integer limit.
pub fn integer_in_range(value: &BigInt) -> bool {
    integer_bytes(value).len() <= MAX_INTEGER_SIZE
}

/// Byte cursor over a script.
#[derive(Debug, Clone)]
pub struct ScriptReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> ScriptReader<'a> {
    /// Creates a reader at offset 0.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    /// Current offset.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Moves the cursor.
    pub fn seek(&mut self, position: usize) {
        self.position = position.min(self.bytes.len());
    }

    /// True once every byte has been consumed.
    pub fn is_at_end(&self) -> bool {
        self.position >= self.bytes.len()
    }

    /// Reads `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let available = self.bytes.len() - self.position;
        if n > available {
            return Err(DecodeError::UnexpectedEnd {
                offset: self.position,
                needed: n - available,
            });
        }
        let slice = &self.bytes[self.position..self.position + n];
        self.position += n;
        Ok(slice)
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Reads a little-endian u16.
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a little-endian i16.
    pub fn read_i16(&mut self) -> Result<i16, DecodeError> {
        let bytes = self.read_bytes(2)?;
        Ok(i16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a little-endian i32.
    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        let bytes = self.read_bytes(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a variable-length integer (1, 3, 5 or 9 bytes).
    pub fn read_var_int(&mut self) -> Result<u64, DecodeError> {
        Ok(match self.read_u8()? {
            0xFD => self.read_u16()? as u64,
            0xFE => {
                let bytes = self.read_bytes(4)?;
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64
            }
            0xFF => {
                let bytes = self.read_bytes(8)?;
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                u64::from_le_bytes(buf)
            }
            n => n as u64,
        })
    }

    /// Reads variable-length bytes of at most `max` bytes.
    pub fn read_var_bytes(&mut self, max: usize) -> Result<&'a [u8], DecodeError> {
        let offset = self.position;
        let length = self.read_var_int()?;
        if length > max as u64 {
            return Err(DecodeError::LengthTooLarge { offset, length, max });
        }
        self.read_bytes(length as usize)
    }
}

/// One step of decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A well-formed instruction
    Instruction(Instruction),
    /// An unassigned opcode byte (no operand consumed)
    Unknown {
        /// Offset of the byte
        address: u32,
        /// The byte
        byte: u8,
    },
}

/// Decodes the instruction at the reader's position.
pub fn decode_next(reader: &mut ScriptReader<'_>) -> Result<Decoded, DecodeError> {
    let address = reader.position() as u32;
    let byte = reader.read_u8()?;
    let Some(opcode) = OpCode::from_byte(byte) else {
        return Ok(Decoded::Unknown { address, byte });
    };
    let operand = match opcode.operand_kind() {
        OperandKind::None => Operand::None,
        OperandKind::Fixed(n) => Operand::Data(reader.read_bytes(n)?.to_vec()),
        OperandKind::Prefixed(width) => {
            let offset = reader.position();
            let length = match width {
                1 => reader.read_u8()? as i64,
                2 => reader.read_u16()? as i64,
                _ => reader.read_i32()? as i64,
            };
            if length < 0 {
                return Err(DecodeError::NegativeLength { offset, length });
            }
            Operand::Data(reader.read_bytes(length as usize)?.to_vec())
        }
        OperandKind::Offset => Operand::Offset(reader.read_i16()?),
        OperandKind::Hash => {
            let mut hash = [0u8; 20];
            hash.copy_from_slice(reader.read_bytes(20)?);
            Operand::Hash(hash)
        }
        OperandKind::Name => {
            let bytes = reader.read_var_bytes(MAX_SYSCALL_NAME)?;
            Operand::Name(bytes.iter().map(|&b| b as char).collect())
        }
    };
    Ok(Decoded::Instruction(Instruction::with_operand(
        address, opcode, operand,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_bytes_round_trip() {
        for byte in 0u8..=0xFF {
            if let Some(opcode) = OpCode::from_byte(byte) {
                assert_eq!(opcode.byte(), byte);
            }
        }
        assert_eq!(OpCode::from_byte(0x50), None);
        assert_eq!(OpCode::from_byte(0xFF), None);
    }

    #[test]
    fn test_mnemonics() {
        assert_eq!(OpCode::PushBytes(3).to_string(), "PUSHBYTES3");
        assert_eq!(OpCode::DupFromAltStack.to_string(), "DUPFROMALTSTACK");
        assert_eq!(OpCode::ThrowIfNot.to_string(), "THROWIFNOT");
    }

    #[test]
    fn test_push_int_picks_shortest_form() {
        assert_eq!(Instruction::push_int(0, &BigInt::from(0)).opcode, OpCode::Push0);
        assert_eq!(Instruction::push_int(0, &BigInt::from(-1)).opcode, OpCode::PushM1);
        assert_eq!(Instruction::push_int(0, &BigInt::from(16)).opcode, OpCode::Push16);

        let seventeen = Instruction::push_int(0, &BigInt::from(17));
        assert_eq!(seventeen.opcode, OpCode::PushBytes(1));
        assert_eq!(seventeen.operand, Operand::Data(vec![17]));

        let big = Instruction::push_int(0, &BigInt::from(128));
        assert_eq!(big.operand, Operand::Data(vec![0x80, 0x00]));
    }

    #[test]
    fn test_push_data_prefix_selection() {
        assert_eq!(Instruction::push_data(0, vec![1; 75]).opcode, OpCode::PushBytes(75));
        assert_eq!(Instruction::push_data(0, vec![1; 76]).opcode, OpCode::PushData1);
        assert_eq!(Instruction::push_data(0, vec![1; 256]).opcode, OpCode::PushData2);
    }

    #[test]
    fn test_encode_jump_little_endian() {
        let jump = Instruction::with_operand(0, OpCode::Jmp, Operand::Offset(-3));
        let mut out = Vec::new();
        jump.encode(&mut out).unwrap();
        assert_eq!(out, vec![0x62, 0xFD, 0xFF]);
        assert_eq!(jump.size(), 3);
    }

    #[test]
    fn test_encode_rejects_mismatched_operand() {
        let bad = Instruction::with_operand(0, OpCode::Add, Operand::Offset(1));
        assert!(bad.encode(&mut Vec::new()).is_err());
    }

    #[test]
    fn test_decode_syscall_name() {
        let mut script = vec![0x68, 4];
        script.extend_from_slice(b"Test");
        let mut reader = ScriptReader::new(&script);
        let decoded = decode_next(&mut reader).unwrap();
        assert_eq!(
            decoded,
            Decoded::Instruction(Instruction::with_operand(
                0,
                OpCode::Syscall,
                Operand::Name("Test".into())
            ))
        );
    }

    #[test]
    fn test_decode_negative_pushdata4() {
        let script = [0x4E, 0xFF, 0xFF, 0xFF, 0xFF];
        let mut reader = ScriptReader::new(&script);
        assert!(matches!(
            decode_next(&mut reader),
            Err(DecodeError::NegativeLength { length: -1, .. })
        ));
    }
}
