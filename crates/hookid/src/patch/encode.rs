//! x86 relative branch encodings
//!
//! All arithmetic is modulo 2^32: the displacement is the wrapped difference
//! between the target and the end of the instruction, which is exactly what
//! the CPU adds back when it executes the branch.

use strum::{Display, EnumString, IntoStaticStr};

pub const OPCODE_CALL_REL32: u8 = 0xE8;
pub const OPCODE_JMP_REL32: u8 = 0xE9;
pub const OPCODE_TWO_BYTE: u8 = 0x0F;
pub const OPCODE_NOP: u8 = 0x90;

/// `E8/E9 rel32`
pub const REL_BRANCH_LEN: usize = 5;
/// `0F 8x rel32`
pub const REL_JCC_LEN: usize = 6;

/// Conditions for the near `Jcc rel32` form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Condition {
    Jz,
    Jnz,
    Jle,
    Jg,
}

impl Condition {
    /// Second opcode byte after `0F`
    pub fn opcode(self) -> u8 {
        match self {
            Condition::Jz => 0x84,
            Condition::Jnz => 0x85,
            Condition::Jle => 0x8E,
            Condition::Jg => 0x8F,
        }
    }
}

/// Displacement for an instruction of `len` bytes at `source` reaching `target`
pub fn rel32(source: u32, len: u32, target: u32) -> u32 {
    target.wrapping_sub(source.wrapping_add(len))
}

pub fn encode_rel_jump(source: u32, target: u32) -> [u8; REL_BRANCH_LEN] {
    encode_rel_branch(OPCODE_JMP_REL32, source, target)
}

pub fn encode_rel_call(source: u32, target: u32) -> [u8; REL_BRANCH_LEN] {
    encode_rel_branch(OPCODE_CALL_REL32, source, target)
}

fn encode_rel_branch(opcode: u8, source: u32, target: u32) -> [u8; REL_BRANCH_LEN] {
    let disp = rel32(source, REL_BRANCH_LEN as u32, target).to_le_bytes();
    [opcode, disp[0], disp[1], disp[2], disp[3]]
}

pub fn encode_rel_jcc(condition: Condition, source: u32, target: u32) -> [u8; REL_JCC_LEN] {
    let disp = rel32(source, REL_JCC_LEN as u32, target).to_le_bytes();
    [
        OPCODE_TWO_BYTE,
        condition.opcode(),
        disp[0],
        disp[1],
        disp[2],
        disp[3],
    ]
}

pub fn nop_fill(len: usize) -> Vec<u8> {
    vec![OPCODE_NOP; len]
}

/// Any of the branch forms above
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Jump,
    Call,
    Conditional(Condition),
}

impl Branch {
    pub fn instruction_len(self) -> usize {
        match self {
            Branch::Jump | Branch::Call => REL_BRANCH_LEN,
            Branch::Conditional(_) => REL_JCC_LEN,
        }
    }

    pub fn encode(self, source: u32, target: u32) -> Vec<u8> {
        match self {
            Branch::Jump => encode_rel_jump(source, target).to_vec(),
            Branch::Call => encode_rel_call(source, target).to_vec(),
            Branch::Conditional(condition) => encode_rel_jcc(condition, source, target).to_vec(),
        }
    }
}

impl std::str::FromStr for Branch {
    type Err = strum::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jmp" | "jump" => Ok(Branch::Jump),
            "call" => Ok(Branch::Call),
            other => other.parse().map(Branch::Conditional),
        }
    }
}
