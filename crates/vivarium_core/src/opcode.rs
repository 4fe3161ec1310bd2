//! Opcode set, byte-range classes, and the instruction-size function.
//!
//! Every byte decodes by its high bits into one of five classes with a
//! fixed width per class (the `0xE0` class carries an explicit length
//! byte). All genome surgery (crossover, mutation, memetic overwrite)
//! goes through `opcode_size` so edits only ever land on instruction
//! boundaries.

use rand::Rng;

// One-byte commands, 0x00..=0x1F.
pub const OP_NOP: u8 = 0x00;
pub const OP_DUP: u8 = 0x01;
pub const OP_DROP: u8 = 0x02;
pub const OP_SWAP: u8 = 0x03;
pub const OP_OVER: u8 = 0x04;
pub const OP_ROT: u8 = 0x05;
pub const OP_ADD: u8 = 0x06;
pub const OP_SUB: u8 = 0x07;
pub const OP_MUL: u8 = 0x08;
pub const OP_DIV: u8 = 0x09;
pub const OP_MOD: u8 = 0x0A;
pub const OP_EQ: u8 = 0x0B;
pub const OP_LT: u8 = 0x0C;
pub const OP_GT: u8 = 0x0D;
pub const OP_AND: u8 = 0x0E;
pub const OP_OR: u8 = 0x0F;
pub const OP_NOT: u8 = 0x10;
pub const OP_NEG: u8 = 0x11;
pub const OP_EXEC: u8 = 0x12;
pub const OP_IFTE: u8 = 0x13;
pub const OP_DIP: u8 = 0x14;
pub const OP_LOOP: u8 = 0x15;
pub const OP_RET: u8 = 0x16;
pub const OP_LOAD: u8 = 0x17;
pub const OP_STORE: u8 = 0x18;
pub const OP_PRINT: u8 = 0x19;
pub const OP_INC: u8 = 0x1A;
pub const OP_DEC: u8 = 0x1B;
pub const OP_DUP2: u8 = 0x1C;
pub const OP_PICK_RSV: u8 = 0x1D;
pub const OP_DEPTH: u8 = 0x1E;
pub const OP_CLEAR: u8 = 0x1F;

// Two-byte operand ops, 0x80..=0xBF.
pub const OP_PUSH_B: u8 = 0x80;
pub const OP_EXT_SYM: u8 = 0x81;
pub const OP_EXT_QUOT: u8 = 0x82;
pub const OP_LOCAL_GET: u8 = 0x83;
pub const OP_LOCAL_SET: u8 = 0x84;
pub const OP_JMP_FWD: u8 = 0x85;
pub const OP_JMP_BACK: u8 = 0x86;
pub const OP_JZ_FWD: u8 = 0x87;
pub const OP_JNZ_FWD: u8 = 0x88;
pub const OP_BUILTIN: u8 = 0x89;
pub const OP_R0_READ: u8 = 0x8A;
pub const OP_R1_READ: u8 = 0x8B;
pub const OP_R1_WRITE: u8 = 0x8C;
pub const OP_INSPECT: u8 = 0x8D;
pub const OP_GAS: u8 = 0x8E;
pub const OP_PICK_N: u8 = 0x8F;
pub const OP_ROLL_N: u8 = 0x90;
pub const OP_LOOP_N: u8 = 0x91;
pub const OP_STR_SHORT: u8 = 0x92;

// Three-byte operand ops, 0xC0..=0xDF.
pub const OP_PUSH_W: u8 = 0xC0;
pub const OP_EXT_SYM16: u8 = 0xC1;
pub const OP_EXT_QUOT16: u8 = 0xC2;
pub const OP_JMP_FAR: u8 = 0xC3;
pub const OP_JZ_FAR: u8 = 0xC4;
pub const OP_CALL_FAR: u8 = 0xC5;

// Variable-length ops, 0xE0..=0xEF: one length byte then `len` data bytes.
pub const OP_STRING: u8 = 0xE0;
pub const OP_BYTES: u8 = 0xE1;
pub const OP_VECTOR: u8 = 0xE2;
pub const OP_QUOT_BODY: u8 = 0xE3;

// Specials, 0xF0..=0xFF.
pub const OP_HALT: u8 = 0xF0;
pub const OP_YIELD: u8 = 0xF1;
pub const OP_BREAK: u8 = 0xF2;
pub const OP_DEBUG: u8 = 0xF3;
pub const OP_ERROR: u8 = 0xF4;
pub const OP_CLEAR_ERR: u8 = 0xF5;
pub const OP_CHECK_ERR: u8 = 0xF6;
pub const OP_EXTEND: u8 = 0xF7;
pub const OP_END: u8 = 0xF8;

/// Canonical mnemonics for the one-byte command range, indexed by opcode.
pub const COMMAND_MNEMONICS: [&str; 32] = [
    "nop", "dup", "drop", "swap", "over", "rot", "+", "-", "*", "/", "mod",
    "=", "<", ">", "and", "or", "not", "neg", "exec", "ifte", "dip", "loop",
    "ret", "load", "store", "print", "inc", "dec", "dup2", "pick", "depth",
    "clear",
];

/// Decoded class of a single opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    /// `0x00..=0x1F`, width 1.
    Command,
    /// `0x20..=0x3F`, width 1: push `opcode - 0x20`.
    SmallLiteral,
    /// `0x40..=0x5F`, width 1: push symbol slot `opcode - 0x40`.
    SymbolRef,
    /// `0x60..=0x7F`, width 1: push quotation ref `opcode - 0x60`.
    QuotationRef,
    /// `0x80..=0xBF`, width 2.
    TwoByte,
    /// `0xC0..=0xDF`, width 3.
    ThreeByte,
    /// `0xE0..=0xEF`, width `2 + len`.
    Variable,
    /// `0xF0..=0xFF`, width 1.
    Special,
}

#[must_use]
pub fn classify(op: u8) -> OpClass {
    match op {
        0x00..=0x1F => OpClass::Command,
        0x20..=0x3F => OpClass::SmallLiteral,
        0x40..=0x5F => OpClass::SymbolRef,
        0x60..=0x7F => OpClass::QuotationRef,
        0x80..=0xBF => OpClass::TwoByte,
        0xC0..=0xDF => OpClass::ThreeByte,
        0xE0..=0xEF => OpClass::Variable,
        0xF0..=0xFF => OpClass::Special,
    }
}

/// Byte width of the instruction starting at `pos`, reading nothing past
/// the end of the buffer. `None` when `pos` is out of bounds or a
/// variable-length instruction is missing its length byte.
#[must_use]
pub fn opcode_size(buf: &[u8], pos: usize) -> Option<usize> {
    let op = *buf.get(pos)?;
    match classify(op) {
        OpClass::Command
        | OpClass::SmallLiteral
        | OpClass::SymbolRef
        | OpClass::QuotationRef
        | OpClass::Special => Some(1),
        OpClass::TwoByte => Some(2),
        OpClass::ThreeByte => Some(3),
        OpClass::Variable => buf.get(pos + 1).map(|&len| 2 + len as usize),
    }
}

/// A genome is well-formed when a linear walk with `opcode_size` lands
/// exactly on the end of the buffer.
#[must_use]
pub fn is_well_formed(buf: &[u8]) -> bool {
    let mut pos = 0;
    while pos < buf.len() {
        match opcode_size(buf, pos) {
            Some(size) if pos + size <= buf.len() => pos += size,
            _ => return false,
        }
    }
    pos == buf.len()
}

/// Instruction start positions of a well-formed prefix of `buf`. For a
/// well-formed buffer this enumerates every instruction; the walk stops at
/// the first malformed position.
#[must_use]
pub fn boundaries(buf: &[u8]) -> Vec<usize> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < buf.len() {
        match opcode_size(buf, pos) {
            Some(size) if pos + size <= buf.len() => {
                out.push(pos);
                pos += size;
            }
            _ => break,
        }
    }
    out
}

/// Weighted random instruction used for genome emission and mutation:
/// 30% generic command, 30% small literal, 15% ring op (`r0@`/`r1!`,
/// slot 0..31), 10% inline symbol, 10% one of the first eight inline
/// quotation refs, 5% special (`halt` or `yield`).
pub fn random_instruction<R: Rng>(rng: &mut R) -> Vec<u8> {
    let roll = rng.gen_range(0..100u32);
    match roll {
        0..=29 => vec![rng.gen_range(0x00..=0x1Fu8)],
        30..=59 => vec![0x20 + rng.gen_range(0..32u8)],
        60..=74 => {
            let op = if rng.gen_bool(0.5) { OP_R0_READ } else { OP_R1_WRITE };
            vec![op, rng.gen_range(0..32u8)]
        }
        75..=84 => vec![0x40 + rng.gen_range(0..32u8)],
        85..=94 => vec![0x60 + rng.gen_range(0..8u8)],
        _ => vec![if rng.gen_bool(0.5) { OP_HALT } else { OP_YIELD }],
    }
}

/// A freshly drawn random genome of `n` weighted instructions, nop-padded
/// to the minimum genome length.
pub fn random_genome<R: Rng>(rng: &mut R, n: usize, min_len: usize, max_len: usize) -> Vec<u8> {
    let mut genome = Vec::with_capacity(max_len);
    for _ in 0..n {
        let instr = random_instruction(rng);
        if genome.len() + instr.len() > max_len {
            break;
        }
        genome.extend_from_slice(&instr);
    }
    while genome.len() < min_len {
        genome.push(OP_NOP);
    }
    genome
}
