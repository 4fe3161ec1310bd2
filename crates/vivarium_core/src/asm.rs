//! Textual assembler and disassembler for seed genomes and tests.
//!
//! Whitespace-delimited tokens, case-insensitive mnemonics, `;` or `%`
//! comments to end of line. Plain numbers pick the smallest encoding
//! (0..31 small literal, 0..255 `push.b`, otherwise `push.w`); explicit
//! `push.b`/`push.w` forms are always accepted and are emitted by the
//! disassembler whenever a plain number would re-encode differently.
//! `foo:` defines a label; `jmp`/`jz`/`jnz` accept a label or a signed
//! offset and are patched as `target - instr_end`. `'name` interns an
//! inline symbol (first free slot; `'sN` pins slot N), `[n]` is an inline
//! quotation reference, `#hh` escapes a raw byte.

use crate::opcode::*;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AsmError {
    #[error("line {line}: unknown mnemonic `{token}`")]
    UnknownMnemonic { token: String, line: usize },
    #[error("line {line}: `{token}` requires an operand")]
    MissingOperand { token: String, line: usize },
    #[error("line {line}: operand {value} out of range for `{token}`")]
    OperandRange { token: String, value: i64, line: usize },
    #[error("line {line}: bad number `{token}`")]
    BadNumber { token: String, line: usize },
    #[error("line {line}: duplicate label `{label}`")]
    DuplicateLabel { label: String, line: usize },
    #[error("unknown label `{label}`")]
    UnknownLabel { label: String },
    #[error("line {line}: label `{label}` is behind a forward-only jump")]
    BackwardJump { label: String, line: usize },
    #[error("line {line}: too many inline symbols")]
    SymbolSpace { line: usize },
}

struct Fixup {
    /// Index of the opcode byte in the output buffer.
    code_pos: usize,
    label: String,
    line: usize,
    /// Whether the opcode may flip to its backward form (`jmp` only).
    reversible: bool,
}

fn two_byte_mnemonic(token: &str) -> Option<u8> {
    Some(match token {
        "push.b" => OP_PUSH_B,
        "sym.b" => OP_EXT_SYM,
        "quot.b" => OP_EXT_QUOT,
        "local@" => OP_LOCAL_GET,
        "local!" => OP_LOCAL_SET,
        "jmp+" => OP_JMP_FWD,
        "jmp-" => OP_JMP_BACK,
        "jz+" => OP_JZ_FWD,
        "jnz+" => OP_JNZ_FWD,
        "builtin" => OP_BUILTIN,
        "r0@" => OP_R0_READ,
        "r1@" => OP_R1_READ,
        "r1!" => OP_R1_WRITE,
        "inspect" => OP_INSPECT,
        "gas" => OP_GAS,
        "pick.n" => OP_PICK_N,
        "roll.n" => OP_ROLL_N,
        "loop.n" => OP_LOOP_N,
        "str.s" => OP_STR_SHORT,
        _ => return None,
    })
}

fn three_byte_mnemonic(token: &str) -> Option<u8> {
    Some(match token {
        "push.w" => OP_PUSH_W,
        "sym.w" => OP_EXT_SYM16,
        "quot.w" => OP_EXT_QUOT16,
        "jmp.far" => OP_JMP_FAR,
        "jz.far" => OP_JZ_FAR,
        "call.far" => OP_CALL_FAR,
        _ => return None,
    })
}

fn special_mnemonic(token: &str) -> Option<u8> {
    Some(match token {
        "halt" => OP_HALT,
        "yield" => OP_YIELD,
        "break" => OP_BREAK,
        "debug" => OP_DEBUG,
        "error" => OP_ERROR,
        "clear-err" => OP_CLEAR_ERR,
        "check-err" => OP_CHECK_ERR,
        "extend" => OP_EXTEND,
        "end" => OP_END,
        _ => return None,
    })
}

fn parse_number(token: &str) -> Option<i64> {
    let t = token.strip_prefix('+').unwrap_or(token);
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("-0x")) {
        let v = i64::from_str_radix(hex, 16).ok()?;
        return Some(if t.starts_with('-') { -v } else { v });
    }
    t.parse::<i64>().ok()
}

/// Assemble whitespace-delimited source into bytecode.
pub fn assemble(text: &str) -> Result<Vec<u8>, AsmError> {
    let mut out: Vec<u8> = Vec::new();
    let mut labels: HashMap<String, usize> = HashMap::new();
    let mut fixups: Vec<Fixup> = Vec::new();
    let mut symbols: HashMap<String, u8> = HashMap::new();

    for (line_no, raw_line) in text.lines().enumerate() {
        let line = line_no + 1;
        let code_part = raw_line
            .split(|c| c == ';' || c == '%')
            .next()
            .unwrap_or("");
        let mut tokens = code_part.split_whitespace().map(|t| t.to_ascii_lowercase());
        while let Some(token) = tokens.next() {
            // Label definition.
            if let Some(name) = token.strip_suffix(':') {
                if !name.is_empty() {
                    if labels.insert(name.to_string(), out.len()).is_some() {
                        return Err(AsmError::DuplicateLabel { label: name.to_string(), line });
                    }
                    continue;
                }
            }
            // Raw byte escape.
            if let Some(hex) = token.strip_prefix('#') {
                let b = u8::from_str_radix(hex, 16)
                    .map_err(|_| AsmError::BadNumber { token: token.clone(), line })?;
                out.push(b);
                continue;
            }
            // Inline quotation reference.
            if token.starts_with('[') && token.ends_with(']') {
                let inner = &token[1..token.len() - 1];
                let idx = parse_number(inner)
                    .ok_or_else(|| AsmError::BadNumber { token: token.clone(), line })?;
                match idx {
                    0..=31 => out.push(0x60 + idx as u8),
                    32..=255 => out.extend_from_slice(&[OP_EXT_QUOT, idx as u8]),
                    _ => {
                        return Err(AsmError::OperandRange { token, value: idx, line });
                    }
                }
                continue;
            }
            // Inline symbol: 'sN pins a slot, any other name is interned.
            if let Some(name) = token.strip_prefix('\'') {
                let slot = if let Some(n) = name
                    .strip_prefix('s')
                    .and_then(|digits| digits.parse::<u8>().ok())
                {
                    n
                } else if let Some(&slot) = symbols.get(name) {
                    slot
                } else {
                    let mut next = 0u8;
                    while symbols.values().any(|&s| s == next) {
                        next = next.checked_add(1).ok_or(AsmError::SymbolSpace { line })?;
                    }
                    symbols.insert(name.to_string(), next);
                    next
                };
                if slot < 32 {
                    out.push(0x40 + slot);
                } else {
                    out.extend_from_slice(&[OP_EXT_SYM, slot]);
                }
                continue;
            }
            // Plain number: smallest encoding.
            if let Some(n) = parse_number(&token) {
                match n {
                    0..=31 => out.push(0x20 + n as u8),
                    32..=255 => out.extend_from_slice(&[OP_PUSH_B, n as u8]),
                    -32768..=32767 => {
                        let [lo, hi] = (n as i16 as u16).to_le_bytes();
                        out.extend_from_slice(&[OP_PUSH_W, lo, hi]);
                    }
                    _ => return Err(AsmError::OperandRange { token, value: n, line }),
                }
                continue;
            }
            // One-byte commands.
            if let Some(op) = COMMAND_MNEMONICS.iter().position(|&m| m == token) {
                out.push(op as u8);
                continue;
            }
            if let Some(op) = special_mnemonic(&token) {
                out.push(op);
                continue;
            }
            // Direction-less jumps: label or signed offset, patched later.
            if matches!(token.as_str(), "jmp" | "jz" | "jnz") {
                let operand = tokens
                    .next()
                    .ok_or_else(|| AsmError::MissingOperand { token: token.clone(), line })?;
                let (fwd, reversible) = match token.as_str() {
                    "jmp" => (OP_JMP_FWD, true),
                    "jz" => (OP_JZ_FWD, false),
                    _ => (OP_JNZ_FWD, false),
                };
                if let Some(n) = parse_number(&operand) {
                    let (op, mag) = if n < 0 {
                        if !reversible {
                            return Err(AsmError::OperandRange { token, value: n, line });
                        }
                        (OP_JMP_BACK, -n)
                    } else {
                        (fwd, n)
                    };
                    if mag > 255 {
                        return Err(AsmError::OperandRange { token, value: n, line });
                    }
                    out.extend_from_slice(&[op, mag as u8]);
                } else {
                    fixups.push(Fixup {
                        code_pos: out.len(),
                        label: operand,
                        line,
                        reversible,
                    });
                    out.extend_from_slice(&[fwd, 0]);
                }
                continue;
            }
            if let Some(op) = two_byte_mnemonic(&token) {
                let operand = tokens
                    .next()
                    .ok_or_else(|| AsmError::MissingOperand { token: token.clone(), line })?;
                let n = parse_number(&operand)
                    .ok_or_else(|| AsmError::BadNumber { token: operand.clone(), line })?;
                if !(0..=255).contains(&n) {
                    return Err(AsmError::OperandRange { token, value: n, line });
                }
                out.extend_from_slice(&[op, n as u8]);
                continue;
            }
            if let Some(op) = three_byte_mnemonic(&token) {
                let operand = tokens
                    .next()
                    .ok_or_else(|| AsmError::MissingOperand { token: token.clone(), line })?;
                let n = parse_number(&operand)
                    .ok_or_else(|| AsmError::BadNumber { token: operand.clone(), line })?;
                if !(-32768..=65535).contains(&n) {
                    return Err(AsmError::OperandRange { token, value: n, line });
                }
                let [lo, hi] = (n as u16).to_le_bytes();
                out.extend_from_slice(&[op, lo, hi]);
                continue;
            }
            return Err(AsmError::UnknownMnemonic { token, line });
        }
    }

    for fixup in fixups {
        let target = *labels
            .get(&fixup.label)
            .ok_or_else(|| AsmError::UnknownLabel { label: fixup.label.clone() })?;
        let instr_end = fixup.code_pos + 2;
        let offset = target as i64 - instr_end as i64;
        if offset.abs() > 255 {
            return Err(AsmError::OperandRange {
                token: fixup.label,
                value: offset,
                line: fixup.line,
            });
        }
        if offset < 0 {
            if !fixup.reversible {
                return Err(AsmError::BackwardJump { label: fixup.label, line: fixup.line });
            }
            out[fixup.code_pos] = OP_JMP_BACK;
            out[fixup.code_pos + 1] = (-offset) as u8;
        } else {
            out[fixup.code_pos + 1] = offset as u8;
        }
    }

    Ok(out)
}

fn two_byte_name(op: u8) -> Option<&'static str> {
    Some(match op {
        OP_PUSH_B => "push.b",
        OP_EXT_SYM => "sym.b",
        OP_EXT_QUOT => "quot.b",
        OP_LOCAL_GET => "local@",
        OP_LOCAL_SET => "local!",
        OP_JMP_FWD => "jmp+",
        OP_JMP_BACK => "jmp-",
        OP_JZ_FWD => "jz+",
        OP_JNZ_FWD => "jnz+",
        OP_BUILTIN => "builtin",
        OP_R0_READ => "r0@",
        OP_R1_READ => "r1@",
        OP_R1_WRITE => "r1!",
        OP_INSPECT => "inspect",
        OP_GAS => "gas",
        OP_PICK_N => "pick.n",
        OP_ROLL_N => "roll.n",
        OP_LOOP_N => "loop.n",
        OP_STR_SHORT => "str.s",
        _ => return None,
    })
}

fn three_byte_name(op: u8) -> Option<&'static str> {
    Some(match op {
        OP_PUSH_W => "push.w",
        OP_EXT_SYM16 => "sym.w",
        OP_EXT_QUOT16 => "quot.w",
        OP_JMP_FAR => "jmp.far",
        OP_JZ_FAR => "jz.far",
        OP_CALL_FAR => "call.far",
        _ => return None,
    })
}

fn special_name(op: u8) -> Option<&'static str> {
    Some(match op {
        OP_HALT => "halt",
        OP_YIELD => "yield",
        OP_BREAK => "break",
        OP_DEBUG => "debug",
        OP_ERROR => "error",
        OP_CLEAR_ERR => "clear-err",
        OP_CHECK_ERR => "check-err",
        OP_EXTEND => "extend",
        OP_END => "end",
        _ => return None,
    })
}

fn push_raw(out: &mut Vec<String>, bytes: &[u8]) {
    for &b in bytes {
        out.push(format!("#{b:02x}"));
    }
}

/// Disassemble bytecode into canonical text, one instruction per line.
/// Reassembling the output reproduces the input bytes exactly.
#[must_use]
pub fn disassemble(bytes: &[u8]) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let size = match opcode_size(bytes, pos) {
            Some(s) if pos + s <= bytes.len() => s,
            _ => {
                // Trailing malformed bytes: escape them raw and stop.
                let mut raw = Vec::new();
                push_raw(&mut raw, &bytes[pos..]);
                lines.extend(raw);
                break;
            }
        };
        let op = bytes[pos];
        let text = match classify(op) {
            OpClass::Command => COMMAND_MNEMONICS[op as usize].to_string(),
            OpClass::SmallLiteral => format!("{}", op - 0x20),
            OpClass::SymbolRef => format!("'s{}", op - 0x40),
            OpClass::QuotationRef => format!("[{}]", op - 0x60),
            OpClass::TwoByte => {
                let operand = bytes[pos + 1];
                match two_byte_name(op) {
                    Some(name) => format!("{name} {operand}"),
                    None => {
                        let mut raw = Vec::new();
                        push_raw(&mut raw, &bytes[pos..pos + 2]);
                        raw.join(" ")
                    }
                }
            }
            OpClass::ThreeByte => {
                let word = u16::from_le_bytes([bytes[pos + 1], bytes[pos + 2]]);
                match three_byte_name(op) {
                    Some(name) if op == OP_PUSH_W || op == OP_EXT_SYM16 => {
                        format!("{name} {}", word as i16)
                    }
                    Some(name) => format!("{name} {word}"),
                    None => {
                        let mut raw = Vec::new();
                        push_raw(&mut raw, &bytes[pos..pos + 3]);
                        raw.join(" ")
                    }
                }
            }
            OpClass::Variable => {
                let mut raw = Vec::new();
                push_raw(&mut raw, &bytes[pos..pos + size]);
                raw.join(" ")
            }
            OpClass::Special => match special_name(op) {
                Some(name) => name.to_string(),
                None => format!("#{op:02x}"),
            },
        };
        lines.push(text);
        pos += size;
    }
    lines.join("\n")
}
