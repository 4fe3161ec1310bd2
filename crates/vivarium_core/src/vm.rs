//! The stack virtual machine that executes agent genomes.
//!
//! A gas-metered interpreter over the opcode set of [`crate::opcode`]: a
//! bounded tagged-value stack, a 192-word memory bank with the Ring0
//! (sensor) and Ring1 (action) windows, a quotation table with a bounded
//! call stack, and an output port that the scheduler mutes during think.
//!
//! The VM never aborts the host. Every fault sets the error register and
//! halts the current run; subsequent steps are no-ops until `reset`.

use crate::opcode::*;
use serde::{Deserialize, Serialize};

/// Memory bank layout: slots 0–63 are Ring0 (world-written sensors),
/// 64–127 are Ring1 (agent-written actions), 128–191 are locals/symbols.
pub const MEM_WORDS: usize = 192;
pub const RING0_BASE: usize = 0;
pub const RING1_BASE: usize = 64;
pub const LOCALS_BASE: usize = 128;
pub const RING_SLOTS: usize = 64;

pub const STACK_CAP: usize = 64;
pub const CALL_CAP: usize = 64;
pub const QUOT_TABLE: usize = 64;

/// Inline quotation refs (from `0xE3` bodies) live above this bit so they
/// never collide with table indices.
const INLINE_QUOT_BIT: u16 = 0x4000;

/// Tagged runtime value. Bytes auto-promote to words on arithmetic; word
/// pops accept byte layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Byte(u8),
    Word(i16),
    Quot(u16),
}

impl Value {
    fn word(self) -> Result<i16, VmError> {
        match self {
            Value::Byte(b) => Ok(b as i16),
            Value::Word(w) => Ok(w),
            Value::Quot(_) => Err(VmError::TypeMismatch),
        }
    }

    fn truthy(self) -> bool {
        match self {
            Value::Byte(b) => b != 0,
            Value::Word(w) => w != 0,
            Value::Quot(_) => true,
        }
    }
}

/// Error taxonomy surfaced by the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum VmError {
    #[error("stack underflow")]
    StackUnderflow,
    #[error("stack overflow")]
    StackOverflow,
    #[error("type mismatch")]
    TypeMismatch,
    #[error("division by zero")]
    DivisionByZero,
    #[error("gas exhausted")]
    GasExhausted,
    #[error("invalid quotation")]
    InvalidQuotation,
    #[error("undefined symbol")]
    UndefinedSymbol,
    #[error("i/o error")]
    IoError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodeSel {
    Main,
    Table(u16),
    Inline(u16),
}

#[derive(Debug, Clone)]
struct Frame {
    ret_sel: CodeSel,
    ret_pc: usize,
    /// Value re-pushed when the frame returns (`dip`).
    restore: Option<Value>,
    /// Times the current body re-runs before the frame actually returns
    /// (`loop` / `loop.n`).
    remaining: u16,
}

pub struct Vm {
    code: Vec<u8>,
    quots: Vec<Option<Vec<u8>>>,
    /// `(start, len)` spans of `0xE3` bodies in the main buffer.
    inline_quots: Vec<(usize, usize)>,
    stack: Vec<Value>,
    calls: Vec<Frame>,
    cur: CodeSel,
    pc: usize,
    mem: [i16; MEM_WORDS],
    gas: u32,
    halted: bool,
    err: Option<VmError>,
    output: Vec<u8>,
    muted: bool,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    #[must_use]
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            quots: vec![None; QUOT_TABLE],
            inline_quots: Vec::new(),
            stack: Vec::with_capacity(STACK_CAP),
            calls: Vec::with_capacity(CALL_CAP),
            cur: CodeSel::Main,
            pc: 0,
            mem: [0; MEM_WORDS],
            gas: 0,
            halted: false,
            err: None,
            output: Vec::new(),
            muted: false,
        }
    }

    /// Clears stack, PC, flags, error register, and halt state. Memory
    /// banks are kept.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.calls.clear();
        self.cur = CodeSel::Main;
        self.pc = 0;
        self.halted = false;
        self.err = None;
        self.output.clear();
    }

    /// Binds the executable buffer; PC := 0.
    pub fn load(&mut self, code: &[u8]) {
        self.code.clear();
        self.code.extend_from_slice(code);
        self.inline_quots.clear();
        self.cur = CodeSel::Main;
        self.pc = 0;
    }

    pub fn define_quot(&mut self, index: usize, code: &[u8]) {
        if index < self.quots.len() {
            self.quots[index] = Some(code.to_vec());
        }
    }

    pub fn set_gas(&mut self, gas: u32) {
        self.gas = gas;
    }

    #[must_use]
    pub fn gas(&self) -> u32 {
        self.gas
    }

    #[must_use]
    pub fn error(&self) -> Option<VmError> {
        self.err
    }

    #[must_use]
    pub fn halted(&self) -> bool {
        self.halted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    #[must_use]
    pub fn mem_read(&self, slot: usize) -> i16 {
        if slot < MEM_WORDS {
            self.mem[slot]
        } else {
            0
        }
    }

    pub fn mem_write(&mut self, slot: usize, word: i16) {
        if slot < MEM_WORDS {
            self.mem[slot] = word;
        }
    }

    /// Zero the whole memory bank. The scheduler does this between agents
    /// so one brain's rings and locals never leak into the next.
    pub fn clear_memory(&mut self) {
        self.mem = [0; MEM_WORDS];
    }

    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    #[must_use]
    pub fn stack_top(&self) -> Option<Value> {
        self.stack.last().copied()
    }

    /// Steps until halt, yield, error, gas exhaustion, or the end of the
    /// top-level buffer.
    pub fn run(&mut self) {
        while !self.halted && self.err.is_none() {
            if self.pc >= self.body_len() {
                if !self.finish_body() {
                    break;
                }
                continue;
            }
            if self.gas == 0 {
                self.fault(VmError::GasExhausted);
                break;
            }
            self.gas -= 1;
            self.step();
        }
    }

    fn body_len(&self) -> usize {
        match self.cur {
            CodeSel::Main => self.code.len(),
            CodeSel::Table(i) => self
                .quots
                .get(i as usize)
                .and_then(|q| q.as_ref())
                .map_or(0, |q| q.len()),
            CodeSel::Inline(i) => self.inline_quots.get(i as usize).map_or(0, |&(_, len)| len),
        }
    }

    fn byte_at(&self, pos: usize) -> u8 {
        match self.cur {
            CodeSel::Main => self.code.get(pos).copied().unwrap_or(OP_HALT),
            CodeSel::Table(i) => self
                .quots
                .get(i as usize)
                .and_then(|q| q.as_ref())
                .and_then(|q| q.get(pos).copied())
                .unwrap_or(OP_HALT),
            CodeSel::Inline(i) => {
                let (start, len) = self.inline_quots.get(i as usize).copied().unwrap_or((0, 0));
                if pos < len {
                    self.code.get(start + pos).copied().unwrap_or(OP_HALT)
                } else {
                    OP_HALT
                }
            }
        }
    }

    /// Current body finished: return to the caller frame, honoring loop
    /// repeats and dip restores. Returns false when the top level ended.
    fn finish_body(&mut self) -> bool {
        let Some(frame) = self.calls.last_mut() else {
            self.halted = true;
            return false;
        };
        if frame.remaining > 0 {
            frame.remaining -= 1;
            self.pc = 0;
            return true;
        }
        if let Some(frame) = self.calls.pop() {
            self.cur = frame.ret_sel;
            self.pc = frame.ret_pc;
            if let Some(v) = frame.restore {
                self.push(v);
            }
        }
        true
    }

    fn fault(&mut self, err: VmError) {
        if self.err.is_none() {
            self.err = Some(err);
        }
        self.halted = true;
    }

    fn push(&mut self, v: Value) {
        if self.stack.len() >= STACK_CAP {
            self.fault(VmError::StackOverflow);
            return;
        }
        self.stack.push(v);
    }

    fn pop(&mut self) -> Option<Value> {
        match self.stack.pop() {
            Some(v) => Some(v),
            None => {
                self.fault(VmError::StackUnderflow);
                None
            }
        }
    }

    fn pop_word(&mut self) -> Option<i16> {
        let v = self.pop()?;
        match v.word() {
            Ok(w) => Some(w),
            Err(e) => {
                self.fault(e);
                None
            }
        }
    }

    fn pop_quot(&mut self) -> Option<u16> {
        match self.pop()? {
            Value::Quot(q) => Some(q),
            _ => {
                self.fault(VmError::TypeMismatch);
                None
            }
        }
    }

    fn invoke(&mut self, quot: u16, restore: Option<Value>, repeats: u16) {
        let sel = if quot & INLINE_QUOT_BIT != 0 {
            let idx = quot & !INLINE_QUOT_BIT;
            if (idx as usize) >= self.inline_quots.len() {
                self.fault(VmError::InvalidQuotation);
                return;
            }
            CodeSel::Inline(idx)
        } else {
            let idx = quot as usize;
            if idx >= self.quots.len() || self.quots[idx].is_none() {
                self.fault(VmError::InvalidQuotation);
                return;
            }
            CodeSel::Table(quot)
        };
        if self.calls.len() >= CALL_CAP {
            self.fault(VmError::InvalidQuotation);
            return;
        }
        self.calls.push(Frame {
            ret_sel: self.cur,
            ret_pc: self.pc,
            restore,
            remaining: repeats,
        });
        self.cur = sel;
        self.pc = 0;
    }

    fn emit(&mut self, bytes: &[u8]) {
        if !self.muted {
            self.output.extend_from_slice(bytes);
        }
    }

    fn emit_line(&mut self, s: &str) {
        if !self.muted {
            self.output.extend_from_slice(s.as_bytes());
            self.output.push(b'\n');
        }
    }

    fn binary_word<F: FnOnce(i16, i16) -> i16>(&mut self, f: F) {
        let Some(b) = self.pop_word() else { return };
        let Some(a) = self.pop_word() else { return };
        self.push(Value::Word(f(a, b)));
    }

    fn step(&mut self) {
        let op = self.byte_at(self.pc);
        let size = match classify(op) {
            OpClass::Variable => {
                if self.pc + 1 >= self.body_len() {
                    self.fault(VmError::InvalidQuotation);
                    return;
                }
                2 + self.byte_at(self.pc + 1) as usize
            }
            OpClass::TwoByte => 2,
            OpClass::ThreeByte => 3,
            _ => 1,
        };
        if self.pc + size > self.body_len() {
            // Truncated operand bytes: the buffer cannot be decoded further.
            self.fault(VmError::InvalidQuotation);
            return;
        }
        let start = self.pc;
        self.pc += size;

        match classify(op) {
            OpClass::Command => self.exec_command(op),
            OpClass::SmallLiteral => self.push(Value::Byte(op - 0x20)),
            OpClass::SymbolRef => self.push(Value::Byte(op - 0x40)),
            OpClass::QuotationRef => self.push(Value::Quot((op - 0x60) as u16)),
            OpClass::TwoByte => {
                let operand = self.byte_at(start + 1);
                self.exec_two_byte(op, operand);
            }
            OpClass::ThreeByte => {
                let lo = self.byte_at(start + 1);
                let hi = self.byte_at(start + 2);
                self.exec_three_byte(op, u16::from_le_bytes([lo, hi]));
            }
            OpClass::Variable => self.exec_variable(op, start, size),
            OpClass::Special => self.exec_special(op),
        }
    }

    fn exec_command(&mut self, op: u8) {
        match op {
            OP_NOP | OP_PICK_RSV => {}
            OP_DUP => {
                if let Some(&v) = self.stack.last() {
                    self.push(v);
                } else {
                    self.fault(VmError::StackUnderflow);
                }
            }
            OP_DROP => {
                self.pop();
            }
            OP_SWAP => {
                let n = self.stack.len();
                if n < 2 {
                    self.fault(VmError::StackUnderflow);
                } else {
                    self.stack.swap(n - 1, n - 2);
                }
            }
            OP_OVER => {
                let n = self.stack.len();
                if n < 2 {
                    self.fault(VmError::StackUnderflow);
                } else {
                    self.push(self.stack[n - 2]);
                }
            }
            OP_ROT => {
                let n = self.stack.len();
                if n < 3 {
                    self.fault(VmError::StackUnderflow);
                } else {
                    let third = self.stack.remove(n - 3);
                    self.stack.push(third);
                }
            }
            OP_DUP2 => {
                let n = self.stack.len();
                if n < 2 {
                    self.fault(VmError::StackUnderflow);
                } else {
                    let a = self.stack[n - 2];
                    let b = self.stack[n - 1];
                    self.push(a);
                    self.push(b);
                }
            }
            OP_ADD => self.binary_word(|a, b| a.wrapping_add(b)),
            OP_SUB => self.binary_word(|a, b| a.wrapping_sub(b)),
            OP_MUL => self.binary_word(|a, b| a.wrapping_mul(b)),
            OP_DIV => {
                let Some(b) = self.pop_word() else { return };
                let Some(a) = self.pop_word() else { return };
                if b == 0 {
                    self.fault(VmError::DivisionByZero);
                } else {
                    self.push(Value::Word(a.wrapping_div(b)));
                }
            }
            OP_MOD => {
                let Some(b) = self.pop_word() else { return };
                let Some(a) = self.pop_word() else { return };
                if b == 0 {
                    self.fault(VmError::DivisionByZero);
                } else {
                    self.push(Value::Word(a.wrapping_rem(b)));
                }
            }
            OP_EQ => {
                let Some(b) = self.pop_word() else { return };
                let Some(a) = self.pop_word() else { return };
                self.push(Value::Byte((a == b) as u8));
            }
            OP_LT => {
                let Some(b) = self.pop_word() else { return };
                let Some(a) = self.pop_word() else { return };
                self.push(Value::Byte((a < b) as u8));
            }
            OP_GT => {
                let Some(b) = self.pop_word() else { return };
                let Some(a) = self.pop_word() else { return };
                self.push(Value::Byte((a > b) as u8));
            }
            OP_AND => {
                let Some(b) = self.pop() else { return };
                let Some(a) = self.pop() else { return };
                self.push(Value::Byte((a.truthy() && b.truthy()) as u8));
            }
            OP_OR => {
                let Some(b) = self.pop() else { return };
                let Some(a) = self.pop() else { return };
                self.push(Value::Byte((a.truthy() || b.truthy()) as u8));
            }
            OP_NOT => {
                let Some(a) = self.pop() else { return };
                self.push(Value::Byte(!a.truthy() as u8));
            }
            OP_NEG => {
                let Some(a) = self.pop_word() else { return };
                self.push(Value::Word(a.wrapping_neg()));
            }
            OP_INC => {
                let Some(a) = self.pop_word() else { return };
                self.push(Value::Word(a.wrapping_add(1)));
            }
            OP_DEC => {
                let Some(a) = self.pop_word() else { return };
                self.push(Value::Word(a.wrapping_sub(1)));
            }
            OP_EXEC => {
                let Some(q) = self.pop_quot() else { return };
                self.invoke(q, None, 0);
            }
            OP_IFTE => {
                let Some(else_q) = self.pop_quot() else { return };
                let Some(then_q) = self.pop_quot() else { return };
                let Some(cond) = self.pop() else { return };
                let q = if cond.truthy() { then_q } else { else_q };
                self.invoke(q, None, 0);
            }
            OP_DIP => {
                let Some(q) = self.pop_quot() else { return };
                let Some(saved) = self.pop() else { return };
                self.invoke(q, Some(saved), 0);
            }
            OP_LOOP => {
                let Some(q) = self.pop_quot() else { return };
                let Some(n) = self.pop_word() else { return };
                if n > 0 {
                    self.invoke(q, None, (n - 1) as u16);
                }
            }
            OP_RET => {
                // End the current body immediately.
                self.pc = self.body_len();
            }
            OP_LOAD => {
                let Some(slot) = self.pop_word() else { return };
                if !(0..RING_SLOTS as i16).contains(&slot) {
                    self.fault(VmError::UndefinedSymbol);
                } else {
                    self.push(Value::Word(self.mem[LOCALS_BASE + slot as usize]));
                }
            }
            OP_STORE => {
                let Some(slot) = self.pop_word() else { return };
                let Some(value) = self.pop_word() else { return };
                if !(0..RING_SLOTS as i16).contains(&slot) {
                    self.fault(VmError::UndefinedSymbol);
                } else {
                    self.mem[LOCALS_BASE + slot as usize] = value;
                }
            }
            OP_PRINT => {
                let Some(v) = self.pop() else { return };
                let line = match v {
                    Value::Byte(b) => format!("{b}"),
                    Value::Word(w) => format!("{w}"),
                    Value::Quot(q) => format!("[{q}]"),
                };
                self.emit_line(&line);
            }
            OP_DEPTH => {
                let depth = self.stack.len().min(i16::MAX as usize) as i16;
                self.push(Value::Word(depth));
            }
            OP_CLEAR => self.stack.clear(),
            _ => {}
        }
    }

    fn exec_two_byte(&mut self, op: u8, operand: u8) {
        match op {
            OP_PUSH_B => self.push(Value::Byte(operand)),
            OP_EXT_SYM => self.push(Value::Byte(operand)),
            OP_EXT_QUOT => self.push(Value::Quot(operand as u16)),
            OP_LOCAL_GET => {
                self.push(Value::Word(self.mem[LOCALS_BASE + (operand as usize % RING_SLOTS)]));
            }
            OP_LOCAL_SET => {
                let Some(v) = self.pop_word() else { return };
                self.mem[LOCALS_BASE + (operand as usize % RING_SLOTS)] = v;
            }
            OP_JMP_FWD => self.pc += operand as usize,
            OP_JMP_BACK => self.pc = self.pc.saturating_sub(operand as usize),
            OP_JZ_FWD => {
                let Some(cond) = self.pop() else { return };
                if !cond.truthy() {
                    self.pc += operand as usize;
                }
            }
            OP_JNZ_FWD => {
                let Some(cond) = self.pop() else { return };
                if cond.truthy() {
                    self.pc += operand as usize;
                }
            }
            OP_BUILTIN => self.fault(VmError::UndefinedSymbol),
            OP_R0_READ => {
                self.push(Value::Word(self.mem[RING0_BASE + (operand as usize % RING_SLOTS)]));
            }
            OP_R1_READ => {
                self.push(Value::Word(self.mem[RING1_BASE + (operand as usize % RING_SLOTS)]));
            }
            OP_R1_WRITE => {
                let Some(v) = self.pop_word() else { return };
                self.mem[RING1_BASE + (operand as usize % RING_SLOTS)] = v;
            }
            OP_INSPECT => {
                let line = match self.stack.last() {
                    Some(Value::Byte(b)) => format!("inspect: byte {b}"),
                    Some(Value::Word(w)) => format!("inspect: word {w}"),
                    Some(Value::Quot(q)) => format!("inspect: quot {q}"),
                    None => "inspect: empty".to_string(),
                };
                self.emit_line(&line);
            }
            OP_GAS => {
                let g = self.gas.min(i16::MAX as u32) as i16;
                self.push(Value::Word(g));
            }
            OP_PICK_N => {
                let n = operand as usize;
                if n >= self.stack.len() {
                    self.fault(VmError::StackUnderflow);
                } else {
                    let v = self.stack[self.stack.len() - 1 - n];
                    self.push(v);
                }
            }
            OP_ROLL_N => {
                let n = operand as usize;
                if n >= self.stack.len() {
                    self.fault(VmError::StackUnderflow);
                } else if n > 0 {
                    let idx = self.stack.len() - 1 - n;
                    let v = self.stack.remove(idx);
                    self.stack.push(v);
                }
            }
            OP_LOOP_N => {
                let Some(q) = self.pop_quot() else { return };
                if operand > 0 {
                    self.invoke(q, None, (operand - 1) as u16);
                }
            }
            OP_STR_SHORT => self.push(Value::Byte(operand)),
            // Reserved two-byte range: decoded, no effect.
            _ => {}
        }
    }

    fn exec_three_byte(&mut self, op: u8, operand: u16) {
        match op {
            OP_PUSH_W => self.push(Value::Word(operand as i16)),
            OP_EXT_SYM16 => self.push(Value::Word(operand as i16)),
            OP_EXT_QUOT16 => self.push(Value::Quot(operand & !INLINE_QUOT_BIT)),
            OP_JMP_FAR => self.pc = operand as usize,
            OP_JZ_FAR => {
                let Some(cond) = self.pop() else { return };
                if !cond.truthy() {
                    self.pc = operand as usize;
                }
            }
            OP_CALL_FAR => {
                if self.calls.len() >= CALL_CAP {
                    self.fault(VmError::InvalidQuotation);
                    return;
                }
                self.calls.push(Frame {
                    ret_sel: self.cur,
                    ret_pc: self.pc,
                    restore: None,
                    remaining: 0,
                });
                self.pc = operand as usize;
            }
            // Reserved three-byte range: decoded, no effect.
            _ => {}
        }
    }

    fn exec_variable(&mut self, op: u8, start: usize, size: usize) {
        match op {
            OP_STRING => {
                let data: Vec<u8> = (start + 2..start + size).map(|i| self.byte_at(i)).collect();
                self.emit(&data);
            }
            OP_QUOT_BODY => {
                if matches!(self.cur, CodeSel::Main) {
                    let idx = self.inline_quots.len() as u16;
                    if idx >= INLINE_QUOT_BIT {
                        self.fault(VmError::InvalidQuotation);
                        return;
                    }
                    self.inline_quots.push((start + 2, size - 2));
                    self.push(Value::Quot(INLINE_QUOT_BIT | idx));
                } else {
                    // Inline bodies may only be defined at the top level.
                    self.fault(VmError::InvalidQuotation);
                }
            }
            // bytes / vector / reserved: inert inline data.
            _ => {}
        }
    }

    fn exec_special(&mut self, op: u8) {
        match op {
            OP_HALT | OP_END | OP_YIELD => self.halted = true,
            OP_BREAK => {
                // Ends the current body; at the top level this halts.
                self.pc = self.body_len();
            }
            OP_DEBUG | OP_EXTEND => {}
            OP_ERROR => self.fault(VmError::IoError),
            OP_CLEAR_ERR => {
                self.err = None;
            }
            OP_CHECK_ERR => self.push(Value::Byte(self.err.is_some() as u8)),
            // Unknown specials: width 1, no effect.
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_program(code: &[u8]) -> Vm {
        let mut vm = Vm::new();
        vm.load(code);
        vm.set_gas(10_000);
        vm.run();
        vm
    }

    #[test]
    fn small_literal_and_arithmetic() {
        // 5 3 + => 8
        let vm = run_program(&[0x25, 0x23, OP_ADD]);
        assert_eq!(vm.error(), None);
        assert_eq!(vm.stack_top(), Some(Value::Word(8)));
    }

    #[test]
    fn byte_values_auto_promote() {
        // push.b 200, 3 * => 600 as word
        let vm = run_program(&[OP_PUSH_B, 200, 0x23, OP_MUL]);
        assert_eq!(vm.stack_top(), Some(Value::Word(600)));
    }

    #[test]
    fn wrapping_word_arithmetic() {
        // 32767 + 1 wraps
        let vm = run_program(&[OP_PUSH_W, 0xFF, 0x7F, 0x21, OP_ADD]);
        assert_eq!(vm.stack_top(), Some(Value::Word(i16::MIN)));
    }

    #[test]
    fn division_by_zero_faults() {
        let vm = run_program(&[0x25, 0x20, OP_DIV]);
        assert_eq!(vm.error(), Some(VmError::DivisionByZero));
    }

    #[test]
    fn stack_underflow_faults_and_halts() {
        let mut vm = Vm::new();
        vm.load(&[OP_DROP, 0x21]);
        vm.set_gas(100);
        vm.run();
        assert_eq!(vm.error(), Some(VmError::StackUnderflow));
        // The literal after the fault never ran.
        assert_eq!(vm.stack_depth(), 0);
    }

    #[test]
    fn stack_overflow_faults() {
        let code = vec![0x21; STACK_CAP + 1];
        let vm = run_program(&code);
        assert_eq!(vm.error(), Some(VmError::StackOverflow));
    }

    #[test]
    fn gas_exhaustion_halts() {
        let mut vm = Vm::new();
        // Infinite backward jump.
        vm.load(&[OP_NOP, OP_JMP_BACK, 2]);
        vm.set_gas(50);
        vm.run();
        assert_eq!(vm.error(), Some(VmError::GasExhausted));
        assert_eq!(vm.gas(), 0);
    }

    #[test]
    fn ring_ports_roundtrip() {
        let mut vm = Vm::new();
        vm.mem_write(RING0_BASE + 13, 4);
        // r0@ 13, r1! 0
        vm.load(&[OP_R0_READ, 13, OP_R1_WRITE, 0]);
        vm.set_gas(100);
        vm.run();
        assert_eq!(vm.error(), None);
        assert_eq!(vm.mem_read(RING1_BASE), 4);
    }

    #[test]
    fn forager_seed_moves_and_eats() {
        let mut vm = Vm::new();
        vm.mem_write(13, 2); // food direction: east
        vm.load(&[0x8A, 0x0D, 0x8C, 0x00, 0x21, 0x8C, 0x01, 0xF1]);
        vm.set_gas(200);
        vm.run();
        assert_eq!(vm.error(), None);
        assert_eq!(vm.mem_read(RING1_BASE), 2); // move east
        assert_eq!(vm.mem_read(RING1_BASE + 1), 1); // action eat
    }

    #[test]
    fn random_walker_seed_computes_direction() {
        let mut vm = Vm::new();
        vm.mem_write(10, 7); // tick sensor
        vm.load(&[0x8A, 0x0A, 0x24, 0x0A, 0x21, 0x06, 0x8C, 0x00, 0x21, 0x8C, 0x01, 0xF1]);
        vm.set_gas(200);
        vm.run();
        assert_eq!(vm.error(), None);
        assert_eq!(vm.mem_read(RING1_BASE), 4); // (7 mod 4) + 1 = west
        assert_eq!(vm.mem_read(RING1_BASE + 1), 1);
    }

    #[test]
    fn quotation_exec_and_loop() {
        let mut vm = Vm::new();
        vm.define_quot(0, &[OP_INC]);
        // 0, then loop quotation 0 five times: 0 5 [0] swap? simpler:
        // push 0; push 5; quot-ref 0; loop  => stack [5 applied incs]
        vm.load(&[0x20, 0x25, 0x60, OP_LOOP]);
        vm.set_gas(1000);
        vm.run();
        assert_eq!(vm.error(), None);
        assert_eq!(vm.stack_top(), Some(Value::Word(5)));
    }

    #[test]
    fn ifte_takes_then_branch() {
        let mut vm = Vm::new();
        vm.define_quot(1, &[0x2A]); // push 10
        vm.define_quot(2, &[0x2B]); // push 11
        // cond=1, then=[1], else=[2]
        vm.load(&[0x21, 0x61, 0x62, OP_IFTE]);
        vm.set_gas(100);
        vm.run();
        assert_eq!(vm.stack_top(), Some(Value::Byte(10)));
    }

    #[test]
    fn dip_restores_top() {
        let mut vm = Vm::new();
        vm.define_quot(0, &[OP_INC]);
        // 5 9 [inc] dip => stack: 6 9
        vm.load(&[0x25, 0x29, 0x60, OP_DIP]);
        vm.set_gas(100);
        vm.run();
        assert_eq!(vm.error(), None);
        assert_eq!(vm.stack_top(), Some(Value::Byte(9)));
        assert_eq!(vm.stack_depth(), 2);
    }

    #[test]
    fn unbound_quotation_faults() {
        let mut vm = Vm::new();
        vm.load(&[0x63, OP_EXEC]);
        vm.set_gas(100);
        vm.run();
        assert_eq!(vm.error(), Some(VmError::InvalidQuotation));
    }

    #[test]
    fn call_depth_is_bounded() {
        let mut vm = Vm::new();
        // Quotation 0 invokes itself forever.
        vm.define_quot(0, &[0x60, OP_EXEC]);
        vm.load(&[0x60, OP_EXEC]);
        vm.set_gas(100_000);
        vm.run();
        assert_eq!(vm.error(), Some(VmError::InvalidQuotation));
    }

    #[test]
    fn inline_quotation_body_executes() {
        // [inc] exec over a pushed 4 => 5
        let mut vm = Vm::new();
        vm.load(&[0x24, OP_QUOT_BODY, 1, OP_INC, OP_EXEC]);
        vm.set_gas(100);
        vm.run();
        assert_eq!(vm.error(), None);
        assert_eq!(vm.stack_top(), Some(Value::Word(5)));
    }

    #[test]
    fn print_respects_mute() {
        let mut vm = Vm::new();
        vm.set_muted(true);
        vm.load(&[0x25, OP_PRINT]);
        vm.set_gas(100);
        vm.run();
        assert!(vm.take_output().is_empty());

        let mut vm = Vm::new();
        vm.load(&[0x25, OP_PRINT]);
        vm.set_gas(100);
        vm.run();
        assert_eq!(vm.take_output(), b"5\n");
    }

    #[test]
    fn reset_keeps_memory() {
        let mut vm = Vm::new();
        vm.mem_write(5, 77);
        vm.load(&[0x21]);
        vm.set_gas(10);
        vm.run();
        vm.reset();
        assert_eq!(vm.stack_depth(), 0);
        assert_eq!(vm.error(), None);
        assert_eq!(vm.mem_read(5), 77);
    }

    #[test]
    fn determinism_same_code_same_memory() {
        let code = [0x8A, 0x05, 0x23, OP_ADD, 0x8C, 0x02, 0xF1];
        let run = |seed_word: i16| {
            let mut vm = Vm::new();
            vm.mem_write(5, seed_word);
            vm.load(&code);
            vm.set_gas(200);
            vm.run();
            (vm.mem_read(RING1_BASE + 2), vm.gas())
        };
        assert_eq!(run(40), run(40));
        assert_eq!(run(40).0, 43);
    }

    #[test]
    fn truncated_two_byte_op_faults() {
        let vm = run_program(&[0x21, OP_R0_READ]);
        assert_eq!(vm.error(), Some(VmError::InvalidQuotation));
    }

    #[test]
    fn jumps_move_pc() {
        // jz+ over a halt: 0 jz+ 1 halt 7  => pushes 7
        let vm = run_program(&[0x20, OP_JZ_FWD, 1, OP_HALT, 0x27]);
        assert_eq!(vm.error(), None);
        assert_eq!(vm.stack_top(), Some(Value::Byte(7)));
    }

    #[test]
    fn locals_roundtrip() {
        // local! 3 stores the popped word, local@ 3 reads it back
        let vm = run_program(&[0x2A, OP_LOCAL_SET, 3, OP_LOCAL_GET, 3]);
        assert_eq!(vm.error(), None);
        assert_eq!(vm.stack_top(), Some(Value::Word(10)));
    }

    #[test]
    fn symbol_store_and_load() {
        // 7 'x store ... 'x load: symbol slot 0 via inline ref 0x40
        let vm = run_program(&[0x27, 0x40, OP_STORE, 0x40, OP_LOAD]);
        assert_eq!(vm.error(), None);
        assert_eq!(vm.stack_top(), Some(Value::Word(7)));
    }

    #[test]
    fn load_of_out_of_range_symbol_faults() {
        let vm = run_program(&[OP_PUSH_B, 200, OP_LOAD]);
        assert_eq!(vm.error(), Some(VmError::UndefinedSymbol));
    }

    #[test]
    fn pick_and_roll() {
        // 1 2 3 pick.n 2 => copies the 1 to the top
        let vm = run_program(&[0x21, 0x22, 0x23, OP_PICK_N, 2]);
        assert_eq!(vm.error(), None);
        assert_eq!(vm.stack_top(), Some(Value::Byte(1)));
        assert_eq!(vm.stack_depth(), 4);

        // 1 2 3 roll.n 2 => moves the 1 to the top
        let vm = run_program(&[0x21, 0x22, 0x23, OP_ROLL_N, 2]);
        assert_eq!(vm.stack_top(), Some(Value::Byte(1)));
        assert_eq!(vm.stack_depth(), 3);
    }

    #[test]
    fn gas_op_reports_remaining_budget() {
        let mut vm = Vm::new();
        vm.load(&[OP_GAS, 0]);
        vm.set_gas(100);
        vm.run();
        // One unit was spent decoding the gas op itself.
        assert_eq!(vm.stack_top(), Some(Value::Word(99)));
    }

    #[test]
    fn check_err_reads_clear_flag() {
        let vm = run_program(&[OP_CHECK_ERR]);
        assert_eq!(vm.stack_top(), Some(Value::Byte(0)));
    }

    #[test]
    fn break_ends_only_the_current_body() {
        let mut vm = Vm::new();
        vm.define_quot(0, &[0x25, OP_BREAK, 0x29]);
        // exec [5 break 9], then push 3 afterwards
        vm.load(&[0x60, OP_EXEC, 0x23]);
        vm.set_gas(100);
        vm.run();
        assert_eq!(vm.error(), None);
        assert_eq!(vm.stack_top(), Some(Value::Byte(3)));
        assert_eq!(vm.stack_depth(), 2); // the 5 survived, the 9 never ran
    }

    #[test]
    fn builtin_call_is_undefined() {
        let vm = run_program(&[OP_BUILTIN, 0]);
        assert_eq!(vm.error(), Some(VmError::UndefinedSymbol));
    }

    #[test]
    fn depth_and_clear() {
        let vm = run_program(&[0x21, 0x22, OP_DEPTH]);
        assert_eq!(vm.stack_top(), Some(Value::Word(2)));

        let vm = run_program(&[0x21, 0x22, OP_CLEAR]);
        assert_eq!(vm.stack_depth(), 0);
    }
}
