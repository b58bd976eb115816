//! Machine registers.
//!
//! The machine has two registers:
//! - PC: index of the next instruction word
//! - RBO: relative base offset, added to relative-mode operands

use crate::cpu::Word;
use crate::cpu::decode::AddrMode;
use serde::{Serialize, Deserialize};

/// The register file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// Program counter.
    pub pc: usize,

    /// Relative base offset. Only changed by the adjust-base instruction.
    pub rbo: Word,
}

impl Registers {
    /// Create a register file with PC and RBO at zero.
    pub fn new() -> Self {
        Self { pc: 0, rbo: 0 }
    }

    pub fn reset(&mut self) {
        self.pc = 0;
        self.rbo = 0;
    }

    /// Move the PC past an instruction of `width` words.
    /// Returns the old value.
    pub fn advance(&mut self, width: usize) -> usize {
        let old = self.pc;
        self.pc += width;
        old
    }

    /// Set the program counter to an absolute address.
    pub fn jump(&mut self, target: usize) {
        self.pc = target;
    }

    pub fn adjust_base(&mut self, delta: Word) {
        self.rbo = self.rbo.wrapping_add(delta);
    }

    /// Address designated by a raw operand word.
    ///
    /// Immediate mode has no address of its own; the raw word is taken as a
    /// literal address, same as position mode.
    pub fn effective_address(&self, raw: Word, mode: AddrMode) -> Word {
        match mode {
            AddrMode::Position | AddrMode::Immediate => raw,
            AddrMode::Relative => raw.wrapping_add(self.rbo),
        }
    }
}
