//! Instruction decoder.
//!
//! An instruction word is `opcode + 100*m1 + 1000*m2 + 10000*m3`: the low two
//! decimal digits select the operation and each higher digit selects the
//! addressing mode of one operand, least significant first.

use std::fmt;

use crate::cpu::Word;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The widest instruction has three operands.
pub const MAX_OPERANDS: usize = 3;

/// Per-operand addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddrMode {
    /// The operand word is an address (mode 0).
    Position,
    /// The operand word is the value itself (mode 1).
    Immediate,
    /// The operand word plus the relative base is an address (mode 2).
    Relative,
}

impl AddrMode {
    /// Create from a mode digit.
    pub fn from_digit(digit: Word) -> Option<Self> {
        match digit {
            0 => Some(AddrMode::Position),
            1 => Some(AddrMode::Immediate),
            2 => Some(AddrMode::Relative),
            _ => None,
        }
    }

    /// Convert to the mode digit.
    pub fn digit(self) -> Word {
        match self {
            AddrMode::Position => 0,
            AddrMode::Immediate => 1,
            AddrMode::Relative => 2,
        }
    }

    /// Single-character glyph used in diagnostic output.
    pub fn glyph(self) -> char {
        match self {
            AddrMode::Position => '*',
            AddrMode::Immediate => '-',
            AddrMode::Relative => '^',
        }
    }
}

impl fmt::Display for AddrMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.glyph())
    }
}

/// Operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    /// `[c] := a + b`
    Add,
    /// `[c] := a * b`
    Mul,
    /// `[a] := next input`
    Input,
    /// emit `a`
    Output,
    /// if `a != 0` then `pc := b`
    JumpIfTrue,
    /// if `a == 0` then `pc := b`
    JumpIfFalse,
    /// `[c] := (a < b) as 1/0`
    LessThan,
    /// `[c] := (a == b) as 1/0`
    Equals,
    /// `rbo += a`
    AdjustBase,
    /// Stop the machine.
    Halt,
}

impl Opcode {
    pub const ALL: [Opcode; 10] = [
        Opcode::Add,
        Opcode::Mul,
        Opcode::Input,
        Opcode::Output,
        Opcode::JumpIfTrue,
        Opcode::JumpIfFalse,
        Opcode::LessThan,
        Opcode::Equals,
        Opcode::AdjustBase,
        Opcode::Halt,
    ];

    /// Look up the two-digit opcode value.
    pub fn from_code(code: Word) -> Option<Self> {
        let op = match code {
            1 => Opcode::Add,
            2 => Opcode::Mul,
            3 => Opcode::Input,
            4 => Opcode::Output,
            5 => Opcode::JumpIfTrue,
            6 => Opcode::JumpIfFalse,
            7 => Opcode::LessThan,
            8 => Opcode::Equals,
            9 => Opcode::AdjustBase,
            99 => Opcode::Halt,
            _ => return None,
        };
        Some(op)
    }

    pub fn code(self) -> Word {
        match self {
            Opcode::Add => 1,
            Opcode::Mul => 2,
            Opcode::Input => 3,
            Opcode::Output => 4,
            Opcode::JumpIfTrue => 5,
            Opcode::JumpIfFalse => 6,
            Opcode::LessThan => 7,
            Opcode::Equals => 8,
            Opcode::AdjustBase => 9,
            Opcode::Halt => 99,
        }
    }

    /// Number of operand words following the opcode word.
    pub fn operand_count(self) -> usize {
        match self {
            Opcode::Add | Opcode::Mul | Opcode::LessThan | Opcode::Equals => 3,
            Opcode::JumpIfTrue | Opcode::JumpIfFalse => 2,
            Opcode::Input | Opcode::Output | Opcode::AdjustBase => 1,
            Opcode::Halt => 0,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "ADD",
            Opcode::Mul => "MUL",
            Opcode::Input => "INP",
            Opcode::Output => "OUT",
            Opcode::JumpIfTrue => "JIT",
            Opcode::JumpIfFalse => "JIF",
            Opcode::LessThan => "LT",
            Opcode::Equals => "EQ",
            Opcode::AdjustBase => "ARB",
            Opcode::Halt => "HALT",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A decoded instruction word.
///
/// Modes beyond the opcode's operand count are always `Position`, so two
/// instructions compare equal exactly when they encode the same operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    modes: [AddrMode; MAX_OPERANDS],
}

impl Instruction {
    /// Build an instruction from an opcode and the modes of its operands.
    ///
    /// # Panics
    /// Panics if more modes are given than the opcode has operands.
    pub fn new(opcode: Opcode, modes: &[AddrMode]) -> Self {
        assert!(
            modes.len() <= opcode.operand_count(),
            "{} takes {} operands, got {} modes",
            opcode, opcode.operand_count(), modes.len()
        );
        let mut all = [AddrMode::Position; MAX_OPERANDS];
        all[..modes.len()].copy_from_slice(modes);
        Self { opcode, modes: all }
    }

    pub fn operand_count(&self) -> usize {
        self.opcode.operand_count()
    }

    /// Encoded width in words: the opcode word plus one per operand.
    pub fn width(&self) -> usize {
        self.operand_count() + 1
    }

    /// Addressing modes of the operands actually used.
    pub fn modes(&self) -> &[AddrMode] {
        &self.modes[..self.operand_count()]
    }

    /// Mode of operand `n` (1-based).
    ///
    /// # Panics
    /// Panics if `n` is not an operand of this instruction.
    pub fn mode(&self, n: usize) -> AddrMode {
        assert!(
            (1..=self.operand_count()).contains(&n),
            "{} has no operand {}", self.opcode, n
        );
        self.modes[n - 1]
    }

    /// Encode back into an instruction word.
    pub fn encode(&self) -> Word {
        let mut word = self.opcode.code();
        let mut scale = 100;
        for mode in self.modes() {
            word += mode.digit() * scale;
            scale *= 10;
        }
        word
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        if !self.modes().is_empty() {
            f.write_str(" ")?;
            for mode in self.modes() {
                write!(f, "{}", mode)?;
            }
        }
        Ok(())
    }
}

/// Decode an instruction word.
///
/// Mode digits missing above the most significant digit are position mode.
/// Decoding only inspects `word`; it never touches machine state.
pub fn decode(word: Word) -> Result<Instruction, DecodeError> {
    let code = word % 100;
    let opcode = Opcode::from_code(code)
        .ok_or(DecodeError::InvalidOpcode { opcode: code, word })?;

    let mut modes = [AddrMode::Position; MAX_OPERANDS];
    let mut digits = word / 100;
    for (i, slot) in modes.iter_mut().take(opcode.operand_count()).enumerate() {
        let digit = digits % 10;
        *slot = AddrMode::from_digit(digit)
            .ok_or(DecodeError::InvalidMode { digit, operand: i + 1, word })?;
        digits /= 10;
    }

    Ok(Instruction { opcode, modes })
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DecodeError {
    #[error("invalid opcode {opcode} in word {word}")]
    InvalidOpcode { opcode: Word, word: Word },

    #[error("invalid mode {digit} for operand {operand} in word {word}")]
    InvalidMode { digit: Word, operand: usize, word: Word },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_halt() {
        let instr = decode(99).unwrap();
        assert_eq!(instr.opcode, Opcode::Halt);
        assert_eq!(instr.operand_count(), 0);
        assert_eq!(instr.width(), 1);
        assert!(instr.modes().is_empty());
    }

    #[test]
    fn test_decode_modes() {
        let instr = decode(1002).unwrap();
        assert_eq!(instr.opcode, Opcode::Mul);
        assert_eq!(
            instr.modes(),
            &[AddrMode::Position, AddrMode::Immediate, AddrMode::Position]
        );

        let instr = decode(21001).unwrap();
        assert_eq!(
            instr.modes(),
            &[AddrMode::Position, AddrMode::Immediate, AddrMode::Relative]
        );
    }

    #[test]
    fn test_missing_mode_digits_are_position() {
        let instr = decode(1).unwrap();
        assert_eq!(instr.modes(), &[AddrMode::Position; 3]);

        let instr = decode(109).unwrap();
        assert_eq!(instr.opcode, Opcode::AdjustBase);
        assert_eq!(instr.mode(1), AddrMode::Immediate);
    }

    #[test]
    fn test_operand_counts() {
        for op in Opcode::ALL {
            let expected = match op.code() {
                1 | 2 | 7 | 8 => 3,
                5 | 6 => 2,
                3 | 4 | 9 => 1,
                _ => 0,
            };
            assert_eq!(op.operand_count(), expected, "{}", op);
            assert_eq!(Opcode::from_code(op.code()), Some(op));
        }
    }

    #[test]
    fn test_decode_is_idempotent() {
        for word in [1, 1002, 1105, 21101, 203, 99, 109] {
            assert_eq!(decode(word), decode(word));
        }
    }

    #[test]
    fn test_invalid_opcode() {
        assert_eq!(
            decode(42),
            Err(DecodeError::InvalidOpcode { opcode: 42, word: 42 })
        );
        assert!(decode(0).is_err());
        assert!(decode(-1).is_err());
    }

    #[test]
    fn test_invalid_mode() {
        assert_eq!(
            decode(301),
            Err(DecodeError::InvalidMode { digit: 3, operand: 1, word: 301 })
        );
        // Digits above the last operand are never inspected.
        assert!(decode(30004).is_ok());
    }

    #[test]
    fn test_encode_matches_word() {
        for word in [1, 1002, 1105, 21101, 203, 99, 109, 22207] {
            assert_eq!(decode(word).unwrap().encode(), word);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(decode(21001).unwrap().to_string(), "ADD *-^");
        assert_eq!(decode(104).unwrap().to_string(), "OUT -");
        assert_eq!(decode(99).unwrap().to_string(), "HALT");
    }

    #[test]
    #[should_panic]
    fn test_mode_out_of_range() {
        decode(104).unwrap().mode(2);
    }
}
