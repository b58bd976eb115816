//! Intcode machine emulation.
//!
//! This module implements the complete machine:
//! - a flat, fixed-capacity memory of signed 64-bit words
//! - two registers: the program counter and the relative base offset
//! - a ten-opcode instruction set with three addressing modes

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;

/// A single memory cell / machine integer.
pub type Word = i64;

pub use memory::{Memory, MemoryError};
pub use registers::Registers;
pub use decode::{decode, AddrMode, DecodeError, Instruction, Opcode};
pub use execute::{Machine, MachineError, MachineState, Snapshot};
