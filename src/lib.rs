//! # Intcode VM
//!
//! An interpreter for the Intcode virtual machine: ten opcodes over a flat
//! integer memory, with position, immediate and relative addressing.
//!
//! A [`Machine`] talks to the outside world only through the [`Input`] and
//! [`Output`] capabilities, so the same engine runs as a console program,
//! over prepared buffers, or as one node of a network of machines linked by
//! channels.

pub mod cpu;
pub mod io;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use cpu::{
    decode, AddrMode, DecodeError, Instruction, Machine, MachineError, MachineState, Memory,
    MemoryError, Opcode, Registers, Snapshot, Word,
};
pub use io::{Input, IoError, Output};
