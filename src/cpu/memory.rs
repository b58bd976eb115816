//! Machine memory.
//!
//! A flat array of words whose capacity is fixed when the machine is built.
//! Cells past the loaded program start at zero. Every access is bounds
//! checked; an address outside `[0, capacity)` is a fault, never a wrap.

use crate::cpu::Word;
use serde::{Serialize, Deserialize};

/// Cells per row in [`Memory::dump`].
const DUMP_ROW: usize = 10;

/// Fixed-capacity word memory.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Memory {
    cells: Vec<Word>,
}

impl Memory {
    /// Create a memory of `capacity` zeroed cells.
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: vec![0; capacity],
        }
    }

    /// Create a memory of `capacity` cells with `program` copied to address 0.
    pub fn with_program(capacity: usize, program: &[Word]) -> Result<Self, MemoryError> {
        let mut mem = Self::new(capacity);
        mem.load_program(program)?;
        Ok(mem)
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Check an address and convert it to a cell index.
    pub fn resolve(&self, addr: Word) -> Result<usize, MemoryError> {
        usize::try_from(addr)
            .ok()
            .filter(|&index| index < self.cells.len())
            .ok_or(MemoryError::AddressOutOfRange {
                addr,
                capacity: self.cells.len(),
            })
    }

    #[inline]
    pub fn read(&self, addr: Word) -> Result<Word, MemoryError> {
        let index = self.resolve(addr)?;
        Ok(self.cells[index])
    }

    #[inline]
    pub fn write(&mut self, addr: Word, value: Word) -> Result<(), MemoryError> {
        let index = self.resolve(addr)?;
        self.cells[index] = value;
        Ok(())
    }

    /// Copy a program to address 0 and zero everything after it.
    pub fn load_program(&mut self, program: &[Word]) -> Result<(), MemoryError> {
        if program.len() > self.cells.len() {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                capacity: self.cells.len(),
            });
        }

        self.cells[..program.len()].copy_from_slice(program);
        self.cells[program.len()..].fill(0);
        Ok(())
    }

    pub fn as_slice(&self) -> &[Word] {
        &self.cells
    }

    pub fn iter(&self) -> impl Iterator<Item = Word> + '_ {
        self.cells.iter().copied()
    }

    /// Render every cell for debugging, marking the cell at `pc` with `<`.
    ///
    /// Ten cells per row, each as `AAAA: VVVVVVVV`.
    pub fn dump(&self, pc: usize) -> String {
        let mut out = String::new();
        for (row, chunk) in self.cells.chunks(DUMP_ROW).enumerate() {
            let line: Vec<String> = chunk
                .iter()
                .enumerate()
                .map(|(i, value)| {
                    let addr = row * DUMP_ROW + i;
                    let marker = if addr == pc { "<" } else { "" };
                    format!("{:04}: {:08}{}", addr, value, marker)
                })
                .collect();
            out.push_str(&line.join("\t"));
            out.push('\n');
        }
        out
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|&&cell| cell != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("capacity", &self.cells.len())
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryError {
    /// Address is outside `[0, capacity)`.
    AddressOutOfRange { addr: Word, capacity: usize },
    /// Program is larger than the memory it is loaded into.
    ProgramTooLarge { size: usize, capacity: usize },
}

impl std::fmt::Display for MemoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryError::AddressOutOfRange { addr, capacity } => {
                write!(f, "memory address {} out of range (0-{})", addr, capacity.saturating_sub(1))
            }
            MemoryError::ProgramTooLarge { size, capacity } => {
                write!(f, "program size {} exceeds memory capacity {}", size, capacity)
            }
        }
    }
}

impl std::error::Error for MemoryError {}
