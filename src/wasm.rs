//! WebAssembly bindings for the Intcode machine.
//!
//! Input is pushed ahead of time and output collected, since nothing on the
//! JavaScript side can block on a read.

use wasm_bindgen::prelude::*;
use crate::cpu::{decode, Machine, Word};
use crate::io::{Collector, Queue};

/// Default memory capacity when JavaScript passes zero.
const DEFAULT_CAPACITY: usize = 4096;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WebAssembly-friendly machine wrapper.
#[wasm_bindgen]
pub struct WasmMachine {
    machine: Machine<Queue, Collector>,
    program: Vec<Word>,
    capacity: usize,
}

#[wasm_bindgen]
impl WasmMachine {
    /// Create a machine from a program image.
    #[wasm_bindgen(constructor)]
    pub fn new(program: Vec<i64>, capacity: usize) -> Result<WasmMachine, JsError> {
        let capacity = if capacity == 0 {
            DEFAULT_CAPACITY.max(program.len())
        } else {
            capacity
        };
        let machine = Machine::new("wasm", capacity, &program, Queue::new(), Collector::new())
            .map_err(|e| JsError::new(&e.to_string()))?;

        Ok(Self { machine, program, capacity })
    }

    /// Queue a value for the next input instruction.
    #[wasm_bindgen]
    pub fn push_input(&mut self, value: i64) {
        self.machine.input().push(value);
    }

    /// Remove and return all output produced so far.
    #[wasm_bindgen]
    pub fn take_output(&mut self) -> Vec<i64> {
        self.machine.output().take()
    }

    /// Step one instruction. Returns the decoded instruction.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        let instr = self.machine.step()
            .map_err(|e| JsError::new(&e.to_string()))?;

        Ok(instr.to_string())
    }

    /// Run until halt or max cycles. Returns the cycles executed.
    #[wasm_bindgen]
    pub fn run(&mut self, max_cycles: u32) -> Result<u64, JsError> {
        self.machine.run_limited(max_cycles as u64)
            .map_err(|e| JsError::new(&e.to_string()))
    }

    /// Reset the machine to the loaded program.
    #[wasm_bindgen]
    pub fn reset(&mut self) -> Result<(), JsError> {
        self.machine = Machine::new("wasm", self.capacity, &self.program, Queue::new(), Collector::new())
            .map_err(|e| JsError::new(&e.to_string()))?;
        Ok(())
    }

    #[wasm_bindgen]
    pub fn is_running(&self) -> bool {
        self.machine.is_running()
    }

    #[wasm_bindgen]
    pub fn is_halted(&self) -> bool {
        self.machine.is_halted()
    }

    /// Check if the machine halted on a fault.
    #[wasm_bindgen]
    pub fn is_broken(&self) -> bool {
        self.machine.is_broken()
    }

    #[wasm_bindgen]
    pub fn cycles(&self) -> u64 {
        self.machine.cycles()
    }

    #[wasm_bindgen]
    pub fn pc(&self) -> usize {
        self.machine.pc()
    }

    /// Get the relative base offset.
    #[wasm_bindgen]
    pub fn rbo(&self) -> i64 {
        self.machine.rbo()
    }

    /// Get memory cell value at an address (0 when out of range).
    #[wasm_bindgen]
    pub fn memory_at(&self, addr: i64) -> i64 {
        self.machine.read(addr).unwrap_or(0)
    }

    /// Get all memory.
    #[wasm_bindgen]
    pub fn memory_all(&self) -> Vec<i64> {
        self.machine.memory().as_slice().to_vec()
    }

    /// Render memory with the PC marked.
    #[wasm_bindgen]
    pub fn dump(&self) -> String {
        self.machine.dump()
    }

    /// Get the machine state as a JSON snapshot.
    #[wasm_bindgen]
    pub fn snapshot_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.machine.snapshot())
            .map_err(|e| JsError::new(&e.to_string()))
    }
}

/// Decode a single instruction word.
#[wasm_bindgen]
pub fn wasm_decode(word: i64) -> String {
    match decode(word) {
        Ok(instr) => instr.to_string(),
        Err(e) => format!("??? ; {}", e),
    }
}
