//! Execution engine.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::cpu::{Memory, Registers, Word};
use crate::cpu::decode::{self, AddrMode, DecodeError, Instruction, Opcode};
use crate::cpu::memory::MemoryError;
use crate::io::{Input, IoError, Output};
use log::{debug, trace, warn};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Machine execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineState {
    /// Executing instructions.
    Running,
    /// Stopped, cleanly or on a fault. Terminal.
    Halted,
}

/// An Intcode machine.
///
/// Owns its memory and registers exclusively. `I` and `O` are the
/// capabilities it reads input from and writes output to.
pub struct Machine<I, O> {
    name: String,
    mem: Memory,
    regs: Registers,
    state: MachineState,
    /// Set when the machine halted on a fault rather than a halt instruction.
    error: bool,
    fault: Option<MachineError>,
    cycles: u64,
    last_instr: Option<Instruction>,
    input: I,
    output: O,
}

impl<I: Input, O: Output> Machine<I, O> {
    /// Build a machine with `capacity` words of memory holding `program`.
    pub fn new(
        name: impl Into<String>,
        capacity: usize,
        program: &[Word],
        input: I,
        output: O,
    ) -> Result<Self, MachineError> {
        let name = name.into();
        let mem = Memory::with_program(capacity, program)?;
        debug!("{}: loaded {} words into {} cells", name, program.len(), capacity);

        Ok(Self {
            name,
            mem,
            regs: Registers::new(),
            state: MachineState::Running,
            error: false,
            fault: None,
            cycles: 0,
            last_instr: None,
            input,
            output,
        })
    }

    /// Rebuild a machine from a snapshot, attaching fresh capabilities.
    ///
    /// A snapshot carrying the error flag or a fault is restored halted,
    /// whatever state it records.
    pub fn restore(snapshot: Snapshot, input: I, output: O) -> Self {
        let error = snapshot.error || snapshot.fault.is_some();
        let state = if error { MachineState::Halted } else { snapshot.state };

        Self {
            name: snapshot.name,
            mem: snapshot.memory,
            regs: snapshot.registers,
            state,
            error,
            fault: snapshot.fault,
            cycles: snapshot.cycles,
            last_instr: None,
            input,
            output,
        }
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed. Any error halts the
    /// machine with the error flag set; stepping a halted machine fails with
    /// [`MachineError::NotRunning`] and changes nothing.
    pub fn step(&mut self) -> Result<Instruction, MachineError> {
        if self.state != MachineState::Running {
            return Err(MachineError::NotRunning { state: self.state });
        }

        match self.execute() {
            Ok(instr) => {
                self.cycles += 1;
                self.last_instr = Some(instr);
                Ok(instr)
            }
            Err(err) => {
                warn!("{}: fault at pc {}: {}", self.name, self.regs.pc, err);
                // An unknown opcode has no operands; step over its one word.
                if matches!(err, MachineError::Decode(DecodeError::InvalidOpcode { .. })) {
                    self.regs.advance(1);
                }
                self.state = MachineState::Halted;
                self.error = true;
                self.fault = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Run until halt or fault.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self) -> Result<u64, MachineError> {
        let start_cycles = self.cycles;

        while self.state == MachineState::Running {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, MachineError> {
        let start_cycles = self.cycles;
        let limit = self.cycles.saturating_add(max_cycles);

        while self.state == MachineState::Running && self.cycles < limit {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Fetch, decode and execute the instruction at the PC.
    fn execute(&mut self) -> Result<Instruction, MachineError> {
        let pc = self.regs.pc;
        let word = self.mem.read(pc as Word)?;
        let instr = decode::decode(word)?;
        trace!("{}: {:04} {}", self.name, pc, instr);

        let mut branched = false;
        match instr.opcode {
            Opcode::Add => {
                let value = self.operand_value(&instr, 1)?
                    .wrapping_add(self.operand_value(&instr, 2)?);
                self.store(&instr, 3, value)?;
            }

            Opcode::Mul => {
                let value = self.operand_value(&instr, 1)?
                    .wrapping_mul(self.operand_value(&instr, 2)?);
                self.store(&instr, 3, value)?;
            }

            Opcode::Input => {
                let dest = self.operand_location(&instr, 1)?;
                let value = self.input.get()?;
                self.mem.write(dest, value)?;
            }

            Opcode::Output => {
                let value = self.operand_value(&instr, 1)?;
                self.output.put(value)?;
            }

            Opcode::JumpIfTrue => {
                if self.operand_value(&instr, 1)? != 0 {
                    let target = self.branch_target(&instr)?;
                    self.regs.jump(target);
                    branched = true;
                }
            }

            Opcode::JumpIfFalse => {
                if self.operand_value(&instr, 1)? == 0 {
                    let target = self.branch_target(&instr)?;
                    self.regs.jump(target);
                    branched = true;
                }
            }

            Opcode::LessThan => {
                let less = self.operand_value(&instr, 1)? < self.operand_value(&instr, 2)?;
                self.store(&instr, 3, Word::from(less))?;
            }

            Opcode::Equals => {
                let equal = self.operand_value(&instr, 1)? == self.operand_value(&instr, 2)?;
                self.store(&instr, 3, Word::from(equal))?;
            }

            Opcode::AdjustBase => {
                let delta = self.operand_value(&instr, 1)?;
                self.regs.adjust_base(delta);
            }

            Opcode::Halt => {
                debug!("{}: halted at pc {} after {} cycles", self.name, pc, self.cycles + 1);
                self.state = MachineState::Halted;
            }
        }

        if !branched {
            self.regs.advance(instr.width());
        }

        Ok(instr)
    }

    /// Resolve the value of operand `n` (1-based) of the instruction at the PC.
    pub fn operand_value(&self, instr: &Instruction, n: usize) -> Result<Word, MachineError> {
        let raw = self.raw_operand(n)?;
        let value = match instr.mode(n) {
            AddrMode::Immediate => raw,
            mode => self.mem.read(self.regs.effective_address(raw, mode))?,
        };
        Ok(value)
    }

    /// Resolve the address operand `n` (1-based) designates.
    ///
    /// An immediate-mode destination is accepted and its raw word used as
    /// the address.
    pub fn operand_location(&self, instr: &Instruction, n: usize) -> Result<Word, MachineError> {
        let raw = self.raw_operand(n)?;
        let addr = self.regs.effective_address(raw, instr.mode(n));
        self.mem.resolve(addr)?;
        Ok(addr)
    }

    fn raw_operand(&self, n: usize) -> Result<Word, MachineError> {
        Ok(self.mem.read((self.regs.pc + n) as Word)?)
    }

    fn store(&mut self, instr: &Instruction, n: usize, value: Word) -> Result<(), MachineError> {
        let dest = self.operand_location(instr, n)?;
        self.mem.write(dest, value)?;
        Ok(())
    }

    /// Second operand of a jump, checked to lie inside memory.
    fn branch_target(&self, instr: &Instruction) -> Result<usize, MachineError> {
        let target = self.operand_value(instr, 2)?;
        Ok(self.mem.resolve(target)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pc(&self) -> usize {
        self.regs.pc
    }

    pub fn rbo(&self) -> Word {
        self.regs.rbo
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    /// Check if the machine is still executing.
    pub fn is_running(&self) -> bool {
        self.state == MachineState::Running
    }

    /// Check if the machine has halted, cleanly or not.
    pub fn is_halted(&self) -> bool {
        self.state == MachineState::Halted
    }

    /// Check if the machine halted on a fault.
    pub fn is_broken(&self) -> bool {
        self.error
    }

    /// The fault that halted the machine, if any.
    pub fn fault(&self) -> Option<&MachineError> {
        self.fault.as_ref()
    }

    /// Instructions executed so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.mem
    }

    pub fn read(&self, addr: Word) -> Result<Word, MemoryError> {
        self.mem.read(addr)
    }

    pub fn write(&mut self, addr: Word, value: Word) -> Result<(), MemoryError> {
        self.mem.write(addr, value)
    }

    pub fn input(&mut self) -> &mut I {
        &mut self.input
    }

    pub fn output(&mut self) -> &mut O {
        &mut self.output
    }

    /// Detach the I/O capabilities, consuming the machine.
    pub fn into_io(self) -> (I, O) {
        (self.input, self.output)
    }

    /// Render memory with the PC marked.
    pub fn dump(&self) -> String {
        self.mem.dump(self.regs.pc)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            name: self.name.clone(),
            memory: self.mem.clone(),
            registers: self.regs,
            state: self.state,
            error: self.error,
            fault: self.fault.clone(),
            cycles: self.cycles,
        }
    }
}

impl<I, O> std::fmt::Debug for Machine<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("error", &self.error)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .field("mem", &self.mem)
            .finish()
    }
}

/// Serializable copy of a machine's state, without its I/O.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    pub memory: Memory,
    pub registers: Registers,
    pub state: MachineState,
    pub error: bool,
    #[serde(default)]
    pub fault: Option<MachineError>,
    pub cycles: u64,
}

/// Errors that can occur during execution.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum MachineError {
    #[error("machine not running: {state:?}")]
    NotRunning { state: MachineState },

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{Collector, Queue};

    fn machine(program: &[Word]) -> Machine<Queue, Collector> {
        Machine::new("test", 64, program, Queue::new(), Collector::new()).unwrap()
    }

    #[test]
    fn test_halt() {
        let mut m = machine(&[99]);
        let executed = m.run().unwrap();

        assert_eq!(executed, 1);
        assert!(m.is_halted());
        assert!(!m.is_broken());
        assert_eq!(m.last_instruction().map(|i| i.opcode), Some(Opcode::Halt));
    }

    #[test]
    fn test_add_position_mode() {
        let mut m = machine(&[1, 0, 0, 0, 99]);
        m.run().unwrap();

        assert_eq!(m.read(0), Ok(2));
        assert!(!m.is_broken());
    }

    #[test]
    fn test_multiply() {
        let mut m = machine(&[2, 3, 0, 3, 99]);
        m.run().unwrap();
        assert_eq!(m.read(3), Ok(6));

        let mut m = machine(&[1002, 4, 3, 4, 33]);
        m.run().unwrap();
        assert_eq!(m.read(4), Ok(99));
    }

    #[test]
    fn test_immediate_output() {
        let mut m = machine(&[104, 50, 99]);
        m.run().unwrap();
        assert_eq!(m.output().values(), &[50]);
    }

    #[test]
    fn test_output_modes_agree() {
        // Value 50 reached through position, immediate and relative mode.
        let programs: [&[Word]; 3] = [
            &[4, 3, 99, 50],
            &[104, 50, 99],
            &[109, 1, 204, 4, 99, 50],
        ];
        for program in programs {
            let mut m = machine(program);
            m.run().unwrap();
            assert_eq!(m.output().values(), &[50], "{:?}", program);
        }
    }

    #[test]
    fn test_input_stores_value() {
        let mut m = Machine::new("io", 16, &[3, 5, 4, 5, 99], Queue::from(vec![17]), Collector::new())
            .unwrap();
        m.run().unwrap();
        assert_eq!(m.read(5), Ok(17));
        assert_eq!(m.output().values(), &[17]);
        assert!(m.input().is_empty());
    }

    #[test]
    fn test_relative_base_adjust() {
        // ARB +5, then write through relative operand 2 (absolute 7).
        let mut m = machine(&[109, 5, 21101, 3, 4, 2, 99]);
        m.step().unwrap();
        assert_eq!(m.rbo(), 5);

        let instr = m.step().unwrap();
        assert_eq!(instr.mode(3), AddrMode::Relative);
        assert_eq!(m.read(7), Ok(7));
    }

    #[test]
    fn test_relative_operand_location() {
        let mut m = machine(&[109, 5, 203, 2, 99]);
        m.step().unwrap();
        let instr = decode::decode(m.read(m.pc() as Word).unwrap()).unwrap();
        assert_eq!(m.operand_location(&instr, 1), Ok(7));
    }

    #[test]
    fn test_taken_jump_skips_advance() {
        let mut m = machine(&[1105, 1, 4, 99, 1101, 0, 0, 0, 99]);
        m.step().unwrap();
        assert_eq!(m.pc(), 4);
    }

    #[test]
    fn test_untaken_jump_advances() {
        let mut m = machine(&[1105, 0, 4, 99]);
        m.step().unwrap();
        assert_eq!(m.pc(), 3);

        let mut m = machine(&[1106, 7, 4, 99]);
        m.step().unwrap();
        assert_eq!(m.pc(), 3);

        let mut m = machine(&[1106, 0, 4, 99, 99]);
        m.step().unwrap();
        assert_eq!(m.pc(), 4);
    }

    #[test]
    fn test_compare() {
        // 8 < 9 -> [13] = 1, 8 == 9 -> [14] = 0
        let mut m = machine(&[1107, 8, 9, 13, 1108, 8, 9, 14, 99]);
        m.run().unwrap();
        assert_eq!(m.read(13), Ok(1));
        assert_eq!(m.read(14), Ok(0));
    }

    #[test]
    fn test_immediate_destination_is_literal_address() {
        // ADD with an immediate-mode destination writes to address 6.
        let mut m = machine(&[11101, 2, 3, 6, 99]);
        m.run().unwrap();
        assert_eq!(m.read(6), Ok(5));
        assert!(!m.is_broken());
    }

    #[test]
    fn test_invalid_opcode_halts_with_error() {
        let mut m = machine(&[42, 0, 0]);
        let err = m.step().unwrap_err();

        assert!(matches!(err, MachineError::Decode(DecodeError::InvalidOpcode { opcode: 42, .. })));
        assert!(m.is_halted());
        assert!(m.is_broken());
        assert_eq!(m.fault(), Some(&err));
        assert_eq!(m.pc(), 1);
        assert_eq!(m.cycles(), 0);

        let again = m.step().unwrap_err();
        assert_eq!(again, MachineError::NotRunning { state: MachineState::Halted });
        assert_eq!(m.pc(), 1);
        assert_eq!(m.fault(), Some(&err));
    }

    #[test]
    fn test_invalid_mode_halts_with_error() {
        let mut m = machine(&[301, 0, 99]);
        let err = m.run().unwrap_err();

        assert_eq!(
            err,
            MachineError::Decode(DecodeError::InvalidMode { digit: 3, operand: 1, word: 301 })
        );
        assert!(m.is_halted());
        assert!(m.is_broken());
        assert_eq!(m.pc(), 0);
        assert_eq!(m.read(0), Ok(301));
    }

    #[test]
    fn test_memory_fault_keeps_pc() {
        let mut m = Machine::new("oob", 4, &[104, 1, 4, 100], Queue::new(), Collector::new()).unwrap();
        assert!(matches!(m.run(), Err(MachineError::Memory(_))));
        assert_eq!(m.pc(), 2);
        assert_eq!(m.output().values(), &[1]);
    }

    #[test]
    fn test_halted_machine_does_not_step() {
        let mut m = machine(&[99, 104, 1, 99]);
        m.run().unwrap();
        assert!(m.step().is_err());
        assert!(m.output().values().is_empty());
        assert!(!m.is_broken());
    }

    #[test]
    fn test_out_of_range_read_faults() {
        let mut m = Machine::new("oob", 4, &[4, 100, 99], Queue::new(), Collector::new()).unwrap();
        let err = m.run().unwrap_err();
        assert_eq!(
            err,
            MachineError::Memory(MemoryError::AddressOutOfRange { addr: 100, capacity: 4 })
        );
        assert!(m.is_broken());
    }

    #[test]
    fn test_negative_relative_address_faults() {
        let mut m = machine(&[109, -10, 204, 0, 99]);
        let err = m.run().unwrap_err();
        assert!(matches!(
            err,
            MachineError::Memory(MemoryError::AddressOutOfRange { addr: -10, .. })
        ));
    }

    #[test]
    fn test_running_off_the_end_faults() {
        let mut m = Machine::new("end", 2, &[1101, 1], Queue::new(), Collector::new()).unwrap();
        assert!(matches!(m.run(), Err(MachineError::Memory(_))));
        assert_eq!(m.memory().as_slice(), &[1101, 1]);
    }

    #[test]
    fn test_jump_out_of_range_faults() {
        let mut m = Machine::new("jmp", 4, &[1105, 1, 50, 99], Queue::new(), Collector::new()).unwrap();
        assert!(matches!(m.step(), Err(MachineError::Memory(_))));
        assert_eq!(m.pc(), 0);
    }

    #[test]
    fn test_exhausted_input_faults() {
        let mut m = machine(&[3, 0, 99]);
        assert_eq!(m.run(), Err(MachineError::Io(IoError::Exhausted)));
        assert!(m.is_broken());
        assert_eq!(m.read(0), Ok(3));
    }

    #[test]
    fn test_program_too_large() {
        let result = Machine::new("big", 2, &[1, 0, 0, 0, 99], Queue::new(), Collector::new());
        assert!(matches!(
            result,
            Err(MachineError::Memory(MemoryError::ProgramTooLarge { size: 5, capacity: 2 }))
        ));
    }

    #[test]
    fn test_arithmetic_wraps() {
        let mut m = machine(&[1101, Word::MAX, 1, 5, 99]);
        m.run().unwrap();
        assert_eq!(m.read(5), Ok(Word::MIN));
    }

    #[test]
    fn test_run_limited() {
        // Infinite loop: jump to 0 forever.
        let mut m = machine(&[1105, 1, 0]);
        assert_eq!(m.run_limited(100), Ok(100));
        assert!(m.is_running());
        assert_eq!(m.cycles(), 100);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut m = machine(&[109, 3, 104, 9, 99]);
        m.step().unwrap();
        let snapshot = m.snapshot();

        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, snapshot);

        let mut resumed = Machine::restore(restored, Queue::new(), Collector::new());
        assert_eq!(resumed.rbo(), 3);
        assert_eq!(resumed.pc(), 2);
        resumed.run().unwrap();
        assert_eq!(resumed.output().values(), &[9]);
        assert_eq!(resumed.cycles(), 3);
    }

    #[test]
    fn test_restore_keeps_fault() {
        let mut m = machine(&[42]);
        let err = m.run().unwrap_err();

        let json = serde_json::to_string(&m.snapshot()).unwrap();
        let snapshot: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot.fault, Some(err.clone()));

        let mut restored = Machine::restore(snapshot, Queue::new(), Collector::new());
        assert!(restored.is_halted());
        assert!(restored.is_broken());
        assert_eq!(restored.fault(), Some(&err));
        assert_eq!(restored.pc(), 1);
        assert!(restored.step().is_err());
    }

    #[test]
    fn test_restore_halts_running_snapshot_with_error() {
        let mut snapshot = machine(&[104, 1, 99]).snapshot();
        snapshot.error = true;
        assert_eq!(snapshot.state, MachineState::Running);

        let mut restored = Machine::restore(snapshot, Queue::new(), Collector::new());
        assert!(restored.is_halted());
        assert!(restored.is_broken());
        assert_eq!(restored.fault(), None);
        assert!(restored.step().is_err());
        assert!(restored.output().values().is_empty());
    }

    #[test]
    fn test_snapshot_without_fault_field() {
        let json = r#"{"name":"old","memory":[99],"registers":{"pc":0,"rbo":0},"state":"Running","error":false,"cycles":0}"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.fault, None);

        let mut restored = Machine::restore(snapshot, Queue::new(), Collector::new());
        assert_eq!(restored.run(), Ok(1));
    }
}
