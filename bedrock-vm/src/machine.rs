use std::io;

use bedrock_exe::LoadableFile;

use crate::bus::Bus;
use crate::cpu::Cpu;
use crate::error::MachineError;
use crate::memory::Memory;
use crate::register::RegisterBank;
use crate::terminal::Terminal;

/// A fully wired machine: CPU, registers, and a bus carrying the memory
/// and terminal devices.
pub struct Machine {
    cpu: Cpu,
}

impl Machine {
    /// A default machine with empty memory and a stdout terminal.
    pub fn new() -> Self {
        Self::with_terminal(Terminal::stdout())
    }

    /// A machine with empty memory and the given terminal.
    pub fn with_terminal<W: io::Write + 'static>(terminal: Terminal<W>) -> Self {
        let bus = Bus::new(vec![Box::new(Memory::new()), Box::new(terminal)]);
        Self {
            cpu: Cpu::new(RegisterBank::new(), bus),
        }
    }

    /// A machine with `file` loaded into memory, ready to run from the
    /// load address.
    pub fn boot(file: &LoadableFile) -> Result<Self, MachineError> {
        Self::boot_with_terminal(file, Terminal::stdout())
    }

    /// As [`Machine::boot`], with the given terminal.
    pub fn boot_with_terminal<W: io::Write + 'static>(
        file: &LoadableFile,
        terminal: Terminal<W>,
    ) -> Result<Self, MachineError> {
        let mut memory = Memory::new();
        memory.load(file)?;
        let bus = Bus::new(vec![Box::new(memory), Box::new(terminal)]);
        Ok(Self {
            cpu: Cpu::new(RegisterBank::new(), bus),
        })
    }

    /// One cycle.
    pub fn tick(&mut self) -> Result<(), MachineError> {
        self.cpu.tick()
    }

    /// Tick until the halt bit is set. Structural failures abort the run.
    pub fn run(&mut self) -> Result<(), MachineError> {
        let mut ticks = 0u64;
        while !self.cpu.halted() {
            self.cpu.tick()?;
            ticks += 1;
        }
        tracing::debug!(ticks, "machine halted");
        Ok(())
    }

    /// Whether the halt bit is set.
    pub fn halted(&self) -> bool {
        self.cpu.halted()
    }

    /// The register bank.
    pub fn registers(&self) -> &RegisterBank {
        self.cpu.registers()
    }

    /// Mutable access to the register bank.
    pub fn registers_mut(&mut self) -> &mut RegisterBank {
        self.cpu.registers_mut()
    }

    /// Mutable access to the bus, for inspecting or seeding memory.
    pub fn bus_mut(&mut self) -> &mut Bus {
        self.cpu.bus_mut()
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}
