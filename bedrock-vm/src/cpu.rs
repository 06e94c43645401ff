use bedrock_asm::{Instruction, Opcode, RegisterId, Word, IMM_NIBBLE};

use crate::bus::Bus;
use crate::error::MachineError;
use crate::register::RegisterBank;
use crate::status::Status;

/// A resolved instruction operand.
///
/// Register operands alias the bank, so writes persist. Immediate operands
/// are scratch cells created for the tick: writes mutate the scratch and
/// are lost when the tick completes. Both operands of one instruction may
/// be scratches holding the same immediate field.
#[derive(Debug, Clone, Copy)]
enum Operand {
    Register(RegisterId),
    Immediate(Word),
}

impl Operand {
    fn get(&self, registers: &RegisterBank) -> Word {
        match self {
            Self::Register(id) => registers.read(*id),
            Self::Immediate(value) => *value,
        }
    }

    fn set(&mut self, registers: &mut RegisterBank, value: Word) {
        match self {
            Self::Register(id) => registers.write(*id, value),
            Self::Immediate(scratch) => *scratch = value,
        }
    }
}

/// The fetch-decode-execute engine.
pub struct Cpu {
    registers: RegisterBank,
    bus: Bus,
}

impl Cpu {
    /// Build a CPU over a register bank and a bus.
    pub fn new(registers: RegisterBank, bus: Bus) -> Self {
        Self { registers, bus }
    }

    /// The register bank.
    pub fn registers(&self) -> &RegisterBank {
        &self.registers
    }

    /// Mutable access to the register bank.
    pub fn registers_mut(&mut self) -> &mut RegisterBank {
        &mut self.registers
    }

    /// Mutable access to the bus.
    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    /// Whether the halt bit is set.
    pub fn halted(&self) -> bool {
        self.registers.read(RegisterId::SR) & Status::HALT.bits() != 0
    }

    /// One fetch-decode-execute cycle.
    ///
    /// Fetches the word at PC into IR, increments PC, and dispatches. A
    /// failed fetch returns the bus error with PC untouched. A failed
    /// dispatch (reserved register, unknown opcode) halts the machine and
    /// returns the error.
    pub fn tick(&mut self) -> Result<(), MachineError> {
        if self.halted() {
            return Err(MachineError::Halted);
        }

        let pc = self.registers.read(RegisterId::PC);
        let word = self.bus.read(pc)?;
        self.registers.write(RegisterId::IR, word);
        self.registers.write(RegisterId::PC, pc.wrapping_add(1));

        let instruction = Instruction::from_word(word);
        tracing::trace!(pc = format_args!("{pc:#06x}"), %instruction, "tick");

        let result = self.execute(instruction);
        if result.is_err() {
            self.flag(Status::HALT);
        }
        result
    }

    fn execute(&mut self, instruction: Instruction) -> Result<(), MachineError> {
        let i1 = self.operand(instruction.op1(), instruction.immediate())?;
        let mut i2 = self.operand(instruction.op2(), instruction.immediate())?;

        let op = match Opcode::try_from(instruction.opcode_byte()) {
            Ok(op) => op,
            Err(err) => {
                // Unknown opcodes stop the machine through the same path
                // as `SET 1 1`.
                self.op_set(&Operand::Immediate(1), &Operand::Immediate(1));
                return Err(err.into());
            }
        };

        match op {
            Opcode::HALT => self.flag(Status::HALT),
            Opcode::READ => self.op_read(&i1, &mut i2),
            Opcode::WRITE => self.op_write(&i1, &i2),
            Opcode::COPY => {
                let value = i1.get(&self.registers);
                i2.set(&mut self.registers, value);
            }
            Opcode::ADD => self.op_add(&i1, &mut i2),
            Opcode::SUB => self.op_sub(&i1, &mut i2),
            Opcode::MUL => self.op_mul(&i1, &mut i2),
            Opcode::DIV => self.op_div(&i1, &mut i2),
            Opcode::STAT => self.op_stat(&i1, &mut i2),
            Opcode::SET => self.op_set(&i1, &i2),
            Opcode::PUSH => self.op_push(&i1),
            Opcode::POP => self.op_pop(&mut i2),
            Opcode::JMP => {
                let target = i1.get(&self.registers);
                self.registers.write(RegisterId::PC, target);
            }
            Opcode::LESS => self.skip_unless(|a, b| a < b, &i1, &i2),
            Opcode::LTE => self.skip_unless(|a, b| a <= b, &i1, &i2),
            Opcode::GT => self.skip_unless(|a, b| a > b, &i1, &i2),
            Opcode::GTE => self.skip_unless(|a, b| a >= b, &i1, &i2),
            Opcode::EQ => self.skip_unless(|a, b| a == b, &i1, &i2),
            Opcode::CALL => self.op_call(&i1),
            Opcode::RETURN => self.op_return(),
        }

        Ok(())
    }

    /// Resolve an operand nibble, creating a scratch for the immediate
    /// sentinel.
    fn operand(&self, nibble: u8, immediate: Word) -> Result<Operand, MachineError> {
        if nibble == IMM_NIBBLE {
            return Ok(Operand::Immediate(immediate));
        }
        RegisterId::from_nibble(nibble)
            .map(Operand::Register)
            .ok_or(MachineError::NoSuchRegister(nibble))
    }

    fn sr(&self) -> Word {
        self.registers.read(RegisterId::SR)
    }

    fn flag(&mut self, status: Status) {
        let sr = self.sr() | status.bits();
        self.registers.write(RegisterId::SR, sr);
    }

    fn op_read(&mut self, i1: &Operand, i2: &mut Operand) {
        match self.bus.read(i1.get(&self.registers)) {
            Ok(value) => i2.set(&mut self.registers, value),
            Err(_) => self.flag(Status::MEMORY_ERROR),
        }
    }

    fn op_write(&mut self, i1: &Operand, i2: &Operand) {
        let value = i1.get(&self.registers);
        let address = i2.get(&self.registers);
        if self.bus.write(address, value).is_err() {
            self.flag(Status::MEMORY_ERROR);
        }
    }

    fn op_add(&mut self, i1: &Operand, i2: &mut Operand) {
        let sum = i1.get(&self.registers) as u64 + i2.get(&self.registers) as u64;
        if sum > 0xFFFF_FFFF {
            self.flag(Status::OVERFLOW);
        }
        i2.set(&mut self.registers, sum as Word);
    }

    fn op_sub(&mut self, i1: &Operand, i2: &mut Operand) {
        let mut diff = i1.get(&self.registers) as i64 - i2.get(&self.registers) as i64;
        if diff < 0 {
            self.flag(Status::UNDERFLOW);
            // Documented quirk: the correction is 0xFFFFFFFF, one short of
            // a two's-complement wrap.
            diff += 0xFFFF_FFFF;
        }
        i2.set(&mut self.registers, diff as Word);
    }

    fn op_mul(&mut self, i1: &Operand, i2: &mut Operand) {
        let product = i1.get(&self.registers) as u64 * i2.get(&self.registers) as u64;
        if product > 0xFFFF_FFFF {
            self.flag(Status::OVERFLOW);
        }
        i2.set(&mut self.registers, product as Word);
    }

    fn op_div(&mut self, i1: &Operand, i2: &mut Operand) {
        let dividend = i1.get(&self.registers);
        let divisor = i2.get(&self.registers);
        if divisor == 0 {
            self.flag(Status::DIVIDE_BY_ZERO);
            return;
        }
        i2.set(&mut self.registers, dividend / divisor);
    }

    /// The 1-based status bit probed by STAT and SET. A bit index outside
    /// the word yields no probe at all.
    fn probe(&self, i1: &Operand) -> Word {
        let index = i1.get(&self.registers).wrapping_sub(1);
        if index < Word::BITS {
            1 << index
        } else {
            0
        }
    }

    fn op_stat(&mut self, i1: &Operand, i2: &mut Operand) {
        let probe = self.probe(i1);
        let value = if probe == 0 { 0 } else { (self.sr() & probe) / probe };
        i2.set(&mut self.registers, value);
    }

    fn op_set(&mut self, i1: &Operand, i2: &Operand) {
        let probe = self.probe(i1);
        if probe == 0 {
            return;
        }
        let sr = if i2.get(&self.registers) > 0 {
            self.sr() | probe
        } else {
            self.sr() ^ probe
        };
        self.registers.write(RegisterId::SR, sr);
    }

    fn op_push(&mut self, i1: &Operand) {
        let sp = self.registers.read(RegisterId::SP).wrapping_sub(1);
        self.registers.write(RegisterId::SP, sp);
        let value = i1.get(&self.registers);
        if self.bus.write(sp, value).is_err() {
            self.flag(Status::MEMORY_ERROR);
        }
    }

    fn op_pop(&mut self, i2: &mut Operand) {
        let sp = self.registers.read(RegisterId::SP);
        match self.bus.read(sp) {
            Ok(value) => {
                i2.set(&mut self.registers, value);
                self.registers.write(RegisterId::SP, sp.wrapping_add(1));
            }
            Err(_) => self.flag(Status::MEMORY_ERROR),
        }
    }

    fn skip_unless(&mut self, predicate: fn(Word, Word) -> bool, i1: &Operand, i2: &Operand) {
        if !predicate(i1.get(&self.registers), i2.get(&self.registers)) {
            let pc = self.registers.read(RegisterId::PC).wrapping_add(1);
            self.registers.write(RegisterId::PC, pc);
        }
    }

    fn op_call(&mut self, i1: &Operand) {
        let sp = self.registers.read(RegisterId::SP).wrapping_sub(1);
        self.registers.write(RegisterId::SP, sp);
        let pc = self.registers.read(RegisterId::PC);
        if self.bus.write(sp, pc).is_err() {
            self.flag(Status::MEMORY_ERROR);
            return;
        }
        let target = i1.get(&self.registers);
        self.registers.write(RegisterId::PC, target);
    }

    fn op_return(&mut self) {
        let sp = self.registers.read(RegisterId::SP);
        let value = self.bus.read(sp);
        self.registers.write(RegisterId::SP, sp.wrapping_add(1));
        match value {
            Ok(target) => self.registers.write(RegisterId::PC, target),
            Err(_) => self.flag(Status::MEMORY_ERROR),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use crate::memory::Memory;

    use super::*;

    /// A CPU over plain memory with `words` pre-written from 0x100.
    fn cpu(words: &[Word]) -> Cpu {
        let mut memory = Memory::new();
        for (offset, &word) in words.iter().enumerate() {
            use crate::bus::BusDevice;
            memory.write(0x100 + offset as Word, word).unwrap();
        }
        Cpu::new(RegisterBank::new(), Bus::new(vec![Box::new(memory)]))
    }

    fn reg(cpu: &Cpu, id: RegisterId) -> Word {
        cpu.registers().read(id)
    }

    #[test]
    fn halt_sets_the_halt_bit() {
        let mut cpu = cpu(&[0x0000_0000]);
        cpu.tick().unwrap();
        assert!(cpu.halted());
        assert_eq!(reg(&cpu, RegisterId::SR), Status::HALT.bits());
    }

    #[test]
    fn ticking_a_halted_machine_is_fatal() {
        let mut cpu = cpu(&[0x0000_0000]);
        cpu.tick().unwrap();
        let pc = reg(&cpu, RegisterId::PC);

        assert!(matches!(cpu.tick(), Err(MachineError::Halted)));
        assert_eq!(reg(&cpu, RegisterId::PC), pc);
    }

    #[test]
    fn read_moves_a_word_from_the_bus() {
        let mut cpu = cpu(&[0x0101_0000]);
        cpu.registers_mut().write(RegisterId::R0, 0x1000);
        cpu.bus_mut().write(0x1000, 0xFFFF).unwrap();

        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::R1), 0xFFFF);
    }

    #[test]
    fn read_from_an_unmapped_address_flags_memory_error() {
        let mut cpu = cpu(&[0x0101_0000]);
        cpu.registers_mut().write(RegisterId::R0, 0xFFFF);

        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::SR), Status::MEMORY_ERROR.bits());
        assert_eq!(reg(&cpu, RegisterId::R1), 0);
    }

    #[test]
    fn write_moves_a_word_to_the_bus() {
        let mut cpu = cpu(&[0x0201_0000]);
        cpu.registers_mut().write(RegisterId::R0, 0xFFFF);
        cpu.registers_mut().write(RegisterId::R1, 0x1000);

        cpu.tick().unwrap();
        assert_eq!(cpu.bus_mut().read(0x1000).unwrap(), 0xFFFF);
    }

    #[test]
    fn write_to_an_unmapped_address_flags_memory_error() {
        let mut cpu = cpu(&[0x021F_FFFF]);
        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::SR), Status::MEMORY_ERROR.bits());
    }

    #[test]
    fn copy_aliases_registers() {
        let mut cpu = cpu(&[0x0301_0000]);
        cpu.registers_mut().write(RegisterId::R0, 0xFFFF);

        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::R1), 0xFFFF);
    }

    #[test]
    fn copy_of_an_immediate_loads_it() {
        let mut cpu = cpu(&[0x03F0_0005]);
        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::R0), 0x05);
    }

    #[test]
    fn add_sums_into_the_second_operand() {
        let mut cpu = cpu(&[0x04F1_0003]);
        cpu.registers_mut().write(RegisterId::R1, 0x10);

        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::R1), 0x13);
        assert_eq!(reg(&cpu, RegisterId::SR), 0);
    }

    #[test]
    fn add_past_the_word_flags_overflow_and_truncates() {
        let mut cpu = cpu(&[0x04F1_0003]);
        cpu.registers_mut().write(RegisterId::R1, 0xFFFF_FFFE);

        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::R1), 0x1);
        assert_eq!(reg(&cpu, RegisterId::SR), Status::OVERFLOW.bits());
    }

    #[test]
    fn sub_subtracts_the_second_operand_from_the_first() {
        let mut cpu = cpu(&[0x05F1_0003]);
        cpu.registers_mut().write(RegisterId::R1, 0x02);

        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::R1), 0x1);
        assert_eq!(reg(&cpu, RegisterId::SR), 0);
    }

    #[test]
    fn negative_differences_flag_underflow_with_the_documented_correction() {
        let mut cpu = cpu(&[0x05F1_0003]);
        cpu.registers_mut().write(RegisterId::R1, 0x05);

        // 3 - 5 = -2; corrected by +0xFFFFFFFF, not a full wrap.
        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::R1), 0xFFFF_FFFD);
        assert_eq!(reg(&cpu, RegisterId::SR), Status::UNDERFLOW.bits());
    }

    #[test]
    fn mul_multiplies_into_the_second_operand() {
        let mut cpu = cpu(&[0x06F1_0003]);
        cpu.registers_mut().write(RegisterId::R1, 0x10);

        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::R1), 0x30);
        assert_eq!(reg(&cpu, RegisterId::SR), 0);
    }

    #[test]
    fn mul_past_the_word_flags_overflow_and_truncates() {
        let mut cpu = cpu(&[0x06F1_0003]);
        cpu.registers_mut().write(RegisterId::R1, 0xFFFF_FFFE);

        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::R1), 0xFFFF_FFFA);
        assert_eq!(reg(&cpu, RegisterId::SR), Status::OVERFLOW.bits());
    }

    #[test]
    fn div_divides_into_the_second_operand() {
        let mut cpu = cpu(&[0x07F1_0009]);
        cpu.registers_mut().write(RegisterId::R1, 0x03);

        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::R1), 0x03);
        assert_eq!(reg(&cpu, RegisterId::SR), 0);
    }

    #[test]
    fn a_zero_divisor_flags_and_skips_the_write() {
        let mut cpu = cpu(&[0x07F1_0003]);
        cpu.registers_mut().write(RegisterId::R1, 0x00);

        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::R1), 0x00);
        assert_eq!(reg(&cpu, RegisterId::SR), Status::DIVIDE_BY_ZERO.bits());
    }

    #[test]
    fn stat_probes_a_clear_bit() {
        let mut cpu = cpu(&[0x08F1_0001]);
        cpu.registers_mut().write(RegisterId::R1, 0x01);

        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::R1), 0x00);
    }

    #[test]
    fn stat_probes_a_set_bit() {
        let mut cpu = cpu(&[0x08F1_0002]);
        cpu.registers_mut().write(RegisterId::SR, 0x0A);

        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::R1), 0x01);
    }

    #[test]
    fn stat_with_a_zero_bit_index_stores_zero() {
        let mut cpu = cpu(&[0x08F1_0000]);
        cpu.registers_mut().write(RegisterId::SR, 0xFF);
        cpu.registers_mut().write(RegisterId::R1, 0x77);

        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::R1), 0x00);
    }

    #[test]
    fn set_raises_a_bit() {
        let mut cpu = cpu(&[0x09F1_0001]);
        cpu.registers_mut().write(RegisterId::R1, 0x01);

        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::SR), 0x01);
    }

    #[test]
    fn set_with_a_zero_second_operand_toggles_the_bit_off() {
        let mut cpu = cpu(&[0x09F1_0002]);
        cpu.registers_mut().write(RegisterId::SR, 0x0A);
        cpu.registers_mut().write(RegisterId::R1, 0x00);

        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::SR), 0x08);
    }

    #[test]
    fn set_with_a_zero_bit_index_leaves_sr_alone() {
        let mut cpu = cpu(&[0x09F1_0000]);
        cpu.registers_mut().write(RegisterId::SR, 0x0A);
        cpu.registers_mut().write(RegisterId::R1, 0x01);

        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::SR), 0x0A);
    }

    #[test]
    fn an_unknown_opcode_halts_and_errors() {
        let mut cpu = cpu(&[0xFFF1_0002]);

        let err = cpu.tick().unwrap_err();
        assert!(matches!(err, MachineError::UnknownOpcode(_)));
        assert_eq!(reg(&cpu, RegisterId::SR), Status::HALT.bits());
    }

    #[test]
    fn a_reserved_register_nibble_halts_and_errors() {
        let mut cpu = cpu(&[0x0341_0000]);

        let err = cpu.tick().unwrap_err();
        assert!(matches!(err, MachineError::NoSuchRegister(0x4)));
        assert!(cpu.halted());
    }

    #[test]
    fn an_unmapped_fetch_returns_the_bus_error_and_leaves_state_alone() {
        let mut cpu = cpu(&[]);
        cpu.registers_mut().write(RegisterId::PC, 0xFFFF);

        let err = cpu.tick().unwrap_err();
        assert!(matches!(err, MachineError::UnmappedRead(0xFFFF)));
        assert_eq!(reg(&cpu, RegisterId::PC), 0xFFFF);
        assert_eq!(reg(&cpu, RegisterId::SR), 0);
    }

    #[test]
    fn push_decrements_sp_then_stores() {
        let mut cpu = cpu(&[0x0AF0_0002]);

        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::SP), 0xFFDF);
        assert_eq!(cpu.bus_mut().read(0xFFDF).unwrap(), 0x02);
    }

    #[test]
    fn pop_loads_then_increments_sp() {
        let mut cpu = cpu(&[0x0BF0_0002]);
        cpu.registers_mut().write(RegisterId::SP, 0xFFDF);
        cpu.bus_mut().write(0xFFDF, 0x10).unwrap();

        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::SP), 0xFFE0);
        assert_eq!(reg(&cpu, RegisterId::R0), 0x10);
    }

    #[test]
    fn push_then_pop_restores_the_register_and_sp() {
        // PUSH R0, POP R1.
        let mut cpu = cpu(&[0x0A00_0000, 0x0B01_0000]);
        cpu.registers_mut().write(RegisterId::R0, 0xBEEF);

        cpu.tick().unwrap();
        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::R1), 0xBEEF);
        assert_eq!(reg(&cpu, RegisterId::SP), 0xFFE0);
    }

    #[test]
    fn jmp_loads_the_program_counter() {
        let mut cpu = cpu(&[0x0CF0_1000]);

        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::PC), 0x1000);
    }

    // Comparisons skip the next word when the predicate fails: a passing
    // predicate leaves PC at the next instruction, a failing one moves it
    // one further.
    #[test_case(0x0DF1_1000, 0x0FFF, 0x102 ; "less fails and skips")]
    #[test_case(0x0DF1_0EEE, 0x0FFF, 0x101 ; "less holds")]
    #[test_case(0x0EF1_1000, 0x0FFF, 0x102 ; "lte fails and skips")]
    #[test_case(0x0EF1_0FFF, 0x0FFF, 0x101 ; "lte holds at equality")]
    #[test_case(0x0FF1_0EEE, 0x0FFF, 0x102 ; "gt fails and skips")]
    #[test_case(0x0FF1_1000, 0x0FFF, 0x101 ; "gt holds")]
    #[test_case(0x10F1_0EEE, 0x0FFF, 0x102 ; "gte fails and skips")]
    #[test_case(0x10F1_0FFF, 0x0FFF, 0x101 ; "gte holds at equality")]
    #[test_case(0x11F1_0EEE, 0x1000, 0x102 ; "eq fails and skips")]
    #[test_case(0x11F1_1000, 0x1000, 0x101 ; "eq holds")]
    fn comparisons_skip_when_the_predicate_fails(word: Word, r1: Word, expected_pc: Word) {
        let mut cpu = cpu(&[word]);
        cpu.registers_mut().write(RegisterId::R1, r1);

        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::PC), expected_pc);
    }

    #[test]
    fn call_pushes_the_return_address_and_jumps() {
        let mut cpu = cpu(&[0x12F0_0200]);

        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::PC), 0x200);
        assert_eq!(reg(&cpu, RegisterId::SP), 0xFFDF);
        assert_eq!(cpu.bus_mut().read(0xFFDF).unwrap(), 0x101);
    }

    #[test]
    fn call_then_return_resumes_after_the_call() {
        let mut cpu = cpu(&[0x12F0_0200]);
        cpu.bus_mut().write(0x200, 0x1300_0000).unwrap();

        cpu.tick().unwrap();
        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::PC), 0x101);
        assert_eq!(reg(&cpu, RegisterId::SP), 0xFFE0);
    }

    #[test]
    fn writes_to_immediate_operands_are_discarded() {
        // ADD 0x10 0x20: both operands are scratches over the same
        // immediate; the result goes nowhere.
        let mut cpu = cpu(&[0x04FF_0010]);

        cpu.tick().unwrap();
        for id in [RegisterId::R0, RegisterId::R1, RegisterId::R2, RegisterId::R3] {
            assert_eq!(reg(&cpu, id), 0);
        }
        assert_eq!(reg(&cpu, RegisterId::SR), 0);
    }

    #[test]
    fn instructions_read_the_instruction_register() {
        let mut cpu = cpu(&[0x0301_0000]);
        cpu.tick().unwrap();
        assert_eq!(reg(&cpu, RegisterId::IR), 0x0301_0000);
    }
}
