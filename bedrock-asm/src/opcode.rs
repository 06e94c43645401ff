use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::error::AssembleError;
use crate::literal;
use crate::record::SymbolTable;
use crate::register::{RegisterId, IMM_NIBBLE};
use crate::Word;

/// The byte could not be mapped to any known [`Opcode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unrecognised opcode {0:#04x}")]
pub struct InvalidOpcode(pub u8);

/// Instruction representation for the machine.
///
/// Every instruction occupies exactly one word: the opcode byte in the top
/// eight bits, two operand nibbles, and a 16-bit immediate field shared by
/// any operand encoded as [`IMM_NIBBLE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr)]
#[allow(clippy::upper_case_acronyms)]
#[repr(u8)]
pub enum Opcode {
    /// Stops the machine.
    ///
    /// | Operation   | `SR.HALT = 1` |
    /// | Syntax      | `HALT`        |
    /// | Encoding    | `0x00 - - -`  |
    HALT = 0x00,

    /// Reads a word from the bus.
    ///
    /// | Operation   | `i2 = bus[i1]`     |
    /// | Syntax      | `READ i1 i2`       |
    /// | Encoding    | `0x01 i1 i2 imm`   |
    ///
    /// Sets `SR.MEMORY_ERROR` and leaves `i2` untouched if the bus rejects
    /// the address. Accepts symbols.
    READ = 0x01,

    /// Writes a word to the bus.
    ///
    /// | Operation   | `bus[i2] = i1`     |
    /// | Syntax      | `WRITE i1 i2`      |
    /// | Encoding    | `0x02 i1 i2 imm`   |
    ///
    /// Sets `SR.MEMORY_ERROR` if the bus rejects the address. Accepts
    /// symbols.
    WRITE = 0x02,

    /// Copies the first operand into the second.
    ///
    /// | Operation   | `i2 = i1`          |
    /// | Syntax      | `COPY i1 i2`       |
    /// | Encoding    | `0x03 i1 i2 imm`   |
    COPY = 0x03,

    /// Adds the operands into the second.
    ///
    /// | Operation   | `i2 = (i1 + i2) mod 2^32` |
    /// | Syntax      | `ADD i1 i2`               |
    /// | Encoding    | `0x04 i1 i2 imm`          |
    ///
    /// Sets `SR.OVERFLOW` when the unwidened sum exceeds `0xFFFFFFFF`.
    ADD = 0x04,

    /// Subtracts the second operand from the first, into the second.
    ///
    /// | Operation   | `i2 = i1 - i2`     |
    /// | Syntax      | `SUB i1 i2`        |
    /// | Encoding    | `0x05 i1 i2 imm`   |
    ///
    /// A negative difference sets `SR.UNDERFLOW` and stores the difference
    /// plus `0xFFFFFFFF`, truncated to 32 bits.
    SUB = 0x05,

    /// Multiplies the operands into the second.
    ///
    /// | Operation   | `i2 = (i1 * i2) mod 2^32` |
    /// | Syntax      | `MUL i1 i2`               |
    /// | Encoding    | `0x06 i1 i2 imm`          |
    ///
    /// Sets `SR.OVERFLOW` when the unwidened product exceeds `0xFFFFFFFF`.
    MUL = 0x06,

    /// Integer-divides the first operand by the second, into the second.
    ///
    /// | Operation   | `i2 = i1 / i2`     |
    /// | Syntax      | `DIV i1 i2`        |
    /// | Encoding    | `0x07 i1 i2 imm`   |
    ///
    /// A zero divisor sets `SR.DIVIDE_BY_ZERO` and leaves `i2` untouched.
    DIV = 0x07,

    /// Probes status bit `i1` (1-based) into `i2`.
    STAT = 0x08,

    /// Sets status bit `i1` (1-based) when `i2 > 0`, otherwise toggles it
    /// off.
    SET = 0x09,

    /// Pushes the first operand onto the stack.
    ///
    /// | Operation   | `SP -= 1; bus[SP] = i1` |
    /// | Syntax      | `PUSH i1`               |
    /// | Encoding    | `0x0A i1 - imm`         |
    PUSH = 0x0A,

    /// Pops the top of the stack into the second operand.
    ///
    /// | Operation   | `i2 = bus[SP]; SP += 1` |
    /// | Syntax      | `POP i2`                |
    /// | Encoding    | `0x0B - i2 imm`         |
    POP = 0x0B,

    /// Jumps to the first operand.
    ///
    /// | Operation   | `PC = i1`       |
    /// | Syntax      | `JMP i1`        |
    /// | Encoding    | `0x0C i1 - imm` |
    ///
    /// Accepts symbols.
    JMP = 0x0C,

    /// Skips the next word unless `i1 < i2`.
    LESS = 0x0D,

    /// Skips the next word unless `i1 <= i2`.
    LTE = 0x0E,

    /// Skips the next word unless `i1 > i2`.
    GT = 0x0F,

    /// Skips the next word unless `i1 >= i2`.
    GTE = 0x10,

    /// Skips the next word unless `i1 == i2`.
    EQ = 0x11,

    /// Calls a subroutine at the first operand.
    ///
    /// | Operation   | `SP -= 1; bus[SP] = PC; PC = i1` |
    /// | Syntax      | `CALL i1`                        |
    /// | Encoding    | `0x12 i1 - imm`                  |
    ///
    /// Accepts symbols.
    CALL = 0x12,

    /// Returns from a subroutine.
    ///
    /// | Operation   | `PC = bus[SP]; SP += 1` |
    /// | Syntax      | `RETURN`                |
    /// | Encoding    | `0x13 - - -`            |
    RETURN = 0x13,
}

impl Opcode {
    /// The source mnemonic of this opcode.
    pub fn mnemonic(self) -> &'static str {
        self.into()
    }

    /// The instruction word with only the opcode byte populated.
    pub const fn mask(self) -> Word {
        (self as Word) << 24
    }

    /// Whether the instruction takes a first operand.
    pub const fn has_i1(self) -> bool {
        !matches!(self, Self::HALT | Self::POP | Self::RETURN)
    }

    /// Whether the instruction takes a second operand.
    pub const fn has_i2(self) -> bool {
        !matches!(
            self,
            Self::HALT | Self::PUSH | Self::JMP | Self::CALL | Self::RETURN
        )
    }

    /// Whether operands may name symbols from the symbol table.
    pub const fn accepts_symbols(self) -> bool {
        matches!(self, Self::READ | Self::WRITE | Self::JMP | Self::CALL)
    }

    /// Encode one source line carrying this mnemonic into an instruction
    /// word.
    ///
    /// The operand columns start at column 1, or column 2 when a label
    /// precedes the mnemonic. Each operand is tried as a register name,
    /// then (when the opcode accepts symbols) as a symbol, then as a
    /// numeric literal placed in the immediate field.
    pub fn assemble_line(
        self,
        source: &str,
        symbols: &SymbolTable,
    ) -> Result<Vec<Word>, AssembleError> {
        let cols: Vec<&str> = source.split(' ').collect();
        let mut idx = if cols.first().copied() == Some(self.mnemonic()) {
            1
        } else {
            2
        };

        let mut word = self.mask();
        for (present, shift) in [(self.has_i1(), 20), (self.has_i2(), 16)] {
            if !present {
                continue;
            }
            let col = cols
                .get(idx)
                .copied()
                .ok_or(AssembleError::MissingOperands(self.mnemonic()))?;
            word |= encode_operand(col, shift, self.accepts_symbols(), symbols)?;
            idx += 1;
        }

        Ok(vec![word])
    }
}

impl TryFrom<u8> for Opcode {
    type Error = InvalidOpcode;

    fn try_from(byte: u8) -> Result<Self, InvalidOpcode> {
        use Opcode::*;
        match byte {
            0x00 => Ok(HALT),
            0x01 => Ok(READ),
            0x02 => Ok(WRITE),
            0x03 => Ok(COPY),
            0x04 => Ok(ADD),
            0x05 => Ok(SUB),
            0x06 => Ok(MUL),
            0x07 => Ok(DIV),
            0x08 => Ok(STAT),
            0x09 => Ok(SET),
            0x0A => Ok(PUSH),
            0x0B => Ok(POP),
            0x0C => Ok(JMP),
            0x0D => Ok(LESS),
            0x0E => Ok(LTE),
            0x0F => Ok(GT),
            0x10 => Ok(GTE),
            0x11 => Ok(EQ),
            0x12 => Ok(CALL),
            0x13 => Ok(RETURN),
            _ => Err(InvalidOpcode(byte)),
        }
    }
}

fn encode_operand(
    col: &str,
    shift: u32,
    symbols_allowed: bool,
    symbols: &SymbolTable,
) -> Result<Word, AssembleError> {
    if let Ok(reg) = col.parse::<RegisterId>() {
        return Ok((reg.nibble() as Word) << shift);
    }

    if symbols_allowed {
        if let Some(symbol) = symbols.get(col) {
            return Ok(((IMM_NIBBLE as Word) << shift) | (symbol.address & 0xFFFF));
        }
    }

    let value =
        literal::parse(col).map_err(|_| AssembleError::UnknownSymbol(col.to_string()))?;
    Ok(((IMM_NIBBLE as Word) << shift) | (value & 0xFFFF))
}
