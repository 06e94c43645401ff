use std::io;

use bedrock_asm::Word;

use crate::bus::{AddressRange, BusDevice};
use crate::error::MachineError;

/// Writing here emits the value as a Unicode scalar.
pub const TERMINAL_CHAR: Word = 0xFFE1;
/// Writing here emits the value as a decimal integer.
pub const TERMINAL_INT: Word = 0xFFE2;
/// Cursor X position. Reserved.
pub const TERMINAL_CURSOR_X: Word = 0xFFE3;
/// Cursor Y position. Reserved.
pub const TERMINAL_CURSOR_Y: Word = 0xFFE4;
/// Last address of the terminal window. Reserved.
pub const TERMINAL_END: Word = 0xFFE5;

/// The memory-mapped terminal at `0xFFE1..=0xFFE5`.
///
/// Generic over its output stream so tests can capture what a program
/// prints; the stock machine writes to stdout. Reads return zero until
/// terminal input exists.
pub struct Terminal<W> {
    out: W,
}

impl Terminal<io::Stdout> {
    /// A terminal backed by standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: io::Write> Terminal<W> {
    /// A terminal backed by an arbitrary writer.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Give back the output stream.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: io::Write> BusDevice for Terminal<W> {
    fn range(&self) -> AddressRange {
        AddressRange::new(TERMINAL_CHAR, TERMINAL_END)
    }

    fn read(&mut self, _address: Word) -> Result<Word, MachineError> {
        Ok(0)
    }

    fn write(&mut self, address: Word, value: Word) -> Result<(), MachineError> {
        match address {
            TERMINAL_CHAR => {
                let ch = char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER);
                write!(self.out, "{ch}")?;
            }
            TERMINAL_INT => write!(self.out, "{value}")?,
            _ => {}
        }
        Ok(())
    }
}
