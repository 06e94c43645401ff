use std::io;

use bedrock_asm::{InvalidOpcode, Word};
use thiserror::Error;

/// Runtime error variants of the machine.
///
/// User-induced conditions (overflow, underflow, divide by zero, unmapped
/// data accesses mid-instruction) never surface here; they set status
/// register bits and execution continues. These variants are the
/// structural failures: bad fetches, contract violations, and attempts to
/// drive a stopped machine.
#[derive(Debug, Error)]
pub enum MachineError {
    /// No device on the bus maps the address of a read.
    #[error("bus read: unmapped address {0:#x}")]
    UnmappedRead(Word),

    /// No device on the bus maps the address of a write.
    #[error("bus write: unmapped address {0:#x}")]
    UnmappedWrite(Word),

    /// The memory device rejected an address outside its range.
    #[error("address {0:#x} out of range")]
    AddressOutOfRange(Word),

    /// An operand nibble named a reserved register.
    #[error("no such register {0:#x}")]
    NoSuchRegister(u8),

    /// A tick was requested with the halt bit already set.
    #[error("cannot tick on a halted machine")]
    Halted,

    /// The fetched word's opcode byte is not part of the instruction set.
    #[error(transparent)]
    UnknownOpcode(#[from] InvalidOpcode),

    /// A loadable block does not fit the memory device.
    #[error("block at {address:#x} with size {size} does not fit memory")]
    BlockOutOfBounds {
        /// The block's load address.
        address: Word,
        /// The block's word count.
        size: Word,
    },

    /// A device's backing stream failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}
