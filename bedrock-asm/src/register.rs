use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Operand nibble marking the 16-bit immediate field instead of a register.
pub const IMM_NIBBLE: u8 = 0xF;

/// The named registers of the machine and their operand nibbles.
///
/// Nibbles `0x4..=0xA` are reserved: decoding one is a "no such register"
/// condition. `0xF` is not a register at all but the [`IMM_NIBBLE`]
/// sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr)]
#[allow(clippy::upper_case_acronyms)]
#[repr(u8)]
pub enum RegisterId {
    /// General purpose.
    R0 = 0x0,
    /// General purpose.
    R1 = 0x1,
    /// General purpose.
    R2 = 0x2,
    /// General purpose.
    R3 = 0x3,
    /// Stack pointer.
    SP = 0xB,
    /// Status register holding the machine flag bits.
    SR = 0xC,
    /// Program counter.
    PC = 0xD,
    /// Instruction register: the word fetched by the current tick.
    IR = 0xE,
}

impl RegisterId {
    /// The operand nibble encoding this register.
    pub const fn nibble(self) -> u8 {
        self as u8
    }

    /// Decode an operand nibble. Reserved nibbles and the immediate
    /// sentinel return `None`.
    pub const fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            0x0 => Some(Self::R0),
            0x1 => Some(Self::R1),
            0x2 => Some(Self::R2),
            0x3 => Some(Self::R3),
            0xB => Some(Self::SP),
            0xC => Some(Self::SR),
            0xD => Some(Self::PC),
            0xE => Some(Self::IR),
            _ => None,
        }
    }
}
