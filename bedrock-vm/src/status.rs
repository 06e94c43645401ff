use bedrock_asm::Word;

bitflags::bitflags! {
    /// Flag bits of the status register, combined by ORing.
    pub struct Status: Word {
        /// The machine has stopped.
        const HALT = 0x01;
        /// The last arithmetic operation produced more than 32 bits.
        const OVERFLOW = 0x02;
        /// The last subtraction produced a negative value.
        const UNDERFLOW = 0x04;
        /// The last division had a zero divisor.
        const DIVIDE_BY_ZERO = 0x08;
        /// The last bus access failed.
        const MEMORY_ERROR = 0x10;
    }
}
