use bedrock_asm::Word;
use bedrock_exe::LoadableFile;

use crate::bus::{AddressRange, BusDevice};
use crate::consts::{MAX_MEMORY_ADDRESS, MEMORY_WORDS};
use crate::error::MachineError;

/// The main memory device: a flat word array answering to
/// `0x0000..=0xFFE0`.
pub struct Memory {
    mem: Vec<Word>,
}

impl Memory {
    /// Fresh, zeroed memory.
    pub fn new() -> Self {
        Self {
            mem: vec![0; MEMORY_WORDS],
        }
    }

    /// Copy a loadable file into memory.
    ///
    /// Every block is bounds-checked before anything is copied, so a file
    /// that does not fit leaves memory untouched.
    pub fn load(&mut self, file: &LoadableFile) -> Result<(), MachineError> {
        for block in &file.blocks {
            let size = block.block_size.max(block.words.len() as Word);
            let fits = block
                .address
                .checked_add(size)
                .map(|end| end <= MAX_MEMORY_ADDRESS)
                .unwrap_or(false);
            if !fits {
                return Err(MachineError::BlockOutOfBounds {
                    address: block.address,
                    size,
                });
            }
        }

        for block in &file.blocks {
            let start = block.address as usize;
            self.mem[start..start + block.words.len()].copy_from_slice(&block.words);
        }

        tracing::debug!(blocks = file.blocks.len(), "loaded file into memory");
        Ok(())
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl BusDevice for Memory {
    fn range(&self) -> AddressRange {
        AddressRange::new(0x0000, MAX_MEMORY_ADDRESS)
    }

    fn read(&mut self, address: Word) -> Result<Word, MachineError> {
        if address > MAX_MEMORY_ADDRESS {
            return Err(MachineError::AddressOutOfRange(address));
        }
        Ok(self.mem[address as usize])
    }

    fn write(&mut self, address: Word, value: Word) -> Result<(), MachineError> {
        if address > MAX_MEMORY_ADDRESS {
            return Err(MachineError::AddressOutOfRange(address));
        }
        self.mem[address as usize] = value;
        Ok(())
    }
}
