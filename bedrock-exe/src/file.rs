use std::io;

use thiserror::Error;

/// Failures while reading or writing a loadable file.
#[derive(Debug, Error)]
pub enum FileError {
    /// The stream ended in the middle of the named field.
    #[error("short read while loading {field}")]
    ShortRead {
        /// The field that could not be read to completion.
        field: &'static str,
    },

    /// Underlying I/O failure other than a short read.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A contiguous run of words tagged with the address it loads at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryBlock {
    /// First word of memory this block occupies.
    pub address: u32,
    /// Number of words in the block, as serialized on disk.
    pub block_size: u32,
    /// The block contents.
    pub words: Vec<u32>,
}

impl MemoryBlock {
    /// Create a block whose size field matches its contents.
    pub fn new(address: u32, words: Vec<u32>) -> Self {
        Self {
            address,
            block_size: words.len() as u32,
            words,
        }
    }
}

/// The binary container produced by the assembler and consumed by the
/// memory loader.
///
/// Layout, all fields big-endian u32:
///
/// ```text
/// block_count
/// flags
/// repeat block_count times:
///     address
///     block_size
///     word_0 .. word_{block_size-1}
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadableFile {
    /// Number of blocks that follow the header.
    pub block_count: u32,
    /// Header flags. Currently always zero.
    pub flags: u32,
    /// The memory blocks, in file order.
    pub blocks: Vec<MemoryBlock>,
}

impl LoadableFile {
    /// Create a file whose block count matches its contents.
    pub fn new(flags: u32, blocks: Vec<MemoryBlock>) -> Self {
        Self {
            block_count: blocks.len() as u32,
            flags,
            blocks,
        }
    }

    /// Serialize into `w`. The exact inverse of [`LoadableFile::load`].
    pub fn save<W: io::Write>(&self, w: &mut W) -> Result<(), FileError> {
        write_word(w, self.block_count)?;
        write_word(w, self.flags)?;
        for block in &self.blocks {
            write_word(w, block.address)?;
            write_word(w, block.block_size)?;
            for &word in &block.words {
                write_word(w, word)?;
            }
        }
        Ok(())
    }

    /// Deserialize from `r`, failing on a short read of any field.
    pub fn load<R: io::Read>(r: &mut R) -> Result<Self, FileError> {
        let block_count = read_word(r, "block count")?;
        let flags = read_word(r, "flags")?;

        let mut blocks = Vec::new();
        for _ in 0..block_count {
            blocks.push(load_block(r)?);
        }

        Ok(Self {
            block_count,
            flags,
            blocks,
        })
    }
}

fn load_block<R: io::Read>(r: &mut R) -> Result<MemoryBlock, FileError> {
    let address = read_word(r, "block address")?;
    let block_size = read_word(r, "block size")?;

    let mut words = Vec::new();
    for _ in 0..block_size {
        words.push(read_word(r, "block word")?);
    }

    Ok(MemoryBlock {
        address,
        block_size,
        words,
    })
}

fn read_word<R: io::Read>(r: &mut R, field: &'static str) -> Result<u32, FileError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            FileError::ShortRead { field }
        } else {
            FileError::Io(e)
        }
    })?;
    Ok(u32::from_be_bytes(buf))
}

fn write_word<W: io::Write>(w: &mut W, word: u32) -> Result<(), FileError> {
    w.write_all(&word.to_be_bytes())?;
    Ok(())
}
