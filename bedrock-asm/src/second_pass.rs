use bedrock_exe::{LoadableFile, MemoryBlock};

use crate::error::AssembleError;
use crate::relocatable::RelocatableFile;
use crate::LOAD_ADDRESS;

/// Encode every record of a checked unit into a loadable file.
///
/// The output is a single contiguous block at the load address: the
/// concatenation of each record's emission, wrapped in a file with one
/// block and zero flags.
pub fn second_pass(file: &RelocatableFile) -> Result<LoadableFile, AssembleError> {
    let mut words = Vec::new();
    for record in file.records() {
        words.extend(record.assemble(file.symbols())?);
    }

    tracing::debug!(words = words.len(), "second pass complete");
    Ok(LoadableFile::new(
        0,
        vec![MemoryBlock::new(LOAD_ADDRESS, words)],
    ))
}
