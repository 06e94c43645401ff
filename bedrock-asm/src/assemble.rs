use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use bedrock_exe::LoadableFile;

use crate::error::AssembleError;
use crate::first_pass::first_pass;
use crate::import;
use crate::relocatable::RelocatableFile;
use crate::second_pass::second_pass;
use crate::LOAD_ADDRESS;

/// Assemble a complete source string.
///
/// String input carries no directory to search, so any import record
/// fails as an unresolved include.
pub fn assemble_str(source: &str) -> Result<LoadableFile, AssembleError> {
    assemble_reader(source.as_bytes(), &[])
}

/// Assemble from any buffered reader, resolving imports against
/// `include_dirs`.
pub fn assemble_reader<R: BufRead>(
    source: R,
    include_dirs: &[PathBuf],
) -> Result<LoadableFile, AssembleError> {
    let unit = first_pass(source, LOAD_ADDRESS)?;
    finish(unit, include_dirs, HashSet::new())
}

/// Assemble a root source file.
///
/// The file's own directory heads the include path, followed by
/// `include_dirs` in order. The root file itself counts as already
/// loaded, so a library importing it back is an import loop.
pub fn assemble_file<P: AsRef<Path>>(
    path: P,
    include_dirs: &[PathBuf],
) -> Result<LoadableFile, AssembleError> {
    let path = path.as_ref();

    let mut dirs = Vec::with_capacity(include_dirs.len() + 1);
    if let Some(parent) = path.parent() {
        dirs.push(parent.to_path_buf());
    }
    dirs.extend(include_dirs.iter().cloned());

    let mut visited = HashSet::new();
    visited.insert(path.canonicalize()?);

    let unit = {
        let source = File::open(path)?;
        first_pass(BufReader::new(source), LOAD_ADDRESS)?
    };
    finish(unit, &dirs, visited)
}

fn finish(
    mut unit: RelocatableFile,
    include_dirs: &[PathBuf],
    mut visited: HashSet<PathBuf>,
) -> Result<LoadableFile, AssembleError> {
    import::expand(&mut unit, include_dirs, &mut visited)?;
    unit.check()?;
    second_pass(&unit)
}
