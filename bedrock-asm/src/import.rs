use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use crate::error::AssembleError;
use crate::first_pass::first_pass;
use crate::record::RecordKind;
use crate::relocatable::RelocatableFile;

/// File extension appended to import names that lack one.
pub const SOURCE_EXTENSION: &str = ".bs";

/// Recursively expand every import record of `file`, merging each imported
/// unit in textual order.
///
/// Each import is resolved against `include_dirs` (first hit wins),
/// first-passed from counter zero, expanded itself, and only then merged
/// into `file`. `visited` holds canonicalized paths already loaded;
/// reaching one again is an import loop.
pub fn expand(
    file: &mut RelocatableFile,
    include_dirs: &[PathBuf],
    visited: &mut HashSet<PathBuf>,
) -> Result<(), AssembleError> {
    let names: Vec<String> = file
        .records()
        .iter()
        .filter_map(|record| match &record.kind {
            RecordKind::Import(Some(name)) => Some(name.clone()),
            _ => None,
        })
        .collect();

    for name in names {
        let path = resolve(&name, include_dirs)?;
        let canonical = path.canonicalize()?;
        if !visited.insert(canonical.clone()) {
            return Err(AssembleError::ImportCycle(canonical));
        }
        tracing::debug!(import = %name, path = %path.display(), "resolved import");

        // The handle is read to completion and closed before merging.
        let mut imported = {
            let source = File::open(&path)?;
            first_pass(BufReader::new(source), 0)?
        };
        expand(&mut imported, include_dirs, visited)?;
        file.merge(imported);
    }

    Ok(())
}

/// Locate `name` in the include path, appending the source extension when
/// missing. The first directory containing the file wins.
fn resolve(name: &str, include_dirs: &[PathBuf]) -> Result<PathBuf, AssembleError> {
    let file_name = if name.ends_with(SOURCE_EXTENSION) {
        name.to_string()
    } else {
        format!("{name}{SOURCE_EXTENSION}")
    };

    include_dirs
        .iter()
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| AssembleError::UnresolvedInclude(name.to_string()))
}
