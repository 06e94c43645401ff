use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Assembler error variants.
///
/// Parse problems found during the first pass are aggregated into a single
/// [`AssembleError::Report`] per compilation unit; the remaining variants
/// surface individually from import resolution or the second pass.
#[derive(Debug, Error)]
pub enum AssembleError {
    /// One or more lines failed to parse. The payload is a multi-line
    /// report covering every problem found in the unit.
    #[error("assembly failed:\n{0}")]
    Report(String),

    /// An operand or ADDRESS argument named neither a register, a known
    /// symbol, nor a literal.
    #[error("unrecognised symbol {0:?}")]
    UnknownSymbol(String),

    /// A numeric literal did not parse under the 0x/0b/octal/decimal rules.
    #[error("unparseable literal {0:?}")]
    BadLiteral(String),

    /// An instruction or directive line ended before all its operands.
    #[error("not enough arguments to {0}")]
    MissingOperands(&'static str),

    /// No include directory contains the imported file.
    #[error("could not locate import {0:?} in the include path")]
    UnresolvedInclude(String),

    /// An imported file was reached a second time while expanding imports.
    #[error("import loop detected at {}", .0.display())]
    ImportCycle(PathBuf),

    /// Failure reading a source file.
    #[error(transparent)]
    Io(#[from] io::Error),
}
