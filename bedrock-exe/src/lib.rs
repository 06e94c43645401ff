//! Loadable object files for the Bedrock machine.
//!
//! An assembled program is shipped as a [`LoadableFile`]: a header followed
//! by address-tagged [`MemoryBlock`]s that the memory device copies into
//! place. Every field on disk is a big-endian 32-bit word.

#![warn(missing_docs)]

mod file;

pub use file::{FileError, LoadableFile, MemoryBlock};
