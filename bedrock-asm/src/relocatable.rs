use std::collections::hash_map::Entry;

use itertools::Itertools;

use crate::error::AssembleError;
use crate::record::{Record, RecordKind, SymbolKind, SymbolTable};
use crate::Word;

/// The output of the first pass: an ordered record list plus the symbol
/// table, still relocatable because symbol addresses are plain counters.
#[derive(Debug, Clone, Default)]
pub struct RelocatableFile {
    origin: Word,
    records: Vec<Record>,
    symbols: SymbolTable,
}

impl RelocatableFile {
    /// An empty file whose counter starts at `origin`.
    pub fn new(origin: Word) -> Self {
        Self {
            origin,
            records: Vec::new(),
            symbols: SymbolTable::new(),
        }
    }

    /// The records in source order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// The symbol table.
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// The address one past the last emitted word; merged files are
    /// re-based to start here.
    pub fn end(&self) -> Word {
        self.records
            .last()
            .map(|record| record.address + record.size())
            .unwrap_or(self.origin)
    }

    /// Append a record, entering its label into the symbol table. A label
    /// already present downgrades the existing entry to a duplicate
    /// without replacing it.
    pub fn push(&mut self, record: Record) {
        if let Some(label) = record.label.clone() {
            match self.symbols.entry(label) {
                Entry::Occupied(mut existing) => {
                    existing.get_mut().kind = SymbolKind::Duplicate;
                }
                Entry::Vacant(slot) => {
                    slot.insert(record.symbol());
                }
            }
        }
        self.records.push(record);
    }

    /// Merge an imported file into this one.
    ///
    /// Every incoming record is re-based by this file's [`end`] address,
    /// preserving order; labels collide under the same duplicate rule as
    /// [`push`].
    ///
    /// [`end`]: RelocatableFile::end
    /// [`push`]: RelocatableFile::push
    pub fn merge(&mut self, other: RelocatableFile) {
        let offset = self.end();
        for mut record in other.records {
            record.address += offset;
            self.push(record);
        }
    }

    /// Validate the merged unit, aggregating every problem into a single
    /// multi-line report: invalid lines, imports with no file name, and
    /// duplicate symbols.
    pub fn check(&self) -> Result<(), AssembleError> {
        let mut problems: Vec<String> = Vec::new();

        for record in &self.records {
            match &record.kind {
                RecordKind::Invalid => problems.push(format!(
                    "invalid line at {:#06x}: {:?}",
                    record.address, record.source
                )),
                RecordKind::Import(None) => problems.push(format!(
                    "IMPORT with no file name at {:#06x}",
                    record.address
                )),
                _ => {}
            }
        }

        problems.extend(
            self.symbols
                .iter()
                .filter(|(_, symbol)| symbol.kind == SymbolKind::Duplicate)
                .map(|(label, symbol)| {
                    format!("duplicate symbol {:?} at {:#06x}", label, symbol.address)
                })
                .sorted(),
        );

        if problems.is_empty() {
            Ok(())
        } else {
            Err(AssembleError::Report(problems.iter().join("\n")))
        }
    }
}
