use std::collections::HashMap;

use crate::directive::Directive;
use crate::error::AssembleError;
use crate::opcode::Opcode;
use crate::Word;

/// Label lookup table built by the first pass and consumed by the second.
pub type SymbolTable = HashMap<String, Symbol>;

/// A labelled entry in the symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// How the symbol may be used, or why it may not.
    pub kind: SymbolKind,
    /// The address of the first word the defining record emits.
    pub address: Word,
}

/// Classification of a symbol table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// A relocatable label usable as an operand.
    Rel,
    /// Defined more than once; assembling the unit is an error.
    Duplicate,
    /// Labels a line that failed to parse.
    Invalid,
    /// Labels an import record.
    Import,
    /// Labels a comment.
    Comment,
}

/// Classification of one source line, carrying its emit handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKind {
    /// A machine instruction line.
    Instruction(Opcode),
    /// An assembler directive line.
    Directive(Directive),
    /// An `IMPORT` line naming a library file, when it names one at all.
    Import(Option<String>),
    /// A comment or blank line.
    Comment,
    /// A line that matched no rule.
    Invalid,
}

/// The first-pass representation of one source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The label preceding the mnemonic, if any.
    pub label: Option<String>,
    /// What the line is, with the handle used to size and encode it.
    pub kind: RecordKind,
    /// The address at which this record's first emitted word will reside.
    pub address: Word,
    /// The raw source line.
    pub source: String,
}

impl Record {
    /// The number of words this record emits.
    pub fn size(&self) -> Word {
        match &self.kind {
            RecordKind::Instruction(_) => 1,
            RecordKind::Directive(directive) => directive.size(&self.source),
            RecordKind::Import(_) | RecordKind::Comment | RecordKind::Invalid => 0,
        }
    }

    /// Encode this record against the final symbol table.
    pub fn assemble(&self, symbols: &SymbolTable) -> Result<Vec<Word>, AssembleError> {
        match &self.kind {
            RecordKind::Instruction(op) => op.assemble_line(&self.source, symbols),
            RecordKind::Directive(directive) => directive.assemble(&self.source, symbols),
            RecordKind::Import(_) | RecordKind::Comment | RecordKind::Invalid => Ok(Vec::new()),
        }
    }

    /// The symbol table entry this record defines.
    pub fn symbol(&self) -> Symbol {
        let kind = match &self.kind {
            RecordKind::Instruction(_) | RecordKind::Directive(_) => SymbolKind::Rel,
            RecordKind::Import(_) => SymbolKind::Import,
            RecordKind::Comment => SymbolKind::Comment,
            RecordKind::Invalid => SymbolKind::Invalid,
        };
        Symbol {
            kind,
            address: self.address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_records_emit_one_word() {
        let record = Record {
            label: None,
            kind: RecordKind::Instruction(Opcode::ADD),
            address: 0x100,
            source: "ADD R0 R1".to_string(),
        };
        assert_eq!(record.size(), 1);
        assert_eq!(
            record.assemble(&SymbolTable::new()).unwrap(),
            vec![0x0401_0000]
        );
    }

    #[test]
    fn passive_records_emit_nothing() {
        for kind in [
            RecordKind::Import(Some("lib".to_string())),
            RecordKind::Comment,
            RecordKind::Invalid,
        ] {
            let record = Record {
                label: None,
                kind,
                address: 0x100,
                source: "whatever".to_string(),
            };
            assert_eq!(record.size(), 0);
            assert_eq!(record.assemble(&SymbolTable::new()).unwrap(), Vec::<Word>::new());
        }
    }

    #[test]
    fn labelled_records_define_rel_symbols() {
        let record = Record {
            label: Some("START".to_string()),
            kind: RecordKind::Instruction(Opcode::HALT),
            address: 0x104,
            source: "START HALT".to_string(),
        };
        let symbol = record.symbol();
        assert_eq!(symbol.kind, SymbolKind::Rel);
        assert_eq!(symbol.address, 0x104);
    }
}
