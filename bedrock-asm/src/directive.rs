use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::AssembleError;
use crate::literal;
use crate::opcode::Opcode;
use crate::record::SymbolTable;
use crate::Word;

/// Assembler directives: data and symbol helpers that emit words without
/// being machine instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Directive {
    /// `WORD <literal>` — emits one word holding the literal.
    Word,
    /// `STRING <text>` — emits one word per character of `text` followed
    /// by a zero terminator. The text starts after the first space past
    /// the mnemonic and runs to the end of the line, embedded spaces
    /// included.
    String,
    /// `ADDRESS <symbol> <register>` — emits a `COPY` loading the
    /// symbol's address into the register.
    Address,
}

impl Directive {
    /// The source mnemonic of this directive.
    pub fn mnemonic(self) -> &'static str {
        self.into()
    }

    /// The number of words the directive will emit.
    ///
    /// `WORD` and `ADDRESS` are always one word, whether or not their
    /// arguments will encode; errors surface in the second pass.
    pub fn size(self, source: &str) -> Word {
        match self {
            Self::Word | Self::Address => 1,
            Self::String => match string_payload(source) {
                Some(text) => text.chars().count() as Word + 1,
                None => 1,
            },
        }
    }

    /// Encode the directive's source line against the final symbol table.
    pub fn assemble(self, source: &str, symbols: &SymbolTable) -> Result<Vec<Word>, AssembleError> {
        match self {
            Self::Word => {
                let arg = self.argument(source, 0)?;
                Ok(vec![literal::parse(arg)?])
            }
            Self::String => match string_payload(source) {
                Some(text) => {
                    let mut words: Vec<Word> = text.chars().map(|ch| ch as Word).collect();
                    words.push(0x00);
                    Ok(words)
                }
                None => Ok(vec![0x00]),
            },
            Self::Address => {
                let name = self.argument(source, 0)?;
                let dest = self.argument(source, 1)?;
                let symbol = symbols
                    .get(name)
                    .ok_or_else(|| AssembleError::UnknownSymbol(name.to_string()))?;

                let line = format!("COPY {} {}", symbol.address, dest);
                Opcode::COPY.assemble_line(&line, symbols)
            }
        }
    }

    /// The `n`th argument column, offset past a leading label if present.
    fn argument<'a>(self, source: &'a str, n: usize) -> Result<&'a str, AssembleError> {
        let cols: Vec<&str> = source.split(' ').collect();
        let base = if cols.first().copied() == Some(self.mnemonic()) {
            1
        } else {
            2
        };
        cols.get(base + n)
            .copied()
            .ok_or(AssembleError::MissingOperands(self.mnemonic()))
    }
}

/// Recover the text of a STRING directive: everything after the first
/// space past the mnemonic, or `None` when the line ends at the mnemonic.
fn string_payload(source: &str) -> Option<&str> {
    let (first, rest) = match source.split_once(' ') {
        Some((first, rest)) => (first, Some(rest)),
        None => (source, None),
    };
    if first == "STRING" {
        return rest;
    }
    // A label precedes the mnemonic; split once more.
    rest?.split_once(' ').map(|(_, payload)| payload)
}
