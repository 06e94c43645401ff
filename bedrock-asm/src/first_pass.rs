use std::io::BufRead;

use crate::directive::Directive;
use crate::error::AssembleError;
use crate::opcode::Opcode;
use crate::record::{Record, RecordKind};
use crate::relocatable::RelocatableFile;
use crate::Word;

/// The mnemonic introducing an import line.
const IMPORT_MNEMONIC: &str = "IMPORT";

/// Run the first pass over one source stream.
///
/// Each line becomes a [`Record`] stamped with the relocation counter,
/// which then advances by the record's emitted size. Labelled records
/// enter the symbol table; a label seen twice downgrades the original
/// entry to a duplicate.
///
/// The root file passes the load address as `origin`; imported files pass
/// zero and are re-based during merge.
pub fn first_pass<R: BufRead>(source: R, origin: Word) -> Result<RelocatableFile, AssembleError> {
    let mut file = RelocatableFile::new(origin);
    let mut counter = origin;

    for line in source.lines() {
        let record = classify_line(counter, line?);
        counter += record.size();
        file.push(record);
    }

    tracing::debug!(
        records = file.records().len(),
        symbols = file.symbols().len(),
        end = format_args!("{:#x}", file.end()),
        "first pass complete"
    );
    Ok(file)
}

/// Classify one source line into a record at `address`.
///
/// The column rules, in order: a known opcode mnemonic, a known directive,
/// an `IMPORT`, a `;` comment, a lone unrecognised column (invalid), and
/// finally a label followed by any of the above. Blank lines are kept as
/// comment records so they emit nothing.
fn classify_line(address: Word, source: String) -> Record {
    let record = |label: Option<&str>, kind| Record {
        label: label.map(str::to_string),
        kind,
        address,
        source: source.clone(),
    };

    if source.is_empty() {
        return record(None, RecordKind::Comment);
    }

    let cols: Vec<&str> = source.split(' ').collect();
    let head = cols[0];

    if let Ok(op) = head.parse::<Opcode>() {
        return record(None, RecordKind::Instruction(op));
    }
    if let Ok(directive) = head.parse::<Directive>() {
        return record(None, RecordKind::Directive(directive));
    }
    if head == IMPORT_MNEMONIC {
        let name = source
            .split_once(' ')
            .map(|(_, rest)| rest.to_string())
            .filter(|rest| !rest.is_empty());
        return record(None, RecordKind::Import(name));
    }
    if source.starts_with(';') {
        return record(None, RecordKind::Comment);
    }
    if cols.len() == 1 {
        return record(None, RecordKind::Invalid);
    }

    // Column 0 is a label; re-test column 1.
    let label = Some(head);
    let second = cols[1];
    if let Ok(op) = second.parse::<Opcode>() {
        return record(label, RecordKind::Instruction(op));
    }
    if let Ok(directive) = second.parse::<Directive>() {
        return record(label, RecordKind::Directive(directive));
    }
    if second.starts_with(';') {
        return record(label, RecordKind::Comment);
    }

    record(None, RecordKind::Invalid)
}
