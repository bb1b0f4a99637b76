pub mod notes;
pub mod simfile;

use thiserror::Error;

/// Everything that makes a chart unplayable. Parsing is all-or-nothing:
/// any of these rejects the whole document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChartError {
    #[error("#BPMS is empty or does not start at beat 0")]
    NoInitialBpm,

    #[error("measure {measure} has {length} characters, not a multiple of 4")]
    InvalidMeasureLength { measure: usize, length: usize },

    #[error("hold end without an open hold (measure {measure}, row {row}, column {column})")]
    UnmatchedHoldEnd {
        measure: usize,
        row: usize,
        column: usize,
    },

    #[error("hold opened over an unfinished one (measure {measure}, row {row}, column {column})")]
    OverlappingHold {
        measure: usize,
        row: usize,
        column: usize,
    },

    #[error("hold in column {column} starting at beat {beat} is never closed")]
    UnterminatedHold { column: usize, beat: f64 },

    #[error("unknown note character {found:?} (measure {measure}, row {row}, column {column})")]
    UnknownNoteChar {
        measure: usize,
        row: usize,
        column: usize,
        found: char,
    },

    #[error("invalid #{tag} entry {entry:?}")]
    InvalidTimingValue { tag: &'static str, entry: String },

    #[error("#NOTES needs at least 6 ':'-separated fields, found {fields}")]
    MalformedNotes { fields: usize },
}
