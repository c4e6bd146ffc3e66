//! Custom error and warning types for the op2-reader crate.

use std::fmt;
use thiserror::Error;

/// The primary error type for all operations in this crate.
///
/// Every variant terminates the read. Recoverable conditions are reported
/// through [`Op2Warning`] instead.
#[derive(Debug, Error)]
pub enum Op2Error {
    /// An error originating from I/O operations.
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    /// Container-level problem: empty or non-binary file, undetectable
    /// endianness, missing first table.
    #[error("Fatal error: {0}")]
    Fatal(String),

    /// A marker group did not match the expected sequence.
    #[error("Framing error in table {table:?} at byte {offset}: expected markers {expected:?}, found {actual:?}")]
    Framing {
        table: String,
        offset: u64,
        expected: Vec<i32>,
        actual: Vec<i32>,
    },

    /// A block or record length prefix is invalid.
    #[error("Record length error in table {table:?} at byte {offset}: {detail}")]
    RecordLength {
        table: String,
        offset: u64,
        detail: String,
    },

    /// The table name belongs to no known family and no escape hatch covers it.
    #[error(
        "geom/results split: {0:?} is not a known table. \
         If it is a matrix you want to read, add it to the additional matrices \
         or enable skipping of unknown matrices."
    )]
    UnclassifiedTable(String),

    /// The version record of a POST=-1 header has an unknown prefix.
    #[error("Unknown version record: {0:?}")]
    UnknownVersion(String),

    /// The first marker group is neither `[3]` (POST=-1) nor `[2]` (POST=-2).
    #[error("Unrecognized header markers: {0:?}")]
    UnrecognizedHeader(Vec<i32>),

    /// The matrix column iteration exceeded its ceiling.
    #[error("This should never happen: table {table:?} exceeded {limit} iterations")]
    RunawayIteration { table: String, limit: usize },

    /// An internal consistency check failed.
    #[error("Internal error: {0}")]
    Internal(String),

    /// A sub-record has a layout this reader cannot interpret.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// A failure while dispatching a table, annotated with its position.
    #[error("Failed reading table {table:?} (started at byte {offset}): {source}")]
    Table {
        table: String,
        offset: u64,
        #[source]
        source: Box<Op2Error>,
    },
}

impl Op2Error {
    /// Wraps `self` with the table it occurred in, unless it already carries one.
    pub(crate) fn in_table(self, table: &str, offset: u64) -> Self {
        match self {
            Op2Error::Table { .. } => self,
            other => Op2Error::Table {
                table: table.to_string(),
                offset,
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, looking through [`Op2Error::Table`].
    pub fn root(&self) -> &Op2Error {
        match self {
            Op2Error::Table { source, .. } => source.root(),
            other => other,
        }
    }
}

/// A convenience `Result` type alias using the crate's `Op2Error` type.
pub type Result<T> = std::result::Result<T, Op2Error>;

/// Non-fatal diagnostics collected during a read.
#[derive(Debug, Clone, PartialEq)]
pub enum Op2Warning {
    /// Sparse triplet assembly failed and the flat fallback was used.
    MatrixAssembly { table: String, detail: String },
    /// The identification block guards were not 170/170.
    GuardMismatch { table: String, guards: (i32, i32) },
    /// The matrix precision code is not one of 1..=4.
    UnknownPrecision { table: String, code: i32 },
    /// A table handler reported a byte count different from the record length.
    HandlerByteCount {
        table: String,
        expected: usize,
        reported: usize,
    },
    /// The trailing flag of a dated subtable record was not 0 or 1.
    SubtableFlag { table: String, flag: i32 },
    /// A subtable-name record had an unusual length and only its name was used.
    OddSubtableLength { table: String, length: usize },
}

impl fmt::Display for Op2Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op2Warning::MatrixAssembly { table, detail } => {
                write!(f, "{}: cannot assemble sparse matrix ({})", table, detail)
            }
            Op2Warning::GuardMismatch { table, guards } => write!(
                f,
                "{}: identification guards are ({}, {}), expected (170, 170)",
                table, guards.0, guards.1
            ),
            Op2Warning::UnknownPrecision { table, code } => {
                write!(f, "{}: unexpected precision code {}", table, code)
            }
            Op2Warning::HandlerByteCount {
                table,
                expected,
                reported,
            } => write!(
                f,
                "{}: handler consumed {} of {} bytes",
                table, reported, expected
            ),
            Op2Warning::SubtableFlag { table, flag } => {
                write!(f, "{}: subtable date flag is {}, expected 0 or 1", table, flag)
            }
            Op2Warning::OddSubtableLength { table, length } => {
                write!(f, "{}: unusual subtable record length {}", table, length)
            }
        }
    }
}
