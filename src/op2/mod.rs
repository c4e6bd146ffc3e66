//! Core OP2 reader module

pub mod cursor;
pub mod dispatch;
pub mod format;
pub mod framing;
pub mod reader;
pub mod trace;
pub mod types;
pub mod utils;

use std::collections::HashSet;
use std::path::Path;

pub use reader::{Op2Reader, ReadOptions, ReadOutcome};
pub use types::error::{Op2Error, Op2Warning, Result};

/// Read an OP2 file with no table handlers registered.
///
/// Geometry and result tables are framed and skipped; matrices are decoded.
/// Use [`Op2Reader`] to register handlers or to change the other options.
///
/// # Arguments
/// * `path` - File path to the `.op2` file
/// * `subcases` - Optional set of subcase ids to keep
/// * `additional_matrices` - Unknown table names to read as matrices
/// * `skip_unknown_matrices` - Read every unknown table as a matrix
pub fn read(
    path: impl AsRef<Path>,
    subcases: Option<HashSet<i32>>,
    additional_matrices: HashSet<String>,
    skip_unknown_matrices: bool,
) -> Result<ReadOutcome> {
    let options = ReadOptions {
        subcases,
        additional_matrices,
        skip_unknown_matrices,
        ..ReadOptions::default()
    };
    Op2Reader::new(options).read_file(path)
}
