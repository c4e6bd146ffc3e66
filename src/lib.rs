//! # op2-reader
//!
//! A reader for OP2 finite-element result files (Nastran output containers).
//! Detects the byte order, parses the file header, then walks the table
//! sequence, decoding matrix tables and handing geometry/result records to
//! caller-registered handlers.
//!
//! **Note:** Reading is decode-only; the engineering meaning of individual
//! result tables is left to [`TableHandler`] implementations.
pub mod op2;

// Re-export the main types for convenience
pub use op2::{
    Op2Error, Op2Reader, Op2Warning, ReadOptions, ReadOutcome, Result,
    format::tables::{HandlerRegistry, TableContext, TableHandler},
    read,
    types::models::{
        Dialect, Endian, FileHeader, Matrix, MatrixData, MatrixValues, Precision, RawTable,
        ReadPass, TableContent, TableFamily, TableSpan,
    },
};
