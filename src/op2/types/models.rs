//! Core data structures for OP2 container components.
//!
//! This module defines the plain types shared by the framing, dispatch and
//! matrix layers:
//! - Byte order, header mode and producer dialect
//! - Table families and the read pass flag
//! - Subtable headers, raw tables and decoded matrices

use std::fmt;
use std::ops::AddAssign;

use ndarray::ArrayD;

/// Byte order of the container, detected once per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

impl fmt::Display for Endian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endian::Big => f.write_str("big-endian"),
            Endian::Little => f.write_str("little-endian"),
        }
    }
}

/// Which `PARAM,POST` mode produced the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostMode {
    /// `POST=-1`: tape identification and version records present.
    Minus1,
    /// `POST=-2`: no tape or version records.
    Minus2,
}

/// Producer dialect, derived from the version record of a `POST=-1` header.
///
/// `POST=-2` files carry no version record and default to MSC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    Nx,
    #[default]
    Msc,
}

/// Parsed file header.
#[derive(Debug, Clone)]
pub struct FileHeader {
    pub post: PostMode,
    pub dialect: Dialect,
    /// Raw version string (space-trimmed), present for `POST=-1`.
    pub version: Option<String>,
    /// `(month, day, year)` words of the `POST=-1` date block.
    pub date: Option<(i32, i32, i32)>,
}

/// Traversal mode threaded through every handler call.
///
/// Framing behaviour is identical in both passes; only storage differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPass {
    /// Discover shapes and cardinalities without allocating output storage.
    Sizing,
    /// Allocate and fill output storage.
    Materializing,
}

impl ReadPass {
    pub fn is_sizing(self) -> bool {
        self == ReadPass::Sizing
    }
}

/// The dedicated routines for tables with idiosyncratic framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialTable {
    Gpl,
    Meff,
    Intmod,
    Frl,
    Extdb,
    /// BHH and KHH share one layout.
    Bhh,
    Omm2,
    Dit,
    Kelm,
    Pcompts,
    Fol,
    /// SDF and PMRF share one layout.
    Sdf,
}

/// Structural family of a table, decided by its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableFamily {
    Geometry,
    Result,
    Matrix,
    Special(SpecialTable),
}

/// Element type of a matrix, from its precision code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Real32,
    Real64,
    Complex64,
    Complex128,
    /// Code 0 (per-cell) or any sentinel value a producer wrote.
    Unknown(i32),
}

impl Precision {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Precision::Real32,
            2 => Precision::Real64,
            3 => Precision::Complex64,
            4 => Precision::Complex128,
            other => Precision::Unknown(other),
        }
    }

    /// Width in bytes of one stored element, if known.
    pub fn element_size(self) -> Option<usize> {
        match self {
            Precision::Real32 => Some(4),
            Precision::Real64 | Precision::Complex64 => Some(8),
            Precision::Complex128 => Some(16),
            Precision::Unknown(_) => None,
        }
    }
}

/// A complex number stored as a real/imaginary pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Complex<T> {
    pub re: T,
    pub im: T,
}

impl<T: AddAssign> AddAssign for Complex<T> {
    fn add_assign(&mut self, rhs: Self) {
        self.re += rhs.re;
        self.im += rhs.im;
    }
}

/// Matrix values of one element type.
///
/// Dense matrices have shape `[rows, cols]`; the flat fallback has shape `[n]`.
#[derive(Debug, Clone, PartialEq)]
pub enum MatrixValues {
    Real32(ArrayD<f32>),
    Real64(ArrayD<f64>),
    Complex64(ArrayD<Complex<f32>>),
    Complex128(ArrayD<Complex<f64>>),
}

impl MatrixValues {
    pub fn shape(&self) -> &[usize] {
        match self {
            MatrixValues::Real32(a) => a.shape(),
            MatrixValues::Real64(a) => a.shape(),
            MatrixValues::Complex64(a) => a.shape(),
            MatrixValues::Complex128(a) => a.shape(),
        }
    }

    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Realized contents of a matrix table.
#[derive(Debug, Clone, PartialEq)]
pub enum MatrixData {
    /// Sparse triplets assembled into a dense `rows x cols` array.
    Dense(MatrixValues),
    /// Assembly failed; values in emission order with their 0-based triplet
    /// indices, so callers can re-check counts themselves.
    Flat {
        values: MatrixValues,
        rows: Vec<i64>,
        cols: Vec<i64>,
    },
    /// Present but valueless (unknown precision, or a Sizing pass).
    Absent,
}

/// A decoded matrix table.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub name: String,
    /// Running counter assigned by the producer (101, 102, ...).
    pub matrix_id: i32,
    /// 1 = column, 2/3 = factor. Informational only.
    pub form: i32,
    pub rows: i32,
    pub cols: i32,
    pub precision: Precision,
    pub declared_nvalues: i32,
    pub g: i32,
    /// Number of triplets read from the stream.
    pub nnz: usize,
    pub data: MatrixData,
}

/// Date carried by a 28-byte subtable-name record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDate {
    pub month: i32,
    pub day: i32,
    /// Four-digit year.
    pub year: i32,
}

/// The decoded subtable-name record of a table preamble.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtableHeader {
    pub name: String,
    pub date: Option<TableDate>,
    /// Float label carried by 12-byte records (FOL).
    pub label: Option<f32>,
    /// Guard pair carried by 16/20-byte identification records.
    pub guards: Option<(i32, i32)>,
}

impl SubtableHeader {
    pub(crate) fn named(name: String) -> Self {
        Self {
            name,
            date: None,
            label: None,
            guards: None,
        }
    }
}

/// Undecoded contents of a table read without a registered handler.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub name: String,
    pub subtable: Option<SubtableHeader>,
    /// The `[-1]` trailer record.
    pub trailer: Vec<u8>,
    /// Subtable records in stream order.
    pub records: Vec<Vec<u8>>,
}

/// Content produced for one table by the built-in readers.
#[derive(Debug, Clone, PartialEq)]
pub enum TableContent {
    Matrix(Matrix),
    Raw(RawTable),
}

/// Cardinalities discovered by a Sizing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSizing {
    Matrix { rows: i32, cols: i32, nnz: usize },
    Records { count: usize, bytes: usize },
}

/// Byte range consumed by one dispatched table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpan {
    pub name: String,
    pub start: u64,
    pub end: u64,
}
