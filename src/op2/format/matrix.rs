//! Generic matrix table decoder.
//!
//! # Table Structure
//! ```text
//! name [-1] record(7 words: id, form, rows, cols, precision, nvalues, g)
//! [-2,1,0] record(8-byte name + 170 + 170)
//! [-3,1] flag { [n] block(start_row, n words of values) }*      column 1
//! [-4,1] flag { ... }*                                           column 2
//! ...
//! [-k,1] 0 0                                                     end
//! ```
//!
//! Each populated column carries one or more segments of consecutive rows.
//! Indices in the stream are 1-based; decoded triplets are 0-based.

use std::io::{Read, Seek};
use std::ops::AddAssign;

use log::{debug, info, trace};
use ndarray::{Array1, ArrayD, IxDyn};

use crate::op2::framing::{GUARD, RecordReader};
use crate::op2::trace::trace_line;
use crate::op2::types::{
    error::{Op2Error, Op2Warning, Result},
    models::{Complex, Endian, Matrix, MatrixData, MatrixValues, Precision, ReadPass, TableSizing},
};
use crate::op2::utils;

/// Ceiling on column blocks per matrix.
const MAX_COLUMN_BLOCKS: usize = 100_000_000;

/// Largest `rows * cols` assembled into a dense array; bigger matrices keep
/// their triplets.
pub const MAX_DENSE_ELEMENTS: usize = 1 << 28;

/// Triplet values of one element type, in emission order.
#[derive(Debug)]
enum Values {
    Real32(Vec<f32>),
    Real64(Vec<f64>),
    Complex64(Vec<Complex<f32>>),
    Complex128(Vec<Complex<f64>>),
}

impl Values {
    fn with_capacity(precision: Precision, capacity: usize) -> Option<Self> {
        match precision {
            Precision::Real32 => Some(Values::Real32(Vec::with_capacity(capacity))),
            Precision::Real64 => Some(Values::Real64(Vec::with_capacity(capacity))),
            Precision::Complex64 => Some(Values::Complex64(Vec::with_capacity(capacity))),
            Precision::Complex128 => Some(Values::Complex128(Vec::with_capacity(capacity))),
            Precision::Unknown(_) => None,
        }
    }

    fn len(&self) -> usize {
        match self {
            Values::Real32(v) => v.len(),
            Values::Real64(v) => v.len(),
            Values::Complex64(v) => v.len(),
            Values::Complex128(v) => v.len(),
        }
    }

    /// Decode one segment's value bytes and append them.
    fn extend(&mut self, bytes: &[u8], endian: Endian) {
        match self {
            Values::Real32(v) => v.extend(bytes.chunks_exact(4).map(|c| utils::f32_at(c, endian))),
            Values::Real64(v) => v.extend(bytes.chunks_exact(8).map(|c| utils::f64_at(c, endian))),
            Values::Complex64(v) => v.extend(bytes.chunks_exact(8).map(|c| Complex {
                re: utils::f32_at(&c[..4], endian),
                im: utils::f32_at(&c[4..], endian),
            })),
            Values::Complex128(v) => v.extend(bytes.chunks_exact(16).map(|c| Complex {
                re: utils::f64_at(&c[..8], endian),
                im: utils::f64_at(&c[8..], endian),
            })),
        }
    }

    fn into_flat(self) -> MatrixValues {
        match self {
            Values::Real32(v) => MatrixValues::Real32(Array1::from_vec(v).into_dyn()),
            Values::Real64(v) => MatrixValues::Real64(Array1::from_vec(v).into_dyn()),
            Values::Complex64(v) => MatrixValues::Complex64(Array1::from_vec(v).into_dyn()),
            Values::Complex128(v) => MatrixValues::Complex128(Array1::from_vec(v).into_dyn()),
        }
    }

    /// Dense `rows x cols` copy of the triplets; `Err` describes why the
    /// triplets cannot be densified.
    fn to_dense(
        &self,
        shape: (usize, usize),
        rows: &[i64],
        cols: &[i64],
    ) -> std::result::Result<MatrixValues, String> {
        Ok(match self {
            Values::Real32(v) => MatrixValues::Real32(scatter(v, shape, rows, cols)?),
            Values::Real64(v) => MatrixValues::Real64(scatter(v, shape, rows, cols)?),
            Values::Complex64(v) => MatrixValues::Complex64(scatter(v, shape, rows, cols)?),
            Values::Complex128(v) => MatrixValues::Complex128(scatter(v, shape, rows, cols)?),
        })
    }
}

/// Sum triplets into a dense row-major `nrows x ncols` array.
///
/// Indices must already be range-checked. The buffer is bounded by
/// [`MAX_DENSE_ELEMENTS`] and reserved fallibly.
fn scatter<T: Clone + Default + AddAssign>(
    values: &[T],
    (nrows, ncols): (usize, usize),
    rows: &[i64],
    cols: &[i64],
) -> std::result::Result<ArrayD<T>, String> {
    let len = match nrows.checked_mul(ncols) {
        Some(len) if len <= MAX_DENSE_ELEMENTS => len,
        _ => {
            return Err(format!(
                "{} x {} exceeds the dense limit of {} elements",
                nrows, ncols, MAX_DENSE_ELEMENTS
            ));
        }
    };
    let mut dense = Vec::new();
    dense
        .try_reserve_exact(len)
        .map_err(|e| format!("cannot allocate {} x {}: {}", nrows, ncols, e))?;
    dense.resize(len, T::default());
    for ((value, &i), &j) in values.iter().zip(rows).zip(cols) {
        dense[i as usize * ncols + j as usize] += value.clone();
    }
    ArrayD::from_shape_vec(IxDyn(&[nrows, ncols]), dense)
        .map_err(|e| format!("dense matrix shape: {}", e))
}

/// Row/column/value triplets accumulated across column blocks.
#[derive(Debug)]
struct Triplets {
    rows: Vec<i64>,
    cols: Vec<i64>,
    /// `None` in a Sizing pass or when the element type is unknown.
    values: Option<Values>,
    /// Whether indices and values are kept, or only counted.
    stored: bool,
    count: usize,
}

impl Triplets {
    fn new(pass: ReadPass, precision: Precision, capacity: usize) -> Self {
        let values = if pass.is_sizing() {
            None
        } else {
            Values::with_capacity(precision, capacity)
        };
        let stored = values.is_some();
        let capacity = if stored { capacity } else { 0 };
        Self {
            rows: Vec::with_capacity(capacity),
            cols: Vec::with_capacity(capacity),
            values,
            stored,
            count: 0,
        }
    }

    fn check_lengths(&self) -> Result<()> {
        let nvalues = self.values.as_ref().map_or(self.rows.len(), Values::len);
        if self.rows.len() != self.cols.len() || self.rows.len() != nvalues {
            return Err(Op2Error::Internal(format!(
                "triplet lengths diverged: rows={} cols={} values={}",
                self.rows.len(),
                self.cols.len(),
                nvalues
            )));
        }
        Ok(())
    }
}

/// Read one matrix table.
///
/// The reader must be positioned at the table name. `capacity` is the
/// nonzero count learned by a previous Sizing pass, if any.
///
/// In a Sizing pass segment blocks are skipped and only the nonzero count is
/// recorded; the bytes consumed are identical in both passes.
pub fn read<R: Read + Seek>(
    reader: &mut RecordReader<R>,
    pass: ReadPass,
    capacity: Option<usize>,
) -> Result<Matrix> {
    let endian = reader.endian();
    let trailer = reader.begin_table(true)?;
    let name = reader.table().to_string();
    if trailer.len() != 28 {
        return Err(Op2Error::RecordLength {
            table: name,
            offset: reader.position(),
            detail: format!("matrix trailer of {} bytes, expected 28", trailer.len()),
        });
    }
    let words = utils::read_words(&trailer, endian)?;
    let (matrix_id, form, rows, cols, tout, declared_nvalues, g) =
        (words[0], words[1], words[2], words[3], words[4], words[5], words[6]);
    let precision = Precision::from_code(tout);
    info!(
        "name={:?} matrix_id={} form={} rows={} cols={} tout={} nvalues={} g={}",
        name, matrix_id, form, rows, cols, tout, declared_nvalues, g
    );
    if let Precision::Unknown(code) = precision {
        reader.warn(Op2Warning::UnknownPrecision {
            table: name.clone(),
            code,
        });
    }
    if form == 1 && cols != 1 {
        debug!("{}: column form with {} columns", name, cols);
    }

    read_identification(reader, &name)?;

    let mut triplets = Triplets::new(pass, precision, capacity.unwrap_or(0));
    let mut itable = -3;
    let mut column: i64 = 1;
    let mut finished = false;
    for _ in 0..MAX_COLUMN_BLOCKS {
        reader.expect_markers(&[itable, 1])?;
        let flag = reader.next_marker()?;
        if flag == 0 {
            let terminator = reader.next_marker()?;
            if terminator != 0 {
                return Err(Op2Error::Framing {
                    table: name,
                    offset: reader.position(),
                    expected: vec![0],
                    actual: vec![terminator],
                });
            }
            finished = true;
            break;
        }

        while reader.peek_marker()? >= 0 {
            read_segment(reader, precision, column, &mut triplets)?;
        }
        triplets.check_lengths()?;
        column += 1;
        itable -= 1;
    }
    if !finished {
        return Err(Op2Error::RunawayIteration {
            table: name,
            limit: MAX_COLUMN_BLOCKS,
        });
    }
    trace_line!(reader.trace(), "{}: {} triplets in {} columns", name, triplets.count, column - 1);

    let nnz = triplets.count;
    let data = if pass.is_sizing() {
        MatrixData::Absent
    } else {
        assemble(reader, &name, rows, cols, triplets)
    };

    Ok(Matrix {
        name,
        matrix_id,
        form,
        rows,
        cols,
        precision,
        declared_nvalues,
        g,
        nnz,
        data,
    })
}

/// Facts a Sizing pass learns about a matrix.
pub fn sizing(matrix: &Matrix) -> TableSizing {
    TableSizing::Matrix {
        rows: matrix.rows,
        cols: matrix.cols,
        nnz: matrix.nnz,
    }
}

/// Consume `[-2,1,0]` and the 16/20-byte identification record.
fn read_identification<R: Read + Seek>(reader: &mut RecordReader<R>, name: &str) -> Result<()> {
    reader.expect_markers(&[-2, 1, 0])?;
    let data = reader.read_record(false)?;
    match data.len() {
        16 | 20 => {
            let guards = (
                utils::i32_at(&data[8..12], reader.endian()),
                utils::i32_at(&data[12..16], reader.endian()),
            );
            if guards != (GUARD, GUARD) {
                reader.warn(Op2Warning::GuardMismatch {
                    table: name.to_string(),
                    guards,
                });
            }
        }
        length => reader.warn(Op2Warning::OddSubtableLength {
            table: name.to_string(),
            length,
        }),
    }
    Ok(())
}

/// Read one `[n] block(start_row, values)` segment of the current column.
fn read_segment<R: Read + Seek>(
    reader: &mut RecordReader<R>,
    precision: Precision,
    column: i64,
    triplets: &mut Triplets,
) -> Result<()> {
    let offset = reader.position();
    let nwords = reader.next_marker()?;
    let value_bytes = nwords as usize * 4;

    let stored = triplets.stored;
    let (start_row, len) = if stored {
        let block = reader.read_block()?;
        let start_row = if block.len() >= 4 {
            utils::i32_at(&block[..4], reader.endian())
        } else {
            0
        };
        if block.len() == value_bytes + 4
            && let Some(values) = triplets.values.as_mut()
        {
            values.extend(&block[4..], reader.endian());
        }
        (start_row, block.len())
    } else {
        (0, reader.skip_block()?)
    };
    if len != value_bytes + 4 {
        return Err(Op2Error::RecordLength {
            table: reader.table().to_string(),
            offset,
            detail: format!("segment marker {} with a {}-byte block", nwords, len),
        });
    }

    let width = precision.element_size().unwrap_or(4);
    if value_bytes % width != 0 {
        return Err(Op2Error::RecordLength {
            table: reader.table().to_string(),
            offset,
            detail: format!("{} value bytes do not divide into {}-byte elements", value_bytes, width),
        });
    }
    let count = value_bytes / width;
    trace!("column {} start_row {} count {}", column, start_row, count);

    if stored {
        let first = start_row as i64 - 1;
        triplets.rows.extend((0..count as i64).map(|k| first + k));
        triplets.cols.extend(std::iter::repeat_n(column - 1, count));
    }
    triplets.count += count;
    Ok(())
}

/// Turn 0-based triplets into matrix data, falling back to a flat buffer.
fn assemble<R: Read + Seek>(
    reader: &mut RecordReader<R>,
    name: &str,
    rows: i32,
    cols: i32,
    triplets: Triplets,
) -> MatrixData {
    let Triplets {
        rows: ri,
        cols: ci,
        values,
        ..
    } = triplets;
    let Some(values) = values else {
        debug!("{}: element type unknown, no values kept", name);
        return MatrixData::Absent;
    };

    let shape = (rows.max(0) as usize, cols.max(0) as usize);
    let in_range = rows >= 0
        && cols >= 0
        && ri.iter().all(|&i| (0..rows as i64).contains(&i))
        && ci.iter().all(|&j| (0..cols as i64).contains(&j));
    let problem = if in_range {
        match values.to_dense(shape, &ri, &ci) {
            Ok(dense) => {
                info!("created {} ({} x {})", name, rows, cols);
                return MatrixData::Dense(dense);
            }
            Err(problem) => problem,
        }
    } else {
        format!("triplet index outside {} x {}", rows, cols)
    };

    let flat = values.into_flat();
    let detail = if flat.len() as i64 == rows as i64 * cols as i64 {
        format!("{}; kept {} values in emission order", problem, flat.len())
    } else {
        format!(
            "{}; kept {} values, cannot reshape to {} x {}",
            problem,
            flat.len(),
            rows,
            cols
        )
    };
    reader.warn(Op2Warning::MatrixAssembly {
        table: name.to_string(),
        detail,
    });
    MatrixData::Flat {
        values: flat,
        rows: ri,
        cols: ci,
    }
}
