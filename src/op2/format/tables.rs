//! Generic geometry and result table readers.
//!
//! The framing here is shared by every geometry and result table; what the
//! records mean is left to a [`TableHandler`] registered under the table's
//! name. Tables without a handler are skipped (or kept raw on request).
//!
//! # Table Structure
//! ```text
//! name [-1] record(trailer)
//! [-2,1,0] record(subtable name)
//! [-3,1,0] record [-4,1,0] record ... [-n,1,0] [0]
//! ```
//!
//! Result tables alternate header records (`-3`, `-5`, ...) and data records
//! (`-4`, `-6`, ...). Geometry tables carry data records only.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::{Read, Seek};

use log::debug;

use crate::op2::framing::RecordReader;
use crate::op2::trace::trace_line;
use crate::op2::types::{
    error::{Op2Error, Op2Warning, Result},
    models::{
        Dialect, Endian, RawTable, ReadPass, SubtableHeader, TableFamily, TableSizing,
    },
};
use crate::op2::utils;

/// Per-family record decoder.
///
/// Both methods receive one logical record and return the number of bytes
/// they consumed. A count that differs from the record length is reported as
/// a [`Op2Warning::HandlerByteCount`].
///
/// Handlers are called in both read passes; [`TableContext::pass`] tells them
/// whether to store what they decode.
pub trait TableHandler {
    /// Each header record of an alternating table (result, OMM2, FOL).
    /// Geometry tables: the `[-1]` trailer.
    fn read_header(&mut self, ctx: &TableContext<'_>, data: &[u8]) -> Result<usize>;

    /// Each data record, after the subcase filter.
    fn read_data(&mut self, ctx: &TableContext<'_>, data: &[u8]) -> Result<usize>;

    /// Called once after the table's closing marker.
    fn finish_table(&mut self, _ctx: &TableContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Table name to handler mapping.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Box<dyn TableHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `name`, returning any handler it replaces.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: Box<dyn TableHandler>,
    ) -> Option<Box<dyn TableHandler>> {
        self.handlers.insert(name.into(), handler)
    }

    pub fn remove(&mut self, name: &str) -> Option<Box<dyn TableHandler>> {
        self.handlers.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Box<dyn TableHandler>> {
        self.handlers.get_mut(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("HandlerRegistry").field("tables", &names).finish()
    }
}

/// Transient state of the table in progress.
///
/// Created when a table is dispatched and dropped when it is done, so nothing
/// leaks from one table into the next.
#[derive(Debug, Clone)]
pub struct TableContext<'a> {
    pub table: String,
    pub family: TableFamily,
    pub dialect: Dialect,
    pub endian: Endian,
    pub pass: ReadPass,
    pub subtable: Option<SubtableHeader>,
    /// The `[-1]` trailer record.
    pub trailer: Vec<u8>,
    /// Marker index of the subtable record being read (-3, -4, ...).
    pub isubtable: i32,
    /// Subcase id carried by the last result header record.
    pub subcase: Option<i32>,
    /// Subcases requested by the caller; `None` keeps all of them.
    pub subcases: Option<&'a HashSet<i32>>,
}

impl<'a> TableContext<'a> {
    pub fn new(
        table: &str,
        family: TableFamily,
        dialect: Dialect,
        endian: Endian,
        pass: ReadPass,
        subcases: Option<&'a HashSet<i32>>,
    ) -> Self {
        Self {
            table: table.to_string(),
            family,
            dialect,
            endian,
            pass,
            subtable: None,
            trailer: Vec::new(),
            isubtable: -3,
            subcase: None,
            subcases,
        }
    }

    /// Whether records of the current subcase pass the caller's filter.
    pub fn wants_subcase(&self) -> bool {
        match (self.subcases, self.subcase) {
            (Some(filter), Some(id)) => filter.contains(&id),
            _ => true,
        }
    }

    /// Whether the record at the current index is a header record.
    ///
    /// Geometry tables have none; every other family alternates.
    fn at_header_record(&self) -> bool {
        self.family != TableFamily::Geometry && self.isubtable % 2 != 0
    }
}

/// What a generic table read produced.
#[derive(Debug)]
pub struct TableOutcome {
    pub raw: Option<RawTable>,
    pub sizing: TableSizing,
}

/// Read one geometry or result table through its handler.
///
/// The reader must be positioned at the table name. Without a handler the
/// records are skipped, or kept as a [`RawTable`] when `retain_raw` is set
/// and the pass materializes.
pub fn read_table<R: Read + Seek>(
    reader: &mut RecordReader<R>,
    ctx: &mut TableContext<'_>,
    mut handler: Option<&mut Box<dyn TableHandler>>,
    retain_raw: bool,
) -> Result<TableOutcome> {
    ctx.trailer = reader.begin_table(true)?;
    let data = reader.subtable_record()?;
    let subtable = reader.parse_subtable(&data)?;
    check_subtable_length(ctx, data.len())?;
    debug!("{}: subtable {:?}", ctx.table, subtable.name);
    ctx.subtable = Some(subtable);

    if ctx.family == TableFamily::Geometry
        && let Some(h) = handler.as_mut()
    {
        let reported = h.read_header(ctx, &ctx.trailer)?;
        check_byte_count(reader, ctx, ctx.trailer.len(), reported);
    }

    let keep_raw = retain_raw && handler.is_none() && !ctx.pass.is_sizing();
    let mut records = Vec::new();
    let sizing = read_subtables(
        reader,
        ctx,
        handler.as_deref_mut(),
        keep_raw.then_some(&mut records),
    )?;

    if let Some(h) = handler.as_mut() {
        h.finish_table(ctx)?;
    }
    let raw = keep_raw.then(|| RawTable {
        name: ctx.table.clone(),
        subtable: ctx.subtable.clone(),
        trailer: std::mem::take(&mut ctx.trailer),
        records,
    });
    Ok(TableOutcome { raw, sizing })
}

/// Geometry tables carry a bare name; result tables may add a date.
fn check_subtable_length(ctx: &TableContext<'_>, len: usize) -> Result<()> {
    let allowed: &[usize] = match ctx.family {
        TableFamily::Geometry => &[8],
        TableFamily::Result => &[8, 28, 612],
        _ => return Ok(()),
    };
    if allowed.contains(&len) {
        Ok(())
    } else {
        Err(Op2Error::InvalidFormat(format!(
            "{:?} table {:?}: subtable record of {} bytes",
            ctx.family, ctx.table, len
        )))
    }
}

fn check_byte_count<R: Read + Seek>(
    reader: &mut RecordReader<R>,
    ctx: &TableContext<'_>,
    expected: usize,
    reported: usize,
) {
    if reported != expected {
        reader.warn(Op2Warning::HandlerByteCount {
            table: ctx.table.clone(),
            expected,
            reported,
        });
    }
}

/// Subcase id in the 4th word of a result header record.
fn subcase_id(data: &[u8], endian: Endian) -> Option<i32> {
    (data.len() >= 16).then(|| utils::i32_at(&data[12..16], endian))
}

/// Walk `[-3,1,0] record [-4,1,0] record ... [0]`, feeding each record to
/// the handler and, if given, to `raw`.
///
/// Data records rejected by the subcase filter, or with no consumer, are
/// skipped without copying.
pub(crate) fn read_subtables<R: Read + Seek>(
    reader: &mut RecordReader<R>,
    ctx: &mut TableContext<'_>,
    mut handler: Option<&mut Box<dyn TableHandler>>,
    mut raw: Option<&mut Vec<Vec<u8>>>,
) -> Result<TableSizing> {
    ctx.isubtable = -3;
    reader.expect_markers(&[-3, 1, 0])?;

    let mut count = 0;
    let mut bytes = 0;
    while reader.peek_marker()? != 0 {
        let header = ctx.at_header_record();
        let wanted = header || ctx.wants_subcase();
        let consumer = handler.is_some() || raw.is_some();

        let start = reader.position();
        if header || (wanted && consumer) {
            let data = reader.read_record(false)?;
            if header {
                ctx.subcase = subcase_id(&data, ctx.endian);
                trace_line!(reader.trace(), "  isubtable={} subcase={:?}", ctx.isubtable, ctx.subcase);
            }
            if let Some(h) = handler.as_mut() {
                let reported = if header {
                    h.read_header(ctx, &data)?
                } else {
                    h.read_data(ctx, &data)?
                };
                check_byte_count(reader, ctx, data.len(), reported);
            }
            if let Some(records) = raw.as_mut() {
                records.push(data);
            }
        } else {
            if !wanted {
                debug!("{}: skipping subcase {:?}", ctx.table, ctx.subcase);
            }
            reader.skip_record()?;
        }
        bytes += (reader.position() - start) as usize;

        count += 1;
        ctx.isubtable -= 1;
        reader.expect_markers(&[ctx.isubtable, 1, 0])?;
    }
    reader.expect_markers(&[0])?;
    Ok(TableSizing::Records { count, bytes })
}

/// Pass over a subtable sequence without decoding any of it.
pub fn skip_subtables<R: Read + Seek>(reader: &mut RecordReader<R>) -> Result<TableSizing> {
    let mut isubtable = -3;
    reader.expect_markers(&[isubtable, 1, 0])?;
    let mut count = 0;
    let mut bytes = 0;
    while reader.peek_marker()? != 0 {
        bytes += reader.skip_record()?;
        count += 1;
        isubtable -= 1;
        reader.expect_markers(&[isubtable, 1, 0])?;
    }
    reader.expect_markers(&[0])?;
    Ok(TableSizing::Records { count, bytes })
}
