//! Dedicated routines for tables with idiosyncratic framing.
//!
//! None of these tables are decoded; each routine walks the table's own
//! marker layout so that the stream ends up at the next table name. OMM2
//! and FOL differ from result tables only in their subtable-name record, so
//! after it they feed the generic subtable loop and any registered handler.

use std::io::{Read, Seek};

use log::debug;

use super::tables::{self, TableContext, TableHandler};
use crate::op2::framing::{GUARD, RecordReader};
use crate::op2::trace::trace_line;
use crate::op2::types::{
    error::{Op2Error, Op2Warning, Result},
    models::{SpecialTable, TableFamily, TableSizing},
};
use crate::op2::utils;

/// Lower bound on the BHH/KHH segment index.
const BHH_MIN_INDEX: i32 = -1000;

/// Marker values that introduce a KELM trailing block.
const KELM_BLOCK_MARKERS: [i32; 4] = [2, 4, 6, 8];

/// Read one specially shaped table, starting at its name.
pub fn read<R: Read + Seek>(
    reader: &mut RecordReader<R>,
    ctx: &mut TableContext<'_>,
    handler: Option<&mut Box<dyn TableHandler>>,
) -> Result<TableSizing> {
    let TableFamily::Special(kind) = ctx.family else {
        return Err(Op2Error::Internal(format!(
            "{:?} is not a specially shaped table",
            ctx.table
        )));
    };
    debug!("{}: reading as {:?}", ctx.table, kind);
    let start = reader.position();

    let count = match kind {
        SpecialTable::Gpl => read_gpl(reader)?,
        SpecialTable::Meff | SpecialTable::Intmod => read_meff(reader)?,
        SpecialTable::Frl => read_frl(reader)?,
        SpecialTable::Extdb => read_extdb(reader)?,
        SpecialTable::Bhh => read_bhh(reader)?,
        SpecialTable::Dit => read_dit(reader)?,
        SpecialTable::Kelm => read_kelm(reader)?,
        SpecialTable::Pcompts => read_pcompts(reader)?,
        SpecialTable::Sdf => read_sdf(reader)?,
        SpecialTable::Omm2 | SpecialTable::Fol => {
            ctx.trailer = reader.begin_table(true)?;
            let data = reader.subtable_record()?;
            let expected = if kind == SpecialTable::Omm2 { 28 } else { 12 };
            if data.len() != expected {
                return Err(Op2Error::InvalidFormat(format!(
                    "table {:?}: subtable record of {} bytes, expected {}",
                    ctx.table,
                    data.len(),
                    expected
                )));
            }
            ctx.subtable = Some(reader.parse_subtable(&data)?);
            let mut handler = handler;
            let sizing = tables::read_subtables(reader, ctx, handler.as_deref_mut(), None)?;
            if let Some(h) = handler {
                h.finish_table(ctx)?;
            }
            match sizing {
                TableSizing::Records { count, .. } => count + 2,
                TableSizing::Matrix { .. } => 2,
            }
        }
    };

    Ok(TableSizing::Records {
        count,
        bytes: (reader.position() - start) as usize,
    })
}

/// Name, trailer and the standard `[-2,1,0]` subtable record.
///
/// Returns the subtable record.
fn preamble<R: Read + Seek>(reader: &mut RecordReader<R>, keep: bool) -> Result<Vec<u8>> {
    reader.begin_table(keep)?;
    reader.expect_markers(&[-2, 1, 0])?;
    Ok(reader.record_or_skip(keep)?.unwrap_or_default())
}

/// Skip a `[k]` marker and the `4k + 12` raw bytes behind it.
fn skip_segment<R: Read + Seek>(reader: &mut RecordReader<R>) -> Result<()> {
    let nwords = reader.next_marker()?;
    if nwords < 0 {
        return Err(Op2Error::RecordLength {
            table: reader.table().to_string(),
            offset: reader.position(),
            detail: format!("segment word count {}", nwords),
        });
    }
    reader.skip_bytes(nwords as u64 * 4 + 12)
}

/// Read a block after requiring its `[n]` marker.
fn marked_block<R: Read + Seek>(reader: &mut RecordReader<R>, n: i32) -> Result<Vec<u8>> {
    reader.expect_markers(&[n])?;
    reader.read_block()
}

/// Read `[n] block` pairs while the next marker is a KELM block marker.
fn kelm_blocks<R: Read + Seek>(reader: &mut RecordReader<R>) -> Result<usize> {
    let mut count = 0;
    while let Some(n) = reader.try_peek_marker()? {
        if !KELM_BLOCK_MARKERS.contains(&n) {
            break;
        }
        reader.next_marker()?;
        reader.read_block()?;
        count += 1;
    }
    Ok(count)
}

/// Require a 16-byte name record carrying the 170/170 guard pair.
fn guarded_name<R: Read + Seek>(reader: &mut RecordReader<R>, data: &[u8]) -> Result<()> {
    if data.len() != 16 {
        return Err(Op2Error::InvalidFormat(format!(
            "table {:?}: identification record of {} bytes, expected 16",
            reader.table(),
            data.len()
        )));
    }
    let guards = (
        utils::i32_at(&data[8..12], reader.endian()),
        utils::i32_at(&data[12..16], reader.endian()),
    );
    trace_line!(reader.trace(), "  recordi = [{:?}, {}, {}]", utils::name_field(data), guards.0, guards.1);
    if guards != (GUARD, GUARD) {
        let table = reader.table().to_string();
        reader.warn(Op2Warning::GuardMismatch { table, guards });
    }
    Ok(())
}

/// GPL: `[-2,1,0] record [-3,1,0] record ... [n,1,0] [0]` with no fixed length.
fn read_gpl<R: Read + Seek>(reader: &mut RecordReader<R>) -> Result<usize> {
    reader.begin_table(false)?;
    let mut n = -2;
    let mut count = 0;
    while reader.peek_marker()? != 0 {
        reader.expect_markers(&[n, 1, 0])?;
        if reader.peek_marker()? == 0 {
            reader.next_marker()?;
            return Ok(count);
        }
        reader.skip_record()?;
        count += 1;
        n -= 1;
    }
    Ok(count)
}

/// MEFF and INTMOD: six `[n,1,1]` raw segments then `[-9,1,0,0]`.
fn read_meff<R: Read + Seek>(reader: &mut RecordReader<R>) -> Result<usize> {
    preamble(reader, false)?;
    for n in (-8..=-3).rev() {
        reader.expect_markers(&[n, 1, 1])?;
        skip_segment(reader)?;
    }
    reader.expect_markers(&[-9, 1, 0, 0])?;
    Ok(7)
}

fn read_frl<R: Read + Seek>(reader: &mut RecordReader<R>) -> Result<usize> {
    preamble(reader, false)?;
    match tables::skip_subtables(reader)? {
        TableSizing::Records { count, .. } => Ok(count + 1),
        TableSizing::Matrix { .. } => Ok(1),
    }
}

/// EXTDB: five fixed records then `[-7,1,0,0]`.
fn read_extdb<R: Read + Seek>(reader: &mut RecordReader<R>) -> Result<usize> {
    reader.begin_table(false)?;
    for n in (-6..=-2).rev() {
        reader.expect_markers(&[n, 1, 0])?;
        reader.skip_record()?;
    }
    reader.expect_markers(&[-7, 1, 0, 0])?;
    Ok(5)
}

/// BHH and KHH: `[n,1,flag]` segments until `flag` is 0, then `[0]`.
fn read_bhh<R: Read + Seek>(reader: &mut RecordReader<R>) -> Result<usize> {
    preamble(reader, false)?;
    let mut n = -3;
    let mut count = 1;
    loop {
        if n <= BHH_MIN_INDEX {
            return Err(Op2Error::RunawayIteration {
                table: reader.table().to_string(),
                limit: BHH_MIN_INDEX.unsigned_abs() as usize,
            });
        }
        let offset = reader.position();
        let markers = reader.get_markers(3, false)?;
        match markers[2] {
            0 => break,
            1 => {}
            _ => {
                return Err(Op2Error::Framing {
                    table: reader.table().to_string(),
                    offset,
                    expected: vec![n, 1, 1],
                    actual: markers,
                });
            }
        }
        skip_segment(reader)?;
        count += 1;
        n -= 1;
    }
    reader.expect_markers(&[0])?;
    Ok(count)
}

/// DIT: three fixed records, up to four optional ones, then `[0]`.
fn read_dit<R: Read + Seek>(reader: &mut RecordReader<R>) -> Result<usize> {
    reader.begin_table(false)?;
    let mut count = 0;
    for n in [-2, -3, -4] {
        reader.expect_markers(&[n, 1, 0])?;
        reader.skip_record()?;
        count += 1;
    }
    reader.expect_markers(&[-5, 1, 0])?;
    for n in [-6, -7, -8, -9] {
        if reader.peek_marker()? != 0 {
            reader.skip_record()?;
            reader.expect_markers(&[n, 1, 0])?;
            count += 1;
        }
    }
    reader.expect_markers(&[0])?;
    Ok(count)
}

/// KELM: a guarded identification record and a fixed block layout.
fn read_kelm<R: Read + Seek>(reader: &mut RecordReader<R>) -> Result<usize> {
    let data = preamble(reader, true)?;
    guarded_name(reader, &data)?;

    let mut count = 0;
    for n in [-3, -4] {
        reader.expect_markers(&[n, 1, 1])?;
        for _ in 0..17 {
            marked_block(reader, 2)?;
        }
        marked_block(reader, 4)?;
        for _ in 0..7 {
            marked_block(reader, 2)?;
        }
        count += 25;
    }

    reader.expect_markers(&[-5, 1, 1])?;
    marked_block(reader, 600)?;

    reader.expect_markers(&[-6, 1, 1])?;
    for n in [188, 14, 16, 18, 84, 6] {
        marked_block(reader, n)?;
    }

    reader.expect_markers(&[-7, 1, 1])?;
    marked_block(reader, 342)?;
    count += 8;

    reader.expect_markers(&[-8, 1, 1])?;
    reader.read_block()?;
    reader.read_block()?;
    count += 2 + kelm_blocks(reader)?;

    for n in (-12..=-9).rev() {
        reader.expect_markers(&[n, 1, 1])?;
        count += kelm_blocks(reader)?;
    }
    Ok(count)
}

/// PCOMPTS: optional records, skipped without decoding.
fn read_pcompts<R: Read + Seek>(reader: &mut RecordReader<R>) -> Result<usize> {
    preamble(reader, false)?;
    let mut count = 1;

    reader.expect_markers(&[-3, 1, 0])?;
    if reader.peek_marker()? != -4 {
        reader.skip_record()?;
        count += 1;
    }
    reader.expect_markers(&[-4, 1, 0])?;
    if reader.peek_marker()? == 0 {
        reader.expect_markers(&[0])?;
        return Ok(count);
    }
    reader.skip_record()?;
    count += 1;

    reader.expect_markers(&[-5, 1, 0])?;
    reader.skip_record()?;
    reader.expect_markers(&[-6, 1, 0])?;
    reader.expect_markers(&[0])?;
    Ok(count + 1)
}

/// SDF and PMRF: guarded identification record, one segment, `[-4,1,0,0]`.
fn read_sdf<R: Read + Seek>(reader: &mut RecordReader<R>) -> Result<usize> {
    let data = preamble(reader, true)?;
    guarded_name(reader, &data)?;
    reader.expect_markers(&[-3, 1, 1])?;
    reader.next_marker()?;
    reader.read_block()?;
    reader.expect_markers(&[-4, 1, 0, 0])?;
    Ok(2)
}
