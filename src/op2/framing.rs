//! Record assembly and the marker/table-name protocol.
//!
//! # Layout
//! ```text
//! block   := i32 len | len bytes | i32 len        (len > 0, both equal)
//! marker  := block with len = 4, payload = one i32
//! record  := marker(nwords) block(4 * nwords) { marker(n > 0) block(4 * n) }*
//! table   := [-1] record(trailer) [-2,1,0] record(subtable name) ...
//! ```
//!
//! A table-name position holds either a name record or a bare `[0]`
//! marker, which ends the table sequence.

use std::io::{Read, Seek};

use log::{trace, warn};

use super::cursor::ByteCursor;
use super::trace::{TraceLog, trace_line};
use super::types::error::{Op2Error, Op2Warning, Result};
use super::types::models::{Endian, SubtableHeader, TableDate};
use super::utils;

/// Bytes occupied by one marker block.
const MARKER_BYTES: u64 = 12;

/// Guard value carried twice by identification records.
pub const GUARD: i32 = 170;

/// Outcome of reading a table-name position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableName {
    Name(String),
    /// The trailing `[0]` sentinel: no more tables.
    EndOfTables,
}

/// Reads blocks, markers and records from a [`ByteCursor`].
///
/// Also carries the name of the table in progress (for error messages), the
/// optional trace file and the warnings raised so far.
#[derive(Debug)]
pub struct RecordReader<R> {
    cursor: ByteCursor<R>,
    trace: TraceLog,
    table: String,
    warnings: Vec<Op2Warning>,
}

impl<R: Read + Seek> RecordReader<R> {
    pub fn new(cursor: ByteCursor<R>, trace: TraceLog) -> Self {
        Self {
            cursor,
            trace,
            table: String::new(),
            warnings: Vec::new(),
        }
    }

    pub fn endian(&self) -> Endian {
        self.cursor.endian()
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn at_eof(&self) -> bool {
        self.cursor.at_eof()
    }

    pub fn goto(&mut self, offset: u64) -> Result<()> {
        self.cursor.goto(offset)
    }

    /// Name of the table in progress.
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn set_table(&mut self, name: &str) {
        self.table.clear();
        self.table.push_str(name);
    }

    pub fn trace(&mut self) -> &mut TraceLog {
        &mut self.trace
    }

    /// Log a warning and keep it for the read outcome.
    pub fn warn(&mut self, warning: Op2Warning) {
        warn!("{}", warning);
        trace_line!(self.trace, "WARNING: {}", warning);
        self.warnings.push(warning);
    }

    pub fn take_warnings(&mut self) -> Vec<Op2Warning> {
        std::mem::take(&mut self.warnings)
    }

    /// Release the stream and the trace file.
    pub fn close(mut self) -> R {
        self.trace.close();
        self.cursor.into_inner()
    }

    fn length_error(&self, offset: u64, detail: String) -> Op2Error {
        Op2Error::RecordLength {
            table: self.table.clone(),
            offset,
            detail,
        }
    }

    // ------------------------------------------------------------------
    // physical blocks

    /// Read a block's leading length field.
    fn block_len(&mut self) -> Result<usize> {
        let offset = self.cursor.position();
        let len = self.cursor.read_i32()?;
        if len <= 0 {
            return Err(self.length_error(offset, format!("non-positive block length {}", len)));
        }
        Ok(len as usize)
    }

    /// Read a block's trailing length field and compare it to the leading one.
    fn check_block_end(&mut self, len: usize) -> Result<()> {
        let offset = self.cursor.position();
        let trailing = self.cursor.read_i32()?;
        if trailing as i64 != len as i64 {
            return Err(self.length_error(
                offset,
                format!("leading length {} != trailing length {}", len, trailing),
            ));
        }
        Ok(())
    }

    /// Read one physical block and return its payload.
    pub fn read_block(&mut self) -> Result<Vec<u8>> {
        let len = self.block_len()?;
        let payload = self.cursor.read_block(len)?;
        self.check_block_end(len)?;
        Ok(payload)
    }

    /// Advance past one physical block without copying it.
    ///
    /// Returns the payload length.
    pub fn skip_block(&mut self) -> Result<usize> {
        let len = self.block_len()?;
        self.cursor.skip(len as u64)?;
        self.check_block_end(len)?;
        Ok(len)
    }

    /// Advance over raw bytes whose layout the caller already knows.
    pub fn skip_bytes(&mut self, n: u64) -> Result<()> {
        self.cursor.skip(n)
    }

    // ------------------------------------------------------------------
    // markers

    fn read_marker(&mut self) -> Result<i32> {
        let offset = self.cursor.position();
        let len = self.block_len()?;
        if len != 4 {
            return Err(self.length_error(offset, format!("marker block of {} bytes", len)));
        }
        let value = self.cursor.read_i32()?;
        self.check_block_end(len)?;
        Ok(value)
    }

    /// Read `count` markers; with `peek` the position is restored.
    pub fn get_markers(&mut self, count: usize, peek: bool) -> Result<Vec<i32>> {
        let start = self.cursor.position();
        let mut markers = Vec::with_capacity(count);
        for _ in 0..count {
            markers.push(self.read_marker()?);
        }
        if peek {
            self.cursor.goto(start)?;
        }
        Ok(markers)
    }

    /// Read one marker and rewind.
    pub fn peek_marker(&mut self) -> Result<i32> {
        let start = self.cursor.position();
        let marker = self.read_marker()?;
        self.cursor.goto(start)?;
        Ok(marker)
    }

    /// Like [`peek_marker`](Self::peek_marker), but `None` when no marker fits
    /// in the remaining bytes.
    pub fn try_peek_marker(&mut self) -> Result<Option<i32>> {
        if self.cursor.remaining() < MARKER_BYTES {
            return Ok(None);
        }
        self.peek_marker().map(Some)
    }

    /// Read one marker and consume it.
    pub fn next_marker(&mut self) -> Result<i32> {
        self.read_marker()
    }

    /// Read markers and require them to equal `expected`.
    pub fn expect_markers(&mut self, expected: &[i32]) -> Result<()> {
        let offset = self.cursor.position();
        let actual = self.get_markers(expected.len(), false)?;
        trace!("markers {:?} at {}", actual, offset);
        trace_line!(self.trace, "---markers = {:?}---", actual);
        if actual != expected {
            return Err(Op2Error::Framing {
                table: self.table.clone(),
                offset,
                expected: expected.to_vec(),
                actual,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // logical records

    /// Read the word-count marker of a record part and its block.
    fn record_part(&mut self, keep: bool, out: &mut Vec<u8>) -> Result<()> {
        let offset = self.cursor.position();
        let nwords = self.read_marker()?;
        if nwords <= 0 {
            return Err(self.length_error(offset, format!("record word count {}", nwords)));
        }
        let len = if keep {
            let block = self.read_block()?;
            let len = block.len();
            out.extend_from_slice(&block);
            len
        } else {
            self.skip_block()?
        };
        if len != nwords as usize * 4 {
            return Err(self.length_error(
                offset,
                format!("record of {} words has a {}-byte block", nwords, len),
            ));
        }
        Ok(())
    }

    fn record(&mut self, keep: bool) -> Result<(Vec<u8>, usize)> {
        let start = self.cursor.position();
        let mut data = Vec::new();
        self.record_part(keep, &mut data)?;
        while let Some(next) = self.try_peek_marker()? {
            if next <= 0 {
                break;
            }
            self.record_part(keep, &mut data)?;
        }
        let consumed = (self.cursor.position() - start) as usize;
        Ok((data, consumed))
    }

    /// Read one logical record, joining any continuation blocks.
    pub fn read_record(&mut self, peek: bool) -> Result<Vec<u8>> {
        let start = self.cursor.position();
        let (data, _) = self.record(true)?;
        trace!("record of {} bytes at {}", data.len(), start);
        trace_line!(self.trace, "record: {} bytes at {}", data.len(), start);
        if peek {
            self.cursor.goto(start)?;
        }
        Ok(data)
    }

    /// Advance past one logical record without allocating its payload.
    ///
    /// Returns the number of bytes consumed, framing included.
    pub fn skip_record(&mut self) -> Result<usize> {
        let (_, consumed) = self.record(false)?;
        trace_line!(self.trace, "skipped record: {} bytes", consumed);
        Ok(consumed)
    }

    /// Read or skip one record depending on `keep`.
    pub fn record_or_skip(&mut self, keep: bool) -> Result<Option<Vec<u8>>> {
        if keep {
            self.read_record(false).map(Some)
        } else {
            self.skip_record().map(|_| None)
        }
    }

    // ------------------------------------------------------------------
    // table names

    /// Read the next table name.
    ///
    /// With `peek` the position is restored after a name; the end sentinel
    /// is always consumed.
    pub fn read_table_name(&mut self, peek: bool) -> Result<TableName> {
        let start = self.cursor.position();
        let last = if self.table.is_empty() {
            "<none>".to_string()
        } else {
            self.table.clone()
        };
        let marker = match self.try_peek_marker()? {
            Some(marker) => marker,
            None => {
                return Err(Op2Error::Fatal(format!(
                    "no table name or end marker at byte {}; check the solver output. last table={:?}",
                    start, last
                )));
            }
        };
        trace_line!(self.trace, "read_table_name - peek={}", peek);

        if marker == 0 {
            self.read_marker()?;
            trace_line!(self.trace, "end of tables at {}", start);
            return Ok(TableName::EndOfTables);
        }
        if marker < 0 {
            return Err(Op2Error::Fatal(format!(
                "expected a table name at byte {}, found marker {}; last table={:?}",
                start, marker, last
            )));
        }

        let data = self.read_record(false)?;
        if data.len() != 8 {
            return Err(self.length_error(
                start,
                format!("table name record of {} bytes", data.len()),
            ));
        }
        let name = utils::name_field(&data);
        trace_line!(self.trace, "table_header = [8, {:?}, 8]", name);
        if peek {
            self.cursor.goto(start)?;
        }
        Ok(TableName::Name(name))
    }

    /// Consume the table name, `[-1]` and the trailer record.
    ///
    /// Returns the trailer bytes when `keep` is set.
    pub fn begin_table(&mut self, keep: bool) -> Result<Vec<u8>> {
        match self.read_table_name(false)? {
            TableName::Name(name) => self.set_table(&name),
            TableName::EndOfTables => {
                return Err(Op2Error::Internal(
                    "begin_table called at the end of the table sequence".to_string(),
                ));
            }
        }
        self.expect_markers(&[-1])?;
        Ok(self.record_or_skip(keep)?.unwrap_or_default())
    }

    /// Consume `[-2,1,0]` and the subtable-name record, returning the raw record.
    pub fn subtable_record(&mut self) -> Result<Vec<u8>> {
        self.expect_markers(&[-2, 1, 0])?;
        self.read_record(false)
    }

    /// Decode a subtable-name record.
    ///
    /// Recognized lengths: 8 (name), 12 (name + float label), 16/20 (name +
    /// two guard words), 28 (name + month, day, year, zero, one), 612 (name
    /// prefix only). Any other length is an error.
    pub fn parse_subtable(&mut self, data: &[u8]) -> Result<SubtableHeader> {
        let endian = self.endian();
        let word = |i: usize| utils::i32_at(&data[8 + 4 * i..12 + 4 * i], endian);
        let mut header = SubtableHeader::named(utils::name_field(data));
        match data.len() {
            8 => {}
            12 => header.label = Some(utils::f32_at(&data[8..12], endian)),
            16 | 20 => {
                let guards = (word(0), word(1));
                if guards != (GUARD, GUARD) {
                    let table = self.table.clone();
                    self.warn(Op2Warning::GuardMismatch { table, guards });
                }
                header.guards = Some(guards);
            }
            28 => {
                let (month, day, year, zero, one) = (word(0), word(1), word(2), word(3), word(4));
                trace_line!(
                    self.trace,
                    "  [subtable_name, month={}, day={}, year={}, zero={}, one={}]",
                    month,
                    day,
                    year,
                    zero,
                    one
                );
                if one != 0 && one != 1 {
                    let table = self.table.clone();
                    self.warn(Op2Warning::SubtableFlag { table, flag: one });
                }
                let year = if (0..100).contains(&year) { year + 2000 } else { year };
                header.date = Some(TableDate { month, day, year });
            }
            612 => {
                let table = self.table.clone();
                self.warn(Op2Warning::OddSubtableLength {
                    table,
                    length: data.len(),
                });
            }
            n => {
                return Err(Op2Error::InvalidFormat(format!(
                    "table {:?}: unhandled subtable record length {}",
                    self.table, n
                )));
            }
        }
        trace_line!(self.trace, "  subtable_name={:?}", header.name);
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn block(payload: &[u8]) -> Vec<u8> {
        let mut out = (payload.len() as i32).to_be_bytes().to_vec();
        out.extend_from_slice(payload);
        out.extend_from_slice(&(payload.len() as i32).to_be_bytes());
        out
    }

    fn marker(value: i32) -> Vec<u8> {
        block(&value.to_be_bytes())
    }

    fn reader(bytes: Vec<u8>) -> RecordReader<Cursor<Vec<u8>>> {
        let cursor = ByteCursor::new(Cursor::new(bytes)).unwrap();
        RecordReader::new(cursor, TraceLog::disabled())
    }

    #[test]
    fn block_round_trip() {
        let payload = b"abcdefgh".to_vec();
        let mut bytes = marker(7);
        bytes.extend(block(&payload));
        let mut r = reader(bytes);
        assert_eq!(r.next_marker().unwrap(), 7);
        assert_eq!(r.read_block().unwrap(), payload);
        assert!(r.at_eof());
    }

    #[test]
    fn corrupted_trailing_length_is_a_framing_error() {
        let mut bytes = marker(7);
        bytes.extend(block(b"abcd"));
        let n = bytes.len();
        bytes[n - 1] = 9;
        let mut r = reader(bytes);
        r.next_marker().unwrap();
        let err = r.read_block().unwrap_err();
        assert!(matches!(err, Op2Error::RecordLength { .. }));
    }

    #[test]
    fn record_joins_continuation_blocks() {
        let mut bytes = marker(1);
        bytes.extend(block(&[0, 0, 0, 1]));
        bytes.extend(marker(2));
        bytes.extend(block(&[0, 0, 0, 2, 0, 0, 0, 3]));
        bytes.extend(marker(-3));
        let mut r = reader(bytes);
        let data = r.read_record(true).unwrap();
        assert_eq!(data, vec![0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3]);
        assert_eq!(r.position(), 0);
        r.skip_record().unwrap();
        assert_eq!(r.peek_marker().unwrap(), -3);
    }

    #[test]
    fn expect_markers_reports_both_sequences() {
        let mut bytes = marker(-2);
        bytes.extend(marker(1));
        bytes.extend(marker(1));
        let mut r = reader(bytes);
        r.set_table("OUGV1");
        match r.expect_markers(&[-2, 1, 0]).unwrap_err() {
            Op2Error::Framing {
                table,
                expected,
                actual,
                ..
            } => {
                assert_eq!(table, "OUGV1");
                assert_eq!(expected, vec![-2, 1, 0]);
                assert_eq!(actual, vec![-2, 1, 1]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn zero_marker_ends_the_table_sequence() {
        let mut bytes = marker(2);
        bytes.extend(block(b"KAA     "));
        bytes.extend(marker(0));
        let mut r = reader(bytes);
        assert_eq!(
            r.read_table_name(true).unwrap(),
            TableName::Name("KAA".to_string())
        );
        assert_eq!(r.position(), 0);
        r.read_table_name(false).unwrap();
        assert_eq!(r.read_table_name(true).unwrap(), TableName::EndOfTables);
        assert!(r.at_eof());
    }
}
