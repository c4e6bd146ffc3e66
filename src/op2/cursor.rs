//! Byte cursor over an open OP2 container.
//!
//! Owns the stream, the current byte offset and the detected byte order.
//! Every read is a blocking, exact-length fetch; the only backwards
//! movement is an explicit [`ByteCursor::goto`] used for lookahead.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use log::{debug, info, trace};

use super::types::error::{Op2Error, Result};
use super::types::models::Endian;
use super::utils;

/// Number of leading bytes inspected when sniffing for a binary file.
const SNIFF_LEN: u64 = 1024;

#[derive(Debug)]
pub struct ByteCursor<R> {
    inner: R,
    offset: u64,
    len: u64,
    endian: Endian,
}

impl ByteCursor<BufReader<File>> {
    /// Open a container on disk.
    ///
    /// # Errors
    /// Returns [`Op2Error::Fatal`] if the file is empty, is not binary, or
    /// its byte order cannot be determined.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening OP2 file: {}", path.display());
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len == 0 {
            return Err(Op2Error::Fatal(format!("{} is empty", path.display())));
        }

        let mut reader = BufReader::new(file);
        let mut head = vec![0u8; len.min(SNIFF_LEN) as usize];
        reader.read_exact(&mut head)?;
        if !utils::looks_binary(&head) {
            return Err(Op2Error::Fatal(format!(
                "{} is not a recognized binary container",
                path.display()
            )));
        }

        Self::new(reader)
    }
}

impl<R: Read + Seek> ByteCursor<R> {
    /// Wrap an arbitrary seekable stream and detect its byte order.
    pub fn new(mut inner: R) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        if len == 0 {
            return Err(Op2Error::Fatal("the container is empty".to_string()));
        }
        let mut cursor = Self {
            inner,
            offset: 0,
            len,
            endian: Endian::Big,
        };
        cursor.endian = cursor.detect_endianness()?;
        info!("Detected {} container ({} bytes)", cursor.endian, len);
        Ok(cursor)
    }

    /// Decide the byte order from the first word without consuming it.
    ///
    /// The first word is the length prefix of a one-word block, so it must
    /// read as 4 in exactly the chosen order.
    pub fn detect_endianness(&mut self) -> Result<Endian> {
        let start = self.offset;
        self.goto(0)?;
        let mut flag = [0u8; 4];
        let read = self.read_into(&mut flag);
        self.goto(start)?;
        if read.is_err() {
            return Err(Op2Error::Fatal("cannot determine endian".to_string()));
        }

        if utils::i32_at(&flag, Endian::Big) == 4 {
            Ok(Endian::Big)
        } else if utils::i32_at(&flag, Endian::Little) == 4 {
            Ok(Endian::Little)
        } else {
            debug!("Endian flag bytes: {:02x?}", flag);
            Err(Op2Error::Fatal("cannot determine endian".to_string()))
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn position(&self) -> u64 {
        self.offset
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.offset)
    }

    pub fn at_eof(&self) -> bool {
        self.offset >= self.len
    }

    /// Reposition the stream, e.g. to rewind a peek or restart a pass.
    pub fn goto(&mut self, offset: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.offset = offset;
        Ok(())
    }

    /// Read exactly `n` bytes, advancing the position.
    pub fn read_block(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.read_into(&mut buf)?;
        Ok(buf)
    }

    /// Fill `buf` exactly; a short read is fatal.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<()> {
        let n = buf.len() as u64;
        if n > self.remaining() {
            return Err(Op2Error::Fatal(format!(
                "unexpected end of file at byte {}: wanted {} bytes, {} remain",
                self.offset,
                n,
                self.remaining()
            )));
        }
        self.inner.read_exact(buf)?;
        self.offset += n;
        Ok(())
    }

    /// Read one signed word in the detected byte order.
    pub fn read_i32(&mut self) -> Result<i32> {
        let mut word = [0u8; 4];
        self.read_into(&mut word)?;
        Ok(utils::i32_at(&word, self.endian))
    }

    /// Advance `n` bytes without copying them.
    pub fn skip(&mut self, n: u64) -> Result<()> {
        if n > self.remaining() {
            return Err(Op2Error::Fatal(format!(
                "unexpected end of file at byte {}: cannot skip {} bytes, {} remain",
                self.offset,
                n,
                self.remaining()
            )));
        }
        trace!("Skipping {} bytes at {}", n, self.offset);
        self.goto(self.offset + n)
    }

    /// Release the stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn detects_big_endian() {
        let cursor = ByteCursor::new(Cursor::new(vec![0u8, 0, 0, 4, 0, 0, 0, 2, 0, 0, 0, 4])).unwrap();
        assert_eq!(cursor.endian(), Endian::Big);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn detects_little_endian() {
        let cursor = ByteCursor::new(Cursor::new(vec![4u8, 0, 0, 0, 2, 0, 0, 0, 4, 0, 0, 0])).unwrap();
        assert_eq!(cursor.endian(), Endian::Little);
    }

    #[test]
    fn rejects_unknown_flag() {
        let err = ByteCursor::new(Cursor::new(vec![1u8, 2, 3, 4])).unwrap_err();
        assert!(matches!(err, Op2Error::Fatal(msg) if msg.contains("endian")));
    }

    #[test]
    fn short_reads_are_fatal() {
        let mut cursor = ByteCursor::new(Cursor::new(vec![0u8, 0, 0, 4, 0, 0])).unwrap();
        assert!(cursor.read_block(8).is_err());
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.read_block(6).unwrap().len(), 6);
        assert!(cursor.at_eof());
    }
}
