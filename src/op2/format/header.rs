//! OP2 file header parsing and producer dialect detection.
//!
//! This module handles:
//! - Recognizing the `PARAM,POST,-1` and `PARAM,POST,-2` header layouts
//! - Validating the tape identification record
//! - Classifying the version record into a producer dialect

use std::io::{Read, Seek};

use log::{debug, info};

use crate::op2::framing::RecordReader;
use crate::op2::trace::trace_line;
use crate::op2::types::{
    error::{Op2Error, Result},
    models::{Dialect, FileHeader, PostMode},
};
use crate::op2::utils;

/// Literal payload of the tape identification block.
const TAPE_ID: &[u8] = b"NASTRAN FORT TAPE ID CODE - ";

/// Parses the header block that precedes the first table.
///
/// # Header Structure
/// ```text
/// POST=-1: [3] block(3 words: date) [7] block("NASTRAN FORT TAPE ID CODE - ")
///          record(8-byte version) [-1] [0]
/// POST=-2: nothing; the first table name follows directly
/// ```
///
/// The leading `[2]` of a `POST=-2` file is the first table name's word
/// count, so it is peeked and left in place.
pub fn parse<R: Read + Seek>(reader: &mut RecordReader<R>) -> Result<FileHeader> {
    info!("Parsing OP2 header");
    let markers = reader.get_markers(1, true)?;

    match markers.as_slice() {
        [3] => {
            trace_line!(reader.trace(), "marker = 3 -> PARAM,POST,-1?");
            reader.expect_markers(&[3])?;
            let date_block = reader.read_block()?;
            let date = if date_block.len() == 12 {
                let words = utils::read_words(&date_block, reader.endian())?;
                Some((words[0], words[1], words[2]))
            } else {
                None
            };

            reader.expect_markers(&[7])?;
            let tape = reader.read_block()?;
            if tape != TAPE_ID {
                return Err(Op2Error::Fatal(format!(
                    "unexpected tape identification {:?}",
                    String::from_utf8_lossy(&tape)
                )));
            }
            trace_line!(reader.trace(), "{:?}", String::from_utf8_lossy(&tape));

            let version_bytes = reader.read_record(false)?;
            let version = String::from_utf8_lossy(&version_bytes).trim().to_string();
            let dialect = classify_version(&version)?;
            trace_line!(reader.trace(), "version = {:?} -> {:?}", version, dialect);
            reader.expect_markers(&[-1, 0])?;

            info!("Header parsed: POST=-1, version={:?}, dialect={:?}", version, dialect);
            Ok(FileHeader {
                post: PostMode::Minus1,
                dialect,
                version: Some(version),
                date,
            })
        }
        [2] => {
            trace_line!(reader.trace(), "marker = 2 -> PARAM,POST,-2?");
            debug!("No version record; assuming the MSC dialect");
            info!("Header parsed: POST=-2");
            Ok(FileHeader {
                post: PostMode::Minus2,
                dialect: Dialect::Msc,
                version: None,
                date: None,
            })
        }
        _ => Err(Op2Error::UnrecognizedHeader(markers)),
    }
}

/// Maps a version record to the producer dialect.
pub fn classify_version(version: &str) -> Result<Dialect> {
    if version.starts_with("NX") || version.starts_with("MODEP") {
        Ok(Dialect::Nx)
    } else if version.starts_with("AEROFREQ")
        || version.starts_with("AEROTRAN")
        || version == "XXXXXXXX"
    {
        Ok(Dialect::Msc)
    } else {
        Err(Op2Error::UnknownVersion(version.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_prefixes() {
        assert_eq!(classify_version("NX8.5").unwrap(), Dialect::Nx);
        assert_eq!(classify_version("MODEPX").unwrap(), Dialect::Nx);
        assert_eq!(classify_version("AEROFREQ").unwrap(), Dialect::Msc);
        assert_eq!(classify_version("AEROTRAN").unwrap(), Dialect::Msc);
        assert_eq!(classify_version("XXXXXXXX").unwrap(), Dialect::Msc);
        assert!(matches!(
            classify_version("MSC2005"),
            Err(Op2Error::UnknownVersion(v)) if v == "MSC2005"
        ));
    }
}
