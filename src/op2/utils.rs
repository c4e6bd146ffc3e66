//! Low-level byte decoding utilities

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::types::error::{Op2Error, Result};
use super::types::models::Endian;

/// Decode a signed 32-bit word in the given byte order.
pub fn i32_at(bytes: &[u8], endian: Endian) -> i32 {
    match endian {
        Endian::Big => BigEndian::read_i32(bytes),
        Endian::Little => LittleEndian::read_i32(bytes),
    }
}

pub fn f32_at(bytes: &[u8], endian: Endian) -> f32 {
    match endian {
        Endian::Big => BigEndian::read_f32(bytes),
        Endian::Little => LittleEndian::read_f32(bytes),
    }
}

pub fn f64_at(bytes: &[u8], endian: Endian) -> f64 {
    match endian {
        Endian::Big => BigEndian::read_f64(bytes),
        Endian::Little => LittleEndian::read_f64(bytes),
    }
}

/// Decode a buffer of whole 32-bit words.
///
/// Used for fixed-layout integer records such as the matrix trailer.
pub fn read_words(bytes: &[u8], endian: Endian) -> Result<Vec<i32>> {
    if bytes.len() % 4 != 0 {
        return Err(Op2Error::InvalidFormat(format!(
            "Record of {} bytes is not a whole number of words",
            bytes.len()
        )));
    }
    Ok(bytes.chunks_exact(4).map(|w| i32_at(w, endian)).collect())
}

/// Decode a fixed 8-byte name field, trimming padding.
pub fn name_field(bytes: &[u8]) -> String {
    let end = bytes.len().min(8);
    String::from_utf8_lossy(&bytes[..end])
        .trim_matches(|c: char| c == ' ' || c == '\0')
        .to_string()
}

/// Returns true if `chunk` contains a byte outside the text set.
///
/// The text set is BEL, BS, TAB, LF, FF, CR, ESC and 0x20..=0xFF except DEL.
pub fn looks_binary(chunk: &[u8]) -> bool {
    chunk.iter().any(|&b| {
        let text = matches!(b, 7 | 8 | 9 | 10 | 12 | 13 | 27) || (b >= 0x20 && b != 0x7F);
        !text
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_follow_byte_order() {
        assert_eq!(i32_at(&[0, 0, 0, 4], Endian::Big), 4);
        assert_eq!(i32_at(&[4, 0, 0, 0], Endian::Little), 4);
        assert_eq!(i32_at(&[0xFF, 0xFF, 0xFF, 0xFD], Endian::Big), -3);
    }

    #[test]
    fn name_field_trims_padding() {
        assert_eq!(name_field(b"OUGV1   "), "OUGV1");
        assert_eq!(name_field(b"KAA\0\0\0\0\0extra"), "KAA");
    }

    #[test]
    fn binary_sniffing() {
        assert!(!looks_binary(b"$ a bulk data deck\nGRID,1\n"));
        assert!(looks_binary(&[4, 0, 0, 0, 3, 0, 0, 0]));
    }

    #[test]
    fn ragged_word_buffers_are_rejected() {
        assert!(read_words(&[0, 0, 0], Endian::Big).is_err());
        assert_eq!(read_words(&[0, 0, 0, 7, 0, 0, 0, 9], Endian::Big).unwrap(), vec![7, 9]);
    }
}
