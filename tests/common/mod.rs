//! Test-only writer for synthetic OP2 containers.
#![allow(dead_code)]

use std::io::Write;

use tempfile::NamedTempFile;

pub const TAPE_ID: &[u8] = b"NASTRAN FORT TAPE ID CODE - ";

/// Pad or cut a name to the 8-byte field width.
pub fn name8(name: &str) -> Vec<u8> {
    let mut out = name.as_bytes().to_vec();
    out.resize(8, b' ');
    out
}

/// A result header record: approach code, table code, element type, subcase.
pub fn result_header(subcase: i32) -> Vec<i32> {
    vec![1, 1, 0, subcase, 0, 0, 0, 0]
}

pub struct Op2Writer {
    big: bool,
    buf: Vec<u8>,
}

impl Op2Writer {
    pub fn new(big: bool) -> Self {
        Self {
            big,
            buf: Vec::new(),
        }
    }

    pub fn word(&self, value: i32) -> [u8; 4] {
        if self.big {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }

    pub fn words(&self, values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|&v| self.word(v)).collect()
    }

    pub fn floats(&self, values: &[f32]) -> Vec<u8> {
        values
            .iter()
            .flat_map(|&v| if self.big { v.to_be_bytes() } else { v.to_le_bytes() })
            .collect()
    }

    pub fn block(&mut self, payload: &[u8]) -> &mut Self {
        let len = self.word(payload.len() as i32);
        self.buf.extend_from_slice(&len);
        self.buf.extend_from_slice(payload);
        self.buf.extend_from_slice(&len);
        self
    }

    pub fn marker(&mut self, value: i32) -> &mut Self {
        let payload = self.word(value);
        self.block(&payload)
    }

    pub fn markers(&mut self, values: &[i32]) -> &mut Self {
        for &v in values {
            self.marker(v);
        }
        self
    }

    /// `[nwords]` followed by the payload block.
    pub fn record(&mut self, payload: &[u8]) -> &mut Self {
        self.marker((payload.len() / 4) as i32);
        self.block(payload)
    }

    pub fn int_record(&mut self, values: &[i32]) -> &mut Self {
        let payload = self.words(values);
        self.record(&payload)
    }

    /// A `POST=-1` header with the given version string.
    pub fn post1_header(&mut self, version: &str) -> &mut Self {
        self.marker(3);
        let date = self.words(&[10, 18, 26]);
        self.block(&date);
        self.marker(7);
        self.block(TAPE_ID);
        self.record(&name8(version));
        self.markers(&[-1, 0])
    }

    /// Table name, `[-1]`, trailer and `[-2,1,0]` subtable record.
    pub fn preamble(&mut self, name: &str, trailer: &[i32], subtable: &[u8]) -> &mut Self {
        self.record(&name8(name));
        self.marker(-1);
        self.int_record(trailer);
        self.markers(&[-2, 1, 0]);
        self.record(subtable)
    }

    /// `[-3,1,0] rec [-4,1,0] rec ... [0]`.
    pub fn subtables(&mut self, records: &[Vec<u8>]) -> &mut Self {
        let mut isub = -3;
        self.markers(&[isub, 1, 0]);
        for rec in records {
            self.record(rec);
            isub -= 1;
            self.markers(&[isub, 1, 0]);
        }
        self.marker(0)
    }

    pub fn geometry_table(&mut self, name: &str, records: &[Vec<u8>]) -> &mut Self {
        self.preamble(name, &[7, 0, 0, 0, 0, 0, 0], &name8(name));
        self.subtables(records)
    }

    /// A result table with one header/data pair per subcase.
    pub fn result_table(&mut self, name: &str, subcases: &[(i32, Vec<u8>)]) -> &mut Self {
        self.preamble(name, &[101, 0, 0, 0, 0, 0, 0], &name8(name));
        let mut records = Vec::new();
        for (subcase, data) in subcases {
            records.push(self.words(&result_header(*subcase)));
            records.push(data.clone());
        }
        self.subtables(&records)
    }

    pub fn doubles(&self, values: &[f64]) -> Vec<u8> {
        values
            .iter()
            .flat_map(|&v| if self.big { v.to_be_bytes() } else { v.to_le_bytes() })
            .collect()
    }

    /// `[k]` marker and a block of `k + 1` words, the shape of a matrix or
    /// raw-segment column entry.
    pub fn segment(&mut self, words: &[i32]) -> &mut Self {
        self.marker(words.len() as i32 - 1);
        let payload = self.words(words);
        self.block(&payload)
    }

    /// A matrix with precision code `tout`; each column is a list of
    /// `(start_row, element bytes)` segments with 1-based rows.
    pub fn matrix(
        &mut self,
        name: &str,
        rows: i32,
        cols: i32,
        tout: i32,
        columns: &[Vec<(i32, Vec<u8>)>],
    ) -> &mut Self {
        let nwords: usize = columns.iter().flatten().map(|(_, v)| v.len() / 4).sum();
        let mut id = name8(name);
        id.extend(self.words(&[170, 170]));
        self.preamble(name, &[101, 2, rows, cols, tout, nwords as i32, 0], &id);

        let mut itable = -3;
        for segments in columns {
            self.markers(&[itable, 1, 1]);
            for (start_row, bytes) in segments {
                self.marker((bytes.len() / 4) as i32);
                let mut payload = self.word(*start_row).to_vec();
                payload.extend_from_slice(bytes);
                self.block(&payload);
            }
            itable -= 1;
        }
        self.markers(&[itable, 1, 0, 0])
    }

    /// A real32 matrix; each column is a list of `(start_row, values)`
    /// segments with 1-based rows.
    pub fn matrix_real32(
        &mut self,
        name: &str,
        rows: i32,
        cols: i32,
        columns: &[Vec<(i32, Vec<f32>)>],
    ) -> &mut Self {
        let columns: Vec<Vec<(i32, Vec<u8>)>> = columns
            .iter()
            .map(|segments| {
                segments
                    .iter()
                    .map(|(row, values)| (*row, self.floats(values)))
                    .collect()
            })
            .collect();
        self.matrix(name, rows, cols, 1, &columns)
    }

    /// The bare `[0]` that ends the table sequence.
    pub fn end(&mut self) -> &mut Self {
        self.marker(0)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn write_temp(&self) -> NamedTempFile {
        let mut temp = NamedTempFile::new().expect("create temp file");
        temp.write_all(&self.buf).expect("write temp file");
        temp.flush().expect("flush temp file");
        temp
    }
}
