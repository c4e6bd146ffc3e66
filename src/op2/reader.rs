use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::cursor::ByteCursor;
use super::dispatch::{Dispatcher, PassOutcome};
use super::format::classify::Classifier;
use super::format::header;
use super::format::tables::HandlerRegistry;
use super::framing::{RecordReader, TableName};
use super::trace::TraceLog;
use super::types::error::{Op2Error, Op2Warning, Result};
use super::types::models::*;

/// Every knob of a read.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Subcase ids whose result data records are read; `None` reads all.
    pub subcases: Option<HashSet<i32>>,
    /// Unknown table names to read as matrices.
    pub additional_matrices: HashSet<String>,
    /// Read every unknown table as a matrix instead of failing.
    pub skip_unknown_matrices: bool,
    /// Run a Sizing pass before the Materializing pass.
    pub two_pass: bool,
    /// Keep the raw records of geometry/result tables that have no handler.
    pub retain_raw_tables: bool,
    /// Append a verbose trace of the read to this file.
    pub debug_file: Option<PathBuf>,
}

/// What a successful read returns.
#[derive(Debug)]
pub struct ReadOutcome {
    pub header: FileHeader,
    pub endian: Endian,
    /// Table names in stream order, repeats included.
    pub table_names: Vec<String>,
    /// Content kept by the built-in readers, keyed by table name. A name
    /// that occurs twice keeps its last occurrence.
    pub tables: HashMap<String, TableContent>,
    /// Byte range of each table in the Materializing pass.
    pub spans: Vec<TableSpan>,
    /// Byte ranges seen by the Sizing pass, when one ran.
    pub sizing_spans: Option<Vec<TableSpan>>,
    /// Warnings raised by the last pass.
    pub warnings: Vec<Op2Warning>,
}

impl ReadOutcome {
    /// The decoded matrix named `name`, if any.
    pub fn matrix(&self, name: &str) -> Option<&Matrix> {
        match self.tables.get(name) {
            Some(TableContent::Matrix(m)) => Some(m),
            _ => None,
        }
    }

    /// The raw records of `name`, if they were retained.
    pub fn raw_table(&self, name: &str) -> Option<&RawTable> {
        match self.tables.get(name) {
            Some(TableContent::Raw(t)) => Some(t),
            _ => None,
        }
    }
}

/// The main reader for OP2 result files.
///
/// Owns the read options and the per-table handlers. One reader may be
/// used for several files in turn; each read opens, traverses and closes
/// its own stream.
#[derive(Debug, Default)]
pub struct Op2Reader {
    options: ReadOptions,
    registry: HandlerRegistry,
}

impl Op2Reader {
    pub fn new(options: ReadOptions) -> Self {
        Self {
            options,
            registry: HandlerRegistry::new(),
        }
    }

    pub fn with_registry(options: ReadOptions, registry: HandlerRegistry) -> Self {
        Self { options, registry }
    }

    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    pub fn registry_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.registry
    }

    /// Give the handlers back, e.g. to collect what they decoded.
    pub fn into_registry(self) -> HandlerRegistry {
        self.registry
    }

    /// Read an OP2 file from the given path.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be opened, is empty or is not binary
    /// - The byte order or the header cannot be recognized
    /// - The file holds no tables
    /// - A table is framed incorrectly or cannot be classified
    ///
    /// The file handle and the trace file are released on every path.
    pub fn read_file(&mut self, path: impl AsRef<Path>) -> Result<ReadOutcome> {
        let cursor = ByteCursor::open(path)?;
        self.read_cursor(cursor)
    }

    /// Read an already-open seekable stream.
    pub fn read_stream<R: Read + Seek>(&mut self, stream: R) -> Result<ReadOutcome> {
        let cursor = ByteCursor::new(stream)?;
        self.read_cursor(cursor)
    }

    fn read_cursor<R: Read + Seek>(&mut self, cursor: ByteCursor<R>) -> Result<ReadOutcome> {
        let trace = match &self.options.debug_file {
            Some(path) => TraceLog::open(path),
            None => TraceLog::disabled(),
        };
        let mut reader = RecordReader::new(cursor, trace);
        let result = self.session(&mut reader);
        reader.close();
        result
    }

    fn session<R: Read + Seek>(&mut self, reader: &mut RecordReader<R>) -> Result<ReadOutcome> {
        let endian = reader.endian();
        let header = header::parse(reader)?;
        let tables_start = reader.position();
        require_first_table(reader)?;

        let sizing = if self.options.two_pass {
            let outcome = self.run_pass(reader, header.dialect, ReadPass::Sizing, &[])?;
            reader.goto(tables_start)?;
            Some(outcome)
        } else {
            None
        };
        let previous_sizes = sizing.as_ref().map_or(&[][..], |o| o.sizes.as_slice());
        let outcome = self.run_pass(reader, header.dialect, ReadPass::Materializing, previous_sizes)?;

        if let Some(sized) = &sizing
            && (sized.spans != outcome.spans || sized.end_offset != outcome.end_offset)
        {
            return Err(Op2Error::Internal(format!(
                "sizing pass ended at byte {} but materializing pass ended at byte {}",
                sized.end_offset, outcome.end_offset
            )));
        }

        info!(
            "Read {} tables ({} kept, {} warnings)",
            outcome.table_names.len(),
            outcome.tables.len(),
            outcome.warnings.len()
        );
        let PassOutcome {
            table_names,
            spans,
            tables,
            warnings,
            ..
        } = outcome;
        Ok(ReadOutcome {
            header,
            endian,
            table_names,
            tables: tables.into_iter().collect(),
            spans,
            sizing_spans: sizing.map(|o| o.spans),
            warnings,
        })
    }

    fn run_pass<R: Read + Seek>(
        &mut self,
        reader: &mut RecordReader<R>,
        dialect: Dialect,
        pass: ReadPass,
        previous_sizes: &[TableSizing],
    ) -> Result<PassOutcome> {
        info!("Starting {:?} pass", pass);
        let options = &self.options;
        let mut dispatcher = Dispatcher {
            classifier: Classifier {
                additional_matrices: &options.additional_matrices,
                skip_unknown_matrices: options.skip_unknown_matrices,
            },
            registry: &mut self.registry,
            dialect,
            pass,
            subcases: options.subcases.as_ref(),
            retain_raw_tables: options.retain_raw_tables,
            previous_sizes,
        };
        dispatcher.run(reader)
    }
}

/// Fail unless a table name follows the header.
fn require_first_table<R: Read + Seek>(reader: &mut RecordReader<R>) -> Result<()> {
    let first = if reader.at_eof() {
        None
    } else {
        match reader.read_table_name(true)? {
            TableName::Name(name) => Some(name),
            TableName::EndOfTables => None,
        }
    };
    match first {
        Some(name) => {
            debug!("First table: {:?}", name);
            Ok(())
        }
        None => Err(Op2Error::Fatal(
            "no tables exist; check for an upstream fatal error".to_string(),
        )),
    }
}
