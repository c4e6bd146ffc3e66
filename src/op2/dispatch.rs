//! Table classification and dispatch loop.
//!
//! Drives the table sequence one name at a time:
//! ```text
//! AwaitingTableName --name--> HaveTableName --read--> AwaitingTableName
//!         |
//!         +--[0] or end of file--> Done
//! ```
//! After every dispatched table the stream sits at the next table name (or
//! the end sentinel), so the loop only ever peeks.

use std::collections::HashSet;
use std::io::{Read, Seek};

use log::{debug, info};

use super::format::classify::Classifier;
use super::format::tables::{self, HandlerRegistry, TableContext};
use super::format::{matrix, special};
use super::framing::{RecordReader, TableName};
use super::trace::trace_line;
use super::types::error::{Op2Warning, Result};
use super::types::models::{Dialect, ReadPass, TableContent, TableFamily, TableSizing, TableSpan};

/// Everything one traversal of the table sequence produced.
#[derive(Debug, Default)]
pub struct PassOutcome {
    /// Table names in stream order, repeats included.
    pub table_names: Vec<String>,
    /// Byte range of each dispatched table, parallel to `table_names`.
    pub spans: Vec<TableSpan>,
    /// Sizing facts of each dispatched table, parallel to `table_names`.
    pub sizes: Vec<TableSizing>,
    /// Content kept by the built-in readers, in stream order.
    pub tables: Vec<(String, TableContent)>,
    /// Stream offset once the loop reached `Done`.
    pub end_offset: u64,
    pub warnings: Vec<Op2Warning>,
}

#[derive(Debug)]
enum State {
    AwaitingTableName,
    HaveTableName(String),
    Done,
}

/// Routes each table to the reader for its family.
pub struct Dispatcher<'a> {
    pub classifier: Classifier<'a>,
    pub registry: &'a mut HandlerRegistry,
    pub dialect: Dialect,
    pub pass: ReadPass,
    pub subcases: Option<&'a HashSet<i32>>,
    pub retain_raw_tables: bool,
    /// Sizes from an earlier Sizing pass, indexed like `table_names`.
    pub previous_sizes: &'a [TableSizing],
}

impl Dispatcher<'_> {
    /// Run the table loop until the end sentinel.
    ///
    /// The reader must be positioned at the first table name. Errors raised
    /// inside a table are wrapped with that table's name and start offset.
    pub fn run<R: Read + Seek>(&mut self, reader: &mut RecordReader<R>) -> Result<PassOutcome> {
        let mut outcome = PassOutcome::default();
        let mut state = State::AwaitingTableName;
        loop {
            state = match state {
                State::AwaitingTableName => {
                    if reader.at_eof() {
                        debug!("End of file reached without a closing [0]");
                        State::Done
                    } else {
                        match reader.read_table_name(true)? {
                            TableName::Name(name) => State::HaveTableName(name),
                            TableName::EndOfTables => State::Done,
                        }
                    }
                }
                State::HaveTableName(name) => {
                    let start = reader.position();
                    trace_line!(reader.trace(), "{}", "-".repeat(80));
                    trace_line!(reader.trace(), "table_name = {:?}", name);
                    let index = outcome.table_names.len();
                    let (content, sizing) = self
                        .dispatch(reader, &name, index)
                        .map_err(|e| e.in_table(&name, start))?;

                    outcome.spans.push(TableSpan {
                        name: name.clone(),
                        start,
                        end: reader.position(),
                    });
                    outcome.sizes.push(sizing);
                    if let Some(content) = content {
                        outcome.tables.push((name.clone(), content));
                    }
                    outcome.table_names.push(name);
                    State::AwaitingTableName
                }
                State::Done => break,
            };
        }

        outcome.end_offset = reader.position();
        outcome.warnings = reader.take_warnings();
        info!(
            "{:?} pass finished: {} tables, {} warnings",
            self.pass,
            outcome.table_names.len(),
            outcome.warnings.len()
        );
        Ok(outcome)
    }

    fn dispatch<R: Read + Seek>(
        &mut self,
        reader: &mut RecordReader<R>,
        name: &str,
        index: usize,
    ) -> Result<(Option<TableContent>, TableSizing)> {
        let family = self.classifier.classify(name)?;
        debug!("table {:?} -> {:?}", name, family);
        reader.set_table(name);

        let mut ctx = TableContext::new(
            name,
            family,
            self.dialect,
            reader.endian(),
            self.pass,
            self.subcases,
        );
        match family {
            TableFamily::Matrix => {
                let capacity = match self.previous_sizes.get(index) {
                    Some(TableSizing::Matrix { nnz, .. }) => Some(*nnz),
                    _ => None,
                };
                let decoded = matrix::read(reader, self.pass, capacity)?;
                let sizing = matrix::sizing(&decoded);
                let content = (!self.pass.is_sizing()).then_some(TableContent::Matrix(decoded));
                Ok((content, sizing))
            }
            TableFamily::Geometry | TableFamily::Result => {
                let handler = self.registry.get_mut(name);
                if handler.is_none() {
                    debug!("no handler for {:?}; skipping its records", name);
                }
                let out = tables::read_table(reader, &mut ctx, handler, self.retain_raw_tables)?;
                Ok((out.raw.map(TableContent::Raw), out.sizing))
            }
            TableFamily::Special(_) => {
                let sizing = special::read(reader, &mut ctx, self.registry.get_mut(name))?;
                Ok((None, sizing))
            }
        }
    }
}
