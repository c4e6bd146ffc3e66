//! Optional verbose trace file.
//!
//! An append-only text log of markers, records and dispatch decisions.
//! Write failures are reported once through `log` and then ignored, so the
//! presence of a trace file never changes what a read returns.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use log::warn;

#[derive(Debug, Default)]
pub struct TraceLog {
    sink: Option<BufWriter<File>>,
}

impl TraceLog {
    /// A trace that discards everything.
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Open (or append to) a trace file.
    ///
    /// A file that cannot be opened yields a disabled trace.
    pub fn open(path: &Path) -> Self {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Self {
                sink: Some(BufWriter::new(file)),
            },
            Err(e) => {
                warn!("Cannot open trace file {}: {}", path.display(), e);
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn line(&mut self, args: fmt::Arguments<'_>) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        if let Err(e) = writeln!(sink, "{}", args) {
            warn!("Trace file write failed, disabling trace: {}", e);
            self.sink = None;
        }
    }

    /// Flush and release the file handle.
    pub fn close(&mut self) {
        if let Some(mut sink) = self.sink.take()
            && let Err(e) = sink.flush()
        {
            warn!("Trace file flush failed: {}", e);
        }
    }
}

impl Drop for TraceLog {
    fn drop(&mut self) {
        self.close();
    }
}

/// Write a formatted line to a [`TraceLog`] only when it is enabled.
macro_rules! trace_line {
    ($trace:expr, $($arg:tt)*) => {
        if $trace.is_enabled() {
            $trace.line(format_args!($($arg)*));
        }
    };
}

pub(crate) use trace_line;
