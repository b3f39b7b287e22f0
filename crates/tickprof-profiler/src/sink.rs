//! Destinations for finalized reports.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

use tickprof_core::Result;

use crate::events::ProfileReport;

/// Receives the finalized report of a profiler, synchronously, exactly once.
pub trait ReportSink {
    /// Deliver `report`.
    fn deliver(&mut self, report: &ProfileReport) -> Result<()>;
}

/// Discards reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn deliver(&mut self, _report: &ProfileReport) -> Result<()> {
        Ok(())
    }
}

/// Hands reports to a user callback.
pub struct CallbackSink<F> {
    callback: F,
}

impl<F: FnMut(&ProfileReport)> CallbackSink<F> {
    pub const fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F: FnMut(&ProfileReport)> ReportSink for CallbackSink<F> {
    fn deliver(&mut self, report: &ProfileReport) -> Result<()> {
        (self.callback)(report);
        Ok(())
    }
}

/// Writes each report as one JSON document followed by a newline.
#[derive(Debug)]
pub struct JsonSink<W> {
    writer: W,
    pretty: bool,
}

impl<W: Write> JsonSink<W> {
    /// Compact, one report per line.
    pub const fn new(writer: W) -> Self {
        Self {
            writer,
            pretty: false,
        }
    }

    /// Indented output.
    pub const fn pretty(writer: W) -> Self {
        Self {
            writer,
            pretty: true,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReportSink for JsonSink<W> {
    fn deliver(&mut self, report: &ProfileReport) -> Result<()> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, report).map_err(std::io::Error::from)?;
        } else {
            serde_json::to_writer(&mut self.writer, report).map_err(std::io::Error::from)?;
        }
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps reports in memory. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    reports: Arc<Mutex<Vec<ProfileReport>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports delivered so far.
    #[must_use]
    pub fn reports(&self) -> Vec<ProfileReport> {
        self.reports.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }
}

impl ReportSink for MemorySink {
    fn deliver(&mut self, report: &ProfileReport) -> Result<()> {
        self.reports.lock().push(report.clone());
        Ok(())
    }
}
