//! Result sinks: one row per tick plus a final summary.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::SimResult;

/// A model field recorded in every tick row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputField {
    pub model: String,
    pub field: String,
}

impl OutputField {
    pub fn new(model: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            field: field.into(),
        }
    }

    /// Column name, `model.field`.
    pub fn column(&self) -> String {
        format!("{}.{}", self.model, self.field)
    }
}

/// Values after one completed tick; `values` follow the output column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRow {
    pub tick: u64,
    pub t: f64,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Reached the configured end.
    Completed,
    /// Stopped on command.
    Stopped,
    /// Aborted by a failing model or container.
    Failed { message: String },
}

/// Final accounting for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub ticks: u64,
    pub t_final: f64,
    pub overruns: u64,
    pub mesh_exhaustions: u64,
    pub exchange_failures: u64,
    pub mean_tick_s: f64,
    /// Sticky: set by any fatal failure or mesh exhaustion during the run.
    pub degraded: bool,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        !self.degraded
    }
}

/// Destination of kernel results. The kernel never interprets the encoding.
pub trait ResultSink: Send {
    /// Called once before the first row with the output column names.
    fn begin(&mut self, _columns: &[String]) -> SimResult<()> {
        Ok(())
    }

    fn write_row(&mut self, row: &TickRow) -> SimResult<()>;

    fn finish(&mut self, summary: &RunSummary) -> SimResult<()>;
}

#[derive(Debug, Default)]
pub struct MemoryLog {
    pub columns: Vec<String>,
    pub rows: Vec<TickRow>,
    pub summary: Option<RunSummary>,
}

/// In-memory sink; clones share one log so a test can keep a handle while
/// the kernel owns the sink.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    log: Arc<Mutex<MemoryLog>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<TickRow> {
        self.log.lock().rows.clone()
    }

    pub fn columns(&self) -> Vec<String> {
        self.log.lock().columns.clone()
    }

    pub fn summary(&self) -> Option<RunSummary> {
        self.log.lock().summary.clone()
    }
}

impl ResultSink for MemorySink {
    fn begin(&mut self, columns: &[String]) -> SimResult<()> {
        self.log.lock().columns = columns.to_vec();
        Ok(())
    }

    fn write_row(&mut self, row: &TickRow) -> SimResult<()> {
        self.log.lock().rows.push(row.clone());
        Ok(())
    }

    fn finish(&mut self, summary: &RunSummary) -> SimResult<()> {
        self.log.lock().summary = Some(summary.clone());
        Ok(())
    }
}
