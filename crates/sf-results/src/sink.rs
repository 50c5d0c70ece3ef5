//! Kernel sink writing straight into a run directory.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use sf_sim::{ResultSink, RunSummary, SimError, SimResult, TickRow};

use crate::store::{MANIFEST_FILE, SUMMARY_FILE, TIMESERIES_FILE, write_json};
use crate::types::{RunManifest, TimeseriesRecord};
use crate::ResultsResult;

/// Appends one JSONL record per tick and writes the summary on finish.
///
/// Every row is flushed so a run interrupted part way stays readable.
#[derive(Debug)]
pub struct JsonlRunSink {
    run_dir: PathBuf,
    manifest: RunManifest,
    timeseries: Option<BufWriter<File>>,
}

fn sink_error(err: impl std::fmt::Display) -> SimError {
    SimError::Sink {
        message: err.to_string(),
    }
}

impl JsonlRunSink {
    pub(crate) fn new(run_dir: PathBuf, manifest: RunManifest) -> Self {
        Self {
            run_dir,
            manifest,
            timeseries: None,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.manifest.run_id
    }

    pub fn manifest(&self) -> &RunManifest {
        &self.manifest
    }

    fn open_timeseries(&mut self) -> ResultsResult<&mut BufWriter<File>> {
        let out = match self.timeseries.take() {
            Some(out) => out,
            None => BufWriter::new(
                File::options()
                    .create(true)
                    .append(true)
                    .open(self.run_dir.join(TIMESERIES_FILE))?,
            ),
        };
        Ok(self.timeseries.insert(out))
    }

    fn append(&mut self, record: &TimeseriesRecord) -> ResultsResult<()> {
        let line = serde_json::to_string(record)?;
        let out = self.open_timeseries()?;
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}

impl ResultSink for JsonlRunSink {
    fn begin(&mut self, columns: &[String]) -> SimResult<()> {
        self.manifest.columns = columns.to_vec();
        write_json(&self.run_dir.join(MANIFEST_FILE), &self.manifest).map_err(sink_error)?;
        // Rows only ever append, so an empty file marks a started run.
        self.open_timeseries().map_err(sink_error)?;
        Ok(())
    }

    fn write_row(&mut self, row: &TickRow) -> SimResult<()> {
        self.append(&TimeseriesRecord::from(row)).map_err(sink_error)
    }

    fn finish(&mut self, summary: &RunSummary) -> SimResult<()> {
        if let Some(out) = self.timeseries.as_mut() {
            out.flush().map_err(sink_error)?;
        }
        write_json(&self.run_dir.join(SUMMARY_FILE), summary).map_err(sink_error)?;
        tracing::info!(
            run_id = %self.manifest.run_id,
            ticks = summary.ticks,
            degraded = summary.degraded,
            "run stored"
        );
        Ok(())
    }
}
