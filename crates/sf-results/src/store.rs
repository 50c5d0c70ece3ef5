//! Run storage API.
//!
//! Each run lives in its own directory under the store root:
//! `manifest.json`, `timeseries.jsonl` (one record per tick) and, once the
//! run has finished, `summary.json`.

use crate::sink::JsonlRunSink;
use crate::types::{RunManifest, TimeseriesRecord};
use crate::{ResultsError, ResultsResult};
use sf_sim::RunSummary;
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) const MANIFEST_FILE: &str = "manifest.json";
pub(crate) const TIMESERIES_FILE: &str = "timeseries.jsonl";
pub(crate) const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Clone)]
pub struct RunStore {
    root_dir: PathBuf,
}

impl RunStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        fs::create_dir_all(&root_dir)?;
        Ok(Self { root_dir })
    }

    /// Store next to a project file, in `.seqflow/runs`.
    pub fn for_project(project_path: &Path) -> ResultsResult<Self> {
        let project_dir = project_path
            .parent()
            .ok_or_else(|| ResultsError::InvalidPath {
                message: "project path has no parent directory".to_string(),
            })?;
        Self::new(project_dir.join(".seqflow").join("runs"))
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root_dir.join(run_id)
    }

    pub fn has_run(&self, run_id: &str) -> bool {
        self.run_dir(run_id).join(MANIFEST_FILE).exists()
    }

    /// Create the run directory and hand back a sink that fills it.
    pub fn create_run(&self, manifest: RunManifest) -> ResultsResult<JsonlRunSink> {
        if self.has_run(&manifest.run_id) {
            return Err(ResultsError::RunExists {
                run_id: manifest.run_id,
            });
        }
        let run_dir = self.run_dir(&manifest.run_id);
        fs::create_dir_all(&run_dir)?;
        write_json(&run_dir.join(MANIFEST_FILE), &manifest)?;
        tracing::debug!(run_id = %manifest.run_id, dir = %run_dir.display(), "run created");
        Ok(JsonlRunSink::new(run_dir, manifest))
    }

    pub fn load_manifest(&self, run_id: &str) -> ResultsResult<RunManifest> {
        let content = self.read_run_file(run_id, MANIFEST_FILE)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn load_timeseries(&self, run_id: &str) -> ResultsResult<Vec<TimeseriesRecord>> {
        let content = self.read_run_file(run_id, TIMESERIES_FILE)?;
        let mut records = Vec::new();
        for line in content.lines() {
            if !line.trim().is_empty() {
                records.push(serde_json::from_str(line)?);
            }
        }
        Ok(records)
    }

    /// Final summary, or `None` for a run that never finished.
    pub fn load_summary(&self, run_id: &str) -> ResultsResult<Option<RunSummary>> {
        if !self.has_run(run_id) {
            return Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        let path = self.run_dir(run_id).join(SUMMARY_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Manifests of stored runs, oldest first, optionally for one project.
    pub fn list_runs(&self, project_name: Option<&str>) -> ResultsResult<Vec<RunManifest>> {
        let mut runs = Vec::new();

        for entry in fs::read_dir(&self.root_dir)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let run_id = entry.file_name().to_string_lossy().to_string();
            match self.load_manifest(&run_id) {
                Ok(manifest) if project_name.is_none_or(|name| manifest.project_name == name) => {
                    runs.push(manifest);
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(%run_id, error = %err, "skipping unreadable run"),
            }
        }

        runs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(runs)
    }

    pub fn delete_run(&self, run_id: &str) -> ResultsResult<()> {
        let run_dir = self.run_dir(run_id);
        if run_dir.exists() {
            fs::remove_dir_all(run_dir)?;
        }
        Ok(())
    }

    fn read_run_file(&self, run_id: &str, file: &str) -> ResultsResult<String> {
        let path = self.run_dir(run_id).join(file);
        if !path.exists() {
            return Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        Ok(fs::read_to_string(path)?)
    }
}

pub(crate) fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> ResultsResult<()> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}
