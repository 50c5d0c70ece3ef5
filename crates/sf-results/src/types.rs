//! Result data types.

use serde::{Deserialize, Serialize};
use sf_project::Project;
use sf_sim::TickRow;

use crate::hash::{compute_run_id, project_hash};

pub type RunId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: RunId,
    pub project_name: String,
    pub project_hash: String,
    pub timestamp: String,
    pub settings: RunSettings,
    /// Output column names, `model.field`, filled in when the run begins.
    #[serde(default)]
    pub columns: Vec<String>,
    pub solver_version: String,
}

impl RunManifest {
    /// Manifest for a run of `project` starting now.
    pub fn for_project(project: &Project, settings: RunSettings, solver_version: &str) -> Self {
        let timestamp = chrono::Utc::now().to_rfc3339();
        Self {
            run_id: compute_run_id(project, &timestamp),
            project_name: project.name.clone(),
            project_hash: project_hash(project),
            timestamp,
            settings,
            columns: Vec::new(),
            solver_version: solver_version.to_string(),
        }
    }
}

/// Effective kernel settings after command-line overrides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    pub step_s: f64,
    pub pacing_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t_end_s: Option<f64>,
}

/// One line of `timeseries.jsonl`. Unreadable values are stored as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesRecord {
    pub tick: u64,
    pub time_s: f64,
    pub values: Vec<Option<f64>>,
}

impl From<&TickRow> for TimeseriesRecord {
    fn from(row: &TickRow) -> Self {
        Self {
            tick: row.tick,
            time_s: row.t,
            values: row
                .values
                .iter()
                .map(|v| v.is_finite().then_some(*v))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_values_become_null() {
        let row = TickRow {
            tick: 3,
            t: 0.3,
            values: vec![1.0, f64::NAN],
        };
        let record = TimeseriesRecord::from(&row);
        assert_eq!(record.values, vec![Some(1.0), None]);
        let line = serde_json::to_string(&record).unwrap();
        assert!(line.contains("null"));
        assert_eq!(serde_json::from_str::<TimeseriesRecord>(&line).unwrap(), record);
    }
}
