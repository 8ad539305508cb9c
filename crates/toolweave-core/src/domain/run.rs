//! Results of an automation run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome of one executed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Ok,
    Error,
    Skipped,
}

/// One entry of the per-step execution log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepLog {
    /// Zero-based index of the step within its lane.
    pub index: usize,

    /// Action kind (`navigate`, `extract`, ...).
    pub action: String,

    /// Label copied from the step, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Outcome.
    pub status: StepStatus,

    /// Wall-clock duration of the step.
    pub duration_ms: u64,

    /// Error message when `status` is `error` or `skipped`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of running one automation definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerResult {
    /// False if any step without `continueOnError` failed.
    pub success: bool,

    /// Extraction name to extracted value.
    pub data: Map<String, Value>,

    /// Per-step execution log, in execution order.
    pub log: Vec<StepLog>,

    /// Error of the step that aborted the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Independent results of named lanes. Never merged into `data` here.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub lanes: BTreeMap<String, Self>,
}

impl RunnerResult {
    /// True when this run and every lane succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.success && self.lanes.values().all(Self::all_succeeded)
    }

    /// First error of this run or, failing that, of any lane.
    pub fn first_error(&self) -> Option<String> {
        self.error.clone().or_else(|| {
            self.lanes
                .iter()
                .find_map(|(name, lane)| lane.first_error().map(|e| format!("lane '{name}': {e}")))
        })
    }

    /// Data of the main run with each lane's data nested under its name.
    ///
    /// This is the caller-side merge; lanes never write into each other.
    pub fn merged_data(&self) -> Map<String, Value> {
        let mut merged = self.data.clone();
        for (name, lane) in &self.lanes {
            merged.insert(name.clone(), Value::Object(lane.merged_data()));
        }
        merged
    }

    /// Number of log entries with the given status.
    pub fn count(&self, status: StepStatus) -> usize {
        self.log.iter().filter(|entry| entry.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lane(success: bool, error: Option<&str>) -> RunnerResult {
        let mut data = Map::new();
        data.insert("items".to_string(), json!([1, 2]));
        RunnerResult {
            success,
            data,
            log: Vec::new(),
            error: error.map(str::to_string),
            lanes: BTreeMap::new(),
        }
    }

    #[test]
    fn test_merged_data_nests_lanes() {
        let mut main = lane(true, None);
        main.lanes.insert("prices".to_string(), lane(true, None));

        let merged = main.merged_data();
        assert_eq!(merged["items"], json!([1, 2]));
        assert_eq!(merged["prices"]["items"], json!([1, 2]));
        assert!(main.all_succeeded());
    }

    #[test]
    fn test_lane_failure_surfaces() {
        let mut main = lane(true, None);
        main.lanes
            .insert("prices".to_string(), lane(false, Some("timeout")));

        assert!(!main.all_succeeded());
        assert_eq!(main.first_error().as_deref(), Some("lane 'prices': timeout"));
    }
}
