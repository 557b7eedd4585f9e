use crate::db::InventoryRecord;
use serde::Serialize;
use std::sync::Arc;

/// Lifecycle of the one live batch dataset
///
/// `Idle -> Loading -> Success | Error`, and back to `Loading` on refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum DatasetState {
    #[default]
    Idle,
    Loading,
    Success(Arc<Vec<InventoryRecord>>),
    Error(String),
}

impl DatasetState {
    pub fn success(records: Vec<InventoryRecord>) -> Self {
        DatasetState::Success(Arc::new(records))
    }

    /// Records of a successful pass; empty in every other state
    pub fn records(&self) -> Arc<Vec<InventoryRecord>> {
        match self {
            DatasetState::Success(records) => records.clone(),
            _ => Arc::new(Vec::new()),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, DatasetState::Loading)
    }

    pub fn label(&self) -> &str {
        match self {
            DatasetState::Idle => "Idle",
            DatasetState::Loading => "Loading",
            DatasetState::Success(_) => "Ready",
            DatasetState::Error(_) => "Error",
        }
    }
}
