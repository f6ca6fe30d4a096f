//! Typed screening stream events.
//!
//! Each frame payload is `{"event": "<kind>", "data": {...}}`. Adding a kind means adding a
//! variant here, and every `match` over `ScreeningEvent` has to handle it.

use crate::domain::model::CandidateResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ScreeningEvent {
    ScreeningStarted(StartedData),
    BatchProcessing(BatchProgressData),
    BatchComplete(BatchCompleteData),
    ScreeningComplete(CompleteData),
}

impl ScreeningEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ScreeningStarted(_) => "screening_started",
            Self::BatchProcessing(_) => "batch_processing",
            Self::BatchComplete(_) => "batch_complete",
            Self::ScreeningComplete(_) => "screening_complete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartedData {
    #[serde(alias = "total")]
    pub total_candidates: usize,
    #[serde(default)]
    pub total_batches: usize,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchProgressData {
    /// 依序處理的串流不帶批次編號
    #[serde(default, alias = "batch", alias = "batch_idx")]
    pub batch_index: Option<usize>,
    #[serde(default)]
    pub total_batches: Option<usize>,
    #[serde(alias = "progress_percentage")]
    pub progress: f64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCompleteData {
    #[serde(default, alias = "batch", alias = "batch_idx")]
    pub batch_index: Option<usize>,
    #[serde(default, alias = "batch_results")]
    pub candidates: Vec<CandidateResult>,
    /// Server-side running totals. Only used to move progress forward.
    #[serde(default)]
    pub processed: Option<usize>,
    #[serde(default)]
    pub total: Option<usize>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompleteData {
    #[serde(default)]
    pub total_processed: Option<usize>,
    #[serde(default)]
    pub qualified_count: Option<usize>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub message: String,
}
