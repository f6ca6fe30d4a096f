use crate::core::events::{
    BatchCompleteData, BatchProgressData, CompleteData, ScreeningEvent, StartedData,
};
use crate::core::store::ResultStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 批次狀態陣列的硬上限，與服務回報的數量無關
pub const MAX_TRACKED_BATCHES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregatorPhase {
    #[default]
    Idle,
    Running,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchSlot {
    Pending,
    Processing,
    Complete,
}

/// 累計進度；`qualified <= processed <= total` 在每個事件之後都成立
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressState {
    pub total: usize,
    pub processed: usize,
    pub qualified: usize,
    pub current_batch: Option<usize>,
    pub total_batches: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cost: f64,
    pub progress: f64,
    pub message: String,
}

impl ProgressState {
    /// Estimated time remaining: `elapsed * (100 / progress - 1)`, unknown until progress > 0.
    pub fn eta(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.finished_at.is_some() {
            return Some(Duration::ZERO);
        }
        let started_at = self.started_at?;
        if self.progress <= 0.0 {
            return None;
        }

        let elapsed = (now - started_at).to_std().unwrap_or(Duration::ZERO);
        let factor = (100.0 / self.progress - 1.0).max(0.0);
        Duration::try_from_secs_f64(elapsed.as_secs_f64() * factor).ok()
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        let end = self.finished_at.unwrap_or(now);
        self.started_at
            .map(|start| (end - start).to_std().unwrap_or(Duration::ZERO))
    }
}

/// What an applied event changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Started,
    Progressed,
    BatchApplied { added: usize, qualified: usize },
    ResultsReady,
    Ignored,
}

#[derive(Debug, Clone, Default)]
pub struct ProgressAggregator {
    phase: AggregatorPhase,
    state: ProgressState,
    batches: Vec<BatchSlot>,
}

impl ProgressAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds an aggregator from saved progress. A state with `finished_at` comes back
    /// finished, anything else comes back running with every batch still pending.
    pub fn from_state(state: ProgressState) -> Self {
        let (phase, slot) = if state.finished_at.is_some() {
            (AggregatorPhase::Finished, BatchSlot::Complete)
        } else if state.started_at.is_some() {
            (AggregatorPhase::Running, BatchSlot::Pending)
        } else {
            (AggregatorPhase::Idle, BatchSlot::Pending)
        };
        Self {
            phase,
            batches: vec![slot; state.total_batches.min(MAX_TRACKED_BATCHES)],
            state,
        }
    }

    pub fn phase(&self) -> AggregatorPhase {
        self.phase
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn batches(&self) -> &[BatchSlot] {
        &self.batches
    }

    pub fn is_finished(&self) -> bool {
        self.phase == AggregatorPhase::Finished
    }

    pub fn apply(
        &mut self,
        event: ScreeningEvent,
        store: &mut ResultStore,
        now: DateTime<Utc>,
    ) -> Transition {
        use AggregatorPhase::*;
        use ScreeningEvent::*;

        match (self.phase, event) {
            (Idle, ScreeningStarted(data)) => self.start(data, now),
            (Running, BatchProcessing(data)) => self.batch_progress(data),
            (Running, BatchComplete(data)) => self.batch_complete(data, store),
            (Running, ScreeningComplete(data)) => self.complete(data, now),
            (Idle, event @ (BatchProcessing(_) | BatchComplete(_) | ScreeningComplete(_))) => {
                tracing::debug!("Ignoring {} before screening_started", event.kind());
                Transition::Ignored
            }
            (Running, ScreeningStarted(_)) => {
                tracing::debug!("Ignoring repeated screening_started");
                Transition::Ignored
            }
            (Finished, event) => {
                tracing::debug!("Ignoring {} after screening_complete", event.kind());
                Transition::Ignored
            }
        }
    }

    fn start(&mut self, data: StartedData, now: DateTime<Utc>) -> Transition {
        tracing::info!(
            "🚀 Screening started: {} candidates in {} batches",
            data.total_candidates,
            data.total_batches
        );
        self.phase = AggregatorPhase::Running;
        self.batches = vec![BatchSlot::Pending; data.total_batches.min(MAX_TRACKED_BATCHES)];
        self.state = ProgressState {
            total: data.total_candidates,
            total_batches: data.total_batches,
            started_at: Some(now),
            message: data.message,
            ..ProgressState::default()
        };
        Transition::Started
    }

    fn batch_progress(&mut self, data: BatchProgressData) -> Transition {
        if let Some(total_batches) = data.total_batches {
            self.state.total_batches = self.state.total_batches.max(total_batches);
        }
        if let Some(slot) = self.slot_mut(data.batch_index) {
            if *slot == BatchSlot::Pending {
                *slot = BatchSlot::Processing;
            }
        }

        let progress = if data.progress.is_finite() {
            data.progress.clamp(0.0, 100.0)
        } else {
            0.0
        };
        self.state.progress = self.state.progress.max(progress);
        if data.batch_index.is_some() {
            self.state.current_batch = data.batch_index;
        }
        if !data.message.is_empty() {
            self.state.message = data.message;
        }

        tracing::debug!(
            "⏳ Batch {} processing ({:.0}%)",
            batch_label(data.batch_index),
            self.state.progress
        );
        Transition::Progressed
    }

    fn batch_complete(&mut self, data: BatchCompleteData, store: &mut ResultStore) -> Transition {
        // 沒有編號或編號超出範圍的批次只靠 id 去重合併
        let already_complete = match self.slot_mut(data.batch_index) {
            Some(slot) => {
                let was_complete = *slot == BatchSlot::Complete;
                *slot = BatchSlot::Complete;
                was_complete
            }
            None => false,
        };

        if already_complete {
            tracing::warn!(
                "🔁 batch_complete for batch {} delivered again, merging by candidate id",
                batch_label(data.batch_index)
            );
        } else if let Some(cost) = data.cost.filter(|c| c.is_finite() && *c > 0.0) {
            self.state.cost += cost;
        }

        let (added, qualified) = {
            let added = store.extend(data.candidates);
            (added.len(), added.iter().filter(|c| c.qualified).count())
        };

        if self.state.total == 0 {
            if let Some(total) = data.total {
                self.state.total = total;
            }
        }
        self.state.processed = (self.state.processed + added).min(self.state.total);
        self.state.qualified = (self.state.qualified + qualified).min(self.state.processed);
        if self.state.total > 0 {
            let fraction = self.state.processed as f64 / self.state.total as f64 * 100.0;
            self.state.progress = self.state.progress.max(fraction);
        }
        // 服務端回報的進度只能往前推
        if let Some(reported) = data.progress.filter(|p| p.is_finite()) {
            self.state.progress = self.state.progress.max(reported.clamp(0.0, 100.0));
        }
        if !data.message.is_empty() {
            self.state.message = data.message;
        }

        tracing::info!(
            "✅ Batch {} complete: {} new candidates ({} qualified), {}/{} processed",
            batch_label(data.batch_index),
            added,
            qualified,
            self.state.processed,
            self.state.total
        );
        Transition::BatchApplied { added, qualified }
    }

    fn complete(&mut self, data: CompleteData, now: DateTime<Utc>) -> Transition {
        self.phase = AggregatorPhase::Finished;
        self.state.progress = 100.0;
        self.state.finished_at = Some(now);
        self.state.current_batch = None;
        if let Some(cost) = data.cost.filter(|c| c.is_finite()) {
            // 完成事件回報的是總額
            self.state.cost = self.state.cost.max(cost);
        }
        if !data.message.is_empty() {
            self.state.message = data.message;
        }

        if let Some(reported) = data.total_processed {
            if reported != self.state.processed {
                tracing::warn!(
                    "Service reported {} processed candidates, {} were received",
                    reported,
                    self.state.processed
                );
            }
        }

        tracing::info!(
            "🏁 Screening complete: {}/{} processed, {} qualified",
            self.state.processed,
            self.state.total,
            self.state.qualified
        );
        Transition::ResultsReady
    }

    /// Largest number of slots worth tracking: at most one batch per candidate.
    fn slot_limit(&self) -> usize {
        self.state
            .total_batches
            .max(self.state.total.max(1))
            .min(MAX_TRACKED_BATCHES)
    }

    fn slot_mut(&mut self, index: Option<usize>) -> Option<&mut BatchSlot> {
        let index = index?;
        let len = match index.checked_add(1) {
            Some(len) if len <= self.slot_limit() => len,
            _ => {
                tracing::warn!(
                    "⚠️ Batch index {} is out of range ({} batches), merging by candidate id",
                    index,
                    self.slot_limit()
                );
                return None;
            }
        };

        if len > self.batches.len() {
            self.batches.resize(len, BatchSlot::Pending);
            self.state.total_batches = self.state.total_batches.max(len);
        }
        self.batches.get_mut(index)
    }
}

fn batch_label(index: Option<usize>) -> String {
    index.map_or_else(|| "-".to_string(), |i| i.to_string())
}
