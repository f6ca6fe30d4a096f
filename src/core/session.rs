use crate::core::aggregator::{AggregatorPhase, ProgressAggregator, ProgressState, Transition};
use crate::core::comparison::{ComparisonBuilder, ComparisonView};
use crate::core::events::ScreeningEvent;
use crate::core::export::{JobSummary, SessionSnapshot};
use crate::core::pagination::{RevealController, VisibilityObserver};
use crate::core::selection::{SelectionSet, SelectionStatus};
use crate::core::store::ResultStore;
use crate::domain::model::{
    CandidateResult, ChartKind, DeepAnalysisReport, DeepAnalysisRequest, ScreeningRequest,
};
use crate::utils::error::{Result, ScreenError};
use chrono::{DateTime, Utc};

/// Every operator or stream input the session reacts to.
#[derive(Debug, Clone)]
pub enum SessionAction {
    Ingest(ScreeningEvent),
    Toggle(String),
    SelectTopN(usize),
    ClearSelection,
    RevealMore,
    SetChart(ChartKind),
    SetQualificationFilter(Option<bool>),
    AttachDeepAnalysis(DeepAnalysisReport),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    Ingested(Transition),
    /// The stream finished. `auto_selection` is set when a top-N selection ran after the
    /// reveal window was reset.
    ResultsReady {
        total: usize,
        qualified: usize,
        auto_selection: Option<SelectionStatus>,
    },
    Selection(SelectionStatus),
    Revealed { visible: usize, changed: bool },
    ChartChanged(ChartKind),
    FilterChanged(Option<bool>),
    DeepAnalysisAttached,
}

/// 單一工作階段的完整狀態，所有元件都由它擁有
///
/// Each `apply` call runs to completion before the next one starts; the session is
/// never shared, so invariants hold by sequencing alone.
#[derive(Debug, Clone, Default)]
pub struct ScreeningSession {
    job: Option<JobSummary>,
    aggregator: ProgressAggregator,
    store: ResultStore,
    selection: SelectionSet,
    reveal: RevealController,
    comparison: ComparisonBuilder,
    qualified_filter: Option<bool>,
    deep_analysis: Option<DeepAnalysisReport>,
    auto_select: Option<usize>,
}

impl ScreeningSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the top `n` candidates once results are ready.
    pub fn with_auto_select(mut self, n: Option<usize>) -> Self {
        self.auto_select = n;
        self
    }

    /// 開新的篩選前一次清除所有舊狀態，避免前一輪的候選人 id 留在選取中
    pub fn begin(&mut self, request: &ScreeningRequest) {
        let auto_select = self.auto_select;
        let chart = self.comparison.chart();
        *self = Self {
            job: Some(JobSummary::from(request)),
            comparison: ComparisonBuilder::new(chart),
            auto_select,
            ..Self::default()
        };
        tracing::debug!("New screening session for '{}'", request.job_title);
    }

    /// Rebuilds a finished session from a saved snapshot.
    pub fn restore(snapshot: SessionSnapshot) -> Self {
        let store = snapshot.restore_store();
        let mut reveal = RevealController::new();
        reveal.reset(store.len());
        Self {
            job: snapshot.job,
            aggregator: ProgressAggregator::from_state(snapshot.progress),
            store,
            reveal,
            deep_analysis: snapshot.deep_analysis,
            ..Self::default()
        }
    }

    pub fn apply(&mut self, action: SessionAction) -> Result<SessionEffect> {
        self.apply_at(action, Utc::now())
    }

    pub fn apply_at(&mut self, action: SessionAction, now: DateTime<Utc>) -> Result<SessionEffect> {
        match action {
            SessionAction::Ingest(event) => Ok(self.ingest(event, now)),
            SessionAction::Toggle(id) => self
                .selection
                .toggle(&self.store, &id)
                .map(SessionEffect::Selection),
            SessionAction::SelectTopN(n) => Ok(SessionEffect::Selection(
                self.selection.select_top_n(&self.store, n),
            )),
            SessionAction::ClearSelection => Ok(SessionEffect::Selection(self.selection.clear())),
            SessionAction::RevealMore => {
                let changed = self.reveal.reveal_more();
                Ok(SessionEffect::Revealed {
                    visible: self.reveal.visible_count(),
                    changed,
                })
            }
            SessionAction::SetChart(chart) => {
                self.comparison.set_chart(chart);
                Ok(SessionEffect::ChartChanged(chart))
            }
            SessionAction::SetQualificationFilter(filter) => {
                self.qualified_filter = filter;
                Ok(SessionEffect::FilterChanged(filter))
            }
            SessionAction::AttachDeepAnalysis(report) => {
                self.deep_analysis = Some(report);
                Ok(SessionEffect::DeepAnalysisAttached)
            }
        }
    }

    fn ingest(&mut self, event: ScreeningEvent, now: DateTime<Utc>) -> SessionEffect {
        let transition = self.aggregator.apply(event, &mut self.store, now);
        match transition {
            Transition::BatchApplied { .. } => {
                self.reveal.set_total(self.store.len());
                SessionEffect::Ingested(transition)
            }
            Transition::ResultsReady => {
                self.reveal.reset(self.store.len());
                let auto_selection = self
                    .auto_select
                    .map(|n| self.selection.select_top_n(&self.store, n));
                SessionEffect::ResultsReady {
                    total: self.store.len(),
                    qualified: self.store.qualified_count(),
                    auto_selection,
                }
            }
            Transition::Started | Transition::Progressed | Transition::Ignored => {
                SessionEffect::Ingested(transition)
            }
        }
    }

    /// Polls the viewport observer and reveals the next window if the sentinel showed up.
    pub fn poll_reveal(&mut self, observer: &mut dyn VisibilityObserver) -> bool {
        self.reveal.poll(observer)
    }

    pub fn visible(&self) -> Vec<&CandidateResult> {
        self.reveal.visible(&self.store.ranked(), self.qualified_filter)
    }

    pub fn comparison(&self) -> Result<ComparisonView> {
        self.selection.require_compare()?;
        self.comparison.build(&self.selection.resolve(&self.store))
    }

    pub fn deep_analysis_request(&self) -> Result<DeepAnalysisRequest> {
        self.selection.require_deep_analyze()?;
        let job = self
            .job
            .as_ref()
            .ok_or_else(|| ScreenError::validation("No job definition for this session"))?;

        Ok(DeepAnalysisRequest {
            job_title: job.job_title.clone(),
            job_description: job.job_description.clone(),
            candidates: self
                .selection
                .resolve(&self.store)
                .into_iter()
                .cloned()
                .collect(),
        })
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> SessionSnapshot {
        SessionSnapshot::new(
            self.job.clone(),
            self.aggregator.state().clone(),
            &self.store,
            self.deep_analysis.clone(),
            now,
        )
    }

    pub fn job(&self) -> Option<&JobSummary> {
        self.job.as_ref()
    }

    pub fn phase(&self) -> AggregatorPhase {
        self.aggregator.phase()
    }

    pub fn is_finished(&self) -> bool {
        self.aggregator.is_finished()
    }

    pub fn progress(&self) -> &ProgressState {
        self.aggregator.state()
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn reveal(&self) -> &RevealController {
        &self.reveal
    }

    pub fn chart(&self) -> ChartKind {
        self.comparison.chart()
    }

    pub fn qualified_filter(&self) -> Option<bool> {
        self.qualified_filter
    }

    pub fn deep_analysis(&self) -> Option<&DeepAnalysisReport> {
        self.deep_analysis.as_ref()
    }
}
