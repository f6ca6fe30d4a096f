use crate::core::decoder::FrameDecoder;
use crate::core::export::{ExportSerializer, SessionSnapshot};
use crate::core::session::{ScreeningSession, SessionAction, SessionEffect};
use crate::domain::model::{DeepAnalysisReport, ExportFormat, ScreeningRequest};
use crate::domain::ports::{ConfigProvider, ScreeningService, Storage};
use crate::utils::error::{Result, ScreenError};
use crate::utils::monitor::RunMonitor;
use crate::utils::validation::Validate;
use chrono::Utc;
use std::time::Instant;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed { processed: usize, qualified: usize },
    /// Cancelled by the operator. Everything applied so far stays in the session.
    Cancelled { processed: usize, total: usize },
    /// The stream broke off before `screening_complete`; see `RunSummary::stream_error`.
    Terminated { processed: usize, total: usize },
}

/// 匯出結果：每個格式（以及 bundle）各自成功或失敗
#[derive(Debug, Default)]
pub struct ExportSummary {
    pub written: Vec<String>,
    pub failures: Vec<(String, ScreenError)>,
}

#[derive(Debug)]
pub struct RunSummary {
    pub outcome: StreamOutcome,
    pub session: ScreeningSession,
    pub stream_error: Option<ScreenError>,
    pub deep_analysis_error: Option<ScreenError>,
    pub exports: ExportSummary,
}

/// 驅動一次完整的篩選：串流、深度分析、匯出
pub struct ScreeningRunner<S: ScreeningService> {
    service: S,
    monitor: Option<RunMonitor>,
}

impl<S: ScreeningService> ScreeningRunner<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            monitor: None,
        }
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = enabled.then(|| RunMonitor::new(true));
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    fn log_phase(&self, phase: &str) {
        if let Some(monitor) = &self.monitor {
            monitor.log_phase(phase);
        }
    }

    /// Validates and submits the request, then drains the event stream into `session`.
    ///
    /// The session is reset before the stream opens. Setting the watch value to `true`
    /// stops decoding at the next suspension point and returns `Cancelled`. A stream that
    /// closes or fails before `screening_complete` is a `StreamTerminated` error, with the
    /// partial results left in the session.
    pub async fn run_stream(
        &self,
        session: &mut ScreeningSession,
        request: &ScreeningRequest,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<StreamOutcome> {
        request.validate()?;
        session.begin(request);

        if *cancel.borrow() {
            tracing::warn!("🛑 Screening cancelled before submission");
            return Ok(cancelled(session));
        }

        tracing::info!(
            "📤 Submitting {} documents for '{}'",
            request.documents.len(),
            request.job_title
        );
        let mut stream = self.service.submit_screening(request).await?;
        let mut decoder = FrameDecoder::new();
        let mut cancel_open = true;

        'drain: loop {
            let chunk = tokio::select! {
                biased;
                changed = cancel.changed(), if cancel_open => {
                    match changed {
                        Ok(()) if *cancel.borrow() => {
                            tracing::warn!(
                                "🛑 Screening cancelled after {}/{} candidates",
                                session.progress().processed,
                                session.progress().total
                            );
                            return Ok(cancelled(session));
                        }
                        Ok(()) => continue,
                        Err(_) => {
                            // 取消端已關閉，之後不會再有取消訊號
                            cancel_open = false;
                            continue;
                        }
                    }
                }
                chunk = stream.next_chunk() => chunk,
            };

            match chunk {
                Ok(Some(bytes)) => {
                    for event in decoder.feed_bytes(&bytes) {
                        let effect = session.apply(SessionAction::Ingest(event))?;
                        if let SessionEffect::ResultsReady { .. } = effect {
                            break 'drain;
                        }
                    }
                }
                Ok(None) => {
                    if let Some(tail) = decoder.finish() {
                        tracing::debug!("Ignoring {} bytes of truncated frame at end of stream", tail.len());
                    }
                    break;
                }
                Err(e) => {
                    let progress = session.progress();
                    tracing::error!(
                        "❌ Screening stream failed after {}/{} candidates: {}",
                        progress.processed,
                        progress.total,
                        e
                    );
                    return Err(ScreenError::StreamTerminated {
                        processed: progress.processed,
                        total: progress.total,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if decoder.malformed_frames() > 0 {
            tracing::warn!(
                "⚠️ {} malformed frame(s) were skipped",
                decoder.malformed_frames()
            );
        }

        let progress = session.progress();
        if !session.is_finished() {
            tracing::error!(
                "❌ Screening stream closed before completion ({}/{} candidates)",
                progress.processed,
                progress.total
            );
            return Err(ScreenError::StreamTerminated {
                processed: progress.processed,
                total: progress.total,
                reason: "stream closed before screening_complete".to_string(),
            });
        }

        self.log_phase("stream");
        Ok(StreamOutcome::Completed {
            processed: progress.processed,
            qualified: progress.qualified,
        })
    }

    /// Sends the current selection for deep analysis and attaches the report.
    ///
    /// On failure the selection is left exactly as it was so the call can be retried.
    pub async fn deep_analyze(&self, session: &mut ScreeningSession) -> Result<DeepAnalysisReport> {
        let request = session.deep_analysis_request()?;
        let candidate_ids: Vec<String> = request.candidates.iter().map(|c| c.id.clone()).collect();

        tracing::info!("🔬 Requesting deep analysis for {} candidates", candidate_ids.len());
        let started = Instant::now();
        let response = self
            .service
            .submit_deep_analysis(&request)
            .await
            .map_err(|e| {
                tracing::error!("❌ Deep analysis failed: {}", e);
                match e {
                    ScreenError::DeepAnalysisError { .. } => e,
                    other => ScreenError::DeepAnalysisError {
                        message: other.to_string(),
                    },
                }
            })?;

        let report = DeepAnalysisReport {
            candidate_ids,
            narrative: response.narrative,
            processing_seconds: response
                .processing_seconds
                .or_else(|| Some(started.elapsed().as_secs_f64())),
            cost: response.cost,
            generated_at: Utc::now(),
        };
        session.apply(SessionAction::AttachDeepAnalysis(report.clone()))?;

        self.log_phase("deep analysis");
        Ok(report)
    }

    /// Renders and writes every requested format. Failures are collected per format and
    /// never stop the remaining formats.
    pub async fn export<St: Storage>(
        &self,
        snapshot: &SessionSnapshot,
        storage: &St,
        formats: &[ExportFormat],
        bundle: bool,
    ) -> ExportSummary {
        let serializer = ExportSerializer::new(snapshot);
        let report = serializer.render_all(formats);
        let mut summary = ExportSummary::default();

        for (format, error) in report.failures {
            summary.failures.push((format.to_string(), error));
        }

        for artifact in &report.artifacts {
            match storage.write_file(&artifact.filename, &artifact.bytes).await {
                Ok(()) => {
                    tracing::info!("💾 Wrote {} ({} bytes)", artifact.filename, artifact.bytes.len());
                    summary.written.push(artifact.filename.clone());
                }
                Err(e) => {
                    tracing::error!("❌ Could not write {}: {}", artifact.filename, e);
                    summary.failures.push((
                        artifact.format.to_string(),
                        ScreenError::export(artifact.format, e.to_string()),
                    ));
                }
            }
        }

        if bundle && !report.artifacts.is_empty() {
            let written = match serializer.bundle(&report.artifacts) {
                Ok(archive) => storage
                    .write_file(&archive.filename, &archive.bytes)
                    .await
                    .map(|()| archive.filename)
                    .map_err(|e| ScreenError::export("bundle", e.to_string())),
                Err(e) => Err(e),
            };
            match written {
                Ok(filename) => {
                    tracing::info!("🗜️ Wrote bundle {}", filename);
                    summary.written.push(filename);
                }
                Err(e) => {
                    tracing::error!("❌ Bundle export failed: {}", e);
                    summary.failures.push(("bundle".to_string(), e));
                }
            }
        }

        self.log_phase("export");
        summary
    }

    /// 依設定跑完整流程。送出前的錯誤直接回傳；串流中斷時仍匯出部分結果，
    /// 深度分析與匯出的錯誤記錄在摘要中
    pub async fn run<C: ConfigProvider, St: Storage>(
        &self,
        request: &ScreeningRequest,
        config: &C,
        storage: &St,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<RunSummary> {
        let mut session = ScreeningSession::new().with_auto_select(config.top_n());
        let (outcome, stream_error) = match self.run_stream(&mut session, request, cancel).await {
            Ok(outcome) => (outcome, None),
            Err(ScreenError::StreamTerminated {
                processed,
                total,
                reason,
            }) => (
                StreamOutcome::Terminated { processed, total },
                Some(ScreenError::StreamTerminated {
                    processed,
                    total,
                    reason,
                }),
            ),
            Err(e) => return Err(e),
        };

        let mut deep_analysis_error = None;
        if matches!(outcome, StreamOutcome::Completed { .. })
            && config.deep_analysis_enabled()
        {
            if session.selection().is_empty() {
                tracing::info!("⏭️ Skipping deep analysis (no candidates selected)");
            } else if let Err(e) = self.deep_analyze(&mut session).await {
                deep_analysis_error = Some(e);
            }
        }

        let snapshot = session.snapshot(Utc::now());
        let exports = self
            .export(
                &snapshot,
                storage,
                config.export_formats(),
                config.bundle_exports(),
            )
            .await;

        Ok(RunSummary {
            outcome,
            session,
            stream_error,
            deep_analysis_error,
            exports,
        })
    }
}

fn cancelled(session: &ScreeningSession) -> StreamOutcome {
    StreamOutcome::Cancelled {
        processed: session.progress().processed,
        total: session.progress().total,
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::domain::model::DeepAnalysisResponse;
    use crate::domain::ports::test_support::MockStorage;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn full_script() -> Vec<Step> {
        let started = frame(json!({"event": "screening_started", "data": {"total_candidates": 3, "total_batches": 2}}));
        let batch0 = frame(json!({"event": "batch_complete", "data": {"batch_index": 0, "candidates": [
            candidate_json("a", 92.0, true),
            candidate_json("b", 55.0, false)
        ], "cost": 0.02}}));
        let batch1 = frame(json!({"event": "batch_complete", "data": {"batch_index": 1, "candidates": [
            candidate_json("c", 87.5, true)
        ], "cost": 0.01}}));
        let done = frame(json!({"event": "screening_complete", "data": {"total_processed": 3, "qualified_count": 2}}));

        // 刻意把 frame 切在任意位置
        let body = format!("{}{}{}{}", started, batch0, batch1, done);
        let (head, tail) = body.split_at(body.len() / 3);
        vec![Step::Chunk(head.to_string()), Step::Chunk(tail.to_string())]
    }

    #[tokio::test]
    async fn test_run_stream_completes_with_split_frames() {
        let runner = ScreeningRunner::new(ScriptedService::new(full_script()));
        let (_tx, mut rx) = watch::channel(false);
        let mut session = ScreeningSession::new().with_auto_select(Some(2));

        let outcome = runner.run_stream(&mut session, &request(), &mut rx).await.unwrap();

        assert_eq!(outcome, StreamOutcome::Completed { processed: 3, qualified: 2 });
        assert_eq!(session.store().len(), 3);
        assert_eq!(session.selection().ids(), &["a", "c"]);
        assert!((session.progress().cost - 0.03).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_stream_closed_early_is_terminated_error_with_partial_results() {
        let started = frame(json!({"event": "screening_started", "data": {"total_candidates": 4}}));
        let batch0 = frame(json!({"event": "batch_complete", "data": {"batch_index": 0, "candidates": [candidate_json("a", 90.0, true)]}}));
        let runner = ScreeningRunner::new(ScriptedService::new(vec![
            Step::Chunk(started),
            Step::Chunk(batch0),
            Step::Chunk("data: {\"event\": \"batch_proc".to_string()),
        ]));
        let (_tx, mut rx) = watch::channel(false);
        let mut session = ScreeningSession::new();

        let error = runner
            .run_stream(&mut session, &request(), &mut rx)
            .await
            .unwrap_err();

        match &error {
            ScreenError::StreamTerminated { processed, total, .. } => {
                assert_eq!((*processed, *total), (1, 4));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(error.is_retryable());
        assert_eq!(session.store().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_mid_stream_keeps_partial_state() {
        let started = frame(json!({"event": "screening_started", "data": {"total_candidates": 2}}));
        let runner = ScreeningRunner::new(ScriptedService::new(vec![
            Step::Chunk(started),
            Step::Fail("connection reset".to_string()),
        ]));
        let (_tx, mut rx) = watch::channel(false);
        let mut session = ScreeningSession::new();

        let result = runner.run_stream(&mut session, &request(), &mut rx).await;
        assert!(matches!(result, Err(ScreenError::StreamTerminated { .. })));
        assert_eq!(session.progress().total, 2);
    }

    #[tokio::test]
    async fn test_cancel_stops_decoding_and_keeps_results() {
        let (tx, mut rx) = watch::channel(false);
        let started = frame(json!({"event": "screening_started", "data": {"total_candidates": 5}}));
        let batch0 = frame(json!({"event": "batch_complete", "data": {"batch_index": 0, "candidates": [
            candidate_json("a", 90.0, true),
            candidate_json("b", 70.0, false)
        ]}}));
        let runner = ScreeningRunner::new(ScriptedService::new(vec![
            Step::Chunk(format!("{}{}", started, batch0)),
            Step::CancelAndStall(tx),
        ]));
        let mut session = ScreeningSession::new();

        let outcome = runner.run_stream(&mut session, &request(), &mut rx).await.unwrap();

        assert_eq!(outcome, StreamOutcome::Cancelled { processed: 2, total: 5 });
        assert_eq!(session.store().len(), 2);
        assert!(!session.is_finished());
        // 部分結果仍可選取
        assert_ok!(session.apply(SessionAction::Toggle("a".to_string())));
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected_before_submission() {
        let runner = ScreeningRunner::new(ScriptedService::new(full_script()));
        let (_tx, mut rx) = watch::channel(false);
        let mut session = ScreeningSession::new();
        let mut bad = request();
        bad.job_title = "  ".to_string();

        let result = runner.run_stream(&mut session, &bad, &mut rx).await;
        assert!(matches!(result, Err(ScreenError::ValidationError { .. })));
    }

    #[tokio::test]
    async fn test_deep_analysis_failure_preserves_selection_then_retry_succeeds() {
        let service = ScriptedService::new(full_script())
            .with_deep_analysis(Err(ScreenError::ApiError {
                status: 500,
                message: "model overloaded".to_string(),
            }))
            .with_deep_analysis(Ok(DeepAnalysisResponse {
                narrative: "<p>Both are strong</p>".to_string(),
                processing_seconds: Some(4.0),
                cost: Some(0.2),
            }));
        let runner = ScreeningRunner::new(service);
        let (_tx, mut rx) = watch::channel(false);
        let mut session = ScreeningSession::new().with_auto_select(Some(2));
        runner.run_stream(&mut session, &request(), &mut rx).await.unwrap();

        let error = assert_err!(runner.deep_analyze(&mut session).await);
        assert!(matches!(error, ScreenError::DeepAnalysisError { .. }));
        assert!(error.is_retryable());
        assert_eq!(session.selection().ids(), &["a", "c"]);
        assert!(session.deep_analysis().is_none());

        let report = assert_ok!(runner.deep_analyze(&mut session).await);
        assert_eq!(report.candidate_ids, vec!["a", "c"]);
        assert_eq!(session.deep_analysis(), Some(&report));
    }

    #[tokio::test]
    async fn test_deep_analysis_requires_selection() {
        let runner = ScreeningRunner::new(ScriptedService::new(full_script()));
        let (_tx, mut rx) = watch::channel(false);
        let mut session = ScreeningSession::new();
        runner.run_stream(&mut session, &request(), &mut rx).await.unwrap();

        let result = runner.deep_analyze(&mut session).await;
        assert!(matches!(result, Err(ScreenError::ValidationError { .. })));
    }

    struct TestConfig {
        formats: Vec<ExportFormat>,
        top_n: Option<usize>,
        deep_analysis: bool,
        bundle: bool,
    }

    impl ConfigProvider for TestConfig {
        fn service_endpoint(&self) -> &str {
            "http://localhost:8001"
        }

        fn output_path(&self) -> &str {
            "./out"
        }

        fn export_formats(&self) -> &[ExportFormat] {
            &self.formats
        }

        fn top_n(&self) -> Option<usize> {
            self.top_n
        }

        fn deep_analysis_enabled(&self) -> bool {
            self.deep_analysis
        }

        fn bundle_exports(&self) -> bool {
            self.bundle
        }

        fn archive_sessions(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_run_analyzes_selection_and_exports() {
        let service = ScriptedService::new(full_script()).with_deep_analysis(Ok(DeepAnalysisResponse {
            narrative: "## Ana and Cy".to_string(),
            processing_seconds: None,
            cost: None,
        }));
        let runner = ScreeningRunner::new(service);
        let storage = MockStorage::new();
        let config = TestConfig {
            formats: vec![ExportFormat::Json, ExportFormat::Csv],
            top_n: Some(2),
            deep_analysis: true,
            bundle: true,
        };
        let (_tx, mut rx) = watch::channel(false);

        let summary = runner.run(&request(), &config, &storage, &mut rx).await.unwrap();

        assert_eq!(summary.outcome, StreamOutcome::Completed { processed: 3, qualified: 2 });
        assert!(summary.stream_error.is_none());
        assert!(summary.deep_analysis_error.is_none());
        assert!(summary.exports.failures.is_empty());
        assert_eq!(summary.exports.written.len(), 3);

        let json_path = summary
            .exports
            .written
            .iter()
            .find(|name| name.ends_with(".json"))
            .unwrap();
        let saved = SessionSnapshot::from_json(&storage.get_file(json_path).await.unwrap()).unwrap();
        assert_eq!(saved.candidates.len(), 3);
        let report = saved.deep_analysis.unwrap();
        assert_eq!(report.candidate_ids, vec!["a", "c"]);
        // 服務未回報處理時間時以實際耗時代替
        assert!(report.processing_seconds.is_some());
    }

    #[tokio::test]
    async fn test_run_exports_partial_results_when_stream_terminates() {
        let started = frame(json!({"event": "screening_started", "data": {"total_candidates": 4}}));
        let batch0 = frame(json!({"event": "batch_complete", "data": {"batch_index": 0, "candidates": [candidate_json("a", 90.0, true)]}}));
        let runner = ScreeningRunner::new(ScriptedService::new(vec![
            Step::Chunk(format!("{}{}", started, batch0)),
            Step::Fail("upstream closed".to_string()),
        ]));
        let storage = MockStorage::new();
        let config = TestConfig {
            formats: vec![ExportFormat::Json],
            top_n: Some(1),
            deep_analysis: true,
            bundle: false,
        };
        let (_tx, mut rx) = watch::channel(false);

        let summary = runner.run(&request(), &config, &storage, &mut rx).await.unwrap();

        assert_eq!(summary.outcome, StreamOutcome::Terminated { processed: 1, total: 4 });
        assert!(matches!(summary.stream_error, Some(ScreenError::StreamTerminated { .. })));
        assert!(summary.session.deep_analysis().is_none());
        assert_eq!(summary.exports.written.len(), 1);
        assert_eq!(storage.paths().await, summary.exports.written);
    }

    #[tokio::test]
    async fn test_export_write_failure_is_isolated() {
        let runner = ScreeningRunner::new(ScriptedService::new(full_script()));
        let (_tx, mut rx) = watch::channel(false);
        let mut session = ScreeningSession::new();
        runner.run_stream(&mut session, &request(), &mut rx).await.unwrap();
        let snapshot = session.snapshot(Utc::now());
        let storage = MockStorage::failing_writes(".csv");

        let summary = runner
            .export(&snapshot, &storage, &[ExportFormat::Csv, ExportFormat::Json], false)
            .await;

        assert_eq!(summary.written.len(), 1);
        assert!(summary.written[0].ends_with(".json"));
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].0, "csv");
        assert!(matches!(summary.failures[0].1, ScreenError::ExportError { .. }));
    }
}
