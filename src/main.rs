use chrono::Utc;
use clap::Parser;
use iris_screen::adapters::{HttpScreeningService, SessionArchive};
use iris_screen::app::{RunSummary, ScreeningRunner, StreamOutcome};
use iris_screen::config::toml_config::{LogFormat, ScreeningConfig};
use iris_screen::config::CliArgs;
use iris_screen::domain::documents::DocumentSet;
use iris_screen::domain::model::{ScreeningRequest, SourceDocument};
use iris_screen::domain::ports::ConfigProvider;
use iris_screen::utils::error::{ErrorSeverity, Result, ScreenError};
use iris_screen::utils::logger;
use iris_screen::utils::validation::{validate_file_extensions, Validate};
use iris_screen::LocalStorage;
use std::path::Path;
use tokio::sync::watch;

const LISTED_SESSIONS: usize = 20;
// 只有純文字履歷能在本機取出內容
const DOCUMENT_EXTENSIONS: [&str; 1] = ["txt"];

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let config = ScreeningConfig::from_file(&args.config);
    // 日誌格式由配置決定；配置讀不到時用預設格式回報錯誤
    match config.as_ref().map(|c| c.log_format()) {
        Ok(LogFormat::Json) => logger::init_json_logger(args.verbose),
        _ => logger::init_cli_logger(args.verbose),
    }

    tracing::info!("Starting iris-screen CLI");
    let code = match config.and_then(|config| prepare(config, &args)) {
        Ok(config) => match execute(&config, &args).await {
            Ok(code) => code,
            Err(e) => report_failure(&e),
        },
        Err(e) => {
            tracing::error!("❌ Configuration failed: {}", e);
            report_failure(&e)
        }
    };

    if code > 0 {
        std::process::exit(code);
    }
}

/// 驗證配置並套用命令列覆寫
fn prepare(mut config: ScreeningConfig, args: &CliArgs) -> Result<ScreeningConfig> {
    if let Some(top_n) = args.top_n {
        config.selection.top_n = Some(top_n);
    }
    if args.no_deep_analysis {
        config.selection.deep_analysis = Some(false);
    }
    config.validate()?;

    if args.verbose {
        tracing::debug!("Config: {:?}", config);
    }
    Ok(config)
}

async fn execute(config: &ScreeningConfig, args: &CliArgs) -> Result<i32> {
    if args.list_sessions {
        return list_sessions(config).await;
    }

    let service = HttpScreeningService::new(config.service.clone())?;
    tracing::info!("🌐 Screening service: {}", config.service_endpoint());
    if args.check_health {
        let health = service.health_check().await?;
        println!(
            "{} {} ({})",
            if health.is_healthy() { "✅" } else { "⚠️" },
            health.service.as_deref().unwrap_or("screening service"),
            health.status
        );
        return Ok(if health.is_healthy() { 0 } else { 2 });
    }

    let request = load_request(config, &args.documents)?;
    if args.dry_run {
        println!(
            "✅ Configuration and {} document(s) are valid for '{}'",
            request.documents.len(),
            request.job_title
        );
        return Ok(0);
    }

    let monitor_enabled = args.monitor || config.monitoring_enabled();
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, stopping the screening stream");
            let _ = cancel_tx.send(true);
        }
    });

    let storage = LocalStorage::new(config.output_path());
    let runner = ScreeningRunner::new(service).with_monitoring(monitor_enabled);
    let summary = runner.run(&request, config, &storage, &mut cancel_rx).await?;

    print_summary(&summary);

    if config.archive_sessions() {
        let archive = SessionArchive::new(storage.clone());
        match archive.save(&summary.session.snapshot(Utc::now())).await {
            Ok(id) => println!("🗄️ Session archived as {}", id),
            Err(e) => tracing::error!("❌ Could not archive session: {}", e),
        }
    }

    // 串流中斷時部分結果已匯出，仍以錯誤結束
    if let Some(e) = &summary.stream_error {
        return Ok(report_failure(e));
    }
    if let Some(e) = &summary.deep_analysis_error {
        eprintln!("⚠️ {}", e.user_friendly_message());
    }
    Ok(if summary.exports.failures.is_empty() { 0 } else { 1 })
}

fn load_request(config: &ScreeningConfig, paths: &[String]) -> Result<ScreeningRequest> {
    if paths.is_empty() {
        return Err(ScreenError::validation(
            "Please upload at least one CV (use --documents)",
        ));
    }

    validate_file_extensions("documents", paths, &DOCUMENT_EXTENSIONS)?;

    let mut documents = DocumentSet::new();
    for path in paths {
        let bytes = std::fs::read(path)?;
        let name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());
        documents.add(SourceDocument::from_upload(&name, &bytes));
    }
    documents.ensure_readable()?;

    documents.into_request(
        &config.job.title,
        &config.job.description,
        config.job.elimination_conditions.as_deref(),
        config.job.qualification_threshold,
    )
}

async fn list_sessions(config: &ScreeningConfig) -> Result<i32> {
    let archive = SessionArchive::new(LocalStorage::new(config.output_path()));
    let records = archive.list(Some(LISTED_SESSIONS)).await?;
    if records.is_empty() {
        println!("No archived sessions in {}", config.output_path());
    }
    for record in records {
        println!(
            "{}  {}  {:<9}  {}/{} processed, {} qualified  {}",
            record.id,
            record.created_at.format("%Y-%m-%d %H:%M"),
            format!("{:?}", record.status).to_lowercase(),
            record.processed,
            record.total,
            record.qualified,
            record.job_title
        );
    }
    Ok(0)
}

fn print_summary(summary: &RunSummary) {
    match summary.outcome {
        StreamOutcome::Completed {
            processed,
            qualified,
        } => println!(
            "✅ Screening complete: {} candidates, {} qualified",
            processed, qualified
        ),
        StreamOutcome::Cancelled { processed, total } => {
            println!("🛑 Screening cancelled at {}/{} candidates", processed, total)
        }
        StreamOutcome::Terminated { processed, total } => println!(
            "⚠️ Screening stream ended early at {}/{} candidates",
            processed, total
        ),
    }

    let session = &summary.session;
    for (rank, candidate) in session.visible().into_iter().enumerate() {
        println!(
            "{:>3}. {:<28} {:>5.1}  {}{}",
            rank + 1,
            candidate.name,
            candidate.overall_score,
            if candidate.qualified { "qualified" } else { "not qualified" },
            if session.selection().contains(&candidate.id) { "  [selected]" } else { "" }
        );
    }

    if session.reveal().has_more() {
        println!(
            "     ... {} more in the exported results",
            session.reveal().total() - session.reveal().visible_count()
        );
    }

    if let Ok(view) = session.comparison() {
        if let Some(text) = view.summary {
            println!("⚖️ {}", text);
        }
        for missing in &view.missing_dimensions {
            println!(
                "   {} has no '{}' score",
                missing.candidate_id, missing.dimension
            );
        }
    }

    if let Some(report) = session.deep_analysis() {
        println!(
            "🔬 Deep analysis attached for {} candidates",
            report.candidate_ids.len()
        );
    }
    for path in &summary.exports.written {
        println!("📁 {}", path);
    }
    for (format, error) in &summary.exports.failures {
        eprintln!("❌ {} export failed: {}", format, error.user_friendly_message());
    }
}

/// 記錄錯誤並依嚴重程度決定退出碼
fn report_failure(e: &ScreenError) -> i32 {
    tracing::error!(
        "❌ Screening failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}
