//! examwatch - Exam-Room Monitoring Orchestrator
//!
//! Main entry point. Exit codes: 0 normal stop, 1 unhandled fatal error,
//! 2 capture device failed to open.

use examwatch::analysis::AnalyzerClient;
use examwatch::capture::FfmpegSource;
use examwatch::config::MonitorConfig;
use examwatch::lifecycle::LifecycleController;
use examwatch::monitor::MonitorSession;
use examwatch::presenter::HeadlessPresenter;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_FATAL: u8 = 1;
const EXIT_DEVICE_FAILED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "examwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting examwatch v{}", env!("CARGO_PKG_VERSION"));

    // Positional arguments: exam id, then camera source
    let args: Vec<String> = std::env::args().collect();
    let exam_id = args.get(1).cloned();
    let camera_arg = args.get(2).map(String::as_str);

    let config = MonitorConfig::from_env(exam_id, camera_arg);
    tracing::info!(
        exam_id = %config.exam_id,
        capture_source = %config.capture_source,
        snapshot_dir = %config.snapshot_dir().display(),
        analyzer_url = %config.analyzer_url,
        alert_log = %config.alert_log_path.display(),
        "Configuration loaded"
    );

    let source = match FfmpegSource::open(
        config.capture_source.clone(),
        config.capture_timeout_secs,
    )
    .await
    {
        Ok(source) => source,
        Err(e) => {
            tracing::error!(error = %e, "Capture device failed to open");
            return ExitCode::from(EXIT_DEVICE_FAILED);
        }
    };

    let analyzer = match AnalyzerClient::new(config.analyzer_url.clone(), config.jpeg_quality) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "Failed to construct analyzer client");
            return ExitCode::from(EXIT_FATAL);
        }
    };

    let lifecycle = Arc::new(LifecycleController::new());
    lifecycle.spawn_signal_listener();

    let mut session = MonitorSession::new(
        config,
        lifecycle,
        source,
        analyzer.clone(),
        analyzer,
        HeadlessPresenter,
    );

    match session.run().await {
        Ok(reason) => {
            tracing::info!(reason = %reason, "Monitor finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal error in monitoring session");
            ExitCode::from(EXIT_FATAL)
        }
    }
}
