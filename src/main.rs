use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;

use leadflow::api::{AppState, router};
use leadflow::config::AppConfig;
use leadflow::leads::ActivityFeed;
use leadflow::llm::create_provider;
use leadflow::mail::{MailService, MailTransport, SmtpMailer};
use leadflow::pipeline::{LeadPipeline, spawn_sheet_poller};
use leadflow::qualify::Qualifier;
use leadflow::sheets::HttpSheetSource;
use leadflow::store::{LeadStore, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let config = AppConfig::from_env().context("Invalid configuration")?;
    let _log_guard = init_tracing(config.log_dir.as_deref())?;

    eprintln!("📇 leadflow v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.database_path.display());
    eprintln!(
        "   API: http://{}:{}/api",
        config.server.host, config.server.port
    );

    // ── Store ──────────────────────────────────────────────────────────
    let store: Arc<dyn LeadStore> = Arc::new(
        LibSqlBackend::new_local(&config.database_path)
            .await
            .context("Failed to open database")?,
    );
    let feed = ActivityFeed::new(Arc::clone(&store));

    // ── Qualification ──────────────────────────────────────────────────
    let qualifier = match &config.llm {
        Some(llm) => {
            let provider = create_provider(llm).context("Failed to create LLM provider")?;
            tracing::info!(model = %llm.model, "LLM qualification enabled");
            Qualifier::new(Some(provider))
        }
        None => {
            tracing::warn!("OPENAI_API_KEY not set, qualification falls back to manual review");
            Qualifier::disabled()
        }
    };

    // ── Email ──────────────────────────────────────────────────────────
    let transport = match &config.smtp {
        Some(smtp) => {
            let mailer = SmtpMailer::new(smtp).context("Failed to build SMTP transport")?;
            Some(Arc::new(mailer) as Arc<dyn MailTransport>)
        }
        None => {
            tracing::warn!("SMTP_USER/SMTP_PASS not set, email sending disabled");
            None
        }
    };
    let mut mail = MailService::new(Arc::clone(&store), feed.clone(), transport);
    if config.llm.as_ref().is_some_and(|l| l.personalize_emails) {
        mail = mail.with_personalization(qualifier.clone());
    }
    if mail.is_configured() {
        match mail.test_connection().await {
            Ok(true) => tracing::info!("SMTP connection verified"),
            Ok(false) => tracing::warn!("SMTP server rejected the connection test"),
            Err(e) => tracing::warn!(error = %e, "SMTP connection test failed"),
        }
    }

    // ── Pipeline and poller ────────────────────────────────────────────
    let mut pipeline = LeadPipeline::new(Arc::clone(&store), feed, qualifier, mail);
    if let Some(sheets) = &config.sheets {
        pipeline = pipeline.with_source(
            Arc::new(HttpSheetSource::new(sheets.endpoint.clone())),
            sheets.baseline_existing,
        );
    } else {
        tracing::warn!("No spreadsheet configured, sheet polling disabled");
    }
    let pipeline = Arc::new(pipeline);

    let mut state = AppState::new(Arc::clone(&pipeline));
    let poller = match &config.sheets {
        Some(sheets) => {
            state = state.with_poll_interval(sheets.poll_interval);
            Some(spawn_sheet_poller(Arc::clone(&pipeline), sheets.poll_interval))
        }
        None => None,
    };

    // ── HTTP server ────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(addr = %addr, "HTTP server started");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("HTTP server error")?;

    if let Some((handle, shutdown)) = poller {
        shutdown.store(true, Ordering::Relaxed);
        handle.abort();
    }

    tracing::info!("leadflow stopped");
    Ok(())
}

/// Log to stderr, or to a daily rolling file when a log directory is set.
///
/// The returned guard flushes the file writer and must outlive `main`'s work.
fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(dir, "leadflow.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(non_blocking)
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to init tracing: {e}"))?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to init tracing: {e}"))?;
            Ok(None)
        }
    }
}
