//! SENTINEL — Open-Interest Surge Alert Agent
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the provider, candidate pool, summarizer, and notification
//! channels, and runs the timed scan→decide→notify loop with graceful
//! shutdown.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use sentinel::config;
use sentinel::engine::EngineConfig;
use sentinel::llm::openai::OpenAiSummarizer;
use sentinel::llm::Summarizer;
use sentinel::market::coinalyze::CoinalyzeClient;
use sentinel::market::MarketDataProvider;
use sentinel::notify::telegram::TelegramNotifier;
use sentinel::notify::twitter::TwitterNotifier;
use sentinel::notify::Notifier;
use sentinel::orchestrator::{log_cycle_report, Orchestrator};
use sentinel::pool::CandidatePool;
use sentinel::scanner::Scanner;
use sentinel::tickers::TickerSource;

const BANNER: &str = r#"
 ____  _____ _   _ _____ ___ _   _ _____ _
/ ___|| ____| \ | |_   _|_ _| \ | | ____| |
\___ \|  _| |  \| | | |  | ||  \| |  _| | |
 ___) | |___| |\  | | |  | || |\  | |___| |___
|____/|_____|_| \_| |_| |___|_| \_|_____|_____|

  Open-Interest Surge Alert Agent
  v0.1.0 — Autonomous Agent
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = config::AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging(&cfg);

    // Print startup banner
    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        scan_interval_secs = cfg.agent.scan_interval_secs,
        threshold_pct = cfg.detection.threshold_pct,
        window = %cfg.detection.window,
        dry_run = cfg.agent.dry_run,
        "SENTINEL starting up"
    );

    // -- Initialise components -------------------------------------------

    // Market-data provider
    let api_key = config::AppConfig::resolve_env(&cfg.provider.api_key_env)?;
    let provider: Arc<dyn MarketDataProvider> =
        Arc::new(CoinalyzeClient::new(api_key, cfg.provider.timeout_secs)?);

    // Universe and scanner
    let tickers = TickerSource::new(
        cfg.tickers.majors.clone(),
        cfg.tickers.long_tail.clone(),
        cfg.tickers.top_n,
        (cfg.tickers.top_n > 0).then(|| Arc::clone(&provider)),
    );
    let scanner = Scanner::new(Arc::clone(&provider), cfg.provider.concurrency);

    // Candidate pool (persistent confirmation state)
    let pool = CandidatePool::open(&cfg.agent.db_path).await?;

    // Summarizer (optional; alerts degrade to template copy without it)
    let summarizer: Option<Arc<dyn Summarizer>> = if cfg.summarizer.enabled {
        match config::AppConfig::resolve_env(&cfg.summarizer.api_key_env) {
            Ok(key) => {
                info!(model = %cfg.summarizer.model, "Summarizer enabled");
                Some(Arc::new(OpenAiSummarizer::new(
                    key,
                    Some(cfg.summarizer.model.clone()),
                    Some(cfg.summarizer.max_tokens),
                )?))
            }
            Err(e) => {
                warn!(error = %e, "Summarizer key missing — template copy only");
                None
            }
        }
    } else {
        None
    };

    // Notification channels
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();

    if cfg.notifiers.telegram.enabled {
        let bot_token = config::AppConfig::resolve_env(&cfg.notifiers.telegram.bot_token_env)?;
        let chat_id = config::AppConfig::resolve_env(&cfg.notifiers.telegram.chat_id_env)?;
        notifiers.push(Arc::new(TelegramNotifier::new(bot_token, chat_id)?));
        info!("Telegram channel enabled");
    }

    if cfg.notifiers.twitter.enabled {
        let bearer = config::AppConfig::resolve_env(&cfg.notifiers.twitter.bearer_token_env)?;
        notifiers.push(Arc::new(TwitterNotifier::new(
            bearer,
            cfg.notifiers.twitter.locale.clone(),
            summarizer.clone(),
        )?));
        info!(locale = %cfg.notifiers.twitter.locale, "Twitter channel enabled");
    }

    if notifiers.is_empty() && !cfg.agent.dry_run {
        warn!("No notification channels enabled — alerts will be logged only");
    }

    let mut orchestrator = Orchestrator::new(
        tickers,
        scanner,
        pool,
        EngineConfig {
            threshold_pct: cfg.detection.threshold_pct,
            window: cfg.detection.window,
            cooldown: chrono::Duration::seconds(cfg.detection.cooldown_window_secs),
            market_label: cfg.detection.market_label.clone(),
        },
        summarizer,
        notifiers,
        cfg.agent.dry_run,
        cfg.agent.retention_days,
    );

    let live = orchestrator.live_candidates().await.unwrap_or(0);
    info!(live_candidates = live, "Candidate pool restored");

    // -- Main loop -------------------------------------------------------

    let scan_interval = Duration::from_secs(cfg.agent.scan_interval_secs);
    let mut interval = tokio::time::interval(scan_interval);
    // Single-flight: if a cycle overruns the interval, skip the missed
    // ticks instead of queueing them.
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.agent.scan_interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match orchestrator.run_cycle().await {
                    Ok(report) => log_cycle_report(&report),
                    Err(e) => error!(error = %e, "Cycle failed — continuing to next"),
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    // Final retention pass before exit
    if let Err(e) = orchestrator.purge().await {
        warn!(error = %e, "Final retention purge failed");
    }
    info!("SENTINEL shut down cleanly.");

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging(cfg: &config::AppConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sentinel=info"));

    let json_logging = std::env::var("SENTINEL_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }

    let _ = cfg;
}
