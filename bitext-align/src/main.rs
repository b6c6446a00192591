//! bitext-align - bilingual paragraph alignment
//!
//! **Subcommands:**
//! - `align`: align a file of articles and write numbered records (CSV or SQLite)
//! - `serve`: HTTP API (`/health`, `/align`, `/align/batch`)
//! - `init-config`: write a default `bitext.toml`

use std::path::PathBuf;

use anyhow::{Context, Result};
use bitext_common::config::{load_config, write_toml_config, MergeStrategy, OutputFormat, TomlConfig};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use bitext_align::config::{apply_overrides, resolve_output_path, CliOverrides};
use bitext_align::services::{build_oracle, RecordAssembler};
use bitext_align::workflow::{align_articles, collect_records, load_articles, write_csv, BatchSummary};
use bitext_align::{build_router, Aligner, AppState};

/// Command-line arguments for bitext-align
#[derive(Parser, Debug)]
#[command(name = "bitext-align")]
#[command(about = "Align paragraphs of two language versions of the same articles")]
#[command(version)]
struct Args {
    /// Config file (default: ~/.config/bitext/bitext.toml, then /etc/bitext/bitext.toml)
    #[arg(short, long, global = true, env = "BITEXT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, global = true, env = "BITEXT_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Align every article of an input file
    Align {
        /// JSON array or JSON Lines file of articles
        #[arg(short, long, env = "BITEXT_INPUT")]
        input: PathBuf,

        /// Output file (default: output/aligned_<timestamp>.csv or databases/aligned.db)
        #[arg(short, long, env = "BITEXT_OUTPUT")]
        output: Option<PathBuf>,

        /// csv or sqlite
        #[arg(short, long, env = "BITEXT_FORMAT")]
        format: Option<OutputFormat>,

        /// Maximum similarity loss accepted for one merge (<= 0)
        #[arg(short, long, env = "BITEXT_TOLERANCE", allow_hyphen_values = true)]
        tolerance: Option<f32>,

        /// Articles aligned concurrently
        #[arg(long, env = "BITEXT_CONCURRENCY")]
        concurrency: Option<usize>,

        /// greedy or global
        #[arg(long, env = "BITEXT_STRATEGY")]
        strategy: Option<MergeStrategy>,

        /// Drop articles whose counts could not be reconciled
        #[arg(long, env = "BITEXT_REJECT_DEGRADED")]
        reject_degraded: bool,
    },

    /// Run the HTTP API
    Serve {
        #[arg(long, env = "BITEXT_HOST")]
        host: Option<String>,

        #[arg(short, long, env = "BITEXT_PORT")]
        port: Option<u16>,
    },

    /// Write a config file with default values
    InitConfig {
        /// Destination (default: ~/.config/bitext/bitext.toml)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Command::InitConfig { path, force } = &args.command {
        return init_config(path.clone(), *force);
    }

    let (mut config, config_path) =
        load_config(args.config.as_deref()).context("Failed to load configuration")?;

    let mut overrides = CliOverrides {
        log_level: args.log_level.clone(),
        ..CliOverrides::default()
    };
    match &args.command {
        Command::Align {
            output,
            format,
            tolerance,
            concurrency,
            strategy,
            reject_degraded,
            ..
        } => {
            overrides.output = output.clone();
            overrides.format = *format;
            overrides.tolerance = *tolerance;
            overrides.concurrency = *concurrency;
            overrides.strategy = *strategy;
            overrides.reject_degraded = *reject_degraded;
        }
        Command::Serve { host, port } => {
            overrides.host = host.clone();
            overrides.port = *port;
        }
        Command::InitConfig { .. } => {}
    }
    apply_overrides(&mut config, &overrides).context("Invalid configuration")?;

    bitext_common::logging::init_tracing(&config.logging)
        .context("Failed to initialize logging")?;

    info!("Starting bitext-align {}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Config: {}", path.display()),
        None => info!("Config: compiled defaults"),
    }

    let oracle = build_oracle(&config.embedding).context("Failed to initialize embedding oracle")?;
    info!(model = oracle.model(), kind = ?config.embedding.kind, "Embedding oracle ready");

    let aligner = Aligner::from_settings(oracle, &config.alignment)
        .context("Invalid alignment settings")?;
    info!(
        tolerance = config.alignment.tolerance,
        strategy = %config.alignment.strategy,
        "Aligner configured"
    );

    match args.command {
        Command::Align { input, .. } => run_align(&aligner, &config, input).await,
        Command::Serve { .. } => run_server(aligner, &config).await,
        Command::InitConfig { .. } => Ok(()),
    }
}

/// Batch alignment of one input file
async fn run_align(aligner: &Aligner, config: &TomlConfig, input: PathBuf) -> Result<()> {
    let started_at = Utc::now();
    let articles = load_articles(&input)
        .with_context(|| format!("Failed to read articles from {}", input.display()))?;

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, cancelling; finished articles will still be saved");
            cancel_on_signal.cancel();
        }
    });

    let reports = align_articles(aligner, articles, config.batch.concurrency, cancel).await;
    let summary = BatchSummary::from_reports(&reports);
    summary.log();

    let mut assembler = RecordAssembler::new();
    let records = collect_records(&reports, config.batch.accept_degraded, &mut assembler);
    let output = resolve_output_path(config, Local::now());

    match config.output.format {
        OutputFormat::Csv => {
            write_csv(&output, &records, &config.output.label_a, &config.output.label_b)
                .with_context(|| format!("Failed to write {}", output.display()))?;
        }
        OutputFormat::Sqlite => {
            let pool = bitext_align::db::init_database_pool(&output)
                .await
                .with_context(|| format!("Failed to open database {}", output.display()))?;
            let run_id = Uuid::new_v4();
            bitext_align::db::save_run(&pool, run_id, started_at, &summary, &records)
                .await
                .context("Failed to save records")?;
            info!("Run id: {}", run_id);
        }
    }

    info!(
        records = records.len(),
        output = %output.display(),
        "Alignment finished"
    );

    Ok(())
}

/// HTTP API until Ctrl+C or SIGTERM
async fn run_server(aligner: Aligner, config: &TomlConfig) -> Result<()> {
    let state = AppState::new(
        aligner,
        config.server.max_concurrent_alignments,
        config.batch.concurrency,
    );
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path.or_else(bitext_common::config::default_config_path) {
        Some(path) => path,
        None => anyhow::bail!("No config directory available; pass --path"),
    };

    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    write_toml_config(&TomlConfig::default(), &path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
