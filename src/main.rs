//! Kraken Gateway - CLI Application
//!
//! - `start`: serve the gateway
//! - `self-test`: run the endpoint checks against a running gateway
//! - `validate` / `init`: manage the TOML configuration file

use clap::{Parser, Subcommand, ValueEnum};
use kraken_gateway::{
    config::GatewayConfig,
    gateway::{self, AppState},
    kraken::KrakenClient,
    metrics::GatewayMetrics,
    selftest::{RunStatus, SelfTester},
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Kraken Gateway - HTTP gateway for the Kraken exchange API
#[derive(Parser)]
#[command(name = "kraken-gateway")]
#[command(version, about = "HTTP gateway for the Kraken exchange API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Start {
        /// Configuration file path (defaults and environment variables apply without one)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Run the endpoint self-test against a running gateway
    SelfTest {
        /// Gateway base URL
        #[arg(short, long, default_value = "http://localhost:3240")]
        base_url: String,
        /// Report format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Console)]
        format: OutputFormat,
        /// Per-request timeout in milliseconds
        #[arg(long, default_value_t = 10_000)]
        timeout_ms: u64,
        /// Failed cases tolerated before the run counts as unhealthy
        /// (raise it when the API key lacks trading permissions)
        #[arg(long, default_value_t = 0)]
        max_failures: usize,
    },
    /// Validate the configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Generate a sample configuration file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Console,
    Json,
    Summary,
    Html,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config } => start_server(config).await?,
        Commands::SelfTest {
            base_url,
            format,
            timeout_ms,
            max_failures,
        } => run_self_test(base_url, format, timeout_ms, max_failures).await?,
        Commands::Validate { config } => validate_config(&config)?,
        Commands::Init { output } => generate_sample_config(&output)?,
    }

    Ok(())
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`)
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Start the gateway server
async fn start_server(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    init_logging();

    let config = GatewayConfig::load(config_path.as_deref())?;
    match &config_path {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => info!("No configuration file given, using defaults and environment"),
    }

    if let Err(e) = config.require_credentials() {
        error!("{}", e);
        error!("Set KRAKEN_API_KEY and KRAKEN_API_SECRET before starting the gateway");
        std::process::exit(1);
    }

    let kraken = KrakenClient::new(&config.kraken)?;
    let metrics = GatewayMetrics::new()?;
    let addr: SocketAddr = config.server_addr().parse()?;

    info!("Kraken API: {}", kraken.base_url());
    if config.metrics.enabled {
        info!("Metrics endpoint enabled at {}", config.metrics.path);
    }
    info!("Self-test available at /test (runs against {})", config.self_test_base_url());

    let app = gateway::router(AppState::new(config, kraken, metrics));

    info!("Starting Kraken gateway on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

/// Run the self-test plan and print the report
async fn run_self_test(
    base_url: String,
    format: OutputFormat,
    timeout_ms: u64,
    max_failures: usize,
) -> anyhow::Result<()> {
    init_logging();

    if timeout_ms == 0 {
        anyhow::bail!("--timeout-ms must be greater than 0");
    }
    let tester = SelfTester::new(base_url, Duration::from_millis(timeout_ms), max_failures)?;

    if !tester.is_reachable().await {
        eprintln!("✗ Gateway is not reachable at {}", tester.base_url());
        eprintln!("  Start it with: kraken-gateway start");
        std::process::exit(1);
    }

    info!("Running self-test against {}", tester.base_url());
    let report = tester.run().await;

    match format {
        OutputFormat::Console => {
            println!("Kraken API endpoint self-test ({})", tester.base_url());
            println!();
            print!("{}", report.to_console());
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Summary => {
            println!("{}", serde_json::to_string_pretty(&report.summary_view())?)
        }
        OutputFormat::Html => print!("{}", report.to_html()),
    }

    if report.summary.status == RunStatus::IssuesDetected {
        std::process::exit(1);
    }
    Ok(())
}

/// Validate configuration file
fn validate_config(config_path: &Path) -> anyhow::Result<()> {
    match GatewayConfig::from_file(config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid!");
            println!();
            println!("Server: {}", config.server_addr());
            println!("Kraken API: {}", config.kraken.base_url);
            println!("Request timeout: {}s", config.kraken.timeout);
            if config.metrics.enabled {
                println!("Metrics: {}", config.metrics.path);
            } else {
                println!("Metrics: disabled");
            }
            println!(
                "Self-test: {} (timeout {}ms, max failures {})",
                config.self_test_base_url(),
                config.self_test.timeout_ms,
                config.self_test.max_failures
            );

            let mut env_config = config.clone();
            env_config.apply_env_overrides(|name| std::env::var(name).ok());
            let missing = env_config.kraken.missing_credentials();
            println!();
            if missing.is_empty() {
                println!("✓ Kraken credentials found in environment");
            } else {
                println!("! Not set: {} (required by `start`)", missing.join(", "));
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration is invalid:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}

/// Generate sample configuration file
fn generate_sample_config(output_path: &Path) -> anyhow::Result<()> {
    let sample_config = r#"# Kraken Gateway Configuration
#
# Credentials are read from the environment only:
#   KRAKEN_API_KEY, KRAKEN_API_SECRET
# PORT and KRAKEN_BASE_URL override the values below.

[server]
host = "0.0.0.0"
port = 3240

[kraken]
base_url = "https://api.kraken.com"
timeout = 30  # seconds

[metrics]
enabled = true
path = "/metrics"

[self_test]
# base_url = "http://127.0.0.1:3240"  # defaults to this gateway
timeout_ms = 10000
# Failed cases tolerated before /test reports "issues_detected". The balance,
# add-order and cancel-all-orders-after cases need "Query Funds", "Create &
# Modify Orders" and "Cancel Orders" permissions; raise this (e.g. to 5) when
# the key lacks them.
max_failures = 0
"#;

    std::fs::write(output_path, sample_config)?;
    println!("Sample configuration written to {}", output_path.display());
    Ok(())
}
