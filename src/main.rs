use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use reels_extractor::config::{AppConfig, MAX_REELS};
use reels_extractor::infrastructure::storage;
use reels_extractor::services::clock::SystemClock;
use reels_extractor::services::extractor::{HttpExtractorClient, OutputFormat};
use reels_extractor::services::pipeline::ExtractionPipeline;
use reels_extractor::services::progress::LogProgress;
use reels_extractor::services::storage::StorageService;
use reels_extractor::{AppState, create_app};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the web form (default)
    Serve {
        /// Address to bind the HTTP server to
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: IpAddr,

        /// Port for the HTTP server
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },
    /// Run a single extraction from the terminal and print the download link
    Extract {
        /// Instagram handle or profile URL
        #[arg(short, long)]
        profile: String,

        /// Number of reels to extract
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=MAX_REELS as i64))]
        reels: u32,

        /// Output format: csv or json
        #[arg(short, long, default_value = "csv")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initial Environment & Logging Setup
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reels_extractor=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Configuration & Clients
    let config = AppConfig::from_env()?;
    info!(
        "⚙️  Config: Bucket={}, Max Wait={}s, Interval={}s, Link TTL={}s",
        config.bucket_name,
        config.max_wait.as_secs(),
        config.check_interval.as_secs(),
        config.link_expiration.as_secs()
    );

    let storage: Option<Arc<dyn StorageService>> =
        match storage::setup_storage(&config.storage).await {
            Ok(client) => {
                match client.bucket_exists(&config.bucket_name).await {
                    Ok(true) => info!("✅ Bucket '{}' is ready", config.bucket_name),
                    Ok(false) => warn!("🪣 Bucket '{}' does not exist yet", config.bucket_name),
                    Err(e) => warn!("⚠️  Could not reach bucket '{}': {}", config.bucket_name, e),
                }
                Some(client)
            }
            Err(e) => {
                error!("❌ Storage client failed to initialize: {:#}", e);
                None
            }
        };

    let extractor = Arc::new(HttpExtractorClient::new(
        config.api_endpoint.clone(),
        config.api_timeout,
    )?);
    let pipeline = Arc::new(ExtractionPipeline::new(
        config,
        extractor,
        storage,
        Arc::new(SystemClock),
    ));

    match args.command.unwrap_or(Command::Serve {
        bind: IpAddr::from([127, 0, 0, 1]),
        port: 3000,
    }) {
        Command::Serve { bind, port } => serve(pipeline, SocketAddr::new(bind, port)).await,
        Command::Extract {
            profile,
            reels,
            format,
        } => {
            let outcome = pipeline
                .run(
                    profile.trim(),
                    OutputFormat::from_tag(&format),
                    reels,
                    &LogProgress::new(),
                )
                .await?;
            println!("{}", outcome.link.url);
            info!("🔗 Link valid until {}", outcome.link.expires_at);
            Ok(())
        }
    }
}

async fn serve(pipeline: Arc<ExtractionPipeline>, addr: SocketAddr) -> anyhow::Result<()> {
    info!("🚀 Starting Reels Extractor...");

    let app = create_app(AppState { pipeline });

    info!("✅ Server ready at http://{}", addr);
    info!("📖 Swagger UI: http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
