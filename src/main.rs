use clap::Parser;
use openai_anthropic_proxy::{build_router, AnthropicBackend, AppState, ProxyConfig, SharedLogger};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "openai-anthropic-proxy",
    about = "OpenAI-compatible chat completions endpoint backed by the Anthropic messages API",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind (overrides config and HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Default model for requests that name none (overrides MODEL_NAME)
    #[arg(long)]
    model: Option<String>,

    /// Messages API base URL (overrides BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Log file path
    #[arg(long, default_value = "anthropic-proxy.log")]
    log_file: PathBuf,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "openai_anthropic_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in openai_anthropic_proxy::config::config_search_paths()
            .iter()
            .enumerate()
        {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = ProxyConfig::find_and_load(cli.config.as_deref())?.with_env()?;

    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(model) = cli.model {
        config.backend.model = model;
    }
    if let Some(base_url) = cli.base_url {
        config.backend.base_url = base_url;
    }

    let logger = SharedLogger::new(&cli.log_file)?;

    // Validate config eagerly
    let api_key = config.resolve_api_key()?;
    let backend = AnthropicBackend::new(&config.backend, api_key.clone(), logger.clone())?;

    let bind_addr = config.bind_addr();

    info!("╔═══════════════════════════════════════════════════════╗");
    info!("║           openai-anthropic-proxy v{}               ║", env!("CARGO_PKG_VERSION"));
    info!("╚═══════════════════════════════════════════════════════╝");
    info!("  API key:   {}", mask_key(&api_key));
    info!("  Model:     {}", config.backend.model);
    info!("  Base URL:  {}", config.backend.base_url);
    info!("  Server:    http://{}", bind_addr);
    info!("  API:       http://localhost:{}/v1/chat/completions", config.port);
    info!("  Log file:  {}", cli.log_file.display());

    logger.info(
        "startup",
        format!(
            "Starting proxy model={} base_url={} bind={}",
            config.backend.model, config.backend.base_url, bind_addr
        ),
    );

    let state = Arc::new(AppState {
        config,
        backend: Arc::new(backend),
        logger,
    });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn mask_key(key: &str) -> String {
    if key.chars().count() <= 12 {
        return "****".to_string();
    }
    let visible: String = key.chars().take(8).collect();
    format!("{}…", visible)
}
