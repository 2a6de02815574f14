use ads_core::chat::ChatSession;
use ads_core::client::GeminiClient;
use ads_core::types::GenerationConfig;
use ads_lookup::{BigQueryFaqIndex, FaqRetriever, ForecastFetcher, GoogleGeocoder, NwsClient};
use ads_server::config::AppConfig;
use ads_server::coordinator::Coordinator;
use ads_server::dispatcher::{tool_declarations, ToolDispatcher};
use ads_server::guard::ModelArmorGuard;
use ads_server::http_server::{self, AppState};
use ads_server::session::{spawn_cleanup, ConversationStore};
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[clap(
    name = "ads-daemon",
    about = "Alaska Department of Snow chat assistant backend",
    version
)]
struct Args {
    #[clap(short, long)]
    /// Path to the configuration file
    config: Option<PathBuf>,

    #[clap(short = 'k', long)]
    /// Gemini API key
    api_key: Option<String>,

    #[clap(short = 'm', long)]
    /// Gemini model to use
    model: Option<String>,

    #[clap(long)]
    /// HTTP server address
    http_addr: Option<SocketAddr>,

    #[clap(long)]
    /// Exchanges kept in each conversation's history
    max_history_turns: Option<usize>,

    #[clap(long, env = "ADS_LOG_LEVEL", default_value = "info")]
    /// Log level (trace, debug, info, warn, error)
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .init();

    info!("Starting ADS chat daemon...");

    let mut config =
        AppConfig::load_from_file(args.config.as_deref()).context("Failed to load configuration")?;
    config
        .apply_process_env()
        .context("Failed to read configuration from the environment")?;

    if let Some(api_key) = args.api_key {
        config.gemini.api_key = Some(api_key);
    }
    if let Some(model) = args.model {
        config.gemini.model_name = Some(model);
    }
    if let Some(addr) = args.http_addr {
        config.server.http_addr = addr;
    }
    if let Some(turns) = args.max_history_turns {
        config.server.max_history_turns = turns;
    }
    config.validate().context("Invalid configuration")?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.server.lookup_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;

    // Lookups
    let geocoding_key = config.weather.geocoding_api_key.clone().unwrap_or_else(|| {
        warn!("No geocoding API key configured; forecast lookups will fail");
        String::new()
    });
    let geocoder = GoogleGeocoder::new(http.clone(), geocoding_key)
        .with_region(config.weather.region.clone())
        .with_base_url(config.weather.geocode_base.clone());
    let nws = NwsClient::new(http.clone())
        .with_base_url(config.weather.nws_base.clone())
        .with_user_agent(config.weather.user_agent.clone());
    let forecast = ForecastFetcher::from_clients(geocoder, nws);

    if config.warehouse.access_token.is_none() {
        warn!("No GOOGLE_ACCESS_TOKEN set; FAQ retrieval will be unauthenticated");
    }
    let table = config.warehouse.vector_search_table()?;
    info!(
        project = %table.project,
        dataset = %table.dataset,
        "Using FAQ vector index"
    );
    let faq_index = BigQueryFaqIndex::new(http.clone(), table)
        .context("Failed to configure FAQ index")?
        .with_base_url(config.warehouse.api_base.clone())
        .with_access_token(config.warehouse.access_token.clone())
        .with_timeout_ms(config.warehouse.timeout_ms);
    let dispatcher = ToolDispatcher::new(FaqRetriever::new(Arc::new(faq_index)), forecast);

    // Model
    let gemini_client =
        GeminiClient::new(config.gemini.clone()).context("Failed to initialize Gemini client")?;
    info!(model = %config.gemini.model_name(), "Initialized Gemini client");

    let mut coordinator = Coordinator::new(Arc::new(gemini_client), dispatcher);
    if let Some(template) = &config.guard.template {
        let project = config
            .warehouse
            .project_id
            .as_deref()
            .ok_or_else(|| anyhow!("Prompt screening needs a project id"))?;
        let mut guard = ModelArmorGuard::new(
            http.clone(),
            project,
            &config.guard.location,
            template,
            config.warehouse.access_token.clone(),
        );
        if let Some(base) = &config.guard.api_base {
            guard = guard.with_base_url(base.clone());
        }
        info!(template = %template, "Prompt screening enabled");
        coordinator = coordinator.with_guard(Arc::new(guard));
    }

    // Every conversation starts from this session
    let mut template = ChatSession::new()
        .with_tools(tool_declarations())
        .with_max_turns(config.server.max_history_turns);
    if let Some(prompt) = &config.gemini.system_prompt {
        template = template.with_system_instruction(prompt.clone());
    }
    if let Some(temperature) = config.gemini.temperature {
        template = template.with_generation_config(GenerationConfig {
            temperature: Some(temperature),
        });
    }

    let conversations = Arc::new(ConversationStore::new(
        template,
        config.server.idle_timeout(),
        config.server.max_conversations,
    ));
    let cleanup_period = Duration::from_secs((config.server.session_idle_timeout_secs / 4).max(60));
    spawn_cleanup(conversations.clone(), cleanup_period);

    let state = AppState {
        coordinator: Arc::new(coordinator),
        conversations,
    };
    http_server::run_server(state, config.server.http_addr).await?;

    info!("ADS chat daemon shutting down");
    Ok(())
}
