use money_mentor_bot::{
    bot::{Bot, BotDeps},
    config::BotConfig,
    content::{ContentStore, JsonFileContentSource},
    gateway::start_server,
    premium::DirectoryDelivery,
    prices::{HttpPriceProvider, PriceService},
    rate_limit::RateLimiter,
    runtime,
    storage::JsonFileStore,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = BotConfig::from_env()?;

    info!("🚀 MoneyMentorLab bot starting");
    info!("📍 Port: {}", config.port);
    info!("📂 Data dir: {}", config.data_dir.display());

    // Create components
    let store = Arc::new(JsonFileStore::open(&config.data_dir).await?);
    let provider = Arc::new(HttpPriceProvider::new(config.provider.clone())?);
    let prices = Arc::new(PriceService::new(provider));
    let content = Arc::new(ContentStore::new(Arc::new(JsonFileContentSource::new(
        store.content_path(),
    ))));
    let limiter = Arc::new(RateLimiter::with_config(config.rate_limit.clone()));

    let bot = Arc::new(Bot::new(BotDeps {
        admin_id: config.admin_id,
        support_url: config.support_url.clone(),
        store: store.clone(),
        prices: prices.clone(),
        content: content.clone(),
        delivery: Arc::new(DirectoryDelivery::new(store.root())),
        limiter: limiter.clone(),
        data_root: Some(store.root().to_path_buf()),
    }));

    info!("✅ Bot initialized");

    // Background jobs
    let schedule = &config.runtime;
    runtime::spawn_content_tick(content, schedule.content_tick);
    runtime::spawn_limiter_sweep(limiter, schedule.limiter_sweep);
    runtime::spawn_price_purge(prices, schedule.price_purge);
    runtime::spawn_backups(
        store.root().to_path_buf(),
        schedule.backup_initial_delay,
        schedule.backup_period,
    );

    info!("📡 Starting gateway...");
    start_server(bot, config.port).await?;

    Ok(())
}
