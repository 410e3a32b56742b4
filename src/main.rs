use emby_account_bot::{
    bot::Bot,
    config::BotConfig,
    context::AppContext,
    jobs::JobScheduler,
    remote::{EmbyClient, MediaServer},
    telegram::{run_polling, TelegramApi},
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging(config: &BotConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("emby_account_bot={},sqlx=warn", config.logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Build the media-server client; offline mode when unconfigured or unreachable
async fn connect_remote(config: &BotConfig) -> Option<Arc<dyn MediaServer>> {
    if !config.remote.is_configured() {
        info!("Media server sync disabled, running in offline mode");
        return None;
    }

    let client = match EmbyClient::new(&config.remote) {
        Ok(client) => client,
        Err(e) => {
            warn!("Failed to build media server client: {}", e);
            return None;
        }
    };

    match client.ping().await {
        Ok(info) => {
            info!(
                "Connected to media server {} (version {})",
                info.server_name, info.version
            );
            Some(Arc::new(client))
        }
        Err(e) => {
            warn!("Media server unreachable, running in offline mode: {}", e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BotConfig::from_env()?;
    init_logging(&config);

    info!("Starting emby-account-bot v{}", env!("CARGO_PKG_VERSION"));

    let remote = connect_remote(&config).await;
    let ctx = Arc::new(AppContext::new(config, remote).await?);

    let scheduler = Arc::new(JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    let api = TelegramApi::new(&ctx.config.telegram)?;
    let bot = Bot::new((*ctx).clone());

    tokio::select! {
        result = run_polling(api, bot) => {
            if let Err(e) = result {
                error!("Polling stopped: {:#}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    ctx.db.close().await;
    info!("Bye");
    Ok(())
}
