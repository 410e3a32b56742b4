use crate::{context::AppContext, conversation::SWEEP_INTERVAL};
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::conversation_sweep_job(Arc::clone(&self)));
        tokio::spawn(Self::account_expiry_job(Arc::clone(&self)));
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Drop stale conversation prompts (runs every 5 minutes)
    async fn conversation_sweep_job(scheduler: Arc<Self>) {
        let mut interval = interval(SWEEP_INTERVAL);

        loop {
            interval.tick().await;

            let removed = tasks::sweep_conversations(&scheduler.context).await;
            if removed > 0 {
                debug!("Swept {} stale conversation states", removed);
            }
        }
    }

    /// Flip accounts past their expiry to expired (runs every hour)
    async fn account_expiry_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(3600));

        loop {
            interval.tick().await;
            info!("Running account expiry sweep");

            match tasks::expire_accounts(&scheduler.context).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Marked {} accounts as expired", count);
                    } else {
                        info!("Account expiry: no accounts due");
                    }
                }
                Err(e) => error!("Failed to expire accounts: {}", e),
            }
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;

            if let Err(e) = tasks::health_check(&scheduler.context).await {
                error!("Health check failed: {}", e);
            }
        }
    }
}
