use std::sync::Arc;
use tokio::time::Duration;

use nameswap_worker::application::activity::ActivityService;
use nameswap_worker::application::capture::{
    restart_delay, CaptureEngine, ChangeSource, PollingChangeSource, Resyncer, TriggerChangeSource,
};
use nameswap_worker::application::expiry::ExpiryEngine;
use nameswap_worker::application::jobs::{topics, Dispatcher};
use nameswap_worker::application::notifications::Notifier;
use nameswap_worker::application::stats::StatsEngine;
use nameswap_worker::application::validation::{
    ListingValidator, OfferValidator, ThreadRngSampler, ValidationScheduler,
};
use nameswap_worker::config::AppConfig;
use nameswap_worker::domain::services::currency::CurrencyRegistry;
use nameswap_worker::infrastructure::ethereum::EthereumClient;
use nameswap_worker::infrastructure::persistence::connection::DbPool;
use nameswap_worker::infrastructure::persistence::factory::RepositoryFactory;
use nameswap_worker::infrastructure::queue::{worker, JobQueue, WorkerPool};
use nameswap_worker::infrastructure::search::SearchClient;
use nameswap_worker::utils::logging;

#[tokio::main]
async fn main() {
    logging::init_logger();

    let config = AppConfig::from_env();

    let db_pool = match DbPool::new(&config).await {
        Ok(db_pool) => db_pool,
        Err(e) => {
            logging::log_error(&format!("Failed to connect to database: {}", e));
            return;
        }
    };

    let search = match SearchClient::new(&config) {
        Ok(search) => Arc::new(search),
        Err(e) => {
            logging::log_error(&format!("Failed to create search client: {}", e));
            return;
        }
    };

    let ethereum = match EthereumClient::new(&config) {
        Ok(ethereum) => Arc::new(ethereum),
        Err(e) => {
            logging::log_error(&format!("Failed to create Ethereum client: {}", e));
            return;
        }
    };

    let repositories = Arc::new(RepositoryFactory::create_repositories(&db_pool, &config));
    let queue = JobQueue::new(db_pool.get_connection().clone());
    let activity = ActivityService::new(repositories.activity.clone());
    let notifier = Notifier::new(queue.clone());

    let listing_validator = Arc::new(ListingValidator::new(
        repositories.clone(),
        ethereum.clone(),
        Arc::new(ThreadRngSampler),
        activity.clone(),
        notifier.clone(),
        config.validation.clone(),
    ));
    let offer_validator = Arc::new(OfferValidator::new(
        repositories.clone(),
        ethereum.clone(),
        CurrencyRegistry::mainnet(),
        activity.clone(),
        notifier.clone(),
        config.validation.clone(),
    ));
    let scheduler = Arc::new(ValidationScheduler::new(
        repositories.clone(),
        queue.clone(),
        config.validation.clone(),
    ));
    let expiry = Arc::new(ExpiryEngine::new(
        repositories.clone(),
        queue.clone(),
        activity.clone(),
        config.expiry.clone(),
    ));
    let stats = Arc::new(StatsEngine::new(repositories.clone()));
    let resyncer = Arc::new(Resyncer::new(
        repositories.clone(),
        search.clone(),
        config.capture.clone(),
    ));

    let dispatcher = Arc::new(Dispatcher::new(
        listing_validator,
        offer_validator,
        scheduler,
        expiry,
        stats,
        resyncer.clone(),
        queue.clone(),
        config.queue.clone(),
    ));

    let mut pool = WorkerPool::new(queue.clone(), config.queue.clone());
    pool.start(dispatcher);

    spawn_crons(&queue, &config);

    // Repair any index drift accumulated while the service was down
    if let Err(e) = resyncer.run().await {
        logging::log_error(&format!("Startup resync failed: {}", e));
    }

    let engine = CaptureEngine::new(
        repositories.clone(),
        search,
        activity,
        notifier,
        queue.clone(),
    );

    // Supervised capture stream: a dropped listen connection or poll error
    // stops the engine run, not the service. Each restart re-attempts the
    // trigger source before settling for polling.
    let capture_repositories = repositories.clone();
    let capture_config = config.clone();
    let capture_handle = tokio::spawn(async move {
        let mut attempt: u32 = 0;
        loop {
            let source =
                create_change_source(&db_pool, capture_repositories.clone(), &capture_config)
                    .await;
            match engine.run(source).await {
                Ok(()) => break,
                Err(e) => {
                    attempt += 1;
                    let delay = restart_delay(attempt);
                    logging::log_error(&format!(
                        "Capture engine stopped ({}); restarting in {}s",
                        e,
                        delay.as_secs()
                    ));
                    tokio::time::sleep(delay).await;
                }
            }
        }
    });

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for Ctrl+C");
    logging::log_info("Shutting down");
    capture_handle.abort();
    pool.stop();
}

/// Trigger-based change source, falling back to polling when the listen
/// connection cannot be established
async fn create_change_source(
    db_pool: &DbPool,
    repositories: Arc<nameswap_worker::infrastructure::persistence::repositories::Repositories>,
    config: &AppConfig,
) -> Box<dyn ChangeSource> {
    match TriggerChangeSource::connect(db_pool.get_connection(), &config.database.url).await {
        Ok(source) => Box::new(source),
        Err(e) => {
            logging::log_warning(&format!(
                "Trigger change source unavailable, polling instead: {}",
                e
            ));
            Box::new(PollingChangeSource::new(
                repositories,
                config.capture.poll_interval_ms,
                config.capture.resync_batch_size,
            ))
        }
    }
}

/// Periodic singleton jobs driving the sweeps
fn spawn_crons(queue: &JobQueue, config: &AppConfig) {
    let crons = [
        (
            topics::BATCH_EXPIRE_ORDERS,
            Duration::from_millis(config.expiry.sweep_interval_ms),
        ),
        (
            topics::SWEEP_LISTING_VALIDATION,
            Duration::from_millis(config.validation.interval_ms),
        ),
        (
            topics::SWEEP_OFFER_VALIDATION,
            Duration::from_millis(config.validation.offer_interval_ms),
        ),
        (
            topics::RECHECK_UNFUNDED,
            Duration::from_millis(config.validation.unfunded_interval_ms),
        ),
        (
            topics::ARCHIVE_COMPLETED_JOBS,
            Duration::from_secs(config.queue.archive_after_secs.max(60) as u64),
        ),
        (
            topics::RESYNC_INDEX,
            Duration::from_millis(config.capture.resync_interval_ms),
        ),
    ];

    for (topic, interval) in crons {
        let queue = queue.clone();
        tokio::spawn(async move {
            if let Err(e) =
                worker::run_cron(queue, topic.to_string(), serde_json::json!({}), interval).await
            {
                logging::log_error(&format!("Cron '{}' stopped: {}", topic, e));
            }
        });
    }
}
