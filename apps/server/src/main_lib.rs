use std::sync::Arc;

use crate::config::Config;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};
use userfeed_broker::{NatsBrokerClient, NatsBrokerConfig, UserProducer};
use userfeed_core::users::{UserService, UserServiceTrait};
use userfeed_storage_sqlite::{
    db::{self, DbPool, WriteHandle},
    users::{
        spawn_feed_pruner, ChangeStreamOptions, FeedRetention, UserChangeStreamWatcher,
        UserRepository,
    },
};

pub struct AppState {
    pub user_service: Arc<UserService>,
    pub pool: Arc<DbPool>,
    pub writer: WriteHandle,
    pub db_path: String,
}

pub fn init_tracing() {
    let log_format = std::env::var("UF_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let db_path = db::init(&config.db_path)?;
    tracing::info!("Database path in use: {}", db_path);

    let pool = db::create_pool(&db_path)?;
    db::run_migrations(&pool)?;
    let writer = db::spawn_writer((*pool).clone());

    let user_repository = Arc::new(UserRepository::new(pool.clone(), writer.clone()));
    let mut user_service = UserService::new(user_repository);

    match &config.nats_url {
        Some(nats_url) => {
            let client = NatsBrokerClient::connect(NatsBrokerConfig::new(
                nats_url.as_str(),
                config.user_events_topic.as_str(),
            ))
            .await?;
            let producer = Arc::new(UserProducer::new(
                Arc::new(client),
                config.user_events_topic.clone(),
            ));
            let watcher = Arc::new(UserChangeStreamWatcher::new(
                pool.clone(),
                writer.clone(),
                ChangeStreamOptions {
                    poll_interval: config.feed_poll_interval,
                    ..Default::default()
                },
            ));
            user_service = user_service.with_relay(watcher, producer);
            tracing::info!(
                "User change relay publishing to '{}' via {}",
                config.user_events_topic,
                nats_url
            );
        }
        None => tracing::warn!("UF_NATS_URL is not set; user change relay disabled"),
    }

    Ok(Arc::new(AppState {
        user_service: Arc::new(user_service),
        pool,
        writer,
        db_path,
    }))
}

/// Starts relaying user changes until `cancel` fires.
///
/// Returns `None` when the relay is not configured.
pub async fn start_user_relay(
    state: &AppState,
    cancel: CancellationToken,
) -> anyhow::Result<Option<JoinHandle<()>>> {
    Ok(state.user_service.start_watching_users(cancel).await?)
}

/// Starts pruning old change feed records until `cancel` fires.
///
/// Returns `None` when retention is disabled.
pub fn start_feed_pruner(
    state: &AppState,
    config: &Config,
    cancel: CancellationToken,
) -> Option<JoinHandle<()>> {
    let Some(max_age) = config.feed_retention else {
        tracing::info!("UF_FEED_RETENTION_SECS is 0; change feed is never pruned");
        return None;
    };
    Some(spawn_feed_pruner(
        state.writer.clone(),
        FeedRetention {
            max_age,
            ..Default::default()
        },
        cancel,
    ))
}
