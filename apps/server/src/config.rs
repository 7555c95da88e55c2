use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use userfeed_core::constants::{
    DEFAULT_FEED_POLL_INTERVAL_MS, DEFAULT_FEED_RETENTION_SECS, DEFAULT_USER_EVENTS_TOPIC,
    MIN_FEED_POLL_INTERVAL_MS,
};

pub struct Config {
    pub listen_addr: SocketAddr,
    pub db_path: String,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    /// Broker URL; the change relay stays off when unset.
    pub nats_url: Option<String>,
    pub user_events_topic: String,
    pub feed_poll_interval: Duration,
    /// Age after which change feed records are pruned; `None` keeps them.
    pub feed_retention: Option<Duration>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let listen_addr: SocketAddr = std::env::var("UF_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .context("Invalid UF_LISTEN_ADDR")?;
        let db_path = std::env::var("UF_DB_PATH").unwrap_or_else(|_| "./db/app.db".into());
        let cors_allow = std::env::var("UF_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let timeout_ms: u64 = std::env::var("UF_REQUEST_TIMEOUT_MS")
            .unwrap_or_else(|_| "30000".into())
            .parse()
            .unwrap_or(30000);
        let nats_url = std::env::var("UF_NATS_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let user_events_topic = std::env::var("UF_USER_EVENTS_TOPIC")
            .unwrap_or_else(|_| DEFAULT_USER_EVENTS_TOPIC.into());
        let feed_poll_interval =
            feed_poll_interval(std::env::var("UF_FEED_POLL_INTERVAL_MS").ok().as_deref());
        let feed_retention =
            feed_retention(std::env::var("UF_FEED_RETENTION_SECS").ok().as_deref());
        Ok(Self {
            listen_addr,
            db_path,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            nats_url,
            user_events_topic,
            feed_poll_interval,
            feed_retention,
        })
    }
}

fn feed_poll_interval(raw: Option<&str>) -> Duration {
    let ms = raw
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_FEED_POLL_INTERVAL_MS);
    Duration::from_millis(ms.max(MIN_FEED_POLL_INTERVAL_MS))
}

/// `0` disables pruning.
fn feed_retention(raw: Option<&str>) -> Option<Duration> {
    let secs = raw
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_FEED_RETENTION_SECS);
    (secs > 0).then(|| Duration::from_secs(secs))
}
