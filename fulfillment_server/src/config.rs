//! Server configuration, read from `FPG_*` environment variables. Every value has a logged fallback, so the server
//! always starts; it may just refuse every webhook if the secrets are missing.
use std::{env, fmt::Display, str::FromStr, time::Duration};

use cielo_tools::CieloConfig;
use fpg_common::Secret;
use fulfillment_engine::ReconciliationConfig;
use log::*;

const DEFAULT_FPG_HOST: &str = "127.0.0.1";
const DEFAULT_FPG_PORT: u16 = 8460;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/fulfillment_store.db";
const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
const DEFAULT_SWEEP_STALE_AFTER_MINS: i64 = 30;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The secret the gateway presents on webhook calls
    pub webhook_secret: Secret<String>,
    /// The bearer token for the operator routes
    pub admin_token: Secret<String>,
    pub reconcile_timeout: Duration,
    /// Zero disables the sweep worker
    pub sweep_interval: Duration,
    pub sweep_stale_after: chrono::Duration,
    pub notification_url: Option<String>,
    pub cielo: CieloConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_FPG_HOST.to_string(),
            port: DEFAULT_FPG_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            webhook_secret: Secret::default(),
            admin_token: Secret::default(),
            reconcile_timeout: Duration::from_secs(DEFAULT_RECONCILE_TIMEOUT_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            sweep_stale_after: chrono::Duration::minutes(DEFAULT_SWEEP_STALE_AFTER_MINS),
            notification_url: None,
            cielo: CieloConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("FPG_HOST").ok().unwrap_or_else(|| DEFAULT_FPG_HOST.into());
        let port = parse_env("FPG_PORT", DEFAULT_FPG_PORT);
        let database_url = env::var("FPG_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ FPG_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let webhook_secret = Secret::new(env::var("FPG_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ FPG_WEBHOOK_SECRET is not set. Every payment webhook will be rejected until it is.");
            String::default()
        }));
        let admin_token = Secret::new(env::var("FPG_ADMIN_TOKEN").ok().unwrap_or_else(|| {
            warn!("🪛️ FPG_ADMIN_TOKEN is not set. The operator routes are closed.");
            String::default()
        }));
        let reconcile_timeout =
            Duration::from_secs(parse_env("FPG_RECONCILE_TIMEOUT_SECS", DEFAULT_RECONCILE_TIMEOUT_SECS));
        let sweep_interval = Duration::from_secs(parse_env("FPG_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS));
        let sweep_stale_after =
            chrono::Duration::minutes(parse_env("FPG_SWEEP_STALE_AFTER_MINS", DEFAULT_SWEEP_STALE_AFTER_MINS));
        let notification_url = env::var("FPG_NOTIFICATION_URL").ok().filter(|s| !s.trim().is_empty());
        if notification_url.is_none() {
            info!("🪛️ FPG_NOTIFICATION_URL is not set. Customer notifications will only be logged.");
        }
        let cielo = CieloConfig::new_from_env_or_default();
        Self {
            host,
            port,
            database_url,
            webhook_secret,
            admin_token,
            reconcile_timeout,
            sweep_interval,
            sweep_stale_after,
            notification_url,
            cielo,
        }
    }

    pub fn reconciliation_config(&self) -> ReconciliationConfig {
        ReconciliationConfig {
            webhook_secret: self.webhook_secret.clone(),
            timeout: self.reconcile_timeout,
            ..Default::default()
        }
    }
}

fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => default,
    }
}
