use std::time::Duration;

use fpg_common::{parse_boolean_flag, Secret};
use log::*;

use crate::RetryPolicy;

pub const SANDBOX_API_URL: &str = "https://apisandbox.cieloecommerce.cielo.com.br";
pub const SANDBOX_QUERY_URL: &str = "https://apiquerysandbox.cieloecommerce.cielo.com.br";
pub const PRODUCTION_API_URL: &str = "https://api.cieloecommerce.cielo.com.br";
pub const PRODUCTION_QUERY_URL: &str = "https://apiquery.cieloecommerce.cielo.com.br";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct CieloConfig {
    pub merchant_id: String,
    pub merchant_key: Secret<String>,
    /// Base url for transactional calls (sales, capture, void)
    pub api_url: String,
    /// Base url for queries. Cielo serves these from a separate host.
    pub query_url: String,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for CieloConfig {
    fn default() -> Self {
        Self {
            merchant_id: String::default(),
            merchant_key: Secret::default(),
            api_url: SANDBOX_API_URL.to_string(),
            query_url: SANDBOX_QUERY_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

impl CieloConfig {
    pub fn new_from_env_or_default() -> Self {
        let merchant_id = std::env::var("FPG_CIELO_MERCHANT_ID").unwrap_or_else(|_| {
            warn!("💳️ FPG_CIELO_MERCHANT_ID not set, using (probably useless) default");
            "00000000-0000-0000-0000-000000000000".to_string()
        });
        let merchant_key = Secret::new(std::env::var("FPG_CIELO_MERCHANT_KEY").unwrap_or_else(|_| {
            warn!("💳️ FPG_CIELO_MERCHANT_KEY not set, using (probably useless) default");
            "0000000000000000000000000000000000000000".to_string()
        }));
        let sandbox = parse_boolean_flag(std::env::var("FPG_CIELO_SANDBOX").ok(), true);
        let (api_url, query_url) = if sandbox {
            info!("💳️ Using the Cielo sandbox environment");
            (SANDBOX_API_URL.to_string(), SANDBOX_QUERY_URL.to_string())
        } else {
            (PRODUCTION_API_URL.to_string(), PRODUCTION_QUERY_URL.to_string())
        };
        let max_attempts = std::env::var("FPG_CIELO_MAX_RETRIES")
            .ok()
            .and_then(|s| {
                s.parse::<u32>()
                    .map_err(|e| warn!("💳️ Invalid configuration value for FPG_CIELO_MAX_RETRIES. {e}"))
                    .ok()
            })
            .unwrap_or(RetryPolicy::default().max_attempts);
        let retry = RetryPolicy { max_attempts, ..RetryPolicy::default() };
        Self { merchant_id, merchant_key, api_url, query_url, request_timeout: DEFAULT_REQUEST_TIMEOUT, retry }
    }
}
