use std::sync::Arc;

use fpg_common::Cents;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    data_objects::{CieloErrorMessage, CieloStatusUpdate, MerchantOrderPayments},
    with_retry,
    CieloApiError,
    CieloConfig,
    CieloTransaction,
    CieloTransactionRequest,
};

#[derive(Clone, Copy, Debug)]
enum Host {
    Api,
    Query,
}

#[derive(Clone)]
pub struct CieloApi {
    config: CieloConfig,
    client: Arc<Client>,
}

impl CieloApi {
    pub fn new(config: CieloConfig) -> Result<Self, CieloApiError> {
        let mut headers = HeaderMap::with_capacity(3);
        let id = HeaderValue::from_str(config.merchant_id.as_str())
            .map_err(|e| CieloApiError::Initialization(e.to_string()))?;
        let mut key = HeaderValue::from_str(config.merchant_key.reveal().as_str())
            .map_err(|e| CieloApiError::Initialization(e.to_string()))?;
        key.set_sensitive(true);
        headers.insert("MerchantId", id);
        headers.insert("MerchantKey", key);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CieloApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &CieloConfig {
        &self.config
    }

    fn url(&self, host: Host, path: &str) -> String {
        let base = match host {
            Host::Api => self.config.api_url.as_str(),
            Host::Query => self.config.query_url.as_str(),
        };
        format!("{}{path}", base.trim_end_matches('/'))
    }

    async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        host: Host,
        path: &str,
        params: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T, CieloApiError> {
        let url = self.url(host, path);
        trace!("💳️ Sending {method} {url}");
        let mut req = self.client.request(method, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        let response = req.send().await?;
        let status = response.status();
        if status.is_success() {
            trace!("💳️ Query successful. {status}");
            let text = response.text().await?;
            serde_json::from_str::<T>(&text).map_err(|e| CieloApiError::Malformed(format!("{e}. Body: {text}")))
        } else {
            let text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<Vec<CieloErrorMessage>>(&text) {
                Ok(errors) => errors.iter().map(|e| format!("[{}] {}", e.code, e.message)).collect::<Vec<_>>().join(", "),
                Err(_) => text,
            };
            Err(CieloApiError::from_status(status.as_u16(), message))
        }
    }

    /// Creates a sale. Sale creation is not retried: a timeout may have left a sale behind on Cielo's side, and the
    /// webhook will tell us about it.
    pub async fn create_transaction(&self, request: &CieloTransactionRequest) -> Result<CieloTransaction, CieloApiError> {
        debug!("💳️ Creating sale for merchant order {}", request.merchant_order_id);
        let tx = self
            .rest_query::<CieloTransaction, _>(Method::POST, Host::Api, "/1/sales/", &[], Some(request))
            .await
            .map_err(|e| {
                error!("💳️ Could not create sale for merchant order {}. {e}", request.merchant_order_id);
                e
            })?;
        info!("💳️ Created sale {} for merchant order {}", tx.payment.payment_id, request.merchant_order_id);
        Ok(tx)
    }

    pub async fn get_transaction(&self, payment_id: &str) -> Result<CieloTransaction, CieloApiError> {
        let path = format!("/1/sales/{payment_id}");
        debug!("💳️ Fetching sale {payment_id}");
        let tx = with_retry(&self.config.retry, || {
            self.rest_query::<CieloTransaction, ()>(Method::GET, Host::Query, &path, &[], None)
        })
        .await?;
        debug!("💳️ Sale {payment_id} has status {}", tx.payment.status);
        Ok(tx)
    }

    /// Returns the payment ids Cielo has on record for the given merchant order id.
    pub async fn get_transaction_by_merchant_order_id(&self, merchant_order_id: &str) -> Result<Vec<String>, CieloApiError> {
        debug!("💳️ Fetching sales for merchant order {merchant_order_id}");
        let params = [("merchantOrderId", merchant_order_id)];
        let result = with_retry(&self.config.retry, || {
            self.rest_query::<MerchantOrderPayments, ()>(Method::GET, Host::Query, "/1/sales", &params, None)
        })
        .await?;
        Ok(result.payments.into_iter().map(|p| p.payment_id).collect())
    }

    /// Captures an authorized credit card sale. `amount` of `None` captures the full authorized amount.
    pub async fn capture_transaction(
        &self,
        payment_id: &str,
        amount: Option<Cents>,
    ) -> Result<CieloStatusUpdate, CieloApiError> {
        let path = format!("/1/sales/{payment_id}/capture");
        self.update_sale(&path, payment_id, amount, "capture").await
    }

    /// Voids (cancels) a sale, fully or partially.
    pub async fn cancel_transaction(
        &self,
        payment_id: &str,
        amount: Option<Cents>,
    ) -> Result<CieloStatusUpdate, CieloApiError> {
        let path = format!("/1/sales/{payment_id}/void");
        self.update_sale(&path, payment_id, amount, "void").await
    }

    /// Sends a capture or void. These change money on Cielo's side, so they are sent exactly once: a timed out update
    /// may already have been applied, and the reconciliation that follows reports the real state of the sale.
    async fn update_sale(
        &self,
        path: &str,
        payment_id: &str,
        amount: Option<Cents>,
        action: &str,
    ) -> Result<CieloStatusUpdate, CieloApiError> {
        let amount = amount.map(|a| a.value().to_string());
        let params = amount.as_deref().map(|a| vec![("amount", a)]).unwrap_or_default();
        debug!("💳️ Sending {action} for sale {payment_id}");
        let result = self
            .rest_query::<CieloStatusUpdate, ()>(Method::PUT, Host::Api, path, &params, None)
            .await
            .map_err(|e| {
                error!("💳️ Could not {action} sale {payment_id}. {e}");
                e
            })?;
        info!("💳️ {action} for sale {payment_id} returned status {}", result.status);
        Ok(result)
    }
}
