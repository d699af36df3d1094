//! [`PaymentGateway`] backed by the Cielo e-commerce API.
use cielo_tools::{
    data_objects::{CieloCustomer, CieloPaymentRequest, CieloStatusUpdate},
    CieloApi,
    CieloApiError,
    CieloConfig,
    CieloTransaction,
    CieloTransactionRequest,
};
use fpg_common::Cents;
use fulfillment_engine::{
    db_types::OrderId,
    traits::{GatewayError, GatewayStatusUpdate, GatewayTransaction, PaymentGateway, TransactionRequest},
};
use log::*;
use serde_json::Value;

#[derive(Clone)]
pub struct CieloGateway {
    api: CieloApi,
}

impl CieloGateway {
    pub fn new(config: CieloConfig) -> Result<Self, GatewayError> {
        let api = CieloApi::new(config).map_err(gateway_error)?;
        Ok(Self { api })
    }
}

impl PaymentGateway for CieloGateway {
    async fn create_transaction(&self, request: TransactionRequest) -> Result<GatewayTransaction, GatewayError> {
        let sale = sale_request(request)?;
        debug!("💳️ Creating Cielo sale for order {} ({})", sale.merchant_order_id, sale.payment.amount());
        let tx = self.api.create_transaction(&sale).await.map_err(gateway_error)?;
        Ok(gateway_transaction(tx))
    }

    async fn get_transaction(&self, payment_id: &str) -> Result<GatewayTransaction, GatewayError> {
        trace!("💳️ Fetching Cielo sale {payment_id}");
        let tx = self.api.get_transaction(payment_id).await.map_err(gateway_error)?;
        Ok(gateway_transaction(tx))
    }

    async fn find_transactions_for_order(&self, order_id: &OrderId) -> Result<Vec<String>, GatewayError> {
        trace!("💳️ Looking up Cielo sales for merchant order {order_id}");
        self.api.get_transaction_by_merchant_order_id(order_id.as_str()).await.map_err(gateway_error)
    }

    async fn capture(&self, payment_id: &str, amount: Option<Cents>) -> Result<GatewayStatusUpdate, GatewayError> {
        let update = self.api.capture_transaction(payment_id, amount).await.map_err(gateway_error)?;
        Ok(status_update(payment_id, update))
    }

    async fn void(&self, payment_id: &str, amount: Option<Cents>) -> Result<GatewayStatusUpdate, GatewayError> {
        let update = self.api.cancel_transaction(payment_id, amount).await.map_err(gateway_error)?;
        Ok(status_update(payment_id, update))
    }
}

pub fn gateway_error(e: CieloApiError) -> GatewayError {
    match e {
        CieloApiError::Initialization(s) => GatewayError::Rejected(format!("Client could not be initialized. {s}")),
        CieloApiError::Rejected { status, message } => GatewayError::Rejected(format!("HTTP {status}. {message}")),
        CieloApiError::Transient(s) => GatewayError::Transient(s),
        CieloApiError::Malformed(s) => GatewayError::Malformed(s),
    }
}

/// Builds a Cielo sale from the provider-agnostic request. The payment method object supplies the `Type` and any
/// method-specific fields; the amount always comes from the order.
pub fn sale_request(request: TransactionRequest) -> Result<CieloTransactionRequest, GatewayError> {
    let TransactionRequest { order_id, amount, customer, payment_method } = request;
    let Value::Object(mut method) = payment_method else {
        return Err(GatewayError::Rejected("The payment method must be a JSON object".into()));
    };
    let amount = serde_json::to_value(amount).map_err(|e| GatewayError::Rejected(e.to_string()))?;
    method.insert("Amount".into(), amount);
    let payment = serde_json::from_value::<CieloPaymentRequest>(Value::Object(method))
        .map_err(|e| GatewayError::Rejected(format!("Invalid payment method. {e}")))?;
    let customer = CieloCustomer { name: customer.name, email: customer.email, ..Default::default() };
    Ok(CieloTransactionRequest { merchant_order_id: order_id.to_string(), customer, payment })
}

pub fn gateway_transaction(tx: CieloTransaction) -> GatewayTransaction {
    GatewayTransaction {
        payment_id: tx.payment.payment_id,
        merchant_order_id: tx.merchant_order_id.map(OrderId::new),
        status_code: tx.payment.status.to_string(),
        amount: tx.payment.amount,
    }
}

pub fn status_update(payment_id: &str, update: CieloStatusUpdate) -> GatewayStatusUpdate {
    let message = update.return_message.or(update.reason_message);
    GatewayStatusUpdate { payment_id: payment_id.to_string(), status_code: update.status.to_string(), message }
}
