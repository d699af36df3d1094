use std::fmt::Display;

use fpg_common::{Cents, DEFAULT_CURRENCY_CODE};
use fulfillment_engine::{
    db_types::{NewOrder, NewOrderItem, OrderId, OrderState},
    reconciliation_objects::PaymentStatusQuery,
    traits::{CustomerDetails, OrderQueryFilter, TransactionRequest},
};
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Query parameters for `GET /api/orders`. `state` may hold several comma-separated states.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderSearchParams {
    pub state: Option<String>,
    pub customer_id: Option<String>,
}

impl TryFrom<OrderSearchParams> for OrderQueryFilter {
    type Error = ServerError;

    fn try_from(params: OrderSearchParams) -> Result<Self, Self::Error> {
        let mut filter = OrderQueryFilter::default();
        if let Some(customer_id) = params.customer_id.filter(|s| !s.is_empty()) {
            filter = filter.with_customer_id(customer_id);
        }
        for state in params.state.iter().flat_map(|s| s.split(',')).map(str::trim).filter(|s| !s.is_empty()) {
            let state = state.parse::<OrderState>().map_err(|e| ServerError::InvalidQuery(e.to_string()))?;
            filter = filter.with_state(state);
        }
        Ok(filter)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentStatusParams {
    pub payment_id: Option<String>,
    pub merchant_order_id: Option<String>,
}

impl TryFrom<PaymentStatusParams> for PaymentStatusQuery {
    type Error = ServerError;

    fn try_from(params: PaymentStatusParams) -> Result<Self, Self::Error> {
        match (params.payment_id, params.merchant_order_id) {
            (Some(payment_id), None) => Ok(Self::ByPaymentId { payment_id }),
            (None, Some(id)) => Ok(Self::ByMerchantOrderId { merchant_order_id: OrderId::new(id) }),
            _ => Err(ServerError::InvalidQuery("Supply exactly one of payment_id or merchant_order_id".into())),
        }
    }
}

/// Query parameters for capture and void. Without `amount` the full authorized amount is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentActionParams {
    pub amount: Option<i64>,
}

impl PaymentActionParams {
    pub fn amount(&self) -> Option<Cents> {
        self.amount.map(Cents::from)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Cents,
}

/// The body of `POST /api/checkout`. The payment amount is always the order total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub order_id: OrderId,
    pub customer_id: String,
    pub customer: CustomerDetails,
    #[serde(default)]
    pub currency: Option<String>,
    pub items: Vec<CheckoutItem>,
    /// Gateway-specific payment method, e.g. `{"Type": "Pix"}`
    pub payment_method: serde_json::Value,
}

impl CheckoutRequest {
    /// Fails with `InvalidQuery` when the order total cannot be represented.
    pub fn into_parts(self) -> Result<(NewOrder, TransactionRequest), ServerError> {
        let items = self.items.into_iter().map(|i| NewOrderItem::new(i.product_id, i.quantity, i.unit_price)).collect();
        let currency = self.currency.unwrap_or_else(|| DEFAULT_CURRENCY_CODE.to_string());
        let order = NewOrder::new(self.order_id.clone(), self.customer_id, items)
            .map_err(|e| ServerError::InvalidQuery(e.to_string()))?
            .with_currency(currency);
        let request = TransactionRequest {
            order_id: self.order_id,
            amount: order.total_price,
            customer: self.customer,
            payment_method: self.payment_method,
        };
        Ok((order, request))
    }
}
