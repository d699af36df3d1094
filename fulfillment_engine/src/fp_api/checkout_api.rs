use std::fmt::Debug;

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{NewOrder, Order},
    fp_api::errors::CheckoutError,
    traits::{GatewayTransaction, OrderManagement, OrderStoreError, PaymentGateway, TransactionRequest},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutResult {
    pub order: Order,
    pub transaction: GatewayTransaction,
}

/// `CheckoutApi` creates an order and opens the matching payment transaction with the gateway.
///
/// The order is stored before the gateway is contacted, so a webhook that outruns the attach step will still find its
/// order through the merchant order id.
pub struct CheckoutApi<B, G> {
    db: B,
    gateway: G,
}

impl<B, G> Debug for CheckoutApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi")
    }
}

impl<B, G> CheckoutApi<B, G>
where
    B: OrderManagement,
    G: PaymentGateway,
{
    pub fn new(db: B, gateway: G) -> Self {
        Self { db, gateway }
    }

    pub async fn submit_order(
        &self,
        order: NewOrder,
        request: TransactionRequest,
    ) -> Result<CheckoutResult, CheckoutError> {
        if request.order_id != order.order_id {
            return Err(CheckoutError::InconsistentRequest(format!(
                "Payment is for order {}, but the order is {}",
                request.order_id, order.order_id
            )));
        }
        if request.amount != order.total_price {
            return Err(CheckoutError::InconsistentRequest(format!(
                "Payment amount {} does not match the order total {}",
                request.amount, order.total_price
            )));
        }
        let order = self.db.create_order(order).await?;
        info!("💻️ Order {} created for {}. Opening payment", order.order_id, order.total_price);
        let transaction = self.gateway.create_transaction(request).await.map_err(|e| {
            warn!("💻️ Could not open a payment for order {}. {e}", order.order_id);
            e
        })?;
        let order = match self.db.attach_payment_transaction(&order.order_id, &transaction.payment_id).await {
            Ok(order) => order,
            Err(OrderStoreError::TransactionAlreadyAttached { order_id, payment_id })
                if payment_id == transaction.payment_id =>
            {
                debug!("💻️ Payment {payment_id} was attached to order {order_id} by an earlier webhook");
                self.db.fetch_order(&order_id).await?.ok_or(OrderStoreError::OrderNotFound(order_id))?
            },
            Err(e) => return Err(e.into()),
        };
        info!("💻️ Payment {} attached to order {}", transaction.payment_id, order.order_id);
        Ok(CheckoutResult { order, transaction })
    }
}
