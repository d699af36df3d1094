use std::{fmt::Debug, time::Duration};

use fpg_common::{Cents, Secret};
use log::*;
use serde::Deserialize;
use tokio::time::{timeout, timeout_at, Instant};

use crate::{
    db_types::{Anomaly, AnomalyKind, NewAnomaly, NewPaymentEvent, Order, OrderId, OrderState, StockDrift},
    fp_api::{
        errors::ReconciliationError,
        reconciliation_objects::{
            Notified,
            OrderDetails,
            PaymentAction,
            PaymentActionResult,
            PaymentStatus,
            PaymentStatusQuery,
            PermanentFailure,
            ReconciliationResult,
            SweepResult,
        },
    },
    helpers::{bearer_token, constant_time_eq, payload_hash},
    order_state::{evaluate, stock_effect, Transition},
    status_translator::translate,
    traits::{
        CancellationReason,
        CommitOutcome,
        GatewayError,
        GatewayTransaction,
        InsertEventResult,
        Notifier,
        OrderQueryFilter,
        OrderStoreError,
        PaymentGateway,
        ReconciliationStore,
        ReconciliationStoreError,
        TransitionCommit,
    },
};

pub const DEFAULT_RECONCILE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_CONFLICT_RETRIES: usize = 3;

#[derive(Debug, Clone)]
pub struct ReconciliationConfig {
    /// The shared secret the gateway presents as a bearer token
    pub webhook_secret: Secret<String>,
    /// Upper bound on the gateway round trip plus the wait for the order lock
    pub timeout: Duration,
    /// How many times a version conflict is re-evaluated before giving up
    pub max_conflict_retries: usize,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            webhook_secret: Secret::default(),
            timeout: DEFAULT_RECONCILE_TIMEOUT,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }
}

/// The only fields of a notification body we look at. Everything else the provider sends is ignored, since the
/// authoritative state is always fetched from the gateway.
#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(rename = "PaymentId", default)]
    payment_id: Option<String>,
}

/// `ReconciliationApi` reconciles gateway notifications with the local order state.
///
/// A notification is processed in these steps:
/// 1. The bearer token is checked against the webhook secret.
/// 2. The transaction is fetched from the gateway. The notification body is never trusted.
/// 3. The order is resolved and locked, and the event is checked against the idempotency records.
/// 4. The gateway status is translated and the transition validated.
/// 5. The state change, the payment event and any stock movements are committed atomically.
/// 6. The customer is notified, after the commit and outside the lock.
///
/// Every outcome is reported as a [`ReconciliationResult`]; nothing here returns an error.
pub struct ReconciliationApi<B, G, N> {
    db: B,
    gateway: G,
    notifier: N,
    config: ReconciliationConfig,
}

impl<B, G, N> Debug for ReconciliationApi<B, G, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B, G, N> ReconciliationApi<B, G, N> {
    pub fn new(db: B, gateway: G, notifier: N, config: ReconciliationConfig) -> Self {
        Self { db, gateway, notifier, config }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }
}

impl<B, G, N> ReconciliationApi<B, G, N>
where
    B: ReconciliationStore,
    G: PaymentGateway,
    N: Notifier,
{
    /// Handles a raw webhook delivery.
    pub async fn reconcile(&self, payload: &[u8], auth_header: Option<&str>) -> ReconciliationResult {
        if !self.is_authorized(auth_header) {
            warn!("🔄️ Rejected a webhook delivery with missing or invalid credentials");
            return ReconciliationResult::Unauthorized;
        }
        let payment_id = match serde_json::from_slice::<WebhookPayload>(payload) {
            Ok(WebhookPayload { payment_id: Some(id) }) if !id.trim().is_empty() => id.trim().to_string(),
            Ok(_) => {
                warn!("🔄️ Webhook payload has no PaymentId");
                return ReconciliationResult::PermanentFailure(PermanentFailure::MalformedPayload(
                    "PaymentId is missing".into(),
                ));
            },
            Err(e) => {
                warn!("🔄️ Webhook payload is not valid JSON. {e}");
                return ReconciliationResult::PermanentFailure(PermanentFailure::MalformedPayload(e.to_string()));
            },
        };
        let hash = payload_hash(payload);
        debug!("🔄️ Webhook received for payment {payment_id}");
        self.reconcile_payment(&payment_id, Some(hash)).await
    }

    /// Re-queries the gateway for one transaction and applies its current status. This is the webhook flow without
    /// authentication or payload parsing.
    pub async fn reconcile_transaction(&self, payment_id: &str) -> ReconciliationResult {
        debug!("🔄️ Reconciling payment {payment_id} on request");
        self.reconcile_payment(payment_id, None).await
    }

    /// Re-queries the gateway for every unsettled order that has not changed for `older_than`. Picks up transitions
    /// whose webhook was lost.
    pub async fn reconcile_stale_orders(&self, older_than: chrono::Duration) -> Result<SweepResult, ReconciliationError> {
        let stale = self.db.fetch_stale_orders(older_than).await?;
        let mut result = SweepResult::default();
        for order in stale {
            let Some(payment_id) = order.payment_transaction_id.as_deref() else {
                continue;
            };
            trace!("🔄️ Sweeping order {} ({payment_id})", order.order_id);
            let outcome = self.reconcile_payment(payment_id, None).await;
            debug!("🔄️ Sweep of order {}: {}", order.order_id, outcome.summary());
            result.tally(&outcome);
        }
        Ok(result)
    }

    fn is_authorized(&self, auth_header: Option<&str>) -> bool {
        let secret = self.config.webhook_secret.reveal();
        if secret.is_empty() {
            error!("🔄️ No webhook secret is configured. Every delivery will be rejected.");
            return false;
        }
        match auth_header.and_then(bearer_token) {
            Some(token) => constant_time_eq(token.as_bytes(), secret.as_bytes()),
            None => false,
        }
    }

    async fn reconcile_payment(&self, payment_id: &str, payload_hash: Option<String>) -> ReconciliationResult {
        let deadline = Instant::now() + self.config.timeout;
        let tx = match self.fetch_transaction(payment_id).await {
            Ok(tx) => tx,
            Err(result) => return result,
        };
        let order = match self.resolve_order(&tx).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                warn!(
                    "🔄️ No order matches payment {} (merchant order {:?})",
                    tx.payment_id,
                    tx.merchant_order_id.as_ref().map(|o| o.as_str())
                );
                return ReconciliationResult::PermanentFailure(PermanentFailure::UnknownOrder(tx.payment_id));
            },
            Err(e) => return storage_failure(e),
        };
        let mut round = 0;
        loop {
            round += 1;
            let result = self.try_apply(&order.order_id, &tx, payload_hash.clone(), deadline).await;
            match result {
                Attempt::Done(result) => return result,
                Attempt::Dispatch { order, from } => return self.dispatch_notification(order, from).await,
                Attempt::Conflict if round <= self.config.max_conflict_retries => {
                    debug!("🔄️ Order {} changed under us. Re-evaluating (round {round})", order.order_id);
                },
                Attempt::Conflict => {
                    warn!("🔄️ Order {} kept changing. Giving up after {round} rounds", order.order_id);
                    return ReconciliationResult::RetryLater(format!("Order {} is being updated", order.order_id));
                },
            }
        }
    }

    async fn fetch_transaction(&self, payment_id: &str) -> Result<GatewayTransaction, ReconciliationResult> {
        match timeout(self.config.timeout, self.gateway.get_transaction(payment_id)).await {
            Ok(Ok(tx)) if tx.payment_id == payment_id => Ok(tx),
            Ok(Ok(tx)) => {
                error!("🔄️ Asked the gateway for payment {payment_id}, but it returned {}", tx.payment_id);
                Err(ReconciliationResult::PermanentFailure(PermanentFailure::GatewayMalformed(format!(
                    "Expected payment {payment_id}, got {}",
                    tx.payment_id
                ))))
            },
            Ok(Err(GatewayError::Transient(e))) => {
                warn!("🔄️ Gateway unavailable while fetching payment {payment_id}. {e}");
                Err(ReconciliationResult::RetryLater(e))
            },
            Ok(Err(GatewayError::Rejected(e))) => {
                error!("🔄️ Gateway rejected the lookup of payment {payment_id}. {e}");
                Err(ReconciliationResult::PermanentFailure(PermanentFailure::GatewayRejected(e)))
            },
            Ok(Err(GatewayError::Malformed(e))) => {
                error!("🔄️ Gateway returned a malformed response for payment {payment_id}. {e}");
                Err(ReconciliationResult::PermanentFailure(PermanentFailure::GatewayMalformed(e)))
            },
            Err(_) => {
                warn!("🔄️ Timed out fetching payment {payment_id} from the gateway");
                Err(ReconciliationResult::RetryLater(format!("Timed out fetching payment {payment_id}")))
            },
        }
    }

    /// Finds the order by its attached transaction id, falling back to the gateway's merchant order id.
    async fn resolve_order(&self, tx: &GatewayTransaction) -> Result<Option<Order>, OrderStoreError> {
        if let Some(order) = self.db.fetch_order_for_transaction(&tx.payment_id).await? {
            return Ok(Some(order));
        }
        match &tx.merchant_order_id {
            Some(order_id) => self.db.fetch_order(order_id).await,
            None => Ok(None),
        }
    }

    async fn try_apply(
        &self,
        order_id: &OrderId,
        tx: &GatewayTransaction,
        payload_hash: Option<String>,
        deadline: Instant,
    ) -> Attempt {
        let locked = match timeout_at(deadline, self.db.load_for_update(order_id)).await {
            Ok(Ok(locked)) => locked,
            Ok(Err(OrderStoreError::OrderNotFound(id))) => {
                return Attempt::Done(ReconciliationResult::PermanentFailure(PermanentFailure::UnknownOrder(
                    id.to_string(),
                )))
            },
            Ok(Err(e)) => return Attempt::Done(storage_failure(e)),
            Err(_) => {
                warn!("🔄️ Timed out waiting for the lock on order {order_id}");
                return Attempt::Done(ReconciliationResult::RetryLater(format!("Order {order_id} is busy")));
            },
        };
        let order = locked.order().clone();
        match self.db.payment_event_exists(&tx.payment_id, &tx.status_code).await {
            Ok(true) => {
                info!("🔄️ Payment event [{}:{}] was already processed", tx.payment_id, tx.status_code);
                return Attempt::Done(ReconciliationResult::AlreadyProcessed { order_id: order.order_id });
            },
            Ok(false) => {},
            Err(e) => return Attempt::Done(storage_failure(e)),
        }
        if let Some(bound) = order.payment_transaction_id.as_deref() {
            if bound != tx.payment_id {
                let detail = format!("Order {} is bound to payment {bound}, not {}", order.order_id, tx.payment_id);
                return Attempt::Done(self.record_anomaly(AnomalyKind::TransactionMismatch, &order, tx, detail).await);
            }
        }
        let payment_state = translate(&tx.status_code);
        let Some(target) = payment_state.target_order_state() else {
            let detail = format!("Gateway status '{}' is not recognised", tx.status_code);
            return Attempt::Done(self.record_anomaly(AnomalyKind::UnknownStatus, &order, tx, detail).await);
        };
        trace!("🔄️ Payment {} is {payment_state}. Order {} is {}", tx.payment_id, order.order_id, order.status);
        match evaluate(order.status, target) {
            Transition::Illegal { from, to } => {
                let detail = format!("Gateway reported {payment_state}, but order cannot move from {from} to {to}");
                Attempt::Done(self.record_anomaly(AnomalyKind::IllegalTransition, &order, tx, detail).await)
            },
            Transition::Unchanged(state) => {
                let event = NewPaymentEvent {
                    transaction_id: tx.payment_id.clone(),
                    provider_status: tx.status_code.clone(),
                    order_id: order.order_id.clone(),
                    resulting_state: state,
                    payload_hash,
                };
                match self.db.record_payment_event(event).await {
                    Ok(InsertEventResult::Inserted(_)) => {
                        debug!("🔄️ Order {} is already {state}. Event recorded", order.order_id);
                        Attempt::Done(ReconciliationResult::Unchanged { order })
                    },
                    Ok(InsertEventResult::AlreadyExists) => {
                        Attempt::Done(ReconciliationResult::AlreadyProcessed { order_id: order.order_id })
                    },
                    Err(e) => Attempt::Done(storage_failure(e)),
                }
            },
            Transition::Apply { from, to } => {
                let commit = TransitionCommit {
                    order_id: order.order_id.clone(),
                    expected_version: order.version,
                    new_state: to,
                    payment_id: tx.payment_id.clone(),
                    provider_status: tx.status_code.clone(),
                    payload_hash,
                    stock_effect: stock_effect(from, to),
                };
                match self.db.commit_transition(commit).await {
                    Ok(CommitOutcome::Committed { order, movements }) => {
                        info!(
                            "🔄️ Order {} moved from {from} to {to} (v{}). {} stock movements",
                            order.order_id,
                            order.version,
                            movements.len()
                        );
                        drop(locked);
                        Attempt::Dispatch { order, from }
                    },
                    Ok(CommitOutcome::Conflict) => Attempt::Conflict,
                    Ok(CommitOutcome::DuplicateEvent) => {
                        Attempt::Done(ReconciliationResult::AlreadyProcessed { order_id: order.order_id })
                    },
                    Err(ReconciliationStoreError::InsufficientStock { product_id, requested, available }) => {
                        let detail = format!(
                            "Confirming order {} needs {requested} of {product_id}, but only {available} in stock",
                            order.order_id
                        );
                        Attempt::Done(self.record_anomaly(AnomalyKind::InsufficientStock, &order, tx, detail).await)
                    },
                    Err(ReconciliationStoreError::ProductNotFound(product_id)) => {
                        let detail =
                            format!("Confirming order {} needs {product_id}, which is not in the catalog", order.order_id);
                        Attempt::Done(self.record_anomaly(AnomalyKind::MissingProduct, &order, tx, detail).await)
                    },
                    Err(e) => Attempt::Done(storage_failure(e)),
                }
            },
        }
    }

    async fn record_anomaly(
        &self,
        kind: AnomalyKind,
        order: &Order,
        tx: &GatewayTransaction,
        detail: String,
    ) -> ReconciliationResult {
        warn!("🔄️ {kind} for payment [{}:{}]. {detail}", tx.payment_id, tx.status_code);
        let anomaly = NewAnomaly {
            order_id: Some(order.order_id.clone()),
            transaction_id: tx.payment_id.clone(),
            provider_status: tx.status_code.clone(),
            kind,
            detail,
        };
        match self.db.record_anomaly(anomaly).await {
            Ok(anomaly) => ReconciliationResult::AnomalyRecorded(anomaly),
            Err(e) => storage_failure(e),
        }
    }

    async fn dispatch_notification(&self, order: Order, from: OrderState) -> ReconciliationResult {
        let outcome = match order.status {
            OrderState::Confirmed => self.notifier.notify_confirmed(&order).await.map(|_| Notified::Confirmed),
            OrderState::Denied => self.cancelled(&order, CancellationReason::Denied).await,
            OrderState::Voided => self.cancelled(&order, CancellationReason::Voided).await,
            OrderState::Refunded => self.cancelled(&order, CancellationReason::Refunded).await,
            OrderState::Created | OrderState::Processing => Ok(Notified::NotRequired),
        };
        match outcome {
            Ok(notification) => ReconciliationResult::Committed { order, from, notification },
            Err(e) => {
                warn!("🔄️ Order {} was committed as {}, but the notification failed. {e}", order.order_id, order.status);
                ReconciliationResult::CommittedNotificationFailed { order, from, reason: e.to_string() }
            },
        }
    }

    async fn cancelled(
        &self,
        order: &Order,
        reason: CancellationReason,
    ) -> Result<Notified, crate::traits::NotificationError> {
        self.notifier.notify_cancelled(order, reason).await.map(|_| Notified::Cancelled(reason))
    }

    /// The order with its items, stock movements and processed payment events.
    pub async fn order_details(&self, order_id: &OrderId) -> Result<Option<OrderDetails>, ReconciliationError> {
        let Some(order) = self.db.fetch_order(order_id).await? else {
            return Ok(None);
        };
        let items = self.db.fetch_order_items(order_id).await?;
        let movements = self.db.movements_for_order(order_id).await?;
        let payment_events = self.db.fetch_payment_events_for_order(order_id).await?;
        Ok(Some(OrderDetails { order, items, movements, payment_events }))
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, ReconciliationError> {
        Ok(self.db.search_orders(query).await?)
    }

    pub async fn anomalies(&self) -> Result<Vec<Anomaly>, ReconciliationError> {
        Ok(self.db.fetch_anomalies().await?)
    }

    pub async fn audit_stock(&self) -> Result<Vec<StockDrift>, ReconciliationError> {
        Ok(self.db.audit_stock().await?)
    }

    /// Asks the gateway for the current status of a transaction, without changing anything locally.
    ///
    /// A merchant order id that is unknown locally, or whose order has no payment attached yet, is resolved through
    /// the gateway's merchant order lookup. The last payment it lists is used.
    pub async fn payment_status(&self, query: PaymentStatusQuery) -> Result<PaymentStatus, ReconciliationError> {
        let (payment_id, local) = match query {
            PaymentStatusQuery::ByPaymentId { payment_id } => {
                let local = self.db.fetch_order_for_transaction(&payment_id).await?;
                (payment_id, local)
            },
            PaymentStatusQuery::ByMerchantOrderId { merchant_order_id } => {
                let local = self.db.fetch_order(&merchant_order_id).await?;
                let payment_id = match local.as_ref().and_then(|o| o.payment_transaction_id.clone()) {
                    Some(payment_id) => payment_id,
                    None => {
                        debug!("🔄️ No local payment for order {merchant_order_id}. Asking the gateway");
                        self.gateway
                            .find_transactions_for_order(&merchant_order_id)
                            .await?
                            .pop()
                            .ok_or_else(|| ReconciliationError::OrderNotFound(merchant_order_id.to_string()))?
                    },
                };
                (payment_id, local)
            },
        };
        let tx = self.gateway.get_transaction(&payment_id).await?;
        let payment_state = translate(&tx.status_code);
        Ok(PaymentStatus {
            payment_id: tx.payment_id,
            merchant_order_id: tx.merchant_order_id,
            status_code: tx.status_code,
            payment_state,
            order_state: local.map(|o| o.status),
        })
    }

    /// Captures an authorized payment at the gateway. The order only moves through the reconciliation that follows.
    pub async fn capture_payment(
        &self,
        payment_id: &str,
        amount: Option<Cents>,
    ) -> Result<PaymentActionResult, ReconciliationError> {
        self.payment_action(PaymentAction::Capture, payment_id, amount).await
    }

    /// Voids a payment at the gateway. The order only moves through the reconciliation that follows.
    pub async fn void_payment(
        &self,
        payment_id: &str,
        amount: Option<Cents>,
    ) -> Result<PaymentActionResult, ReconciliationError> {
        self.payment_action(PaymentAction::Void, payment_id, amount).await
    }

    async fn payment_action(
        &self,
        action: PaymentAction,
        payment_id: &str,
        amount: Option<Cents>,
    ) -> Result<PaymentActionResult, ReconciliationError> {
        if let Some(amount) = amount.filter(|a| a.value() <= 0) {
            return Err(ReconciliationError::QueryError(format!("{action} amount must be positive, not {amount}")));
        }
        let order = self
            .db
            .fetch_order_for_transaction(payment_id)
            .await?
            .ok_or_else(|| ReconciliationError::OrderNotFound(format!("for payment {payment_id}")))?;
        info!("🔄️ {action} requested for payment {payment_id} (order {})", order.order_id);
        let update = match action {
            PaymentAction::Capture => self.gateway.capture(payment_id, amount).await,
            PaymentAction::Void => self.gateway.void(payment_id, amount).await,
        }
        .map_err(|e| {
            warn!("🔄️ {action} of payment {payment_id} failed. {e}");
            e
        })?;
        debug!("🔄️ Gateway answered {action} of {payment_id} with status {}", update.status_code);
        let reconciliation = self.reconcile_payment(payment_id, None).await;
        info!("🔄️ After {action} of {payment_id}: {}", reconciliation.summary());
        Ok(PaymentActionResult { action, update, reconciliation })
    }
}

enum Attempt {
    Done(ReconciliationResult),
    Dispatch { order: Order, from: OrderState },
    Conflict,
}

fn storage_failure<E: std::fmt::Display>(e: E) -> ReconciliationResult {
    error!("🔄️ Storage failure during reconciliation. {e}");
    ReconciliationResult::RetryLater(format!("Storage failure. {e}"))
}
