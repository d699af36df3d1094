//! Data types that are stored in, or read from, the fulfilment database.
use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use fpg_common::Cents;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
/// The merchant order id. This is generated by the checkout flow and sent to the gateway as `MerchantOrderId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------      OrderState       ---------------------------------------------------------
/// The internal order state machine. See [`crate::order_state`] for the permitted transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum OrderState {
    /// Created by checkout. No gateway status has been seen yet.
    Created,
    /// The gateway has accepted the payment but it is not settled (authorized, pending, scheduled).
    Processing,
    /// Payment captured. Stock has been decremented.
    Confirmed,
    /// The gateway declined or aborted the payment.
    Denied,
    /// The payment was voided. Any decremented stock has been returned.
    Voided,
    /// The payment was refunded. Decremented stock has been returned.
    Refunded,
}

impl OrderState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Denied | Self::Voided | Self::Refunded)
    }
}

impl Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "Created",
            Self::Processing => "Processing",
            Self::Confirmed => "Confirmed",
            Self::Denied => "Denied",
            Self::Voided => "Voided",
            Self::Refunded => "Refunded",
        };
        f.write_str(s)
    }
}

impl FromStr for OrderState {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(Self::Created),
            "Processing" => Ok(Self::Processing),
            "Confirmed" => Ok(Self::Confirmed),
            "Denied" => Ok(Self::Denied),
            "Voided" => Ok(Self::Voided),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid order state: {s}"))),
        }
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub customer_id: String,
    pub total_price: Cents,
    pub currency: String,
    pub status: OrderState,
    pub payment_transaction_id: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Cents,
}

impl NewOrderItem {
    pub fn new<S: Into<String>>(product_id: S, quantity: i64, unit_price: Cents) -> Self {
        Self { product_id: product_id.into(), quantity, unit_price }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    /// The merchant order id, as generated by checkout
    pub order_id: OrderId,
    pub customer_id: String,
    pub total_price: Cents,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub items: Vec<NewOrderItem>,
}

/// Adds up quantities per product, failing on overflow.
pub fn sum_quantities<'a, I>(items: I) -> Result<BTreeMap<String, i64>, ConversionError>
where I: IntoIterator<Item = (&'a str, i64)> {
    let mut per_product = BTreeMap::<String, i64>::new();
    for (product_id, quantity) in items {
        let total = per_product.entry(product_id.to_string()).or_default();
        *total = total
            .checked_add(quantity)
            .ok_or_else(|| ConversionError(format!("Quantity of {product_id} overflows")))?;
    }
    Ok(per_product)
}

fn default_currency() -> String {
    fpg_common::DEFAULT_CURRENCY_CODE.to_string()
}

impl NewOrder {
    /// Creates a new order whose total is the sum of the line items. Totals or quantities that do not fit in an `i64`
    /// are rejected.
    pub fn new<S: Into<String>>(
        order_id: OrderId,
        customer_id: S,
        items: Vec<NewOrderItem>,
    ) -> Result<Self, ConversionError> {
        let line_totals = items
            .iter()
            .map(|i| i.unit_price.checked_mul(i.quantity))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConversionError(format!("Order {order_id}: {e}")))?;
        let total_price =
            Cents::checked_sum(line_totals).map_err(|e| ConversionError(format!("Order {order_id}: {e}")))?;
        let order = Self { order_id, customer_id: customer_id.into(), total_price, currency: default_currency(), items };
        order.quantities_by_product()?;
        Ok(order)
    }

    /// The total quantity ordered of each product.
    pub fn quantities_by_product(&self) -> Result<BTreeMap<String, i64>, ConversionError> {
        sum_quantities(self.items.iter().map(|i| (i.product_id.as_str(), i.quantity)))
    }

    pub fn with_total_price(mut self, total_price: Cents) -> Self {
        self.total_price = total_price;
        self
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into();
        self
    }
}

//--------------------------------------     PaymentEvent      ---------------------------------------------------------
/// The idempotency record for a processed gateway notification.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub id: i64,
    pub transaction_id: String,
    pub provider_status: String,
    pub order_id: OrderId,
    pub resulting_state: OrderState,
    pub payload_hash: Option<String>,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentEvent {
    pub transaction_id: String,
    pub provider_status: String,
    pub order_id: OrderId,
    pub resulting_state: OrderState,
    pub payload_hash: Option<String>,
}

//--------------------------------------     StockMovement     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum StockDirection {
    Decrement,
    Increment,
}

impl Display for StockDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decrement => f.write_str("Decrement"),
            Self::Increment => f.write_str("Increment"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum MovementReason {
    /// Stock leaving the warehouse for a confirmed order
    Sale,
    /// Stock returned because a confirmed order was refunded or voided
    Reversal,
    /// Stock added by an operator, or the opening balance of a product
    Restock,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: i64,
    pub order_id: Option<OrderId>,
    pub product_id: String,
    pub direction: StockDirection,
    pub quantity: i64,
    pub reason: MovementReason,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// The effect of this movement on the product counter.
    pub fn signed_quantity(&self) -> i64 {
        match self.direction {
            StockDirection::Decrement => -self.quantity,
            StockDirection::Increment => self.quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStockMovement {
    pub order_id: Option<OrderId>,
    pub product_id: String,
    pub direction: StockDirection,
    pub quantity: i64,
    pub reason: MovementReason,
}

impl NewStockMovement {
    pub fn sale(order_id: OrderId, product_id: String, quantity: i64) -> Self {
        Self { order_id: Some(order_id), product_id, direction: StockDirection::Decrement, quantity, reason: MovementReason::Sale }
    }

    pub fn reversal(order_id: OrderId, product_id: String, quantity: i64) -> Self {
        Self {
            order_id: Some(order_id),
            product_id,
            direction: StockDirection::Increment,
            quantity,
            reason: MovementReason::Reversal,
        }
    }

    pub fn restock(product_id: String, quantity: i64) -> Self {
        Self { order_id: None, product_id, direction: StockDirection::Increment, quantity, reason: MovementReason::Restock }
    }
}

//--------------------------------------        Product        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub name: String,
    pub stock: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub product_id: String,
    pub name: String,
    /// Opening balance. Only used when the product is first inserted.
    pub initial_stock: i64,
}

impl NewProduct {
    pub fn new<S: Into<String>, N: Into<String>>(product_id: S, name: N, initial_stock: i64) -> Self {
        Self { product_id: product_id.into(), name: name.into(), initial_stock }
    }
}

/// A product whose stock counter disagrees with the balance of its ledger.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct StockDrift {
    pub product_id: String,
    pub counter: i64,
    pub ledger_balance: i64,
}

//--------------------------------------        Anomaly        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum AnomalyKind {
    /// The gateway reported a status code the translator does not know
    UnknownStatus,
    /// The reported status would move the order along a forbidden edge of the state machine
    IllegalTransition,
    /// Confirming the order would drive a product counter below zero
    InsufficientStock,
    /// An ordered product has left the catalog since the order was placed
    MissingProduct,
    /// The order is bound to a different gateway transaction
    TransactionMismatch,
}

impl Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::UnknownStatus => "UnknownStatus",
            Self::IllegalTransition => "IllegalTransition",
            Self::InsufficientStock => "InsufficientStock",
            Self::MissingProduct => "MissingProduct",
            Self::TransactionMismatch => "TransactionMismatch",
        };
        f.write_str(s)
    }
}

impl FromStr for AnomalyKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UnknownStatus" => Ok(Self::UnknownStatus),
            "IllegalTransition" => Ok(Self::IllegalTransition),
            "InsufficientStock" => Ok(Self::InsufficientStock),
            "MissingProduct" => Ok(Self::MissingProduct),
            "TransactionMismatch" => Ok(Self::TransactionMismatch),
            s => Err(ConversionError(format!("Invalid anomaly kind: {s}"))),
        }
    }
}

/// An event that could not be applied automatically and is waiting for manual review.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: i64,
    pub order_id: Option<OrderId>,
    pub transaction_id: String,
    pub provider_status: String,
    pub kind: AnomalyKind,
    pub detail: String,
    pub occurrences: i64,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnomaly {
    pub order_id: Option<OrderId>,
    pub transaction_id: String,
    pub provider_status: String,
    pub kind: AnomalyKind,
    pub detail: String,
}
