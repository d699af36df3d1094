//! Shared fixtures for the integration tests: a scripted gateway, a notifier that records what it was asked to send,
//! and a freshly migrated SQLite database per test.
#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use fpg_common::{Cents, Secret};
use fulfillment_engine::{
    db_types::{NewOrder, NewOrderItem, NewProduct, Order, OrderId},
    traits::{
        CancellationReason,
        GatewayError,
        GatewayStatusUpdate,
        GatewayTransaction,
        NotificationError,
        Notifier,
        OrderManagement,
        PaymentGateway,
        StockManagement,
        TransactionRequest,
    },
    ReconciliationApi,
    ReconciliationConfig,
    SqliteDatabase,
};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub const WEBHOOK_SECRET: &str = "webhook-test-secret";

//--------------------------------------    MockGateway    -----------------------------------------------------------
/// A gateway whose answers are set up by the test.
#[derive(Clone, Default)]
pub struct MockGateway {
    transactions: Arc<Mutex<HashMap<String, GatewayTransaction>>>,
    failures: Arc<Mutex<VecDeque<GatewayError>>>,
    scripted: Arc<Mutex<HashMap<String, VecDeque<String>>>>,
    delay: Arc<Mutex<Option<Duration>>>,
    created: Arc<Mutex<u64>>,
}

impl MockGateway {
    pub fn set_status(&self, payment_id: &str, merchant_order_id: &str, status_code: &str) {
        let tx = GatewayTransaction {
            payment_id: payment_id.to_string(),
            merchant_order_id: Some(OrderId::new(merchant_order_id)),
            status_code: status_code.to_string(),
            amount: None,
        };
        self.transactions.lock().unwrap().insert(payment_id.to_string(), tx);
    }

    /// Each lookup of `payment_id` answers with the next status in `statuses`. Once they run out, the last one sticks.
    pub fn script_statuses(&self, payment_id: &str, merchant_order_id: &str, statuses: &[&str]) {
        if let Some(first) = statuses.first() {
            self.set_status(payment_id, merchant_order_id, first);
        }
        let queue = statuses.iter().map(|s| s.to_string()).collect();
        self.scripted.lock().unwrap().insert(payment_id.to_string(), queue);
    }

    pub fn status_of(&self, payment_id: &str) -> Option<String> {
        self.transactions.lock().unwrap().get(payment_id).map(|tx| tx.status_code.clone())
    }

    pub fn fail_next(&self, error: GatewayError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    fn settle(&self, payment_id: &str, status_code: &str) -> Result<GatewayStatusUpdate, GatewayError> {
        let mut transactions = self.transactions.lock().unwrap();
        let tx = transactions
            .get_mut(payment_id)
            .ok_or_else(|| GatewayError::Rejected(format!("Payment {payment_id} not found")))?;
        tx.status_code = status_code.to_string();
        let status_code = status_code.to_string();
        Ok(GatewayStatusUpdate { payment_id: payment_id.to_string(), status_code, message: None })
    }
}

impl PaymentGateway for MockGateway {
    async fn create_transaction(&self, request: TransactionRequest) -> Result<GatewayTransaction, GatewayError> {
        let n = {
            let mut created = self.created.lock().unwrap();
            *created += 1;
            *created
        };
        let payment_id = format!("pay-{}-{n}", request.order_id);
        let tx = GatewayTransaction {
            payment_id: payment_id.clone(),
            merchant_order_id: Some(request.order_id.clone()),
            status_code: "0".to_string(),
            amount: Some(request.amount),
        };
        self.transactions.lock().unwrap().insert(payment_id, tx.clone());
        Ok(tx)
    }

    async fn get_transaction(&self, payment_id: &str) -> Result<GatewayTransaction, GatewayError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.failures.lock().unwrap().pop_front();
        if let Some(e) = failure {
            return Err(e);
        }
        let next = self.scripted.lock().unwrap().get_mut(payment_id).and_then(|q| q.pop_front());
        let mut transactions = self.transactions.lock().unwrap();
        let tx = transactions
            .get_mut(payment_id)
            .ok_or_else(|| GatewayError::Rejected(format!("Payment {payment_id} not found")))?;
        if let Some(status_code) = next {
            tx.status_code = status_code;
        }
        Ok(tx.clone())
    }

    async fn find_transactions_for_order(&self, order_id: &OrderId) -> Result<Vec<String>, GatewayError> {
        let transactions = self.transactions.lock().unwrap();
        let mut ids = transactions
            .values()
            .filter(|tx| tx.merchant_order_id.as_ref() == Some(order_id))
            .map(|tx| tx.payment_id.clone())
            .collect::<Vec<_>>();
        ids.sort();
        Ok(ids)
    }

    /// Moves the payment to Confirmed (2), as Cielo does for a captured authorization.
    async fn capture(&self, payment_id: &str, _amount: Option<Cents>) -> Result<GatewayStatusUpdate, GatewayError> {
        self.settle(payment_id, "2")
    }

    /// Moves the payment to Voided (10).
    async fn void(&self, payment_id: &str, _amount: Option<Cents>) -> Result<GatewayStatusUpdate, GatewayError> {
        self.settle(payment_id, "10")
    }
}

//--------------------------------------  RecordingNotifier  ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Confirmed(OrderId),
    Cancelled(OrderId, CancellationReason),
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Sent>>>,
    broken: bool,
}

impl RecordingNotifier {
    pub fn broken() -> Self {
        Self { broken: true, ..Default::default() }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, msg: Sent) -> Result<(), NotificationError> {
        if self.broken {
            return Err(NotificationError("mail server is down".into()));
        }
        self.sent.lock().unwrap().push(msg);
        Ok(())
    }
}

impl Notifier for RecordingNotifier {
    async fn notify_confirmed(&self, order: &Order) -> Result<(), NotificationError> {
        self.record(Sent::Confirmed(order.order_id.clone()))
    }

    async fn notify_cancelled(&self, order: &Order, reason: CancellationReason) -> Result<(), NotificationError> {
        self.record(Sent::Cancelled(order.order_id.clone(), reason))
    }
}

//--------------------------------------     TestSystem     ---------------------------------------------------------
pub type TestApi = ReconciliationApi<SqliteDatabase, MockGateway, RecordingNotifier>;

pub struct TestSystem {
    pub db_url: String,
    pub db: SqliteDatabase,
    pub gateway: MockGateway,
    pub notifier: RecordingNotifier,
    pub api: Arc<TestApi>,
}

impl TestSystem {
    pub async fn new() -> Self {
        Self::with_notifier(RecordingNotifier::default()).await
    }

    pub async fn with_notifier(notifier: RecordingNotifier) -> Self {
        let config = ReconciliationConfig {
            webhook_secret: Secret::new(WEBHOOK_SECRET.to_string()),
            ..Default::default()
        };
        Self::with_config(notifier, config).await
    }

    pub async fn with_config(notifier: RecordingNotifier, config: ReconciliationConfig) -> Self {
        let db_url = random_db_url();
        let db = prepare_db(&db_url).await;
        let gateway = MockGateway::default();
        let api = Arc::new(ReconciliationApi::new(db.clone(), gateway.clone(), notifier.clone(), config));
        Self { db_url, db, gateway, notifier, api }
    }

    pub async fn add_product(&self, product_id: &str, stock: i64) {
        self.db.upsert_product(NewProduct::new(product_id, product_id, stock)).await.expect("Error adding product");
    }

    pub async fn stock_of(&self, product_id: &str) -> i64 {
        self.db.product(product_id).await.expect("Error fetching product").expect("No such product").stock
    }

    /// Creates an order for `qty` units of each product at R$10.00 apiece, and attaches `payment_id` if given.
    pub async fn add_order(&self, order_id: &str, items: &[(&str, i64)], payment_id: Option<&str>) -> Order {
        let items = items.iter().map(|(p, q)| NewOrderItem::new(*p, *q, Cents::from(1000))).collect();
        let order = NewOrder::new(OrderId::new(order_id), "alice", items).expect("Invalid order");
        let order = self.db.create_order(order).await.expect("Error creating order");
        match payment_id {
            Some(id) => self.db.attach_payment_transaction(&order.order_id, id).await.expect("Error attaching payment"),
            None => order,
        }
    }

    pub async fn order(&self, order_id: &str) -> Order {
        self.db.fetch_order(&OrderId::new(order_id)).await.expect("Error fetching order").expect("No such order")
    }

    pub async fn teardown(self) {
        let TestSystem { db_url, mut db, .. } = self;
        if let Err(e) = db.close().await {
            error!("Failed to close database: {e}");
        }
        let _ = Sqlite::drop_database(&db_url).await;
    }
}

pub fn webhook_body(payment_id: &str) -> Vec<u8> {
    format!(r#"{{"PaymentId":"{payment_id}","ChangeType":1}}"#).into_bytes()
}

pub fn auth_header() -> String {
    format!("Bearer {WEBHOOK_SECRET}")
}

pub fn random_db_url() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/fpg_it_{}.db", dir.display(), rand::random::<u64>())
}

pub async fn prepare_db(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    if Sqlite::database_exists(url).await.unwrap_or(false) {
        Sqlite::drop_database(url).await.expect("Error dropping old database");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error connecting to database");
    db.run_migrations().await.expect("Error running migrations");
    db
}
