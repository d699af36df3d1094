use chrono::Duration;
use fpg_common::Cents;
use fulfillment_engine::{
    db_types::{
        Anomaly,
        NewAnomaly,
        NewOrder,
        NewPaymentEvent,
        NewProduct,
        NewStockMovement,
        Order,
        OrderId,
        OrderItem,
        OrderState,
        PaymentEvent,
        Product,
        StockDrift,
        StockMovement,
    },
    traits::{
        CancellationReason,
        CasResult,
        CommitOutcome,
        GatewayError,
        GatewayStatusUpdate,
        GatewayTransaction,
        InsertEventResult,
        LockedOrder,
        MovementResult,
        NotificationError,
        Notifier,
        OrderManagement,
        OrderQueryFilter,
        OrderStoreError,
        PaymentGateway,
        ReconciliationStore,
        ReconciliationStoreError,
        StockLedgerError,
        StockManagement,
        TransactionRequest,
        TransitionCommit,
    },
};
use mockall::mock;

mock! {
    pub Store {}
    impl OrderManagement for Store {
        async fn create_order(&self, order: NewOrder) -> Result<Order, OrderStoreError>;
        async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError>;
        async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, OrderStoreError>;
        async fn fetch_order_for_transaction(&self, payment_id: &str) -> Result<Option<Order>, OrderStoreError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderStoreError>;
        async fn attach_payment_transaction(&self, order_id: &OrderId, payment_id: &str) -> Result<Order, OrderStoreError>;
        async fn load_for_update(&self, order_id: &OrderId) -> Result<LockedOrder, OrderStoreError>;
        async fn compare_and_swap(&self, order_id: &OrderId, expected_version: i64, new_state: OrderState) -> Result<CasResult, OrderStoreError>;
    }
    impl StockManagement for Store {
        async fn apply_movement(&self, movement: NewStockMovement) -> Result<MovementResult, StockLedgerError>;
        async fn movements_for_order(&self, order_id: &OrderId) -> Result<Vec<StockMovement>, StockLedgerError>;
        async fn product(&self, product_id: &str) -> Result<Option<Product>, StockLedgerError>;
        async fn upsert_product(&self, product: NewProduct) -> Result<Product, StockLedgerError>;
        async fn restock(&self, product_id: &str, quantity: i64) -> Result<Product, StockLedgerError>;
        async fn audit_stock(&self) -> Result<Vec<StockDrift>, StockLedgerError>;
    }
    impl ReconciliationStore for Store {
        async fn payment_event_exists(&self, transaction_id: &str, provider_status: &str) -> Result<bool, ReconciliationStoreError>;
        async fn fetch_payment_events_for_order(&self, order_id: &OrderId) -> Result<Vec<PaymentEvent>, ReconciliationStoreError>;
        async fn commit_transition(&self, commit: TransitionCommit) -> Result<CommitOutcome, ReconciliationStoreError>;
        async fn record_payment_event(&self, event: NewPaymentEvent) -> Result<InsertEventResult, ReconciliationStoreError>;
        async fn record_anomaly(&self, anomaly: NewAnomaly) -> Result<Anomaly, ReconciliationStoreError>;
        async fn fetch_anomalies(&self) -> Result<Vec<Anomaly>, ReconciliationStoreError>;
        async fn fetch_stale_orders(&self, older_than: Duration) -> Result<Vec<Order>, ReconciliationStoreError>;
    }
}

mock! {
    pub Gateway {}
    impl PaymentGateway for Gateway {
        async fn create_transaction(&self, request: TransactionRequest) -> Result<GatewayTransaction, GatewayError>;
        async fn get_transaction(&self, payment_id: &str) -> Result<GatewayTransaction, GatewayError>;
        async fn find_transactions_for_order(&self, order_id: &OrderId) -> Result<Vec<String>, GatewayError>;
        async fn capture(&self, payment_id: &str, amount: Option<Cents>) -> Result<GatewayStatusUpdate, GatewayError>;
        async fn void(&self, payment_id: &str, amount: Option<Cents>) -> Result<GatewayStatusUpdate, GatewayError>;
    }
}

mock! {
    pub Notifier {}
    impl Notifier for Notifier {
        async fn notify_confirmed(&self, order: &Order) -> Result<(), NotificationError>;
        async fn notify_cancelled(&self, order: &Order, reason: CancellationReason) -> Result<(), NotificationError>;
    }
}
