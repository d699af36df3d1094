use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use fulfillment_engine::{events::EventNotifier, CheckoutApi, ReconciliationApi, SqliteDatabase};
use log::*;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::{create_notification_handlers, CieloGateway},
    middleware::BearerAuthMiddlewareFactory,
    routes::{
        health,
        AnomaliesRoute,
        CapturePaymentRoute,
        CheckoutRoute,
        OrderDetailsRoute,
        PaymentStatusRoute,
        PaymentWebhookRoute,
        ReconcilePaymentRoute,
        SearchOrdersRoute,
        StockAuditRoute,
        VoidPaymentRoute,
    },
    sweep_worker::start_sweep_worker,
};

pub type LiveReconciliationApi = ReconciliationApi<SqliteDatabase, CieloGateway, EventNotifier>;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = CieloGateway::new(config.cielo.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = create_notification_handlers(config.notification_url.clone())?;
    let notifier = EventNotifier::new(handlers.producers());
    handlers.start_handlers().await;
    if config.sweep_interval.is_zero() {
        info!("🧹️ The stale order sweep is disabled");
    } else {
        let api = ReconciliationApi::new(db.clone(), gateway.clone(), notifier.clone(), config.reconciliation_config());
        let _ = start_sweep_worker(Arc::new(api), config.sweep_interval, config.sweep_stale_after);
    }
    let srv = create_server_instance(config, db, gateway, notifier)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: CieloGateway,
    notifier: EventNotifier,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let reconciliation_api =
            ReconciliationApi::new(db.clone(), gateway.clone(), notifier.clone(), config.reconciliation_config());
        let checkout_api = CheckoutApi::new(db.clone(), gateway.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("fps::access_log"))
            .app_data(web::Data::new(reconciliation_api))
            .app_data(web::Data::new(checkout_api));
        // Operator routes. These all require the admin token.
        let api_scope = web::scope("/api")
            .wrap(BearerAuthMiddlewareFactory::new(config.admin_token.clone()))
            .service(OrderDetailsRoute::<SqliteDatabase, CieloGateway, EventNotifier>::new())
            .service(SearchOrdersRoute::<SqliteDatabase, CieloGateway, EventNotifier>::new())
            .service(AnomaliesRoute::<SqliteDatabase, CieloGateway, EventNotifier>::new())
            .service(StockAuditRoute::<SqliteDatabase, CieloGateway, EventNotifier>::new())
            .service(ReconcilePaymentRoute::<SqliteDatabase, CieloGateway, EventNotifier>::new())
            .service(PaymentStatusRoute::<SqliteDatabase, CieloGateway, EventNotifier>::new())
            .service(CapturePaymentRoute::<SqliteDatabase, CieloGateway, EventNotifier>::new())
            .service(VoidPaymentRoute::<SqliteDatabase, CieloGateway, EventNotifier>::new())
            .service(CheckoutRoute::<SqliteDatabase, CieloGateway>::new());
        app.service(health)
            .service(PaymentWebhookRoute::<SqliteDatabase, CieloGateway, EventNotifier>::new())
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
