//! # Fulfilment server
//! This crate hosts the HTTP server for the fulfilment pipeline. It is responsible for:
//! * Listening for payment notifications from the gateway and handing them to the reconciliation engine.
//! * Exposing a small set of operator endpoints for inspecting orders, anomalies and stock.
//! * Running the sweep worker that re-queries the gateway for orders whose webhook never arrived.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhook/payment`: The webhook route for payment notifications.
//! * `/api/...`: Operator routes. These require the admin bearer token.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod sweep_worker;
