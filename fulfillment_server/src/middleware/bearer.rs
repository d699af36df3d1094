//! Bearer token middleware for Actix Web.
//!
//! Operator routes are protected by a single static token, configured with `FPG_ADMIN_TOKEN`. Requests must carry it
//! in an `Authorization: Bearer <token>` header. If no token is configured, every request is rejected.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorUnauthorized,
    http::header::AUTHORIZATION,
    Error,
};
use fpg_common::Secret;
use fulfillment_engine::helpers::{bearer_token, constant_time_eq};
use futures::future::LocalBoxFuture;
use log::{trace, warn};

pub struct BearerAuthMiddlewareFactory {
    token: Secret<String>,
}

impl BearerAuthMiddlewareFactory {
    pub fn new(token: Secret<String>) -> Self {
        BearerAuthMiddlewareFactory { token }
    }
}

impl<S, B> Transform<S, ServiceRequest> for BearerAuthMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = BearerAuthMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(BearerAuthMiddlewareService { token: self.token.clone(), service: Rc::new(service) }))
    }
}

pub struct BearerAuthMiddlewareService<S> {
    token: Secret<String>,
    service: Rc<S>,
}

impl<S> BearerAuthMiddlewareService<S> {
    fn is_authorized(&self, req: &ServiceRequest) -> bool {
        let expected = self.token.reveal();
        if expected.is_empty() {
            warn!("🔒️ No admin token is configured. Operator routes are closed.");
            return false;
        }
        req.headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .map(|presented| constant_time_eq(presented.as_bytes(), expected.as_bytes()))
            .unwrap_or(false)
    }
}

impl<S, B> Service<ServiceRequest> for BearerAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let authorized = self.is_authorized(&req);
        Box::pin(async move {
            if authorized {
                trace!("🔒️ Bearer token check for {} ✅️", req.path());
                service.call(req).await
            } else {
                warn!("🔒️ Missing or invalid bearer token for {}. Denying access.", req.path());
                Err(ErrorUnauthorized("Missing or invalid credentials."))
            }
        })
    }
}
