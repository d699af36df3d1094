use actix_web::{http::StatusCode, HttpResponse};
use fulfillment_engine::reconciliation_objects::{PermanentFailure, ReconciliationResult};
use log::*;

use crate::data_objects::JsonResponse;

/// The status code the gateway should see for a reconciliation outcome. 2xx acknowledges the delivery; 401 and 503
/// ask for a redelivery; 400, 404 and 422 tell the gateway that redelivering will not help.
pub fn webhook_status(result: &ReconciliationResult) -> StatusCode {
    match result {
        ReconciliationResult::Committed { .. } |
        ReconciliationResult::CommittedNotificationFailed { .. } |
        ReconciliationResult::Unchanged { .. } |
        ReconciliationResult::AlreadyProcessed { .. } => StatusCode::OK,
        ReconciliationResult::Unauthorized => StatusCode::UNAUTHORIZED,
        ReconciliationResult::RetryLater(_) => StatusCode::SERVICE_UNAVAILABLE,
        ReconciliationResult::PermanentFailure(PermanentFailure::MalformedPayload(_)) => StatusCode::BAD_REQUEST,
        ReconciliationResult::PermanentFailure(PermanentFailure::UnknownOrder(_)) => StatusCode::NOT_FOUND,
        ReconciliationResult::PermanentFailure(_) | ReconciliationResult::AnomalyRecorded(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        },
    }
}

pub fn webhook_response(result: &ReconciliationResult) -> HttpResponse {
    let status = webhook_status(result);
    let body = if result.is_acknowledged() {
        JsonResponse::success(result.summary())
    } else {
        JsonResponse::failure(result.summary())
    };
    debug!("💻️ Webhook answered with {status}: {}", body.message);
    HttpResponse::build(status).json(body)
}
