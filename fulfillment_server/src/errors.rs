use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use fulfillment_engine::{
    traits::{GatewayError, OrderStoreError},
    CheckoutError,
    ReconciliationError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Invalid query. {0}")]
    InvalidQuery(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Missing or invalid credentials")]
    Unauthorized,
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The request conflicts with existing data. {0}")]
    Conflict(String),
    #[error("The payment gateway could not complete the request. {0}")]
    GatewayFailure(String),
    #[error("The payment gateway is temporarily unavailable. {0}")]
    GatewayUnavailable(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::GatewayFailure(_) => StatusCode::BAD_GATEWAY,
            Self::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<GatewayError> for ServerError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Transient(s) => Self::GatewayUnavailable(s),
            GatewayError::Rejected(s) | GatewayError::Malformed(s) => Self::GatewayFailure(s),
        }
    }
}

impl From<ReconciliationError> for ServerError {
    fn from(e: ReconciliationError) -> Self {
        match e {
            ReconciliationError::DatabaseError(s) => Self::BackendError(s),
            ReconciliationError::GatewayError(e) => e.into(),
            ReconciliationError::OrderNotFound(s) => Self::NoRecordFound(format!("Order {s}")),
            ReconciliationError::QueryError(s) => Self::InvalidQuery(s),
        }
    }
}

impl From<CheckoutError> for ServerError {
    fn from(e: CheckoutError) -> Self {
        match e {
            CheckoutError::OrderError(e) => match e {
                OrderStoreError::DatabaseError(s) => Self::BackendError(s),
                OrderStoreError::OrderAlreadyExists(_) |
                OrderStoreError::TransactionAlreadyAttached { .. } |
                OrderStoreError::TransactionInUse(_) => Self::Conflict(e.to_string()),
                OrderStoreError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
                OrderStoreError::UnknownProducts(_) | OrderStoreError::InvalidOrder(_) => {
                    Self::InvalidRequestBody(e.to_string())
                },
            },
            CheckoutError::GatewayError(e) => e.into(),
            CheckoutError::InconsistentRequest(s) => Self::InvalidRequestBody(s),
        }
    }
}
