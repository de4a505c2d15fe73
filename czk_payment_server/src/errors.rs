use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use czk_payment_engine::{helpers::SpdError, BankSyncError, PaymentGatewayError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("Insufficient stock for product {product_id}. Requested {requested}, only {remaining} left.")]
    InsufficientStock { product_id: i64, requested: i64, remaining: i64 },
    #[error("The request conflicts with existing data. {0}")]
    Conflict(String),
    #[error("Access denied. {0}")]
    Forbidden(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::InsufficientStock { .. } => StatusCode::CONFLICT,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            Self::InsufficientStock { product_id, remaining, .. } => {
                json!({ "error": self.to_string(), "product_id": product_id, "remaining": remaining })
            },
            _ => json!({ "error": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).insert_header(ContentType::json()).body(body.to_string())
    }
}

impl From<PaymentGatewayError> for ServerError {
    fn from(e: PaymentGatewayError) -> Self {
        match e {
            PaymentGatewayError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
            PaymentGatewayError::ValidationError(_) | PaymentGatewayError::InvalidAmount(_) => {
                Self::ValidationError(e.to_string())
            },
            PaymentGatewayError::InsufficientStock { product_id, requested, remaining } => {
                Self::InsufficientStock { product_id, requested, remaining }
            },
            PaymentGatewayError::VsAlreadyTaken(_) | PaymentGatewayError::OrderNotPaid(_) => {
                Self::Conflict(e.to_string())
            },
            PaymentGatewayError::ProductNotFound(_)
            | PaymentGatewayError::OrderNotFound(_)
            | PaymentGatewayError::PaymentNotFound(_) => Self::NoRecordFound(e.to_string()),
            PaymentGatewayError::VsExhausted(_) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<SpdError> for ServerError {
    fn from(e: SpdError) -> Self {
        match e {
            SpdError::MissingIban | SpdError::InvalidIban(_) => Self::ConfigurationError(e.to_string()),
            SpdError::NegativeAmount(_) => Self::ValidationError(e.to_string()),
            SpdError::QrCode(_) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<BankSyncError> for ServerError {
    fn from(e: BankSyncError) -> Self {
        match e {
            BankSyncError::Database(e) => e.into(),
            BankSyncError::Mailbox(e) => Self::BackendError(format!("Could not read the bank mailbox. {e}")),
        }
    }
}
