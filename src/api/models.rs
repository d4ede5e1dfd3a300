use axum::{Json, http::StatusCode, response::IntoResponse};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::{IntoParams, ToSchema};

use crate::core::errors::{ErrorKind, LedgerError};
use crate::core::models::period::DateRange;

/// Identity the bearer token resolved to, stored in request extensions.
#[derive(Clone, Debug)]
pub struct Caller(pub String);

#[derive(Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct BalanceQuery {
    #[param(value_type = Option<String>, example = "2024-06-01")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, example = "2024-06-30")]
    pub to: Option<NaiveDate>,
}

impl BalanceQuery {
    pub fn range(&self) -> DateRange {
        DateRange {
            from: self.from,
            to: self.to,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreatePaymentRequest {
    pub from_user_id: String,
    pub to_user_id: String,
    #[schema(value_type = String, example = "30.00")]
    pub amount: Decimal,
    /// Record the payment as already sent instead of pending.
    #[serde(default)]
    pub already_sent: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct ClosePeriodRequest {
    #[schema(value_type = String, example = "2024-06-01")]
    pub date_from: NaiveDate,
    #[schema(value_type = String, example = "2024-06-30")]
    pub date_to: NaiveDate,
}

// Error response struct
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub error: String,
}

// Newtype wrapper for LedgerError to implement IntoResponse
pub struct ApiError(pub LedgerError);

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError(err)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Locked => StatusCode::LOCKED,
        ErrorKind::SchemaUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Storage | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let kind = self.0.kind();
        let status = status_for(kind);
        if status.is_server_error() {
            error!("request failed: {}", self.0);
        }
        (
            status,
            Json(ErrorResponse {
                kind,
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}
