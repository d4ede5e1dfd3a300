use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub title: String,
    pub description: String,
}

/// Machine-readable classification carried by every error response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Unauthenticated,
    Conflict,
    Validation,
    Locked,
    SchemaUnavailable,
    Storage,
    Internal,
}

#[derive(Error, Debug, Clone, Serialize, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Group {0} not found")]
    GroupNotFound(String),
    #[error("Expense {0} not found")]
    ExpenseNotFound(String),
    #[error("Payment {0} not found")]
    PaymentNotFound(String),
    #[error("Period {0} not found")]
    PeriodNotFound(String),

    #[error("Missing or invalid credentials: {0}")]
    Unauthenticated(String),

    #[error("User {0} is not a group member")]
    NotGroupMember(String),
    #[error("User {0} is not a group owner or admin")]
    NotGroupAdmin(String),
    #[error("Only the debtor {0} may create or send this payment")]
    NotPaymentDebtor(String),
    #[error("Only the creditor {0} may confirm or reject this payment")]
    NotPaymentCreditor(String),

    #[error("Payment {id} cannot {action} from status {status}")]
    InvalidPaymentTransition { id: String, action: String, status: String },
    #[error("Payment {0} was modified concurrently")]
    PaymentModifiedConcurrently(String),
    #[error("Period {0} is already closed")]
    PeriodAlreadyClosed(String),
    #[error("Period {0} is already open")]
    PeriodAlreadyOpen(String),
    #[error("Duplicate row in {0}")]
    DuplicateRow(String),

    #[error("Expense {0} is locked")]
    ExpenseLocked(String),
    #[error("Date {0} falls inside closed period {1}")]
    DateInClosedPeriod(String, String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid split amounts")]
    InvalidSplit,
    #[error("User {0} is not a group member for split")]
    InvalidSplitUser(String),
    #[error("Cannot create payment to self")]
    SelfPayment,
    #[error("Invalid input for field `{0}`: {1:?}")]
    InvalidInput(String, FieldError),

    #[error("No table shape available for {entity} (tried {tried:?})")]
    SchemaUnavailable { entity: String, tried: Vec<String> },
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::GroupNotFound(_)
            | LedgerError::ExpenseNotFound(_)
            | LedgerError::PaymentNotFound(_)
            | LedgerError::PeriodNotFound(_) => ErrorKind::NotFound,
            LedgerError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            LedgerError::NotGroupMember(_)
            | LedgerError::NotGroupAdmin(_)
            | LedgerError::NotPaymentDebtor(_)
            | LedgerError::NotPaymentCreditor(_) => ErrorKind::Forbidden,
            LedgerError::InvalidPaymentTransition { .. }
            | LedgerError::PaymentModifiedConcurrently(_)
            | LedgerError::PeriodAlreadyClosed(_)
            | LedgerError::PeriodAlreadyOpen(_)
            | LedgerError::DuplicateRow(_) => ErrorKind::Conflict,
            LedgerError::ExpenseLocked(_) | LedgerError::DateInClosedPeriod(..) => ErrorKind::Locked,
            LedgerError::InvalidAmount(_)
            | LedgerError::InvalidSplit
            | LedgerError::InvalidSplitUser(_)
            | LedgerError::SelfPayment
            | LedgerError::InvalidInput(..) => ErrorKind::Validation,
            LedgerError::SchemaUnavailable { .. } => ErrorKind::SchemaUnavailable,
            LedgerError::StorageError(_) => ErrorKind::Storage,
            LedgerError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn invalid_input(field: &str, description: impl Into<String>) -> Self {
        LedgerError::InvalidInput(
            field.to_string(),
            FieldError {
                field: field.to_string(),
                title: format!("Invalid {}", field),
                description: description.into(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_is_distinct_from_not_found_and_forbidden() {
        let locked = LedgerError::ExpenseLocked("e1".into()).kind();
        assert_eq!(locked, ErrorKind::Locked);
        assert_ne!(locked, LedgerError::ExpenseNotFound("e1".into()).kind());
        assert_ne!(locked, LedgerError::NotGroupMember("u1".into()).kind());
    }

    #[test]
    fn schema_unavailable_is_not_a_storage_error() {
        let err = LedgerError::SchemaUnavailable {
            entity: "payment".into(),
            tried: vec!["payments".into()],
        };
        assert_eq!(err.kind(), ErrorKind::SchemaUnavailable);
        assert_eq!(LedgerError::StorageError("boom".into()).kind(), ErrorKind::Storage);
    }

    #[test]
    fn internal_failures_are_not_reported_as_storage() {
        let err = LedgerError::Internal("system clock before 1970".into());
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_ne!(err.kind(), ErrorKind::Storage);
        assert_eq!(serde_json::to_value(err.kind()).unwrap(), serde_json::json!("internal"));
    }

    #[test]
    fn terminal_transition_is_a_conflict() {
        let err = LedgerError::InvalidPaymentTransition {
            id: "p1".into(),
            action: "confirm".into(),
            status: "confirmed".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.to_string(), "Payment p1 cannot confirm from status confirmed");
    }
}
