pub mod in_memory;

use crate::core::errors::LedgerError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    ExpenseAdded {
        group_id: String,
        expense_id: String,
        paid_by: String,
        amount: Decimal,
    },
    PaymentSent {
        group_id: String,
        payment_id: String,
        from_user_id: String,
        to_user_id: String,
        amount: Decimal,
    },
    PaymentConfirmed {
        group_id: String,
        payment_id: String,
        from_user_id: String,
        to_user_id: String,
        amount: Decimal,
    },
    PaymentRejected {
        group_id: String,
        payment_id: String,
        from_user_id: String,
        to_user_id: String,
        amount: Decimal,
    },
}

impl LedgerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::ExpenseAdded { .. } => "expense_added",
            LedgerEvent::PaymentSent { .. } => "payment_sent",
            LedgerEvent::PaymentConfirmed { .. } => "payment_confirmed",
            LedgerEvent::PaymentRejected { .. } => "payment_rejected",
        }
    }
}

/// Fire-and-forget delivery of ledger events to email/push collaborators.
///
/// Callers log and drop any error; a failed dispatch never undoes the ledger
/// write that produced the event.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: LedgerEvent) -> Result<(), LedgerError>;
}
