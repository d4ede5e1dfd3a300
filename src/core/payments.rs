//! Payment state machine.
//!
//! `pending -> paymentSent -> confirmed | rejected`. Confirmed and rejected
//! are terminal.

use crate::core::errors::LedgerError;
use crate::core::models::payment::{Payment, PaymentAction, PaymentStatus};

/// The status `action` leads to from `current`, or `None` when the action is
/// not legal there.
pub fn next_status(current: PaymentStatus, action: PaymentAction) -> Option<PaymentStatus> {
    match (current, action) {
        (PaymentStatus::Pending, PaymentAction::Send) => Some(PaymentStatus::PaymentSent),
        (PaymentStatus::PaymentSent, PaymentAction::Confirm) => Some(PaymentStatus::Confirmed),
        (PaymentStatus::PaymentSent, PaymentAction::Reject) => Some(PaymentStatus::Rejected),
        _ => None,
    }
}

/// The only party allowed to apply `action`.
pub fn actor_for<'a>(payment: &'a Payment, action: PaymentAction) -> &'a str {
    match action {
        PaymentAction::Send => &payment.from_user_id,
        PaymentAction::Confirm | PaymentAction::Reject => &payment.to_user_id,
    }
}

/// Checks that `caller` may apply `action` to `payment` and returns the
/// target status. Illegal transitions are reported before authorization.
pub fn plan_transition(payment: &Payment, action: PaymentAction, caller: &str) -> Result<PaymentStatus, LedgerError> {
    let next = next_status(payment.status, action).ok_or_else(|| LedgerError::InvalidPaymentTransition {
        id: payment.id.clone(),
        action: action.to_string(),
        status: payment.status.to_string(),
    })?;

    let actor = actor_for(payment, action);
    if caller != actor {
        return Err(match action {
            PaymentAction::Send => LedgerError::NotPaymentDebtor(actor.to_string()),
            PaymentAction::Confirm | PaymentAction::Reject => LedgerError::NotPaymentCreditor(actor.to_string()),
        });
    }
    Ok(next)
}
