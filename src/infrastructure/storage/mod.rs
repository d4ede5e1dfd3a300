pub mod rows;
pub mod shaped;

use crate::core::errors::LedgerError;
use crate::core::models::{
    expense::{Expense, Split},
    group::{Group, Member},
    payment::{Payment, PaymentStatus},
    period::Period,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait Storage: Send + Sync {
    async fn save_group(&self, group: Group) -> Result<(), LedgerError>;
    async fn get_group(&self, group_id: &str) -> Result<Option<Group>, LedgerError>;
    async fn record_group_confirmation(&self, group_id: &str, at: DateTime<Utc>) -> Result<(), LedgerError>;

    async fn add_member(&self, member: Member) -> Result<(), LedgerError>;
    async fn remove_member(&self, group_id: &str, user_id: &str) -> Result<(), LedgerError>;
    async fn get_member(&self, group_id: &str, user_id: &str) -> Result<Option<Member>, LedgerError>;
    async fn list_members(&self, group_id: &str) -> Result<Vec<Member>, LedgerError>;

    async fn insert_expense(&self, expense: Expense) -> Result<(), LedgerError>;
    /// Writes `expense` only while the stored row is unlocked; returns
    /// `false` when no unlocked row matched.
    async fn update_unlocked_expense(&self, expense: Expense) -> Result<bool, LedgerError>;
    async fn delete_unlocked_expense(&self, expense_id: &str) -> Result<bool, LedgerError>;
    /// Unconditional removal, used to undo a half-written expense.
    async fn purge_expense(&self, expense_id: &str) -> Result<(), LedgerError>;
    async fn lock_expense(&self, expense_id: &str, reason: &str, at: DateTime<Utc>) -> Result<bool, LedgerError>;
    async fn get_expense(&self, expense_id: &str) -> Result<Option<Expense>, LedgerError>;
    async fn list_expenses(&self, group_id: &str) -> Result<Vec<Expense>, LedgerError>;

    async fn insert_split(&self, split: Split) -> Result<(), LedgerError>;
    async fn delete_splits(&self, expense_id: &str) -> Result<(), LedgerError>;
    async fn list_splits(&self, expense_ids: &[String]) -> Result<Vec<Split>, LedgerError>;

    async fn insert_payment(&self, payment: Payment) -> Result<(), LedgerError>;
    async fn get_payment(&self, payment_id: &str) -> Result<Option<Payment>, LedgerError>;
    async fn list_payments(&self, group_id: &str) -> Result<Vec<Payment>, LedgerError>;
    /// Compare-and-swap on `status`; returns `false` if the stored status was
    /// no longer `expected`.
    async fn transition_payment(
        &self,
        payment_id: &str,
        expected: PaymentStatus,
        next: PaymentStatus,
        updated_at: DateTime<Utc>,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<bool, LedgerError>;

    async fn insert_period(&self, period: Period) -> Result<(), LedgerError>;
    async fn update_period(&self, period: Period) -> Result<(), LedgerError>;
    async fn get_period(&self, period_id: &str) -> Result<Option<Period>, LedgerError>;
    async fn list_periods(&self, group_id: &str) -> Result<Vec<Period>, LedgerError>;
}
