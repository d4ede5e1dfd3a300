//! Period closing rules. The service applies them; everything here is pure.

use crate::core::balance::{BalanceSheet, payment_date};
use crate::core::models::{
    expense::Expense,
    payment::{Payment, PaymentStatus},
    period::{Period, PeriodStatus},
};
use chrono::NaiveDate;

pub const LOCK_REASON_CLOSED: &str = "period closed";
pub const LOCK_REASON_SETTLED: &str = "all payments settled";

/// A group is resolved once it has payments, none of them is still in
/// flight, and no member carries a balance.
pub fn is_fully_resolved(payments: &[Payment], sheet: &BalanceSheet) -> bool {
    !payments.is_empty() && payments.iter().all(|p| p.status.is_terminal()) && sheet.is_settled()
}

/// Range closed automatically when a group resolves: from the earliest
/// expense or payment date through the latest confirmed payment date.
pub fn settled_range(expenses: &[Expense], payments: &[Payment]) -> Option<(NaiveDate, NaiveDate)> {
    let paid: Vec<NaiveDate> = payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Confirmed)
        .map(payment_date)
        .collect();
    let to = paid.iter().max().copied()?;
    let from = expenses
        .iter()
        .map(|e| e.date)
        .chain(paid.iter().copied())
        .min()
        .unwrap_or(to);
    Some((from, to))
}

/// Unlocked expenses whose date falls inside `[from, to]`.
pub fn expenses_to_lock(expenses: &[Expense], from: NaiveDate, to: NaiveDate) -> Vec<&Expense> {
    expenses
        .iter()
        .filter(|e| !e.locked && e.date >= from && e.date <= to)
        .collect()
}

pub fn closed_period_covering(periods: &[Period], date: NaiveDate) -> Option<&Period> {
    periods
        .iter()
        .find(|p| p.status == PeriodStatus::Closed && p.covers(date))
}

pub fn period_with_bounds(periods: &[Period], from: NaiveDate, to: NaiveDate) -> Option<&Period> {
    periods.iter().find(|p| p.date_from == from && p.date_to == to)
}
