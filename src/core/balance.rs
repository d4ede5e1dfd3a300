//! Net position of every member of a group.

use crate::core::errors::LedgerError;
use crate::core::models::{
    expense::{Expense, Split},
    group::Member,
    payment::{Payment, PaymentStatus},
    period::DateRange,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct MemberBalance {
    pub user_id: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
}

/// Per-member balances in membership order.
///
/// Amounts owed to or by identities that have left the group are kept out of
/// `balances` and summed into `unattributed`, so `total() + unattributed` is
/// always zero.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct BalanceSheet {
    pub balances: Vec<MemberBalance>,
    #[schema(value_type = String)]
    pub unattributed: Decimal,
}

impl BalanceSheet {
    pub fn get(&self, user_id: &str) -> Option<Decimal> {
        self.balances.iter().find(|b| b.user_id == user_id).map(|b| b.amount)
    }

    pub fn total(&self) -> Decimal {
        self.balances.iter().map(|b| b.amount).sum()
    }

    pub fn is_settled(&self) -> bool {
        self.balances.iter().all(|b| b.amount.is_zero())
    }
}

/// Confirmed payments count on the day they were paid; older rows without a
/// `paid_at` fall back to their last update.
pub fn payment_date(payment: &Payment) -> chrono::NaiveDate {
    payment.paid_at.unwrap_or(payment.updated_at).date_naive()
}

pub fn calculate_balances(
    members: &[Member],
    expenses: &[Expense],
    splits: &[Split],
    payments: &[Payment],
    range: DateRange,
) -> Result<BalanceSheet, LedgerError> {
    let mut order: Vec<&str> = Vec::with_capacity(members.len());
    let mut totals: HashMap<&str, Decimal> = HashMap::with_capacity(members.len());
    for member in members {
        if totals.insert(member.user_id.as_str(), Decimal::ZERO).is_none() {
            order.push(member.user_id.as_str());
        }
    }
    let mut unattributed = Decimal::ZERO;
    let mut apply = |user_id: &str, delta: Decimal| -> Result<(), LedgerError> {
        let slot = totals.get_mut(user_id).unwrap_or(&mut unattributed);
        *slot = slot.checked_add(delta).ok_or_else(|| {
            error!("balance of {} overflowed applying {}", user_id, delta);
            LedgerError::Internal(format!("balance of {} overflowed", user_id))
        })?;
        Ok(())
    };

    let mut in_scope: HashSet<&str> = HashSet::new();
    for expense in expenses.iter().filter(|e| range.contains(e.date)) {
        apply(&expense.paid_by, expense.amount)?;
        in_scope.insert(expense.id.as_str());
    }

    for split in splits.iter().filter(|s| in_scope.contains(s.expense_id.as_str())) {
        apply(&split.user_id, -split.amount_owed)?;
    }

    for payment in payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Confirmed && range.contains(payment_date(p)))
    {
        apply(&payment.from_user_id, payment.amount)?;
        apply(&payment.to_user_id, -payment.amount)?;
    }

    let sheet = BalanceSheet {
        balances: order
            .into_iter()
            .map(|user_id| MemberBalance {
                user_id: user_id.to_string(),
                amount: totals[user_id],
            })
            .collect(),
        unattributed,
    };
    debug!("balances: {:?}, unattributed: {}", sheet.balances, sheet.unattributed);
    Ok(sheet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::group::Role;
    use chrono::{NaiveDate, TimeZone, Utc};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn member(user: &str) -> Member {
        Member {
            id: format!("m-{}", user),
            group_id: "g".into(),
            user_id: user.into(),
            role: Role::Member,
        }
    }

    fn expense(id: &str, paid_by: &str, amount: Decimal, day: u32) -> Expense {
        Expense {
            id: id.into(),
            group_id: "g".into(),
            paid_by: paid_by.into(),
            amount,
            category: "food".into(),
            description: String::new(),
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            locked: false,
            locked_reason: None,
            locked_at: None,
            created_at: Utc::now(),
        }
    }

    fn split(expense_id: &str, user: &str, amount: Decimal) -> Split {
        Split {
            id: format!("{}-{}", expense_id, user),
            expense_id: expense_id.into(),
            user_id: user.into(),
            amount_owed: amount,
        }
    }

    fn payment(from: &str, to: &str, amount: Decimal, status: PaymentStatus, day: u32) -> Payment {
        let at = Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap();
        Payment {
            id: format!("p-{}-{}", from, to),
            group_id: "g".into(),
            from_user_id: from.into(),
            to_user_id: to.into(),
            amount,
            status,
            created_at: at,
            updated_at: at,
            paid_at: (status == PaymentStatus::Confirmed).then_some(at),
        }
    }

    #[test]
    fn payer_is_credited_and_participants_debited() {
        let members = [member("a"), member("b"), member("c")];
        let expenses = [expense("e1", "a", dec!(90), 1)];
        let splits = [split("e1", "a", dec!(30)), split("e1", "b", dec!(30)), split("e1", "c", dec!(30))];
        let sheet = calculate_balances(&members, &expenses, &splits, &[], DateRange::default()).unwrap();
        assert_eq!(sheet.get("a"), Some(dec!(60)));
        assert_eq!(sheet.get("b"), Some(dec!(-30)));
        assert_eq!(sheet.get("c"), Some(dec!(-30)));
        assert_eq!(sheet.total(), Decimal::ZERO);
    }

    #[test]
    fn only_confirmed_payments_move_balances() {
        let members = [member("a"), member("b")];
        let expenses = [expense("e1", "a", dec!(20), 1)];
        let splits = [split("e1", "a", dec!(10)), split("e1", "b", dec!(10))];
        let payments = [
            payment("b", "a", dec!(4), PaymentStatus::Confirmed, 2),
            payment("b", "a", dec!(6), PaymentStatus::PaymentSent, 2),
            payment("b", "a", dec!(6), PaymentStatus::Rejected, 2),
        ];
        let sheet = calculate_balances(&members, &expenses, &splits, &payments, DateRange::default()).unwrap();
        assert_eq!(sheet.get("a"), Some(dec!(6)));
        assert_eq!(sheet.get("b"), Some(dec!(-6)));
    }

    #[test]
    fn departed_member_is_dropped_into_unattributed() {
        let members = [member("a"), member("b")];
        let expenses = [expense("e1", "a", dec!(30), 1)];
        let splits = [split("e1", "a", dec!(10)), split("e1", "b", dec!(10)), split("e1", "gone", dec!(10))];
        let sheet = calculate_balances(&members, &expenses, &splits, &[], DateRange::default()).unwrap();
        assert_eq!(sheet.balances.len(), 2);
        assert_eq!(sheet.get("gone"), None);
        assert_eq!(sheet.unattributed, dec!(-10));
        assert_eq!(sheet.total() + sheet.unattributed, Decimal::ZERO);
    }

    #[test]
    fn date_range_restricts_expenses_splits_and_payments() {
        let members = [member("a"), member("b")];
        let expenses = [expense("e1", "a", dec!(10), 1), expense("e2", "b", dec!(50), 20)];
        let splits = [
            split("e1", "a", dec!(5)),
            split("e1", "b", dec!(5)),
            split("e2", "a", dec!(25)),
            split("e2", "b", dec!(25)),
        ];
        let payments = [payment("a", "b", dec!(25), PaymentStatus::Confirmed, 21)];
        let march_first_week = DateRange::between(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
        );
        let sheet = calculate_balances(&members, &expenses, &splits, &payments, march_first_week).unwrap();
        assert_eq!(sheet.get("a"), Some(dec!(5)));
        assert_eq!(sheet.get("b"), Some(dec!(-5)));
    }

    #[test]
    fn output_follows_membership_order() {
        let members = [member("c"), member("a"), member("b")];
        let sheet = calculate_balances(&members, &[], &[], &[], DateRange::default()).unwrap();
        let order: Vec<_> = sheet.balances.iter().map(|b| b.user_id.as_str()).collect();
        assert_eq!(order, ["c", "a", "b"]);
        assert!(sheet.is_settled());
    }

    #[test]
    fn overflowing_totals_are_an_error() {
        let members = [member("a"), member("b")];
        let expenses = [expense("e1", "a", Decimal::MAX, 1), expense("e2", "a", Decimal::MAX, 2)];
        let err = calculate_balances(&members, &expenses, &[], &[], DateRange::default()).unwrap_err();
        assert!(matches!(err, LedgerError::Internal(_)));
    }

    fn ledger_strategy() -> impl Strategy<Value = (Vec<(usize, i64, Vec<usize>)>, Vec<(usize, usize, i64)>)> {
        let expenses = prop::collection::vec(
            (0usize..5, 1i64..100_000, prop::collection::vec(0usize..6, 1..5)),
            0..12,
        );
        let payments = prop::collection::vec((0usize..6, 0usize..5, 1i64..50_000), 0..8);
        (expenses, payments)
    }

    proptest! {
        #[test]
        fn prop_balances_are_zero_sum((raw_expenses, raw_payments) in ledger_strategy()) {
            // Index 5 is a departed identity that still appears in splits and payments.
            let users = ["a", "b", "c", "d", "e", "gone"];
            let members: Vec<_> = users[..5].iter().map(|u| member(u)).collect();
            let mut expenses = Vec::new();
            let mut splits = Vec::new();
            for (i, (payer, cents, participants)) in raw_expenses.into_iter().enumerate() {
                let id = format!("e{}", i);
                let amount = Decimal::new(cents, 2);
                let names: Vec<&str> = participants.iter().map(|&p| users[p]).collect();
                let shares = crate::core::money::split_evenly(amount, names.len(), 2).unwrap();
                for (j, (name, share)) in names.iter().zip(shares).enumerate() {
                    splits.push(Split {
                        id: format!("{}-{}", id, j),
                        expense_id: id.clone(),
                        user_id: name.to_string(),
                        amount_owed: share,
                    });
                }
                expenses.push(expense(&id, users[payer], amount, 1 + (i as u32 % 28)));
            }
            let payments: Vec<_> = raw_payments
                .into_iter()
                .map(|(from, to, cents)| payment(users[from], users[to], Decimal::new(cents, 2), PaymentStatus::Confirmed, 3))
                .collect();

            let sheet = calculate_balances(&members, &expenses, &splits, &payments, DateRange::default()).unwrap();
            prop_assert_eq!(sheet.total() + sheet.unattributed, Decimal::ZERO);
        }
    }
}
