//! Greedy debtor/creditor matching.
//!
//! Both sides are ordered once by magnitude, largest first, with ties kept in
//! membership order. Matching then walks the two lists with cursors and never
//! reorders them after a partial transfer, so a creditor that is only partly
//! paid keeps its place at the head of the list.

use crate::core::balance::MemberBalance;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Transfer {
    pub from: String,
    pub to: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
}

struct Party<'a> {
    user_id: &'a str,
    remaining: Decimal,
}

pub fn propose_transfers(balances: &[MemberBalance]) -> Vec<Transfer> {
    let mut debtors: Vec<Party> = balances
        .iter()
        .filter(|b| b.amount < Decimal::ZERO)
        .map(|b| Party {
            user_id: &b.user_id,
            remaining: -b.amount,
        })
        .collect();
    let mut creditors: Vec<Party> = balances
        .iter()
        .filter(|b| b.amount > Decimal::ZERO)
        .map(|b| Party {
            user_id: &b.user_id,
            remaining: b.amount,
        })
        .collect();

    // `sort_by` is stable, so equal amounts stay in membership order.
    debtors.sort_by(|a, b| b.remaining.cmp(&a.remaining));
    creditors.sort_by(|a, b| b.remaining.cmp(&a.remaining));

    let mut transfers = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < debtors.len() && j < creditors.len() {
        let amount = debtors[i].remaining.min(creditors[j].remaining);
        if amount > Decimal::ZERO {
            transfers.push(Transfer {
                from: debtors[i].user_id.to_string(),
                to: creditors[j].user_id.to_string(),
                amount,
            });
        }
        debtors[i].remaining -= amount;
        creditors[j].remaining -= amount;
        if debtors[i].remaining.is_zero() {
            i += 1;
        }
        if creditors[j].remaining.is_zero() {
            j += 1;
        }
    }

    debug!("proposed {} transfers for {} balances", transfers.len(), balances.len());
    transfers
}
