use crate::core::errors::LedgerError;
use crate::core::models::{
    expense::{Share, Split, SplitRequest},
    group::Member,
};
use crate::core::money::{ensure_ceiling, ensure_scale, split_evenly};
use rust_decimal::Decimal;
use std::collections::HashSet;
use uuid::Uuid;

/// Builds the split rows for one expense.
///
/// Every participant must be a current member and appear once. Custom shares
/// must be non-negative and add up to `amount` exactly.
pub fn build_splits(
    expense_id: &str,
    amount: Decimal,
    request: &SplitRequest,
    scale: u32,
    members: &[Member],
) -> Result<Vec<Split>, LedgerError> {
    let shares: Vec<Share> = match request {
        SplitRequest::Equal { participants } => {
            let amounts = split_evenly(amount, participants.len(), scale)?;
            participants
                .iter()
                .zip(amounts)
                .map(|(user_id, amount)| Share {
                    user_id: user_id.clone(),
                    amount,
                })
                .collect()
        }
        SplitRequest::Custom { shares } => shares.clone(),
    };

    if shares.is_empty() {
        return Err(LedgerError::InvalidSplit);
    }

    let mut seen = HashSet::with_capacity(shares.len());
    for share in &shares {
        if !members.iter().any(|m| m.user_id == share.user_id) {
            return Err(LedgerError::InvalidSplitUser(share.user_id.clone()));
        }
        if !seen.insert(share.user_id.as_str()) {
            return Err(LedgerError::invalid_input(
                "split",
                format!("participant {} appears more than once", share.user_id),
            ));
        }
        if share.amount < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "share for {} is negative: {}",
                share.user_id, share.amount
            )));
        }
        ensure_ceiling("share", share.amount)?;
        ensure_scale("share", share.amount, scale)?;
    }

    let total = shares
        .iter()
        .try_fold(Decimal::ZERO, |sum, share| sum.checked_add(share.amount))
        .ok_or_else(|| LedgerError::InvalidAmount("split shares overflow".to_string()))?;
    if total != amount {
        return Err(LedgerError::InvalidSplit);
    }

    Ok(shares
        .into_iter()
        .map(|share| Split {
            id: Uuid::new_v4().to_string(),
            expense_id: expense_id.to_string(),
            user_id: share.user_id,
            amount_owed: share.amount,
        })
        .collect())
}
