//! Fixed-point money helpers.
//!
//! Amounts are `Decimal` everywhere. The configured scale is the number of
//! decimal places of the smallest currency unit; equal splits hand out the
//! remainder in units of that size.

use crate::core::errors::LedgerError;
use rust_decimal::Decimal;

pub const DEFAULT_MONEY_SCALE: u32 = 2;

/// Largest scale accepted for a currency minor unit.
pub const MAX_MONEY_SCALE: u32 = 8;

/// Ceiling for a single expense, share or payment: one trillion whole units.
///
/// Keeps every stored amount far enough below `Decimal::MAX` that splitting
/// and summing a group's ledger cannot overflow in practice.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0);

/// Rejects non-positive amounts, amounts above [`MAX_AMOUNT`] and amounts
/// finer than the minor unit.
pub fn validate_amount(field: &str, amount: Decimal, scale: u32) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(format!("{} must be positive, got {}", field, amount)));
    }
    ensure_ceiling(field, amount)?;
    ensure_scale(field, amount, scale)
}

pub fn ensure_ceiling(field: &str, amount: Decimal) -> Result<(), LedgerError> {
    if amount > MAX_AMOUNT {
        return Err(LedgerError::InvalidAmount(format!(
            "{} exceeds the maximum of {}: {}",
            field, MAX_AMOUNT, amount
        )));
    }
    Ok(())
}

pub fn ensure_scale(field: &str, amount: Decimal, scale: u32) -> Result<(), LedgerError> {
    if amount.normalize().scale() > scale {
        return Err(LedgerError::InvalidAmount(format!(
            "{} has more than {} decimal places: {}",
            field, scale, amount
        )));
    }
    Ok(())
}

/// Splits `amount` into `parts` shares that sum to `amount` exactly.
///
/// The first `remainder` shares receive one extra minor unit each, so
/// `100 / 3` at scale 0 yields `[34, 33, 33]`.
pub fn split_evenly(amount: Decimal, parts: usize, scale: u32) -> Result<Vec<Decimal>, LedgerError> {
    if parts == 0 {
        return Err(LedgerError::InvalidSplit);
    }
    ensure_scale("amount", amount, scale)?;
    let overflow = || LedgerError::InvalidAmount(format!("amount {} cannot be split", amount));

    let unit = Decimal::new(1, scale);
    let minor_units = amount.checked_div(unit).ok_or_else(overflow)?.trunc();
    let count = Decimal::from(parts as u64);
    let base = minor_units.checked_div(count).ok_or_else(overflow)?.trunc();
    let remainder = base
        .checked_mul(count)
        .and_then(|whole| minor_units.checked_sub(whole))
        .ok_or_else(overflow)?;

    (0..parts)
        .map(|i| {
            let extra = if Decimal::from(i as u64) < remainder {
                Decimal::ONE
            } else {
                Decimal::ZERO
            };
            base.checked_add(extra)
                .and_then(|units| units.checked_mul(unit))
                .map(|share| share.round_dp(scale))
                .ok_or_else(overflow)
        })
        .collect()
}
