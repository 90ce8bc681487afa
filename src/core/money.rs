//! Money helpers - Conversion between decimal amounts and ledger cents.
//!
//! Prices and payment amounts are `Decimal` at every API boundary and whole cents
//! in the ledger, so comparing a code amount with an item price is integer equality.

use crate::errors::{Error, Result};
use rust_decimal::{Decimal, prelude::ToPrimitive};

/// Builds a decimal amount from whole cents.
#[must_use]
pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Converts a strictly positive amount with at most two fractional digits to cents.
///
/// # Errors
/// Returns `Error::Validation` when the amount is zero, negative, has more than
/// two fractional digits, or does not fit the ledger column.
pub fn to_positive_cents(amount: Decimal) -> Result<i64> {
    if amount <= Decimal::ZERO {
        return Err(Error::Validation {
            reason: format!("金额必须大于0：{amount}"),
        });
    }

    if amount.normalize().scale() > 2 {
        return Err(Error::Validation {
            reason: format!("金额最多保留两位小数：{amount}"),
        });
    }

    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| cents.to_i64())
        .ok_or_else(|| Error::Validation {
            reason: format!("金额过大：{amount}"),
        })
}

/// Splits `text` into a leading `digits[.digits]` run and the remainder.
///
/// A trailing `.` without fractional digits stays in the remainder.
#[must_use]
pub fn split_leading_decimal(text: &str) -> Option<(&str, &str)> {
    let int_len = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());
    if int_len == 0 {
        return None;
    }

    let after_int = &text[int_len..];
    let frac_len = after_int
        .strip_prefix('.')
        .map(|frac| frac.find(|c: char| !c.is_ascii_digit()).unwrap_or(frac.len()))
        .filter(|&len| len > 0)
        .map_or(0, |len| len + 1);

    Some(text.split_at(int_len + frac_len))
}

/// Formats an amount with exactly two fractional digits, e.g. `50.00`.
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}
