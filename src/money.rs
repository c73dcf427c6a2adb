//! Money arithmetic using rust_decimal
//!
//! Amounts are stored as decimal strings and only ever summed or compared as
//! `Decimal`, never as floats.

use rust_decimal::prelude::*;
use thiserror::Error;

/// Rounding strategy for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Largest amount accepted from a client (one billion)
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

#[derive(Debug, Error, PartialEq)]
pub enum MoneyError {
    #[error("'{0}' is not a valid amount")]
    Invalid(String),
    #[error("{0} must not be negative")]
    Negative(&'static str),
    #[error("{0} must not exceed 1000000000")]
    TooLarge(&'static str),
    #[error("Amount is out of range")]
    Overflow,
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Render an amount for storage, always with two decimals
pub fn format_money(value: Decimal) -> String {
    format!("{:.2}", round_money(value))
}

pub fn parse_money(value: &str) -> Result<Decimal, MoneyError> {
    Decimal::from_str(value.trim()).map_err(|_| MoneyError::Invalid(value.to_string()))
}

/// Reject negative or oversized amounts for the named field
pub fn require_non_negative(value: Decimal, field: &'static str) -> Result<Decimal, MoneyError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(MoneyError::Negative(field));
    }
    if value > MAX_AMOUNT {
        return Err(MoneyError::TooLarge(field));
    }
    Ok(value)
}

/// `unit_price * quantity`, rounded to cents
pub fn line_total(unit_price: Decimal, quantity: i64) -> Result<Decimal, MoneyError> {
    unit_price
        .checked_mul(Decimal::from(quantity))
        .map(round_money)
        .ok_or(MoneyError::Overflow)
}

pub fn checked_total<I>(values: I) -> Result<Decimal, MoneyError>
where
    I: IntoIterator<Item = Decimal>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v).ok_or(MoneyError::Overflow))
}

/// Sum stored amounts. Unparseable values are an error, not zero.
pub fn sum_money<'a, I>(values: I) -> Result<Decimal, MoneyError>
where
    I: IntoIterator<Item = &'a str>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| {
            acc.checked_add(parse_money(v)?).ok_or(MoneyError::Overflow)
        })
}

/// Whole-number percentage change from `previous` to `current`; 0 when there is no baseline
pub fn pct_change(current: Decimal, previous: Decimal) -> i64 {
    if previous.is_zero() {
        return 0;
    }
    current
        .checked_sub(previous)
        .and_then(|diff| diff.checked_div(previous))
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .and_then(|pct| {
            pct.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_i64()
        })
        .unwrap_or(0)
}

pub fn money_eq(a: Decimal, b: Decimal) -> bool {
    a.checked_sub(b)
        .is_some_and(|diff| diff.abs() <= MONEY_TOLERANCE)
}
