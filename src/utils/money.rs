//! Money helpers
//!
//! Amounts are carried at full precision and only rounded when a figure is
//! written into a filing, e-way bill payload or report.

use bigdecimal::{BigDecimal, RoundingMode};

/// Default number of decimal places for rupee amounts
pub const MONEY_SCALE: i64 = 2;

/// Round half-up to `scale` decimal places
pub fn round_money(value: &BigDecimal, scale: i64) -> BigDecimal {
    value.with_scale_round(scale, RoundingMode::HalfUp)
}

/// `amount * rate / 100`
pub fn percent_of(amount: &BigDecimal, rate: &BigDecimal) -> BigDecimal {
    (amount * rate) / BigDecimal::from(100)
}
