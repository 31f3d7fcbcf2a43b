//! Canonical money encoding for the bid store.
//!
//! Amounts are fixed two-decimal money. The bid store holds them as
//! two-decimal strings ("10.00") so that both contention strategies write
//! the identical representation; JSON surfaces carry plain numbers.

use rust_decimal::Decimal;

/// Format an amount in the canonical store encoding: exactly two fraction
/// digits, no sign for zero.
pub fn format_amount(amount: Decimal) -> String {
    let mut canonical = amount.round_dp(2);
    canonical.rescale(2);
    canonical.to_string()
}

/// Parse an amount from the store encoding. An absent or empty value
/// means no bid yet, i.e. zero.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    if raw.is_empty() {
        return Some(Decimal::ZERO);
    }
    raw.parse().ok()
}
