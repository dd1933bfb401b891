//! Money helpers using decimal arithmetic.
//!
//! Prices are carried as [`rust_decimal::Decimal`] in the store's single
//! currency. Floating point never touches an amount.

use rust_decimal::Decimal;

/// Total for `quantity` units at `unit_price`.
#[must_use]
pub fn line_total(unit_price: Decimal, quantity: u32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Format an amount for display, e.g. `$19.90`.
#[must_use]
pub fn format_price(amount: Decimal) -> String {
    format!("${:.2}", amount.round_dp(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_total_is_exact() {
        let unit = Decimal::new(1999, 2);
        assert_eq!(line_total(unit, 3), Decimal::new(5997, 2));
    }

    #[test]
    fn test_format_price_pads_cents() {
        assert_eq!(format_price(Decimal::new(199, 1)), "$19.90");
        assert_eq!(format_price(Decimal::ZERO), "$0.00");
    }
}
