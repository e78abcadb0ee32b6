//! Money helpers shared by the ledger and the dialogs.

use std::str::FromStr;

use rust_decimal::Decimal;

/// Formats an amount with two fractional digits, as shown to users.
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

/// Parses a user-typed amount. Accepts `,` as decimal separator and rejects
/// negative values, since balances never go below zero.
pub fn parse_amount(input: &str) -> Option<Decimal> {
    let normalized = input.trim().replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    let value = Decimal::from_str(&normalized).ok()?;
    (value >= Decimal::ZERO).then(|| value.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn formats_two_decimals() {
        assert_eq!(format_amount(dec!(10)), "10.00");
        assert_eq!(format_amount(dec!(0.14)), "0.14");
        assert_eq!(format_amount(dec!(1.5)), "1.50");
    }

    #[test]
    fn parses_user_input() {
        assert_eq!(parse_amount("12.5"), Some(dec!(12.5)));
        assert_eq!(parse_amount(" 7 "), Some(dec!(7)));
        assert_eq!(parse_amount("3,25"), Some(dec!(3.25)));
        assert_eq!(parse_amount("0"), Some(Decimal::ZERO));
    }

    #[test]
    fn rejects_garbage_and_negatives() {
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("-1"), None);
        assert_eq!(parse_amount("1.2.3"), None);
    }
}
