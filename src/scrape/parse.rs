//! Price-string parsing.

/// Parse a scraped price string into a number.
///
/// Strips currency symbols, thousands separators, and whitespace. A string
/// with no usable numeric content yields `0.0`, which downstream validation
/// rejects as an extraction failure.
pub fn parse_price(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    cleaned.parse::<f64>().unwrap_or(0.0)
}

/// Whether a parsed price is acceptable: finite and strictly positive.
pub fn validate_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_currency_symbols_and_separators() {
        assert_eq!(parse_price("$2,048.75"), 2048.75);
        assert_eq!(parse_price(" 2048.75 "), 2048.75);
        assert_eq!(parse_price("€1,999.10"), 1999.10);
        assert_eq!(parse_price("2,050.10 USD/oz"), 2050.10);
    }

    #[test]
    fn parses_plain_integers() {
        assert_eq!(parse_price("2048"), 2048.0);
        assert_eq!(parse_price("$1,234,567"), 1234567.0);
    }

    #[test]
    fn non_numeric_content_yields_zero() {
        assert_eq!(parse_price("N/A"), 0.0);
        assert_eq!(parse_price(""), 0.0);
        assert_eq!(parse_price("loading..."), 0.0);
    }

    #[test]
    fn zero_and_negatives_fail_validation() {
        assert!(!validate_price(0.0));
        assert!(!validate_price(-3.5));
        assert!(!validate_price(f64::NAN));
        assert!(!validate_price(f64::INFINITY));
        assert!(validate_price(2048.75));
    }

    #[test]
    fn garbage_with_stray_dots_yields_zero() {
        // Multiple decimal points cannot parse; treated as no numeric content
        assert_eq!(parse_price("1.2.3"), 0.0);
    }
}
