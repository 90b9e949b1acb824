use std::fmt;

/// Monetary amounts are integer minor units (cents for EUR/USD): 5000 = 50.00.
/// Never binary floating point; sub-cent precision does not exist in this system.
pub type Cents = i64;

/// Format cents as a decimal string: 5000 -> "50.00", -1234 -> "-12.34".
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse a decimal string into cents. Accepts "12", "12.3" and "12.34".
/// More than two decimal places is an error, not a truncation.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };

    let (units_str, decimals_str) = match digits.split_once('.') {
        Some((u, d)) => (u, d),
        None => (digits, ""),
    };
    if decimals_str.contains('.') {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str.parse().map_err(|_| ParseCentsError::InvalidFormat)?
    };

    let decimal_cents: i64 = match decimals_str.len() {
        0 => 0,
        1 => {
            decimals_str
                .parse::<i64>()
                .map_err(|_| ParseCentsError::InvalidFormat)?
                * 10
        }
        2 => decimals_str
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?,
        _ => return Err(ParseCentsError::SubCentPrecision),
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(decimal_cents))
        .ok_or(ParseCentsError::InvalidFormat)?;

    Ok(if negative { -cents } else { cents })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
    SubCentPrecision,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
            ParseCentsError::SubCentPrecision => {
                write!(f, "amounts cannot carry more than two decimal places")
            }
        }
    }
}

impl std::error::Error for ParseCentsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(5000), "50.00");
        assert_eq!(format_cents(105), "1.05");
        assert_eq!(format_cents(1), "0.01");
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(-2550), "-25.50");
    }

    #[test]
    fn test_parse_cents() {
        assert_eq!(parse_cents("50.00"), Ok(5000));
        assert_eq!(parse_cents("50"), Ok(5000));
        assert_eq!(parse_cents("12.5"), Ok(1250));
        assert_eq!(parse_cents("0.01"), Ok(1));
        assert_eq!(parse_cents(".50"), Ok(50));
        assert_eq!(parse_cents(" 7.25 "), Ok(725));
        assert_eq!(parse_cents("-50.00"), Ok(-5000));
    }

    #[test]
    fn test_parse_cents_rejects_sub_cent_precision() {
        assert_eq!(parse_cents("100.999"), Err(ParseCentsError::SubCentPrecision));
        assert_eq!(parse_cents("0.001"), Err(ParseCentsError::SubCentPrecision));
    }

    #[test]
    fn test_parse_cents_invalid() {
        assert!(parse_cents("abc").is_err());
        assert!(parse_cents("12.34.56").is_err());
        assert!(parse_cents("12.x4").is_err());
    }
}
