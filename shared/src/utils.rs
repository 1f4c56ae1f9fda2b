// Brazilian number formatting shared by the engine (labels, tooltips) and the
// table models (parsing text cells such as "1.234,56").

pub mod brazilian_format {
    use crate::models::FormatKind;
    use anyhow::{anyhow, Result};
    use std::str::FromStr;

    pub const MISSING_PLACEHOLDER: &str = "-";
    pub const CURRENCY_PREFIX: &str = "R$ ";

    // Formats a metric value for display. Missing (None, NaN, infinite) values
    // render as the placeholder.
    pub fn format_value(value: Option<f64>, kind: FormatKind) -> String {
        let value = match value {
            Some(v) if v.is_finite() => v,
            _ => return MISSING_PLACEHOLDER.to_string(),
        };

        match kind {
            FormatKind::Integer => format_decimal(value, 0),
            FormatKind::Currency => format!("{}{}", CURRENCY_PREFIX, format_decimal(value, 2)),
            FormatKind::Percentage => format!("{}%", format_decimal(value * 100.0, 1)),
        }
    }

    // "1234567.891" with 2 decimals -> "1.234.567,89"
    pub fn format_decimal(value: f64, decimals: usize) -> String {
        let formatted = format!("{:.decimals$}", value.abs(), decimals = decimals);
        let (int_part, frac_part) = match formatted.split_once('.') {
            Some((int_part, frac_part)) => (int_part, Some(frac_part)),
            None => (formatted.as_str(), None),
        };

        let mut out = String::with_capacity(formatted.len() + int_part.len() / 3 + 1);
        // Rounding can turn a tiny negative into "0"/"0,0"; no sign in that case.
        let is_zero = formatted.bytes().all(|b| b == b'0' || b == b'.');
        if value.is_sign_negative() && !is_zero {
            out.push('-');
        }
        out.push_str(&group_thousands(int_part));
        if let Some(frac) = frac_part {
            out.push(',');
            out.push_str(frac);
        }
        out
    }

    fn group_thousands(digits: &str) -> String {
        let len = digits.len();
        let mut grouped = String::with_capacity(len + len / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (len - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }
        grouped
    }

    // Parses decimals like "1.234,56", "R$ 1.234,56" or "87,3%" (-> 0.873).
    pub fn parse_decimal(s: &str) -> Result<f64> {
        let trimmed = s.trim();
        let (body, is_percent) = match trimmed.strip_suffix('%') {
            Some(rest) => (rest.trim_end(), true),
            None => (trimmed, false),
        };
        let body = body.strip_prefix("R$").unwrap_or(body).trim();

        let normalized = body
            .replace('.', "") // Remove thousand separators
            .replace(',', "."); // Replace decimal separator

        let value = f64::from_str(&normalized)
            .map_err(|e| anyhow!("Failed to parse decimal '{}': {}", s, e))?;
        if !value.is_finite() {
            return Err(anyhow!("Failed to parse decimal '{}': not a finite number", s));
        }
        Ok(if is_percent { value / 100.0 } else { value })
    }

}
