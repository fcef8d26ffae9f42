//! Text formatting for the results panel.

use shared::{domain::FeatureName, protocol::Distribution};

use super::view::{BarFill, ProbabilityRow, SummaryItem};

// Enough fractional digits to print any f64 without rounding.
const EXACT_DIGITS: usize = 1074;

/// Fixed-point formatting of the exact binary value, ties rounding away from zero.
pub fn to_fixed(value: f64, digits: usize) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    let exact = format!("{:.*}", EXACT_DIGITS, value.abs());
    let (int_part, frac_part) = exact.split_once('.').unwrap_or((exact.as_str(), ""));
    let mut kept: Vec<u8> = int_part
        .bytes()
        .chain(frac_part.bytes().take(digits))
        .map(|b| b - b'0')
        .collect();

    if frac_part.as_bytes().get(digits).is_some_and(|&b| b >= b'5') {
        let mut carry = true;
        for digit in kept.iter_mut().rev() {
            if *digit == 9 {
                *digit = 0;
            } else {
                *digit += 1;
                carry = false;
                break;
            }
        }
        if carry {
            kept.insert(0, 1);
        }
    }

    let int_len = kept.len() - digits;
    let mut out = String::with_capacity(kept.len() + 2);
    if value < 0.0 {
        out.push('-');
    }
    for (i, digit) in kept.iter().enumerate() {
        if i == int_len {
            out.push('.');
        }
        out.push(char::from(b'0' + digit));
    }
    out
}

pub fn confidence_text(confidence: f64) -> String {
    format!("Confidence: {}%", to_fixed(confidence, 2))
}

pub fn percent_text(value: f64) -> String {
    format!("{}%", to_fixed(value, 1))
}

/// Rows in received order, each paired with the fill applied once the bar animates.
pub fn probability_rows(probabilities: &Distribution) -> Vec<(ProbabilityRow, BarFill)> {
    probabilities
        .iter()
        .map(|(label, value)| {
            let row = ProbabilityRow {
                label: label.to_string(),
                value_text: percent_text(value),
            };
            let fill = BarFill {
                width_percent: value,
                text: (value > 0.0).then(|| percent_text(value)),
            };
            (row, fill)
        })
        .collect()
}

pub fn summary_items(features: &Distribution) -> Vec<SummaryItem> {
    features
        .iter()
        .map(|(key, value)| SummaryItem {
            label: FeatureName::from_key(key)
                .map(|name| name.label().to_string())
                .unwrap_or_else(|| key.to_string()),
            value_text: to_fixed(value, 3),
        })
        .collect()
}
