use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureName {
    Alcohol,
    MalicAcid,
    Ash,
    TotalPhenols,
    Flavanoids,
    ColorIntensity,
}

impl FeatureName {
    /// Form order, which is also the order of the request body.
    pub const ALL: [FeatureName; 6] = [
        FeatureName::Alcohol,
        FeatureName::MalicAcid,
        FeatureName::Ash,
        FeatureName::TotalPhenols,
        FeatureName::Flavanoids,
        FeatureName::ColorIntensity,
    ];

    /// Wire key; doubles as the form element id.
    pub fn key(self) -> &'static str {
        match self {
            FeatureName::Alcohol => "alcohol",
            FeatureName::MalicAcid => "malic_acid",
            FeatureName::Ash => "ash",
            FeatureName::TotalPhenols => "total_phenols",
            FeatureName::Flavanoids => "flavanoids",
            FeatureName::ColorIntensity => "color_intensity",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FeatureName::Alcohol => "Alcohol (%)",
            FeatureName::MalicAcid => "Malic Acid (g/dm³)",
            FeatureName::Ash => "Ash (g/dm³)",
            FeatureName::TotalPhenols => "Total Phenols (g/dm³)",
            FeatureName::Flavanoids => "Flavanoids (g/dm³)",
            FeatureName::ColorIntensity => "Color Intensity",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|name| name.key() == key)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Demonstration values for filling the form by hand.
pub const SAMPLE_FEATURES: [(FeatureName, &str); 6] = [
    (FeatureName::Alcohol, "13.2"),
    (FeatureName::MalicAcid, "2.8"),
    (FeatureName::Ash, "2.3"),
    (FeatureName::TotalPhenols, "2.5"),
    (FeatureName::Flavanoids, "2.3"),
    (FeatureName::ColorIntensity, "5"),
];

/// Raw field values as read from the form. A field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSnapshot {
    values: [Option<String>; 6],
}

impl FormSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: FeatureName, value: impl Into<String>) -> Self {
        self.set(name, Some(value.into()));
        self
    }

    pub fn set(&mut self, name: FeatureName, value: Option<String>) {
        self.values[name.index()] = value;
    }

    pub fn get(&self, name: FeatureName) -> Option<&str> {
        self.values[name.index()].as_deref()
    }

    /// Parses every field, failing on the first one that is missing or not numeric.
    pub fn validate(&self) -> Result<FeatureSet, ValidationError> {
        let mut parsed = [0.0; 6];
        for name in FeatureName::ALL {
            let raw = self.get(name).ok_or(ValidationError::Missing(name))?;
            parsed[name.index()] =
                parse_leading_float(raw).ok_or_else(|| ValidationError::NotNumeric {
                    field: name,
                    raw: raw.to_string(),
                })?;
        }
        Ok(FeatureSet { values: parsed })
    }
}

/// Parsed, immutable feature values for one submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSet {
    values: [f64; 6],
}

impl FeatureSet {
    pub fn get(&self, name: FeatureName) -> f64 {
        self.values[name.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (FeatureName, f64)> + '_ {
        FeatureName::ALL.into_iter().map(|name| (name, self.get(name)))
    }
}

/// Lenient number parsing: skips leading whitespace and reads the longest
/// numeric prefix, so `"13.2abc"` is 13.2 and `"abc"` is rejected.
pub fn parse_leading_float(raw: &str) -> Option<f64> {
    let trimmed = raw.trim_start_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
    let bytes = trimmed.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    if trimmed[end..].starts_with("Infinity") {
        return if trimmed.starts_with('-') {
            Some(f64::NEG_INFINITY)
        } else {
            Some(f64::INFINITY)
        };
    }

    let int_digits = count_digits(&bytes[end..]);
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(&bytes[end + 1..]);
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = count_digits(&bytes[exp_end..]);
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }

    trimmed[..end].parse::<f64>().ok().filter(|v| !v.is_nan())
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}
