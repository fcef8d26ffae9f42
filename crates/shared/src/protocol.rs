use std::fmt;

use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::{
    domain::{FeatureName, FormSnapshot},
    error::{MissingField, ValidationError},
};

/// Body of `POST /predict`. Values are the raw form strings; the service
/// does its own numeric parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub alcohol: String,
    pub malic_acid: String,
    pub ash: String,
    pub total_phenols: String,
    pub flavanoids: String,
    pub color_intensity: String,
}

impl PredictRequest {
    /// Validates the snapshot and carries its raw strings through unchanged.
    pub fn from_snapshot(snapshot: &FormSnapshot) -> Result<Self, ValidationError> {
        snapshot.validate()?;
        let raw = |name: FeatureName| snapshot.get(name).unwrap_or_default().to_string();
        Ok(Self {
            alcohol: raw(FeatureName::Alcohol),
            malic_acid: raw(FeatureName::MalicAcid),
            ash: raw(FeatureName::Ash),
            total_phenols: raw(FeatureName::TotalPhenols),
            flavanoids: raw(FeatureName::Flavanoids),
            color_intensity: raw(FeatureName::ColorIntensity),
        })
    }

    pub fn get(&self, name: FeatureName) -> &str {
        match name {
            FeatureName::Alcohol => &self.alcohol,
            FeatureName::MalicAcid => &self.malic_acid,
            FeatureName::Ash => &self.ash,
            FeatureName::TotalPhenols => &self.total_phenols,
            FeatureName::Flavanoids => &self.flavanoids,
            FeatureName::ColorIntensity => &self.color_intensity,
        }
    }
}

/// Label → number mapping that keeps the order keys arrived in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Distribution(Vec<(String, f64)>);

impl Distribution {
    pub fn new(entries: Vec<(String, f64)>) -> Self {
        Self(entries)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.0.iter().map(|(label, value)| (label.as_str(), *value))
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.iter()
            .find(|(candidate, _)| *candidate == label)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Distribution {
    fn from_iter<T: IntoIterator<Item = (S, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl Serialize for Distribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, value) in &self.0 {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Distribution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DistributionVisitor;

        impl<'de> Visitor<'de> for DistributionVisitor {
            type Value = Distribution;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an object mapping labels to numbers")
            }

            fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((label, value)) = map.next_entry::<String, f64>()? {
                    // A repeated key keeps its first position and takes the last value.
                    match entries.iter_mut().find(|(existing, _)| *existing == label) {
                        Some((_, slot)) => *slot = value,
                        None => entries.push((label, value)),
                    }
                }
                Ok(Distribution(entries))
            }
        }

        deserializer.deserialize_map(DistributionVisitor)
    }
}

/// Response body of `POST /predict`, as sent on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_cultivar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_class: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<Distribution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_features: Option<Distribution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub predicted_cultivar: String,
    pub predicted_class: Option<u32>,
    pub confidence: f64,
    pub probabilities: Distribution,
    pub input_features: Distribution,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome {
    Success(PredictionResult),
    Failure { error: Option<String> },
}

impl PredictionResponse {
    pub fn success(result: PredictionResult) -> Self {
        Self {
            success: true,
            predicted_cultivar: Some(result.predicted_cultivar),
            predicted_class: result.predicted_class,
            confidence: Some(result.confidence),
            probabilities: Some(result.probabilities),
            input_features: Some(result.input_features),
            error: None,
        }
    }

    pub fn failure(error: Option<String>) -> Self {
        Self {
            success: false,
            error,
            ..Self::default()
        }
    }

    /// Branches on `success`; a success body missing a rendered field is malformed.
    pub fn into_outcome(self) -> Result<PredictionOutcome, MissingField> {
        if !self.success {
            return Ok(PredictionOutcome::Failure { error: self.error });
        }

        Ok(PredictionOutcome::Success(PredictionResult {
            predicted_cultivar: self
                .predicted_cultivar
                .ok_or(MissingField("predicted_cultivar"))?,
            predicted_class: self.predicted_class,
            confidence: self.confidence.ok_or(MissingField("confidence"))?,
            probabilities: self.probabilities.ok_or(MissingField("probabilities"))?,
            input_features: self.input_features.ok_or(MissingField("input_features"))?,
        }))
    }
}

/// Body of `GET /api/features`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturesInfo {
    pub features: Vec<String>,
    pub feature_count: usize,
    pub model_algorithm: String,
    pub model_accuracy: f64,
}

/// Body of `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
    pub scaler_loaded: bool,
}

impl HealthStatus {
    pub fn is_ready(&self) -> bool {
        self.model_loaded && self.scaler_loaded
    }
}
