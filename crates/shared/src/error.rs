use thiserror::Error;

use crate::domain::FeatureName;

/// Banner text for any validation failure; the per-field detail is only logged.
pub const INVALID_INPUT_MESSAGE: &str = "Please fill in all fields with valid values.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("field `{}` is missing", .0.key())]
    Missing(FeatureName),
    #[error("field `{}` is not numeric: {raw:?}", .field.key())]
    NotNumeric { field: FeatureName, raw: String },
}

impl ValidationError {
    pub fn field(&self) -> FeatureName {
        match self {
            ValidationError::Missing(field) => *field,
            ValidationError::NotNumeric { field, .. } => *field,
        }
    }

    pub fn user_message(&self) -> &'static str {
        INVALID_INPUT_MESSAGE
    }
}

/// A success body that lacks one of the fields a success must carry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed prediction response: missing field `{0}`")]
pub struct MissingField(pub &'static str);
