//! Controller states, published events and error modeling.

use shared::protocol::PredictionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Idle,
    Validating,
    Invalid,
    Submitting,
    ResultsShown,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Server,
    Transport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormError {
    category: ErrorCategory,
    message: String,
}

impl FormError {
    pub const BANNER_PREFIX: &'static str = "❌ Error: ";

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::Validation,
            message: message.into(),
        }
    }

    pub fn server(error: Option<&str>) -> Self {
        Self {
            category: ErrorCategory::Server,
            message: format!("Prediction failed: {}", error.unwrap_or("Unknown error")),
        }
    }

    pub fn transport(description: impl std::fmt::Display) -> Self {
        Self {
            category: ErrorCategory::Transport,
            message: format!("An error occurred: {description}"),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn banner_text(&self) -> String {
        format!("{}{}", Self::BANNER_PREFIX, self.message)
    }
}

#[derive(Debug, Clone)]
pub enum ControllerEvent {
    StateChanged(FormState),
    ErrorShown(FormError),
    ErrorDismissed,
    ResultsRendered(PredictionResult),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Validation failed; nothing was sent.
    Invalid,
    Rendered(PredictionResult),
    Rejected(FormError),
    /// A later submission was dispatched before this one resolved.
    Superseded,
}
