//! View bindings the form controller renders into.

use shared::domain::{FeatureName, FormSnapshot};

/// Element ids of the prediction page. Field inputs use `FeatureName::key`.
pub mod element_ids {
    pub const PREDICTION_FORM: &str = "predictionForm";
    pub const PREDICTED_CULTIVAR: &str = "predictedCultivar";
    pub const CONFIDENCE: &str = "confidence";
    pub const PROBABILITIES_CONTAINER: &str = "probabilitiesContainer";
    pub const INPUT_SUMMARY: &str = "inputSummary";
    pub const RESULTS_SECTION: &str = "resultsSection";
    pub const LOADING_SPINNER: &str = "loadingSpinner";
    pub const ERROR_MESSAGE: &str = "errorMessage";

    pub const ALL: [&str; 8] = [
        PREDICTION_FORM,
        PREDICTED_CULTIVAR,
        CONFIDENCE,
        PROBABILITIES_CONTAINER,
        INPUT_SUMMARY,
        RESULTS_SECTION,
        LOADING_SPINNER,
        ERROR_MESSAGE,
    ];
}

/// One row in the probability container. The bar starts empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityRow {
    pub label: String,
    pub value_text: String,
}

/// Final state of a probability bar. `text` is only set for non-zero values.
#[derive(Debug, Clone, PartialEq)]
pub struct BarFill {
    pub width_percent: f64,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryItem {
    pub label: String,
    pub value_text: String,
}

/// Everything the controller touches on the page. Implementations use
/// interior mutability; calls arrive from the controller and its timer tasks.
pub trait FormView: Send + Sync {
    /// Raw value of a form field; `None` when the field is absent.
    fn field_value(&self, field: FeatureName) -> Option<String>;
    fn set_field_value(&self, field: FeatureName, value: &str);

    /// Spinner visibility and form disabled state, always toggled together.
    fn set_loading(&self, loading: bool);

    fn show_error(&self, text: &str);
    fn hide_error(&self);

    fn set_predicted_cultivar(&self, text: &str);
    fn set_confidence(&self, text: &str);

    fn clear_probabilities(&self);
    fn append_probability_row(&self, row: &ProbabilityRow);
    /// `index` is the position of the row since the last clear.
    fn fill_probability_bar(&self, index: usize, fill: &BarFill);

    fn clear_input_summary(&self);
    fn append_summary_item(&self, item: &SummaryItem);

    fn set_results_visible(&self, visible: bool);
    fn scroll_results_into_view(&self);

    fn snapshot(&self) -> FormSnapshot {
        let mut snapshot = FormSnapshot::new();
        for field in FeatureName::ALL {
            snapshot.set(field, self.field_value(field));
        }
        snapshot
    }
}
