//! Terminal rendering of the prediction form.

use std::{
    collections::HashMap,
    fmt::Write as _,
    sync::{Mutex, MutexGuard},
};

use client_core::{BarFill, FormView, ProbabilityRow, SummaryItem};
use shared::domain::FeatureName;
use tokio::sync::Notify;

const BAR_WIDTH: usize = 30;

#[derive(Default)]
struct Page {
    fields: HashMap<FeatureName, String>,
    predicted_cultivar: String,
    confidence: String,
    rows: Vec<(ProbabilityRow, Option<BarFill>)>,
    summary: Vec<SummaryItem>,
    results_visible: bool,
}

#[derive(Default)]
pub struct TerminalView {
    page: Mutex<Page>,
    scrolled: Notify,
}

impl TerminalView {
    pub fn new() -> Self {
        Self::default()
    }

    fn page(&self) -> MutexGuard<'_, Page> {
        // A poisoned page only means a render panicked midway; keep drawing.
        self.page.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resolves once the results section has been scrolled to, i.e. fully laid out.
    pub async fn results_ready(&self) {
        self.scrolled.notified().await;
    }

    pub fn render_results(&self) -> String {
        let page = self.page();
        let mut out = String::new();
        if !page.results_visible {
            return out;
        }

        let _ = writeln!(out, "Predicted cultivar: {}", page.predicted_cultivar);
        let _ = writeln!(out, "{}", page.confidence);
        let _ = writeln!(out);
        let _ = writeln!(out, "Probability distribution");

        let label_width = page
            .rows
            .iter()
            .map(|(row, _)| row.label.chars().count())
            .max()
            .unwrap_or(0);
        for (row, fill) in &page.rows {
            let _ = writeln!(
                out,
                "  {:<label_width$}  {:>6}  {}",
                row.label,
                row.value_text,
                bar(fill.as_ref()),
            );
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Input summary");
        let label_width = page
            .summary
            .iter()
            .map(|item| item.label.chars().count())
            .max()
            .unwrap_or(0);
        for item in &page.summary {
            let _ = writeln!(
                out,
                "  {:<label_width$}  {:>10}",
                item.label, item.value_text
            );
        }
        out
    }
}

fn bar(fill: Option<&BarFill>) -> String {
    let width = fill.map_or(0.0, |fill| fill.width_percent).clamp(0.0, 100.0);
    let filled = ((width / 100.0) * BAR_WIDTH as f64).round() as usize;
    let mut bar = format!("[{}{}]", "█".repeat(filled), " ".repeat(BAR_WIDTH - filled));
    if let Some(text) = fill.and_then(|fill| fill.text.as_deref()) {
        bar.push(' ');
        bar.push_str(text);
    }
    bar
}

impl FormView for TerminalView {
    fn field_value(&self, field: FeatureName) -> Option<String> {
        self.page().fields.get(&field).cloned()
    }

    fn set_field_value(&self, field: FeatureName, value: &str) {
        self.page().fields.insert(field, value.to_string());
    }

    fn set_loading(&self, loading: bool) {
        if loading {
            eprintln!("⏳ Predicting...");
        }
    }

    fn show_error(&self, text: &str) {
        eprintln!("{text}");
    }

    fn hide_error(&self) {}

    fn set_predicted_cultivar(&self, text: &str) {
        self.page().predicted_cultivar = text.to_string();
    }

    fn set_confidence(&self, text: &str) {
        self.page().confidence = text.to_string();
    }

    fn clear_probabilities(&self) {
        self.page().rows.clear();
    }

    fn append_probability_row(&self, row: &ProbabilityRow) {
        self.page().rows.push((row.clone(), None));
    }

    fn fill_probability_bar(&self, index: usize, fill: &BarFill) {
        if let Some((_, slot)) = self.page().rows.get_mut(index) {
            *slot = Some(fill.clone());
        }
    }

    fn clear_input_summary(&self) {
        self.page().summary.clear();
    }

    fn append_summary_item(&self, item: &SummaryItem) {
        self.page().summary.push(item.clone());
    }

    fn set_results_visible(&self, visible: bool) {
        self.page().results_visible = visible;
    }

    fn scroll_results_into_view(&self) {
        self.scrolled.notify_one();
    }
}
