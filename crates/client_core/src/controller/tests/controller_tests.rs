use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex as StdMutex, MutexGuard},
};

use async_trait::async_trait;
use shared::{
    domain::FeatureName,
    protocol::{Distribution, PredictionResponse},
};
use tokio::sync::oneshot;

use super::*;
use crate::{
    controller::{
        events::ErrorCategory,
        view::{ProbabilityRow, SummaryItem},
    },
    ClientError,
};

#[derive(Default)]
struct RecordedPage {
    fields: HashMap<FeatureName, String>,
    loading: bool,
    loading_history: Vec<bool>,
    visible_error: Option<String>,
    predicted_cultivar: String,
    confidence: String,
    rows: Vec<(ProbabilityRow, Option<BarFill>)>,
    stray_fills: usize,
    summary: Vec<SummaryItem>,
    results_visible: bool,
    scroll_count: usize,
}

impl RecordedPage {
    fn bar_widths(&self) -> Vec<f64> {
        self.rows
            .iter()
            .map(|(_, fill)| fill.as_ref().map_or(0.0, |fill| fill.width_percent))
            .collect()
    }

    fn row_labels(&self) -> Vec<&str> {
        self.rows.iter().map(|(row, _)| row.label.as_str()).collect()
    }
}

#[derive(Default)]
struct RecordingView {
    page: StdMutex<RecordedPage>,
}

impl RecordingView {
    fn with_fields(fields: &[(FeatureName, &str)]) -> Arc<Self> {
        let view = Self::default();
        for (field, value) in fields {
            view.set_field_value(*field, value);
        }
        Arc::new(view)
    }

    fn page(&self) -> MutexGuard<'_, RecordedPage> {
        self.page.lock().expect("page lock")
    }
}

impl FormView for RecordingView {
    fn field_value(&self, field: FeatureName) -> Option<String> {
        self.page().fields.get(&field).cloned()
    }

    fn set_field_value(&self, field: FeatureName, value: &str) {
        self.page().fields.insert(field, value.to_string());
    }

    fn set_loading(&self, loading: bool) {
        let mut page = self.page();
        page.loading = loading;
        page.loading_history.push(loading);
    }

    fn show_error(&self, text: &str) {
        self.page().visible_error = Some(text.to_string());
    }

    fn hide_error(&self) {
        self.page().visible_error = None;
    }

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
        let mut page = self.page();
        match page.rows.get_mut(index) {
            Some((_, slot)) => *slot = Some(fill.clone()),
            None => page.stray_fills += 1,
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
        self.page().scroll_count += 1;
    }
}

enum StubReply {
    Body(PredictionResponse),
    Fail(String),
    Gated(oneshot::Receiver<PredictionResponse>),
}

#[derive(Default)]
struct StubService {
    replies: StdMutex<VecDeque<StubReply>>,
    requests: StdMutex<Vec<PredictRequest>>,
}

impl StubService {
    fn replying(replies: impl IntoIterator<Item = StubReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: StdMutex::new(replies.into_iter().collect()),
            requests: StdMutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<PredictRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl PredictionService for StubService {
    async fn predict(&self, request: &PredictRequest) -> Result<PredictionResponse, ClientError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        let reply = self.replies.lock().expect("replies lock").pop_front();
        match reply {
            Some(StubReply::Body(body)) => Ok(body),
            Some(StubReply::Fail(reason)) => Err(ClientError::Unavailable(reason)),
            Some(StubReply::Gated(rx)) => rx
                .await
                .map_err(|_| ClientError::Unavailable("gate dropped".into())),
            None => Err(ClientError::Unavailable("no stubbed reply".into())),
        }
    }
}

const SAMPLE_FORM: [(FeatureName, &str); 6] = [
    (FeatureName::Alcohol, "13.2"),
    (FeatureName::MalicAcid, "2.8"),
    (FeatureName::Ash, "2.3"),
    (FeatureName::TotalPhenols, "2.5"),
    (FeatureName::Flavanoids, "2.3"),
    (FeatureName::ColorIntensity, "5.0"),
];

fn sample_features() -> Distribution {
    [
        ("alcohol", 13.2),
        ("malic_acid", 2.8),
        ("ash", 2.3),
        ("total_phenols", 2.5),
        ("flavanoids", 2.3),
        ("color_intensity", 5.0),
    ]
    .into_iter()
    .collect()
}

fn cultivar_b_response() -> PredictionResponse {
    PredictionResponse::success(PredictionResult {
        predicted_cultivar: "Cultivar B".into(),
        predicted_class: Some(1),
        confidence: 91.5,
        probabilities: [
            ("Cultivar A", 5.2),
            ("Cultivar B", 91.5),
            ("Cultivar C", 3.3),
        ]
        .into_iter()
        .collect(),
        input_features: sample_features(),
    })
}

fn cultivar_c_response() -> PredictionResponse {
    PredictionResponse::success(PredictionResult {
        predicted_cultivar: "Cultivar C".into(),
        predicted_class: Some(2),
        confidence: 70.0,
        probabilities: [("Cultivar C", 70.0), ("Cultivar A", 30.0)]
            .into_iter()
            .collect(),
        input_features: sample_features(),
    })
}

fn controller_for(view: &Arc<RecordingView>, service: &Arc<StubService>) -> Arc<FormController> {
    FormController::new(service.clone(), view.clone())
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

async fn wait(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    settle().await;
}

#[tokio::test(start_paused = true)]
async fn valid_form_dispatches_request_with_the_six_fields() {
    let view = RecordingView::with_fields(&SAMPLE_FORM);
    let service = StubService::replying([StubReply::Body(cultivar_b_response())]);
    let controller = controller_for(&view, &service);

    let outcome = controller.submit().await;

    assert!(matches!(outcome, SubmitOutcome::Rendered(_)));
    let requests = service.requests();
    assert_eq!(requests.len(), 1);
    let body = serde_json::to_value(&requests[0]).expect("json");
    let object = body.as_object().expect("object");
    assert_eq!(object.len(), 6);
    for (field, raw) in SAMPLE_FORM {
        assert_eq!(object[field.key()], serde_json::json!(raw));
    }
}

#[tokio::test(start_paused = true)]
async fn empty_field_shows_generic_error_and_sends_nothing() {
    let view = RecordingView::with_fields(&SAMPLE_FORM);
    view.set_field_value(FeatureName::Alcohol, "");
    let service = StubService::replying([]);
    let controller = controller_for(&view, &service);

    let outcome = controller.submit().await;

    assert_eq!(outcome, SubmitOutcome::Invalid);
    assert!(service.requests().is_empty());
    let page = view.page();
    assert_eq!(
        page.visible_error.as_deref(),
        Some("❌ Error: Please fill in all fields with valid values.")
    );
    assert!(page.loading_history.is_empty());
    assert!(!page.results_visible);
}

#[tokio::test(start_paused = true)]
async fn absent_field_fails_validation() {
    let view = RecordingView::with_fields(&SAMPLE_FORM[1..]);
    let service = StubService::replying([]);
    let controller = controller_for(&view, &service);

    assert_eq!(controller.submit().await, SubmitOutcome::Invalid);
    assert!(service.requests().is_empty());
    assert_eq!(controller.state().await, FormState::Idle);
}

#[tokio::test(start_paused = true)]
async fn numeric_prefix_passes_and_raw_text_is_sent() {
    let view = RecordingView::with_fields(&SAMPLE_FORM);
    view.set_field_value(FeatureName::Ash, "2.3 g");
    let service = StubService::replying([StubReply::Body(cultivar_b_response())]);
    let controller = controller_for(&view, &service);

    controller.submit().await;

    assert_eq!(service.requests()[0].ash, "2.3 g");
}

#[tokio::test(start_paused = true)]
async fn success_renders_confidence_and_bars_in_received_order() {
    let view = RecordingView::with_fields(&SAMPLE_FORM);
    let service = StubService::replying([StubReply::Body(cultivar_b_response())]);
    let controller = controller_for(&view, &service);

    controller.submit().await;

    {
        let page = view.page();
        assert_eq!(page.predicted_cultivar, "Cultivar B");
        assert_eq!(page.confidence, "Confidence: 91.50%");
        assert_eq!(page.row_labels(), ["Cultivar A", "Cultivar B", "Cultivar C"]);
        assert_eq!(page.bar_widths(), [0.0, 0.0, 0.0]);
        assert_eq!(page.rows[1].0.value_text, "91.5%");
        assert!(page.results_visible);
        assert_eq!(page.scroll_count, 0);
        assert_eq!(page.loading_history, [true, false]);
    }

    wait(60).await;
    {
        let page = view.page();
        assert_eq!(page.bar_widths(), [5.2, 91.5, 3.3]);
        assert_eq!(
            page.rows[2].1.as_ref().and_then(|fill| fill.text.as_deref()),
            Some("3.3%")
        );
        assert_eq!(page.scroll_count, 0);
    }

    wait(60).await;
    assert_eq!(view.page().scroll_count, 1);
}

#[tokio::test(start_paused = true)]
async fn success_echoes_inputs_with_labels() {
    let view = RecordingView::with_fields(&SAMPLE_FORM);
    let service = StubService::replying([StubReply::Body(cultivar_b_response())]);
    let controller = controller_for(&view, &service);

    controller.submit().await;

    let page = view.page();
    assert_eq!(page.summary.len(), 6);
    assert_eq!(
        page.summary[0],
        SummaryItem {
            label: "Alcohol (%)".into(),
            value_text: "13.200".into()
        }
    );
    assert_eq!(page.summary[5].label, "Color Intensity");
    assert_eq!(page.summary[5].value_text, "5.000");
}

#[tokio::test(start_paused = true)]
async fn service_failure_shows_its_message() {
    let view = RecordingView::with_fields(&SAMPLE_FORM);
    let service = StubService::replying([StubReply::Body(PredictionResponse::failure(Some(
        "model unavailable".into(),
    )))]);
    let controller = controller_for(&view, &service);

    let outcome = controller.submit().await;

    match outcome {
        SubmitOutcome::Rejected(err) => assert_eq!(err.category(), ErrorCategory::Server),
        other => panic!("unexpected outcome: {other:?}"),
    }
    let page = view.page();
    assert_eq!(
        page.visible_error.as_deref(),
        Some("❌ Error: Prediction failed: model unavailable")
    );
    assert!(!page.loading);
    assert!(!page.results_visible);
}

#[tokio::test(start_paused = true)]
async fn service_failure_without_message_uses_fallback() {
    let view = RecordingView::with_fields(&SAMPLE_FORM);
    let service = StubService::replying([StubReply::Body(PredictionResponse::failure(None))]);
    let controller = controller_for(&view, &service);

    controller.submit().await;

    assert_eq!(
        view.page().visible_error.as_deref(),
        Some("❌ Error: Prediction failed: Unknown error")
    );
}

#[tokio::test(start_paused = true)]
async fn transport_failure_reports_description_and_clears_loading() {
    let view = RecordingView::with_fields(&SAMPLE_FORM);
    let service = StubService::replying([StubReply::Fail("connection refused".into())]);
    let controller = controller_for(&view, &service);

    let outcome = controller.submit().await;

    match outcome {
        SubmitOutcome::Rejected(err) => assert_eq!(err.category(), ErrorCategory::Transport),
        other => panic!("unexpected outcome: {other:?}"),
    }
    let page = view.page();
    let banner = page.visible_error.as_deref().expect("banner visible");
    assert!(banner.starts_with("❌ Error: An error occurred: "), "{banner}");
    assert!(banner.contains("connection refused"), "{banner}");
    assert!(!page.loading);
    assert_eq!(page.loading_history, [true, false]);
}

#[tokio::test(start_paused = true)]
async fn success_body_missing_fields_is_reported_as_error() {
    let view = RecordingView::with_fields(&SAMPLE_FORM);
    let malformed = PredictionResponse {
        success: true,
        predicted_cultivar: Some("Cultivar A".into()),
        ..PredictionResponse::default()
    };
    let service = StubService::replying([StubReply::Body(malformed)]);
    let controller = controller_for(&view, &service);

    controller.submit().await;

    let page = view.page();
    assert_eq!(
        page.visible_error.as_deref(),
        Some("❌ Error: An error occurred: malformed prediction response: missing field `confidence`")
    );
    assert!(!page.results_visible);
}

#[tokio::test(start_paused = true)]
async fn error_banner_dismisses_after_five_seconds() {
    let view = RecordingView::with_fields(&[]);
    let service = StubService::replying([]);
    let controller = controller_for(&view, &service);
    let mut events = controller.subscribe_events();

    controller.submit().await;
    assert!(view.page().visible_error.is_some());

    wait(4_900).await;
    assert!(view.page().visible_error.is_some());

    wait(200).await;
    assert!(view.page().visible_error.is_none());

    let mut dismissed = false;
    while let Ok(event) = events.try_recv() {
        dismissed |= matches!(event, ControllerEvent::ErrorDismissed);
    }
    assert!(dismissed);
}

#[tokio::test(start_paused = true)]
async fn second_error_restarts_dismissal_window() {
    let view = RecordingView::with_fields(&[]);
    let service = StubService::replying([]);
    let controller = controller_for(&view, &service);

    controller.show_error(FormError::validation("first")).await;
    wait(2_000).await;
    controller.show_error(FormError::validation("second")).await;
    assert_eq!(
        view.page().visible_error.as_deref(),
        Some("❌ Error: second")
    );

    // Past the first error's deadline, inside the second's.
    wait(3_500).await;
    assert_eq!(
        view.page().visible_error.as_deref(),
        Some("❌ Error: second")
    );

    wait(1_600).await;
    assert!(view.page().visible_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn submit_hides_previous_error_before_dispatch() {
    let view = RecordingView::with_fields(&SAMPLE_FORM);
    let service = StubService::replying([StubReply::Body(cultivar_b_response())]);
    let controller = controller_for(&view, &service);

    controller.show_error(FormError::validation("stale")).await;
    wait(2_000).await;
    controller.submit().await;

    assert!(view.page().visible_error.is_none());
    // The stale banner's timer would have fired at 5s; the fresh one is due at 7s.
    controller
        .show_error(FormError::validation("fresh"))
        .await;
    wait(4_000).await;
    assert_eq!(view.page().visible_error.as_deref(), Some("❌ Error: fresh"));
}

#[tokio::test(start_paused = true)]
async fn stale_response_does_not_touch_the_view() {
    let view = RecordingView::with_fields(&SAMPLE_FORM);
    let (gate_tx, gate_rx) = oneshot::channel();
    let service = StubService::replying([
        StubReply::Gated(gate_rx),
        StubReply::Body(cultivar_c_response()),
    ]);
    let controller = controller_for(&view, &service);

    let first = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.submit().await })
    };
    settle().await;
    assert!(view.page().loading);

    let second = controller.submit().await;
    assert!(matches!(second, SubmitOutcome::Rendered(_)));

    gate_tx.send(cultivar_b_response()).expect("gate open");
    let first = first.await.expect("join");

    assert_eq!(first, SubmitOutcome::Superseded);
    assert_eq!(service.requests().len(), 2);
    let page = view.page();
    assert_eq!(page.predicted_cultivar, "Cultivar C");
    assert_eq!(page.confidence, "Confidence: 70.00%");
    assert!(!page.loading);
    assert_eq!(page.loading_history, [true, true, false]);
}

#[tokio::test(start_paused = true)]
async fn rerender_cancels_pending_bar_fill() {
    let view = RecordingView::with_fields(&SAMPLE_FORM);
    let service = StubService::replying([
        StubReply::Body(cultivar_b_response()),
        StubReply::Body(cultivar_c_response()),
    ]);
    let controller = controller_for(&view, &service);

    controller.submit().await;
    wait(20).await;
    controller.submit().await;
    wait(60).await;

    let page = view.page();
    assert_eq!(page.row_labels(), ["Cultivar C", "Cultivar A"]);
    assert_eq!(page.bar_widths(), [70.0, 30.0]);
    assert_eq!(page.stray_fills, 0);
}

#[tokio::test(start_paused = true)]
async fn sample_data_fills_form_for_a_valid_submit() {
    let view = RecordingView::with_fields(&[]);
    let service = StubService::replying([StubReply::Body(cultivar_b_response())]);
    let controller = controller_for(&view, &service);

    controller.load_sample_data();

    assert_eq!(
        view.field_value(FeatureName::ColorIntensity).as_deref(),
        Some("5")
    );
    assert!(matches!(
        controller.submit().await,
        SubmitOutcome::Rendered(_)
    ));
    assert_eq!(service.requests()[0].alcohol, "13.2");
}

#[tokio::test(start_paused = true)]
async fn publishes_state_transitions() {
    let view = RecordingView::with_fields(&SAMPLE_FORM);
    let service = StubService::replying([
        StubReply::Body(cultivar_b_response()),
        StubReply::Fail("offline".into()),
    ]);
    let controller = controller_for(&view, &service);
    let mut events = controller.subscribe_events();

    let states = |events: &mut broadcast::Receiver<ControllerEvent>| {
        let mut states = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let ControllerEvent::StateChanged(state) = event {
                states.push(state);
            }
        }
        states
    };

    controller.submit().await;
    assert_eq!(
        states(&mut events),
        [
            FormState::Validating,
            FormState::Submitting,
            FormState::ResultsShown
        ]
    );

    controller.submit().await;
    assert_eq!(
        states(&mut events),
        [
            FormState::Validating,
            FormState::Submitting,
            FormState::Failed,
            FormState::Idle
        ]
    );

    view.set_field_value(FeatureName::Flavanoids, "lots");
    controller.submit().await;
    assert_eq!(
        states(&mut events),
        [FormState::Validating, FormState::Invalid, FormState::Idle]
    );
}

#[tokio::test(start_paused = true)]
async fn invalid_submit_during_request_keeps_form_submitting() {
    let view = RecordingView::with_fields(&SAMPLE_FORM);
    let (gate_tx, gate_rx) = oneshot::channel();
    let service = StubService::replying([StubReply::Gated(gate_rx)]);
    let controller = controller_for(&view, &service);
    let mut events = controller.subscribe_events();

    let pending = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.submit().await })
    };
    settle().await;
    assert_eq!(controller.state().await, FormState::Submitting);

    view.set_field_value(FeatureName::Ash, "");
    assert_eq!(controller.submit().await, SubmitOutcome::Invalid);
    assert_eq!(controller.state().await, FormState::Submitting);
    assert!(view.page().loading);

    gate_tx.send(cultivar_b_response()).expect("gate open");
    assert!(matches!(
        pending.await.expect("join"),
        SubmitOutcome::Rendered(_)
    ));
    assert_eq!(controller.state().await, FormState::ResultsShown);

    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ControllerEvent::StateChanged(state) = event {
            states.push(state);
        }
    }
    assert_eq!(
        states,
        [
            FormState::Validating,
            FormState::Submitting,
            FormState::Validating,
            FormState::Invalid,
            FormState::Submitting,
            FormState::ResultsShown
        ]
    );

    // Once nothing is outstanding, a failed validation settles back to idle.
    assert_eq!(controller.submit().await, SubmitOutcome::Invalid);
    assert_eq!(controller.state().await, FormState::Idle);
}
