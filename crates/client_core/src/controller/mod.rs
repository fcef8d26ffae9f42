//! Form controller: validation, request dispatch, result rendering and the
//! error banner lifecycle.
//!
//! The host forwards the form's submit event to [`FormController::submit`]
//! instead of letting the page navigate.

pub mod events;
pub mod render;
pub mod view;

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use shared::{
    domain::SAMPLE_FEATURES,
    protocol::{PredictRequest, PredictionOutcome, PredictionResult},
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, error, info};

use crate::PredictionService;
use events::{ControllerEvent, FormError, FormState, SubmitOutcome};
use view::{BarFill, FormView};

const ERROR_DISMISS_DELAY: Duration = Duration::from_secs(5);
const BAR_FILL_DELAY: Duration = Duration::from_millis(50);
const SCROLL_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerTimings {
    pub error_dismiss: Duration,
    /// Bars are appended empty and filled after this delay so hosts can animate.
    pub bar_fill: Duration,
    /// Lets the results section lay out before it is scrolled to.
    pub scroll: Duration,
}

impl Default for ControllerTimings {
    fn default() -> Self {
        Self {
            error_dismiss: ERROR_DISMISS_DELAY,
            bar_fill: BAR_FILL_DELAY,
            scroll: SCROLL_DELAY,
        }
    }
}

struct ControllerState {
    form_state: FormState,
    banner_visible: bool,
    banner_generation: u64,
    /// Latest dispatched submission whose response has not arrived yet.
    in_flight: Option<u64>,
    dismiss_task: Option<JoinHandle<()>>,
    fill_task: Option<JoinHandle<()>>,
    scroll_task: Option<JoinHandle<()>>,
}

pub struct FormController {
    service: Arc<dyn PredictionService>,
    view: Arc<dyn FormView>,
    timings: ControllerTimings,
    latest_submission: AtomicU64,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<ControllerEvent>,
}

impl FormController {
    pub fn new(service: Arc<dyn PredictionService>, view: Arc<dyn FormView>) -> Arc<Self> {
        Self::with_timings(service, view, ControllerTimings::default())
    }

    pub fn with_timings(
        service: Arc<dyn PredictionService>,
        view: Arc<dyn FormView>,
        timings: ControllerTimings,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            service,
            view,
            timings,
            latest_submission: AtomicU64::new(0),
            inner: Mutex::new(ControllerState {
                form_state: FormState::Idle,
                banner_visible: false,
                banner_generation: 0,
                in_flight: None,
                dismiss_task: None,
                fill_task: None,
                scroll_task: None,
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> FormState {
        self.inner.lock().await.form_state
    }

    /// Fills the form with demonstration values. Does not submit.
    pub fn load_sample_data(&self) {
        for (field, value) in SAMPLE_FEATURES {
            self.view.set_field_value(field, value);
        }
        info!("sample data loaded into form");
    }

    /// Runs one validate → dispatch → render cycle.
    ///
    /// Overlapping calls are allowed. Only the most recently dispatched
    /// submission may update the view; earlier ones resolve to
    /// [`SubmitOutcome::Superseded`]. A submission that fails validation
    /// while a request is outstanding returns the form to `Submitting`.
    pub async fn submit(self: &Arc<Self>) -> SubmitOutcome {
        self.set_state(FormState::Validating).await;

        let request = match PredictRequest::from_snapshot(&self.view.snapshot()) {
            Ok(request) => request,
            Err(err) => {
                debug!(field = err.field().key(), error = %err, "form validation failed");
                self.set_state(FormState::Invalid).await;
                self.show_error(FormError::validation(err.user_message()))
                    .await;
                // An earlier request still owns the form until it resolves.
                let resume = if self.inner.lock().await.in_flight.is_some() {
                    FormState::Submitting
                } else {
                    FormState::Idle
                };
                self.set_state(resume).await;
                return SubmitOutcome::Invalid;
            }
        };

        let submission = self.latest_submission.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.lock().await.in_flight = Some(submission);
        self.view.set_loading(true);
        self.hide_error().await;
        self.set_state(FormState::Submitting).await;
        info!(submission, "dispatching prediction request");

        let response = self.service.predict(&request).await;

        {
            let mut inner = self.inner.lock().await;
            if self.latest_submission.load(Ordering::SeqCst) != submission {
                debug!(submission, "dropping response of superseded submission");
                return SubmitOutcome::Superseded;
            }
            inner.in_flight = None;
        }
        self.view.set_loading(false);

        let outcome = match response {
            Ok(body) => body.into_outcome().map_err(|err| {
                error!(submission, error = %err, "prediction response was malformed");
                FormError::transport(err)
            }),
            Err(err) => {
                error!(submission, error = %err, "prediction request failed");
                Err(FormError::transport(err))
            }
        };

        match outcome {
            Ok(PredictionOutcome::Success(result)) => {
                info!(
                    submission,
                    cultivar = %result.predicted_cultivar,
                    confidence = result.confidence,
                    "prediction received"
                );
                self.render_results(&result).await;
                self.set_state(FormState::ResultsShown).await;
                let _ = self
                    .events
                    .send(ControllerEvent::ResultsRendered(result.clone()));
                SubmitOutcome::Rendered(result)
            }
            Ok(PredictionOutcome::Failure { error }) => {
                info!(submission, error = ?error, "prediction rejected by service");
                self.reject(FormError::server(error.as_deref())).await
            }
            Err(err) => self.reject(err).await,
        }
    }

    /// Shows the banner and restarts its dismissal window.
    pub async fn show_error(self: &Arc<Self>, error: FormError) {
        let mut inner = self.inner.lock().await;
        self.view.show_error(&error.banner_text());
        inner.banner_visible = true;
        inner.banner_generation += 1;

        let generation = inner.banner_generation;
        let delay = self.timings.error_dismiss;
        let controller = Arc::downgrade(self);
        replace_task(
            &mut inner.dismiss_task,
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Some(controller) = controller.upgrade() {
                    controller.dismiss_error(generation).await;
                }
            }),
        );
        drop(inner);

        let _ = self.events.send(ControllerEvent::ErrorShown(error));
    }

    pub async fn hide_error(&self) {
        let mut inner = self.inner.lock().await;
        inner.banner_generation += 1;
        if let Some(task) = inner.dismiss_task.take() {
            task.abort();
        }
        self.view.hide_error();
        if std::mem::take(&mut inner.banner_visible) {
            let _ = self.events.send(ControllerEvent::ErrorDismissed);
        }
    }

    async fn dismiss_error(&self, generation: u64) {
        let mut inner = self.inner.lock().await;
        if inner.banner_generation != generation {
            return;
        }
        inner.dismiss_task = None;
        inner.banner_visible = false;
        self.view.hide_error();
        let _ = self.events.send(ControllerEvent::ErrorDismissed);
    }

    async fn reject(self: &Arc<Self>, error: FormError) -> SubmitOutcome {
        self.set_state(FormState::Failed).await;
        self.show_error(error.clone()).await;
        self.set_state(FormState::Idle).await;
        SubmitOutcome::Rejected(error)
    }

    async fn render_results(&self, result: &PredictionResult) {
        let mut inner = self.inner.lock().await;
        if let Some(task) = inner.fill_task.take() {
            task.abort();
        }

        self.view.set_predicted_cultivar(&result.predicted_cultivar);
        self.view
            .set_confidence(&render::confidence_text(result.confidence));

        self.view.clear_probabilities();
        let mut fills: Vec<BarFill> = Vec::with_capacity(result.probabilities.len());
        for (row, fill) in render::probability_rows(&result.probabilities) {
            self.view.append_probability_row(&row);
            fills.push(fill);
        }

        self.view.clear_input_summary();
        for item in render::summary_items(&result.input_features) {
            self.view.append_summary_item(&item);
        }

        self.view.set_results_visible(true);

        let view = Arc::clone(&self.view);
        let delay = self.timings.bar_fill;
        inner.fill_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            for (index, fill) in fills.iter().enumerate() {
                view.fill_probability_bar(index, fill);
            }
        }));

        let view = Arc::clone(&self.view);
        let delay = self.timings.scroll;
        replace_task(
            &mut inner.scroll_task,
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                view.scroll_results_into_view();
            }),
        );
    }

    async fn set_state(&self, state: FormState) {
        self.inner.lock().await.form_state = state;
        let _ = self.events.send(ControllerEvent::StateChanged(state));
    }
}

impl Drop for FormController {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        for task in [
            inner.dismiss_task.take(),
            inner.fill_task.take(),
            inner.scroll_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }
}

fn replace_task(slot: &mut Option<JoinHandle<()>>, task: JoinHandle<()>) {
    if let Some(previous) = slot.replace(task) {
        previous.abort();
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
