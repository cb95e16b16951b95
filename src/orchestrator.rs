//! Single-flight upload state machine.
//!
//! ```text
//! Idle -> Validating -> AwaitingStart -> Sending -> Completed | Failed -> Idle
//! ```
//!
//! At most one upload runs per orchestrator. The slot is claimed atomically on
//! entry to [`UploadOrchestrator::upload`] and released on every exit path, so
//! a second call while one is running returns immediately without touching
//! any hook.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::events::{EventHub, Flow, HookError, UploadEvent};
use crate::humanize::ByteSize;
use crate::observability::Metrics;
use crate::progress::{Clock, ProgressCalculator, ProgressSample, SystemClock};
use crate::selection::{FilePicker, FileSelection, PickError};
use crate::transport::{TransportResponse, Transporter, UploadRequest, UserData};
use crate::validation::{self, MimePattern, PatternError, ValidationError};

/// `encodeURIComponent` leaves these unescaped
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Idle,
    Validating,
    AwaitingStart,
    Sending,
    Completed,
    Failed,
}

/// Per-call destination override
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlParams {
    /// Use this URL instead of the configured endpoint
    Replace(String),
    /// Append these pairs to the endpoint's query string
    Query(Vec<(String, String)>),
}

impl From<&str> for UrlParams {
    fn from(url: &str) -> Self {
        UrlParams::Replace(url.to_string())
    }
}

impl From<String> for UrlParams {
    fn from(url: String) -> Self {
        UrlParams::Replace(url)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for UrlParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        UrlParams::Query(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Build the URL an upload is posted to
pub fn destination(endpoint: &str, params: Option<&UrlParams>) -> String {
    match params {
        None => endpoint.to_string(),
        Some(UrlParams::Replace(url)) => url.clone(),
        Some(UrlParams::Query(pairs)) => {
            let mut url = endpoint.to_string();
            for (key, value) in pairs {
                url.push(if url.contains('?') { '&' } else { '?' });
                url.extend(utf8_percent_encode(key, QUERY_VALUE));
                url.push('=');
                url.extend(utf8_percent_encode(value, QUERY_VALUE));
            }
            url
        }
    }
}

/// Why an upload call did not start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReady {
    InProgress,
    MissingEndpoint,
    Unsupported,
}

/// How an upload call ended. Failures have already been sent to the `error` hook.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    NotReady(NotReady),
    Rejected(ValidationError),
    Vetoed,
    Completed(TransportResponse),
    Failed(UploadError),
}

impl UploadOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, UploadOutcome::Completed(_))
    }
}

/// The in-flight upload
#[derive(Debug, Clone, Copy)]
pub struct UploadSession {
    pub id: Uuid,
    pub started_at: Instant,
}

impl UploadSession {
    fn begin(started_at: Instant) -> Self {
        Self {
            id: Uuid::now_v7(),
            started_at,
        }
    }
}

/// Claimed single-flight slot; dropping it returns the state to `Idle`
struct Slot<'a> {
    state: &'a watch::Sender<UploadState>,
}

impl<'a> Slot<'a> {
    fn claim(state: &'a watch::Sender<UploadState>) -> Option<Self> {
        let claimed = state.send_if_modified(|current| {
            if *current == UploadState::Idle {
                *current = UploadState::Validating;
                true
            } else {
                false
            }
        });
        claimed.then_some(Self { state })
    }

    fn advance(&self, next: UploadState) {
        debug!(state = ?next, "Upload state changed");
        self.state.send_replace(next);
    }
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        self.state.send_replace(UploadState::Idle);
    }
}

pub struct UploadOrchestrator {
    config: UploadConfig,
    hub: EventHub,
    transporter: Arc<dyn Transporter>,
    calculator: ProgressCalculator,
    state: watch::Sender<UploadState>,
    metrics: Arc<Metrics>,
    clock: Arc<dyn Clock>,
}

impl UploadOrchestrator {
    pub fn new(config: UploadConfig, hub: EventHub, transporter: Arc<dyn Transporter>) -> Self {
        let (state, _) = watch::channel(UploadState::Idle);
        Self {
            calculator: ProgressCalculator::new(config.eta_quantum_secs),
            config,
            hub,
            transporter,
            state,
            metrics: Arc::new(Metrics::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source used for session start and progress reports
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    pub fn state(&self) -> UploadState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadState> {
        self.state.subscribe()
    }

    pub fn is_in_progress(&self) -> bool {
        self.state() != UploadState::Idle
    }

    pub fn set_endpoint(&mut self, endpoint: impl Into<String>) {
        self.config.endpoint = endpoint.into();
    }

    /// Zero means unbounded
    pub fn set_max_files(&mut self, max_files: usize) {
        self.config.max_files = max_files;
    }

    /// Zero means unbounded
    pub fn set_max_bytes(&mut self, max_bytes: impl Into<ByteSize>) {
        self.config.max_bytes = max_bytes.into();
    }

    /// Replace the accepted MIME patterns; an empty list accepts everything
    pub fn set_accepted_types<I, S>(&mut self, patterns: I) -> Result<(), PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.accept = patterns
            .into_iter()
            .map(|p| p.as_ref().parse::<MimePattern>())
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    pub fn set_eta_quantum(&mut self, secs: u64) {
        self.config.eta_quantum_secs = secs;
        self.calculator = ProgressCalculator::new(secs);
    }

    pub fn on<F, R>(&mut self, name: &str, callback: F) -> Result<(), HookError>
    where
        F: Fn(&UploadEvent<'_>) -> R + Send + Sync + 'static,
        R: Into<Flow>,
    {
        self.hub.on(name, callback)
    }

    pub fn hooks_mut(&mut self) -> &mut EventHub {
        &mut self.hub
    }

    /// Ask a picker for files and upload them. `None` when nothing was picked.
    pub async fn choose_files(
        &self,
        picker: &dyn FilePicker,
        params: Option<UrlParams>,
        user_data: UserData,
    ) -> Result<Option<UploadOutcome>, PickError> {
        let selection = picker.pick().await?;
        if selection.is_empty() {
            debug!("No files picked");
            return Ok(None);
        }
        Ok(Some(self.upload(selection, params, user_data).await))
    }

    pub async fn upload(
        &self,
        selection: FileSelection,
        params: Option<UrlParams>,
        user_data: UserData,
    ) -> UploadOutcome {
        let Some(slot) = Slot::claim(&self.state) else {
            debug!("Upload already in progress, ignoring request");
            return UploadOutcome::NotReady(NotReady::InProgress);
        };

        if self.config.endpoint.is_empty() {
            debug!("No endpoint configured, ignoring request");
            return UploadOutcome::NotReady(NotReady::MissingEndpoint);
        }

        if !self.transporter.is_available() {
            slot.advance(UploadState::Failed);
            self.fail(&UploadError::UnsupportedEnvironment, &user_data);
            return UploadOutcome::NotReady(NotReady::Unsupported);
        }

        if let Err(err) = validation::validate(&selection, &self.config) {
            warn!(kind = err.kind(), error = %err, "Selection rejected");
            slot.advance(UploadState::Failed);
            self.metrics.upload_rejected();
            self.fail(&UploadError::from(err.clone()), &user_data);
            return UploadOutcome::Rejected(err);
        }

        slot.advance(UploadState::AwaitingStart);
        let start = UploadEvent::Start {
            files: &selection,
            user_data: &user_data,
        };
        if self.hub.dispatch(&start).is_abort() {
            info!(files = selection.len(), "Upload vetoed by start hook");
            self.metrics.upload_vetoed();
            return UploadOutcome::Vetoed;
        }

        let session = UploadSession::begin(self.clock.now());
        let url = destination(&self.config.endpoint, params.as_ref());
        let request = UploadRequest::new(url, &selection, &user_data);
        let span = info_span!(
            "upload",
            session_id = %session.id,
            file_count = selection.len()
        );

        self.send(&slot, session, request, &user_data)
            .instrument(span)
            .await
    }

    async fn send(
        &self,
        slot: &Slot<'_>,
        session: UploadSession,
        request: UploadRequest,
        user_data: &UserData,
    ) -> UploadOutcome {
        slot.advance(UploadState::Sending);
        info!(url = %request.url, "Upload started");
        self.metrics.upload_started();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let send = self.transporter.send(request, tx);
        tokio::pin!(send);

        let result = loop {
            tokio::select! {
                biased;
                Some(sample) = rx.recv() => self.report_progress(&session, sample, user_data),
                result = &mut send => break result,
            }
        };
        while let Ok(sample) = rx.try_recv() {
            self.report_progress(&session, sample, user_data);
        }

        let error = match result {
            Ok(response) if response.is_success() => {
                slot.advance(UploadState::Completed);
                info!(
                    code = response.code,
                    elapsed_ms = session.started_at.elapsed().as_millis() as u64,
                    "Upload completed"
                );
                self.metrics.upload_completed();
                self.hub.dispatch(&UploadEvent::Complete {
                    response: &response,
                    user_data,
                });
                return UploadOutcome::Completed(response);
            }
            Ok(response) if response.code == 0 => UploadError::Transport {
                message: "Internal Error".to_string(),
            },
            Ok(response) => UploadError::Http {
                code: response.code,
                status_line: response.status_line,
            },
            Err(err) => err.into(),
        };

        warn!(kind = error.kind(), error = %error, "Upload failed");
        slot.advance(UploadState::Failed);
        self.metrics.upload_failed();
        self.fail(&error, user_data);
        UploadOutcome::Failed(error)
    }

    fn report_progress(
        &self,
        session: &UploadSession,
        sample: ProgressSample,
        user_data: &UserData,
    ) {
        debug!(sent = sample.bytes_sent, total = sample.bytes_total, "Progress sample");
        self.metrics.progress_sample();
        let report = self
            .calculator
            .compute(sample, session.started_at, self.clock.now());
        self.hub.dispatch(&UploadEvent::Progress {
            report: &report,
            user_data,
        });
    }

    fn fail(&self, error: &UploadError, user_data: &UserData) {
        self.hub.dispatch(&UploadEvent::Error { error, user_data });
    }
}
