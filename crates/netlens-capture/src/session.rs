//! The capture session state machine.
//!
//! A session owns one tab from creation to removal. It runs as a single task
//! that multiplexes browser events, finished background work (body fetches
//! and page snapshots), control messages and its timers, so all state is
//! mutated from one place.

use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio::time::{Instant, Sleep, sleep, sleep_until};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::body::{RetryPolicy, fetch_final, fetch_with_retry};
use crate::channel::{
    BrowserBackend, BrowserEvent, NetworkEvent, RequestId, ResponseMeta, TabId, merge_headers,
};
use crate::config::CaptureConfig;
use crate::error::{CaptureError, ChannelError};
use crate::fallback::FallbackAffinity;
use crate::filter::UrlFilter;
use crate::model::{
    CaptureResult, CapturedExchange, ExchangeTable, PageSnapshot, ResponseBody, StopCause,
};
use crate::sink::{CaptureOutcome, ResultSink};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Attaching { tab: TabId },
    Navigating { tab: TabId },
    Capturing { tab: TabId },
    Draining { tab: Option<TabId> },
}

impl SessionState {
    pub fn tab(&self) -> Option<&TabId> {
        match self {
            Self::Idle | Self::Starting => None,
            Self::Attaching { tab } | Self::Navigating { tab } | Self::Capturing { tab } => Some(tab),
            Self::Draining { tab } => tab.as_ref(),
        }
    }

    /// Network events are only recorded once navigation has been issued.
    pub fn accepts_events(&self) -> bool {
        matches!(self, Self::Navigating { .. } | Self::Capturing { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Attaching { .. } => "attaching",
            Self::Navigating { .. } => "navigating",
            Self::Capturing { .. } => "capturing",
            Self::Draining { .. } => "draining",
        }
    }

    fn can_transition_to(&self, next: &SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Starting, Attaching { .. })
                | (Attaching { .. }, Navigating { .. })
                | (Navigating { .. }, Capturing { .. })
                | (Starting | Attaching { .. } | Navigating { .. } | Capturing { .. }, Draining { .. })
                | (Draining { .. }, Idle)
        )
    }
}

/// What the caller wants captured.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub url: String,
    pub url_filter: UrlFilter,
}

impl CaptureRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            url_filter: UrlFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: UrlFilter) -> Self {
        self.url_filter = filter;
        self
    }
}

/// Messages from the owning service.
#[derive(Debug)]
pub(crate) enum Control {
    Stop(StopCause),
}

enum TaskOutput {
    Body {
        request_id: RequestId,
        body: ResponseBody,
        attempts: u32,
    },
    Snapshot(Result<PageSnapshot, ChannelError>),
}

enum Started {
    Ready,
    Failed(CaptureError),
    Interrupted(StopCause),
}

enum Input {
    Browser(BrowserEvent),
    Task(TaskOutput),
    TaskPanicked(String),
    Stop(StopCause),
}

/// One capture, from tab creation to result delivery.
pub struct CaptureSession {
    id: Uuid,
    request: CaptureRequest,
    backend: Arc<dyn BrowserBackend>,
    config: CaptureConfig,
    affinity: Arc<dyn FallbackAffinity>,
    state: SessionState,
    attached: bool,
    table: ExchangeTable,
    dom_fallback: Option<Arc<PageSnapshot>>,
    completion: Option<Pin<Box<Sleep>>>,
    tasks: JoinSet<TaskOutput>,
    sink: ResultSink,
    started_at: chrono::DateTime<Utc>,
    _permit: OwnedSemaphorePermit,
}

impl CaptureSession {
    /// Create a session, claiming the single session slot.
    ///
    /// Fails with [`CaptureError::SessionActive`] while another session holds it.
    pub(crate) fn new(
        slot: &Arc<Semaphore>,
        request: CaptureRequest,
        backend: Arc<dyn BrowserBackend>,
        config: CaptureConfig,
        affinity: Arc<dyn FallbackAffinity>,
        reply: tokio::sync::oneshot::Sender<CaptureOutcome>,
    ) -> Result<Self, CaptureError> {
        let permit = slot
            .clone()
            .try_acquire_owned()
            .map_err(|_| CaptureError::SessionActive)?;

        Ok(Self {
            id: Uuid::new_v4(),
            request,
            backend,
            config,
            affinity,
            state: SessionState::Idle,
            attached: false,
            table: ExchangeTable::default(),
            dom_fallback: None,
            completion: None,
            tasks: JoinSet::new(),
            sink: ResultSink::new(reply),
            started_at: Utc::now(),
            _permit: permit,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    fn transition(&mut self, next: SessionState) {
        if !self.state.can_transition_to(&next) {
            warn!(from = self.state.name(), to = next.name(), "Ignoring invalid session transition");
            return;
        }
        debug!(from = self.state.name(), to = next.name(), "Session transition");
        self.state = next;
    }

    /// Drive the session to completion.
    pub(crate) async fn run(mut self, mut control: mpsc::UnboundedReceiver<Control>) {
        let mut events = self.backend.subscribe();
        let limit = sleep(self.config.session_limit);
        tokio::pin!(limit);

        info!(url = %self.request.url, filter = ?self.request.url_filter.terms(), "Starting capture");

        // Tab creation is not interruptible, so a stop can never leave an
        // untracked tab behind.
        let started = match self.open_tab().await {
            Err(err) => Started::Failed(err),
            Ok(tab) => tokio::select! {
                biased;
                result = self.start(tab) => match result {
                    Ok(()) => Started::Ready,
                    Err(err) => Started::Failed(err),
                },
                message = control.recv() => {
                    Started::Interrupted(Self::stop_cause(message).unwrap_or(StopCause::Manual))
                }
            },
        };

        let cause = match started {
            Started::Ready => self.capture_loop(&mut events, &mut control, limit).await,
            Started::Failed(err) => {
                warn!("Capture failed to start: {}", err);
                self.sink.deliver(Err(err));
                StopCause::StartFailed
            }
            Started::Interrupted(cause) => cause,
        };

        self.teardown(cause).await;
    }

    fn stop_cause(message: Option<Control>) -> Option<StopCause> {
        message.map(|Control::Stop(cause)| cause)
    }

    async fn open_tab(&mut self) -> Result<TabId, CaptureError> {
        self.transition(SessionState::Starting);

        let tab = self
            .backend
            .create_tab(None)
            .await
            .map_err(CaptureError::TabCreation)?;
        self.transition(SessionState::Attaching { tab: tab.clone() });
        Ok(tab)
    }

    async fn start(&mut self, tab: TabId) -> Result<(), CaptureError> {
        self.backend
            .attach(&tab, &self.config.protocol_version)
            .await
            .map_err(CaptureError::Attach)?;
        self.attached = true;

        self.backend
            .enable_network(&tab)
            .await
            .map_err(CaptureError::Enable)?;

        self.transition(SessionState::Navigating { tab: tab.clone() });
        if let Err(e) = self.backend.navigate(&tab, &self.request.url).await {
            // Let the completion timer wind the session down.
            warn!("Navigation failed: {}", e);
            self.arm_completion();
        }
        self.transition(SessionState::Capturing { tab });
        Ok(())
    }

    async fn capture_loop(
        &mut self,
        events: &mut mpsc::UnboundedReceiver<BrowserEvent>,
        control: &mut mpsc::UnboundedReceiver<Control>,
        mut limit: Pin<&mut Sleep>,
    ) -> StopCause {
        loop {
            let input = tokio::select! {
                biased;
                event = events.recv() => match event {
                    Some(event) => Input::Browser(event),
                    None => Input::Stop(StopCause::BrowserDisconnected),
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => match joined {
                    Ok(output) => Input::Task(output),
                    Err(e) => Input::TaskPanicked(e.to_string()),
                },
                message = control.recv() => {
                    Input::Stop(Self::stop_cause(message).unwrap_or(StopCause::Manual))
                }
                () = completion_elapsed(&mut self.completion) => Input::Stop(StopCause::Completed),
                () = &mut limit => Input::Stop(StopCause::SessionLimit),
            };

            match input {
                Input::Browser(event) => {
                    if let Some(cause) = self.on_browser_event(event) {
                        return cause;
                    }
                }
                Input::Task(output) => self.on_task_output(output),
                Input::TaskPanicked(e) => warn!("Background capture task failed: {}", e),
                Input::Stop(cause) => return cause,
            }
        }
    }

    fn on_browser_event(&mut self, event: BrowserEvent) -> Option<StopCause> {
        if self.state.tab() != Some(event.tab()) {
            trace!(tab = %event.tab(), "Ignoring event for untracked tab");
            return None;
        }

        match event {
            BrowserEvent::Network { event, .. } => {
                if self.state.accepts_events() {
                    self.on_network_event(event);
                }
                None
            }
            BrowserEvent::PageLoaded { .. } => {
                self.on_page_loaded();
                None
            }
            BrowserEvent::TabClosed { tab } => {
                info!(tab = %tab, "Capture tab closed");
                Some(StopCause::TabClosed)
            }
        }
    }

    fn on_network_event(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::Initiated(req) => {
                if let Some(existing) = self.table.get_mut(&req.request_id) {
                    existing.update_request(req);
                } else if self.request.url_filter.allows(&req.url) {
                    trace!(request_id = %req.request_id, url = %req.url, "Request");
                    self.table.insert(CapturedExchange::from_request(req));
                }
            }
            NetworkEvent::ExtraRequestInfo { request_id, headers } => {
                if let Some(exchange) = self.table.get_mut(&request_id) {
                    merge_headers(&mut exchange.request_headers, headers);
                }
            }
            NetworkEvent::ResponseReceived(meta) => self.on_response(meta),
            NetworkEvent::ExtraResponseInfo { request_id, headers } => {
                if let Some(exchange) = self.table.get_mut(&request_id) {
                    merge_headers(&mut exchange.response_headers, headers);
                }
            }
            NetworkEvent::LoadingFinished { request_id } => {
                let loading = self
                    .table
                    .get(&request_id)
                    .is_some_and(|e| e.response_body.is_loading());
                if loading {
                    self.spawn_final_fetch(request_id);
                }
            }
        }
    }

    fn on_response(&mut self, meta: ResponseMeta) {
        if self.table.get(&meta.request_id).is_none() {
            if !self.request.url_filter.allows(&meta.url) {
                return;
            }
            self.table.insert(CapturedExchange::from_orphan_response(&meta));
        }
        let Some(exchange) = self.table.get_mut(&meta.request_id) else {
            return;
        };
        exchange.apply_response(&meta);

        if has_no_content(&meta) {
            exchange
                .response_body
                .advance(ResponseBody::NoContent { status: meta.status });
        } else if exchange.response_body.advance(ResponseBody::Loading) {
            self.spawn_body_fetch(meta.request_id);
        }
    }

    fn on_page_loaded(&mut self) {
        debug!("Page loaded, restarting completion timer");
        self.arm_completion();

        let backend = self.backend.clone();
        let settle = self.config.snapshot_settle;
        if let Some(tab) = self.state.tab().cloned() {
            self.tasks.spawn(async move {
                sleep(settle).await;
                TaskOutput::Snapshot(backend.snapshot_page(&tab).await)
            });
        }
    }

    fn on_task_output(&mut self, output: TaskOutput) {
        match output {
            TaskOutput::Body {
                request_id,
                body,
                attempts,
            } => {
                let Some(exchange) = self.table.get_mut(&request_id) else {
                    return;
                };
                trace!(request_id = %request_id, attempts, "Body fetch finished");
                exchange.response_body.advance(body);

                // The snapshot may have landed before this fetch gave up.
                if let Some(snapshot) = &self.dom_fallback {
                    if exchange.response_body.is_unavailable()
                        && self.affinity.applies(snapshot, exchange)
                    {
                        exchange
                            .response_body
                            .advance(ResponseBody::DomFallback(snapshot.clone()));
                    }
                }
            }
            TaskOutput::Snapshot(Ok(snapshot)) => self.apply_snapshot(snapshot),
            TaskOutput::Snapshot(Err(e)) => debug!("Page snapshot failed: {}", e),
        }
    }

    fn apply_snapshot(&mut self, snapshot: PageSnapshot) {
        let snapshot = Arc::new(snapshot);
        let mut applied = 0;
        for exchange in self.table.iter_mut() {
            if exchange.response_body.is_unavailable()
                && self.affinity.applies(&snapshot, exchange)
                && exchange
                    .response_body
                    .advance(ResponseBody::DomFallback(snapshot.clone()))
            {
                applied += 1;
            }
        }
        debug!(url = %snapshot.url, applied, "Page snapshot stored");
        self.dom_fallback = Some(snapshot);
    }

    fn spawn_body_fetch(&mut self, request_id: RequestId) {
        let Some(tab) = self.state.tab().cloned() else {
            return;
        };
        let backend = self.backend.clone();
        let policy = RetryPolicy {
            attempts: self.config.body_fetch_attempts,
            delay: self.config.body_retry_delay,
        };
        let max_chars = self.config.max_decoded_chars;
        self.tasks.spawn(async move {
            let (body, attempts) =
                fetch_with_retry(backend.as_ref(), &tab, &request_id, policy, max_chars).await;
            TaskOutput::Body {
                request_id,
                body,
                attempts,
            }
        });
    }

    fn spawn_final_fetch(&mut self, request_id: RequestId) {
        let Some(tab) = self.state.tab().cloned() else {
            return;
        };
        let backend = self.backend.clone();
        let max_chars = self.config.max_decoded_chars;
        self.tasks.spawn(async move {
            let body = fetch_final(backend.as_ref(), &tab, &request_id, max_chars).await;
            TaskOutput::Body {
                request_id,
                body,
                attempts: 1,
            }
        });
    }

    fn arm_completion(&mut self) {
        let deadline = Instant::now() + self.config.completion_delay;
        match self.completion.as_mut() {
            Some(timer) => timer.as_mut().reset(deadline),
            None => self.completion = Some(Box::pin(sleep_until(deadline))),
        }
    }

    async fn teardown(&mut self, cause: StopCause) {
        let tab = self.state.tab().cloned();
        let was_running = self.state != SessionState::Idle;
        if was_running {
            self.transition(SessionState::Draining { tab: tab.clone() });
        }
        self.completion = None;
        self.tasks.abort_all();

        if let (Some(tab), true) = (&tab, self.attached) {
            if let Err(e) = self.backend.detach(tab).await {
                debug!("Detach failed (ignored): {}", e);
            }
        }

        if self.sink.is_pending() {
            let outcome = match cause {
                StopCause::Superseded => Err(CaptureError::Superseded),
                _ => Ok(self.collect(cause)),
            };
            let captured = outcome.as_ref().map(|r| r.exchanges.len()).unwrap_or(0);
            info!(?cause, captured, "Capture finished");
            self.sink.deliver(outcome);
        }

        if let Some(tab) = &tab {
            if cause != StopCause::TabClosed {
                if let Err(e) = self.backend.remove_tab(tab).await {
                    debug!("Closing capture tab failed (ignored): {}", e);
                }
            }
        }

        self.dom_fallback = None;
        if was_running {
            self.transition(SessionState::Idle);
        }
    }

    fn collect(&mut self, cause: StopCause) -> CaptureResult {
        CaptureResult {
            session_id: self.id,
            target_url: self.request.url.clone(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            stop_cause: cause,
            exchanges: self.table.drain(),
            dom_fallback: self.dom_fallback.clone(),
        }
    }
}

/// Responses that carry no body by construction.
fn has_no_content(meta: &ResponseMeta) -> bool {
    meta.url.starts_with("data:")
        || meta.status == 204
        || (300..400).contains(&meta.status)
        || meta
            .headers
            .iter()
            .any(|(name, value)| name.eq_ignore_ascii_case("content-length") && value.trim() == "0")
}

async fn completion_elapsed(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
