//! Entry point for callers: starts, supersedes and stops capture sessions.

use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info_span};
use uuid::Uuid;

use crate::channel::BrowserBackend;
use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::fallback::{AnyUnavailable, FallbackAffinity};
use crate::model::{CaptureResult, StopCause};
use crate::session::{CaptureRequest, CaptureSession, Control};
use crate::sink::CaptureOutcome;

struct ActiveSession {
    id: Uuid,
    control: mpsc::UnboundedSender<Control>,
    handle: JoinHandle<()>,
}

impl ActiveSession {
    /// Ask the session to stop and wait until its teardown has finished.
    async fn stop(self, cause: StopCause) {
        // A finished session has dropped its receiver.
        let _ = self.control.send(Control::Stop(cause));
        if let Err(e) = self.handle.await {
            debug!(session = %self.id, "Capture task ended abnormally: {}", e);
        }
    }
}

/// Runs at most one capture session at a time.
pub struct CaptureService {
    backend: Arc<dyn BrowserBackend>,
    config: CaptureConfig,
    affinity: Arc<dyn FallbackAffinity>,
    slot: Arc<Semaphore>,
    active: Mutex<Option<ActiveSession>>,
}

impl CaptureService {
    pub fn new(backend: Arc<dyn BrowserBackend>, config: CaptureConfig) -> Self {
        Self {
            backend,
            config,
            affinity: Arc::new(AnyUnavailable),
            slot: Arc::new(Semaphore::new(1)),
            active: Mutex::new(None),
        }
    }

    /// Replace the rule deciding which exchanges receive the page snapshot.
    pub fn with_fallback_affinity(mut self, affinity: Arc<dyn FallbackAffinity>) -> Self {
        self.affinity = affinity;
        self
    }

    /// Capture a page and wait for the result.
    ///
    /// Starting a new capture supersedes any session still running; its caller
    /// receives [`CaptureError::Superseded`].
    pub async fn start_analysis(&self, request: CaptureRequest) -> CaptureOutcome {
        let reply = self.start(request).await?;
        reply.await.unwrap_or(Err(CaptureError::Dropped))
    }

    /// Start a capture and return the channel its result arrives on.
    pub async fn start(
        &self,
        request: CaptureRequest,
    ) -> Result<oneshot::Receiver<CaptureOutcome>, CaptureError> {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            debug!(session = %previous.id, "Superseding running capture");
            previous.stop(StopCause::Superseded).await;
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let session = CaptureSession::new(
            &self.slot,
            request,
            self.backend.clone(),
            self.config.clone(),
            self.affinity.clone(),
            reply_tx,
        )?;

        let id = session.id();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let span = info_span!("capture", session = %id);
        let handle = tokio::spawn(session.run(control_rx).instrument(span));

        *active = Some(ActiveSession {
            id,
            control: control_tx,
            handle,
        });
        Ok(reply_rx)
    }

    /// Stop the running session, if any. Its caller receives what was captured so far.
    pub async fn stop(&self) {
        if let Some(session) = self.active.lock().await.take() {
            session.stop(StopCause::Manual).await;
        }
    }

    /// Whether a session currently holds the capture slot.
    pub fn is_active(&self) -> bool {
        self.slot.available_permits() == 0
    }
}

/// Convenience for callers holding a finished result.
pub fn summarize(result: &CaptureResult) -> String {
    let with_body = result
        .exchanges
        .iter()
        .filter(|e| e.response_body.is_resolved())
        .count();
    format!(
        "{} requests captured from {} ({} with bodies, stopped: {:?})",
        result.exchanges.len(),
        result.target_url,
        with_body,
        result.stop_cause
    )
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
