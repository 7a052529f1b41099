//! Routing of inbound CDP messages to waiting callers and event listeners.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use netlens_capture::{BrowserEvent, TabId};

use crate::error::CdpError;
use crate::events::{TabSignal, translate};
use crate::protocol::{CdpResponse, TargetDestroyed};

type Reply = oneshot::Sender<Result<Value, CdpError>>;

/// Shared between the client and its receive loop.
#[derive(Default)]
pub(crate) struct Router {
    /// Commands waiting for their answer, by request id.
    pending: Mutex<HashMap<u64, Reply>>,
    /// Flat session id to the tab it is attached to.
    sessions: Mutex<HashMap<String, TabId>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<BrowserEvent>>>,
}

impl Router {
    pub(crate) fn expect_reply(&self, id: u64) -> oneshot::Receiver<Result<Value, CdpError>> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        rx
    }

    pub(crate) fn forget_reply(&self, id: u64) {
        self.pending.lock().remove(&id);
    }

    pub(crate) fn bind_session(&self, session_id: String, tab: TabId) {
        self.sessions.lock().insert(session_id, tab);
    }

    pub(crate) fn session_for(&self, tab: &TabId) -> Option<String> {
        self.sessions
            .lock()
            .iter()
            .find(|(_, bound)| *bound == tab)
            .map(|(session_id, _)| session_id.clone())
    }

    pub(crate) fn unbind_tab(&self, tab: &TabId) -> Option<String> {
        let mut sessions = self.sessions.lock();
        let session_id = sessions
            .iter()
            .find(|(_, bound)| *bound == tab)
            .map(|(session_id, _)| session_id.clone())?;
        sessions.remove(&session_id);
        Some(session_id)
    }

    pub(crate) fn subscribe(&self) -> mpsc::UnboundedReceiver<BrowserEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Handle one text frame from the browser.
    pub(crate) fn dispatch(&self, text: &str) {
        trace!("CDP recv: {}", text);
        let message = match serde_json::from_str::<CdpResponse>(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Failed to parse CDP message: {}", e);
                return;
            }
        };

        if let Some(id) = message.id {
            let Some(reply) = self.pending.lock().remove(&id) else {
                debug!(id, "Answer for a command nobody waits on");
                return;
            };
            let result = match message.error {
                Some(error) => Err(CdpError::Protocol {
                    code: error.code,
                    message: error.message,
                }),
                None => Ok(message.result.unwrap_or(Value::Null)),
            };
            let _ = reply.send(result);
            return;
        }

        let Some(method) = message.method else {
            return;
        };
        let params = message.params.unwrap_or(Value::Null);

        if method == "Target.targetDestroyed" {
            if let Ok(destroyed) = serde_json::from_value::<TargetDestroyed>(params) {
                let tab = TabId(destroyed.target_id);
                self.unbind_tab(&tab);
                self.broadcast(BrowserEvent::TabClosed { tab });
            }
            return;
        }

        let Some(session_id) = message.session_id else {
            return;
        };
        let Some(tab) = self.sessions.lock().get(&session_id).cloned() else {
            return;
        };
        match translate(&method, &params) {
            Some(TabSignal::Network(event)) => self.broadcast(BrowserEvent::Network { tab, event }),
            Some(TabSignal::Loaded) => self.broadcast(BrowserEvent::PageLoaded { tab }),
            None => {}
        }
    }

    /// The connection is gone: fail every waiter and end every event stream.
    pub(crate) fn close(&self) {
        self.pending.lock().clear();
        self.sessions.lock().clear();
        self.subscribers.lock().clear();
    }

    fn broadcast(&self, event: BrowserEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
