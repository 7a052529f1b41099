//! In-memory browser used by the session tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::channel::{
    BodyPayload, BrowserEvent, EventSource, InstrumentationChannel, NetworkEvent, RequestId,
    RequestInitiated, ResponseMeta, TabController, TabId, Headers,
};
use crate::error::{BodyFetchError, ChannelError};
use crate::model::PageSnapshot;

pub(crate) const NO_DATA: &str = "No data found for resource with given identifier";

#[derive(Default)]
struct Script {
    next_tab: u32,
    created: Vec<(TabId, Option<String>)>,
    navigations: Vec<(TabId, String)>,
    attached: Vec<TabId>,
    detached: Vec<TabId>,
    removed: Vec<TabId>,
    body_calls: HashMap<RequestId, u32>,
    bodies: HashMap<RequestId, Vec<Result<BodyPayload, BodyFetchError>>>,
    snapshot: Option<PageSnapshot>,
    fail_attach: bool,
    fail_enable: bool,
    create_delay: Option<Duration>,
}

/// Scripted browser. Bodies answer from a per-request script; the last entry repeats.
#[derive(Default)]
pub(crate) struct ScriptedBrowser {
    script: Mutex<Script>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<BrowserEvent>>>,
}

impl ScriptedBrowser {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn fail_attach(&self) {
        self.script.lock().fail_attach = true;
    }

    pub(crate) fn fail_enable(&self) {
        self.script.lock().fail_enable = true;
    }

    /// Make `create_tab` take this long before the tab exists.
    pub(crate) fn delay_tab_creation(&self, delay: Duration) {
        self.script.lock().create_delay = Some(delay);
    }

    pub(crate) fn set_snapshot(&self, snapshot: PageSnapshot) {
        self.script.lock().snapshot = Some(snapshot);
    }

    pub(crate) fn script_body(&self, id: &str, answers: Vec<Result<BodyPayload, BodyFetchError>>) {
        self.script.lock().bodies.insert(RequestId::from(id), answers);
    }

    pub(crate) fn body_calls(&self, id: &str) -> u32 {
        self.script
            .lock()
            .body_calls
            .get(&RequestId::from(id))
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn created(&self) -> Vec<(TabId, Option<String>)> {
        self.script.lock().created.clone()
    }

    pub(crate) fn navigations(&self) -> Vec<(TabId, String)> {
        self.script.lock().navigations.clone()
    }

    pub(crate) fn detached(&self) -> Vec<TabId> {
        self.script.lock().detached.clone()
    }

    pub(crate) fn removed(&self) -> Vec<TabId> {
        self.script.lock().removed.clone()
    }

    pub(crate) fn emit(&self, event: BrowserEvent) {
        self.subscribers.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub(crate) fn emit_network(&self, tab: &TabId, event: NetworkEvent) {
        self.emit(BrowserEvent::Network {
            tab: tab.clone(),
            event,
        });
    }

    /// Wait until the n-th navigation has been issued and return its tab.
    pub(crate) async fn navigated_tab(&self, n: usize) -> TabId {
        wait_until(|| self.navigations().len() > n).await;
        self.navigations()[n].0.clone()
    }
}

pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}

pub(crate) fn text(body: &str) -> Result<BodyPayload, BodyFetchError> {
    Ok(BodyPayload {
        body: body.to_string(),
        base64_encoded: false,
    })
}

pub(crate) fn no_data() -> Result<BodyPayload, BodyFetchError> {
    Err(BodyFetchError::NoData(NO_DATA.to_string()))
}

pub(crate) fn transient(message: &str) -> Result<BodyPayload, BodyFetchError> {
    Err(BodyFetchError::Failed(message.to_string()))
}

pub(crate) fn initiated(id: &str, url: &str) -> NetworkEvent {
    NetworkEvent::Initiated(RequestInitiated {
        request_id: RequestId::from(id),
        url: url.to_string(),
        method: "GET".to_string(),
        headers: Headers::from([("Accept".to_string(), "application/json".to_string())]),
        post_data: None,
        timestamp: 100.0,
    })
}

pub(crate) fn response(id: &str, url: &str, status: u16) -> NetworkEvent {
    NetworkEvent::ResponseReceived(ResponseMeta {
        request_id: RequestId::from(id),
        url: url.to_string(),
        status,
        status_text: "OK".to_string(),
        headers: Headers::from([("Content-Type".to_string(), "application/json".to_string())]),
        mime_type: "application/json".to_string(),
        timestamp: 100.5,
    })
}

pub(crate) fn finished(id: &str) -> NetworkEvent {
    NetworkEvent::LoadingFinished {
        request_id: RequestId::from(id),
    }
}

#[async_trait]
impl InstrumentationChannel for ScriptedBrowser {
    async fn attach(&self, tab: &TabId, _protocol_version: &str) -> Result<(), ChannelError> {
        let mut script = self.script.lock();
        if script.fail_attach {
            return Err(ChannelError::command("attach", "Another debugger is already attached"));
        }
        script.attached.push(tab.clone());
        Ok(())
    }

    async fn enable_network(&self, _tab: &TabId) -> Result<(), ChannelError> {
        if self.script.lock().fail_enable {
            return Err(ChannelError::command("Network.enable", "refused"));
        }
        Ok(())
    }

    async fn get_response_body(
        &self,
        _tab: &TabId,
        request_id: &RequestId,
    ) -> Result<BodyPayload, BodyFetchError> {
        let mut script = self.script.lock();
        let calls = script.body_calls.entry(request_id.clone()).or_insert(0);
        let index = *calls as usize;
        *calls += 1;
        match script.bodies.get(request_id) {
            Some(answers) if !answers.is_empty() => answers[index.min(answers.len() - 1)].clone(),
            _ => no_data(),
        }
    }

    async fn detach(&self, tab: &TabId) -> Result<(), ChannelError> {
        self.script.lock().detached.push(tab.clone());
        Ok(())
    }
}

#[async_trait]
impl TabController for ScriptedBrowser {
    async fn create_tab(&self, url: Option<&str>) -> Result<TabId, ChannelError> {
        let delay = self.script.lock().create_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut script = self.script.lock();
        script.next_tab += 1;
        let tab = TabId(format!("tab-{}", script.next_tab));
        script.created.push((tab.clone(), url.map(str::to_string)));
        Ok(tab)
    }

    async fn navigate(&self, tab: &TabId, url: &str) -> Result<(), ChannelError> {
        self.script.lock().navigations.push((tab.clone(), url.to_string()));
        Ok(())
    }

    async fn remove_tab(&self, tab: &TabId) -> Result<(), ChannelError> {
        self.script.lock().removed.push(tab.clone());
        Ok(())
    }

    async fn snapshot_page(&self, tab: &TabId) -> Result<PageSnapshot, ChannelError> {
        self.script
            .lock()
            .snapshot
            .clone()
            .ok_or_else(|| ChannelError::TabNotFound(tab.clone()))
    }
}

impl EventSource for ScriptedBrowser {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<BrowserEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }
}
