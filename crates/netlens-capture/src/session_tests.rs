use std::time::Duration;

use tokio::sync::oneshot;

use super::*;
use crate::channel::Headers;
use crate::fallback::{AnyUnavailable, PageUrlFragments};
use crate::model::Unavailable;
use crate::testing::{
    ScriptedBrowser, finished, initiated, no_data, response, text, transient, wait_until,
};

const PAGE: &str = "https://www.example.com/account";

fn fast_config() -> CaptureConfig {
    CaptureConfig {
        completion_delay: Duration::from_millis(150),
        snapshot_settle: Duration::from_millis(10),
        body_retry_delay: Duration::from_millis(5),
        session_limit: Duration::from_secs(10),
        ..CaptureConfig::default()
    }
}

fn page_snapshot() -> PageSnapshot {
    PageSnapshot {
        url: PAGE.to_string(),
        title: "Your membership".to_string(),
        html: "<html><body>Premium</body></html>".to_string(),
        text_content: "Premium".to_string(),
        captured_at: 1_700_000_000_000,
    }
}

struct Harness {
    browser: Arc<ScriptedBrowser>,
    control: mpsc::UnboundedSender<Control>,
    reply: oneshot::Receiver<CaptureOutcome>,
    slot: Arc<Semaphore>,
}

fn launch(request: CaptureRequest, affinity: Arc<dyn FallbackAffinity>) -> Harness {
    let browser = ScriptedBrowser::new();
    launch_on(browser, request, affinity)
}

fn launch_on(
    browser: Arc<ScriptedBrowser>,
    request: CaptureRequest,
    affinity: Arc<dyn FallbackAffinity>,
) -> Harness {
    let slot = Arc::new(Semaphore::new(1));
    let (reply_tx, reply) = oneshot::channel();
    let session = CaptureSession::new(
        &slot,
        request,
        browser.clone(),
        fast_config(),
        affinity,
        reply_tx,
    )
    .unwrap();
    let (control, control_rx) = mpsc::unbounded_channel();
    tokio::spawn(session.run(control_rx));
    Harness {
        browser,
        control,
        reply,
        slot,
    }
}

#[test]
fn test_state_transitions() {
    let tab = TabId::from("t");
    assert!(SessionState::Idle.can_transition_to(&SessionState::Starting));
    assert!(SessionState::Starting.can_transition_to(&SessionState::Attaching { tab: tab.clone() }));
    assert!(
        SessionState::Navigating { tab: tab.clone() }
            .can_transition_to(&SessionState::Capturing { tab: tab.clone() })
    );
    assert!(
        SessionState::Capturing { tab: tab.clone() }
            .can_transition_to(&SessionState::Draining { tab: Some(tab.clone()) })
    );
    assert!(SessionState::Draining { tab: None }.can_transition_to(&SessionState::Idle));

    assert!(!SessionState::Idle.can_transition_to(&SessionState::Capturing { tab: tab.clone() }));
    assert!(!SessionState::Capturing { tab: tab.clone() }.can_transition_to(&SessionState::Idle));
    assert!(!SessionState::Draining { tab: None }.can_transition_to(&SessionState::Starting));
}

#[test]
fn test_only_live_states_accept_events() {
    let tab = TabId::from("t");
    assert!(!SessionState::Attaching { tab: tab.clone() }.accepts_events());
    assert!(SessionState::Navigating { tab: tab.clone() }.accepts_events());
    assert!(SessionState::Capturing { tab: tab.clone() }.accepts_events());
    assert!(!SessionState::Draining { tab: Some(tab) }.accepts_events());
}

#[test]
fn test_no_content_detection() {
    let meta = |url: &str, status: u16, headers: Headers| ResponseMeta {
        request_id: RequestId::from("1"),
        url: url.to_string(),
        status,
        status_text: String::new(),
        headers,
        mime_type: String::new(),
        timestamp: 0.0,
    };

    assert!(has_no_content(&meta("data:image/png;base64,AAAA", 200, Headers::new())));
    assert!(has_no_content(&meta("https://a", 204, Headers::new())));
    assert!(has_no_content(&meta("https://a", 301, Headers::new())));
    assert!(has_no_content(&meta(
        "https://a",
        200,
        Headers::from([("content-length".to_string(), "0".to_string())])
    )));
    assert!(!has_no_content(&meta(
        "https://a",
        200,
        Headers::from([("Content-Length".to_string(), "10".to_string())])
    )));
    assert!(!has_no_content(&meta("https://a", 404, Headers::new())));
}

#[tokio::test]
async fn test_second_session_is_rejected_while_slot_held() {
    let harness = launch(CaptureRequest::new(PAGE), Arc::new(AnyUnavailable));
    let (reply_tx, _reply) = oneshot::channel();

    let second = CaptureSession::new(
        &harness.slot,
        CaptureRequest::new(PAGE),
        harness.browser.clone(),
        fast_config(),
        Arc::new(AnyUnavailable),
        reply_tx,
    );
    assert!(matches!(second, Err(CaptureError::SessionActive)));

    harness.control.send(Control::Stop(StopCause::Manual)).unwrap();
    harness.reply.await.unwrap().unwrap();
    wait_until(|| harness.slot.available_permits() == 1).await;
}

#[tokio::test]
async fn test_happy_path_completes_after_load() {
    let harness = launch(CaptureRequest::new(PAGE), Arc::new(AnyUnavailable));
    let browser = &harness.browser;
    browser.script_body("1", vec![text(r#"{"plan":"premium"}"#)]);

    let tab = browser.navigated_tab(0).await;
    assert_eq!(browser.created(), vec![(tab.clone(), None)]);
    assert_eq!(browser.navigations()[0].1, PAGE);

    browser.emit_network(&tab, initiated("1", "https://api.example.com/plan"));
    browser.emit_network(&tab, response("1", "https://api.example.com/plan", 200));
    browser.emit_network(&tab, finished("1"));
    browser.emit(BrowserEvent::PageLoaded { tab: tab.clone() });

    let result = harness.reply.await.unwrap().unwrap();
    assert_eq!(result.stop_cause, StopCause::Completed);
    assert_eq!(result.exchanges.len(), 1);

    let exchange = &result.exchanges[0];
    assert!(exchange.response_received);
    assert_eq!(exchange.status, Some(200));
    assert_eq!(
        exchange.response_body,
        ResponseBody::Text(r#"{"plan":"premium"}"#.to_string())
    );

    wait_until(|| browser.removed() == vec![tab.clone()]).await;
    assert_eq!(browser.detached(), vec![tab]);
}

#[tokio::test]
async fn test_orphan_no_content_response_then_tab_closed() {
    let harness = launch(CaptureRequest::new(PAGE), Arc::new(AnyUnavailable));
    let browser = &harness.browser;
    let tab = browser.navigated_tab(0).await;

    browser.emit_network(&tab, response("42", "https://api.example.com/ping", 204));
    browser.emit(BrowserEvent::TabClosed { tab: tab.clone() });

    let result = harness.reply.await.unwrap().unwrap();
    assert_eq!(result.stop_cause, StopCause::TabClosed);
    assert_eq!(result.exchanges.len(), 1);
    assert_eq!(result.exchanges[0].method, "GET");
    assert_eq!(
        result.exchanges[0].response_body,
        ResponseBody::NoContent { status: 204 }
    );
    assert!(result.dom_fallback.is_none());
    assert_eq!(browser.body_calls("42"), 0);

    wait_until(|| harness.slot.available_permits() == 1).await;
    assert!(browser.removed().is_empty());
}

#[tokio::test]
async fn test_retry_counts_per_failure_kind() {
    let harness = launch(CaptureRequest::new(PAGE), Arc::new(AnyUnavailable));
    let browser = &harness.browser;
    browser.script_body("gone", vec![no_data()]);
    browser.script_body("flaky", vec![transient("Inspected target navigated or closed")]);

    let tab = browser.navigated_tab(0).await;
    for id in ["gone", "flaky"] {
        browser.emit_network(&tab, initiated(id, "https://api.example.com/x"));
        browser.emit_network(&tab, response(id, "https://api.example.com/x", 200));
    }
    browser.emit(BrowserEvent::PageLoaded { tab: tab.clone() });

    let result = harness.reply.await.unwrap().unwrap();
    assert_eq!(browser.body_calls("gone"), 1);
    assert_eq!(browser.body_calls("flaky"), 3);
    assert_eq!(
        result.exchanges[0].response_body,
        ResponseBody::Unavailable(Unavailable::NoData)
    );
    assert_eq!(
        result.exchanges[1].response_body,
        ResponseBody::Unavailable(Unavailable::Failed(
            "Inspected target navigated or closed".to_string()
        ))
    );
}

#[tokio::test]
async fn test_url_filter_excludes_new_records() {
    let request = CaptureRequest::new(PAGE).with_filter(UrlFilter::new(["/api/"]));
    let harness = launch(request, Arc::new(AnyUnavailable));
    let browser = &harness.browser;
    let tab = browser.navigated_tab(0).await;

    browser.emit_network(&tab, initiated("1", "https://cdn.example.com/app.js"));
    browser.emit_network(&tab, initiated("2", "https://www.example.com/api/plan"));
    browser.emit_network(&tab, response("3", "https://cdn.example.com/logo.png", 200));
    harness.control.send(Control::Stop(StopCause::Manual)).unwrap();

    let result = harness.reply.await.unwrap().unwrap();
    let urls: Vec<_> = result.exchanges.iter().map(|e| e.url.as_str()).collect();
    assert_eq!(urls, vec!["https://www.example.com/api/plan"]);
    assert_eq!(browser.body_calls("3"), 0);
}

#[tokio::test]
async fn test_repeated_initiation_updates_in_place() {
    let harness = launch(CaptureRequest::new(PAGE), Arc::new(AnyUnavailable));
    let browser = &harness.browser;
    let tab = browser.navigated_tab(0).await;

    browser.emit_network(&tab, initiated("1", "https://www.example.com/old"));
    browser.emit_network(&tab, initiated("2", "https://www.example.com/other"));
    browser.emit_network(&tab, initiated("1", "https://www.example.com/redirected"));
    harness.control.send(Control::Stop(StopCause::Manual)).unwrap();

    let result = harness.reply.await.unwrap().unwrap();
    assert_eq!(result.exchanges.len(), 2);
    assert_eq!(result.exchanges[0].url, "https://www.example.com/redirected");
    assert_eq!(result.exchanges[1].url, "https://www.example.com/other");
}

#[tokio::test]
async fn test_extra_info_merges_headers() {
    let harness = launch(CaptureRequest::new(PAGE), Arc::new(AnyUnavailable));
    let browser = &harness.browser;
    let tab = browser.navigated_tab(0).await;

    browser.emit_network(&tab, initiated("1", "https://www.example.com/api"));
    browser.emit_network(
        &tab,
        NetworkEvent::ExtraRequestInfo {
            request_id: RequestId::from("1"),
            headers: Headers::from([
                ("Accept".to_string(), "text/html".to_string()),
                ("Cookie".to_string(), "sid=1".to_string()),
            ]),
        },
    );
    browser.emit_network(
        &tab,
        NetworkEvent::ExtraRequestInfo {
            request_id: RequestId::from("unknown"),
            headers: Headers::from([("X".to_string(), "y".to_string())]),
        },
    );
    harness.control.send(Control::Stop(StopCause::Manual)).unwrap();

    let result = harness.reply.await.unwrap().unwrap();
    assert_eq!(result.exchanges.len(), 1);
    let headers = &result.exchanges[0].request_headers;
    assert_eq!(headers["Accept"], "text/html");
    assert_eq!(headers["Cookie"], "sid=1");
}

#[tokio::test]
async fn test_header_merge_ignores_name_case() {
    let harness = launch(CaptureRequest::new(PAGE), Arc::new(AnyUnavailable));
    let browser = &harness.browser;
    let tab = browser.navigated_tab(0).await;

    browser.emit_network(&tab, initiated("1", "https://www.example.com/api"));
    browser.emit_network(
        &tab,
        NetworkEvent::ExtraRequestInfo {
            request_id: RequestId::from("1"),
            headers: Headers::from([("accept".to_string(), "text/html".to_string())]),
        },
    );
    harness.control.send(Control::Stop(StopCause::Manual)).unwrap();

    let result = harness.reply.await.unwrap().unwrap();
    let headers = &result.exchanges[0].request_headers;
    assert_eq!(headers.len(), 1);
    assert_eq!(headers["accept"], "text/html");
}

#[tokio::test]
async fn test_extra_response_info_survives_later_response() {
    let harness = launch(CaptureRequest::new(PAGE), Arc::new(AnyUnavailable));
    let browser = &harness.browser;
    let tab = browser.navigated_tab(0).await;

    browser.emit_network(&tab, initiated("1", "https://www.example.com/api"));
    browser.emit_network(
        &tab,
        NetworkEvent::ExtraResponseInfo {
            request_id: RequestId::from("1"),
            headers: Headers::from([
                ("set-cookie".to_string(), "sid=1".to_string()),
                ("content-type".to_string(), "application/json; charset=utf-8".to_string()),
            ]),
        },
    );
    browser.emit_network(&tab, response("1", "https://www.example.com/api", 200));
    browser.emit_network(
        &tab,
        NetworkEvent::ExtraResponseInfo {
            request_id: RequestId::from("1"),
            headers: Headers::from([("X-Cache".to_string(), "HIT".to_string())]),
        },
    );
    harness.control.send(Control::Stop(StopCause::Manual)).unwrap();

    let result = harness.reply.await.unwrap().unwrap();
    let exchange = &result.exchanges[0];
    assert_eq!(exchange.status, Some(200));
    assert_eq!(
        exchange.response_headers,
        Headers::from([
            ("X-Cache".to_string(), "HIT".to_string()),
            ("content-type".to_string(), "application/json; charset=utf-8".to_string()),
            ("set-cookie".to_string(), "sid=1".to_string()),
        ])
    );
}

#[tokio::test]
async fn test_stop_during_tab_creation_still_removes_tab() {
    let browser = ScriptedBrowser::new();
    browser.delay_tab_creation(Duration::from_millis(100));
    let harness = launch_on(browser, CaptureRequest::new(PAGE), Arc::new(AnyUnavailable));
    harness.control.send(Control::Stop(StopCause::Manual)).unwrap();

    let result = harness.reply.await.unwrap().unwrap();
    assert_eq!(result.stop_cause, StopCause::Manual);
    assert!(result.exchanges.is_empty());

    let created = harness.browser.created();
    assert_eq!(created.len(), 1);
    wait_until(|| harness.browser.removed() == vec![created[0].0.clone()]).await;
    wait_until(|| harness.slot.available_permits() == 1).await;
}

#[tokio::test]
async fn test_events_for_other_tabs_are_ignored() {
    let harness = launch(CaptureRequest::new(PAGE), Arc::new(AnyUnavailable));
    let browser = &harness.browser;
    let tab = browser.navigated_tab(0).await;
    let other = TabId::from("someone-else");

    browser.emit_network(&other, initiated("1", "https://www.example.com/a"));
    browser.emit(BrowserEvent::TabClosed { tab: other });
    browser.emit_network(&tab, initiated("2", "https://www.example.com/b"));
    harness.control.send(Control::Stop(StopCause::Manual)).unwrap();

    let result = harness.reply.await.unwrap().unwrap();
    assert_eq!(result.stop_cause, StopCause::Manual);
    assert_eq!(result.exchanges.len(), 1);
    assert_eq!(result.exchanges[0].request_id, RequestId::from("2"));
}

#[tokio::test]
async fn test_dom_fallback_backfills_unavailable_bodies() {
    let harness = launch(CaptureRequest::new(PAGE), Arc::new(AnyUnavailable));
    let browser = &harness.browser;
    browser.set_snapshot(page_snapshot());
    browser.script_body("ok", vec![text("fine")]);

    let tab = browser.navigated_tab(0).await;
    for id in ["ok", "missing"] {
        browser.emit_network(&tab, initiated(id, "https://www.example.com/api"));
        browser.emit_network(&tab, response(id, "https://www.example.com/api", 200));
    }
    browser.emit(BrowserEvent::PageLoaded { tab: tab.clone() });

    let result = harness.reply.await.unwrap().unwrap();
    assert_eq!(result.dom_fallback.as_deref(), Some(&page_snapshot()));
    assert!(result.used_dom_fallback());
    assert_eq!(result.exchanges[0].response_body, ResponseBody::Text("fine".to_string()));

    let rendered = result.exchanges[1].response_body.render().unwrap().into_owned();
    assert!(rendered.starts_with("(DOM Content Fallback)"));
    assert!(rendered.contains("Page Title: Your membership"));
}

#[tokio::test]
async fn test_dom_fallback_respects_affinity() {
    let affinity = Arc::new(PageUrlFragments::new(vec!["paid_memberships".to_string()]));
    let harness = launch(CaptureRequest::new(PAGE), affinity);
    let browser = &harness.browser;
    browser.set_snapshot(page_snapshot());

    let tab = browser.navigated_tab(0).await;
    browser.emit_network(&tab, initiated("1", "https://www.example.com/api"));
    browser.emit_network(&tab, response("1", "https://www.example.com/api", 200));
    browser.emit(BrowserEvent::PageLoaded { tab: tab.clone() });

    let result = harness.reply.await.unwrap().unwrap();
    assert!(result.dom_fallback.is_some());
    assert!(!result.used_dom_fallback());
    assert!(result.exchanges[0].response_body.is_unavailable());
}

#[tokio::test]
async fn test_page_load_rearms_completion_timer() {
    let harness = launch(CaptureRequest::new(PAGE), Arc::new(AnyUnavailable));
    let browser = &harness.browser;
    let tab = browser.navigated_tab(0).await;

    let started = tokio::time::Instant::now();
    browser.emit(BrowserEvent::PageLoaded { tab: tab.clone() });
    tokio::time::sleep(Duration::from_millis(100)).await;
    browser.emit(BrowserEvent::PageLoaded { tab: tab.clone() });

    let result = harness.reply.await.unwrap().unwrap();
    assert_eq!(result.stop_cause, StopCause::Completed);
    assert!(started.elapsed() >= Duration::from_millis(250));
}

#[tokio::test]
async fn test_attach_failure_delivers_error_and_closes_tab() {
    let browser = ScriptedBrowser::new();
    browser.fail_attach();
    let harness = launch_on(browser, CaptureRequest::new(PAGE), Arc::new(AnyUnavailable));

    let outcome = harness.reply.await.unwrap();
    assert!(matches!(outcome, Err(CaptureError::Attach(_))));

    wait_until(|| harness.browser.removed().len() == 1).await;
    assert!(harness.browser.detached().is_empty());
    assert!(harness.browser.navigations().is_empty());
}

#[tokio::test]
async fn test_enable_failure_is_fatal() {
    let browser = ScriptedBrowser::new();
    browser.fail_enable();
    let harness = launch_on(browser, CaptureRequest::new(PAGE), Arc::new(AnyUnavailable));

    let outcome = harness.reply.await.unwrap();
    assert!(matches!(outcome, Err(CaptureError::Enable(_))));
    wait_until(|| harness.browser.detached().len() == 1).await;
}

#[tokio::test]
async fn test_superseded_stop_delivers_error() {
    let harness = launch(CaptureRequest::new(PAGE), Arc::new(AnyUnavailable));
    let tab = harness.browser.navigated_tab(0).await;
    harness.browser.emit_network(&tab, initiated("1", "https://www.example.com/api"));
    harness.control.send(Control::Stop(StopCause::Superseded)).unwrap();

    assert!(matches!(harness.reply.await.unwrap(), Err(CaptureError::Superseded)));
    wait_until(|| harness.browser.removed() == vec![tab.clone()]).await;
}

#[tokio::test]
async fn test_loading_finished_skips_settled_bodies() {
    let harness = launch(CaptureRequest::new(PAGE), Arc::new(AnyUnavailable));
    let browser = &harness.browser;
    browser.script_body("1", vec![transient("busy"), transient("busy"), transient("busy"), text("late")]);

    let tab = browser.navigated_tab(0).await;
    browser.emit_network(&tab, initiated("1", "https://www.example.com/api"));
    browser.emit_network(&tab, response("1", "https://www.example.com/api", 200));
    wait_until(|| browser.body_calls("1") == 3).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    browser.emit_network(&tab, finished("1"));
    browser.emit(BrowserEvent::PageLoaded { tab: tab.clone() });

    let result = harness.reply.await.unwrap().unwrap();
    assert!(result.exchanges[0].response_body.is_unavailable());
    assert_eq!(browser.body_calls("1"), 3);
}
