//! [`Page`] implementation driving a Chrome page target over CDP.

use base64::Engine;
use futures::future::FutureExt;
use operator_core::{Error, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

use super::cdp::CdpClient;
use super::page::{
    ClickOptions, Keyboard, LoadState, Mouse, MouseButton, Page, PageFuture, ViewportSize,
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

const VIEWPORT_PROBE: &str = "({ width: window.innerWidth, height: window.innerHeight })";

/// Errors Chrome returns while the document under evaluation is being
/// replaced. The new document answers shortly after.
const TRANSIENT_CONTEXT_ERRORS: &[&str] = &[
    "Execution context was destroyed",
    "Cannot find default execution context",
    "Cannot find context with specified id",
];

fn is_transient_context_error(err: &Error) -> bool {
    match err {
        Error::Browser(message) => TRANSIENT_CONTEXT_ERRORS
            .iter()
            .any(|needle| message.contains(needle)),
        _ => false,
    }
}

/// In-flight request ids and the time of the last network event.
struct NetworkState {
    in_flight: HashSet<String>,
    last_activity: Instant,
}

impl NetworkState {
    fn new(now: Instant) -> Self {
        Self {
            in_flight: HashSet::new(),
            last_activity: now,
        }
    }

    /// A redirect re-sends `requestWillBeSent` with the same id, so it stays
    /// one entry.
    fn begin(&mut self, request_id: &str, now: Instant) {
        self.in_flight.insert(request_id.to_string());
        self.last_activity = now;
    }

    /// `loadingFinished` or `loadingFailed`.
    fn end(&mut self, request_id: &str, now: Instant) {
        self.in_flight.remove(request_id);
        self.last_activity = now;
    }

    /// Nothing in flight and no network event for at least `window`.
    fn is_idle(&self, window: Duration, now: Instant) -> bool {
        self.in_flight.is_empty() && now.saturating_duration_since(self.last_activity) >= window
    }
}

/// Counts in-flight requests from Network domain events.
struct NetworkTracker {
    state: Arc<Mutex<NetworkState>>,
    handle: tokio::task::JoinHandle<()>,
}

impl NetworkTracker {
    async fn start(cdp: &CdpClient) -> Self {
        let mut started = cdp.subscribe_event("Network.requestWillBeSent").await;
        let mut finished = cdp.subscribe_event("Network.loadingFinished").await;
        let mut failed = cdp.subscribe_event("Network.loadingFailed").await;

        let state = Arc::new(Mutex::new(NetworkState::new(Instant::now())));
        let task_state = state.clone();

        let handle = tokio::spawn(async move {
            loop {
                let (params, begins) = tokio::select! {
                    Some(p) = started.recv() => (p, true),
                    Some(p) = finished.recv() => (p, false),
                    Some(p) = failed.recv() => (p, false),
                    else => break,
                };
                let Some(id) = params.get("requestId").and_then(|v| v.as_str()) else {
                    continue;
                };
                let mut net = task_state.lock().unwrap_or_else(|e| e.into_inner());
                if begins {
                    net.begin(id, Instant::now());
                } else {
                    net.end(id, Instant::now());
                }
            }
        });

        Self { state, handle }
    }

    fn is_idle(&self, window: Duration) -> bool {
        let net = self.state.lock().unwrap_or_else(|e| e.into_inner());
        net.is_idle(window, Instant::now())
    }
}

impl Drop for NetworkTracker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct CdpPage {
    cdp: Arc<CdpClient>,
    network: NetworkTracker,
    network_idle: Duration,
    keyboard: CdpKeyboard,
    mouse: CdpMouse,
}

impl CdpPage {
    /// The Network domain must be enabled on `cdp` for `networkidle` waits.
    pub async fn new(cdp: Arc<CdpClient>, network_idle: Duration) -> Self {
        let network = NetworkTracker::start(&cdp).await;
        Self {
            keyboard: CdpKeyboard { cdp: cdp.clone() },
            mouse: CdpMouse {
                cdp: cdp.clone(),
                position: Mutex::new((0.0, 0.0)),
            },
            cdp,
            network,
            network_idle,
        }
    }

    /// Poll `document.readyState` until `accept` holds. A document being
    /// torn down mid-poll counts as not ready yet.
    async fn wait_ready_state(&self, accept: fn(&str) -> bool) -> Result<()> {
        loop {
            match self.cdp.evaluate_js("document.readyState").await {
                Ok(state) if state.as_str().map(accept).unwrap_or(false) => return Ok(()),
                Ok(_) => {}
                Err(e) if is_transient_context_error(&e) => {
                    debug!(error = %e, "Document replaced while polling readyState");
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Navigate and wait for the new document's load event. The old
    /// document may still report `complete` right after `Page.navigate`, so
    /// readyState alone is not trusted here.
    async fn navigate_and_wait(&self, url: &str) -> Result<()> {
        let mut loaded = self.cdp.subscribe_event("Page.loadEventFired").await;
        let Some(loader_id) = self.cdp.navigate(url).await? else {
            debug!(url, "Same-document navigation");
            return Ok(());
        };
        debug!(url, loader_id = %loader_id, "Waiting for load event");
        if loaded.recv().await.is_none() {
            return Err(Error::Browser(format!(
                "Connection closed while loading {}",
                url
            )));
        }
        self.wait_ready_state(|s| s == "complete").await
    }

    async fn wait_network_idle(&self) -> Result<()> {
        while !self.network.is_idle(self.network_idle) {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        Ok(())
    }
}

impl Page for CdpPage {
    fn keyboard(&self) -> &dyn Keyboard {
        &self.keyboard
    }

    fn mouse(&self) -> &dyn Mouse {
        &self.mouse
    }

    fn goto<'a>(&'a self, url: &'a str) -> PageFuture<'a, ()> {
        async move {
            tokio::time::timeout(NAVIGATION_TIMEOUT, self.navigate_and_wait(url))
                .await
                .map_err(|_| {
                    Error::Timeout(format!(
                        "Navigation to {} did not finish within {}s",
                        url,
                        NAVIGATION_TIMEOUT.as_secs()
                    ))
                })?
        }
        .boxed()
    }

    fn url(&self) -> PageFuture<'_, String> {
        async move {
            let href = self.cdp.evaluate_js("window.location.href").await?;
            Ok(href.as_str().unwrap_or_default().to_string())
        }
        .boxed()
    }

    fn viewport_size(&self) -> PageFuture<'_, Option<ViewportSize>> {
        async move {
            let size = self.cdp.evaluate_js(VIEWPORT_PROBE).await?;
            let width = size.get("width").and_then(Value::as_u64).unwrap_or(0);
            let height = size.get("height").and_then(Value::as_u64).unwrap_or(0);
            if width == 0 || height == 0 {
                return Ok(None);
            }
            Ok(Some(ViewportSize::new(width as u32, height as u32)))
        }
        .boxed()
    }

    fn wait_for_load_state<'a>(&'a self, state: &'a str) -> PageFuture<'a, ()> {
        async move {
            match state.parse::<LoadState>()? {
                LoadState::Load => self.wait_ready_state(|s| s == "complete").await,
                LoadState::DomContentLoaded => self.wait_ready_state(|s| s != "loading").await,
                LoadState::NetworkIdle => self.wait_network_idle().await,
            }
        }
        .boxed()
    }

    fn screenshot(&self) -> PageFuture<'_, Vec<u8>> {
        async move {
            let encoded = self.cdp.screenshot().await?;
            base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| Error::Browser(format!("Invalid screenshot data: {}", e)))
        }
        .boxed()
    }

    fn evaluate<'a>(&'a self, expression: &'a str) -> PageFuture<'a, Value> {
        self.cdp.evaluate_js(expression).boxed()
    }
}

struct CdpKeyboard {
    cdp: Arc<CdpClient>,
}

/// A parsed `Control+Shift+A` style key name.
#[derive(Debug, Clone, PartialEq)]
struct KeySpec {
    key: String,
    code: String,
    /// Windows virtual key code, 0 when the key has none.
    key_code: i32,
    /// Alt=1, Control=2, Meta=4, Shift=8.
    modifiers: i32,
}

fn parse_key_spec(spec: &str) -> KeySpec {
    let mut parts: Vec<&str> = spec.split('+').collect();
    let key = match parts.pop() {
        Some("") | None => "+",
        Some(k) => k,
    };

    let mut modifiers = 0;
    for part in parts {
        modifiers |= match part.to_lowercase().as_str() {
            "alt" | "option" => 1,
            "control" | "ctrl" => 2,
            "meta" | "cmd" | "command" => 4,
            "shift" => 8,
            _ => 0,
        };
    }

    let key = if key == "Space" { " " } else { key };
    let code = match key {
        " " => "Space".to_string(),
        k if k.chars().count() == 1 => {
            let c = k.chars().next().unwrap_or_default();
            if c.is_ascii_alphabetic() {
                format!("Key{}", c.to_ascii_uppercase())
            } else if c.is_ascii_digit() {
                format!("Digit{}", c)
            } else {
                k.to_string()
            }
        }
        k => k.to_string(),
    };

    KeySpec {
        key_code: virtual_key_code(key),
        key: key.to_string(),
        code,
        modifiers,
    }
}

fn virtual_key_code(key: &str) -> i32 {
    let mut chars = key.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return match c {
            'a'..='z' | 'A'..='Z' => c.to_ascii_uppercase() as i32,
            '0'..='9' => c as i32,
            ' ' => 32,
            ';' | ':' => 186,
            '=' | '+' => 187,
            ',' | '<' => 188,
            '-' | '_' => 189,
            '.' | '>' => 190,
            '/' | '?' => 191,
            '`' | '~' => 192,
            '[' | '{' => 219,
            '\\' | '|' => 220,
            ']' | '}' => 221,
            '\'' | '"' => 222,
            _ => 0,
        };
    }
    match key {
        "Backspace" => 8,
        "Tab" => 9,
        "Enter" => 13,
        "Shift" => 16,
        "Control" => 17,
        "Alt" => 18,
        "Pause" => 19,
        "CapsLock" => 20,
        "Escape" => 27,
        "PageUp" => 33,
        "PageDown" => 34,
        "End" => 35,
        "Home" => 36,
        "ArrowLeft" => 37,
        "ArrowUp" => 38,
        "ArrowRight" => 39,
        "ArrowDown" => 40,
        "Insert" => 45,
        "Delete" => 46,
        "Meta" => 91,
        "ContextMenu" => 93,
        f if f.len() > 1 && f.starts_with('F') => match f[1..].parse::<i32>() {
            Ok(n @ 1..=24) => 111 + n,
            _ => 0,
        },
        _ => 0,
    }
}

impl Keyboard for CdpKeyboard {
    fn press<'a>(&'a self, key: &'a str) -> PageFuture<'a, ()> {
        async move {
            let spec = parse_key_spec(key);
            debug!(
                key = %spec.key,
                code = %spec.code,
                key_code = spec.key_code,
                modifiers = spec.modifiers,
                "Pressing key"
            );
            for event_type in ["keyDown", "keyUp"] {
                self.cdp
                    .dispatch_key_event(
                        event_type,
                        &spec.key,
                        &spec.code,
                        spec.key_code,
                        spec.modifiers,
                    )
                    .await?;
            }
            Ok(())
        }
        .boxed()
    }

    fn type_text<'a>(&'a self, text: &'a str) -> PageFuture<'a, ()> {
        self.cdp.insert_text(text).boxed()
    }
}

struct CdpMouse {
    cdp: Arc<CdpClient>,
    position: Mutex<(f64, f64)>,
}

impl CdpMouse {
    fn position(&self) -> (f64, f64) {
        *self.position.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn move_and_track(&self, x: f64, y: f64) -> Result<()> {
        self.cdp
            .dispatch_mouse_event("mouseMoved", x, y, "none", 0)
            .await?;
        *self.position.lock().unwrap_or_else(|e| e.into_inner()) = (x, y);
        Ok(())
    }

    async fn press_release(&self, x: f64, y: f64, button: MouseButton, count: i32) -> Result<()> {
        self.cdp
            .dispatch_mouse_event("mousePressed", x, y, button.as_str(), count)
            .await?;
        self.cdp
            .dispatch_mouse_event("mouseReleased", x, y, button.as_str(), count)
            .await
    }
}

impl Mouse for CdpMouse {
    fn move_to(&self, x: f64, y: f64) -> PageFuture<'_, ()> {
        self.move_and_track(x, y).boxed()
    }

    fn down(&self) -> PageFuture<'_, ()> {
        async move {
            let (x, y) = self.position();
            self.cdp
                .dispatch_mouse_event("mousePressed", x, y, MouseButton::Left.as_str(), 1)
                .await
        }
        .boxed()
    }

    fn up(&self) -> PageFuture<'_, ()> {
        async move {
            let (x, y) = self.position();
            self.cdp
                .dispatch_mouse_event("mouseReleased", x, y, MouseButton::Left.as_str(), 1)
                .await
        }
        .boxed()
    }

    fn click(&self, x: f64, y: f64, options: ClickOptions) -> PageFuture<'_, ()> {
        async move {
            self.move_and_track(x, y).await?;
            self.press_release(x, y, options.resolved_button(), 1).await
        }
        .boxed()
    }

    fn dblclick(&self, x: f64, y: f64) -> PageFuture<'_, ()> {
        async move {
            self.move_and_track(x, y).await?;
            self.press_release(x, y, MouseButton::Left, 1).await?;
            self.press_release(x, y, MouseButton::Left, 2).await
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::{evaluated, ok, MockCdp, MockReplies};
    use serde_json::json;

    fn key(key: &str, code: &str, key_code: i32, modifiers: i32) -> KeySpec {
        KeySpec {
            key: key.to_string(),
            code: code.to_string(),
            key_code,
            modifiers,
        }
    }

    #[test]
    fn test_parse_plain_key() {
        assert_eq!(parse_key_spec("Enter"), key("Enter", "Enter", 13, 0));
    }

    #[test]
    fn test_parse_modified_letter() {
        assert_eq!(parse_key_spec("Control+A"), key("A", "KeyA", 65, 2));
        assert_eq!(parse_key_spec("Control+Shift+t"), key("t", "KeyT", 84, 10));
    }

    #[test]
    fn test_parse_digit_and_space() {
        assert_eq!(parse_key_spec("5"), key("5", "Digit5", 53, 0));
        assert_eq!(parse_key_spec("Space"), key(" ", "Space", 32, 0));
    }

    #[test]
    fn test_parse_literal_plus() {
        assert_eq!(parse_key_spec("Shift++"), key("+", "+", 187, 8));
    }

    #[test]
    fn test_editing_and_navigation_keys_have_codes() {
        for (name, code) in [
            ("Backspace", 8),
            ("Tab", 9),
            ("Escape", 27),
            ("PageUp", 33),
            ("PageDown", 34),
            ("End", 35),
            ("Home", 36),
            ("ArrowLeft", 37),
            ("ArrowUp", 38),
            ("ArrowRight", 39),
            ("ArrowDown", 40),
            ("Delete", 46),
            ("F5", 116),
        ] {
            assert_eq!(parse_key_spec(name).key_code, code, "{}", name);
        }
        assert_eq!(parse_key_spec("Unidentified").key_code, 0);
        assert_eq!(parse_key_spec("F99").key_code, 0);
    }

    #[test]
    fn test_network_idle_needs_quiet_window() {
        let t0 = Instant::now();
        let window = Duration::from_millis(500);
        let mut net = NetworkState::new(t0);

        net.begin("1", t0);
        assert!(!net.is_idle(window, t0 + Duration::from_secs(5)));

        net.end("1", t0 + Duration::from_millis(100));
        assert!(!net.is_idle(window, t0 + Duration::from_millis(400)));
        assert!(net.is_idle(window, t0 + Duration::from_millis(600)));
    }

    #[test]
    fn test_network_activity_restarts_window() {
        let t0 = Instant::now();
        let window = Duration::from_millis(500);
        let mut net = NetworkState::new(t0);

        net.begin("1", t0);
        net.end("1", t0);
        net.begin("2", t0 + Duration::from_millis(450));
        net.end("2", t0 + Duration::from_millis(460));
        assert!(!net.is_idle(window, t0 + Duration::from_millis(600)));
        assert!(net.is_idle(window, t0 + Duration::from_millis(960)));
    }

    #[test]
    fn test_failed_request_leaves_flight() {
        let t0 = Instant::now();
        let mut net = NetworkState::new(t0);
        net.begin("7", t0);
        net.end("7", t0);
        assert!(net.in_flight.is_empty());
    }

    #[test]
    fn test_redirect_stays_one_request() {
        let t0 = Instant::now();
        let mut net = NetworkState::new(t0);
        net.begin("9", t0);
        net.begin("9", t0 + Duration::from_millis(10));
        assert_eq!(net.in_flight.len(), 1);

        net.end("9", t0 + Duration::from_millis(20));
        assert!(net.is_idle(Duration::ZERO, t0 + Duration::from_millis(20)));
    }

    #[test]
    fn test_unknown_request_end_is_ignored() {
        let t0 = Instant::now();
        let mut net = NetworkState::new(t0);
        net.begin("a", t0);
        net.end("b", t0);
        assert_eq!(net.in_flight.len(), 1);
    }

    fn context_destroyed() -> MockReplies {
        vec![json!({
            "error": { "code": -32000, "message": "Execution context was destroyed." }
        })]
    }

    async fn page_on(mock: &MockCdp) -> CdpPage {
        let cdp = Arc::new(CdpClient::connect(&mock.ws_url).await.unwrap());
        CdpPage::new(cdp, Duration::from_millis(500)).await
    }

    #[tokio::test]
    async fn test_goto_survives_replaced_document() {
        let mock = MockCdp::serve(|method, attempt| match method {
            "Page.navigate" => vec![
                json!({ "result": { "frameId": "F", "loaderId": "L" } }),
                json!({ "method": "Page.loadEventFired", "params": { "timestamp": 1.0 } }),
            ],
            "Runtime.evaluate" if attempt == 0 => context_destroyed(),
            "Runtime.evaluate" => evaluated(json!("complete")),
            _ => ok(json!({})),
        })
        .await;
        let page = page_on(&mock).await;

        page.goto("https://example.com").await.unwrap();
        assert_eq!(
            mock.methods(),
            ["Page.navigate", "Runtime.evaluate", "Runtime.evaluate"]
        );
    }

    #[tokio::test]
    async fn test_goto_same_document_skips_load_wait() {
        let mock = MockCdp::serve(|_, _| ok(json!({ "frameId": "F" }))).await;
        let page = page_on(&mock).await;

        page.goto("https://example.com/#section").await.unwrap();
        assert_eq!(mock.methods(), ["Page.navigate"]);
    }

    #[tokio::test]
    async fn test_load_state_wait_retries_destroyed_context() {
        let mock = MockCdp::serve(|_, attempt| match attempt {
            0 | 1 => context_destroyed(),
            2 => evaluated(json!("loading")),
            _ => evaluated(json!("interactive")),
        })
        .await;
        let page = page_on(&mock).await;

        page.wait_for_load_state("domcontentloaded").await.unwrap();
        assert_eq!(mock.commands().len(), 4);
    }

    #[tokio::test]
    async fn test_load_state_wait_surfaces_other_errors() {
        let mock = MockCdp::serve(|_, _| {
            vec![json!({ "error": { "code": -32601, "message": "'Runtime.evaluate' wasn't found" } })]
        })
        .await;
        let page = page_on(&mock).await;

        let err = page.wait_for_load_state("load").await.unwrap_err();
        assert!(err.to_string().contains("wasn't found"));
    }

    #[tokio::test]
    async fn test_press_sends_key_code_on_down_and_up() {
        let mock = MockCdp::serve(|_, _| ok(json!({}))).await;
        let page = page_on(&mock).await;

        page.keyboard().press("Backspace").await.unwrap();

        let sent = mock.commands();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["params"]["type"], "keyDown");
        assert_eq!(sent[1]["params"]["type"], "keyUp");
        for command in &sent {
            assert_eq!(command["method"], "Input.dispatchKeyEvent");
            assert_eq!(command["params"]["key"], "Backspace");
            assert_eq!(command["params"]["windowsVirtualKeyCode"], 8);
        }
    }
}
