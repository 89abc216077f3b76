//! In-memory [`Page`] used by unit tests.

use futures::future::{self, FutureExt};
use operator_core::{Error, Result};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use super::page::{ClickOptions, Keyboard, Mouse, Page, PageFuture, ViewportSize};

#[derive(Default)]
struct FakeState {
    url: String,
    viewport: Option<ViewportSize>,
    effects: Vec<String>,
    cursor: Option<(f64, f64)>,
    click_error: Option<String>,
    hang_load_states: bool,
}

pub(crate) struct FakePage {
    state: Arc<Mutex<FakeState>>,
    keyboard: FakeKeyboard,
    mouse: FakeMouse,
}

impl FakePage {
    pub(crate) const PNG: &'static [u8] = b"\x89PNG\r\n\x1a\nfake";

    pub(crate) fn new() -> Self {
        let state = Arc::new(Mutex::new(FakeState {
            url: "about:blank".to_string(),
            viewport: Some(ViewportSize::new(1280, 720)),
            ..Default::default()
        }));
        Self {
            keyboard: FakeKeyboard {
                state: state.clone(),
            },
            mouse: FakeMouse {
                state: state.clone(),
            },
            state,
        }
    }

    pub(crate) fn effects(&self) -> Vec<String> {
        self.state.lock().unwrap().effects.clone()
    }

    pub(crate) fn set_viewport(&self, viewport: Option<ViewportSize>) {
        self.state.lock().unwrap().viewport = viewport;
    }

    pub(crate) fn fail_clicks(&self, message: &str) {
        self.state.lock().unwrap().click_error = Some(message.to_string());
    }

    pub(crate) fn hang_load_states(&self) {
        self.state.lock().unwrap().hang_load_states = true;
    }
}

fn push(state: &Mutex<FakeState>, effect: String) {
    state.lock().unwrap().effects.push(effect);
}

fn ready<'a, T: Send + 'a>(value: Result<T>) -> PageFuture<'a, T> {
    future::ready(value).boxed()
}

impl Page for FakePage {
    fn keyboard(&self) -> &dyn Keyboard {
        &self.keyboard
    }

    fn mouse(&self) -> &dyn Mouse {
        &self.mouse
    }

    fn goto<'a>(&'a self, url: &'a str) -> PageFuture<'a, ()> {
        async move {
            push(&self.state, format!("goto {}", url));
            self.state.lock().unwrap().url = url.to_string();
            Ok(())
        }
        .boxed()
    }

    fn url(&self) -> PageFuture<'_, String> {
        ready(Ok(self.state.lock().unwrap().url.clone()))
    }

    fn viewport_size(&self) -> PageFuture<'_, Option<ViewportSize>> {
        ready(Ok(self.state.lock().unwrap().viewport))
    }

    fn wait_for_load_state<'a>(&'a self, state: &'a str) -> PageFuture<'a, ()> {
        if self.state.lock().unwrap().hang_load_states {
            return future::pending().boxed();
        }
        push(&self.state, format!("wait {}", state));
        ready(Ok(()))
    }

    fn screenshot(&self) -> PageFuture<'_, Vec<u8>> {
        push(&self.state, "screenshot".to_string());
        ready(Ok(Self::PNG.to_vec()))
    }

    fn evaluate<'a>(&'a self, _expression: &'a str) -> PageFuture<'a, Value> {
        push(&self.state, "evaluate".to_string());
        let (x, y) = self.state.lock().unwrap().cursor.unwrap_or((0.0, 0.0));
        ready(Ok(json!({ "x": x, "y": y })))
    }
}

struct FakeKeyboard {
    state: Arc<Mutex<FakeState>>,
}

impl Keyboard for FakeKeyboard {
    fn press<'a>(&'a self, key: &'a str) -> PageFuture<'a, ()> {
        push(&self.state, format!("press {}", key));
        ready(Ok(()))
    }

    fn type_text<'a>(&'a self, text: &'a str) -> PageFuture<'a, ()> {
        push(&self.state, format!("type {}", text));
        ready(Ok(()))
    }
}

struct FakeMouse {
    state: Arc<Mutex<FakeState>>,
}

impl Mouse for FakeMouse {
    fn move_to(&self, x: f64, y: f64) -> PageFuture<'_, ()> {
        push(&self.state, format!("move {} {}", x, y));
        self.state.lock().unwrap().cursor = Some((x, y));
        ready(Ok(()))
    }

    fn down(&self) -> PageFuture<'_, ()> {
        push(&self.state, "down".to_string());
        ready(Ok(()))
    }

    fn up(&self) -> PageFuture<'_, ()> {
        push(&self.state, "up".to_string());
        ready(Ok(()))
    }

    fn click(&self, x: f64, y: f64, options: ClickOptions) -> PageFuture<'_, ()> {
        if let Some(message) = self.state.lock().unwrap().click_error.clone() {
            return ready(Err(Error::Browser(message)));
        }
        push(
            &self.state,
            format!("click {} {} {}", x, y, options.resolved_button().as_str()),
        );
        self.state.lock().unwrap().cursor = Some((x, y));
        ready(Ok(()))
    }

    fn dblclick(&self, x: f64, y: f64) -> PageFuture<'_, ()> {
        push(&self.state, format!("dblclick {} {}", x, y));
        self.state.lock().unwrap().cursor = Some((x, y));
        ready(Ok(()))
    }
}

/// Messages the mock endpoint sends back for one command. Entries with a
/// `method` key go out as events; anything else is a reply and gets the
/// command's `id`.
pub(crate) type MockReplies = Vec<Value>;

/// One-connection CDP endpoint on localhost. `respond` gets the command's
/// method and how many times that method was seen before.
pub(crate) struct MockCdp {
    pub(crate) ws_url: String,
    commands: Arc<Mutex<Vec<Value>>>,
}

impl MockCdp {
    pub(crate) async fn serve<F>(respond: F) -> Self
    where
        F: Fn(&str, usize) -> MockReplies + Send + 'static,
    {
        use futures::{SinkExt, StreamExt};
        use std::collections::HashMap;
        use tokio_tungstenite::tungstenite::Message;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ws_url = format!("ws://{}", listener.local_addr().unwrap());
        let commands = Arc::new(Mutex::new(Vec::new()));
        let seen = commands.clone();

        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                return;
            };
            let mut counts: HashMap<String, usize> = HashMap::new();
            while let Some(Ok(msg)) = ws.next().await {
                let Message::Text(text) = msg else {
                    continue;
                };
                let Ok(command) = serde_json::from_str::<Value>(&text) else {
                    continue;
                };
                let method = command["method"].as_str().unwrap_or_default().to_string();
                let count = counts.entry(method.clone()).or_default();
                let attempt = *count;
                *count += 1;
                seen.lock().unwrap().push(command.clone());

                for mut reply in respond(&method, attempt) {
                    if reply.get("method").is_none() {
                        reply["id"] = command["id"].clone();
                    }
                    if ws.send(Message::Text(reply.to_string())).await.is_err() {
                        return;
                    }
                }
            }
        });

        Self { ws_url, commands }
    }

    /// Every command received so far, in arrival order.
    pub(crate) fn commands(&self) -> Vec<Value> {
        self.commands.lock().unwrap().clone()
    }

    pub(crate) fn methods(&self) -> Vec<String> {
        self.commands()
            .iter()
            .map(|c| c["method"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

pub(crate) fn ok(result: Value) -> MockReplies {
    vec![json!({ "result": result })]
}

pub(crate) fn evaluated(value: Value) -> MockReplies {
    ok(json!({ "result": { "type": "string", "value": value } }))
}
