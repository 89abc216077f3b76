//! Call-recording decorator for [`Page`].
//!
//! [`record_calls`] wraps a page so that every method invocation, on the page
//! itself or on its nested `keyboard` / `mouse` handles, is appended to a
//! shared [`CallLog`] as `(dotted path, arguments)` and then forwarded
//! unchanged. The entry is written when the method is called, before the
//! returned future is polled, so the log follows program order even when
//! calls are issued back to back without awaiting.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::page::{ClickOptions, Keyboard, Mouse, Page, PageFuture, ViewportSize};

/// One intercepted method invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedCall {
    pub path: String,
    pub arguments: Vec<Value>,
}

impl RecordedCall {
    pub fn new(path: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            path: path.into(),
            arguments,
        }
    }
}

/// Append-only log shared by every wrapper in one wrapped object graph.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecordedCall>> {
        // A panicking writer cannot leave a half-pushed entry behind.
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record(&self, path: &str, arguments: Vec<Value>) {
        debug!(path, args = arguments.len(), "Recording page call");
        self.lock().push(RecordedCall::new(path, arguments));
    }

    /// Point-in-time copy of the log.
    pub fn snapshot(&self) -> Vec<RecordedCall> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// Wrap `page` so every call below `prefix` lands in the returned log.
pub fn record_calls(page: Arc<dyn Page>, prefix: &str) -> (RecordingPage, CallLog) {
    let log = CallLog::new();
    let recording = RecordingPage::with_log(page, prefix, log.clone());
    (recording, log)
}

pub struct RecordingPage {
    inner: Arc<dyn Page>,
    log: CallLog,
    path: String,
    keyboard: RecordingKeyboard,
    mouse: RecordingMouse,
}

impl RecordingPage {
    /// Wrap `inner`, appending to an existing log.
    pub fn with_log(inner: Arc<dyn Page>, prefix: &str, log: CallLog) -> Self {
        let keyboard = RecordingKeyboard {
            page: inner.clone(),
            log: log.clone(),
            path: join_path(prefix, "keyboard"),
        };
        let mouse = RecordingMouse {
            page: inner.clone(),
            log: log.clone(),
            path: join_path(prefix, "mouse"),
        };
        Self {
            inner,
            log,
            path: prefix.to_string(),
            keyboard,
            mouse,
        }
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    fn record(&self, method: &str, arguments: Vec<Value>) {
        self.log.record(&join_path(&self.path, method), arguments);
    }
}

impl Page for RecordingPage {
    fn keyboard(&self) -> &dyn Keyboard {
        &self.keyboard
    }

    fn mouse(&self) -> &dyn Mouse {
        &self.mouse
    }

    fn goto<'a>(&'a self, url: &'a str) -> PageFuture<'a, ()> {
        self.record("goto", vec![json!(url)]);
        self.inner.goto(url)
    }

    fn url(&self) -> PageFuture<'_, String> {
        self.record("url", Vec::new());
        self.inner.url()
    }

    fn viewport_size(&self) -> PageFuture<'_, Option<ViewportSize>> {
        self.record("viewport_size", Vec::new());
        self.inner.viewport_size()
    }

    fn wait_for_load_state<'a>(&'a self, state: &'a str) -> PageFuture<'a, ()> {
        self.record("wait_for_load_state", vec![json!(state)]);
        self.inner.wait_for_load_state(state)
    }

    fn screenshot(&self) -> PageFuture<'_, Vec<u8>> {
        self.record("screenshot", Vec::new());
        self.inner.screenshot()
    }

    fn evaluate<'a>(&'a self, expression: &'a str) -> PageFuture<'a, Value> {
        self.record("evaluate", vec![json!(expression)]);
        self.inner.evaluate(expression)
    }
}

struct RecordingKeyboard {
    page: Arc<dyn Page>,
    log: CallLog,
    path: String,
}

impl Keyboard for RecordingKeyboard {
    fn press<'a>(&'a self, key: &'a str) -> PageFuture<'a, ()> {
        self.log.record(&join_path(&self.path, "press"), vec![json!(key)]);
        self.page.keyboard().press(key)
    }

    fn type_text<'a>(&'a self, text: &'a str) -> PageFuture<'a, ()> {
        self.log
            .record(&join_path(&self.path, "type_text"), vec![json!(text)]);
        self.page.keyboard().type_text(text)
    }
}

struct RecordingMouse {
    page: Arc<dyn Page>,
    log: CallLog,
    path: String,
}

impl Mouse for RecordingMouse {
    fn move_to(&self, x: f64, y: f64) -> PageFuture<'_, ()> {
        self.log
            .record(&join_path(&self.path, "move_to"), vec![json!(x), json!(y)]);
        self.page.mouse().move_to(x, y)
    }

    fn down(&self) -> PageFuture<'_, ()> {
        self.log.record(&join_path(&self.path, "down"), Vec::new());
        self.page.mouse().down()
    }

    fn up(&self) -> PageFuture<'_, ()> {
        self.log.record(&join_path(&self.path, "up"), Vec::new());
        self.page.mouse().up()
    }

    fn click(&self, x: f64, y: f64, options: ClickOptions) -> PageFuture<'_, ()> {
        let options_value = serde_json::to_value(options).unwrap_or_else(|_| json!({}));
        self.log.record(
            &join_path(&self.path, "click"),
            vec![json!(x), json!(y), options_value],
        );
        self.page.mouse().click(x, y, options)
    }

    fn dblclick(&self, x: f64, y: f64) -> PageFuture<'_, ()> {
        self.log
            .record(&join_path(&self.path, "dblclick"), vec![json!(x), json!(y)]);
        self.page.mouse().dblclick(x, y)
    }
}
