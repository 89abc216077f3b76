//! Page-handle capability interface.
//!
//! The executor, the recorder and the script synthesizer depend on this
//! finite method surface only, never on a concrete browser binding. Every
//! method hands back a boxed future so an implementation can do work at the
//! moment of invocation (the recorder logs there) before anything is awaited.

use futures::future::BoxFuture;
use operator_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub type PageFuture<'a, T> = BoxFuture<'a, Result<T>>;

/// Current size of the rendered surface in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Upper edges are inclusive.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (0.0..=self.width as f64).contains(&x) && (0.0..=self.height as f64).contains(&y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Load,
    DomContentLoaded,
    NetworkIdle,
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::Load => "load",
            LoadState::DomContentLoaded => "domcontentloaded",
            LoadState::NetworkIdle => "networkidle",
        }
    }
}

impl FromStr for LoadState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "load" => Ok(LoadState::Load),
            "domcontentloaded" => Ok(LoadState::DomContentLoaded),
            "networkidle" => Ok(LoadState::NetworkIdle),
            other => Err(Error::Validation(format!("Unknown load state: {}", other))),
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn as_str(&self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClickOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<MouseButton>,
}

impl ClickOptions {
    pub fn button(button: MouseButton) -> Self {
        Self {
            button: Some(button),
        }
    }

    pub fn resolved_button(&self) -> MouseButton {
        self.button.unwrap_or_default()
    }
}

pub trait Keyboard: Send + Sync {
    /// Press a key combination such as `Enter` or `Control+A`.
    fn press<'a>(&'a self, key: &'a str) -> PageFuture<'a, ()>;
    fn type_text<'a>(&'a self, text: &'a str) -> PageFuture<'a, ()>;
}

pub trait Mouse: Send + Sync {
    fn move_to(&self, x: f64, y: f64) -> PageFuture<'_, ()>;
    fn down(&self) -> PageFuture<'_, ()>;
    fn up(&self) -> PageFuture<'_, ()>;
    fn click(&self, x: f64, y: f64, options: ClickOptions) -> PageFuture<'_, ()>;
    fn dblclick(&self, x: f64, y: f64) -> PageFuture<'_, ()>;
}

pub trait Page: Send + Sync {
    fn keyboard(&self) -> &dyn Keyboard;
    fn mouse(&self) -> &dyn Mouse;

    fn goto<'a>(&'a self, url: &'a str) -> PageFuture<'a, ()>;
    fn url(&self) -> PageFuture<'_, String>;
    /// Read live from the page; `None` when the surface has no size.
    fn viewport_size(&self) -> PageFuture<'_, Option<ViewportSize>>;
    /// Takes the state name (`load`, `domcontentloaded`, `networkidle`).
    fn wait_for_load_state<'a>(&'a self, state: &'a str) -> PageFuture<'a, ()>;
    /// PNG bytes of the visible surface.
    fn screenshot(&self) -> PageFuture<'_, Vec<u8>>;
    fn evaluate<'a>(&'a self, expression: &'a str) -> PageFuture<'a, Value>;
}
