//! Browser side of the operator.
//!
//! - `page`: the capability interface everything else is written against
//! - `cdp` / `cdp_page`: the Chrome DevTools Protocol backend
//! - `session`: process and profile lifecycle
//! - `recorder` / `script`: call logging and replay synthesis

pub mod cdp;
pub mod cdp_page;
pub mod page;
pub mod recorder;
pub mod script;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use page::{ClickOptions, Keyboard, LoadState, Mouse, MouseButton, Page, ViewportSize};
pub use recorder::{record_calls, CallLog, RecordedCall, RecordingPage};
pub use script::synthesize;
pub use session::BrowserOperator;
