//! Replay script synthesis.
//!
//! Renders a [`RecordedCall`] log as a standalone Rust program that opens a
//! fresh [`BrowserOperator`](super::BrowserOperator) session, re-issues the
//! calls in order against its page and always stops the session afterwards,
//! whether the replay succeeded or not.

use serde_json::Value;

use super::recorder::RecordedCall;

const ROOT: &str = "page";
const CALL_INDENT: &str = "        ";

const SCRIPT_HEADER: &str = r#"//! Replay script generated by browser-operator.
//!
//! Re-issues a recorded page session against a fresh browser.

use operator_core::{Config, Paths};
use operator_tools::browser::BrowserOperator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let operator = BrowserOperator::launch(&config, &paths).await?;
    let page = operator.page();

    let replay: anyhow::Result<()> = async {
"#;

const SCRIPT_FOOTER: &str = r#"        Ok(())
    }
    .await;

    let stopped = operator.stop().await;
    replay?;
    stopped?;
    Ok(())
}
"#;

/// Render the whole replay program. Pure: the same log always yields the
/// same text.
pub fn synthesize(calls: &[RecordedCall]) -> String {
    let mut script = String::from(SCRIPT_HEADER);
    for call in calls {
        script.push_str(CALL_INDENT);
        script.push_str(&render_call(call));
        script.push('\n');
    }
    script.push_str(SCRIPT_FOOTER);
    script
}

/// One replay statement, e.g. `page.keyboard().press("Enter").await?;`.
///
/// Every segment of the dotted path except the last is a handle accessor.
pub fn render_call(call: &RecordedCall) -> String {
    let mut segments: Vec<&str> = call.path.split('.').collect();
    let method = segments.pop().unwrap_or_default();

    let mut expr = String::from(ROOT);
    for accessor in segments {
        expr.push('.');
        expr.push_str(accessor);
        expr.push_str("()");
    }

    let args: Vec<String> = call.arguments.iter().map(render_argument).collect();
    format!("{}.{}({}).await?;", expr, method, args.join(", "))
}

/// Strings become escaped Rust string literals; everything else is rendered
/// from its JSON structure.
pub fn render_argument(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{:?}", s),
        Value::Null => "None".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Object(map) if map.is_empty() => "Default::default()".to_string(),
        Value::Object(_) | Value::Array(_) => {
            format!("serde_json::from_value(serde_json::json!({}))?", value)
        }
    }
}
