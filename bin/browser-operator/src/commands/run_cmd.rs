use operator_core::{Config, Paths};
use operator_tools::browser::BrowserOperator;
use operator_tools::{ToolContext, ToolOutput, ToolRegistry};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
struct Step {
    tool: String,
    #[serde(default)]
    params: Value,
}

/// Run each step through the tool boundary, print what came back, then print
/// (and optionally save) the replay script. The session is always stopped.
pub async fn run(steps_file: &Path, url: Option<String>, save: Option<String>) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(steps_file)?;
    let steps: Vec<Step> = serde_json::from_str(&content)?;

    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let operator = BrowserOperator::launch(&config, &paths).await?;

    let outcome = drive(&operator, &config, &steps, url.as_deref()).await;
    let script = operator.generate_script();
    let stopped = operator.stop().await;
    outcome?;
    stopped?;

    println!();
    println!("── Replay script ──");
    println!("{}", script);

    if let Some(name) = save {
        paths.ensure_dirs()?;
        let file = paths.script_file(&name);
        std::fs::write(&file, &script)?;
        println!("✓ Saved to {}", file.display());
    }
    Ok(())
}

async fn drive(
    operator: &BrowserOperator,
    config: &Config,
    steps: &[Step],
    url: Option<&str>,
) -> anyhow::Result<()> {
    let page = operator.page();
    if let Some(url) = url {
        page.goto(url).await?;
    }

    let registry = ToolRegistry::for_page(page, &config.computer).await?;
    let ctx = ToolContext::new("cli:run");

    for (i, step) in steps.iter().enumerate() {
        info!(step = i + 1, tool = %step.tool, "Running step");
        let output = registry
            .invoke(&step.tool, ctx.clone(), step.params.clone())
            .await;
        match output {
            ToolOutput::Text { text } => println!("[{}] {}: {}", i + 1, step.tool, text),
            ToolOutput::Image { data, mime_type } => println!(
                "[{}] {}: <{} screenshot, {} base64 bytes>",
                i + 1,
                step.tool,
                mime_type,
                data.len()
            ),
        }
    }
    Ok(())
}
