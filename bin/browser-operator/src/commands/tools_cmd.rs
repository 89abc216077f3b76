use operator_core::{Config, Paths};
use operator_tools::browser::ViewportSize;
use operator_tools::registry::browser_tool_schemas;

/// List the browser tools with the display size from the config.
pub async fn list() -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let display = ViewportSize::new(config.browser.viewport_width, config.browser.viewport_height);
    let schemas = browser_tool_schemas(display);

    println!();
    println!("Browser tools ({} total, display {}x{})", schemas.len(), display.width, display.height);
    println!();
    for schema in &schemas {
        let func = &schema["function"];
        let name = func["name"].as_str().unwrap_or("");
        let desc = func["description"].as_str().unwrap_or("");
        println!("  {:<14} {}", name, desc);
        if let Some(actions) = func["parameters"]["properties"]["action"]["enum"].as_array() {
            let names: Vec<&str> = actions.iter().filter_map(|a| a.as_str()).collect();
            println!("  {:<14} actions: {}", "", names.join(", "));
        }
    }
    println!();
    Ok(())
}
