use operator_core::{Config, Paths};

/// Show the current configuration as pretty-printed JSON.
pub async fn show() -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;

    println!();
    println!("Current configuration");
    println!("  File: {}", paths.config_file().display());
    if !paths.config_file().exists() {
        println!("  (not created yet, showing defaults)");
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Write defaults to the config file.
pub async fn init(force: bool) -> anyhow::Result<()> {
    let paths = Paths::new();
    let file = paths.config_file();

    if file.exists() && !force {
        println!("Config already exists: {}", file.display());
        println!("Use --force to overwrite.");
        return Ok(());
    }

    paths.ensure_dirs()?;
    Config::default().save(&file)?;
    println!("✓ Wrote default config: {}", file.display());
    Ok(())
}
