use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".browser-operator"))
            .unwrap_or_else(|| PathBuf::from(".browser-operator"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    /// Parent directory of the per-session isolated browser profiles.
    pub fn contexts_dir(&self) -> PathBuf {
        std::env::temp_dir().join("browser-operator")
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.base.join("scripts")
    }

    pub fn script_file(&self, name: &str) -> PathBuf {
        let safe = name.replace([':', '/', '\\', ' '], "_");
        self.scripts_dir().join(format!("{}.rs", safe))
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.base)?;
        std::fs::create_dir_all(self.scripts_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
