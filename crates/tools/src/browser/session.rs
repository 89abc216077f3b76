//! Browser session lifecycle.
//!
//! A [`BrowserOperator`] owns one Chrome process with its own throwaway
//! profile directory, the CDP connection to its page target, and the
//! recording wrapper every caller goes through. Dropping it kills the
//! process; [`BrowserOperator::stop`] also closes the browser gracefully and
//! removes the profile.

use operator_core::{BrowserConfig, Config, Error, Paths, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::cdp::CdpClient;
use super::cdp_page::CdpPage;
use super::page::Page;
use super::recorder::{record_calls, CallLog, RecordedCall, RecordingPage};
use super::script::synthesize;

/// Flags the profile is always launched with.
const LAUNCH_FLAGS: &[&str] = &[
    "--enable-webgl",
    "--use-gl=swiftshader",
    "--enable-accelerated-2d-canvas",
    "--disable-blink-features=AutomationControlled",
    "--disable-web-security",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--disable-sync",
    "--disable-translate",
    "--metrics-recording-only",
    "--password-store=basic",
];

/// Runs before any page script in every document.
const STEALTH_SCRIPT: &str = r#"(() => {
  Object.defineProperty(navigator, "webdriver", { get: () => undefined });
  Object.defineProperty(navigator, "languages", { get: () => ["en-US", "en"] });
  Object.defineProperty(navigator, "plugins", { get: () => [1, 2, 3, 4, 5] });
  for (const name of ["__playwright", "__pw_manual", "__PW_inspect", "cdc_adoQpoasnfa76pfcZLmcfl_Array"]) {
    delete window[name];
  }
  Object.defineProperty(navigator, "headless", { get: () => false });
  const originalQuery = window.navigator.permissions.query;
  window.navigator.permissions.query = (parameters) =>
    parameters.name === "notifications"
      ? Promise.resolve({ state: Notification.permission })
      : originalQuery(parameters);
})();"#;

/// On-disk layout of one session's isolated storage.
#[derive(Debug, Clone)]
pub struct ContextDirs {
    pub root: PathBuf,
    pub user_data: PathBuf,
    pub downloads: PathBuf,
}

impl ContextDirs {
    /// Create `<contexts>/context_<id>/user/Default/Preferences` and the
    /// downloads directory.
    pub fn create(contexts_dir: &Path, downloads: PathBuf) -> Result<Self> {
        let root = contexts_dir.join(format!("context_{}", uuid::Uuid::new_v4().simple()));
        let user_data = root.join("user");
        let default_profile = user_data.join("Default");
        std::fs::create_dir_all(&default_profile)?;
        std::fs::write(default_profile.join("Preferences"), "{}")?;
        std::fs::create_dir_all(&downloads)?;
        Ok(Self {
            root,
            user_data,
            downloads,
        })
    }

    /// Remove the profile. The downloads directory is left alone.
    pub fn discard(&self) -> Result<()> {
        std::fs::remove_dir_all(&self.root)?;
        Ok(())
    }
}

pub struct BrowserOperator {
    process: Child,
    cdp: Arc<CdpClient>,
    page: Arc<RecordingPage>,
    calls: CallLog,
    context: ContextDirs,
}

impl BrowserOperator {
    /// Launch a fresh browser on an isolated profile and connect to its page.
    pub async fn launch(config: &Config, paths: &Paths) -> Result<Self> {
        let browser = &config.browser;
        let binary = find_browser_binary(browser)?;

        let downloads = match &browser.downloads_dir {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir()?.join("downloads"),
        };
        let context = ContextDirs::create(&paths.contexts_dir(), downloads)?;

        match Self::start(config, &binary, context.clone()).await {
            Ok(operator) => Ok(operator),
            Err(e) => {
                if let Err(cleanup) = context.discard() {
                    warn!(
                        error = %cleanup,
                        context = %context.root.display(),
                        "Failed to remove profile"
                    );
                }
                Err(e)
            }
        }
    }

    async fn start(config: &Config, binary: &str, context: ContextDirs) -> Result<Self> {
        let browser = &config.browser;
        let port = find_free_port().await?;
        let args = build_browser_args(browser, port, &context.user_data);

        info!(
            port,
            headless = browser.headless,
            binary = %binary,
            context = %context.root.display(),
            "Launching browser"
        );

        let mut process = Command::new(binary)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Session(format!("Failed to launch {}: {}", binary, e)))?;

        let connected = connect_page(port, browser, &context).await;
        let (cdp, page_ws_url) = match connected {
            Ok(connected) => connected,
            Err(e) => {
                let _ = process.kill().await;
                return Err(e);
            }
        };

        let network_idle = Duration::from_millis(config.computer.network_idle_ms);
        let inner: Arc<dyn Page> = Arc::new(CdpPage::new(cdp.clone(), network_idle).await);
        let (page, calls) = record_calls(inner, "");

        info!(ws_url = %page_ws_url, "CDP connection established");

        Ok(Self {
            process,
            cdp,
            page: Arc::new(page),
            calls,
            context,
        })
    }

    /// The recorded page handle. Every call made through it is logged.
    pub fn page(&self) -> Arc<dyn Page> {
        self.page.clone()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.snapshot()
    }

    /// Replay program for everything recorded so far.
    pub fn generate_script(&self) -> String {
        synthesize(&self.calls.snapshot())
    }

    pub fn context_dir(&self) -> &Path {
        &self.context.root
    }

    /// Close the browser and delete the session's profile directory.
    pub async fn stop(mut self) -> Result<()> {
        if let Err(e) = self.cdp.close_browser().await {
            debug!(error = %e, "Browser.close failed, killing process");
        }
        if let Err(e) = self.process.kill().await {
            debug!(error = %e, "Browser process already gone");
        }
        info!(context = %self.context.root.display(), "Browser stopped");
        self.context.discard()
    }
}

impl Drop for BrowserOperator {
    fn drop(&mut self) {
        let _ = self.process.start_kill();
    }
}

/// Wait for the DevTools endpoint, attach to the page target and prepare it.
async fn connect_page(
    port: u16,
    browser: &BrowserConfig,
    context: &ContextDirs,
) -> Result<(Arc<CdpClient>, String)> {
    wait_for_cdp_ready(port, Duration::from_millis(browser.launch_timeout_ms)).await?;
    let page_ws_url = get_page_ws_url(port).await?;
    let cdp = Arc::new(CdpClient::connect(&page_ws_url).await?);
    prepare_page(&cdp, browser, &context.downloads).await?;
    Ok((cdp, page_ws_url))
}

/// Domains, emulation and init scripts every session page starts with.
async fn prepare_page(cdp: &CdpClient, browser: &BrowserConfig, downloads: &Path) -> Result<()> {
    cdp.enable_domain("Page").await?;
    cdp.enable_domain("Runtime").await?;
    cdp.enable_domain("Network").await?;
    cdp.set_viewport(browser.viewport_width, browser.viewport_height, 1.0)
        .await?;
    cdp.set_locale(&browser.locale).await?;
    cdp.set_timezone(&browser.timezone).await?;
    cdp.set_download_dir(&downloads.display().to_string())
        .await?;
    cdp.set_bypass_csp().await?;
    if browser.stealth {
        cdp.add_init_script(STEALTH_SCRIPT).await?;
    }
    Ok(())
}

/// Build the command line for a Chromium-family browser.
fn build_browser_args(browser: &BrowserConfig, port: u16, user_data_dir: &Path) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={}", port),
        format!("--user-data-dir={}", user_data_dir.display()),
    ];
    args.extend(LAUNCH_FLAGS.iter().map(|f| f.to_string()));
    if browser.headless {
        args.push("--headless=new".to_string());
    }
    args.push(format!(
        "--window-size={},{}",
        browser.viewport_width, browser.viewport_height
    ));
    args.push(format!("--lang={}", browser.locale));
    args.extend(browser.extra_args.iter().cloned());
    args.push("about:blank".to_string());
    args
}

/// Explicit `executable` wins; otherwise the first Chrome, Chromium or Edge
/// found on this machine.
pub fn find_browser_binary(browser: &BrowserConfig) -> Result<String> {
    if let Some(path) = &browser.executable {
        if Path::new(path).exists() || which::which(path).is_ok() {
            return Ok(path.clone());
        }
        return Err(Error::Session(format!("Browser executable not found: {}", path)));
    }

    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        ]
    } else if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
        ]
    } else {
        &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
            "microsoft-edge",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
        ]
    };

    for candidate in candidates {
        if Path::new(candidate).exists() {
            return Ok(candidate.to_string());
        }
        let bare = !candidate.contains('/') && !candidate.contains('\\');
        if bare && which::which(candidate).is_ok() {
            return Ok(candidate.to_string());
        }
    }
    Err(Error::Session(
        "No Chrome, Chromium or Edge installation found. Set browser.executable in the config."
            .to_string(),
    ))
}

async fn find_free_port() -> Result<u16> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// Poll `/json/version` until the DevTools endpoint answers.
async fn wait_for_cdp_ready(port: u16, timeout: Duration) -> Result<()> {
    let start = std::time::Instant::now();
    let url = format!("http://127.0.0.1:{}/json/version", port);

    loop {
        if start.elapsed() > timeout {
            return Err(Error::Session(format!(
                "Browser DevTools endpoint not ready after {}ms on port {}",
                timeout.as_millis(),
                port
            )));
        }
        if let Ok(resp) = reqwest::get(&url).await {
            if let Ok(body) = resp.json::<Value>().await {
                if body.get("webSocketDebuggerUrl").is_some() {
                    return Ok(());
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

/// WebSocket URL of the first `page` target listed by `/json/list`.
async fn get_page_ws_url(port: u16) -> Result<String> {
    let url = format!("http://127.0.0.1:{}/json/list", port);

    for attempt in 0..10 {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        let targets: Vec<Value> = match reqwest::get(&url).await {
            Ok(resp) => match resp.json().await {
                Ok(t) => t,
                Err(e) => {
                    warn!(error = %e, "Unreadable target list");
                    continue;
                }
            },
            Err(_) => continue,
        };
        let page_url = targets
            .iter()
            .filter(|t| t.get("type").and_then(Value::as_str) == Some("page"))
            .find_map(|t| t.get("webSocketDebuggerUrl").and_then(Value::as_str));
        if let Some(ws_url) = page_url {
            return Ok(ws_url.to_string());
        }
    }

    Err(Error::Session("No page target found after retries".to_string()))
}
