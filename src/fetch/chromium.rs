//! CDP-backed browser sessions with stealth evasion.
//!
//! Uses chromiumoxide against a locally installed Chrome/Chromium. Every
//! session launches a dedicated browser process with a throwaway profile
//! directory and a randomized user agent, then injects stealth patches
//! based on puppeteer-extra-plugin-stealth techniques.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{random_user_agent, BrowserSession, FetchError, SessionLauncher};

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    // Common install locations
    "/opt/google/chrome/google-chrome",
];

const CHROME_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// Stealth evasion JavaScript injected into each page.
const STEALTH_SCRIPTS: &[&str] = &[
    // Remove webdriver property
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    // Fix chrome object
    r#"
    window.chrome = {
        runtime: {},
        loadTimes: function() {},
        csi: function() {},
        app: {}
    };
    "#,
    // Fix permissions
    r#"
    const originalQuery = window.navigator.permissions.query;
    window.navigator.permissions.query = (parameters) => (
        parameters.name === 'notifications' ?
        Promise.resolve({ state: Notification.permission }) :
        originalQuery(parameters)
    );
    "#,
    // Fix plugins (make it look like regular Chrome)
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' },
            { name: 'Native Client', filename: 'internal-nacl-plugin', description: '' }
        ],
        configurable: true
    });
    "#,
    // Fix languages
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-US', 'en'],
        configurable: true
    });
    "#,
    // Remove automation-related properties
    r#"
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Array;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Promise;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Symbol;
    "#,
];

/// Locate a Chrome/Chromium executable on this machine.
fn find_chromium() -> Result<PathBuf, FetchError> {
    for path in CHROME_PATHS {
        let p = std::path::Path::new(path);
        if p.exists() {
            debug!("found Chrome at {path}");
            return Ok(p.to_path_buf());
        }
    }

    for cmd in CHROME_COMMANDS {
        if let Ok(path) = which::which(cmd) {
            debug!("found Chrome in PATH: {}", path.display());
            return Ok(path);
        }
    }

    Err(FetchError::SessionInit(
        "Chrome/Chromium not found; install chromium or google-chrome".into(),
    ))
}

/// Launches one dedicated browser process per session.
pub struct ChromiumLauncher {
    headless: bool,
}

impl ChromiumLauncher {
    pub fn new(headless: bool) -> Self {
        Self { headless }
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    type Session = ChromiumSession;

    async fn launch(&self) -> Result<ChromiumSession, FetchError> {
        let chrome_path = find_chromium()?;

        let profile_dir =
            std::env::temp_dir().join(format!("skatewatch_profile_{}", Uuid::new_v4()));

        info!("launching browser (headless={})", self.headless);
        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .user_data_dir(&profile_dir);
        if !self.headless {
            builder = builder.with_head();
        }
        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--metrics-recording-only")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-software-rasterizer");

        let config = builder
            .build()
            .map_err(|e| FetchError::SessionInit(format!("browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::SessionInit(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                let _ = std::fs::remove_dir_all(&profile_dir);
                return Err(FetchError::SessionInit(e.to_string()));
            }
        };

        // Override the user agent before any navigation happens.
        let user_agent = random_user_agent();
        debug!("session user agent: {user_agent}");
        page.execute(SetUserAgentOverrideParams::new(user_agent.to_string()))
            .await
            .map_err(|e| FetchError::SessionInit(e.to_string()))?;

        Ok(ChromiumSession {
            browser,
            page,
            handler_task,
            profile_dir,
        })
    }
}

/// One page in a dedicated browser process.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    profile_dir: PathBuf,
}

impl ChromiumSession {
    /// Best-effort injection; fails on non-HTML pages and during
    /// transitions, which is fine.
    async fn apply_stealth(&self) {
        debug!("applying stealth scripts");
        for script in STEALTH_SCRIPTS {
            if let Err(e) = self.page.evaluate(script.to_string()).await {
                debug!("stealth script injection skipped: {e}");
            }
        }
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&self, url: &str) -> Result<(), FetchError> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| FetchError::Navigation(format!("invalid URL {url}: {e}")))?;
        self.page
            .execute(params)
            .await
            .map_err(|e| FetchError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn wait_until_ready(&self, timeout: Duration) -> Result<(), FetchError> {
        // Poll readyState until the document is fully loaded; anything short
        // of "complete" at the deadline fails the attempt.
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.page.evaluate("document.readyState".to_string()).await {
                Ok(result) => {
                    let state: String = result.into_value().unwrap_or_else(|_| "unknown".into());
                    if state == "complete" {
                        break;
                    }
                    debug!("page ready state: {state}");
                }
                Err(e) => {
                    // Evaluation fails mid-navigation; keep polling.
                    debug!("could not check ready state: {e}");
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(FetchError::PageLoadTimeout(timeout));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }

        // Stealth patches need a real page context, so they go in after
        // readiness rather than at session start.
        self.apply_stealth().await;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, FetchError> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| FetchError::Protocol(e.to_string()))?;
        Ok(url.map(|u| u.to_string()).unwrap_or_default())
    }

    async fn count_elements(&self, selector: &str) -> Result<usize, FetchError> {
        let script = format!(
            "document.querySelectorAll(\"{}\").length",
            selector.replace('"', "\\\"")
        );
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| FetchError::Protocol(e.to_string()))?;
        Ok(result.into_value::<u64>().unwrap_or(0) as usize)
    }

    async fn scroll_to_bottom(&self) -> Result<(), FetchError> {
        self.page
            .evaluate("window.scrollTo(0, document.body.scrollHeight);".to_string())
            .await
            .map_err(|e| FetchError::Protocol(e.to_string()))?;
        Ok(())
    }

    async fn scroll_to_top(&self) -> Result<(), FetchError> {
        self.page
            .evaluate("window.scrollTo(0, 0);".to_string())
            .await
            .map_err(|e| FetchError::Protocol(e.to_string()))?;
        Ok(())
    }

    async fn content(&self) -> Result<String, FetchError> {
        self.page
            .content()
            .await
            .map_err(|e| FetchError::Protocol(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.page.clone().close().await {
            debug!("page close failed: {e}");
        }
        if let Err(e) = self.browser.close().await {
            warn!("browser close failed: {e}");
        }
        self.handler_task.abort();
        if let Err(e) = std::fs::remove_dir_all(&self.profile_dir) {
            debug!("profile cleanup failed for {}: {e}", self.profile_dir.display());
        }
    }
}
