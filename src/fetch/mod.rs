//! Listing page retrieval with retry, soft-block detection, and lazy-load
//! scrolling.
//!
//! The retrieval policy lives in [`FetchDriver`], which only talks to the
//! browser through the [`BrowserSession`] and [`SessionLauncher`] traits.
//! Production code plugs in the CDP-backed [`chromium::ChromiumLauncher`];
//! tests drive the policy with scripted fake sessions.
//!
//! Each top-level attempt runs in a fresh session with its own scratch
//! profile and user agent, so a fingerprinted session never carries over
//! into the next attempt.

pub mod chromium;
mod user_agents;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use user_agents::random_user_agent;

/// Elements that signal a product grid has rendered. Spans all monitored
/// stores so one probe works everywhere.
pub const PRODUCT_MARKER_SELECTOR: &str = "li.ProductCard, .product-card, .product-item, \
     a[href*='deck'], a[href*='wheels'], a[href*='truck'], a[href*='bearings'], \
     .product-grid__item";

/// Anti-bot interstitials redirect to a URL containing this token.
const BLOCK_TOKEN: &str = "stash";

/// A URL is a block page when it contains the block token, case-insensitive.
pub fn is_block_url(url: &str) -> bool {
    url.to_lowercase().contains(BLOCK_TOKEN)
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to start browser session: {0}")]
    SessionInit(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("page not ready after {0:?}")]
    PageLoadTimeout(Duration),

    #[error("redirected to block page: {0}")]
    SoftBlocked(String),

    #[error("browser protocol error: {0}")]
    Protocol(String),

    #[error("all {0} fetch attempts failed")]
    AttemptsExhausted(u32),
}

/// One live browser page. Methods map onto single CDP round trips.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), FetchError>;

    /// Block until the document reports ready, up to `timeout`.
    async fn wait_until_ready(&self, timeout: Duration) -> Result<(), FetchError>;

    async fn current_url(&self) -> Result<String, FetchError>;

    /// Number of elements matching a CSS selector in the live DOM.
    async fn count_elements(&self, selector: &str) -> Result<usize, FetchError>;

    /// Poll for at least one element matching the selector, up to `timeout`.
    /// Returns whether anything appeared.
    async fn wait_for_element(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, FetchError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.count_elements(selector).await? > 0 {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    async fn scroll_to_bottom(&self) -> Result<(), FetchError>;

    async fn scroll_to_top(&self) -> Result<(), FetchError>;

    /// Serialized markup of the current document.
    async fn content(&self) -> Result<String, FetchError>;

    /// Tear the session down. Infallible: teardown problems are logged, not
    /// surfaced, so a failed page never leaks a browser process.
    async fn close(&mut self);
}

/// Factory for fresh sessions, one per fetch attempt.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    type Session: BrowserSession;

    async fn launch(&self) -> Result<Self::Session, FetchError>;
}

/// Timing and retry knobs. Defaults match live-site pacing; tests zero the
/// delays out.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Top-level attempts, each in a fresh session.
    pub max_attempts: u32,
    /// Launch retries within a single attempt.
    pub session_init_attempts: u32,
    pub session_retry_delay: Duration,
    pub page_load_timeout: Duration,
    /// Pause after readiness so late scripts can run.
    pub settle_min: Duration,
    pub settle_max: Duration,
    /// Soft wait for product markers; expiry is logged, not fatal.
    pub marker_timeout: Duration,
    /// Scroll rounds; stops early once the marker count stabilizes.
    pub max_scroll_rounds: u32,
    pub scroll_pause_min: Duration,
    pub scroll_pause_max: Duration,
    /// Backoff before attempt n+1 is `backoff_unit * 2^n` plus jitter.
    /// Soft-block retries skip it and go straight to a fresh session.
    pub backoff_unit: Duration,
    pub jitter_min: Duration,
    pub jitter_max: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            session_init_attempts: 3,
            session_retry_delay: Duration::from_secs(2),
            page_load_timeout: Duration::from_secs(30),
            settle_min: Duration::from_secs(1),
            settle_max: Duration::from_secs(2),
            marker_timeout: Duration::from_secs(10),
            max_scroll_rounds: 3,
            scroll_pause_min: Duration::from_secs(1),
            scroll_pause_max: Duration::from_secs(2),
            backoff_unit: Duration::from_secs(1),
            jitter_min: Duration::from_secs(1),
            jitter_max: Duration::from_secs(2),
        }
    }
}

fn jittered(lo: Duration, hi: Duration) -> Duration {
    if hi <= lo {
        return lo;
    }
    lo + (hi - lo).mul_f64(fastrand::f64())
}

enum AttemptOutcome {
    Success(String),
    /// Recoverable failure; the next attempt may succeed in a new session.
    Retry(FetchError),
    /// The whole fetch is burned; further attempts would only re-trip the
    /// same defense.
    Fatal(FetchError),
}

/// Drives the full fetch policy over any [`SessionLauncher`].
pub struct FetchDriver<L: SessionLauncher> {
    launcher: L,
    config: FetchConfig,
}

impl<L: SessionLauncher> FetchDriver<L> {
    pub fn new(launcher: L) -> Self {
        Self::with_config(launcher, FetchConfig::default())
    }

    pub fn with_config(launcher: L, config: FetchConfig) -> Self {
        Self { launcher, config }
    }

    /// Fetch one listing page, returning its rendered markup.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut skip_backoff = false;
        for attempt in 0..self.config.max_attempts {
            if attempt > 0 && !skip_backoff {
                let delay = self.backoff_delay(attempt);
                debug!("backing off {delay:?} before attempt {}", attempt + 1);
                tokio::time::sleep(delay).await;
            }
            skip_backoff = false;

            let mut session = match self.create_session().await {
                Ok(session) => session,
                Err(e) => {
                    warn!("attempt {}: could not start a session: {e}", attempt + 1);
                    continue;
                }
            };

            let outcome = self.run_attempt(&session, url).await;
            session.close().await;

            match outcome {
                AttemptOutcome::Success(html) => {
                    info!("fetched {url} on attempt {}", attempt + 1);
                    return Ok(html);
                }
                AttemptOutcome::Retry(e) => {
                    // A rejected session identity gets replaced right away;
                    // only genuine errors earn the exponential backoff.
                    skip_backoff = matches!(e, FetchError::SoftBlocked(_));
                    warn!("attempt {} failed for {url}: {e}", attempt + 1);
                }
                AttemptOutcome::Fatal(e) => {
                    warn!("giving up on {url}: {e}");
                    return Err(e);
                }
            }
        }

        Err(FetchError::AttemptsExhausted(self.config.max_attempts))
    }

    fn backoff_delay(&self, next_attempt: u32) -> Duration {
        let exp = self.config.backoff_unit * 2u32.saturating_pow(next_attempt - 1);
        exp + jittered(self.config.jitter_min, self.config.jitter_max)
    }

    async fn create_session(&self) -> Result<L::Session, FetchError> {
        let mut last_err = FetchError::SessionInit("no launch attempted".into());
        for round in 0..self.config.session_init_attempts {
            match self.launcher.launch().await {
                Ok(session) => return Ok(session),
                Err(e) => {
                    warn!("session launch failed (round {}): {e}", round + 1);
                    last_err = e;
                    if round + 1 < self.config.session_init_attempts {
                        tokio::time::sleep(self.config.session_retry_delay).await;
                    }
                }
            }
        }
        Err(last_err)
    }

    async fn run_attempt(&self, session: &L::Session, url: &str) -> AttemptOutcome {
        info!("fetching {url}");
        if let Err(e) = session.navigate(url).await {
            return AttemptOutcome::Retry(e);
        }
        if let Err(e) = session.wait_until_ready(self.config.page_load_timeout).await {
            return AttemptOutcome::Retry(e);
        }
        tokio::time::sleep(jittered(self.config.settle_min, self.config.settle_max)).await;

        // A redirect to the block page before any interaction: the session
        // identity was rejected outright, a fresh one may get through.
        match session.current_url().await {
            Ok(current) if is_block_url(&current) => {
                return AttemptOutcome::Retry(FetchError::SoftBlocked(current));
            }
            Ok(_) => {}
            Err(e) => return AttemptOutcome::Retry(e),
        }

        // The grid is a soft requirement: some listings legitimately render
        // zero sale items.
        match session
            .wait_for_element(PRODUCT_MARKER_SELECTOR, self.config.marker_timeout)
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!(
                "no product markers within {:?} at {url}",
                self.config.marker_timeout
            ),
            Err(e) => return AttemptOutcome::Retry(e),
        }

        let mut last_count = 0usize;
        for round in 0..self.config.max_scroll_rounds {
            let count = match session.count_elements(PRODUCT_MARKER_SELECTOR).await {
                Ok(count) => count,
                Err(e) => return AttemptOutcome::Retry(e),
            };
            debug!("scroll round {}: {count} product markers", round + 1);
            if count > 0 && count == last_count {
                break;
            }
            last_count = count;

            if let Err(e) = session.scroll_to_bottom().await {
                return AttemptOutcome::Retry(e);
            }
            tokio::time::sleep(jittered(
                self.config.scroll_pause_min,
                self.config.scroll_pause_max,
            ))
            .await;

            // Getting bounced mid-scroll means behavioral detection fired;
            // retrying with yet another session will not help.
            match session.current_url().await {
                Ok(current) if is_block_url(&current) => {
                    return AttemptOutcome::Fatal(FetchError::SoftBlocked(current));
                }
                Ok(_) => {}
                Err(e) => return AttemptOutcome::Retry(e),
            }
        }

        if let Err(e) = session.scroll_to_top().await {
            return AttemptOutcome::Retry(e);
        }
        tokio::time::sleep(jittered(self.config.jitter_min, self.config.jitter_max)).await;

        match session.content().await {
            Ok(html) => AttemptOutcome::Success(html),
            Err(e) => AttemptOutcome::Retry(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone)]
    struct SessionScript {
        url_after_nav: String,
        /// If set, `current_url` switches to this after the first scroll.
        url_after_scroll: Option<String>,
        /// When false, the page never reaches document-ready.
        ready: bool,
        /// Marker counts returned round by round; the last repeats.
        counts: Vec<usize>,
        html: String,
    }

    impl Default for SessionScript {
        fn default() -> Self {
            Self {
                url_after_nav: "https://store.example/decks".into(),
                url_after_scroll: None,
                ready: true,
                counts: vec![10, 10],
                html: "<html><body>grid</body></html>".into(),
            }
        }
    }

    struct FakeSession {
        script: SessionScript,
        count_calls: AtomicUsize,
        scrolls: Arc<AtomicUsize>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        async fn navigate(&self, _url: &str) -> Result<(), FetchError> {
            Ok(())
        }

        async fn wait_until_ready(&self, timeout: Duration) -> Result<(), FetchError> {
            if self.script.ready {
                Ok(())
            } else {
                Err(FetchError::PageLoadTimeout(timeout))
            }
        }

        async fn current_url(&self) -> Result<String, FetchError> {
            if self.scrolls.load(Ordering::SeqCst) > 0 {
                if let Some(after) = &self.script.url_after_scroll {
                    return Ok(after.clone());
                }
            }
            Ok(self.script.url_after_nav.clone())
        }

        async fn count_elements(&self, _selector: &str) -> Result<usize, FetchError> {
            let call = self.count_calls.fetch_add(1, Ordering::SeqCst);
            let idx = call.min(self.script.counts.len().saturating_sub(1));
            Ok(self.script.counts.get(idx).copied().unwrap_or(0))
        }

        // Scripted directly so the soft wait does not consume count rounds.
        async fn wait_for_element(
            &self,
            _selector: &str,
            _timeout: Duration,
        ) -> Result<bool, FetchError> {
            Ok(true)
        }

        async fn scroll_to_bottom(&self) -> Result<(), FetchError> {
            self.scrolls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn scroll_to_top(&self) -> Result<(), FetchError> {
            Ok(())
        }

        async fn content(&self) -> Result<String, FetchError> {
            Ok(self.script.html.clone())
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    enum Launch {
        Fail,
        Session(SessionScript),
    }

    struct FakeLauncher {
        plan: Mutex<VecDeque<Launch>>,
        launches: AtomicUsize,
        scrolls: Arc<AtomicUsize>,
        closed_flags: Mutex<Vec<Arc<AtomicBool>>>,
    }

    impl FakeLauncher {
        fn new(plan: Vec<Launch>) -> Self {
            Self {
                plan: Mutex::new(plan.into()),
                launches: AtomicUsize::new(0),
                scrolls: Arc::new(AtomicUsize::new(0)),
                closed_flags: Mutex::new(Vec::new()),
            }
        }

        fn all_sessions_closed(&self) -> bool {
            let flags = self.closed_flags.lock().unwrap();
            !flags.is_empty() && flags.iter().all(|f| f.load(Ordering::SeqCst))
        }
    }

    #[async_trait]
    impl SessionLauncher for FakeLauncher {
        type Session = FakeSession;

        async fn launch(&self) -> Result<FakeSession, FetchError> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            match self.plan.lock().unwrap().pop_front() {
                Some(Launch::Session(script)) => {
                    let closed = Arc::new(AtomicBool::new(false));
                    self.closed_flags.lock().unwrap().push(closed.clone());
                    Ok(FakeSession {
                        script,
                        count_calls: AtomicUsize::new(0),
                        scrolls: self.scrolls.clone(),
                        closed,
                    })
                }
                Some(Launch::Fail) | None => {
                    Err(FetchError::SessionInit("launch refused".into()))
                }
            }
        }
    }

    fn fast_config() -> FetchConfig {
        FetchConfig {
            max_attempts: 3,
            session_init_attempts: 3,
            session_retry_delay: Duration::ZERO,
            page_load_timeout: Duration::from_secs(1),
            settle_min: Duration::ZERO,
            settle_max: Duration::ZERO,
            marker_timeout: Duration::ZERO,
            max_scroll_rounds: 3,
            scroll_pause_min: Duration::ZERO,
            scroll_pause_max: Duration::ZERO,
            backoff_unit: Duration::ZERO,
            jitter_min: Duration::ZERO,
            jitter_max: Duration::ZERO,
        }
    }

    fn driver(plan: Vec<Launch>) -> FetchDriver<FakeLauncher> {
        FetchDriver::with_config(FakeLauncher::new(plan), fast_config())
    }

    #[tokio::test]
    async fn test_first_attempt_success_returns_markup() {
        let driver = driver(vec![Launch::Session(SessionScript::default())]);

        let html = driver.fetch("https://store.example/decks").await.unwrap();
        assert_eq!(html, "<html><body>grid</body></html>");
        assert_eq!(driver.launcher.launches.load(Ordering::SeqCst), 1);
        assert!(driver.launcher.all_sessions_closed());
    }

    #[tokio::test]
    async fn test_launch_failures_exhaust_all_attempts() {
        let driver = driver(vec![]);

        let err = driver.fetch("https://store.example/decks").await.unwrap_err();
        assert!(matches!(err, FetchError::AttemptsExhausted(3)));
        // 3 attempts x 3 launch rounds each
        assert_eq!(driver.launcher.launches.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn test_launch_retries_within_one_attempt() {
        let driver = driver(vec![
            Launch::Fail,
            Launch::Fail,
            Launch::Session(SessionScript::default()),
        ]);

        assert!(driver.fetch("https://store.example/decks").await.is_ok());
        assert_eq!(driver.launcher.launches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_block_before_scroll_retries_in_fresh_session() {
        let blocked = SessionScript {
            url_after_nav: "https://store.example/Stash/challenge".into(),
            ..SessionScript::default()
        };
        let driver = driver(vec![
            Launch::Session(blocked),
            Launch::Session(SessionScript::default()),
        ]);

        assert!(driver.fetch("https://store.example/decks").await.is_ok());
        assert_eq!(driver.launcher.launches.load(Ordering::SeqCst), 2);
        assert!(driver.launcher.all_sessions_closed());
    }

    #[tokio::test]
    async fn test_block_during_scroll_is_fatal() {
        let burned = SessionScript {
            url_after_scroll: Some("https://store.example/stash/denied".into()),
            counts: vec![1, 2, 3],
            ..SessionScript::default()
        };
        let driver = driver(vec![
            Launch::Session(burned),
            Launch::Session(SessionScript::default()),
        ]);

        let err = driver.fetch("https://store.example/decks").await.unwrap_err();
        assert!(matches!(err, FetchError::SoftBlocked(_)));
        // The second scripted session must never be used.
        assert_eq!(driver.launcher.launches.load(Ordering::SeqCst), 1);
        assert!(driver.launcher.all_sessions_closed());
    }

    #[tokio::test]
    async fn test_scrolling_stops_once_count_stabilizes() {
        let script = SessionScript {
            counts: vec![5, 5],
            ..SessionScript::default()
        };
        let driver = driver(vec![Launch::Session(script)]);

        assert!(driver.fetch("https://store.example/decks").await.is_ok());
        assert_eq!(driver.launcher.scrolls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scrolling_is_bounded_when_count_keeps_growing() {
        let script = SessionScript {
            counts: vec![1, 2, 3],
            ..SessionScript::default()
        };
        let driver = driver(vec![Launch::Session(script)]);

        assert!(driver.fetch("https://store.example/decks").await.is_ok());
        assert_eq!(driver.launcher.scrolls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_persistent_pre_scroll_block_exhausts_attempts() {
        let blocked = || SessionScript {
            url_after_nav: "https://store.example/stash".into(),
            ..SessionScript::default()
        };
        let driver = driver(vec![
            Launch::Session(blocked()),
            Launch::Session(blocked()),
            Launch::Session(blocked()),
        ]);

        let err = driver.fetch("https://store.example/decks").await.unwrap_err();
        assert!(matches!(err, FetchError::AttemptsExhausted(3)));
        assert_eq!(driver.launcher.launches.load(Ordering::SeqCst), 3);
        assert!(driver.launcher.all_sessions_closed());
    }

    #[tokio::test]
    async fn test_fetch_runs_inside_a_spawned_task() {
        // The driver future must be spawnable, which requires the session
        // trait objects to be shareable across threads.
        let driver = driver(vec![Launch::Session(SessionScript::default())]);

        let handle =
            tokio::spawn(async move { driver.fetch("https://store.example/decks").await });
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_unready_page_fails_the_attempt_and_retries() {
        let stuck = SessionScript {
            ready: false,
            ..SessionScript::default()
        };
        let driver = driver(vec![
            Launch::Session(stuck),
            Launch::Session(SessionScript::default()),
        ]);

        assert!(driver.fetch("https://store.example/decks").await.is_ok());
        assert_eq!(driver.launcher.launches.load(Ordering::SeqCst), 2);
        assert!(driver.launcher.all_sessions_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_soft_block_retry_skips_backoff() {
        let blocked = SessionScript {
            url_after_nav: "https://store.example/stash".into(),
            ..SessionScript::default()
        };
        let mut config = fast_config();
        config.backoff_unit = Duration::from_secs(30);
        let driver = FetchDriver::with_config(
            FakeLauncher::new(vec![
                Launch::Session(blocked),
                Launch::Session(SessionScript::default()),
            ]),
            config,
        );

        let start = tokio::time::Instant::now();
        assert!(driver.fetch("https://store.example/decks").await.is_ok());
        // No backoff slept between the blocked attempt and the retry.
        assert!(start.elapsed() < Duration::from_secs(30));
    }

    #[test]
    fn test_default_delays_pace_at_one_to_two_seconds() {
        let config = FetchConfig::default();
        assert_eq!(config.settle_min, Duration::from_secs(1));
        assert_eq!(config.settle_max, Duration::from_secs(2));
        assert_eq!(config.scroll_pause_min, Duration::from_secs(1));
        assert_eq!(config.scroll_pause_max, Duration::from_secs(2));
    }

    #[test]
    fn test_block_url_matching_is_case_insensitive() {
        assert!(is_block_url("https://x.example/STASH/page"));
        assert!(is_block_url("https://x.example/stash"));
        assert!(!is_block_url("https://x.example/decks"));
    }
}
