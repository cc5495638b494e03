//! Blocking HTTP client with a cookie jar, per-request timeout, and a minimum delay between
//! requests. Requests are never retried; a failure is reported to the caller once.

use reqwest::cookie::Jar;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DELAY_MS: u64 = 200;
const MAX_REDIRECTS: usize = 10;

/// Blocking HTTP client that enforces a delay between requests.
#[derive(Debug)]
pub struct PoliteClient {
    inner: reqwest::blocking::Client,
    delay: Duration,
    last_request: Option<Instant>,
}

impl PoliteClient {
    /// Build a polite client with default User-Agent, timeout, and delay and an empty cookie jar.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    pub fn builder() -> PoliteClientBuilder {
        PoliteClientBuilder::default()
    }

    /// Perform a GET request. Sleeps until the configured delay has passed since the last request.
    pub fn get(&mut self, url: &str) -> Result<reqwest::blocking::Response, reqwest::Error> {
        self.wait_delay();
        let result = self.inner.get(url).send();
        self.last_request = Some(Instant::now());
        result
    }

    fn wait_delay(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
    }
}

/// Builder for PoliteClient with optional User-Agent, delay, timeout, and cookie jar.
#[derive(Debug)]
pub struct PoliteClientBuilder {
    user_agent: Option<String>,
    delay_ms: u64,
    timeout_secs: u64,
    cookies: Option<Arc<Jar>>,
}

impl Default for PoliteClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            delay_ms: DEFAULT_DELAY_MS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            cookies: None,
        }
    }
}

impl PoliteClientBuilder {
    /// Set a custom User-Agent. If not set, a browser-like default is used.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set delay between requests in milliseconds. Default 200.
    pub fn delay_ms(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Set request timeout in seconds. Default 30. Zero is bumped to one second.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs.max(1);
        self
    }

    /// Use a pre-filled cookie jar (session cookies).
    pub fn cookie_jar(mut self, jar: Arc<Jar>) -> Self {
        self.cookies = Some(jar);
        self
    }

    pub fn build(self) -> Result<PoliteClient, reqwest::Error> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let jar = self.cookies.unwrap_or_default();
        let inner = reqwest::blocking::Client::builder()
            .cookie_provider(jar)
            .user_agent(user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(PoliteClient {
            inner,
            delay: Duration::from_millis(self.delay_ms),
            last_request: None,
        })
    }
}
