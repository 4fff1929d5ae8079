//! HTTP access to the public LionPath class search.
//!
//! Every request goes through one shared [`RateLimiter`] and runs on a client checked
//! out of a [`SessionPool`]. PeopleSoft keeps search state in cookies and hidden
//! form fields, so a subject search fetches the search page and posts the form back
//! on the same session.

use crate::config::ScrapeConfig;
use crate::error::ScrapeError;
use crate::search::{extract_form_data, ClassRef, Subject};
use rand::Rng;
use reqwest::{Client, RequestBuilder};
use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

/// Class search component.
const SEARCH_PATH: &str = "/psc/CSPRD/EMPLOYEE/SA/c/PE_SR175_PUBLIC.PE_SR175_CLS_SRCH.GBL";
/// Class detail component.
const DETAIL_PATH: &str = "/psc/CSPRD/EMPLOYEE/SA/c/SA_LEARNER_SERVICES.SSR_SSENRL_DETAIL.GBL";

/// Base delay before the first retry.
const RETRY_BASE: Duration = Duration::from_millis(500);
/// Window the requests-per-second cap is measured over.
const RATE_WINDOW: Duration = Duration::from_secs(1);

/// Delay before retry number `attempt` (1-based): exponential backoff capped at 10
/// seconds, plus 0-20% jitter.
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    let base = base.as_millis() as u64;
    // Exponential backoff: base * 2^min(attempt-1, 5)
    let exponential = base * 2u64.pow(attempt.saturating_sub(1).min(5));
    let capped = exponential.min(10_000);
    let jitter = rand::thread_rng().gen_range(0..=(capped / 5));
    Duration::from_millis(capped + jitter)
}

/// Bounded pool of cookie-carrying HTTP clients.
pub struct SessionPool {
    idle: Mutex<Vec<Client>>,
    capacity: usize,
    user_agent: String,
    timeout: Duration,
}

impl SessionPool {
    pub fn new(capacity: usize, user_agent: &str, timeout: Duration) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(capacity)),
            capacity: capacity.max(1),
            user_agent: user_agent.to_string(),
            timeout,
        }
    }

    /// Takes an idle client, or builds a new one when none is idle.
    pub fn checkout(&self) -> Result<PooledSession<'_>, ScrapeError> {
        let reused = match self.idle.lock() {
            Ok(mut idle) => idle.pop(),
            Err(_) => None,
        };

        let client = match reused {
            Some(client) => client,
            None => self.build_client()?,
        };

        Ok(PooledSession { client, pool: self })
    }

    /// Number of clients waiting to be reused.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    fn give_back(&self, client: Client) {
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < self.capacity {
                idle.push(client);
            }
        }
    }

    fn build_client(&self) -> Result<Client, ScrapeError> {
        Client::builder()
            .cookie_store(true)
            .user_agent(&self.user_agent)
            .connect_timeout(self.timeout)
            .timeout(self.timeout)
            .build()
            .map_err(|e| ScrapeError::Network {
                message: format!("Failed to build HTTP client: {}", e),
            })
    }
}

/// A client on loan from a [`SessionPool`]; returned to the pool when dropped.
pub struct PooledSession<'a> {
    client: Client,
    pool: &'a SessionPool,
}

impl Deref for PooledSession<'_> {
    type Target = Client;

    fn deref(&self) -> &Client {
        &self.client
    }
}

impl Drop for PooledSession<'_> {
    fn drop(&mut self) {
        self.pool.give_back(self.client.clone());
    }
}

/// Global request gate: at most `limit` requests in any one-second window, and at
/// least `min_delay` between consecutive requests.
pub struct RateLimiter {
    limit: usize,
    min_delay: Duration,
    state: tokio::sync::Mutex<RateState>,
}

#[derive(Default)]
struct RateState {
    recent: VecDeque<Instant>,
    last: Option<Instant>,
}

impl RateLimiter {
    pub fn new(requests_per_second: u32, min_delay: Duration) -> Self {
        Self {
            limit: requests_per_second.max(1) as usize,
            min_delay,
            state: tokio::sync::Mutex::new(RateState::default()),
        }
    }

    /// Waits until a request may be sent and records it.
    ///
    /// The lock is held while waiting, so callers are let through one at a time in
    /// arrival order.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;

        loop {
            let now = Instant::now();
            while state
                .recent
                .front()
                .is_some_and(|t| now.duration_since(*t) >= RATE_WINDOW)
            {
                state.recent.pop_front();
            }

            let spacing = state
                .last
                .map(|last| self.min_delay.saturating_sub(now.duration_since(last)))
                .unwrap_or(Duration::ZERO);
            let window = match state.recent.front() {
                Some(oldest) if state.recent.len() >= self.limit => {
                    RATE_WINDOW.saturating_sub(now.duration_since(*oldest))
                }
                _ => Duration::ZERO,
            };

            let wait = spacing.max(window);
            if wait.is_zero() {
                state.recent.push_back(now);
                state.last = Some(now);
                return;
            }
            tokio::time::sleep(wait).await;
        }
    }
}

/// Client for the LionPath search and detail pages.
pub struct CatalogClient {
    base_url: Url,
    career: String,
    retry_attempts: u32,
    pool: SessionPool,
    limiter: RateLimiter,
}

impl CatalogClient {
    pub fn new(config: &ScrapeConfig) -> Result<Self, ScrapeError> {
        Ok(Self {
            base_url: Url::parse(&config.base_url)?,
            career: config.career.clone(),
            retry_attempts: config.retry_attempts,
            pool: SessionPool::new(
                config.session_pool_size(),
                &config.user_agent,
                config.request_timeout,
            ),
            limiter: RateLimiter::new(config.rate_limit, config.delay),
        })
    }

    pub fn search_url(&self) -> Result<Url, ScrapeError> {
        let mut url = self.base_url.join(SEARCH_PATH)?;
        url.query_pairs_mut()
            .append_pair("Page", "PE_SR175_CLS_SRCH")
            .append_pair("Action", "U");
        Ok(url)
    }

    /// Absolute detail page URL for a class.
    pub fn detail_url(&self, class_ref: &ClassRef) -> Result<Url, ScrapeError> {
        let mut url = self.base_url.join(DETAIL_PATH)?;
        url.query_pairs_mut()
            .append_pair("Page", "SSR_SSENRL_DETAIL")
            .append_pair("Action", "A")
            .append_pair("STRM", &class_ref.term)
            .append_pair("CLASS_NBR", &class_ref.class_number)
            .append_pair("ACAD_CAREER", &self.career);
        Ok(url)
    }

    /// Fetches the class search page with its subject list.
    pub async fn fetch_search_page(&self) -> Result<String, ScrapeError> {
        let url = self.search_url()?;
        let session = self.pool.checkout()?;
        self.send(&session, |client| client.get(url.clone())).await
    }

    /// Runs a search for one subject and returns the results page.
    pub async fn fetch_subject_results(&self, subject: &Subject) -> Result<String, ScrapeError> {
        let url = self.search_url()?;
        let session = self.pool.checkout()?;

        // Fresh form state for this session
        let search_page = self.send(&session, |client| client.get(url.clone())).await?;
        let mut form = extract_form_data(&search_page);
        form.insert(subject.checkbox_id.clone(), "Y".to_string());
        form.insert("ICAction".to_string(), subject.checkbox_id.clone());

        debug!(subject = %subject.code, fields = form.len(), "Posting subject search");
        self.send(&session, |client| client.post(url.clone()).form(&form))
            .await
    }

    /// Fetches one class detail page.
    pub async fn fetch_detail(&self, class_ref: &ClassRef) -> Result<String, ScrapeError> {
        let url = self.detail_url(class_ref)?;
        let session = self.pool.checkout()?;
        self.send(&session, |client| client.get(url.clone())).await
    }

    /// Sends a request through the rate limiter, retrying transient failures.
    async fn send<F>(&self, client: &Client, build: F) -> Result<String, ScrapeError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            self.limiter.acquire().await;
            match execute(build(client)).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt < self.retry_attempts => {
                    attempt += 1;
                    let delay = retry_delay(RETRY_BASE, attempt);
                    warn!(
                        error = %e,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn execute(request: RequestBuilder) -> Result<String, ScrapeError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::HttpStatus {
            status: status.as_u16(),
            url: response.url().to_string(),
        });
    }
    Ok(response.text().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_backoff() {
        let base = Duration::from_millis(500);

        let d1 = retry_delay(base, 1);
        let d2 = retry_delay(base, 2);
        let d3 = retry_delay(base, 3);

        // Each should be roughly double (with jitter)
        assert!(d1 >= Duration::from_millis(500) && d1 <= Duration::from_millis(600));
        assert!(d2 > d1);
        assert!(d3 > d2);
        assert!(retry_delay(base, 20) <= Duration::from_millis(12_000));
    }

    #[test]
    fn test_detail_url() {
        let client = CatalogClient::new(&ScrapeConfig::default()).unwrap();
        let url = client.detail_url(&ClassRef::new("2258", "12345")).unwrap();

        assert_eq!(url.host_str(), Some("public.lionpath.psu.edu"));
        assert_eq!(url.path(), DETAIL_PATH);
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("STRM".into(), "2258".into())));
        assert!(pairs.contains(&("CLASS_NBR".into(), "12345".into())));
        assert!(pairs.contains(&("ACAD_CAREER".into(), "UGRD".into())));
    }

    #[test]
    fn test_session_pool_reuse() {
        let pool = SessionPool::new(1, "test-agent", Duration::from_secs(5));
        assert_eq!(pool.idle_count(), 0);

        {
            let _a = pool.checkout().unwrap();
            let _b = pool.checkout().unwrap();
        }
        // Only one fits back into the pool
        assert_eq!(pool.idle_count(), 1);

        let _c = pool.checkout().unwrap();
        assert_eq!(pool.idle_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_window() {
        let limiter = RateLimiter::new(2, Duration::ZERO);
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(10));

        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_min_delay() {
        let limiter = RateLimiter::new(100, Duration::from_millis(200));
        let start = Instant::now();

        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(400));
    }
}
