//! Orchestrates a full scrape: subjects, search results, detail pages.
//!
//! Subject searches and detail fetches each run on their own bounded pool of
//! concurrent requests. Per-task failures are counted and skipped; only an unusable
//! search page aborts the run. Ctrl-C stops the current phase and keeps what was
//! already gathered.

use crate::client::CatalogClient;
use crate::config::ScrapeConfig;
use crate::detail::{parse_detail_page, DetailPage};
use crate::error::ScrapeError;
use crate::reconcile::Catalog;
use crate::search::{parse_search_results, parse_subjects, ClassRef, ParsedSection, Subject};
use dashmap::DashMap;
use futures::{pin_mut, stream, StreamExt};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Counts reported at the end of every run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapeSummary {
    pub subjects_total: usize,
    pub subjects_processed: usize,
    /// Codes of subjects whose search failed
    pub subjects_failed: Vec<String>,
    /// Sections parsed from search results, before campus filtering
    pub sections_found: usize,
    /// Sections left after campus filtering and grouping
    pub sections_kept: usize,
    pub courses: usize,
    pub details_enriched: usize,
    pub details_failed: usize,
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl ScrapeSummary {
    pub fn sections_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.sections_kept as f64 / secs
        } else {
            0.0
        }
    }

    pub fn log(&self) {
        info!(
            subjects_total = self.subjects_total,
            subjects_processed = self.subjects_processed,
            subjects_failed = self.subjects_failed.len(),
            sections_found = self.sections_found,
            sections_kept = self.sections_kept,
            courses = self.courses,
            details_enriched = self.details_enriched,
            details_failed = self.details_failed,
            elapsed_secs = self.elapsed.as_secs_f64(),
            interrupted = self.interrupted,
            "Scrape finished"
        );
        if !self.subjects_failed.is_empty() {
            warn!(subjects = ?self.subjects_failed, "Some subject searches failed");
        }
    }
}

impl fmt::Display for ScrapeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Subjects: {}/{} processed, {} failed",
            self.subjects_processed,
            self.subjects_total,
            self.subjects_failed.len()
        )?;
        writeln!(
            f,
            "Sections: {} found, {} kept",
            self.sections_found, self.sections_kept
        )?;
        writeln!(f, "Courses: {}", self.courses)?;
        writeln!(
            f,
            "Detail pages: {} enriched, {} failed",
            self.details_enriched, self.details_failed
        )?;
        write!(
            f,
            "Elapsed: {:.1}s ({:.1} sections/s){}",
            self.elapsed.as_secs_f64(),
            self.sections_per_second(),
            if self.interrupted { ", interrupted" } else { "" }
        )
    }
}

/// Result of a run: the catalog plus its summary.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub catalog: Catalog,
    pub summary: ScrapeSummary,
}

pub struct Scraper {
    config: ScrapeConfig,
    client: CatalogClient,
}

impl Scraper {
    pub fn new(config: ScrapeConfig) -> Result<Self, ScrapeError> {
        let client = CatalogClient::new(&config)?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// Runs the whole pipeline.
    ///
    /// Fails only when the subject list cannot be obtained; every other failure is
    /// counted in the summary.
    pub async fn run(&self) -> Result<ScrapeOutcome, ScrapeError> {
        let start = Instant::now();
        let mut summary = ScrapeSummary::default();

        // Step 1: subject list
        let subjects = self.list_subjects().await?;
        summary.subjects_total = subjects.len();
        info!(
            subjects = subjects.len(),
            campus = %self.config.campus,
            "Starting subject searches"
        );

        // Step 2: search every subject, then filter by campus
        let found = self.search_subjects(subjects, &mut summary).await;
        summary.sections_found = found.len();
        let kept: Vec<ParsedSection> = found
            .into_iter()
            .filter(|p| self.config.campus.admits(&p.section))
            .collect();

        // Step 3: group into courses
        let mut catalog = Catalog::group(kept, &self.config.semester);
        summary.courses = catalog.len();
        summary.sections_kept = catalog.section_count();
        info!(
            courses = summary.courses,
            sections = summary.sections_kept,
            "Grouped sections into courses"
        );

        // Step 4: detail pages
        if !summary.interrupted {
            let details = self.fetch_details(&mut catalog, &mut summary).await;
            catalog.apply_details(&details);
        }

        summary.elapsed = start.elapsed();
        summary.log();
        Ok(ScrapeOutcome { catalog, summary })
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, ScrapeError> {
        let html = self
            .client
            .fetch_search_page()
            .await
            .map_err(|e| ScrapeError::SearchUnavailable {
                message: e.to_string(),
            })?;

        let mut subjects = parse_subjects(&html);
        if subjects.is_empty() {
            return Err(ScrapeError::SearchUnavailable {
                message: "search page lists no subjects".to_string(),
            });
        }
        if let Some(cap) = self.config.max_subjects {
            subjects.truncate(cap);
        }
        Ok(subjects)
    }

    /// Searches subjects concurrently. Results are ordered by subject code so that
    /// later grouping does not depend on completion order.
    async fn search_subjects(
        &self,
        subjects: Vec<Subject>,
        summary: &mut ScrapeSummary,
    ) -> Vec<ParsedSection> {
        let scraped_at = chrono::Utc::now().to_rfc3339();
        let mut per_subject: Vec<(String, Vec<ParsedSection>)> = Vec::new();

        let searches = stream::iter(subjects)
            .map(|subject| async move {
                let result = self.client.fetch_subject_results(&subject).await;
                (subject, result)
            })
            .buffer_unordered(self.config.max_workers.max(1))
            .take_until(interrupted());
        pin_mut!(searches);

        while let Some((subject, result)) = searches.next().await {
            match result {
                Ok(html) => {
                    let sections = parse_search_results(&html, &scraped_at);
                    debug!(
                        subject = %subject.code,
                        sections = sections.len(),
                        "Parsed subject results"
                    );
                    summary.subjects_processed += 1;
                    per_subject.push((subject.code, sections));
                }
                Err(e) => {
                    warn!(subject = %subject.code, error = %e, "Subject search failed");
                    summary.subjects_failed.push(subject.code);
                }
            }
        }
        if searches.is_stopped() {
            warn!("Interrupted during subject searches");
            summary.interrupted = true;
        }

        summary.subjects_failed.sort();
        per_subject.sort_by(|a, b| a.0.cmp(&b.0));
        per_subject
            .into_iter()
            .flat_map(|(_, sections)| sections)
            .collect()
    }

    /// Fetches and parses the detail page of every kept section.
    async fn fetch_details(
        &self,
        catalog: &mut Catalog,
        summary: &mut ScrapeSummary,
    ) -> HashMap<String, DetailPage> {
        let mut jobs = Vec::new();
        for section in catalog.sections_mut() {
            let class_ref = match section.detail_ref.parse::<ClassRef>() {
                Ok(class_ref) => class_ref,
                Err(e) => {
                    debug!(class_number = %section.class_number, error = %e, "No detail reference");
                    summary.details_failed += 1;
                    continue;
                }
            };
            match self.client.detail_url(&class_ref) {
                Ok(url) => section.detail_url = url.to_string(),
                Err(e) => {
                    warn!(class_number = %section.class_number, error = %e, "Bad detail URL");
                    summary.details_failed += 1;
                    continue;
                }
            }
            jobs.push(class_ref);
        }

        info!(pages = jobs.len(), "Fetching class detail pages");
        let details: DashMap<String, DetailPage> = DashMap::new();

        // The stream borrows `details`; it must be gone before the map is consumed
        {
            let fetches = stream::iter(jobs)
                .map(|class_ref| {
                    let details = &details;
                    async move {
                        match self.client.fetch_detail(&class_ref).await {
                            Ok(html) => {
                                let fetched_at = chrono::Utc::now().to_rfc3339();
                                let page = parse_detail_page(&html, &fetched_at);
                                details.insert(class_ref.class_number, page);
                                true
                            }
                            Err(e) => {
                                warn!(
                                    class_number = %class_ref.class_number,
                                    error = %e,
                                    "Detail fetch failed"
                                );
                                false
                            }
                        }
                    }
                })
                .buffer_unordered(self.config.max_detail_workers.max(1))
                .take_until(interrupted());
            pin_mut!(fetches);

            let mut done = 0usize;
            while let Some(ok) = fetches.next().await {
                if ok {
                    summary.details_enriched += 1;
                } else {
                    summary.details_failed += 1;
                }
                done += 1;
                if done % 100 == 0 {
                    info!(done, "Detail fetch progress");
                }
            }
            if fetches.is_stopped() {
                warn!("Interrupted during detail fetches");
                summary.interrupted = true;
            }
        }

        details.into_iter().collect()
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const SEARCH_HTML: &str = include_str!("../tests/fixtures/search_results.html");
    const DETAIL_HTML: &str = include_str!("../tests/fixtures/detail_cmpsc131.html");

    type Route = fn(&str) -> (&'static str, &'static str);

    /// Serves one HTTP/1.1 response per connection, chosen by `route` from the raw
    /// request text.
    async fn serve_pages(route: Route) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(answer(stream, route));
            }
        });
        addr
    }

    async fn answer(mut stream: TcpStream, route: Route) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let (head_len, body_len) = loop {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                break (pos + 4, len);
            }
        };
        while buf.len() < head_len + body_len {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }

        let request = String::from_utf8_lossy(&buf).to_string();
        let (status, body) = route(&request);
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.ok();
        stream.shutdown().await.ok();
    }

    /// Search and detail pages from the fixtures; the MATH subject search fails.
    fn lionpath_route(request: &str) -> (&'static str, &'static str) {
        if request.contains("SSR_SSENRL_DETAIL") {
            ("200 OK", DETAIL_HTML)
        } else if request.starts_with("POST") && request.contains("ICAction=PTS_SELECT%242") {
            ("500 Internal Server Error", "")
        } else {
            ("200 OK", SEARCH_HTML)
        }
    }

    fn empty_route(_: &str) -> (&'static str, &'static str) {
        ("200 OK", "<html><body><p>Maintenance</p></body></html>")
    }

    fn local_config(base_url: String) -> ScrapeConfig {
        ScrapeConfig {
            base_url,
            delay: Duration::ZERO,
            rate_limit: 1000,
            retry_attempts: 0,
            max_workers: 2,
            max_detail_workers: 2,
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_run_unreachable_search_is_fatal() {
        let scraper = Scraper::new(local_config("http://127.0.0.1:1".to_string())).unwrap();
        let result = scraper.run().await;
        assert!(matches!(result, Err(ScrapeError::SearchUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_run_search_page_without_subjects_is_fatal() {
        let addr = serve_pages(empty_route).await;
        let scraper = Scraper::new(local_config(format!("http://{addr}"))).unwrap();
        let result = scraper.run().await;
        assert!(matches!(result, Err(ScrapeError::SearchUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_run_counts_failed_subject_and_continues() {
        let addr = serve_pages(lionpath_route).await;
        let scraper = Scraper::new(local_config(format!("http://{addr}"))).unwrap();
        let ScrapeOutcome { catalog, summary } = scraper.run().await.unwrap();

        assert_eq!(summary.subjects_total, 3);
        assert_eq!(summary.subjects_processed, 2);
        assert_eq!(summary.subjects_failed, ["MATH"]);
        assert!(!summary.interrupted);

        // A-I and CMPSC both return the same five listings
        assert_eq!(summary.sections_found, 10);
        assert_eq!(summary.sections_kept, 3);
        assert_eq!(summary.courses, 2);
        assert_eq!(summary.details_enriched, 3);
        assert_eq!(summary.details_failed, 0);

        let record = catalog.get("CMPSC 131").unwrap();
        assert_eq!(
            record.course.course_title,
            "Programming and Computation I: Fundamentals"
        );
        let first = &record.sections[0];
        assert_eq!(first.class_number, "12345");
        assert_eq!(first.class_capacity, 50);
        assert!(first.detail_url.starts_with(&format!("http://{addr}/")));
        assert!(first.detail_url.contains("CLASS_NBR=12345"));
    }

    #[tokio::test]
    async fn test_run_respects_subject_cap() {
        let addr = serve_pages(lionpath_route).await;
        let config = ScrapeConfig {
            max_subjects: Some(1),
            ..local_config(format!("http://{addr}"))
        };
        let ScrapeOutcome { summary, .. } = Scraper::new(config).unwrap().run().await.unwrap();

        // Subjects are sorted, so only A-I is searched
        assert_eq!(summary.subjects_total, 1);
        assert_eq!(summary.subjects_processed, 1);
        assert!(summary.subjects_failed.is_empty());
    }

    #[test]
    fn test_summary_rate_and_display() {
        let summary = ScrapeSummary {
            subjects_total: 3,
            subjects_processed: 2,
            subjects_failed: vec!["MATH".into()],
            sections_found: 12,
            sections_kept: 10,
            courses: 4,
            details_enriched: 9,
            details_failed: 1,
            interrupted: false,
            elapsed: Duration::from_secs(5),
        };
        assert_eq!(summary.sections_per_second(), 2.0);

        let text = summary.to_string();
        assert!(text.contains("Subjects: 2/3 processed, 1 failed"));
        assert!(text.contains("Detail pages: 9 enriched, 1 failed"));
        assert!(!text.contains("interrupted"));
    }

    #[test]
    fn test_summary_zero_elapsed() {
        let summary = ScrapeSummary::default();
        assert_eq!(summary.sections_per_second(), 0.0);
    }
}
