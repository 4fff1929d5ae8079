/// Run configuration for the catalog scraper
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Public LionPath host.
pub const LIONPATH_BASE_URL: &str = "https://public.lionpath.psu.edu";

/// How scraped courses are written out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jsonl,
    Json,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jsonl" => Ok(OutputFormat::Jsonl),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(format!("unknown output format '{other}' (expected jsonl, json or csv)")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Jsonl => "jsonl",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        };
        f.write_str(name)
    }
}

/// Which sections are kept after the search pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampusFilter {
    /// University Park only (`UP`)
    #[default]
    Home,
    /// Every campus (`ALL`)
    All,
    /// Sections whose campus text equals this name
    Named(String),
}

impl FromStr for CampusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("campus filter must not be empty".to_string());
        }
        Ok(match trimmed.to_uppercase().as_str() {
            "UP" => CampusFilter::Home,
            "ALL" => CampusFilter::All,
            _ => CampusFilter::Named(trimmed.to_string()),
        })
    }
}

impl fmt::Display for CampusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CampusFilter::Home => f.write_str("UP"),
            CampusFilter::All => f.write_str("ALL"),
            CampusFilter::Named(name) => f.write_str(name),
        }
    }
}

/// Configuration for one scraping run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// LionPath host, without trailing slash
    pub base_url: String,
    pub output: PathBuf,
    pub format: OutputFormat,
    pub campus: CampusFilter,
    /// Minimum spacing between any two requests
    pub delay: Duration,
    /// Concurrent subject searches
    pub max_workers: usize,
    /// Concurrent class detail fetches
    pub max_detail_workers: usize,
    /// Requests per second across all workers
    pub rate_limit: u32,
    /// Only scrape the first N subjects
    pub max_subjects: Option<usize>,
    /// Extra attempts after a retryable failure
    pub retry_attempts: u32,
    pub request_timeout: Duration,
    pub user_agent: String,
    /// Label stored on every course, e.g. "Fall 2025"
    pub semester: String,
    /// Academic career passed to detail lookups
    pub career: String,
    pub debug: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: LIONPATH_BASE_URL.to_string(),
            output: PathBuf::from("psu_courses_optimized.jsonl"),
            format: OutputFormat::Jsonl,
            campus: CampusFilter::Home,
            delay: Duration::from_millis(200),
            max_workers: 16,
            max_detail_workers: 50,
            rate_limit: 20,
            max_subjects: None,
            retry_attempts: 2,
            request_timeout: Duration::from_secs(10),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36".to_string(),
            semester: "Fall 2025".to_string(),
            career: "UGRD".to_string(),
            debug: false,
        }
    }
}

impl ScrapeConfig {
    /// Size of the shared session pool: one per worker of either kind.
    pub fn session_pool_size(&self) -> usize {
        self.max_workers.max(1) + self.max_detail_workers.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSONL".parse::<OutputFormat>(), Ok(OutputFormat::Jsonl));
        assert_eq!("csv".parse::<OutputFormat>(), Ok(OutputFormat::Csv));
        assert!("xml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_campus_filter_parse() {
        assert_eq!("up".parse::<CampusFilter>(), Ok(CampusFilter::Home));
        assert_eq!("ALL".parse::<CampusFilter>(), Ok(CampusFilter::All));
        assert_eq!(
            "Berks".parse::<CampusFilter>(),
            Ok(CampusFilter::Named("Berks".to_string()))
        );
        assert!(" ".parse::<CampusFilter>().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = ScrapeConfig::default();
        assert_eq!(config.max_workers, 16);
        assert_eq!(config.max_detail_workers, 50);
        assert_eq!(config.rate_limit, 20);
        assert_eq!(config.campus, CampusFilter::Home);
        assert_eq!(config.session_pool_size(), 66);
    }
}
