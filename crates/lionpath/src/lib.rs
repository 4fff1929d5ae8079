//! Scraper for Penn State's public LionPath class search.
//!
//! Search results are parsed into sections, filtered by campus, grouped into courses
//! and enriched from each class's detail page before being written out.

pub mod client;
pub mod config;
pub mod detail;
pub mod error;
pub mod extract;
pub mod output;
pub mod reconcile;
pub mod scrape;
pub mod search;
pub mod types;

pub use config::{CampusFilter, OutputFormat, ScrapeConfig};
pub use error::{ExtractionMiss, ScrapeError};
pub use reconcile::{Catalog, CourseRecord};
pub use scrape::{ScrapeOutcome, ScrapeSummary, Scraper};
pub use types::{Course, CourseStats, Section, SectionStatus};
