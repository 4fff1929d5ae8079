use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use lionpath::output::write_catalog;
use lionpath::{CampusFilter, OutputFormat, ScrapeConfig, ScrapeOutcome, Scraper};

#[derive(Parser, Debug)]
#[command(name = "lionpath", about = "Scrape Penn State's public LionPath class search")]
struct Cli {
    /// Output file
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Output format: jsonl, json or csv
    #[arg(short, long)]
    format: Option<OutputFormat>,
    /// Campus to keep: UP, ALL, or a campus name (e.g. "Berks")
    #[arg(short, long)]
    campus: Option<CampusFilter>,
    /// Minimum seconds between requests
    #[arg(long)]
    delay: Option<f64>,
    /// Concurrent subject searches
    #[arg(long)]
    max_workers: Option<usize>,
    /// Concurrent class detail fetches
    #[arg(long)]
    max_detail_workers: Option<usize>,
    /// Requests per second across all workers
    #[arg(long)]
    rate_limit: Option<u32>,
    /// Only scrape the first N subjects (useful for testing)
    #[arg(long)]
    max_subjects: Option<usize>,
    /// Extra attempts after a transient failure
    #[arg(long)]
    retry_attempts: Option<u32>,
    /// Semester label stored on every course
    #[arg(long)]
    semester: Option<String>,
    /// Verbose logging
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<ScrapeConfig> {
        let mut config = ScrapeConfig::default();
        if let Some(output) = self.output {
            config.output = output;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(campus) = self.campus {
            config.campus = campus;
        }
        if let Some(delay) = self.delay {
            config.delay = Duration::try_from_secs_f64(delay)
                .with_context(|| format!("invalid --delay {delay}"))?;
        }
        if let Some(workers) = self.max_workers {
            config.max_workers = workers;
        }
        if let Some(workers) = self.max_detail_workers {
            config.max_detail_workers = workers;
        }
        if let Some(rate) = self.rate_limit {
            config.rate_limit = rate;
        }
        if let Some(attempts) = self.retry_attempts {
            config.retry_attempts = attempts;
        }
        if let Some(semester) = self.semester {
            config.semester = semester;
        }
        config.max_subjects = self.max_subjects;
        config.debug = self.debug;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .init();

    let config = cli.into_config()?;
    let scraper = Scraper::new(config)?;
    let ScrapeOutcome { catalog, summary } = scraper.run().await?;

    let config = scraper.config();
    write_catalog(&config.output, config.format, &catalog)
        .with_context(|| format!("failed to write {}", config.output.display()))?;

    println!("{summary}");
    println!(
        "Saved {} courses ({} sections) to {}",
        catalog.len(),
        catalog.section_count(),
        config.output.display()
    );
    Ok(())
}
