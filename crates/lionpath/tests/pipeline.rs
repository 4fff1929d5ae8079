//! Offline run of the full pipeline over saved LionPath pages.

use lionpath::detail::parse_detail_page;
use lionpath::output::{read_jsonl, write_csv, write_jsonl};
use lionpath::search::{extract_form_data, parse_search_results, parse_subjects};
use lionpath::{CampusFilter, Catalog, SectionStatus};
use std::collections::HashMap;

const SEARCH_HTML: &str = include_str!("fixtures/search_results.html");
const DETAIL_HTML: &str = include_str!("fixtures/detail_cmpsc131.html");
const SCRAPED_AT: &str = "2025-08-01T12:00:00+00:00";
const FETCHED_AT: &str = "2025-08-01T12:05:00+00:00";

fn home_catalog() -> Catalog {
    let found = parse_search_results(SEARCH_HTML, SCRAPED_AT);
    let kept = found
        .into_iter()
        .filter(|p| CampusFilter::Home.admits(&p.section))
        .collect();
    Catalog::group(kept, "Fall 2025")
}

fn enriched_catalog() -> Catalog {
    let mut catalog = home_catalog();
    let details = HashMap::from([(
        "12345".to_string(),
        parse_detail_page(DETAIL_HTML, FETCHED_AT),
    )]);
    catalog.apply_details(&details);
    catalog
}

#[test]
fn test_search_page_subjects_and_form() {
    let subjects = parse_subjects(SEARCH_HTML);
    let codes: Vec<_> = subjects.iter().map(|s| s.code.as_str()).collect();
    assert_eq!(codes, ["A-I", "CMPSC", "MATH"]);
    assert_eq!(subjects[1].checkbox_id, "PTS_SELECT$0");

    let form = extract_form_data(SEARCH_HTML);
    assert_eq!(form.get("ICSID").map(String::as_str), Some("k2n8Yq"));
    assert!(!form.contains_key("SEARCH_TEXT"));
}

#[test]
fn test_search_results_filter_and_group() {
    let found = parse_search_results(SEARCH_HTML, SCRAPED_AT);
    let numbers: Vec<_> = found.iter().map(|p| p.section.class_number.as_str()).collect();
    assert_eq!(numbers, ["12345", "12346", "12347", "12350", "12360"]);

    let catalog = home_catalog();
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.section_count(), 3);

    let cmpsc131 = catalog.get("CMPSC 131").unwrap();
    let labels: Vec<_> = cmpsc131.sections.iter().map(|s| s.section.as_str()).collect();
    assert_eq!(labels, ["001", "002"]);
    assert_eq!(cmpsc131.sections[0].campus, "UP");
    assert_eq!(cmpsc131.sections[0].detail_ref, "showClassDetails(2258,12345)");

    let cmpsc132 = catalog.get("CMPSC 132").unwrap();
    assert_eq!(cmpsc132.sections.len(), 1);
    assert_eq!(cmpsc132.sections[0].class_number, "12360");
}

#[test]
fn test_all_campuses_keeps_branches() {
    let found = parse_search_results(SEARCH_HTML, SCRAPED_AT);
    let catalog = Catalog::group(
        found
            .into_iter()
            .filter(|p| CampusFilter::All.admits(&p.section))
            .collect(),
        "Fall 2025",
    );
    assert_eq!(catalog.section_count(), 5);

    let stats = catalog.get("CMPSC 131").unwrap().stats();
    assert_eq!(stats.campuses, ["UP", "World Campus"]);
    assert_eq!(
        catalog.get("CMPSC 132").unwrap().stats().campuses,
        ["Berks", "UP"]
    );
}

#[test]
fn test_detail_enrichment() {
    let catalog = enriched_catalog();
    let record = catalog.get("CMPSC 131").unwrap();

    let course = &record.course;
    assert_eq!(course.course_title, "Programming and Computation I: Fundamentals");
    assert_eq!(course.units, "3.00");
    assert_eq!(course.grading, "Letter Grades");
    assert!(course.course_description.starts_with("Introduction to programming"));
    assert!(course.class_attributes.contains("Honors Eligible"));
    assert_eq!(course.last_updated, FETCHED_AT);

    let enriched = &record.sections[0];
    assert_eq!(enriched.status, SectionStatus::Open);
    assert_eq!(enriched.days, "MoWeFr");
    assert_eq!(enriched.class_capacity, 50);
    assert_eq!(enriched.enrollment_total, 45);
    assert_eq!(enriched.available_seats, 5);
    assert_eq!(enriched.scrape_timestamp, FETCHED_AT);

    // Section without a detail page keeps its search-time state
    let plain = &record.sections[1];
    assert_eq!(plain.status, SectionStatus::Unknown);
    assert_eq!(plain.class_capacity, 0);
    assert_eq!(plain.scrape_timestamp, SCRAPED_AT);

    let stats = record.stats();
    assert_eq!(stats.total_capacity, 50);
    assert_eq!(stats.available_seats, 5);
}

#[test]
fn test_jsonl_round_trip_after_enrichment() {
    let catalog = enriched_catalog();
    let mut buf = Vec::new();
    write_jsonl(&mut buf, &catalog).unwrap();

    let lines = read_jsonl(buf.as_slice()).unwrap();
    assert_eq!(lines.len(), catalog.len());
    for line in lines {
        let record = catalog.get(&line.course.course_code).unwrap();
        assert_eq!(line.course, record.course);
        assert_eq!(line.sections, record.sections);
        assert_eq!(line.stats, record.stats());
    }
}

#[test]
fn test_csv_one_row_per_section() {
    let catalog = enriched_catalog();
    let mut buf = Vec::new();
    write_csv(&mut buf, &catalog).unwrap();

    let mut reader = csv::Reader::from_reader(buf.as_slice());
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), catalog.section_count());
}

#[test]
fn test_pipeline_is_deterministic() {
    assert_eq!(enriched_catalog(), enriched_catalog());
}
