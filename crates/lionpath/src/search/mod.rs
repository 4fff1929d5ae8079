/// Class search page parsing: subject list, form state and result anchors
mod anchor;
mod campus;

pub use anchor::*;
pub use campus::*;

use crate::extract::element_text;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;
use tracing::{debug, trace};

// Static selectors for parsing - compiled once
static SUBJECT_INPUT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input[id^='PTS_SELECT$']").unwrap());
static LABEL_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("label").unwrap());
static HIDDEN_INPUT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input[type='hidden'], input[type='HIDDEN']").unwrap());
static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static SUBJECT_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]+(-[A-Z]+)?$").unwrap());
static RAW_ANCHOR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"showClassDetails\((\d+),\s*(\d+)\)[^>]*>([^<]+)<").unwrap()
});

const SUBJECT_INPUT_PREFIX: &str = "PTS_SELECT$";
const SUBJECT_LABEL_PREFIX: &str = "PTS_SELECT_LBL$";

/// A subject offered in the class search form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    /// e.g. "CMPSC"
    pub code: String,
    /// e.g. "Computer Science"
    pub name: String,
    /// Form field that selects this subject, e.g. "PTS_SELECT$12"
    pub checkbox_id: String,
}

/// Reads the subject checkboxes off the class search page.
///
/// Labels look like `CMPSC / Computer Science`. Entries whose code is not a plain
/// (optionally hyphenated) uppercase subject are skipped. Sorted by code.
pub fn parse_subjects(html: &str) -> Vec<Subject> {
    let document = Html::parse_document(html);

    // Label text keyed by checkbox index, from either id or for attributes
    let mut labels: HashMap<String, String> = HashMap::new();
    for label in document.select(&LABEL_SELECTOR) {
        let key = label
            .value()
            .attr("id")
            .and_then(|id| id.strip_prefix(SUBJECT_LABEL_PREFIX))
            .or_else(|| {
                label
                    .value()
                    .attr("for")
                    .and_then(|f| f.strip_prefix(SUBJECT_INPUT_PREFIX))
            });
        if let Some(key) = key {
            labels
                .entry(key.to_string())
                .or_insert_with(|| element_text(label));
        }
    }

    let mut subjects = Vec::new();
    for input in document.select(&SUBJECT_INPUT_SELECTOR) {
        let Some(checkbox_id) = input.value().attr("id") else {
            continue;
        };
        let Some(index) = checkbox_id.strip_prefix(SUBJECT_INPUT_PREFIX) else {
            continue;
        };
        let Some(text) = labels.get(index) else {
            trace!(checkbox_id, "Subject checkbox without label");
            continue;
        };
        if let Some(subject) = parse_subject_label(text, checkbox_id) {
            subjects.push(subject);
        }
    }

    subjects.sort_by(|a, b| a.code.cmp(&b.code));
    subjects.dedup_by(|a, b| a.code == b.code);
    debug!("Parsed {} subjects from search page", subjects.len());
    subjects
}

fn parse_subject_label(text: &str, checkbox_id: &str) -> Option<Subject> {
    let text = text.trim();
    if text.len() <= 5 {
        return None;
    }
    let (code, name) = text.split_once('/')?;
    let code = code.trim();
    if !SUBJECT_CODE_REGEX.is_match(code) {
        return None;
    }
    let name = match name.trim() {
        "" => code,
        name => name,
    };

    Some(Subject {
        code: code.to_string(),
        name: name.to_string(),
        checkbox_id: checkbox_id.to_string(),
    })
}

/// Collects every hidden form field so the search form can be posted back.
pub fn extract_form_data(html: &str) -> BTreeMap<String, String> {
    let document = Html::parse_document(html);
    document
        .select(&HIDDEN_INPUT_SELECTOR)
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

/// Parses every class listing on a search results page.
///
/// Anchors are located through their `showClassDetails(<term>,<class>)` call in
/// `href` or `onclick`; if the DOM yields none, the raw HTML is scanned instead.
/// Each class number is kept once, first accepted anchor wins.
pub fn parse_search_results(html: &str, scraped_at: &str) -> Vec<ParsedSection> {
    let mut candidates: Vec<(ClassRef, String)> = Vec::new();

    // Strategy 1: anchors in the DOM
    {
        let document = Html::parse_document(html);
        for anchor in document.select(&ANCHOR_SELECTOR) {
            let class_ref = ["href", "onclick"]
                .iter()
                .filter_map(|attr| anchor.value().attr(attr))
                .find_map(ClassRef::find);
            if let Some(class_ref) = class_ref {
                candidates.push((class_ref, element_text(anchor)));
            }
        }
    }

    // Strategy 2: raw markup scan
    if candidates.is_empty() {
        for caps in RAW_ANCHOR_REGEX.captures_iter(html) {
            candidates.push((ClassRef::new(&caps[1], &caps[2]), caps[3].trim().to_string()));
        }
    }

    let mut seen = HashSet::new();
    let mut sections = Vec::new();
    for (class_ref, text) in candidates {
        if seen.contains(&class_ref.class_number) {
            continue;
        }
        match parse_anchor(&text, &class_ref, scraped_at) {
            Some(parsed) => {
                seen.insert(class_ref.class_number.clone());
                sections.push(parsed);
            }
            None => trace!(text = %text, "Skipping listing without course code"),
        }
    }

    sections
}
