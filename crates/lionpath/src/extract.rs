//! Generic field extraction over LionPath pages.
//!
//! Fields are described by a [`FieldRule`]: an ordered list of strategies (a CSS
//! selector, label lookup in the DOM, or a regex over the page's flattened text) plus
//! the checks a candidate value must pass. One rule is evaluated by [`FieldRule::apply`]; the first strategy
//! producing an acceptable value wins.

use crate::error::ExtractionMiss;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static LABEL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span, td, label, dt, b, strong, div").unwrap());
static DIGITS_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d[\d,]*").unwrap());

/// Slack allowed between a label's own text and the label being searched for,
/// e.g. "Class Capacity:" matching "Capacity".
const LABEL_SLACK: usize = 16;

/// A parsed page together with its flattened text.
pub struct Page {
    pub document: Html,
    /// All visible text nodes, trimmed, one per line
    pub text: String,
}

impl Page {
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let text = flatten_text(&document);
        Self { document, text }
    }
}

/// Flattens a document into its visible text, one text node per line.
///
/// Script and style contents are skipped, and so are grid header cells: a column
/// heading followed by the next heading would otherwise read as a label and value.
pub fn flatten_text(document: &Html) -> String {
    let mut lines = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(ElementRef::wrap)
            .map(|p| matches!(p.value().name(), "script" | "style" | "noscript"))
            .unwrap_or(false);
        let in_header = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(is_header_cell);
        if hidden || in_header {
            continue;
        }
        let collapsed = collapse_whitespace(text);
        if !collapsed.is_empty() {
            lines.push(collapsed);
        }
    }
    lines.join("\n")
}

/// Text nodes inside an element, trimmed, one per line.
pub fn element_lines(element: ElementRef) -> String {
    element
        .text()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Joins all text inside an element, collapsing runs of whitespace.
pub fn element_text(element: ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Looks up the value displayed next to any of `labels`, tried in order.
///
/// For each label, finds a leaf element whose text matches it (case-insensitive), then
/// reads the next sibling element. If there is no sibling, or it just repeats the
/// label, the parent's next sibling is read instead. Returns `None` when no label
/// yields a value.
pub fn extract_label(document: &Html, labels: &[&str]) -> Option<String> {
    labels
        .iter()
        .find_map(|label| find_label_value(document, label))
}

fn find_label_value(document: &Html, label: &str) -> Option<String> {
    let needle = label.to_lowercase();

    for element in document.select(&LABEL_SELECTOR) {
        if element.children().any(|c| c.value().is_element()) {
            continue;
        }
        if element.ancestors().filter_map(ElementRef::wrap).any(is_header_cell) {
            continue;
        }
        let text = element_text(element);
        if !is_label_text(&text, &needle) {
            continue;
        }

        if let Some(value) = sibling_value(element, &text, label) {
            return Some(value);
        }
        if let Some(parent) = element.parent().and_then(ElementRef::wrap) {
            if let Some(value) = sibling_value(parent, &text, label) {
                return Some(value);
            }
        }
    }

    None
}

fn is_label_text(text: &str, needle: &str) -> bool {
    let normalized = text.trim().trim_end_matches(':').trim().to_lowercase();
    normalized == needle
        || (normalized.contains(needle) && normalized.len() <= needle.len() + LABEL_SLACK)
}

/// Column headings of a grid: `th` cells and anything inside `thead`.
fn is_header_cell(element: ElementRef) -> bool {
    matches!(element.value().name(), "th" | "thead")
}

fn sibling_value(element: ElementRef, label_text: &str, label: &str) -> Option<String> {
    let next = element.next_siblings().find_map(ElementRef::wrap)?;
    if is_header_cell(next) {
        return None;
    }
    let value = element_text(next);
    let echo = value.trim_end_matches(':');
    if value.is_empty() || echo.eq_ignore_ascii_case(label_text) || echo.eq_ignore_ascii_case(label)
    {
        None
    } else {
        Some(value)
    }
}

/// Returns capture group 1 (or the whole match) of `pattern` over flattened text.
pub fn extract_regex(text: &str, pattern: &Regex) -> Option<String> {
    let caps = pattern.captures(text)?;
    caps.get(1)
        .or_else(|| caps.get(0))
        .map(|m| collapse_whitespace(m.as_str()))
        .filter(|s| !s.is_empty())
}

/// Parses a count such as "50" or "1,204". Anything else is a miss; callers keep the
/// field at zero.
pub fn parse_count(field: &'static str, raw: &str) -> Result<u32, ExtractionMiss> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned
        .parse::<u32>()
        .map_err(|_| ExtractionMiss::NotNumeric {
            field,
            value: raw.trim().to_string(),
        })
}

/// How a candidate value is located.
pub enum Strategy {
    /// First non-empty element matching a CSS selector
    Element(Selector),
    /// Label lookup in the DOM, synonyms tried in order
    Label(Vec<&'static str>),
    /// Regex over the flattened text; group 1 is the value
    Pattern(Regex),
}

/// Declarative description of one field.
pub struct FieldRule {
    pub name: &'static str,
    strategies: Vec<Strategy>,
    placeholders: Vec<&'static str>,
    min_len: usize,
    normalize: Option<fn(&str) -> Option<String>>,
    keep_lines: bool,
}

impl FieldRule {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            strategies: Vec::new(),
            placeholders: Vec::new(),
            min_len: 1,
            normalize: None,
            keep_lines: false,
        }
    }

    /// Adds a selector strategy, e.g. a PeopleSoft field id such as
    /// `[id*='DESCRLONG']`.
    pub fn selector(mut self, css: &str) -> Self {
        self.strategies
            .push(Strategy::Element(Selector::parse(css).unwrap()));
        self
    }

    pub fn label(mut self, labels: &[&'static str]) -> Self {
        self.strategies.push(Strategy::Label(labels.to_vec()));
        self
    }

    /// Adds a regex strategy. Patterns are fixed at compile time, so a bad one panics
    /// on first use.
    pub fn pattern(mut self, pattern: &str) -> Self {
        self.strategies
            .push(Strategy::Pattern(Regex::new(pattern).unwrap()));
        self
    }

    /// Site text that means "no value", e.g. "No Class Notes".
    pub fn placeholder(mut self, text: &'static str) -> Self {
        self.placeholders.push(text);
        self
    }

    pub fn min_len(mut self, len: usize) -> Self {
        self.min_len = len;
        self
    }

    /// Keeps line breaks between text nodes instead of collapsing them, for list
    /// fields split afterwards.
    pub fn keep_lines(mut self) -> Self {
        self.keep_lines = true;
        self
    }

    /// Post-processes a candidate; `None` rejects it as malformed.
    pub fn normalize(mut self, f: fn(&str) -> Option<String>) -> Self {
        self.normalize = Some(f);
        self
    }

    /// Evaluates the strategies in order and returns the first acceptable value.
    ///
    /// When nothing is accepted, the most specific miss is returned: a rejected
    /// candidate (placeholder, too short, malformed) beats `NotFound`.
    pub fn apply(&self, page: &Page) -> Result<String, ExtractionMiss> {
        let mut miss = ExtractionMiss::NotFound { field: self.name };

        for strategy in &self.strategies {
            let candidate = match strategy {
                Strategy::Element(selector) => page
                    .document
                    .select(selector)
                    .map(element_lines)
                    .find(|text| !text.is_empty()),
                Strategy::Label(labels) => extract_label(&page.document, labels),
                Strategy::Pattern(re) => extract_regex(&page.text, re),
            };
            let Some(candidate) = candidate else {
                continue;
            };
            match self.check(candidate) {
                Ok(value) => return Ok(value),
                Err(rejected) => miss = rejected,
            }
        }

        Err(miss)
    }

    /// Evaluates the rule and parses the result as a count.
    pub fn apply_count(&self, page: &Page) -> Result<u32, ExtractionMiss> {
        let raw = self.apply(page)?;
        let digits = DIGITS_REGEX
            .find(&raw)
            .map(|m| m.as_str())
            .unwrap_or(raw.as_str());
        parse_count(self.name, digits)
    }

    fn check(&self, candidate: String) -> Result<String, ExtractionMiss> {
        let candidate = if self.keep_lines {
            candidate
        } else {
            collapse_whitespace(&candidate)
        };
        let lower = candidate.to_lowercase();
        if self
            .placeholders
            .iter()
            .any(|p| lower.contains(&p.to_lowercase()))
        {
            return Err(ExtractionMiss::Placeholder {
                field: self.name,
                value: candidate,
            });
        }

        let value = match self.normalize {
            Some(f) => f(&candidate).ok_or_else(|| ExtractionMiss::Malformed {
                field: self.name,
                value: candidate.clone(),
            })?,
            None => candidate,
        };

        let len = value.chars().count();
        if len < self.min_len {
            return Err(ExtractionMiss::TooShort {
                field: self.name,
                len,
            });
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIBLING_HTML: &str = r#"
        <html><body>
          <div><span>Class Capacity</span><span>50</span></div>
          <table><tr><td><span>Grading Basis</span></td><td>Letter Grades</td></tr></table>
          <div><span>Status:</span></div><div>Open</div>
          <p>Please see the classroom policy.</p>
          <section><div><label>Room</label><label>Room</label></div></section>
          <script>var Status = "junk";</script>
        </body></html>
    "#;

    #[test]
    fn test_label_next_sibling() {
        let page = Page::parse(SIBLING_HTML);
        assert_eq!(
            extract_label(&page.document, &["Class Capacity"]),
            Some("50".to_string())
        );
    }

    #[test]
    fn test_label_falls_back_to_parent_sibling() {
        let page = Page::parse(SIBLING_HTML);
        assert_eq!(
            extract_label(&page.document, &["grading basis"]),
            Some("Letter Grades".to_string())
        );
        assert_eq!(
            extract_label(&page.document, &["Status"]),
            Some("Open".to_string())
        );
    }

    #[test]
    fn test_label_echo_is_not_a_value() {
        let page = Page::parse(SIBLING_HTML);
        assert_eq!(extract_label(&page.document, &["Room"]), None);
    }

    #[test]
    fn test_label_synonyms_in_order() {
        let page = Page::parse(SIBLING_HTML);
        assert_eq!(
            extract_label(&page.document, &["Grading", "Class Capacity"]),
            Some("Letter Grades".to_string())
        );
        assert_eq!(extract_label(&page.document, &["Instructor"]), None);
    }

    #[test]
    fn test_grid_headers_are_not_labels() {
        let page = Page::parse(
            r#"<table>
                 <tr><th>Room</th><th>Instructor</th><th>Meeting Dates</th></tr>
                 <tr><td></td><td></td><td>08/25/2025 - 12/12/2025</td></tr>
               </table>
               <table><thead><tr><td><span>Building</span></td><td>Days</td></tr></thead></table>"#,
        );
        assert_eq!(extract_label(&page.document, &["Room"]), None);
        assert_eq!(extract_label(&page.document, &["Instructor"]), None);
        assert_eq!(extract_label(&page.document, &["Building"]), None);
        assert!(!page.text.contains("Room"));
        assert!(page.text.contains("08/25/2025"));

        let rule = FieldRule::new("room")
            .label(&["Room"])
            .pattern(r"(?i)\bRoom[:\s]+([^\n]+)");
        assert_eq!(rule.apply(&page), Err(ExtractionMiss::NotFound { field: "room" }));
    }

    #[test]
    fn test_flatten_skips_scripts() {
        let page = Page::parse(SIBLING_HTML);
        assert!(page.text.contains("Class Capacity\n50"));
        assert!(!page.text.contains("junk"));
    }

    #[test]
    fn test_regex_over_flat_text() {
        let re = Regex::new(r"(?i)\bClass Capacity[:\s]+(\d+)").unwrap();
        assert_eq!(
            extract_regex("Class Capacity\n50\nEnrollment Total\n45", &re),
            Some("50".to_string())
        );
        assert_eq!(extract_regex("Capacity unknown", &re), None);
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("class_capacity", "1,204"), Ok(1204));
        assert!(matches!(
            parse_count("class_capacity", "TBA"),
            Err(ExtractionMiss::NotNumeric { .. })
        ));
    }

    #[test]
    fn test_rule_placeholder_and_fallback() {
        let page = Page::parse(
            "<div><span>Class Notes</span><span>No Class Notes</span></div>",
        );
        let rule = FieldRule::new("class_notes")
            .label(&["Class Notes"])
            .placeholder("No Class Notes");
        assert_eq!(
            rule.apply(&page),
            Err(ExtractionMiss::Placeholder {
                field: "class_notes",
                value: "No Class Notes".into()
            })
        );

        let rule = FieldRule::new("grading")
            .label(&["Grading Basis"])
            .pattern(r"(?i)\bGrading[:\s]+([^\n]+)");
        let page = Page::parse("<p>Grading: Letter Grades</p>");
        assert_eq!(rule.apply(&page), Ok("Letter Grades".to_string()));
    }

    #[test]
    fn test_rule_selector_strategy() {
        let page = Page::parse(
            r#"<span id="SSR_CLS_DTL_WRK_SSR_CRSE_ATTR_LONG">GenEd: Quantification<br>US Cultures</span>"#,
        );
        let rule = FieldRule::new("class_attributes")
            .selector("[id*='CRSE_ATTR_LONG']")
            .keep_lines();
        assert_eq!(
            rule.apply(&page),
            Ok("GenEd: Quantification\nUS Cultures".to_string())
        );

        let collapsed = FieldRule::new("class_attributes").selector("[id*='CRSE_ATTR_LONG']");
        assert_eq!(
            collapsed.apply(&page),
            Ok("GenEd: Quantification US Cultures".to_string())
        );
    }

    #[test]
    fn test_rule_min_len_and_count() {
        let page = Page::parse("<div><span>Description</span><span>TBA</span></div>");
        let rule = FieldRule::new("course_description")
            .label(&["Description"])
            .min_len(50);
        assert_eq!(
            rule.apply(&page),
            Err(ExtractionMiss::TooShort {
                field: "course_description",
                len: 3
            })
        );

        let page = Page::parse("<div><span>Class Capacity</span><span>1,204</span></div>");
        let rule = FieldRule::new("class_capacity").label(&["Class Capacity"]);
        assert_eq!(rule.apply_count(&page), Ok(1204));

        let page = Page::parse("<div><span>Wait List Total</span><span>7 students</span></div>");
        let rule = FieldRule::new("waitlist_total").label(&["Wait List Total"]);
        assert_eq!(rule.apply_count(&page), Ok(7));

        let missing = FieldRule::new("waitlist_capacity").label(&["Wait List Capacity"]);
        assert_eq!(
            missing.apply_count(&page),
            Err(ExtractionMiss::NotFound {
                field: "waitlist_capacity"
            })
        );
    }
}
