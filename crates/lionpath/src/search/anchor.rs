//! Parsing of class-listing anchors such as `CMPSC 131 - 001 - University Park`.

use super::campus::resolve_campus;
use crate::error::ScrapeError;
use crate::types::Section;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

// Subjects like "A-I" first, then plain two-or-more letter subjects.
static HYPHENATED_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]+-[A-Z]+)\s+(\d+[A-Z]*)").unwrap());
static PLAIN_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]{2,})\s+(\d+[A-Z]*)").unwrap());
static SECTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{3}[A-Z]*|[A-Z]\d{2}|\d{2,3})").unwrap());
static CLASS_REF_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"showClassDetails\((\d+),\s*(\d+)\)").unwrap());

/// Subject plus catalog number, e.g. `CMPSC` + `131`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CourseCode {
    pub subject: String,
    pub catalog_number: String,
}

impl CourseCode {
    /// Matches a course code at the start of `text`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        [&*HYPHENATED_CODE_REGEX, &*PLAIN_CODE_REGEX]
            .into_iter()
            .find_map(|re| re.captures(text))
            .map(|caps| CourseCode {
                subject: caps[1].to_string(),
                catalog_number: caps[2].to_string(),
            })
    }
}

impl fmt::Display for CourseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.subject, self.catalog_number)
    }
}

/// The two identifiers that address a class detail page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassRef {
    /// PeopleSoft term id (STRM), e.g. "2258"
    pub term: String,
    pub class_number: String,
}

impl ClassRef {
    pub fn new(term: impl Into<String>, class_number: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            class_number: class_number.into(),
        }
    }

    /// Finds a `showClassDetails(<term>,<class>)` call anywhere in `text`.
    pub fn find(text: &str) -> Option<Self> {
        CLASS_REF_REGEX
            .captures(text)
            .map(|caps| ClassRef::new(&caps[1], &caps[2]))
    }
}

impl fmt::Display for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "showClassDetails({},{})", self.term, self.class_number)
    }
}

impl FromStr for ClassRef {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClassRef::find(s).ok_or_else(|| ScrapeError::InvalidClassRef {
            reference: s.to_string(),
        })
    }
}

/// A section fresh from the search results, paired with the course code it was
/// listed under.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSection {
    pub course_code: String,
    pub section: Section,
}

/// Parses one listing anchor. Returns `None` when the text does not start with a
/// course code.
pub fn parse_anchor(text: &str, class_ref: &ClassRef, scraped_at: &str) -> Option<ParsedSection> {
    let text = text.trim();
    let code = CourseCode::parse(text)?;

    let parts: Vec<&str> = text.split(" - ").collect();
    let mut section_label = String::new();
    let mut campus = String::new();

    if parts.len() > 1 {
        if let Some(m) = SECTION_REGEX.find(parts[1]) {
            section_label = m.as_str().to_string();
        }
        let remainder = parts[1..].join(" - ");
        campus = resolve_campus(&remainder, &section_label);
    }

    Some(ParsedSection {
        course_code: code.to_string(),
        section: Section {
            section: section_label,
            class_number: class_ref.class_number.clone(),
            campus,
            detail_ref: class_ref.to_string(),
            scrape_timestamp: scraped_at.to_string(),
            ..Default::default()
        },
    })
}
