//! Class detail page parsing.
//!
//! A detail page carries two kinds of data: section-level fields (schedule, room,
//! enrollment counts, status) that belong to the one class it describes, and
//! course-level fields (description, units, requirements) shared by every section of
//! the course. Both are read in one pass; every field is extracted independently and
//! a failed field is recorded as an [`ExtractionMiss`] without touching the others.

use crate::error::ExtractionMiss;
use crate::extract::{element_lines, element_text, parse_count, FieldRule, Page};
use crate::types::{ExamMeeting, ReserveCapacity, Section, SectionStatus};
use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use scraper::{ElementRef, Selector};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::trace;

// Static selectors for parsing - compiled once
static TABLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static MAILTO_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href^='mailto:']").unwrap());
static IMG_ALT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[alt]").unwrap());

static DAYS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b((?:Mo|Tu|We|Th|Fr|Sa|Su)+)\b").unwrap());
static TIME_RANGE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,2}:\d{2}\s*[AP]M)\s*(?:-|to)\s*(\d{1,2}:\d{2}\s*[AP]M)").unwrap()
});
static DATE_RANGE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2}/\d{1,2}/\d{4})\s*(?:-|to)\s*(\d{1,2}/\d{1,2}/\d{4})").unwrap()
});
static ROOM_CODE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z][A-Z0-9&]*(?:\s+[A-Z][A-Z0-9&]*)*)\s+([A-Z]?\d+[A-Z]?)$").unwrap()
});
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap()
});
static UNITS_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());
static TITLE_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]+(?:-[A-Z]+)?\s+\d+[A-Z]*").unwrap());
static TITLE_SECTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:Section\s+)?\d{3}[A-Z]*\b").unwrap());
static ATTRIBUTE_SPLIT_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[,;\n]").unwrap());

/// Descriptions shorter than this are labels or placeholders, not content.
const MIN_DESCRIPTION_LEN: usize = 51;

// Section-level rules

static STATUS: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("status")
        .label(&["Status"])
        .pattern(r"(?i)\bStatus[:\s]+([^\n]+)")
        .normalize(normalize_status)
});
static SECTION_TYPE: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("section_type")
        .label(&["Class Type", "Section Type", "Component"])
        .pattern(r"(?i)\b(?:Class Type|Section Type|Component)[:\s]+([^\n]+)")
});
static DAYS: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("days")
        .label(&["Days"])
        .pattern(r"(?i)\bDays?[:\s]+([^\n]+)")
        .normalize(normalize_days)
});
static INSTRUCTION_MODE: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("instruction_mode")
        .label(&["Instruction Mode", "Delivery Mode"])
        .pattern(r"(?i)\b(?:Instruction|Delivery) Mode[:\s]+([^\n]+)")
});
static LOCATION: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("location")
        .label(&["Location"])
        .pattern(r"(?i)\bLocation[:\s]+([^\n]+)")
});
static BUILDING: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("building")
        .label(&["Building"])
        .pattern(r"(?i)\bBuilding[:\s]+([^\n]+)")
});
static ROOM: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("room")
        .label(&["Room"])
        .pattern(r"(?i)\bRoom[:\s]+([^\n]+)")
});
static INSTRUCTOR: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("instructor")
        .label(&["Instructor(s)", "Instructor"])
        .pattern(r"(?i)\b(?:Instructors?|Professor|Taught by)[:\s]+([^\n]+)")
});
static CLASS_CAPACITY: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("class_capacity")
        .label(&["Class Capacity"])
        .pattern(r"(?i)\bClass Capacity[:\s]+(\d[\d,]*)")
});
static ENROLLMENT_TOTAL: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("enrollment_total")
        .label(&["Enrollment Total", "Total Enrolled", "Current Enrollment"])
        .pattern(r"(?i)\b(?:Enrollment Total|Total Enrolled|Current Enrollment)[:\s]+(\d[\d,]*)")
});
static AVAILABLE_SEATS: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("available_seats")
        .label(&["Available Seats", "Seats Available"])
        .pattern(r"(?i)\b(?:Available Seats?|Seats Available)[:\s]+(\d[\d,]*)")
});
static WAITLIST_CAPACITY: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("waitlist_capacity")
        .label(&["Wait List Capacity", "Waitlist Capacity"])
        .pattern(r"(?i)\bWait ?List Capacity[:\s]+(\d[\d,]*)")
});
static WAITLIST_TOTAL: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("waitlist_total")
        .label(&["Wait List Total", "Waitlist Total"])
        .pattern(r"(?i)\bWait ?List Total[:\s]+(\d[\d,]*)")
});
static ADD_CONSENT: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("add_consent")
        .label(&["Add Consent"])
        .pattern(r"(?i)\bAdd Consent[:\s]+([^\n]+)")
});
static DROP_CONSENT: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("drop_consent")
        .label(&["Drop Consent"])
        .pattern(r"(?i)\bDrop Consent[:\s]+([^\n]+)")
});
static CLASS_NOTES: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("class_notes")
        .selector("[id*='CLASSNOTE_LONG']")
        .label(&["Class Notes"])
        .pattern(r"(?i)\bClass Notes?[:\s]+([^\n]+)")
        .placeholder("No Class Notes")
});

// Course-level rules

static TITLE: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("course_title")
        .selector(".PALEVEL0SECONDARY")
        .label(&["Course Title"])
        .selector("h1")
        .selector("h2")
        .normalize(normalize_title)
});
static UNITS: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("units")
        .selector("[id*='UNITS_RANGE']")
        .label(&["Units"])
        .pattern(r"(?i)\bUnits?[:\s]+(\d+(?:\.\d+)?)")
        .normalize(normalize_units)
});
static CAREER: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("career")
        .label(&["Career"])
        .pattern(r"(?i)\bCareer[:\s]+([^\n]+)")
});
static GRADING: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("grading")
        .selector("[id*='GRADE_BASIS_TBL_DESCRFORMAL']")
        .label(&["Grading Basis", "Grading"])
        .pattern(r"(?i)\bGrading(?: Basis)?[:\s]+([^\n]+)")
});
static COMPONENT: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("component")
        .selector("[id*='SSR_COMPONENT_LONG']")
        .label(&["Component"])
        .pattern(r"(?i)\bComponents?[:\s]+([^\n]+)")
});
static DESCRIPTION: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("course_description")
        .selector("[id*='DESCRLONG']")
        .selector("[class*='description'], [class*='Description'], [id*='description']")
        .label(&["Course Description", "Description"])
        .pattern(r"(?i)\bDescription[:\s]+([^\n]+)")
        .min_len(MIN_DESCRIPTION_LEN)
});
static ENROLLMENT_REQUIREMENTS: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("enrollment_requirements")
        .selector("[id*='SSR_REQUISITE_LONG']")
        .label(&["Enrollment Requirements", "Prerequisites"])
        .pattern(r"(?i)\b(?:Enrollment Requirements?|Prerequisites?)[:\s]+([^\n]+)")
        .placeholder("No Enrollment Requirements")
});
static ENFORCED_CONCURRENT: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("enforced_concurrent")
        .label(&["Enforced Concurrent"])
        .pattern(r"(?i)\bEnforced Concurrent(?: at Enrollment)?[:\s]+([^\n]+)")
});
static CLASS_ATTRIBUTES: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("class_attributes")
        .selector("[id*='CRSE_ATTR_LONG']")
        .label(&["Class Attributes"])
        .pattern(r"(?i)\bClass Attributes?[:\s]+([^\n]+)")
        .placeholder("No Class Attributes")
        .keep_lines()
});
static ACADEMIC_ORGANIZATION: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("academic_organization")
        .label(&["Academic Organization"])
        .pattern(r"(?i)\bAcademic Organization[:\s]+([^\n]+)")
});
static COURSE_NOTES: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("course_notes")
        .label(&["Course Notes"])
        .pattern(r"(?i)\bCourse Notes?[:\s]+([^\n]+)")
        .placeholder("No Course Notes")
});
static TEXTBOOK: LazyLock<FieldRule> = LazyLock::new(|| {
    FieldRule::new("textbook_info")
        .label(&["Text Books", "Textbooks", "Textbook"])
        .pattern(r"(?i)\bText ?books?[:\s]+([^\n]+)")
});

/// Section-level fields read off a detail page. Empty strings and `None` mean the
/// field was not found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionDetails {
    pub section_type: String,
    pub days: String,
    pub times: String,
    pub start_time: String,
    pub end_time: String,
    pub start_date: String,
    pub end_date: String,
    pub meeting_dates: String,
    pub location: String,
    pub building: String,
    pub room: String,
    pub instruction_mode: String,
    pub instructor: String,
    pub instructor_email: String,
    pub class_capacity: Option<u32>,
    pub enrollment_total: Option<u32>,
    pub available_seats: Option<u32>,
    pub waitlist_capacity: Option<u32>,
    pub waitlist_total: Option<u32>,
    pub status: SectionStatus,
    pub reserve_capacity: Vec<ReserveCapacity>,
    pub add_consent: String,
    pub drop_consent: String,
    pub class_notes: String,
    pub exam_schedule: Vec<ExamMeeting>,
}

/// Course-level fields read off a detail page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourseDetails {
    pub course_title: String,
    pub units: String,
    pub career: String,
    pub grading: String,
    pub component: String,
    pub course_description: String,
    pub enrollment_requirements: String,
    pub enforced_concurrent: String,
    pub class_attributes: BTreeSet<String>,
    pub academic_organization: String,
    pub course_notes: String,
    pub textbook_info: String,
}

/// Everything extracted from one detail page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailPage {
    pub section: SectionDetails,
    pub course: CourseDetails,
    /// Fields that could not be read, in extraction order
    pub misses: Vec<ExtractionMiss>,
    /// RFC 3339 time the page was fetched
    pub fetched_at: String,
}

impl DetailPage {
    /// Returns the recorded miss for `field`, if any.
    pub fn miss(&self, field: &str) -> Option<&ExtractionMiss> {
        self.misses.iter().find(|m| m.field() == field)
    }
}

impl SectionDetails {
    /// Copies every found field onto `section`; fields that were not found keep the
    /// section's current value.
    pub fn apply_to(&self, section: &mut Section) {
        fn set(target: &mut String, value: &str) {
            if !value.is_empty() {
                *target = value.to_string();
            }
        }

        set(&mut section.section_type, &self.section_type);
        set(&mut section.days, &self.days);
        set(&mut section.times, &self.times);
        set(&mut section.start_time, &self.start_time);
        set(&mut section.end_time, &self.end_time);
        set(&mut section.start_date, &self.start_date);
        set(&mut section.end_date, &self.end_date);
        set(&mut section.meeting_dates, &self.meeting_dates);
        set(&mut section.location, &self.location);
        set(&mut section.building, &self.building);
        set(&mut section.room, &self.room);
        set(&mut section.instruction_mode, &self.instruction_mode);
        set(&mut section.instructor, &self.instructor);
        set(&mut section.instructor_email, &self.instructor_email);
        set(&mut section.add_consent, &self.add_consent);
        set(&mut section.drop_consent, &self.drop_consent);
        set(&mut section.class_notes, &self.class_notes);

        if let Some(n) = self.class_capacity {
            section.class_capacity = n;
        }
        if let Some(n) = self.enrollment_total {
            section.enrollment_total = n;
        }
        if let Some(n) = self.available_seats {
            section.available_seats = n;
        }
        if let Some(n) = self.waitlist_capacity {
            section.waitlist_capacity = n;
        }
        if let Some(n) = self.waitlist_total {
            section.waitlist_total = n;
        }
        if self.status.is_known() {
            section.status = self.status;
        }
        if !self.reserve_capacity.is_empty() {
            section.reserve_capacity = self.reserve_capacity.clone();
        }
        if !self.exam_schedule.is_empty() {
            section.exam_schedule = self.exam_schedule.clone();
        }
    }
}

/// Parses a class detail page. Never fails; fields that cannot be read are left
/// empty and recorded in [`DetailPage::misses`].
pub fn parse_detail_page(html: &str, fetched_at: &str) -> DetailPage {
    let page = Page::parse(html);
    let mut misses = Misses::default();

    let section = parse_section_details(&page, &mut misses);
    let course = parse_course_details(&page, &mut misses);

    for miss in &misses.0 {
        trace!(field = miss.field(), reason = %miss, "Detail field missing");
    }

    DetailPage {
        section,
        course,
        misses: misses.0,
        fetched_at: fetched_at.to_string(),
    }
}

#[derive(Default)]
struct Misses(Vec<ExtractionMiss>);

impl Misses {
    fn take<T>(&mut self, result: Result<T, ExtractionMiss>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(miss) => {
                self.0.push(miss);
                None
            }
        }
    }

    fn text(&mut self, rule: &FieldRule, page: &Page) -> String {
        self.take(rule.apply(page)).unwrap_or_default()
    }

    fn count(&mut self, rule: &FieldRule, page: &Page) -> Option<u32> {
        self.take(rule.apply_count(page))
    }
}

fn parse_section_details(page: &Page, misses: &mut Misses) -> SectionDetails {
    let mut details = SectionDetails {
        section_type: misses.text(&SECTION_TYPE, page),
        instruction_mode: misses.text(&INSTRUCTION_MODE, page),
        location: misses.text(&LOCATION, page),
        add_consent: misses.text(&ADD_CONSENT, page),
        drop_consent: misses.text(&DROP_CONSENT, page),
        class_notes: misses.text(&CLASS_NOTES, page),
        ..Default::default()
    };

    // Status text, then a status badge image
    details.status = match STATUS.apply(page) {
        Ok(text) => SectionStatus::from_text(&text),
        Err(miss) => {
            let badge = page
                .document
                .select(&IMG_ALT_SELECTOR)
                .filter_map(|img| img.value().attr("alt"))
                .map(SectionStatus::from_text)
                .find(SectionStatus::is_known);
            if badge.is_none() {
                misses.0.push(miss);
            }
            badge.unwrap_or_default()
        }
    };

    let tables = leaf_tables(page);
    apply_meeting_block(page, &tables, misses, &mut details);
    apply_enrollment_block(page, misses, &mut details);

    details.reserve_capacity = tables
        .iter()
        .find(|t| t.header_contains("reserve"))
        .map(|t| parse_reserve_table(t, misses))
        .unwrap_or_default();
    details.exam_schedule = tables
        .iter()
        .find(|t| t.header_contains("exam"))
        .map(parse_exam_table)
        .unwrap_or_default();

    details
}

/// Schedule, room and instructor: the meeting table first, labels and patterns for
/// anything it does not provide.
fn apply_meeting_block(
    page: &Page,
    tables: &[Grid<'_>],
    misses: &mut Misses,
    details: &mut SectionDetails,
) {
    let meeting = tables
        .iter()
        .find(|t| t.id.contains("MTG") || t.header_contains("days"))
        .and_then(MeetingRow::from_grid);

    let days_times = meeting.as_ref().map(|m| m.days_times.as_str()).unwrap_or("");
    let dates_cell = meeting.as_ref().map(|m| m.dates.as_str()).unwrap_or("");

    // Days
    details.days = match normalize_days(days_times) {
        Some(days) => days,
        None => misses.text(&DAYS, page),
    };

    // Times: the meeting cell, else anywhere on the page
    let times = TIME_RANGE_REGEX
        .captures(days_times)
        .or_else(|| TIME_RANGE_REGEX.captures(&page.text));
    match times {
        Some(caps) => match (parse_time("start_time", &caps[1]), parse_time("end_time", &caps[2])) {
            (Ok(start), Ok(end)) => {
                details.times = format!("{start} - {end}");
                details.start_time = start;
                details.end_time = end;
            }
            (start, end) => {
                misses.take(start);
                misses.take(end);
            }
        },
        None => misses.0.push(ExtractionMiss::NotFound { field: "times" }),
    }

    // Meeting dates
    let dates = DATE_RANGE_REGEX
        .captures(dates_cell)
        .or_else(|| DATE_RANGE_REGEX.captures(&page.text));
    match dates {
        Some(caps) => match (parse_date("start_date", &caps[1]), parse_date("end_date", &caps[2])) {
            (Ok(start), Ok(end)) => {
                details.meeting_dates = format!("{start} - {end}");
                details.start_date = start;
                details.end_date = end;
            }
            (start, end) => {
                misses.take(start);
                misses.take(end);
            }
        },
        None => misses.0.push(ExtractionMiss::NotFound { field: "meeting_dates" }),
    }

    // Room and building
    details.room = match meeting.as_ref().filter(|m| !m.room.is_empty()) {
        Some(m) => m.room.clone(),
        None => misses.text(&ROOM, page),
    };
    details.building = match BUILDING.apply(page) {
        Ok(building) => building,
        Err(miss) => match building_from_room(&details.room) {
            Some(building) => building,
            None => {
                misses.0.push(miss);
                String::new()
            }
        },
    };

    // Instructor and e-mail
    details.instructor = match meeting.as_ref().filter(|m| !m.instructors.is_empty()) {
        Some(m) => m.instructors.join(", "),
        None => misses.text(&INSTRUCTOR, page),
    };
    details.instructor_email = meeting
        .as_ref()
        .map(|m| m.email.clone())
        .filter(|e| !e.is_empty())
        .or_else(|| {
            page.document
                .select(&MAILTO_SELECTOR)
                .find_map(|a| a.value().attr("href").and_then(email_from_mailto))
        })
        .or_else(|| EMAIL_REGEX.find(&page.text).map(|m| m.as_str().to_string()))
        .unwrap_or_default();
}

/// Capacity, enrollment and waitlist counts.
///
/// Available seats fall back to `capacity - enrolled` when the page does not show
/// them, and never exceed a known capacity.
fn apply_enrollment_block(page: &Page, misses: &mut Misses, details: &mut SectionDetails) {
    details.class_capacity = misses.count(&CLASS_CAPACITY, page);
    details.enrollment_total = misses.count(&ENROLLMENT_TOTAL, page);
    details.waitlist_capacity = misses.count(&WAITLIST_CAPACITY, page);
    details.waitlist_total = misses.count(&WAITLIST_TOTAL, page);

    let explicit = misses.count(&AVAILABLE_SEATS, page);

    details.available_seats = match (explicit, details.class_capacity, details.enrollment_total) {
        (Some(seats), Some(cap), _) => Some(seats.min(cap)),
        (Some(seats), None, _) => Some(seats),
        (None, Some(cap), Some(enrolled)) if cap > 0 => Some(cap.saturating_sub(enrolled)),
        (None, _, _) => None,
    };
}

fn parse_course_details(page: &Page, misses: &mut Misses) -> CourseDetails {
    let class_attributes = misses
        .take(CLASS_ATTRIBUTES.apply(page))
        .map(|raw| split_attributes(&raw))
        .unwrap_or_default();

    CourseDetails {
        course_title: misses.text(&TITLE, page),
        units: misses.text(&UNITS, page),
        career: misses.text(&CAREER, page),
        grading: misses.text(&GRADING, page),
        component: misses.text(&COMPONENT, page),
        course_description: misses.text(&DESCRIPTION, page),
        enrollment_requirements: misses.text(&ENROLLMENT_REQUIREMENTS, page),
        enforced_concurrent: misses.text(&ENFORCED_CONCURRENT, page),
        class_attributes,
        academic_organization: misses.text(&ACADEMIC_ORGANIZATION, page),
        course_notes: misses.text(&COURSE_NOTES, page),
        textbook_info: misses.text(&TEXTBOOK, page),
    }
}

/// A table with no nested tables, its header cells and data rows.
struct Grid<'a> {
    id: String,
    headers: Vec<String>,
    rows: Vec<Vec<ElementRef<'a>>>,
}

impl Grid<'_> {
    fn header_contains(&self, needle: &str) -> bool {
        self.headers.iter().any(|h| h.contains(needle))
    }

    /// Index of the first header containing any of `needles`.
    fn column(&self, needles: &[&str]) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| needles.iter().any(|n| h.contains(n)))
    }
}

/// Collects every innermost table on the page. PeopleSoft wraps its grids in layout
/// tables, so only tables without nested tables are considered.
fn leaf_tables(page: &Page) -> Vec<Grid<'_>> {
    let mut grids = Vec::new();

    for table in page.document.select(&TABLE_SELECTOR) {
        let nested = table
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .any(|e| e.value().name() == "table");
        if nested {
            continue;
        }

        let mut rows = own_rows(table).into_iter().map(row_cells);
        let Some(header) = rows.next() else {
            continue;
        };

        grids.push(Grid {
            id: table.value().attr("id").unwrap_or_default().to_string(),
            headers: header
                .iter()
                .map(|cell| element_text(*cell).to_lowercase())
                .collect(),
            rows: rows.filter(|cells| !cells.is_empty()).collect(),
        });
    }

    grids
}

fn own_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(
                child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|e| e.value().name() == "tr"),
            ),
            _ => {}
        }
    }
    rows
}

fn row_cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|e| matches!(e.value().name(), "td" | "th"))
        .collect()
}

/// First data row of the meeting table, with columns mapped by header text.
struct MeetingRow {
    days_times: String,
    room: String,
    instructors: Vec<String>,
    email: String,
    dates: String,
}

impl MeetingRow {
    fn from_grid(grid: &Grid<'_>) -> Option<Self> {
        let row = grid.rows.first()?;
        let cell = |needles: &[&str]| grid.column(needles).and_then(|i| row.get(i).copied());

        let days_times = cell(&["days", "time"]).map(element_text).unwrap_or_default();
        let room = cell(&["room", "location"]).map(element_text).unwrap_or_default();
        let dates = cell(&["date"]).map(element_text).unwrap_or_default();

        let instructor_cell = cell(&["instructor"]);
        let mut instructors: Vec<String> = Vec::new();
        for name in instructor_cell
            .map(element_lines)
            .unwrap_or_default()
            .split(['\n', ','])
            .map(str::trim)
            .filter(|n| !n.is_empty())
        {
            if !instructors.iter().any(|known| known == name) {
                instructors.push(name.to_string());
            }
        }
        let email = instructor_cell
            .and_then(|c| c.select(&MAILTO_SELECTOR).next())
            .and_then(|a| a.value().attr("href"))
            .and_then(email_from_mailto)
            .unwrap_or_default();

        Some(MeetingRow {
            days_times,
            room,
            instructors,
            email,
            dates,
        })
    }
}

fn parse_reserve_table(grid: &Grid<'_>, misses: &mut Misses) -> Vec<ReserveCapacity> {
    let reserved_for = grid.column(&["for", "requirement", "description"]);
    let capacity = grid.column(&["cap"]);
    let enrolled = grid.column(&["tot", "enrolled"]);

    let mut reserves = Vec::new();
    for row in &grid.rows {
        let text = |col: Option<usize>| {
            col.and_then(|i| row.get(i).copied())
                .map(element_text)
                .unwrap_or_default()
        };
        let label = text(reserved_for);
        if label.is_empty() {
            continue;
        }
        reserves.push(ReserveCapacity {
            reserved_for: label,
            capacity: misses
                .take(parse_count("reserve_capacity", &text(capacity)))
                .unwrap_or(0),
            enrolled: misses
                .take(parse_count("reserve_enrolled", &text(enrolled)))
                .unwrap_or(0),
        });
    }
    reserves
}

fn parse_exam_table(grid: &Grid<'_>) -> Vec<ExamMeeting> {
    let date = grid.column(&["date"]);
    let time = grid.column(&["time"]);
    let location = grid.column(&["location", "room", "building"]);

    grid.rows
        .iter()
        .map(|row| {
            let text = |col: Option<usize>| {
                col.and_then(|i| row.get(i).copied())
                    .map(element_text)
                    .unwrap_or_default()
            };
            ExamMeeting {
                date: text(date),
                time: text(time),
                location: text(location),
            }
        })
        .filter(|exam| !(exam.date.is_empty() && exam.time.is_empty()))
        .collect()
}

fn normalize_status(raw: &str) -> Option<String> {
    let status = SectionStatus::from_text(raw);
    status.is_known().then(|| status.as_str().to_string())
}

/// Keeps the compact day tokens, e.g. "MoWeFr" out of "MoWeFr 9:05AM - 9:55AM".
fn normalize_days(raw: &str) -> Option<String> {
    DAYS_REGEX.captures(raw).map(|caps| caps[1].to_string())
}

fn normalize_units(raw: &str) -> Option<String> {
    UNITS_REGEX.find(raw).map(|m| m.as_str().to_string())
}

/// Strips the course code and section label off a heading such as
/// "CMPSC 131 - 001 - Programming and Computation I".
fn normalize_title(raw: &str) -> Option<String> {
    let trim_sep = |s: &str| s.trim_start_matches(|c: char| c == '-' || c.is_whitespace()).to_string();

    let mut rest = raw.trim().to_string();
    if let Some(m) = TITLE_CODE_REGEX.find(&rest) {
        rest = trim_sep(&rest[m.end()..]);
    }
    if let Some(m) = TITLE_SECTION_REGEX.find(&rest) {
        rest = trim_sep(&rest[m.end()..]);
    }

    let title = rest.trim();
    if title.chars().count() <= 3 || title.starts_with("Section") {
        None
    } else {
        Some(title.to_string())
    }
}

/// Validates a clock time and returns it in compact form, e.g. "9:05AM".
fn parse_time(field: &'static str, raw: &str) -> Result<String, ExtractionMiss> {
    let compact: String = raw.split_whitespace().collect::<String>().to_uppercase();
    NaiveTime::parse_from_str(&compact, "%I:%M%p")
        .map(|_| compact.clone())
        .map_err(|_| ExtractionMiss::Malformed {
            field,
            value: raw.to_string(),
        })
}

fn parse_date(field: &'static str, raw: &str) -> Result<String, ExtractionMiss> {
    NaiveDate::parse_from_str(raw, "%m/%d/%Y")
        .map(|_| raw.to_string())
        .map_err(|_| ExtractionMiss::Malformed {
            field,
            value: raw.to_string(),
        })
}

/// Leading building code of a room such as "WILLARD 062" or "WESTGATE E201".
fn building_from_room(room: &str) -> Option<String> {
    ROOM_CODE_REGEX
        .captures(room.trim())
        .map(|caps| caps[1].to_string())
}

fn email_from_mailto(href: &str) -> Option<String> {
    let address = href.strip_prefix("mailto:")?;
    let address = address.split('?').next().unwrap_or_default().trim();
    EMAIL_REGEX.is_match(address).then(|| address.to_string())
}

fn split_attributes(raw: &str) -> BTreeSet<String> {
    ATTRIBUTE_SPLIT_REGEX
        .split(raw)
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}
