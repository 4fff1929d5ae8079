/// Types for course and section records
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Course-level information, identical for every section sharing a course code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Course {
    pub course_code: String,
    pub course_title: String,
    pub subject: String,
    pub catalog_number: String,

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

    pub semester: String,
    /// RFC 3339 time of the detail page that last contributed a field
    pub last_updated: String,
}

/// Enrollment status shown on a class detail page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionStatus {
    Open,
    Closed,
    #[serde(rename = "Wait List")]
    WaitList,
    #[default]
    #[serde(rename = "")]
    Unknown,
}

impl SectionStatus {
    /// Normalizes free status text ("Open", "CLOSED", "Wait List", "Waitlisted").
    pub fn from_text(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("wait") {
            SectionStatus::WaitList
        } else if lower.contains("closed") {
            SectionStatus::Closed
        } else if lower.contains("open") {
            SectionStatus::Open
        } else {
            SectionStatus::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionStatus::Open => "Open",
            SectionStatus::Closed => "Closed",
            SectionStatus::WaitList => "Wait List",
            SectionStatus::Unknown => "",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, SectionStatus::Unknown)
    }
}

/// Seats held back for a specific student population.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReserveCapacity {
    pub reserved_for: String,
    pub capacity: u32,
    pub enrolled: u32,
}

/// One final-exam meeting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExamMeeting {
    pub date: String,
    pub time: String,
    pub location: String,
}

/// One schedulable offering of a course.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Section {
    pub section: String,
    pub class_number: String,
    /// Lecture, Lab, Recitation, ...
    pub section_type: String,

    pub days: String,
    pub times: String,
    pub start_time: String,
    pub end_time: String,
    pub start_date: String,
    pub end_date: String,
    pub meeting_dates: String,

    pub campus: String,
    pub location: String,
    pub building: String,
    pub room: String,
    pub instruction_mode: String,

    pub instructor: String,
    pub instructor_email: String,

    pub class_capacity: u32,
    pub enrollment_total: u32,
    pub available_seats: u32,
    pub waitlist_capacity: u32,
    pub waitlist_total: u32,
    pub status: SectionStatus,

    pub reserve_capacity: Vec<ReserveCapacity>,

    pub add_consent: String,
    pub drop_consent: String,
    pub class_notes: String,

    pub exam_schedule: Vec<ExamMeeting>,

    /// `showClassDetails(<term>,<class>)` reference from the search results
    pub detail_ref: String,
    pub detail_url: String,
    pub scrape_timestamp: String,
}

/// Aggregates over a course's sections, computed on read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseStats {
    pub total_capacity: u64,
    pub total_enrollment: u64,
    pub available_seats: u64,
    pub section_count: usize,
    pub campuses: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_text() {
        assert_eq!(SectionStatus::from_text("Open"), SectionStatus::Open);
        assert_eq!(SectionStatus::from_text("CLOSED"), SectionStatus::Closed);
        assert_eq!(SectionStatus::from_text("Wait List"), SectionStatus::WaitList);
        assert_eq!(SectionStatus::from_text("n/a"), SectionStatus::Unknown);
    }

    #[test]
    fn test_status_serializes_as_site_text() {
        assert_eq!(
            serde_json::to_string(&SectionStatus::WaitList).unwrap(),
            "\"Wait List\""
        );
        assert_eq!(serde_json::to_string(&SectionStatus::Unknown).unwrap(), "\"\"");
        let back: SectionStatus = serde_json::from_str("\"\"").unwrap();
        assert_eq!(back, SectionStatus::Unknown);
    }
}
