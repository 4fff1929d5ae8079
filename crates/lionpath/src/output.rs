//! Serialization of the catalog to JSON Lines, JSON and CSV.

use crate::config::OutputFormat;
use crate::error::ScrapeError;
use crate::reconcile::{Catalog, CourseRecord};
use crate::types::{Course, CourseStats, Section};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// One course as written to JSON Lines and JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseLine {
    pub course: Course,
    pub sections: Vec<Section>,
    pub stats: CourseStats,
}

/// Borrowed form of [`CourseLine`] used when writing.
#[derive(Serialize)]
struct CourseLineRef<'a> {
    course: &'a Course,
    sections: &'a [Section],
    stats: CourseStats,
}

impl<'a> From<&'a CourseRecord> for CourseLineRef<'a> {
    fn from(record: &'a CourseRecord) -> Self {
        Self {
            course: &record.course,
            sections: &record.sections,
            stats: record.stats(),
        }
    }
}

/// Writes one compact JSON object per course, in course-code order.
pub fn write_jsonl<W: Write>(mut writer: W, catalog: &Catalog) -> Result<(), ScrapeError> {
    for (_, record) in catalog.iter() {
        serde_json::to_writer(&mut writer, &CourseLineRef::from(record))?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// Writes a pretty-printed object mapping course code to course.
pub fn write_json<W: Write>(writer: W, catalog: &Catalog) -> Result<(), ScrapeError> {
    let courses: BTreeMap<&str, CourseLineRef<'_>> = catalog
        .iter()
        .map(|(code, record)| (code.as_str(), CourseLineRef::from(record)))
        .collect();
    serde_json::to_writer_pretty(writer, &courses)?;
    Ok(())
}

/// One CSV row: a section with its course's fields repeated.
#[derive(Serialize)]
struct CsvRow<'a> {
    course_code: &'a str,
    course_title: &'a str,
    subject: &'a str,
    catalog_number: &'a str,
    units: &'a str,
    career: &'a str,
    grading: &'a str,
    component: &'a str,
    course_description: &'a str,
    enrollment_requirements: &'a str,
    enforced_concurrent: &'a str,
    class_attributes: String,
    academic_organization: &'a str,
    course_notes: &'a str,
    textbook_info: &'a str,
    semester: &'a str,
    last_updated: &'a str,

    section: &'a str,
    class_number: &'a str,
    section_type: &'a str,
    days: &'a str,
    times: &'a str,
    start_time: &'a str,
    end_time: &'a str,
    start_date: &'a str,
    end_date: &'a str,
    meeting_dates: &'a str,
    campus: &'a str,
    location: &'a str,
    building: &'a str,
    room: &'a str,
    instruction_mode: &'a str,
    instructor: &'a str,
    instructor_email: &'a str,
    class_capacity: u32,
    enrollment_total: u32,
    available_seats: u32,
    waitlist_capacity: u32,
    waitlist_total: u32,
    status: &'static str,
    reserve_capacity: String,
    add_consent: &'a str,
    drop_consent: &'a str,
    class_notes: &'a str,
    exam_schedule: String,
    detail_url: &'a str,
    scrape_timestamp: &'a str,
}

impl<'a> CsvRow<'a> {
    fn new(course: &'a Course, s: &'a Section) -> Self {
        let class_attributes = course
            .class_attributes
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("; ");
        let reserve_capacity = s
            .reserve_capacity
            .iter()
            .map(|r| format!("{} ({}/{})", r.reserved_for, r.enrolled, r.capacity))
            .collect::<Vec<_>>()
            .join("; ");
        let exam_schedule = s
            .exam_schedule
            .iter()
            .map(|e| {
                [e.date.as_str(), e.time.as_str(), e.location.as_str()]
                    .iter()
                    .filter(|part| !part.is_empty())
                    .copied()
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self {
            course_code: &course.course_code,
            course_title: &course.course_title,
            subject: &course.subject,
            catalog_number: &course.catalog_number,
            units: &course.units,
            career: &course.career,
            grading: &course.grading,
            component: &course.component,
            course_description: &course.course_description,
            enrollment_requirements: &course.enrollment_requirements,
            enforced_concurrent: &course.enforced_concurrent,
            class_attributes,
            academic_organization: &course.academic_organization,
            course_notes: &course.course_notes,
            textbook_info: &course.textbook_info,
            semester: &course.semester,
            last_updated: &course.last_updated,

            section: &s.section,
            class_number: &s.class_number,
            section_type: &s.section_type,
            days: &s.days,
            times: &s.times,
            start_time: &s.start_time,
            end_time: &s.end_time,
            start_date: &s.start_date,
            end_date: &s.end_date,
            meeting_dates: &s.meeting_dates,
            campus: &s.campus,
            location: &s.location,
            building: &s.building,
            room: &s.room,
            instruction_mode: &s.instruction_mode,
            instructor: &s.instructor,
            instructor_email: &s.instructor_email,
            class_capacity: s.class_capacity,
            enrollment_total: s.enrollment_total,
            available_seats: s.available_seats,
            waitlist_capacity: s.waitlist_capacity,
            waitlist_total: s.waitlist_total,
            status: s.status.as_str(),
            reserve_capacity,
            add_consent: &s.add_consent,
            drop_consent: &s.drop_consent,
            class_notes: &s.class_notes,
            exam_schedule,
            detail_url: &s.detail_url,
            scrape_timestamp: &s.scrape_timestamp,
        }
    }
}

/// Writes one row per section, with a header row first.
pub fn write_csv<W: Write>(writer: W, catalog: &Catalog) -> Result<(), ScrapeError> {
    let mut csv = csv::Writer::from_writer(writer);
    for (_, record) in catalog.iter() {
        for section in &record.sections {
            csv.serialize(CsvRow::new(&record.course, section))?;
        }
    }
    csv.flush()?;
    Ok(())
}

/// Writes the catalog to `path` in the chosen format.
pub fn write_catalog(path: &Path, format: OutputFormat, catalog: &Catalog) -> Result<(), ScrapeError> {
    let mut writer = BufWriter::new(File::create(path)?);
    match format {
        OutputFormat::Jsonl => write_jsonl(&mut writer, catalog)?,
        OutputFormat::Json => write_json(&mut writer, catalog)?,
        OutputFormat::Csv => write_csv(&mut writer, catalog)?,
    }
    writer.flush()?;

    info!(
        path = %path.display(),
        format = %format,
        courses = catalog.len(),
        sections = catalog.section_count(),
        "Wrote catalog"
    );
    Ok(())
}

/// Reads courses back from JSON Lines output. Blank lines are skipped.
pub fn read_jsonl<R: BufRead>(reader: R) -> Result<Vec<CourseLine>, ScrapeError> {
    let mut courses = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        courses.push(serde_json::from_str(&line)?);
    }
    Ok(courses)
}
