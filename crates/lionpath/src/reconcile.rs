//! Grouping of parsed sections into courses and promotion of course-level fields.

use crate::detail::{CourseDetails, DetailPage};
use crate::search::{CourseCode, ParsedSection};
use crate::types::{Course, CourseStats, Section};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

/// One course and the sections offered under it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseRecord {
    pub course: Course,
    /// Sections in the order they were first listed
    pub sections: Vec<Section>,
}

impl CourseRecord {
    pub fn total_capacity(&self) -> u64 {
        self.sections.iter().map(|s| s.class_capacity as u64).sum()
    }

    pub fn total_enrollment(&self) -> u64 {
        self.sections.iter().map(|s| s.enrollment_total as u64).sum()
    }

    pub fn available_seats(&self) -> u64 {
        self.sections.iter().map(|s| s.available_seats as u64).sum()
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Distinct non-empty campus names across all sections.
    pub fn campuses(&self) -> BTreeSet<String> {
        self.sections
            .iter()
            .filter(|s| !s.campus.is_empty())
            .map(|s| s.campus.clone())
            .collect()
    }

    pub fn stats(&self) -> CourseStats {
        CourseStats {
            total_capacity: self.total_capacity(),
            total_enrollment: self.total_enrollment(),
            available_seats: self.available_seats(),
            section_count: self.section_count(),
            campuses: self.campuses().into_iter().collect(),
        }
    }
}

/// All scraped courses keyed by course code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    courses: BTreeMap<String, CourseRecord>,
}

impl Catalog {
    /// Groups sections by course code.
    ///
    /// Sections whose code does not parse are dropped. A class number already seen
    /// (a cross-listed class found under two subjects) is kept only the first time.
    pub fn group(sections: Vec<ParsedSection>, semester: &str) -> Self {
        let mut courses: BTreeMap<String, CourseRecord> = BTreeMap::new();
        let mut seen = HashSet::new();

        for ParsedSection {
            course_code,
            section,
        } in sections
        {
            let Some(code) = CourseCode::parse(&course_code) else {
                debug!(course_code = %course_code, class_number = %section.class_number, "Dropping section without a valid course code");
                continue;
            };
            if !seen.insert(section.class_number.clone()) {
                debug!(class_number = %section.class_number, "Skipping duplicate class number");
                continue;
            }

            let key = code.to_string();
            let record = courses.entry(key.clone()).or_insert_with(|| CourseRecord {
                course: Course {
                    course_code: key,
                    subject: code.subject.clone(),
                    catalog_number: code.catalog_number.clone(),
                    semester: semester.to_string(),
                    ..Default::default()
                },
                sections: Vec::new(),
            });
            record.sections.push(section);
        }

        Self { courses }
    }

    /// Applies fetched detail pages, keyed by class number.
    ///
    /// Sections take their own page's fields. Course fields are promoted from the
    /// sections in listing order; the first page to provide a field wins.
    pub fn apply_details(&mut self, details: &HashMap<String, DetailPage>) {
        for record in self.courses.values_mut() {
            for section in &mut record.sections {
                let Some(page) = details.get(&section.class_number) else {
                    continue;
                };
                page.section.apply_to(section);
                section.scrape_timestamp = page.fetched_at.clone();
                record.course.absorb(&page.course, &page.fetched_at);
            }
        }
    }

    pub fn get(&self, course_code: &str) -> Option<&CourseRecord> {
        self.courses.get(course_code)
    }

    /// Courses in course-code order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &CourseRecord)> {
        self.courses.iter()
    }

    pub fn sections_mut(&mut self) -> impl Iterator<Item = &mut Section> {
        self.courses.values_mut().flat_map(|r| r.sections.iter_mut())
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    pub fn section_count(&self) -> usize {
        self.courses.values().map(CourseRecord::section_count).sum()
    }
}

impl Course {
    /// Fills every still-empty course field from a detail page. Fields already set
    /// are never overwritten. Returns true if anything was filled.
    pub fn absorb(&mut self, details: &CourseDetails, fetched_at: &str) -> bool {
        fn fill(target: &mut String, value: &str) -> bool {
            if target.is_empty() && !value.is_empty() {
                *target = value.to_string();
                true
            } else {
                false
            }
        }

        let mut filled = false;
        filled |= fill(&mut self.course_title, &details.course_title);
        filled |= fill(&mut self.units, &details.units);
        filled |= fill(&mut self.career, &details.career);
        filled |= fill(&mut self.grading, &details.grading);
        filled |= fill(&mut self.component, &details.component);
        filled |= fill(&mut self.course_description, &details.course_description);
        filled |= fill(&mut self.enrollment_requirements, &details.enrollment_requirements);
        filled |= fill(&mut self.enforced_concurrent, &details.enforced_concurrent);
        filled |= fill(&mut self.academic_organization, &details.academic_organization);
        filled |= fill(&mut self.course_notes, &details.course_notes);
        filled |= fill(&mut self.textbook_info, &details.textbook_info);
        if self.class_attributes.is_empty() && !details.class_attributes.is_empty() {
            self.class_attributes = details.class_attributes.clone();
            filled = true;
        }

        if filled {
            self.last_updated = fetched_at.to_string();
        }
        filled
    }
}
