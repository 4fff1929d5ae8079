//! Campus naming and home-campus classification.

use crate::config::CampusFilter;
use crate::types::Section;

pub const HOME_CAMPUS_CODE: &str = "UP";
pub const HOME_CAMPUS_NAME: &str = "University Park";

/// Branch campuses in the order they are searched for in listing text.
pub const BRANCH_CAMPUSES: [&str; 18] = [
    "World Campus",
    "Berks",
    "Abington",
    "Altoona",
    "Brandywine",
    "Dubois",
    "Erie",
    "Fayette",
    "Greater Allegheny",
    "Harrisburg",
    "Hazleton",
    "Lehigh Valley",
    "Mont Alto",
    "New Kensington",
    "Schuylkill",
    "Shenango",
    "Wilkes-Barre",
    "York",
];

/// Resolves the campus named in the part of a listing anchor after the course code.
///
/// Branch names are matched first (case-insensitive), then the home campus by name or
/// by its `UP` code. With nothing named, the home campus is assumed unless the text
/// hints at World Campus, Berks or a York (`...Y`) section.
pub fn resolve_campus(remainder: &str, section_label: &str) -> String {
    let lower = remainder.to_lowercase();

    if let Some(branch) = BRANCH_CAMPUSES
        .iter()
        .find(|name| lower.contains(&name.to_lowercase()))
    {
        return branch.to_string();
    }

    let names_home = lower.contains(&HOME_CAMPUS_NAME.to_lowercase())
        || remainder
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| word == HOME_CAMPUS_CODE);
    if names_home {
        return HOME_CAMPUS_CODE.to_string();
    }

    let york_suffix = section_label.to_uppercase().ends_with('Y');
    if !lower.contains("world") && !lower.contains("berks") && !york_suffix {
        HOME_CAMPUS_CODE.to_string()
    } else {
        String::new()
    }
}

/// Decides whether a section is taught at the home campus.
///
/// First match decides:
/// 1. campus text names a branch campus: no
/// 2. campus text is the home code, the home name, or empty: yes
/// 3. section label ends in `Y` (York) or `W` (World Campus): no
/// 4. otherwise: yes
pub fn is_home_campus(section: &Section) -> bool {
    let campus = section.campus.trim().to_uppercase();

    if BRANCH_CAMPUSES
        .iter()
        .any(|name| campus.contains(&name.to_uppercase()))
    {
        return false;
    }

    if campus.is_empty()
        || campus == HOME_CAMPUS_CODE
        || campus == HOME_CAMPUS_NAME.to_uppercase()
    {
        return true;
    }

    let label = section.section.trim().to_uppercase();
    !(label.ends_with('Y') || label.ends_with('W'))
}

impl CampusFilter {
    /// Returns true if a section passes this filter.
    pub fn admits(&self, section: &Section) -> bool {
        match self {
            CampusFilter::Home => is_home_campus(section),
            CampusFilter::All => true,
            CampusFilter::Named(name) => section.campus.trim().eq_ignore_ascii_case(name.trim()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(label: &str, campus: &str) -> Section {
        Section {
            section: label.to_string(),
            campus: campus.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_named_branch() {
        assert_eq!(resolve_campus("001W - World Campus", "001W"), "World Campus");
        assert_eq!(resolve_campus("002 - Wilkes-Barre", "002"), "Wilkes-Barre");
        assert_eq!(resolve_campus("001 - DuBois", "001"), "Dubois");
    }

    #[test]
    fn test_resolve_home_defaults() {
        assert_eq!(resolve_campus("001 - University Park", "001"), "UP");
        assert_eq!(resolve_campus("001 - UP", "001"), "UP");
        assert_eq!(resolve_campus("001", "001"), "UP");
        assert_eq!(resolve_campus("001Y", "001Y"), "");
        assert_eq!(resolve_campus("Web - world wide", "W01"), "");
    }

    #[test]
    fn test_world_campus_never_home() {
        for label in ["001", "001W", "555V", ""] {
            assert!(!is_home_campus(&section(label, "World Campus")));
        }
        assert!(!is_home_campus(&section("001", "Penn State York")));
    }

    #[test]
    fn test_home_campus_precedence() {
        assert!(is_home_campus(&section("001", "UP")));
        assert!(is_home_campus(&section("001", "University Park")));
        // Empty campus text is decided before the suffix check.
        assert!(is_home_campus(&section("001W", "")));
        // Unrecognised campus text falls through to the suffix check.
        assert!(!is_home_campus(&section("001Y", "Hershey")));
        assert!(is_home_campus(&section("001", "Hershey")));
    }

    #[test]
    fn test_campus_filter() {
        let up = section("001", "UP");
        let berks = section("001", "Berks");

        assert!(CampusFilter::Home.admits(&up));
        assert!(!CampusFilter::Home.admits(&berks));
        assert!(CampusFilter::All.admits(&berks));
        assert!(CampusFilter::Named("berks".into()).admits(&berks));
        assert!(!CampusFilter::Named("berks".into()).admits(&up));
    }
}
