//! Absence/test overlap detection and reshaping of joined rows.
//!
//! Everything here is pure: handlers load rows from the workspace and hand
//! them over, so the affected-test rule lives in exactly one place.

use crate::dates;
use crate::records::{
    AbsenceJoinedRow, AbsenceStats, AbsenceStatus, AbsenceWithDetails, Holiday,
    StudentWithCourse, Test,
};
use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;

/// Inclusive interval intersection.
pub fn ranges_overlap(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start <= b_end && a_end >= b_start
}

/// Tests dated within `[start, end]`, in input order. An inverted range
/// matches nothing.
pub fn find_affected_tests(course_tests: &[Test], start: NaiveDate, end: NaiveDate) -> Vec<Test> {
    course_tests
        .iter()
        .filter(|t| t.date >= start && t.date <= end)
        .cloned()
        .collect()
}

/// Buckets tests by course id. Tests with no course land under `""`.
pub fn group_tests_by_course(tests: Vec<Test>) -> HashMap<String, Vec<Test>> {
    let mut out: HashMap<String, Vec<Test>> = HashMap::new();
    for t in tests {
        let key = t.course_id.clone().unwrap_or_default();
        out.entry(key).or_default().push(t);
    }
    out
}

pub fn normalize_absence_with_details(
    row: AbsenceJoinedRow,
    affected_tests: Vec<Test>,
) -> AbsenceWithDetails {
    let AbsenceJoinedRow {
        absence,
        student,
        course,
    } = row;
    AbsenceWithDetails {
        absence,
        student: StudentWithCourse { student, course },
        affected_tests,
    }
}

/// Groups `tests` once, then resolves each absence against its own course.
/// The joined course is authoritative for the lookup since the join already
/// required it.
pub fn attach_affected_tests(rows: Vec<AbsenceJoinedRow>, tests: Vec<Test>) -> Vec<AbsenceWithDetails> {
    let by_course = group_tests_by_course(tests);
    rows.into_iter()
        .map(|row| {
            let affected = by_course
                .get(&row.course.id)
                .map(|course_tests| {
                    find_affected_tests(course_tests, row.absence.start_date, row.absence.end_date)
                })
                .unwrap_or_default();
            normalize_absence_with_details(row, affected)
        })
        .collect()
}

/// An absence is justified exactly when a document is attached.
pub fn status_for_document(document_url: Option<&str>) -> AbsenceStatus {
    match document_url.map(str::trim) {
        Some(url) if !url.is_empty() => AbsenceStatus::Justificada,
        _ => AbsenceStatus::Pendiente,
    }
}

pub fn absence_stats(absences: &[AbsenceWithDetails]) -> AbsenceStats {
    let mut stats = AbsenceStats::default();
    for a in absences {
        stats.total += 1;
        match a.absence.status {
            AbsenceStatus::Justificada => stats.justified += 1,
            AbsenceStatus::Pendiente => stats.pending += 1,
        }
        if !a.affected_tests.is_empty() {
            stats.with_tests += 1;
        }
        let has_doc = a
            .absence
            .document_url
            .as_deref()
            .map(|u| !u.trim().is_empty())
            .unwrap_or(false);
        if !has_doc {
            stats.without_doc += 1;
        }
    }
    stats
}

/// Maps a raw holiday row. Rows whose date cannot be read are dropped.
pub fn normalize_holiday(
    fecha: &str,
    descripcion: Option<&str>,
    irrenunciable: Option<bool>,
) -> Option<Holiday> {
    let date = dates::parse_date_only(fecha)?;
    Some(Holiday {
        id: fecha.trim().to_string(),
        date,
        name: descripcion.unwrap_or("").to_string(),
        irrenunciable: irrenunciable.unwrap_or(false),
    })
}

/// Keeps holidays in `month` (1-based) of `year`. Without both, returns all.
pub fn filter_holidays_by_period(
    holidays: Vec<Holiday>,
    month: Option<u32>,
    year: Option<i32>,
) -> Vec<Holiday> {
    let (Some(month), Some(year)) = (month, year) else {
        return holidays;
    };
    holidays
        .into_iter()
        .filter(|h| h.date.year() == year && h.date.month() == month)
        .collect()
}
