use crate::dates;
use crate::errors::AppError;
use crate::ipc::error::{app_err, ok};
use crate::ipc::types::{AppState, Request};
use crate::records::{CourseRef, EducationLevel, Student, StudentWithCourse, Test};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};

pub fn require_conn(state: &AppState) -> Result<&Connection, AppError> {
    state.db.as_ref().ok_or(AppError::NoWorkspace)
}

pub fn respond(req: &Request, result: Result<serde_json::Value, AppError>) -> serde_json::Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => {
            tracing::warn!(method = %req.method, code = e.code(), "{}", e);
            app_err(&req.id, &e)
        }
    }
}

/// Absent, `null` and blank strings all read as `None`.
pub fn optional_str(params: &serde_json::Value, key: &str) -> Result<Option<String>, AppError> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => {
            let t = s.trim();
            Ok(if t.is_empty() { None } else { Some(t.to_string()) })
        }
        Some(_) => Err(AppError::bad_params(format!(
            "{} must be a string or null",
            key
        ))),
    }
}

pub fn required_str(params: &serde_json::Value, key: &str) -> Result<String, AppError> {
    optional_str(params, key)?.ok_or_else(|| AppError::bad_params(format!("missing {}", key)))
}

pub fn optional_level(params: &serde_json::Value) -> Result<Option<EducationLevel>, AppError> {
    let Some(raw) = optional_str(params, "level")? else {
        return Ok(None);
    };
    EducationLevel::parse(&raw)
        .map(Some)
        .ok_or_else(|| AppError::bad_params("level must be BASICA or MEDIA"))
}

pub fn optional_i64(params: &serde_json::Value, key: &str) -> Result<Option<i64>, AppError> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| AppError::bad_params(format!("{} must be an integer", key))),
    }
}

pub fn optional_date(params: &serde_json::Value, key: &str) -> Result<Option<NaiveDate>, AppError> {
    let Some(raw) = optional_str(params, key)? else {
        return Ok(None);
    };
    dates::parse_date_only(&raw)
        .map(Some)
        .ok_or_else(|| AppError::bad_params(format!("{} must be a YYYY-MM-DD date", key)))
}

pub fn required_date(params: &serde_json::Value, key: &str) -> Result<NaiveDate, AppError> {
    optional_date(params, key)?.ok_or_else(|| AppError::bad_params(format!("missing {}", key)))
}

/// Reads `month` (1-12) and `year` together; one without the other is an error.
pub fn optional_month_year(params: &serde_json::Value) -> Result<Option<(u32, i32)>, AppError> {
    match (optional_i64(params, "month")?, optional_i64(params, "year")?) {
        (None, None) => Ok(None),
        (Some(m), Some(y)) => {
            if !(1..=12).contains(&m) {
                return Err(AppError::bad_params("month must be between 1 and 12"));
            }
            let year = i32::try_from(y).map_err(|_| AppError::bad_params("year out of range"))?;
            Ok(Some((m as u32, year)))
        }
        _ => Err(AppError::bad_params("month and year must be given together")),
    }
}

pub fn ensure_exists(conn: &Connection, table: &'static str, id: &str) -> Result<(), AppError> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", table);
    let found = conn
        .query_row(&sql, [id], |r| r.get::<_, i64>(0))
        .optional()?;
    if found.is_none() {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Column list matching [`student_with_course_at`].
pub const STUDENT_COURSE_COLUMNS: &str = "s.id, s.full_name, s.course_id, s.rut, c.id, c.name, c.level";

pub fn student_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(offset)?,
        full_name: row.get(offset + 1)?,
        course_id: row.get(offset + 2)?,
        rut: row.get(offset + 3)?,
    })
}

pub fn course_ref_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<CourseRef> {
    Ok(CourseRef {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        level: row.get(offset + 2)?,
    })
}

pub fn student_with_course_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<StudentWithCourse> {
    Ok(StudentWithCourse {
        student: student_at(row, offset)?,
        course: course_ref_at(row, offset + 4)?,
    })
}

pub const TEST_COLUMNS: &str = "t.id, t.course_id, t.date, t.subject, t.type, t.description";

pub fn test_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Test> {
    Ok(Test {
        id: row.get(offset)?,
        course_id: row.get(offset + 1)?,
        date: row.get(offset + 2)?,
        subject: row.get(offset + 3)?,
        kind: row.get(offset + 4)?,
        description: row.get(offset + 5)?,
    })
}

/// All tests of the given courses, ordered by date. Only the courses actually
/// present in a result set are fetched.
pub fn tests_for_courses(conn: &Connection, course_ids: &[String]) -> Result<Vec<Test>, AppError> {
    if course_ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; course_ids.len()].join(", ");
    let sql = format!(
        "SELECT {} FROM tests t WHERE t.course_id IN ({}) ORDER BY t.date, t.subject",
        TEST_COLUMNS, placeholders
    );
    let bind: Vec<Value> = course_ids.iter().map(|id| Value::Text(id.clone())).collect();
    let mut stmt = conn.prepare(&sql)?;
    let tests = stmt
        .query_map(params_from_iter(bind), |r| test_at(r, 0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tests)
}

/// Distinct values in first-seen order.
pub fn distinct(ids: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
