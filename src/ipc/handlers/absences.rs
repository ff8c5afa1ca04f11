use crate::errors::AppError;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    course_ref_at, distinct, optional_date, optional_level, optional_str, require_conn,
    required_date, required_str, respond, student_at, tests_for_courses,
};
use crate::ipc::types::{AppState, Request};
use crate::overlap;
use crate::records::{Absence, AbsenceJoinedRow, AbsenceStatus, AbsenceWithDetails, EducationLevel};
use crate::validate::{self, AbsenceDraft};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde_json::json;
use uuid::Uuid;

/// Absence joined to its student and the student's course. Absences whose
/// student has no course are not reachable through this join.
pub(super) const ABSENCE_JOIN_SELECT: &str = "SELECT
       a.id, a.student_id, a.start_date, a.end_date, a.status, a.observation, a.document_url,
       s.id, s.full_name, s.course_id, s.rut,
       c.id, c.name, c.level
     FROM absences a
     JOIN students s ON s.id = a.student_id
     JOIN courses c ON c.id = s.course_id";

pub(super) fn absence_at(r: &Row<'_>, offset: usize) -> rusqlite::Result<Absence> {
    Ok(Absence {
        id: r.get(offset)?,
        student_id: r.get(offset + 1)?,
        start_date: r.get(offset + 2)?,
        end_date: r.get(offset + 3)?,
        status: r.get(offset + 4)?,
        observation: r.get(offset + 5)?,
        document_url: r.get(offset + 6)?,
    })
}

pub(super) fn joined_row_at(r: &Row<'_>) -> rusqlite::Result<AbsenceJoinedRow> {
    Ok(AbsenceJoinedRow {
        absence: absence_at(r, 0)?,
        student: student_at(r, 7)?,
        course: course_ref_at(r, 11)?,
    })
}

#[derive(Debug, Default)]
struct AbsenceFilter {
    course_id: Option<String>,
    level: Option<EducationLevel>,
    status: Option<AbsenceStatus>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl AbsenceFilter {
    fn from_params(params: &serde_json::Value) -> Result<Self, AppError> {
        let status = match optional_str(params, "status")? {
            Some(raw) => Some(
                AbsenceStatus::parse(&raw)
                    .ok_or_else(|| AppError::bad_params("status must be PENDIENTE or JUSTIFICADA"))?,
            ),
            None => None,
        };
        Ok(AbsenceFilter {
            course_id: optional_str(params, "courseId")?,
            level: optional_level(params)?,
            status,
            start: optional_date(params, "startDate")?,
            end: optional_date(params, "endDate")?,
        })
    }
}

/// Runs the filtered join, then resolves affected tests against only the
/// courses that appear in the result.
fn query_absences(conn: &Connection, filter: &AbsenceFilter) -> Result<Vec<AbsenceWithDetails>, AppError> {
    let mut sql = format!("{} WHERE 1 = 1", ABSENCE_JOIN_SELECT);
    let mut bind: Vec<Value> = Vec::new();
    if let Some(level) = filter.level {
        sql.push_str(" AND c.level = ?");
        bind.push(Value::Text(level.as_str().to_string()));
    }
    if let Some(cid) = filter.course_id.as_ref() {
        sql.push_str(" AND s.course_id = ?");
        bind.push(Value::Text(cid.clone()));
    }
    if let Some(status) = filter.status {
        sql.push_str(" AND a.status = ?");
        bind.push(Value::Text(status.as_str().to_string()));
    }
    match (filter.start, filter.end) {
        (Some(start), Some(end)) => {
            sql.push_str(" AND a.start_date <= ? AND a.end_date >= ?");
            bind.push(Value::Text(end.to_string()));
            bind.push(Value::Text(start.to_string()));
        }
        (Some(start), None) => {
            sql.push_str(" AND a.start_date >= ?");
            bind.push(Value::Text(start.to_string()));
        }
        (None, Some(end)) => {
            sql.push_str(" AND a.end_date <= ?");
            bind.push(Value::Text(end.to_string()));
        }
        (None, None) => {}
    }
    sql.push_str(" ORDER BY a.start_date DESC, s.full_name, a.id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(bind), joined_row_at)?
        .collect::<Result<Vec<_>, _>>()?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let course_ids = distinct(rows.iter().map(|r| r.course.id.clone()));
    let tests = tests_for_courses(conn, &course_ids)?;
    tracing::debug!(
        absences = rows.len(),
        courses = course_ids.len(),
        tests = tests.len(),
        "resolving affected tests"
    );
    Ok(overlap::attach_affected_tests(rows, tests))
}

pub(super) fn load_joined_absence(conn: &Connection, absence_id: &str) -> Result<AbsenceJoinedRow, AppError> {
    let sql = format!("{} WHERE a.id = ?", ABSENCE_JOIN_SELECT);
    conn.query_row(&sql, [absence_id], joined_row_at)
        .optional()?
        .ok_or(AppError::NotFound)
}

fn load_absence(conn: &Connection, absence_id: &str) -> Result<Absence, AppError> {
    conn.query_row(
        "SELECT id, student_id, start_date, end_date, status, observation, document_url
         FROM absences
         WHERE id = ?",
        [absence_id],
        |r| absence_at(r, 0),
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

fn absences_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, AppError> {
    let filter = AbsenceFilter::from_params(params)?;
    let absences = query_absences(conn, &filter)?;
    Ok(json!({ "absences": absences }))
}

fn absences_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, AppError> {
    let student_id = optional_str(params, "studentId")?;
    let start_date = optional_str(params, "startDate")?;
    let end_date = optional_str(params, "endDate")?;
    let observation = optional_str(params, "observation")?;
    let document_url = optional_str(params, "documentUrl")?;
    let draft = AbsenceDraft {
        student_id: student_id.as_deref(),
        start_date: start_date.as_deref(),
        end_date: end_date.as_deref(),
        observation: observation.as_deref(),
    };
    let new_absence = validate::check_absence(&draft)?;

    let absence = Absence {
        id: Uuid::new_v4().to_string(),
        student_id: Some(new_absence.student_id),
        start_date: new_absence.start_date,
        end_date: new_absence.end_date,
        status: overlap::status_for_document(document_url.as_deref()),
        observation: new_absence.observation,
        document_url,
    };
    conn.execute(
        "INSERT INTO absences(id, student_id, start_date, end_date, status, observation, document_url)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &absence.id,
            &absence.student_id,
            absence.start_date,
            absence.end_date,
            absence.status,
            &absence.observation,
            &absence.document_url,
        ),
    )?;
    tracing::info!(
        absence_id = %absence.id,
        status = absence.status.as_str(),
        "absence recorded"
    );
    Ok(json!({ "absence": absence }))
}

fn absences_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, AppError> {
    let absence_id = required_str(params, "absenceId")?;
    let Some(patch) = params.get("patch").filter(|v| v.is_object()) else {
        return Err(AppError::bad_params("missing patch"));
    };
    if patch.get("status").is_some() {
        return Err(AppError::bad_params(
            "status is derived from the attached document and cannot be set directly",
        ));
    }

    let current = load_absence(conn, &absence_id)?;
    let mut errors = Vec::new();
    let mut patched_date = |field: &'static str, existing: NaiveDate| -> Result<NaiveDate, AppError> {
        if patch.get(field).is_none() {
            return Ok(existing);
        }
        let raw = optional_str(patch, field)?;
        Ok(match validate::check_absence_date(field, raw.as_deref()) {
            Ok(d) => d,
            Err(fe) => {
                errors.push(fe);
                existing
            }
        })
    };
    let start_date = patched_date("startDate", current.start_date)?;
    let end_date = patched_date("endDate", current.end_date)?;
    if !errors.is_empty() {
        return Err(AppError::from(errors));
    }
    let observation = if patch.get("observation").is_some() {
        optional_str(patch, "observation")?
    } else {
        current.observation.clone()
    };
    let document_url = if patch.get("documentUrl").is_some() {
        optional_str(patch, "documentUrl")?
    } else {
        current.document_url.clone()
    };

    validate::check_absence_range(start_date, end_date)?;
    validate::check_observation(observation.as_deref())?;
    let status = overlap::status_for_document(document_url.as_deref());

    conn.execute(
        "UPDATE absences
         SET start_date = ?, end_date = ?, observation = ?, document_url = ?, status = ?
         WHERE id = ?",
        (
            start_date,
            end_date,
            &observation,
            &document_url,
            status,
            &absence_id,
        ),
    )?;
    if status != current.status {
        tracing::info!(
            absence_id = %absence_id,
            from = current.status.as_str(),
            to = status.as_str(),
            "absence status changed"
        );
    }

    let updated = Absence {
        id: absence_id,
        student_id: current.student_id,
        start_date,
        end_date,
        status,
        observation,
        document_url,
    };
    Ok(json!({ "absence": updated }))
}

fn absences_affected_tests(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, AppError> {
    let absence_id = required_str(params, "absenceId")?;
    let row = load_joined_absence(conn, &absence_id)?;
    let course_tests = tests_for_courses(conn, std::slice::from_ref(&row.course.id))?;
    let affected =
        overlap::find_affected_tests(&course_tests, row.absence.start_date, row.absence.end_date);
    Ok(json!({ "tests": affected }))
}

fn absences_count_affected_tests(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, AppError> {
    let student_id = required_str(params, "studentId")?;
    let start = required_date(params, "startDate")?;
    let end = required_date(params, "endDate")?;

    let course_id: Option<String> = conn
        .query_row(
            "SELECT course_id FROM students WHERE id = ?",
            [&student_id],
            |r| r.get(0),
        )
        .optional()?
        .ok_or(AppError::NotFound)?;
    let Some(course_id) = course_id else {
        return Ok(json!({ "count": 0 }));
    };
    let course_tests = tests_for_courses(conn, &[course_id])?;
    let count = overlap::find_affected_tests(&course_tests, start, end).len();
    Ok(json!({ "count": count }))
}

fn absences_stats(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, AppError> {
    let filter = AbsenceFilter::from_params(params)?;
    let absences = query_absences(conn, &filter)?;
    let stats = overlap::absence_stats(&absences);
    Ok(json!(stats))
}

fn handle_absences_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "absences": [] }));
    };
    respond(req, absences_list(conn, &req.params))
}

fn handle_absences_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = require_conn(state).and_then(|conn| absences_create(conn, &req.params));
    respond(req, result)
}

fn handle_absences_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = require_conn(state).and_then(|conn| absences_update(conn, &req.params));
    respond(req, result)
}

fn handle_absences_affected_tests(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = require_conn(state).and_then(|conn| absences_affected_tests(conn, &req.params));
    respond(req, result)
}

fn handle_absences_count_affected_tests(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result =
        require_conn(state).and_then(|conn| absences_count_affected_tests(conn, &req.params));
    respond(req, result)
}

fn handle_absences_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = require_conn(state).and_then(|conn| absences_stats(conn, &req.params));
    respond(req, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "absences.list" => Some(handle_absences_list(state, req)),
        "absences.create" => Some(handle_absences_create(state, req)),
        "absences.update" => Some(handle_absences_update(state, req)),
        "absences.affectedTests" => Some(handle_absences_affected_tests(state, req)),
        "absences.countAffectedTests" => Some(handle_absences_count_affected_tests(state, req)),
        "absences.stats" => Some(handle_absences_stats(state, req)),
        _ => None,
    }
}
