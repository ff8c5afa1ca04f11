//! Read-only view for teaching staff. Rows here never carry a rut or the
//! justification document.

use super::absences::{joined_row_at, load_joined_absence, ABSENCE_JOIN_SELECT};
use crate::dates;
use crate::errors::AppError;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    distinct, optional_level, optional_month_year, optional_str, require_conn, required_str,
    respond, tests_for_courses,
};
use crate::ipc::types::{AppState, Request};
use crate::overlap;
use crate::records::{TeacherPublicAbsence, TeacherPublicTest};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde_json::json;

fn public_absences(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, AppError> {
    let Some((month, year)) = optional_month_year(params)? else {
        return Err(AppError::bad_params("missing month/year"));
    };
    let (first, last) =
        dates::month_bounds(year, month).ok_or_else(|| AppError::bad_params("invalid month/year"))?;
    let level = optional_level(params)?;
    let course_id = optional_str(params, "courseId")?;

    let mut sql = format!("{} WHERE a.start_date <= ?", ABSENCE_JOIN_SELECT);
    let mut bind: Vec<Value> = vec![Value::Text(last.to_string())];
    if let Some(level) = level {
        sql.push_str(" AND c.level = ?");
        bind.push(Value::Text(level.as_str().to_string()));
    }
    if let Some(cid) = course_id {
        sql.push_str(" AND s.course_id = ?");
        bind.push(Value::Text(cid));
    }
    sql.push_str(" ORDER BY a.start_date DESC, s.full_name, a.id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(bind), joined_row_at)?
        .collect::<Result<Vec<_>, _>>()?;
    let rows: Vec<_> = rows
        .into_iter()
        .filter(|r| overlap::ranges_overlap(r.absence.start_date, r.absence.end_date, first, last))
        .collect();

    let course_ids = distinct(rows.iter().map(|r| r.course.id.clone()));
    let tests = tests_for_courses(conn, &course_ids)?;
    let absences: Vec<TeacherPublicAbsence> = overlap::attach_affected_tests(rows, tests)
        .into_iter()
        .map(|a| TeacherPublicAbsence {
            period_label: format!(
                "{} - {}",
                dates::format_date_es(a.absence.start_date),
                dates::format_date_es(a.absence.end_date)
            ),
            absence_id: a.absence.id,
            student_name: a.student.student.full_name,
            course_id: a.student.course.id,
            course_name: a.student.course.name,
            course_level: a.student.course.level,
            start_date: a.absence.start_date,
            end_date: a.absence.end_date,
            status: a.absence.status,
            observation: a.absence.observation,
            affected_tests_count: a.affected_tests.len(),
        })
        .collect();
    tracing::debug!(month, year, count = absences.len(), "public absences listed");
    Ok(json!({ "absences": absences }))
}

fn public_absence_detail(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, AppError> {
    let absence_id = required_str(params, "absenceId")?;
    let row = load_joined_absence(conn, &absence_id)?;
    let course_tests = tests_for_courses(conn, std::slice::from_ref(&row.course.id))?;
    let tests: Vec<TeacherPublicTest> =
        overlap::find_affected_tests(&course_tests, row.absence.start_date, row.absence.end_date)
            .iter()
            .map(TeacherPublicTest::from)
            .collect();
    Ok(json!({ "tests": tests }))
}

fn handle_public_absences(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "absences": [] }));
    };
    respond(req, public_absences(conn, &req.params))
}

fn handle_public_absence_detail(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = require_conn(state).and_then(|conn| public_absence_detail(conn, &req.params));
    respond(req, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teacher.publicAbsences" => Some(handle_public_absences(state, req)),
        "teacher.publicAbsenceDetail" => Some(handle_public_absence_detail(state, req)),
        _ => None,
    }
}
