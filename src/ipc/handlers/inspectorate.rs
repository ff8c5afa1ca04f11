use crate::dates;
use crate::errors::AppError;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    ensure_exists, optional_level, optional_str, require_conn, respond, student_with_course_at,
    STUDENT_COURSE_COLUMNS,
};
use crate::ipc::types::{AppState, Request};
use crate::records::{InspectorateRecord, InspectorateWithStudent};
use crate::validate::{self, InspectorateDraft};
use chrono::{Duration, NaiveDateTime};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde_json::json;
use uuid::Uuid;

/// Lower/upper bounds for `date_time`. A bare-date upper bound covers the
/// whole day, so it becomes an exclusive bound at the next midnight.
enum UpperBound {
    Inclusive(NaiveDateTime),
    Before(NaiveDateTime),
}

fn read_lower(params: &serde_json::Value) -> Result<Option<NaiveDateTime>, AppError> {
    let Some(raw) = optional_str(params, "startDate")? else {
        return Ok(None);
    };
    dates::parse_date_time(&raw)
        .map(Some)
        .ok_or_else(|| AppError::bad_params("startDate must be a date or date-time"))
}

fn read_upper(params: &serde_json::Value) -> Result<Option<UpperBound>, AppError> {
    let Some(raw) = optional_str(params, "endDate")? else {
        return Ok(None);
    };
    let bare_day = if raw.len() == 10 {
        dates::parse_date_only(&raw)
    } else {
        None
    };
    if let Some(day) = bare_day {
        let next = day.and_hms_opt(0, 0, 0).map(|m| m + Duration::days(1));
        return next
            .map(|n| Some(UpperBound::Before(n)))
            .ok_or_else(|| AppError::bad_params("endDate out of range"));
    }
    dates::parse_date_time(&raw)
        .map(|dt| Some(UpperBound::Inclusive(dt)))
        .ok_or_else(|| AppError::bad_params("endDate must be a date or date-time"))
}

fn inspectorate_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, AppError> {
    let level = optional_level(params)?;
    let lower = read_lower(params)?;
    let upper = read_upper(params)?;

    let mut sql = format!(
        "SELECT r.id, r.student_id, r.date_time, r.observation, r.actions_taken, {}
         FROM inspectorate_records r
         JOIN students s ON s.id = r.student_id
         JOIN courses c ON c.id = s.course_id
         WHERE 1 = 1",
        STUDENT_COURSE_COLUMNS
    );
    let mut bind: Vec<Value> = Vec::new();
    if let Some(level) = level {
        sql.push_str(" AND c.level = ?");
        bind.push(Value::Text(level.as_str().to_string()));
    }
    // date_time is stored as "%Y-%m-%d %H:%M:%S", so text comparison orders correctly.
    if let Some(lower) = lower {
        sql.push_str(" AND r.date_time >= ?");
        bind.push(Value::Text(lower.format("%Y-%m-%d %H:%M:%S").to_string()));
    }
    match upper {
        Some(UpperBound::Inclusive(dt)) => {
            sql.push_str(" AND r.date_time <= ?");
            bind.push(Value::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()));
        }
        Some(UpperBound::Before(dt)) => {
            sql.push_str(" AND r.date_time < ?");
            bind.push(Value::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()));
        }
        None => {}
    }
    sql.push_str(" ORDER BY r.date_time DESC, r.id");

    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(params_from_iter(bind), |r| {
            Ok(InspectorateWithStudent {
                record: InspectorateRecord {
                    id: r.get(0)?,
                    student_id: r.get(1)?,
                    date_time: r.get(2)?,
                    observation: r.get(3)?,
                    actions_taken: r.get(4)?,
                },
                student: student_with_course_at(r, 5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "records": records }))
}

fn inspectorate_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, AppError> {
    let student_id = optional_str(params, "studentId")?;
    let date_time = optional_str(params, "dateTime")?;
    let observation = optional_str(params, "observation")?;
    let actions_taken = optional_str(params, "actionsTaken")?;
    let draft = InspectorateDraft {
        student_id: student_id.as_deref(),
        date_time: date_time.as_deref(),
        observation: observation.as_deref(),
        actions_taken: actions_taken.as_deref(),
    };
    let new_record = validate::check_inspectorate_record(&draft)?;
    ensure_exists(conn, "students", &new_record.student_id)?;

    let record = InspectorateRecord {
        id: Uuid::new_v4().to_string(),
        student_id: Some(new_record.student_id),
        date_time: new_record.date_time,
        observation: new_record.observation,
        actions_taken: new_record.actions_taken,
    };
    conn.execute(
        "INSERT INTO inspectorate_records(id, student_id, date_time, observation, actions_taken)
         VALUES(?, ?, ?, ?, ?)",
        (
            &record.id,
            &record.student_id,
            record.date_time,
            &record.observation,
            &record.actions_taken,
        ),
    )?;
    tracing::info!(record_id = %record.id, "inspectorate record created");
    Ok(json!({ "record": record }))
}

fn handle_inspectorate_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "records": [] }));
    };
    respond(req, inspectorate_list(conn, &req.params))
}

fn handle_inspectorate_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = require_conn(state).and_then(|conn| inspectorate_create(conn, &req.params));
    respond(req, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "inspectorate.list" => Some(handle_inspectorate_list(state, req)),
        "inspectorate.create" => Some(handle_inspectorate_create(state, req)),
        _ => None,
    }
}
