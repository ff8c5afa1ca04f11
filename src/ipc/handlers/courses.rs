use crate::errors::AppError;
use crate::ipc::error::ok;
use crate::ipc::helpers::{optional_i64, optional_level, require_conn, required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::records::{Course, EducationLevel};
use rusqlite::{Connection, Row};
use serde_json::json;
use uuid::Uuid;

fn course_from_row(r: &Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: r.get(0)?,
        name: r.get(1)?,
        level: r.get(2)?,
        position: r.get(3)?,
    })
}

fn courses_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, AppError> {
    let level = optional_level(params)?;
    let mut stmt = conn.prepare(
        "SELECT id, name, level, position
         FROM courses
         WHERE (?1 IS NULL OR level = ?1)
         ORDER BY position IS NULL, position, name",
    )?;
    let courses = stmt
        .query_map([level], course_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(count = courses.len(), "courses listed");
    Ok(json!({ "courses": courses }))
}

fn next_position(conn: &Connection) -> Result<i64, AppError> {
    let max: Option<i64> = conn.query_row("SELECT MAX(position) FROM courses", [], |r| r.get(0))?;
    Ok(max.unwrap_or(0) + 1)
}

fn insert_course(
    conn: &Connection,
    name: &str,
    level: Option<EducationLevel>,
    position: i64,
) -> Result<Course, AppError> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO courses(id, name, level, position) VALUES(?, ?, ?, ?)",
        (&id, name, level, position),
    )?;
    Ok(Course {
        id,
        name: name.to_string(),
        level,
        position: Some(position),
    })
}

fn courses_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, AppError> {
    let name = required_str(params, "name")?;
    let level = optional_level(params)?;
    let position = match optional_i64(params, "position")? {
        Some(p) => p,
        None => next_position(conn)?,
    };
    let course = insert_course(conn, &name, level, position)?;
    tracing::info!(course_id = %course.id, name = %course.name, "course created");
    Ok(json!({ "course": course }))
}

fn courses_bulk_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, AppError> {
    let Some(items) = params.get("courses").and_then(|v| v.as_array()) else {
        return Err(AppError::bad_params("missing courses"));
    };

    let tx = conn.unchecked_transaction()?;
    let mut position = next_position(&tx)?;
    let mut created = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let name = required_str(item, "name")
            .map_err(|_| AppError::bad_params(format!("courses[{}].name is required", i)))?;
        let level = optional_level(item)?;
        created.push(insert_course(&tx, &name, level, position)?);
        position += 1;
    }
    tx.commit()?;
    tracing::info!(count = created.len(), "courses bulk created");
    Ok(json!({ "courses": created }))
}

fn handle_courses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "courses": [] }));
    };
    respond(req, courses_list(conn, &req.params))
}

fn handle_courses_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = require_conn(state).and_then(|conn| courses_create(conn, &req.params));
    respond(req, result)
}

fn handle_courses_bulk_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = require_conn(state).and_then(|conn| courses_bulk_create(conn, &req.params));
    respond(req, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.list" => Some(handle_courses_list(state, req)),
        "courses.create" => Some(handle_courses_create(state, req)),
        "courses.bulkCreate" => Some(handle_courses_bulk_create(state, req)),
        _ => None,
    }
}
