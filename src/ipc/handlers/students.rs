use super::absences::absence_at;
use crate::errors::AppError;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    course_ref_at, optional_level, optional_str, require_conn, required_str,
    respond, student_at, student_with_course_at, STUDENT_COURSE_COLUMNS,
};
use crate::ipc::types::{AppState, Request};
use crate::records::{InspectorateRecord, Student};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn students_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, AppError> {
    let course_id = optional_str(params, "courseId")?;
    let level = optional_level(params)?;
    let sql = format!(
        "SELECT {}
         FROM students s
         JOIN courses c ON c.id = s.course_id
         WHERE (?1 IS NULL OR s.course_id = ?1)
           AND (?2 IS NULL OR c.level = ?2)
         ORDER BY s.full_name, s.id",
        STUDENT_COURSE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let students = stmt
        .query_map((&course_id, level), |r| student_with_course_at(r, 0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "students": students }))
}

struct StudentInput {
    full_name: String,
    course_id: String,
    rut: Option<String>,
}

fn read_student_input(item: &serde_json::Value) -> Result<StudentInput, AppError> {
    Ok(StudentInput {
        full_name: required_str(item, "fullName")?,
        course_id: required_str(item, "courseId")?,
        rut: optional_str(item, "rut")?,
    })
}

fn insert_student(conn: &Connection, input: StudentInput) -> Result<Student, AppError> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, course_id, full_name, rut) VALUES(?, ?, ?, ?)",
        (&id, &input.course_id, &input.full_name, &input.rut),
    )?;
    Ok(Student {
        id,
        full_name: input.full_name,
        course_id: Some(input.course_id),
        rut: input.rut,
    })
}

fn students_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, AppError> {
    let input = read_student_input(params)?;
    let student = insert_student(conn, input)?;
    tracing::info!(student_id = %student.id, "student created");
    Ok(json!({ "student": student }))
}

fn students_bulk_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, AppError> {
    let Some(items) = params.get("students").and_then(|v| v.as_array()) else {
        return Err(AppError::bad_params("missing students"));
    };
    let inputs = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            read_student_input(item).map_err(|e| AppError::bad_params(format!("students[{}]: {}", i, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let tx = conn.unchecked_transaction()?;
    let mut created = Vec::with_capacity(inputs.len());
    for input in inputs {
        created.push(insert_student(&tx, input)?);
    }
    tx.commit()?;
    tracing::info!(count = created.len(), "students bulk created");
    Ok(json!({ "students": created }))
}

fn students_details(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, AppError> {
    let student_id = required_str(params, "studentId")?;
    let (student, course) = conn
        .query_row(
            "SELECT s.id, s.full_name, s.course_id, s.rut, c.id, c.name, c.level
             FROM students s
             LEFT JOIN courses c ON c.id = s.course_id
             WHERE s.id = ?",
            [&student_id],
            |r| {
                let student = student_at(r, 0)?;
                let course = match r.get::<_, Option<String>>(4)? {
                    Some(_) => Some(course_ref_at(r, 4)?),
                    None => None,
                };
                Ok((student, course))
            },
        )
        .optional()?
        .ok_or(AppError::NotFound)?;

    let mut stmt = conn.prepare(
        "SELECT id, student_id, start_date, end_date, status, observation, document_url
         FROM absences
         WHERE student_id = ?
         ORDER BY start_date DESC, id",
    )?;
    let absences = stmt
        .query_map([&student_id], |r| absence_at(r, 0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, student_id, date_time, observation, actions_taken
         FROM inspectorate_records
         WHERE student_id = ?
         ORDER BY date_time DESC, id",
    )?;
    let records = stmt
        .query_map([&student_id], |r| {
            Ok(InspectorateRecord {
                id: r.get(0)?,
                student_id: r.get(1)?,
                date_time: r.get(2)?,
                observation: r.get(3)?,
                actions_taken: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(json!({
        "student": student,
        "course": course,
        "absences": absences,
        "records": records
    }))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "students": [] }));
    };
    respond(req, students_list(conn, &req.params))
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = require_conn(state).and_then(|conn| students_create(conn, &req.params));
    respond(req, result)
}

fn handle_students_bulk_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = require_conn(state).and_then(|conn| students_bulk_create(conn, &req.params));
    respond(req, result)
}

fn handle_students_details(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = require_conn(state).and_then(|conn| students_details(conn, &req.params));
    respond(req, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.bulkCreate" => Some(handle_students_bulk_create(state, req)),
        "students.details" => Some(handle_students_details(state, req)),
        _ => None,
    }
}
