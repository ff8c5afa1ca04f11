use crate::errors::AppError;
use crate::ipc::helpers::{optional_date, require_conn, respond};
use crate::ipc::types::{AppState, Request};
use crate::records::EducationLevel;
use chrono::{Duration, Local, NaiveDate};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

const SEED_COURSES: [(&str, EducationLevel); 4] = [
    ("1° Básico A", EducationLevel::Basica),
    ("2° Básico B", EducationLevel::Basica),
    ("1° Medio A", EducationLevel::Media),
    ("2° Medio B", EducationLevel::Media),
];

const SEED_STUDENTS: [(&str, &str); 3] = [
    ("Juan Pérez", "12.345.678-9"),
    ("María González", "23.456.789-0"),
    ("Diego Muñoz", "15.678.901-2"),
];

const SEED_SUBJECTS: [&str; 4] = ["Matemáticas", "Lenguaje", "Historia", "Ciencias"];
const SEED_TEST_TYPES: [&str; 3] = ["Prueba Coeficiente 1", "Control", "Trabajo Práctico"];
const TESTS_PER_COURSE: i64 = 5;

/// Demo data around `today`. Runs in one transaction; a second run against the
/// same workspace fails on the unique course names and leaves it untouched.
fn seed(conn: &Connection, today: NaiveDate) -> Result<serde_json::Value, AppError> {
    let tx = conn.unchecked_transaction()?;
    let mut courses = 0usize;
    let mut students = 0usize;
    let mut tests = 0usize;

    for (position, (name, level)) in SEED_COURSES.iter().enumerate() {
        let course_id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO courses(id, name, level, position) VALUES(?, ?, ?, ?)",
            (&course_id, name, level, position as i64 + 1),
        )?;
        courses += 1;

        for (full_name, rut) in SEED_STUDENTS {
            tx.execute(
                "INSERT INTO students(id, course_id, full_name, rut) VALUES(?, ?, ?, ?)",
                (
                    Uuid::new_v4().to_string(),
                    &course_id,
                    format!("{} ({})", full_name, name),
                    rut,
                ),
            )?;
            students += 1;
        }

        for i in 0..TESTS_PER_COURSE {
            let date = today + Duration::days(3 * i - 5);
            let idx = i as usize;
            tx.execute(
                "INSERT INTO tests(id, course_id, date, subject, type, description)
                 VALUES(?, ?, ?, ?, ?, ?)",
                (
                    Uuid::new_v4().to_string(),
                    &course_id,
                    date,
                    SEED_SUBJECTS[idx % SEED_SUBJECTS.len()],
                    SEED_TEST_TYPES[idx % SEED_TEST_TYPES.len()],
                    format!("Evaluación de contenidos unidad {}", i + 1),
                ),
            )?;
            tests += 1;
        }
    }

    tx.commit()?;
    tracing::info!(courses, students, tests, today = %today, "workspace seeded");
    Ok(json!({
        "courses": courses,
        "students": students,
        "tests": tests
    }))
}

fn admin_seed(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, AppError> {
    let today = optional_date(params, "today")?.unwrap_or_else(|| Local::now().date_naive());
    seed(conn, today)
}

fn handle_admin_seed(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = require_conn(state).and_then(|conn| admin_seed(conn, &req.params));
    respond(req, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "admin.seed" => Some(handle_admin_seed(state, req)),
        _ => None,
    }
}
