use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendanced");
    let mut child = Command::new(exe)
        .env_remove("ATTENDANCED_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendanced");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_default()
}

fn names(list: &serde_json::Value, key: &str, field: &str) -> Vec<String> {
    list[key]
        .as_array()
        .expect("array")
        .iter()
        .map(|v| v[field].as_str().unwrap_or("").to_string())
        .collect()
}

#[test]
fn courses_keep_position_order_and_reject_duplicates() {
    let workspace = temp_dir("attendance-courses");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let (s, r) = (&mut stdin, &mut reader);
    request_ok(s, r, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));

    request_ok(
        s,
        r,
        "2",
        "courses.bulkCreate",
        json!({ "courses": [
            { "name": "Kínder", "level": "BASICA" },
            { "name": "1° Medio A", "level": "MEDIA" }
        ] }),
    );
    let explicit = request_ok(
        s,
        r,
        "3",
        "courses.create",
        json!({ "name": "Pre-Kínder", "level": "BASICA", "position": 0 }),
    );
    assert_eq!(explicit["course"]["position"], 0);
    let appended = request_ok(s, r, "4", "courses.create", json!({ "name": "Taller" }));
    assert_eq!(appended["course"]["position"], 3);
    assert!(appended["course"]["level"].is_null());

    let all = request_ok(s, r, "5", "courses.list", json!({}));
    assert_eq!(
        names(&all, "courses", "name"),
        vec!["Pre-Kínder", "Kínder", "1° Medio A", "Taller"]
    );
    let basica = request_ok(s, r, "6", "courses.list", json!({ "level": "basica" }));
    assert_eq!(names(&basica, "courses", "name"), vec!["Pre-Kínder", "Kínder"]);

    let dup = request(s, r, "7", "courses.create", json!({ "name": "Kínder" }));
    assert_eq!(dup["ok"], false);
    assert_eq!(dup["error"]["code"], "duplicate_record");
    assert_eq!(dup["error"]["message"], "Registro duplicado detectado.");
    assert_eq!(dup["error"]["details"]["status"], 400);

    // One bad item rolls back the whole batch.
    let partial = request(
        s,
        r,
        "8",
        "courses.bulkCreate",
        json!({ "courses": [{ "name": "Nuevo" }, { "name": "Taller" }] }),
    );
    assert_eq!(partial["error"]["code"], "duplicate_record");
    let after = request_ok(s, r, "9", "courses.list", json!({}));
    assert_eq!(after["courses"].as_array().map(|c| c.len()), Some(4));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn students_and_tests_lists_filter_and_nest_courses() {
    let workspace = temp_dir("attendance-students-tests");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let (s, r) = (&mut stdin, &mut reader);
    request_ok(s, r, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));

    let a = request_ok(s, r, "2", "courses.create", json!({ "name": "6° Básico A", "level": "BASICA" }));
    let b = request_ok(s, r, "3", "courses.create", json!({ "name": "2° Medio C", "level": "MEDIA" }));
    let course_a = a["course"]["id"].as_str().expect("id").to_string();
    let course_b = b["course"]["id"].as_str().expect("id").to_string();

    let bulk = request_ok(
        s,
        r,
        "4",
        "students.bulkCreate",
        json!({ "students": [
            { "fullName": "Tomás Reyes", "courseId": course_a },
            { "fullName": "Antonia Díaz", "courseId": course_a, "rut": "21.000.000-K" },
            { "fullName": "Ignacio Pino", "courseId": course_b }
        ] }),
    );
    assert_eq!(bulk["students"].as_array().map(|v| v.len()), Some(3));

    let in_a = request_ok(s, r, "5", "students.list", json!({ "courseId": course_a }));
    assert_eq!(names(&in_a, "students", "fullName"), vec!["Antonia Díaz", "Tomás Reyes"]);
    assert_eq!(in_a["students"][0]["course"]["name"], "6° Básico A");
    assert_eq!(in_a["students"][0]["rut"], "21.000.000-K");
    let media = request_ok(s, r, "6", "students.list", json!({ "level": "MEDIA" }));
    assert_eq!(names(&media, "students", "fullName"), vec!["Ignacio Pino"]);

    let bad_bulk = request(
        s,
        r,
        "7",
        "students.bulkCreate",
        json!({ "students": [{ "fullName": "Sin Curso" }] }),
    );
    assert_eq!(bad_bulk["error"]["code"], "bad_params");

    for (i, (course, date)) in [
        (&course_a, "2026-02-28"),
        (&course_a, "2026-03-01"),
        (&course_b, "2026-03-31"),
        (&course_a, "2026-04-01"),
    ]
    .into_iter()
    .enumerate()
    {
        request_ok(
            s,
            r,
            &format!("t{}", i),
            "tests.create",
            json!({ "courseId": course, "date": date, "subject": "Matemáticas", "type": "Control" }),
        );
    }

    let march = request_ok(s, r, "8", "tests.list", json!({ "month": 3, "year": 2026 }));
    assert_eq!(names(&march, "tests", "date"), vec!["2026-03-01", "2026-03-31"]);
    assert_eq!(march["tests"][1]["course"]["name"], "2° Medio C");
    let march_a = request_ok(
        s,
        r,
        "9",
        "tests.list",
        json!({ "month": 3, "year": 2026, "courseId": course_a }),
    );
    assert_eq!(names(&march_a, "tests", "date"), vec!["2026-03-01"]);
    let half_period = request(s, r, "10", "tests.list", json!({ "year": 2026 }));
    assert_eq!(half_period["error"]["code"], "bad_params");

    let short_subject = request(
        s,
        r,
        "11",
        "tests.create",
        json!({ "courseId": course_a, "date": "2026-03-02", "subject": "Ma", "type": "Control" }),
    );
    assert_eq!(short_subject["error"]["code"], "validation_failed");
    assert_eq!(short_subject["error"]["details"]["fields"][0]["field"], "subject");

    let orphan = request(
        s,
        r,
        "12",
        "tests.create",
        json!({ "courseId": "ghost", "date": "2026-03-02", "subject": "Música", "type": "Control" }),
    );
    assert_eq!(orphan["error"]["code"], "foreign_key_violation");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn student_details_collect_absences_and_records() {
    let workspace = temp_dir("attendance-student-details");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let (s, r) = (&mut stdin, &mut reader);
    request_ok(s, r, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));

    let c = request_ok(s, r, "2", "courses.create", json!({ "name": "8° Básico B", "level": "BASICA" }));
    let course_id = c["course"]["id"].as_str().expect("id").to_string();
    let st = request_ok(
        s,
        r,
        "3",
        "students.create",
        json!({ "fullName": "Florencia Lagos", "courseId": course_id }),
    );
    let student_id = st["student"]["id"].as_str().expect("id").to_string();

    for (i, start) in ["2026-03-02", "2026-03-16"].into_iter().enumerate() {
        request_ok(
            s,
            r,
            &format!("a{}", i),
            "absences.create",
            json!({ "studentId": student_id, "startDate": start, "endDate": start }),
        );
    }
    request_ok(
        s,
        r,
        "4",
        "inspectorate.create",
        json!({
            "studentId": student_id,
            "dateTime": "2026-03-18 10:15",
            "observation": "Conversación con apoderado",
            "actionsTaken": "Se acuerda seguimiento semanal"
        }),
    );

    let details = request_ok(s, r, "5", "students.details", json!({ "studentId": student_id }));
    assert_eq!(details["student"]["fullName"], "Florencia Lagos");
    assert_eq!(details["course"]["name"], "8° Básico B");
    assert_eq!(names(&details, "absences", "startDate"), vec!["2026-03-16", "2026-03-02"]);
    assert_eq!(details["records"][0]["dateTime"], "2026-03-18T10:15:00");
    assert_eq!(details["records"][0]["actionsTaken"], "Se acuerda seguimiento semanal");

    let missing = request(s, r, "6", "students.details", json!({ "studentId": "ghost" }));
    assert_eq!(missing["error"]["code"], "not_found");
    assert_eq!(missing["error"]["details"]["status"], 404);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn inspectorate_bounds_include_the_whole_end_day() {
    let workspace = temp_dir("attendance-inspectorate");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let (s, r) = (&mut stdin, &mut reader);
    request_ok(s, r, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));

    let c = request_ok(s, r, "2", "courses.create", json!({ "name": "3° Medio A", "level": "MEDIA" }));
    let course_id = c["course"]["id"].as_str().expect("id").to_string();
    let st = request_ok(
        s,
        r,
        "3",
        "students.create",
        json!({ "fullName": "Martín Ulloa", "courseId": course_id }),
    );
    let student_id = st["student"]["id"].as_str().expect("id").to_string();

    for (i, when) in ["2026-03-09T23:59", "2026-03-10T17:45", "2026-03-11T07:50"]
        .into_iter()
        .enumerate()
    {
        request_ok(
            s,
            r,
            &format!("r{}", i),
            "inspectorate.create",
            json!({ "studentId": student_id, "dateTime": when, "observation": "Registro de prueba" }),
        );
    }

    let day = request_ok(
        s,
        r,
        "4",
        "inspectorate.list",
        json!({ "startDate": "2026-03-10", "endDate": "2026-03-10" }),
    );
    assert_eq!(names(&day, "records", "dateTime"), vec!["2026-03-10T17:45:00"]);
    assert_eq!(day["records"][0]["student"]["course"]["level"], "MEDIA");

    let all = request_ok(s, r, "5", "inspectorate.list", json!({ "level": "MEDIA" }));
    assert_eq!(
        names(&all, "records", "dateTime"),
        vec!["2026-03-11T07:50:00", "2026-03-10T17:45:00", "2026-03-09T23:59:00"]
    );
    let basica = request_ok(s, r, "6", "inspectorate.list", json!({ "level": "BASICA" }));
    assert_eq!(basica["records"], json!([]));

    let short = request(
        s,
        r,
        "7",
        "inspectorate.create",
        json!({ "studentId": student_id, "dateTime": "2026-03-10T09:00", "observation": "ok" }),
    );
    assert_eq!(short["error"]["code"], "validation_failed");
    assert_eq!(short["error"]["details"]["fields"][0]["field"], "observation");

    let ghost = request(
        s,
        r,
        "8",
        "inspectorate.create",
        json!({ "studentId": "ghost", "dateTime": "2026-03-10T09:00", "observation": "Registro huérfano" }),
    );
    assert_eq!(ghost["error"]["code"], "not_found");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn holidays_and_profiles_upsert_in_place() {
    let workspace = temp_dir("attendance-holidays-profiles");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let (s, r) = (&mut stdin, &mut reader);
    request_ok(s, r, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));

    request_ok(
        s,
        r,
        "2",
        "holidays.upsert",
        json!({ "date": "2026-09-18", "name": "Independencia", "irrenunciable": true }),
    );
    request_ok(s, r, "3", "holidays.upsert", json!({ "date": "2026-05-01", "name": "Trabajo" }));
    let renamed = request_ok(
        s,
        r,
        "4",
        "holidays.upsert",
        json!({ "date": "2026-05-01", "name": "Día del Trabajo", "irrenunciable": true }),
    );
    assert_eq!(renamed["holiday"]["id"], "2026-05-01");

    let all = request_ok(s, r, "5", "holidays.list", json!({}));
    assert_eq!(names(&all, "holidays", "name"), vec!["Día del Trabajo", "Independencia"]);
    let may = request_ok(s, r, "6", "holidays.list", json!({ "month": 5, "year": 2026 }));
    assert_eq!(may["holidays"].as_array().map(|h| h.len()), Some(1));
    assert_eq!(may["holidays"][0]["irrenunciable"], true);
    let other_year = request_ok(s, r, "7", "holidays.list", json!({ "month": 5, "year": 2025 }));
    assert_eq!(other_year["holidays"], json!([]));

    let first = request_ok(
        s,
        r,
        "8",
        "profiles.upsert",
        json!({ "userId": "user-7", "role": "inspector" }),
    );
    let promoted = request_ok(
        s,
        r,
        "9",
        "profiles.upsert",
        json!({ "userId": "user-7", "role": "Director" }),
    );
    assert_eq!(promoted["profile"]["role"], "director");
    assert_eq!(promoted["profile"]["createdAt"], first["profile"]["createdAt"]);
    let bad_role = request(s, r, "10", "profiles.upsert", json!({ "userId": "user-8", "role": "alumno" }));
    assert_eq!(bad_role["error"]["code"], "bad_params");

    let profiles = request_ok(s, r, "11", "profiles.list", json!({}));
    assert_eq!(profiles["profiles"].as_array().map(|p| p.len()), Some(1));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
