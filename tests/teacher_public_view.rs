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

#[test]
fn public_absences_cover_the_month_and_hide_private_fields() {
    let workspace = temp_dir("attendance-teacher-view");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let (s, r) = (&mut stdin, &mut reader);

    request_ok(s, r, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));
    let course = request_ok(s, r, "2", "courses.create", json!({ "name": "4° Medio A", "level": "MEDIA" }));
    let course_id = course["course"]["id"].as_str().expect("course id").to_string();
    let other = request_ok(s, r, "3", "courses.create", json!({ "name": "5° Básico C", "level": "BASICA" }));
    let other_id = other["course"]["id"].as_str().expect("course id").to_string();

    let camila = request_ok(
        s,
        r,
        "4",
        "students.create",
        json!({ "fullName": "Camila Torres", "courseId": course_id, "rut": "19.876.543-2" }),
    );
    let camila_id = camila["student"]["id"].as_str().expect("student id").to_string();
    let bruno = request_ok(
        s,
        r,
        "5",
        "students.create",
        json!({ "fullName": "Bruno Vera", "courseId": other_id }),
    );
    let bruno_id = bruno["student"]["id"].as_str().expect("student id").to_string();

    request_ok(
        s,
        r,
        "6",
        "tests.create",
        json!({ "courseId": course_id, "date": "2026-04-01", "subject": "Biología", "type": "Control" }),
    );
    request_ok(
        s,
        r,
        "7",
        "tests.create",
        json!({ "courseId": course_id, "date": "2026-03-15", "subject": "Física", "type": "Prueba" }),
    );

    // Crosses into April; starts in March.
    let spanning = request_ok(
        s,
        r,
        "8",
        "absences.create",
        json!({
            "studentId": camila_id,
            "startDate": "2026-03-30",
            "endDate": "2026-04-02",
            "observation": "Reposo",
            "documentUrl": "https://docs.example/private.pdf"
        }),
    );
    let spanning_id = spanning["absence"]["id"].as_str().expect("absence id").to_string();
    request_ok(
        s,
        r,
        "9",
        "absences.create",
        json!({ "studentId": bruno_id, "startDate": "2026-04-20", "endDate": "2026-04-21" }),
    );
    request_ok(
        s,
        r,
        "10",
        "absences.create",
        json!({ "studentId": bruno_id, "startDate": "2026-05-04", "endDate": "2026-05-05" }),
    );

    let april = request_ok(s, r, "11", "teacher.publicAbsences", json!({ "month": 4, "year": 2026 }));
    let rows = april["absences"].as_array().expect("absences");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["studentName"], "Bruno Vera");
    assert_eq!(rows[1]["studentName"], "Camila Torres");
    assert_eq!(rows[1]["absenceId"], spanning_id.as_str());
    assert_eq!(rows[1]["courseName"], "4° Medio A");
    assert_eq!(rows[1]["courseLevel"], "MEDIA");
    assert_eq!(rows[1]["periodLabel"], "30-03-2026 - 02-04-2026");
    assert_eq!(rows[1]["status"], "JUSTIFICADA");
    assert_eq!(rows[1]["affectedTestsCount"], 1);
    for row in rows {
        assert!(row.get("rut").is_none());
        assert!(row.get("documentUrl").is_none());
        assert!(row.get("student").is_none());
    }

    let march_media = request_ok(
        s,
        r,
        "12",
        "teacher.publicAbsences",
        json!({ "month": 3, "year": 2026, "level": "MEDIA" }),
    );
    assert_eq!(march_media["absences"].as_array().map(|a| a.len()), Some(1));

    let by_course = request_ok(
        s,
        r,
        "13",
        "teacher.publicAbsences",
        json!({ "month": 4, "year": 2026, "courseId": other_id }),
    );
    assert_eq!(by_course["absences"][0]["studentName"], "Bruno Vera");
    assert_eq!(by_course["absences"].as_array().map(|a| a.len()), Some(1));

    let detail = request_ok(
        s,
        r,
        "14",
        "teacher.publicAbsenceDetail",
        json!({ "absenceId": spanning_id }),
    );
    assert_eq!(
        detail["tests"],
        json!([{
            "id": detail["tests"][0]["id"],
            "date": "2026-04-01",
            "subject": "Biología",
            "type": "Control"
        }])
    );

    let missing_period = request(s, r, "15", "teacher.publicAbsences", json!({ "month": 4 }));
    assert_eq!(missing_period["error"]["code"], "bad_params");
    let bad_month = request(s, r, "16", "teacher.publicAbsences", json!({ "month": 13, "year": 2026 }));
    assert_eq!(bad_month["error"]["code"], "bad_params");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
