use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "attendance.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            level TEXT CHECK(level IS NULL OR level IN ('BASICA', 'MEDIA')),
            position INTEGER,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        )",
        [],
    )?;
    // Workspaces created before courses carried an explicit position.
    ensure_courses_position(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_level ON courses(level)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            course_id TEXT,
            full_name TEXT NOT NULL,
            rut TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_course ON students(course_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS absences(
            id TEXT PRIMARY KEY,
            student_id TEXT,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDIENTE'
                CHECK(status IN ('PENDIENTE', 'JUSTIFICADA')),
            observation TEXT,
            document_url TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            FOREIGN KEY(student_id) REFERENCES students(id),
            CHECK(end_date >= start_date)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_absences_student ON absences(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_absences_start ON absences(start_date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS tests(
            id TEXT PRIMARY KEY,
            course_id TEXT,
            date TEXT NOT NULL,
            subject TEXT NOT NULL,
            type TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tests_course_date ON tests(course_id, date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS inspectorate_records(
            id TEXT PRIMARY KEY,
            student_id TEXT,
            date_time TEXT NOT NULL,
            observation TEXT NOT NULL,
            actions_taken TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    ensure_inspectorate_actions_taken(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_inspectorate_student ON inspectorate_records(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_inspectorate_date_time ON inspectorate_records(date_time)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS profiles(
            user_id TEXT PRIMARY KEY,
            role TEXT NOT NULL
                CHECK(role IN ('inspector', 'coordinador', 'director', 'superuser')),
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS holidays(
            date TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            irrenunciable INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    Ok(conn)
}

fn ensure_courses_position(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "courses", "position")? {
        return Ok(());
    }

    conn.execute("ALTER TABLE courses ADD COLUMN position INTEGER", [])?;

    // Backfill by name so existing lists keep a stable order.
    let mut stmt = conn.prepare("SELECT id FROM courses ORDER BY name")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    for (i, id) in ids.iter().enumerate() {
        conn.execute(
            "UPDATE courses SET position = ? WHERE id = ?",
            (i as i64 + 1, id),
        )?;
    }
    Ok(())
}

fn ensure_inspectorate_actions_taken(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "inspectorate_records", "actions_taken")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE inspectorate_records ADD COLUMN actions_taken TEXT",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_workspace(prefix: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        std::env::temp_dir().join(format!("{}-{}", prefix, nanos))
    }

    #[test]
    fn old_courses_table_gets_positions_by_name() {
        let ws = temp_workspace("attendanced-migrate");
        std::fs::create_dir_all(&ws).expect("create dir");
        {
            let old = Connection::open(ws.join(DB_FILE_NAME)).expect("open old");
            old.execute_batch(
                "CREATE TABLE courses(id TEXT PRIMARY KEY, name TEXT NOT NULL UNIQUE, level TEXT);
                 INSERT INTO courses(id, name, level) VALUES('b', '2° Medio', 'MEDIA');
                 INSERT INTO courses(id, name, level) VALUES('a', '1° Básico', 'BASICA');
                 CREATE TABLE inspectorate_records(
                    id TEXT PRIMARY KEY, student_id TEXT, date_time TEXT NOT NULL,
                    observation TEXT NOT NULL);",
            )
            .expect("old schema");
        }

        let conn = open_db(&ws).expect("migrate");
        let positions: Vec<(String, i64)> = conn
            .prepare("SELECT id, position FROM courses ORDER BY position")
            .expect("prepare")
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
            .expect("query")
            .collect::<Result<_, _>>()
            .expect("rows");
        assert_eq!(positions, vec![("a".to_string(), 1), ("b".to_string(), 2)]);
        assert!(table_has_column(&conn, "inspectorate_records", "actions_taken").expect("pragma"));

        // Reopening is a no-op.
        drop(conn);
        open_db(&ws).expect("reopen");

        let _ = std::fs::remove_dir_all(ws);
    }
}
