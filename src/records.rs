use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EducationLevel {
    Basica,
    Media,
}

impl EducationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            EducationLevel::Basica => "BASICA",
            EducationLevel::Media => "MEDIA",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "BASICA" => Some(EducationLevel::Basica),
            "MEDIA" => Some(EducationLevel::Media),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AbsenceStatus {
    Pendiente,
    Justificada,
}

impl AbsenceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AbsenceStatus::Pendiente => "PENDIENTE",
            AbsenceStatus::Justificada => "JUSTIFICADA",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDIENTE" => Some(AbsenceStatus::Pendiente),
            "JUSTIFICADA" => Some(AbsenceStatus::Justificada),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Inspector,
    Coordinador,
    Director,
    Superuser,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Inspector => "inspector",
            UserRole::Coordinador => "coordinador",
            UserRole::Director => "director",
            UserRole::Superuser => "superuser",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "inspector" => Some(UserRole::Inspector),
            "coordinador" => Some(UserRole::Coordinador),
            "director" => Some(UserRole::Director),
            "superuser" => Some(UserRole::Superuser),
            _ => None,
        }
    }
}

// Enum columns are stored as their wire literal so CHECK constraints and
// ad-hoc SQL stay readable.
macro_rules! sql_text_enum {
    ($ty:ty, $what:literal) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let raw = value.as_str()?;
                <$ty>::parse(raw)
                    .ok_or_else(|| FromSqlError::Other(format!("unknown {}: {}", $what, raw).into()))
            }
        }
    };
}

sql_text_enum!(EducationLevel, "education level");
sql_text_enum!(AbsenceStatus, "absence status");
sql_text_enum!(UserRole, "user role");

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub name: String,
    pub level: Option<EducationLevel>,
    pub position: Option<i64>,
}

/// The slice of a course that travels nested inside student-shaped rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRef {
    pub id: String,
    pub name: String,
    pub level: Option<EducationLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub full_name: String,
    pub course_id: Option<String>,
    pub rut: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentWithCourse {
    #[serde(flatten)]
    pub student: Student,
    pub course: CourseRef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Absence {
    pub id: String,
    pub student_id: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: AbsenceStatus,
    pub observation: Option<String>,
    pub document_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Test {
    pub id: String,
    pub course_id: Option<String>,
    pub date: NaiveDate,
    pub subject: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestWithCourse {
    #[serde(flatten)]
    pub test: Test,
    pub course: Option<CourseRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectorateRecord {
    pub id: String,
    pub student_id: Option<String>,
    pub date_time: NaiveDateTime,
    pub observation: String,
    pub actions_taken: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectorateWithStudent {
    #[serde(flatten)]
    pub record: InspectorateRecord,
    pub student: StudentWithCourse,
}

/// One absence row as it comes out of the absence/student/course join,
/// before it is reshaped for the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct AbsenceJoinedRow {
    pub absence: Absence,
    pub student: Student,
    pub course: CourseRef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsenceWithDetails {
    #[serde(flatten)]
    pub absence: Absence,
    pub student: StudentWithCourse,
    pub affected_tests: Vec<Test>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Holiday {
    pub id: String,
    pub date: NaiveDate,
    pub name: String,
    pub irrenunciable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    pub role: UserRole,
    pub created_at: String,
}

/// Public teacher-view row. Carries no rut and no document url.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherPublicAbsence {
    pub absence_id: String,
    pub student_name: String,
    pub course_id: String,
    pub course_name: String,
    pub course_level: Option<EducationLevel>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub period_label: String,
    pub status: AbsenceStatus,
    pub observation: Option<String>,
    pub affected_tests_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherPublicTest {
    pub id: String,
    pub date: NaiveDate,
    pub subject: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl From<&Test> for TeacherPublicTest {
    fn from(t: &Test) -> Self {
        TeacherPublicTest {
            id: t.id.clone(),
            date: t.date,
            subject: t.subject.clone(),
            kind: t.kind.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsenceStats {
    pub total: usize,
    pub justified: usize,
    pub pending: usize,
    pub with_tests: usize,
    pub without_doc: usize,
}
