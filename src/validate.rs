use crate::dates;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: &str) -> Self {
        FieldError {
            field,
            message: message.to_string(),
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn non_blank(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Default)]
pub struct TestDraft<'a> {
    pub course_id: Option<&'a str>,
    pub date: Option<&'a str>,
    pub subject: Option<&'a str>,
    pub kind: Option<&'a str>,
    pub description: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTest {
    pub course_id: String,
    pub date: NaiveDate,
    pub subject: String,
    pub kind: String,
    pub description: Option<String>,
}

pub fn check_test(draft: &TestDraft<'_>) -> Result<NewTest, Vec<FieldError>> {
    let mut errors = Vec::new();

    let subject = non_blank(draft.subject).unwrap_or("");
    if char_len(subject) < 3 {
        errors.push(FieldError::new(
            "subject",
            "La asignatura debe tener al menos 3 caracteres",
        ));
    } else if char_len(subject) > 100 {
        errors.push(FieldError::new(
            "subject",
            "La asignatura no puede exceder 100 caracteres",
        ));
    }
    let kind = non_blank(draft.kind);
    if kind.is_none() {
        errors.push(FieldError::new("type", "Debe seleccionar un tipo de evaluación"));
    }
    let course_id = non_blank(draft.course_id);
    if course_id.is_none() {
        errors.push(FieldError::new("courseId", "Debe seleccionar un curso"));
    }
    let date = draft.date.and_then(dates::parse_date_only);
    if date.is_none() {
        errors.push(FieldError::new("date", "Fecha inválida"));
    }
    let description = non_blank(draft.description);
    if description.map(char_len).unwrap_or(0) > 1000 {
        errors.push(FieldError::new(
            "description",
            "La descripción no puede exceder 1000 caracteres",
        ));
    }

    match (course_id, date, kind) {
        (Some(course_id), Some(date), Some(kind)) if errors.is_empty() => Ok(NewTest {
            course_id: course_id.to_string(),
            date,
            subject: subject.to_string(),
            kind: kind.to_string(),
            description: description.map(str::to_string),
        }),
        _ => Err(errors),
    }
}

#[derive(Debug, Default)]
pub struct AbsenceDraft<'a> {
    pub student_id: Option<&'a str>,
    pub start_date: Option<&'a str>,
    pub end_date: Option<&'a str>,
    pub observation: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAbsence {
    pub student_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub observation: Option<String>,
}

pub fn check_absence_range(start: NaiveDate, end: NaiveDate) -> Result<(), FieldError> {
    if end < start {
        return Err(FieldError::new(
            "endDate",
            "La fecha de fin no puede ser anterior a la fecha de inicio",
        ));
    }
    Ok(())
}

pub fn check_observation(observation: Option<&str>) -> Result<(), FieldError> {
    if non_blank(observation).map(char_len).unwrap_or(0) > 500 {
        return Err(FieldError::new(
            "observation",
            "La observación no puede exceder 500 caracteres",
        ));
    }
    Ok(())
}

/// Reads `startDate` or `endDate` of an absence.
pub fn check_absence_date(field: &'static str, raw: Option<&str>) -> Result<NaiveDate, FieldError> {
    let message = match field {
        "startDate" => "Fecha de inicio inválida",
        _ => "Fecha de fin inválida",
    };
    raw.and_then(dates::parse_date_only)
        .ok_or_else(|| FieldError::new(field, message))
}

pub fn check_absence(draft: &AbsenceDraft<'_>) -> Result<NewAbsence, Vec<FieldError>> {
    let mut errors = Vec::new();

    let student_id = non_blank(draft.student_id);
    if student_id.is_none() {
        errors.push(FieldError::new("studentId", "Debe seleccionar un estudiante"));
    }
    let start = match check_absence_date("startDate", draft.start_date) {
        Ok(d) => Some(d),
        Err(fe) => {
            errors.push(fe);
            None
        }
    };
    let end = match check_absence_date("endDate", draft.end_date) {
        Ok(d) => Some(d),
        Err(fe) => {
            errors.push(fe);
            None
        }
    };
    if let (Some(s), Some(e)) = (start, end) {
        if let Err(fe) = check_absence_range(s, e) {
            errors.push(fe);
        }
    }
    if let Err(fe) = check_observation(draft.observation) {
        errors.push(fe);
    }

    match (student_id, start, end) {
        (Some(student_id), Some(start_date), Some(end_date)) if errors.is_empty() => {
            Ok(NewAbsence {
                student_id: student_id.to_string(),
                start_date,
                end_date,
                observation: non_blank(draft.observation).map(str::to_string),
            })
        }
        _ => Err(errors),
    }
}

#[derive(Debug, Default)]
pub struct InspectorateDraft<'a> {
    pub student_id: Option<&'a str>,
    pub date_time: Option<&'a str>,
    pub observation: Option<&'a str>,
    pub actions_taken: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewInspectorateRecord {
    pub student_id: String,
    pub date_time: NaiveDateTime,
    pub observation: String,
    pub actions_taken: Option<String>,
}

pub fn check_inspectorate_record(
    draft: &InspectorateDraft<'_>,
) -> Result<NewInspectorateRecord, Vec<FieldError>> {
    let mut errors = Vec::new();

    let student_id = non_blank(draft.student_id);
    if student_id.is_none() {
        errors.push(FieldError::new("studentId", "Debe seleccionar un estudiante"));
    }
    let date_time = draft.date_time.and_then(dates::parse_date_time);
    if date_time.is_none() {
        errors.push(FieldError::new("dateTime", "Fecha y hora inválida"));
    }
    let observation = non_blank(draft.observation).unwrap_or("");
    if char_len(observation) < 5 {
        errors.push(FieldError::new(
            "observation",
            "La observación debe tener al menos 5 caracteres",
        ));
    } else if char_len(observation) > 500 {
        errors.push(FieldError::new(
            "observation",
            "La observación no puede exceder 500 caracteres",
        ));
    }
    let actions_taken = non_blank(draft.actions_taken);
    if let Some(a) = actions_taken {
        if char_len(a) < 5 {
            errors.push(FieldError::new(
                "actionsTaken",
                "Las acciones deben tener al menos 5 caracteres",
            ));
        } else if char_len(a) > 1000 {
            errors.push(FieldError::new(
                "actionsTaken",
                "Las acciones no pueden exceder 1000 caracteres",
            ));
        }
    }

    match (student_id, date_time) {
        (Some(student_id), Some(date_time)) if errors.is_empty() => Ok(NewInspectorateRecord {
            student_id: student_id.to_string(),
            date_time,
            observation: observation.to_string(),
            actions_taken: actions_taken.map(str::to_string),
        }),
        _ => Err(errors),
    }
}
