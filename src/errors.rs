use crate::validate::FieldError;
use rusqlite::ffi;
use serde_json::json;

fn first_message(fields: &[FieldError]) -> &str {
    fields
        .first()
        .map(|f| f.message.as_str())
        .unwrap_or("Datos inválidos.")
}

/// Errors surfaced on the wire. Messages are user-facing (Spanish) where the
/// UI shows them verbatim.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Registro duplicado detectado.")]
    Duplicate { detail: String },
    #[error("Error de referencia: el registro relacionado no existe.")]
    ForeignKey { detail: String },
    #[error("No se encontró el registro solicitado.")]
    NotFound,
    #[error("Error en la base de datos: {0}")]
    Database(String),
    #[error("{0}")]
    BadParams(String),
    #[error("{}", first_message(.0))]
    Validation(Vec<FieldError>),
    #[error("select a workspace first")]
    NoWorkspace,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Duplicate { .. } => "duplicate_record",
            AppError::ForeignKey { .. } => "foreign_key_violation",
            AppError::NotFound => "not_found",
            AppError::Database(_) => "db_error",
            AppError::BadParams(_) => "bad_params",
            AppError::Validation(_) => "validation_failed",
            AppError::NoWorkspace => "no_workspace",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            AppError::Duplicate { .. }
            | AppError::ForeignKey { .. }
            | AppError::BadParams(_)
            | AppError::Validation(_) => 400,
            AppError::NotFound => 404,
            AppError::NoWorkspace => 409,
            AppError::Database(_) => 500,
        }
    }

    pub fn details(&self) -> serde_json::Value {
        let mut d = json!({ "status": self.status() });
        match self {
            AppError::Duplicate { detail } | AppError::ForeignKey { detail } => {
                d["detail"] = json!(detail);
            }
            AppError::Validation(fields) => {
                d["fields"] = json!(fields);
            }
            _ => {}
        }
        d
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        AppError::BadParams(message.into())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::QueryReturnedNoRows => AppError::NotFound,
            rusqlite::Error::SqliteFailure(f, _) => match f.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    AppError::Duplicate {
                        detail: e.to_string(),
                    }
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => AppError::ForeignKey {
                    detail: e.to_string(),
                },
                _ => AppError::Database(e.to_string()),
            },
            _ => AppError::Database(e.to_string()),
        }
    }
}

impl From<Vec<FieldError>> for AppError {
    fn from(fields: Vec<FieldError>) -> Self {
        AppError::Validation(fields)
    }
}

impl From<FieldError> for AppError {
    fn from(field: FieldError) -> Self {
        AppError::Validation(vec![field])
    }
}
