use crate::errors::AppError;
use crate::ipc::error::ok;
use crate::ipc::helpers::{optional_month_year, require_conn, required_date, required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::overlap;
use rusqlite::Connection;
use serde_json::json;

fn holidays_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, AppError> {
    let period = optional_month_year(params)?;

    let mut stmt = conn.prepare("SELECT date, name, irrenunciable FROM holidays ORDER BY date")?;
    let raw = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, Option<String>>(1)?,
                r.get::<_, Option<bool>>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let holidays: Vec<_> = raw
        .iter()
        .filter_map(|(date, name, irrenunciable)| {
            let holiday = overlap::normalize_holiday(date, name.as_deref(), *irrenunciable);
            if holiday.is_none() {
                tracing::warn!(date = %date, "skipping holiday with unreadable date");
            }
            holiday
        })
        .collect();
    let (month, year) = match period {
        Some((m, y)) => (Some(m), Some(y)),
        None => (None, None),
    };
    let holidays = overlap::filter_holidays_by_period(holidays, month, year);
    Ok(json!({ "holidays": holidays }))
}

fn holidays_upsert(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, AppError> {
    let date = required_date(params, "date")?;
    let name = required_str(params, "name")?;
    let irrenunciable = match params.get("irrenunciable") {
        None | Some(serde_json::Value::Null) => false,
        Some(v) => v
            .as_bool()
            .ok_or_else(|| AppError::bad_params("irrenunciable must be a boolean"))?,
    };

    conn.execute(
        "INSERT INTO holidays(date, name, irrenunciable) VALUES(?, ?, ?)
         ON CONFLICT(date) DO UPDATE SET
           name = excluded.name,
           irrenunciable = excluded.irrenunciable",
        (date, &name, irrenunciable),
    )?;
    let holiday = overlap::normalize_holiday(&date.to_string(), Some(name.as_str()), Some(irrenunciable));
    Ok(json!({ "holiday": holiday }))
}

fn handle_holidays_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "holidays": [] }));
    };
    respond(req, holidays_list(conn, &req.params))
}

fn handle_holidays_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = require_conn(state).and_then(|conn| holidays_upsert(conn, &req.params));
    respond(req, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "holidays.list" => Some(handle_holidays_list(state, req)),
        "holidays.upsert" => Some(handle_holidays_upsert(state, req)),
        _ => None,
    }
}
