use crate::errors::AppError;
use crate::ipc::error::ok;
use crate::ipc::helpers::{require_conn, required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::records::{Profile, UserRole};
use rusqlite::{Connection, Row};
use serde_json::json;

fn profile_from_row(r: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        user_id: r.get(0)?,
        role: r.get(1)?,
        created_at: r.get(2)?,
    })
}

fn profiles_list(conn: &Connection) -> Result<serde_json::Value, AppError> {
    let mut stmt = conn.prepare(
        "SELECT user_id, role, created_at
         FROM profiles
         ORDER BY created_at, user_id",
    )?;
    let profiles = stmt
        .query_map([], profile_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "profiles": profiles }))
}

fn profiles_upsert(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, AppError> {
    let user_id = required_str(params, "userId")?;
    let raw_role = required_str(params, "role")?;
    let role = UserRole::parse(&raw_role).ok_or_else(|| {
        AppError::bad_params("role must be one of inspector, coordinador, director, superuser")
    })?;

    // created_at is kept from the first insert.
    conn.execute(
        "INSERT INTO profiles(user_id, role) VALUES(?, ?)
         ON CONFLICT(user_id) DO UPDATE SET role = excluded.role",
        (&user_id, role),
    )?;
    let profile = conn.query_row(
        "SELECT user_id, role, created_at FROM profiles WHERE user_id = ?",
        [&user_id],
        profile_from_row,
    )?;
    tracing::info!(user_id = %profile.user_id, role = profile.role.as_str(), "profile saved");
    Ok(json!({ "profile": profile }))
}

fn handle_profiles_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "profiles": [] }));
    };
    respond(req, profiles_list(conn))
}

fn handle_profiles_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = require_conn(state).and_then(|conn| profiles_upsert(conn, &req.params));
    respond(req, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "profiles.list" => Some(handle_profiles_list(state, req)),
        "profiles.upsert" => Some(handle_profiles_upsert(state, req)),
        _ => None,
    }
}
