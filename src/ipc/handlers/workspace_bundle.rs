use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn path_param(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Explicit `workspacePath` wins over the selected workspace.
fn target_workspace(state: &AppState, req: &Request) -> Option<PathBuf> {
    path_param(req, "workspacePath")
        .map(PathBuf::from)
        .or_else(|| state.workspace.clone())
}

fn handle_export_workspace_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(out_path) = path_param(req, "outPath") else {
        return err(&req.id, "bad_params", "missing outPath", None);
    };
    let Some(workspace_path) = target_workspace(state, req) else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let out = PathBuf::from(&out_path);
    match backup::export_workspace_bundle(&workspace_path, &out) {
        Ok(export) => {
            tracing::info!(path = %out_path, sha256 = %export.db_sha256, "workspace bundle exported");
            ok(
                &req.id,
                json!({
                    "path": out_path,
                    "bundleFormat": export.bundle_format,
                    "entryCount": export.entry_count,
                    "dbSha256": export.db_sha256
                }),
            )
        }
        Err(e) => {
            tracing::error!(path = %out_path, "bundle export failed: {e:#}");
            err(
                &req.id,
                "io_failed",
                format!("{e:#}"),
                Some(json!({ "path": out_path, "status": 500 })),
            )
        }
    }
}

fn handle_import_workspace_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(in_path) = path_param(req, "inPath") else {
        return err(&req.id, "bad_params", "missing inPath", None);
    };
    let Some(workspace_path) = target_workspace(state, req) else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return err(
            &req.id,
            "not_found",
            "bundle file not found",
            Some(json!({ "path": in_path, "status": 404 })),
        );
    }

    // The database file is replaced underneath any open handle.
    state.db = None;

    let import = match backup::import_workspace_bundle(&src, &workspace_path) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(path = %in_path, "bundle import failed: {e:#}");
            if let Some(prev) = state.workspace.clone() {
                if let Err(reopen) = state.open_workspace(&prev) {
                    tracing::error!(workspace = %prev.display(), "workspace not reopened: {reopen:#}");
                }
            }
            return err(
                &req.id,
                "io_failed",
                format!("{e:#}"),
                Some(json!({ "path": in_path, "status": 500 })),
            );
        }
    };

    match state.open_workspace(&workspace_path) {
        Ok(()) => ok(
            &req.id,
            json!({
                "workspacePath": workspace_path.to_string_lossy(),
                "bundleFormatDetected": import.bundle_format_detected,
                "checksumVerified": import.checksum_verified
            }),
        ),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportWorkspaceBundle" => Some(handle_export_workspace_bundle(state, req)),
        "backup.importWorkspaceBundle" => Some(handle_import_workspace_bundle(state, req)),
        _ => None,
    }
}
