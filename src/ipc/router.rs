use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

type TryHandle = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const FAMILIES: &[TryHandle] = &[
    handlers::core::try_handle,
    handlers::courses::try_handle,
    handlers::students::try_handle,
    handlers::scheduled_tests::try_handle,
    handlers::absences::try_handle,
    handlers::inspectorate::try_handle,
    handlers::holidays::try_handle,
    handlers::teacher::try_handle,
    handlers::profiles::try_handle,
    handlers::admin::try_handle,
    handlers::workspace_bundle::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    for try_handle in FAMILIES {
        if let Some(resp) = try_handle(state, &req) {
            return resp;
        }
    }
    tracing::debug!(method = %req.method, "unknown method");
    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
