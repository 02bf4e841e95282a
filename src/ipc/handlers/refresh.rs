use crate::ipc::error::ok;
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use crate::refresh::BeginOutcome;
use serde_json::json;

fn handle_refresh_begin(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    // Manual refresh and the auto-refresh timer both land here; the trigger
    // is informational and does not change the single-flight decision.
    let trigger = req
        .params
        .get("trigger")
        .and_then(|v| v.as_str())
        .unwrap_or("manual");

    match state.refresh.begin(&class_id) {
        BeginOutcome::Started { request_id } => ok(
            &req.id,
            json!({ "started": true, "requestId": request_id, "trigger": trigger }),
        ),
        BeginOutcome::Coalesced => ok(
            &req.id,
            json!({ "started": false, "coalesced": true, "trigger": trigger }),
        ),
    }
}

fn handle_refresh_cancel(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    state.refresh.cancel(&class_id);
    ok(&req.id, json!({ "cancelled": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "refresh.begin" => Some(handle_refresh_begin(state, req)),
        "refresh.cancel" => Some(handle_refresh_cancel(state, req)),
        _ => None,
    }
}
