use crate::agg;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    class_view_state, db_conn, optional_request_id, parse_criteria, required_str,
};
use crate::ipc::types::{AppState, Request};
use crate::normalize;
use serde_json::json;

fn handle_replace_records(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if state.db.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    let Some(raw_records) = req.params.get("records").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing records", None);
    };
    let request_id = optional_request_id(req);

    // Last write wins: a response from a superseded or cancelled refresh is
    // discarded before it touches the cache.
    if !state.refresh.is_current(&class_id, request_id) {
        return ok(&req.id, json!({ "applied": false, "stale": true }));
    }

    let records: Vec<normalize::AttendanceRecord> = raw_records
        .iter()
        .map(|raw| normalize::normalize_record(&class_id, raw))
        .collect();

    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    // The class is marked loaded only after the transaction commits. If the
    // write fails the fetch effectively failed; reads must keep reporting
    // that instead of an empty cache.
    match db::replace_class_records(conn, &class_id, &records) {
        Ok(count) => {
            state.refresh.complete_ok(&class_id, request_id);
            ok(&req.id, json!({ "applied": true, "recordCount": count }))
        }
        Err(e) => {
            state.refresh.complete_failed(&class_id, request_id);
            err(
                &req.id,
                "db_update_failed",
                e.to_string(),
                Some(json!({ "table": "attendance_records" })),
            )
        }
    }
}

fn handle_mark_load_failed(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let request_id = optional_request_id(req);
    let recorded = state.refresh.complete_failed(&class_id, request_id);
    ok(&req.id, json!({ "recorded": recorded, "stale": !recorded }))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let criteria = match parse_criteria(req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let stale = match class_view_state(state, req, &class_id) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let records = match db::load_class_records(conn, &class_id) {
        Ok(r) => r,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let meta = match db::get_class(conn, &class_id) {
        Ok(m) => m,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let filtered: Vec<&normalize::AttendanceRecord> = records
        .iter()
        .filter(|r| agg::matches(r, &criteria, meta.as_ref()))
        .collect();
    let records_json = match serde_json::to_value(&filtered) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "serialize_failed", e.to_string(), None),
    };

    ok(
        &req.id,
        json!({
            "records": records_json,
            "totalRecords": filtered.len(),
            "stale": stale
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.replaceRecords" => Some(handle_replace_records(state, req)),
        "attendance.markLoadFailed" => Some(handle_mark_load_failed(state, req)),
        "attendance.list" => Some(handle_list(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refresh::BeginOutcome;
    use rusqlite::Connection;
    use std::path::PathBuf;

    fn request(method: &str, params: serde_json::Value) -> Request {
        Request {
            id: "t1".to_string(),
            method: method.to_string(),
            params,
        }
    }

    #[test]
    fn failed_write_does_not_mark_the_class_loaded() {
        let mut state = AppState::new();
        state.workspace = Some(PathBuf::from("unused"));
        // No schema, so the replace fails at the DELETE.
        state.db = Some(Connection::open_in_memory().expect("open in-memory db"));

        let BeginOutcome::Started { request_id } = state.refresh.begin("c1") else {
            panic!("begin should start");
        };

        let req = request(
            "attendance.replaceRecords",
            json!({
                "classId": "c1",
                "requestId": request_id,
                "records": [
                    { "student_id": "s1", "attendance_date": "2025-06-02", "status": "present" }
                ]
            }),
        );
        let resp = handle_replace_records(&mut state, &req);
        assert_eq!(resp.get("ok"), Some(&json!(false)));
        assert_eq!(
            resp.get("error").and_then(|e| e.get("code")),
            Some(&json!("db_update_failed"))
        );

        // The class must read as a failed load, never as loaded-and-empty.
        assert!(!state.refresh.is_loaded("c1"));
        assert!(state.refresh.is_load_failed("c1"));
        assert!(!state.refresh.is_in_flight("c1"));
    }

    #[test]
    fn stale_response_is_rejected_before_any_state_change() {
        let mut state = AppState::new();
        state.workspace = Some(PathBuf::from("unused"));
        state.db = Some(Connection::open_in_memory().expect("open in-memory db"));

        let BeginOutcome::Started { request_id } = state.refresh.begin("c1") else {
            panic!("begin should start");
        };
        state.refresh.cancel("c1");

        let req = request(
            "attendance.replaceRecords",
            json!({
                "classId": "c1",
                "requestId": request_id,
                "records": []
            }),
        );
        let resp = handle_replace_records(&mut state, &req);
        let result = resp.get("result").expect("result");
        assert_eq!(result.get("applied"), Some(&json!(false)));
        assert_eq!(result.get("stale"), Some(&json!(true)));
        assert!(!state.refresh.is_loaded("c1"));
        assert!(!state.refresh.is_load_failed("c1"));
    }
}
