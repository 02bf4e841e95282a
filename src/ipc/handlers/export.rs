use crate::agg;
use crate::db;
use crate::export;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{class_view_state, db_conn, parse_criteria, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_attendance_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let out_path = match required_str(req, "outPath") {
        Ok(v) => PathBuf::from(v),
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
    let filtered: Vec<crate::normalize::AttendanceRecord> = records
        .into_iter()
        .filter(|r| agg::matches(r, &criteria, meta.as_ref()))
        .collect();

    match export::write_records_csv(&out_path, &filtered) {
        Ok(rows) => ok(
            &req.id,
            json!({
                "rows": rows,
                "path": out_path.to_string_lossy(),
                "stale": stale
            }),
        ),
        Err(e) => err(&req.id, "export_failed", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "export.attendanceCsv" => Some(handle_attendance_csv(state, req)),
        _ => None,
    }
}
