use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use crate::normalize::{AttendanceRecord, Source, Status};
use chrono::DateTime;
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

const DEFAULT_DEBOUNCE_MS: i64 = 4000;

fn handle_scan_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let code = match required_str(req, "code") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if state.db.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    let student_name = req
        .params
        .get("studentName")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let window_ms = req
        .params
        .get("windowMs")
        .and_then(|v| v.as_i64())
        .unwrap_or(DEFAULT_DEBOUNCE_MS);
    let scanned_at = req
        .params
        .get("scannedAt")
        .and_then(|v| v.as_i64())
        .unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as i64
        });

    // Keyboard-wedge scanners fire the same code several times per pass.
    let key = (class_id.clone(), code.clone());
    if let Some(last) = state.scan_log.get(&key) {
        if scanned_at - last < window_ms {
            return ok(&req.id, json!({ "accepted": false, "duplicate": true }));
        }
    }

    let Some(scan_time) = DateTime::from_timestamp_millis(scanned_at) else {
        return err(&req.id, "bad_params", "scannedAt out of range", None);
    };
    let record = AttendanceRecord {
        id: Uuid::new_v4().to_string(),
        class_id: class_id.clone(),
        student_id,
        student_name,
        date: Some(scan_time.date_naive().format("%Y-%m-%d").to_string()),
        join_time: Some(scan_time.to_rfc3339()),
        leave_time: None,
        duration_minutes: None,
        status: Status::Present,
        source: Source::Barcode,
        source_raw: "barcode".to_string(),
    };

    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = db::insert_record(conn, &record) {
        return err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "table": "attendance_records" })),
        );
    }
    state.scan_log.insert(key, scanned_at);

    let record_json = match serde_json::to_value(&record) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "serialize_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "accepted": true, "record": record_json }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scan.submit" => Some(handle_scan_submit(state, req)),
        _ => None,
    }
}
