use crate::agg::{self, FilterCriteria};
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use chrono::Utc;
use rusqlite::Connection;

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn parse_criteria(req: &Request) -> Result<FilterCriteria, serde_json::Value> {
    agg::parse_filter_criteria(req.params.get("filters"))
        .map_err(|e| err(&req.id, &e.code, e.message, e.details))
}

/// Canonical "today" for the request: an explicit `today` param (used by the
/// UI when it already resolved the day, and by tests for determinism), else
/// the current UTC calendar date.
pub fn today_param(req: &Request) -> Result<String, serde_json::Value> {
    match req.params.get("today").and_then(|v| v.as_str()) {
        Some(s) => {
            if chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_err() {
                return Err(err(&req.id, "bad_params", "today must be YYYY-MM-DD", None));
            }
            Ok(s.to_string())
        }
        None => Ok(Utc::now().date_naive().format("%Y-%m-%d").to_string()),
    }
}

pub fn optional_request_id(req: &Request) -> Option<u64> {
    req.params.get("requestId").and_then(|v| v.as_u64())
}

/// Gate for read views. A class with nothing cached is an error, not an
/// empty result: `no_data` when it was never loaded, `load_failed` when the
/// last refresh failed. When stale cached data exists after a failed refresh
/// the view is served with `stale = true` so the UI can say so, instead of
/// presenting "0 absent" as verified truth.
pub fn class_view_state(
    state: &AppState,
    req: &Request,
    class_id: &str,
) -> Result<bool, serde_json::Value> {
    let conn = db_conn(state, req)?;
    let count = match crate::db::class_record_count(conn, class_id) {
        Ok(n) => n,
        Err(e) => return Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    };
    if count == 0 && !state.refresh.is_loaded(class_id) {
        if state.refresh.is_load_failed(class_id) {
            return Err(err(
                &req.id,
                "load_failed",
                "attendance fetch failed and nothing is cached for this class",
                None,
            ));
        }
        return Err(err(
            &req.id,
            "no_data",
            "attendance has not been loaded for this class yet",
            None,
        ));
    }
    Ok(state.refresh.is_load_failed(class_id))
}
