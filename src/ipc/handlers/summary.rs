use crate::agg::{self, FilterCriteria};
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{class_view_state, db_conn, parse_criteria, required_str, today_param};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn summarize(
    state: &AppState,
    req: &Request,
    class_id: &str,
    criteria: &FilterCriteria,
) -> Result<(agg::Summary, bool), serde_json::Value> {
    let stale = class_view_state(state, req, class_id)?;
    let conn = db_conn(state, req)?;
    let today = today_param(req)?;

    let records = db::load_class_records(conn, class_id)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    let meta = db::get_class(conn, class_id)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;

    Ok((
        agg::aggregate(&records, criteria, meta.as_ref(), &today),
        stale,
    ))
}

fn summary_response(
    req: &Request,
    summary: &agg::Summary,
    stale: bool,
    extra: serde_json::Value,
) -> serde_json::Value {
    let mut body = match serde_json::to_value(summary) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "serialize_failed", e.to_string(), None),
    };
    body["stale"] = json!(stale);
    if let (Some(obj), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            obj.insert(k.clone(), v.clone());
        }
    }
    ok(&req.id, body)
}

fn handle_overview(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let criteria = match parse_criteria(req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match summarize(state, req, &class_id, &criteria) {
        Ok((summary, stale)) => summary_response(req, &summary, stale, json!({})),
        Err(resp) => resp,
    }
}

fn handle_monthly_report(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let year = match req.params.get("year").and_then(|v| v.as_i64()) {
        Some(y) => y as i32,
        None => return err(&req.id, "bad_params", "missing year", None),
    };
    let month = match req.params.get("month").and_then(|v| v.as_u64()) {
        Some(m) if (1..=12).contains(&m) => m as u32,
        Some(_) => return err(&req.id, "bad_params", "month must be between 1 and 12", None),
        None => return err(&req.id, "bad_params", "missing month", None),
    };

    let criteria = FilterCriteria {
        month: Some(month),
        year: Some(year),
        ..Default::default()
    };
    match summarize(state, req, &class_id, &criteria) {
        Ok((summary, stale)) => {
            let days_with_classes: usize = summary
                .by_student
                .values()
                .next()
                .map(|s| s.total_days)
                .unwrap_or(0);
            summary_response(
                req,
                &summary,
                stale,
                json!({
                    "month": format!("{:04}-{:02}", year, month),
                    "daysWithClasses": days_with_classes
                }),
            )
        }
        Err(resp) => resp,
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.overview" => Some(handle_overview(state, req)),
        "attendance.monthlyReport" => Some(handle_monthly_report(state, req)),
        _ => None,
    }
}
