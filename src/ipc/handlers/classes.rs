use crate::agg::ClassMeta;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::db_conn;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_classes_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let Some(raw) = req.params.get("class") else {
        return err(&req.id, "bad_params", "missing class", None);
    };
    let meta: ClassMeta = match serde_json::from_value(raw.clone()) {
        Ok(m) => m,
        Err(e) => {
            return err(
                &req.id,
                "bad_params",
                format!("invalid class: {}", e),
                None,
            )
        }
    };
    if meta.id.trim().is_empty() {
        return err(&req.id, "bad_params", "class.id must not be empty", None);
    }
    if meta.name.trim().is_empty() {
        return err(&req.id, "bad_params", "class.name must not be empty", None);
    }

    match db::upsert_class(conn, &meta) {
        Ok(()) => ok(&req.id, json!({ "classId": meta.id })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match db::list_classes(conn) {
        Ok(rows) => {
            let classes: Vec<serde_json::Value> = rows
                .into_iter()
                .map(|(meta, record_count)| {
                    json!({
                        "id": meta.id,
                        "name": meta.name,
                        "subject": meta.subject,
                        "teacher": meta.teacher,
                        "stream": meta.stream,
                        "deliveryMethod": meta.delivery_method,
                        "courseType": meta.course_type,
                        "recordCount": record_count,
                        "loaded": state.refresh.is_loaded(&meta.id),
                        "loadFailed": state.refresh.is_load_failed(&meta.id),
                        "refreshInFlight": state.refresh.is_in_flight(&meta.id)
                    })
                })
                .collect();
            ok(&req.id, json!({ "classes": classes }))
        }
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.upsert" => Some(handle_classes_upsert(state, req)),
        "classes.list" => Some(handle_classes_list(state, req)),
        _ => None,
    }
}
