
use serde_json::json;
use test_support::{request_ok, setup_class, spawn_sidecar, temp_dir};

#[test]
fn timer_tick_coalesces_with_manual_refresh() {
    let workspace = temp_dir("tuitiond-single-flight");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    setup_class(
        &mut stdin,
        &mut reader,
        &workspace,
        json!({ "id": "c1", "name": "Physics" }),
    );

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "refresh.begin",
        json!({ "classId": "c1", "trigger": "manual" }),
    );
    assert_eq!(first.get("started").and_then(|v| v.as_bool()), Some(true));
    let request_id = first.get("requestId").and_then(|v| v.as_u64()).expect("requestId");

    // The 30s auto-refresh timer fires while the manual fetch is in flight.
    let tick = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "refresh.begin",
        json!({ "classId": "c1", "trigger": "timer" }),
    );
    assert_eq!(tick.get("started").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(tick.get("coalesced").and_then(|v| v.as_bool()), Some(true));

    // Another class refreshes independently.
    let other = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "refresh.begin",
        json!({ "classId": "c2", "trigger": "timer" }),
    );
    assert_eq!(other.get("started").and_then(|v| v.as_bool()), Some(true));

    let applied = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "attendance.replaceRecords",
        json!({
            "classId": "c1",
            "requestId": request_id,
            "records": [
                { "student_id": "s1", "attendance_date": "2025-06-02", "status": "present", "source": "manual" }
            ]
        }),
    );
    assert_eq!(applied.get("applied").and_then(|v| v.as_bool()), Some(true));

    // Completion releases the guard.
    let next = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "refresh.begin",
        json!({ "classId": "c1", "trigger": "timer" }),
    );
    assert_eq!(next.get("started").and_then(|v| v.as_bool()), Some(true));
}

#[test]
fn cancelled_refresh_response_is_discarded_as_stale() {
    let workspace = temp_dir("tuitiond-stale-discard");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    setup_class(
        &mut stdin,
        &mut reader,
        &workspace,
        json!({ "id": "c1", "name": "Physics" }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.replaceRecords",
        json!({
            "classId": "c1",
            "records": [
                { "student_id": "s1", "attendance_date": "2025-06-02", "status": "present", "source": "manual" }
            ]
        }),
    );

    let begun = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "refresh.begin",
        json!({ "classId": "c1", "trigger": "manual" }),
    );
    let old_request = begun.get("requestId").and_then(|v| v.as_u64()).expect("requestId");

    // The view unmounts; its fetch is still in the air.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "refresh.cancel",
        json!({ "classId": "c1" }),
    );

    // The late response arrives and must not clobber the cache.
    let late = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "attendance.replaceRecords",
        json!({
            "classId": "c1",
            "requestId": old_request,
            "records": []
        }),
    );
    assert_eq!(late.get("applied").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(late.get("stale").and_then(|v| v.as_bool()), Some(true));

    let list = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.list",
        json!({ "classId": "c1" }),
    );
    assert_eq!(list.get("totalRecords").and_then(|v| v.as_u64()), Some(1));
}

#[test]
fn superseded_refresh_loses_to_the_latest_one() {
    let workspace = temp_dir("tuitiond-last-write-wins");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    setup_class(
        &mut stdin,
        &mut reader,
        &workspace,
        json!({ "id": "c1", "name": "Physics" }),
    );

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "refresh.begin",
        json!({ "classId": "c1" }),
    );
    let first_id = first.get("requestId").and_then(|v| v.as_u64()).expect("requestId");

    // User changes filters mid-load: old fetch abandoned, a new one starts.
    let _ = request_ok(&mut stdin, &mut reader, "2", "refresh.cancel", json!({ "classId": "c1" }));
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "refresh.begin",
        json!({ "classId": "c1" }),
    );
    let second_id = second.get("requestId").and_then(|v| v.as_u64()).expect("requestId");
    assert_ne!(first_id, second_id);

    // Old response arrives after the new one.
    let newer = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "attendance.replaceRecords",
        json!({
            "classId": "c1",
            "requestId": second_id,
            "records": [
                { "student_id": "s2", "attendance_date": "2025-06-03", "status": "late", "source": "manual" }
            ]
        }),
    );
    assert_eq!(newer.get("applied").and_then(|v| v.as_bool()), Some(true));

    let older = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.replaceRecords",
        json!({
            "classId": "c1",
            "requestId": first_id,
            "records": [
                { "student_id": "s1", "attendance_date": "2025-06-02", "status": "present", "source": "manual" }
            ]
        }),
    );
    assert_eq!(older.get("applied").and_then(|v| v.as_bool()), Some(false));

    let list = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.list",
        json!({ "classId": "c1" }),
    );
    let records = list.get("records").and_then(|v| v.as_array()).expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].get("studentId").and_then(|v| v.as_str()),
        Some("s2")
    );
}
