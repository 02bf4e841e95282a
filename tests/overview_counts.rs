
use serde_json::json;
use test_support::{request_ok, setup_class, spawn_sidecar, temp_dir};

#[test]
fn today_cards_dedup_students_while_barcode_counts_raw_scans() {
    let workspace = temp_dir("tuitiond-overview");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    setup_class(
        &mut stdin,
        &mut reader,
        &workspace,
        json!({ "id": "c1", "name": "Combined Maths" }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.replaceRecords",
        json!({
            "classId": "c1",
            "records": [
                // s1 joined one session late but attended another fully.
                { "student_id": "s1", "attendance_date": "2025-06-02", "status": "present", "source": "zoom_webhook" },
                { "student_id": "s1", "attendance_date": "2025-06-02", "status": "late", "source": "manual" },
                // s2 scanned in twice (two classes, same hall scanner).
                { "student_id": "s2", "attendance_date": "2025-06-02", "status": "present", "source": "barcode" },
                { "student_id": "s2", "attendance_date": "2025-06-02", "status": "present", "source": "image" },
                // s3 watched the recording; s4 absent; s5 attended yesterday only.
                { "student_id": "s3", "attendance_date": "2025-06-02", "status": "present", "source": "recorded_video" },
                { "student_id": "s4", "attendance_date": "2025-06-02", "status": "absent", "source": "manual" },
                { "student_id": "s5", "attendance_date": "2025-06-01", "status": "present", "source": "zoom_manual" }
            ]
        }),
    );

    let overview = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.overview",
        json!({ "classId": "c1", "today": "2025-06-02" }),
    );

    assert_eq!(overview.get("totalRecords").and_then(|v| v.as_u64()), Some(7));
    // Unique-student cards for today only.
    assert_eq!(overview.get("presentToday").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(overview.get("lateToday").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(overview.get("absentToday").and_then(|v| v.as_u64()), Some(1));

    let by_source = overview.get("bySource").expect("bySource");
    // zoom_webhook + zoom_manual are one bucket, unique by student.
    assert_eq!(by_source.get("zoom").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(by_source.get("recordedVideo").and_then(|v| v.as_u64()), Some(1));
    // Barcode stays a raw per-record count: image + barcode scans both land here.
    assert_eq!(by_source.get("barcode").and_then(|v| v.as_u64()), Some(2));
}

#[test]
fn today_cards_ignore_the_temporal_filter() {
    let workspace = temp_dir("tuitiond-overview-today");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    setup_class(
        &mut stdin,
        &mut reader,
        &workspace,
        json!({ "id": "c1", "name": "Combined Maths" }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.replaceRecords",
        json!({
            "classId": "c1",
            "records": [
                { "student_id": "s1", "attendance_date": "2025-06-02", "status": "present", "source": "manual" },
                { "student_id": "s2", "attendance_date": "2025-05-10", "status": "present", "source": "manual" }
            ]
        }),
    );

    // Detailed view is filtered to May; the overview cards still say "today".
    let overview = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.overview",
        json!({
            "classId": "c1",
            "today": "2025-06-02",
            "filters": { "month": 5, "year": 2025 }
        }),
    );
    assert_eq!(overview.get("totalRecords").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(overview.get("presentToday").and_then(|v| v.as_u64()), Some(1));
}

#[test]
fn dateless_records_stay_in_totals_only() {
    let workspace = temp_dir("tuitiond-overview-dateless");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    setup_class(
        &mut stdin,
        &mut reader,
        &workspace,
        json!({ "id": "c1", "name": "Combined Maths" }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.replaceRecords",
        json!({
            "classId": "c1",
            "records": [
                { "student_id": "s1", "status": "present", "source": "manual" },
                { "student_id": "s1", "attendance_date": "2025-06-02", "status": "present", "source": "manual" }
            ]
        }),
    );

    let overview = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.overview",
        json!({ "classId": "c1", "today": "2025-06-03" }),
    );
    assert_eq!(overview.get("totalRecords").and_then(|v| v.as_u64()), Some(2));
    let by_student = overview.get("byStudent").expect("byStudent");
    assert_eq!(
        by_student
            .get("s1")
            .and_then(|s| s.get("totalDays"))
            .and_then(|v| v.as_u64()),
        Some(1)
    );
    assert_eq!(
        overview.get("weekly").and_then(|v| v.as_array()).map(|w| w.len()),
        Some(1)
    );
}
