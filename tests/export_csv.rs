
use serde_json::json;
use test_support::{request_ok, setup_class, spawn_sidecar, temp_dir};

#[test]
fn csv_export_writes_filtered_rows_only() {
    let workspace = temp_dir("tuitiond-csv");
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
                { "student_id": "s1", "student_name": "Amal", "attendance_date": "2025-06-02",
                  "status": "present", "source": "zoom_webhook", "duration_minutes": 55 },
                { "student_id": "s2", "student_name": "Bimal", "attendance_date": "2025-06-02",
                  "status": "late", "source": "manual" },
                { "student_id": "s3", "student_name": "Chamod", "attendance_date": "2025-05-05",
                  "status": "present", "source": "manual" }
            ]
        }),
    );

    let out_path = workspace.join("exports").join("june.csv");
    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "export.attendanceCsv",
        json!({
            "classId": "c1",
            "outPath": out_path.to_string_lossy(),
            "filters": { "month": 6, "year": 2025 }
        }),
    );
    assert_eq!(exported.get("rows").and_then(|v| v.as_u64()), Some(2));

    let text = std::fs::read_to_string(&out_path).expect("read exported csv");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3); // header + 2 rows
    assert_eq!(
        lines[0],
        "date,student_id,student_name,status,source,join_time,leave_time,duration_minutes"
    );
    assert!(lines.iter().any(|l| l.contains("Amal") && l.contains("55")));
    assert!(lines.iter().any(|l| l.contains("Bimal") && l.contains("late")));
    assert!(!text.contains("Chamod"));
}
