use crate::normalize::AttendanceRecord;
use anyhow::Context;
use std::path::Path;

/// Render a filtered record list as CSV. Formatting only; every derived
/// number comes from the aggregation engine, never from here.
pub fn write_records_csv(out_path: &Path, records: &[AttendanceRecord]) -> anyhow::Result<usize> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let mut writer = csv::Writer::from_path(out_path)
        .with_context(|| format!("failed to create csv file {}", out_path.to_string_lossy()))?;

    writer.write_record([
        "date",
        "student_id",
        "student_name",
        "status",
        "source",
        "join_time",
        "leave_time",
        "duration_minutes",
    ])?;

    for r in records {
        writer.write_record([
            r.date.as_deref().unwrap_or(""),
            r.student_id.as_str(),
            r.student_name.as_str(),
            r.status.as_str(),
            r.source.as_str(),
            r.join_time.as_deref().unwrap_or(""),
            r.leave_time.as_deref().unwrap_or(""),
            &r.duration_minutes
                .map(|d| d.to_string())
                .unwrap_or_default(),
        ])?;
    }
    writer.flush().context("failed to flush csv output")?;
    Ok(records.len())
}
