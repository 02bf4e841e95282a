use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-day attendance status. Anything unrecognized degrades to `NotMarked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Present,
    Late,
    Absent,
    NotMarked,
}

impl Status {
    pub fn parse(raw: Option<&str>) -> Status {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("present") => Status::Present,
            Some("late") => Status::Late,
            Some("absent") => Status::Absent,
            _ => Status::NotMarked,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Present => "present",
            Status::Late => "late",
            Status::Absent => "absent",
            Status::NotMarked => "not_marked",
        }
    }
}

/// Where a record came from. The upstream services spell these inconsistently
/// ("Zoom Webhook", "zoom-manual", "Recorded Video Session"), so classification
/// is substring-based on the lowercased raw tag, priority zoom > recorded >
/// barcode > image > exact "manual".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    ZoomWebhook,
    ZoomManual,
    RecordedVideo,
    Barcode,
    Image,
    Manual,
    Unknown,
}

impl Source {
    pub fn classify(raw: Option<&str>) -> Source {
        let Some(raw) = raw else {
            return Source::Unknown;
        };
        let t = raw.trim().to_ascii_lowercase();
        if t.is_empty() {
            return Source::Unknown;
        }
        if t.contains("zoom") {
            return if t.contains("manual") {
                Source::ZoomManual
            } else {
                Source::ZoomWebhook
            };
        }
        if t.contains("recorded") {
            return Source::RecordedVideo;
        }
        if t.contains("barcode") {
            return Source::Barcode;
        }
        if t.contains("image") {
            return Source::Image;
        }
        if t == "manual" {
            return Source::Manual;
        }
        Source::Unknown
    }

    pub fn parse_canonical(raw: &str) -> Source {
        match raw {
            "zoom_webhook" => Source::ZoomWebhook,
            "zoom_manual" => Source::ZoomManual,
            "recorded_video" => Source::RecordedVideo,
            "barcode" => Source::Barcode,
            "image" => Source::Image,
            "manual" => Source::Manual,
            _ => Source::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Source::ZoomWebhook => "zoom_webhook",
            Source::ZoomManual => "zoom_manual",
            Source::RecordedVideo => "recorded_video",
            Source::Barcode => "barcode",
            Source::Image => "image",
            Source::Manual => "manual",
            Source::Unknown => "unknown",
        }
    }

    /// Both zoom kinds roll up into the "zoom" bucket of by-source counts.
    pub fn is_zoom(self) -> bool {
        matches!(self, Source::ZoomWebhook | Source::ZoomManual)
    }

    /// Barcode tallies count image-based check-ins too.
    pub fn is_barcode_like(self) -> bool {
        matches!(self, Source::Barcode | Source::Image)
    }
}

/// Canonical attendance record. Upstream payloads are duck-typed with
/// inconsistent field names; all "guess the field" logic lives in
/// `normalize_record` and nowhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub class_id: String,
    pub student_id: String,
    pub student_name: String,
    /// Canonical YYYY-MM-DD calendar day, or None when underivable.
    /// Every downstream day comparison uses this string, nothing else.
    pub date: Option<String>,
    pub join_time: Option<String>,
    pub leave_time: Option<String>,
    pub duration_minutes: Option<f64>,
    pub status: Status,
    pub source: Source,
    pub source_raw: String,
}

const DATE_KEYS: &[&str] = &["attendance_date", "attendanceDate", "date"];
const JOIN_KEYS: &[&str] = &["join_time", "joinTime", "joined_at", "time", "timestamp"];
const LEAVE_KEYS: &[&str] = &["leave_time", "leaveTime", "left_at"];
const DURATION_KEYS: &[&str] = &["duration_minutes", "durationMinutes", "duration"];
const STUDENT_ID_KEYS: &[&str] = &["student_id", "studentId", "user_id", "userId"];
const STUDENT_NAME_KEYS: &[&str] = &["student_name", "studentName", "name", "user_name"];

fn first_str<'a>(raw: &'a serde_json::Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| raw.get(k).and_then(|v| v.as_str()))
}

fn first_value<'a>(raw: &'a serde_json::Value, keys: &[&str]) -> Option<&'a serde_json::Value> {
    keys.iter().find_map(|k| raw.get(k))
}

/// Pull the first valid YYYY-MM-DD out of an arbitrary string.
pub fn extract_iso_date(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    if bytes.len() < 10 {
        return None;
    }
    for start in 0..=(bytes.len() - 10) {
        let w = &bytes[start..start + 10];
        let shape_ok = w.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
        if !shape_ok {
            continue;
        }
        let candidate = std::str::from_utf8(w).ok()?;
        if NaiveDate::parse_from_str(candidate, "%Y-%m-%d").is_ok() {
            return Some(candidate.to_string());
        }
    }
    None
}

/// Normalize a time-ish value to an RFC-3339 string where possible, keeping
/// the raw text otherwise. Numeric values are treated as epoch seconds (or
/// milliseconds when they are too large to be seconds).
fn normalize_time(v: &serde_json::Value) -> Option<String> {
    if let Some(s) = v.as_str() {
        let t = s.trim();
        if t.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
            return Some(dt.to_rfc3339());
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S") {
            return Some(dt.and_utc().to_rfc3339());
        }
        return Some(t.to_string());
    }
    if let Some(n) = v.as_i64() {
        let secs = if n.abs() > 100_000_000_000 { n / 1000 } else { n };
        return DateTime::from_timestamp(secs, 0).map(|dt| dt.to_rfc3339());
    }
    None
}

fn time_to_date(time: &str) -> Option<String> {
    extract_iso_date(time)
}

/// Turn one raw upstream record into the canonical shape. Never fails:
/// missing or malformed fields degrade to `None`/`unknown`, the record is
/// never dropped from the batch.
pub fn normalize_record(class_id: &str, raw: &serde_json::Value) -> AttendanceRecord {
    let id = raw
        .get("id")
        .or_else(|| raw.get("record_id"))
        .and_then(|v| {
            v.as_str()
                .map(|s| s.to_string())
                .or_else(|| v.as_i64().map(|n| n.to_string()))
        })
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let student_id = first_str(raw, STUDENT_ID_KEYS)
        .map(|s| s.to_string())
        .or_else(|| {
            STUDENT_ID_KEYS
                .iter()
                .find_map(|k| raw.get(k).and_then(|v| v.as_i64()).map(|n| n.to_string()))
        })
        .unwrap_or_default();

    let student_name = first_str(raw, STUDENT_NAME_KEYS).unwrap_or("").to_string();

    let join_time = first_value(raw, JOIN_KEYS).and_then(normalize_time);
    let leave_time = first_value(raw, LEAVE_KEYS).and_then(normalize_time);

    // Date resolution order: explicit attendance date, then join time, then
    // any YYYY-MM-DD found in a string-typed time field.
    let date = first_str(raw, DATE_KEYS)
        .and_then(extract_iso_date)
        .or_else(|| join_time.as_deref().and_then(time_to_date))
        .or_else(|| {
            JOIN_KEYS
                .iter()
                .chain(LEAVE_KEYS.iter())
                .find_map(|k| raw.get(k).and_then(|v| v.as_str()).and_then(extract_iso_date))
        });

    let duration_minutes = first_value(raw, DURATION_KEYS).and_then(|v| {
        v.as_f64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
    });

    let source_raw = raw
        .get("source")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    AttendanceRecord {
        id,
        class_id: class_id.to_string(),
        student_id,
        student_name,
        date,
        join_time,
        leave_time,
        duration_minutes,
        status: Status::parse(raw.get("status").and_then(|v| v.as_str())),
        source: Source::classify(raw.get("source").and_then(|v| v.as_str())),
        source_raw,
    }
}
