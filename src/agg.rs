use crate::normalize::{AttendanceRecord, Source, Status};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, Serialize)]
pub struct EngineError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl EngineError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

/// Class metadata the non-temporal filters and search run against. Records
/// only carry a classId; everything else about the class lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassMeta {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub teacher: Option<String>,
    #[serde(default)]
    pub stream: Option<String>,
    #[serde(default)]
    pub delivery_method: Option<String>,
    #[serde(default)]
    pub course_type: Option<String>,
}

/// UI-driven filter set. `specific_date` wins over month/year when both are
/// present; that precedence is documented behavior, not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    pub specific_date: Option<String>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    #[serde(default)]
    pub search_term: String,
    pub stream: Option<String>,
    pub delivery_method: Option<String>,
    pub course_type: Option<String>,
}

impl FilterCriteria {
    /// Copy with the temporal part cleared. Today-cards honor the
    /// non-temporal filters but always reflect the current calendar day.
    pub fn non_temporal(&self) -> FilterCriteria {
        FilterCriteria {
            specific_date: None,
            month: None,
            year: None,
            ..self.clone()
        }
    }
}

fn opt_string_filter(obj: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<String> {
    let v = obj.get(key)?;
    let s = v.as_str()?;
    let t = s.trim();
    if t.is_empty() || t.eq_ignore_ascii_case("all") {
        None
    } else {
        Some(t.to_string())
    }
}

pub fn parse_filter_criteria(
    raw: Option<&serde_json::Value>,
) -> Result<FilterCriteria, EngineError> {
    let Some(raw) = raw else {
        return Ok(FilterCriteria::default());
    };
    if raw.is_null() {
        return Ok(FilterCriteria::default());
    }
    let Some(obj) = raw.as_object() else {
        return Err(EngineError::new("bad_params", "filters must be an object"));
    };

    let specific_date = opt_string_filter(obj, "specificDate");
    if let Some(d) = &specific_date {
        if NaiveDate::parse_from_str(d, "%Y-%m-%d").is_err() {
            return Err(EngineError::new(
                "bad_params",
                "filters.specificDate must be YYYY-MM-DD",
            ));
        }
    }

    let month = match obj.get("month") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v)
            if v.as_str()
                .map(|s| s.eq_ignore_ascii_case("all"))
                .unwrap_or(false) =>
        {
            None
        }
        Some(v) => {
            let n = v
                .as_u64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse::<u64>().ok()));
            match n {
                Some(m) if (1..=12).contains(&m) => Some(m as u32),
                _ => {
                    return Err(EngineError::new(
                        "bad_params",
                        "filters.month must be 1-12 or 'All'",
                    ))
                }
            }
        }
    };

    let year = match obj.get("year") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v)
            if v.as_str()
                .map(|s| s.eq_ignore_ascii_case("all"))
                .unwrap_or(false) =>
        {
            None
        }
        Some(v) => {
            let n = v
                .as_i64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse::<i64>().ok()));
            match n {
                Some(y) => Some(y as i32),
                None => {
                    return Err(EngineError::new(
                        "bad_params",
                        "filters.year must be an integer or 'All'",
                    ))
                }
            }
        }
    };

    let search_term = obj
        .get("searchTerm")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    Ok(FilterCriteria {
        specific_date,
        month,
        year,
        search_term,
        stream: opt_string_filter(obj, "stream"),
        delivery_method: opt_string_filter(obj, "deliveryMethod"),
        course_type: opt_string_filter(obj, "courseType"),
    })
}

fn date_month_year(date: &str) -> Option<(i32, u32)> {
    let d = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some((d.year(), d.month()))
}

fn meta_field_matches(wanted: &Option<String>, actual: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(w) => actual
            .map(|a| a.eq_ignore_ascii_case(w))
            .unwrap_or(false),
    }
}

/// Filter Evaluator. Temporal predicates compare the canonical YYYY-MM-DD
/// string only; a record with no derivable date fails any active temporal
/// filter and passes when none is active. Non-temporal predicates are
/// AND-combined against the class metadata.
pub fn matches(
    record: &AttendanceRecord,
    criteria: &FilterCriteria,
    meta: Option<&ClassMeta>,
) -> bool {
    if let Some(wanted) = &criteria.specific_date {
        // specificDate overrides month/year entirely.
        if record.date.as_deref() != Some(wanted.as_str()) {
            return false;
        }
    } else if let (Some(month), Some(year)) = (criteria.month, criteria.year) {
        let Some(date) = record.date.as_deref() else {
            return false;
        };
        match date_month_year(date) {
            Some((y, m)) if y == year && m == month => {}
            _ => return false,
        }
    }

    if !meta_field_matches(&criteria.stream, meta.and_then(|m| m.stream.as_deref())) {
        return false;
    }
    if !meta_field_matches(
        &criteria.delivery_method,
        meta.and_then(|m| m.delivery_method.as_deref()),
    ) {
        return false;
    }
    if !meta_field_matches(
        &criteria.course_type,
        meta.and_then(|m| m.course_type.as_deref()),
    ) {
        return false;
    }

    if !criteria.search_term.is_empty() {
        let Some(meta) = meta else {
            return false;
        };
        let needle = criteria.search_term.to_ascii_lowercase();
        let hit = [
            Some(meta.id.as_str()),
            Some(meta.name.as_str()),
            meta.subject.as_deref(),
            meta.teacher.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_ascii_lowercase().contains(&needle));
        if !hit {
            return false;
        }
    }

    true
}

fn status_rank(status: Status) -> u8 {
    // Best attendance wins: a student who joined one session late but
    // attended another fully is not penalized.
    match status {
        Status::Present => 3,
        Status::Late => 2,
        Status::Absent => 1,
        Status::NotMarked => 0,
    }
}

/// Status Classifier: dominant status for one (student, day) pair.
pub fn classify_day(records: &[AttendanceRecord], student_id: &str, date: &str) -> Status {
    let mut best = Status::NotMarked;
    for r in records {
        if r.student_id != student_id || r.date.as_deref() != Some(date) {
            continue;
        }
        if status_rank(r.status) > status_rank(best) {
            best = r.status;
        }
    }
    best
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BySource {
    pub zoom: usize,
    pub recorded_video: usize,
    pub barcode: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub student_name: String,
    pub total_days: usize,
    pub present: usize,
    pub late: usize,
    pub absent: usize,
    pub attendance_percentage: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyRollup {
    pub year: i32,
    pub week: u32,
    pub present: usize,
    pub late: usize,
    pub absent: usize,
    pub days_with_classes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_records: usize,
    pub present_today: usize,
    pub late_today: usize,
    pub absent_today: usize,
    pub by_source: BySource,
    pub by_student: BTreeMap<String, StudentSummary>,
    pub weekly: Vec<WeeklyRollup>,
}

/// Aggregator. Pure and idempotent; empty or malformed input yields an
/// all-zero Summary rather than an error.
///
/// Counting rules worth keeping straight:
/// - `total_records` counts post-filter records with no dedup.
/// - Today-cards dedup by student (dominant status per 4.3) and ignore the
///   temporal filter; `today` is the canonical YYYY-MM-DD for "now".
/// - `by_source.barcode` is a raw record count (multi-class scans by one
///   student all count) while zoom/recorded are unique-student counts. The
///   asymmetry is intentional product behavior.
/// - `by_student.total_days` is the number of distinct class-days observed in
///   the filtered window, shared by every student.
pub fn aggregate(
    records: &[AttendanceRecord],
    criteria: &FilterCriteria,
    meta: Option<&ClassMeta>,
    today: &str,
) -> Summary {
    let filtered: Vec<&AttendanceRecord> = records
        .iter()
        .filter(|r| matches(r, criteria, meta))
        .collect();

    // Today-cards: non-temporal criteria plus date == today.
    let non_temporal = criteria.non_temporal();
    let today_records: Vec<AttendanceRecord> = records
        .iter()
        .filter(|r| matches(r, &non_temporal, meta) && r.date.as_deref() == Some(today))
        .cloned()
        .collect();
    let today_students: BTreeSet<&str> = today_records
        .iter()
        .map(|r| r.student_id.as_str())
        .collect();
    let (mut present_today, mut late_today, mut absent_today) = (0, 0, 0);
    for student in today_students {
        match classify_day(&today_records, student, today) {
            Status::Present => present_today += 1,
            Status::Late => late_today += 1,
            Status::Absent => absent_today += 1,
            Status::NotMarked => {}
        }
    }

    let mut zoom_students: HashSet<&str> = HashSet::new();
    let mut recorded_students: HashSet<&str> = HashSet::new();
    let mut barcode_count = 0usize;
    for r in &filtered {
        if r.source.is_zoom() {
            zoom_students.insert(r.student_id.as_str());
        } else if r.source == Source::RecordedVideo {
            recorded_students.insert(r.student_id.as_str());
        }
        if r.source.is_barcode_like() {
            barcode_count += 1;
        }
    }

    // Day-keyed aggregates only see dated records.
    let dated: Vec<AttendanceRecord> = filtered
        .iter()
        .filter(|r| r.date.is_some())
        .map(|r| (*r).clone())
        .collect();
    let class_days: BTreeSet<String> = dated.iter().filter_map(|r| r.date.clone()).collect();

    let mut names: HashMap<String, String> = HashMap::new();
    let mut student_days: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for r in &dated {
        let date = r.date.clone().unwrap_or_default();
        student_days
            .entry(r.student_id.clone())
            .or_default()
            .insert(date);
        if !r.student_name.is_empty() {
            names.entry(r.student_id.clone()).or_insert_with(|| r.student_name.clone());
        }
    }

    let total_days = class_days.len();
    let mut by_student: BTreeMap<String, StudentSummary> = BTreeMap::new();
    // Keyed by (iso year, iso week): late-December days belong to week 1 of
    // the next iso year and must not merge with (or sort ahead of) the same
    // week number a year apart.
    let mut weekly_map: BTreeMap<(i32, u32), WeeklyRollup> = BTreeMap::new();
    let mut week_days: BTreeMap<(i32, u32), BTreeSet<String>> = BTreeMap::new();

    for (student_id, days) in &student_days {
        let (mut present, mut late, mut absent) = (0usize, 0usize, 0usize);
        for day in days {
            let status = classify_day(&dated, student_id, day);
            match status {
                Status::Present => present += 1,
                Status::Late => late += 1,
                Status::Absent => absent += 1,
                Status::NotMarked => {}
            }
            if let Ok(d) = NaiveDate::parse_from_str(day, "%Y-%m-%d") {
                let iso = d.iso_week();
                let key = (iso.year(), iso.week());
                let entry = weekly_map.entry(key).or_insert(WeeklyRollup {
                    year: key.0,
                    week: key.1,
                    present: 0,
                    late: 0,
                    absent: 0,
                    days_with_classes: 0,
                });
                match status {
                    Status::Present => entry.present += 1,
                    Status::Late => entry.late += 1,
                    Status::Absent => entry.absent += 1,
                    Status::NotMarked => {}
                }
                week_days.entry(key).or_default().insert(day.clone());
            }
        }
        let attendance_percentage = if total_days > 0 {
            ((present as f64) / (total_days as f64) * 100.0).round() as i64
        } else {
            0
        };
        by_student.insert(
            student_id.clone(),
            StudentSummary {
                student_name: names.get(student_id).cloned().unwrap_or_default(),
                total_days,
                present,
                late,
                absent,
                attendance_percentage,
            },
        );
    }

    for (key, days) in week_days {
        if let Some(entry) = weekly_map.get_mut(&key) {
            entry.days_with_classes = days.len();
        }
    }

    Summary {
        total_records: filtered.len(),
        present_today,
        late_today,
        absent_today,
        by_source: BySource {
            zoom: zoom_students.len(),
            recorded_video: recorded_students.len(),
            barcode: barcode_count,
        },
        by_student,
        weekly: weekly_map.into_values().collect(),
    }
}
