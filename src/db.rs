use crate::agg::ClassMeta;
use crate::normalize::{AttendanceRecord, Source, Status};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "tuition.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            subject TEXT,
            teacher TEXT,
            stream TEXT,
            delivery_method TEXT,
            course_type TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_records(
            id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            student_name TEXT NOT NULL,
            date TEXT,
            join_time TEXT,
            leave_time TEXT,
            duration_minutes REAL,
            status TEXT NOT NULL,
            source TEXT NOT NULL,
            source_raw TEXT NOT NULL,
            PRIMARY KEY(class_id, id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_class_date
         ON attendance_records(class_id, date)",
        [],
    )?;

    Ok(conn)
}

pub fn upsert_class(conn: &Connection, meta: &ClassMeta) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO classes(id, name, subject, teacher, stream, delivery_method, course_type)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           subject = excluded.subject,
           teacher = excluded.teacher,
           stream = excluded.stream,
           delivery_method = excluded.delivery_method,
           course_type = excluded.course_type",
        (
            &meta.id,
            &meta.name,
            &meta.subject,
            &meta.teacher,
            &meta.stream,
            &meta.delivery_method,
            &meta.course_type,
        ),
    )?;
    Ok(())
}

pub fn get_class(conn: &Connection, class_id: &str) -> rusqlite::Result<Option<ClassMeta>> {
    conn.query_row(
        "SELECT id, name, subject, teacher, stream, delivery_method, course_type
         FROM classes WHERE id = ?",
        [class_id],
        |r| {
            Ok(ClassMeta {
                id: r.get(0)?,
                name: r.get(1)?,
                subject: r.get(2)?,
                teacher: r.get(3)?,
                stream: r.get(4)?,
                delivery_method: r.get(5)?,
                course_type: r.get(6)?,
            })
        },
    )
    .optional()
}

pub fn list_classes(conn: &Connection) -> rusqlite::Result<Vec<(ClassMeta, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT
           c.id, c.name, c.subject, c.teacher, c.stream, c.delivery_method, c.course_type,
           (SELECT COUNT(*) FROM attendance_records a WHERE a.class_id = c.id) AS record_count
         FROM classes c
         ORDER BY c.name",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            ClassMeta {
                id: r.get(0)?,
                name: r.get(1)?,
                subject: r.get(2)?,
                teacher: r.get(3)?,
                stream: r.get(4)?,
                delivery_method: r.get(5)?,
                course_type: r.get(6)?,
            },
            r.get::<_, i64>(7)?,
        ))
    })?;
    rows.collect()
}

/// Replace a class's entire record set in one transaction. A refresh always
/// supersedes the previous snapshot for that class wholesale; other classes'
/// cached records are untouched. Field-by-field merging is deliberately not
/// supported.
pub fn replace_class_records(
    conn: &Connection,
    class_id: &str,
    records: &[AttendanceRecord],
) -> rusqlite::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM attendance_records WHERE class_id = ?",
        [class_id],
    )?;
    for r in records {
        insert_record_inner(&tx, r)?;
    }
    tx.commit()?;
    Ok(records.len())
}

pub fn insert_record(conn: &Connection, record: &AttendanceRecord) -> rusqlite::Result<()> {
    insert_record_inner(conn, record)
}

fn insert_record_inner(conn: &Connection, r: &AttendanceRecord) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO attendance_records(
            id, class_id, student_id, student_name, date, join_time, leave_time,
            duration_minutes, status, source, source_raw)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(class_id, id) DO UPDATE SET
           student_id = excluded.student_id,
           student_name = excluded.student_name,
           date = excluded.date,
           join_time = excluded.join_time,
           leave_time = excluded.leave_time,
           duration_minutes = excluded.duration_minutes,
           status = excluded.status,
           source = excluded.source,
           source_raw = excluded.source_raw",
        (
            &r.id,
            &r.class_id,
            &r.student_id,
            &r.student_name,
            &r.date,
            &r.join_time,
            &r.leave_time,
            &r.duration_minutes,
            r.status.as_str(),
            r.source.as_str(),
            &r.source_raw,
        ),
    )?;
    Ok(())
}

pub fn load_class_records(
    conn: &Connection,
    class_id: &str,
) -> rusqlite::Result<Vec<AttendanceRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, student_id, student_name, date, join_time, leave_time,
                duration_minutes, status, source, source_raw
         FROM attendance_records
         WHERE class_id = ?
         ORDER BY date DESC, student_id, id",
    )?;
    let rows = stmt.query_map([class_id], |r| {
        let status: String = r.get(7)?;
        let source: String = r.get(8)?;
        Ok(AttendanceRecord {
            id: r.get(0)?,
            class_id: class_id.to_string(),
            student_id: r.get(1)?,
            student_name: r.get(2)?,
            date: r.get(3)?,
            join_time: r.get(4)?,
            leave_time: r.get(5)?,
            duration_minutes: r.get(6)?,
            status: Status::parse(Some(&status)),
            source: Source::parse_canonical(&source),
            source_raw: r.get(9)?,
        })
    })?;
    rows.collect()
}

pub fn class_record_count(conn: &Connection, class_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM attendance_records WHERE class_id = ?",
        [class_id],
        |r| r.get(0),
    )
}
