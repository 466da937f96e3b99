use anyhow::Context;
use chrono::{NaiveDate, Utc};
use classroomd::roster::export::{GradeEntry, RosterEntry};
use classroomd::roster::ImportedRecord;
use classroomd::scoring::{AnswerKey, Rubric};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

pub const DB_FILE_NAME: &str = "classroom.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let conn = Connection::open(workspace.join(DB_FILE_NAME))?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            student_no TEXT,
            email TEXT,
            parent_email TEXT,
            grades_json TEXT,
            extra_json TEXT NOT NULL DEFAULT '{}',
            sort_order INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class_no ON students(class_id, student_no)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignments(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            title TEXT NOT NULL,
            kind TEXT NOT NULL,
            total_points REAL NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS answer_keys(
            assignment_id TEXT PRIMARY KEY,
            answers_json TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(assignment_id) REFERENCES assignments(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS rubrics(
            id TEXT PRIMARY KEY,
            rubric_json TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS submissions(
            id TEXT PRIMARY KEY,
            assignment_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            final_grade REAL NOT NULL,
            status TEXT NOT NULL,
            detail_json TEXT NOT NULL,
            graded_at TEXT,
            FOREIGN KEY(assignment_id) REFERENCES assignments(id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_submissions_assignment ON submissions(assignment_id)",
        [],
    )?;

    Ok(conn)
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    raw.map(|s| serde_json::from_str(&s).with_context(|| format!("settings key {key}")))
        .transpose()
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        params![key, serde_json::to_string(value)?],
    )?;
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRow {
    pub id: String,
    pub name: String,
    pub student_count: i64,
}

pub fn create_class(conn: &Connection, name: &str) -> anyhow::Result<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute("INSERT INTO classes(id, name) VALUES(?, ?)", params![id, name])?;
    Ok(id)
}

pub fn list_classes(conn: &Connection) -> anyhow::Result<Vec<ClassRow>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.name, (SELECT COUNT(*) FROM students s WHERE s.class_id = c.id)
         FROM classes c ORDER BY c.name, c.id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(ClassRow {
                id: r.get(0)?,
                name: r.get(1)?,
                student_count: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn class_name(conn: &Connection, class_id: &str) -> anyhow::Result<Option<String>> {
    Ok(conn
        .query_row("SELECT name FROM classes WHERE id = ?", [class_id], |r| r.get(0))
        .optional()?)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub student_no: Option<String>,
    pub email: Option<String>,
    pub parent_email: Option<String>,
    pub sort_order: i64,
}

pub fn list_students(conn: &Connection, class_id: &str) -> anyhow::Result<Vec<StudentRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, first_name, last_name, student_no, email, parent_email, sort_order
         FROM students WHERE class_id = ? ORDER BY last_name, first_name, sort_order",
    )?;
    let rows = stmt
        .query_map([class_id], |r| {
            Ok(StudentRow {
                id: r.get(0)?,
                first_name: r.get(1)?,
                last_name: r.get(2)?,
                student_no: r.get(3)?,
                email: r.get(4)?,
                parent_email: r.get(5)?,
                sort_order: r.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn roster_entries(conn: &Connection, class_id: &str) -> anyhow::Result<Vec<RosterEntry>> {
    Ok(list_students(conn, class_id)?
        .into_iter()
        .map(|s| RosterEntry {
            student_no: s.student_no,
            first_name: s.first_name,
            last_name: s.last_name,
            email: s.email,
        })
        .collect())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportConflict {
    pub student_no: String,
    pub display_name: String,
    pub existing: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOutcome {
    pub inserted: usize,
    pub conflicts: Vec<ImportConflict>,
}

fn student_no_key(s: &str) -> String {
    s.trim().to_ascii_lowercase()
}

/// Store imported records in one transaction. Records whose student number
/// already exists in the class (or earlier in the same batch) are reported
/// as conflicts and skipped.
pub fn insert_imported_students(
    conn: &mut Connection,
    class_id: &str,
    records: &[ImportedRecord],
) -> anyhow::Result<InsertOutcome> {
    let tx = conn.transaction()?;
    let existing: HashSet<String> = {
        let mut stmt = tx.prepare(
            "SELECT student_no FROM students WHERE class_id = ? AND student_no IS NOT NULL",
        )?;
        let nos = stmt
            .query_map([class_id], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        nos.iter().map(|s| student_no_key(s)).collect()
    };
    let mut next_sort: i64 = tx.query_row(
        "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM students WHERE class_id = ?",
        [class_id],
        |r| r.get(0),
    )?;

    let mut batch: HashSet<String> = HashSet::new();
    let mut outcome = InsertOutcome::default();
    let created_at = now_rfc3339();
    for record in records {
        if let Some(no) = record.student_id.as_deref() {
            let key = student_no_key(no);
            if existing.contains(&key) || batch.contains(&key) {
                outcome.conflicts.push(ImportConflict {
                    student_no: no.to_string(),
                    display_name: record.display_name(),
                    existing: existing.contains(&key),
                });
                continue;
            }
            batch.insert(key);
        }
        let grades_json = record
            .grades
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        tx.execute(
            "INSERT INTO students(id, class_id, first_name, last_name, student_no, email,
                parent_email, grades_json, extra_json, sort_order, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                Uuid::new_v4().to_string(),
                class_id,
                record.first_name,
                record.last_name,
                record.student_id,
                record.email,
                record.parent_email,
                grades_json,
                serde_json::to_string(&record.extra)?,
                next_sort,
                created_at,
            ],
        )?;
        next_sort += 1;
        outcome.inserted += 1;
    }
    tx.commit()?;
    Ok(outcome)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRow {
    pub id: String,
    pub class_id: String,
    pub title: String,
    pub kind: String,
    pub total_points: f64,
}

pub fn create_assignment(
    conn: &Connection,
    class_id: &str,
    title: &str,
    kind: &str,
    total_points: f64,
) -> anyhow::Result<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO assignments(id, class_id, title, kind, total_points, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        params![id, class_id, title, kind, total_points, now_rfc3339()],
    )?;
    Ok(id)
}

pub fn get_assignment(conn: &Connection, assignment_id: &str) -> anyhow::Result<Option<AssignmentRow>> {
    Ok(conn
        .query_row(
            "SELECT id, class_id, title, kind, total_points FROM assignments WHERE id = ?",
            [assignment_id],
            |r| {
                Ok(AssignmentRow {
                    id: r.get(0)?,
                    class_id: r.get(1)?,
                    title: r.get(2)?,
                    kind: r.get(3)?,
                    total_points: r.get(4)?,
                })
            },
        )
        .optional()?)
}

pub fn answer_key_get(conn: &Connection, assignment_id: &str) -> anyhow::Result<Option<AnswerKey>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT answers_json FROM answer_keys WHERE assignment_id = ?",
            [assignment_id],
            |r| r.get(0),
        )
        .optional()?;
    raw.map(|s| serde_json::from_str(&s).context("stored answer key"))
        .transpose()
}

pub fn answer_key_upsert(conn: &Connection, assignment_id: &str, key: &AnswerKey) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO answer_keys(assignment_id, answers_json, updated_at) VALUES(?, ?, ?)
         ON CONFLICT(assignment_id) DO UPDATE SET
            answers_json = excluded.answers_json,
            updated_at = excluded.updated_at",
        params![assignment_id, serde_json::to_string(key)?, now_rfc3339()],
    )?;
    Ok(())
}

pub fn rubric_insert(conn: &Connection, rubric: &Rubric) -> anyhow::Result<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO rubrics(id, rubric_json, created_at) VALUES(?, ?, ?)",
        params![id, serde_json::to_string(rubric)?, now_rfc3339()],
    )?;
    Ok(id)
}

pub fn rubrics_list(conn: &Connection) -> anyhow::Result<Vec<(String, Rubric)>> {
    let mut stmt = conn.prepare("SELECT id, rubric_json FROM rubrics ORDER BY created_at DESC, id")?;
    let raw = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    raw.into_iter()
        .map(|(id, json)| -> anyhow::Result<(String, Rubric)> {
            let rubric: Rubric = serde_json::from_str(&json).with_context(|| format!("rubric {id}"))?;
            Ok((id, rubric))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct SubmissionInsert {
    pub student_id: String,
    pub final_grade: f64,
    pub detail: serde_json::Value,
}

pub fn submissions_insert(
    conn: &mut Connection,
    assignment_id: &str,
    rows: &[SubmissionInsert],
) -> anyhow::Result<usize> {
    let tx = conn.transaction()?;
    let graded_at = now_rfc3339();
    for row in rows {
        tx.execute(
            "INSERT INTO submissions(id, assignment_id, student_id, final_grade, status, detail_json, graded_at)
             VALUES(?, ?, ?, ?, 'finalized', ?, ?)",
            params![
                Uuid::new_v4().to_string(),
                assignment_id,
                row.student_id,
                row.final_grade,
                serde_json::to_string(&row.detail)?,
                graded_at,
            ],
        )?;
    }
    tx.commit()?;
    Ok(rows.len())
}

pub fn grade_entries(conn: &Connection, assignment_id: &str) -> anyhow::Result<Vec<GradeEntry>> {
    let mut stmt = conn.prepare(
        "SELECT st.student_no, st.last_name, st.first_name, s.final_grade, s.status, s.graded_at
         FROM submissions s
         JOIN students st ON st.id = s.student_id
         WHERE s.assignment_id = ?
         ORDER BY st.last_name, st.first_name, s.graded_at",
    )?;
    let rows = stmt
        .query_map([assignment_id], |r| {
            let graded_at: Option<String> = r.get(5)?;
            Ok(GradeEntry {
                student_no: r.get(0)?,
                last_name: r.get(1)?,
                first_name: r.get(2)?,
                score: r.get(3)?,
                status: r.get(4)?,
                graded_on: graded_at
                    .as_deref()
                    .and_then(|s| s.get(..10))
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn student_in_class(conn: &Connection, class_id: &str, student_id: &str) -> anyhow::Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM students WHERE class_id = ? AND id = ?",
            params![class_id, student_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_workspace(prefix: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ))
    }

    fn record(first: &str, last: &str, no: Option<&str>) -> ImportedRecord {
        ImportedRecord {
            student_id: no.map(str::to_string),
            ..ImportedRecord::new(first, last)
        }
    }

    #[test]
    fn import_dedupes_by_student_number() {
        let mut conn = open_db(&temp_workspace("classroomd-db-dedupe")).expect("open db");
        let class_id = create_class(&conn, "Math 8B").expect("class");

        let first = insert_imported_students(
            &mut conn,
            &class_id,
            &[record("Ada", "Lovelace", Some("S1")), record("Alan", "Turing", None)],
        )
        .expect("insert");
        assert_eq!(first.inserted, 2);
        assert!(first.conflicts.is_empty());

        let second = insert_imported_students(
            &mut conn,
            &class_id,
            &[
                record("Ada", "L.", Some(" s1 ")),
                record("Grace", "Hopper", Some("S2")),
                record("Grace", "H.", Some("S2")),
            ],
        )
        .expect("insert");
        assert_eq!(second.inserted, 1);
        assert_eq!(second.conflicts.len(), 2);
        assert!(second.conflicts[0].existing);
        assert!(!second.conflicts[1].existing);

        let students = list_students(&conn, &class_id).expect("list");
        assert_eq!(students.len(), 3);
        assert_eq!(students[0].last_name, "Hopper");
    }

    #[test]
    fn settings_round_trip() {
        let conn = open_db(&temp_workspace("classroomd-db-settings")).expect("open db");
        assert_eq!(settings_get_json(&conn, "setup.import").expect("get"), None);
        settings_set_json(&conn, "setup.import", &serde_json::json!({"hasHeaders": false}))
            .expect("set");
        let v = settings_get_json(&conn, "setup.import").expect("get").expect("value");
        assert_eq!(v["hasHeaders"], false);
    }
}
