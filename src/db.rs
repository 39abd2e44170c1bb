use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE: &str = "college.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS academic_years(
            id TEXT PRIMARY KEY,
            label TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            category TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS \"groups\"(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            duration INTEGER,
            semesters INTEGER
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_groups_code ON \"groups\"(code)",
        [],
    )?;

    // Courses reference their group by name.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            group_name TEXT NOT NULL,
            semesters INTEGER,
            duration INTEGER
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_group_code ON courses(group_name, code)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sub_categories(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            subjects TEXT NOT NULL DEFAULT '[]'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            academic_year TEXT NOT NULL,
            course_name TEXT NOT NULL,
            semester INTEGER,
            category_id TEXT,
            subject_code TEXT,
            subject_name TEXT NOT NULL
        )",
        [],
    )?;
    ensure_column(&conn, "subjects", "fee_amount", "REAL")?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subjects_identity
         ON subjects(academic_year, course_name, semester, category_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subjects_category ON subjects(category_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS applications(
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT,
            group_name TEXT,
            course_name TEXT,
            academic_year TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            submitted_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            hall_ticket_no TEXT,
            aadhar_number TEXT,
            email TEXT,
            full_name TEXT NOT NULL,
            phone TEXT,
            group_name TEXT,
            course_name TEXT,
            academic_year TEXT,
            semester INTEGER
        )",
        [],
    )?;
    ensure_column(&conn, "students", "batch_name", "TEXT")?;
    for column in ["student_id", "hall_ticket_no", "aadhar_number", "email"] {
        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_students_{c} ON students({c})",
                c = column
            ),
            [],
        )?;
    }

    conn.execute(
        "CREATE TABLE IF NOT EXISTS batches(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            academic_year TEXT,
            course_name TEXT,
            start_date TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exams(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            academic_year TEXT,
            course_name TEXT,
            semester INTEGER,
            exam_date TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS fee_definitions(
            id TEXT PRIMARY KEY,
            academic_year TEXT NOT NULL,
            group_name TEXT,
            course_name TEXT NOT NULL,
            semester INTEGER,
            fee_category TEXT NOT NULL,
            amount REAL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_fee_definitions_semester
         ON fee_definitions(academic_year, course_name, semester)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS fee_categories(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            fees TEXT NOT NULL DEFAULT '[]'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS payments(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            academic_year TEXT,
            semester INTEGER,
            fee_category TEXT,
            amount REAL,
            paid_on TEXT,
            method TEXT,
            reference TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_payments_student ON payments(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS results(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            exam_name TEXT NOT NULL,
            subject_name TEXT NOT NULL,
            academic_year TEXT,
            semester INTEGER,
            marks REAL,
            max_marks REAL,
            grade TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_student ON results(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS hall_tickets(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            exam_name TEXT NOT NULL,
            hall_ticket_no TEXT NOT NULL,
            issued_on TEXT
        )",
        [],
    )?;

    Ok(conn)
}

/// Adds `column` to `table` for workspaces created before it existed.
fn ensure_column(conn: &Connection, table: &str, column: &str, decl: &str) -> anyhow::Result<()> {
    if table_has_column(conn, table, column)? {
        return Ok(());
    }
    conn.execute(
        &format!("ALTER TABLE \"{}\" ADD COLUMN {} {}", table, column, decl),
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info(\"{}\")", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn open_db_is_idempotent_and_backfills_columns() {
        let dir = std::env::temp_dir().join(format!(
            "collegeadmind-db-{}",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        {
            let conn = open_db(&dir).expect("first open");
            assert!(table_has_column(&conn, "students", "batch_name").expect("pragma"));
            assert!(table_has_column(&conn, "subjects", "fee_amount").expect("pragma"));
        }
        let conn = open_db(&dir).expect("second open");
        assert!(table_has_column(&conn, "groups", "semesters").expect("pragma"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
