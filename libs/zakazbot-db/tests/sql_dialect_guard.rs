//! The system this crate replaces ran on SQLite; these guards keep its
//! dialect from leaking back into the Postgres query text. Queries here
//! keep each clause on its own source line, so a line scan covers them.

use std::fs;
use std::path::{Path, PathBuf};

/// Lowercase needles that only ever mean SQLite.
const SQLITE_MARKERS: &[&str] = &[
    "insert or ignore",
    "insert or replace",
    "autoincrement",
    "last_insert_rowid",
    "strftime(",
    "datetime('now'",
    "begin exclusive",
];

/// Uppercase, as every query literal in this crate writes them. Keeps the
/// scan away from log messages and identifiers.
const SQL_KEYWORDS: &[&str] = &[
    "SELECT ",
    "INSERT ",
    "UPDATE ",
    "DELETE ",
    "VALUES",
    "WHERE ",
    "RETURNING",
];

fn collect(dir: &Path, ext: &str, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect(&path, ext, out);
        } else if path.extension().is_some_and(|e| e == ext) {
            out.push(path);
        }
    }
}

fn is_sql_line(line: &str) -> bool {
    SQL_KEYWORDS.iter().any(|kw| line.contains(kw))
}

/// A bound `?` placeholder sits after `=`, a comma or an opening paren.
/// Rust's try operator always follows an expression character, so it never
/// matches here.
fn has_bare_placeholder(line: &str) -> bool {
    line.match_indices('?').any(|(idx, _)| {
        let before = line[..idx].chars().rev().find(|c| !c.is_whitespace());
        matches!(before, Some('=' | ',' | '('))
    })
}

fn scan_lines(path: &Path, check_placeholders: bool, offences: &mut Vec<String>) {
    let Ok(text) = fs::read_to_string(path) else {
        return;
    };
    for (idx, line) in text.lines().enumerate() {
        let lower = line.to_lowercase();
        for marker in SQLITE_MARKERS {
            if lower.contains(marker) {
                offences.push(format!("{}:{}: `{marker}`", path.display(), idx + 1));
            }
        }
        if check_placeholders && is_sql_line(line) && has_bare_placeholder(line) {
            offences.push(format!("{}:{}: `?` placeholder", path.display(), idx + 1));
        }
    }
}

#[test]
fn query_literals_use_postgres_placeholders() {
    let src = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    let mut files = Vec::new();
    collect(&src, "rs", &mut files);
    assert!(!files.is_empty(), "no sources under {}", src.display());

    let mut offences = Vec::new();
    for file in &files {
        scan_lines(file, true, &mut offences);
    }
    assert!(
        offences.is_empty(),
        "SQLite dialect in query text:\n{}",
        offences.join("\n")
    );
}

#[test]
fn migrations_are_free_of_sqlite_syntax() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
    let mut files = Vec::new();
    collect(&dir, "sql", &mut files);
    assert!(!files.is_empty(), "no migrations under {}", dir.display());

    let mut offences = Vec::new();
    for file in &files {
        scan_lines(file, false, &mut offences);
    }
    assert!(
        offences.is_empty(),
        "SQLite syntax in migrations:\n{}",
        offences.join("\n")
    );
}
