//! Bulk subject import from an uploaded CSV sheet.
//!
//! The import is best-effort per row: rows that fail validation are reported
//! under `row-N` and skipped, while every valid row is inserted as soon as it
//! has been checked. Inserts are not wrapped in a transaction, so a storage
//! failure part-way through leaves the rows before it committed.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::db::repository::{RepositoryResult, SubjectRepository};
use crate::models::{validate_subject, Subject, SubjectTable};
use crate::validator::Validator;

/// Header that must be present in every import file.
pub const REQUIRED_COLUMN: &str = "subject_name";

/// Reasons an uploaded file cannot be read as a subject sheet.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ImportError {
    #[error("file is empty")]
    Empty,

    #[error("file is not valid UTF-8")]
    InvalidUtf8,

    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("line {line}: expected at most {expected} cells, found {found}")]
    TooManyCells {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: column '{column}' must be an integer, found '{value}'")]
    InvalidInteger {
        line: usize,
        column: String,
        value: String,
    },
}

/// Outcome of an import: the full table afterwards plus per-row rejections.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub subjects: Vec<Subject>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy)]
enum Column {
    SubjectId,
    SubjectName,
    SubjectNameEnglish,
    Stage,
    Semester,
    Department,
    MaxTheoryMark,
    MaxLabMark,
    MaxSemesterMark,
    MaxFinalExam,
    Credits,
    Active,
    Ministerial,
    Ignored,
}

impl Column {
    fn from_header(name: &str) -> Self {
        match name {
            "subject_id" => Self::SubjectId,
            "subject_name" => Self::SubjectName,
            "subject_name_english" => Self::SubjectNameEnglish,
            "stage" => Self::Stage,
            "semester" => Self::Semester,
            "department" => Self::Department,
            "max_theory_mark" => Self::MaxTheoryMark,
            "max_lab_mark" => Self::MaxLabMark,
            "max_semester_mark" => Self::MaxSemesterMark,
            "max_final_exam" => Self::MaxFinalExam,
            "credits" => Self::Credits,
            "active" => Self::Active,
            "ministerial" => Self::Ministerial,
            _ => Self::Ignored,
        }
    }
}

/// Split one CSV line into cells. `""` inside a quoted cell is a literal quote.
fn parse_csv_record(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                buf.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => out.push(std::mem::take(&mut buf)),
            _ => buf.push(ch),
        }
    }
    out.push(buf);
    out
}

fn parse_int<T: std::str::FromStr + Default>(
    line: usize,
    header: &str,
    value: &str,
) -> Result<T, ImportError> {
    if value.is_empty() {
        return Ok(T::default());
    }
    value.parse().map_err(|_| ImportError::InvalidInteger {
        line,
        column: header.to_string(),
        value: value.to_string(),
    })
}

/// Parse an uploaded sheet into candidate subjects, in file order.
///
/// The first non-blank line is the header. Columns are matched by JSON field
/// name; unknown columns are ignored and missing ones keep zero values.
pub fn parse_subjects_csv(bytes: &[u8]) -> Result<Vec<Subject>, ImportError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ImportError::InvalidUtf8)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut lines = text
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty());

    let (_, header_line) = lines.next().ok_or(ImportError::Empty)?;
    let headers: Vec<String> = parse_csv_record(header_line)
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();

    for (i, header) in headers.iter().enumerate() {
        if !header.is_empty() && headers[..i].contains(header) {
            return Err(ImportError::DuplicateColumn(header.clone()));
        }
    }
    if !headers.iter().any(|h| h == REQUIRED_COLUMN) {
        return Err(ImportError::MissingColumn(REQUIRED_COLUMN));
    }

    let columns: Vec<Column> = headers.iter().map(|h| Column::from_header(h)).collect();
    let ignored: Vec<&str> = headers
        .iter()
        .zip(&columns)
        .filter(|(_, c)| matches!(c, Column::Ignored))
        .map(|(h, _)| h.as_str())
        .collect();
    if !ignored.is_empty() {
        log::warn!("Ignoring unknown import columns: {:?}", ignored);
    }

    let mut subjects = Vec::new();
    for (line_no, line) in lines {
        let cells = parse_csv_record(line);
        if cells.len() > columns.len() {
            return Err(ImportError::TooManyCells {
                line: line_no,
                expected: columns.len(),
                found: cells.len(),
            });
        }

        let mut subject = Subject::default();
        for ((cell, column), header) in cells.iter().zip(&columns).zip(&headers) {
            let value = cell.trim();
            match column {
                Column::SubjectId => subject.id = parse_int(line_no, header, value)?,
                Column::SubjectName => subject.subject_name = value.to_string(),
                Column::SubjectNameEnglish => subject.subject_name_english = value.to_string(),
                Column::Stage => subject.stage = value.to_string(),
                Column::Semester => subject.semester = value.to_string(),
                Column::Department => subject.department = value.to_string(),
                Column::MaxTheoryMark => {
                    subject.max_theory_mark = parse_int(line_no, header, value)?
                }
                Column::MaxLabMark => subject.max_lab_mark = parse_int(line_no, header, value)?,
                Column::MaxSemesterMark => {
                    subject.max_semester_mark = parse_int(line_no, header, value)?
                }
                Column::MaxFinalExam => {
                    subject.max_final_exam = parse_int(line_no, header, value)?
                }
                Column::Credits => subject.credits = parse_int(line_no, header, value)?,
                Column::Active => subject.active = value.to_string(),
                Column::Ministerial => subject.ministerial = value.to_string(),
                Column::Ignored => {}
            }
        }
        subjects.push(subject);
    }

    Ok(subjects)
}

/// `"field: message, field: message"` in field-name order.
fn summarize(v: &Validator) -> String {
    v.errors()
        .iter()
        .map(|(field, message)| format!("{}: {}", field, message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate and insert `rows` into `table`, then return the whole table.
///
/// Row numbers in the error map are 1-based positions in `rows`. The first
/// insert failure is returned as-is; rows inserted before it stay stored.
pub async fn import_subjects<R>(
    repo: &R,
    table: &SubjectTable,
    rows: Vec<Subject>,
) -> RepositoryResult<ImportReport>
where
    R: SubjectRepository + ?Sized,
{
    let mut validator = Validator::new();
    let mut errors = BTreeMap::new();
    let total = rows.len();
    let mut inserted = 0usize;

    for (idx, mut subject) in rows.into_iter().enumerate() {
        validator.reset();
        validate_subject(&mut validator, &subject);
        if !validator.valid() {
            errors.insert(format!("row-{}", idx + 1), summarize(&validator));
            continue;
        }

        repo.insert_subject(table, &mut subject).await.map_err(|e| {
            log::error!(
                "Import into {} aborted at row {} after {} inserts: {}",
                table,
                idx + 1,
                inserted,
                e
            );
            e
        })?;
        inserted += 1;
    }

    log::info!(
        "Imported {} of {} rows into {} ({} rejected)",
        inserted,
        total,
        table,
        errors.len()
    );

    let subjects = repo.list_subjects(table, None).await?;
    Ok(ImportReport { subjects, errors })
}
