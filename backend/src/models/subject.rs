//! Subject records and their year-partitioned tables.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::validator::{permitted_value, Validator};

/// Name of the table holding the current academic year's subjects.
pub const CURRENT_SUBJECTS_TABLE: &str = "subjects";

const MAX_NAME_BYTES: usize = 500;
const MAX_DEPARTMENT_BYTES: usize = 200;
const MAX_MARK: i32 = 100;
const MAX_CREDITS: i32 = 30;
const BOOLEAN_FLAGS: [&str; 2] = ["true", "false"];

/// A subject taught at a given stage and semester.
///
/// `active` and `ministerial` are stored as the strings `"true"`/`"false"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(rename = "subject_id")]
    pub id: i64,
    pub subject_name: String,
    pub subject_name_english: String,
    pub stage: String,
    pub semester: String,
    pub department: String,
    pub max_theory_mark: i32,
    pub max_lab_mark: i32,
    pub max_semester_mark: i32,
    pub max_final_exam: i32,
    pub credits: i32,
    pub active: String,
    pub ministerial: String,
}

/// Academic year segment of a partitioned subject table (e.g. `2024_2025`).
///
/// Only ASCII digits and underscores are accepted, so the value can be
/// embedded in a table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AcademicYear(String);

impl AcademicYear {
    const MAX_LEN: usize = 16;

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let well_formed = !raw.is_empty()
            && raw.len() <= Self::MAX_LEN
            && raw.chars().any(|c| c.is_ascii_digit())
            && raw.chars().all(|c| c.is_ascii_digit() || c == '_');
        well_formed.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AcademicYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which subject table an operation targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubjectTable {
    /// The unpartitioned table used by bulk imports and exemption lookups.
    Current,
    /// A year-partitioned table, `subjects_<year>`.
    Year(AcademicYear),
}

impl SubjectTable {
    pub fn table_name(&self) -> String {
        match self {
            Self::Current => CURRENT_SUBJECTS_TABLE.to_string(),
            Self::Year(year) => format!("{}_{}", CURRENT_SUBJECTS_TABLE, year),
        }
    }

    /// Resource name used for privilege checks.
    pub fn resource(&self) -> String {
        self.table_name()
    }
}

impl fmt::Display for SubjectTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.table_name())
    }
}

/// Request body for creating a subject. Absent fields take zero values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NewSubject {
    pub subject_id: i64,
    pub subject_name: String,
    pub subject_name_english: String,
    pub stage: String,
    pub semester: String,
    pub department: String,
    pub max_theory_mark: i32,
    pub max_lab_mark: i32,
    pub max_semester_mark: i32,
    pub max_final_exam: i32,
    pub credits: i32,
    pub active: String,
    pub ministerial: String,
}

impl From<NewSubject> for Subject {
    fn from(input: NewSubject) -> Self {
        Self {
            id: input.subject_id,
            subject_name: input.subject_name,
            subject_name_english: input.subject_name_english,
            stage: input.stage,
            semester: input.semester,
            department: input.department,
            max_theory_mark: input.max_theory_mark,
            max_lab_mark: input.max_lab_mark,
            max_semester_mark: input.max_semester_mark,
            max_final_exam: input.max_final_exam,
            credits: input.credits,
            active: input.active,
            ministerial: input.ministerial,
        }
    }
}

/// Partial update of a subject: only present fields overwrite the record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubjectPatch {
    pub subject_id: Option<i64>,
    pub subject_name: Option<String>,
    pub subject_name_english: Option<String>,
    pub stage: Option<String>,
    pub semester: Option<String>,
    pub department: Option<String>,
    pub max_theory_mark: Option<i32>,
    pub max_lab_mark: Option<i32>,
    pub max_semester_mark: Option<i32>,
    pub max_final_exam: Option<i32>,
    pub credits: Option<i32>,
    pub active: Option<String>,
    pub ministerial: Option<String>,
}

impl SubjectPatch {
    pub fn apply(self, subject: &mut Subject) {
        fn set<T>(target: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *target = value;
            }
        }

        set(&mut subject.id, self.subject_id);
        set(&mut subject.subject_name, self.subject_name);
        set(&mut subject.subject_name_english, self.subject_name_english);
        set(&mut subject.stage, self.stage);
        set(&mut subject.semester, self.semester);
        set(&mut subject.department, self.department);
        set(&mut subject.max_theory_mark, self.max_theory_mark);
        set(&mut subject.max_lab_mark, self.max_lab_mark);
        set(&mut subject.max_semester_mark, self.max_semester_mark);
        set(&mut subject.max_final_exam, self.max_final_exam);
        set(&mut subject.credits, self.credits);
        set(&mut subject.active, self.active);
        set(&mut subject.ministerial, self.ministerial);
    }
}

/// Record every rule the subject violates into `v`.
pub fn validate_subject(v: &mut Validator, subject: &Subject) {
    v.check(subject.id >= 0, "subject_id", "must not be negative");

    v.check(
        !subject.subject_name.trim().is_empty(),
        "subject_name",
        "must be provided",
    );
    v.check(
        subject.subject_name.len() <= MAX_NAME_BYTES,
        "subject_name",
        "must not be more than 500 bytes long",
    );
    v.check(
        subject.subject_name_english.len() <= MAX_NAME_BYTES,
        "subject_name_english",
        "must not be more than 500 bytes long",
    );

    v.check(!subject.stage.trim().is_empty(), "stage", "must be provided");
    v.check(
        !subject.semester.trim().is_empty(),
        "semester",
        "must be provided",
    );
    v.check(
        subject.department.len() <= MAX_DEPARTMENT_BYTES,
        "department",
        "must not be more than 200 bytes long",
    );

    let marks = [
        ("max_theory_mark", subject.max_theory_mark),
        ("max_lab_mark", subject.max_lab_mark),
        ("max_semester_mark", subject.max_semester_mark),
        ("max_final_exam", subject.max_final_exam),
    ];
    for (field, mark) in marks {
        v.check(
            (0..=MAX_MARK).contains(&mark),
            field,
            "must be between 0 and 100",
        );
    }

    v.check(
        (0..=MAX_CREDITS).contains(&subject.credits),
        "credits",
        "must be between 0 and 30",
    );

    v.check(
        permitted_value(subject.active.as_str(), &BOOLEAN_FLAGS),
        "active",
        "must be either true or false",
    );
    v.check(
        permitted_value(subject.ministerial.as_str(), &BOOLEAN_FLAGS),
        "ministerial",
        "must be either true or false",
    );
}

/// Rules for a subject that replaces a stored one. Unlike on create, a zero
/// `subject_id` is not a request for assignment, so it must be positive.
pub fn validate_subject_update(v: &mut Validator, subject: &Subject) {
    v.check(subject.id >= 1, "subject_id", "must be a positive integer");
    validate_subject(v, subject);
}
