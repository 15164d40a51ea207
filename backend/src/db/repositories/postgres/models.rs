use diesel::prelude::*;
use diesel::sql_types::{BigInt, Bool, Integer, Nullable, Text};

use super::schema::{exempteds, students};
use crate::models::{Exempted, Student, Subject};

/// Row of any subject table, loaded with `sql_query`.
#[derive(Debug, Clone, QueryableByName)]
pub struct SubjectRow {
    #[diesel(sql_type = BigInt)]
    pub subject_id: i64,
    #[diesel(sql_type = Text)]
    pub subject_name: String,
    #[diesel(sql_type = Text)]
    pub subject_name_english: String,
    #[diesel(sql_type = Text)]
    pub stage: String,
    #[diesel(sql_type = Text)]
    pub semester: String,
    #[diesel(sql_type = Text)]
    pub department: String,
    #[diesel(sql_type = Integer)]
    pub max_theory_mark: i32,
    #[diesel(sql_type = Integer)]
    pub max_lab_mark: i32,
    #[diesel(sql_type = Integer)]
    pub max_semester_mark: i32,
    #[diesel(sql_type = Integer)]
    pub max_final_exam: i32,
    #[diesel(sql_type = Integer)]
    pub credits: i32,
    #[diesel(sql_type = Text)]
    pub active: String,
    #[diesel(sql_type = Text)]
    pub ministerial: String,
}

impl From<SubjectRow> for Subject {
    fn from(row: SubjectRow) -> Self {
        Self {
            id: row.subject_id,
            subject_name: row.subject_name,
            subject_name_english: row.subject_name_english,
            stage: row.stage,
            semester: row.semester,
            department: row.department,
            max_theory_mark: row.max_theory_mark,
            max_lab_mark: row.max_lab_mark,
            max_semester_mark: row.max_semester_mark,
            max_final_exam: row.max_final_exam,
            credits: row.credits,
            active: row.active,
            ministerial: row.ministerial,
        }
    }
}

#[derive(Debug, Clone, QueryableByName)]
pub struct InsertedIdRow {
    #[diesel(sql_type = BigInt)]
    pub subject_id: i64,
}

#[derive(Debug, Clone, QueryableByName)]
pub struct TableExistsRow {
    #[diesel(sql_type = Bool)]
    pub present: bool,
}

/// Exemption joined with its display names.
#[derive(Debug, Clone, QueryableByName)]
pub struct ExemptedRow {
    #[diesel(sql_type = BigInt)]
    pub exempted_id: i64,
    #[diesel(sql_type = BigInt)]
    pub student_id: i64,
    #[diesel(sql_type = BigInt)]
    pub subject_id: i64,
    #[diesel(sql_type = Nullable<Text>)]
    pub student_name: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub subject_name: Option<String>,
}

impl From<ExemptedRow> for Exempted {
    fn from(row: ExemptedRow) -> Self {
        Self {
            id: row.exempted_id,
            student_id: row.student_id,
            subject_id: row.subject_id,
            student_name: row.student_name.unwrap_or_default(),
            subject_name: row.subject_name.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = exempteds)]
pub struct NewExemptedRow {
    pub student_id: i64,
    pub subject_id: i64,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = students)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StudentRow {
    pub student_id: i64,
    pub student_name: String,
    pub stage: String,
}

impl From<StudentRow> for Student {
    fn from(row: StudentRow) -> Self {
        Self {
            id: row.student_id,
            student_name: row.student_name,
            stage: row.stage,
        }
    }
}
