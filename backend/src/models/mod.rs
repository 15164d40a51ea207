//! Domain records and their validation rules.

pub mod exempted;
pub mod privilege;
pub mod student;
pub mod subject;

pub use exempted::{validate_exempted, Exempted, NewExempted};
pub use privilege::{Privilege, ALL_STAGES};
pub use student::Student;
pub use subject::{
    validate_subject, validate_subject_update, AcademicYear, NewSubject, Subject, SubjectPatch,
    SubjectTable, CURRENT_SUBJECTS_TABLE,
};
