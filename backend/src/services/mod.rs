//! Service layer for workflows spanning several repository calls.

pub mod subject_import;

pub use subject_import::{import_subjects, parse_subjects_csv, ImportError, ImportReport};
