//! Repository trait definitions for database operations.
//!
//! Each entity gets a focused trait so handlers and tests can depend on
//! exactly what they use.
//!
//! - [`error`]: Error types for repository operations
//! - [`subject`]: Subjects in the current and year-partitioned tables
//! - [`exempted`]: Student/subject exemptions
//! - [`student`]: Read access to students
//! - [`privilege`]: Write-access checks
//!
//! For code that needs every capability (the HTTP state, the factory), use
//! the [`FullRepository`] bound.

pub mod error;
pub mod exempted;
pub mod privilege;
pub mod student;
pub mod subject;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};

pub use exempted::ExemptedRepository;
pub use privilege::PrivilegeRepository;
pub use student::StudentRepository;
pub use subject::SubjectRepository;

/// Composite trait bound for a complete repository implementation.
pub trait FullRepository:
    SubjectRepository + ExemptedRepository + StudentRepository + PrivilegeRepository
{
}

// Blanket implementation: any type implementing all four traits automatically implements FullRepository
impl<T> FullRepository for T where
    T: SubjectRepository + ExemptedRepository + StudentRepository + PrivilegeRepository
{
}
