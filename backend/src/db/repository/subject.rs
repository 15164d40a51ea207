//! Subject repository trait.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{Subject, SubjectTable};

/// CRUD access to subject tables.
///
/// Every operation names the [`SubjectTable`] it targets; year tables that
/// have never been written to read as empty.
#[async_trait]
pub trait SubjectRepository: Send + Sync {
    /// Check if the storage backend is reachable.
    ///
    /// # Returns
    /// - `Ok(true)` if connection is healthy
    /// - `Ok(false)` if connection is unhealthy but no error occurred
    /// - `Err(RepositoryError)` if an error occurred during the check
    async fn health_check(&self) -> RepositoryResult<bool>;

    /// Fetch a single subject.
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If no subject has this ID in `table`
    async fn get_subject(&self, table: &SubjectTable, id: i64) -> RepositoryResult<Subject>;

    /// List the subjects of a table ordered by ID, optionally restricted to one stage.
    async fn list_subjects(
        &self,
        table: &SubjectTable,
        stage: Option<&str>,
    ) -> RepositoryResult<Vec<Subject>>;

    /// Insert a subject.
    ///
    /// A zero `subject.id` asks the store to assign one; the assigned ID is
    /// written back into `subject`. A non-zero ID already present in the
    /// table is rejected.
    async fn insert_subject(&self, table: &SubjectTable, subject: &mut Subject)
        -> RepositoryResult<()>;

    /// Replace the subject stored under `id` with `subject` (whose own ID may differ).
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If no subject has this ID in `table`
    async fn update_subject(
        &self,
        table: &SubjectTable,
        id: i64,
        subject: &Subject,
    ) -> RepositoryResult<()>;

    /// Delete a subject.
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If no subject has this ID in `table`
    async fn delete_subject(&self, table: &SubjectTable, id: i64) -> RepositoryResult<()>;
}
