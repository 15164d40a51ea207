use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::Student;

/// Read access to students, owned by another part of the system.
#[async_trait]
pub trait StudentRepository: Send + Sync {
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If the student doesn't exist
    async fn get_student(&self, id: i64) -> RepositoryResult<Student>;
}
