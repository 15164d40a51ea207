//! Exemption repository trait.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::Exempted;

/// Access to student exemptions.
///
/// Read operations fill `student_name`/`subject_name` from the students and
/// current subjects tables when those rows exist, and leave them empty
/// otherwise.
#[async_trait]
pub trait ExemptedRepository: Send + Sync {
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If the exemption doesn't exist
    async fn get_exempted(&self, id: i64) -> RepositoryResult<Exempted>;

    async fn list_exempteds(&self) -> RepositoryResult<Vec<Exempted>>;

    /// Look an exemption up by its (student, subject) pair.
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If the student is not exempted from the subject
    async fn find_exempted(&self, student_id: i64, subject_id: i64)
        -> RepositoryResult<Exempted>;

    /// Exemptions held by one student.
    async fn list_exempteds_for_student(&self, student_id: i64)
        -> RepositoryResult<Vec<Exempted>>;

    /// Students exempted from one subject.
    async fn list_exempteds_for_subject(&self, subject_id: i64)
        -> RepositoryResult<Vec<Exempted>>;

    /// Store an exemption and write the assigned ID back into `exempted`.
    ///
    /// A (student, subject) pair that is already exempted is rejected.
    async fn insert_exempted(&self, exempted: &mut Exempted) -> RepositoryResult<()>;

    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If the exemption doesn't exist
    async fn delete_exempted(&self, id: i64) -> RepositoryResult<()>;
}
