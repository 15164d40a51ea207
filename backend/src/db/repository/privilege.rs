use async_trait::async_trait;

use super::error::RepositoryResult;

/// Authorization lookups against the privileges table.
#[async_trait]
pub trait PrivilegeRepository: Send + Sync {
    /// Whether `user_id` may write `resource` (a table name such as
    /// `subjects_2024`) for records of `stage`.
    async fn check_write_access(
        &self,
        user_id: i64,
        resource: &str,
        stage: &str,
    ) -> RepositoryResult<bool>;
}
