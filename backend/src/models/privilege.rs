use serde::{Deserialize, Serialize};

/// Stage value granting access to every stage of a resource.
pub const ALL_STAGES: &str = "*";

/// A user's access grant on a resource (table) for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Privilege {
    pub user_id: i64,
    pub resource: String,
    pub stage: String,
    pub can_write: bool,
}

impl Privilege {
    /// Whether this grant allows writing `resource` at `stage`.
    pub fn allows_write(&self, user_id: i64, resource: &str, stage: &str) -> bool {
        self.can_write
            && self.user_id == user_id
            && self.resource == resource
            && (self.stage == ALL_STAGES || self.stage == stage)
    }
}
