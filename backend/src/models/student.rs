use serde::{Deserialize, Serialize};

/// A student as seen by this service: enough to label exemptions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    #[serde(rename = "student_id")]
    pub id: i64,
    pub student_name: String,
    pub stage: String,
}
