//! Data Transfer Objects for the HTTP API.
//!
//! Successful responses wrap their payload in a single-key object named
//! after the resource, e.g. `{"subject": {...}}`.

use serde::{Deserialize, Serialize};

use crate::models::{Exempted, Subject};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the service
    pub status: String,
    /// Version of the API
    pub version: String,
    /// Database connection status
    pub database: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectEnvelope {
    pub subject: Subject,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectsEnvelope {
    pub subjects: Vec<Subject>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExemptedEnvelope {
    pub exempted: Exempted,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExemptedsEnvelope {
    pub exempteds: Vec<Exempted>,
}

/// Exemptions held by one student.
#[derive(Debug, Clone, Serialize)]
pub struct SubjectsExemptedsEnvelope {
    pub subjects_exempteds: Vec<Exempted>,
}

/// Students exempted from one subject.
#[derive(Debug, Clone, Serialize)]
pub struct StudentsExemptedsEnvelope {
    pub students_exempteds: Vec<Exempted>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageEnvelope {
    pub message: String,
}

impl MessageEnvelope {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Query parameters for listing subjects.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StageQuery {
    /// Only return subjects of this stage; empty means all stages
    #[serde(default)]
    pub stage: Option<String>,
}

impl StageQuery {
    pub fn filter(&self) -> Option<&str> {
        self.stage
            .as_deref()
            .map(str::trim)
            .filter(|stage| !stage.is_empty())
    }
}
