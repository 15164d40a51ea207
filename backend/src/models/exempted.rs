//! Subject exemptions granted to students.

use serde::{Deserialize, Serialize};

use crate::validator::Validator;

/// A student excused from a subject's requirements.
///
/// `student_name` and `subject_name` are display copies taken when the
/// record is read or created; they do not track later renames.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exempted {
    pub id: i64,
    pub student_id: i64,
    pub subject_id: i64,
    pub student_name: String,
    pub subject_name: String,
}

impl Exempted {
    pub fn new(student_id: i64, subject_id: i64) -> Self {
        Self {
            student_id,
            subject_id,
            ..Default::default()
        }
    }
}

/// Request body for creating an exemption.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NewExempted {
    pub student_id: i64,
    pub subject_id: i64,
}

pub fn validate_exempted(v: &mut Validator, exempted: &Exempted) {
    v.check(
        exempted.student_id > 0,
        "student_id",
        "must be a positive integer",
    );
    v.check(
        exempted.subject_id > 0,
        "subject_id",
        "must be a positive integer",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_exempted() {
        let mut v = Validator::new();
        validate_exempted(&mut v, &Exempted::new(4, 9));
        assert!(v.valid());
    }

    #[test]
    fn test_non_positive_ids_are_reported_together() {
        let mut v = Validator::new();
        validate_exempted(&mut v, &Exempted::new(0, -2));
        assert_eq!(v.errors().len(), 2);
        assert_eq!(v.errors()["student_id"], "must be a positive integer");
        assert_eq!(v.errors()["subject_id"], "must be a positive integer");
    }

    #[test]
    fn test_missing_fields_decode_to_zero() {
        let input: NewExempted = serde_json::from_str(r#"{"student_id": 3}"#).unwrap();
        assert_eq!(input.student_id, 3);
        assert_eq!(input.subject_id, 0);
    }
}
