//! # casetrail-triage
//!
//! Structural validation for triage classifications.
//!
//! [`validator::TriageValidator`] checks the text-generation collaborator's
//! JSON against the portal's closed priority and category vocabularies
//! before the classification is admitted to a chain.
//!
//! ```rust,ignore
//! use casetrail_triage::TriageValidator;
//!
//! let validator = TriageValidator::new()?;
//! let classification = validator.validate(&raw_json)?;
//! ```

pub mod validator;

pub use validator::TriageValidator;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use casetrail_contracts::{
        error::CaseError,
        report::{Category, Priority},
    };

    use super::{validator::MAX_REASON_CHARS, TriageValidator};

    fn rejection(raw: serde_json::Value) -> String {
        match TriageValidator::new().unwrap().validate(&raw) {
            Err(CaseError::InvalidTriage { reason }) => reason,
            other => panic!("expected InvalidTriage, got {:?}", other),
        }
    }

    #[test]
    fn test_well_formed_classification_is_admitted() {
        let validator = TriageValidator::new().unwrap();
        let classification = validator
            .validate(&json!({
                "priority": "CRITICAL",
                "reason": "threats of dismissal after complaint",
                "category": "Retaliation"
            }))
            .unwrap();
        assert_eq!(classification.priority, Priority::Critical);
        assert_eq!(classification.category, Category::Retaliation);
    }

    #[test]
    fn test_every_enumerated_category_is_accepted() {
        let validator = TriageValidator::new().unwrap();
        for category in Category::ALL {
            let raw = json!({ "priority": "LOW", "reason": "r", "category": category.as_str() });
            assert_eq!(validator.validate(&raw).unwrap().category, category);
        }
    }

    #[test]
    fn test_values_outside_the_enumerations_are_rejected() {
        let reason = rejection(json!({
            "priority": "URGENT",
            "reason": "r",
            "category": "Bullying"
        }));
        assert!(reason.contains("priority"), "got: {reason}");
        assert!(reason.contains("category"), "got: {reason}");
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let reason = rejection(json!({ "priority": "LOW" }));
        assert!(reason.contains("reason"), "got: {reason}");
        assert!(reason.contains("category"), "got: {reason}");
    }

    #[test]
    fn test_non_object_payloads_are_rejected() {
        rejection(json!("HIGH"));
        rejection(json!(null));
    }

    #[test]
    fn test_blank_or_oversized_reasons_are_rejected() {
        let reason = rejection(json!({ "priority": "LOW", "reason": "   ", "category": "Power Abuse" }));
        assert!(reason.contains("blank"), "got: {reason}");

        rejection(json!({
            "priority": "LOW",
            "reason": "x".repeat(MAX_REASON_CHARS + 1),
            "category": "Power Abuse"
        }));
    }

    #[test]
    fn test_schema_enumerations_track_the_types() {
        let schema = TriageValidator::schema();
        let categories = schema["properties"]["category"]["enum"].as_array().unwrap();
        assert_eq!(categories.len(), Category::ALL.len());
        assert!(categories.contains(&json!("Sexual Harassment")));
    }
}
