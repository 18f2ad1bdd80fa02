//! Schema-based triage validator.
//!
//! The text-generation collaborator returns free-form JSON. Before a
//! classification may become a `triage-assigned` event it passes two
//! phases:
//!
//! 1. **Structural**: the payload is validated against a JSON Schema whose
//!    enumerations are generated from `Priority` and `Category`, so the
//!    schema can never drift from the types.
//! 2. **Typed**: the payload is deserialized into `TriageClassification`
//!    and its reason is checked for content.
//!
//! All failures are collected before returning so operators see the full
//! set in one pass. Semantic correctness of the classification is not
//! judged here.

use serde_json::{json, Value};
use tracing::{debug, warn};

use casetrail_contracts::{
    error::{CaseError, CaseResult},
    report::{Category, Priority, TriageClassification},
};

/// Upper bound on the stored reason, in characters.
pub const MAX_REASON_CHARS: usize = 2_000;

/// Validates raw triage JSON against the portal's closed vocabularies.
pub struct TriageValidator {
    validator: jsonschema::Validator,
}

impl TriageValidator {
    /// Compile the classification schema.
    ///
    /// Returns `ConfigError` only if the generated schema fails to compile.
    pub fn new() -> CaseResult<Self> {
        let schema = Self::schema();
        let validator = jsonschema::validator_for(&schema).map_err(|e| CaseError::ConfigError {
            reason: format!("invalid triage schema: {e}"),
        })?;
        Ok(Self { validator })
    }

    /// The JSON Schema a classification must satisfy.
    pub fn schema() -> Value {
        let priorities: Vec<&str> = [Priority::Low, Priority::Medium, Priority::High, Priority::Critical]
            .iter()
            .map(Priority::as_str)
            .collect();
        let categories: Vec<&str> = Category::ALL.iter().map(Category::as_str).collect();

        json!({
            "type": "object",
            "required": ["priority", "reason", "category"],
            "properties": {
                "priority": { "type": "string", "enum": priorities },
                "reason": { "type": "string", "minLength": 1, "maxLength": MAX_REASON_CHARS },
                "category": { "type": "string", "enum": categories },
            },
        })
    }

    /// Validate `raw` and return the typed classification.
    ///
    /// Fails with `InvalidTriage` listing every violation.
    pub fn validate(&self, raw: &Value) -> CaseResult<TriageClassification> {
        let mut failures: Vec<String> = self
            .validator
            .iter_errors(raw)
            .map(|error| format!("at '{}': {}", error.instance_path, error))
            .collect();

        if failures.is_empty() {
            if let Some(reason) = raw.get("reason").and_then(Value::as_str) {
                if reason.trim().is_empty() {
                    failures.push("at '/reason': reason is blank".to_string());
                }
            }
        }

        if !failures.is_empty() {
            let reason = failures.join("; ");
            warn!(failure_count = failures.len(), %reason, "triage classification rejected");
            return Err(CaseError::InvalidTriage { reason });
        }

        let classification: TriageClassification =
            serde_json::from_value(raw.clone()).map_err(|e| CaseError::InvalidTriage {
                reason: e.to_string(),
            })?;

        debug!(
            priority = %classification.priority,
            category = %classification.category,
            "triage classification admitted"
        );
        Ok(classification)
    }
}
