//! Draft validation.
//!
//! Runs before any ledger I/O. A draft is publishable when its severity lies
//! in `1..=5` and both its impact category and location contain something
//! other than whitespace. Categories are not checked against
//! [`ImpactCategory::KNOWN`](crate::record::ImpactCategory::KNOWN).

use std::fmt;

use crate::record::{ReportDraft, Severity};

/// Validation error with structured context.
///
/// Contains the specific constraint that was violated and the field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field that failed validation.
    pub field: String,
    /// Description of the violated constraint.
    pub constraint: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.constraint)
    }
}

impl std::error::Error for ValidationError {}

/// Validates a draft and returns its severity.
///
/// # Errors
///
/// Returns [`ValidationError`] for the first failing field, checked in the
/// order `impactType`, `location`, `severity`.
pub fn validate_draft(draft: &ReportDraft) -> Result<Severity, ValidationError> {
    require_text("impactType", &draft.impact_category)?;
    require_text("location", &draft.location)?;
    Severity::new(draft.severity).ok_or_else(|| ValidationError {
        field: "severity".to_string(),
        constraint: format!(
            "{} is outside {}..={}",
            draft.severity,
            Severity::MIN,
            Severity::MAX
        ),
    })
}

fn require_text(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError {
            field: field.to_string(),
            constraint: "must not be empty".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_draft_returns_severity() {
        let severity = validate_draft(&ReportDraft::new(4, "Power Grid", "Texas")).unwrap();
        assert_eq!(severity.value(), 4);
    }

    #[test]
    fn test_unknown_category_is_accepted() {
        assert!(validate_draft(&ReportDraft::new(1, "Aurora sighting", "Tromsø")).is_ok());
    }

    #[test]
    fn test_empty_category_rejected() {
        let err = validate_draft(&ReportDraft::new(3, "", "Texas")).unwrap_err();
        assert_eq!(err.field, "impactType");
        assert_eq!(err.to_string(), "impactType: must not be empty");
    }

    #[test]
    fn test_blank_location_rejected() {
        let err = validate_draft(&ReportDraft::new(3, "Other", "   ")).unwrap_err();
        assert_eq!(err.field, "location");
    }

    #[test]
    fn test_severity_out_of_range_rejected() {
        for severity in [0, 6, 255] {
            let err = validate_draft(&ReportDraft::new(severity, "Other", "Lima")).unwrap_err();
            assert_eq!(err.field, "severity");
        }
    }
}
