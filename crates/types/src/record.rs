//! Incident report types.
//!
//! A [`Record`] is one published space-weather report as it exists on the
//! ledger. A [`ReportDraft`] is the unvalidated input a submitter fills in
//! before publication; it becomes a record once it has been validated,
//! sealed into a protected payload, and assigned an identifier and timestamp.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Identifiers
// ============================================================================

/// Globally unique identifier of a published report.
///
/// Identifiers are opaque strings. Freshly generated ones follow the
/// `<prefix>-<unix millis>-<suffix>` layout (see [`crate::id`]), but ids read
/// back from the index are accepted verbatim, whatever their shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wraps a raw identifier string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Severity
// ============================================================================

/// Report severity on a 1 (minor) to 5 (critical) scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Severity(u8);

impl Severity {
    /// Lowest accepted severity.
    pub const MIN: u8 = 1;
    /// Highest accepted severity.
    pub const MAX: u8 = 5;
    /// Severities at or above this level count as high severity.
    pub const HIGH_THRESHOLD: u8 = 4;

    /// Creates a severity, returning `None` when `value` is outside `1..=5`.
    pub const fn new(value: u8) -> Option<Self> {
        if value >= Self::MIN && value <= Self::MAX { Some(Self(value)) } else { None }
    }

    /// Returns the raw level.
    #[inline]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Returns true for severity 4 and 5.
    #[inline]
    pub const fn is_high(self) -> bool {
        self.0 >= Self::HIGH_THRESHOLD
    }
}

impl TryFrom<u8> for Severity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| {
            format!("severity {value} outside {}..={}", Self::MIN, Self::MAX)
        })
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> Self {
        severity.0
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Impact categories
// ============================================================================

/// Impact category vocabulary offered to submitters.
///
/// The vocabulary is open: stored records may carry any non-empty category
/// string, and nothing below the input layer rejects unknown values.
pub struct ImpactCategory;

impl ImpactCategory {
    /// Power grid disturbances.
    pub const POWER_GRID: &'static str = "Power Grid";
    /// Radio and communication outages.
    pub const COMMUNICATION: &'static str = "Communication";
    /// GNSS and navigation degradation.
    pub const NAVIGATION: &'static str = "Navigation";
    /// Satellite anomalies.
    pub const SATELLITE: &'static str = "Satellite";
    /// Anything else.
    pub const OTHER: &'static str = "Other";

    /// Categories suggested by input forms, in display order.
    pub const KNOWN: [&'static str; 5] =
        [Self::POWER_GRID, Self::COMMUNICATION, Self::NAVIGATION, Self::SATELLITE, Self::OTHER];

    /// Returns true if `category` is one of [`Self::KNOWN`].
    pub fn is_known(category: &str) -> bool {
        Self::KNOWN.contains(&category)
    }
}

// ============================================================================
// Drafts and records
// ============================================================================

/// Unvalidated report input.
///
/// `severity` is kept raw so that out-of-range input can be reported as a
/// validation failure rather than being unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReportDraft {
    /// Requested severity, expected in `1..=5`.
    pub severity: u8,
    /// Impact category, e.g. `"Power Grid"`.
    #[serde(rename = "impactType")]
    pub impact_category: String,
    /// Affected location.
    pub location: String,
    /// Free-text details. Only ever stored inside the protected payload.
    #[serde(default)]
    pub details: String,
}

impl ReportDraft {
    /// Creates a draft without details.
    pub fn new(
        severity: u8,
        impact_category: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            impact_category: impact_category.into(),
            location: location.into(),
            details: String::new(),
        }
    }

    /// Attaches free-text details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }
}

/// A published report as stored on, and read back from, the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Identifier under which the record is indexed.
    pub id: RecordId,
    /// Protected payload produced by the payload cipher. Never interpreted here.
    pub encoded_payload: String,
    /// Submission time in seconds since the Unix epoch, as set by the submitting client.
    pub timestamp: i64,
    /// Identity of the submitting account.
    pub submitter_id: String,
    /// Severity level.
    pub severity: Severity,
    /// Impact category, open vocabulary.
    pub impact_category: String,
    /// Affected location.
    pub location: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_bounds() {
        assert!(Severity::new(0).is_none());
        assert!(Severity::new(6).is_none());
        for level in 1..=5 {
            assert_eq!(Severity::new(level).map(Severity::value), Some(level));
        }
    }

    #[test]
    fn test_severity_is_high() {
        let high: Vec<u8> =
            (1..=5).filter_map(Severity::new).filter(|s| s.is_high()).map(u8::from).collect();
        assert_eq!(high, vec![4, 5]);
    }

    #[test]
    fn test_severity_serde_rejects_out_of_range() {
        let ok: Severity = serde_json::from_str("3").unwrap();
        assert_eq!(ok.value(), 3);
        assert!(serde_json::from_str::<Severity>("9").is_err());
    }

    #[test]
    fn test_record_id_display_is_raw() {
        let id = RecordId::new("sw-1700000000000-abc");
        assert_eq!(id.to_string(), "sw-1700000000000-abc");
        assert_eq!(id.as_str(), "sw-1700000000000-abc");
    }

    #[test]
    fn test_draft_serializes_with_wire_names() {
        let draft = ReportDraft::new(2, "Satellite", "Ontario").with_details("drag");
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["impactType"], "Satellite");
        assert_eq!(json["details"], "drag");
    }

    #[test]
    fn test_known_categories() {
        assert!(ImpactCategory::is_known("Power Grid"));
        assert!(!ImpactCategory::is_known("power grid"));
        assert_eq!(ImpactCategory::KNOWN.len(), 5);
    }
}
