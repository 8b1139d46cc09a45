//! Filtering and statistics over a snapshot.
//!
//! Everything here is pure. Filters narrow the list view; [`Stats`] always
//! describe the whole snapshot regardless of the active filter.

use std::collections::BTreeMap;

use heliowatch_types::Record;

use crate::sync::Snapshot;

/// Which records the list view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tab {
    /// Every record.
    #[default]
    All,
    /// Only records submitted by the current identity.
    Mine,
}

/// List-view query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewQuery {
    /// Case-insensitive substring matched against location and impact category.
    pub search: String,
    /// Active tab.
    pub tab: Tab,
    /// Identity `Tab::Mine` compares submitters against.
    pub identity: String,
}

impl ViewQuery {
    /// Query showing everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Sets the search term.
    #[must_use]
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = term.into();
        self
    }

    /// Restricts the view to records submitted by `identity`.
    #[must_use]
    pub fn mine(mut self, identity: impl Into<String>) -> Self {
        self.tab = Tab::Mine;
        self.identity = identity.into();
        self
    }
}

/// Aggregate counts over a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Stats {
    /// Number of records.
    pub total: usize,
    /// Records with severity 4 or 5.
    pub high_severity_count: usize,
    /// Records whose category mentions `Power`.
    pub power_impact_count: usize,
    /// Records whose category mentions `Communication`.
    pub communication_impact_count: usize,
    /// Records per exact impact category.
    pub per_category: BTreeMap<String, usize>,
}

impl Stats {
    /// Returns `count` as a percentage of the total, or 0 for an empty snapshot.
    pub fn share(&self, count: usize) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        count as f64 * 100.0 / self.total as f64
    }

    /// Returns the percentage of records in `category`, or 0 if there are none.
    pub fn category_share(&self, category: &str) -> f64 {
        self.share(self.per_category.get(category).copied().unwrap_or(0))
    }

    /// Returns the percentage of high-severity records.
    pub fn high_severity_share(&self) -> f64 {
        self.share(self.high_severity_count)
    }
}

/// Stateless projections of a snapshot for display.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewProjector;

impl ViewProjector {
    /// Returns the records matching `query`, in snapshot order.
    pub fn filter<'a>(snapshot: &'a Snapshot, query: &ViewQuery) -> Vec<&'a Record> {
        let term = query.search.to_lowercase();
        let identity = query.identity.to_lowercase();
        snapshot
            .records()
            .iter()
            .filter(|record| {
                term.is_empty()
                    || record.location.to_lowercase().contains(&term)
                    || record.impact_category.to_lowercase().contains(&term)
            })
            .filter(|record| match query.tab {
                Tab::All => true,
                Tab::Mine => record.submitter_id.to_lowercase() == identity,
            })
            .collect()
    }

    /// Counts over every record in `snapshot`.
    pub fn aggregate(snapshot: &Snapshot) -> Stats {
        let mut stats = Stats { total: snapshot.len(), ..Stats::default() };
        for record in snapshot.records() {
            if record.severity.is_high() {
                stats.high_severity_count += 1;
            }
            if record.impact_category.contains("Power") {
                stats.power_impact_count += 1;
            }
            if record.impact_category.contains("Communication") {
                stats.communication_impact_count += 1;
            }
            *stats.per_category.entry(record.impact_category.clone()).or_default() += 1;
        }
        stats
    }
}

/// Shortens an account identity to `0x1234...abcd` for list display.
///
/// Identities of ten characters or fewer are returned unchanged.
pub fn abbreviate_identity(identity: &str) -> String {
    let chars: Vec<char> = identity.chars().collect();
    if chars.len() <= 10 {
        return identity.to_owned();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
