//! Plain-text rendering of reports and statistics.

use std::fmt::Write as _;

use heliowatch_client::{Snapshot, Stats, abbreviate_identity};
use heliowatch_types::{ImpactCategory, Record};

/// One list line: date, severity, category, location, submitter, id.
pub fn record_line(record: &Record) -> String {
    let date = chrono::DateTime::from_timestamp(record.timestamp, 0)
        .map(|at| at.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| record.timestamp.to_string());
    format!(
        "{date}  sev {} {:<5}  {:<16} {:<20} {}  {}",
        record.severity,
        severity_bar(record.severity.value()),
        record.impact_category,
        record.location,
        abbreviate_identity(&record.submitter_id),
        record.id,
    )
}

fn severity_bar(level: u8) -> String {
    "#".repeat(usize::from(level))
}

/// The list body, or a placeholder when nothing matches.
pub fn record_list(records: &[Record]) -> String {
    if records.is_empty() {
        return "No space weather reports found\n".to_owned();
    }
    let mut out = String::new();
    for record in records {
        let _ = writeln!(out, "{}", record_line(record));
    }
    out
}

/// Notes about indexed ids that were skipped during synchronisation.
pub fn skipped_notes(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    if snapshot.skipped_count() > 0 {
        let count = snapshot.skipped_count();
        let _ = writeln!(out, "{count} indexed report(s) could not be loaded:");
        for skipped in snapshot.skipped() {
            let _ = writeln!(out, "  {}: {}", skipped.id, skipped.reason);
        }
    }
    out
}

/// The statistics panel.
pub fn stats_panel(stats: &Stats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Total reports:     {}", stats.total);
    let _ = writeln!(
        out,
        "High severity:     {} ({:.1}%)",
        stats.high_severity_count,
        stats.high_severity_share()
    );
    let _ = writeln!(
        out,
        "Power impacts:     {} ({:.1}%)",
        stats.power_impact_count,
        stats.share(stats.power_impact_count)
    );
    let _ = writeln!(
        out,
        "Comm impacts:      {} ({:.1}%)",
        stats.communication_impact_count,
        stats.share(stats.communication_impact_count)
    );

    let _ = writeln!(out, "By category:");
    for category in ImpactCategory::KNOWN {
        let count = stats.per_category.get(category).copied().unwrap_or(0);
        category_row(&mut out, stats, category, count);
    }
    for (category, count) in &stats.per_category {
        if !ImpactCategory::is_known(category) {
            category_row(&mut out, stats, category, *count);
        }
    }
    out
}

fn category_row(out: &mut String, stats: &Stats, category: &str, count: usize) {
    let share = stats.category_share(category);
    let _ = writeln!(out, "  {category:<16} {count:>4} ({share:.1}%)");
}
