//! 📊 report.rs — the post-cycle scoreboard, suitable for framing.
//!
//! 🎨 Every ingestion cycle ends with a scorecard, and raw struct Debug
//! output is a war crime in a terminal. This module turns a [`CycleSummary`]
//! into a comfy-table so tidy it has lumbar support: counts on the right,
//! labels on the left, no borders, no mercy.
//!
//! ⚠️ Reading the table will not make the next cycle arrive faster.
//! We've tried. Science says no.
//!
//! 🦆 The duck reads the rejected-records row first. Every time. Pessimist.

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};

use crate::common::{CycleOutcome, CycleSummary};

/// 🔢 Commas for the 3 people in the audience who like readability.
/// "1000000 records" → "1,000,000 records" — you're welcome, eyes.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// 🎨 Render one cycle's scorecard as a two-column table.
///
/// Layout (labels left, numbers right-aligned, preset: NOTHING because the
/// borders looked bad and we're minimalists now):
/// ```text
///      window   2025-06-01 11:00 → 12:00 UTC
///        seen   412
///    accepted   409
///    rejected   3
///     created   128
///     updated   281
///    attempts   2
///     outcome   ✅ succeeded
/// ```
pub fn render_cycle_table(summary: &CycleSummary) -> String {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let window = format!(
        "{} → {} UTC",
        summary.window.start.format("%Y-%m-%d %H:%M:%S"),
        summary.window.end.format("%Y-%m-%d %H:%M:%S")
    );
    let outcome = match &summary.outcome {
        CycleOutcome::Succeeded => "✅ succeeded".to_string(),
        CycleOutcome::Failed { reason } => format!("💀 failed: {reason}"),
    };

    let rows: Vec<(&str, String)> = vec![
        ("window", window),
        ("seen", format_number(summary.records_seen)),
        ("accepted", format_number(summary.records_accepted)),
        ("rejected", format_number(summary.records_rejected)),
        ("created", format_number(summary.records_created)),
        ("updated", format_number(summary.records_updated)),
        ("attempts", format_number(u64::from(summary.attempts))),
        ("outcome", outcome),
    ];
    for (label, value) in rows {
        table.add_row(vec![
            Cell::new(label).set_alignment(CellAlignment::Right),
            Cell::new(value).set_alignment(CellAlignment::Left),
        ]);
    }
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FetchWindow;
    use chrono::{TimeZone, Utc};

    #[test]
    fn the_one_where_big_numbers_get_their_commas() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn the_one_where_the_scoreboard_tells_the_whole_story() {
        let summary = CycleSummary {
            window: FetchWindow {
                start: Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
                min_magnitude: 2.5,
            },
            records_seen: 1_412,
            records_accepted: 1_409,
            records_rejected: 3,
            records_created: 128,
            records_updated: 1_281,
            attempts: 2,
            outcome: CycleOutcome::Succeeded,
        };
        let rendered = render_cycle_table(&summary);
        assert!(rendered.contains("1,412"), "seen count missing its commas: {rendered}");
        assert!(rendered.contains("1,281"));
        assert!(rendered.contains("succeeded"));
        assert!(rendered.contains("2025-06-01 11:00:00"));
    }

    #[test]
    fn the_one_where_failure_makes_the_front_page() {
        let summary = CycleSummary {
            window: FetchWindow {
                start: Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
                min_magnitude: 2.5,
            },
            records_seen: 0,
            records_accepted: 0,
            records_rejected: 0,
            records_created: 0,
            records_updated: 0,
            attempts: 4,
            outcome: CycleOutcome::Failed { reason: "catalog timed out after 30s".to_string() },
        };
        let rendered = render_cycle_table(&summary);
        assert!(rendered.contains("failed: catalog timed out"));
    }
}
