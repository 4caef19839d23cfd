//! End-of-run summary printed to stdout

use crate::crawler::{CollectionOutcome, CollectionSummary};
use std::time::Duration;

/// Formats a duration as `1h 02m 03s`, `2m 03s` or `3.4s`
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

fn outcome_label(outcome: &CollectionOutcome) -> String {
    match outcome {
        CollectionOutcome::Completed => "completed".to_string(),
        CollectionOutcome::Interrupted => "interrupted (resumable)".to_string(),
        CollectionOutcome::PageLimit => "page limit reached (resumable)".to_string(),
        CollectionOutcome::SkipLimit => "stopped after repeated page failures".to_string(),
        CollectionOutcome::Failed(reason) => format!("FAILED: {}", reason),
    }
}

/// Prints one block per collection
///
/// Every skipped page is listed so it can be fetched again with `--pages`.
pub fn print_summary(summaries: &[CollectionSummary]) {
    println!("\n=== Crawl Summary ===");

    for summary in summaries {
        println!("\n{}:", summary.collection);
        println!("  Outcome: {}", outcome_label(&summary.outcome));
        println!("  Started at page: {}", summary.start_page);
        println!("  Pages completed: {}", summary.pages_completed);
        println!("  Records written: {}", summary.records_written);
        if summary.duplicates_skipped > 0 {
            println!("  Already recorded: {}", summary.duplicates_skipped);
        }
        println!(
            "  Items seen: {} ({} outside window, {} malformed)",
            summary.items_seen, summary.items_out_of_window, summary.items_malformed
        );
        if summary.degraded_sub_resources > 0 {
            println!(
                "  Sub-resource lists recorded empty after errors: {}",
                summary.degraded_sub_resources
            );
        }

        if summary.skipped_pages.is_empty() {
            println!("  Skipped pages: none");
        } else {
            let pages: Vec<String> = summary.skipped_pages.iter().map(u32::to_string).collect();
            println!(
                "  Skipped pages ({}): {}",
                summary.skipped_pages.len(),
                pages.join(", ")
            );
        }

        println!("  Elapsed: {}", format_duration(summary.elapsed));
    }

    let total_records: u64 = summaries.iter().map(|s| s.records_written).sum();
    let total_skipped: usize = summaries.iter().map(|s| s.skipped_pages.len()).sum();
    println!(
        "\nTotal: {} records written, {} pages skipped across {} collections",
        total_records,
        total_skipped,
        summaries.len()
    );
}
