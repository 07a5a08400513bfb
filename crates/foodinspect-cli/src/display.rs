//! Vertical card display for extracted inspections and run reports.
//!
//! The summary is rendered from its one-row export batch, so the card shows
//! exactly the columns and values that would be written.

use arrow::array::{Array, AsArray};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use foodinspect_core::{ExtractedInspection, ViolationCategory, relations, violation_label};
use foodinspect_pipeline::RunReport;

const MAX_TEXT: usize = 72;

// ── Schema section groupings ──

const ESTABLISHMENT: &[&str] = &[
    "inspection_id",
    "establishment_name",
    "address",
    "telephone",
    "email",
    "establishment_type",
    "risk_category",
];

const VISIT: &[&str] = &[
    "inspection_date",
    "inspection_time_in",
    "inspection_time_out",
    "inspection_type",
];

const LICENSE: &[&str] = &[
    "license_holder",
    "license_number",
    "license_period_start",
    "license_period_end",
];

const INSPECTOR: &[&str] = &[
    "inspector_name",
    "inspector_badge_number",
    "inspector_comments",
    "known_valid",
];

// ── Public API ──

/// Print one extracted inspection as a card, followed by its violations.
pub fn print_inspection(record: &ExtractedInspection) -> anyhow::Result<()> {
    let summary = &record.summary;
    let batch = relations::summaries_to_batch(std::slice::from_ref(summary))?;

    println!("=== {} ===", summary.establishment_name);
    println!("{}", summary.address);
    println!();

    print_section(&batch, "Establishment", ESTABLISHMENT);
    print_section(&batch, "Visit", VISIT);
    print_section(&batch, "License", LICENSE);
    print_counts(&batch);
    print_section(&batch, "Inspector", INSPECTOR);

    println!("Violations ({})", summary.total_violations);
    for v in &record.violations {
        print!("  {:<6}", violation_label(v.violation_number));
        if let Some(description) = &v.violation_description {
            print!(" {description}");
        }
        if let Some(code) = &v.regulatory_code {
            print!("  [{code}]");
        }
        println!();
        if !v.violation_text.is_empty() {
            println!("         {}", shorten(&v.violation_text));
        }
    }
    Ok(())
}

pub fn print_run_report(report: &RunReport) {
    println!("Run");
    println!("  {:<26} {}", "candidates", report.candidates);
    println!("  {:<26} {}", "already_extracted", report.already_extracted);
    println!("  {:<26} {}", "skipped_dead", report.skipped_dead);
    println!("  {:<26} {}", "chunks", report.chunks);
    println!();
    println!("Retrieval");
    println!("  {:<26} {}", "live", report.live);
    println!("  {:<26} {}", "dead", report.dead);
    println!("  {:<26} {}", "cache_hits", report.cache_hits);
    println!("  {:<26} {}", "newly_cached", report.newly_cached);
    println!();
    println!("Exports");
    println!("  {:<26} {}", "extracted", report.extracted);
    println!("  {:<26} {}", "new_summary_rows", report.new_summary_rows);
    println!("  {:<26} {}", "new_detail_rows", report.new_detail_rows);
    println!("  {:<26} {}", "new_ledger_rows", report.new_ledger_rows);
    if !report.rejected.is_empty() {
        println!();
        println!("Rejected ({})", report.rejected_total());
        for (reason, count) in &report.rejected {
            println!("  {:<26} {}", reason, count);
        }
    }
}

// ── Section rendering ──

fn print_section(batch: &RecordBatch, header: &str, cols: &[&str]) {
    let present: Vec<(&str, String)> = cols
        .iter()
        .filter_map(|&col| Some((col, cell(batch, col)?)))
        .collect();
    if present.is_empty() {
        return;
    }

    println!("{header}");
    for (col, value) in present {
        println!("  {:<26} {}", col, value);
    }
    println!();
}

/// One line per category the report's layout carries; absent blocks are null.
fn print_counts(batch: &RecordBatch) {
    let rows: Vec<(ViolationCategory, String, String, String)> = ViolationCategory::ALL
        .into_iter()
        .filter_map(|category| {
            let prefix = category.column_prefix();
            Some((
                category,
                cell(batch, prefix)?,
                cell(batch, &format!("{prefix}_corrected_on_site"))?,
                cell(batch, &format!("{prefix}_repeated"))?,
            ))
        })
        .collect();
    if rows.is_empty() {
        return;
    }

    println!("Violation Counts");
    println!("  {:<26} {:>5} {:>5} {:>5}", "", "cited", "cos", "rpt");
    for (category, count, corrected, repeated) in rows {
        println!(
            "  {:<26} {:>5} {:>5} {:>5}",
            category.label(),
            count,
            corrected,
            repeated
        );
    }
    println!();
}

/// Display value of row 0 of `col`, or `None` when absent or null.
fn cell(batch: &RecordBatch, col: &str) -> Option<String> {
    let array = batch.column_by_name(col)?;
    if array.is_null(0) {
        return None;
    }
    match array.data_type() {
        DataType::Boolean => {
            let flag = array.as_boolean_opt()?.value(0);
            Some(if flag { "yes" } else { "no" }.to_string())
        }
        DataType::Utf8 => Some(shorten(array.as_string_opt::<i32>()?.value(0))),
        _ => {
            let options = FormatOptions::default();
            let formatter = ArrayFormatter::try_new(array.as_ref(), &options).ok()?;
            Some(formatter.value(0).to_string())
        }
    }
}

fn shorten(text: &str) -> String {
    if text.chars().count() > MAX_TEXT {
        let head: String = text.chars().take(MAX_TEXT - 3).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foodinspect_core::{InspectionId, InspectionSummary, ViolationCounts};

    fn summary() -> InspectionSummary {
        InspectionSummary {
            inspection_id: InspectionId::new(100).unwrap(),
            establishment_name: "BLUE HERON CAFE".into(),
            address: "1200 K ST NW WASHINGTON, DC 20005".into(),
            telephone: None,
            email: None,
            inspection_date: None,
            inspection_time_in: None,
            inspection_time_out: None,
            license_holder: "HERON HOSPITALITY LLC".into(),
            license_number: None,
            license_period_start: None,
            license_period_end: None,
            establishment_type: None,
            risk_category: 3,
            inspection_type: None,
            total_violations: 0,
            counts: ViolationCounts::default(),
            inspector_comments: String::new(),
            inspector_name: "Jane Smith".into(),
            inspector_badge_number: "1234".into(),
            known_valid: true,
        }
    }

    #[test]
    fn cells_render_by_type_and_skip_nulls() {
        let batch = relations::summaries_to_batch(&[summary()]).unwrap();
        assert_eq!(cell(&batch, "establishment_name").as_deref(), Some("BLUE HERON CAFE"));
        assert_eq!(cell(&batch, "risk_category").as_deref(), Some("3"));
        assert_eq!(cell(&batch, "known_valid").as_deref(), Some("yes"));
        assert_eq!(cell(&batch, "telephone"), None);
        assert_eq!(cell(&batch, "inspector_comments"), None);
        assert_eq!(cell(&batch, "no_such_column"), None);
    }

    #[test]
    fn long_text_is_shortened() {
        let long = "x".repeat(100);
        let short = shorten(&long);
        assert_eq!(short.chars().count(), MAX_TEXT);
        assert!(short.ends_with("..."));
        assert_eq!(shorten("short"), "short");
    }
}
