//! Plain-text rendering for the terminal. JSON output is handled at the
//! call sites via serde.

use crosswalk_core::{FrameworkCode, FrameworkItem, ItemKey, MappingEdge};
use crosswalk_query::{CoverageReport, Translation};
use crosswalk_validator::ValidationReport;

pub fn print_report_text(report: &ValidationReport) {
    println!("validation run at {}", report.run_at.to_rfc3339());
    println!("snapshot {}", report.snapshot_fingerprint);
    let pairs: Vec<String> = report.checked_pairs.iter().map(|p| p.to_string()).collect();
    println!("pairs: {}", pairs.join(", "));
    println!(
        "checked {} items, {} edges",
        report.stats.items_checked, report.stats.edges_checked
    );
    if report.findings.is_empty() {
        println!("run succeeded, 0 findings");
        return;
    }
    println!(
        "{} errors, {} warnings, {} infos",
        report.stats.errors, report.stats.warnings, report.stats.infos
    );
    for finding in &report.findings {
        println!(
            "[{}] {} {}: {}",
            finding.severity, finding.kind, finding.subject, finding.message
        );
    }
}

pub fn print_translations_text(
    source: &ItemKey,
    target: FrameworkCode,
    translations: &[Translation],
) {
    if translations.is_empty() {
        println!("{source} has no active mapping into {target}");
        return;
    }
    println!("{source} in {target}:");
    for translation in translations {
        println!(
            "  {} \"{}\" ({}, {})",
            translation.item.key, translation.item.title, translation.kind, translation.confidence
        );
    }
}

pub fn print_coverage_text(report: &CoverageReport) {
    println!(
        "{} covers {}/{} of {} ({:.1}%)",
        report.company_id,
        report.covered,
        report.total,
        report.framework,
        report.percentage
    );
    for key in &report.covered_items {
        println!("  + {key}");
    }
    for key in &report.uncovered_items {
        println!("  - {key}");
    }
}

pub fn print_edges_text(edges: &[MappingEdge]) {
    if edges.is_empty() {
        println!("no edges");
        return;
    }
    for edge in edges {
        println!(
            "#{} {} -[{}/{}]-> {} ({})",
            edge.id, edge.source, edge.kind, edge.confidence, edge.target, edge.status
        );
    }
}

pub fn print_items_text(framework: FrameworkCode, items: &[FrameworkItem]) {
    if items.is_empty() {
        println!("no items registered for {framework}");
        return;
    }
    for item in items {
        let indent = if item.parent_id.is_some() { "  " } else { "" };
        let mut line = format!("{indent}{} \"{}\" [{}]", item.key, item.title, item.status);
        if let Some(successor) = &item.superseded_by {
            line.push_str(&format!(" -> {}:{successor}", item.key.framework));
        }
        println!("{line}");
    }
}
