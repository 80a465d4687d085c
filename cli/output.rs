use colored::*;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets::UTF8_FULL};
use repodigest_core::summary::{format_number_short, format_size};
use repodigest_core::{Classification, Label, ScanReport, ScanResult, SkippedFile};
use std::path::Path;

pub fn print_scan_report(report: &ScanReport, quiet: bool) {
    for (format, message) in &report.build.failures {
        eprintln!("{} {} output failed: {}", "✗".red(), format, message);
    }
    if quiet {
        return;
    }

    let summary = &report.summary;
    println!();
    println!("{}", " Scan Summary ".green().bold().underline());
    println!(
        "{:<20} {}",
        "Scan ID:".green(),
        report.build.scan_id.cyan()
    );
    println!(
        "{:<20} {}",
        "Textual Files:".green(),
        report.scan.accepted.len().to_string().cyan()
    );
    println!(
        "{:<20} {}",
        "Non-Textual Files:".green(),
        report.scan.non_textual.len().to_string().cyan()
    );
    println!(
        "{:<20} {}",
        "Skipped Files:".green(),
        report.scan.skipped.len().to_string().cyan()
    );
    println!(
        "{:<20} {}",
        "Total Size:".green(),
        format_size(summary.total_size).cyan()
    );
    println!(
        "{:<20} {}",
        "Est. Tokens:".green(),
        format_number_short(summary.estimated_tokens).cyan()
    );

    if !summary.file_type_breakdown.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Type").fg(Color::Green),
            Cell::new("Files").fg(Color::Green),
            Cell::new("Tokens").fg(Color::Green),
        ]);
        for (subcategory, count) in &summary.file_type_breakdown {
            let tokens = summary.tokens_by_type.get(subcategory).copied().unwrap_or(0);
            table.add_row(vec![
                Cell::new(subcategory).fg(Color::Cyan),
                Cell::new(count).set_alignment(CellAlignment::Right),
                Cell::new(format_number_short(tokens)).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("\n{table}");
    }

    println!("\n{}", " Outputs ".green().bold().underline());
    for (format, path) in &report.build.outputs {
        println!(
            "{} {:<5} {}",
            "✅".green(),
            format.to_string(),
            path.display().to_string().blue()
        );
    }
    println!();
}

pub fn print_no_valid_files(scan: &ScanResult, quiet: bool) {
    if quiet {
        return;
    }
    println!(
        "{} No valid textual files found under {} ({} non-textual, {} skipped). Nothing was written.",
        "⚠".yellow(),
        scan.root.display(),
        scan.non_textual.len(),
        scan.skipped.len()
    );
}

pub fn print_skipped_table(skipped: &[SkippedFile]) {
    if skipped.is_empty() {
        println!("\n{}", "(No files were skipped)".yellow());
        return;
    }
    println!("\n{}", " Skipped Files ".yellow().bold().underline());
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Path").fg(Color::Green),
        Cell::new("Reason").fg(Color::Green),
    ]);
    for file in skipped {
        table.add_row(vec![
            Cell::new(file.relative_path.display()).fg(Color::Cyan),
            Cell::new(&file.reason).fg(Color::DarkGrey),
        ]);
    }
    println!("{table}");
}

pub fn print_classification(path: &Path, classification: &Classification) {
    let label = match classification.label {
        Label::Textual => classification.label.as_str().green(),
        Label::NonTextual => classification.label.as_str().yellow(),
    };
    println!(
        "{}  {} ({})",
        path.display().to_string().cyan(),
        label,
        classification.subcategory
    );
}
