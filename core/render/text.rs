use super::{RenderInput, display_content};
use crate::summary::{format_number_short, format_size};
use std::fmt::Write;

pub fn render(input: &RenderInput) -> String {
    if input.mode.is_lite() {
        render_lite(input)
    } else {
        render_rich(input)
    }
}

fn write_header_tail(out: &mut String, input: &RenderInput) {
    let meta = &input.metadata;
    if let Some(branch) = &meta.branch {
        let _ = writeln!(out, "Branch: {}", branch);
    }
    if let Some(subdir) = &meta.subdir {
        let _ = writeln!(out, "Subdir: {}", subdir.trim_matches('/'));
    }
    if !input.tree.is_empty() {
        out.push_str("=== Directory Tree ===\n");
        let _ = writeln!(out, "{}\n", input.tree);
    }
}

fn render_lite(input: &RenderInput) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Repo: {}", input.metadata.name);
    write_header_tail(&mut out, input);

    out.push_str("=== Textual Files ===\n");
    for file in &input.files {
        let _ = writeln!(out, "---> File: {} <---", file.relative_path);
        let _ = writeln!(out, "{}\n", display_content(&file.content));
    }
    out
}

fn render_rich(input: &RenderInput) -> String {
    let mut out = String::new();
    let meta = &input.metadata;
    out.push_str("=== Repodigest Report ===\n");
    let _ = writeln!(out, "Repo: {}", meta.name);
    if let Some(url) = &meta.url {
        let _ = writeln!(out, "URL: {}", url);
    }
    let _ = writeln!(out, "Generated: {}", meta.generated_at_display());
    write_header_tail(&mut out, input);

    let summary = &input.summary;
    out.push_str("=== Summary Report ===\n");
    let _ = writeln!(out, "Total Files: {}", summary.total_files);
    let _ = writeln!(out, "Total Size: {}", format_size(summary.total_size));
    let _ = writeln!(
        out,
        "Estimated Tokens: {}",
        format_number_short(summary.estimated_tokens)
    );
    for (subcategory, count) in &summary.file_type_breakdown {
        let tokens = summary.tokens_by_type.get(subcategory).copied().unwrap_or(0);
        let _ = writeln!(
            out,
            "  {}: {} files, {} tokens",
            subcategory,
            count,
            format_number_short(tokens)
        );
    }
    out.push('\n');

    out.push_str("=== Extracted Textual Files ===\n");
    for file in &input.files {
        let _ = writeln!(
            out,
            "\n\n---> FILE: {} | TYPE: {} | SIZE: {} | TOKENS: {} <---",
            file.relative_path,
            file.subcategory,
            format_size(file.size),
            format_number_short(file.tokens)
        );
        let _ = writeln!(out, "{}", display_content(&file.content));
    }

    if !input.assets.is_empty() {
        out.push_str("\n=== Non-Textual Assets ===\n");
        for asset in &input.assets {
            let _ = write!(
                out,
                "FILE: {} | TYPE: {} | SIZE: {}",
                asset.relative_path,
                asset.subcategory,
                format_size(asset.size)
            );
            if let Some(url) = &asset.url {
                let _ = write!(out, " | {}", url);
            }
            out.push('\n');
        }
    }
    out
}
