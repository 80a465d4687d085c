use super::{RenderInput, display_content};
use crate::classify::Subcategory;
use crate::summary::{format_number_short, format_size};
use std::fmt::Write;

/// Fence language for a file, by extension.
pub fn fence_language(relative_path: &str) -> &'static str {
    let ext = relative_path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "py" | "pyi" => "python",
        "rs" => "rust",
        "go" => "go",
        "js" | "mjs" | "cjs" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "sh" | "bash" | "zsh" => "bash",
        "ps1" => "powershell",
        "html" | "htm" => "html",
        "css" | "scss" | "sass" | "less" => "css",
        "json" | "ipynb" => "json",
        "yml" | "yaml" => "yaml",
        "toml" => "toml",
        "xml" => "xml",
        "sql" => "sql",
        "md" | "markdown" => "markdown",
        "csv" => "csv",
        _ => "plaintext",
    }
}

/// Backtick fence long enough that the content cannot close it early.
fn fence_for(content: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in content.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}

pub fn render(input: &RenderInput) -> String {
    let mut out = String::new();
    let meta = &input.metadata;
    let lite = input.mode.is_lite();

    let _ = writeln!(out, "# Repository Overview: `{}`\n", meta.name);
    if !lite {
        let _ = writeln!(out, "- **Generated**: {}", meta.generated_at_display());
        if let Some(url) = &meta.url {
            let _ = writeln!(out, "- **Repository**: [{}]({})", url, url);
        }
    }
    if let Some(branch) = &meta.branch {
        let _ = writeln!(out, "- **Branch**: `{}`", branch);
    }
    if let Some(subdir) = &meta.subdir {
        let _ = writeln!(out, "- **Subdir**: `{}`", subdir.trim_matches('/'));
    }

    let tree_fence = fence_for(&input.tree);
    let _ = writeln!(
        out,
        "\n## Folder Structure\n\n{}text\n{}\n{}",
        tree_fence, input.tree, tree_fence
    );

    if !lite {
        let summary = &input.summary;
        out.push_str("\n## Summary Report\n\n");
        let _ = writeln!(out, "- **Total Files**: {}", summary.total_files);
        let _ = writeln!(out, "- **Total Size**: {}", format_size(summary.total_size));
        let _ = writeln!(
            out,
            "- **Estimated Tokens**: {}",
            format_number_short(summary.estimated_tokens)
        );
        if !summary.file_type_breakdown.is_empty() {
            out.push_str("\n| Type | Files | Tokens |\n| --- | ---: | ---: |\n");
            for (subcategory, count) in &summary.file_type_breakdown {
                let tokens = summary.tokens_by_type.get(subcategory).copied().unwrap_or(0);
                let _ = writeln!(
                    out,
                    "| {} | {} | {} |",
                    subcategory,
                    count,
                    format_number_short(tokens)
                );
            }
        }
    }

    out.push_str("\n## Extracted Files\n");
    for file in &input.files {
        let content = display_content(&file.content);
        let fence = fence_for(content);
        let _ = writeln!(out, "\n### `{}`\n", file.relative_path);
        if !lite {
            let _ = write!(
                out,
                "_Type: {} | Size: {} | Tokens: {}",
                file.subcategory,
                format_size(file.size),
                format_number_short(file.tokens)
            );
            if let Some(url) = &file.url {
                let _ = write!(out, " | [source]({})", url);
            }
            out.push_str("_\n\n");
        }
        let _ = writeln!(
            out,
            "{}{}\n{}\n{}",
            fence,
            fence_language(&file.relative_path),
            content,
            fence
        );
    }

    if !lite && !input.assets.is_empty() {
        out.push_str("\n## Asset Files\n\n");
        for asset in &input.assets {
            let target = asset.url.as_deref().unwrap_or(&asset.relative_path);
            if asset.subcategory == Subcategory::Image {
                let _ = writeln!(out, "![{}]({})", asset.relative_path, target);
            } else {
                let _ = writeln!(
                    out,
                    "- [{}]({}) ({}, {})",
                    asset.relative_path,
                    target,
                    asset.subcategory,
                    format_size(asset.size)
                );
            }
        }
    }
    out
}
