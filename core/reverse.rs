//! Rebuilds a source tree from a rendered digest.
//!
//! JSON reports round-trip exactly up to surrounding whitespace. Text and
//! Markdown reports are parsed back from their file headers; text reports
//! are lossy when a file itself contains a header-shaped line.

use crate::error::{AppError, Result};
use crate::render::OutputFormat;
use indexmap::IndexMap;
use serde::Deserialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const DEFAULT_REPO_NAME: &str = "reconstructed_repo";
const EMPTY_MARKER: &str = "[no content]";
const ASSETS_HEADER: &str = "=== Non-Textual Assets ===";
const FILES_SECTION: &str = "## Extracted Files";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFile {
    pub relative_path: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedReport {
    pub repo_name: Option<String>,
    pub files: Vec<ReportFile>,
}

impl ParsedReport {
    fn from_map(repo_name: Option<String>, files: IndexMap<String, String>) -> Self {
        Self {
            repo_name,
            files: files
                .into_iter()
                .map(|(relative_path, content)| ReportFile {
                    relative_path,
                    content,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonReport {
    #[serde(default)]
    metadata: Option<JsonReportMetadata>,
    files: Vec<JsonReportFile>,
}

#[derive(Debug, Deserialize)]
struct JsonReportMetadata {
    repo_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JsonReportFile {
    #[serde(alias = "path")]
    file: Option<String>,
    content: Option<String>,
}

/// Report format by file extension. Zip bundles carry no file contents.
pub fn report_format(path: &Path) -> Result<OutputFormat> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" => Ok(OutputFormat::Txt),
        "md" => Ok(OutputFormat::Md),
        "json" => Ok(OutputFormat::Json),
        _ => Err(AppError::InvalidArgument(format!(
            "Unsupported report '{}'. Use a .txt, .md or .json report",
            path.display()
        ))),
    }
}

pub fn parse_report(path: &Path) -> Result<ParsedReport> {
    let format = report_format(path)?;
    let content = fs::read_to_string(path).map_err(|e| AppError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    match format {
        OutputFormat::Json => parse_json_report(&content),
        OutputFormat::Md => Ok(parse_markdown_report(&content)),
        _ => Ok(parse_text_report(&content)),
    }
}

pub fn parse_json_report(content: &str) -> Result<ParsedReport> {
    let report: JsonReport = serde_json::from_str(content)
        .map_err(|e| AppError::Report(format!("Not a repodigest JSON report: {}", e)))?;
    let mut files = IndexMap::new();
    for entry in report.files {
        match (entry.file, entry.content) {
            (Some(path), Some(content)) if !path.is_empty() => {
                files.insert(path, content.trim().to_string());
            }
            (path, _) => log::debug!("Skipping incomplete JSON file entry {:?}", path),
        }
    }
    let repo_name = report.metadata.and_then(|m| m.repo_name);
    Ok(ParsedReport::from_map(repo_name, files))
}

fn finish_body(lines: &[&str]) -> String {
    let body = lines.join("\n");
    let body = body.trim();
    if body == EMPTY_MARKER {
        String::new()
    } else {
        body.to_string()
    }
}

fn text_header_path(line: &str) -> Option<String> {
    let inner = line.strip_prefix("---> ")?.strip_suffix(" <---")?;
    if let Some(rich) = inner.strip_prefix("FILE: ") {
        return rich.split(" | TYPE: ").next().map(str::to_string);
    }
    inner.strip_prefix("File: ").map(str::to_string)
}

pub fn parse_text_report(content: &str) -> ParsedReport {
    let repo_name = content
        .lines()
        .find_map(|line| line.strip_prefix("Repo: "))
        .map(str::to_string);

    let mut files = IndexMap::new();
    let mut current: Option<String> = None;
    let mut body: Vec<&str> = Vec::new();
    for line in content.lines() {
        let header = text_header_path(line);
        if header.is_some() || line == ASSETS_HEADER {
            if let Some(path) = current.take() {
                files.insert(path, finish_body(&body));
            }
            body.clear();
            current = header;
            continue;
        }
        if current.is_some() {
            body.push(line);
        }
    }
    if let Some(path) = current {
        files.insert(path, finish_body(&body));
    }
    ParsedReport::from_map(repo_name, files)
}

pub fn parse_markdown_report(content: &str) -> ParsedReport {
    let repo_name = content
        .lines()
        .find_map(|line| line.strip_prefix("# Repository Overview: `")?.strip_suffix('`'))
        .map(str::to_string);

    let mut files = IndexMap::new();
    let mut in_files = false;
    let mut current: Option<String> = None;
    let mut fence: Option<String> = None;
    let mut body: Vec<&str> = Vec::new();
    for line in content.lines() {
        if let Some(open) = &fence {
            if line.trim_end() == open.as_str() {
                if let Some(path) = current.take() {
                    files.insert(path, finish_body(&body));
                }
                body.clear();
                fence = None;
            } else if current.is_some() {
                body.push(line);
            }
            continue;
        }
        if line.starts_with("```") {
            let ticks = line.chars().take_while(|c| *c == '`').count();
            fence = Some("`".repeat(ticks));
            continue;
        }
        if line.starts_with("## ") {
            in_files = line.trim_end() == FILES_SECTION;
            current = None;
            continue;
        }
        if in_files {
            if let Some(path) = line.strip_prefix("### `").and_then(|l| l.strip_suffix('`')) {
                current = Some(path.to_string());
            }
        }
    }
    ParsedReport::from_map(repo_name, files)
}

/// Archive entry name for a report path, or `None` if it would escape the archive root.
fn safe_entry_name(relative_path: &str) -> Option<String> {
    if relative_path.starts_with('/') || relative_path.contains('\\') {
        return None;
    }
    let segments: Vec<&str> = relative_path.split('/').collect();
    if segments
        .iter()
        .any(|s| s.is_empty() || *s == "." || *s == "..")
    {
        return None;
    }
    Some(segments.join("/"))
}

fn archive_stem(repo_name: Option<&str>) -> String {
    match repo_name.map(str::trim) {
        Some(name) if !name.is_empty() && safe_entry_name(name).is_some_and(|n| !n.contains('/')) => {
            name.to_string()
        }
        _ => DEFAULT_REPO_NAME.to_string(),
    }
}

/// Parses `report` and writes the rebuilt files to
/// `<output_dir>/<repo>_reconstructed.zip`, returning the archive path.
pub fn reconstruct(report: &Path, output_dir: &Path) -> Result<PathBuf> {
    let parsed = parse_report(report)?;
    if parsed.files.is_empty() {
        return Err(AppError::Report(format!(
            "No files found in report '{}'",
            report.display()
        )));
    }

    fs::create_dir_all(output_dir).map_err(|e| AppError::DirCreation {
        path: output_dir.to_path_buf(),
        source: e,
    })?;
    let zip_path = output_dir.join(format!(
        "{}_reconstructed.zip",
        archive_stem(parsed.repo_name.as_deref())
    ));
    match write_archive(&zip_path, &parsed) {
        Ok(written) => {
            log::info!(
                "Reconstructed {} files from {} into {}",
                written,
                report.display(),
                zip_path.display()
            );
            Ok(zip_path)
        }
        Err(e) => {
            let _ = fs::remove_file(&zip_path);
            Err(e)
        }
    }
}

fn write_archive(zip_path: &Path, parsed: &ParsedReport) -> Result<usize> {
    let file = File::create(zip_path).map_err(|e| AppError::FileWrite {
        path: zip_path.to_path_buf(),
        source: e,
    })?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut written = 0;
    for entry in &parsed.files {
        let Some(name) = safe_entry_name(&entry.relative_path) else {
            log::warn!("Refusing unsafe path in report: {}", entry.relative_path);
            continue;
        };
        zip.start_file(name, options)?;
        zip.write_all(entry.content.as_bytes())?;
        if !entry.content.is_empty() {
            zip.write_all(b"\n")?;
        }
        written += 1;
    }
    zip.finish()?;
    Ok(written)
}
