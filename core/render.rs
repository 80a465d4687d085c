//! Output renderers.
//!
//! Every format consumes the same [`RenderInput`], whose textual files are
//! already in their final order, so text, Markdown and JSON always agree.

pub mod bundle;
pub mod json;
pub mod markdown;
pub mod text;

use crate::classify::Subcategory;
use crate::error::{AppError, Result};
use crate::filter::slash_path;
use crate::scanner::{FileRecord, ScanResult};
use crate::source::build_blob_url;
use crate::summary::{Summary, estimate_tokens};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use bundle::ZipBundle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Txt,
    Json,
    Md,
    Zip,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Txt,
        OutputFormat::Json,
        OutputFormat::Md,
        OutputFormat::Zip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Txt => "txt",
            OutputFormat::Json => "json",
            OutputFormat::Md => "md",
            OutputFormat::Zip => "zip",
        }
    }

    /// Per-format folder inside a scan's output directory.
    pub fn subdir(&self) -> &'static str {
        match self {
            OutputFormat::Txt => "text",
            OutputFormat::Json => "json",
            OutputFormat::Md => "md",
            OutputFormat::Zip => "zips",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "txt" | "text" => Ok(OutputFormat::Txt),
            "json" => Ok(OutputFormat::Json),
            "md" | "markdown" => Ok(OutputFormat::Md),
            "zip" => Ok(OutputFormat::Zip),
            other => Err(AppError::InvalidArgument(format!(
                "Unknown output format '{}'. Expected one of: txt, json, md, zip",
                other
            ))),
        }
    }
}

/// Parses a comma-separated list such as `txt,json`. Duplicates are dropped,
/// first occurrence wins.
pub fn parse_formats(list: &str) -> Result<Vec<OutputFormat>> {
    let mut formats = Vec::new();
    for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let format: OutputFormat = part.parse()?;
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    if formats.is_empty() {
        return Err(AppError::InvalidArgument(
            "At least one output format is required".to_string(),
        ));
    }
    Ok(formats)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    #[default]
    Rich,
    /// Tree and raw file contents only.
    Lite,
}

impl RenderMode {
    pub fn is_lite(&self) -> bool {
        *self == RenderMode::Lite
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RenderMode::Rich => "rich",
            RenderMode::Lite => "lite",
        })
    }
}

impl FromStr for RenderMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "rich" => Ok(RenderMode::Rich),
            "lite" => Ok(RenderMode::Lite),
            other => Err(AppError::InvalidArgument(format!(
                "Unknown mode '{}'. Expected 'rich' or 'lite'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RepoMetadata {
    pub name: String,
    pub url: Option<String>,
    pub branch: Option<String>,
    pub subdir: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl RepoMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            branch: None,
            subdir: None,
            generated_at: Utc::now(),
        }
    }

    /// Browse URL for a file, when the repository is remote.
    pub fn file_url(&self, relative_path: &str) -> Option<String> {
        let url = self.url.as_deref()?;
        build_blob_url(url, self.branch.as_deref(), self.subdir.as_deref(), relative_path)
    }

    pub fn generated_at_display(&self) -> String {
        self.generated_at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextualEntry {
    pub relative_path: String,
    pub subcategory: Subcategory,
    pub size: u64,
    pub tokens: usize,
    pub content: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEntry {
    pub relative_path: String,
    pub subcategory: Subcategory,
    pub size: u64,
    pub url: Option<String>,
    pub source_path: PathBuf,
}

/// Everything a renderer needs, read and ordered once per scan.
#[derive(Debug, Clone)]
pub struct RenderInput {
    pub metadata: RepoMetadata,
    pub mode: RenderMode,
    pub tree: String,
    pub summary: Summary,
    pub files: Vec<TextualEntry>,
    pub assets: Vec<AssetEntry>,
}

impl RenderInput {
    pub fn prepare(
        scan: &ScanResult,
        summary: Summary,
        tree: String,
        metadata: RepoMetadata,
        mode: RenderMode,
    ) -> Self {
        let mut ordered: Vec<&FileRecord> = scan.accepted.iter().collect();
        ordered.sort_by_cached_key(|r| order_key(&r.relative_path, r.classification.subcategory));

        let files: Vec<TextualEntry> = ordered
            .par_iter()
            .filter_map(|record| {
                let bytes = match fs::read(&record.path) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        log::warn!("Skipping {} in output: {}", record.path.display(), e);
                        return None;
                    }
                };
                let content = String::from_utf8_lossy(&bytes).into_owned();
                let tokens = summary
                    .file_tokens
                    .get(&record.relative_path)
                    .copied()
                    .unwrap_or_else(|| estimate_tokens(&content));
                let relative_path = slash_path(&record.relative_path);
                Some(TextualEntry {
                    url: metadata.file_url(&relative_path),
                    relative_path,
                    subcategory: record.classification.subcategory,
                    size: bytes.len() as u64,
                    tokens,
                    content,
                })
            })
            .collect();

        let assets = scan
            .non_textual
            .iter()
            .map(|record| {
                let relative_path = slash_path(&record.relative_path);
                AssetEntry {
                    url: metadata.file_url(&relative_path),
                    relative_path,
                    subcategory: record.classification.subcategory,
                    size: record.size,
                    source_path: record.path.clone(),
                }
            })
            .collect();

        Self {
            metadata,
            mode,
            tree,
            summary,
            files,
            assets,
        }
    }
}

fn ordering_rank(relative_path: &Path, subcategory: Subcategory) -> u8 {
    let name = relative_path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let stem = name.split('.').next().unwrap_or_default();
    if name.starts_with("readme") {
        return 0;
    }
    if matches!(stem, "license" | "licence" | "notice" | "copying") {
        return 1;
    }
    if matches!(name.as_str(), ".gitignore" | ".dockerignore" | ".gitattributes") {
        return 2;
    }
    match subcategory {
        Subcategory::Config => 3,
        Subcategory::Docs => 4,
        Subcategory::Code => 5,
        Subcategory::Data | Subcategory::Csv => 6,
        _ => 7,
    }
}

/// Sort key shared by every renderer: README-like, license/notice, ignore
/// dotfiles, then config < docs < code < data, then path.
pub fn order_key(relative_path: &Path, subcategory: Subcategory) -> (u8, String) {
    (ordering_rank(relative_path, subcategory), slash_path(relative_path))
}

/// Closed set of output renderers.
#[derive(Debug, Clone)]
pub enum Renderer {
    Text,
    Markdown,
    Json,
    Zip(ZipBundle),
}

impl Renderer {
    pub fn for_format(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Txt => Renderer::Text,
            OutputFormat::Md => Renderer::Markdown,
            OutputFormat::Json => Renderer::Json,
            OutputFormat::Zip => Renderer::Zip(ZipBundle::default()),
        }
    }

    pub fn format(&self) -> OutputFormat {
        match self {
            Renderer::Text => OutputFormat::Txt,
            Renderer::Markdown => OutputFormat::Md,
            Renderer::Json => OutputFormat::Json,
            Renderer::Zip(_) => OutputFormat::Zip,
        }
    }

    /// Writes one output file into `out_dir` and returns its path.
    pub fn render(&self, input: &RenderInput, out_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(out_dir).map_err(|e| AppError::DirCreation {
            path: out_dir.to_path_buf(),
            source: e,
        })?;
        let path = match self {
            Renderer::Text => write_output(out_dir, input, "txt", text::render(input))?,
            Renderer::Markdown => write_output(out_dir, input, "md", markdown::render(input))?,
            Renderer::Json => write_output(out_dir, input, "json", json::render(input)?)?,
            Renderer::Zip(bundle) => bundle.render(input, out_dir)?,
        };
        log::info!("{} output written to {}", self.format(), path.display());
        Ok(path)
    }
}

fn write_output(out_dir: &Path, input: &RenderInput, ext: &str, content: String) -> Result<PathBuf> {
    let path = out_dir.join(format!("{}.{}", input.metadata.name, ext));
    fs::write(&path, content).map_err(|e| AppError::FileWrite {
        path: path.clone(),
        source: e,
    })?;
    Ok(path)
}

/// Content as embedded in reports: surrounding whitespace trimmed, with a
/// placeholder for empty files.
pub(crate) fn display_content(content: &str) -> &str {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        "[no content]"
    } else {
        trimmed
    }
}
