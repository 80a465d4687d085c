//! One scan end to end: filter setup, walk, summary, tree, render.

use crate::builtins;
use crate::classify::Classifier;
use crate::config::{Config, DEFAULT_IGNORE_FILE};
use crate::error::{AppError, Result};
use crate::filter::{FilterChain, FilterConfig, parse_ignore_file};
use crate::output::{BuildReport, OutputBuilder};
use crate::render::{OutputFormat, RenderInput, RenderMode, RepoMetadata};
use crate::scanner::{CancellationToken, DEFAULT_CONCURRENCY, ScanResult, Scanner};
use crate::source::AcquiredSource;
use crate::summary::{Summary, summarize};
use crate::tree::build_tree;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct ScanRequest {
    /// Directory actually walked (repository root joined with any subdir).
    pub root: PathBuf,
    pub metadata: RepoMetadata,
    pub filter: FilterConfig,
    pub ignore_file_name: String,
    pub formats: Vec<OutputFormat>,
    pub mode: RenderMode,
    pub output_dir: PathBuf,
    pub scan_id: Option<String>,
    pub tree_depth: Option<usize>,
    pub tree_exclude_dirs: Vec<String>,
    pub concurrency: usize,
    pub follow_symlinks: bool,
}

impl ScanRequest {
    /// Defaults for everything except where to read from and write to.
    pub fn new(root: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "repository".to_string());
        Self {
            metadata: RepoMetadata::new(name),
            root,
            filter: FilterConfig {
                exclude_dirs: builtins::default_exclude_dirs(),
                use_ignore_file: true,
                ..Default::default()
            },
            ignore_file_name: DEFAULT_IGNORE_FILE.to_string(),
            formats: vec![OutputFormat::Txt],
            mode: RenderMode::default(),
            output_dir: output_dir.into(),
            scan_id: None,
            tree_depth: None,
            tree_exclude_dirs: builtins::default_tree_exclude_dirs(),
            concurrency: DEFAULT_CONCURRENCY,
            follow_symlinks: false,
        }
    }

    pub fn from_config(config: &Config, source: &AcquiredSource) -> Result<Self> {
        let mut metadata = RepoMetadata::new(source.repo_name.clone());
        metadata.url = source.repo_url.clone();
        metadata.branch = source.branch.clone();
        metadata.subdir = source.subdir.clone();

        Ok(Self {
            root: source.scan_root(),
            metadata,
            filter: config.filter_config()?,
            ignore_file_name: config.filters.ignore_file_name.clone(),
            formats: config.effective_formats(),
            mode: config.general.mode,
            output_dir: config.output_dir(),
            scan_id: None,
            tree_depth: config.general.tree_depth,
            tree_exclude_dirs: config.tree.exclude_dirs.clone(),
            concurrency: config.scan.concurrency,
            follow_symlinks: config.filters.follow_symlinks,
        })
    }

    /// Filter configuration with the repository's ignore file, if enabled and
    /// present, unioned into the exclude patterns.
    pub fn effective_filter(&self) -> Result<FilterConfig> {
        let mut filter = self.filter.clone();
        if filter.use_ignore_file {
            let ignore_path = self.root.join(&self.ignore_file_name);
            let patterns = parse_ignore_file(&ignore_path)?;
            if !patterns.is_empty() {
                log::info!(
                    "Loaded {} exclude patterns from {}",
                    patterns.len(),
                    ignore_path.display()
                );
            }
            for pattern in patterns {
                if !filter.exclude.contains(&pattern) {
                    filter.exclude.push(pattern);
                }
            }
        }
        Ok(filter)
    }
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub scan: ScanResult,
    pub summary: Summary,
    pub build: BuildReport,
}

#[derive(Debug, Clone)]
pub enum ScanOutcome {
    Completed(ScanReport),
    /// The walk finished but accepted no textual file; nothing was rendered.
    NoValidFiles { scan: ScanResult },
}

impl ScanOutcome {
    pub fn scan(&self) -> &ScanResult {
        match self {
            ScanOutcome::Completed(report) => &report.scan,
            ScanOutcome::NoValidFiles { scan } => scan,
        }
    }
}

pub fn run_scan(
    request: &ScanRequest,
    classifier: &Classifier,
    cancel: &CancellationToken,
) -> Result<ScanOutcome> {
    let started = Instant::now();
    let filter = FilterChain::new(&request.effective_filter()?)?;
    let scanner = Scanner::new(filter, classifier.clone())
        .with_concurrency(request.concurrency)
        .follow_symlinks(request.follow_symlinks);

    let scan = scanner.scan(&request.root, cancel)?;
    if !scan.has_textual_files() {
        log::warn!("No valid textual files found under {}", request.root.display());
        return Ok(ScanOutcome::NoValidFiles { scan });
    }

    let summary = summarize(&scan.accepted, &scan.non_textual);
    let tree = build_tree(&scan.root, request.tree_depth, &request.tree_exclude_dirs);
    if cancel.is_cancelled() {
        return Err(AppError::Cancelled);
    }

    let input = RenderInput::prepare(
        &scan,
        summary.clone(),
        tree,
        request.metadata.clone(),
        request.mode,
    );
    let mut builder = OutputBuilder::new(&request.output_dir, request.formats.clone());
    if let Some(scan_id) = &request.scan_id {
        builder = builder.with_scan_id(scan_id.clone());
    }
    let build = builder.build(&input)?;
    log::info!(
        "Scan {} finished in {:.2?}: {} outputs, {} failures",
        build.scan_id,
        started.elapsed(),
        build.outputs.len(),
        build.failures.len()
    );

    Ok(ScanOutcome::Completed(ScanReport {
        scan,
        summary,
        build,
    }))
}
