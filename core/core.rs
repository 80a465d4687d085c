pub mod builtins;
pub mod classify;
pub mod config;
pub mod error;
pub mod filter;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod reverse;
pub mod scanner;
pub mod source;
pub mod summary;
pub mod tree;

pub use classify::{
    Classification, Classifier, FileRulesProvider, Label, RuleSet, RulesProvider, StaticRules,
    Subcategory,
};
pub use config::Config;
pub use error::{AppError, Result};
pub use filter::{FilterChain, FilterConfig, SkipReason};
pub use output::{BuildReport, OutputBuilder, cleanup_scan_output};
pub use pipeline::{ScanOutcome, ScanReport, ScanRequest, run_scan};
pub use render::{OutputFormat, RenderInput, RenderMode, Renderer, RepoMetadata};
pub use reverse::{ParsedReport, reconstruct};
pub use scanner::{CancellationToken, FileRecord, ScanResult, Scanner, SkippedFile};
pub use source::{AcquiredSource, acquire};
pub use summary::{Summary, summarize};
pub use tree::build_tree; // Directory overview shared by every renderer
