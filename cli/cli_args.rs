use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOpts {
    #[arg(
        long,
        help = "Specify path/filename of the TOML config file (default: .repodigest/repodigest.toml).",
        value_name = "CONFIG_FILE",
        conflicts_with = "no_config",
        help_heading = "Configuration"
    )]
    pub config: Option<String>,

    #[arg(
        long,
        help = "Disable loading any TOML config file.",
        conflicts_with = "config",
        help_heading = "Configuration"
    )]
    pub no_config: bool,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Turn a repository into a single LLM-ready digest.",
    long_about = "repodigest walks a local directory or a GitHub repository, classifies every file as \ntextual or non-textual, filters it, and renders the textual content with a tree and \nsummary as text, Markdown, JSON and an optional zip bundle.",
    help_template = "{about-section}\nUsage: {usage}\n\n{all-args}{after-help}",
    after_help = "EXAMPLES:\n  repodigest scan . -f txt,md\n  repodigest scan https://github.com/owner/repo --zip --lite\n  repodigest classify src/main.rs\n  repodigest filetypes add-textual .tmpl",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase message verbosity (-v, -vv).")]
    pub verbose: u8,

    #[arg(
        short,
        long,
        global = true,
        help = "Silence informational messages and warnings."
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    #[command(
        visible_alias = "s",
        about = "Scan a directory or repository and write digest outputs."
    )]
    Scan(ScanArgs),

    #[command(
        visible_alias = "c",
        about = "Show how files would be classified (label and subcategory)."
    )]
    Classify(ClassifyArgs),

    #[command(
        visible_alias = "ft",
        about = "Manage the persisted textual/non-textual extension lists."
    )]
    Filetypes(FiletypesArgs),

    #[command(about = "Delete the output directory of a previous scan.")]
    Cleanup(CleanupArgs),

    #[command(
        visible_alias = "re",
        about = "Rebuild source files from a .txt, .md or .json report into a zip."
    )]
    Reverse(ReverseArgs),

    #[command(about = "Print the effective configuration as TOML.")]
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    #[arg(
        help = "Local directory or GitHub URL (https://github.com/owner/repo[/tree/branch/subdir]).",
        value_name = "SOURCE",
        default_value = "."
    )]
    pub source: String,

    #[arg(
        short,
        long,
        help = "Branch to clone for remote sources.",
        value_name = "BRANCH",
        help_heading = "Source"
    )]
    pub branch: Option<String>,

    #[command(flatten)]
    pub config_opts: ConfigOpts,

    #[command(flatten)]
    pub output: ScanOutputOpts,

    #[command(flatten)]
    pub filters: ScanFilterOpts,

    #[arg(
        long,
        help = "Maximum number of files processed concurrently.",
        value_name = "N",
        help_heading = "Execution"
    )]
    pub concurrency: Option<usize>,

    #[arg(
        long,
        help = "Abort the scan after this long (e.g., 30s, 2m).",
        value_name = "DURATION",
        help_heading = "Execution"
    )]
    pub timeout: Option<String>,

    #[arg(
        long,
        help = "Print a table of skipped files and the reason for each.",
        help_heading = "Execution"
    )]
    pub show_skipped: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ScanOutputOpts {
    #[arg(
        short,
        long,
        help = "Directory that receives scan output folders.",
        value_name = "DIR",
        help_heading = "Output"
    )]
    pub output_dir: Option<String>,

    #[arg(
        short = 'f',
        long,
        help = "Comma-separated output formats: txt, md, json, zip.",
        value_name = "FORMATS",
        help_heading = "Output"
    )]
    pub format: Option<String>,

    #[arg(long, help = "Also bundle all outputs and assets into a zip.", help_heading = "Output")]
    pub zip: bool,

    #[arg(
        long,
        help = "Emit only the tree and raw file contents (no summary or assets).",
        help_heading = "Output"
    )]
    pub lite: bool,

    #[arg(
        long,
        help = "Limit the directory tree to this many levels.",
        value_name = "DEPTH",
        help_heading = "Output"
    )]
    pub tree_depth: Option<usize>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ScanFilterOpts {
    #[arg(
        short,
        long = "include",
        help = "Only embed files matching this glob. Can be repeated.",
        value_name = "GLOB",
        action = clap::ArgAction::Append,
        help_heading = "Filtering"
    )]
    pub include: Vec<String>,

    #[arg(
        short,
        long = "exclude",
        help = "Skip files matching this glob. Can be repeated.",
        value_name = "GLOB",
        action = clap::ArgAction::Append,
        help_heading = "Filtering"
    )]
    pub exclude: Vec<String>,

    #[arg(
        long = "exclude-dir",
        help = "Never descend into directories with this name or glob. Can be repeated.",
        value_name = "DIR",
        action = clap::ArgAction::Append,
        help_heading = "Filtering"
    )]
    pub exclude_dir: Vec<String>,

    #[arg(
        long,
        help = "Skip files larger than this (e.g., 500KB, 5 MiB).",
        value_name = "SIZE",
        help_heading = "Filtering"
    )]
    pub size_limit: Option<String>,

    #[arg(
        long,
        help = "Do not read exclude patterns from the repository's ignore file.",
        help_heading = "Filtering"
    )]
    pub no_ignore_file: bool,

    #[arg(long, help = "Follow symbolic links while walking.", help_heading = "Filtering")]
    pub follow_symlinks: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ClassifyArgs {
    #[arg(help = "Files to classify.", value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    #[arg(long, help = "Print results as JSON.")]
    pub json: bool,

    #[command(flatten)]
    pub config_opts: ConfigOpts,
}

#[derive(Args, Debug, Clone)]
pub struct FiletypesArgs {
    #[command(subcommand)]
    pub action: FiletypesAction,

    #[command(flatten)]
    pub config_opts: ConfigOpts,
}

#[derive(Subcommand, Debug, Clone)]
pub enum FiletypesAction {
    #[command(about = "Always treat files with these extensions as textual.")]
    AddTextual {
        #[arg(value_name = "EXT", required = true)]
        exts: Vec<String>,
    },
    #[command(about = "Always treat files with these extensions as non-textual.")]
    AddNonTextual {
        #[arg(value_name = "EXT", required = true)]
        exts: Vec<String>,
    },
    #[command(about = "Drop these extensions from both lists.")]
    Remove {
        #[arg(value_name = "EXT", required = true)]
        exts: Vec<String>,
    },
    #[command(about = "List the current extension overrides.")]
    List,
}

#[derive(Args, Debug, Clone)]
pub struct CleanupArgs {
    #[arg(help = "Scan id printed by a previous scan.", value_name = "SCAN_ID")]
    pub scan_id: String,

    #[arg(
        short,
        long,
        help = "Output directory the scan was written to.",
        value_name = "DIR"
    )]
    pub output_dir: Option<String>,

    #[command(flatten)]
    pub config_opts: ConfigOpts,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub config_opts: ConfigOpts,
}

#[derive(Args, Debug, Clone)]
pub struct ReverseArgs {
    #[arg(help = "Report written by a previous scan.", value_name = "REPORT")]
    pub report: PathBuf,

    #[arg(
        short,
        long,
        help = "Directory for the reconstructed zip [default: current directory].",
        value_name = "DIR"
    )]
    pub output_dir: Option<PathBuf>,
}
