use crate::error::{AppError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterConfig {
    /// Directory names (`node_modules`) or globs (`build-*`) pruned from the walk.
    pub exclude_dirs: Vec<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Ceiling in bytes; `None` means unlimited.
    pub size_limit: Option<u64>,
    pub use_ignore_file: bool,
}

/// Why a file was left out of the digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    ExcludedDir,
    ExcludePattern,
    NotIncluded,
    SizeLimit { size: u64, limit: u64 },
    ProcessingError(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ExcludedDir => f.write_str("excluded directory"),
            SkipReason::ExcludePattern => f.write_str("exclude pattern"),
            SkipReason::NotIncluded => f.write_str("not in include patterns"),
            SkipReason::SizeLimit { size, limit } => {
                write!(f, "exceeds size limit ({} > {} bytes)", size, limit)
            }
            SkipReason::ProcessingError(msg) => write!(f, "processing error: ({})", msg),
        }
    }
}

/// Compiled form of a [`FilterConfig`]. Cheap to share across worker threads.
#[derive(Debug, Clone)]
pub struct FilterChain {
    exclude_dir_names: HashSet<String>,
    exclude_dir_globs: GlobSet,
    include_set: GlobSet,
    has_includes: bool,
    exclude_set: GlobSet,
    size_limit: Option<u64>,
}

impl FilterChain {
    pub fn new(config: &FilterConfig) -> Result<Self> {
        let mut exclude_dir_names = HashSet::new();
        let mut dir_globs = Vec::new();
        for entry in &config.exclude_dirs {
            let trimmed = entry.trim().trim_matches('/');
            if trimmed.is_empty() {
                continue;
            }
            // Multi-segment entries can only match a relative path, never a single name.
            if trimmed.contains(['*', '?', '[', '{', '/']) {
                dir_globs.push(trimmed.to_string());
            } else {
                exclude_dir_names.insert(trimmed.to_lowercase());
            }
        }

        let include_patterns: Vec<String> = non_blank(&config.include);
        let exclude_patterns: Vec<String> = non_blank(&config.exclude);

        log::debug!(
            "Filter chain: {} excluded dir names, {} dir globs, {} include, {} exclude, size limit {:?}",
            exclude_dir_names.len(),
            dir_globs.len(),
            include_patterns.len(),
            exclude_patterns.len(),
            config.size_limit
        );

        Ok(Self {
            exclude_dir_names,
            exclude_dir_globs: build_glob_set_from_vec(&dir_globs)?,
            has_includes: !include_patterns.is_empty(),
            include_set: build_glob_set_from_vec(&include_patterns)?,
            exclude_set: build_glob_set_from_vec(&exclude_patterns)?,
            size_limit: config.size_limit,
        })
    }

    fn is_excluded_dir_name(&self, name: &str) -> bool {
        self.exclude_dir_names.contains(&name.to_lowercase()) || self.exclude_dir_globs.is_match(name)
    }

    /// True if the directory at `relative_dir` should not be descended into.
    pub fn is_excluded_dir(&self, relative_dir: &Path) -> bool {
        match relative_dir.file_name() {
            Some(name) => {
                self.is_excluded_dir_name(&name.to_string_lossy())
                    || self.exclude_dir_globs.is_match(slash_path(relative_dir))
            }
            None => false,
        }
    }

    fn under_excluded_dir(&self, relative_path: &Path) -> bool {
        relative_path
            .parent()
            .into_iter()
            .flat_map(Path::ancestors)
            .any(|dir| self.is_excluded_dir(dir))
    }

    fn is_match(set: &GlobSet, relative_path: &Path) -> bool {
        let slashed = slash_path(relative_path);
        set.is_match(&slashed)
            || relative_path
                .file_name()
                .is_some_and(|name| set.is_match(Path::new(name)))
    }

    pub fn matches_include(&self, relative_path: &Path) -> bool {
        self.has_includes && Self::is_match(&self.include_set, relative_path)
    }

    /// Evaluates one file, short-circuiting on the first rejection.
    /// Exclusions are checked before includes so an include can never
    /// bring back an excluded path.
    pub fn evaluate(&self, relative_path: &Path, size: u64) -> std::result::Result<(), SkipReason> {
        if self.under_excluded_dir(relative_path) {
            return Err(SkipReason::ExcludedDir);
        }
        if Self::is_match(&self.exclude_set, relative_path) {
            return Err(SkipReason::ExcludePattern);
        }
        if self.has_includes && !Self::is_match(&self.include_set, relative_path) {
            return Err(SkipReason::NotIncluded);
        }
        if let Some(limit) = self.size_limit {
            if size > limit {
                return Err(SkipReason::SizeLimit { size, limit });
            }
        }
        Ok(())
    }
}

fn non_blank(patterns: &[String]) -> Vec<String> {
    patterns
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

pub fn build_glob_set_from_vec(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern_str in patterns {
        let mut processed_pattern = pattern_str.trim().to_string();
        if processed_pattern.ends_with('/') && processed_pattern.len() > 1 {
            processed_pattern.push_str("**");
        }
        match Glob::new(&processed_pattern) {
            Ok(glob) => {
                log::trace!(
                    "Adding glob pattern: {} (processed as {})",
                    pattern_str,
                    processed_pattern
                );
                builder.add(glob);
            }
            Err(e) => {
                log::error!("Invalid glob pattern \"{}\": {}", pattern_str, e);
                return Err(AppError::Glob(format!(
                    "Invalid glob pattern \"{}\" (processed as \"{}\"): {}",
                    pattern_str, processed_pattern, e
                )));
            }
        }
    }
    builder.build().map_err(|e| {
        log::error!("Error building glob set: {}", e);
        AppError::Glob(e.to_string())
    })
}

/// Reads exclude patterns from a repository-local ignore file.
/// A missing file yields no patterns.
pub fn parse_ignore_file(path: &Path) -> Result<Vec<String>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(AppError::FileRead {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    Ok(parse_ignore_patterns(&content))
}

pub fn parse_ignore_patterns(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| {
            if line.starts_with('!') {
                log::warn!("Negated ignore pattern '{}' is not supported, ignoring it.", line);
                false
            } else {
                true
            }
        })
        .map(String::from)
        .collect()
}

/// Relative path with `/` separators on every platform, for glob matching and display.
pub fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(seg) => Some(seg.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn chain(config: FilterConfig) -> FilterChain {
        FilterChain::new(&config).unwrap()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exclude_dir_rejects_nested_files() {
        let chain = chain(FilterConfig {
            exclude_dirs: strings(&["node_modules", "build-*"]),
            ..Default::default()
        });
        assert_eq!(
            chain.evaluate(Path::new("web/node_modules/x/lib.js"), 10),
            Err(SkipReason::ExcludedDir)
        );
        assert_eq!(
            chain.evaluate(Path::new("build-linux/out.txt"), 10),
            Err(SkipReason::ExcludedDir)
        );
        assert!(chain.evaluate(Path::new("node_modules.md"), 10).is_ok());
        assert!(chain.is_excluded_dir(Path::new("a/Node_Modules")));
        assert!(!chain.is_excluded_dir(Path::new("src")));
    }

    #[test]
    fn exclude_dir_with_separator_matches_relative_path() {
        let chain = chain(FilterConfig {
            exclude_dirs: strings(&["docs/build/", "/target"]),
            ..Default::default()
        });
        assert!(chain.is_excluded_dir(Path::new("docs/build")));
        assert!(!chain.is_excluded_dir(Path::new("site/build")));
        assert!(chain.is_excluded_dir(Path::new("target")));
        assert_eq!(
            chain.evaluate(Path::new("docs/build/html/index.html"), 1),
            Err(SkipReason::ExcludedDir)
        );
        assert!(chain.evaluate(Path::new("docs/intro.md"), 1).is_ok());
        assert!(chain.evaluate(Path::new("site/build/index.html"), 1).is_ok());
    }

    #[test]
    fn exclude_takes_precedence_over_include() {
        let chain = chain(FilterConfig {
            include: strings(&["*.py"]),
            exclude: strings(&["vendor/"]),
            ..Default::default()
        });
        assert_eq!(
            chain.evaluate(Path::new("vendor/lib.py"), 1),
            Err(SkipReason::ExcludePattern)
        );
        assert!(chain.evaluate(Path::new("src/app.py"), 1).is_ok());
        assert_eq!(
            chain.evaluate(Path::new("src/app.rs"), 1),
            Err(SkipReason::NotIncluded)
        );
    }

    #[test]
    fn excluded_dir_beats_include() {
        let chain = chain(FilterConfig {
            exclude_dirs: strings(&["vendor"]),
            include: strings(&["**/*.py", "vendor/**"]),
            ..Default::default()
        });
        assert_eq!(
            chain.evaluate(Path::new("vendor/lib.py"), 1),
            Err(SkipReason::ExcludedDir)
        );
    }

    #[test]
    fn size_limit_boundary() {
        let chain = chain(FilterConfig {
            size_limit: Some(100),
            ..Default::default()
        });
        assert!(chain.evaluate(Path::new("a.txt"), 100).is_ok());
        assert_eq!(
            chain.evaluate(Path::new("a.txt"), 101),
            Err(SkipReason::SizeLimit {
                size: 101,
                limit: 100
            })
        );
    }

    #[test]
    fn patterns_match_file_name_or_relative_path() {
        let chain = chain(FilterConfig {
            exclude: strings(&["*.lock", "docs/*.md"]),
            ..Default::default()
        });
        assert!(chain.evaluate(Path::new("deep/dir/Cargo.lock"), 1).is_err());
        assert!(chain.evaluate(Path::new("docs/intro.md"), 1).is_err());
        assert!(chain.evaluate(Path::new("README.md"), 1).is_ok());
    }

    #[test]
    fn invalid_glob_is_an_error() {
        let result = FilterChain::new(&FilterConfig {
            include: strings(&["src/[abc"]),
            ..Default::default()
        });
        assert!(matches!(result, Err(AppError::Glob(_))));
    }

    #[test]
    fn ignore_file_strips_comments_and_blanks() {
        let patterns = parse_ignore_patterns("# comment\n\n*.log\nbuild/\n  \n!keep.log\n");
        assert_eq!(patterns, strings(&["*.log", "build/"]));

        let chain = chain(FilterConfig {
            exclude: patterns,
            ..Default::default()
        });
        assert!(chain.evaluate(Path::new("build/out/app.js"), 1).is_err());
        assert!(chain.evaluate(Path::new("logs/today.log"), 1).is_err());
    }

    #[test]
    fn missing_ignore_file_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(parse_ignore_file(&dir.path().join(".nothing")).unwrap().is_empty());
    }

    #[test]
    fn reason_strings() {
        assert_eq!(SkipReason::ExcludePattern.to_string(), "exclude pattern");
        assert_eq!(
            SkipReason::ProcessingError("gone".into()).to_string(),
            "processing error: (gone)"
        );
    }

    #[test]
    fn slash_path_joins_components() {
        let path: PathBuf = ["a", "b", "c.txt"].iter().collect();
        assert_eq!(slash_path(&path), "a/b/c.txt");
    }
}
