use crate::classify::{Classification, Classifier, RuleSet, classify_with_rules};
use crate::error::{AppError, Result};
use crate::filter::{FilterChain, SkipReason};
use ignore::{WalkBuilder, WalkState};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};

pub const DEFAULT_CONCURRENCY: usize = 200;

/// Cloneable cancel flag shared between a caller and a running scan.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Resolved absolute path; the identity of the file.
    pub path: PathBuf,
    pub relative_path: PathBuf,
    pub size: u64,
    pub classification: Classification,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub relative_path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub enum FileOutcome {
    Accepted(FileRecord),
    NonTextual(FileRecord),
    Skipped(SkippedFile),
}

impl FileOutcome {
    fn identity(&self) -> &Path {
        match self {
            FileOutcome::Accepted(r) | FileOutcome::NonTextual(r) => &r.path,
            FileOutcome::Skipped(s) => &s.path,
        }
    }
}

/// Disjoint partition of every regular file the walk reached.
/// Each collection is sorted by relative path.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub root: PathBuf,
    pub accepted: Vec<FileRecord>,
    pub non_textual: Vec<FileRecord>,
    pub skipped: Vec<SkippedFile>,
}

impl ScanResult {
    pub fn has_textual_files(&self) -> bool {
        !self.accepted.is_empty()
    }

    pub fn total_seen(&self) -> usize {
        self.accepted.len() + self.non_textual.len() + self.skipped.len()
    }

    fn from_outcomes(root: PathBuf, outcomes: Vec<FileOutcome>) -> Self {
        let mut result = ScanResult {
            root,
            ..Default::default()
        };
        let mut seen: HashSet<PathBuf> = HashSet::with_capacity(outcomes.len());
        for outcome in outcomes {
            if !seen.insert(outcome.identity().to_path_buf()) {
                log::trace!("Duplicate path dropped: {}", outcome.identity().display());
                continue;
            }
            match outcome {
                FileOutcome::Accepted(r) => result.accepted.push(r),
                FileOutcome::NonTextual(r) => result.non_textual.push(r),
                FileOutcome::Skipped(s) => result.skipped.push(s),
            }
        }
        result.accepted.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        result.non_textual.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        result.skipped.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        result
    }
}

#[derive(Debug)]
struct Candidate {
    path: PathBuf,
    relative_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Scanner {
    filter: Arc<FilterChain>,
    classifier: Classifier,
    concurrency: usize,
    follow_symlinks: bool,
}

impl Scanner {
    pub fn new(filter: FilterChain, classifier: Classifier) -> Self {
        Self {
            filter: Arc::new(filter),
            classifier,
            concurrency: DEFAULT_CONCURRENCY,
            follow_symlinks: false,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    pub fn scan(&self, root: &Path, cancel: &CancellationToken) -> Result<ScanResult> {
        let root = fs::canonicalize(root).map_err(|e| {
            AppError::InvalidArgument(format!("Scan root '{}' is not accessible: {}", root.display(), e))
        })?;
        if !root.is_dir() {
            return Err(AppError::InvalidArgument(format!(
                "Scan root '{}' is not a directory",
                root.display()
            )));
        }

        // One snapshot per scan: rule edits apply to the next scan, not this one.
        let rules = self.classifier.rules();

        let candidates = self.walk(&root, cancel)?;
        log::info!(
            "Directory walk complete. {} candidate files under {}",
            candidates.len(),
            root.display()
        );

        let outcomes = self.process_all(candidates, &rules, cancel)?;
        let result = ScanResult::from_outcomes(root, outcomes);
        log::info!(
            "Scan complete: {} accepted, {} non-textual, {} skipped",
            result.accepted.len(),
            result.non_textual.len(),
            result.skipped.len()
        );
        Ok(result)
    }

    fn walk(&self, root: &Path, cancel: &CancellationToken) -> Result<Vec<Candidate>> {
        let mut builder = WalkBuilder::new(root);
        builder
            .standard_filters(false)
            .hidden(false)
            .follow_links(self.follow_symlinks)
            .threads(rayon::current_num_threads().min(12));
        let walker = builder.build_parallel();

        let (tx, rx) = mpsc::channel::<Candidate>();
        log::debug!("Walking directory: {}", root.display());
        walker.run(|| {
            let tx = tx.clone();
            let root = root.to_path_buf();
            let filter = Arc::clone(&self.filter);
            let cancel = cancel.clone();

            Box::new(move |entry_result| {
                if cancel.is_cancelled() {
                    return WalkState::Quit;
                }
                let entry = match entry_result {
                    Ok(entry) => entry,
                    Err(e) => {
                        log::warn!("{}", AppError::from(e));
                        return WalkState::Continue;
                    }
                };
                if entry.depth() == 0 {
                    return WalkState::Continue;
                }
                let path = entry.path();
                let Some(relative_path) = pathdiff::diff_paths(path, &root) else {
                    log::warn!("Could not get relative path for: {}", path.display());
                    return WalkState::Continue;
                };
                let Some(file_type) = entry.file_type() else {
                    return WalkState::Continue;
                };

                if file_type.is_dir() {
                    if filter.is_excluded_dir(&relative_path) {
                        log::trace!("Pruning excluded directory: {}", relative_path.display());
                        return WalkState::Skip;
                    }
                    return WalkState::Continue;
                }
                if !file_type.is_file() {
                    log::trace!("Not a regular file: {}", relative_path.display());
                    return WalkState::Continue;
                }

                let candidate = Candidate {
                    path: path.to_path_buf(),
                    relative_path,
                };
                if tx.send(candidate).is_err() {
                    log::error!("Receiver dropped for walked paths, stopping walk early.");
                    return WalkState::Quit;
                }
                WalkState::Continue
            })
        });
        drop(tx);

        let candidates: Vec<Candidate> = rx.into_iter().collect();
        if cancel.is_cancelled() {
            log::info!("Scan cancelled during directory walk.");
            return Err(AppError::Cancelled);
        }
        Ok(candidates)
    }

    fn process_all(
        &self,
        candidates: Vec<Candidate>,
        rules: &RuleSet,
        cancel: &CancellationToken,
    ) -> Result<Vec<FileOutcome>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let threads = self.concurrency.min(candidates.len()).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("repodigest-scan-{}", i))
            .build()?;
        log::debug!(
            "Processing {} files on {} worker threads",
            candidates.len(),
            threads
        );

        let outcomes: Vec<Option<FileOutcome>> = pool.install(|| {
            candidates
                .into_par_iter()
                .map(|candidate| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    Some(self.process_file(candidate, rules))
                })
                .collect()
        });

        if cancel.is_cancelled() {
            log::info!("Scan cancelled while processing files.");
            return Err(AppError::Cancelled);
        }
        Ok(outcomes.into_iter().flatten().collect())
    }

    fn process_file(&self, candidate: Candidate, rules: &RuleSet) -> FileOutcome {
        let Candidate {
            path,
            relative_path,
        } = candidate;
        let skipped = |path: PathBuf, reason: SkipReason| {
            log::trace!("Skipped {}: {}", relative_path.display(), reason);
            FileOutcome::Skipped(SkippedFile {
                path,
                relative_path: relative_path.clone(),
                reason,
            })
        };

        let resolved = match fs::canonicalize(&path) {
            Ok(resolved) => resolved,
            Err(e) => {
                log::warn!("Could not resolve {}: {}", path.display(), e);
                return skipped(path, SkipReason::ProcessingError(e.to_string()));
            }
        };
        let size = match fs::metadata(&resolved) {
            Ok(meta) => meta.len(),
            Err(e) => {
                log::warn!("Could not stat {}: {}", path.display(), e);
                return skipped(resolved, SkipReason::ProcessingError(e.to_string()));
            }
        };

        if let Err(reason) = self.filter.evaluate(&relative_path, size) {
            return skipped(resolved, reason);
        }

        let classification = classify_with_rules(rules, &resolved);
        log::trace!("{} -> {}", relative_path.display(), classification);
        // Textual files are embedded later, so they must be readable now.
        if classification.is_textual() {
            if let Err(e) = check_readable(&resolved) {
                log::warn!("Could not read {}: {}", path.display(), e);
                return skipped(resolved, SkipReason::ProcessingError(e.to_string()));
            }
        }
        let record = FileRecord {
            path: resolved,
            relative_path,
            size,
            classification,
        };
        if classification.is_textual() {
            FileOutcome::Accepted(record)
        } else {
            if self.filter.matches_include(&record.relative_path) {
                log::warn!(
                    "'{}' matches an include pattern but is {}; it is listed as an asset, not embedded.",
                    record.relative_path.display(),
                    classification
                );
            }
            FileOutcome::NonTextual(record)
        }
    }
}

fn check_readable(path: &Path) -> io::Result<()> {
    let mut buf = [0u8; 512];
    File::open(path)?.read(&mut buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::RulesProvider;
    use crate::filter::FilterConfig;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, bytes: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    fn scanner(config: FilterConfig) -> Scanner {
        Scanner::new(FilterChain::new(&config).unwrap(), Classifier::default()).with_concurrency(4)
    }

    fn rels(records: &[FileRecord]) -> Vec<String> {
        records
            .iter()
            .map(|r| crate::filter::slash_path(&r.relative_path))
            .collect()
    }

    #[test]
    fn partitions_files_and_prunes_excluded_dirs() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "README.md", b"# Hi");
        write(dir.path(), "src/main.py", b"print(1)");
        write(dir.path(), "node_modules/lib.js", b"ignored");
        write(dir.path(), "image.png", b"\x89PNG\0\0");
        write(dir.path(), "big.txt", &[b'a'; 64]);

        let result = scanner(FilterConfig {
            exclude_dirs: vec!["node_modules".into()],
            size_limit: Some(32),
            ..Default::default()
        })
        .scan(dir.path(), &CancellationToken::new())
        .unwrap();

        assert_eq!(rels(&result.accepted), vec!["README.md", "src/main.py"]);
        assert_eq!(rels(&result.non_textual), vec!["image.png"]);
        assert_eq!(result.skipped.len(), 1);
        assert!(matches!(result.skipped[0].reason, SkipReason::SizeLimit { .. }));
        assert_eq!(result.total_seen(), 4);

        let all: Vec<&PathBuf> = result
            .accepted
            .iter()
            .chain(&result.non_textual)
            .map(|r| &r.relative_path)
            .chain(result.skipped.iter().map(|s| &s.relative_path))
            .collect();
        assert!(!all.iter().any(|p| p.starts_with("node_modules")));
    }

    #[test]
    fn cancelled_scan_has_no_result() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.txt", b"hello");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = scanner(FilterConfig::default()).scan(dir.path(), &cancel);
        assert!(matches!(result, Err(AppError::Cancelled)));
    }

    struct CancelOnRules {
        cancel: CancellationToken,
    }

    impl RulesProvider for CancelOnRules {
        fn rules(&self) -> Arc<RuleSet> {
            self.cancel.cancel();
            Arc::new(RuleSet::default())
        }
    }

    #[test]
    fn cancel_after_scan_start_aborts() {
        let dir = TempDir::new().unwrap();
        for i in 0..20 {
            write(dir.path(), &format!("d{}/f{}.py", i % 4, i), b"x = 1");
        }
        let cancel = CancellationToken::new();
        let classifier = Classifier::new(Arc::new(CancelOnRules {
            cancel: cancel.clone(),
        }));
        let scanner = Scanner::new(FilterChain::new(&FilterConfig::default()).unwrap(), classifier);

        assert!(!cancel.is_cancelled());
        let result = scanner.scan(dir.path(), &cancel);
        assert!(matches!(result, Err(AppError::Cancelled)));
    }

    #[test]
    fn included_binary_is_listed_as_asset() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "logo.png", b"\x89PNG\r\n\x1a\n\0\0");
        write(dir.path(), "main.py", b"print(1)");

        let result = scanner(FilterConfig {
            include: vec!["*.png".into()],
            ..Default::default()
        })
        .scan(dir.path(), &CancellationToken::new())
        .unwrap();

        assert!(result.accepted.is_empty());
        assert_eq!(rels(&result.non_textual), vec!["logo.png"]);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].reason, SkipReason::NotIncluded);
        assert!(!result.has_textual_files());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_textual_file_is_skipped_with_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        write(dir.path(), "ok.py", b"print(1)");
        write(dir.path(), "secret.py", b"TOKEN = 1");
        let secret = dir.path().join("secret.py");
        fs::set_permissions(&secret, fs::Permissions::from_mode(0o000)).unwrap();
        if File::open(&secret).is_ok() {
            // Privileged users can read the file regardless of its mode.
            return;
        }

        let result = scanner(FilterConfig::default())
            .scan(dir.path(), &CancellationToken::new())
            .unwrap();
        fs::set_permissions(&secret, fs::Permissions::from_mode(0o644)).unwrap();

        assert_eq!(rels(&result.accepted), vec!["ok.py"]);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].relative_path, PathBuf::from("secret.py"));
        assert!(matches!(result.skipped[0].reason, SkipReason::ProcessingError(_)));
    }

    #[test]
    fn root_must_be_a_directory() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "file.txt", b"x");
        let cancel = CancellationToken::new();
        let s = scanner(FilterConfig::default());
        assert!(matches!(
            s.scan(&dir.path().join("file.txt"), &cancel),
            Err(AppError::InvalidArgument(_))
        ));
        assert!(s.scan(&dir.path().join("missing"), &cancel).is_err());
    }

    #[test]
    fn empty_directory_scans_to_empty_result() {
        let dir = TempDir::new().unwrap();
        let result = scanner(FilterConfig::default())
            .scan(dir.path(), &CancellationToken::new())
            .unwrap();
        assert!(!result.has_textual_files());
        assert_eq!(result.total_seen(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directory_is_deduplicated() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "real/notes.md", b"# notes");
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();

        let result = scanner(FilterConfig::default())
            .follow_symlinks(true)
            .scan(dir.path(), &CancellationToken::new())
            .unwrap();
        assert_eq!(result.accepted.len(), 1);
        assert_eq!(result.total_seen(), 1);
    }

    #[test]
    fn results_are_stable_across_runs() {
        let dir = TempDir::new().unwrap();
        for i in 0..40 {
            write(dir.path(), &format!("d{}/f{}.rs", i % 5, i), b"fn main() {}");
        }
        let s = scanner(FilterConfig::default());
        let a = s.scan(dir.path(), &CancellationToken::new()).unwrap();
        let b = s.scan(dir.path(), &CancellationToken::new()).unwrap();
        assert_eq!(a.accepted, b.accepted);
        assert_eq!(a.accepted.len(), 40);
    }
}
