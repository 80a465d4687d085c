//! Textual / non-textual classification.
//!
//! Decision order, first match wins:
//! 1. user whitelist (`textual_exts`)
//! 2. user blacklist (`non_textual_exts`)
//! 3. built-in textual extension and filename tables
//! 4. built-in image / media / binary tables
//! 5. MIME type guessed from the file name
//! 6. sampling the first [`SAMPLE_SIZE`] bytes of content
//! 7. non-textual `other`
//!
//! The user lists come from a [`RulesProvider`] so that long-running callers can
//! change them without a restart. [`FileRulesProvider`] persists them as JSON and
//! caches the parsed set for a reload interval.

use crate::builtins;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

pub const SAMPLE_SIZE: usize = 2048;
/// Share of alphabetic characters above which a sample reads as text.
pub const ALPHA_RATIO_THRESHOLD: f64 = 0.25;
pub const MIN_KEYWORD_HITS: usize = 1;
const SAMPLE_KEYWORDS: &[&str] = &["function", "class", "def", "import", "{", "}", "<", ">"];
pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "TEXTUAL")]
    Textual,
    #[serde(rename = "NON-TEXTUAL")]
    NonTextual,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Textual => "TEXTUAL",
            Label::NonTextual => "NON-TEXTUAL",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subcategory {
    Code,
    Docs,
    Config,
    Data,
    Csv,
    Image,
    Media,
    Binary,
    Asset,
    Other,
}

impl Subcategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subcategory::Code => "code",
            Subcategory::Docs => "docs",
            Subcategory::Config => "config",
            Subcategory::Data => "data",
            Subcategory::Csv => "csv",
            Subcategory::Image => "image",
            Subcategory::Media => "media",
            Subcategory::Binary => "binary",
            Subcategory::Asset => "asset",
            Subcategory::Other => "other",
        }
    }
}

impl fmt::Display for Subcategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Classification {
    pub label: Label,
    pub subcategory: Subcategory,
}

impl Classification {
    pub fn textual(subcategory: Subcategory) -> Self {
        Self {
            label: Label::Textual,
            subcategory,
        }
    }

    pub fn non_textual(subcategory: Subcategory) -> Self {
        Self {
            label: Label::NonTextual,
            subcategory,
        }
    }

    pub fn is_textual(&self) -> bool {
        self.label == Label::Textual
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.subcategory)
    }
}

/// Lowercases an extension and gives it a leading dot: `"PY"` -> `".py"`.
pub fn normalize_ext(ext: &str) -> String {
    let trimmed = ext.trim().to_lowercase();
    if trimmed.starts_with('.') {
        trimmed
    } else {
        format!(".{}", trimmed)
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
}

/// User-controlled whitelist and blacklist of extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub textual_exts: BTreeSet<String>,
    #[serde(default)]
    pub non_textual_exts: BTreeSet<String>,
}

impl RuleSet {
    pub fn new<I, J, S, T>(textual: I, non_textual: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            textual_exts: textual
                .into_iter()
                .map(|e| normalize_ext(e.as_ref()))
                .collect(),
            non_textual_exts: non_textual
                .into_iter()
                .map(|e| normalize_ext(e.as_ref()))
                .collect(),
        }
    }

    pub fn is_whitelisted(&self, ext: &str) -> bool {
        self.textual_exts.contains(ext)
    }

    pub fn is_blacklisted(&self, ext: &str) -> bool {
        self.non_textual_exts.contains(ext)
    }

    /// Moves `ext` to the whitelist. Returns false if it was already there.
    pub fn add_textual(&mut self, ext: &str) -> bool {
        let ext = normalize_ext(ext);
        self.non_textual_exts.remove(&ext);
        self.textual_exts.insert(ext)
    }

    /// Moves `ext` to the blacklist. Returns false if it was already there.
    pub fn add_non_textual(&mut self, ext: &str) -> bool {
        let ext = normalize_ext(ext);
        self.textual_exts.remove(&ext);
        self.non_textual_exts.insert(ext)
    }

    pub fn remove(&mut self, ext: &str) -> bool {
        let ext = normalize_ext(ext);
        let a = self.textual_exts.remove(&ext);
        let b = self.non_textual_exts.remove(&ext);
        a || b
    }
}

pub trait RulesProvider: Send + Sync {
    fn rules(&self) -> Arc<RuleSet>;
}

/// A fixed rule set, used when no persisted rules file is configured and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticRules {
    rules: Arc<RuleSet>,
}

impl StaticRules {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules: Arc::new(rules),
        }
    }
}

impl RulesProvider for StaticRules {
    fn rules(&self) -> Arc<RuleSet> {
        Arc::clone(&self.rules)
    }
}

#[derive(Debug)]
struct CachedRules {
    loaded_at: Instant,
    rules: Arc<RuleSet>,
}

/// Rules persisted as JSON on disk, re-read at most once per reload interval.
///
/// A missing file yields the fallback set. A malformed file also yields the
/// fallback set and logs a warning; it never fails classification.
#[derive(Debug)]
pub struct FileRulesProvider {
    path: PathBuf,
    reload_interval: Duration,
    fallback: Arc<RuleSet>,
    cache: RwLock<Option<CachedRules>>,
}

impl FileRulesProvider {
    pub fn new(path: impl Into<PathBuf>, fallback: RuleSet) -> Self {
        Self {
            path: path.into(),
            reload_interval: DEFAULT_RELOAD_INTERVAL,
            fallback: Arc::new(fallback),
            cache: RwLock::new(None),
        }
    }

    pub fn with_reload_interval(mut self, reload_interval: Duration) -> Self {
        self.reload_interval = reload_interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drops the cached set so the next lookup re-reads the file.
    pub fn invalidate(&self) {
        let mut guard = self.cache.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    fn read_from_disk(&self) -> Result<Option<RuleSet>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::FileRead {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };
        let parsed: RuleSet = serde_json::from_str(&content)?;
        // Re-normalize in case the file was edited by hand.
        Ok(Some(RuleSet::new(
            parsed.textual_exts,
            parsed.non_textual_exts,
        )))
    }

    fn load(&self) -> Arc<RuleSet> {
        match self.read_from_disk() {
            Ok(Some(rules)) => {
                log::debug!("Loaded classifier rules from {}", self.path.display());
                Arc::new(rules)
            }
            Ok(None) => {
                log::debug!(
                    "No classifier rules file at {}, using defaults.",
                    self.path.display()
                );
                Arc::clone(&self.fallback)
            }
            Err(e) => {
                log::warn!(
                    "Could not load classifier rules from {}: {}. Using defaults.",
                    self.path.display(),
                    e
                );
                Arc::clone(&self.fallback)
            }
        }
    }

    fn persist(&self, rules: &RuleSet) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| AppError::DirCreation {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }
        let json = serde_json::to_string_pretty(rules)?;
        fs::write(&self.path, json).map_err(|e| AppError::FileWrite {
            path: self.path.clone(),
            source: e,
        })?;
        log::info!("Classifier rules saved to {}", self.path.display());
        Ok(())
    }

    /// Applies `change` to the current rules and writes them back when it reports a change.
    pub fn update<F>(&self, change: F) -> Result<bool>
    where
        F: FnOnce(&mut RuleSet) -> bool,
    {
        let mut rules = (*self.load()).clone();
        let changed = change(&mut rules);
        if changed {
            self.persist(&rules)?;
            self.invalidate();
        }
        Ok(changed)
    }

    pub fn add_textual_ext(&self, ext: &str) -> Result<bool> {
        let normalized = normalize_ext(ext);
        if builtins::non_textual_subcategory_for_ext(&normalized).is_some() {
            log::warn!(
                "'{}' is a known non-textual extension; whitelisting it embeds such files as text.",
                normalized
            );
        }
        self.update(|rules| rules.add_textual(&normalized))
    }

    pub fn add_non_textual_ext(&self, ext: &str) -> Result<bool> {
        self.update(|rules| rules.add_non_textual(ext))
    }

    pub fn remove_ext(&self, ext: &str) -> Result<bool> {
        self.update(|rules| rules.remove(ext))
    }
}

impl RulesProvider for FileRulesProvider {
    fn rules(&self) -> Arc<RuleSet> {
        {
            let guard = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = guard.as_ref() {
                if cached.loaded_at.elapsed() < self.reload_interval {
                    return Arc::clone(&cached.rules);
                }
            }
        }
        let rules = self.load();
        let mut guard = self.cache.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(CachedRules {
            loaded_at: Instant::now(),
            rules: Arc::clone(&rules),
        });
        rules
    }
}

#[derive(Clone)]
pub struct Classifier {
    provider: Arc<dyn RulesProvider>,
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier").finish_non_exhaustive()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::with_rules(RuleSet::default())
    }
}

impl Classifier {
    pub fn new(provider: Arc<dyn RulesProvider>) -> Self {
        Self { provider }
    }

    pub fn with_rules(rules: RuleSet) -> Self {
        Self::new(Arc::new(StaticRules::new(rules)))
    }

    /// Current rules snapshot. A scan takes one snapshot up front so that rule
    /// edits made mid-scan only apply to later scans.
    pub fn rules(&self) -> Arc<RuleSet> {
        self.provider.rules()
    }

    pub fn classify(&self, path: &Path) -> Classification {
        classify_with_rules(&self.rules(), path)
    }
}

pub fn classify_with_rules(rules: &RuleSet, path: &Path) -> Classification {
    let ext = extension_of(path);
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let static_textual = || {
        ext.as_deref()
            .and_then(builtins::textual_subcategory_for_ext)
            .or_else(|| builtins::textual_subcategory_for_filename(&file_name))
    };

    if let Some(ext) = ext.as_deref() {
        if rules.is_whitelisted(ext) {
            log::trace!("{} whitelisted by extension {}", path.display(), ext);
            return Classification::textual(static_textual().unwrap_or(Subcategory::Other));
        }
        if rules.is_blacklisted(ext) {
            log::trace!("{} blacklisted by extension {}", path.display(), ext);
            return Classification::non_textual(
                builtins::non_textual_subcategory_for_ext(ext).unwrap_or(Subcategory::Binary),
            );
        }
    }

    if let Some(subcategory) = static_textual() {
        return Classification::textual(subcategory);
    }
    if let Some(subcategory) = ext
        .as_deref()
        .and_then(builtins::non_textual_subcategory_for_ext)
    {
        return Classification::non_textual(subcategory);
    }
    if let Some(classification) = classify_by_mime(path) {
        log::trace!("{} classified by MIME type: {}", path.display(), classification);
        return classification;
    }
    if let Some(classification) = sniff_content(path) {
        log::trace!("{} classified by content: {}", path.display(), classification);
        return classification;
    }
    Classification::non_textual(Subcategory::Other)
}

pub fn classify_by_mime(path: &Path) -> Option<Classification> {
    let mime = mime_guess::from_path(path).first()?;
    match (mime.type_().as_str(), mime.subtype().as_str()) {
        ("application", "json") | ("application", "xml") | ("text", "xml") => {
            Some(Classification::textual(Subcategory::Config))
        }
        ("text", "markdown") => Some(Classification::textual(Subcategory::Docs)),
        ("text", "csv") => Some(Classification::textual(Subcategory::Csv)),
        ("text", subtype) if subtype.starts_with("x-") => {
            Some(Classification::textual(Subcategory::Code))
        }
        ("text", _) => Some(Classification::textual(Subcategory::Other)),
        ("image", _) => Some(Classification::non_textual(Subcategory::Image)),
        ("audio", _) | ("video", _) => Some(Classification::non_textual(Subcategory::Media)),
        _ => None,
    }
}

/// Reads the head of a file and classifies it. An unreadable file is
/// non-textual: content we cannot inspect is never embedded.
pub fn sniff_content(path: &Path) -> Option<Classification> {
    let mut buf = Vec::with_capacity(SAMPLE_SIZE);
    let read = File::open(path).and_then(|file| file.take(SAMPLE_SIZE as u64).read_to_end(&mut buf));
    match read {
        Ok(_) => classify_sample(&buf),
        Err(e) => {
            log::debug!("Content sampling failed for {}: {}", path.display(), e);
            Some(Classification::non_textual(Subcategory::Other))
        }
    }
}

pub fn classify_sample(sample: &[u8]) -> Option<Classification> {
    if sample.contains(&0) {
        return Some(Classification::non_textual(Subcategory::Binary));
    }
    let decoded = String::from_utf8_lossy(sample);
    let total = decoded.chars().count();
    if total == 0 {
        return Some(Classification::textual(Subcategory::Other));
    }
    let alphabetic = decoded.chars().filter(|c| c.is_alphabetic()).count();
    let ratio = alphabetic as f64 / total as f64;
    let keyword_hits = SAMPLE_KEYWORDS
        .iter()
        .filter(|kw| decoded.contains(*kw))
        .count();

    if ratio > ALPHA_RATIO_THRESHOLD || keyword_hits >= MIN_KEYWORD_HITS {
        Some(Classification::textual(Subcategory::Other))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn static_tables_classify_known_extensions() {
        let dir = TempDir::new().unwrap();
        let classifier = Classifier::default();
        let py = write(&dir, "main.py", b"print(1)");
        let png = write(&dir, "logo.png", b"\x89PNG\r\n\x1a\n\0\0");
        let make = write(&dir, "Makefile", b"all:\n\tcc main.c");

        assert_eq!(classifier.classify(&py), Classification::textual(Subcategory::Code));
        assert_eq!(classifier.classify(&png), Classification::non_textual(Subcategory::Image));
        assert_eq!(classifier.classify(&make), Classification::textual(Subcategory::Code));
    }

    #[test]
    fn whitelist_beats_binary_content_and_static_table() {
        let dir = TempDir::new().unwrap();
        let garbage = write(&dir, "blob.xyz", &[0u8, 159, 146, 150, 0, 255, 1, 2]);
        let png = write(&dir, "fake.png", &[0u8, 1, 2, 3]);

        let classifier = Classifier::with_rules(RuleSet::new(["xyz", ".PNG"], Vec::<String>::new()));
        assert!(classifier.classify(&garbage).is_textual());
        assert!(classifier.classify(&png).is_textual());
    }

    #[test]
    fn blacklist_beats_textual_table() {
        let dir = TempDir::new().unwrap();
        let py = write(&dir, "gen.py", b"import os");
        let classifier = Classifier::with_rules(RuleSet::new(Vec::<String>::new(), [".py"]));
        assert_eq!(
            classifier.classify(&py),
            Classification::non_textual(Subcategory::Binary)
        );
    }

    #[test]
    fn unknown_extension_falls_back_to_sampling() {
        let dir = TempDir::new().unwrap();
        let classifier = Classifier::default();
        let text = write(&dir, "notes.zzq", b"plain words for humans to read");
        let binary = write(&dir, "dump.zzq", b"ab\0cd");
        let symbols = write(&dir, "noise.zzq", b"1234 5678 90.12 ===");

        assert_eq!(classifier.classify(&text), Classification::textual(Subcategory::Other));
        assert_eq!(
            classifier.classify(&binary),
            Classification::non_textual(Subcategory::Binary)
        );
        assert_eq!(
            classifier.classify(&symbols),
            Classification::non_textual(Subcategory::Other)
        );
    }

    #[test]
    fn mime_type_decides_before_sampling() {
        let dir = TempDir::new().unwrap();
        let classifier = Classifier::default();
        let calendar = write(&dir, "team.ics", b"12345 67890");
        let picture = write(&dir, "scan.ief", b"plain words for humans to read");

        assert_eq!(classifier.classify(&calendar), Classification::textual(Subcategory::Other));
        assert_eq!(
            classifier.classify(&picture),
            Classification::non_textual(Subcategory::Image)
        );
        assert_eq!(classify_by_mime(Path::new("notes.zzq")), None);
    }

    #[test]
    fn sampling_keyword_hit_counts_as_text() {
        assert!(classify_sample(b"1 { 2 }").is_some_and(|c| c.is_textual()));
        assert!(classify_sample(b"").is_some_and(|c| c.is_textual()));
        assert_eq!(classify_sample(b"12345 67890"), None);
    }

    #[test]
    fn unreadable_file_is_non_textual() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone.zzq");
        assert_eq!(
            sniff_content(&missing),
            Some(Classification::non_textual(Subcategory::Other))
        );
    }

    #[test]
    fn classification_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let classifier = Classifier::default();
        let file = write(&dir, "data.weird", b"function main() {}");
        let first = classifier.classify(&file);
        for _ in 0..5 {
            assert_eq!(classifier.classify(&file), first);
        }
    }

    #[test]
    fn rule_set_moves_extensions_between_lists() {
        let mut rules = RuleSet::default();
        assert!(rules.add_textual("LOG"));
        assert!(rules.is_whitelisted(".log"));
        assert!(rules.add_non_textual(".log"));
        assert!(!rules.is_whitelisted(".log"));
        assert!(rules.is_blacklisted(".log"));
        assert!(rules.remove("log"));
        assert!(!rules.remove("log"));
    }

    #[test]
    fn file_provider_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules").join("filetypes.json");
        let provider = FileRulesProvider::new(&path, RuleSet::default());

        assert!(provider.rules().textual_exts.is_empty());
        assert!(provider.add_textual_ext("xyz").unwrap());
        assert!(!provider.add_textual_ext(".xyz").unwrap());
        assert!(provider.rules().is_whitelisted(".xyz"));
        assert!(path.exists());
    }

    #[test]
    fn file_provider_caches_until_interval_elapses() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("filetypes.json");
        let provider = FileRulesProvider::new(&path, RuleSet::default())
            .with_reload_interval(Duration::from_secs(3600));

        assert!(!provider.rules().is_whitelisted(".abc"));
        fs::write(&path, r#"{"textual_exts": [".abc"]}"#).unwrap();
        assert!(!provider.rules().is_whitelisted(".abc"));
        provider.invalidate();
        assert!(provider.rules().is_whitelisted(".abc"));
    }

    #[test]
    fn malformed_rules_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("filetypes.json");
        fs::write(&path, "{ not json").unwrap();
        let fallback = RuleSet::new([".foo"], Vec::<String>::new());
        let provider = FileRulesProvider::new(&path, fallback.clone());
        assert_eq!(*provider.rules(), fallback);
    }
}
