use crate::builtins;
use crate::classify::{Classifier, FileRulesProvider, RuleSet, StaticRules};
use crate::error::{AppError, Result};
use crate::filter::FilterConfig;
use crate::render::{OutputFormat, RenderMode};
use crate::scanner::DEFAULT_CONCURRENCY;
use byte_unit::Byte;
use parse_duration::parse;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_CONFIG_DIR: &str = ".repodigest";
pub const DEFAULT_CONFIG_FILENAME: &str = "repodigest.toml";
pub const DEFAULT_OUTPUT_DIR: &str = "~/Repodigest";
pub const DEFAULT_IGNORE_FILE: &str = ".repodigestignore";
pub const DEFAULT_RELOAD_INTERVAL: &str = "60s";
pub const DEFAULT_RULES_FILENAME: &str = "filetypes.json";

pub const ENV_OUTPUT_DIR: &str = "REPODIGEST_OUTPUT_DIR";
pub const ENV_OUTPUT_FORMAT: &str = "REPODIGEST_OUTPUT_FORMAT";
pub const ENV_SIZE_LIMIT: &str = "REPODIGEST_SIZE_LIMIT";
pub const ENV_AUTO_ZIP: &str = "REPODIGEST_AUTO_ZIP";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub filters: FiltersConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub tree: TreeConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_output_formats")]
    pub output_formats: Vec<OutputFormat>,
    #[serde(default)]
    pub auto_zip: bool,
    #[serde(default)]
    pub mode: RenderMode,
    #[serde(default)]
    pub tree_depth: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FiltersConfig {
    #[serde(default = "builtins::default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Human-readable size such as `"5 MiB"` or plain bytes.
    #[serde(default)]
    pub size_limit: Option<String>,
    #[serde(default = "default_true")]
    pub use_ignore_file: bool,
    #[serde(default = "default_ignore_file_name")]
    pub ignore_file_name: String,
    #[serde(default)]
    pub follow_symlinks: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub textual_exts: Vec<String>,
    #[serde(default)]
    pub non_textual_exts: Vec<String>,
    #[serde(default)]
    pub rules_file: Option<String>,
    #[serde(default = "default_reload_interval")]
    pub reload_interval: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TreeConfig {
    #[serde(default = "builtins::default_tree_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
}

fn default_true() -> bool {
    true
}
fn default_output_dir() -> String {
    DEFAULT_OUTPUT_DIR.to_string()
}
fn default_output_formats() -> Vec<OutputFormat> {
    vec![OutputFormat::Txt]
}
fn default_ignore_file_name() -> String {
    DEFAULT_IGNORE_FILE.to_string()
}
fn default_reload_interval() -> String {
    DEFAULT_RELOAD_INTERVAL.to_string()
}
fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            output_formats: default_output_formats(),
            auto_zip: false,
            mode: RenderMode::default(),
            tree_depth: None,
        }
    }
}
impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            exclude_dirs: builtins::default_exclude_dirs(),
            include: Vec::new(),
            exclude: Vec::new(),
            size_limit: None,
            use_ignore_file: default_true(),
            ignore_file_name: default_ignore_file_name(),
            follow_symlinks: false,
        }
    }
}
impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            textual_exts: Vec::new(),
            non_textual_exts: Vec::new(),
            rules_file: None,
            reload_interval: default_reload_interval(),
        }
    }
}
impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}
impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            exclude_dirs: builtins::default_tree_exclude_dirs(),
        }
    }
}

fn expand_path(raw: &str) -> PathBuf {
    let home = || dirs::home_dir().map(|p| p.to_string_lossy().into_owned());
    PathBuf::from(shellexpand::tilde_with_context(raw.trim(), home).into_owned())
}

pub fn parse_size_limit(raw: &str) -> Result<u64> {
    Byte::from_str(raw.trim())
        .map(|b| b.as_u64())
        .map_err(|e| {
            AppError::Config(format!(
                "Invalid size limit '{}': {}. Use bytes or units like '500KB', '5 MiB'.",
                raw, e
            ))
        })
}

/// Parses durations such as `30s` or `2m`.
pub fn parse_duration_str(raw: &str) -> Result<Duration> {
    Ok(parse(raw.trim())?)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    pub fn resolve_config_path(
        base_dir: &Path,
        cli_config_file: Option<&String>,
        cli_disable_config: bool,
    ) -> Result<Option<PathBuf>> {
        if cli_disable_config {
            log::debug!("Config file loading disabled via CLI flag.");
            return Ok(None);
        }

        match cli_config_file {
            Some(p_str) => {
                let mut path = expand_path(p_str);
                if !path.exists() && path.extension().is_none() {
                    path.set_extension("toml");
                }
                if !path.exists() {
                    return Err(AppError::Config(format!(
                        "Specified config file not found at path: {}",
                        path.display()
                    )));
                }
                log::debug!("Using specified config file path: {}", path.display());
                Ok(Some(path))
            }
            None => {
                let default_path = base_dir
                    .join(DEFAULT_CONFIG_DIR)
                    .join(DEFAULT_CONFIG_FILENAME);
                if default_path.exists() {
                    log::debug!("Using default config file path: {}", default_path.display());
                    Ok(Some(default_path))
                } else {
                    log::debug!(
                        "No config file specified and default not found at: {}",
                        default_path.display()
                    );
                    Ok(None)
                }
            }
        }
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        log::info!("Loading configuration from: {}", config_path.display());
        let toml_content = fs::read_to_string(config_path).map_err(|e| AppError::FileRead {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&toml_content).map_err(|e| {
            AppError::TomlParse(format!(
                "Error parsing config file '{}': {}. Check TOML syntax and structure.",
                config_path.display(),
                e
            ))
        })
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str::<Config>(content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("Failed to serialize configuration: {}", e)))
    }

    /// Defaults, then the config file (if any), then environment overrides.
    /// CLI flags are applied afterwards by the caller.
    pub fn load(
        base_dir: &Path,
        cli_config_file: Option<&String>,
        cli_disable_config: bool,
    ) -> Result<Self> {
        let mut config = match Self::resolve_config_path(base_dir, cli_config_file, cli_disable_config)? {
            Some(path) => Self::load_from_path(&path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| env::var(key).ok())
    }

    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            log::debug!("{} overrides output_dir: {}", ENV_OUTPUT_DIR, dir);
            self.general.output_dir = dir;
        }
        if let Some(formats) = lookup(ENV_OUTPUT_FORMAT) {
            self.general.output_formats = crate::render::parse_formats(&formats)
                .map_err(|e| AppError::Config(format!("{}: {}", ENV_OUTPUT_FORMAT, e)))?;
        }
        if let Some(limit) = lookup(ENV_SIZE_LIMIT) {
            parse_size_limit(&limit)?;
            self.filters.size_limit = Some(limit);
        }
        if let Some(raw) = lookup(ENV_AUTO_ZIP) {
            self.general.auto_zip = parse_bool(&raw).ok_or_else(|| {
                AppError::Config(format!("{} must be true or false, got '{}'", ENV_AUTO_ZIP, raw))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan.concurrency == 0 {
            return Err(AppError::Config(
                "scan.concurrency must be at least 1".to_string(),
            ));
        }
        if self.general.output_formats.is_empty() {
            return Err(AppError::Config(
                "general.output_formats must name at least one format".to_string(),
            ));
        }
        self.size_limit_bytes()?;
        self.reload_interval()?;
        Ok(())
    }

    pub fn output_dir(&self) -> PathBuf {
        expand_path(&self.general.output_dir)
    }

    pub fn size_limit_bytes(&self) -> Result<Option<u64>> {
        self.filters
            .size_limit
            .as_deref()
            .map(parse_size_limit)
            .transpose()
    }

    pub fn reload_interval(&self) -> Result<Duration> {
        parse(&self.classifier.reload_interval).map_err(|e| {
            AppError::Config(format!(
                "Invalid reload interval '{}': {}. Use format like '30s', '5m'.",
                self.classifier.reload_interval, e
            ))
        })
    }

    /// Persisted classifier rules: `classifier.rules_file` when set, else
    /// `<user config dir>/repodigest/filetypes.json`.
    pub fn rules_file(&self) -> Option<PathBuf> {
        match self.classifier.rules_file.as_deref() {
            Some(raw) => Some(expand_path(raw)),
            None => dirs::config_dir().map(|d| d.join("repodigest").join(DEFAULT_RULES_FILENAME)),
        }
    }

    /// Requested formats, plus `zip` when `auto_zip` is set.
    pub fn effective_formats(&self) -> Vec<OutputFormat> {
        let mut formats = self.general.output_formats.clone();
        if self.general.auto_zip && !formats.contains(&OutputFormat::Zip) {
            formats.push(OutputFormat::Zip);
        }
        formats
    }

    pub fn filter_config(&self) -> Result<FilterConfig> {
        Ok(FilterConfig {
            exclude_dirs: self.filters.exclude_dirs.clone(),
            include: self.filters.include.clone(),
            exclude: self.filters.exclude.clone(),
            size_limit: self.size_limit_bytes()?,
            use_ignore_file: self.filters.use_ignore_file,
        })
    }

    pub fn rule_set(&self) -> RuleSet {
        RuleSet::new(&self.classifier.textual_exts, &self.classifier.non_textual_exts)
    }

    pub fn rules_provider(&self) -> Result<Option<FileRulesProvider>> {
        let Some(path) = self.rules_file() else {
            return Ok(None);
        };
        Ok(Some(
            FileRulesProvider::new(path, self.rule_set())
                .with_reload_interval(self.reload_interval()?),
        ))
    }

    /// A classifier backed by the persisted rules file, with the inline
    /// extension lists as the fallback while no such file exists.
    pub fn classifier(&self) -> Result<Classifier> {
        match self.rules_provider()? {
            Some(provider) => {
                log::debug!("Classifier rules file: {}", provider.path().display());
                Ok(Classifier::new(Arc::new(provider)))
            }
            None => Ok(Classifier::new(Arc::new(StaticRules::new(self.rule_set())))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.general.output_formats, vec![OutputFormat::Txt]);
        assert_eq!(config.scan.concurrency, 200);
        assert!(config.filters.exclude_dirs.iter().any(|d| d == ".git"));
        assert!(config.filters.use_ignore_file);
        assert_eq!(config.reload_interval().unwrap(), Duration::from_secs(60));
        assert_eq!(config.size_limit_bytes().unwrap(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_sections_and_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [general]
            output_formats = ["md", "json"]
            mode = "lite"
            auto_zip = true

            [filters]
            include = ["*.py"]
            size_limit = "1 KiB"

            [classifier]
            textual_exts = ["XYZ"]
            "#,
        )
        .unwrap();
        assert_eq!(config.general.mode, RenderMode::Lite);
        assert_eq!(
            config.effective_formats(),
            vec![OutputFormat::Md, OutputFormat::Json, OutputFormat::Zip]
        );
        let filter = config.filter_config().unwrap();
        assert_eq!(filter.size_limit, Some(1024));
        assert_eq!(filter.include, vec!["*.py".to_string()]);
        assert!(filter.exclude_dirs.iter().any(|d| d == "node_modules"));
        assert!(config.rule_set().is_whitelisted(".xyz"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(Config::from_toml_str("[filters]\nbogus = 1\n").is_err());
        assert!(Config::from_toml_str("[nope]\n").is_err());
    }

    #[test]
    fn env_overrides_apply_on_top() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_OUTPUT_DIR, "/tmp/digests"),
            (ENV_OUTPUT_FORMAT, "txt,zip"),
            (ENV_SIZE_LIMIT, "2048"),
            (ENV_AUTO_ZIP, "yes"),
        ]);
        let mut config = Config::default();
        config
            .apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.output_dir(), PathBuf::from("/tmp/digests"));
        assert_eq!(
            config.general.output_formats,
            vec![OutputFormat::Txt, OutputFormat::Zip]
        );
        assert_eq!(config.size_limit_bytes().unwrap(), Some(2048));
        assert!(config.general.auto_zip);
    }

    #[test]
    fn bad_env_values_are_config_errors() {
        let mut config = Config::default();
        let result = config.apply_overrides_from(|k| (k == ENV_AUTO_ZIP).then(|| "maybe".to_string()));
        assert!(matches!(result, Err(AppError::Config(_))));
        let result = config.apply_overrides_from(|k| (k == ENV_SIZE_LIMIT).then(|| "lots".to_string()));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut config = Config::default();
        config.scan.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.classifier.reload_interval = "soon".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration_str(" 2m ").unwrap(), Duration::from_secs(120));
        assert!(matches!(parse_duration_str("later"), Err(AppError::DurationParse(_))));
    }

    #[test]
    fn config_path_resolution() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Config::resolve_config_path(dir.path(), None, false).unwrap(), None);

        let default_path = dir.path().join(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_FILENAME);
        fs::create_dir_all(default_path.parent().unwrap()).unwrap();
        fs::write(&default_path, "[scan]\nconcurrency = 8\n").unwrap();
        assert_eq!(
            Config::resolve_config_path(dir.path(), None, false).unwrap(),
            Some(default_path.clone())
        );
        assert_eq!(Config::resolve_config_path(dir.path(), None, true).unwrap(), None);
        assert_eq!(Config::load_from_path(&default_path).unwrap().scan.concurrency, 8);

        let missing = dir.path().join("missing.toml").to_string_lossy().into_owned();
        assert!(Config::resolve_config_path(dir.path(), Some(&missing), false).is_err());
    }

    #[test]
    fn malformed_config_file_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[general\n").unwrap();
        assert!(matches!(Config::load_from_path(&path), Err(AppError::TomlParse(_))));
    }

    #[test]
    fn classifier_uses_configured_rules_file() {
        let dir = TempDir::new().unwrap();
        let rules_path = dir.path().join("rules.json");
        fs::write(&rules_path, r#"{"textual_exts": [".bin"], "non_textual_exts": []}"#).unwrap();
        fs::write(dir.path().join("blob.bin"), [0u8, 1, 2]).unwrap();

        let mut config = Config::default();
        config.classifier.rules_file = Some(rules_path.to_string_lossy().into_owned());
        assert_eq!(config.rules_file(), Some(rules_path));
        let classifier = config.classifier().unwrap();
        assert!(classifier.classify(&dir.path().join("blob.bin")).is_textual());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = Config::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), config);
    }
}
