use crate::classify::Subcategory;
use crate::error::Result;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Default, Deserialize)]
pub struct BuiltinFiletypes {
    #[serde(default)]
    pub textual: HashMap<Subcategory, Vec<String>>,
    #[serde(default)]
    pub filenames: HashMap<String, Subcategory>,
    #[serde(default)]
    pub non_textual: HashMap<Subcategory, Vec<String>>,
    #[serde(default)]
    pub exclude_dirs: Vec<String>,
    #[serde(default)]
    pub tree_exclude_dirs: Vec<String>,
}

/// Extension lookup tables flattened out of [`BuiltinFiletypes`].
#[derive(Debug, Default)]
pub struct ExtensionTables {
    pub textual: HashMap<String, Subcategory>,
    pub non_textual: HashMap<String, Subcategory>,
}

static BUILTIN_FILETYPES: Lazy<BuiltinFiletypes> = Lazy::new(|| {
    let yaml_content = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../data/builtin_filetypes.yaml"
    ));
    parse_filetypes(yaml_content).expect("Failed to parse embedded data/builtin_filetypes.yaml")
});

static EXTENSION_TABLES: Lazy<ExtensionTables> = Lazy::new(|| {
    let builtin = get_builtin_filetypes();
    let flatten = |groups: &HashMap<Subcategory, Vec<String>>| {
        groups
            .iter()
            .flat_map(|(subcat, exts)| exts.iter().map(move |ext| (ext.to_lowercase(), *subcat)))
            .collect::<HashMap<_, _>>()
    };
    ExtensionTables {
        textual: flatten(&builtin.textual),
        non_textual: flatten(&builtin.non_textual),
    }
});

pub fn parse_filetypes(yaml_content: &str) -> Result<BuiltinFiletypes> {
    Ok(serde_yml::from_str(yaml_content)?)
}

pub fn get_builtin_filetypes() -> &'static BuiltinFiletypes {
    &BUILTIN_FILETYPES
}

pub fn get_extension_tables() -> &'static ExtensionTables {
    &EXTENSION_TABLES
}

pub fn default_exclude_dirs() -> Vec<String> {
    get_builtin_filetypes().exclude_dirs.clone()
}

pub fn default_tree_exclude_dirs() -> Vec<String> {
    get_builtin_filetypes().tree_exclude_dirs.clone()
}

/// Subcategory for a textual extension, e.g. `.rs` -> `code`.
pub fn textual_subcategory_for_ext(ext: &str) -> Option<Subcategory> {
    get_extension_tables().textual.get(ext).copied()
}

pub fn non_textual_subcategory_for_ext(ext: &str) -> Option<Subcategory> {
    get_extension_tables().non_textual.get(ext).copied()
}

/// Well-known extensionless or dot-named files (`Makefile`, `LICENSE`, `.gitignore`).
pub fn textual_subcategory_for_filename(file_name: &str) -> Option<Subcategory> {
    get_builtin_filetypes()
        .filenames
        .get(&file_name.to_lowercase())
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_tables_parse() {
        let builtin = get_builtin_filetypes();
        assert!(builtin.exclude_dirs.iter().any(|d| d == "node_modules"));
        assert!(builtin.tree_exclude_dirs.iter().any(|d| d == ".git"));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(parse_filetypes("textual: [not, a, map").is_err());
        assert!(parse_filetypes("textual:\n  nonsense: [.x]\n").is_err());
    }

    #[test]
    fn extension_lookup() {
        assert_eq!(textual_subcategory_for_ext(".rs"), Some(Subcategory::Code));
        assert_eq!(textual_subcategory_for_ext(".md"), Some(Subcategory::Docs));
        assert_eq!(textual_subcategory_for_ext(".toml"), Some(Subcategory::Config));
        assert_eq!(textual_subcategory_for_ext(".csv"), Some(Subcategory::Csv));
        assert_eq!(non_textual_subcategory_for_ext(".png"), Some(Subcategory::Image));
        assert_eq!(non_textual_subcategory_for_ext(".mp4"), Some(Subcategory::Media));
        assert_eq!(non_textual_subcategory_for_ext(".exe"), Some(Subcategory::Binary));
        assert_eq!(textual_subcategory_for_ext(".png"), None);
    }

    #[test]
    fn filename_lookup_is_case_insensitive() {
        assert_eq!(
            textual_subcategory_for_filename("Dockerfile"),
            Some(Subcategory::Config)
        );
        assert_eq!(
            textual_subcategory_for_filename("LICENSE"),
            Some(Subcategory::Docs)
        );
        assert_eq!(textual_subcategory_for_filename("unknown"), None);
    }
}
