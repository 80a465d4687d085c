use crate::classify::Subcategory;
use crate::error::AppError;
use crate::scanner::FileRecord;
use byte_unit::{Byte, UnitType};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tiktoken_rs::{CoreBPE, cl100k_base};

static TOKENIZER: Lazy<Option<CoreBPE>> = Lazy::new(|| match cl100k_base() {
    Ok(bpe) => Some(bpe),
    Err(e) => {
        log::warn!(
            "{}. Falling back to a characters/4 estimate.",
            AppError::Tokenizer(e.to_string())
        );
        None
    }
});

/// Estimated token count: cl100k when available, otherwise characters / 4.
pub fn estimate_tokens(content: &str) -> usize {
    if let Some(bpe) = TOKENIZER.as_ref() {
        return bpe.encode_ordinary(content).len();
    }
    content.chars().count() / 4
}

/// Aggregate statistics over one scan. Derived, never authoritative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total_files: usize,
    pub total_size: u64,
    pub total_size_human: String,
    pub file_type_breakdown: BTreeMap<Subcategory, usize>,
    pub tokens_by_type: BTreeMap<Subcategory, usize>,
    pub estimated_tokens: usize,
    /// Per-file token estimates keyed by relative path.
    #[serde(skip)]
    pub file_tokens: BTreeMap<PathBuf, usize>,
}

struct Tally {
    relative_path: PathBuf,
    subcategory: Subcategory,
    size: u64,
    tokens: Option<usize>,
}

pub fn summarize(textual: &[FileRecord], non_textual: &[FileRecord]) -> Summary {
    log::debug!(
        "Summarizing {} textual and {} non-textual files",
        textual.len(),
        non_textual.len()
    );
    let textual_tallies: Vec<Option<Tally>> = textual
        .par_iter()
        .map(|record| match fs::read(&record.path) {
            Ok(bytes) => {
                let content = String::from_utf8_lossy(&bytes);
                Some(Tally {
                    relative_path: record.relative_path.clone(),
                    subcategory: record.classification.subcategory,
                    size: bytes.len() as u64,
                    tokens: Some(estimate_tokens(&content)),
                })
            }
            Err(e) => {
                log::debug!("{} vanished before summary: {}", record.path.display(), e);
                None
            }
        })
        .collect();

    let asset_tallies = non_textual.iter().map(|record| match fs::metadata(&record.path) {
        Ok(meta) => Some(Tally {
            relative_path: record.relative_path.clone(),
            subcategory: record.classification.subcategory,
            size: meta.len(),
            tokens: None,
        }),
        Err(e) => {
            log::debug!("{} vanished before summary: {}", record.path.display(), e);
            None
        }
    });

    let mut summary = Summary::default();
    for tally in textual_tallies.into_iter().chain(asset_tallies).flatten() {
        summary.total_files += 1;
        summary.total_size += tally.size;
        *summary
            .file_type_breakdown
            .entry(tally.subcategory)
            .or_insert(0) += 1;
        if let Some(tokens) = tally.tokens {
            summary.estimated_tokens += tokens;
            *summary.tokens_by_type.entry(tally.subcategory).or_insert(0) += tokens;
            summary.file_tokens.insert(tally.relative_path, tokens);
        }
    }
    summary.total_size_human = format_size(summary.total_size);
    summary
}

pub fn format_size(bytes: u64) -> String {
    Byte::from_u64(bytes)
        .get_appropriate_unit(UnitType::Binary)
        .to_string()
}

/// `950` -> `950`, `1234` -> `1.2k`, `3_400_000` -> `3.4M`.
pub fn format_number_short(n: usize) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}k", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classification;
    use std::path::Path;
    use tempfile::TempDir;

    fn record(dir: &Path, rel: &str, bytes: &[u8], classification: Classification) -> FileRecord {
        let path = dir.join(rel);
        fs::write(&path, bytes).unwrap();
        FileRecord {
            path,
            relative_path: PathBuf::from(rel),
            size: bytes.len() as u64,
            classification,
        }
    }

    #[test]
    fn counts_sizes_and_tokens() {
        let dir = TempDir::new().unwrap();
        let textual = vec![
            record(dir.path(), "a.py", b"print('hello world')", Classification::textual(Subcategory::Code)),
            record(dir.path(), "b.md", b"# Title", Classification::textual(Subcategory::Docs)),
        ];
        let assets = vec![record(
            dir.path(),
            "c.png",
            b"\x89PNG\0",
            Classification::non_textual(Subcategory::Image),
        )];

        let summary = summarize(&textual, &assets);
        assert_eq!(summary.total_files, 3);
        assert_eq!(summary.total_size, 20 + 7 + 5);
        assert_eq!(summary.file_type_breakdown[&Subcategory::Image], 1);
        assert_eq!(summary.file_type_breakdown[&Subcategory::Code], 1);
        assert!(summary.estimated_tokens > 0);
        assert!(!summary.tokens_by_type.contains_key(&Subcategory::Image));
        assert_eq!(
            summary.tokens_by_type.values().sum::<usize>(),
            summary.estimated_tokens
        );
        assert_eq!(summary.file_tokens.len(), 2);
    }

    #[test]
    fn vanished_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        let kept = record(dir.path(), "kept.txt", b"still here", Classification::textual(Subcategory::Docs));
        let gone = record(dir.path(), "gone.txt", b"bye", Classification::textual(Subcategory::Docs));
        fs::remove_file(&gone.path).unwrap();

        let summary = summarize(&[kept, gone], &[]);
        assert_eq!(summary.total_files, 1);
        assert_eq!(summary.total_size, 10);
    }

    #[test]
    fn summary_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let textual = vec![record(
            dir.path(),
            "main.rs",
            b"fn main() { println!(\"hi\"); }",
            Classification::textual(Subcategory::Code),
        )];
        let first = serde_json::to_string(&summarize(&textual, &[])).unwrap();
        let second = serde_json::to_string(&summarize(&textual, &[])).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn token_estimates_agree_across_threads() {
        let text = "fn main() { println!(\"hello\"); }";
        let expected = estimate_tokens(text);
        let counts: Vec<usize> = (0..16).into_par_iter().map(|_| estimate_tokens(text)).collect();
        assert!(expected > 0);
        assert!(counts.iter().all(|&n| n == expected));
    }

    #[test]
    fn short_number_formatting() {
        assert_eq!(format_number_short(950), "950");
        assert_eq!(format_number_short(1234), "1.2k");
        assert_eq!(format_number_short(3_400_000), "3.4M");
    }

    #[test]
    fn size_formatting_uses_binary_units() {
        assert_eq!(format_size(0), "0 B");
        assert!(format_size(2048).contains("KiB"));
    }
}
