use super::{OutputFormat, RenderInput};
use crate::error::{AppError, Result};
use crate::summary::{Summary, format_size};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Bundles already-rendered outputs, copies of non-textual assets and
/// generated metadata into one archive:
///
/// ```text
/// outputs/<format dir>/<file>
/// assets/<relative path>
/// summary.json
/// manifest.json
/// README.md
/// ```
#[derive(Debug, Clone, Default)]
pub struct ZipBundle {
    outputs: Vec<(OutputFormat, PathBuf)>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ManifestEntry {
    Output {
        name: String,
        size_bytes: u64,
        size_human: String,
    },
    Asset {
        path: String,
        size_bytes: u64,
        size_human: String,
    },
}

#[derive(Debug, Serialize)]
struct BundleSummary<'a> {
    repo: &'a str,
    url: Option<&'a str>,
    generated_at: String,
    mode: String,
    files: Vec<String>,
    non_textual_assets: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a Summary>,
}

impl ZipBundle {
    pub fn new(outputs: Vec<(OutputFormat, PathBuf)>) -> Self {
        Self { outputs }
    }

    pub fn outputs(&self) -> &[(OutputFormat, PathBuf)] {
        &self.outputs
    }

    pub fn render(&self, input: &RenderInput, out_dir: &Path) -> Result<PathBuf> {
        let stamp = input.metadata.generated_at.format("%Y%m%d-%H%M%S");
        let zip_path = out_dir.join(format!("{}-{}.zip", input.metadata.name, stamp));
        match self.write_archive(&zip_path, input) {
            Ok(()) => Ok(zip_path),
            Err(e) => {
                log::error!("Zip bundle failed, removing {}: {}", zip_path.display(), e);
                let _ = fs::remove_file(&zip_path);
                Err(e)
            }
        }
    }

    fn write_archive(&self, zip_path: &Path, input: &RenderInput) -> Result<()> {
        let file = File::create(zip_path).map_err(|e| AppError::FileWrite {
            path: zip_path.to_path_buf(),
            source: e,
        })?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut manifest = Vec::new();
        let mut bundled_outputs = Vec::new();

        for (format, path) in &self.outputs {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let entry_name = format!("outputs/{}/{}", format.subdir(), name);
            let Some(size) = copy_into(&mut zip, path, &entry_name, options)? else {
                continue;
            };
            manifest.push(ManifestEntry::Output {
                name,
                size_bytes: size,
                size_human: format_size(size),
            });
            bundled_outputs.push(entry_name);
        }

        let mut bundled_assets = Vec::new();
        for asset in &input.assets {
            let entry_name = format!("assets/{}", asset.relative_path);
            let Some(size) = copy_into(&mut zip, &asset.source_path, &entry_name, options)? else {
                continue;
            };
            manifest.push(ManifestEntry::Asset {
                path: asset.relative_path.clone(),
                size_bytes: size,
                size_human: format_size(size),
            });
            bundled_assets.push(asset.relative_path.as_str());
        }

        let meta = &input.metadata;
        let summary = BundleSummary {
            repo: &meta.name,
            url: meta.url.as_deref(),
            generated_at: meta.generated_at_display(),
            mode: input.mode.to_string(),
            files: bundled_outputs,
            non_textual_assets: bundled_assets,
            summary: (!input.mode.is_lite()).then_some(&input.summary),
        };
        zip.start_file("summary.json", options)?;
        zip.write_all(serde_json::to_string_pretty(&summary)?.as_bytes())?;

        zip.start_file("manifest.json", options)?;
        zip.write_all(serde_json::to_string_pretty(&manifest)?.as_bytes())?;

        zip.start_file("README.md", options)?;
        zip.write_all(bundle_readme(input).as_bytes())?;

        zip.finish()?;
        log::debug!(
            "Zip bundle {} holds {} entries",
            zip_path.display(),
            manifest.len() + 3
        );
        Ok(())
    }
}

/// Streams `source` into a new archive entry. A source that can no longer be
/// opened is skipped with a warning; failures while writing the archive are errors.
fn copy_into(
    zip: &mut ZipWriter<File>,
    source: &Path,
    entry_name: &str,
    options: SimpleFileOptions,
) -> Result<Option<u64>> {
    let mut reader = match File::open(source) {
        Ok(reader) => reader,
        Err(e) => {
            log::warn!("Skipping {} in zip bundle: {}", source.display(), e);
            return Ok(None);
        }
    };
    zip.start_file(entry_name, options)?;
    let size = io::copy(&mut reader, zip).map_err(|e| AppError::Zip(format!(
        "Failed to add {} to archive: {}",
        source.display(),
        e
    )))?;
    log::trace!("Bundled {} as {}", source.display(), entry_name);
    Ok(Some(size))
}

fn bundle_readme(input: &RenderInput) -> String {
    let meta = &input.metadata;
    let mut lines = vec![
        format!("# Repodigest Bundle for `{}`\n", meta.name),
        format!("- Generated at: `{}`", meta.generated_at_display()),
    ];
    if let Some(url) = &meta.url {
        lines.push(format!("- Repository: [{}]({})", url, url));
    }
    lines.extend([
        "\n## Structure".to_string(),
        "- `outputs/`: Rendered reports (`.txt`, `.md`, `.json`)".to_string(),
        "- `assets/`: Non-textual files copied verbatim (images, media, binaries)".to_string(),
        "- `summary.json`: Bundle metadata and scan statistics".to_string(),
        "- `manifest.json`: Every bundled file with its size".to_string(),
        "- `README.md`: This file".to_string(),
    ]);
    lines.join("\n") + "\n"
}
