//! Scan-scoped output directories and multi-format builds.

use crate::error::{AppError, Result};
use crate::render::{OutputFormat, RenderInput, Renderer, ZipBundle};
use indexmap::IndexMap;
use rayon::prelude::*;
use std::fs;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub scan_id: String,
    pub scan_dir: PathBuf,
    /// Written files in request order.
    pub outputs: IndexMap<OutputFormat, PathBuf>,
    pub failures: Vec<(OutputFormat, String)>,
}

impl BuildReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Renders one [`RenderInput`] into `<output_dir>/<scan_id>/<format dir>/`.
#[derive(Debug, Clone)]
pub struct OutputBuilder {
    output_dir: PathBuf,
    scan_id: String,
    formats: Vec<OutputFormat>,
}

impl OutputBuilder {
    pub fn new(output_dir: impl Into<PathBuf>, formats: Vec<OutputFormat>) -> Self {
        Self {
            output_dir: output_dir.into(),
            scan_id: Uuid::new_v4().to_string(),
            formats,
        }
    }

    pub fn with_scan_id(mut self, scan_id: impl Into<String>) -> Self {
        self.scan_id = scan_id.into();
        self
    }

    pub fn scan_id(&self) -> &str {
        &self.scan_id
    }

    pub fn scan_dir(&self) -> PathBuf {
        self.output_dir.join(&self.scan_id)
    }

    /// Primary formats render concurrently, each into its own subfolder. The zip
    /// bundle, if requested, runs afterwards over whatever they produced. A failed
    /// format is recorded in the report and does not affect the others.
    pub fn build(&self, input: &RenderInput) -> Result<BuildReport> {
        validate_scan_id(&self.scan_id)?;
        let scan_dir = self.scan_dir();
        fs::create_dir_all(&scan_dir).map_err(|e| AppError::DirCreation {
            path: scan_dir.clone(),
            source: e,
        })?;
        log::debug!(
            "Building {:?} for scan {} in {}",
            self.formats,
            self.scan_id,
            scan_dir.display()
        );

        let primary: Vec<OutputFormat> = self
            .formats
            .iter()
            .copied()
            .filter(|f| *f != OutputFormat::Zip)
            .collect();
        let results: Vec<(OutputFormat, Result<PathBuf>)> = primary
            .par_iter()
            .map(|format| {
                let out_dir = scan_dir.join(format.subdir());
                (*format, Renderer::for_format(*format).render(input, &out_dir))
            })
            .collect();

        let mut outputs = IndexMap::new();
        let mut failures = Vec::new();
        for (format, result) in results {
            match result {
                Ok(path) => {
                    outputs.insert(format, path);
                }
                Err(e) => {
                    log::error!("Failed to render {} output: {}", format, e);
                    failures.push((format, e.to_string()));
                }
            }
        }

        if self.formats.contains(&OutputFormat::Zip) {
            let bundled: Vec<(OutputFormat, PathBuf)> =
                outputs.iter().map(|(f, p)| (*f, p.clone())).collect();
            let renderer = Renderer::Zip(ZipBundle::new(bundled));
            match renderer.render(input, &scan_dir.join(OutputFormat::Zip.subdir())) {
                Ok(path) => {
                    outputs.insert(OutputFormat::Zip, path);
                }
                Err(e) => {
                    log::error!("Failed to build zip bundle: {}", e);
                    failures.push((OutputFormat::Zip, e.to_string()));
                }
            }
        }

        Ok(BuildReport {
            scan_id: self.scan_id.clone(),
            scan_dir,
            outputs,
            failures,
        })
    }
}

fn validate_scan_id(scan_id: &str) -> Result<()> {
    let mut components = Path::new(scan_id).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if scan_id.is_empty() || !single_normal || scan_id.contains(['/', '\\']) {
        return Err(AppError::InvalidArgument(format!(
            "Invalid scan id '{}'",
            scan_id
        )));
    }
    Ok(())
}

/// Removes `<output_dir>/<scan_id>`. Returns whether anything was deleted;
/// calling it again for the same id is not an error.
pub fn cleanup_scan_output(output_dir: &Path, scan_id: &str) -> Result<bool> {
    validate_scan_id(scan_id)?;
    let scan_dir = output_dir.join(scan_id);
    if !scan_dir.exists() {
        log::debug!("Nothing to clean up at {}", scan_dir.display());
        return Ok(false);
    }
    fs::remove_dir_all(&scan_dir)?;
    log::info!("Removed scan output {}", scan_dir.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderMode;
    use crate::render::test_support::sample_input;
    use tempfile::TempDir;

    #[test]
    fn each_format_gets_its_own_folder() {
        let dir = TempDir::new().unwrap();
        let builder = OutputBuilder::new(
            dir.path(),
            vec![OutputFormat::Md, OutputFormat::Txt, OutputFormat::Zip],
        )
        .with_scan_id("scan-1");
        let report = builder.build(&sample_input(RenderMode::Rich)).unwrap();

        assert!(report.is_complete());
        let scan_dir = dir.path().join("scan-1");
        assert_eq!(report.outputs[&OutputFormat::Md], scan_dir.join("md/demo.md"));
        assert_eq!(report.outputs[&OutputFormat::Txt], scan_dir.join("text/demo.txt"));
        let zip = &report.outputs[&OutputFormat::Zip];
        assert!(zip.starts_with(scan_dir.join("zips")));
        assert!(zip.exists());
        let order: Vec<OutputFormat> = report.outputs.keys().copied().collect();
        assert_eq!(order, vec![OutputFormat::Md, OutputFormat::Txt, OutputFormat::Zip]);
    }

    #[test]
    fn generated_scan_ids_are_unique() {
        let a = OutputBuilder::new("/tmp", vec![OutputFormat::Txt]);
        let b = OutputBuilder::new("/tmp", vec![OutputFormat::Txt]);
        assert_ne!(a.scan_id(), b.scan_id());
    }

    #[test]
    fn a_failing_format_does_not_stop_the_others() {
        let dir = TempDir::new().unwrap();
        // A file where the json folder should go.
        fs::create_dir_all(dir.path().join("s")).unwrap();
        fs::write(dir.path().join("s/json"), "blocker").unwrap();

        let report = OutputBuilder::new(dir.path(), vec![OutputFormat::Json, OutputFormat::Txt])
            .with_scan_id("s")
            .build(&sample_input(RenderMode::Lite))
            .unwrap();
        assert!(report.outputs.contains_key(&OutputFormat::Txt));
        assert!(!report.outputs.contains_key(&OutputFormat::Json));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, OutputFormat::Json);
    }

    #[test]
    fn cleanup_is_idempotent() {
        let dir = TempDir::new().unwrap();
        OutputBuilder::new(dir.path(), vec![OutputFormat::Txt])
            .with_scan_id("abc")
            .build(&sample_input(RenderMode::Rich))
            .unwrap();
        assert!(cleanup_scan_output(dir.path(), "abc").unwrap());
        assert!(!dir.path().join("abc").exists());
        assert!(!cleanup_scan_output(dir.path(), "abc").unwrap());
    }

    #[test]
    fn cleanup_rejects_path_like_ids() {
        let dir = TempDir::new().unwrap();
        for bad in ["", "..", "a/b", "../x", "/abs", "."] {
            assert!(
                matches!(cleanup_scan_output(dir.path(), bad), Err(AppError::InvalidArgument(_))),
                "accepted {:?}",
                bad
            );
        }
    }
}
