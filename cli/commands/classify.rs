use crate::cli_args::ClassifyArgs;
use crate::load_config;
use crate::output::print_classification;
use anyhow::{Context, Result, bail};
use repodigest_core::Classification;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct ClassifiedPath {
    path: PathBuf,
    #[serde(flatten)]
    classification: Classification,
}

pub fn handle_classify_command(args: ClassifyArgs) -> Result<()> {
    let config = load_config(&args.config_opts)?;
    let classifier = config.classifier()?;

    let mut results = Vec::with_capacity(args.paths.len());
    for path in &args.paths {
        if !path.is_file() {
            bail!("Not a file: {}", path.display());
        }
        let classification = classifier.classify(path);
        log::debug!("{} classified as {}", path.display(), classification);
        results.push(ClassifiedPath {
            path: path.clone(),
            classification,
        });
    }

    if args.json {
        let json = serde_json::to_string_pretty(&results)
            .context("Failed to serialize classification results")?;
        println!("{}", json);
    } else {
        for result in &results {
            print_classification(&result.path, &result.classification);
        }
    }
    Ok(())
}
