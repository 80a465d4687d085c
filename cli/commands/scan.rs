use crate::cli_args::ScanArgs;
use crate::load_config;
use crate::output::{print_no_valid_files, print_scan_report, print_skipped_table};
use anyhow::{Context, Result, bail};
use repodigest_core::config::{parse_duration_str, parse_size_limit};
use repodigest_core::render::parse_formats;
use repodigest_core::{CancellationToken, Config, RenderMode, ScanOutcome, ScanRequest, acquire, run_scan};
use std::thread;

pub fn handle_scan_command(args: ScanArgs, quiet: bool) -> Result<()> {
    let mut config = load_config(&args.config_opts)?;
    apply_scan_overrides(&mut config, &args)?;
    config
        .validate()
        .context("Invalid configuration after applying command-line flags")?;
    log::trace!("Effective scan config: {:?}", config);

    // Keeps any temporary clone alive until rendering is done.
    let source = acquire(&args.source, args.branch.as_deref())
        .with_context(|| format!("Failed to acquire source '{}'", args.source))?;
    log::info!("Scanning {}", source.scan_root().display());

    let request = ScanRequest::from_config(&config, &source)?;
    let classifier = config.classifier()?;
    let cancel = CancellationToken::new();
    if let Some(raw) = &args.timeout {
        let timeout = parse_duration_str(raw).context("Invalid --timeout value")?;
        let watchdog = cancel.clone();
        thread::spawn(move || {
            thread::sleep(timeout);
            log::warn!("Scan timed out after {:?}, cancelling.", timeout);
            watchdog.cancel();
        });
    }

    let outcome = run_scan(&request, &classifier, &cancel).context("Scan failed")?;
    match &outcome {
        ScanOutcome::Completed(report) => {
            print_scan_report(report, quiet);
            if report.build.outputs.is_empty() {
                bail!("Every requested output format failed to render");
            }
        }
        ScanOutcome::NoValidFiles { scan } => print_no_valid_files(scan, quiet),
    }
    if args.show_skipped {
        print_skipped_table(&outcome.scan().skipped);
    }
    Ok(())
}

fn apply_scan_overrides(config: &mut Config, args: &ScanArgs) -> Result<()> {
    log::trace!("Applying scan command CLI overrides to config...");
    let output = &args.output;
    if let Some(dir) = &output.output_dir {
        config.general.output_dir = dir.clone();
    }
    if let Some(formats) = &output.format {
        config.general.output_formats = parse_formats(formats)?;
    }
    if output.zip {
        config.general.auto_zip = true;
    }
    if output.lite {
        config.general.mode = RenderMode::Lite;
    }
    if output.tree_depth.is_some() {
        config.general.tree_depth = output.tree_depth;
    }

    let filters = &args.filters;
    if !filters.include.is_empty() {
        config.filters.include = filters.include.clone();
    }
    config.filters.exclude.extend(filters.exclude.iter().cloned());
    config.filters.exclude_dirs.extend(filters.exclude_dir.iter().cloned());
    if let Some(limit) = &filters.size_limit {
        parse_size_limit(limit)?;
        config.filters.size_limit = Some(limit.clone());
    }
    if filters.no_ignore_file {
        config.filters.use_ignore_file = false;
    }
    if filters.follow_symlinks {
        config.filters.follow_symlinks = true;
    }
    if let Some(concurrency) = args.concurrency {
        config.scan.concurrency = concurrency;
    }
    Ok(())
}
