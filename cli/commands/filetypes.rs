use crate::cli_args::{FiletypesAction, FiletypesArgs};
use crate::load_config;
use anyhow::{Result, anyhow};
use colored::*;
use repodigest_core::classify::normalize_ext;
use repodigest_core::{FileRulesProvider, RulesProvider};

pub fn handle_filetypes_command(args: FiletypesArgs, quiet: bool) -> Result<()> {
    let config = load_config(&args.config_opts)?;
    let provider = config.rules_provider()?.ok_or_else(|| {
        anyhow!("No rules file location available; set classifier.rules_file in the config")
    })?;
    log::debug!("Using rules file {}", provider.path().display());

    match &args.action {
        FiletypesAction::AddTextual { exts } => {
            apply(&provider, exts, quiet, "textual", FileRulesProvider::add_textual_ext)
        }
        FiletypesAction::AddNonTextual { exts } => apply(
            &provider,
            exts,
            quiet,
            "non-textual",
            FileRulesProvider::add_non_textual_ext,
        ),
        FiletypesAction::Remove { exts } => {
            apply(&provider, exts, quiet, "removed", FileRulesProvider::remove_ext)
        }
        FiletypesAction::List => {
            let rules = provider.rules();
            println!("{}", " Textual (whitelist) ".green().bold().underline());
            for ext in &rules.textual_exts {
                println!("  {}", ext.cyan());
            }
            println!("{}", " Non-textual (blacklist) ".yellow().bold().underline());
            for ext in &rules.non_textual_exts {
                println!("  {}", ext.cyan());
            }
            if !quiet {
                println!("\n{}", provider.path().display().to_string().dimmed());
            }
            Ok(())
        }
    }
}

fn apply<F>(
    provider: &FileRulesProvider,
    exts: &[String],
    quiet: bool,
    label: &str,
    change: F,
) -> Result<()>
where
    F: Fn(&FileRulesProvider, &str) -> repodigest_core::Result<bool>,
{
    for ext in exts {
        let changed = change(provider, ext)?;
        if quiet {
            continue;
        }
        let ext = normalize_ext(ext);
        if changed {
            println!("{} {} → {}", "✅".green(), ext.cyan(), label);
        } else {
            println!("{} {} unchanged", "·".dimmed(), ext.cyan());
        }
    }
    Ok(())
}
