//! Resolves a source string to a local directory to scan.
//!
//! Local paths are used in place. GitHub URLs are shallow-cloned into a
//! temporary directory owned by the returned [`AcquiredSource`]; dropping it
//! removes the clone.

use crate::error::{AppError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use url::Url;

pub const DEFAULT_BRANCH: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubRepo {
    pub owner: String,
    pub repo: String,
    /// Branch named in a `/tree/<branch>` URL.
    pub branch: Option<String>,
    pub subdir: Option<String>,
    pub ssh: bool,
}

impl GithubRepo {
    pub fn web_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.repo)
    }

    pub fn clone_url(&self) -> String {
        if self.ssh {
            format!("git@github.com:{}/{}.git", self.owner, self.repo)
        } else {
            format!("https://github.com/{}/{}.git", self.owner, self.repo)
        }
    }
}

pub fn is_remote_source(source: &str) -> bool {
    let s = source.trim();
    s.starts_with("git@") || s.starts_with("https://") || s.starts_with("http://") || s.starts_with("github.com/")
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim_matches('/');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn parse_github_url(source: &str) -> Result<GithubRepo> {
    let source = source.trim();
    if let Some(rest) = source.strip_prefix("git@") {
        let (host, path) = rest.split_once(':').ok_or_else(|| {
            AppError::Acquisition(format!("Malformed SSH repository URL: {}", source))
        })?;
        if host != "github.com" {
            return Err(AppError::Acquisition(format!(
                "Unsupported repository host '{}'. Only github.com is supported",
                host
            )));
        }
        let (owner, repo) = path.trim_matches('/').split_once('/').ok_or_else(|| {
            AppError::Acquisition(format!("Invalid GitHub repository URL: {}", source))
        })?;
        return Ok(GithubRepo {
            owner: owner.to_string(),
            repo: repo.trim_end_matches(".git").to_string(),
            branch: None,
            subdir: None,
            ssh: true,
        });
    }

    let with_scheme = if source.starts_with("github.com/") {
        format!("https://{}", source)
    } else {
        source.to_string()
    };
    let url = Url::parse(&with_scheme)
        .map_err(|e| AppError::Acquisition(format!("Invalid repository URL '{}': {}", source, e)))?;
    match url.host_str() {
        Some("github.com") | Some("www.github.com") => {}
        other => {
            return Err(AppError::Acquisition(format!(
                "Unsupported repository host '{}'. Only github.com is supported",
                other.unwrap_or_default()
            )));
        }
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();
    if segments.len() < 2 {
        return Err(AppError::Acquisition(format!(
            "Invalid GitHub repository URL, expected github.com/<owner>/<repo>: {}",
            source
        )));
    }

    let (branch, subdir) = if segments.len() >= 4 && segments[2] == "tree" {
        (Some(segments[3].to_string()), non_empty(&segments[4..].join("/")))
    } else {
        (None, None)
    };
    Ok(GithubRepo {
        owner: segments[0].to_string(),
        repo: segments[1].trim_end_matches(".git").to_string(),
        branch,
        subdir,
        ssh: false,
    })
}

/// `https://github.com/<owner>/<repo>/blob/<branch>/<subdir/><path>`, or `None`
/// when `repo_url` is not a GitHub URL.
pub fn build_blob_url(
    repo_url: &str,
    branch: Option<&str>,
    subdir: Option<&str>,
    relative_path: &str,
) -> Option<String> {
    let repo = parse_github_url(repo_url).ok()?;
    let branch = branch
        .map(str::to_string)
        .or(repo.branch.clone())
        .unwrap_or_else(|| DEFAULT_BRANCH.to_string());
    let subdir_prefix = subdir
        .and_then(non_empty)
        .map(|s| format!("{}/", s))
        .unwrap_or_default();
    Some(format!(
        "{}/blob/{}/{}{}",
        repo.web_url(),
        branch,
        subdir_prefix,
        relative_path.trim_start_matches('/')
    ))
}

#[derive(Debug)]
pub struct AcquiredSource {
    pub root: PathBuf,
    pub subdir: Option<String>,
    pub was_remote: bool,
    pub repo_name: String,
    pub repo_url: Option<String>,
    pub branch: Option<String>,
    // Held for its Drop: removes the clone.
    clone_dir: Option<TempDir>,
}

impl AcquiredSource {
    /// `root/subdir`, the directory that is actually scanned.
    pub fn scan_root(&self) -> PathBuf {
        match &self.subdir {
            Some(subdir) => self.root.join(subdir),
            None => self.root.clone(),
        }
    }

    pub fn clone_dir(&self) -> Option<&Path> {
        self.clone_dir.as_ref().map(|d| d.path())
    }
}

pub fn acquire(source: &str, branch: Option<&str>) -> Result<AcquiredSource> {
    if is_remote_source(source) {
        acquire_remote(source, branch)
    } else {
        acquire_local(source)
    }
}

fn acquire_local(source: &str) -> Result<AcquiredSource> {
    let expanded = shellexpand::tilde(source.trim());
    let path = fs::canonicalize(Path::new(expanded.as_ref())).map_err(|e| {
        AppError::Acquisition(format!("Invalid local repo path '{}': {}", source, e))
    })?;
    if !path.is_dir() {
        return Err(AppError::Acquisition(format!(
            "Invalid local repo path '{}': not a directory",
            source
        )));
    }
    let repo_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "repository".to_string());
    log::info!("Using local repository at {}", path.display());
    Ok(AcquiredSource {
        root: path,
        subdir: None,
        was_remote: false,
        repo_name,
        repo_url: None,
        branch: None,
        clone_dir: None,
    })
}

fn acquire_remote(source: &str, branch_override: Option<&str>) -> Result<AcquiredSource> {
    let repo = parse_github_url(source)?;
    let branch = branch_override.map(str::to_string).or(repo.branch.clone());
    let clone_dir = tempfile::Builder::new()
        .prefix("repodigest-")
        .tempdir()
        .map_err(|e| AppError::Acquisition(format!("Could not create clone directory: {}", e)))?;
    let dest = clone_dir.path().join(&repo.repo);

    let clone_url = repo.clone_url();
    log::info!("Cloning {} into {}", clone_url, dest.display());
    if let Err(e) = git_clone(&clone_url, branch.as_deref(), &dest) {
        let Some(b) = branch.as_deref() else {
            return Err(e);
        };
        log::warn!("Clone of branch '{}' failed ({}); retrying with the default branch", b, e);
        if dest.exists() {
            let _ = fs::remove_dir_all(&dest);
        }
        git_clone(&clone_url, None, &dest)?;
    }

    let acquired = AcquiredSource {
        root: dest,
        subdir: repo.subdir.clone(),
        was_remote: true,
        repo_name: repo.repo.clone(),
        repo_url: Some(repo.web_url()),
        branch,
        clone_dir: Some(clone_dir),
    };
    if !acquired.scan_root().is_dir() {
        return Err(AppError::Acquisition(format!(
            "Subdirectory '{}' not found in {}",
            acquired.subdir.as_deref().unwrap_or_default(),
            acquired.repo_url.as_deref().unwrap_or_default()
        )));
    }
    Ok(acquired)
}

fn git_clone(url: &str, branch: Option<&str>, dest: &Path) -> Result<()> {
    let mut cmd = Command::new("git");
    cmd.arg("clone").arg("--depth").arg("1");
    if let Some(branch) = branch {
        cmd.arg("--branch").arg(branch);
    }
    cmd.arg(url).arg(dest);

    let output = cmd
        .output()
        .map_err(|e| AppError::Acquisition(format!("Failed to run git: {}", e)))?;
    if output.status.success() {
        log::debug!("git clone finished: {}", url);
        Ok(())
    } else {
        Err(AppError::Acquisition(format!(
            "git clone of {} exited with {}: {}",
            url,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}
