use std::fs;
use std::path::Path;

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const PIPE_INDENT: &str = "│   ";
const SPACE_INDENT: &str = "    ";
const TRUNCATED: &str = "...";

/// Renders the directory structure under `root` as an ASCII tree.
///
/// Directories sort before files, then names case-insensitively. `max_depth`
/// counts levels below the root (`Some(0)` lists only the root's entries);
/// deeper non-empty directories end in a `...` marker. Names in `exclude_dirs`
/// are always hidden; the tree is a structural overview, independent of the
/// scan filters. Symlinked directories are listed but not descended into.
pub fn build_tree(root: &Path, max_depth: Option<usize>, exclude_dirs: &[String]) -> String {
    let excluded: Vec<String> = exclude_dirs.iter().map(|d| d.to_lowercase()).collect();
    let mut lines = Vec::new();
    walk_level(root, "", 0, max_depth, &excluded, &mut lines);
    lines.join("\n")
}

struct TreeEntry {
    name: String,
    is_dir: bool,
}

fn sorted_entries(dir: &Path, excluded: &[String]) -> Vec<TreeEntry> {
    let read = match fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) => {
            log::debug!("Cannot list {} for tree: {}", dir.display(), e);
            return Vec::new();
        }
    };
    let mut entries: Vec<TreeEntry> = read
        .filter_map(|entry| entry.ok())
        .map(|entry| TreeEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir: entry.file_type().is_ok_and(|ft| ft.is_dir()),
        })
        .filter(|entry| !(entry.is_dir && excluded.contains(&entry.name.to_lowercase())))
        .collect();
    entries.sort_by(|a, b| {
        b.is_dir
            .cmp(&a.is_dir)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.name.cmp(&b.name))
    });
    entries
}

fn walk_level(
    dir: &Path,
    prefix: &str,
    depth: usize,
    max_depth: Option<usize>,
    excluded: &[String],
    lines: &mut Vec<String>,
) {
    let entries = sorted_entries(dir, excluded);
    let count = entries.len();
    for (i, entry) in entries.into_iter().enumerate() {
        let is_last = i + 1 == count;
        let pointer = if is_last { LAST_BRANCH } else { BRANCH };
        lines.push(format!("{}{}{}", prefix, pointer, entry.name));
        if !entry.is_dir {
            continue;
        }

        let child_prefix = format!("{}{}", prefix, if is_last { SPACE_INDENT } else { PIPE_INDENT });
        let child_dir = dir.join(&entry.name);
        if max_depth.is_some_and(|max| depth >= max) {
            if !sorted_entries(&child_dir, excluded).is_empty() {
                lines.push(format!("{}{}{}", child_prefix, LAST_BRANCH, TRUNCATED));
            }
            continue;
        }
        walk_level(&child_dir, &child_prefix, depth + 1, max_depth, excluded, lines);
    }
}
