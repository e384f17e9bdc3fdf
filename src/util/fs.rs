//! Filesystem utilities.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::glob;
use walkdir::{DirEntry, WalkDir};

/// Directory names never worth descending into when scanning or copying a
/// project tree.
pub const SKIPPED_DIRS: &[&str] = &["target", ".git", ".build_venv", ".venv", "node_modules"];

/// Whether a walk entry is a directory that scans should skip.
pub fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| SKIPPED_DIRS.contains(&name))
            .unwrap_or(false)
}

/// Directories a walk must not enter, matched both as given and canonicalized
/// (temp dirs are often reached through symlinks).
#[derive(Debug, Default)]
pub struct Exclusions(Vec<PathBuf>);

impl Exclusions {
    pub fn new<P: AsRef<Path>>(dirs: &[P]) -> Self {
        let mut paths = Vec::new();
        for dir in dirs {
            let dir = dir.as_ref();
            paths.push(dir.to_path_buf());
            if let Ok(canonical) = dir.canonicalize() {
                paths.push(canonical);
            }
        }
        Exclusions(paths)
    }

    pub fn contains(&self, entry: &DirEntry) -> bool {
        if self.0.is_empty() || !entry.file_type().is_dir() {
            return false;
        }
        let path = entry.path();
        self.0.iter().any(|p| p == path)
            || path
                .canonicalize()
                .map(|c| self.0.contains(&c))
                .unwrap_or(false)
    }
}

/// Recursively copy a project tree, leaving out [`SKIPPED_DIRS`] and any
/// `excluded` directory.
pub fn copy_project_tree(src: &Path, dst: &Path, excluded: &Exclusions) -> Result<()> {
    ensure_dir(dst)?;

    let walker = WalkDir::new(src)
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e) && !excluded.contains(e));
    for entry in walker {
        let entry = entry.with_context(|| format!("failed to walk {}", src.display()))?;
        let rel = entry.path().strip_prefix(src)?;
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            ensure_dir(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "failed to copy {} to {}",
                    entry.path().display(),
                    target.display()
                )
            })?;
        }
    }
    Ok(())
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Move a file, replacing the destination.
///
/// Falls back to copy + remove when a rename is not possible (e.g. across
/// filesystems).
pub fn move_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }

    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    fs::copy(src, dst)
        .with_context(|| format!("failed to copy {} to {}", src.display(), dst.display()))?;
    fs::remove_file(src).with_context(|| format!("failed to remove {}", src.display()))?;
    Ok(())
}

/// Find files matching a glob pattern relative to a base directory.
pub fn glob_files(base: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full_pattern = base.join(pattern);
    let pattern_str = full_pattern.to_string_lossy();

    let mut results = Vec::new();
    for entry in glob(&pattern_str).with_context(|| format!("invalid glob pattern: {}", pattern))? {
        match entry {
            Ok(path) if path.is_file() => results.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!("glob error: {}", e),
        }
    }

    results.sort();
    Ok(results)
}

/// Recursively find files with the given extension below `root`, skipping
/// [`SKIPPED_DIRS`] except `target` (build output lives there), and any
/// `excluded` directory.
pub fn find_files_with_extension(root: &Path, extension: &str, excluded: &Exclusions) -> Vec<PathBuf> {
    let mut results: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| (!is_skipped_dir(e) || e.file_name() == "target") && !excluded.contains(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some(extension))
        .map(|e| e.into_path())
        .collect();

    results.sort();
    results
}

/// Mark a file executable (no-op off unix).
#[cfg(unix)]
pub fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?
        .permissions();
    perms.set_mode(perms.mode() | 0o111);
    fs::set_permissions(path, perms)
        .with_context(|| format!("failed to chmod {}", path.display()))
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
