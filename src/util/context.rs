//! Global context for droidwheel operations.
//!
//! Provides centralized access to configuration, paths, and environment.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs};

use crate::util::config::{load_config, Config};

/// Project directories for droidwheel
static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("com", "droidwheel", "droidwheel"));

/// Name of the project-local configuration directory.
pub const PROJECT_CONFIG_DIR: &str = ".droidwheel";

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global droidwheel data
    home: PathBuf,

    /// Whether to use verbose output
    verbose: bool,

    /// Whether to use colors in output
    color: bool,
}

impl GlobalContext {
    /// Create a new GlobalContext with defaults.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;

        let home = if let Some(dirs) = PROJECT_DIRS.as_ref() {
            dirs.config_dir().to_path_buf()
        } else {
            // Fallback to ~/.droidwheel
            BaseDirs::new()
                .map(|b| b.home_dir().join(PROJECT_CONFIG_DIR))
                .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_DIR))
        };

        Ok(GlobalContext {
            cwd,
            home,
            verbose: false,
            color: true,
        })
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let mut ctx = Self::new()?;
        ctx.cwd = cwd;
        Ok(ctx)
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Set color output.
    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the droidwheel home directory.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// Get the project configuration file path.
    pub fn project_config_path(&self) -> PathBuf {
        self.cwd.join(PROJECT_CONFIG_DIR).join("config.toml")
    }

    /// Directory where fetched repositories are cloned by default.
    pub fn sources_dir(&self) -> PathBuf {
        self.cwd.join("sources")
    }

    /// Load the merged global + project configuration.
    pub fn load_config(&self) -> Config {
        load_config(&self.config_path(), &self.project_config_path())
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn color(&self) -> bool {
        self.color
    }

    /// Resolve a possibly relative path against the working directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_context_paths() {
        let ctx = GlobalContext::new().unwrap();
        assert!(ctx.cwd().is_absolute());
        assert!(ctx.config_path().ends_with("config.toml"));
    }

    #[test]
    fn test_project_config_is_loaded() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join(PROJECT_CONFIG_DIR)).unwrap();
        std::fs::write(
            tmp.path().join(PROJECT_CONFIG_DIR).join("config.toml"),
            "[target]\napi-level = 30\n",
        )
        .unwrap();

        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf()).unwrap();
        assert_eq!(ctx.load_config().target.api_level, Some(30));
    }

    #[test]
    fn test_resolve_path() {
        let tmp = TempDir::new().unwrap();
        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf()).unwrap();

        assert_eq!(ctx.resolve_path(Path::new("dist")), tmp.path().join("dist"));
        assert_eq!(
            ctx.resolve_path(Path::new("/abs/dist")),
            PathBuf::from("/abs/dist")
        );
    }
}
