//! Configuration file support for droidwheel.
//!
//! droidwheel reads two configuration files:
//! - Global: `<config dir>/config.toml` - user-wide defaults
//! - Project: `.droidwheel/config.toml` - overrides for one checkout
//!
//! Project config takes precedence over global config. Command-line flags
//! and environment variables take precedence over both.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::target::AndroidAbi;

/// droidwheel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Android NDK settings
    pub ndk: NdkConfig,

    /// Target selection
    pub target: TargetConfig,

    /// Foreign interpreter settings
    pub python: PythonConfig,

    /// Build settings
    pub build: BuildConfig,
}

/// Android NDK settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NdkConfig {
    /// Root of an extracted NDK (e.g. /opt/android-ndk-r26d)
    pub root: Option<PathBuf>,
}

/// Target selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TargetConfig {
    /// Android API level
    pub api_level: Option<u32>,

    /// ABIs to build when none are given on the command line
    pub abis: Vec<AndroidAbi>,
}

/// Foreign interpreter settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PythonConfig {
    /// Target Python version (e.g. "3.13")
    pub version: Option<String>,

    /// Interpreter name for name lookup (e.g. "python3.13")
    pub interpreter: Option<String>,

    /// Staged Android Python library directory
    pub lib_dir: Option<PathBuf>,
}

/// Build settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildConfig {
    /// Where renamed wheels are written
    pub output_dir: Option<PathBuf>,

    /// maturin executable
    pub maturin: Option<PathBuf>,

    /// Host Python used as the build frontend for standard projects
    pub host_python: Option<PathBuf>,

    /// Extra cargo features passed to every build attempt
    pub features: Vec<String>,

    /// Build with `--release` (defaults to true)
    pub release: Option<bool>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.ndk.root.is_some() {
            self.ndk.root = other.ndk.root;
        }

        if other.target.api_level.is_some() {
            self.target.api_level = other.target.api_level;
        }
        if !other.target.abis.is_empty() {
            self.target.abis = other.target.abis;
        }

        if other.python.version.is_some() {
            self.python.version = other.python.version;
        }
        if other.python.interpreter.is_some() {
            self.python.interpreter = other.python.interpreter;
        }
        if other.python.lib_dir.is_some() {
            self.python.lib_dir = other.python.lib_dir;
        }

        if other.build.output_dir.is_some() {
            self.build.output_dir = other.build.output_dir;
        }
        if other.build.maturin.is_some() {
            self.build.maturin = other.build.maturin;
        }
        if other.build.host_python.is_some() {
            self.build.host_python = other.build.host_python;
        }
        if !other.build.features.is_empty() {
            self.build.features = other.build.features;
        }
        if other.build.release.is_some() {
            self.build.release = other.build.release;
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.droidwheel/config.toml)
/// 2. Global config
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}
