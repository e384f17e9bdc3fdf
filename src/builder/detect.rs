//! Build backend detection.
//!
//! Classifies a Python project by the `build-backend` of its
//! `pyproject.toml` and checks whether its native crate depends on `pyo3`
//! directly.
//!
//! The `pyo3` check is a line scan of `Cargo.toml`, not a dependency
//! resolution: a crate that only gets `pyo3` through another dependency is
//! reported as not declaring it. A false negative only skips the abi3
//! fallback; a false positive would force features onto a crate that
//! cannot accept them.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;

use crate::util::fs::{read_to_string, SKIPPED_DIRS};

/// Name of the build descriptor file.
pub const BUILD_DESCRIPTOR: &str = "pyproject.toml";

/// Backend identifier of the native-extension build tool.
pub const NATIVE_EXTENSION_BACKEND: &str = "maturin";

/// Backend assumed when a project does not name one.
pub const DEFAULT_BACKEND: &str = "setuptools";

/// The host-runtime binding crate.
pub const HOST_RUNTIME_BINDING: &str = "pyo3";

/// Virtualenv directory names skipped while searching for the descriptor.
const VENV_DIRS: &[&str] = &["venv", "env", "build_venv"];

static DEPENDENCY_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(target\..+\.)?dependencies$").expect("dependency section pattern is valid")
});

/// Build backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildBackend {
    /// maturin: builds the Rust crate into an extension module.
    NativeExtension,
    /// Any other PEP 517 backend, built through `python -m build`.
    Standard,
}

impl BuildBackend {
    /// Classify a `build-backend` identifier.
    pub fn from_backend_id(id: &str) -> Self {
        if id.trim() == NATIVE_EXTENSION_BACKEND {
            BuildBackend::NativeExtension
        } else {
            BuildBackend::Standard
        }
    }

    /// Directory (relative to the project) the build tool writes wheels to.
    pub fn output_subdir(&self) -> &'static str {
        match self {
            BuildBackend::NativeExtension => "target/wheels",
            BuildBackend::Standard => "dist",
        }
    }
}

impl fmt::Display for BuildBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildBackend::NativeExtension => write!(f, "native-extension"),
            BuildBackend::Standard => write!(f, "standard"),
        }
    }
}

/// What detection found in a project tree.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectLayout {
    /// Directory the build tool runs in (holds the descriptor if one exists).
    pub project_dir: PathBuf,
    /// The `pyproject.toml` that was read, if any.
    pub descriptor: Option<PathBuf>,
    /// `[project] name` from the descriptor.
    pub project_name: Option<String>,
    /// Raw `build-backend` value (or the default).
    pub backend_id: String,
    pub backend: BuildBackend,
    /// The native crate's `Cargo.toml`, if one was found.
    pub crate_manifest: Option<PathBuf>,
    /// Whether the crate manifest declares `pyo3` directly.
    pub host_runtime_binding: bool,
}

impl ProjectLayout {
    /// Inspect the project tree under `root`.
    pub fn detect(root: &Path) -> Result<Self> {
        let Some(descriptor) = find_build_descriptor(root) else {
            tracing::debug!(
                "no {} under {}, assuming {}",
                BUILD_DESCRIPTOR,
                root.display(),
                DEFAULT_BACKEND
            );
            return Ok(ProjectLayout {
                project_dir: root.to_path_buf(),
                descriptor: None,
                project_name: None,
                backend_id: DEFAULT_BACKEND.to_string(),
                backend: BuildBackend::Standard,
                crate_manifest: None,
                host_runtime_binding: false,
            });
        };

        let project_dir = descriptor
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf());
        let info = DescriptorInfo::read(&descriptor)?;
        let backend = BuildBackend::from_backend_id(&info.backend_id);
        let crate_manifest = locate_crate_manifest(&project_dir, info.manifest_path.as_deref());
        let host_runtime_binding = crate_manifest
            .as_deref()
            .map(manifest_file_declares_binding)
            .unwrap_or(false);

        tracing::debug!(
            "{}: backend `{}` ({}), pyo3 declared directly: {}",
            descriptor.display(),
            info.backend_id,
            backend,
            host_runtime_binding
        );

        Ok(ProjectLayout {
            project_dir,
            descriptor: Some(descriptor),
            project_name: info.project_name,
            backend_id: info.backend_id,
            backend,
            crate_manifest,
            host_runtime_binding,
        })
    }
}

/// The parts of `pyproject.toml` detection cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DescriptorInfo {
    project_name: Option<String>,
    backend_id: String,
    manifest_path: Option<String>,
}

impl DescriptorInfo {
    fn read(path: &Path) -> Result<Self> {
        let contents = read_to_string(path)?;
        Self::parse(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    fn parse(contents: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(contents)?;

        let backend_id = table
            .get("build-system")
            .and_then(|bs| bs.get("build-backend"))
            .and_then(|b| b.as_str())
            .unwrap_or(DEFAULT_BACKEND)
            .to_string();

        let project_name = table
            .get("project")
            .and_then(|p| p.get("name"))
            .and_then(|n| n.as_str())
            .map(str::to_string);

        let manifest_path = table
            .get("tool")
            .and_then(|t| t.get("maturin"))
            .and_then(|m| m.get("manifest-path"))
            .and_then(|p| p.as_str())
            .map(str::to_string);

        Ok(DescriptorInfo {
            project_name,
            backend_id,
            manifest_path,
        })
    }
}

/// Breadth-first search for the shallowest `pyproject.toml` under `root`.
///
/// Hidden directories, `target/` and virtualenvs are not searched. Entries
/// are visited in name order so the result is stable.
pub fn find_build_descriptor(root: &Path) -> Option<PathBuf> {
    let mut queue = VecDeque::from([root.to_path_buf()]);

    while let Some(dir) = queue.pop_front() {
        let candidate = dir.join(BUILD_DESCRIPTOR);
        if candidate.is_file() {
            return Some(candidate);
        }

        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        let mut subdirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter(|e| {
                let name = e.file_name();
                let name = name.to_string_lossy();
                !name.starts_with('.')
                    && !SKIPPED_DIRS.contains(&name.as_ref())
                    && !VENV_DIRS.contains(&name.as_ref())
            })
            .map(|e| e.path())
            .collect();
        subdirs.sort();
        queue.extend(subdirs);
    }

    None
}

/// Classify the project in `project_dir`.
pub fn detect_backend(project_dir: &Path) -> Result<BuildBackend> {
    Ok(ProjectLayout::detect(project_dir)?.backend)
}

/// Whether the project's native crate declares `pyo3` as a direct
/// dependency. Unreadable or missing manifests count as "no".
pub fn declares_host_runtime_binding(project_dir: &Path) -> bool {
    ProjectLayout::detect(project_dir)
        .map(|layout| layout.host_runtime_binding)
        .unwrap_or_else(|e| {
            tracing::debug!("could not inspect {}: {:#}", project_dir.display(), e);
            false
        })
}

fn locate_crate_manifest(project_dir: &Path, manifest_path: Option<&str>) -> Option<PathBuf> {
    let candidate = match manifest_path {
        Some(rel) => project_dir.join(rel),
        None => project_dir.join("Cargo.toml"),
    };
    candidate.is_file().then_some(candidate)
}

fn manifest_file_declares_binding(manifest: &Path) -> bool {
    match read_to_string(manifest) {
        Ok(contents) => manifest_declares_dependency(&contents, HOST_RUNTIME_BINDING),
        Err(e) => {
            tracing::debug!("{:#}", e);
            false
        }
    }
}

/// Line-based check for a direct dependency on `name` in a `Cargo.toml`.
///
/// Counts `name = ...` / `name.workspace = ...` entries that start at
/// column zero under `[dependencies]` or `[target.<cfg>.dependencies]`, and
/// `[dependencies.name]` tables. Dev, build and workspace dependency tables
/// do not count.
pub fn manifest_declares_dependency(contents: &str, name: &str) -> bool {
    let escaped = regex::escape(name);
    let (Ok(entry), Ok(table)) = (
        Regex::new(&format!(r#"^(?:{0}|"{0}")\s*[=.]"#, escaped)),
        Regex::new(&format!(
            r#"^(?:target\..+\.)?dependencies\.(?:{0}|"{0}")$"#,
            escaped
        )),
    ) else {
        return false;
    };

    let mut in_dependencies = false;
    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if trimmed.starts_with('[') {
            let header = trimmed
                .trim_start_matches('[')
                .split(']')
                .next()
                .unwrap_or_default()
                .trim();
            if table.is_match(header) {
                return true;
            }
            in_dependencies = !trimmed.starts_with("[[") && DEPENDENCY_SECTION.is_match(header);
            continue;
        }

        if in_dependencies && !line.starts_with([' ', '\t']) && entry.is_match(line) {
            return true;
        }
    }

    false
}
