//! Interpreter descriptions.
//!
//! The build tool needs to know the foreign interpreter's build
//! configuration (version, ABI flags, extension suffix). For Android that
//! interpreter cannot run on the build host, so descriptors are almost
//! always [`InterpreterKind::DescriptorOnly`]: synthesized either from a
//! staged `_sysconfigdata*.py` file (parsed as text) or from a compiled-in
//! profile matched by name.

use std::fmt;
use std::ops::RangeInclusive;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use anyhow::{bail, Result};
use regex::Regex;
use serde::Serialize;

use crate::core::errors::PipelineError;
use crate::util::process::ProcessBuilder;

/// Python implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InterpreterImpl {
    CPython,
    PyPy,
}

impl InterpreterImpl {
    /// Prefix of the wheel interpreter tag (`cp`, `pp`).
    pub fn tag_prefix(&self) -> &'static str {
        match self {
            InterpreterImpl::CPython => "cp",
            InterpreterImpl::PyPy => "pp",
        }
    }

    /// Executable name prefix (`python`, `pypy`).
    pub fn executable_prefix(&self) -> &'static str {
        match self {
            InterpreterImpl::CPython => "python",
            InterpreterImpl::PyPy => "pypy",
        }
    }

    /// Name expected by `PYO3_CROSS_PYTHON_IMPLEMENTATION`.
    pub fn pyo3_name(&self) -> &'static str {
        match self {
            InterpreterImpl::CPython => "CPython",
            InterpreterImpl::PyPy => "PyPy",
        }
    }

    fn soabi_prefix(&self) -> &'static str {
        match self {
            InterpreterImpl::CPython => "cpython",
            InterpreterImpl::PyPy => "pypy",
        }
    }
}

impl fmt::Display for InterpreterImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pyo3_name())
    }
}

/// A `major.minor` Python version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PythonVersion {
    pub major: u32,
    pub minor: u32,
}

impl PythonVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        PythonVersion { major, minor }
    }

    /// The version without separator, as used in tags (`313`).
    pub fn nodot(&self) -> String {
        format!("{}{}", self.major, self.minor)
    }
}

impl fmt::Display for PythonVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for PythonVersion {
    type Err = String;

    /// Accepts `3.13` and `3.13.1` (the patch component is ignored).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('.');
        let parse = |part: Option<&str>| -> Option<u32> { part?.parse().ok() };

        match (parse(parts.next()), parse(parts.next())) {
            (Some(major), Some(minor)) => Ok(PythonVersion { major, minor }),
            _ => Err(format!(
                "invalid Python version '{}'; expected MAJOR.MINOR (e.g. 3.13)",
                s
            )),
        }
    }
}

/// Whether a described interpreter can be executed on the build host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterpreterKind {
    /// An executable matching the descriptor exists on the build host.
    Runnable,
    /// Synthesized from configuration data; must never be executed.
    DescriptorOnly,
}

/// Build configuration of a Python interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterpreterDescriptor {
    pub kind: InterpreterKind,
    pub implementation: InterpreterImpl,
    pub version: PythonVersion,
    pub abiflags: String,
    pub soabi: String,
    pub ext_suffix: Option<String>,
}

/// Interpreters the name-lookup strategy knows about.
const PROFILES: &[(InterpreterImpl, u32, RangeInclusive<u32>)] = &[
    (InterpreterImpl::CPython, 3, 7..=14),
    (InterpreterImpl::PyPy, 3, 8..=11),
];

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(python|pypy)(\d+)\.(\d+)$").expect("interpreter name pattern is valid")
});

static BUILD_VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"['"]([A-Z_]+)['"]\s*:\s*['"]([^'"]*)['"]"#)
        .expect("sysconfig variable pattern is valid")
});

impl InterpreterDescriptor {
    /// Match an interpreter name such as `python3.13` against the
    /// compiled-in profiles.
    pub fn from_profile(name: &str) -> Result<Self, PipelineError> {
        let unsupported = |reason: String| PipelineError::UnsupportedInterpreter {
            name: name.to_string(),
            reason,
        };

        if name.contains('/') || name.contains('\\') {
            return Err(unsupported(
                "expected an interpreter name, not a path".to_string(),
            ));
        }

        let caps = NAME_RE.captures(name).ok_or_else(|| {
            unsupported("expected `python<major>.<minor>` or `pypy<major>.<minor>`".to_string())
        })?;

        let implementation = match &caps[1] {
            "pypy" => InterpreterImpl::PyPy,
            _ => InterpreterImpl::CPython,
        };
        let version = PythonVersion {
            major: caps[2].parse().map_err(|_| unsupported("invalid major version".into()))?,
            minor: caps[3].parse().map_err(|_| unsupported("invalid minor version".into()))?,
        };

        let known = PROFILES.iter().any(|(imp, major, minors)| {
            *imp == implementation && *major == version.major && minors.contains(&version.minor)
        });
        if !known {
            return Err(unsupported(format!(
                "no built-in profile for {} {}",
                implementation, version
            )));
        }

        let soabi = match implementation {
            InterpreterImpl::CPython => format!("cpython-{}", version.nodot()),
            InterpreterImpl::PyPy => format!("pypy{}-pp73", version.nodot()),
        };

        Ok(InterpreterDescriptor {
            kind: InterpreterKind::DescriptorOnly,
            implementation,
            version,
            abiflags: String::new(),
            soabi,
            ext_suffix: None,
        })
    }

    /// Synthesize a descriptor from the text of a `_sysconfigdata*.py` file.
    ///
    /// The file is only read; it is never handed to an interpreter.
    pub fn from_sysconfigdata(path: &Path, contents: &str) -> Result<Self, PipelineError> {
        let var = |key: &str| -> Option<String> {
            BUILD_VAR_RE
                .captures_iter(contents)
                .find(|caps| &caps[1] == key)
                .map(|caps| caps[2].to_string())
        };

        let version = var("VERSION")
            .and_then(|v| v.parse::<PythonVersion>().ok())
            .ok_or_else(|| PipelineError::InsufficientConfiguration {
                reason: format!("no usable VERSION in {}", path.display()),
            })?;

        let soabi = var("SOABI").unwrap_or_default();
        let implementation = if soabi.starts_with(InterpreterImpl::PyPy.soabi_prefix()) {
            InterpreterImpl::PyPy
        } else {
            InterpreterImpl::CPython
        };

        Ok(InterpreterDescriptor {
            kind: InterpreterKind::DescriptorOnly,
            implementation,
            version,
            abiflags: var("ABIFLAGS").unwrap_or_default(),
            soabi,
            ext_suffix: var("EXT_SUFFIX"),
        })
    }

    /// Describe a host interpreter by running it.
    ///
    /// Only ever used for interpreters on the build host.
    pub fn probe_host(program: &Path) -> Result<Self> {
        let output = ProcessBuilder::new(program)
            .args([
                "-c",
                "import sys, sysconfig; \
                 print(sys.implementation.name); \
                 print('%d.%d' % sys.version_info[:2]); \
                 print(sysconfig.get_config_var('ABIFLAGS') or ''); \
                 print(sysconfig.get_config_var('SOABI') or ''); \
                 print(sysconfig.get_config_var('EXT_SUFFIX') or '')",
            ])
            .exec_and_check()?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let lines: Vec<&str> = stdout.lines().map(str::trim).collect();
        if lines.len() < 5 {
            bail!(
                "unexpected output from `{}`:\n{}",
                program.display(),
                stdout
            );
        }

        let implementation = match lines[0] {
            "pypy" => InterpreterImpl::PyPy,
            _ => InterpreterImpl::CPython,
        };
        let version = lines[1]
            .parse::<PythonVersion>()
            .map_err(|e| anyhow::anyhow!(e))?;

        Ok(InterpreterDescriptor {
            kind: InterpreterKind::Runnable,
            implementation,
            version,
            abiflags: lines[2].to_string(),
            soabi: lines[3].to_string(),
            ext_suffix: Some(lines[4].to_string()).filter(|s| !s.is_empty()),
        })
    }

    /// The bare interpreter name (`python3.13`).
    pub fn name(&self) -> String {
        format!("{}{}", self.implementation.executable_prefix(), self.version)
    }

    /// Tag synthesized when an artifact's own tags cannot be parsed
    /// (`cp313`).
    pub fn fallback_tag(&self) -> String {
        format!("{}{}", self.implementation.tag_prefix(), self.version.nodot())
    }

    pub fn is_runnable(&self) -> bool {
        self.kind == InterpreterKind::Runnable
    }
}
