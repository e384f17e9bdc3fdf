//! Test doubles and fixtures for droidwheel unit tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use droidwheel::test_support::{fixtures, RecordingBuildTool};
//!
//! #[test]
//! fn test_example() {
//!     let mut tool = RecordingBuildTool::new().with_exit_codes([1, 0]);
//!     // run a configurator against `tool`, then inspect tool.calls()
//! }
//! ```

pub mod fixtures;

use std::collections::VecDeque;
use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::builder::tool::{BuildInvocation, BuildTool, ToolOutput};

/// A [`BuildTool`] that records invocations instead of spawning anything.
///
/// Exit codes are consumed in order; once the script runs out every call
/// succeeds. On success it can drop a wheel into the invocation's cwd, the
/// way maturin or `python -m build` would.
#[derive(Debug, Default)]
pub struct RecordingBuildTool {
    exit_codes: VecDeque<i32>,
    spawn_error: bool,
    output: String,
    wheel: Option<(PathBuf, String)>,
    calls: Vec<BuildInvocation>,
}

impl RecordingBuildTool {
    /// A tool whose every invocation succeeds.
    pub fn new() -> Self {
        RecordingBuildTool::default()
    }

    /// Script the exit codes of successive invocations.
    pub fn with_exit_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.exit_codes = codes.into_iter().collect();
        self
    }

    /// Output text returned by every invocation.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// Every invocation fails to start.
    pub fn failing_to_spawn(mut self) -> Self {
        self.spawn_error = true;
        self
    }

    /// On success, write `file_name` into `<cwd>/<subdir>`.
    pub fn dropping_wheel(mut self, subdir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        self.wheel = Some((subdir.into(), file_name.into()));
        self
    }

    /// Recorded invocations, oldest first.
    pub fn calls(&self) -> &[BuildInvocation] {
        &self.calls
    }

    pub fn invocation_count(&self) -> usize {
        self.calls.len()
    }
}

impl BuildTool for RecordingBuildTool {
    fn invoke(&mut self, invocation: &BuildInvocation) -> Result<ToolOutput> {
        self.calls.push(invocation.clone());

        if self.spawn_error {
            bail!("failed to spawn `{}`", invocation.program.display());
        }

        let code = self.exit_codes.pop_front().unwrap_or(0);
        if code == 0 {
            if let Some((subdir, file_name)) = &self.wheel {
                let dir = invocation.cwd.join(subdir);
                std::fs::create_dir_all(&dir)?;
                std::fs::write(dir.join(file_name), b"PK\x03\x04")?;
            }
        }

        Ok(ToolOutput {
            code: Some(code),
            output: self.output.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn invocation(cwd: PathBuf) -> BuildInvocation {
        BuildInvocation {
            program: PathBuf::from("maturin"),
            args: vec!["build".to_string()],
            env: BTreeMap::new(),
            env_remove: vec![],
            cwd,
        }
    }

    #[test]
    fn test_scripted_exit_codes() {
        let tmp = TempDir::new().unwrap();
        let mut tool = RecordingBuildTool::new().with_exit_codes([2]);

        assert_eq!(tool.invoke(&invocation(tmp.path().into())).unwrap().code, Some(2));
        assert_eq!(tool.invoke(&invocation(tmp.path().into())).unwrap().code, Some(0));
        assert_eq!(tool.invocation_count(), 2);
    }

    #[test]
    fn test_drops_wheel_on_success_only() {
        let tmp = TempDir::new().unwrap();
        let mut tool = RecordingBuildTool::new()
            .with_exit_codes([1, 0])
            .dropping_wheel("target/wheels", "x-1.0-cp313-cp313-linux_x86_64.whl");
        let wheel = tmp.path().join("target/wheels/x-1.0-cp313-cp313-linux_x86_64.whl");

        tool.invoke(&invocation(tmp.path().into())).unwrap();
        assert!(!wheel.exists());
        tool.invoke(&invocation(tmp.path().into())).unwrap();
        assert!(wheel.exists());
    }
}
