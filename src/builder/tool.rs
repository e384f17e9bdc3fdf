//! The external build tool boundary.
//!
//! The configurator never spawns processes itself; it hands a fully
//! constructed [`BuildInvocation`] to a [`BuildTool`]. Production code uses
//! [`ProcessBuildTool`]; tests substitute a recording double.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::util::process::{combined_output, ProcessBuilder};

/// One build tool invocation: program, arguments, environment and cwd.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Variables set on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Inherited variables that must not reach the build tool.
    pub env_remove: Vec<String>,
    pub cwd: PathBuf,
}

impl BuildInvocation {
    /// Shell-like rendering for logs and `droidwheel env`.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Result of a build tool run that managed to start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,
    /// Combined stdout and stderr.
    pub output: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs build invocations.
///
/// `Err` means the tool could not be started at all; a tool that ran and
/// failed is an `Ok` with a non-zero code.
pub trait BuildTool {
    fn invoke(&mut self, invocation: &BuildInvocation) -> Result<ToolOutput>;
}

/// Runs the build tool as a subprocess, with a spinner while it works.
#[derive(Debug, Default)]
pub struct ProcessBuildTool {
    verbose: bool,
    progress: Option<MultiProgress>,
}

impl ProcessBuildTool {
    pub fn new() -> Self {
        ProcessBuildTool::default()
    }

    /// Enable verbose output (hides the spinner, echoes tool output).
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Draw the spinner inside a shared display (parallel builds).
    pub fn with_progress(mut self, progress: MultiProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    fn spinner(&self, message: String) -> Option<ProgressBar> {
        if self.verbose {
            return None;
        }
        let pb = match &self.progress {
            Some(multi) => multi.add(ProgressBar::new_spinner()),
            None => ProgressBar::new_spinner(),
        };
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]")
        {
            pb.set_style(style);
        }
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    }
}

impl BuildTool for ProcessBuildTool {
    fn invoke(&mut self, invocation: &BuildInvocation) -> Result<ToolOutput> {
        let mut process = ProcessBuilder::new(&invocation.program)
            .args(&invocation.args)
            .envs(&invocation.env)
            .cwd(&invocation.cwd);
        for key in &invocation.env_remove {
            process = process.env_remove(key);
        }

        tracing::info!("running `{}`", invocation.display_command());
        let start = Instant::now();
        let pb = self.spinner(format!("Building with {}", invocation.program.display()));

        let result = process.exec();

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        let output = result?;
        let text = combined_output(&output);

        if self.verbose {
            eprintln!("{}", text);
        }
        tracing::debug!(
            "`{}` exited with {:?} after {:.2}s",
            invocation.program.display(),
            output.status.code(),
            start.elapsed().as_secs_f64()
        );

        Ok(ToolOutput {
            code: output.status.code(),
            output: text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(program: &str, args: &[&str]) -> BuildInvocation {
        BuildInvocation {
            program: PathBuf::from(program),
            args: args.iter().map(|s| s.to_string()).collect(),
            env: BTreeMap::from([("PYO3_CROSS".to_string(), "1".to_string())]),
            env_remove: vec![],
            cwd: std::env::temp_dir(),
        }
    }

    #[test]
    fn test_display_command() {
        let inv = invocation("maturin", &["build", "--release"]);
        assert_eq!(inv.display_command(), "maturin build --release");
    }

    #[cfg(unix)]
    #[test]
    fn test_process_tool_reports_exit_code_and_env() {
        let mut tool = ProcessBuildTool::new().verbose(true);
        let out = tool
            .invoke(&invocation("sh", &["-c", "echo cross=$PYO3_CROSS; exit 3"]))
            .unwrap();

        assert_eq!(out.code, Some(3));
        assert!(!out.success());
        assert!(out.output.contains("cross=1"));
    }

    #[test]
    fn test_process_tool_spawn_failure_is_err() {
        let mut tool = ProcessBuildTool::new().verbose(true);
        let result = tool.invoke(&invocation("/nonexistent/droidwheel-maturin", &[]));
        assert!(result.is_err());
    }
}
