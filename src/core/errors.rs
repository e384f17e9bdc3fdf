//! Pipeline error taxonomy and diagnostics.

use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error raised by one of the pipeline stages.
///
/// Every variant except [`PipelineError::MalformedArtifactName`] aborts the
/// pipeline; that one is normally recovered by synthesizing tags.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum PipelineError {
    #[error("no NDK compiler for `{triple}` at API level {api_level}")]
    #[diagnostic(code(droidwheel::toolchain_not_found))]
    ToolchainNotFound {
        triple: String,
        api_level: u32,
        expected: PathBuf,
    },

    #[error("unsupported interpreter `{name}`: {reason}")]
    #[diagnostic(code(droidwheel::unsupported_interpreter))]
    UnsupportedInterpreter { name: String, reason: String },

    #[error("insufficient cross-compile configuration: {reason}")]
    #[diagnostic(code(droidwheel::insufficient_configuration))]
    InsufficientConfiguration { reason: String },

    #[error("build tool `{program}` failed{}", exit_suffix(.code))]
    #[diagnostic(code(droidwheel::build_tool_failure))]
    BuildToolFailure {
        program: String,
        code: Option<i32>,
        attempts: usize,
        output: String,
    },

    #[error("no wheel found for `{distribution}`")]
    #[diagnostic(code(droidwheel::artifact_not_found))]
    ArtifactNotFound {
        distribution: String,
        searched: Vec<PathBuf>,
    },

    #[error("malformed wheel file name `{file_name}`: {reason}")]
    #[diagnostic(code(droidwheel::malformed_artifact_name))]
    MalformedArtifactName { file_name: String, reason: String },
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with exit code {}", code),
        None => " to start".to_string(),
    }
}

impl PipelineError {
    /// Process exit code for this failure kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::ToolchainNotFound { .. } => 10,
            PipelineError::UnsupportedInterpreter { .. } => 11,
            PipelineError::InsufficientConfiguration { .. } => 12,
            PipelineError::BuildToolFailure { .. } => 13,
            PipelineError::ArtifactNotFound { .. } => 14,
            PipelineError::MalformedArtifactName { .. } => 15,
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            PipelineError::ToolchainNotFound {
                triple,
                api_level,
                expected,
            } => Diagnostic::error(self.to_string())
                .with_location(expected)
                .with_context(format!("expected compiler `{}{}-clang`", triple, api_level))
                .with_suggestion(suggestions::CHECK_NDK)
                .with_suggestion(suggestions::CHECK_API_LEVEL),

            PipelineError::UnsupportedInterpreter { .. } => Diagnostic::error(self.to_string())
                .with_suggestion(suggestions::USE_LIB_DIR)
                .with_suggestion("Pass a name such as `python3.13` to `--interpreter`"),

            PipelineError::InsufficientConfiguration { .. } => {
                Diagnostic::error(self.to_string())
                    .with_suggestion(suggestions::USE_LIB_DIR)
                    .with_suggestion(suggestions::USE_PYTHON_VERSION)
            }

            PipelineError::BuildToolFailure {
                program,
                attempts,
                output,
                ..
            } => {
                let mut diag = Diagnostic::error(self.to_string()).with_context(format!(
                    "`{}` was invoked {} time(s)",
                    program, attempts
                ));
                for line in tail(output, 40) {
                    diag = diag.with_context(line);
                }
                diag.with_suggestion(suggestions::BUILD_FAILED)
            }

            PipelineError::ArtifactNotFound { searched, .. } => {
                let mut diag = Diagnostic::error(self.to_string());
                for path in searched {
                    diag = diag.with_context(format!("searched {}", path.display()));
                }
                diag.with_suggestion("Check that `--library` matches the distribution name")
            }

            PipelineError::MalformedArtifactName { .. } => Diagnostic::warning(self.to_string())
                .with_suggestion("Pass the package version explicitly with `--lib-version`"),
        }
    }
}

/// Last `n` lines of captured tool output.
fn tail(output: &str, n: usize) -> impl Iterator<Item = String> + '_ {
    let lines: Vec<&str> = output.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines.into_iter().skip(start).map(str::to_string)
}
