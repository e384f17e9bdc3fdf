//! User-friendly diagnostic messages.
//!
//! Every pipeline failure is rendered with its root cause, the raw tool
//! output that explains it, and suggested fixes.

use std::fmt;
use std::path::PathBuf;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when the NDK compiler is missing.
    pub const CHECK_NDK: &str =
        "Point `--ndk` (or ANDROID_NDK_HOME) at an extracted Android NDK, e.g. r26d";

    /// Suggestion when the API level has no compiler.
    pub const CHECK_API_LEVEL: &str = "Pick an API level between 21 and 34 with `--api`";

    /// Suggestion to use the directory-anchored interpreter strategy.
    pub const USE_LIB_DIR: &str =
        "Stage the Android Python `lib` directory and pass it with `--python-lib-dir`";

    /// Suggestion to use the name-lookup interpreter strategy.
    pub const USE_PYTHON_VERSION: &str =
        "Pass the target Python version with `--python-version` (e.g. 3.13)";

    /// Suggestion when the build tool fails.
    pub const BUILD_FAILED: &str = "Run `droidwheel build --verbose` for the full build log";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
    /// Related location (file path)
    pub location: Option<PathBuf>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Error,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error(message)
        }
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add a file location.
    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let severity_str = match (color, self.severity) {
            (true, Severity::Error) => "\x1b[1;31merror\x1b[0m".to_string(),
            (true, Severity::Warning) => "\x1b[1;33mwarning\x1b[0m".to_string(),
            (false, severity) => severity.to_string(),
        };

        output.push_str(&format!("{}: {}\n", severity_str, self.message));

        if let Some(ref path) = self.location {
            output.push_str(&format!("  --> {}\n", path.display()));
        }

        for ctx in &self.context {
            output.push_str(&format!("  | {}\n", ctx));
        }

        if !self.suggestions.is_empty() {
            output.push('\n');
            let help_prefix = if color {
                "\x1b[1;32mhelp\x1b[0m"
            } else {
                "help"
            };
            output.push_str(&format!("{}: consider:\n", help_prefix));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_formatting() {
        let diag = Diagnostic::error("no NDK compiler for `x86_64-linux-android` at API level 19")
            .with_location("/ndk/toolchains/llvm/prebuilt/linux-x86_64/bin")
            .with_context("expected compiler `x86_64-linux-android19-clang`")
            .with_suggestion(suggestions::CHECK_API_LEVEL);

        let output = diag.format(false);
        assert!(output.starts_with("error: no NDK compiler"));
        assert!(output.contains("--> /ndk/toolchains"));
        assert!(output.contains("| expected compiler"));
        assert!(output.contains("help: consider:"));
        assert!(output.contains("1. Pick an API level"));
    }

    #[test]
    fn test_warning_severity() {
        let diag = Diagnostic::warning("malformed wheel file name");
        assert!(diag.format(false).starts_with("warning: "));
    }
}
