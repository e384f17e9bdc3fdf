//! Wheel file names and the artifact model.
//!
//! Wheel file names follow `name-version[-build]-interpreter-abi-platform.whl`.
//! Only the interpreter/ABI/platform fields are ever synthesized; the
//! distribution name and extension always come from the caller or the
//! produced file.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::core::target::PLATFORM_PREFIX;

/// Extension of wheel archives.
pub const WHEEL_EXTENSION: &str = "whl";

static SEPARATOR_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_.]+").expect("separator pattern is valid"));

/// Normalize a distribution name for use in a wheel file name.
///
/// Lowercases and collapses runs of `-`, `_` and `.` into a single `_`.
pub fn normalize_distribution_name(name: &str) -> String {
    SEPARATOR_RUN
        .replace_all(&name.trim().to_lowercase(), "_")
        .into_owned()
}

/// Fields recovered from a wheel file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelFileName {
    pub distribution: String,
    pub version: Option<String>,
    /// `(interpreter, abi)` when both are present.
    pub tags: Option<(String, String)>,
    /// Platform tag, present whenever `tags` is.
    pub platform: Option<String>,
    pub extension: String,
}

impl WheelFileName {
    /// Split a file name on its field separator.
    ///
    /// Five fields carry the tags in positions 3 and 4; six fields mean a
    /// build tag sits before them. Anything else leaves `tags` empty.
    pub fn parse(file_name: &str) -> WheelFileName {
        let (stem, extension) = match file_name.rsplit_once('.') {
            Some((stem, ext)) => (stem, ext.to_string()),
            None => (file_name, String::new()),
        };

        let fields: Vec<&str> = stem.split('-').collect();
        let non_empty = |i: usize| {
            fields
                .get(i)
                .filter(|f| !f.is_empty())
                .map(|f| f.to_string())
        };

        let (tags, platform) = match fields.len() {
            5 => (non_empty(2).zip(non_empty(3)), non_empty(4)),
            6 => (non_empty(3).zip(non_empty(4)), non_empty(5)),
            _ => (None, None),
        };

        WheelFileName {
            distribution: fields.first().copied().unwrap_or_default().to_string(),
            version: non_empty(1),
            tags,
            platform,
            extension,
        }
    }

    /// Whether the platform tag already names an Android target, i.e. the
    /// file is a finished output rather than fresh build-tool output.
    pub fn is_android(&self) -> bool {
        self.platform
            .as_deref()
            .and_then(|p| p.strip_prefix(PLATFORM_PREFIX))
            .is_some_and(|rest| rest.starts_with('_'))
    }

    /// Whether this file belongs to the given (unnormalized) distribution.
    pub fn matches_distribution(&self, distribution: &str) -> bool {
        normalize_distribution_name(&self.distribution)
            == normalize_distribution_name(distribution)
    }
}

/// A built wheel with the fields it will be renamed with.
///
/// Created only after the build tool succeeded, and consumed when moved into
/// the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub distribution_name: String,
    pub version: String,
    pub interpreter_tag: String,
    pub abi_tag: String,
    pub platform_tag: String,
    pub extension: String,
}

impl Artifact {
    /// The normalized cross-target file name.
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}.{}",
            self.distribution_name,
            self.version,
            self.interpreter_tag,
            self.abi_tag,
            self.platform_tag,
            self.extension
        )
    }

    /// Where the artifact lands inside `output_dir`.
    pub fn destination(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(self.file_name())
    }
}
