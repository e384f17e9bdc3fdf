//! Target definitions - what a wheel is built for.
//!
//! A [`TargetDescriptor`] pairs one of the supported Android ABIs with a
//! platform API level. It is constructed once per build invocation and
//! never changes afterwards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Platform prefix used in wheel platform tags (`android_<api>_<arch>`).
pub const PLATFORM_PREFIX: &str = "android";

/// Lowest API level the bundled NDK toolchains ship compilers for.
pub const MIN_API_LEVEL: u32 = 21;

/// Highest API level the bundled NDK toolchains ship compilers for.
pub const MAX_API_LEVEL: u32 = 34;

/// Default API level when none is configured.
pub const DEFAULT_API_LEVEL: u32 = 24;

/// Android ABIs droidwheel can build for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AndroidAbi {
    /// 64-bit ARM
    #[serde(rename = "arm64-v8a", alias = "arm64", alias = "aarch64")]
    Arm64V8a,

    /// 64-bit x86
    #[serde(rename = "x86_64", alias = "x86-64")]
    X86_64,
}

impl AndroidAbi {
    /// Every supported ABI.
    pub const ALL: [AndroidAbi; 2] = [AndroidAbi::Arm64V8a, AndroidAbi::X86_64];

    /// The Android ABI name (e.g. `arm64-v8a`).
    pub fn as_str(&self) -> &'static str {
        match self {
            AndroidAbi::Arm64V8a => "arm64-v8a",
            AndroidAbi::X86_64 => "x86_64",
        }
    }

    /// The Rust/LLVM target triple.
    pub fn triple(&self) -> &'static str {
        match self {
            AndroidAbi::Arm64V8a => "aarch64-linux-android",
            AndroidAbi::X86_64 => "x86_64-linux-android",
        }
    }

    /// The architecture component of the wheel platform tag.
    pub fn arch_tag(&self) -> &'static str {
        match self {
            AndroidAbi::Arm64V8a => "arm64_v8a",
            AndroidAbi::X86_64 => "x86_64",
        }
    }

    /// Look up an ABI by its target triple.
    pub fn from_triple(triple: &str) -> Option<Self> {
        AndroidAbi::ALL.into_iter().find(|abi| abi.triple() == triple)
    }
}

impl fmt::Display for AndroidAbi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AndroidAbi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "arm64-v8a" | "arm64_v8a" | "arm64" | "aarch64" => Ok(AndroidAbi::Arm64V8a),
            "x86_64" | "x86-64" => Ok(AndroidAbi::X86_64),
            other => AndroidAbi::from_triple(other).ok_or_else(|| {
                format!(
                    "unsupported Android ABI '{}'; expected one of: {}",
                    s,
                    AndroidAbi::ALL
                        .iter()
                        .map(|a| a.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }),
        }
    }
}

/// What a single pipeline instance builds for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TargetDescriptor {
    abi: AndroidAbi,
    api_level: u32,
}

impl TargetDescriptor {
    /// Create a new target descriptor.
    ///
    /// The API level is not validated here; the toolchain resolver rejects
    /// levels it has no compiler for.
    pub fn new(abi: AndroidAbi, api_level: u32) -> Self {
        TargetDescriptor { abi, api_level }
    }

    pub fn abi(&self) -> AndroidAbi {
        self.abi
    }

    pub fn triple(&self) -> &'static str {
        self.abi.triple()
    }

    pub fn api_level(&self) -> u32 {
        self.api_level
    }

    pub fn arch_tag(&self) -> &'static str {
        self.abi.arch_tag()
    }

    /// Whether the API level falls inside the supported range.
    pub fn api_level_supported(&self) -> bool {
        (MIN_API_LEVEL..=MAX_API_LEVEL).contains(&self.api_level)
    }

    /// The wheel platform tag, e.g. `android_24_x86_64`.
    pub fn platform_tag(&self) -> String {
        format!("{}_{}_{}", PLATFORM_PREFIX, self.api_level, self.arch_tag())
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (API {})", self.triple(), self.api_level)
    }
}
