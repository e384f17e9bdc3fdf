//! Android NDK toolchain resolution.
//!
//! Maps a [`TargetDescriptor`] onto the clang wrappers and binutils of an
//! extracted NDK. The API level is part of the compiler wrapper's file name,
//! so an unsupported level fails here instead of silently using another one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::errors::PipelineError;
use crate::core::target::TargetDescriptor;

/// Prebuilt directory name for the build host.
#[cfg(target_os = "macos")]
pub const HOST_TAG: &str = "darwin-x86_64";
#[cfg(target_os = "windows")]
pub const HOST_TAG: &str = "windows-x86_64";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub const HOST_TAG: &str = "linux-x86_64";

/// Suffix of the clang wrapper scripts on the build host.
#[cfg(target_os = "windows")]
pub const WRAPPER_SUFFIX: &str = ".cmd";
#[cfg(not(target_os = "windows"))]
pub const WRAPPER_SUFFIX: &str = "";

/// Concrete tool paths for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolchainPaths {
    pub ndk_root: PathBuf,
    /// `toolchains/llvm/prebuilt/<host-tag>`
    pub prebuilt: PathBuf,
    pub compiler: PathBuf,
    pub cxx_compiler: PathBuf,
    pub archiver: PathBuf,
    pub linker: PathBuf,
    pub strip_tool: PathBuf,
    pub sysroot_flags: Vec<String>,
}

impl ToolchainPaths {
    /// Environment handed to the build tool so cargo, the `cc` crate and
    /// setuptools all pick up the NDK tools.
    pub fn env(&self, target: &TargetDescriptor) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        let cc = self.compiler.display().to_string();
        let cxx = self.cxx_compiler.display().to_string();
        let ar = self.archiver.display().to_string();
        let flags = self.sysroot_flags.join(" ");
        let ndk = self.ndk_root.display().to_string();

        env.insert("NDK_HOME".to_string(), ndk.clone());
        env.insert("ANDROID_NDK_HOME".to_string(), ndk);
        env.insert("TOOLCHAIN".to_string(), self.prebuilt.display().to_string());

        env.insert("CC".to_string(), cc.clone());
        env.insert("CXX".to_string(), cxx.clone());
        env.insert("AR".to_string(), ar.clone());
        env.insert("LD".to_string(), self.linker.display().to_string());
        env.insert("STRIP".to_string(), self.strip_tool.display().to_string());
        env.insert("CFLAGS".to_string(), flags.clone());
        env.insert("LDFLAGS".to_string(), flags);

        let cargo_triple = target.triple().to_uppercase().replace('-', "_");
        env.insert(format!("CARGO_TARGET_{}_LINKER", cargo_triple), cc.clone());
        env.insert(format!("CARGO_TARGET_{}_AR", cargo_triple), ar.clone());

        let cc_triple = target.triple().replace('-', "_");
        env.insert(format!("CC_{}", cc_triple), cc);
        env.insert(format!("CXX_{}", cc_triple), cxx);
        env.insert(format!("AR_{}", cc_triple), ar);

        env
    }
}

/// Resolves NDK tool paths for Android targets.
#[derive(Debug, Clone)]
pub struct ToolchainResolver {
    ndk_root: PathBuf,
}

impl ToolchainResolver {
    /// Create a resolver for the NDK at `ndk_root`, using the build host's
    /// prebuilt directory.
    pub fn new(ndk_root: impl Into<PathBuf>) -> Self {
        ToolchainResolver {
            ndk_root: ndk_root.into(),
        }
    }

    pub fn ndk_root(&self) -> &Path {
        &self.ndk_root
    }

    /// `toolchains/llvm/prebuilt/<host-tag>` under the NDK root.
    pub fn prebuilt_dir(&self) -> PathBuf {
        self.ndk_root
            .join("toolchains")
            .join("llvm")
            .join("prebuilt")
            .join(HOST_TAG)
    }

    /// Resolve the tool paths for `target`.
    ///
    /// Only the level-specific compiler wrapper is checked for existence;
    /// the remaining tools ship unconditionally with every NDK.
    pub fn resolve(&self, target: &TargetDescriptor) -> Result<ToolchainPaths, PipelineError> {
        let prebuilt = self.prebuilt_dir();
        let bin = prebuilt.join("bin");
        let wrapper = |suffix: &str| {
            bin.join(format!(
                "{}{}-{}{}",
                target.triple(),
                target.api_level(),
                suffix,
                WRAPPER_SUFFIX
            ))
        };
        let compiler = wrapper("clang");

        if !target.api_level_supported() || !compiler.is_file() {
            tracing::debug!(
                "no compiler for {} at {}",
                target,
                compiler.display()
            );
            return Err(PipelineError::ToolchainNotFound {
                triple: target.triple().to_string(),
                api_level: target.api_level(),
                expected: compiler,
            });
        }

        let paths = ToolchainPaths {
            ndk_root: self.ndk_root.clone(),
            cxx_compiler: wrapper("clang++"),
            archiver: bin.join(format!("llvm-ar{}", std::env::consts::EXE_SUFFIX)),
            linker: bin.join(format!("ld{}", std::env::consts::EXE_SUFFIX)),
            strip_tool: bin.join(format!("llvm-strip{}", std::env::consts::EXE_SUFFIX)),
            sysroot_flags: vec![format!("--sysroot={}", prebuilt.join("sysroot").display())],
            compiler,
            prebuilt,
        };

        tracing::debug!("resolved toolchain for {}: {}", target, paths.compiler.display());
        Ok(paths)
    }
}
