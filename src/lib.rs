//! droidwheel - cross-compile Python native-extension packages into Android wheels
//!
//! This crate provides the core library functionality for droidwheel:
//! NDK toolchain resolution, build backend detection, the cross-compile
//! configurator that drives the external build tool, and wheel
//! post-processing.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Test utilities and doubles for droidwheel unit tests.
///
/// This module is only available when compiling with `--cfg test`. It
/// provides a recording build tool and fixture generators for fake NDK
/// trees, maturin projects and staged sysconfigdata directories.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{
    errors::PipelineError,
    interpreter::{InterpreterDescriptor, InterpreterKind, PythonVersion},
    target::{AndroidAbi, TargetDescriptor},
    wheel::Artifact,
};

pub use builder::{
    artifact::ArtifactResolver,
    cross::CrossCompileConfigurator,
    detect::BuildBackend,
    toolchain::{ToolchainPaths, ToolchainResolver},
};
pub use util::context::GlobalContext;
