//! The cross-compile pipeline.
//!
//! Toolchain resolution, backend detection, the cross-compile configurator
//! that drives the build tool, and post-processing of the built wheel.

pub mod artifact;
pub mod cross;
pub mod detect;
pub mod tool;
pub mod toolchain;

pub use artifact::{ArtifactRequest, ArtifactResolver};
pub use cross::{
    BuildDirective, BuildOutcome, ConfigState, CrossCompileConfigurator, CrossCompilePlan,
    CrossCompileRequest, InterpreterStrategy,
};
pub use detect::{BuildBackend, ProjectLayout};
pub use tool::{BuildInvocation, BuildTool, ProcessBuildTool, ToolOutput};
pub use toolchain::{ToolchainPaths, ToolchainResolver};
