//! Core data types for droidwheel.
//!
//! These describe the build target, the (foreign) interpreter a wheel is
//! built for, the produced artifact, and the pipeline error taxonomy.

pub mod errors;
pub mod interpreter;
pub mod target;
pub mod wheel;

pub use errors::PipelineError;
pub use interpreter::{InterpreterDescriptor, InterpreterImpl, InterpreterKind, PythonVersion};
pub use target::{AndroidAbi, TargetDescriptor};
pub use wheel::Artifact;
