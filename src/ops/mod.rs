//! High-level operations.
//!
//! This module contains the implementation of droidwheel commands.

pub mod android_build;
pub mod fetch_source;

pub use android_build::{
    build_wheel, build_wheels, build_wheels_with, plan_build, AbiResult, BuildOptions, BuiltWheel,
};
pub use fetch_source::{clone_source, normalize_repo_input, source_url};
