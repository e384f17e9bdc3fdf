//! Command implementations

pub mod build;
pub mod completions;
pub mod detect;
pub mod env;
pub mod fetch;
pub mod toolchain;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use crate::cli::PipelineArgs;
use droidwheel::core::target::{AndroidAbi, DEFAULT_API_LEVEL};
use droidwheel::ops::BuildOptions;
use droidwheel::util::diagnostic::emit;
use droidwheel::util::Config;
use droidwheel::{GlobalContext, PipelineError, PythonVersion};

/// Where finished wheels go when nothing else is configured.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Print `err` and return the process exit code for it.
pub fn report_error(err: &anyhow::Error, color: bool) -> i32 {
    match err.downcast_ref::<PipelineError>() {
        Some(pipeline) => {
            emit(&pipeline.to_diagnostic(), color);
            pipeline.exit_code()
        }
        None => {
            eprintln!("error: {:#}", err);
            1
        }
    }
}

/// NDK root: `--ndk` / `ANDROID_NDK_HOME`, then config.
pub fn resolve_ndk(ctx: &GlobalContext, cli: Option<&Path>, config: &Config) -> Result<PathBuf> {
    cli.or(config.ndk.root.as_deref())
        .map(|p| ctx.resolve_path(p))
        .ok_or_else(|| {
            anyhow!(
                "no Android NDK configured\n\
                 help: pass `--ndk`, set ANDROID_NDK_HOME, or set `[ndk] root` in {}",
                ctx.config_path().display()
            )
        })
}

/// Merge pipeline flags with configuration into build options.
///
/// Flags (and their environment variables) win over project config, which
/// wins over global config, which wins over built-in defaults.
pub fn build_options(
    ctx: &GlobalContext,
    args: &PipelineArgs,
    config: &Config,
    project_dir: PathBuf,
) -> Result<BuildOptions> {
    let ndk_root = resolve_ndk(ctx, args.ndk.as_deref(), config)?;

    let abis = if !args.abis.is_empty() {
        args.abis.clone()
    } else if !config.target.abis.is_empty() {
        config.target.abis.clone()
    } else {
        AndroidAbi::ALL.to_vec()
    };

    let python_version = match args.python_version {
        Some(v) => Some(v),
        None => config
            .python
            .version
            .as_deref()
            .map(|v| v.parse::<PythonVersion>().map_err(|e| anyhow!(e)))
            .transpose()?,
    };

    let release = if args.debug {
        false
    } else if args.release {
        true
    } else {
        config.build.release.unwrap_or(true)
    };

    let mut features = config.build.features.clone();
    for feature in &args.features {
        if !feature.is_empty() && !features.contains(feature) {
            features.push(feature.clone());
        }
    }

    let output_dir = config
        .build
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    Ok(BuildOptions {
        distribution: None,
        version: None,
        project_dir,
        output_dir: ctx.resolve_path(&output_dir),
        ndk_root,
        abis,
        api_level: args
            .api_level
            .or(config.target.api_level)
            .unwrap_or(DEFAULT_API_LEVEL),
        python_version,
        interpreter: args.interpreter.clone().or(config.python.interpreter.clone()),
        lib_dir: args
            .lib_dir
            .as_deref()
            .or(config.python.lib_dir.as_deref())
            .map(|p| ctx.resolve_path(p)),
        features,
        release,
        maturin: args
            .maturin
            .clone()
            .or(config.build.maturin.clone())
            .unwrap_or_else(|| PathBuf::from("maturin")),
        host_python: args
            .host_python
            .clone()
            .or(config.build.host_python.clone())
            .unwrap_or_else(|| PathBuf::from("python3")),
        verbose: ctx.is_verbose(),
    })
}

/// Project directory for commands that build in place.
pub fn local_project_dir(ctx: &GlobalContext, args: &PipelineArgs) -> PathBuf {
    match &args.source_dir {
        Some(dir) => ctx.resolve_path(dir),
        None => ctx.cwd().to_path_buf(),
    }
}
