//! Implementation of `droidwheel build`.
//!
//! One pipeline instance per ABI: configure, run the build tool, then
//! rename the wheel into the output directory. Several ABIs run in
//! parallel, each on its own copy of the project source.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use indicatif::MultiProgress;
use rayon::prelude::*;
use serde::Serialize;

use crate::builder::artifact::{ArtifactRequest, ArtifactResolver};
use crate::builder::cross::{CrossCompileConfigurator, CrossCompilePlan, CrossCompileRequest};
use crate::builder::tool::{BuildTool, ProcessBuildTool};
use crate::builder::toolchain::ToolchainResolver;
use crate::core::interpreter::PythonVersion;
use crate::core::target::{AndroidAbi, TargetDescriptor};
use crate::util::fs::{copy_project_tree, ensure_dir, Exclusions};
use crate::util::hash::sha256_file;

/// Options for the build command.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Distribution name; defaults to `[project] name`
    pub distribution: Option<String>,

    /// Version to put in the wheel name; defaults to the built one
    pub version: Option<String>,

    /// Project root (the build descriptor may be nested)
    pub project_dir: PathBuf,

    /// Where renamed wheels are written
    pub output_dir: PathBuf,

    /// Android NDK root
    pub ndk_root: PathBuf,

    /// ABIs to build
    pub abis: Vec<AndroidAbi>,

    /// Android API level
    pub api_level: u32,

    pub python_version: Option<PythonVersion>,
    pub interpreter: Option<String>,
    pub lib_dir: Option<PathBuf>,

    /// Extra cargo features
    pub features: Vec<String>,

    /// Build in release mode
    pub release: bool,

    pub maturin: PathBuf,
    pub host_python: PathBuf,

    /// Verbose output
    pub verbose: bool,
}

impl BuildOptions {
    /// The configurator request for one ABI, building in `project_dir`.
    pub fn request(&self, abi: AndroidAbi, project_dir: &Path) -> CrossCompileRequest {
        let mut request =
            CrossCompileRequest::new(TargetDescriptor::new(abi, self.api_level), project_dir);
        request.python_version = self.python_version;
        request.interpreter = self.interpreter.clone();
        request.lib_dir = self.lib_dir.clone();
        request.extra_features = self.features.clone();
        request.release = self.release;
        request.maturin = self.maturin.clone();
        request.host_python = self.host_python.clone();
        request
    }
}

/// A successfully built and renamed wheel.
#[derive(Debug, Clone, Serialize)]
pub struct BuiltWheel {
    pub abi: AndroidAbi,
    pub path: PathBuf,
    pub file_name: String,
    pub sha256: String,
    /// Build tool invocations it took (1 or 2)
    pub attempts: usize,
    /// Interpreter strategy used
    pub strategy: String,
    /// Features of the attempt that succeeded
    pub features: Vec<String>,
}

/// Outcome of one ABI's pipeline.
#[derive(Debug)]
pub struct AbiResult {
    pub abi: AndroidAbi,
    pub result: Result<BuiltWheel>,
}

/// Resolve the plan for one ABI without running anything.
pub fn plan_build(opts: &BuildOptions, abi: AndroidAbi) -> Result<CrossCompilePlan> {
    let resolver = ToolchainResolver::new(&opts.ndk_root);
    let mut configurator = CrossCompileConfigurator::new(&resolver);
    Ok(configurator.configure(&opts.request(abi, &opts.project_dir))?)
}

/// Run the full pipeline for one ABI in `project_dir`, writing the wheel
/// to `output_dir`.
pub fn build_wheel(
    opts: &BuildOptions,
    abi: AndroidAbi,
    project_dir: &Path,
    output_dir: &Path,
    tool: &mut dyn BuildTool,
) -> Result<BuiltWheel> {
    let resolver = ToolchainResolver::new(&opts.ndk_root);
    let mut configurator = CrossCompileConfigurator::new(&resolver);
    let plan = configurator.configure(&opts.request(abi, project_dir))?;

    let distribution = opts
        .distribution
        .clone()
        .or_else(|| plan.layout.project_name.clone())
        .ok_or_else(|| {
            anyhow!(
                "no distribution name in {}; pass it with `--library`",
                plan.layout.project_dir.display()
            )
        })?;

    tracing::info!("building {} for {}", distribution, plan.target);
    let outcome = configurator.run(&plan, tool)?;

    let resolver = ArtifactResolver::new(plan.backend(), &plan.layout.project_dir)
        .with_search_root(project_dir)
        .excluding(output_dir)
        .excluding(&opts.output_dir);
    let request = ArtifactRequest {
        distribution: &distribution,
        version: opts.version.as_deref(),
        interpreter: &plan.interpreter,
        target: &plan.target,
    };
    let path = resolver.finalize(&request, output_dir)?;
    let sha256 = sha256_file(&path)?;

    Ok(BuiltWheel {
        abi,
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        path,
        sha256,
        attempts: outcome.attempts,
        strategy: plan.strategy.label().to_string(),
        features: outcome.directive.feature_set.into_iter().collect(),
    })
}

/// Build every requested ABI with subprocess build tools.
pub fn build_wheels(opts: &BuildOptions) -> Vec<AbiResult> {
    let progress = MultiProgress::new();
    build_wheels_with(opts, |_| {
        ProcessBuildTool::new()
            .verbose(opts.verbose)
            .with_progress(progress.clone())
    })
}

/// Build every requested ABI, creating one build tool per ABI.
///
/// A single ABI builds in place and writes straight to the output
/// directory. Several ABIs each build in a private copy of the project and
/// write to `<output>/<abi>`.
pub fn build_wheels_with<T, F>(opts: &BuildOptions, make_tool: F) -> Vec<AbiResult>
where
    T: BuildTool,
    F: Fn(AndroidAbi) -> T + Sync,
{
    if let [abi] = opts.abis.as_slice() {
        let mut tool = make_tool(*abi);
        let result = ensure_dir(&opts.output_dir).and_then(|_| {
            build_wheel(opts, *abi, &opts.project_dir, &opts.output_dir, &mut tool)
        });
        return vec![AbiResult { abi: *abi, result }];
    }

    opts.abis
        .par_iter()
        .map(|abi| {
            let mut tool = make_tool(*abi);
            let result = build_isolated(opts, *abi, &mut tool);
            AbiResult { abi: *abi, result }
        })
        .collect()
}

fn build_isolated(opts: &BuildOptions, abi: AndroidAbi, tool: &mut dyn BuildTool) -> Result<BuiltWheel> {
    let workdir = tempfile::Builder::new()
        .prefix(&format!("droidwheel-{}-", abi))
        .tempdir()
        .context("failed to create a build directory")?;
    copy_project_tree(
        &opts.project_dir,
        workdir.path(),
        &Exclusions::new(&[&opts.output_dir]),
    )?;
    tracing::debug!(
        "building {} in {}",
        abi,
        workdir.path().display()
    );

    let output_dir = opts.output_dir.join(abi.as_str());
    ensure_dir(&output_dir)?;
    build_wheel(opts, abi, workdir.path(), &output_dir, tool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::PipelineError;
    use crate::test_support::fixtures::{fake_ndk, maturin_project};
    use crate::test_support::RecordingBuildTool;
    use tempfile::TempDir;

    fn options(root: &Path, abis: Vec<AndroidAbi>) -> BuildOptions {
        BuildOptions {
            distribution: None,
            version: None,
            project_dir: maturin_project(&root.join("examplelib"), "examplelib", true),
            output_dir: root.join("output"),
            ndk_root: fake_ndk(root, &[24]),
            abis,
            api_level: 24,
            python_version: Some(PythonVersion::new(3, 13)),
            interpreter: None,
            lib_dir: None,
            features: vec![],
            release: true,
            maturin: PathBuf::from("maturin"),
            host_python: PathBuf::from("python3"),
            verbose: false,
        }
    }

    #[test]
    fn test_single_abi_builds_in_place() {
        let tmp = TempDir::new().unwrap();
        let opts = options(tmp.path(), vec![AndroidAbi::X86_64]);

        let results = build_wheels_with(&opts, |_| {
            RecordingBuildTool::new().dropping_wheel(
                "target/wheels",
                "examplelib-1.2.3-cp313-cp313-linux_x86_64.whl",
            )
        });

        assert_eq!(results.len(), 1);
        let wheel = results[0].result.as_ref().unwrap();
        assert_eq!(
            wheel.file_name,
            "examplelib-1.2.3-cp313-cp313-android_24_x86_64.whl"
        );
        assert_eq!(wheel.path, opts.output_dir.join(&wheel.file_name));
        assert_eq!(wheel.attempts, 1);
        assert_eq!(wheel.strategy, "name-lookup");
        assert_eq!(wheel.sha256.len(), 64);
    }

    #[test]
    fn test_multiple_abis_use_private_copies() {
        let tmp = TempDir::new().unwrap();
        let opts = options(tmp.path(), AndroidAbi::ALL.to_vec());

        let results = build_wheels_with(&opts, |abi| {
            RecordingBuildTool::new().dropping_wheel(
                "target/wheels",
                format!("examplelib-1.2.3-cp313-cp313-linux_{}.whl", abi.arch_tag()),
            )
        });

        assert_eq!(results.len(), 2);
        for r in &results {
            let wheel = r.result.as_ref().unwrap();
            assert_eq!(wheel.path.parent().unwrap(), opts.output_dir.join(r.abi.as_str()));
            assert!(wheel.file_name.ends_with(&format!("android_24_{}.whl", r.abi.arch_tag())));
        }
        // the source tree itself was never built in
        assert!(!opts.project_dir.join("target").exists());
    }

    #[test]
    fn test_previous_outputs_are_not_reused() {
        let tmp = TempDir::new().unwrap();
        let mut opts = options(tmp.path(), vec![AndroidAbi::X86_64]);
        opts.output_dir = opts.project_dir.join("output");
        std::fs::create_dir_all(opts.output_dir.join("x86_64")).unwrap();
        std::fs::write(
            opts.output_dir.join("examplelib-1.2.3-cp313-cp313-android_24_x86_64.whl"),
            "stale",
        )
        .unwrap();
        std::fs::write(
            opts.output_dir.join("x86_64/examplelib-1.2.3-cp313-cp313-linux_x86_64.whl"),
            "stale",
        )
        .unwrap();

        // the tool succeeds but produces nothing
        let results = build_wheels_with(&opts, |_| RecordingBuildTool::new());
        let err = results[0].result.as_ref().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::ArtifactNotFound { .. })
        ));

        opts.abis = AndroidAbi::ALL.to_vec();
        let results = build_wheels_with(&opts, |_| RecordingBuildTool::new());
        for r in &results {
            assert!(matches!(
                r.result.as_ref().unwrap_err().downcast_ref::<PipelineError>(),
                Some(PipelineError::ArtifactNotFound { .. })
            ));
        }
    }

    #[test]
    fn test_nested_descriptor_wheel_at_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("repo");
        maturin_project(&root.join("bindings/python"), "examplelib", true);
        let mut opts = options(tmp.path(), vec![AndroidAbi::X86_64]);
        opts.project_dir = root.clone();

        // cargo workspaces put wheels in the workspace target dir
        let results = build_wheels_with(&opts, |_| {
            RecordingBuildTool::new().dropping_wheel(
                "../../target/wheels",
                "examplelib-1.2.3-cp313-cp313-linux_x86_64.whl",
            )
        });

        let wheel = results[0].result.as_ref().unwrap();
        assert_eq!(
            wheel.file_name,
            "examplelib-1.2.3-cp313-cp313-android_24_x86_64.whl"
        );
        assert!(!root.join("target/wheels/examplelib-1.2.3-cp313-cp313-linux_x86_64.whl").exists());
    }

    #[test]
    fn test_failure_is_reported_per_abi() {
        let tmp = TempDir::new().unwrap();
        let mut opts = options(tmp.path(), vec![AndroidAbi::Arm64V8a]);
        opts.api_level = 30;

        let results = build_wheels_with(&opts, |_| RecordingBuildTool::new());
        let err = results[0].result.as_ref().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::ToolchainNotFound { .. })
        ));
    }

    #[test]
    fn test_plan_build_does_not_invoke() {
        let tmp = TempDir::new().unwrap();
        let opts = options(tmp.path(), vec![AndroidAbi::X86_64]);

        let plan = plan_build(&opts, AndroidAbi::X86_64).unwrap();
        assert!(plan.directive.retry_without_abi3);
        assert!(!opts.project_dir.join("target").exists());
    }
}
