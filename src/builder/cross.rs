//! Cross-compile configuration and the feature fallback.
//!
//! [`CrossCompileConfigurator`] turns a [`CrossCompileRequest`] into a frozen
//! [`CrossCompilePlan`] (toolchain, backend, interpreter strategy, features)
//! and then drives the build tool through at most two feature attempts.
//!
//! The foreign interpreter is never executed. Either a staged Android
//! `lib` directory is handed to PyO3 (`PYO3_CROSS_LIB_DIR`) and its
//! sysconfigdata is read as text, or a bare interpreter name is matched
//! against built-in profiles.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::builder::detect::{BuildBackend, ProjectLayout, HOST_RUNTIME_BINDING};
use crate::builder::tool::{BuildInvocation, BuildTool};
use crate::builder::toolchain::{ToolchainPaths, ToolchainResolver};
use crate::core::errors::PipelineError;
use crate::core::interpreter::{InterpreterDescriptor, PythonVersion};
use crate::core::target::TargetDescriptor;
use crate::util::fs::glob_files;

pub const PYO3_CROSS: &str = "PYO3_CROSS";
pub const PYO3_CROSS_PYTHON_VERSION: &str = "PYO3_CROSS_PYTHON_VERSION";
pub const PYO3_CROSS_PYTHON_IMPLEMENTATION: &str = "PYO3_CROSS_PYTHON_IMPLEMENTATION";
pub const PYO3_CROSS_LIB_DIR: &str = "PYO3_CROSS_LIB_DIR";
pub const PYO3_NO_PYTHON: &str = "PYO3_NO_PYTHON";
pub const SYSCONFIGDATA_NAME: &str = "_PYTHON_SYSCONFIGDATA_NAME";
pub const SYSCONFIGDATA_PATH: &str = "_PYTHON_SYSCONFIGDATA_PATH";

/// Directory holding the `_sysconfigdata*.py` file, derived from the lib dir.
pub const DERIVED_SYSCONFIG_DIR: &str = "sysconfig-dir";

/// Derived values exported under the variable names the build tool's own
/// child processes read: `(derived value, variable)`.
pub const ENV_PASSTHROUGH: &[(&str, &str)] = &[(DERIVED_SYSCONFIG_DIR, SYSCONFIGDATA_PATH)];

/// Variables that select the directory-anchored strategy. They are removed
/// from the inherited environment when the name-lookup strategy is used.
const DIRECTORY_VARS: &[&str] = &[PYO3_CROSS_LIB_DIR, SYSCONFIGDATA_NAME, SYSCONFIGDATA_PATH];

/// Feature that builds a loadable module instead of linking the runtime.
pub fn extension_module_feature() -> String {
    format!("{}/extension-module", HOST_RUNTIME_BINDING)
}

/// Stable-ABI feature for the given minimum version (`pyo3/abi3-py313`).
pub fn abi3_feature(version: PythonVersion) -> String {
    format!("{}/abi3-py{}", HOST_RUNTIME_BINDING, version.nodot())
}

fn is_abi3_feature(feature: &str) -> bool {
    feature.starts_with(&format!("{}/abi3", HOST_RUNTIME_BINDING))
}

/// How the build tool learns about the target interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum InterpreterStrategy {
    /// Point PyO3 at a staged Android `lib` directory.
    DirectoryAnchored {
        lib_dir: PathBuf,
        /// Directory holding the sysconfigdata file.
        sysconfig_dir: PathBuf,
        sysconfigdata: PathBuf,
    },
    /// Match a bare interpreter name against built-in profiles.
    NameLookup { name: String },
}

impl InterpreterStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            InterpreterStrategy::DirectoryAnchored { .. } => "directory-anchored",
            InterpreterStrategy::NameLookup { .. } => "name-lookup",
        }
    }
}

impl fmt::Display for InterpreterStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpreterStrategy::DirectoryAnchored { sysconfigdata, .. } => {
                write!(f, "{} ({})", self.label(), sysconfigdata.display())
            }
            InterpreterStrategy::NameLookup { name } => write!(f, "{} ({})", self.label(), name),
        }
    }
}

/// Configurator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigState {
    Unconfigured,
    ToolchainBound,
    BackendSelected,
    InterpreterStrategyChosen,
    FeatureAttempt1,
    FeatureAttempt2,
    Success,
    Failed,
}

impl ConfigState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConfigState::Success | ConfigState::Failed)
    }
}

/// Backend and features for one build attempt. Frozen once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildDirective {
    pub backend: BuildBackend,
    pub feature_set: BTreeSet<String>,
    /// Whether a failure of this attempt is retried without abi3.
    pub retry_without_abi3: bool,
}

impl BuildDirective {
    /// Resolve the first attempt's directive.
    fn resolve(
        backend: BuildBackend,
        host_runtime_binding: bool,
        version: PythonVersion,
        extra_features: &[String],
    ) -> Self {
        let mut feature_set = BTreeSet::new();
        let mut retry_without_abi3 = false;

        if backend == BuildBackend::NativeExtension {
            feature_set.extend(extra_features.iter().cloned());
            if host_runtime_binding {
                feature_set.insert(extension_module_feature());
                feature_set.insert(abi3_feature(version));
                retry_without_abi3 = true;
            }
        }

        BuildDirective {
            backend,
            feature_set,
            retry_without_abi3,
        }
    }

    /// The fallback directive: same features minus abi3, no further retry.
    pub fn without_abi3(&self) -> Self {
        BuildDirective {
            backend: self.backend,
            feature_set: self
                .feature_set
                .iter()
                .filter(|f| !is_abi3_feature(f))
                .cloned()
                .collect(),
            retry_without_abi3: false,
        }
    }

    /// Comma-separated feature list, empty if there are none.
    pub fn features_arg(&self) -> String {
        self.feature_set
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Everything the caller supplies for one target build.
#[derive(Debug, Clone)]
pub struct CrossCompileRequest {
    pub target: TargetDescriptor,
    /// Project root; the build descriptor may be nested below it.
    pub project_dir: PathBuf,
    pub python_version: Option<PythonVersion>,
    /// Interpreter name for name lookup (`python3.13`).
    pub interpreter: Option<String>,
    /// Staged Android Python `lib` directory.
    pub lib_dir: Option<PathBuf>,
    pub extra_features: Vec<String>,
    pub release: bool,
    /// maturin executable (native-extension backend).
    pub maturin: PathBuf,
    /// Host Python running `python -m build` (standard backend).
    pub host_python: PathBuf,
}

impl CrossCompileRequest {
    pub fn new(target: TargetDescriptor, project_dir: impl Into<PathBuf>) -> Self {
        CrossCompileRequest {
            target,
            project_dir: project_dir.into(),
            python_version: None,
            interpreter: None,
            lib_dir: None,
            extra_features: Vec::new(),
            release: true,
            maturin: PathBuf::from("maturin"),
            host_python: PathBuf::from("python3"),
        }
    }

    /// Name for the name-lookup strategy: explicit, else derived from the
    /// requested version.
    pub fn interpreter_name(&self) -> Option<String> {
        self.interpreter
            .clone()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| self.python_version.map(|v| format!("python{}", v)))
    }
}

/// A fully resolved build, ready to run.
#[derive(Debug, Clone, Serialize)]
pub struct CrossCompilePlan {
    pub target: TargetDescriptor,
    pub toolchain: ToolchainPaths,
    pub layout: ProjectLayout,
    pub strategy: InterpreterStrategy,
    pub interpreter: InterpreterDescriptor,
    pub directive: BuildDirective,
    /// Environment shared by every attempt.
    pub env: BTreeMap<String, String>,
    #[serde(skip)]
    maturin: PathBuf,
    #[serde(skip)]
    host_python: PathBuf,
    #[serde(skip)]
    release: bool,
}

impl CrossCompilePlan {
    pub fn backend(&self) -> BuildBackend {
        self.directive.backend
    }

    /// Where the build tool leaves its wheels.
    pub fn output_dir(&self) -> PathBuf {
        self.layout
            .project_dir
            .join(self.directive.backend.output_subdir())
    }

    /// Directives in attempt order (one or two).
    pub fn attempts(&self) -> Vec<BuildDirective> {
        let mut attempts = vec![self.directive.clone()];
        if self.directive.retry_without_abi3 {
            attempts.push(self.directive.without_abi3());
        }
        attempts
    }

    /// Build the invocation for one attempt.
    ///
    /// Runtime probing is suppressed only on an attempt that still has a
    /// fallback behind it.
    pub fn invocation(&self, directive: &BuildDirective) -> BuildInvocation {
        let mut env = self.env.clone();
        let mut env_remove = Vec::new();

        if directive.retry_without_abi3 {
            env.insert(PYO3_NO_PYTHON.to_string(), "1".to_string());
        } else {
            env_remove.push(PYO3_NO_PYTHON.to_string());
        }
        if matches!(self.strategy, InterpreterStrategy::NameLookup { .. }) {
            env_remove.extend(DIRECTORY_VARS.iter().map(|v| v.to_string()));
        }

        let (program, args) = match directive.backend {
            BuildBackend::NativeExtension => {
                let mut args = vec!["build".to_string()];
                if self.release {
                    args.push("--release".to_string());
                }
                args.extend([
                    "--target".to_string(),
                    self.target.triple().to_string(),
                    "-i".to_string(),
                    self.interpreter.name(),
                ]);
                if !directive.feature_set.is_empty() {
                    args.extend(["--features".to_string(), directive.features_arg()]);
                }
                (self.maturin.clone(), args)
            }
            BuildBackend::Standard => (
                self.host_python.clone(),
                ["-m", "build", "--wheel", "--outdir", "dist"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            ),
        };

        BuildInvocation {
            program,
            args,
            env,
            env_remove,
            cwd: self.layout.project_dir.clone(),
        }
    }
}

/// What a successful build run produced.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// Number of build tool invocations (1 or 2).
    pub attempts: usize,
    /// The directive of the attempt that succeeded.
    pub directive: BuildDirective,
    pub output: String,
}

/// Drives one target build from request to build tool exit.
#[derive(Debug)]
pub struct CrossCompileConfigurator<'a> {
    resolver: &'a ToolchainResolver,
    state: ConfigState,
    history: Vec<ConfigState>,
}

impl<'a> CrossCompileConfigurator<'a> {
    pub fn new(resolver: &'a ToolchainResolver) -> Self {
        CrossCompileConfigurator {
            resolver,
            state: ConfigState::Unconfigured,
            history: vec![ConfigState::Unconfigured],
        }
    }

    pub fn state(&self) -> ConfigState {
        self.state
    }

    /// Every state visited, in order.
    pub fn history(&self) -> &[ConfigState] {
        &self.history
    }

    fn transition(&mut self, next: ConfigState) {
        tracing::debug!("configurator: {:?} -> {:?}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    fn fail<T>(&mut self, err: PipelineError) -> Result<T, PipelineError> {
        self.transition(ConfigState::Failed);
        Err(err)
    }

    /// Resolve toolchain, backend, interpreter strategy and features.
    ///
    /// Nothing is executed here; the sysconfigdata file is only read.
    pub fn configure(
        &mut self,
        request: &CrossCompileRequest,
    ) -> Result<CrossCompilePlan, PipelineError> {
        self.state = ConfigState::Unconfigured;
        self.history = vec![ConfigState::Unconfigured];

        let toolchain = match self.resolver.resolve(&request.target) {
            Ok(paths) => paths,
            Err(e) => return self.fail(e),
        };
        self.transition(ConfigState::ToolchainBound);

        let layout = match ProjectLayout::detect(&request.project_dir) {
            Ok(layout) => layout,
            Err(e) => {
                return self.fail(PipelineError::InsufficientConfiguration {
                    reason: format!("cannot read the project's build descriptor: {:#}", e),
                })
            }
        };
        tracing::info!(
            "{}: {} backend (`{}`)",
            layout.project_dir.display(),
            layout.backend,
            layout.backend_id
        );
        self.transition(ConfigState::BackendSelected);

        let (strategy, interpreter) = match choose_strategy(request) {
            Ok(chosen) => chosen,
            Err(e) => return self.fail(e),
        };
        tracing::info!("interpreter: {} via {}", interpreter.name(), strategy);
        self.transition(ConfigState::InterpreterStrategyChosen);

        let directive = BuildDirective::resolve(
            layout.backend,
            layout.host_runtime_binding,
            interpreter.version,
            &request.extra_features,
        );
        let env = cross_env(&toolchain, &request.target, &strategy, &interpreter);

        Ok(CrossCompilePlan {
            target: request.target,
            toolchain,
            layout,
            strategy,
            interpreter,
            directive,
            env,
            maturin: request.maturin.clone(),
            host_python: request.host_python.clone(),
            release: request.release,
        })
    }

    /// Run the build tool: attempt 1, then the abi3-less attempt 2 if the
    /// directive allows it. A tool that cannot start is not retried.
    pub fn run(
        &mut self,
        plan: &CrossCompilePlan,
        tool: &mut dyn BuildTool,
    ) -> Result<BuildOutcome, PipelineError> {
        if self.state != ConfigState::InterpreterStrategyChosen {
            return Err(PipelineError::InsufficientConfiguration {
                reason: format!(
                    "configurator is {:?}, not ready to run; configure it first",
                    self.state
                ),
            });
        }
        let attempts = plan.attempts();
        let mut transcript = String::new();
        let mut last_failure = None;

        for (index, directive) in attempts.iter().enumerate() {
            self.transition(if index == 0 {
                ConfigState::FeatureAttempt1
            } else {
                ConfigState::FeatureAttempt2
            });

            let invocation = plan.invocation(directive);
            let program = invocation.program.display().to_string();
            tracing::debug!(
                "attempt {} with features [{}]",
                index + 1,
                directive.features_arg()
            );

            let output = match tool.invoke(&invocation) {
                Ok(output) => output,
                Err(e) => {
                    append_attempt(&mut transcript, index + 1, &format!("{:#}", e));
                    return self.fail(PipelineError::BuildToolFailure {
                        program,
                        code: None,
                        attempts: index + 1,
                        output: transcript,
                    });
                }
            };

            if output.success() {
                self.transition(ConfigState::Success);
                return Ok(BuildOutcome {
                    attempts: index + 1,
                    directive: directive.clone(),
                    output: output.output,
                });
            }

            if directive.retry_without_abi3 {
                tracing::warn!(
                    "build failed with exit code {:?}; retrying without abi3",
                    output.code
                );
            }
            append_attempt(&mut transcript, index + 1, &output.output);
            last_failure = Some((program, output.code));
        }

        let (program, code) = last_failure.unwrap_or_default();
        self.fail(PipelineError::BuildToolFailure {
            program,
            code,
            attempts: attempts.len(),
            output: transcript,
        })
    }
}

/// Add one attempt's output to the failure transcript under its own header.
fn append_attempt(transcript: &mut String, attempt: usize, output: &str) {
    if !transcript.is_empty() && !transcript.ends_with('\n') {
        transcript.push('\n');
    }
    transcript.push_str(&format!("--- attempt {} ---\n", attempt));
    transcript.push_str(output);
}

/// Pick the interpreter strategy from what the request supplies.
fn choose_strategy(
    request: &CrossCompileRequest,
) -> Result<(InterpreterStrategy, InterpreterDescriptor), PipelineError> {
    if let Some(lib_dir) = &request.lib_dir {
        let sysconfigdata = find_sysconfigdata(lib_dir, request.python_version).ok_or_else(|| {
            PipelineError::InsufficientConfiguration {
                reason: format!("no _sysconfigdata*.py found under {}", lib_dir.display()),
            }
        })?;
        let contents = std::fs::read_to_string(&sysconfigdata).map_err(|e| {
            PipelineError::InsufficientConfiguration {
                reason: format!("cannot read {}: {}", sysconfigdata.display(), e),
            }
        })?;
        let interpreter = InterpreterDescriptor::from_sysconfigdata(&sysconfigdata, &contents)?;

        if let Some(requested) = request.python_version {
            if requested != interpreter.version {
                tracing::warn!(
                    "requested Python {} but {} describes {}; using {}",
                    requested,
                    sysconfigdata.display(),
                    interpreter.version,
                    interpreter.version
                );
            }
        }

        let sysconfig_dir = sysconfigdata
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| lib_dir.clone());
        return Ok((
            InterpreterStrategy::DirectoryAnchored {
                lib_dir: lib_dir.clone(),
                sysconfig_dir,
                sysconfigdata,
            },
            interpreter,
        ));
    }

    if let Some(name) = request.interpreter_name() {
        let interpreter = InterpreterDescriptor::from_profile(&name)?;
        return Ok((InterpreterStrategy::NameLookup { name }, interpreter));
    }

    Err(PipelineError::InsufficientConfiguration {
        reason: "neither a Python library directory nor an interpreter name or version was given"
            .to_string(),
    })
}

/// Locate the sysconfigdata file in `<dir>`, `<dir>/python<ver>` or
/// `<dir>/lib/python<ver>`.
fn find_sysconfigdata(lib_dir: &Path, version: Option<PythonVersion>) -> Option<PathBuf> {
    let version_dirs: Vec<String> = match version {
        Some(v) => vec![format!("python{}", v)],
        None => python_subdirs(lib_dir),
    };

    let mut candidates = vec![lib_dir.to_path_buf()];
    for base in [lib_dir.to_path_buf(), lib_dir.join("lib")] {
        candidates.extend(version_dirs.iter().map(|d| base.join(d)));
    }

    candidates
        .iter()
        .filter(|dir| dir.is_dir())
        .find_map(|dir| {
            glob_files(dir, "_sysconfigdata*.py")
                .ok()
                .and_then(|files| files.into_iter().next())
        })
}

/// `python3.*` directory names in `<dir>` and `<dir>/lib`, sorted.
fn python_subdirs(lib_dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = [lib_dir.to_path_buf(), lib_dir.join("lib")]
        .iter()
        .filter_map(|dir| std::fs::read_dir(dir).ok())
        .flat_map(|entries| entries.filter_map(|e| e.ok()))
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .filter(|name| name.starts_with("python3."))
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Environment shared by every attempt: toolchain, PyO3 cross settings and
/// the pass-through copies.
fn cross_env(
    toolchain: &ToolchainPaths,
    target: &TargetDescriptor,
    strategy: &InterpreterStrategy,
    interpreter: &InterpreterDescriptor,
) -> BTreeMap<String, String> {
    let mut env = toolchain.env(target);

    env.insert(PYO3_CROSS.to_string(), "1".to_string());
    env.insert(
        PYO3_CROSS_PYTHON_VERSION.to_string(),
        interpreter.version.to_string(),
    );
    env.insert(
        PYO3_CROSS_PYTHON_IMPLEMENTATION.to_string(),
        interpreter.implementation.pyo3_name().to_string(),
    );

    let mut derived = BTreeMap::new();
    if let InterpreterStrategy::DirectoryAnchored {
        lib_dir,
        sysconfig_dir,
        sysconfigdata,
    } = strategy
    {
        env.insert(PYO3_CROSS_LIB_DIR.to_string(), lib_dir.display().to_string());
        if let Some(stem) = sysconfigdata.file_stem() {
            env.insert(
                SYSCONFIGDATA_NAME.to_string(),
                stem.to_string_lossy().into_owned(),
            );
        }
        derived.insert(DERIVED_SYSCONFIG_DIR, sysconfig_dir.display().to_string());
    }

    apply_passthrough(&mut env, &derived, ENV_PASSTHROUGH);
    env
}

/// Export each present derived value under its variable name, unchanged.
pub fn apply_passthrough(
    env: &mut BTreeMap<String, String>,
    derived: &BTreeMap<&str, String>,
    mapping: &[(&str, &str)],
) {
    for (source, destination) in mapping {
        if let Some(value) = derived.get(source) {
            env.insert(destination.to_string(), value.clone());
        }
    }
}
