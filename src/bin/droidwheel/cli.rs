//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use droidwheel::{AndroidAbi, PythonVersion};

/// droidwheel - cross-compile Python native-extension packages into Android wheels
#[derive(Parser)]
#[command(name = "droidwheel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build Android wheels for a project
    Build(BuildArgs),

    /// Show the NDK toolchain for an ABI and API level
    Toolchain(ToolchainArgs),

    /// Detect the build backend of a project
    Detect(DetectArgs),

    /// Print the environment and command line a build would use
    Env(EnvArgs),

    /// Clone a project from git
    Fetch(FetchArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Options shared by `build` and `env`.
#[derive(Args, Clone)]
pub struct PipelineArgs {
    /// Android NDK root
    #[arg(long, env = "ANDROID_NDK_HOME")]
    pub ndk: Option<PathBuf>,

    /// Target ABI (repeatable; defaults to all)
    #[arg(long = "abi")]
    pub abis: Vec<AndroidAbi>,

    /// Android API level
    #[arg(long = "api", env = "DROIDWHEEL_API_LEVEL")]
    pub api_level: Option<u32>,

    /// Target Python version (e.g. 3.13)
    #[arg(long, env = "DROIDWHEEL_PYTHON_VERSION")]
    pub python_version: Option<PythonVersion>,

    /// Interpreter name for profile lookup (e.g. python3.13)
    #[arg(long, env = "DROIDWHEEL_INTERPRETER")]
    pub interpreter: Option<String>,

    /// Staged Android Python `lib` directory
    #[arg(long = "python-lib-dir", env = "DROIDWHEEL_PYTHON_LIB_DIR")]
    pub lib_dir: Option<PathBuf>,

    /// Extra cargo features (comma separated or repeated)
    #[arg(long, value_delimiter = ',')]
    pub features: Vec<String>,

    /// Build without `--release`
    #[arg(long, conflicts_with = "release")]
    pub debug: bool,

    /// Build with `--release` (the default)
    #[arg(long)]
    pub release: bool,

    /// maturin executable
    #[arg(long)]
    pub maturin: Option<PathBuf>,

    /// Host Python used to build standard projects
    #[arg(long)]
    pub host_python: Option<PathBuf>,

    /// Project directory (relative to the clone with `--git`)
    #[arg(long)]
    pub source_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Distribution name (defaults to `[project] name`)
    #[arg(long)]
    pub library: Option<String>,

    /// Version for the wheel name (defaults to the built one)
    #[arg(long)]
    pub lib_version: Option<String>,

    /// Directory for the finished wheels
    #[arg(short, long, env = "DROIDWHEEL_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Clone this repository (`owner/repo` or URL) and build it
    #[arg(long)]
    pub git: Option<String>,

    /// Branch or tag to check out with `--git`
    #[arg(long = "ref", requires = "git")]
    pub reference: Option<String>,

    /// Print the build report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ToolchainArgs {
    /// Android NDK root
    #[arg(long, env = "ANDROID_NDK_HOME")]
    pub ndk: Option<PathBuf>,

    /// Target ABI
    #[arg(long, default_value = "arm64-v8a")]
    pub abi: AndroidAbi,

    /// Android API level
    #[arg(long = "api", env = "DROIDWHEEL_API_LEVEL")]
    pub api_level: Option<u32>,

    /// Also describe this host Python interpreter
    #[arg(long)]
    pub host_python: Option<PathBuf>,
}

#[derive(Args)]
pub struct DetectArgs {
    /// Project directory (defaults to current directory)
    pub path: Option<PathBuf>,
}

#[derive(Args)]
pub struct EnvArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct FetchArgs {
    /// Repository (`owner/repo` or URL)
    pub repo: String,

    /// Branch or tag to check out
    #[arg(long = "ref")]
    pub reference: Option<String>,

    /// Destination directory (defaults to `sources/<repo>`)
    #[arg(long)]
    pub dest: Option<PathBuf>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
