//! droidwheel CLI - build Android wheels for Python native extensions

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use droidwheel::GlobalContext;

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("droidwheel=debug")
    } else {
        EnvFilter::new("droidwheel=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let color = !cli.no_color;
    if let Err(e) = run(cli) {
        std::process::exit(commands::report_error(&e, color));
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut ctx = GlobalContext::new()?;
    ctx.set_verbose(cli.verbose);
    ctx.set_color(!cli.no_color);

    match cli.command {
        Commands::Build(args) => commands::build::execute(args, &ctx),
        Commands::Toolchain(args) => commands::toolchain::execute(args, &ctx),
        Commands::Detect(args) => commands::detect::execute(args, &ctx),
        Commands::Env(args) => commands::env::execute(args, &ctx),
        Commands::Fetch(args) => commands::fetch::execute(args, &ctx),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
