//! `droidwheel build` command

use anyhow::Result;

use crate::cli::BuildArgs;
use crate::commands::{build_options, local_project_dir, report_error};
use droidwheel::ops::{build_wheels, clone_source, normalize_repo_input, source_url, BuiltWheel};
use droidwheel::GlobalContext;

pub fn execute(args: BuildArgs, ctx: &GlobalContext) -> Result<()> {
    let config = ctx.load_config();

    let project_dir = match &args.git {
        Some(repo) => {
            let url = source_url(repo)?;
            let name = normalize_repo_input(repo);
            let name = name.rsplit('/').next().unwrap_or(&name).to_string();
            let checkout = ctx.sources_dir().join(name);
            clone_source(&url, args.reference.as_deref(), &checkout)?;
            match &args.pipeline.source_dir {
                Some(dir) => checkout.join(dir),
                None => checkout,
            }
        }
        None => local_project_dir(ctx, &args.pipeline),
    };

    let mut opts = build_options(ctx, &args.pipeline, &config, project_dir)?;
    opts.distribution = args.library;
    opts.version = args.lib_version;
    if let Some(output_dir) = &args.output_dir {
        opts.output_dir = ctx.resolve_path(output_dir);
    }

    let results = build_wheels(&opts);

    let mut built: Vec<BuiltWheel> = Vec::new();
    let mut failures = Vec::new();
    for r in results {
        match r.result {
            Ok(wheel) => built.push(wheel),
            Err(e) => {
                tracing::error!("{} build failed", r.abi);
                failures.push(e);
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&built)?);
    } else {
        for wheel in &built {
            eprintln!(
                "    Finished {} -> {}",
                wheel.abi,
                wheel.path.display()
            );
            eprintln!(
                "             sha256 {}, {} attempt(s), {}",
                wheel.sha256, wheel.attempts, wheel.strategy
            );
        }
    }

    let mut failures = failures.into_iter();
    match failures.next() {
        None => Ok(()),
        Some(first) => {
            for other in failures {
                report_error(&other, ctx.color());
            }
            Err(first)
        }
    }
}
