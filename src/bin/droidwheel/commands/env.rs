//! `droidwheel env` command
//!
//! Resolves a build exactly like `droidwheel build` and prints what the
//! first attempt would run, without running it.

use anyhow::Result;
use serde::Serialize;

use crate::cli::EnvArgs;
use crate::commands::{build_options, local_project_dir};
use droidwheel::builder::{BuildInvocation, CrossCompilePlan};
use droidwheel::ops::plan_build;
use droidwheel::GlobalContext;

#[derive(Serialize)]
struct EnvReport<'a> {
    #[serde(flatten)]
    plan: &'a CrossCompilePlan,
    attempts: usize,
    invocation: BuildInvocation,
}

pub fn execute(args: EnvArgs, ctx: &GlobalContext) -> Result<()> {
    let config = ctx.load_config();
    let project_dir = local_project_dir(ctx, &args.pipeline);
    let opts = build_options(ctx, &args.pipeline, &config, project_dir)?;

    let mut reports = Vec::new();
    for abi in &opts.abis {
        let plan = plan_build(&opts, *abi)?;
        let invocation = plan.invocation(&plan.directive);
        reports.push((plan, invocation));
    }

    if args.json {
        let json: Vec<EnvReport<'_>> = reports
            .iter()
            .map(|(plan, invocation)| EnvReport {
                plan,
                attempts: plan.attempts().len(),
                invocation: invocation.clone(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    for (plan, invocation) in &reports {
        println!("# {} ({} backend, {})", plan.target, plan.backend(), plan.strategy);
        for (key, value) in &invocation.env {
            println!("export {}={}", key, shell_quote(value));
        }
        for key in &invocation.env_remove {
            println!("unset {}", key);
        }
        println!("cd {}", shell_quote(&invocation.cwd.display().to_string()));
        println!("{}", invocation.display_command());
        println!();
    }

    Ok(())
}

fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@".contains(c))
    {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
