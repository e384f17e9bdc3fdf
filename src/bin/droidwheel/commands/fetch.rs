//! `droidwheel fetch` command

use anyhow::Result;

use crate::cli::FetchArgs;
use droidwheel::ops::{clone_source, normalize_repo_input, source_url};
use droidwheel::GlobalContext;

pub fn execute(args: FetchArgs, ctx: &GlobalContext) -> Result<()> {
    let url = source_url(&args.repo)?;
    let dest = match &args.dest {
        Some(dest) => ctx.resolve_path(dest),
        None => {
            let repo = normalize_repo_input(&args.repo);
            let name = repo.rsplit('/').next().unwrap_or(&repo);
            ctx.sources_dir().join(name)
        }
    };

    clone_source(&url, args.reference.as_deref(), &dest)?;
    println!("{}", dest.display());
    Ok(())
}
