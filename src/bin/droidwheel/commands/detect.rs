//! `droidwheel detect` command

use anyhow::Result;

use crate::cli::DetectArgs;
use droidwheel::builder::detect::{ProjectLayout, HOST_RUNTIME_BINDING};
use droidwheel::GlobalContext;

pub fn execute(args: DetectArgs, ctx: &GlobalContext) -> Result<()> {
    let root = match &args.path {
        Some(path) => ctx.resolve_path(path),
        None => ctx.cwd().to_path_buf(),
    };
    let layout = ProjectLayout::detect(&root)?;

    println!("backend:    {} ({})", layout.backend_id, layout.backend);
    match &layout.descriptor {
        Some(path) => println!("descriptor: {}", path.display()),
        None => println!("descriptor: none"),
    }
    if let Some(name) = &layout.project_name {
        println!("project:    {}", name);
    }
    match &layout.crate_manifest {
        Some(path) => {
            println!("crate:      {}", path.display());
            println!(
                "{}:       {}",
                HOST_RUNTIME_BINDING,
                if layout.host_runtime_binding {
                    "direct dependency"
                } else {
                    "not declared directly"
                }
            );
        }
        None => println!("crate:      none"),
    }

    Ok(())
}
