//! `droidwheel toolchain` command

use anyhow::Result;

use crate::cli::ToolchainArgs;
use crate::commands::resolve_ndk;
use droidwheel::core::target::DEFAULT_API_LEVEL;
use droidwheel::{GlobalContext, InterpreterDescriptor, TargetDescriptor, ToolchainResolver};

pub fn execute(args: ToolchainArgs, ctx: &GlobalContext) -> Result<()> {
    let config = ctx.load_config();
    let ndk = resolve_ndk(ctx, args.ndk.as_deref(), &config)?;
    let api_level = args
        .api_level
        .or(config.target.api_level)
        .unwrap_or(DEFAULT_API_LEVEL);

    let target = TargetDescriptor::new(args.abi, api_level);
    let paths = ToolchainResolver::new(&ndk).resolve(&target)?;

    println!("Toolchain for {}:", target);
    println!();
    println!("  NDK:      {}", paths.ndk_root.display());
    println!("  CC:       {}", paths.compiler.display());
    println!("  CXX:      {}", paths.cxx_compiler.display());
    println!("  AR:       {}", paths.archiver.display());
    println!("  LD:       {}", paths.linker.display());
    println!("  STRIP:    {}", paths.strip_tool.display());
    println!("  Flags:    {}", paths.sysroot_flags.join(" "));
    println!("  Platform: {}", target.platform_tag());

    if ctx.is_verbose() {
        println!();
        println!("Environment:");
        for (key, value) in paths.env(&target) {
            println!("  {}={}", key, value);
        }
    }

    if let Some(python) = &args.host_python {
        println!();
        match InterpreterDescriptor::probe_host(python) {
            Ok(host) => {
                println!("Host Python: {}", python.display());
                println!("  Interpreter: {}", host.name());
                println!("  SOABI:       {}", host.soabi);
            }
            Err(e) => println!("Host Python: {} ({:#})", python.display(), e),
        }
    }

    Ok(())
}
