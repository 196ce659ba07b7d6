//! `nar install` command

use anyhow::Result;

use crate::cli::TargetArgs;
use crate::commands::global_context;
use nar::ops::load_context;
use nar::ops::nar_install::install;

pub fn execute(args: TargetArgs, verbose: bool) -> Result<()> {
    let gctx = global_context(verbose)?;
    let ctx = load_context(&gctx, &args.options())?;
    let location = install(&ctx)?;

    eprintln!("   Installed `{}` -> {}", ctx.coordinates(), location.display());

    Ok(())
}
