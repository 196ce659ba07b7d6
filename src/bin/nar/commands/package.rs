//! `nar package` command

use anyhow::Result;

use crate::cli::TargetArgs;
use crate::commands::global_context;
use nar::ops::load_context;
use nar::ops::nar_package::package;

pub fn execute(args: TargetArgs, verbose: bool) -> Result<()> {
    let gctx = global_context(verbose)?;
    let mut ctx = load_context(&gctx, &args.options())?;
    let result = package(&mut ctx)?;

    for (classifier, nar) in &result.archives {
        eprintln!("    Packaged {} -> {}", classifier, nar.display());
    }
    if result.archives.is_empty() {
        eprintln!("    Finished `{}` (nothing to package)", ctx.coordinates());
    }

    Ok(())
}
