//! `nar build` command

use anyhow::Result;

use crate::cli::TargetArgs;
use crate::commands::global_context;
use nar::ops::nar_build::build;

pub fn execute(args: TargetArgs, verbose: bool) -> Result<()> {
    let gctx = global_context(verbose)?;
    let result = build(&gctx, &args.options())?;

    for artifact in result.artifacts() {
        eprintln!("    Finished `{}` -> {}", result.aol, artifact.display());
    }
    if result.report.source_count == 0 {
        eprintln!("    Finished `{}` (nothing to compile)", result.aol);
    }

    Ok(())
}
