//! `nar unpack` command

use anyhow::Result;

use crate::cli::UnpackArgs;
use crate::commands::global_context;
use nar::builder::BuildMode;
use nar::ops::load_context;
use nar::ops::nar_unpack::unpack_dependencies;

pub fn execute(args: UnpackArgs, verbose: bool) -> Result<()> {
    let gctx = global_context(verbose)?;
    let ctx = load_context(&gctx, &args.target.options())?;

    let mut modes = vec![BuildMode::Main];
    if args.tests {
        modes.push(BuildMode::Test);
    }

    let mut extracted = 0;
    let mut archives = 0;
    for mode in modes {
        for outcome in unpack_dependencies(&ctx, mode)? {
            archives += 1;
            extracted += outcome.extracted;
        }
    }

    eprintln!(
        "    Unpacked {} archives ({} files) into {}",
        archives,
        extracted,
        ctx.unpack_dir(BuildMode::Main).display()
    );

    Ok(())
}
