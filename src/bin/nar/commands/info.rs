//! `nar info` command

use anyhow::Result;

use crate::cli::InfoArgs;
use crate::commands::global_context;
use nar::ops::load_context;
use nar::ops::nar_info::{dependency_info, format_info};

pub fn execute(args: InfoArgs, verbose: bool) -> Result<()> {
    let gctx = global_context(verbose)?;
    let ctx = load_context(&gctx, &args.target.options())?;
    let infos = dependency_info(&ctx)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
    } else {
        println!("{} for {} ({})", ctx.coordinates(), ctx.aol(), ctx.layout());
        print!("{}", format_info(&infos));
    }

    Ok(())
}
