//! `nar layout` command

use anyhow::Result;

use crate::cli::LayoutArgs;
use nar::core::manifest::LinkerConfig;
use nar::core::{Aol, Os};
use nar::ops::nar_layout::{layout_paths, LayoutQuery};
use nar::util::GlobalContext;

pub fn execute(args: LayoutArgs) -> Result<()> {
    let aol = match args.aol {
        Some(ref token) => Aol::parse(token)?,
        None => default_aol()?,
    };

    let query = LayoutQuery {
        layout: args.layout,
        debug: args.debug,
        base: args.base,
        group: args.group,
        artifact: args.artifact,
        version: args.version,
        aol,
        binding: args.binding,
    };
    let paths = layout_paths(&query)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
    } else {
        for line in paths.to_lines() {
            println!("{}", line);
        }
    }

    Ok(())
}

/// Configured AOL, else the host with its usual linker.
fn default_aol() -> Result<Aol> {
    let gctx = GlobalContext::new()?;
    if let Some(ref token) = gctx.config().build.aol {
        return Ok(Aol::parse(token)?);
    }
    let os = Os::host().unwrap_or(Os::Linux);
    Ok(Aol::host(&LinkerConfig::default().name_for(os))?)
}
