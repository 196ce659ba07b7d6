//! `nar clean` command

use anyhow::Result;

use crate::cli::CleanArgs;
use nar::builder::BuildMode;
use nar::util::fs::remove_dir_all_if_exists;
use nar::util::GlobalContext;

pub fn execute(args: CleanArgs) -> Result<()> {
    let gctx = GlobalContext::new()?;
    let manifest_path = gctx.find_manifest()?;
    let module_dir = manifest_path.parent().unwrap_or(gctx.cwd());
    let target_dir = module_dir.join("target");

    let dir = if args.tests {
        target_dir.join(BuildMode::Test.output_dir_name())
    } else {
        target_dir
    };
    remove_dir_all_if_exists(&dir)?;
    eprintln!("     Removed {}", dir.display());

    Ok(())
}
