//! Command implementations

pub mod build;
pub mod clean;
pub mod completions;
pub mod info;
pub mod init;
pub mod install;
pub mod layout;
pub mod package;
pub mod unpack;

use anyhow::Result;

use nar::util::GlobalContext;

/// Global context for the current directory.
pub fn global_context(verbose: bool) -> Result<GlobalContext> {
    let mut gctx = GlobalContext::new()?;
    gctx.set_verbose(verbose);
    Ok(gctx)
}
