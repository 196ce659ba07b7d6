//! Implementation of `nar build` and `nar test`.

use std::path::PathBuf;

use anyhow::Result;

use crate::builder::{
    BuildContext, BuildMode, BuildOptions, CompileEngine, CompileOrchestrator, CompileReport,
    NativeEngine,
};
use crate::ops::nar_resources::copy_resources;
use crate::ops::nar_unpack::unpack_dependencies;
use crate::ops::load_context;
use crate::util::context::GlobalContext;

/// Result of a build or test-link run.
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub aol: String,
    pub unpacked: usize,
    pub report: CompileReport,
}

impl BuildResult {
    /// Linked outputs, in library declaration order.
    pub fn artifacts(&self) -> Vec<PathBuf> {
        self.report
            .outputs()
            .into_iter()
            .map(|p| p.to_path_buf())
            .collect()
    }
}

/// Build the module in the current directory.
pub fn build(gctx: &GlobalContext, options: &BuildOptions) -> Result<BuildResult> {
    let mut ctx = load_context(gctx, options)?;
    let engine = NativeEngine::new(ctx.toolchain());
    build_with(&mut ctx, &engine)
}

/// Copy resources, unpack dependencies and compile with `engine`.
pub fn build_with(ctx: &mut BuildContext, engine: &dyn CompileEngine) -> Result<BuildResult> {
    tracing::info!("Building {} for {}", ctx.coordinates(), ctx.aol());
    copy_resources(ctx)?;
    let unpacked = unpack_dependencies(ctx, BuildMode::Main)?;
    let report = CompileOrchestrator::new(ctx, engine, BuildMode::Main).run()?;
    Ok(BuildResult {
        aol: ctx.aol().to_string(),
        unpacked: unpacked.len(),
        report,
    })
}

/// Link the tests of the module in the current directory.
pub fn test(gctx: &GlobalContext, options: &BuildOptions) -> Result<BuildResult> {
    let ctx = load_context(gctx, options)?;
    let engine = NativeEngine::new(ctx.toolchain());
    test_with(&ctx, &engine)
}

/// Unpack test dependencies and compile the test sources with `engine`.
pub fn test_with(ctx: &BuildContext, engine: &dyn CompileEngine) -> Result<BuildResult> {
    tracing::info!("Linking tests of {} for {}", ctx.coordinates(), ctx.aol());
    let unpacked = unpack_dependencies(ctx, BuildMode::Test)?;
    let report = CompileOrchestrator::new(ctx, engine, BuildMode::Test).run()?;
    Ok(BuildResult {
        aol: ctx.aol().to_string(),
        unpacked: unpacked.len(),
        report,
    })
}
