//! High-level operations.
//!
//! This module contains the implementation of the `nar` commands. Each step
//! works on a [`BuildContext`] created once per invocation.

pub mod nar_build;
pub mod nar_info;
pub mod nar_init;
pub mod nar_install;
pub mod nar_layout;
pub mod nar_package;
pub mod nar_resources;
pub mod nar_unpack;

use anyhow::{Context, Result};

use crate::builder::{BuildContext, BuildOptions};
use crate::core::manifest::Manifest;
use crate::util::context::GlobalContext;

pub use nar_build::{build, build_with, test, test_with, BuildResult};
pub use nar_info::{dependency_info, format_info, DependencyInfo};
pub use nar_init::{init_module, InitOptions};
pub use nar_install::install;
pub use nar_layout::{layout_paths, LayoutPaths, LayoutQuery, NarPaths};
pub use nar_package::{package, PackageResult};
pub use nar_resources::{copy_resources, ResourcesResult};
pub use nar_unpack::unpack_dependencies;

/// Locate the module manifest and create its build context.
pub fn load_context(gctx: &GlobalContext, options: &BuildOptions) -> Result<BuildContext> {
    let manifest_path = gctx.find_manifest()?;
    let manifest = Manifest::load(&manifest_path)?;
    let coordinates = manifest.coordinates();
    BuildContext::new(gctx, manifest, options)
        .with_context(|| format!("failed to configure build of `{}`", coordinates))
}
