//! Implementation of `nar info`.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use crate::builder::{BuildContext, BuildMode};
use crate::core::artifact::{Coordinates, Scope};
use crate::core::library::Binding;

/// How one resolved dependency is consumed by the current build.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyInfo {
    pub coordinates: Coordinates,
    pub scope: Scope,
    pub direct: bool,
    pub layout: String,
    pub binding: Binding,
    pub library_aol: String,
    pub include_dir: PathBuf,
    pub lib_dir: PathBuf,
    /// Classifiers of the archives the dependency attached.
    pub nars: Vec<String>,
}

/// Describe every dependency of the module, test dependencies included.
pub fn dependency_info(ctx: &BuildContext) -> Result<Vec<DependencyInfo>> {
    let aol = ctx.aol();
    let mut infos = Vec::new();
    for dep in ctx.dependencies().dependencies(Scope::Test) {
        let mode = if dep.scope() == Scope::Test {
            BuildMode::Test
        } else {
            BuildMode::Main
        };
        let base = ctx.unpack_dir(mode);
        let library_aol = dep.library_aol(aol);
        let binding = dep.binding(aol, Binding::Static)?;

        let mut nars = Vec::new();
        let mut kinds = vec![crate::layout::NAR_NO_ARCH];
        kinds.extend(Binding::PACKAGED.iter().map(|b| b.as_str()));
        for kind in kinds {
            if let Some(classifier) = dep.info().nar_classifier(&library_aol, kind) {
                nars.push(classifier);
            }
        }

        let layout = dep.layout();
        infos.push(DependencyInfo {
            coordinates: dep.coordinates().clone(),
            scope: dep.scope(),
            direct: dep.is_direct(),
            layout: layout.name().to_string(),
            binding,
            library_aol: library_aol.to_string(),
            include_dir: layout.include_directory(&base, dep.artifact_id(), dep.version()),
            lib_dir: layout.lib_directory(&base, dep.artifact_id(), dep.version(), &library_aol, binding),
            nars,
        });
    }
    Ok(infos)
}

/// Human-readable rendering of [`dependency_info`].
pub fn format_info(infos: &[DependencyInfo]) -> String {
    if infos.is_empty() {
        return "no dependencies\n".to_string();
    }

    let mut out = String::new();
    for info in infos {
        let origin = if info.direct { "direct" } else { "transitive" };
        let _ = writeln!(out, "{} ({}, {})", info.coordinates, info.scope.as_str(), origin);
        let _ = writeln!(out, "  layout:   {}", info.layout);
        let _ = writeln!(out, "  binding:  {} for {}", info.binding, info.library_aol);
        let _ = writeln!(out, "  include:  {}", info.include_dir.display());
        let _ = writeln!(out, "  lib:      {}", info.lib_dir.display());
        if info.nars.is_empty() {
            let _ = writeln!(out, "  nars:     none");
        } else {
            let _ = writeln!(out, "  nars:     {}", info.nars.join(", "));
        }
    }
    out
}
