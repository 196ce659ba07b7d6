//! Implementation of `nar package`.
//!
//! Every classifier directory the build produced becomes one archive named
//! `{final name}-{classifier}.nar` in `target/`. The attached archives are
//! recorded in the module's metadata so consumers know what to unpack.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::builder::{BuildContext, BuildMode};
use crate::core::library::Binding;
use crate::core::nar_info::keys;
use crate::layout::Classifier;
use crate::util::archive::{archiver_for, NAR_FORMAT};
use crate::util::fs::walk_files;

/// Archives created by a packaging run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageResult {
    pub archives: Vec<(Classifier, PathBuf)>,
    /// Binding advertised for the packaged AOL, if any library was packaged.
    pub binding: Option<Binding>,
}

/// Archive the module's layout directories and persist its metadata.
pub fn package(ctx: &mut BuildContext) -> Result<PackageResult> {
    let archiver = archiver_for(NAR_FORMAT)?;
    let dest = ctx.output_dir(BuildMode::Main);
    let aol = ctx.aol().clone();
    let final_name = ctx.manifest().final_name();

    let mut classifiers = vec![Classifier::NoArch];
    classifiers.extend(Binding::PACKAGED.iter().map(|b| Classifier::bound(&aol, *b)));

    let mut result = PackageResult::default();
    let mut bindings = Vec::new();
    for classifier in classifiers {
        let source = ctx.layout().archive_source(
            &dest,
            ctx.artifact_id(),
            ctx.version(),
            &classifier,
        );
        let content = source.content_dir();
        if !content.is_dir() || walk_files(&content).is_empty() {
            continue;
        }

        let nar = ctx
            .target_dir()
            .join(format!("{}-{}.{}", final_name, classifier, crate::layout::NAR_EXTENSION));
        let files = archiver
            .create(&source.root, &source.content, &nar)
            .with_context(|| format!("failed to package {} of {}", classifier, ctx.coordinates()))?;
        tracing::info!("Packaged {} ({} files)", nar.display(), files);

        let template = classifier.template();
        ctx.info_mut().set_nar(None, classifier.kind(), &template);
        if let Classifier::Bound { binding, .. } = classifier {
            bindings.push(binding);
        }
        result.archives.push((classifier, nar));
    }

    if !bindings.is_empty() {
        let preferred = Binding::preferred(&bindings);
        ctx.info_mut().set_binding(Some(&aol), preferred);
        if !ctx.info().properties().contains_key(keys::BINDING) {
            ctx.info_mut().set_binding(None, preferred);
        }
        result.binding = Some(preferred);
    }
    if result.archives.is_empty() {
        tracing::warn!("nothing to package in {}", dest.display());
    }

    ctx.persist_info()?;
    Ok(result)
}
