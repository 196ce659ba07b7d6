//! Implementation of `nar install`.
//!
//! Copies the packaged module into the local repository at
//! `{repository}/{group as path}/{artifact}/{version}/`: every attached
//! archive, the `META-INF` metadata tree and the manifest as
//! `{artifact}-{version}.toml`.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::builder::BuildContext;
use crate::core::manifest::MANIFEST_NAME;
use crate::core::library::Binding;
use crate::layout::{Classifier, NAR_EXTENSION};
use crate::util::fs::{copy_dir_all, ensure_dir};

/// Install the packaged module; returns the installation directory.
pub fn install(ctx: &BuildContext) -> Result<PathBuf> {
    let coordinates = ctx.coordinates();
    let metadata = ctx.metadata_path();
    if !metadata.is_file() {
        bail!(
            "`{}` has not been packaged: {} does not exist (run `nar package` first)",
            coordinates,
            metadata.display()
        );
    }

    let location = ctx.repository().join(coordinates.repository_path());
    ensure_dir(&location)?;

    let final_name = ctx.manifest().final_name();
    let aol = ctx.aol();
    let mut classifiers = vec![Classifier::NoArch];
    classifiers.extend(Binding::PACKAGED.iter().map(|b| Classifier::bound(aol, *b)));

    let mut installed = 0usize;
    for classifier in classifiers {
        if ctx.info().nar_classifier(aol, classifier.kind()).is_none() {
            continue;
        }
        let source = ctx
            .target_dir()
            .join(format!("{}-{}.{}", final_name, classifier, NAR_EXTENSION));
        if !source.is_file() {
            tracing::debug!("{} was not packaged for this AOL", source.display());
            continue;
        }
        let dest = location.join(coordinates.nar_file_name(&classifier.to_string()));
        fs::copy(&source, &dest)
            .with_context(|| format!("failed to install {} to {}", source.display(), dest.display()))?;
        tracing::debug!("Installed {}", dest.display());
        installed += 1;
    }

    copy_dir_all(&ctx.classes_dir().join("META-INF"), &location.join("META-INF"))?;

    let manifest = ctx.manifest().manifest_dir.join(MANIFEST_NAME);
    let installed_manifest = location.join(format!("{}-{}.toml", coordinates.artifact_id, coordinates.version));
    fs::copy(&manifest, &installed_manifest)
        .with_context(|| format!("failed to install manifest {}", manifest.display()))?;

    tracing::info!("Installed {} ({} archives) to {}", coordinates, installed, location.display());
    Ok(location)
}
