//! Implementation of the dependency unpack step.

use anyhow::{Context, Result};

use crate::builder::{BuildContext, BuildMode};
use crate::core::library::Binding;
use crate::layout::Classifier;
use crate::resolver::NarArtifact;
use crate::unpack::{Provisioner, Tools, UnpackOutcome};
use crate::util::archive::{archiver_for, NAR_FORMAT};

/// Unpack the archives of every dependency visible in `mode`.
///
/// A dependency contributes its `noarch` archive and the archive of the
/// binding it is unpacked with; an executable archive is unpacked as well
/// when one was attached.
pub fn unpack_dependencies(ctx: &BuildContext, mode: BuildMode) -> Result<Vec<UnpackOutcome>> {
    let archiver = archiver_for(NAR_FORMAT)?;
    let tools = Tools::locate(ctx.tools());
    let provisioner = Provisioner::new(archiver.as_ref(), &tools)?;
    let base = ctx.unpack_dir(mode);

    let mut outcomes = Vec::new();
    for dep in ctx.dependencies().dependencies(mode.scope()) {
        for classifier in classifiers(ctx, dep)? {
            let outcome = provisioner
                .provision(dep, &classifier, &base)
                .with_context(|| format!("failed to unpack dependency `{}`", dep.coordinates()))?;
            if outcome.extracted > 0 {
                tracing::info!("Unpacked {}", outcome.nar_file.display());
            }
            outcomes.push(outcome);
        }
    }

    if outcomes.is_empty() {
        tracing::debug!("no dependency archives to unpack");
    }
    Ok(outcomes)
}

/// Archives of `dep` needed for this build, as recorded in its metadata.
fn classifiers(ctx: &BuildContext, dep: &NarArtifact) -> Result<Vec<Classifier>> {
    let aol = ctx.aol();
    let library_aol = dep.library_aol(aol);
    let binding = dep.unpack_binding(aol, Binding::Shared)?;

    let mut kinds = vec![crate::layout::NAR_NO_ARCH, binding.as_str()];
    if binding != Binding::Executable {
        kinds.push(Binding::Executable.as_str());
    }

    let mut classifiers = Vec::new();
    for kind in kinds {
        match dep.info().nar_classifier(&library_aol, kind) {
            Some(recorded) => {
                let classifier: Classifier = recorded.parse()?;
                if !classifiers.contains(&classifier) {
                    classifiers.push(classifier);
                }
            }
            None => tracing::debug!("{} attached no `{}` archive", dep.coordinates(), kind),
        }
    }
    Ok(classifiers)
}
