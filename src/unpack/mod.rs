//! Materializing dependency NARs on disk.
//!
//! Each archive moves through [`UnpackState`]: an archive whose layout
//! directory already exists is `PostProcessed` and is left alone. Extraction
//! never overwrites, so two builds unpacking into the same directory cannot
//! clobber each other.

mod post_process;

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::aol::Aol;
use crate::core::errors::NarError;
use crate::layout::Classifier;
use crate::resolver::NarArtifact;
use crate::util::archive::Archiver;

pub use post_process::{PostProcessor, Tools};

/// Where an archive is in its unpack lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpackState {
    NotUnpacked,
    Unpacking,
    PostProcessed,
}

impl fmt::Display for UnpackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnpackState::NotUnpacked => "not unpacked",
            UnpackState::Unpacking => "unpacking",
            UnpackState::PostProcessed => "post-processed",
        };
        f.write_str(s)
    }
}

/// Result of provisioning one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackOutcome {
    pub nar_file: PathBuf,
    pub directory: PathBuf,
    /// Files written; 0 when the archive had already been unpacked.
    pub extracted: usize,
    pub state: UnpackState,
}

/// Unpacks dependency archives and applies post-processing.
pub struct Provisioner<'a> {
    archiver: &'a dyn Archiver,
    post: PostProcessor<'a>,
}

impl<'a> Provisioner<'a> {
    pub fn new(archiver: &'a dyn Archiver, tools: &'a Tools) -> Result<Self> {
        Ok(Provisioner {
            archiver,
            post: PostProcessor::new(tools)?,
        })
    }

    /// Current state of the archive with `classifier` below `base`.
    pub fn state(&self, artifact: &NarArtifact, classifier: &Classifier, base: &Path) -> UnpackState {
        let marker = artifact.layout().unpacked_marker(
            base,
            artifact.artifact_id(),
            artifact.version(),
            classifier,
        );
        if marker.exists() {
            UnpackState::PostProcessed
        } else {
            UnpackState::NotUnpacked
        }
    }

    /// Ensure the archive with `classifier` is unpacked below `base`.
    pub fn provision(
        &self,
        artifact: &NarArtifact,
        classifier: &Classifier,
        base: &Path,
    ) -> Result<UnpackOutcome> {
        let nar_file = artifact.nar_file(classifier);
        let directory = artifact.layout().nar_unpack_directory(base, &nar_file);

        if self.state(artifact, classifier, base) == UnpackState::PostProcessed {
            tracing::debug!("{} already unpacked in {}", nar_file.display(), directory.display());
            return Ok(UnpackOutcome {
                nar_file,
                directory,
                extracted: 0,
                state: UnpackState::PostProcessed,
            });
        }

        let aol_label = match classifier {
            Classifier::Bound { aol, .. } => aol.to_string(),
            Classifier::NoArch => crate::layout::NAR_NO_ARCH.to_string(),
        };
        if !nar_file.is_file() {
            return Err(NarError::provisioning(
                artifact.coordinates().to_string(),
                &aol_label,
                format!("unpacking {}", classifier),
                format!("archive {} does not exist", nar_file.display()),
            )
            .into());
        }

        tracing::debug!("{}: {} -> {}", UnpackState::Unpacking, nar_file.display(), directory.display());
        let summary = self
            .archiver
            .extract(&nar_file, &directory)
            .with_context(|| format!("failed to unpack {} for {}", nar_file.display(), aol_label))?;

        if let Classifier::Bound { aol, .. } = classifier {
            self.post_process(artifact, &directory, aol)?;
        }

        Ok(UnpackOutcome {
            nar_file,
            directory,
            extracted: summary.extracted,
            state: UnpackState::PostProcessed,
        })
    }

    fn post_process(&self, artifact: &NarArtifact, directory: &Path, aol: &Aol) -> Result<()> {
        self.post
            .run(directory, &artifact.coordinates().to_string(), aol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::artifact::{Coordinates, Scope};
    use crate::core::library::Binding;
    use crate::core::nar_info::NarInfo;
    use crate::layout::{LayoutKind, NarLayout};
    use crate::resolver::ResolvedArtifact;
    use crate::test_support::NarBuilder;
    use crate::util::archive::TarGzArchiver;
    use std::fs;
    use tempfile::TempDir;

    fn aol() -> Aol {
        Aol::parse("x86_64-Linux-msvc").unwrap()
    }

    fn artifact(repo: &Path, kind: LayoutKind) -> NarArtifact {
        let coordinates = Coordinates::new("g", "zlib", "1.0");
        NarArtifact::new(
            ResolvedArtifact {
                coordinates: coordinates.clone(),
                scope: Scope::Compile,
                direct: true,
                location: repo.to_path_buf(),
            },
            NarInfo::new(coordinates),
            NarLayout::new(kind, false),
        )
    }

    #[test]
    fn test_unpack_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let repo = tmp.path().join("repo");
        let classifier = Classifier::bound(&aol(), Binding::Shared);
        NarBuilder::new()
            .file("lib/x86_64-Linux-msvc/shared/zlib.so", "elf")
            .write(&repo.join("zlib-1.0-x86_64-Linux-msvc-shared.nar"));

        let dep = artifact(&repo, LayoutKind::NarLayout21);
        let tools = Tools::default();
        let provisioner = Provisioner::new(&TarGzArchiver, &tools).unwrap();
        let base = tmp.path().join("nar");

        assert_eq!(provisioner.state(&dep, &classifier, &base), UnpackState::NotUnpacked);
        let first = provisioner.provision(&dep, &classifier, &base).unwrap();
        assert_eq!(first.extracted, 1);
        assert_eq!(first.directory, base.join("zlib-1.0-x86_64-Linux-msvc-shared"));
        assert_eq!(provisioner.state(&dep, &classifier, &base), UnpackState::PostProcessed);

        let lib = dep.layout().lib_directory(&base, "zlib", "1.0", &aol(), Binding::Shared);
        let so = lib.join("zlib.so");
        fs::write(&so, "local").unwrap();

        let second = provisioner.provision(&dep, &classifier, &base).unwrap();
        assert_eq!(second.extracted, 0);
        assert_eq!(second.state, UnpackState::PostProcessed);
        assert_eq!(fs::read_to_string(&so).unwrap(), "local");
    }

    #[test]
    fn test_flat_layout_unpacks_into_base() {
        let tmp = TempDir::new().unwrap();
        let repo = tmp.path().join("repo");
        NarBuilder::new()
            .file("include/zlib.h", "#pragma once\n")
            .write(&repo.join("zlib-1.0-noarch.nar"));

        let dep = artifact(&repo, LayoutKind::NarLayout20);
        let tools = Tools::default();
        let provisioner = Provisioner::new(&TarGzArchiver, &tools).unwrap();
        let base = tmp.path().join("nar");

        let outcome = provisioner.provision(&dep, &Classifier::NoArch, &base).unwrap();
        assert_eq!(outcome.directory, base);
        assert!(dep
            .layout()
            .include_directory(&base, "zlib", "1.0")
            .join("zlib.h")
            .is_file());
    }

    #[test]
    fn test_missing_archive() {
        let tmp = TempDir::new().unwrap();
        let dep = artifact(tmp.path(), LayoutKind::NarLayout21);
        let tools = Tools::default();
        let provisioner = Provisioner::new(&TarGzArchiver, &tools).unwrap();
        let err = provisioner
            .provision(&dep, &Classifier::bound(&aol(), Binding::Static), tmp.path())
            .unwrap_err();
        match err.downcast_ref::<NarError>() {
            Some(NarError::Provisioning { artifact, aol, .. }) => {
                assert_eq!(artifact, "g:zlib:1.0");
                assert_eq!(aol, "x86_64-Linux-msvc");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
