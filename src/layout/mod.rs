//! Versioned NAR layouts.
//!
//! A layout maps `(base, artifact, version, aol, binding)` to on-disk paths.
//! Every function here is pure string composition: nothing touches the
//! filesystem, and the same inputs always give the same path. Three layouts
//! are built in:
//!
//! | name          | per-artifact dirs | configuration segment |
//! |---------------|-------------------|-----------------------|
//! | `NarLayout20` | no                | no                    |
//! | `NarLayout21` | yes               | no                    |
//! | `NarLayout22` | yes               | lib and bin only      |
//!
//! A module picks one by name when its build context is created. Each
//! dependency is addressed with the layout recorded in its own metadata, so
//! modules built with different layouts can share one graph.

mod file_layout;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use file_layout::{Configuration, FileLayout};

use crate::core::aol::Aol;
use crate::core::errors::NarError;
use crate::core::library::Binding;
use crate::core::nar_info::{NarInfo, NAR_PROPERTIES};

/// Extension of NAR archives.
pub const NAR_EXTENSION: &str = "nar";

/// Artifact type recorded for attached archives.
pub const NAR_TYPE: &str = "nar";

/// Classifier of the architecture-independent archive.
pub const NAR_NO_ARCH: &str = "noarch";

/// Namespace under which built-in layouts may be referenced.
pub const LAYOUT_NAMESPACE: &str = "nar.layout";

/// Built-in layout versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutKind {
    /// Flat layout: every artifact shares `include/`, `lib/` and `bin/`.
    NarLayout20,
    /// One directory per artifact, version and classifier.
    NarLayout21,
    /// `NarLayout21` with a `debug`/`release` segment on lib and bin.
    NarLayout22,
}

/// Name to layout lookup table.
const LAYOUTS: &[(&str, LayoutKind)] = &[
    ("NarLayout20", LayoutKind::NarLayout20),
    ("NarLayout21", LayoutKind::NarLayout21),
    ("NarLayout22", LayoutKind::NarLayout22),
];

impl LayoutKind {
    /// Resolve a configured layout name.
    ///
    /// An unqualified name is looked up among the built-in layouts; a
    /// qualified one must use the built-in namespace.
    pub fn from_name(name: &str) -> Result<Self, NarError> {
        let trimmed = name.trim();
        let simple = match trimmed.rsplit_once('.') {
            Some((namespace, simple)) if namespace == LAYOUT_NAMESPACE => simple,
            Some(_) => "",
            None => trimmed,
        };
        LAYOUTS
            .iter()
            .find(|(candidate, _)| *candidate == simple)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| NarError::UnknownLayout {
                name: name.to_string(),
            })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutKind::NarLayout20 => "NarLayout20",
            LayoutKind::NarLayout21 => "NarLayout21",
            LayoutKind::NarLayout22 => "NarLayout22",
        }
    }

    fn per_artifact(&self) -> bool {
        !matches!(self, LayoutKind::NarLayout20)
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutKind {
    type Err = NarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LayoutKind::from_name(s)
    }
}

/// What an attached archive holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Classifier {
    /// Headers and other architecture-independent files.
    NoArch,
    /// Binaries of one binding for one AOL.
    Bound { aol: Aol, binding: Binding },
}

impl Classifier {
    pub fn bound(aol: &Aol, binding: Binding) -> Self {
        Classifier::Bound {
            aol: aol.clone(),
            binding,
        }
    }

    /// The metadata key suffix under which this archive is recorded.
    pub fn kind(&self) -> &'static str {
        match self {
            Classifier::NoArch => NAR_NO_ARCH,
            Classifier::Bound { binding, .. } => binding.as_str(),
        }
    }

    /// Classifier as recorded in metadata, with the AOL left symbolic.
    pub fn template(&self) -> String {
        match self {
            Classifier::NoArch => NAR_NO_ARCH.to_string(),
            Classifier::Bound { binding, .. } => {
                format!("{}-{}", crate::core::nar_info::AOL_PLACEHOLDER, binding)
            }
        }
    }
}

impl fmt::Display for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classifier::NoArch => f.write_str(NAR_NO_ARCH),
            Classifier::Bound { aol, binding } => write!(f, "{}-{}", aol, binding),
        }
    }
}

impl FromStr for Classifier {
    type Err = NarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == NAR_NO_ARCH {
            return Ok(Classifier::NoArch);
        }
        let (aol, binding) = s.rsplit_once('-').ok_or_else(|| NarError::MalformedIdentifier {
            token: s.to_string(),
            reason: "classifier must be `noarch` or `<aol>-<binding>`".to_string(),
        })?;
        let aol = Aol::parse(aol)?;
        let binding = Binding::parse_for(binding, Some(&aol.to_string()))?;
        Ok(Classifier::Bound { aol, binding })
    }
}

/// The directory an archive is built from.
///
/// Archive entries are stored relative to `root`; only `root/content` is
/// included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSource {
    pub root: PathBuf,
    pub content: PathBuf,
}

impl ArchiveSource {
    /// The directory whose contents end up in the archive.
    pub fn content_dir(&self) -> PathBuf {
        self.root.join(&self.content)
    }
}

/// A concrete layout, fixed for the duration of one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NarLayout {
    kind: LayoutKind,
    files: FileLayout,
}

impl NarLayout {
    pub fn new(kind: LayoutKind, debug: bool) -> Self {
        let files = match kind {
            LayoutKind::NarLayout20 | LayoutKind::NarLayout21 => FileLayout::flat(),
            LayoutKind::NarLayout22 => {
                FileLayout::flat().with_configuration(Configuration::from_debug(debug))
            }
        };
        NarLayout { kind, files }
    }

    /// Resolve a layout by configured name.
    pub fn from_name(name: &str, debug: bool) -> Result<Self, NarError> {
        tracing::debug!("using layout {}", name);
        Ok(NarLayout::new(LayoutKind::from_name(name)?, debug))
    }

    /// The layout a dependency was built with.
    ///
    /// Falls back to `fallback` when the dependency did not record one.
    pub fn for_dependency(info: &NarInfo, fallback: &NarLayout) -> Result<Self, NarError> {
        match info.layout_name() {
            Some(name) => {
                let debug = info
                    .configuration()
                    .map(|c| c == Configuration::Debug.as_str())
                    .unwrap_or(false);
                NarLayout::from_name(name, debug)
            }
            None => Ok(*fallback),
        }
    }

    pub fn kind(&self) -> LayoutKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    pub fn file_layout(&self) -> &FileLayout {
        &self.files
    }

    /// `""` for layouts without configuration, else `debug` or `release`.
    pub fn configuration(&self) -> &'static str {
        self.files.config_string()
    }

    /// Record this layout in a module's metadata.
    pub fn record(&self, info: &mut NarInfo) {
        info.set_property(None, crate::core::nar_info::keys::LAYOUT, self.name());
        info.set_property(
            None,
            crate::core::nar_info::keys::CONFIGURATION,
            self.configuration(),
        );
    }

    pub fn no_arch_directory(&self, base: &Path, artifact_id: &str, version: &str) -> PathBuf {
        if self.kind.per_artifact() {
            base.join(format!("{}-{}-{}", artifact_id, version, NAR_NO_ARCH))
        } else {
            base.to_path_buf()
        }
    }

    pub fn include_directory(&self, base: &Path, artifact_id: &str, version: &str) -> PathBuf {
        self.no_arch_directory(base, artifact_id, version)
            .join(self.files.include_directory())
    }

    pub fn lib_directory(
        &self,
        base: &Path,
        artifact_id: &str,
        version: &str,
        aol: &Aol,
        binding: Binding,
    ) -> PathBuf {
        let classifier = Classifier::bound(aol, binding);
        self.classifier_root(base, artifact_id, version, &classifier)
            .join(self.files.lib_directory(aol, binding))
    }

    pub fn bin_directory(&self, base: &Path, artifact_id: &str, version: &str, aol: &Aol) -> PathBuf {
        let classifier = Classifier::bound(aol, Binding::Executable);
        self.classifier_root(base, artifact_id, version, &classifier)
            .join(self.files.bin_directory(aol))
    }

    /// `base/META-INF/nar/{group}/{artifact}/nar.properties`.
    pub fn metadata_file_path(&self, base: &Path, group_id: &str, artifact_id: &str) -> PathBuf {
        base.join("META-INF")
            .join("nar")
            .join(group_id)
            .join(artifact_id)
            .join(NAR_PROPERTIES)
    }

    /// Directory a NAR file is unpacked into.
    pub fn nar_unpack_directory(&self, base: &Path, nar_file: &Path) -> PathBuf {
        if !self.kind.per_artifact() {
            return base.to_path_buf();
        }
        match nar_file.file_stem() {
            Some(stem) => base.join(stem),
            None => base.to_path_buf(),
        }
    }

    /// Where the archive with `classifier` is built from.
    pub fn archive_source(
        &self,
        base: &Path,
        artifact_id: &str,
        version: &str,
        classifier: &Classifier,
    ) -> ArchiveSource {
        if self.kind.per_artifact() {
            return ArchiveSource {
                root: self.classifier_root(base, artifact_id, version, classifier),
                content: PathBuf::new(),
            };
        }
        let content = match classifier {
            Classifier::NoArch => self.files.include_directory(),
            Classifier::Bound {
                aol,
                binding: Binding::Executable,
            } => self.files.bin_directory(aol),
            Classifier::Bound { aol, binding } => self.files.lib_directory(aol, *binding),
        };
        ArchiveSource {
            root: base.to_path_buf(),
            content,
        }
    }

    /// The directory whose existence shows that `classifier` was unpacked.
    pub fn unpacked_marker(
        &self,
        base: &Path,
        artifact_id: &str,
        version: &str,
        classifier: &Classifier,
    ) -> PathBuf {
        self.archive_source(base, artifact_id, version, classifier)
            .content_dir()
    }

    fn classifier_root(
        &self,
        base: &Path,
        artifact_id: &str,
        version: &str,
        classifier: &Classifier,
    ) -> PathBuf {
        if self.kind.per_artifact() {
            base.join(format!("{}-{}-{}", artifact_id, version, classifier))
        } else {
            base.to_path_buf()
        }
    }
}

impl fmt::Display for NarLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.files.configuration() {
            Some(configuration) => write!(f, "{} ({})", self.kind, configuration),
            None => write!(f, "{}", self.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::artifact::Coordinates;
    use std::collections::HashSet;

    fn aol(s: &str) -> Aol {
        Aol::parse(s).unwrap()
    }

    fn base() -> PathBuf {
        PathBuf::from("/Users/maven")
    }

    #[test]
    fn test_legacy_scenario() {
        let layout = NarLayout::from_name("NarLayout20", false).unwrap();
        assert_eq!(
            layout.lib_directory(&base(), "foo", "1.0", &aol("x86_64-Linux-gcc"), Binding::Shared),
            base().join("lib").join("x86_64-Linux-gcc").join("shared")
        );
        assert_eq!(layout.include_directory(&base(), "foo", "1.0"), base().join("include"));
        assert_eq!(
            layout.bin_directory(&base(), "foo", "1.0", &aol("x86_64-Linux-gcc")),
            base().join("bin").join("x86_64-Linux-gcc")
        );
        assert_eq!(layout.no_arch_directory(&base(), "foo", "1.0"), base());
        assert_eq!(layout.configuration(), "");
    }

    #[test]
    fn test_config_aware_scenario() {
        let linux = aol("x86_64-Linux-gcc");
        let debug = NarLayout::from_name("NarLayout22", true).unwrap();
        let release = NarLayout::from_name("NarLayout22", false).unwrap();
        let per_artifact = base().join("foo-1.0-x86_64-Linux-gcc-shared");
        let lib = per_artifact.join("lib").join("x86_64-Linux-gcc").join("shared");

        assert_eq!(
            debug.lib_directory(&base(), "foo", "1.0", &linux, Binding::Shared),
            lib.join("debug")
        );
        assert_eq!(
            release.lib_directory(&base(), "foo", "1.0", &linux, Binding::Shared),
            lib.join("release")
        );
        assert_eq!(
            debug.bin_directory(&base(), "foo", "1.0", &linux),
            base()
                .join("foo-1.0-x86_64-Linux-gcc-executable")
                .join("bin")
                .join("x86_64-Linux-gcc")
                .join("debug")
        );
        assert_eq!(debug.configuration(), "debug");
        assert_eq!(release.configuration(), "release");
    }

    #[test]
    fn test_include_directory_is_config_invariant() {
        for kind in [LayoutKind::NarLayout20, LayoutKind::NarLayout21, LayoutKind::NarLayout22] {
            let debug = NarLayout::new(kind, true);
            let release = NarLayout::new(kind, false);
            assert_eq!(
                debug.include_directory(&base(), "foo", "1.0"),
                release.include_directory(&base(), "foo", "1.0")
            );
            assert_eq!(
                debug.no_arch_directory(&base(), "foo", "1.0"),
                release.no_arch_directory(&base(), "foo", "1.0")
            );
        }
        assert_eq!(
            NarLayout::new(LayoutKind::NarLayout22, true).include_directory(&base(), "foo", "1.0"),
            base().join("foo-1.0-noarch").join("include")
        );
    }

    #[test]
    fn test_lib_directories_never_collide() {
        let artifacts = [("foo", "1.0"), ("foo", "1.1"), ("bar", "1.0")];
        let aols = [
            aol("x86_64-Linux-gcc"),
            aol("x86_64-Linux-g++"),
            aol("amd64-Windows-msvc"),
            aol("x86_64-MacOSX-g++"),
        ];

        let mut seen = HashSet::new();
        for debug in [true, false] {
            let layout = NarLayout::new(LayoutKind::NarLayout22, debug);
            for (artifact, version) in artifacts {
                for aol in &aols {
                    for binding in Binding::ALL {
                        let dir = layout.lib_directory(&base(), artifact, version, aol, binding);
                        assert!(seen.insert(dir.clone()), "collision on {}", dir.display());
                    }
                }
            }
        }
        assert_eq!(seen.len(), 2 * artifacts.len() * aols.len() * Binding::ALL.len());

        let mut seen = HashSet::new();
        let layout = NarLayout::new(LayoutKind::NarLayout21, false);
        for (artifact, version) in artifacts {
            for aol in &aols {
                for binding in Binding::ALL {
                    assert!(seen.insert(layout.lib_directory(&base(), artifact, version, aol, binding)));
                }
            }
        }
    }

    #[test]
    fn test_paths_are_stable() {
        let layout = NarLayout::new(LayoutKind::NarLayout22, true);
        let linux = aol("x86_64-Linux-gcc");
        let first = layout.lib_directory(&base(), "foo", "1.0", &linux, Binding::Static);
        for _ in 0..3 {
            assert_eq!(
                layout.lib_directory(&base(), "foo", "1.0", &linux, Binding::Static),
                first
            );
        }
    }

    #[test]
    fn test_layout_names() {
        assert_eq!(LayoutKind::from_name("NarLayout21").unwrap(), LayoutKind::NarLayout21);
        assert_eq!(
            LayoutKind::from_name("nar.layout.NarLayout22").unwrap(),
            LayoutKind::NarLayout22
        );
        for bad in ["NarLayout23", "com.acme.NarLayout21", "", "narlayout21"] {
            assert!(matches!(
                LayoutKind::from_name(bad),
                Err(NarError::UnknownLayout { .. })
            ));
        }
    }

    #[test]
    fn test_metadata_file_path() {
        let layout = NarLayout::new(LayoutKind::NarLayout21, false);
        assert_eq!(
            layout.metadata_file_path(Path::new("/t/classes"), "com.example", "foo"),
            PathBuf::from("/t/classes/META-INF/nar/com.example/foo/nar.properties")
        );
    }

    #[test]
    fn test_nar_unpack_directory() {
        let nar = Path::new("/repo/foo-1.0-x86_64-Linux-gcc-shared.nar");
        assert_eq!(
            NarLayout::new(LayoutKind::NarLayout21, false).nar_unpack_directory(&base(), nar),
            base().join("foo-1.0-x86_64-Linux-gcc-shared")
        );
        assert_eq!(
            NarLayout::new(LayoutKind::NarLayout20, false).nar_unpack_directory(&base(), nar),
            base()
        );
    }

    #[test]
    fn test_unpacked_archive_matches_lib_directory() {
        let linux = aol("x86_64-Linux-gcc");
        for kind in [LayoutKind::NarLayout20, LayoutKind::NarLayout21, LayoutKind::NarLayout22] {
            let layout = NarLayout::new(kind, true);
            let coords = Coordinates::new("g", "foo", "1.0");
            let classifier = Classifier::bound(&linux, Binding::Shared);
            let nar = PathBuf::from(coords.nar_file_name(&classifier.to_string()));
            let source = layout.archive_source(&base(), "foo", "1.0", &classifier);
            let unpacked = layout
                .nar_unpack_directory(Path::new("/unpack"), &nar)
                .join(&source.content);
            let lib = layout.lib_directory(Path::new("/unpack"), "foo", "1.0", &linux, Binding::Shared);
            assert!(lib.starts_with(&unpacked), "{:?}: {} vs {}", kind, lib.display(), unpacked.display());
        }
    }

    #[test]
    fn test_classifier_round_trip() {
        let classifier: Classifier = "x86_64-Linux-g++-static".parse().unwrap();
        assert_eq!(
            classifier,
            Classifier::bound(&aol("x86_64-Linux-g++"), Binding::Static)
        );
        assert_eq!(classifier.to_string(), "x86_64-Linux-g++-static");
        assert_eq!(classifier.template(), "${aol}-static");
        assert_eq!("noarch".parse::<Classifier>().unwrap(), Classifier::NoArch);
        assert!("x86_64-Linux-gcc-dylib".parse::<Classifier>().is_err());
    }

    #[test]
    fn test_for_dependency_uses_recorded_layout() {
        let consumer = NarLayout::new(LayoutKind::NarLayout21, false);

        let mut info = NarInfo::new(Coordinates::new("g", "dep", "1.0"));
        assert_eq!(NarLayout::for_dependency(&info, &consumer).unwrap(), consumer);

        NarLayout::new(LayoutKind::NarLayout22, true).record(&mut info);
        let dep = NarLayout::for_dependency(&info, &consumer).unwrap();
        assert_eq!(dep.kind(), LayoutKind::NarLayout22);
        assert_eq!(dep.configuration(), "debug");

        let mut legacy = NarInfo::new(Coordinates::new("g", "old", "0.9"));
        NarLayout::new(LayoutKind::NarLayout20, false).record(&mut legacy);
        assert_eq!(
            NarLayout::for_dependency(&legacy, &consumer).unwrap().kind(),
            LayoutKind::NarLayout20
        );
    }
}
