//! Native view of resolved dependencies.
//!
//! [`NarManager`] pairs every resolved module with its metadata and the
//! layout it was built with. It is built once per invocation and read-only
//! afterwards.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::aol::Aol;
use crate::core::artifact::{Coordinates, Scope};
use crate::core::errors::NarError;
use crate::core::library::Binding;
use crate::core::nar_info::NarInfo;
use crate::layout::{Classifier, NarLayout};
use crate::resolver::{DependencyResolver, ResolvedArtifact};

/// A resolved dependency together with its metadata.
#[derive(Debug, Clone)]
pub struct NarArtifact {
    resolved: ResolvedArtifact,
    info: NarInfo,
    layout: NarLayout,
}

impl NarArtifact {
    /// Load the metadata of an installed dependency.
    ///
    /// `fallback` is used for dependencies that did not record a layout.
    pub fn load(resolved: ResolvedArtifact, fallback: &NarLayout) -> Result<Self> {
        let coords = &resolved.coordinates;
        let path = fallback.metadata_file_path(&resolved.location, &coords.group_id, &coords.artifact_id);
        if !path.is_file() {
            bail!(
                "dependency `{}` has no NAR metadata at {}",
                coords,
                path.display()
            );
        }
        let info = NarInfo::load(coords.clone(), &path)
            .with_context(|| format!("failed to load metadata of `{}`", coords))?;
        let layout = NarLayout::for_dependency(&info, fallback)?;
        tracing::debug!("{} uses {}", coords, layout);
        Ok(NarArtifact::new(resolved, info, layout))
    }

    pub fn new(resolved: ResolvedArtifact, info: NarInfo, layout: NarLayout) -> Self {
        NarArtifact {
            resolved,
            info,
            layout,
        }
    }

    pub fn coordinates(&self) -> &Coordinates {
        &self.resolved.coordinates
    }

    pub fn group_id(&self) -> &str {
        &self.resolved.coordinates.group_id
    }

    pub fn artifact_id(&self) -> &str {
        &self.resolved.coordinates.artifact_id
    }

    pub fn version(&self) -> &str {
        &self.resolved.coordinates.version
    }

    /// `group:artifact`, the name used by the link order override.
    pub fn key(&self) -> String {
        self.resolved.coordinates.key()
    }

    pub fn scope(&self) -> Scope {
        self.resolved.scope
    }

    pub fn is_direct(&self) -> bool {
        self.resolved.direct
    }

    pub fn info(&self) -> &NarInfo {
        &self.info
    }

    /// The layout this dependency was built with.
    pub fn layout(&self) -> &NarLayout {
        &self.layout
    }

    /// Directory holding the installed archives.
    pub fn location(&self) -> &Path {
        &self.resolved.location
    }

    pub fn binding(&self, aol: &Aol, default: Binding) -> Result<Binding, NarError> {
        self.info.binding(aol, default)
    }

    /// Binding whose archive is unpacked for `aol`.
    ///
    /// JNI and plugin modules are unpacked as `fallback`, so that consumers
    /// still see a library-bearing archive.
    pub fn unpack_binding(&self, aol: &Aol, fallback: Binding) -> Result<Binding, NarError> {
        match self.binding(aol, fallback)? {
            Binding::Jni | Binding::Plugin => Ok(fallback),
            binding => Ok(binding),
        }
    }

    /// AOL under which this dependency's libraries are found for `aol`.
    pub fn library_aol(&self, aol: &Aol) -> Aol {
        self.info.library_aol(aol)
    }

    /// Path of the installed archive with `classifier`.
    pub fn nar_file(&self, classifier: &Classifier) -> PathBuf {
        self.location()
            .join(self.coordinates().nar_file_name(&classifier.to_string()))
    }

    /// Whether the archive with `kind` was attached when this module was packaged.
    pub fn has_nar(&self, aol: &Aol, kind: &str) -> bool {
        self.info.nar_classifier(aol, kind).is_some()
    }
}

/// Exclusion rules matched against artifact ids.
#[derive(Debug, Clone, Copy)]
pub struct Exclusions<'a> {
    names: &'a [String],
}

impl<'a> Exclusions<'a> {
    pub fn new(names: &'a [String]) -> Self {
        Exclusions { names }
    }

    pub fn is_excluded(&self, artifact: &NarArtifact) -> bool {
        let excluded = self.names.iter().any(|n| n == artifact.artifact_id());
        if excluded {
            tracing::info!("Excluding dependency {}", artifact.coordinates());
        }
        excluded
    }

    /// Warn about rules that match none of `artifacts`.
    pub fn warn_unmatched(&self, artifacts: &[&NarArtifact]) {
        for name in self.names {
            if !artifacts.iter().any(|a| a.artifact_id() == name) {
                tracing::warn!("exclusion `{}` does not match any dependency", name);
            }
        }
    }
}

/// Reorder `items` so those named in `order` come first, in that order.
///
/// Everything else follows in its original order. An item is never repeated,
/// even when named twice.
pub fn order_dependencies<T, F>(items: Vec<T>, order: &[String], key: F) -> Vec<T>
where
    F: Fn(&T) -> String,
{
    if order.is_empty() {
        return items;
    }

    let mut remaining: Vec<Option<T>> = items.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(remaining.len());

    for name in order {
        for slot in remaining.iter_mut() {
            if slot.as_ref().map(|item| key(item) == *name).unwrap_or(false) {
                if let Some(item) = slot.take() {
                    ordered.push(item);
                }
            }
        }
    }
    ordered.extend(remaining.into_iter().flatten());
    ordered
}

/// Resolved native dependencies of one module.
#[derive(Debug, Clone, Default)]
pub struct NarManager {
    artifacts: Vec<NarArtifact>,
}

impl NarManager {
    /// Resolve the dependencies of a module and load their metadata.
    pub fn resolve(
        resolver: &dyn DependencyResolver,
        root: &Coordinates,
        dependencies: &[crate::core::artifact::DependencySpec],
        layout: &NarLayout,
    ) -> Result<Self> {
        let resolved = resolver.resolve(root, dependencies)?;
        let artifacts = resolved
            .into_iter()
            .map(|r| NarArtifact::load(r, layout))
            .collect::<Result<Vec<_>>>()?;
        Ok(NarManager { artifacts })
    }

    pub fn from_artifacts(artifacts: Vec<NarArtifact>) -> Self {
        NarManager { artifacts }
    }

    /// Dependencies visible in `scope`, in resolution order.
    pub fn dependencies(&self, scope: Scope) -> Vec<&NarArtifact> {
        self.artifacts
            .iter()
            .filter(|a| scope.includes(a.scope()))
            .collect()
    }

    /// Directly declared dependencies visible in `scope`.
    pub fn direct_dependencies(&self, scope: Scope) -> Vec<&NarArtifact> {
        self.dependencies(scope)
            .into_iter()
            .filter(|a| a.is_direct())
            .collect()
    }

    pub fn find(&self, key: &str) -> Option<&NarArtifact> {
        self.artifacts.iter().find(|a| a.key() == key)
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutKind;
    use crate::test_support::FakeRepository;

    fn aol() -> Aol {
        Aol::parse("x86_64-Linux-gcc").unwrap()
    }

    fn artifact(name: &str, scope: Scope, direct: bool) -> NarArtifact {
        let coordinates = Coordinates::new("g", name, "1.0");
        NarArtifact::new(
            ResolvedArtifact {
                location: PathBuf::from("/repo/g").join(name).join("1.0"),
                coordinates: coordinates.clone(),
                scope,
                direct,
            },
            NarInfo::new(coordinates),
            NarLayout::new(LayoutKind::NarLayout21, false),
        )
    }

    #[test]
    fn test_override_order() {
        let deps = vec!["g:dep1".to_string(), "g:dep3".to_string(), "g:dep2".to_string()];
        let order = vec!["g:dep2".to_string(), "g:dep1".to_string()];
        let ordered = order_dependencies(deps, &order, |d| d.clone());
        assert_eq!(ordered, vec!["g:dep2", "g:dep1", "g:dep3"]);
    }

    #[test]
    fn test_override_never_duplicates() {
        let deps = vec!["g:a".to_string(), "g:b".to_string()];
        let order = vec!["g:b".to_string(), "g:b".to_string(), "g:missing".to_string()];
        let ordered = order_dependencies(deps, &order, |d| d.clone());
        assert_eq!(ordered, vec!["g:b", "g:a"]);
    }

    #[test]
    fn test_override_artifacts() {
        let manager = NarManager::from_artifacts(vec![
            artifact("dep1", Scope::Compile, true),
            artifact("dep3", Scope::Compile, true),
            artifact("dep2", Scope::Compile, false),
        ]);
        let order = vec!["g:dep2".to_string(), "g:dep1".to_string()];
        let ordered: Vec<_> = order_dependencies(manager.dependencies(Scope::Compile), &order, |a| a.key())
            .into_iter()
            .map(|a| a.artifact_id().to_string())
            .collect();
        assert_eq!(ordered, vec!["dep2", "dep1", "dep3"]);
    }

    #[test]
    fn test_scopes() {
        let manager = NarManager::from_artifacts(vec![
            artifact("zlib", Scope::Compile, true),
            artifact("gtest", Scope::Test, true),
            artifact("pthread", Scope::Test, false),
        ]);
        assert_eq!(manager.dependencies(Scope::Compile).len(), 1);
        assert_eq!(manager.dependencies(Scope::Test).len(), 3);
        assert_eq!(manager.direct_dependencies(Scope::Test).len(), 2);
        assert!(manager.find("g:gtest").is_some());
    }

    #[test]
    fn test_unpack_binding() {
        let mut jni = artifact("jni", Scope::Compile, true);
        jni.info.set_binding(None, Binding::Jni);
        assert_eq!(jni.binding(&aol(), Binding::Static).unwrap(), Binding::Jni);
        assert_eq!(
            jni.unpack_binding(&aol(), Binding::Shared).unwrap(),
            Binding::Shared
        );

        let mut stat = artifact("stat", Scope::Compile, true);
        stat.info.set_binding(Some(&aol()), Binding::Static);
        assert_eq!(
            stat.unpack_binding(&aol(), Binding::Shared).unwrap(),
            Binding::Static
        );
    }

    #[test]
    fn test_exclusions() {
        let names = vec!["zlib".to_string(), "typo".to_string()];
        let exclusions = Exclusions::new(&names);
        let zlib = artifact("zlib", Scope::Compile, true);
        let png = artifact("png", Scope::Compile, true);
        assert!(exclusions.is_excluded(&zlib));
        assert!(!exclusions.is_excluded(&png));
        exclusions.warn_unmatched(&[&zlib, &png]);
    }

    #[test]
    fn test_nar_file() {
        let zlib = artifact("zlib", Scope::Compile, true);
        assert_eq!(
            zlib.nar_file(&Classifier::bound(&aol(), Binding::Shared)),
            PathBuf::from("/repo/g/zlib/1.0/zlib-1.0-x86_64-Linux-gcc-shared.nar")
        );
        assert_eq!(
            zlib.nar_file(&Classifier::NoArch),
            PathBuf::from("/repo/g/zlib/1.0/zlib-1.0-noarch.nar")
        );
    }

    #[test]
    fn test_resolve_loads_metadata() {
        let repo = FakeRepository::new();
        let location = repo.install("g", "zlib", "1.0", &[]);
        let coords = Coordinates::new("g", "zlib", "1.0");
        let mut info = NarInfo::new(coords.clone());
        info.set_binding(None, Binding::Static);
        NarLayout::new(LayoutKind::NarLayout22, true).record(&mut info);
        repo.write_metadata(&info);

        let layout = NarLayout::new(LayoutKind::NarLayout21, false);
        let manager = NarManager::resolve(
            &crate::resolver::RepositoryResolver::new(repo.root()),
            &Coordinates::new("g", "app", "1.0"),
            &[crate::core::artifact::DependencySpec {
                group: "g".to_string(),
                name: "zlib".to_string(),
                version: "1.0".to_string(),
                scope: Scope::Compile,
            }],
            &layout,
        )
        .unwrap();

        let zlib = manager.find("g:zlib").unwrap();
        assert_eq!(zlib.location(), location);
        assert_eq!(zlib.layout().kind(), LayoutKind::NarLayout22);
        assert_eq!(zlib.layout().configuration(), "debug");
        assert_eq!(zlib.binding(&aol(), Binding::Shared).unwrap(), Binding::Static);
    }

    #[test]
    fn test_missing_metadata_is_an_error() {
        let repo = FakeRepository::new();
        repo.install("g", "zlib", "1.0", &[]);
        let resolved = ResolvedArtifact {
            coordinates: Coordinates::new("g", "zlib", "1.0"),
            scope: Scope::Compile,
            direct: true,
            location: repo.root().join("g/zlib/1.0"),
        };
        let err = NarArtifact::load(resolved, &NarLayout::new(LayoutKind::NarLayout21, false))
            .unwrap_err();
        assert!(err.to_string().contains("no NAR metadata"));
    }
}
