//! Resolution against a local repository of installed modules.
//!
//! An installed module lives at `{repository}/{group as path}/{artifact}/{version}/`
//! and carries its manifest as `{artifact}-{version}.toml`. Transitive
//! dependencies are the compile-scope dependencies declared there.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::artifact::{Coordinates, DependencySpec, Scope};
use crate::core::manifest::Manifest;
use crate::resolver::graph::DependencyGraph;
use crate::resolver::{DependencyResolver, ResolvedArtifact};

/// Resolves dependencies from a directory tree of installed modules.
#[derive(Debug, Clone)]
pub struct RepositoryResolver {
    root: PathBuf,
}

impl RepositoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        RepositoryResolver { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory an installed module lives in.
    pub fn location(&self, coordinates: &Coordinates) -> PathBuf {
        self.root.join(coordinates.repository_path())
    }

    /// Path of the manifest installed alongside a module.
    pub fn installed_manifest(&self, coordinates: &Coordinates) -> PathBuf {
        self.location(coordinates).join(format!(
            "{}-{}.toml",
            coordinates.artifact_id, coordinates.version
        ))
    }

    /// Compile-scope dependencies an installed module declares.
    fn transitive_dependencies(&self, coordinates: &Coordinates) -> Result<Vec<DependencySpec>> {
        let location = self.location(coordinates);
        if !location.is_dir() {
            bail!(
                "dependency `{}` is not installed in {}",
                coordinates,
                self.root.display()
            );
        }

        let manifest_path = self.installed_manifest(coordinates);
        if !manifest_path.is_file() {
            tracing::debug!("{} has no installed manifest", coordinates);
            return Ok(Vec::new());
        }

        let manifest = Manifest::load(&manifest_path)
            .with_context(|| format!("failed to read installed manifest of `{}`", coordinates))?;
        Ok(manifest
            .dependencies_for(Scope::Compile)
            .cloned()
            .collect())
    }
}

impl DependencyResolver for RepositoryResolver {
    fn resolve(
        &self,
        root: &Coordinates,
        dependencies: &[DependencySpec],
    ) -> Result<Vec<ResolvedArtifact>> {
        let mut graph = DependencyGraph::new(root.clone());
        let mut queue: VecDeque<_> = dependencies
            .iter()
            .map(|dep| (graph.root(), dep.coordinates(), dep.scope))
            .collect();

        while let Some((parent, coordinates, scope)) = queue.pop_front() {
            let (node, fresh) = graph.add_artifact(coordinates.clone());
            graph.add_edge(parent, node, scope);
            if !fresh {
                continue;
            }
            for dep in self.transitive_dependencies(&coordinates)? {
                queue.push_back((node, dep.coordinates(), Scope::Compile));
            }
        }

        graph.check_acyclic()?;

        let resolved: Vec<_> = graph
            .resolution_order()
            .into_iter()
            .map(|node| ResolvedArtifact {
                location: self.location(&node.coordinates),
                coordinates: node.coordinates,
                scope: node.scope,
                direct: node.direct,
            })
            .collect();

        tracing::debug!("resolved {} dependencies of {}", resolved.len(), root);
        Ok(resolved)
    }
}
