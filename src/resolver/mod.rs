//! Dependency resolution.
//!
//! Resolution itself is a collaborator behind [`DependencyResolver`]; the
//! built-in [`RepositoryResolver`] reads a local repository of installed
//! modules. [`NarManager`] turns the result into native artifacts with their
//! metadata loaded.

mod graph;
mod nar_manager;
mod repository;

use std::path::PathBuf;

use anyhow::Result;

use crate::core::artifact::{Coordinates, DependencySpec, Scope};

pub use graph::{DependencyGraph, OrderedNode};
pub use nar_manager::{order_dependencies, Exclusions, NarArtifact, NarManager};
pub use repository::RepositoryResolver;

/// A module chosen by resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub coordinates: Coordinates,
    /// Compile when a path of compile edges leads to the module from the
    /// root, test otherwise.
    pub scope: Scope,
    /// Declared by the root module itself.
    pub direct: bool,
    /// Directory holding the module's installed files.
    pub location: PathBuf,
}

/// Turns declared dependencies into an ordered list of modules.
pub trait DependencyResolver {
    /// Resolve the transitive closure of `dependencies` declared by `root`,
    /// nearest first.
    fn resolve(&self, root: &Coordinates, dependencies: &[DependencySpec])
        -> Result<Vec<ResolvedArtifact>>;
}
