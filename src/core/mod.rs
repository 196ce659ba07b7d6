//! Core data structures for NAR builds.
//!
//! This module contains the foundational types used throughout the crate:
//! - AOL identifiers and binding types
//! - The per-module metadata store and its property-file codec
//! - Manifests and dependency coordinates
//! - The error taxonomy

pub mod aol;
pub mod artifact;
pub mod errors;
pub mod library;
pub mod manifest;
pub mod nar_info;
pub mod properties;

pub use aol::{Aol, Os};
pub use artifact::{Coordinates, DependencySpec, Scope};
pub use errors::NarError;
pub use library::{Binding, Library};
pub use manifest::{find_manifest, Manifest, MANIFEST_NAME};
pub use nar_info::NarInfo;
