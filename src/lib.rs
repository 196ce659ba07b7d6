//! nar - build and package native modules as NAR archives
//!
//! A module is compiled for one AOL (architecture-OS-linker) at a time. Its
//! outputs are laid out by a versioned layout and packaged into one archive
//! per classifier, together with a `nar.properties` metadata file that tells
//! consumers how to unpack and link them.

pub mod builder;
pub mod core;
pub mod layout;
pub mod ops;
pub mod resolver;
pub mod unpack;
pub mod util;

/// Fixtures shared by unit tests: a fake repository, an archive builder and
/// a compile engine that records tasks instead of running compilers.
#[cfg(test)]
pub mod test_support;

pub use core::{Aol, Binding, Manifest, NarError, NarInfo};
pub use layout::NarLayout;
pub use util::context::GlobalContext;
