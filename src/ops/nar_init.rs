//! Implementation of `nar init`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::library::Binding;
use crate::core::manifest::{generate_manifest, MANIFEST_NAME};

/// Options for initializing a module.
#[derive(Debug, Clone)]
pub struct InitOptions {
    pub group: String,
    pub name: String,
    /// Binding of the single declared library
    pub binding: Binding,
}

/// Write a starter manifest into `path` and create the source directories.
///
/// Returns the manifest path.
pub fn init_module(path: &Path, opts: &InitOptions) -> Result<PathBuf> {
    if opts.binding == Binding::None {
        bail!("a module must declare a library binding other than `none`");
    }

    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }

    let manifest_path = path.join(MANIFEST_NAME);
    if manifest_path.exists() {
        bail!("`{}` already exists in `{}`", MANIFEST_NAME, path.display());
    }

    fs::write(&manifest_path, generate_manifest(&opts.group, &opts.name, opts.binding))
        .with_context(|| format!("failed to write {}", manifest_path.display()))?;

    for dir in ["src/main/c", "src/main/include", "src/test/c"] {
        let dir = path.join(dir);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create directory: {}", dir.display()))?;
    }

    Ok(manifest_path)
}
