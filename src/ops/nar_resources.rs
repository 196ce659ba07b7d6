//! Implementation of the resources step.
//!
//! Copies prebuilt files from `src/main/resources` into the layout:
//! `noarch/` into the no-arch root and `aol/{aol}/{include,bin,lib}` into the
//! matching AOL directories. Libraries copied this way are registered in the
//! module's metadata.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::builder::{BuildContext, BuildMode};
use crate::core::aol::Aol;
use crate::util::fs::copy_dir_all;

/// What the resources step copied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcesResult {
    pub copied: Vec<PathBuf>,
    /// `(aol, library name)` pairs registered in the metadata.
    pub libraries: Vec<(String, String)>,
}

/// Copy the module's resources into `target/nar` and persist its metadata.
pub fn copy_resources(ctx: &mut BuildContext) -> Result<ResourcesResult> {
    let resources = ctx.resources_dir();
    let dest = ctx.output_dir(BuildMode::Main);
    let (artifact_id, version) = (ctx.artifact_id().to_string(), ctx.version().to_string());
    let mut result = ResourcesResult::default();

    let noarch = resources.join("noarch");
    if noarch.is_dir() {
        let root = ctx.layout().no_arch_directory(&dest, &artifact_id, &version);
        result.copied.extend(copy_dir_all(&noarch, &root)?);
    }

    for aol in resource_aols(ctx, &resources.join("aol"))? {
        let dir = resources.join("aol").join(aol.to_string());
        tracing::debug!("Copying resources for {}", aol);

        let include = dir.join("include");
        if include.is_dir() {
            let target = ctx.layout().include_directory(&dest, &artifact_id, &version);
            result.copied.extend(copy_dir_all(&include, &target)?);
        }

        let bin = dir.join("bin");
        if bin.is_dir() {
            let target = ctx.layout().bin_directory(&dest, &artifact_id, &version, &aol);
            result.copied.extend(copy_dir_all(&bin, &target)?);
        }

        let lib = dir.join("lib");
        if lib.is_dir() {
            for library in ctx.libraries() {
                let target = ctx.layout().lib_directory(
                    &dest,
                    &artifact_id,
                    &version,
                    &aol,
                    library.binding,
                );
                for file in copy_dir_all(&lib, &target)? {
                    if let Some(name) = library_name(&file) {
                        ctx.info_mut().add_library(&aol, &name);
                        let entry = (aol.to_string(), name);
                        if !result.libraries.contains(&entry) {
                            result.libraries.push(entry);
                        }
                    }
                    result.copied.push(file);
                }
            }
        }
    }

    if result.copied.is_empty() {
        tracing::debug!("no resources in {}", resources.display());
    } else {
        tracing::info!("Copied {} resource files", result.copied.len());
    }
    ctx.persist_info()?;
    Ok(result)
}

/// AOL directories below `resources/aol` to copy.
fn resource_aols(ctx: &BuildContext, dir: &Path) -> Result<Vec<Aol>> {
    if ctx.manifest().nar.resources_copy_aol {
        return Ok(vec![ctx.aol().clone()]);
    }
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut aols = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read directory: {}", dir.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        match Aol::parse(&name) {
            Ok(aol) => aols.push(aol),
            Err(e) => tracing::warn!("ignoring resource directory `{}`: {}", name, e),
        }
    }
    aols.sort_by_key(|a| a.to_string());
    Ok(aols)
}

/// Library name of a copied file: its name up to the first `.`.
fn library_name(file: &Path) -> Option<String> {
    let name = file.file_name()?.to_string_lossy();
    let base = name.split('.').next().unwrap_or_default();
    if base.is_empty() {
        None
    } else {
        Some(base.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BuildOptions;
    use crate::test_support::{FakeRepository, ModuleFixture};

    fn context(repo: &FakeRepository, module: &ModuleFixture) -> BuildContext {
        let gctx = repo.global_context(module.path());
        BuildContext::new(&gctx, module.manifest(), &BuildOptions::default()).unwrap()
    }

    #[test]
    fn test_copies_noarch_and_aol_resources() {
        let repo = FakeRepository::new();
        let module = ModuleFixture::new("com.example", "foo", "1.0")
            .nar("aol = \"x86_64-Linux-gcc\"\n")
            .file("src/main/resources/noarch/README", "docs\n")
            .file("src/main/resources/aol/x86_64-Linux-gcc/include/config.h", "")
            .file("src/main/resources/aol/x86_64-Linux-gcc/lib/libbar.so.1", "")
            .file("src/main/resources/aol/amd64-Windows-msvc/bin/tool.exe", "");
        let mut ctx = context(&repo, &module);

        let result = copy_resources(&mut ctx).unwrap();
        let nar = module.path().join("target/nar");
        assert!(nar.join("foo-1.0-noarch/README").is_file());
        assert!(nar.join("foo-1.0-noarch/include/config.h").is_file());
        assert!(nar
            .join("foo-1.0-x86_64-Linux-gcc-shared/lib/x86_64-Linux-gcc/shared/libbar.so.1")
            .is_file());
        assert!(nar
            .join("foo-1.0-amd64-Windows-msvc-executable/bin/amd64-Windows-msvc/tool.exe")
            .is_file());
        assert_eq!(
            result.libraries,
            vec![("x86_64-Linux-gcc".to_string(), "libbar".to_string())]
        );

        let persisted = std::fs::read_to_string(ctx.metadata_path()).unwrap();
        assert!(persisted.contains("x86_64-Linux-gcc.libs.names=foo-1.0 libbar"));
    }

    #[test]
    fn test_copy_only_current_aol() {
        let repo = FakeRepository::new();
        let module = ModuleFixture::new("com.example", "foo", "1.0")
            .nar("aol = \"x86_64-Linux-gcc\"\nresources-copy-aol = true\n")
            .file("src/main/resources/aol/amd64-Windows-msvc/bin/tool.exe", "");
        let mut ctx = context(&repo, &module);

        let result = copy_resources(&mut ctx).unwrap();
        assert!(result.copied.is_empty());
        assert!(ctx.metadata_path().is_file());
    }

    #[test]
    fn test_library_name() {
        assert_eq!(library_name(Path::new("lib/libz.so.1.2")), Some("libz".to_string()));
        assert_eq!(library_name(Path::new("lib/.hidden")), None);
    }
}
