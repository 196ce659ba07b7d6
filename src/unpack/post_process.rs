//! Fixups applied to a freshly unpacked NAR.
//!
//! Paths are relative to the unpack directory: `bin/{aol}` and `lib/{aol}`.
//! Tools that a step needs on a non-Windows target must be present; their
//! absence is a provisioning error rather than a warning.

use std::path::{Path, PathBuf};

use anyhow::Result;
use regex::Regex;

use crate::core::aol::{Aol, Os};
use crate::core::errors::NarError;
use crate::core::library::Binding;
use crate::util::config::ToolsConfig;
use crate::util::fs::{set_executable, symlink, walk_files};
use crate::util::process::{find_executable, ProcessBuilder};

/// Matches `libfoo.so.1.2` and captures `libfoo.so`.
const VERSIONED_SO: &str = r"^(.+\.so)(\.\d+)+$";

/// External tools used by post-processing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tools {
    pub ranlib: Option<PathBuf>,
    pub install_name_tool: Option<PathBuf>,
}

impl Tools {
    /// Configured paths, falling back to a PATH lookup.
    pub fn locate(config: &ToolsConfig) -> Self {
        Tools {
            ranlib: config.ranlib.clone().or_else(|| find_executable("ranlib")),
            install_name_tool: config
                .install_name_tool
                .clone()
                .or_else(|| find_executable("install_name_tool")),
        }
    }
}

/// Applies the post-unpack steps for one AOL.
#[derive(Debug)]
pub struct PostProcessor<'a> {
    tools: &'a Tools,
    versioned_so: Regex,
}

impl<'a> PostProcessor<'a> {
    pub fn new(tools: &'a Tools) -> Result<Self> {
        Ok(PostProcessor {
            tools,
            versioned_so: Regex::new(VERSIONED_SO)?,
        })
    }

    /// Run every step that applies to `aol` on the tree below `dir`.
    pub fn run(&self, dir: &Path, artifact: &str, aol: &Aol) -> Result<()> {
        let mut aols = vec![aol.clone()];
        aols.extend(aol.sibling_aols());

        if !aol.os().is_windows() {
            for target in &aols {
                self.make_executable(&dir.join("bin").join(target.to_string()))?;
            }
            self.make_links(&dir.join("lib").join(aol.to_string()), artifact, aol)?;
        }

        if aol.is_gcc_family() {
            for target in &aols {
                self.run_ranlib(&dir.join("lib").join(target.to_string()), artifact, aol)?;
            }
        }

        if aol.os() == Os::MacOsX {
            let lib = dir.join("lib").join(aol.to_string());
            let dylib_dirs = [
                lib.join(Binding::Shared.as_str()),
                lib.join(Binding::Jni.as_str()),
            ];
            self.run_install_name_tool(&dylib_dirs, artifact, aol)?;
        }
        Ok(())
    }

    fn make_executable(&self, dir: &Path) -> Result<()> {
        for file in walk_files(dir) {
            tracing::debug!("making {} executable", file.display());
            set_executable(&file)?;
        }
        Ok(())
    }

    /// Link the unversioned name of every versioned shared library to it.
    fn make_links(&self, dir: &Path, artifact: &str, aol: &Aol) -> Result<()> {
        for file in walk_files(dir) {
            let (Some(name), Some(parent)) = (file.file_name(), file.parent()) else {
                continue;
            };
            let name = name.to_string_lossy();
            let Some(caps) = self.versioned_so.captures(&name) else {
                continue;
            };
            let link = parent.join(&caps[1]);
            if link.symlink_metadata().is_ok() {
                continue;
            }
            tracing::debug!("linking {} -> {}", link.display(), name);
            symlink(Path::new(name.as_ref()), &link).map_err(|e| {
                NarError::provisioning(
                    artifact,
                    aol,
                    format!("linking {}", link.display()),
                    e.to_string(),
                )
            })?;
        }
        Ok(())
    }

    fn run_ranlib(&self, dir: &Path, artifact: &str, aol: &Aol) -> Result<()> {
        let archives: Vec<_> = walk_files(dir)
            .into_iter()
            .filter(|f| f.extension().map(|e| e == "a").unwrap_or(false))
            .collect();
        if archives.is_empty() {
            return Ok(());
        }
        let Some(ranlib) = self.required_tool(&self.tools.ranlib, "ranlib", artifact, aol)? else {
            return Ok(());
        };
        for archive in archives {
            let step = format!("indexing {}", archive.display());
            ProcessBuilder::new(ranlib)
                .arg(&archive)
                .exec_and_check(&step)?;
        }
        Ok(())
    }

    fn run_install_name_tool(&self, dirs: &[PathBuf], artifact: &str, aol: &Aol) -> Result<()> {
        let mut dylibs = Vec::new();
        for dir in dirs {
            dylibs.extend(
                walk_files(dir)
                    .into_iter()
                    .filter(|f| f.extension().map(|e| e == "dylib").unwrap_or(false)),
            );
        }
        if dylibs.is_empty() {
            return Ok(());
        }
        let Some(tool) =
            self.required_tool(&self.tools.install_name_tool, "install_name_tool", artifact, aol)?
        else {
            return Ok(());
        };
        for dylib in dylibs {
            let step = format!("relocating {}", dylib.display());
            ProcessBuilder::new(tool)
                .arg("-id")
                .arg(&dylib)
                .arg(&dylib)
                .exec_and_check(&step)?;
        }
        Ok(())
    }

    /// The tool if available. Missing is fatal except on Windows targets.
    fn required_tool<'t>(
        &self,
        tool: &'t Option<PathBuf>,
        name: &str,
        artifact: &str,
        aol: &Aol,
    ) -> Result<Option<&'t PathBuf>> {
        match tool {
            Some(path) => Ok(Some(path)),
            None if aol.os().is_windows() => {
                tracing::warn!("`{}` not found, skipping for {}", name, aol);
                Ok(None)
            }
            None => Err(NarError::provisioning(
                artifact,
                aol,
                format!("running {}", name),
                format!("`{}` was not found on PATH", name),
            )
            .into()),
        }
    }
}
