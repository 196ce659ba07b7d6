//! Test utilities for NAR unit tests.
//!
//! [`FakeRepository`] is a local repository of installed modules in a
//! temporary directory, [`NarBuilder`] writes archives in the NAR format and
//! [`RecordingEngine`] stands in for the native toolchain.
//!
//! # Example
//!
//! ```rust,ignore
//! use nar::test_support::{FakeRepository, ModuleFixture};
//!
//! #[test]
//! fn test_example() {
//!     let repo = FakeRepository::new();
//!     repo.install_module("com.example", "zlib", "1.2", "NarLayout21", &[]);
//!     let module = ModuleFixture::new("com.example", "app", "1.0")
//!         .dependency("com.example", "zlib", "1.2", Scope::Compile);
//!     let gctx = repo.global_context(module.path());
//!     // Build a context from `gctx` and `module.manifest()`...
//! }
//! ```

pub mod fixtures;

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;

use crate::builder::engine::{CompileEngine, TaskOutcome};
use crate::builder::task::CompileTask;
use crate::core::artifact::Coordinates;
use crate::core::nar_info::{keys, NarInfo, NAR_PROPERTIES};
use crate::util::config::Config;
use crate::util::context::GlobalContext;

pub use fixtures::*;

/// A local repository of installed modules in a temporary directory.
pub struct FakeRepository {
    dir: TempDir,
}

impl FakeRepository {
    pub fn new() -> Self {
        FakeRepository {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Directory a module is installed in.
    pub fn location(&self, coordinates: &Coordinates) -> PathBuf {
        self.root().join(coordinates.repository_path())
    }

    /// Install a module directory with a manifest declaring `deps`.
    pub fn install(&self, group: &str, name: &str, version: &str, deps: &[(&str, &str, &str)]) -> PathBuf {
        let location = self.location(&Coordinates::new(group, name, version));
        fs::create_dir_all(&location).unwrap();

        let mut manifest = format!(
            "[package]\ngroup = \"{}\"\nname = \"{}\"\nversion = \"{}\"\n",
            group, name, version
        );
        for (g, a, v) in deps {
            manifest.push_str(&format!(
                "\n[[dependency]]\ngroup = \"{}\"\nname = \"{}\"\nversion = \"{}\"\n",
                g, a, v
            ));
        }
        fs::write(location.join(format!("{}-{}.toml", name, version)), manifest).unwrap();
        location
    }

    /// Write metadata next to an installed module.
    pub fn write_metadata(&self, info: &NarInfo) -> PathBuf {
        let coordinates = info.coordinates();
        let path = self
            .location(coordinates)
            .join("META-INF")
            .join("nar")
            .join(&coordinates.group_id)
            .join(&coordinates.artifact_id)
            .join(NAR_PROPERTIES);
        info.write_to_file(&path).unwrap();
        path
    }

    /// Install a module whose metadata records `layout`.
    pub fn install_module(
        &self,
        group: &str,
        name: &str,
        version: &str,
        layout: &str,
        deps: &[(&str, &str, &str)],
    ) -> PathBuf {
        let location = self.install(group, name, version, deps);
        let mut info = NarInfo::new(Coordinates::new(group, name, version));
        info.set_property(None, keys::LAYOUT, layout);
        self.write_metadata(&info);
        location
    }

    /// Install a module without dependencies and with the given metadata.
    pub fn install_module_with(
        &self,
        group: &str,
        name: &str,
        version: &str,
        properties: &[(&str, &str)],
    ) -> PathBuf {
        let location = self.install(group, name, version, &[]);
        let mut info = NarInfo::new(Coordinates::new(group, name, version));
        for (key, value) in properties {
            info.set_property(None, key, *value);
        }
        self.write_metadata(&info);
        location
    }

    /// A context rooted at `cwd` that installs into and resolves from this
    /// repository.
    pub fn global_context(&self, cwd: &Path) -> GlobalContext {
        let mut config = Config::default();
        config.repository.path = Some(self.root().to_path_buf());
        GlobalContext::with_cwd(cwd.to_path_buf()).with_config(config)
    }
}

impl Default for FakeRepository {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes NAR archives from in-memory files.
#[derive(Debug, Clone, Default)]
pub struct NarBuilder {
    files: Vec<(PathBuf, Vec<u8>)>,
}

impl NarBuilder {
    pub fn new() -> Self {
        NarBuilder::default()
    }

    pub fn file(mut self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) -> Self {
        self.files.push((path.as_ref().to_path_buf(), content.into()));
        self
    }

    /// Write the archive to `dest`, creating parent directories.
    pub fn write(self, dest: &Path) -> PathBuf {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let file = File::create(dest).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (path, content) in &self.files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, path, content.as_slice())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
        dest.to_path_buf()
    }
}

/// Compile engine that records tasks instead of running a toolchain.
///
/// Every linked output is created as an empty file so later steps can
/// package it.
#[derive(Debug)]
pub struct RecordingEngine {
    extension: String,
    tasks: Mutex<Vec<CompileTask>>,
}

impl RecordingEngine {
    pub fn new(extension: &str) -> Self {
        RecordingEngine {
            extension: extension.to_string(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn tasks(&self) -> Vec<CompileTask> {
        self.tasks.lock().unwrap().clone()
    }
}

impl CompileEngine for RecordingEngine {
    fn execute(&self, task: &CompileTask) -> Result<TaskOutcome> {
        self.tasks.lock().unwrap().push(task.clone());

        fs::create_dir_all(&task.obj_dir)?;
        let mut objects = Vec::new();
        for set in &task.sources {
            for source in &set.files {
                let object = task.object_path(source, &self.extension);
                fs::write(&object, "")?;
                objects.push(object);
            }
        }
        objects.extend(task.extra_objects.iter().cloned());

        if let Some(ref out) = task.out_file {
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(out, "")?;
        }

        Ok(TaskOutcome {
            objects,
            output: task.out_file.clone(),
            succeeded: true,
        })
    }

    fn object_extension(&self) -> &str {
        &self.extension
    }
}
