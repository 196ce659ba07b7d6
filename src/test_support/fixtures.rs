//! Module fixtures.
//!
//! A [`ModuleFixture`] is a module directory with a `Nar.toml` in a
//! temporary directory. The manifest is rewritten after every change so the
//! fixture can be read at any point.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::artifact::Scope;
use crate::core::manifest::{Manifest, MANIFEST_NAME};

/// A module directory under construction.
pub struct ModuleFixture {
    dir: TempDir,
    group: String,
    name: String,
    version: String,
    nar: String,
    dependencies: Vec<(String, String, String, Scope)>,
}

impl ModuleFixture {
    pub fn new(group: &str, name: &str, version: &str) -> Self {
        let fixture = ModuleFixture {
            dir: TempDir::new().unwrap(),
            group: group.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            nar: String::new(),
            dependencies: Vec::new(),
        };
        fixture.write_manifest();
        fixture
    }

    /// Append to the `[nar]` table.
    pub fn nar(mut self, fragment: &str) -> Self {
        self.nar.push_str(fragment);
        self.write_manifest();
        self
    }

    pub fn dependency(mut self, group: &str, name: &str, version: &str, scope: Scope) -> Self {
        self.dependencies.push((
            group.to_string(),
            name.to_string(),
            version.to_string(),
            scope,
        ));
        self.write_manifest();
        self
    }

    /// Add a source file.
    pub fn source(self, path: &str, content: &str) -> Self {
        self.file(path, content)
    }

    /// Add any file below the module directory.
    pub fn file(self, path: &str, content: &str) -> Self {
        let path = self.dir.path().join(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
        self
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.path().join(MANIFEST_NAME)
    }

    pub fn manifest(&self) -> Manifest {
        Manifest::load(&self.manifest_path()).unwrap()
    }

    fn write_manifest(&self) {
        let mut content = format!(
            "[package]\ngroup = \"{}\"\nname = \"{}\"\nversion = \"{}\"\n\n[nar]\n{}",
            self.group, self.name, self.version, self.nar
        );
        for (group, name, version, scope) in &self.dependencies {
            content.push_str(&format!(
                "\n[[dependency]]\ngroup = \"{}\"\nname = \"{}\"\nversion = \"{}\"\nscope = \"{}\"\n",
                group, name, version, scope
            ));
        }
        fs::write(self.manifest_path(), content).unwrap();
    }
}
