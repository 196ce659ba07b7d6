//! Nar.toml manifest parsing and schema.
//!
//! The manifest declares a module's coordinates, the libraries it produces,
//! its per-language source sets and its NAR dependencies.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::aol::{Aol, Os};
use crate::core::artifact::{Coordinates, DependencySpec, Scope};
use crate::core::library::{Binding, Library};

/// Canonical manifest file name.
pub const MANIFEST_NAME: &str = "Nar.toml";

/// Layout used when the manifest does not name one.
pub const DEFAULT_LAYOUT: &str = "NarLayout21";

/// Linker flag marking a WinRT component build.
pub const WINMD_FLAG: &str = "/WINMD";

/// Runtime library linkage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    #[default]
    Dynamic,
    Static,
}

impl Runtime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Runtime::Dynamic => "dynamic",
            Runtime::Static => "static",
        }
    }
}

/// Source languages compiled by a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    C,
    Cpp,
    Fortran,
}

impl Language {
    /// Languages in compile order.
    pub const ALL: [Language; 3] = [Language::Cpp, Language::C, Language::Fortran];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "c++",
            Language::Fortran => "fortran",
        }
    }

    fn default_includes(&self) -> &'static [&'static str] {
        match self {
            Language::C => &["**/*.c"],
            Language::Cpp => &["**/*.cc", "**/*.cpp", "**/*.cxx", "**/*.c++"],
            Language::Fortran => &["**/*.f", "**/*.for", "**/*.f90", "**/*.f95"],
        }
    }
}

/// Per-language compiler configuration from `[nar.c]`, `[nar.cpp]`,
/// `[nar.fortran]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CompilerConfig {
    /// Directories searched for main sources (default `src/main/{lang}`).
    pub source_directories: Option<Vec<PathBuf>>,
    /// Directories searched for test sources (default `src/test/{lang}`).
    pub test_source_directories: Option<Vec<PathBuf>>,
    /// Glob patterns selecting sources inside the source directories.
    pub includes: Option<Vec<String>>,
    /// Extra compiler options.
    pub options: Vec<String>,
    /// Preprocessor defines (`NAME` or `NAME=VALUE`).
    pub defines: Vec<String>,
    /// Include directories; the first existing ones are exported as headers.
    pub include_paths: Option<Vec<PathBuf>>,
}

impl CompilerConfig {
    pub fn source_directories(&self, lang: Language) -> Vec<PathBuf> {
        self.source_directories
            .clone()
            .unwrap_or_else(|| vec![PathBuf::from("src/main").join(lang.as_str())])
    }

    pub fn test_source_directories(&self, lang: Language) -> Vec<PathBuf> {
        self.test_source_directories
            .clone()
            .unwrap_or_else(|| vec![PathBuf::from("src/test").join(lang.as_str())])
    }

    pub fn includes(&self, lang: Language) -> Vec<String> {
        self.includes.clone().unwrap_or_else(|| {
            lang.default_includes()
                .iter()
                .map(|s| s.to_string())
                .collect()
        })
    }

    pub fn include_paths(&self) -> Vec<PathBuf> {
        self.include_paths
            .clone()
            .unwrap_or_else(|| vec![PathBuf::from("src/main/include")])
    }
}

/// Linker configuration from `[nar.linker]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LinkerConfig {
    /// Linker front end name; defaults to the platform's usual one.
    pub name: Option<String>,
    pub options: Vec<String>,
    pub libs: Vec<String>,
    pub sys_libs: Vec<String>,
}

impl LinkerConfig {
    pub fn name_for(&self, os: Os) -> String {
        if let Some(ref name) = self.name {
            return name.clone();
        }
        match os {
            Os::Windows => "msvc",
            Os::MacOsX => "g++",
            Os::SunOs => "CC",
            Os::Aix => "xlC",
            _ => "gcc",
        }
        .to_string()
    }

    /// Whether the module is built as a WinRT component.
    pub fn is_target_winrt(&self) -> bool {
        self.options.iter().any(|o| o == WINMD_FLAG)
    }
}

/// Package metadata from `[package]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackageMetadata {
    pub group: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub final_name: Option<String>,
}

/// Module settings from `[nar]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NarConfig {
    /// Layout name; user configuration and then `NarLayout21` apply when unset.
    pub layout: Option<String>,
    pub aol: Option<Aol>,
    pub debug: bool,
    pub output: Option<String>,
    pub runtime: Runtime,
    pub libtool: bool,
    /// Parallel compile jobs; 0 uses every core.
    pub max_cores: usize,
    pub fail_on_error: bool,
    pub java_home: Option<PathBuf>,
    /// Copy only the resources of the AOL being built.
    pub resources_copy_aol: bool,
    /// `group:artifact` names linked first, in this order.
    pub dependency_lib_order: Vec<String>,
    /// Artifact ids ignored while compiling.
    pub compile_exclude_dependencies: Vec<String>,
    /// Artifact ids ignored while linking tests.
    pub test_exclude_dependencies: Vec<String>,
    #[serde(rename = "library")]
    pub libraries: Vec<Library>,
    pub c: CompilerConfig,
    pub cpp: CompilerConfig,
    pub fortran: CompilerConfig,
    pub linker: LinkerConfig,
}

impl Default for NarConfig {
    fn default() -> Self {
        NarConfig {
            layout: None,
            aol: None,
            debug: false,
            output: None,
            runtime: Runtime::Dynamic,
            libtool: false,
            max_cores: 0,
            fail_on_error: true,
            java_home: None,
            resources_copy_aol: false,
            dependency_lib_order: Vec::new(),
            compile_exclude_dependencies: Vec::new(),
            test_exclude_dependencies: Vec::new(),
            libraries: Vec::new(),
            c: CompilerConfig::default(),
            cpp: CompilerConfig::default(),
            fortran: CompilerConfig::default(),
            linker: LinkerConfig::default(),
        }
    }
}

impl NarConfig {
    pub fn compiler(&self, lang: Language) -> &CompilerConfig {
        match lang {
            Language::C => &self.c,
            Language::Cpp => &self.cpp,
            Language::Fortran => &self.fortran,
        }
    }

    pub fn compiler_mut(&mut self, lang: Language) -> &mut CompilerConfig {
        match lang {
            Language::C => &mut self.c,
            Language::Cpp => &mut self.cpp,
            Language::Fortran => &mut self.fortran,
        }
    }

    /// Exclusion list for `scope`.
    pub fn exclude_dependencies(&self, scope: Scope) -> &[String] {
        match scope {
            Scope::Compile => &self.compile_exclude_dependencies,
            Scope::Test => &self.test_exclude_dependencies,
        }
    }
}

/// Raw manifest as deserialized from TOML.
#[derive(Debug, Deserialize)]
struct RawManifest {
    package: Option<PackageMetadata>,

    #[serde(default)]
    nar: NarConfig,

    #[serde(default, rename = "dependency")]
    dependencies: Vec<DependencySpec>,
}

/// The parsed Nar.toml manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub package: PackageMetadata,
    pub nar: NarConfig,
    pub dependencies: Vec<DependencySpec>,
    /// The directory containing this manifest.
    pub manifest_dir: PathBuf,
}

impl Manifest {
    /// Load a manifest from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;

        Self::parse(&content, path)
    }

    /// Parse manifest content.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let raw: RawManifest = toml::from_str(content)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        let package = match raw.package {
            Some(package) => package,
            None => bail!("manifest at {} must have a [package] section", path.display()),
        };
        for (field, value) in [
            ("group", &package.group),
            ("name", &package.name),
            ("version", &package.version),
        ] {
            if value.trim().is_empty() {
                bail!("manifest at {}: package {} must not be empty", path.display(), field);
            }
        }

        let mut seen = std::collections::HashSet::new();
        for dep in &raw.dependencies {
            if !seen.insert((dep.group.as_str(), dep.name.as_str())) {
                bail!(
                    "manifest at {}: dependency `{}:{}` is declared twice",
                    path.display(),
                    dep.group,
                    dep.name
                );
            }
        }

        let manifest_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();

        Ok(Manifest {
            package,
            nar: raw.nar,
            dependencies: raw.dependencies,
            manifest_dir,
        })
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(&self.package.group, &self.package.name, &self.package.version)
    }

    /// Base name of produced archives.
    pub fn final_name(&self) -> String {
        self.package
            .final_name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.package.name, self.package.version))
    }

    /// Configured output name, defaulting to `{name}-{version}`.
    pub fn output(&self) -> String {
        self.nar
            .output
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.package.name, self.package.version))
    }

    /// Declared libraries; a module without any declares one shared library.
    pub fn libraries(&self) -> Vec<Library> {
        if self.nar.libraries.is_empty() {
            vec![Library::new(Binding::Shared)]
        } else {
            self.nar.libraries.clone()
        }
    }

    /// Declared dependencies visible in `scope`, in declaration order.
    pub fn dependencies_for(&self, scope: Scope) -> impl Iterator<Item = &DependencySpec> {
        self.dependencies
            .iter()
            .filter(move |dep| scope.includes(dep.scope))
    }

    /// Resolve a path from the manifest relative to the module root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.manifest_dir.join(path)
        }
    }
}

/// Find the manifest in `dir` or any parent directory.
pub fn find_manifest(dir: &Path) -> Option<PathBuf> {
    let mut current = dir.to_path_buf();
    loop {
        let candidate = current.join(MANIFEST_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Generate a manifest for a new module.
pub fn generate_manifest(group: &str, name: &str, binding: Binding) -> String {
    format!(
        r#"[package]
group = "{group}"
name = "{name}"
version = "0.1.0"

[nar]
layout = "{layout}"

[[nar.library]]
type = "{binding}"
"#,
        group = group,
        name = name,
        layout = DEFAULT_LAYOUT,
        binding = binding
    )
}
