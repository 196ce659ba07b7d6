//! Compile task model.
//!
//! One [`CompileTask`] is configured per declared library. It carries every
//! decision the orchestrator made (sources, include paths, dependency library
//! sets, output location) so that the engine only has to turn it into
//! commands.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::builder::toolchain::{BuildFlags, LanguageLinkage};
use crate::core::aol::Aol;
use crate::core::artifact::Scope;
use crate::core::library::Binding;
use crate::core::manifest::Language;

/// Whether the main sources or the test sources are being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Main,
    Test,
}

impl BuildMode {
    /// Dependency scope used by this mode.
    pub fn scope(&self) -> Scope {
        match self {
            BuildMode::Main => Scope::Compile,
            BuildMode::Test => Scope::Test,
        }
    }

    /// Directory below `target/` holding outputs and unpacked dependencies.
    pub fn output_dir_name(&self) -> &'static str {
        match self {
            BuildMode::Main => "nar",
            BuildMode::Test => "test-nar",
        }
    }

    /// Directory below the output directory holding object files.
    pub fn object_dir_name(&self) -> &'static str {
        match self {
            BuildMode::Main => "obj",
            BuildMode::Test => "source_obj",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Main => f.write_str("main"),
            BuildMode::Test => f.write_str("test"),
        }
    }
}

/// Sources of one language with the settings they compile with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSet {
    pub language: Language,
    pub files: Vec<PathBuf>,
    /// The module's own include directories for this language.
    pub include_dirs: Vec<PathBuf>,
    pub defines: Vec<(String, Option<String>)>,
    pub options: Vec<String>,
}

/// Libraries found in one dependency library directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibSet {
    pub dir: PathBuf,
    pub libs: Vec<String>,
}

/// Everything needed to compile and link one library.
#[derive(Debug, Clone)]
pub struct CompileTask {
    pub aol: Aol,
    pub binding: Binding,
    pub subsystem: String,
    /// Linked output; `None` compiles only.
    pub out_file: Option<PathBuf>,
    pub obj_dir: PathBuf,
    pub sources: Vec<SourceSet>,
    /// Include directories of dependencies, searched after the module's own.
    pub dependency_includes: Vec<PathBuf>,
    /// Compiler options injected from dependency metadata.
    pub injected_options: Vec<String>,
    pub lib_sets: Vec<LibSet>,
    pub sys_libs: Vec<String>,
    pub linker_options: Vec<String>,
    /// Objects linked in addition to the compiled sources.
    pub extra_objects: Vec<PathBuf>,
    pub flags: BuildFlags,
    pub linkage: LanguageLinkage,
    /// Parallel compile jobs; 0 uses every core.
    pub max_cores: usize,
    pub fail_on_error: bool,
    pub libtool: bool,
}

impl CompileTask {
    pub fn source_count(&self) -> usize {
        self.sources.iter().map(|s| s.files.len()).sum()
    }

    /// Object file produced for `source`.
    pub fn object_path(&self, source: &Path, extension: &str) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.obj_dir.join(format!("{}.{}", stem, extension))
    }

    /// Front end that drives the link.
    ///
    /// C++ wins whenever there are C++ sources or the C++ runtime is
    /// requested; a pure Fortran module links with the Fortran compiler.
    pub fn link_driver(&self) -> Language {
        let has = |lang: Language| {
            self.sources
                .iter()
                .any(|s| s.language == lang && !s.files.is_empty())
        };
        if has(Language::Cpp) || (self.linkage.cpp && !has(Language::Fortran)) {
            Language::Cpp
        } else if has(Language::Fortran) && !has(Language::C) {
            Language::Fortran
        } else {
            Language::C
        }
    }
}

/// Split a `NAME` or `NAME=VALUE` define.
pub fn parse_define(define: &str) -> (String, Option<String>) {
    match define.split_once('=') {
        Some((name, value)) => (name.trim().to_string(), Some(value.trim().to_string())),
        None => (define.trim().to_string(), None),
    }
}
