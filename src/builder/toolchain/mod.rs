//! Toolchain abstraction for native compilers.
//!
//! A [`Toolchain`] turns structured compile, archive and link inputs into
//! command lines for one compiler family. The linker component of the AOL
//! selects the toolchain: `msvc` maps to [`MsvcToolchain`], every other
//! linker to a GCC-style driver.

use std::path::{Path, PathBuf};

use crate::core::aol::Aol;
use crate::core::manifest::{Language, Runtime};

mod gcc;
mod msvc;

pub use gcc::GccToolchain;
pub use msvc::MsvcToolchain;

/// Flags shared by every compile and link step of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildFlags {
    pub debug: bool,
    pub runtime: Runtime,
    /// Position independent code, for libraries loaded at run time.
    pub pic: bool,
}

impl Default for BuildFlags {
    fn default() -> Self {
        BuildFlags {
            debug: false,
            runtime: Runtime::Dynamic,
            pic: false,
        }
    }
}

/// Language runtimes to link explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LanguageLinkage {
    pub cpp: bool,
    pub fortran: bool,
    pub fortran_main: bool,
}

/// A command to execute, with program, arguments, and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// The program to run (e.g., "gcc", "cl.exe")
    pub program: PathBuf,
    /// Command arguments
    pub args: Vec<String>,
    /// Environment variables to set
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Create a new command spec.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Input for a compile step.
#[derive(Debug, Clone)]
pub struct CompileInput {
    /// Source file to compile
    pub source: PathBuf,
    /// Output object file
    pub output: PathBuf,
    /// Include directories
    pub include_dirs: Vec<PathBuf>,
    /// Preprocessor defines (name, optional value)
    pub defines: Vec<(String, Option<String>)>,
    /// Additional compiler flags
    pub cflags: Vec<String>,
}

/// Input for an archive step (creating static library).
#[derive(Debug, Clone)]
pub struct ArchiveInput {
    /// Object files to archive
    pub objects: Vec<PathBuf>,
    /// Output archive file
    pub output: PathBuf,
}

/// Input for a link step.
#[derive(Debug, Clone, Default)]
pub struct LinkInput {
    /// Object files to link
    pub objects: Vec<PathBuf>,
    /// Output file (executable or shared library)
    pub output: PathBuf,
    /// Library search paths
    pub lib_dirs: Vec<PathBuf>,
    /// Libraries to link (without -l prefix)
    pub libs: Vec<String>,
    /// System libraries, linked after `libs`
    pub sys_libs: Vec<String>,
    /// Additional linker flags
    pub ldflags: Vec<String>,
    /// Linker subsystem (console, gui)
    pub subsystem: String,
}

/// Trait for toolchain implementations.
///
/// Each toolchain knows how to generate commands for its specific compiler.
pub trait Toolchain: Send + Sync {
    /// Short name used in log messages.
    fn name(&self) -> &'static str;

    /// Compiler for a source language.
    fn compiler_path(&self, lang: Language) -> &Path;

    /// Generate a compile command.
    fn compile_command(&self, input: &CompileInput, lang: Language, flags: &BuildFlags)
        -> CommandSpec;

    /// Generate an archive command (create static library).
    fn archive_command(&self, input: &ArchiveInput) -> CommandSpec;

    /// Generate a link command for a shared library.
    fn link_shared_command(&self, input: &LinkInput, driver: Language, flags: &BuildFlags)
        -> CommandSpec;

    /// Generate a link command for an executable.
    fn link_exe_command(&self, input: &LinkInput, driver: Language, flags: &BuildFlags)
        -> CommandSpec;

    /// Runtime libraries for the requested language linkage.
    fn runtime_libs(&self, linkage: &LanguageLinkage) -> Vec<String>;

    /// Get the object file extension.
    fn object_extension(&self) -> &str;
}

/// The toolchain for an AOL's linker.
pub fn toolchain_for(aol: &Aol) -> Box<dyn Toolchain> {
    match aol.linker() {
        "msvc" => Box::new(MsvcToolchain::default()),
        linker => Box::new(GccToolchain::for_linker(linker)),
    }
}
