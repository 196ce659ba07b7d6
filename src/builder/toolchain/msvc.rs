//! MSVC toolchain implementation.

use std::path::{Path, PathBuf};

use crate::core::manifest::{Language, Runtime};

use super::{
    ArchiveInput, BuildFlags, CommandSpec, CompileInput, LanguageLinkage, LinkInput, Toolchain,
};

/// MSVC toolchain (Windows).
#[derive(Debug, Clone)]
pub struct MsvcToolchain {
    /// Path to cl.exe (compiler)
    pub cl: PathBuf,
    /// Path to ifort.exe (Fortran compiler)
    pub ifort: PathBuf,
    /// Path to lib.exe (librarian)
    pub lib: PathBuf,
    /// Path to link.exe (linker)
    pub link: PathBuf,
}

impl Default for MsvcToolchain {
    fn default() -> Self {
        MsvcToolchain {
            cl: PathBuf::from("cl.exe"),
            ifort: PathBuf::from("ifort.exe"),
            lib: PathBuf::from("lib.exe"),
            link: PathBuf::from("link.exe"),
        }
    }
}

impl MsvcToolchain {
    fn runtime_flag(flags: &BuildFlags) -> &'static str {
        match (flags.runtime, flags.debug) {
            (Runtime::Dynamic, false) => "/MD",
            (Runtime::Dynamic, true) => "/MDd",
            (Runtime::Static, false) => "/MT",
            (Runtime::Static, true) => "/MTd",
        }
    }

    fn link_command(&self, input: &LinkInput, flags: &BuildFlags, dll: bool) -> CommandSpec {
        // MSVC uses link.exe for both C and C++ linking
        let mut cmd = CommandSpec::new(&self.link);

        cmd = cmd.arg("/nologo");
        if dll {
            cmd = cmd.arg("/DLL");
        }
        if flags.debug {
            cmd = cmd.arg("/DEBUG");
        }
        if flags.runtime == Runtime::Dynamic {
            cmd = cmd.arg("/MANIFEST");
        }
        match input.subsystem.as_str() {
            "gui" => cmd = cmd.arg("/SUBSYSTEM:WINDOWS"),
            "console" => cmd = cmd.arg("/SUBSYSTEM:CONSOLE"),
            _ => {}
        }
        cmd = cmd.arg(format!("/OUT:{}", input.output.display()));

        // Object files
        for obj in &input.objects {
            cmd = cmd.arg(obj.display().to_string());
        }

        // Library search paths
        for dir in &input.lib_dirs {
            cmd = cmd.arg(format!("/LIBPATH:{}", dir.display()));
        }

        // Libraries
        for lib in input.libs.iter().chain(&input.sys_libs) {
            cmd = cmd.arg(format!("{}.lib", lib));
        }

        // Custom flags
        cmd.args(input.ldflags.iter().cloned())
    }
}

impl Toolchain for MsvcToolchain {
    fn name(&self) -> &'static str {
        "msvc"
    }

    fn compiler_path(&self, lang: Language) -> &Path {
        match lang {
            Language::C | Language::Cpp => &self.cl,
            Language::Fortran => &self.ifort,
        }
    }

    fn compile_command(&self, input: &CompileInput, lang: Language, flags: &BuildFlags) -> CommandSpec {
        let mut cmd = CommandSpec::new(self.compiler_path(lang));

        // Quiet logo, compile only
        cmd = cmd.arg("/nologo");
        cmd = cmd.arg("/c");

        match lang {
            Language::Cpp => {
                cmd = cmd.arg("/TP");
                cmd = cmd.arg("/EHsc");
            }
            Language::C => cmd = cmd.arg("/TC"),
            Language::Fortran => {}
        }
        cmd = cmd.arg(Self::runtime_flag(flags));
        cmd = cmd.arg(if flags.debug { "/Zi" } else { "/O2" });

        // Include directories
        for dir in &input.include_dirs {
            cmd = cmd.arg(format!("/I{}", dir.display()));
        }

        // Defines
        for (name, value) in &input.defines {
            match value {
                Some(v) => cmd = cmd.arg(format!("/D{}={}", name, v)),
                None => cmd = cmd.arg(format!("/D{}", name)),
            }
        }

        // Custom flags
        cmd = cmd.args(input.cflags.iter().cloned());

        // Input
        cmd = cmd.arg(input.source.display().to_string());

        // Output
        cmd.arg(format!("/Fo{}", input.output.display()))
    }

    fn archive_command(&self, input: &ArchiveInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.lib);

        cmd = cmd.arg("/nologo");
        cmd = cmd.arg(format!("/OUT:{}", input.output.display()));

        for obj in &input.objects {
            cmd = cmd.arg(obj.display().to_string());
        }

        cmd
    }

    fn link_shared_command(&self, input: &LinkInput, _driver: Language, flags: &BuildFlags) -> CommandSpec {
        self.link_command(input, flags, true)
    }

    fn link_exe_command(&self, input: &LinkInput, _driver: Language, flags: &BuildFlags) -> CommandSpec {
        self.link_command(input, flags, false)
    }

    fn runtime_libs(&self, _linkage: &LanguageLinkage) -> Vec<String> {
        // cl.exe selects runtimes through /MD and /MT
        Vec::new()
    }

    fn object_extension(&self) -> &str {
        "obj"
    }
}
