//! GCC-style toolchain implementation (gcc, clang, icc and friends).

use std::path::{Path, PathBuf};

use crate::core::manifest::{Language, Runtime};

use super::{
    ArchiveInput, BuildFlags, CommandSpec, CompileInput, LanguageLinkage, LinkInput, Toolchain,
};

/// GCC-style driver toolchain.
#[derive(Debug, Clone)]
pub struct GccToolchain {
    name: &'static str,
    /// Path to the C compiler
    pub cc: PathBuf,
    /// Path to the C++ compiler
    pub cxx: PathBuf,
    /// Path to the Fortran compiler
    pub fc: PathBuf,
    /// Path to the archiver
    pub ar: PathBuf,
}

impl GccToolchain {
    /// Toolchain for an AOL linker name.
    pub fn for_linker(linker: &str) -> Self {
        let (name, cc, cxx, fc) = match linker {
            "gcc" | "g++" => ("gcc", "gcc", "g++", "gfortran"),
            "clang" | "clang++" => ("clang", "clang", "clang++", "gfortran"),
            "icc" | "icpc" => ("intel", "icc", "icpc", "ifort"),
            "CC" => ("sun", "cc", "CC", "f95"),
            "xlC" => ("xl", "xlc", "xlC", "xlf"),
            other => ("cc", "cc", other, "gfortran"),
        };
        GccToolchain {
            name,
            cc: PathBuf::from(cc),
            cxx: PathBuf::from(cxx),
            fc: PathBuf::from(fc),
            ar: PathBuf::from("ar"),
        }
    }

    fn link_command(
        &self,
        input: &LinkInput,
        driver: Language,
        flags: &BuildFlags,
        shared: bool,
    ) -> CommandSpec {
        let mut cmd = CommandSpec::new(self.compiler_path(driver));

        if shared {
            cmd = cmd.arg("-shared");
        }
        if flags.debug {
            cmd = cmd.arg("-g");
        }
        if flags.runtime == Runtime::Static {
            cmd = cmd.arg("-static-libgcc");
            if driver == Language::Cpp {
                cmd = cmd.arg("-static-libstdc++");
            }
        }
        if input.subsystem == "gui" {
            cmd = cmd.arg("-mwindows");
        }

        // Output
        cmd = cmd.arg("-o");
        cmd = cmd.arg(input.output.display().to_string());

        // Object files
        for obj in &input.objects {
            cmd = cmd.arg(obj.display().to_string());
        }

        // Library search paths
        for dir in &input.lib_dirs {
            cmd = cmd.arg(format!("-L{}", dir.display()));
        }

        // Libraries
        for lib in input.libs.iter().chain(&input.sys_libs) {
            cmd = cmd.arg(format!("-l{}", lib));
        }

        // Custom flags
        cmd.args(input.ldflags.iter().cloned())
    }
}

impl Toolchain for GccToolchain {
    fn name(&self) -> &'static str {
        self.name
    }

    fn compiler_path(&self, lang: Language) -> &Path {
        match lang {
            Language::C => &self.cc,
            Language::Cpp => &self.cxx,
            Language::Fortran => &self.fc,
        }
    }

    fn compile_command(&self, input: &CompileInput, lang: Language, flags: &BuildFlags) -> CommandSpec {
        let mut cmd = CommandSpec::new(self.compiler_path(lang));

        // Compile only
        cmd = cmd.arg("-c");
        cmd = cmd.arg(if flags.debug { "-g" } else { "-O2" });
        if flags.pic {
            cmd = cmd.arg("-fPIC");
        }

        // Include directories
        for dir in &input.include_dirs {
            cmd = cmd.arg(format!("-I{}", dir.display()));
        }

        // Defines
        for (name, value) in &input.defines {
            match value {
                Some(v) => cmd = cmd.arg(format!("-D{}={}", name, v)),
                None => cmd = cmd.arg(format!("-D{}", name)),
            }
        }

        // Custom flags
        cmd = cmd.args(input.cflags.iter().cloned());

        // Input and output
        cmd = cmd.arg(input.source.display().to_string());
        cmd = cmd.arg("-o");
        cmd.arg(input.output.display().to_string())
    }

    fn archive_command(&self, input: &ArchiveInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.ar);

        // Create archive with symbol index, replace files
        cmd = cmd.arg("rcs");
        cmd = cmd.arg(input.output.display().to_string());

        for obj in &input.objects {
            cmd = cmd.arg(obj.display().to_string());
        }

        cmd
    }

    fn link_shared_command(&self, input: &LinkInput, driver: Language, flags: &BuildFlags) -> CommandSpec {
        self.link_command(input, driver, flags, true)
    }

    fn link_exe_command(&self, input: &LinkInput, driver: Language, flags: &BuildFlags) -> CommandSpec {
        self.link_command(input, driver, flags, false)
    }

    fn runtime_libs(&self, linkage: &LanguageLinkage) -> Vec<String> {
        let mut libs = Vec::new();
        if linkage.fortran_main {
            libs.push("gfortranbegin".to_string());
        }
        if linkage.fortran {
            libs.push("gfortran".to_string());
        }
        if linkage.cpp {
            libs.push("stdc++".to_string());
        }
        libs
    }

    fn object_extension(&self) -> &str {
        "o"
    }
}
