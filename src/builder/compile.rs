//! Compile orchestration.
//!
//! Turns the build context into one [`CompileTask`] per declared library,
//! hands each to a [`CompileEngine`] and then performs the follow-up steps:
//! manifest embedding on Windows, header export and metadata persistence.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::builder::context::BuildContext;
use crate::builder::engine::{CompileEngine, TaskOutcome};
use crate::builder::task::{parse_define, BuildMode, CompileTask, LibSet, SourceSet};
use crate::builder::toolchain::{BuildFlags, LanguageLinkage};
use crate::core::aol::Os;
use crate::core::errors::NarError;
use crate::core::library::{Binding, Library};
use crate::core::manifest::{Language, Runtime};
use crate::resolver::{order_dependencies, Exclusions, NarArtifact};
use crate::util::fs::{copy_dir_all, ensure_dir, files_with_suffix};
use crate::util::process::{find_executable, ProcessBuilder};

/// Result of a compile run.
#[derive(Debug, Clone, Default)]
pub struct CompileReport {
    pub source_count: usize,
    /// One entry per library that was built.
    pub libraries: Vec<(Library, TaskOutcome)>,
    pub headers: Vec<PathBuf>,
}

impl CompileReport {
    /// Linked outputs of every library that produced one.
    pub fn outputs(&self) -> Vec<&Path> {
        self.libraries
            .iter()
            .filter_map(|(_, outcome)| outcome.output.as_deref())
            .collect()
    }
}

/// Configures and runs compile tasks for one module.
pub struct CompileOrchestrator<'a> {
    ctx: &'a BuildContext,
    engine: &'a dyn CompileEngine,
    mode: BuildMode,
}

impl<'a> CompileOrchestrator<'a> {
    pub fn new(ctx: &'a BuildContext, engine: &'a dyn CompileEngine, mode: BuildMode) -> Self {
        CompileOrchestrator { ctx, engine, mode }
    }

    pub fn run(&self) -> Result<CompileReport> {
        let dest = self.ctx.output_dir(self.mode);
        ensure_dir(&dest)?;

        let source_sets = self.source_sets()?;
        let source_count: usize = source_sets.iter().map(|s| s.files.len()).sum();
        self.log_sources(source_count);

        let mut report = CompileReport {
            source_count,
            ..CompileReport::default()
        };

        if source_count > 0 {
            for library in self.ctx.libraries() {
                let task = self.configure(&library, &source_sets)?;
                let outcome = self.engine.execute(&task)?;
                if outcome.succeeded {
                    if let Some(ref output) = outcome.output {
                        self.embed_manifest(library.binding, output)?;
                    }
                }
                report.libraries.push((library, outcome));
            }
        }

        if self.mode == BuildMode::Main {
            let exports_headers = self
                .ctx
                .libraries()
                .iter()
                .any(|l| l.binding != Binding::Pch);
            if exports_headers {
                report.headers = self.copy_headers(&dest)?;
            }

            self.ctx.persist_info()?;
        }

        Ok(report)
    }

    fn log_sources(&self, count: usize) {
        match (self.mode, count) {
            (BuildMode::Main, 0) => tracing::info!("Nothing to compile"),
            (BuildMode::Main, n) => tracing::info!("Compiling {} native files", n),
            (BuildMode::Test, 0) => tracing::info!("Nothing to link"),
            (BuildMode::Test, n) => tracing::info!("Preparing to link {} files", n),
        }
    }

    /// Sources per language with the module's own compiler settings.
    fn source_sets(&self) -> Result<Vec<SourceSet>> {
        let manifest = self.ctx.manifest();
        let mut sets = Vec::new();
        for language in Language::ALL {
            let files = self.ctx.sources(language, self.mode)?;
            if files.is_empty() {
                continue;
            }
            let compiler = manifest.nar.compiler(language);
            let include_dirs = compiler
                .include_paths()
                .iter()
                .map(|p| manifest.resolve_path(p))
                .filter(|p| p.is_dir())
                .collect();
            sets.push(SourceSet {
                language,
                files,
                include_dirs,
                defines: compiler.defines.iter().map(|d| parse_define(d)).collect(),
                options: compiler.options.clone(),
            });
        }
        Ok(sets)
    }

    /// Build the task for one library.
    pub fn configure(&self, library: &Library, sources: &[SourceSet]) -> Result<CompileTask> {
        let ctx = self.ctx;
        let aol = ctx.aol();
        let binding = library.binding;
        let dest = ctx.output_dir(self.mode);
        let (artifact_id, version) = (ctx.artifact_id(), ctx.version());

        let out_dir = if binding == Binding::Executable {
            ctx.layout().bin_directory(&dest, artifact_id, version, aol)
        } else {
            ctx.layout()
                .lib_directory(&dest, artifact_id, version, aol, binding)
        };
        ensure_dir(&out_dir)?;

        let out_file = match binding {
            Binding::Executable => binding
                .output_filename(artifact_id, aol.os())
                .map(|f| out_dir.join(f)),
            _ => binding
                .output_filename(&ctx.output(), aol.os())
                .map(|f| out_dir.join(f)),
        };
        let obj_dir = if binding == Binding::Pch {
            out_dir.clone()
        } else {
            ctx.object_dir(self.mode)
        };

        let linkage = match self.mode {
            BuildMode::Main => LanguageLinkage {
                cpp: library.link_cpp,
                fortran: library.link_fortran,
                fortran_main: library.link_fortran_main,
            },
            BuildMode::Test => LanguageLinkage::default(),
        };
        let flags = BuildFlags {
            debug: ctx.is_debug(),
            runtime: ctx.runtime(),
            pic: binding != Binding::Executable && !aol.os().is_windows(),
        };

        let mut task = CompileTask {
            aol: aol.clone(),
            binding,
            subsystem: library.subsystem.clone(),
            out_file,
            obj_dir,
            sources: sources.to_vec(),
            dependency_includes: Vec::new(),
            injected_options: Vec::new(),
            lib_sets: Vec::new(),
            sys_libs: Vec::new(),
            linker_options: Vec::new(),
            extra_objects: Vec::new(),
            flags,
            linkage,
            max_cores: ctx.max_cores(),
            fail_on_error: ctx.fail_on_error(),
            libtool: ctx.libtool(),
        };

        let scope = self.mode.scope();
        let all = ctx.dependencies().dependencies(scope);
        let exclusions = Exclusions::new(ctx.manifest().nar.exclude_dependencies(scope));
        exclusions.warn_unmatched(&all);
        let deps: Vec<&NarArtifact> = all
            .into_iter()
            .filter(|d| !exclusions.is_excluded(d))
            .collect();

        if self.mode == BuildMode::Main {
            task.injected_options.extend(self.winrt_options(&deps)?);
            task.injected_options.extend(self.pch_options(&deps)?);
            if binding == Binding::Jni {
                task.dependency_includes.extend(self.java_includes());
            }
        }

        task.dependency_includes.extend(self.dependency_includes(&deps)?);

        let linker = &ctx.manifest().nar.linker;
        task.linker_options.extend(linker.options.iter().cloned());
        task.sys_libs.extend(linker.libs.iter().cloned());
        task.sys_libs.extend(linker.sys_libs.iter().cloned());

        if binding.links_dependencies() {
            self.add_dependency_libraries(&mut task, deps)?;
        }

        if self.mode == BuildMode::Test {
            let main_objects = ctx.object_dir(BuildMode::Main);
            if main_objects.is_dir() {
                let suffix = format!(".{}", self.engine.object_extension());
                task.extra_objects
                    .extend(files_with_suffix(&main_objects, &suffix)?);
            }
        }

        Ok(task)
    }

    fn dependency_includes(&self, deps: &[&NarArtifact]) -> Result<Vec<PathBuf>> {
        let aol = self.ctx.aol();
        let unpack_dir = self.ctx.unpack_dir(self.mode);
        let mut includes = Vec::new();
        for dep in deps {
            let binding = dep.binding(aol, Binding::Static)?;
            if !binding.exports_headers() {
                continue;
            }
            let include = dep
                .layout()
                .include_directory(&unpack_dir, dep.artifact_id(), dep.version());
            tracing::debug!("Looking for include directory: {}", include.display());
            if !include.is_dir() {
                return Err(NarError::MissingIncludePath {
                    artifact: dep.coordinates().to_string(),
                    path: include,
                }
                .into());
            }
            includes.push(include);
        }
        Ok(includes)
    }

    fn add_dependency_libraries(&self, task: &mut CompileTask, deps: Vec<&NarArtifact>) -> Result<()> {
        let aol = self.ctx.aol();
        let unpack_dir = self.ctx.unpack_dir(self.mode);
        let order = &self.ctx.manifest().nar.dependency_lib_order;

        for dep in order_dependencies(deps, order, |d| d.key()) {
            let binding = dep.binding(aol, Binding::None)?;
            if !binding.is_linkable() {
                continue;
            }
            let dep_aol = dep.library_aol(aol);
            let dir = dep.layout().lib_directory(
                &unpack_dir,
                dep.artifact_id(),
                dep.version(),
                &dep_aol,
                binding,
            );
            tracing::debug!("Looking for library directory: {}", dir.display());

            let libs: Vec<String> = dep
                .info()
                .libs(&dep_aol)
                .split_whitespace()
                .map(str::to_string)
                .collect();
            if dir.is_dir() {
                if !libs.is_empty() && binding != Binding::Pch {
                    task.lib_sets.push(LibSet {
                        dir: dir.clone(),
                        libs,
                    });
                }
            } else if dep.has_nar(&dep_aol, binding.as_str()) {
                return Err(NarError::MissingLibraryPath {
                    artifact: dep.coordinates().to_string(),
                    aol: dep_aol.to_string(),
                    path: dir,
                }
                .into());
            } else {
                tracing::debug!("Library directory {} does NOT exist", dir.display());
            }

            task.linker_options
                .extend(dep.info().options(&dep_aol).split_whitespace().map(str::to_string));
            task.sys_libs.extend(
                dep.info()
                    .sys_libs(&dep_aol)
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            );

            if binding == Binding::Pch && dir.is_dir() {
                let suffix = format!(".{}", self.engine.object_extension());
                task.extra_objects.extend(files_with_suffix(&dir, &suffix)?);
            }
        }
        Ok(())
    }

    /// `/FU` references to the Windows metadata of WinRT dependencies.
    fn winrt_options(&self, deps: &[&NarArtifact]) -> Result<Vec<String>> {
        let aol = self.ctx.aol();
        let unpack_dir = self.ctx.unpack_dir(self.mode);
        let mut options = Vec::new();
        for dep in deps {
            if !dep.info().is_target_winrt(aol) || dep.binding(aol, Binding::Static)? != Binding::Shared {
                continue;
            }
            let dir = dep.layout().lib_directory(
                &unpack_dir,
                dep.artifact_id(),
                dep.version(),
                &dep.library_aol(aol),
                Binding::Shared,
            );
            tracing::debug!("Looking for WinRT metadata in {}", dir.display());
            for winmd in files_with_suffix(&dir, ".winmd")? {
                options.push(format!("/FU{}", winmd.display()));
            }
        }
        Ok(options)
    }

    /// `/Yu`, `/FI` and `/Fd` options for precompiled header dependencies.
    fn pch_options(&self, deps: &[&NarArtifact]) -> Result<Vec<String>> {
        let aol = self.ctx.aol();
        let unpack_dir = self.ctx.unpack_dir(self.mode);
        let mut options = Vec::new();
        for dep in deps {
            if dep.binding(aol, Binding::Static)? != Binding::Pch {
                continue;
            }
            let dir = dep.layout().lib_directory(
                &unpack_dir,
                dep.artifact_id(),
                dep.version(),
                &dep.library_aol(aol),
                Binding::Pch,
            );
            for pch in files_with_suffix(&dir, ".pch")? {
                let Some(name) = pch.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                    continue;
                };
                let header = format!("{}.h", name);
                options.push(format!("/Yu{}", header));
                options.push(format!("/FI{}", header));
                options.push(format!("/Fp{}", pch.display()));
                let pdb = dir.join(format!("{}.pdb", name));
                if self.ctx.is_debug() && pdb.is_file() {
                    options.push(format!("/Fd{}", pdb.display()));
                }
            }
        }
        Ok(options)
    }

    /// `{java.home}/include` and its platform subdirectory.
    fn java_includes(&self) -> Vec<PathBuf> {
        let Some(java_home) = self.ctx.java_home() else {
            tracing::warn!("no Java home configured, JNI headers will not be found");
            return Vec::new();
        };
        let include = java_home.join("include");
        let platform = match self.ctx.aol().os() {
            Os::Windows => "win32",
            Os::MacOsX => "darwin",
            Os::Linux => "linux",
            other => other.as_str(),
        };
        vec![include.join(platform.to_lowercase()), include]
    }

    /// Embed the linker generated manifest into a dynamically linked
    /// Windows output.
    fn embed_manifest(&self, binding: Binding, output: &Path) -> Result<()> {
        let ctx = self.ctx;
        if ctx.runtime() != Runtime::Dynamic
            || !ctx.aol().os().is_windows()
            || ctx.toolchain().name() != "msvc"
        {
            return Ok(());
        }
        let resource = match binding {
            Binding::Executable => "#1",
            Binding::Shared | Binding::Jni | Binding::Plugin => "#2",
            _ => return Ok(()),
        };
        let manifest = PathBuf::from(format!("{}.manifest", output.display()));
        if !manifest.is_file() {
            tracing::debug!("no manifest generated for {}", output.display());
            return Ok(());
        }

        let mt = ctx
            .tools()
            .mt
            .clone()
            .or_else(|| find_executable("mt.exe"))
            .unwrap_or_else(|| PathBuf::from("mt.exe"));
        tracing::debug!("Embedding {} into {}", manifest.display(), output.display());
        ProcessBuilder::new(mt)
            .arg("/manifest")
            .arg(&manifest)
            .arg(format!("/outputresource:{};{}", output.display(), resource))
            .exec_and_check("embedding manifest")?;
        Ok(())
    }

    /// Copy the module's public headers into its include directory.
    fn copy_headers(&self, dest: &Path) -> Result<Vec<PathBuf>> {
        let manifest = self.ctx.manifest();
        let include_dir = self.ctx.layout().include_directory(
            dest,
            self.ctx.artifact_id(),
            self.ctx.version(),
        );

        let mut sources: Vec<PathBuf> = Vec::new();
        for language in Language::ALL {
            for path in manifest.nar.compiler(language).include_paths() {
                let path = manifest.resolve_path(&path);
                if path.is_dir() && !sources.contains(&path) {
                    sources.push(path);
                }
            }
        }

        let mut copied = Vec::new();
        for source in sources {
            tracing::debug!("Copying headers from {} to {}", source.display(), include_dir.display());
            copied.extend(copy_dir_all(&source, &include_dir)?);
        }
        Ok(copied)
    }
}
