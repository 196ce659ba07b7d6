//! Compile engine - runs a configured [`CompileTask`].
//!
//! Sources compile in parallel on a pool sized by the task's core limit;
//! archiving and linking run afterwards on the calling thread.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::builder::task::{CompileTask, SourceSet};
use crate::builder::toolchain::{ArchiveInput, CommandSpec, CompileInput, LinkInput, Toolchain};
use crate::core::library::Binding;
use crate::core::manifest::Language;
use crate::util::fs::ensure_dir;
use crate::util::process::ProcessBuilder;

/// What a task produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskOutcome {
    pub objects: Vec<PathBuf>,
    /// Linked output, if the task links and succeeded.
    pub output: Option<PathBuf>,
    /// False when a failure was tolerated because `fail-on-error` is off.
    pub succeeded: bool,
}

/// Executes compile tasks.
pub trait CompileEngine: Send + Sync {
    fn execute(&self, task: &CompileTask) -> Result<TaskOutcome>;

    /// Object file extension of the underlying toolchain.
    fn object_extension(&self) -> &str;
}

/// Engine invoking the native toolchain.
pub struct NativeEngine {
    toolchain: Arc<dyn Toolchain>,
}

struct CompileJob<'a> {
    language: Language,
    source: &'a PathBuf,
    set: &'a SourceSet,
}

impl NativeEngine {
    pub fn new(toolchain: Arc<dyn Toolchain>) -> Self {
        NativeEngine { toolchain }
    }

    fn run(&self, task: &CompileTask) -> Result<TaskOutcome> {
        ensure_dir(&task.obj_dir)?;

        let jobs: Vec<CompileJob<'_>> = task
            .sources
            .iter()
            .flat_map(|set| {
                set.files.iter().map(move |source| CompileJob {
                    language: set.language,
                    source,
                    set,
                })
            })
            .collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(task.max_cores)
            .build()
            .context("failed to create compile thread pool")?;

        let results: Vec<Result<PathBuf>> =
            pool.install(|| jobs.par_iter().map(|job| self.compile(task, job)).collect());

        let mut objects = Vec::with_capacity(results.len());
        for result in results {
            objects.push(result?);
        }
        objects.extend(task.extra_objects.iter().cloned());

        let output = match task.out_file {
            Some(ref out) => {
                self.link(task, &objects, out)?;
                Some(out.clone())
            }
            None => None,
        };

        Ok(TaskOutcome {
            objects,
            output,
            succeeded: true,
        })
    }

    fn compile(&self, task: &CompileTask, job: &CompileJob<'_>) -> Result<PathBuf> {
        let output = task.object_path(job.source, self.toolchain.object_extension());

        let mut include_dirs = job.set.include_dirs.clone();
        include_dirs.extend(task.dependency_includes.iter().cloned());

        let mut cflags = job.set.options.clone();
        if job.language != Language::Fortran {
            cflags.extend(task.injected_options.iter().cloned());
        }

        let input = CompileInput {
            source: job.source.clone(),
            output: output.clone(),
            include_dirs,
            defines: job.set.defines.clone(),
            cflags,
        };

        let spec = self
            .toolchain
            .compile_command(&input, job.language, &task.flags);

        tracing::debug!(
            "Compiling {} -> {} ({})",
            job.source.display(),
            output.display(),
            job.language.as_str()
        );
        process_builder_from_spec(spec)
            .exec_and_check(&format!("compiling {}", job.source.display()))?;
        Ok(output)
    }

    fn link(&self, task: &CompileTask, objects: &[PathBuf], out: &PathBuf) -> Result<()> {
        if let Some(parent) = out.parent() {
            ensure_dir(parent)?;
        }

        let spec = if task.binding == Binding::Static {
            tracing::debug!("Creating static library {}", out.display());
            self.toolchain.archive_command(&ArchiveInput {
                objects: objects.to_vec(),
                output: out.clone(),
            })
        } else {
            let mut libs = Vec::new();
            let mut lib_dirs = Vec::new();
            for set in &task.lib_sets {
                lib_dirs.push(set.dir.clone());
                libs.extend(set.libs.iter().cloned());
            }
            libs.extend(self.toolchain.runtime_libs(&task.linkage));

            let input = LinkInput {
                objects: objects.to_vec(),
                output: out.clone(),
                lib_dirs,
                libs,
                sys_libs: task.sys_libs.clone(),
                ldflags: task.linker_options.clone(),
                subsystem: task.subsystem.clone(),
            };
            let driver = task.link_driver();
            tracing::debug!(
                "Linking {} {} (driver: {})",
                task.binding,
                out.display(),
                driver.as_str()
            );
            let spec = if task.binding == Binding::Executable {
                self.toolchain.link_exe_command(&input, driver, &task.flags)
            } else {
                self.toolchain.link_shared_command(&input, driver, &task.flags)
            };
            if task.libtool && self.toolchain.name() != "msvc" {
                through_libtool(spec)
            } else {
                spec
            }
        };

        process_builder_from_spec(spec).exec_and_check(&format!("linking {}", out.display()))?;
        Ok(())
    }
}

impl CompileEngine for NativeEngine {
    fn execute(&self, task: &CompileTask) -> Result<TaskOutcome> {
        match self.run(task) {
            Ok(outcome) => Ok(outcome),
            Err(e) if !task.fail_on_error => {
                tracing::warn!("{} build failed, continuing: {:#}", task.binding, e);
                Ok(TaskOutcome::default())
            }
            Err(e) => Err(e),
        }
    }

    fn object_extension(&self) -> &str {
        self.toolchain.object_extension()
    }
}

/// Run a link command through `libtool --mode=link`.
fn through_libtool(spec: CommandSpec) -> CommandSpec {
    let program = spec.program.display().to_string();
    let mut wrapped = CommandSpec::new("libtool")
        .arg("--mode=link")
        .arg(program)
        .args(spec.args);
    wrapped.env = spec.env;
    wrapped
}

fn process_builder_from_spec(spec: CommandSpec) -> ProcessBuilder {
    let mut cmd = ProcessBuilder::new(&spec.program);

    for arg in spec.args {
        cmd = cmd.arg(arg);
    }

    for (key, value) in spec.env {
        cmd = cmd.env(key, value);
    }

    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::toolchain::{BuildFlags, GccToolchain, LanguageLinkage};
    use crate::core::aol::Aol;
    use tempfile::TempDir;

    fn empty_task(obj_dir: PathBuf, fail_on_error: bool) -> CompileTask {
        CompileTask {
            aol: Aol::parse("x86_64-Linux-gcc").unwrap(),
            binding: Binding::Static,
            subsystem: "console".to_string(),
            out_file: None,
            obj_dir,
            sources: Vec::new(),
            dependency_includes: Vec::new(),
            injected_options: Vec::new(),
            lib_sets: Vec::new(),
            sys_libs: Vec::new(),
            linker_options: Vec::new(),
            extra_objects: Vec::new(),
            flags: BuildFlags::default(),
            linkage: LanguageLinkage::default(),
            max_cores: 2,
            fail_on_error,
            libtool: false,
        }
    }

    #[test]
    fn test_libtool_wrapping() {
        let spec = CommandSpec::new("gcc").arg("-shared").env("LANG", "C");
        let wrapped = through_libtool(spec);
        assert_eq!(wrapped.program, PathBuf::from("libtool"));
        assert_eq!(wrapped.args, vec!["--mode=link", "gcc", "-shared"]);
        assert_eq!(wrapped.env.len(), 1);
    }

    #[test]
    fn test_compile_only_task_without_sources() {
        let tmp = TempDir::new().unwrap();
        let obj_dir = tmp.path().join("obj");
        let engine = NativeEngine::new(Arc::new(GccToolchain::for_linker("gcc")));
        let outcome = engine.execute(&empty_task(obj_dir.clone(), true)).unwrap();
        assert!(outcome.succeeded);
        assert!(outcome.objects.is_empty());
        assert!(outcome.output.is_none());
        assert!(obj_dir.is_dir());
    }

    #[test]
    fn test_failure_tolerated_without_fail_on_error() {
        let tmp = TempDir::new().unwrap();
        let mut task = empty_task(tmp.path().join("obj"), false);
        task.sources.push(SourceSet {
            language: Language::C,
            files: vec![tmp.path().join("missing.c")],
            include_dirs: Vec::new(),
            defines: Vec::new(),
            options: Vec::new(),
        });
        let mut toolchain = GccToolchain::for_linker("gcc");
        toolchain.cc = PathBuf::from("nar-test-no-such-compiler");
        let engine = NativeEngine::new(Arc::new(toolchain));

        let outcome = engine.execute(&task).unwrap();
        assert!(!outcome.succeeded);

        task.fail_on_error = true;
        assert!(engine.execute(&task).is_err());
    }
}
