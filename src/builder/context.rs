//! Build context - module, target and layout configuration.
//!
//! A [`BuildContext`] is constructed once per invocation. Construction
//! validates the layout, loads the module's metadata and resolves the
//! dependency graph. Afterwards only the module's own metadata changes, as
//! steps record what they produced.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::builder::task::BuildMode;
use crate::builder::toolchain::{toolchain_for, Toolchain};
use crate::core::aol::{Aol, Os};
use crate::core::artifact::Coordinates;
use crate::core::errors::NarError;
use crate::core::library::{Binding, Library};
use crate::core::manifest::{Language, Manifest, Runtime, DEFAULT_LAYOUT};
use crate::core::nar_info::{keys, NarInfo};
use crate::layout::{LayoutKind, NarLayout};
use crate::resolver::{DependencyResolver, NarManager, RepositoryResolver};
use crate::util::config::ToolsConfig;
use crate::util::context::GlobalContext;
use crate::util::fs::glob_files;

/// Command line overrides for a build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Force the release configuration.
    pub release: bool,
    pub aol: Option<String>,
    pub layout: Option<String>,
}

/// Immutable configuration of one module build.
#[derive(Clone)]
pub struct BuildContext {
    manifest: Manifest,
    aol: Aol,
    layout: NarLayout,
    debug: bool,
    target_dir: PathBuf,
    repository: PathBuf,
    tools: ToolsConfig,
    toolchain: Arc<dyn Toolchain>,
    info: NarInfo,
    dependencies: NarManager,
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("module", &self.manifest.coordinates())
            .field("aol", &self.aol)
            .field("layout", &self.layout)
            .field("toolchain", &self.toolchain.name())
            .field("target_dir", &self.target_dir)
            .field("repository", &self.repository)
            .field("dependencies", &self.dependencies.len())
            .finish()
    }
}

impl BuildContext {
    /// Create a build context, resolving dependencies from the local
    /// repository.
    pub fn new(gctx: &GlobalContext, manifest: Manifest, options: &BuildOptions) -> Result<Self> {
        let resolver = RepositoryResolver::new(gctx.repository_dir());
        Self::with_resolver(gctx, manifest, options, &resolver)
    }

    /// Create a build context with an explicit dependency resolver.
    pub fn with_resolver(
        gctx: &GlobalContext,
        manifest: Manifest,
        options: &BuildOptions,
        resolver: &dyn DependencyResolver,
    ) -> Result<Self> {
        let config = gctx.config();

        let layout_name = options
            .layout
            .clone()
            .or_else(|| manifest.nar.layout.clone())
            .or_else(|| config.build.layout.clone())
            .unwrap_or_else(|| DEFAULT_LAYOUT.to_string());
        let debug = !options.release && (manifest.nar.debug || config.build.debug.unwrap_or(false));
        let layout = NarLayout::from_name(&layout_name, debug)?;

        let aol = if let Some(ref token) = options.aol {
            Aol::parse(token)?
        } else if let Some(ref aol) = manifest.nar.aol {
            aol.clone()
        } else if let Some(ref token) = config.build.aol {
            Aol::parse(token)?
        } else {
            let os = Os::host().unwrap_or(Os::Linux);
            Aol::host(&manifest.nar.linker.name_for(os))?
        };

        let target_dir = manifest.manifest_dir.join("target");
        let manifest_coordinates = manifest.coordinates();
        let toolchain: Arc<dyn Toolchain> = Arc::from(toolchain_for(&aol));

        let mut ctx = BuildContext {
            manifest,
            aol,
            layout,
            debug,
            target_dir,
            repository: gctx.repository_dir(),
            tools: config.tools.clone(),
            toolchain,
            info: NarInfo::new(manifest_coordinates),
            dependencies: NarManager::default(),
        };
        ctx.info = ctx.load_info()?;

        tracing::debug!("building {} for {} with {}", ctx.coordinates(), ctx.aol, ctx.layout);

        let coordinates = ctx.coordinates();
        ctx.dependencies = NarManager::resolve(
            resolver,
            &coordinates,
            &ctx.manifest.dependencies,
            &ctx.layout,
        )
        .with_context(|| format!("failed to resolve dependencies of `{}`", coordinates))?;

        Ok(ctx)
    }

    /// Load the module's own metadata and fill in this build's entries.
    ///
    /// `target/classes` wins over `src/main/resources`. A layout recorded in
    /// the persisted copy must match the configured one.
    fn load_info(&self) -> Result<NarInfo> {
        let coordinates = self.coordinates();
        let persisted = self.metadata_path();
        let mut info = NarInfo::new(coordinates.clone());

        if persisted.is_file() {
            info.read_from_file(&persisted)?;
            if let Some(found) = info.layout_name() {
                let kind = LayoutKind::from_name(found)?;
                if kind != self.layout.kind() {
                    return Err(NarError::UnsupportedLayout {
                        module: coordinates.to_string(),
                        configured: self.layout.name().to_string(),
                        found: found.to_string(),
                    }
                    .into());
                }
            }
        } else {
            let resources = self.layout.metadata_file_path(
                &self.resources_dir(),
                &coordinates.group_id,
                &coordinates.artifact_id,
            );
            if resources.is_file() {
                info.read_from_file(&resources)?;
            }
        }

        self.layout.record(&mut info);
        info.set_property(None, keys::DEFAULT_AOL, self.aol.to_string());

        let output = info.output(&self.aol, &self.manifest.output());
        info.add_library(&self.aol, &output);

        let has_pch = self.libraries().iter().any(|l| l.binding == Binding::Pch);
        let mut pch_names = BTreeSet::new();
        if has_pch {
            for source in self.sources(Language::Cpp, BuildMode::Main)? {
                if let Some(stem) = source.file_stem() {
                    pch_names.insert(stem.to_string_lossy().into_owned());
                }
            }
        }
        info.set_pch_names(&self.aol, &pch_names);
        info.set_target_winrt(&self.aol, self.manifest.nar.linker.is_target_winrt());

        let sys_libs = self.manifest.nar.linker.sys_libs.join(" ");
        if !sys_libs.is_empty() && info.sys_libs(&self.aol).is_empty() {
            info.set_property(Some(&self.aol), keys::SYS_LIBS, sys_libs);
        }

        Ok(info)
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn coordinates(&self) -> Coordinates {
        self.manifest.coordinates()
    }

    pub fn artifact_id(&self) -> &str {
        &self.manifest.package.name
    }

    pub fn version(&self) -> &str {
        &self.manifest.package.version
    }

    pub fn aol(&self) -> &Aol {
        &self.aol
    }

    pub fn layout(&self) -> &NarLayout {
        &self.layout
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn toolchain(&self) -> Arc<dyn Toolchain> {
        Arc::clone(&self.toolchain)
    }

    pub fn tools(&self) -> &ToolsConfig {
        &self.tools
    }

    pub fn repository(&self) -> &Path {
        &self.repository
    }

    /// The module's metadata as initialized for this build.
    pub fn info(&self) -> &NarInfo {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut NarInfo {
        &mut self.info
    }

    /// Write the module's metadata to [`BuildContext::metadata_path`].
    pub fn persist_info(&self) -> Result<()> {
        self.info
            .write_to_file(&self.metadata_path())
            .with_context(|| format!("failed to persist metadata of {}", self.coordinates()))
    }

    pub fn dependencies(&self) -> &NarManager {
        &self.dependencies
    }

    pub fn libraries(&self) -> Vec<Library> {
        self.manifest.libraries()
    }

    /// `target/` next to the manifest.
    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// Where this mode's outputs are laid out.
    pub fn output_dir(&self, mode: BuildMode) -> PathBuf {
        self.target_dir.join(mode.output_dir_name())
    }

    /// Where dependency NARs are unpacked for this mode.
    pub fn unpack_dir(&self, mode: BuildMode) -> PathBuf {
        self.target_dir.join(mode.output_dir_name())
    }

    /// Object directory for this mode and AOL.
    pub fn object_dir(&self, mode: BuildMode) -> PathBuf {
        self.output_dir(mode)
            .join(mode.object_dir_name())
            .join(self.aol.to_string())
    }

    pub fn classes_dir(&self) -> PathBuf {
        self.target_dir.join("classes")
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.manifest.manifest_dir.join("src/main/resources")
    }

    /// `target/classes/META-INF/nar/{group}/{artifact}/nar.properties`.
    pub fn metadata_path(&self) -> PathBuf {
        let coordinates = self.coordinates();
        self.layout.metadata_file_path(
            &self.classes_dir(),
            &coordinates.group_id,
            &coordinates.artifact_id,
        )
    }

    /// Output name for this AOL.
    pub fn output(&self) -> String {
        self.info.output(&self.aol, &self.manifest.output())
    }

    pub fn max_cores(&self) -> usize {
        self.info
            .usize_property(Some(&self.aol), keys::MAX_CORES, self.manifest.nar.max_cores)
    }

    pub fn fail_on_error(&self) -> bool {
        self.info
            .bool_property(Some(&self.aol), keys::FAIL_ON_ERROR, self.manifest.nar.fail_on_error)
    }

    pub fn libtool(&self) -> bool {
        self.info
            .bool_property(Some(&self.aol), keys::LIBTOOL, self.manifest.nar.libtool)
    }

    pub fn runtime(&self) -> Runtime {
        let value = self.info.property(
            Some(&self.aol),
            keys::RUNTIME,
            self.manifest.nar.runtime.as_str(),
        );
        if value.trim() == Runtime::Static.as_str() {
            Runtime::Static
        } else {
            Runtime::Dynamic
        }
    }

    /// Java home used for JNI include paths.
    pub fn java_home(&self) -> Option<PathBuf> {
        let configured = self
            .manifest
            .nar
            .java_home
            .clone()
            .or_else(|| std::env::var_os("JAVA_HOME").map(PathBuf::from));
        let default = configured
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let value = self.info.property(Some(&self.aol), keys::JAVA_HOME, &default);
        if value.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(value.trim()))
        }
    }

    /// Source files of `lang` for `mode`, sorted.
    pub fn sources(&self, lang: Language, mode: BuildMode) -> Result<Vec<PathBuf>> {
        let compiler = self.manifest.nar.compiler(lang);
        let dirs = match mode {
            BuildMode::Main => compiler.source_directories(lang),
            BuildMode::Test => compiler.test_source_directories(lang),
        };
        let includes = compiler.includes(lang);

        let mut files = Vec::new();
        for dir in dirs {
            let dir = self.manifest.resolve_path(&dir);
            if !dir.is_dir() {
                continue;
            }
            files.extend(glob_files(&dir, &includes)?);
        }
        files.sort();
        files.dedup();
        Ok(files)
    }
}
