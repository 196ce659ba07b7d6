//! Artifact metadata store (`nar.properties`).
//!
//! A [`NarInfo`] holds per-module properties, optionally keyed by AOL.
//! Lookup order for every property is `{aol}.{name}`, then `{name}`, then the
//! caller's default. Values are kept as opaque strings; typed accessors only
//! interpret them on the way out, so a write/read cycle never loses anything.
//!
//! The store is written once by the module that owns it, during its own
//! build, and is read-only for every consumer after that.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::aol::Aol;
use crate::core::artifact::Coordinates;
use crate::core::errors::NarError;
use crate::core::library::Binding;
use crate::core::properties;
use crate::util::fs::write_string;

/// File name of the persisted store.
pub const NAR_PROPERTIES: &str = "nar.properties";

/// Well-known property names.
pub mod keys {
    pub const BINDING: &str = "libs.binding";
    pub const OUTPUT: &str = "output";
    pub const LIBS: &str = "libs.names";
    pub const SYS_LIBS: &str = "syslibs.names";
    pub const LINKER_OPTIONS: &str = "linker.options";
    pub const MAX_CORES: &str = "maxCores";
    pub const LIBTOOL: &str = "libtool";
    pub const FAIL_ON_ERROR: &str = "failOnError";
    pub const RUNTIME: &str = "runtime";
    pub const JAVA_HOME: &str = "javaHome";
    pub const PCH_NAMES: &str = "pch.names";
    pub const TARGET_WINRT: &str = "target.winrt";
    pub const LAYOUT: &str = "layout";
    pub const CONFIGURATION: &str = "configuration";
    pub const DEFAULT_AOL: &str = "aol";
    pub const NAR_PREFIX: &str = "nar.";
}

/// Placeholder for the consumer's AOL inside recorded archive classifiers.
pub const AOL_PLACEHOLDER: &str = "${aol}";

/// Metadata of one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarInfo {
    coordinates: Coordinates,
    properties: BTreeMap<String, String>,
}

impl NarInfo {
    /// Create an empty store.
    pub fn new(coordinates: Coordinates) -> Self {
        NarInfo {
            coordinates,
            properties: BTreeMap::new(),
        }
    }

    /// Load the store from `path`, or start empty if the file does not exist.
    pub fn load(coordinates: Coordinates, path: &Path) -> Result<Self> {
        let mut info = NarInfo::new(coordinates);
        if path.exists() {
            info.read_from_file(path)?;
        }
        Ok(info)
    }

    /// Merge properties from a persisted file into this store.
    ///
    /// A file that cannot be parsed is a [`NarError::MetadataCorrupt`].
    pub fn read_from_file(&mut self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read metadata file: {}", path.display()))?;
        let text = String::from_utf8(bytes).map_err(|e| NarError::MetadataCorrupt {
            path: path.to_path_buf(),
            line: 0,
            reason: format!("not valid UTF-8: {}", e),
        })?;
        let parsed = properties::parse(&text).map_err(|e| NarError::MetadataCorrupt {
            path: path.to_path_buf(),
            line: e.line,
            reason: e.reason,
        })?;
        tracing::debug!("read {} properties from {}", parsed.len(), path.display());
        self.properties.extend(parsed);
        Ok(())
    }

    /// Persist the store, creating parent directories as needed.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let comment = format!("NAR Properties for {}", self.coordinates);
        let text = properties::write(&self.properties, Some(&comment));
        write_string(path, &text)
    }

    pub fn coordinates(&self) -> &Coordinates {
        &self.coordinates
    }

    pub fn group_id(&self) -> &str {
        &self.coordinates.group_id
    }

    pub fn artifact_id(&self) -> &str {
        &self.coordinates.artifact_id
    }

    pub fn version(&self) -> &str {
        &self.coordinates.version
    }

    /// All raw properties, in key order.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Look up `name` for `aol`, falling back to the bare key, then `default`.
    pub fn property(&self, aol: Option<&Aol>, name: &str, default: &str) -> String {
        self.lookup(aol, name)
            .map(str::to_string)
            .unwrap_or_else(|| default.to_string())
    }

    fn lookup(&self, aol: Option<&Aol>, name: &str) -> Option<&str> {
        aol.and_then(|aol| self.properties.get(&aol_key(aol, name)))
            .or_else(|| self.properties.get(name))
            .map(String::as_str)
    }

    /// Set `name` for `aol`, or the bare key when `aol` is `None`.
    pub fn set_property(&mut self, aol: Option<&Aol>, name: &str, value: impl Into<String>) {
        let key = match aol {
            Some(aol) => aol_key(aol, name),
            None => name.to_string(),
        };
        self.properties.insert(key, value.into());
    }

    pub fn bool_property(&self, aol: Option<&Aol>, name: &str, default: bool) -> bool {
        match self.lookup(aol, name) {
            Some(value) => value.trim().eq_ignore_ascii_case("true"),
            None => default,
        }
    }

    pub fn usize_property(&self, aol: Option<&Aol>, name: &str, default: usize) -> usize {
        match self.lookup(aol, name) {
            Some(value) => value.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(
                    "ignoring non-numeric `{}` = `{}` in metadata of {}",
                    name,
                    value,
                    self.coordinates
                );
                default
            }),
            None => default,
        }
    }

    /// Binding of this module for a consumer building for `aol`.
    ///
    /// The key is looked up under [`NarInfo::library_aol`], so a sibling,
    /// alias or default AOL supplies the binding when `aol` itself was never
    /// packaged. Never empty: absent keys resolve to `default`; a present key
    /// must name a known binding.
    pub fn binding(&self, aol: &Aol, default: Binding) -> Result<Binding, NarError> {
        let library_aol = self.library_aol(aol);
        match self.lookup(Some(&library_aol), keys::BINDING) {
            Some(value) if !value.trim().is_empty() => {
                Binding::parse_for(value.trim(), Some(&library_aol.to_string()))
            }
            _ => Ok(default),
        }
    }

    pub fn set_binding(&mut self, aol: Option<&Aol>, binding: Binding) {
        self.set_property(aol, keys::BINDING, binding.as_str());
    }

    pub fn output(&self, aol: &Aol, default: &str) -> String {
        self.property(Some(aol), keys::OUTPUT, default)
    }

    pub fn set_output(&mut self, aol: Option<&Aol>, output: &str) {
        self.set_property(aol, keys::OUTPUT, output);
    }

    /// Library names to link, defaulting to the module's output name.
    pub fn libs(&self, aol: &Aol) -> String {
        let default_output = format!("{}-{}", self.artifact_id(), self.version());
        let output = self.output(aol, &default_output);
        self.property(Some(aol), keys::LIBS, &output)
    }

    /// Register a library produced by this module under `aol`.
    pub fn add_library(&mut self, aol: &Aol, name: &str) {
        let current = self.property(Some(aol), keys::LIBS, "");
        let mut names: Vec<&str> = current.split_whitespace().collect();
        if names.contains(&name) {
            return;
        }
        names.push(name);
        let joined = names.join(" ");
        self.set_property(Some(aol), keys::LIBS, joined);
    }

    pub fn sys_libs(&self, aol: &Aol) -> String {
        self.property(Some(aol), keys::SYS_LIBS, "")
    }

    pub fn options(&self, aol: &Aol) -> String {
        self.property(Some(aol), keys::LINKER_OPTIONS, "")
    }

    /// Record the base names of precompiled-header compilation units.
    pub fn set_pch_names(&mut self, aol: &Aol, names: &BTreeSet<String>) {
        let joined = names.iter().map(String::as_str).collect::<Vec<_>>().join(",");
        self.set_property(Some(aol), keys::PCH_NAMES, joined);
    }

    /// Precompiled-header base names; empty when the module has none.
    pub fn pch_names(&self, aol: &Aol) -> Vec<String> {
        self.property(Some(aol), keys::PCH_NAMES, "")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn set_target_winrt(&mut self, aol: &Aol, winrt: bool) {
        self.set_property(Some(aol), keys::TARGET_WINRT, winrt.to_string());
    }

    pub fn is_target_winrt(&self, aol: &Aol) -> bool {
        self.bool_property(Some(aol), keys::TARGET_WINRT, false)
    }

    /// Record an attached archive of kind `kind` (`noarch` or a binding).
    pub fn set_nar(&mut self, aol: Option<&Aol>, kind: &str, classifier: &str) {
        let value = format!(
            "{}:{}:{}:{}",
            self.group_id(),
            self.artifact_id(),
            crate::layout::NAR_TYPE,
            classifier
        );
        self.set_property(aol, &format!("{}{}", keys::NAR_PREFIX, kind), value);
    }

    /// Classifier of the attached archive of kind `kind` for `aol`.
    pub fn nar_classifier(&self, aol: &Aol, kind: &str) -> Option<String> {
        let value = self.lookup(Some(aol), &format!("{}{}", keys::NAR_PREFIX, kind))?;
        let classifier = value.rsplit(':').next()?.trim();
        if classifier.is_empty() {
            return None;
        }
        Some(classifier.replace(AOL_PLACEHOLDER, &aol.to_string()))
    }

    /// Name of the layout the module was built with, if recorded.
    pub fn layout_name(&self) -> Option<&str> {
        self.lookup(None, keys::LAYOUT).filter(|s| !s.is_empty())
    }

    /// Build configuration (`debug`/`release`) the module was built with.
    pub fn configuration(&self) -> Option<&str> {
        self.lookup(None, keys::CONFIGURATION).filter(|s| !s.is_empty())
    }

    /// AOL the producer built for by default.
    pub fn default_aol(&self) -> Option<Aol> {
        self.lookup(None, keys::DEFAULT_AOL)
            .and_then(|s| Aol::parse(s).ok())
    }

    /// Whether any property is recorded specifically for `aol`.
    pub fn has_aol(&self, aol: &Aol) -> bool {
        let prefix = format!("{}.", aol);
        self.properties.keys().any(|k| k.starts_with(&prefix))
    }

    /// AOL under which this module's libraries should be looked up for a
    /// consumer building for `target`.
    ///
    /// An exact match always wins. Otherwise an explicit alias (`{aol}=...`),
    /// a sibling front end of the same toolchain family, and finally the
    /// producer's default AOL are tried, in that order.
    pub fn library_aol(&self, target: &Aol) -> Aol {
        if self.has_aol(target) {
            return target.clone();
        }
        if let Some(alias) = self
            .properties
            .get(&target.to_string())
            .and_then(|s| Aol::parse(s.trim()).ok())
        {
            return alias;
        }
        if let Some(sibling) = target.sibling_aols().into_iter().find(|a| self.has_aol(a)) {
            return sibling;
        }
        self.default_aol().unwrap_or_else(|| target.clone())
    }
}

fn aol_key(aol: &Aol, name: &str) -> String {
    format!("{}.{}", aol, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn info() -> NarInfo {
        NarInfo::new(Coordinates::new("com.example", "foo", "1.0"))
    }

    fn aol(s: &str) -> Aol {
        Aol::parse(s).unwrap()
    }

    #[test]
    fn test_property_resolution_order() {
        let mut info = info();
        let linux = aol("x86_64-Linux-gcc");
        let mac = aol("x86_64-MacOSX-g++");

        assert_eq!(info.property(Some(&linux), "runtime", "dynamic"), "dynamic");

        info.set_property(None, "runtime", "static");
        assert_eq!(info.property(Some(&linux), "runtime", "dynamic"), "static");

        info.set_property(Some(&mac), "runtime", "dynamic");
        assert_eq!(info.property(Some(&mac), "runtime", "x"), "dynamic");
        assert_eq!(info.property(Some(&linux), "runtime", "x"), "static");
        assert_eq!(info.property(None, "runtime", "x"), "static");
    }

    #[test]
    fn test_binding_default_fallback() {
        let info = info();
        let unknown = aol("sparc-SunOS-CC");
        assert_eq!(info.binding(&unknown, Binding::Static).unwrap(), Binding::Static);
    }

    #[test]
    fn test_binding_aol_then_bare() {
        let mut info = info();
        let linux = aol("x86_64-Linux-gcc");
        let win = aol("amd64-Windows-msvc");
        info.set_binding(None, Binding::Static);
        info.set_binding(Some(&linux), Binding::Shared);
        assert_eq!(info.binding(&linux, Binding::None).unwrap(), Binding::Shared);
        assert_eq!(info.binding(&win, Binding::None).unwrap(), Binding::Static);
    }

    #[test]
    fn test_binding_follows_library_aol() {
        let gcc = aol("x86_64-Linux-gcc");
        let gpp = aol("x86_64-Linux-g++");
        let win = aol("amd64-Windows-msvc");

        let mut sibling = info();
        sibling.set_binding(Some(&gcc), Binding::Static);
        assert_eq!(sibling.binding(&gpp, Binding::None).unwrap(), Binding::Static);

        let mut defaulted = info();
        defaulted.set_property(None, keys::DEFAULT_AOL, win.to_string());
        defaulted.set_binding(Some(&win), Binding::Shared);
        assert_eq!(defaulted.binding(&gpp, Binding::None).unwrap(), Binding::Shared);
    }

    #[test]
    fn test_binding_invalid() {
        let mut info = info();
        let linux = aol("x86_64-Linux-gcc");
        info.set_property(Some(&linux), keys::BINDING, "dylib");
        let err = info.binding(&linux, Binding::Static).unwrap_err();
        assert!(matches!(err, NarError::InvalidBinding { .. }));
    }

    #[test]
    fn test_round_trip_through_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("META-INF/nar/com.example/foo/nar.properties");
        let mac = aol("x86_64-MacOSX-g++");
        let linux = aol("x86_64-Linux-gcc");

        let mut info = info();
        info.set_binding(Some(&mac), Binding::Shared);
        info.set_output(None, "foo-1.0");
        info.add_library(&linux, "foo-1.0");
        info.set_property(Some(&linux), keys::LINKER_OPTIONS, "-Wl,-rpath=$ORIGIN -lm");
        info.set_property(Some(&linux), keys::SYS_LIBS, "pthread dl");
        info.set_property(None, keys::JAVA_HOME, "C:\\Program Files\\Java");
        info.set_target_winrt(&mac, false);
        info.write_to_file(&path).unwrap();

        let loaded = NarInfo::load(info.coordinates().clone(), &path).unwrap();
        assert_eq!(loaded, info);
        assert_eq!(loaded.property(Some(&mac), keys::BINDING, ""), "shared");
    }

    #[test]
    fn test_read_known_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nar.properties");
        std::fs::write(&path, "#NAR\nx86_64-MacOSX-g++.libs.binding=shared\n").unwrap();
        let loaded = NarInfo::load(info().coordinates().clone(), &path).unwrap();
        assert_eq!(
            loaded.property(Some(&aol("x86_64-MacOSX-g++")), "libs.binding", ""),
            "shared"
        );
    }

    #[test]
    fn test_corrupt_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nar.properties");
        std::fs::write(&path, "ok=1\nbroken=\\uZZZZ\n").unwrap();
        let err = NarInfo::load(info().coordinates().clone(), &path).unwrap_err();
        match err.downcast_ref::<NarError>() {
            Some(NarError::MetadataCorrupt { line, .. }) => assert_eq!(*line, 2),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let loaded = NarInfo::load(info().coordinates().clone(), &tmp.path().join("nope")).unwrap();
        assert!(loaded.properties().is_empty());
    }

    #[test]
    fn test_libs_default_to_output() {
        let mut info = info();
        let linux = aol("x86_64-Linux-gcc");
        assert_eq!(info.libs(&linux), "foo-1.0");
        info.set_output(Some(&linux), "foo");
        assert_eq!(info.libs(&linux), "foo");
        info.add_library(&linux, "foo");
        info.add_library(&linux, "foo");
        info.add_library(&linux, "extra");
        assert_eq!(info.libs(&linux), "foo extra");
    }

    #[test]
    fn test_pch_names() {
        let mut info = info();
        let win = aol("amd64-Windows-msvc");
        assert!(info.pch_names(&win).is_empty());

        let names: BTreeSet<String> = ["stdafx", "common"].iter().map(|s| s.to_string()).collect();
        info.set_pch_names(&win, &names);
        assert_eq!(info.property(Some(&win), keys::PCH_NAMES, ""), "common,stdafx");
        assert_eq!(info.pch_names(&win), vec!["common", "stdafx"]);

        info.set_pch_names(&win, &BTreeSet::new());
        assert!(info.pch_names(&win).is_empty());
    }

    #[test]
    fn test_winrt_flag() {
        let mut info = info();
        let win = aol("amd64-Windows-msvc");
        assert!(!info.is_target_winrt(&win));
        info.set_target_winrt(&win, true);
        assert!(info.is_target_winrt(&win));
    }

    #[test]
    fn test_nar_classifier() {
        let mut info = info();
        let linux = aol("x86_64-Linux-gcc");
        info.set_nar(None, "noarch", "noarch");
        info.set_nar(None, "shared", "${aol}-shared");
        assert_eq!(info.nar_classifier(&linux, "noarch").as_deref(), Some("noarch"));
        assert_eq!(
            info.nar_classifier(&linux, "shared").as_deref(),
            Some("x86_64-Linux-gcc-shared")
        );
        assert_eq!(info.nar_classifier(&linux, "static"), None);
        assert_eq!(
            info.property(None, "nar.shared", ""),
            "com.example:foo:nar:${aol}-shared"
        );
    }

    #[test]
    fn test_library_aol_fallbacks() {
        let gcc = aol("x86_64-Linux-gcc");
        let gpp = aol("x86_64-Linux-g++");
        let win = aol("amd64-Windows-msvc");

        let mut exact = info();
        exact.set_binding(Some(&gpp), Binding::Shared);
        exact.set_binding(Some(&gcc), Binding::Static);
        assert_eq!(exact.library_aol(&gpp), gpp);

        let mut sibling = info();
        sibling.set_binding(Some(&gcc), Binding::Shared);
        assert_eq!(sibling.library_aol(&gpp), gcc);

        let mut alias = info();
        alias.set_property(None, &gpp.to_string(), gcc.to_string());
        assert_eq!(alias.library_aol(&gpp), gcc);

        let mut defaulted = info();
        defaulted.set_property(None, keys::DEFAULT_AOL, win.to_string());
        assert_eq!(defaulted.library_aol(&gpp), win);

        assert_eq!(info().library_aol(&gpp), gpp);
    }
}
