//! Implementation of `nar layout`: print where a layout puts things.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;

use crate::core::aol::Aol;
use crate::core::artifact::Coordinates;
use crate::core::library::Binding;
use crate::layout::{Classifier, NarLayout};

/// Inputs of a layout query.
#[derive(Debug, Clone)]
pub struct LayoutQuery {
    pub layout: String,
    pub debug: bool,
    pub base: PathBuf,
    pub group: String,
    pub artifact: String,
    pub version: String,
    pub aol: Aol,
    pub binding: Binding,
}

/// An attached archive and where it unpacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NarPaths {
    pub classifier: String,
    pub file: String,
    pub unpack_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutPaths {
    pub layout: String,
    pub no_arch: PathBuf,
    pub include: PathBuf,
    pub lib: PathBuf,
    pub bin: PathBuf,
    pub metadata: PathBuf,
    pub nars: Vec<NarPaths>,
}

/// Compute every directory `query.layout` uses below `query.base`.
pub fn layout_paths(query: &LayoutQuery) -> Result<LayoutPaths> {
    let layout = NarLayout::from_name(&query.layout, query.debug)?;
    let base = query.base.as_path();
    let (artifact, version) = (query.artifact.as_str(), query.version.as_str());
    let coordinates = Coordinates::new(&query.group, artifact, version);

    let mut classifiers = vec![Classifier::NoArch];
    if query.binding != Binding::None {
        classifiers.push(Classifier::bound(&query.aol, query.binding));
    }
    let nars = classifiers
        .iter()
        .map(|classifier| nar_paths(&layout, base, &coordinates, classifier))
        .collect();

    Ok(LayoutPaths {
        layout: layout.name().to_string(),
        no_arch: layout.no_arch_directory(base, artifact, version),
        include: layout.include_directory(base, artifact, version),
        lib: layout.lib_directory(base, artifact, version, &query.aol, query.binding),
        bin: layout.bin_directory(base, artifact, version, &query.aol),
        metadata: layout.metadata_file_path(base, &query.group, artifact),
        nars,
    })
}

fn nar_paths(layout: &NarLayout, base: &Path, coordinates: &Coordinates, classifier: &Classifier) -> NarPaths {
    let file = coordinates.nar_file_name(&classifier.to_string());
    NarPaths {
        classifier: classifier.to_string(),
        unpack_dir: layout.nar_unpack_directory(base, Path::new(&file)),
        file,
    }
}

impl LayoutPaths {
    /// `name: path` lines for terminal output.
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("layout:   {}", self.layout),
            format!("noarch:   {}", self.no_arch.display()),
            format!("include:  {}", self.include.display()),
            format!("lib:      {}", self.lib.display()),
            format!("bin:      {}", self.bin.display()),
            format!("metadata: {}", self.metadata.display()),
        ];
        for nar in &self.nars {
            lines.push(format!("nar:      {} -> {}", nar.file, nar.unpack_dir.display()));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(layout: &str) -> LayoutQuery {
        LayoutQuery {
            layout: layout.to_string(),
            debug: true,
            base: PathBuf::from("target/nar"),
            group: "com.example".to_string(),
            artifact: "zlib".to_string(),
            version: "1.2".to_string(),
            aol: Aol::parse("x86_64-Linux-gcc").unwrap(),
            binding: Binding::Static,
        }
    }

    #[test]
    fn test_layout21_paths() {
        let paths = layout_paths(&query("NarLayout21")).unwrap();
        assert_eq!(paths.include, PathBuf::from("target/nar/zlib-1.2-noarch/include"));
        assert_eq!(
            paths.lib,
            PathBuf::from("target/nar/zlib-1.2-x86_64-Linux-gcc-static/lib/x86_64-Linux-gcc/static")
        );
        assert_eq!(
            paths.bin,
            PathBuf::from("target/nar/zlib-1.2-x86_64-Linux-gcc-executable/bin/x86_64-Linux-gcc")
        );
        assert_eq!(paths.nars.len(), 2);
        assert_eq!(paths.nars[1].file, "zlib-1.2-x86_64-Linux-gcc-static.nar");
        assert_eq!(
            paths.nars[1].unpack_dir,
            PathBuf::from("target/nar/zlib-1.2-x86_64-Linux-gcc-static")
        );
    }

    #[test]
    fn test_layout20_is_flat() {
        let paths = layout_paths(&query("nar.layout.NarLayout20")).unwrap();
        assert_eq!(paths.include, PathBuf::from("target/nar/include"));
        assert_eq!(paths.nars[0].unpack_dir, PathBuf::from("target/nar"));
    }

    #[test]
    fn test_layout22_has_configuration() {
        let paths = layout_paths(&query("NarLayout22")).unwrap();
        assert!(paths.lib.ends_with("lib/x86_64-Linux-gcc/static/debug"));
    }

    #[test]
    fn test_unknown_layout() {
        let err = layout_paths(&query("NarLayout99")).unwrap_err();
        assert!(err.to_string().contains("NarLayout99"));
    }
}
