//! Paths inside a single NAR.
//!
//! A [`FileLayout`] knows where headers, libraries and binaries live relative
//! to the root of one unpacked archive. The configuration-aware form is the
//! flat form plus a trailing `debug`/`release` segment on library and binary
//! directories; headers are the same for every configuration.

use std::fmt;
use std::path::PathBuf;

use crate::core::aol::Aol;
use crate::core::library::Binding;

/// Build configuration of a configuration-aware layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Configuration {
    Debug,
    Release,
}

impl Configuration {
    pub fn from_debug(debug: bool) -> Self {
        if debug {
            Configuration::Debug
        } else {
            Configuration::Release
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Configuration::Debug => "debug",
            Configuration::Release => "release",
        }
    }

    pub fn is_debug(&self) -> bool {
        matches!(self, Configuration::Debug)
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative directory scheme inside an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileLayout {
    configuration: Option<Configuration>,
}

impl FileLayout {
    /// `include`, `lib/{aol}/{type}`, `bin/{aol}`.
    pub const fn flat() -> Self {
        FileLayout {
            configuration: None,
        }
    }

    /// Wrap this layout so library and binary directories gain a
    /// configuration segment.
    pub const fn with_configuration(self, configuration: Configuration) -> Self {
        FileLayout {
            configuration: Some(configuration),
        }
    }

    pub fn configuration(&self) -> Option<Configuration> {
        self.configuration
    }

    /// `""` for the flat layout, otherwise the configuration name.
    pub fn config_string(&self) -> &'static str {
        self.configuration.map(|c| c.as_str()).unwrap_or("")
    }

    pub fn include_directory(&self) -> PathBuf {
        PathBuf::from("include")
    }

    pub fn lib_directory(&self, aol: &Aol, binding: Binding) -> PathBuf {
        let dir = PathBuf::from("lib")
            .join(aol.to_string())
            .join(binding.as_str());
        self.decorate(dir)
    }

    pub fn bin_directory(&self, aol: &Aol) -> PathBuf {
        let dir = PathBuf::from("bin").join(aol.to_string());
        self.decorate(dir)
    }

    fn decorate(&self, dir: PathBuf) -> PathBuf {
        match self.configuration {
            Some(configuration) => dir.join(configuration.as_str()),
            None => dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aol() -> Aol {
        Aol::parse("x86_64-MacOSX-g++").unwrap()
    }

    #[test]
    fn test_flat_directories() {
        let layout = FileLayout::flat();
        assert_eq!(layout.include_directory(), PathBuf::from("include"));
        assert_eq!(
            layout.lib_directory(&aol(), Binding::Shared),
            PathBuf::from("lib").join("x86_64-MacOSX-g++").join("shared")
        );
        assert_eq!(
            layout.bin_directory(&aol()),
            PathBuf::from("bin").join("x86_64-MacOSX-g++")
        );
        assert_eq!(layout.config_string(), "");
    }

    #[test]
    fn test_configuration_segment() {
        for (debug, segment) in [(true, "debug"), (false, "release")] {
            let layout = FileLayout::flat().with_configuration(Configuration::from_debug(debug));
            assert_eq!(layout.include_directory(), PathBuf::from("include"));
            assert_eq!(
                layout.lib_directory(&aol(), Binding::Shared),
                FileLayout::flat().lib_directory(&aol(), Binding::Shared).join(segment)
            );
            assert_eq!(
                layout.bin_directory(&aol()),
                FileLayout::flat().bin_directory(&aol()).join(segment)
            );
            assert_eq!(layout.config_string(), segment);
        }
    }
}
