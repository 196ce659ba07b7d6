//! Binding types and declared libraries.
//!
//! A [`Binding`] is the kind of output a native library produces. It selects
//! the directory suffix in the layout and the linker strategy downstream.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::aol::Os;
use crate::core::errors::NarError;

/// Closed set of library/binding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Binding {
    Static,
    Shared,
    Jni,
    Executable,
    Plugin,
    /// Precompiled header: a header/object pair, never linked.
    Pch,
    None,
}

impl Binding {
    pub const ALL: [Binding; 7] = [
        Binding::Static,
        Binding::Shared,
        Binding::Jni,
        Binding::Executable,
        Binding::Plugin,
        Binding::Pch,
        Binding::None,
    ];

    /// Bindings that produce an archive of their own, in packaging order.
    pub const PACKAGED: [Binding; 6] = [
        Binding::Executable,
        Binding::Shared,
        Binding::Jni,
        Binding::Plugin,
        Binding::Static,
        Binding::Pch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Binding::Static => "static",
            Binding::Shared => "shared",
            Binding::Jni => "jni",
            Binding::Executable => "executable",
            Binding::Plugin => "plugin",
            Binding::Pch => "pch",
            Binding::None => "none",
        }
    }

    /// Parse a binding, reporting the AOL it was looked up for.
    pub fn parse_for(value: &str, aol: Option<&str>) -> Result<Self, NarError> {
        Binding::ALL
            .iter()
            .copied()
            .find(|b| b.as_str() == value)
            .ok_or_else(|| NarError::InvalidBinding {
                value: value.to_string(),
                aol: aol.map(str::to_string),
            })
    }

    /// Whether a link step produces an output file.
    pub fn produces_link_output(&self) -> bool {
        !matches!(self, Binding::Pch | Binding::None)
    }

    /// Whether dependents link against this binding's library directory.
    pub fn is_linkable(&self) -> bool {
        !matches!(self, Binding::Jni | Binding::None | Binding::Executable)
    }

    /// Whether dependents compile against this binding's headers.
    pub fn exports_headers(&self) -> bool {
        !matches!(self, Binding::Jni | Binding::Pch)
    }

    /// Whether linking this binding pulls in dependency libraries.
    pub fn links_dependencies(&self) -> bool {
        matches!(self, Binding::Shared | Binding::Jni | Binding::Executable)
    }

    /// Preference when one binding must represent a module with several
    /// libraries. Lower wins.
    fn rank(&self) -> u8 {
        match self {
            Binding::Shared => 0,
            Binding::Jni => 1,
            Binding::Static => 2,
            Binding::Plugin => 3,
            Binding::Pch => 4,
            Binding::Executable => 5,
            Binding::None => 6,
        }
    }

    /// The binding a module advertises for its declared libraries.
    pub fn preferred<'a>(bindings: impl IntoIterator<Item = &'a Binding>) -> Binding {
        bindings
            .into_iter()
            .copied()
            .min_by_key(Binding::rank)
            .unwrap_or(Binding::None)
    }

    /// File name of the linked output for `name` on `os`.
    pub fn output_filename(&self, name: &str, os: Os) -> Option<String> {
        let windows = os.is_windows();
        let file = match self {
            Binding::Executable if windows => format!("{}.exe", name),
            Binding::Executable => name.to_string(),
            Binding::Static if windows => format!("{}.lib", name),
            Binding::Static => format!("lib{}.a", name),
            Binding::Shared | Binding::Plugin | Binding::Jni if windows => {
                format!("{}.dll", name)
            }
            Binding::Jni if os == Os::MacOsX => format!("lib{}.jnilib", name),
            Binding::Shared | Binding::Plugin if os == Os::MacOsX => format!("lib{}.dylib", name),
            Binding::Shared | Binding::Plugin | Binding::Jni => format!("lib{}.so", name),
            Binding::Pch | Binding::None => return None,
        };
        Some(file)
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Binding {
    type Err = NarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Binding::parse_for(s, None)
    }
}

impl Serialize for Binding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Binding {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A library declared by a module, from `[[nar.library]]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Library {
    /// What to produce.
    #[serde(rename = "type")]
    pub binding: Binding,

    /// Linker subsystem (console, gui, other).
    #[serde(default = "default_subsystem")]
    pub subsystem: String,

    /// Link the C++ runtime.
    #[serde(default = "default_true")]
    pub link_cpp: bool,

    /// Link the Fortran runtime.
    #[serde(default)]
    pub link_fortran: bool,

    /// Link the Fortran main entry point.
    #[serde(default)]
    pub link_fortran_main: bool,
}

fn default_subsystem() -> String {
    "console".to_string()
}

fn default_true() -> bool {
    true
}

impl Library {
    pub fn new(binding: Binding) -> Self {
        Library {
            binding,
            subsystem: default_subsystem(),
            link_cpp: true,
            link_fortran: false,
            link_fortran_main: false,
        }
    }
}

impl fmt::Display for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Library[type={}, subsystem={}]", self.binding, self.subsystem)
    }
}
