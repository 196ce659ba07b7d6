//! Architecture-OS-Linker identifiers.
//!
//! An [`Aol`] names a target platform/toolchain combination. Its string form
//! (`x86_64-Linux-gcc`) is used both as a directory name component and as a
//! property-key prefix, so it never contains a path separator and always
//! round-trips exactly through [`Aol::parse`] / `Display`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::errors::NarError;

/// Separator between AOL components.
pub const AOL_SEPARATOR: char = '-';

/// Operating systems known to the layout scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Os {
    Linux,
    MacOsX,
    Windows,
    SunOs,
    FreeBsd,
    NetBsd,
    Aix,
}

impl Os {
    const ALL: [Os; 7] = [
        Os::Linux,
        Os::MacOsX,
        Os::Windows,
        Os::SunOs,
        Os::FreeBsd,
        Os::NetBsd,
        Os::Aix,
    ];

    /// Canonical spelling used in AOL tokens.
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Linux => "Linux",
            Os::MacOsX => "MacOSX",
            Os::Windows => "Windows",
            Os::SunOs => "SunOS",
            Os::FreeBsd => "FreeBSD",
            Os::NetBsd => "NetBSD",
            Os::Aix => "AIX",
        }
    }

    /// The OS this binary is running on.
    pub fn host() -> Option<Os> {
        match std::env::consts::OS {
            "linux" => Some(Os::Linux),
            "macos" => Some(Os::MacOsX),
            "windows" => Some(Os::Windows),
            "solaris" | "illumos" => Some(Os::SunOs),
            "freebsd" => Some(Os::FreeBsd),
            "netbsd" => Some(Os::NetBsd),
            "aix" => Some(Os::Aix),
            _ => None,
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Os::Windows)
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Os {
    type Err = NarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Os::ALL
            .iter()
            .copied()
            .find(|os| os.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| NarError::MalformedIdentifier {
                token: s.to_string(),
                reason: "unknown operating system".to_string(),
            })
    }
}

/// A family of linker front ends sharing one installation and library set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolchainFamily {
    /// Canonical family name.
    pub name: &'static str,
    /// Front-end names that belong to this family, canonical first.
    pub front_ends: &'static [&'static str],
}

/// Toolchain families whose front ends share libraries.
///
/// `gcc` and `g++` are two drivers over one installation, so a `g++` build
/// also provisions and indexes artifacts laid out under the `gcc` name.
pub const TOOLCHAIN_FAMILIES: &[ToolchainFamily] = &[
    ToolchainFamily {
        name: "gcc",
        front_ends: &["gcc", "g++"],
    },
    ToolchainFamily {
        name: "clang",
        front_ends: &["clang", "clang++"],
    },
    ToolchainFamily {
        name: "intel",
        front_ends: &["icc", "icpc"],
    },
];

impl ToolchainFamily {
    /// Find the family a linker front end belongs to.
    pub fn of(linker: &str) -> Option<&'static ToolchainFamily> {
        TOOLCHAIN_FAMILIES
            .iter()
            .find(|family| family.front_ends.contains(&linker))
    }

    /// Other front ends of the same family.
    pub fn siblings<'a>(&'a self, linker: &'a str) -> impl Iterator<Item = &'static str> + 'a {
        self.front_ends.iter().copied().filter(move |f| *f != linker)
    }
}

/// An Architecture-OS-Linker triple. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Aol {
    arch: String,
    os: Os,
    linker: String,
}

impl Aol {
    /// Build an AOL from its components, validating each one.
    pub fn new(arch: &str, os: Os, linker: &str) -> Result<Self, NarError> {
        let token = format!("{}{}{}{}{}", arch, AOL_SEPARATOR, os, AOL_SEPARATOR, linker);
        validate_component(&token, arch, "architecture")?;
        validate_component(&token, linker, "linker")?;
        if arch.contains(AOL_SEPARATOR) {
            return Err(NarError::MalformedIdentifier {
                token,
                reason: "architecture must not contain `-`".to_string(),
            });
        }
        Ok(Aol {
            arch: arch.to_string(),
            os,
            linker: linker.to_string(),
        })
    }

    /// Parse a dash-joined AOL token.
    ///
    /// The linker is the remainder after the second separator, so a token
    /// always reproduces itself through `to_string()`.
    pub fn parse(token: &str) -> Result<Self, NarError> {
        let parts: Vec<&str> = token.splitn(3, AOL_SEPARATOR).collect();
        if parts.len() < 3 {
            return Err(NarError::MalformedIdentifier {
                token: token.to_string(),
                reason: format!("expected 3 segments, found {}", parts.len()),
            });
        }
        let os = parts[1].parse::<Os>().map_err(|_| NarError::MalformedIdentifier {
            token: token.to_string(),
            reason: format!("unknown operating system `{}`", parts[1]),
        })?;
        if os.as_str() != parts[1] {
            return Err(NarError::MalformedIdentifier {
                token: token.to_string(),
                reason: format!("operating system must be spelled `{}`", os.as_str()),
            });
        }
        Aol::new(parts[0], os, parts[2]).map_err(|e| match e {
            NarError::MalformedIdentifier { reason, .. } => NarError::MalformedIdentifier {
                token: token.to_string(),
                reason,
            },
            other => other,
        })
    }

    /// Best-effort AOL for the host with the given linker.
    pub fn host(linker: &str) -> Result<Self, NarError> {
        let os = Os::host().ok_or_else(|| NarError::MalformedIdentifier {
            token: std::env::consts::OS.to_string(),
            reason: "host operating system has no AOL spelling".to_string(),
        })?;
        let arch = match (std::env::consts::ARCH, os) {
            ("x86_64", Os::Windows) => "amd64",
            ("x86", _) => "i386",
            (arch, _) => arch,
        };
        Aol::new(arch, os, linker)
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    pub fn os(&self) -> Os {
        self.os
    }

    pub fn linker(&self) -> &str {
        &self.linker
    }

    /// Whether the linker component is exactly `name`.
    pub fn matches_linker(&self, name: &str) -> bool {
        self.linker == name
    }

    /// Dotted key form (`x86_64.Linux.gcc`) used for option prefixes.
    pub fn key(&self) -> String {
        format!("{}.{}.{}", self.arch, self.os, self.linker)
    }

    /// The same architecture and OS with another linker front end.
    pub fn with_linker(&self, linker: &str) -> Result<Self, NarError> {
        Aol::new(&self.arch, self.os, linker)
    }

    /// The toolchain family of this AOL's linker, if any.
    pub fn family(&self) -> Option<&'static ToolchainFamily> {
        ToolchainFamily::of(&self.linker)
    }

    /// AOLs for the other front ends of this linker's family.
    pub fn sibling_aols(&self) -> Vec<Aol> {
        match self.family() {
            Some(family) => family
                .siblings(&self.linker)
                .filter_map(|linker| self.with_linker(linker).ok())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Whether this AOL's linker belongs to the gcc family.
    pub fn is_gcc_family(&self) -> bool {
        self.family().map(|f| f.name == "gcc").unwrap_or(false)
    }
}

fn validate_component(token: &str, value: &str, what: &str) -> Result<(), NarError> {
    if value.is_empty() {
        return Err(NarError::MalformedIdentifier {
            token: token.to_string(),
            reason: format!("empty {}", what),
        });
    }
    if value.contains(['/', '\\']) || value.chars().any(char::is_whitespace) || value.contains('.') {
        return Err(NarError::MalformedIdentifier {
            token: token.to_string(),
            reason: format!("{} `{}` contains a reserved character", what, value),
        });
    }
    Ok(())
}

impl fmt::Display for Aol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}{}",
            self.arch, AOL_SEPARATOR, self.os, AOL_SEPARATOR, self.linker
        )
    }
}

impl FromStr for Aol {
    type Err = NarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Aol::parse(s)
    }
}

impl Serialize for Aol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Aol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Aol::parse(&s).map_err(serde::de::Error::custom)
    }
}
