//! Error taxonomy for NAR layout, metadata and provisioning.
//!
//! Every variant is fatal for the current module's build step. Messages name
//! the artifact, AOL and step involved so a failure can be traced back to a
//! specific dependency and platform.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised by the NAR core.
#[derive(Debug, Error, Diagnostic)]
pub enum NarError {
    #[error("malformed AOL identifier `{token}`: {reason}")]
    #[diagnostic(
        code(nar::malformed_aol),
        help("an AOL looks like `<arch>-<os>-<linker>`, e.g. `x86_64-Linux-gcc`")
    )]
    MalformedIdentifier { token: String, reason: String },

    #[error("invalid binding `{value}`{}", for_aol(.aol))]
    #[diagnostic(
        code(nar::invalid_binding),
        help("valid bindings: static, shared, jni, executable, plugin, pch, none")
    )]
    InvalidBinding { value: String, aol: Option<String> },

    #[error("corrupt metadata file {}: line {line}: {reason}", .path.display())]
    #[diagnostic(
        code(nar::metadata_corrupt),
        help("the dependency that produced this file is broken; rebuild and reinstall it")
    )]
    MetadataCorrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("module `{module}` was built with layout `{found}` but is configured for `{configured}`")]
    #[diagnostic(
        code(nar::unsupported_layout),
        help("run `nar clean` before switching the layout of a module")
    )]
    UnsupportedLayout {
        module: String,
        configured: String,
        found: String,
    },

    #[error("unknown layout `{name}`")]
    #[diagnostic(
        code(nar::unknown_layout),
        help("known layouts: NarLayout20, NarLayout21, NarLayout22")
    )]
    UnknownLayout { name: String },

    #[error("unable to locate include path {} of dependency `{artifact}`", .path.display())]
    #[diagnostic(
        code(nar::missing_include_path),
        help("run `nar unpack` or check that the dependency was packaged with headers")
    )]
    MissingIncludePath { artifact: String, path: PathBuf },

    #[error("unable to locate library path {} of dependency `{artifact}` for {aol}", .path.display())]
    #[diagnostic(code(nar::missing_library_path))]
    MissingLibraryPath {
        artifact: String,
        aol: String,
        path: PathBuf,
    },

    #[error("provisioning of `{artifact}` for {aol} failed during {step}: {reason}")]
    #[diagnostic(code(nar::provisioning))]
    Provisioning {
        artifact: String,
        aol: String,
        step: String,
        reason: String,
    },

    #[error("`{tool}` failed with exit code {} while {step}\n{output}", exit_code(.code))]
    #[diagnostic(
        code(nar::external_tool),
        help("run with --verbose to see the full command line")
    )]
    ExternalToolFailure {
        tool: String,
        step: String,
        code: Option<i32>,
        output: String,
    },
}

fn for_aol(aol: &Option<String>) -> String {
    match aol {
        Some(aol) => format!(" for {}", aol),
        None => String::new(),
    }
}

fn exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "<signal>".to_string(),
    }
}

impl NarError {
    /// Shorthand for a provisioning failure.
    pub fn provisioning(
        artifact: impl Into<String>,
        aol: impl ToString,
        step: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        NarError::Provisioning {
            artifact: artifact.into(),
            aol: aol.to_string(),
            step: step.into(),
            reason: reason.into(),
        }
    }
}
