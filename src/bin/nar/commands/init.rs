//! `nar init` command

use std::path::Path;

use anyhow::{bail, Result};

use crate::cli::InitArgs;
use nar::ops::nar_init::{init_module, InitOptions};

/// Determines the module name from the arguments or directory.
pub fn determine_module_name(name: &Option<String>, path: &Path) -> String {
    name.clone().unwrap_or_else(|| {
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed")
            .to_string()
    })
}

/// Validates a module name; it becomes part of archive and library file names.
pub fn validate_module_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("module name cannot be empty");
    }

    if name.starts_with('-') || name.starts_with('.') {
        return Err("module name cannot start with a hyphen or dot");
    }

    for c in name.chars() {
        if !c.is_alphanumeric() && c != '-' && c != '_' {
            return Err("module name contains invalid characters");
        }
    }

    Ok(())
}

pub fn execute(args: InitArgs) -> Result<()> {
    let path = match args.path {
        Some(path) => path,
        None => std::env::current_dir()?,
    };

    let name = determine_module_name(&args.name, &path);
    if let Err(reason) = validate_module_name(&name) {
        bail!("invalid module name `{}`: {}", name, reason);
    }

    let opts = InitOptions {
        group: args.group,
        name: name.clone(),
        binding: args.binding,
    };
    init_module(&path, &opts)?;

    eprintln!(
        "     Initialized {} module `{}:{}` in {}",
        opts.binding,
        opts.group,
        name,
        path.display()
    );

    Ok(())
}
