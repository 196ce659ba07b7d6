//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use nar::builder::BuildOptions;
use nar::core::Binding;

/// Build, package and install native archives (NARs)
#[derive(Parser)]
#[command(name = "nar")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter Nar.toml
    Init(InitArgs),

    /// Copy resources, unpack dependencies and compile the module
    Build(TargetArgs),

    /// Compile and link the module's tests
    Test(TargetArgs),

    /// Archive the built layout directories into NAR files
    Package(TargetArgs),

    /// Copy the packaged module into the local repository
    Install(TargetArgs),

    /// Unpack dependency archives without compiling
    Unpack(UnpackArgs),

    /// Print the directories a layout uses for an artifact
    Layout(LayoutArgs),

    /// Show how each dependency is consumed
    Info(InfoArgs),

    /// Remove build artifacts
    Clean(CleanArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Overrides shared by every command that builds a context.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Build the release configuration
    #[arg(short, long)]
    pub release: bool,

    /// Target AOL, e.g. `x86_64-Linux-gcc`
    #[arg(long, env = "NAR_AOL")]
    pub aol: Option<String>,

    /// Layout name, e.g. `NarLayout22`
    #[arg(long)]
    pub layout: Option<String>,
}

impl TargetArgs {
    pub fn options(&self) -> BuildOptions {
        BuildOptions {
            release: self.release,
            aol: self.aol.clone(),
            layout: self.layout.clone(),
        }
    }
}

#[derive(Args)]
pub struct InitArgs {
    /// Module name (defaults to directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// Module group
    #[arg(long, default_value = "com.example")]
    pub group: String,

    /// Binding of the declared library
    #[arg(long, default_value = "shared")]
    pub binding: Binding,

    /// Directory to initialize (defaults to current directory)
    pub path: Option<PathBuf>,
}

#[derive(Args)]
pub struct UnpackArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Unpack test dependencies as well
    #[arg(long)]
    pub tests: bool,
}

#[derive(Args)]
pub struct LayoutArgs {
    /// Artifact id
    pub artifact: String,

    /// Artifact version
    pub version: String,

    /// Layout name
    #[arg(long, default_value = nar::core::manifest::DEFAULT_LAYOUT)]
    pub layout: String,

    /// Group id, used for the metadata path
    #[arg(long, default_value = "com.example")]
    pub group: String,

    /// AOL (defaults to the configured or host AOL)
    #[arg(long)]
    pub aol: Option<String>,

    /// Binding
    #[arg(long, default_value = "shared")]
    pub binding: Binding,

    /// Base directory the paths are computed below
    #[arg(long, default_value = "target/nar")]
    pub base: PathBuf,

    /// Use the debug configuration
    #[arg(long)]
    pub debug: bool,

    /// Print JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct InfoArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Print JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Only remove the test build and its unpacked dependencies
    #[arg(long)]
    pub tests: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
