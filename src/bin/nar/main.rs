//! nar CLI - build, package and install native archives

use anyhow::Result;
use clap::Parser;
use miette::Diagnostic;
use nar::NarError;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        if let Some(help) = e
            .chain()
            .find_map(|cause| cause.downcast_ref::<NarError>())
            .and_then(|err| err.help())
        {
            eprintln!("help: {}", help);
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("nar=debug")
    } else {
        EnvFilter::new("nar=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init(args) => commands::init::execute(args),
        Commands::Build(args) => commands::build::execute(args, cli.verbose),
        Commands::Test(args) => commands::test::execute(args, cli.verbose),
        Commands::Package(args) => commands::package::execute(args, cli.verbose),
        Commands::Install(args) => commands::install::execute(args, cli.verbose),
        Commands::Unpack(args) => commands::unpack::execute(args, cli.verbose),
        Commands::Layout(args) => commands::layout::execute(args),
        Commands::Info(args) => commands::info::execute(args, cli.verbose),
        Commands::Clean(args) => commands::clean::execute(args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
