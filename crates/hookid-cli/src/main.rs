mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use commands::identify::IdentifyArgs;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so --json output stays machine-readable
    let directive = if cli.verbose {
        "hookid=debug"
    } else {
        "hookid=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Identify {
            exe,
            editor,
            json,
            config,
            library_stem,
        } => commands::identify::run(IdentifyArgs {
            exe,
            editor,
            json,
            config,
            library_stem,
        }),
        Command::Sections { exe } => commands::sections::run(&exe),
        Command::Encode { kind, from, to } => commands::encode::run(kind.into(), &from, &to),
        Command::Table { json } => commands::table::run(json),
    }
}
