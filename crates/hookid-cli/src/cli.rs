use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use hookid::{Branch, Condition};

#[derive(Parser)]
#[command(name = "hookid")]
#[command(version, about = "Executable build identification and hook address lookup")]
pub struct Cli {
    /// Log every stage, including the raw version resource fields
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Identify an executable and print where to hook it
    Identify {
        exe: PathBuf,

        /// Look the build up in the editor table instead of the runtime one
        #[arg(long)]
        editor: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// TOML file overriding the identification settings
        #[arg(short, long, env = "HOOKID_CONFIG")]
        config: Option<PathBuf>,

        /// Prefix of the payload library name
        #[arg(long)]
        library_stem: Option<String>,
    },

    /// List the section table of an executable
    Sections { exe: PathBuf },

    /// Encode a relative branch from one address to another
    Encode {
        #[arg(value_enum)]
        kind: BranchKind,

        /// Address of the instruction (hex)
        #[arg(long)]
        from: String,

        /// Branch target (hex)
        #[arg(long)]
        to: String,
    },

    /// Print the built-in table of supported builds
    Table {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BranchKind {
    Jump,
    Call,
    Jz,
    Jnz,
    Jle,
    Jg,
}

impl From<BranchKind> for Branch {
    fn from(kind: BranchKind) -> Self {
        match kind {
            BranchKind::Jump => Branch::Jump,
            BranchKind::Call => Branch::Call,
            BranchKind::Jz => Branch::Conditional(Condition::Jz),
            BranchKind::Jnz => Branch::Conditional(Condition::Jnz),
            BranchKind::Jle => Branch::Conditional(Condition::Jle),
            BranchKind::Jg => Branch::Conditional(Condition::Jg),
        }
    }
}
