use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "objfs",
    about = "Browse and edit an object store as a filesystem",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the object store
    #[arg(long, global = true, default_value = ".objfs")]
    pub root: PathBuf,

    /// TOML file with filesystem settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// List a directory
    Ls(LsArgs),
    /// Print a file
    Cat(CatArgs),
    /// Write text or stdin to a file
    Write(WriteArgs),
    /// Create a directory
    Mkdir(MkdirArgs),
    /// Remove a file or directory
    Rm(RmArgs),
    /// Rename a file or directory
    Mv(MvArgs),
    /// Show attributes
    Stat(StatArgs),
    /// Change permission bits
    Chmod(ChmodArgs),
    /// Create a file or bump its modification time
    Touch(TouchArgs),
}

#[derive(Args)]
pub struct LsArgs {
    pub path: Option<String>,
    /// Long listing with mode, size and modification time
    #[arg(short, long)]
    pub long: bool,
}

#[derive(Args)]
pub struct CatArgs {
    pub path: String,
}

#[derive(Args)]
pub struct WriteArgs {
    pub path: String,
    /// Text to write; stdin is read when omitted
    pub text: Option<String>,
    #[arg(short, long)]
    pub append: bool,
}

#[derive(Args)]
pub struct MkdirArgs {
    pub path: String,
    /// Create missing parents
    #[arg(short, long)]
    pub parents: bool,
}

#[derive(Args)]
pub struct RmArgs {
    pub path: String,
    /// Remove everything beneath the path
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(Args)]
pub struct MvArgs {
    pub from: String,
    pub to: String,
}

#[derive(Args)]
pub struct StatArgs {
    pub path: String,
}

#[derive(Args)]
pub struct ChmodArgs {
    /// Octal permission bits, e.g. 644
    pub mode: String,
    pub path: String,
}

#[derive(Args)]
pub struct TouchArgs {
    pub path: String,
}
