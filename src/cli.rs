use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(
    name = "reactify",
    version,
    about = "Scaffold an app with a React front-end template"
)]
pub struct Cli {
    #[arg(short = 'C', long = "chdir", global = true)]
    pub chdir: Option<PathBuf>,
    /// Config file to use instead of the discovered one.
    #[arg(short = 'f', long = "file", global = true)]
    pub file: Option<PathBuf>,
    /// Print what would happen without touching the disk.
    #[arg(short = 'n', long = "dry-run", global = true)]
    pub dry_run: bool,
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new app directory from the React template and install its packages.
    #[command(visible_alias = "startapp")]
    New(NewArgs),
    /// Inspect the template.
    Template {
        #[command(subcommand)]
        command: TemplateCommand,
    },
    /// Configuration display and generation.
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommand>,
    },
}

#[derive(Args, Debug)]
pub struct NewArgs {
    /// Name of the new app; also the directory created.
    pub name: String,
    #[command(flatten)]
    pub roots: RootArgs,
    /// Package manager used for the install step (default: npm).
    #[arg(long = "package-manager")]
    pub package_manager: Option<String>,
    /// Copy files only; skip the package manager.
    #[arg(long = "no-install")]
    pub no_install: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RootArgs {
    /// Directory holding a `reactify` template folder. Repeatable; the first wins.
    #[arg(long = "package-root")]
    pub package_roots: Vec<PathBuf>,
    /// Do not fall back to the template bundled with this binary.
    #[arg(long = "no-bundled")]
    pub no_bundled: bool,
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommand {
    /// List the files of the bundled template.
    List,
    /// Print the template root `new` would copy from.
    Path(RootArgs),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    Show,
    Path,
    Check,
    Generate {
        #[arg()]
        path: Option<PathBuf>,
        #[arg(long = "force", default_value_t = false)]
        force: bool,
    },
    /// Set the package manager program in the config file.
    SetPackageManager { name: String },
}

/// Helper entry point so `main` can stay minimal.
pub fn parse() -> Cli {
    Cli::parse()
}
