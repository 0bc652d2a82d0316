mod cmd;
mod logging;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "cardx", version, about = "Index card realms and query their instances")]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    profile: Option<String>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate configuration and print the resolved realm
    Doctor,

    /// Index the realm and print run statistics
    Index,

    /// Query indexed cards
    Search(SearchArgs),

    /// Print the document of one card
    Card(CardArgs),

    /// Print the definition of an exported card
    TypeOf(TypeOfArgs),

    /// List a realm directory
    Ls(LsArgs),

    /// Report whether a realm path is ignored
    CheckIgnore(CheckIgnoreArgs),
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Filter as JSON, e.g. '{"eq":{"firstName":"Mango"},"on":{"module":"./pet","name":"Pet"}}'
    #[arg(long)]
    pub filter: Option<String>,

    /// Sort expressions as a JSON array
    #[arg(long)]
    pub sort: Option<String>,

    /// Include linked cards
    #[arg(long)]
    pub load_links: bool,
}

#[derive(Debug, Args)]
pub struct CardArgs {
    /// Realm-relative path or absolute URL of the card
    pub path: String,

    /// Include linked cards
    #[arg(long)]
    pub load_links: bool,
}

#[derive(Debug, Args)]
pub struct TypeOfArgs {
    /// Module specifier, relative to the realm or absolute
    pub module: String,

    /// Export name
    pub name: String,
}

#[derive(Debug, Args)]
pub struct LsArgs {
    /// Realm-relative directory
    #[arg(default_value = "")]
    pub dir: String,
}

#[derive(Debug, Args)]
pub struct CheckIgnoreArgs {
    /// Realm-relative path
    pub path: String,
}

fn main() {
    let cli = Cli::parse();
    let config = cli.config.as_deref();
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::Doctor => cmd::doctor::run(config, profile),
        Commands::Index => cmd::index::run(config, profile, cli.json),
        Commands::Search(args) => cmd::search::run(config, profile, cli.json, args),
        Commands::Card(args) => cmd::card::run(config, profile, args),
        Commands::TypeOf(args) => cmd::type_of::run(config, profile, cli.json, args),
        Commands::Ls(args) => cmd::ls::run(config, profile, cli.json, args),
        Commands::CheckIgnore(args) => cmd::check_ignore::run(config, profile, cli.json, args),
    }
}
