use std::path::PathBuf;

use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use spurge::{cli, config, error};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Authorize with Spotify API
    Auth,

    /// Resolve artist names of a boycott list to Spotify ids
    Resolve(ResolveOptions),

    /// Show what a boycott list would remove from the library
    Plan(PlanOptions),

    /// Remove everything a boycott list hits from the library
    Apply(ApplyOptions),

    /// Forget the stored decision for an artist name
    Forget(ForgetOptions),

    /// Handle the read cache
    Cache(CacheOptions),

    /// Remove the stored token and read cache
    Logout,

    /// List past apply runs
    History,

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct ResolveOptions {
    /// File with one artist or `label:` per line, `-` for stdin
    input: String,

    /// Pick the most popular match instead of asking
    #[clap(long)]
    auto: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct PlanOptions {
    /// File with one artist or `label:` per line, `-` for stdin
    input: String,

    /// Also remove saved albums by banned artists
    #[clap(long)]
    albums: bool,

    /// Only match a track on its first-listed artist
    #[clap(long)]
    strict_primary: bool,

    /// Write the plan to a `.json` or `.csv` file
    #[clap(long)]
    export: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct ApplyOptions {
    /// File with one artist or `label:` per line, `-` for stdin
    input: String,

    /// Also remove saved albums by banned artists
    #[clap(long)]
    albums: bool,

    /// Only match a track on its first-listed artist
    #[clap(long)]
    strict_primary: bool,

    /// Do not ask for confirmation
    #[clap(long, short)]
    yes: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ForgetOptions {
    name: String,
}

#[derive(Parser, Debug, Clone)]
pub struct CacheOptions {
    #[command(subcommand)]
    command: CacheSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CacheSubcommand {
    /// Purge every cached library read
    Clear,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SPURGE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    let cli = Cli::parse();

    match cli.command {
        Command::Auth => cli::auth().await,
        Command::Resolve(opt) => cli::resolve(&opt.input, opt.auto).await,
        Command::Plan(opt) => {
            cli::plan(
                &opt.input,
                opt.albums,
                opt.strict_primary,
                opt.export.as_deref(),
            )
            .await
        }
        Command::Apply(opt) => {
            cli::apply(&opt.input, opt.albums, opt.strict_primary, opt.yes).await
        }
        Command::Forget(opt) => cli::forget(&opt.name).await,
        Command::Cache(opt) => match opt.command {
            CacheSubcommand::Clear => cli::cache_clear().await,
        },
        Command::Logout => cli::logout().await,
        Command::History => cli::history().await,
        Command::Completions(opt) => {
            let mut cmd = Cli::command_for_update();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout())
        }
    }
}
