use clap::Parser;
use clockwork::build::BuildOptions;
use clockwork::commands::{self, config::DEFAULT_TIMEOUT_SECS, config::SyncConfig};
use std::process::ExitCode;

/// clockwork - package manager for Watch Face Format projects
///
/// Installs watch face packages from git repositories into ./packages,
/// keeps them recorded in package.json, and builds the watch face.
///
/// Examples:
///   clockwork init
///   clockwork add https://github.com/owner/digits.git
///   clockwork install            # clone or update everything in package.json
///   clockwork build --release
#[derive(Parser, Debug)]
#[command(author, version = env!("CLOCKWORK_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Answer yes to every confirmation (also via CLOCKWORK_YES)
    #[arg(long, short = 'y', env = "CLOCKWORK_YES", global = true)]
    yes: bool,

    /// Limit for each git clone or pull in seconds, 0 for none (also via CLOCKWORK_TIMEOUT)
    #[arg(
        long,
        env = "CLOCKWORK_TIMEOUT",
        value_name = "SECONDS",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        global = true
    )]
    timeout: u64,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Install a package from a git repository, then update all packages
    #[command(visible_alias = "i")]
    Install(InstallArgs),

    /// Add a package to the package.json file
    Add(AddArgs),

    /// Build the watch face
    Build(BuildArgs),

    /// Initialize the package.json file for the project
    #[command(visible_alias = "initialize")]
    Init,
}

#[derive(clap::Args, Debug)]
struct InstallArgs {
    /// Repository location with an optional tag, e.g. https://host/owner/repo.git@v2
    #[arg(value_name = "LOCATION[@TAG]")]
    package: Option<String>,
}

#[derive(clap::Args, Debug)]
struct AddArgs {
    /// Repository location with an optional tag
    #[arg(value_name = "LOCATION[@TAG]")]
    package: String,
}

#[derive(clap::Args, Debug)]
struct BuildArgs {
    /// Build a release bundle and check its memory footprint
    #[arg(long, short = 'r')]
    release: bool,

    /// Allow installing on devices that are not Wear OS
    #[arg(long, short = 'a')]
    all: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_filter = if cli.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    eprintln!(
        "Clockwork CLI - the open-source package manager for Watch Face Format - v{}",
        env!("CLOCKWORK_VERSION")
    );

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(commands::exit_code(&e))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let runtime = clockwork::runtime::RealRuntime;
    let config = SyncConfig::load(&runtime, cli.timeout, cli.yes)?;

    match cli.command {
        Commands::Install(args) => {
            commands::install(&runtime, args.package.as_deref(), &config).await
        }
        Commands::Add(args) => commands::add(&runtime, &args.package, &config).await,
        Commands::Build(args) => {
            let options = BuildOptions {
                release: args.release,
                all_devices: args.all,
                debug: cli.debug,
                assume_yes: cli.yes,
            };
            commands::build(&runtime, options, &config).await
        }
        Commands::Init => commands::init(&runtime, &config),
    }
}
