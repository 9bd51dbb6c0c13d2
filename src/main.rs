use anyhow::Result;
use clap::Parser;
use dbfsharp_installer::archive::ArchiveExtractorImpl;
use dbfsharp_installer::commands;
use dbfsharp_installer::config::Config;
use dbfsharp_installer::github::GitHub;
use dbfsharp_installer::platform::{Arch, HostPlatformDetector, Os};
use dbfsharp_installer::runtime::RealRuntime;
use std::path::PathBuf;

/// dbfsharp-installer - install pinned dbfsharp releases
///
/// Picks the release artifact for this machine, verifies its SHA-256
/// checksum, places the `dbfsharp` executable in a bin directory and
/// checks that it starts.
///
/// If the GITHUB_TOKEN environment variable is set, it is used for GitHub
/// API requests made by `update-hashes`.
///
/// Examples:
///   dbfsharp-installer install              # Install the latest release
///   dbfsharp-installer resolve --os linux --arch x64
#[derive(Parser, Debug)]
#[command(author, version = env!("DBFSHARP_INSTALLER_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Release table to use instead of the built-in one (also via DBFSHARP_MANIFEST)
    #[arg(long, env = "DBFSHARP_MANIFEST", value_name = "PATH", global = true)]
    pub manifest: Option<PathBuf>,

    /// Directory the executable is installed into (defaults to ~/.local/bin; also via DBFSHARP_BIN_DIR)
    #[arg(long, env = "DBFSHARP_BIN_DIR", value_name = "DIR", global = true)]
    pub bin_dir: Option<PathBuf>,

    /// GitHub API URL (defaults to https://api.github.com)
    #[arg(long = "api-url", value_name = "URL", global = true)]
    pub api_url: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print the artifact URL and checksum for a platform
    Resolve(ResolveArgs),

    /// Download, verify and install dbfsharp
    Install(InstallArgs),

    /// Run the installed dbfsharp with --help
    Test,

    /// List the releases in the table
    List,

    /// Record a published GitHub release in the release table
    UpdateHashes(UpdateHashesArgs),
}

#[derive(clap::Args, Debug)]
pub struct ResolveArgs {
    /// Release version (defaults to the latest in the table)
    #[arg(long)]
    pub version: Option<String>,

    /// Operating system: macos, linux or windows (defaults to this host)
    #[arg(long)]
    pub os: Option<Os>,

    /// Architecture: arm64 or x64 (defaults to this host)
    #[arg(long)]
    pub arch: Option<Arch>,
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// Release version (defaults to the latest in the table)
    #[arg(long)]
    pub version: Option<String>,

    /// Do not run the installed binary afterwards
    #[arg(long)]
    pub skip_test: bool,
}

#[derive(clap::Args, Debug)]
pub struct UpdateHashesArgs {
    /// Release version (defaults to the latest GitHub release)
    #[arg(long)]
    pub version: Option<String>,

    /// Show the assets that would be recorded without changing the table
    #[arg(long)]
    pub dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let config = Config::new(RealRuntime, cli.manifest, cli.bin_dir, cli.api_url)?;
    let detector = HostPlatformDetector;

    match cli.command {
        Commands::Resolve(args) => commands::resolve(
            &config,
            &detector,
            args.version.as_deref(),
            args.os,
            args.arch,
        )?,
        Commands::Install(args) => {
            commands::install(
                config,
                &detector,
                ArchiveExtractorImpl::new(),
                args.version.as_deref(),
                args.skip_test,
            )
            .await?
        }
        Commands::Test => commands::test(&config)?,
        Commands::List => commands::list(&config)?,
        Commands::UpdateHashes(args) => {
            let github = GitHub::new(config.api_client.clone(), config.api_url.clone());
            commands::update_hashes(config, &github, args.version.as_deref(), args.dry_run)
                .await?
        }
    }
    Ok(())
}
