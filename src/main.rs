//! # Bifrost CLI (`bifrost`)
//!
//! Registers local media files into typed sections of a catalog server and
//! queries what is already there.
//!
//! ## Usage
//!
//! ```bash
//! bifrost [--config DIR] [--server NAME] [--section NAME] [--direct] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `bifrost profiles` | List server profiles, home profile marked |
//! | `bifrost sections` | List sections, or show the `--section` detail |
//! | `bifrost file <query>` | Show one file by SHA-256, id or name |
//! | `bifrost index` | List a field of every file |
//! | `bifrost search <query>` | List a field of files whose name matches |
//! | `bifrost register <path>` | Register one file into `--section` |
//! | `bifrost migrate <dir>` | Register every file of a directory into `--section` |
//! | `bifrost create-section <name> <remote_path> <type>` | Create a section |
//! | `bifrost serve` | Serve the profile's direct store over HTTP |
//!
//! Exit status is 0 on success and a per-error-kind code otherwise (see
//! `CatalogError::exit_code`). `migrate` exits 0 even when individual files
//! failed; their outcomes are printed one per line.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bifrost::commands;
use bifrost::config::{self, Settings, DEFAULT_BULK_CONCURRENCY};
use bifrost::error::CatalogError;
use bifrost::models::{IndexKey, MediaType};

/// Bifrost: a personal media catalog client.
#[derive(Parser)]
#[command(
    name = "bifrost",
    about = "Register local media into typed catalog sections over REST or a direct store connection",
    version
)]
struct Cli {
    /// Directory of server profiles.
    ///
    /// Defaults to `$HOME/.config/bifrost/servers`; created if missing.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Profile to use instead of the home profile.
    #[arg(long, global = true)]
    server: Option<String>,

    /// Section to operate on.
    #[arg(long, global = true)]
    section: Option<String>,

    /// Talk to the metadata store directly instead of the REST API.
    #[arg(long, global = true)]
    direct: bool,

    /// Uploader recorded on registrations.
    ///
    /// Temporary stand-in until the server authenticates uploaders.
    #[arg(long, global = true)]
    username: Option<String>,

    /// Give up on a REST request after SECS seconds. No deadline by default.
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List server profiles.
    Profiles,

    /// List sections, or show one with `--section`.
    Sections,

    /// Show one file by SHA-256, id or file name.
    File {
        query: String,
    },

    /// Print one field of every file, optionally scoped to `--section`.
    Index {
        /// Field to print: file_name, file_location, file_sha, file_type, uploaded_by.
        #[arg(long, default_value = "file_name")]
        key: IndexKey,
    },

    /// Print one field of every file whose name contains QUERY.
    Search {
        query: String,

        #[arg(long, default_value = "file_name")]
        key: IndexKey,
    },

    /// Register a single file into `--section`.
    Register {
        path: PathBuf,
    },

    /// Register every file of a directory into `--section`.
    Migrate {
        path: PathBuf,

        /// Descend into subdirectories.
        #[arg(long)]
        recursive: bool,

        /// Registrations in flight at once (1 = sequential).
        #[arg(long, default_value_t = DEFAULT_BULK_CONCURRENCY)]
        concurrency: usize,

        /// Leave out entries matching this glob (relative to PATH). Repeatable.
        #[arg(long = "exclude", value_name = "GLOB")]
        exclude: Vec<String>,
    },

    /// Create a section.
    CreateSection {
        name: String,
        remote_path: String,
        /// video, document, game, audio or other.
        section_type: MediaType,
    },

    /// Serve the selected profile's direct store as the catalog REST API.
    Serve {
        #[arg(long, default_value = "127.0.0.1:7340")]
        bind: String,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bifrost=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let profile_dir = match &cli.config {
        Some(dir) => dir.clone(),
        None => {
            let home = std::env::var_os("HOME").ok_or_else(|| {
                CatalogError::invalid_argument("HOME is not set; pass --config")
            })?;
            config::default_profile_dir(&PathBuf::from(home))
        }
    };

    let mut settings = Settings::new(profile_dir);
    settings.profile_name = cli.server.clone();
    settings.direct = cli.direct;
    settings.request_timeout = cli.timeout.map(Duration::from_secs);

    if let Some(username) = &cli.username {
        tracing::warn!(
            uploader = %username,
            "--username is a temporary stand-in until the server authenticates uploaders"
        );
        settings.uploader = username.clone();
    }

    if let Commands::Migrate {
        recursive,
        concurrency,
        exclude,
        ..
    } = &cli.command
    {
        settings.recursive = *recursive;
        settings.bulk_concurrency = *concurrency;
        settings.exclude_globs = exclude.clone();
    }

    settings.validate()?;
    Ok(settings)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = build_settings(&cli)?;
    let section = cli.section.as_deref();

    match &cli.command {
        Commands::Profiles => commands::run_profiles(&settings)?,
        Commands::Sections => commands::run_sections(&settings, section).await?,
        Commands::File { query } => commands::run_file(&settings, query, section).await?,
        Commands::Index { key } => commands::run_index(&settings, section, *key).await?,
        Commands::Search { query, key } => {
            commands::run_search(&settings, query, section, *key).await?
        }
        Commands::Register { path } => commands::run_register(&settings, section, path).await?,
        Commands::Migrate { path, .. } => commands::run_migrate(&settings, section, path).await?,
        Commands::CreateSection {
            name,
            remote_path,
            section_type,
        } => commands::run_create_section(&settings, name, remote_path, *section_type).await?,
        Commands::Serve { bind } => commands::run_serve(&settings, bind).await?,
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            match err.downcast_ref::<CatalogError>() {
                Some(catalog) => {
                    if catalog.is_configuration() {
                        eprintln!("Run `bifrost profiles` or `bifrost sections` to see what is configured.");
                    }
                    ExitCode::from(catalog.exit_code())
                }
                None => ExitCode::from(1),
            }
        }
    }
}
