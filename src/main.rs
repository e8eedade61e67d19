//! # docsync CLI
//!
//! ```bash
//! docsync --config ./docsync.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsync changes` | Hash the corpus and print the snapshot |
//! | `docsync diff <new> [old]` | Diff two snapshot files |
//! | `docsync publish` | Publish the corpus delta to a new index |
//! | `docsync cleanup` | Delete indexes other than the active one |
//!
//! Exit status is `0` on success, `2` for usage errors, and a distinct
//! code per failure kind otherwise (see [`docsync::error::SyncError`]).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use docsync::commands::{self, PublishOptions};
use docsync::config;
use docsync::error::exit_code_for;

/// docsync: keep a hosted search index in sync with a markdown corpus.
#[derive(Parser)]
#[command(
    name = "docsync",
    version,
    about = "Keep a hosted search index in sync with a local markdown corpus"
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./docsync.toml")]
    config: PathBuf,

    /// Log progress at info level (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash every corpus document and print the snapshot as JSON.
    Changes,

    /// Diff two snapshot files and print the result as JSON.
    Diff {
        /// Snapshot file describing the new corpus state.
        new: PathBuf,

        /// Snapshot file to compare against. Defaults to the stored snapshot.
        old: Option<PathBuf>,

        /// Persist `new` and the diff to the snapshot store.
        ///
        /// The snapshot is tagged with `<index_prefix><changeID>`, which the
        /// next `publish` copies from unless `--from` is given. No index is
        /// created, so publish under that name (`publish --index`) first.
        #[arg(long)]
        persist: bool,
    },

    /// Publish corpus changes since the last run to a new index.
    ///
    /// Copies the source index into a new one, uploads added and changed
    /// documents, removes deleted ones, and records the new snapshot.
    /// The new index still has to be activated afterwards.
    Publish {
        /// Index to copy from. Defaults to the index of the last publish.
        #[arg(long)]
        from: Option<String>,

        /// Name of the new index. Defaults to `<index_prefix><changeID>`.
        #[arg(long)]
        index: Option<String>,

        /// Show the diff without touching the index or the snapshot.
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete every index except the active one.
    Cleanup {
        /// Index to keep. Defaults to the one named by `cleanup.version_url`.
        #[arg(long)]
        keep: Option<String>,
    },
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("info")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli, cancel: CancellationToken) -> anyhow::Result<()> {
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Changes => commands::run_changes(&cfg)?,
        Commands::Diff { new, old, persist } => {
            commands::run_diff(&cfg, &new, old.as_deref(), persist)?
        }
        Commands::Publish {
            from,
            index,
            dry_run,
        } => {
            let options = PublishOptions {
                from,
                index,
                dry_run,
            };
            commands::run_publish(&cfg, options, &cancel).await?
        }
        Commands::Cleanup { keep } => commands::run_cleanup(&cfg, keep).await?,
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling");
            on_signal.cancel();
        }
    });

    match run(cli, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(exit_code_for(&err) as u8)
        }
    }
}
