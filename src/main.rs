// SPDX-License-Identifier: AGPL-3.0-or-later

//! sonarsnap - Quality Snapshot Tool
//!
//! Pulls code-quality metrics from a SonarQube / SonarCloud server, keeps
//! them as flat-file snapshots, and diffs two snapshots.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use sonarsnap::api::SonarClient;
use sonarsnap::collect::{collect_snapshot, CollectOptions};
use sonarsnap::compare::{compare_with, CompareMode, FailPolicy};
use sonarsnap::config::{SonarConfig, DEFAULT_HOST_URL};
use sonarsnap::report::{OutputFormat, Reporter};
use sonarsnap::store::{default_snapshot_name, SnapshotStore};

/// Quality snapshot tool for SonarQube-compatible servers
#[derive(Parser, Debug)]
#[command(name = "sonarsnap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding saved snapshots
    #[arg(short, long, env = "SONARSNAP_DIR", default_value = "reports")]
    dir: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch the current quality data and save it as a snapshot
    Fetch {
        /// Project key on the server
        #[arg(short, long, env = "SONAR_PROJECT_KEY")]
        project: String,

        /// Server base URL
        #[arg(long, env = "SONAR_HOST_URL", default_value = DEFAULT_HOST_URL)]
        host: String,

        /// User token
        #[arg(long, env = "SONAR_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// SonarCloud organization
        #[arg(long, env = "SONAR_ORGANIZATION")]
        organization: Option<String>,

        /// Snapshot name (defaults to <project>-<timestamp>)
        #[arg(short, long)]
        name: Option<String>,

        /// Comma-separated metric keys to request
        #[arg(long, value_delimiter = ',')]
        metrics: Vec<String>,
    },

    /// Compare two saved snapshots
    Compare {
        /// Older snapshot (name in the snapshot directory, or a path)
        from: String,

        /// Newer snapshot
        to: String,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also save the comparison as JSON under this name
        #[arg(long)]
        save: Option<String>,

        /// Report measure values that are not numbers, and fail if any
        #[arg(long)]
        strict: bool,

        /// Exit with status 1 when anything regressed
        #[arg(long)]
        fail_on_regression: bool,
    },

    /// List saved snapshots
    List,

    /// Show a saved snapshot
    Show {
        /// Snapshot name or path
        name: String,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so reports on stdout stay clean
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("sonarsnap={}", log_level).into()),
        )
        .init();

    info!("sonarsnap v{}", env!("CARGO_PKG_VERSION"));

    let store = SnapshotStore::new(&cli.dir);
    let reporter = Reporter::new(cli.format);

    match cli.command {
        Commands::Fetch {
            project,
            host,
            token,
            organization,
            name,
            metrics,
        } => {
            let config = SonarConfig::new(project)
                .with_host_url(host)
                .with_token(token)
                .with_organization(organization)
                .with_metrics(metrics);
            info!("Fetching from {}", config.host_url);

            let client = SonarClient::new(&config)?;
            let snapshot = collect_snapshot(&client, &CollectOptions::from_config(&config)).await?;

            let name = name.unwrap_or_else(|| {
                default_snapshot_name(&config.project_key, chrono::Utc::now())
            });
            let artifacts = store
                .save(&name, &snapshot)
                .with_context(|| format!("Failed to save snapshot '{}'", name))?;
            for path in artifacts.paths() {
                info!("Wrote {}", path.display());
            }

            reporter.output_snapshot(&snapshot, None)?;
        }

        Commands::Compare {
            from,
            to,
            output,
            save,
            strict,
            fail_on_regression,
        } => {
            let from_snapshot = store
                .load_snapshot(&from)
                .with_context(|| format!("Failed to load snapshot '{}'", from))?;
            let to_snapshot = store
                .load_snapshot(&to)
                .with_context(|| format!("Failed to load snapshot '{}'", to))?;

            let mode = if strict { CompareMode::Strict } else { CompareMode::Lenient };
            let comparison = compare_with(&from_snapshot, &to_snapshot, mode);

            for warning in comparison.parse_warnings() {
                warn!("{}", warning);
            }

            reporter.output_comparison(&comparison, output.as_deref())?;

            if let Some(save) = save {
                store.save_comparison(&save, &comparison)?;
            }

            let policy = FailPolicy {
                on_parse_warning: strict,
                on_regression: fail_on_regression,
            };
            if comparison.fails(policy) {
                std::process::exit(1);
            }
        }

        Commands::List => {
            let names = store.list()?;
            if names.is_empty() {
                info!("No snapshots in {}", store.dir().display());
            }
            for name in names {
                println!("{}", name);
            }
        }

        Commands::Show { name, output } => {
            let snapshot = store
                .load_snapshot(&name)
                .with_context(|| format!("Failed to load snapshot '{}'", name))?;
            reporter.output_snapshot(&snapshot, output.as_deref())?;
        }
    }

    Ok(())
}
