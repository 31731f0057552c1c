//! confsync CLI
//!
//! Command-line lifecycle tasks against a managed network-configuration
//! system.
//!
//! # Commands
//!
//! - `backup` - Save configuration items to a local snapshot
//! - `restore` - Push a snapshot back to the live system
//! - `delete` - Delete matched items in dependency order
//! - `migrate` - Copy a snapshot with name templating and version gating
//! - `attach` - Re-drive device template attachments
//! - `detach` - Detach devices from device templates

mod commands;
mod http;

use clap::{Parser, Subcommand};
use confsync_catalog::Catalog;
use confsync_engine::LiveTarget;
use confsync_transport::{RestTransport, RetryPolicy};
use http::UreqBackend;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// confsync command-line configuration tools.
#[derive(Parser)]
#[command(name = "confsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the managed system's API (e.g. https://vm1/dataservice)
    #[arg(global = true, long)]
    url: Option<String>,

    /// API token; falls back to the CONFSYNC_TOKEN environment variable
    #[arg(global = true, long)]
    token: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save configuration items to a local snapshot
    Backup {
        /// Snapshot directory
        #[arg(long)]
        dir: PathBuf,

        /// Category tag to back up
        #[arg(long, default_value = "all")]
        tag: String,

        /// Only names matching this pattern
        #[arg(long)]
        include: Option<String>,

        /// Skip names matching this pattern
        #[arg(long)]
        exclude: Option<String>,

        /// Append item ids to snapshot file names
        #[arg(long)]
        extended_naming: bool,
    },

    /// Push a snapshot back to the live system
    Restore {
        /// Snapshot directory
        #[arg(long)]
        dir: PathBuf,

        /// Category tag to restore
        #[arg(long, default_value = "all")]
        tag: String,

        /// Only names matching this pattern
        #[arg(long)]
        include: Option<String>,

        /// Skip names matching this pattern
        #[arg(long)]
        exclude: Option<String>,

        /// Update items that already exist on the target
        #[arg(long)]
        update: bool,

        /// Reattach device templates from snapshot attachment records
        #[arg(long)]
        attach: bool,

        /// Report what would be done without doing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete matched items in dependency order
    Delete {
        /// Category tag to delete from
        #[arg(long, default_value = "all")]
        tag: String,

        /// Only names matching this pattern
        #[arg(long)]
        include: Option<String>,

        /// Skip names matching this pattern
        #[arg(long)]
        exclude: Option<String>,

        /// Detach devices before deleting device templates
        #[arg(long)]
        detach: bool,

        /// Report what would be done without doing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Copy a snapshot with name templating and version gating
    Migrate {
        /// Source snapshot directory
        #[arg(long)]
        dir: PathBuf,

        /// Destination snapshot directory
        #[arg(long)]
        out: PathBuf,

        /// Name template; `{name}` expands to the original name
        #[arg(long, default_value = "{name}")]
        name_template: String,

        /// Target backend version for category gating
        #[arg(long)]
        to_version: Option<String>,
    },

    /// Re-drive device template attachments
    Attach {
        /// Device template names matching this pattern
        #[arg(long)]
        templates: String,

        /// Read attachment records from this snapshot instead of the
        /// live system
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Report what would be done without doing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Detach devices from device templates
    Detach {
        /// Device template names matching this pattern
        #[arg(long)]
        templates: String,

        /// Report what would be done without doing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let catalog = Catalog::builtin();

    match cli.command {
        Commands::Backup {
            dir,
            tag,
            include,
            exclude,
            extended_naming,
        } => {
            let client = connect(&cli.url, cli.token)?;
            let target = LiveTarget::new(&client, &catalog);
            commands::backup::run(
                &target,
                &catalog,
                &dir,
                &tag,
                include.as_deref(),
                exclude.as_deref(),
                extended_naming,
            )?;
        }
        Commands::Restore {
            dir,
            tag,
            include,
            exclude,
            update,
            attach,
            dry_run,
        } => {
            let client = connect(&cli.url, cli.token)?;
            let target = LiveTarget::new(&client, &catalog);
            commands::restore::run(
                &target,
                &catalog,
                &dir,
                &tag,
                include.as_deref(),
                exclude.as_deref(),
                update,
                attach,
                dry_run,
            )?;
        }
        Commands::Delete {
            tag,
            include,
            exclude,
            detach,
            dry_run,
        } => {
            let client = connect(&cli.url, cli.token)?;
            let target = LiveTarget::new(&client, &catalog);
            commands::delete::run(
                &target,
                &catalog,
                &tag,
                include.as_deref(),
                exclude.as_deref(),
                detach,
                dry_run,
            )?;
        }
        Commands::Migrate {
            dir,
            out,
            name_template,
            to_version,
        } => {
            commands::migrate::run(&catalog, &dir, &out, &name_template, to_version.as_deref())?;
        }
        Commands::Attach {
            templates,
            dir,
            dry_run,
        } => {
            let client = connect(&cli.url, cli.token)?;
            let target = LiveTarget::new(&client, &catalog);
            commands::attach::run(&target, &templates, dir.as_deref(), dry_run)?;
        }
        Commands::Detach { templates, dry_run } => {
            let client = connect(&cli.url, cli.token)?;
            let target = LiveTarget::new(&client, &catalog);
            commands::detach::run(&target, &templates, dry_run)?;
        }
        Commands::Version => {
            println!("confsync v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn connect(
    url: &Option<String>,
    token: Option<String>,
) -> Result<RestTransport<UreqBackend>, Box<dyn std::error::Error>> {
    let url = url
        .clone()
        .ok_or("Base URL required (--url) for live operations")?;
    let token = token.or_else(|| std::env::var("CONFSYNC_TOKEN").ok());

    Ok(RestTransport::new(
        url,
        UreqBackend::new(token),
        RetryPolicy::new(),
    ))
}
