//! gridmount binary
//!
//! Mounts one collection of a blob store as a read-mostly filesystem.
//!
//! ## Usage
//!
//! ```bash
//! gridmount <database> <collection> <mountpoint>
//! gridmount <uri> <mountpoint>
//!
//! # e.g.
//! gridmount /var/lib/gridmount/files.db photos /mnt/photos
//! gridmount sqlite:///var/lib/gridmount/files.db/photos /mnt/photos
//! ```
//!
//! Runs in the foreground until the mount point is unmounted.

use std::process::ExitCode;

use clap::Parser;
use gridmount_kernel::{FlatFs, MountConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "gridmount [<database> <collection>|<uri>] <mountpoint>";

#[derive(Parser, Debug)]
#[command(name = "gridmount", version, override_usage = USAGE)]
#[command(about = "Mount a flat blob store collection as a directory tree")]
struct Cli {
    /// `<database> <collection> <mountpoint>` or `<uri> <mountpoint>`
    #[arg(value_name = "ARGS", num_args = 2..=3, required = true)]
    args: Vec<String>,

    /// Let users other than the mounting user access the filesystem
    #[arg(long)]
    allow_other: bool,
}

fn print_usage() {
    eprintln!("usage: {USAGE}");
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => {
            // --help / --version
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(_) => {
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    let config = match MountConfig::from_args(cli.args.as_slice()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    match run(&config, cli.allow_other) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &MountConfig, allow_other: bool) -> anyhow::Result<()> {
    let store = config.target.open()?;
    tracing::info!(
        database = %config.target.database.display(),
        collection = %config.target.collection,
        mount_point = %config.mount_point().display(),
        "mounting"
    );

    gridmount_fuse::mount(FlatFs::new(store), config.mount_point(), allow_other)?;
    tracing::info!("unmounted");
    Ok(())
}
