use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use package_mirror::config::SyncConfig;
use package_mirror::registry::repository::Repository;
use package_mirror::registry::store::FsStore;
use package_mirror::registry::upstream::HttpUpstream;
use package_mirror::sync::SyncOrchestrator;

#[derive(Parser)]
#[command(name = "package-mirror")]
#[command(version, about = "Backend of a package registry mirror")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Harvest new upstream releases into the blob store
    Sync {
        /// Root directory of the blob store
        #[arg(long, default_value = "package-mirror-data")]
        store_root: PathBuf,
        /// Path to the external compiler binary
        #[arg(long)]
        compiler: Option<PathBuf>,
        /// Base URL of the upstream package directory
        #[arg(long)]
        upstream: Option<String>,
        /// Base URL archives are downloaded from
        #[arg(long)]
        archives: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Sync {
            store_root,
            compiler,
            upstream,
            archives,
        } => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?
            .block_on(run_sync(store_root, compiler, upstream, archives)),
    }
}

async fn run_sync(
    store_root: PathBuf,
    compiler: Option<PathBuf>,
    upstream: Option<String>,
    archives: Option<String>,
) -> anyhow::Result<()> {
    let mut config = SyncConfig::default();
    if let Some(compiler) = compiler {
        config.compiler_path = compiler;
    }
    if let Some(upstream) = upstream {
        config.upstream_base_url = upstream;
    }
    if let Some(archives) = archives {
        config.archive_base_url = archives;
    }

    let repository = Arc::new(Repository::new(FsStore::new(store_root)));
    let upstream = Arc::new(HttpUpstream::new(
        &config.upstream_base_url,
        &config.archive_base_url,
    ));

    let report = SyncOrchestrator::new(repository, upstream, &config)
        .run()
        .await?;
    tracing::info!(
        "sync complete: {} harvested, {} failed of {} attempted",
        report.succeeded,
        report.failed,
        report.attempted
    );
    Ok(())
}
