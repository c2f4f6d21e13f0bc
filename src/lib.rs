pub mod archive;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod k8s;
pub mod lister;
pub mod retry;
pub mod snapshot;

use anyhow::{Context, Result};
use cli::Args;
use config::SnapshotConfig;
use k8s::Runner;
use retry::Sleeper;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub fn run(args: Args) -> Result<()> {
    // 一次快照执行的主编排流程。
    let config = SnapshotConfig::from_args(&args)?;
    let archive = take_snapshot(
        &k8s::SystemRunner,
        &retry::RealSleeper,
        &config,
        &args.output_dir,
    )?;
    println!("Created snapshot: {}", archive.display());
    Ok(())
}

/// Collects a snapshot into a temporary tree and packs it into `output_dir`.
/// Parameters: `runner` (&dyn Runner) executes kubectl.
/// Parameters: `sleeper` (&dyn Sleeper) waits between retries.
/// Parameters: `config` (&SnapshotConfig) connection, timeout and backoff settings.
/// Parameters: `output_dir` (&Path) directory the archive lands in.
/// Returns: Result<PathBuf> path of the created archive.
pub fn take_snapshot(
    runner: &dyn Runner,
    sleeper: &dyn Sleeper,
    config: &SnapshotConfig,
    output_dir: &Path,
) -> Result<PathBuf> {
    // TempDir 在任何退出路径上都会删除工作目录。
    let workspace = tempfile::tempdir().context("failed to create temporary workspace")?;

    let summary = snapshot::Walker::new(runner, sleeper, config).collect(workspace.path())?;
    if summary.failed_commands > 0 || summary.failed_listings > 0 {
        warn!(
            failed_commands = summary.failed_commands,
            failed_listings = summary.failed_listings,
            "snapshot is incomplete; check the archive for error output"
        );
    }

    // 名称在收集结束后生成，与原始工具保持一致。
    let name = archive::current_snapshot_name()?;
    let path = archive::write_archive(workspace.path(), output_dir, &name)?;
    info!(commands = summary.commands, "snapshot complete");
    Ok(path)
}
