use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::info;

use crate::error::{Result, SnapshotError};

/// Base name for a snapshot taken at `epoch` seconds.
pub fn snapshot_name(epoch: u64) -> String {
    format!("snapshot-{epoch}")
}

/// Snapshot base name for the current time.
pub fn current_snapshot_name() -> Result<String> {
    let epoch = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    Ok(snapshot_name(epoch))
}

/// Packs `source` into `<dest_dir>/<name>.tar.gz` under a top-level `<name>/`.
/// Parameters: `source` (&Path) directory tree to archive.
/// Parameters: `dest_dir` (&Path) directory the archive is created in.
/// Parameters: `name` (&str) archive base name, also the top-level directory.
/// Returns: Result<PathBuf> path of the written archive.
pub fn write_archive(source: &Path, dest_dir: &Path, name: &str) -> Result<PathBuf> {
    let path = dest_dir.join(format!("{name}.tar.gz"));
    pack(source, &path, name).map_err(|source| SnapshotError::Archive {
        path: path.clone(),
        source,
    })?;
    info!(path = %path.display(), "archive written");
    Ok(path)
}

fn pack(source: &Path, path: &Path, name: &str) -> io::Result<()> {
    let file = File::create(path)?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.append_dir_all(name, source)?;
    // 必须显式结束 gzip 流，否则尾部校验和不会写入。
    builder.into_inner()?.finish()?.sync_all()
}
