use std::io;
use std::path::PathBuf;

/// Infrastructure failures that abort a snapshot run.
///
/// Cluster-side failures never show up here: they are retried and then
/// recorded in the output tree instead.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to create directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create output file {path}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write output file {path}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write archive {path}")]
    Archive {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to resolve kubeconfig path {path}")]
    Kubeconfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("system clock is before the unix epoch")]
    Clock(#[from] std::time::SystemTimeError),
}

pub type Result<T> = std::result::Result<T, SnapshotError>;
