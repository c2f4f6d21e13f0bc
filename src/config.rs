use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::Connection;
use crate::cli::Args;
use crate::error::{Result, SnapshotError};
use crate::retry::BackoffPolicy;

/// Hard wall-clock limit for a single kubectl invocation.
pub const EXEC_TIMEOUT: Duration = Duration::from_secs(60);

/// Everything a snapshot run needs to know up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotConfig {
    pub connection: Connection,
    pub exec_timeout: Duration,
    pub backoff: BackoffPolicy,
}

impl SnapshotConfig {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            exec_timeout: EXEC_TIMEOUT,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Builds the run configuration from parsed flags.
    ///
    /// An empty kubeconfig means kubectl's own discovery; anything else is
    /// made absolute so it stays valid regardless of where kubectl runs.
    pub fn from_args(args: &Args) -> Result<Self> {
        let kubeconfig = if args.kubeconfig.is_empty() {
            None
        } else {
            Some(absolute(Path::new(&args.kubeconfig))?)
        };

        Ok(Self::new(Connection {
            kubectl: args.kubectl.clone(),
            kubeconfig,
            request_timeout: args.timeout,
        }))
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|source| SnapshotError::Kubeconfig {
        path: path.to_path_buf(),
        source,
    })
}
