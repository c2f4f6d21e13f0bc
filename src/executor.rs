use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::catalog::KubectlCommand;
use crate::config::SnapshotConfig;
use crate::error::{Result, SnapshotError};
use crate::k8s::{Completion, Runner};
use crate::retry::{retry, Attempt, Retried, Sleeper};

/// Result of running one inspection command into its output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub path: PathBuf,
    pub outcome: Retried<()>,
}

impl Execution {
    pub fn succeeded(&self) -> bool {
        self.outcome.succeeded()
    }
}

/// Runs inspection commands with retries, one output file per command.
pub struct Executor<'a> {
    runner: &'a dyn Runner,
    sleeper: &'a dyn Sleeper,
    config: &'a SnapshotConfig,
}

impl<'a> Executor<'a> {
    pub fn new(
        runner: &'a dyn Runner,
        sleeper: &'a dyn Sleeper,
        config: &'a SnapshotConfig,
    ) -> Self {
        Self {
            runner,
            sleeper,
            config,
        }
    }

    /// Runs `cmd`, writing its combined output to `output_path`.
    ///
    /// The file is created before the first attempt, so it exists even when
    /// every attempt fails. Only filesystem problems are returned as errors.
    pub fn execute(&self, cmd: &KubectlCommand, output_path: &Path) -> Result<Execution> {
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).map_err(|source| SnapshotError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = File::create(output_path).map_err(|source| SnapshotError::CreateFile {
            path: output_path.to_path_buf(),
            source,
        })?;

        progress_start(cmd);
        let timeout = self.config.exec_timeout;
        let outcome = retry(&self.config.backoff, self.sleeper, |attempt| {
            debug!(attempt, args = ?cmd.args, "running {}", cmd.program);
            // Failures kubectl cannot report itself get a marker line in the file.
            let (result, marker) = match self.runner.run_to_file(cmd, &file, timeout) {
                Ok(completion) if completion.success() => (Attempt::Success(()), None),
                Ok(Completion::TimedOut) => {
                    let reason = format!("command timed out after {timeout:?}");
                    (Attempt::Failed(reason.clone()), Some(reason))
                }
                Ok(Completion::Signalled) => {
                    let reason = "command terminated by a signal".to_string();
                    (Attempt::Failed(reason.clone()), Some(reason))
                }
                Ok(completion) => (Attempt::Failed(format!("{completion:?}")), None),
                Err(err) => {
                    let reason = format!("{err:#}");
                    (Attempt::Failed(reason.clone()), Some(reason))
                }
            };
            if let Some(marker) = marker {
                let mut sink = &file;
                writeln!(sink, "\nerror: {marker}").map_err(|source| {
                    SnapshotError::WriteFile {
                        path: output_path.to_path_buf(),
                        source,
                    }
                })?;
            }
            Ok::<_, SnapshotError>(result)
        })?;
        progress_finish(outcome.succeeded());

        Ok(Execution {
            path: output_path.to_path_buf(),
            outcome,
        })
    }
}

pub(crate) fn progress_start(cmd: &KubectlCommand) {
    let mut out = io::stdout().lock();
    let _ = write!(out, "Executing: {cmd}... ");
    let _ = out.flush();
}

pub(crate) fn progress_finish(ok: bool) {
    println!("{}", if ok { "[ DONE ]" } else { "[ FAIL ]" });
}
