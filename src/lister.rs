use std::convert::Infallible;

use tracing::debug;

use crate::catalog::ListQuery;
use crate::config::SnapshotConfig;
use crate::executor::{progress_finish, progress_start};
use crate::k8s::Runner;
use crate::retry::{retry, Attempt, Retried, Sleeper};

/// Names returned by a listing query.
///
/// `names` is empty both when the cluster has nothing to list and when every
/// attempt failed; `failed` tells the two apart for callers that care.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub names: Vec<String>,
    pub failed: bool,
    pub attempts: u32,
}

impl From<Retried<Vec<String>>> for Listing {
    fn from(outcome: Retried<Vec<String>>) -> Self {
        let failed = !outcome.succeeded();
        Self {
            names: outcome.value.unwrap_or_default(),
            failed,
            attempts: outcome.attempts,
        }
    }
}

/// Discovers cluster object names with the same retry policy as the executor.
pub struct ObjectLister<'a> {
    runner: &'a dyn Runner,
    sleeper: &'a dyn Sleeper,
    config: &'a SnapshotConfig,
}

impl<'a> ObjectLister<'a> {
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

    /// Lists names matching `query`. Never fails; see [`Listing`].
    pub fn list(&self, query: &ListQuery) -> Listing {
        let cmd = self.config.connection.list_command(query);
        progress_start(&cmd);

        let outcome = retry(&self.config.backoff, self.sleeper, |attempt| {
            debug!(attempt, args = ?cmd.args, "listing {}", query.object_type);
            let result = match self.runner.run_capture(&cmd, self.config.exec_timeout) {
                Ok(out) if out.completion.success() => {
                    Attempt::Success(split_names(&out.stdout))
                }
                Ok(out) => {
                    Attempt::Failed(format!("{:?}: {}", out.completion, out.stderr.trim()))
                }
                Err(err) => Attempt::Failed(format!("{err:#}")),
            };
            Ok::<_, Infallible>(result)
        });
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(never) => match never {},
        };

        progress_finish(outcome.succeeded());
        outcome.into()
    }
}

/// Splits jsonpath output on single spaces, dropping empty tokens.
pub fn split_names(stdout: &str) -> Vec<String> {
    stdout
        .trim()
        .split(' ')
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
