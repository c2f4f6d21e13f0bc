use std::path::{Path, PathBuf};

use tracing::info;

use crate::catalog::{KubectlCommand, ListQuery};
use crate::config::SnapshotConfig;
use crate::error::Result;
use crate::executor::Executor;
use crate::k8s::Runner;
use crate::lister::{Listing, ObjectLister};
use crate::retry::Sleeper;

pub const GLOBAL_DIR: &str = "global";
pub const NAMESPACES_DIR: &str = "namespaces";

/// Counts gathered while walking the cluster.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub namespaces: usize,
    pub pods: usize,
    pub containers: usize,
    pub commands: usize,
    pub failed_commands: usize,
    pub failed_listings: usize,
}

/// Output file for `cmd` under `root/subfolder`.
pub fn output_path(root: &Path, subfolder: &Path, cmd: &KubectlCommand) -> PathBuf {
    root.join(subfolder).join(cmd.file_name())
}

/// Walks namespaces, pods and containers, running every catalog command.
pub struct Walker<'a> {
    config: &'a SnapshotConfig,
    executor: Executor<'a>,
    lister: ObjectLister<'a>,
}

impl<'a> Walker<'a> {
    pub fn new(
        runner: &'a dyn Runner,
        sleeper: &'a dyn Sleeper,
        config: &'a SnapshotConfig,
    ) -> Self {
        Self {
            config,
            executor: Executor::new(runner, sleeper, config),
            lister: ObjectLister::new(runner, sleeper, config),
        }
    }

    /// Collects the whole snapshot tree under `root`.
    ///
    /// Cluster failures only shrink the tree; the returned error is always a
    /// filesystem problem.
    pub fn collect(&self, root: &Path) -> Result<Summary> {
        let mut summary = Summary::default();
        let conn = &self.config.connection;

        // 先拿到命名空间列表，再执行全局命令，顺序与输出布局保持一致。
        let namespaces = self.list(&ListQuery::namespaces(), &mut summary);
        info!(count = namespaces.len(), "discovered namespaces");

        for cmd in conn.global_commands() {
            self.run(&cmd, root, Path::new(GLOBAL_DIR), &mut summary)?;
        }

        for namespace in &namespaces {
            summary.namespaces += 1;
            let ns_dir = Path::new(NAMESPACES_DIR).join(namespace);
            for cmd in conn.namespace_commands(namespace) {
                self.run(&cmd, root, &ns_dir, &mut summary)?;
            }

            let pods = self.list(&ListQuery::pods(namespace), &mut summary);
            for pod in &pods {
                summary.pods += 1;
                let pod_dir = ns_dir.join(pod);
                let containers = self.list(&ListQuery::containers(namespace, pod), &mut summary);
                for container in &containers {
                    summary.containers += 1;
                    for cmd in conn.container_commands(namespace, pod, container) {
                        self.run(&cmd, root, &pod_dir, &mut summary)?;
                    }
                }
            }
        }

        info!(?summary, "collection finished");
        Ok(summary)
    }

    fn list(&self, query: &ListQuery, summary: &mut Summary) -> Vec<String> {
        let Listing { names, failed, .. } = self.lister.list(query);
        if failed {
            summary.failed_listings += 1;
        }
        names
    }

    fn run(
        &self,
        cmd: &KubectlCommand,
        root: &Path,
        subfolder: &Path,
        summary: &mut Summary,
    ) -> Result<()> {
        let execution = self.executor.execute(cmd, &output_path(root, subfolder, cmd))?;
        summary.commands += 1;
        if !execution.succeeded() {
            summary.failed_commands += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::Connection;
    use crate::k8s::{FakeRunner, Reply};
    use crate::retry::RecordingSleeper;
    use std::collections::BTreeSet;

    pub(crate) const LIST_NAMESPACES: &str =
        "kubectl get namespaces --request-timeout 15s -o jsonpath={.items[*].metadata.name}";
    pub(crate) const LIST_PODS_DEFAULT: &str =
        "kubectl get pods --request-timeout 15s -o jsonpath={.items[*].metadata.name} -n default";
    pub(crate) const LIST_CONTAINERS_WEB: &str =
        "kubectl get pod --request-timeout 15s -o jsonpath={.spec.containers[*].name} web-0 -n default";

    pub(crate) fn config() -> SnapshotConfig {
        SnapshotConfig::new(Connection {
            kubectl: "kubectl".to_string(),
            kubeconfig: None,
            request_timeout: 15,
        })
    }

    pub(crate) fn one_pod_cluster() -> FakeRunner {
        FakeRunner::default()
            .on(LIST_NAMESPACES, vec![Reply::ok("default")])
            .on(LIST_PODS_DEFAULT, vec![Reply::ok("web-0")])
            .on(LIST_CONTAINERS_WEB, vec![Reply::ok("app")])
    }

    /// Every file under `root`, relative to it.
    pub(crate) fn tree(root: &Path) -> BTreeSet<PathBuf> {
        let mut files = BTreeSet::new();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in std::fs::read_dir(&dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    pending.push(path);
                } else {
                    files.insert(path.strip_prefix(root).unwrap().to_path_buf());
                }
            }
        }
        files
    }

    fn count_in(files: &BTreeSet<PathBuf>, dir: &str) -> usize {
        files
            .iter()
            .filter(|p| p.parent() == Some(Path::new(dir)))
            .count()
    }

    #[test]
    fn output_path_underscores_command() {
        let cmd = KubectlCommand::new("kubectl")
            .args(["get", "all", "-o", "wide", "--namespace", "foo"]);
        let path = output_path(Path::new("/snap"), Path::new("namespaces/foo"), &cmd);
        assert_eq!(
            path,
            PathBuf::from("/snap/namespaces/foo/kubectl_get_all_-o_wide_--namespace_foo")
        );
    }

    #[test]
    fn empty_cluster_only_has_globals() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = FakeRunner::default().on(LIST_NAMESPACES, vec![Reply::ok("")]);
        let sleeper = RecordingSleeper::default();
        let cfg = config();

        let summary = Walker::new(&runner, &sleeper, &cfg).collect(tmp.path()).unwrap();

        let files = tree(tmp.path());
        assert_eq!(files.len(), 14);
        assert_eq!(count_in(&files, "global"), 14);
        assert!(!tmp.path().join("namespaces").exists());
        assert_eq!(summary.commands, 14);
        assert_eq!(summary.namespaces, 0);
    }

    #[test]
    fn one_pod_cluster_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = one_pod_cluster();
        let sleeper = RecordingSleeper::default();
        let cfg = config();

        let summary = Walker::new(&runner, &sleeper, &cfg).collect(tmp.path()).unwrap();

        let files = tree(tmp.path());
        assert_eq!(count_in(&files, "global"), 14);
        assert_eq!(count_in(&files, "namespaces/default"), 3);
        assert_eq!(count_in(&files, "namespaces/default/web-0"), 1);
        assert_eq!(files.len(), 18);
        assert!(files.contains(Path::new(
            "namespaces/default/web-0/kubectl_logs_web-0_--container_app_--request-timeout_15s_--namespace_default"
        )));
        assert_eq!(
            summary,
            Summary {
                namespaces: 1,
                pods: 1,
                containers: 1,
                commands: 18,
                failed_commands: 0,
                failed_listings: 0,
            }
        );
        assert!(sleeper.delays().is_empty());
    }

    #[test]
    fn traversal_order() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = one_pod_cluster();
        let sleeper = RecordingSleeper::default();
        let cfg = config();

        Walker::new(&runner, &sleeper, &cfg).collect(tmp.path()).unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1 + 14 + 3 + 1 + 1 + 1);
        assert_eq!(calls[0], LIST_NAMESPACES);
        assert_eq!(calls[1], "kubectl version --request-timeout 15s");
        assert_eq!(
            calls[15],
            "kubectl get all -o wide --request-timeout 15s --namespace default"
        );
        assert_eq!(calls[18], LIST_PODS_DEFAULT);
        assert_eq!(calls[19], LIST_CONTAINERS_WEB);
        assert!(calls[20].starts_with("kubectl logs web-0 --container app"));
    }

    #[test]
    fn failed_pod_listing_skips_logs() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = FakeRunner::default()
            .on(LIST_NAMESPACES, vec![Reply::ok("default")])
            .on(LIST_PODS_DEFAULT, vec![Reply::fail(1, "forbidden")]);
        let sleeper = RecordingSleeper::default();
        let cfg = config();

        let summary = Walker::new(&runner, &sleeper, &cfg).collect(tmp.path()).unwrap();

        assert_eq!(summary.failed_listings, 1);
        assert_eq!(summary.pods, 0);
        assert_eq!(summary.commands, 17);
        assert!(!tmp.path().join("namespaces/default/web-0").exists());
    }

    #[test]
    fn failed_commands_still_leave_files() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = FakeRunner::default()
            .on(LIST_NAMESPACES, vec![Reply::ok("")])
            .on(
                "kubectl describe nodes --request-timeout 15s",
                vec![Reply::fail(1, "error: the server doesn't have a resource type \"nodes\"\n")],
            );
        let sleeper = RecordingSleeper::default();
        let cfg = config();

        let summary = Walker::new(&runner, &sleeper, &cfg).collect(tmp.path()).unwrap();

        assert_eq!(summary.failed_commands, 1);
        let content = std::fs::read_to_string(
            tmp.path()
                .join("global/kubectl_describe_nodes_--request-timeout_15s"),
        )
        .unwrap();
        assert!(content.contains("doesn't have a resource type"));
    }

    #[test]
    fn rerun_produces_same_layout() {
        let cfg = config();
        let sleeper = RecordingSleeper::default();

        let first = tempfile::tempdir().unwrap();
        Walker::new(&one_pod_cluster(), &sleeper, &cfg)
            .collect(first.path())
            .unwrap();
        let second = tempfile::tempdir().unwrap();
        Walker::new(&one_pod_cluster(), &sleeper, &cfg)
            .collect(second.path())
            .unwrap();

        assert_eq!(tree(first.path()), tree(second.path()));
    }

    #[test]
    fn duplicate_names_share_output() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = one_pod_cluster().on(LIST_CONTAINERS_WEB, vec![Reply::ok("app app")]);
        let sleeper = RecordingSleeper::default();
        let cfg = config();

        let summary = Walker::new(&runner, &sleeper, &cfg).collect(tmp.path()).unwrap();

        // Both containers run, the second overwrites the first's file.
        assert_eq!(summary.containers, 2);
        assert_eq!(count_in(&tree(tmp.path()), "namespaces/default/web-0"), 1);
    }
}
