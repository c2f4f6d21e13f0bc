use std::fmt;
use std::path::PathBuf;

/// Field expression that extracts every item name from a list response.
pub const ITEM_NAMES: &str = "{.items[*].metadata.name}";

/// Field expression that extracts container names from a single pod.
pub const CONTAINER_NAMES: &str = "{.spec.containers[*].name}";

/// A kubectl invocation as an explicit argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubectlCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl KubectlCommand {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Output file name: the display form with every space turned into `_`.
    pub fn file_name(&self) -> String {
        self.to_string().replace(' ', "_")
    }
}

impl fmt::Display for KubectlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Connection and timeout flags shared by every command of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub kubectl: String,
    /// Absolute kubeconfig path; `None` lets kubectl use its own discovery.
    pub kubeconfig: Option<PathBuf>,
    /// Value for `--request-timeout`, in seconds.
    pub request_timeout: u64,
}

impl Connection {
    fn base(&self) -> KubectlCommand {
        KubectlCommand::new(&self.kubectl)
    }

    fn kubeconfig_args(&self) -> Vec<String> {
        match &self.kubeconfig {
            Some(path) => vec!["--kubeconfig".to_string(), path.display().to_string()],
            None => Vec::new(),
        }
    }

    fn timeout_args(&self) -> [String; 2] {
        ["--request-timeout".to_string(), format!("{}s", self.request_timeout)]
    }

    /// Cluster-scoped inspection commands, in execution order.
    pub fn global_commands(&self) -> Vec<KubectlCommand> {
        const VIEWS: &[&[&str]] = &[
            &["version"],
            &["cluster-info"],
            &["get", "clusterroles", "-o", "wide"],
            &["get", "clusterrolebindings", "-o", "wide"],
            &["get", "crd", "-o", "wide"],
            &["get", "nodes", "-o", "wide"],
            &["get", "clusterroles", "-o", "yaml"],
            &["get", "clusterrolebindings", "-o", "yaml"],
            &["get", "crd", "-o", "yaml"],
            &["get", "nodes", "-o", "yaml"],
            &["describe", "clusterroles"],
            &["describe", "clusterrolebindings"],
            &["describe", "crd"],
            &["describe", "nodes"],
        ];

        VIEWS
            .iter()
            .map(|view| {
                self.base()
                    .args(view.iter().copied())
                    .args(self.kubeconfig_args())
                    .args(self.timeout_args())
            })
            .collect()
    }

    /// Inspection commands run once per namespace.
    pub fn namespace_commands(&self, namespace: &str) -> Vec<KubectlCommand> {
        const VIEWS: &[&[&str]] = &[
            &["get", "all", "-o", "wide"],
            &["get", "all", "-o", "yaml"],
            &["describe", "all"],
        ];

        VIEWS
            .iter()
            .map(|view| {
                self.base()
                    .args(view.iter().copied())
                    .args(self.kubeconfig_args())
                    .args(self.timeout_args())
                    .args(["--namespace", namespace])
            })
            .collect()
    }

    /// Commands run once per container of a pod.
    pub fn container_commands(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
    ) -> Vec<KubectlCommand> {
        vec![self
            .base()
            .arg("logs")
            .args(self.kubeconfig_args())
            .args([pod, "--container", container])
            .args(self.timeout_args())
            .args(["--namespace", namespace])]
    }

    /// Builds the name-listing query for `query`.
    pub fn list_command(&self, query: &ListQuery) -> KubectlCommand {
        let mut cmd = self
            .base()
            .args(["get", query.object_type.as_str()])
            .args(self.kubeconfig_args())
            .args(self.timeout_args())
            .args(["-o".to_string(), format!("jsonpath={}", query.field_expression)]);
        if let Some(name) = &query.object_name {
            cmd = cmd.arg(name.as_str());
        }
        if let Some(ns) = &query.namespace {
            cmd = cmd.args(["-n", ns.as_str()]);
        }
        cmd
    }
}

/// What to list and which field to extract from each match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub object_type: String,
    pub namespace: Option<String>,
    pub object_name: Option<String>,
    pub field_expression: String,
}

impl ListQuery {
    pub fn namespaces() -> Self {
        Self {
            object_type: "namespaces".to_string(),
            namespace: None,
            object_name: None,
            field_expression: ITEM_NAMES.to_string(),
        }
    }

    pub fn pods(namespace: &str) -> Self {
        Self {
            object_type: "pods".to_string(),
            namespace: Some(namespace.to_string()),
            object_name: None,
            field_expression: ITEM_NAMES.to_string(),
        }
    }

    pub fn containers(namespace: &str, pod: &str) -> Self {
        Self {
            object_type: "pod".to_string(),
            namespace: Some(namespace.to_string()),
            object_name: Some(pod.to_string()),
            field_expression: CONTAINER_NAMES.to_string(),
        }
    }
}
