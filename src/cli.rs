use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "ksnap",
    version,
    about = "Collect a diagnostic snapshot of a Kubernetes cluster into a tar.gz"
)]
pub struct Args {
    // 为空时交给 kubectl 自行发现配置。
    /// Path to the kubeconfig used for every kubectl call.
    #[arg(long, env = "KUBECONFIG", default_value = "")]
    pub kubeconfig: String,

    /// Request timeout for kubectl calls, in seconds.
    #[arg(long, default_value_t = 15)]
    pub timeout: u64,

    /// Directory the snapshot archive is written to.
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// kubectl binary to invoke.
    #[arg(long, default_value = "kubectl")]
    pub kubectl: String,
}
