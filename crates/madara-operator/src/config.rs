use std::net::SocketAddr;

use clap::Parser;

/// Runs the MadaraChain operator.
#[derive(Parser, Debug, Clone)]
#[command(name = "madara-operator", version)]
pub struct Config {
    /// Namespace to watch. Every namespace is watched when unset.
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Namespace used by the HTTP API when none is given.
    #[arg(long, env = "API_NAMESPACE", default_value = "default")]
    pub api_namespace: String,

    /// Address of the health and API server.
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: SocketAddr,

    /// Name of the pod running the operator, reported on Events.
    #[arg(long, env = "CONTROLLER_POD_NAME")]
    pub controller_pod_name: Option<String>,

    /// Emit logs as JSON instead of the compact format.
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}
