use std::fmt;

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_REPLICAS: i32 = 1;
pub const DEFAULT_PORT: i32 = 9944;
pub const DEFAULT_IMAGE: &str = "ghcr.io/madara-alliance/madara:latest";
pub const DEFAULT_NETWORK: &str = "sepolia";

/// A Madara appchain deployment.
///
/// Each `MadaraChain` is backed by a StatefulSet running the nodes and a
/// ClusterIP Service exposing their RPC port. Both are owned by the chain and
/// removed with it by the garbage collector.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[kube(
    kind = "MadaraChain",
    group = "batch.starknet.l3",
    version = "v1alpha1",
    namespaced,
    derive = "Default",
    derive = "PartialEq",
    shortname = "mc",
    printcolumn = r#"{"name":"Chain","type":"string","jsonPath":".spec.chainID"}"#,
    printcolumn = r#"{"name":"Replicas","type":"integer","jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Running","type":"integer","jsonPath":".status.nodesRunning"}"#
)]
#[kube(status = "MadaraChainStatus")]
pub struct MadaraChainSpec {
    /// The custom name of the L3 chain.
    #[serde(rename = "chainID")]
    pub chain_id: String,
    /// The number of nodes.
    #[serde(default = "default_replicas")]
    #[schemars(range(min = 0))]
    pub replicas: i32,
    /// The RPC port exposed by the chain's Service.
    #[serde(default = "default_port")]
    #[schemars(range(min = 1, max = 65535))]
    pub port: i32,
    /// The Madara container image.
    #[serde(default = "default_image")]
    pub image: String,
    /// The Starknet network to settle on (mainnet, sepolia, devnet, ...).
    #[serde(default = "default_network")]
    pub network: String,
}

fn default_replicas() -> i32 {
    DEFAULT_REPLICAS
}

fn default_port() -> i32 {
    DEFAULT_PORT
}

fn default_image() -> String {
    DEFAULT_IMAGE.to_string()
}

fn default_network() -> String {
    DEFAULT_NETWORK.to_string()
}

impl Default for MadaraChainSpec {
    fn default() -> Self {
        Self {
            chain_id: String::new(),
            replicas: default_replicas(),
            port: default_port(),
            image: default_image(),
            network: default_network(),
        }
    }
}

impl MadaraChainSpec {
    /// Checks the bounds the CRD schema declares, for objects that bypassed it.
    pub fn validate(&self) -> Result<(), String> {
        if self.chain_id.trim().is_empty() {
            return Err("chainID must not be empty".to_string());
        }
        if self.replicas < 0 {
            return Err(format!("replicas must be >= 0, got {}", self.replicas));
        }
        if !(1..=65535).contains(&self.port) {
            return Err(format!("port must be within 1-65535, got {}", self.port));
        }
        if self.image.trim().is_empty() {
            return Err("image must not be empty".to_string());
        }
        Ok(())
    }

    pub fn network(&self) -> Network {
        Network::from(self.network.as_str())
    }
}

/// The Starknet network a chain settles on.
///
/// Unknown names are kept as-is so that new networks don't need an operator
/// release.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Sepolia,
    Devnet,
    Other(String),
}

impl From<&str> for Network {
    fn from(value: &str) -> Self {
        match value {
            "mainnet" => Network::Mainnet,
            "sepolia" => Network::Sepolia,
            "devnet" => Network::Devnet,
            other => Network::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => f.write_str("mainnet"),
            Network::Sepolia => f.write_str("sepolia"),
            Network::Devnet => f.write_str("devnet"),
            Network::Other(name) => f.write_str(name),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MadaraChainStatus {
    /// The number of ready nodes.
    #[serde(default)]
    pub nodes_running: i32,
    /// The current state of the chain, one entry per condition type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl MadaraChainStatus {
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    /// Inserts or replaces the condition with the same type.
    ///
    /// An existing entry keeps its position, and keeps its transition time
    /// unless the status actually changed.
    pub fn set_condition(&mut self, condition: Condition) {
        match self.conditions.iter_mut().find(|c| c.type_ == condition.type_) {
            Some(existing) => {
                let last_transition_time = if existing.status == condition.status {
                    existing.last_transition_time
                } else {
                    condition.last_transition_time
                };
                *existing = Condition {
                    last_transition_time,
                    ..condition
                };
            }
            None => self.conditions.push(condition),
        }
    }
}

pub mod condition_types {
    /// All nodes are ready.
    pub const AVAILABLE: &str = "Available";
    /// Nodes are being created, scaled or rolled.
    pub const PROGRESSING: &str = "Progressing";
    /// The last reconciliation failed or the spec is invalid.
    pub const DEGRADED: &str = "Degraded";
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, Default, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (Available, Progressing, Degraded)
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    /// Machine-readable reason, in PascalCase
    pub reason: String,
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }
}
