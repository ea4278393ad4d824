pub mod api;
pub mod config;
mod controller;
pub mod crd;
mod drift;
pub mod events;
mod reconcilier;

pub mod k8s_helper;
pub use controller::{ErrorBackoff, controller, error_policy};
pub use crd::{MadaraChain, MadaraChainSpec, MadaraChainStatus};
pub use reconcilier::Error;
pub use reconcilier::client::{ChainClient, KubeChainClient};
pub use reconcilier::implementation::{Context, Outcome, reconcile, reconcile_chain};
