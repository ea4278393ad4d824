use k8s_openapi::api::apps::v1::StatefulSet;
use kube::ResourceExt;
use tracing::{debug, info, warn};

use crate::{
    Context, MadaraChain,
    crd::{Condition, ConditionStatus, MadaraChainStatus, condition_types},
    reconcilier::Error,
};

pub mod condition_reasons {
    pub const ALL_NODES_READY: &str = "AllNodesReady";
    pub const NODES_NOT_READY: &str = "NodesNotReady";
    pub const WAITING_FOR_NODES: &str = "WaitingForNodes";
    pub const CONVERGED: &str = "Converged";
    pub const RECONCILED: &str = "Reconciled";
    pub const RECONCILE_FAILED: &str = "ReconcileFailed";
    pub const INVALID_SPEC: &str = "InvalidSpec";
}

pub trait MadaraChainStatusExt {
    /// The stored status, or an empty one.
    fn current_status(&self) -> MadaraChainStatus;
    /// The status after a successful pass against `sts`.
    fn observed_status(&self, sts: &StatefulSet) -> MadaraChainStatus;
    /// The status after a failed pass.
    fn degraded_status(&self, reason: &str, message: &str) -> MadaraChainStatus;
    /// Writes `status` unless it equals the stored one. Returns whether it wrote.
    async fn write_status(&self, ctx: &Context, status: MadaraChainStatus) -> Result<bool, Error>;
}

fn ready_replicas(sts: &StatefulSet) -> i32 {
    sts.status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0)
}

impl MadaraChainStatusExt for MadaraChain {
    fn current_status(&self) -> MadaraChainStatus {
        self.status.clone().unwrap_or_default()
    }

    fn observed_status(&self, sts: &StatefulSet) -> MadaraChainStatus {
        let ready = ready_replicas(sts);
        let desired = self.spec.replicas;
        let summary = format!("{ready}/{desired} nodes ready");

        let mut status = self.current_status();
        status.nodes_running = ready;

        if ready >= desired {
            status.set_condition(Condition::new(
                condition_types::AVAILABLE,
                ConditionStatus::True,
                condition_reasons::ALL_NODES_READY,
                summary.clone(),
            ));
            status.set_condition(Condition::new(
                condition_types::PROGRESSING,
                ConditionStatus::False,
                condition_reasons::CONVERGED,
                summary,
            ));
        } else {
            status.set_condition(Condition::new(
                condition_types::AVAILABLE,
                ConditionStatus::False,
                condition_reasons::NODES_NOT_READY,
                summary.clone(),
            ));
            status.set_condition(Condition::new(
                condition_types::PROGRESSING,
                ConditionStatus::True,
                condition_reasons::WAITING_FOR_NODES,
                summary,
            ));
        }

        status.set_condition(Condition::new(
            condition_types::DEGRADED,
            ConditionStatus::False,
            condition_reasons::RECONCILED,
            "",
        ));

        status
    }

    fn degraded_status(&self, reason: &str, message: &str) -> MadaraChainStatus {
        let mut status = self.current_status();
        status.set_condition(Condition::new(
            condition_types::DEGRADED,
            ConditionStatus::True,
            reason,
            message,
        ));
        status
    }

    async fn write_status(&self, ctx: &Context, status: MadaraChainStatus) -> Result<bool, Error> {
        if self.status.as_ref() == Some(&status) {
            debug!(chain = %self.name_any(), "Status unchanged");
            return Ok(false);
        }

        info!(
            chain = %self.name_any(),
            nodes_running = status.nodes_running,
            "Updating MadaraChain status"
        );
        ctx.client.patch_chain_status(self, &status).await?;
        Ok(true)
    }
}

/// Records a failed pass on the chain. Failures to do so are only logged.
pub async fn report_failure(chain: &MadaraChain, ctx: &Context, err: &Error) {
    let (reason, message) = match err {
        Error::InvalidSpec(message) => (condition_reasons::INVALID_SPEC, message.clone()),
        other => (condition_reasons::RECONCILE_FAILED, other.to_string()),
    };

    let status = chain.degraded_status(reason, &message);
    if let Err(e) = chain.write_status(ctx, status).await {
        warn!(chain = %chain.name_any(), error = %e, "Failed to record Degraded condition");
    }
}
