use std::{sync::Arc, time::Duration};

use kube::{
    Resource, ResourceExt,
    runtime::{controller::Action, events::EventType},
};
use tracing::{debug, info, instrument};

use crate::{
    MadaraChain,
    controller::ErrorBackoff,
    events::{EventPublisher, actions, reasons},
    reconcilier::{
        Error,
        client::ChainClient,
        statefulset::sync_statefulset,
        status::{MadaraChainStatusExt, report_failure},
        svc::sync_service,
    },
};

pub struct Context {
    pub client: Arc<dyn ChainClient>,
    pub events: Arc<dyn EventPublisher>,
    pub backoff: ErrorBackoff,
}

impl Context {
    pub fn new(client: Arc<dyn ChainClient>, events: Arc<dyn EventPublisher>) -> Self {
        Self {
            client,
            events,
            backoff: ErrorBackoff::default(),
        }
    }
}

/// How a reconciliation pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Everything converged, wait for the next change.
    Done,
    /// A managed object was just created; run once more to pick up its state.
    RequeueImmediate,
    /// The chain no longer exists. Its objects are garbage collected.
    Vanished,
}

impl Outcome {
    pub fn action(self) -> Action {
        match self {
            Outcome::Done | Outcome::Vanished => Action::await_change(),
            Outcome::RequeueImmediate => Action::requeue(Duration::ZERO),
        }
    }
}

/// Entry point for the controller runtime.
pub async fn reconcile(obj: Arc<MadaraChain>, ctx: Arc<Context>) -> Result<Action, Error> {
    let namespace = obj
        .namespace()
        .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
    let name = obj.name_any();

    let outcome = reconcile_chain(&namespace, &name, &ctx).await?;
    ctx.backoff.reset(&namespace, &name);

    Ok(outcome.action())
}

/// One reconciliation pass for the chain `namespace/name`.
///
/// The chain is re-read so the pass never acts on a stale cached copy.
#[instrument(skip(ctx))]
pub async fn reconcile_chain(namespace: &str, name: &str, ctx: &Context) -> Result<Outcome, Error> {
    let Some(chain) = ctx.client.get_chain(namespace, name).await? else {
        debug!("MadaraChain is gone, nothing to do");
        return Ok(Outcome::Vanished);
    };

    match sync_chain(&chain, ctx).await {
        Ok(outcome) => Ok(outcome),
        Err(Error::InvalidSpec(message)) => {
            info!(reason = %message, "Rejecting invalid MadaraChain");
            ctx.events
                .publish(
                    &chain.object_ref(&()),
                    EventType::Warning,
                    reasons::VALIDATION_FAILED,
                    actions::RECONCILE,
                    Some(message.clone()),
                )
                .await;
            report_failure(&chain, ctx, &Error::InvalidSpec(message)).await;
            Ok(Outcome::Done)
        }
        // A conflict means someone else wrote first; the retry sees their change.
        Err(err) if err.is_conflict() => Err(err),
        Err(err) => {
            report_failure(&chain, ctx, &err).await;
            Err(err)
        }
    }
}

async fn sync_chain(chain: &MadaraChain, ctx: &Context) -> Result<Outcome, Error> {
    chain.spec.validate().map_err(Error::InvalidSpec)?;

    let owner = chain
        .controller_owner_ref(&())
        .ok_or(Error::MissingObjectKey("metadata.uid"))?;

    let (sts, created) = sync_statefulset(chain, owner.clone(), ctx).await?;
    sync_service(chain, owner, ctx).await?;

    let status = chain.observed_status(&sts);
    chain.write_status(ctx, status).await?;

    Ok(if created {
        Outcome::RequeueImmediate
    } else {
        Outcome::Done
    })
}
