use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use futures::StreamExt;
use k8s_openapi::api::{apps::v1::StatefulSet, core::v1::Service};
use kube::{
    Api, Client, ResourceExt,
    api::ListParams,
    runtime::{
        controller::{Action, Controller},
        watcher::Config,
    },
};
use tracing::{debug, error, info, warn};

use crate::{
    Context, MadaraChain,
    events::KubeEventPublisher,
    reconcile,
    reconcilier::{Error, client::KubeChainClient},
};

pub const CONTROLLER_NAME: &str = "madara-controller";

/// Per-chain exponential backoff for failed reconciliations.
///
/// The delay doubles with every consecutive failure of the same chain and is
/// cleared by its next successful pass.
pub struct ErrorBackoff {
    base: Duration,
    max: Duration,
    failures: Mutex<HashMap<String, u32>>,
}

impl Default for ErrorBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(300))
    }
}

impl ErrorBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: Mutex::new(HashMap::new()),
        }
    }

    fn key(namespace: &str, name: &str) -> String {
        format!("{namespace}/{name}")
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    /// Records a failure and returns how long to wait before retrying.
    pub fn next_delay(&self, namespace: &str, name: &str) -> Duration {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let count = failures.entry(Self::key(namespace, name)).or_insert(0);
        let exponent = (*count).min(16);
        *count = count.saturating_add(1);

        self.base.saturating_mul(1 << exponent).min(self.max)
    }

    pub fn reset(&self, namespace: &str, name: &str) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&Self::key(namespace, name));
    }
}

pub fn error_policy(object: Arc<MadaraChain>, err: &Error, ctx: Arc<Context>) -> Action {
    let namespace = object.namespace().unwrap_or_default();
    let name = object.name_any();

    if !err.is_retryable() {
        error!(chain = %name, namespace = %namespace, error = %err, "Reconciliation failed permanently");
        return Action::await_change();
    }

    let delay = if err.is_conflict() {
        ctx.backoff.base()
    } else {
        ctx.backoff.next_delay(&namespace, &name)
    };
    warn!(
        chain = %name,
        namespace = %namespace,
        error = %err,
        retry_in = ?delay,
        "Reconciliation failed"
    );
    Action::requeue(delay)
}

/// Runs the MadaraChain controller until a shutdown signal is received.
///
/// Watches all namespaces unless `namespace` is set.
pub async fn controller(
    client: Client,
    namespace: Option<String>,
    instance: Option<String>,
) -> Result<(), kube::Error> {
    let (chains, statefulsets, services) = match namespace.as_deref() {
        Some(ns) => (
            Api::<MadaraChain>::namespaced(client.clone(), ns),
            Api::<StatefulSet>::namespaced(client.clone(), ns),
            Api::<Service>::namespaced(client.clone(), ns),
        ),
        None => (
            Api::<MadaraChain>::all(client.clone()),
            Api::<StatefulSet>::all(client.clone()),
            Api::<Service>::all(client.clone()),
        ),
    };

    if let Err(e) = chains.list(&ListParams::default().limit(1)).await {
        error!("CRD is not queryable; {e:?}. Is the CRD installed?");
        info!("Installation: cargo run --bin crdgen | kubectl apply -f -");
        return Err(e);
    }

    let context = Arc::new(Context::new(
        Arc::new(KubeChainClient::new(client.clone())),
        Arc::new(KubeEventPublisher::new(client, CONTROLLER_NAME, instance)),
    ));

    info!(namespace = ?namespace, "Starting MadaraChain controller");

    Controller::new(chains, Config::default().any_semantic())
        .owns(statefulsets, Config::default())
        .owns(services, Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!(chain = %obj.name, "Reconciled"),
                Err(e) => debug!(error = %e, "Reconcile did not complete"),
            }
        })
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use kube::api::ObjectMeta;

    use super::*;
    use crate::{
        events::NoopEventPublisher,
        reconcilier::{api_error, testing::FakeCluster},
    };

    fn context() -> Arc<Context> {
        Arc::new(Context::new(
            Arc::new(FakeCluster::default()),
            Arc::new(NoopEventPublisher),
        ))
    }

    fn object() -> Arc<MadaraChain> {
        Arc::new(MadaraChain {
            metadata: ObjectMeta {
                name: Some("c".into()),
                namespace: Some("default".into()),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    #[test]
    fn backoff_doubles_until_the_cap() {
        let backoff = ErrorBackoff::new(Duration::from_secs(1), Duration::from_secs(10));

        let delays: Vec<_> = (0..6).map(|_| backoff.next_delay("ns", "c")).collect();

        assert_eq!(
            delays,
            [1, 2, 4, 8, 10, 10].map(Duration::from_secs).to_vec()
        );
    }

    #[test]
    fn backoff_is_tracked_per_chain_and_reset_on_success() {
        let backoff = ErrorBackoff::default();
        backoff.next_delay("ns", "a");
        backoff.next_delay("ns", "a");

        assert_eq!(backoff.next_delay("ns", "b"), Duration::from_secs(1));

        backoff.reset("ns", "a");
        assert_eq!(backoff.next_delay("ns", "a"), Duration::from_secs(1));
    }

    #[test]
    fn backoff_never_overflows() {
        let backoff = ErrorBackoff::default();
        for _ in 0..100 {
            assert!(backoff.next_delay("ns", "c") <= Duration::from_secs(300));
        }
    }

    #[test]
    fn transient_errors_back_off_exponentially() {
        let ctx = context();
        let err = api_error(500, "InternalError");

        let first = error_policy(object(), &err, ctx.clone());
        let second = error_policy(object(), &err, ctx);

        assert_eq!(first, Action::requeue(Duration::from_secs(1)));
        assert_eq!(second, Action::requeue(Duration::from_secs(2)));
    }

    #[test]
    fn conflicts_retry_after_the_base_delay() {
        let ctx = context();
        let err = api_error(409, "Conflict");

        for _ in 0..3 {
            assert_eq!(
                error_policy(object(), &err, ctx.clone()),
                Action::requeue(Duration::from_secs(1))
            );
        }
    }

    #[test]
    fn permanent_errors_wait_for_a_change() {
        let err = Error::MissingObjectKey("metadata.uid");
        assert_eq!(error_policy(object(), &err, context()), Action::await_change());
    }
}
