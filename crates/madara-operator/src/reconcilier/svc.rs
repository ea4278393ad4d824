use k8s_openapi::{api::core::v1::Service, apimachinery::pkg::apis::meta::v1::OwnerReference};
use kube::{Resource, ResourceExt, runtime::events::EventType};
use tracing::{debug, info};

use crate::{
    Context, MadaraChain, drift,
    events::{actions, reasons},
    k8s_helper::{metadata::ObjectMetaBuilder, service::ServiceSpecBuilder},
    reconcilier::{
        Error,
        statefulset::{CONTAINER_RPC_PORT, MadaraChainWorkload, RPC_PORT_NAME},
    },
};

pub trait MadaraChainService {
    fn service_name(&self) -> String;
    fn desired_service(&self, owner: OwnerReference) -> Service;
}

impl MadaraChainService for MadaraChain {
    fn service_name(&self) -> String {
        format!("{}-service", self.name_any())
    }

    fn desired_service(&self, owner: OwnerReference) -> Service {
        Service {
            metadata: ObjectMetaBuilder::new()
                .name(self.service_name())
                .namespace(self.namespace().unwrap_or_default())
                .with_labels(&self.selector_labels())
                .owned_by(owner)
                .into(),
            spec: ServiceSpecBuilder::new()
                .cluster_ip()
                .selector(self.selector_labels())
                .with_port(RPC_PORT_NAME, self.spec.port, CONTAINER_RPC_PORT)
                .into(),
            ..Default::default()
        }
    }
}

/// Creates the chain's Service, or resets its ports when they drifted.
pub async fn sync_service(
    chain: &MadaraChain,
    owner: OwnerReference,
    ctx: &Context,
) -> Result<Service, Error> {
    let namespace = chain
        .namespace()
        .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
    let desired = chain.desired_service(owner);

    let Some(mut live) = ctx
        .client
        .get_service(&namespace, &chain.service_name())
        .await?
    else {
        info!(service = %desired.name_any(), namespace = %namespace, "Creating Service");
        let created = ctx.client.create_service(&namespace, &desired).await?;

        ctx.events
            .publish(
                &chain.object_ref(&()),
                EventType::Normal,
                reasons::SERVICE_CREATED,
                actions::CREATE,
                Some(format!(
                    "Created Service `{}` on port {}",
                    created.name_any(),
                    chain.spec.port
                )),
            )
            .await;

        return Ok(created);
    };

    let diff = drift::service_diff(&live, &desired);
    if !diff.non_empty() {
        debug!(service = %live.name_any(), "Service is up to date");
        return Ok(live);
    }

    info!(service = %live.name_any(), namespace = %namespace, drift = %diff, "Updating Service");
    drift::sync_service(&mut live, &desired);
    let updated = ctx.client.replace_service(&namespace, &live).await?;

    ctx.events
        .publish(
            &chain.object_ref(&()),
            EventType::Normal,
            reasons::SERVICE_UPDATED,
            actions::UPDATE,
            Some(format!("Updated Service `{}`: {}", updated.name_any(), diff)),
        )
        .await;

    Ok(updated)
}
