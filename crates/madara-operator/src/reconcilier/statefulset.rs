use std::collections::BTreeMap;

use k8s_openapi::{
    api::{
        apps::v1::{StatefulSet, StatefulSetSpec},
        core::v1::{PodSpec, PodTemplateSpec},
    },
    apimachinery::pkg::apis::meta::v1::{LabelSelector, OwnerReference},
};
use kube::{Resource, ResourceExt, runtime::events::EventType};
use tracing::{debug, info};

use crate::{
    Context, MadaraChain, drift,
    events::{actions, reasons},
    k8s_helper::{container::ContainerBuilder, metadata::ObjectMetaBuilder},
    reconcilier::{Error, svc::MadaraChainService},
};

pub const APP_LABEL: &str = "app";
pub const APP_NAME: &str = "madara";
pub const CHAIN_LABEL: &str = "chain";
pub const CONTAINER_NAME: &str = "madara";
pub const RPC_PORT_NAME: &str = "rpc";
/// Port the node listens on inside the pod.
pub const CONTAINER_RPC_PORT: i32 = 80;

pub trait MadaraChainWorkload {
    fn workload_name(&self) -> String;
    /// Labels shared by the pods and the Service selector.
    fn selector_labels(&self) -> BTreeMap<String, String>;
    fn node_args(&self) -> Vec<String>;
    fn desired_statefulset(&self, owner: OwnerReference) -> StatefulSet;
}

impl MadaraChainWorkload for MadaraChain {
    fn workload_name(&self) -> String {
        self.name_any()
    }

    fn selector_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (APP_LABEL.to_string(), APP_NAME.to_string()),
            (CHAIN_LABEL.to_string(), self.name_any()),
        ])
    }

    fn node_args(&self) -> Vec<String> {
        vec![
            "--name".to_string(),
            self.spec.chain_id.clone(),
            "--network".to_string(),
            self.spec.network().to_string(),
            "--rpc-port".to_string(),
            CONTAINER_RPC_PORT.to_string(),
            "--rpc-external".to_string(),
        ]
    }

    fn desired_statefulset(&self, owner: OwnerReference) -> StatefulSet {
        let labels = self.selector_labels();

        StatefulSet {
            metadata: ObjectMetaBuilder::new()
                .name(self.workload_name())
                .namespace(self.namespace().unwrap_or_default())
                .with_labels(&labels)
                .owned_by(owner)
                .into(),
            spec: Some(StatefulSetSpec {
                replicas: Some(self.spec.replicas),
                service_name: Some(self.service_name()),
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMetaBuilder::new().with_labels(&labels).into()),
                    spec: Some(PodSpec {
                        containers: vec![
                            ContainerBuilder::new(CONTAINER_NAME)
                                .image(self.spec.image.clone())
                                .pull_policy("IfNotPresent")
                                .args(self.node_args())
                                .with_port(RPC_PORT_NAME, CONTAINER_RPC_PORT)
                                .into(),
                        ],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// Creates the chain's StatefulSet, or brings its managed fields back in line.
///
/// Returns the live object and whether it was just created.
pub async fn sync_statefulset(
    chain: &MadaraChain,
    owner: OwnerReference,
    ctx: &Context,
) -> Result<(StatefulSet, bool), Error> {
    let namespace = chain
        .namespace()
        .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
    let desired = chain.desired_statefulset(owner);

    match ctx
        .client
        .get_statefulset(&namespace, &chain.workload_name())
        .await?
    {
        None => {
            info!(
                statefulset = %desired.name_any(),
                namespace = %namespace,
                "Creating StatefulSet"
            );
            let created = ctx.client.create_statefulset(&namespace, &desired).await?;

            ctx.events
                .publish(
                    &chain.object_ref(&()),
                    EventType::Normal,
                    reasons::STATEFULSET_CREATED,
                    actions::CREATE,
                    Some(format!(
                        "Created StatefulSet `{}` with {} replicas",
                        created.name_any(),
                        chain.spec.replicas
                    )),
                )
                .await;

            Ok((created, true))
        }
        Some(mut live) => {
            let diff = drift::statefulset_diff(&live, &desired, CONTAINER_NAME);
            if !diff.non_empty() {
                debug!(statefulset = %live.name_any(), "StatefulSet is up to date");
                return Ok((live, false));
            }

            info!(
                statefulset = %live.name_any(),
                namespace = %namespace,
                drift = %diff,
                "Updating StatefulSet"
            );
            drift::sync_statefulset(&mut live, &desired, CONTAINER_NAME);
            let updated = ctx.client.replace_statefulset(&namespace, &live).await?;

            ctx.events
                .publish(
                    &chain.object_ref(&()),
                    EventType::Normal,
                    reasons::STATEFULSET_UPDATED,
                    actions::UPDATE,
                    Some(format!("Updated StatefulSet `{}`: {}", updated.name_any(), diff)),
                )
                .await;

            Ok((updated, false))
        }
    }
}
