//! In-memory stand-in for the API server, used by the reconciler tests.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use k8s_openapi::api::{
    apps::v1::{StatefulSet, StatefulSetStatus},
    core::v1::Service,
};
use kube::{ResourceExt, api::ObjectMeta};

use crate::{
    MadaraChain,
    crd::{MadaraChainSpec, MadaraChainStatus},
    reconcilier::{Error, api_error, client::ChainClient},
};

/// A chain in the `default` namespace with a UID, as the API server returns it.
pub fn chain(name: &str, replicas: i32, port: i32, image: &str) -> MadaraChain {
    MadaraChain {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            uid: Some(format!("{name}-uid")),
            resource_version: Some("1".to_string()),
            ..Default::default()
        },
        spec: MadaraChainSpec {
            chain_id: format!("{name}-id"),
            replicas,
            port,
            image: image.to_string(),
            ..Default::default()
        },
        status: None,
    }
}

#[derive(Default)]
struct State {
    chains: BTreeMap<String, MadaraChain>,
    statefulsets: BTreeMap<String, StatefulSet>,
    services: BTreeMap<String, Service>,
    writes: usize,
    status_writes: usize,
    next_version: u64,
}

impl State {
    fn bump(&mut self, meta: &mut ObjectMeta) {
        self.next_version += 1;
        meta.resource_version = Some((self.next_version + 1).to_string());
    }
}

fn check_version(live: &ObjectMeta, incoming: &ObjectMeta) -> Result<(), Error> {
    match incoming.resource_version.as_ref() {
        Some(version) if Some(version) != live.resource_version.as_ref() => {
            Err(api_error(409, "Conflict"))
        }
        _ => Ok(()),
    }
}

/// Stores objects of a single namespace and counts every write.
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<State>,
}

impl FakeCluster {
    pub fn with_chain(chain: MadaraChain) -> Self {
        let cluster = Self::default();
        cluster.lock().chains.insert(chain.name_any(), chain);
        cluster
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn chain(&self, name: &str) -> Option<MadaraChain> {
        self.lock().chains.get(name).cloned()
    }

    pub fn statefulset(&self, name: &str) -> Option<StatefulSet> {
        self.lock().statefulsets.get(name).cloned()
    }

    pub fn service(&self, name: &str) -> Option<Service> {
        self.lock().services.get(name).cloned()
    }

    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    pub fn status_writes(&self) -> usize {
        self.lock().status_writes
    }

    /// Simulates a user editing the chain.
    pub fn update_chain(&self, name: &str, f: impl FnOnce(&mut MadaraChain)) {
        let mut state = self.lock();
        let mut chain = state.chains.remove(name).unwrap();
        f(&mut chain);
        state.bump(&mut chain.metadata);
        state.chains.insert(name.to_string(), chain);
    }

    /// Simulates another actor editing the StatefulSet.
    pub fn update_statefulset(&self, name: &str, f: impl FnOnce(&mut StatefulSet)) {
        let mut state = self.lock();
        let mut sts = state.statefulsets.remove(name).unwrap();
        f(&mut sts);
        state.bump(&mut sts.metadata);
        state.statefulsets.insert(name.to_string(), sts);
    }

    /// Simulates another actor editing the Service.
    pub fn update_service(&self, name: &str, f: impl FnOnce(&mut Service)) {
        let mut state = self.lock();
        let mut svc = state.services.remove(name).unwrap();
        f(&mut svc);
        state.bump(&mut svc.metadata);
        state.services.insert(name.to_string(), svc);
    }

    /// Simulates the StatefulSet controller reporting ready pods.
    pub fn set_ready_replicas(&self, name: &str, ready: i32) {
        self.update_statefulset(name, |sts| {
            sts.status = Some(StatefulSetStatus {
                ready_replicas: Some(ready),
                ..Default::default()
            });
        });
    }
}

#[async_trait]
impl ChainClient for FakeCluster {
    async fn get_chain(&self, _namespace: &str, name: &str) -> Result<Option<MadaraChain>, Error> {
        Ok(self.chain(name))
    }

    async fn get_statefulset(
        &self,
        _namespace: &str,
        name: &str,
    ) -> Result<Option<StatefulSet>, Error> {
        Ok(self.statefulset(name))
    }

    async fn create_statefulset(
        &self,
        _namespace: &str,
        sts: &StatefulSet,
    ) -> Result<StatefulSet, Error> {
        let mut state = self.lock();
        if state.statefulsets.contains_key(&sts.name_any()) {
            return Err(api_error(409, "AlreadyExists"));
        }
        let mut created = sts.clone();
        state.bump(&mut created.metadata);
        state.writes += 1;
        state.statefulsets.insert(created.name_any(), created.clone());
        Ok(created)
    }

    async fn replace_statefulset(
        &self,
        _namespace: &str,
        sts: &StatefulSet,
    ) -> Result<StatefulSet, Error> {
        let mut state = self.lock();
        let live = state
            .statefulsets
            .get(&sts.name_any())
            .ok_or_else(|| api_error(404, "NotFound"))?;
        check_version(&live.metadata, &sts.metadata)?;

        let mut replaced = sts.clone();
        // Status is owned by the StatefulSet controller, not by writers of the spec.
        replaced.status = live.status.clone();
        state.bump(&mut replaced.metadata);
        state.writes += 1;
        state.statefulsets.insert(replaced.name_any(), replaced.clone());
        Ok(replaced)
    }

    async fn get_service(&self, _namespace: &str, name: &str) -> Result<Option<Service>, Error> {
        Ok(self.service(name))
    }

    async fn create_service(&self, _namespace: &str, svc: &Service) -> Result<Service, Error> {
        let mut state = self.lock();
        if state.services.contains_key(&svc.name_any()) {
            return Err(api_error(409, "AlreadyExists"));
        }
        let mut created = svc.clone();
        state.bump(&mut created.metadata);
        state.writes += 1;
        state.services.insert(created.name_any(), created.clone());
        Ok(created)
    }

    async fn replace_service(&self, _namespace: &str, svc: &Service) -> Result<Service, Error> {
        let mut state = self.lock();
        let live = state
            .services
            .get(&svc.name_any())
            .ok_or_else(|| api_error(404, "NotFound"))?;
        check_version(&live.metadata, &svc.metadata)?;

        let mut replaced = svc.clone();
        state.bump(&mut replaced.metadata);
        state.writes += 1;
        state.services.insert(replaced.name_any(), replaced.clone());
        Ok(replaced)
    }

    async fn patch_chain_status(
        &self,
        chain: &MadaraChain,
        status: &MadaraChainStatus,
    ) -> Result<(), Error> {
        let mut state = self.lock();
        let mut live = state
            .chains
            .get(&chain.name_any())
            .cloned()
            .ok_or_else(|| api_error(404, "NotFound"))?;
        check_version(&live.metadata, &chain.metadata)?;

        live.status = Some(status.clone());
        state.bump(&mut live.metadata);
        state.writes += 1;
        state.status_writes += 1;
        state.chains.insert(live.name_any(), live);
        Ok(())
    }
}
