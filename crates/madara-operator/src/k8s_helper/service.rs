use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::{ServicePort, ServiceSpec},
    apimachinery::pkg::util::intstr::IntOrString,
};

use crate::k8s_helper::container::TCP;

pub struct ServiceSpecBuilder {
    inner: ServiceSpec,
}

impl ServiceSpecBuilder {
    pub fn new() -> Self {
        Self {
            inner: Default::default(),
        }
    }

    pub fn cluster_ip(mut self) -> Self {
        self.inner.type_ = Some("ClusterIP".to_string());
        self
    }

    pub fn selector(mut self, labels: BTreeMap<String, String>) -> Self {
        self.inner.selector = Some(labels);
        self
    }

    /// Adds a TCP port forwarding `port` to the pods' `target_port`.
    pub fn with_port(mut self, name: impl AsRef<str>, port: i32, target_port: i32) -> Self {
        let port = ServicePort {
            name: Some(name.as_ref().to_string()),
            port,
            target_port: Some(IntOrString::Int(target_port)),
            protocol: Some(TCP.to_string()),
            ..Default::default()
        };
        let mut ports = self.inner.ports.unwrap_or_default();

        ports.push(port);

        self.inner.ports = Some(ports);
        self
    }
}

impl Into<ServiceSpec> for ServiceSpecBuilder {
    fn into(self) -> ServiceSpec {
        self.inner
    }
}

impl Into<Option<ServiceSpec>> for ServiceSpecBuilder {
    fn into(self) -> Option<ServiceSpec> {
        Some(self.inner)
    }
}
