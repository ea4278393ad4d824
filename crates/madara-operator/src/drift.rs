//! Field-level comparison between live managed objects and their desired form.
//!
//! Only the fields the operator owns are compared. Everything else on the live
//! object (defaults filled in by the API server, annotations added by other
//! controllers) is left alone, both here and when the drift is corrected.

use std::fmt;

use k8s_openapi::{
    api::{
        apps::v1::StatefulSet,
        core::v1::{Container, ContainerPort, Service, ServicePort},
    },
    apimachinery::pkg::util::intstr::IntOrString,
};

use crate::k8s_helper::container::TCP;

/// Names of the fields that differ between two objects.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Diff {
    fields: Vec<&'static str>,
}

impl Diff {
    fn check(&mut self, field: &'static str, differs: bool) {
        if differs {
            self.fields.push(field);
        }
    }

    pub fn non_empty(&self) -> bool {
        !self.fields.is_empty()
    }

    pub fn fields(&self) -> &[&'static str] {
        &self.fields
    }
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fields().join(", "))
    }
}

/// The container the operator manages inside a StatefulSet's pod template.
pub fn managed_container<'a>(sts: &'a StatefulSet, name: &str) -> Option<&'a Container> {
    sts.spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .containers
        .iter()
        .find(|c| c.name == name)
}

fn managed_container_mut<'a>(sts: &'a mut StatefulSet, name: &str) -> Option<&'a mut Container> {
    sts.spec
        .as_mut()?
        .template
        .spec
        .as_mut()?
        .containers
        .iter_mut()
        .find(|c| c.name == name)
}

// The API server defaults a missing replica count to 1.
fn replicas(sts: &StatefulSet) -> i32 {
    sts.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1)
}

fn container_ports(container: Option<&Container>) -> Vec<(Option<&str>, i32, &str)> {
    container
        .and_then(|c| c.ports.as_ref())
        .map(|ports| ports.iter().map(normalize_container_port).collect())
        .unwrap_or_default()
}

fn normalize_container_port(port: &ContainerPort) -> (Option<&str>, i32, &str) {
    (
        port.name.as_deref(),
        port.container_port,
        port.protocol.as_deref().unwrap_or(TCP),
    )
}

fn args(container: Option<&Container>) -> &[String] {
    container
        .and_then(|c| c.args.as_deref())
        .unwrap_or_default()
}

/// Compares replicas plus the managed container's image, arguments and ports.
///
/// Lists are compared in full, element by element.
pub fn statefulset_diff(live: &StatefulSet, desired: &StatefulSet, container: &str) -> Diff {
    let live_container = managed_container(live, container);
    let desired_container = managed_container(desired, container);

    let mut diff = Diff::default();
    diff.check("replicas", replicas(live) != replicas(desired));
    diff.check(
        "image",
        live_container.and_then(|c| c.image.as_deref())
            != desired_container.and_then(|c| c.image.as_deref()),
    );
    diff.check("args", args(live_container) != args(desired_container));
    diff.check(
        "ports",
        container_ports(live_container) != container_ports(desired_container),
    );
    diff
}

/// Copies the compared fields from `desired` onto `live`.
///
/// If the managed container was removed from the live template it is added
/// back in full.
pub fn sync_statefulset(live: &mut StatefulSet, desired: &StatefulSet, container: &str) {
    let Some(desired_spec) = desired.spec.as_ref() else {
        return;
    };
    let desired_container = managed_container(desired, container).cloned();

    let live_spec = live.spec.get_or_insert_with(Default::default);
    live_spec.replicas = desired_spec.replicas;

    let Some(desired_container) = desired_container else {
        return;
    };

    if let Some(live_container) = managed_container_mut(live, container) {
        live_container.image = desired_container.image;
        live_container.args = desired_container.args;
        live_container.ports = desired_container.ports;
        return;
    }

    live.spec
        .get_or_insert_with(Default::default)
        .template
        .spec
        .get_or_insert_with(Default::default)
        .containers
        .push(desired_container);
}

fn service_ports(svc: &Service) -> Vec<(Option<&str>, i32, String, &str)> {
    svc.spec
        .as_ref()
        .and_then(|s| s.ports.as_ref())
        .map(|ports| ports.iter().map(normalize_service_port).collect())
        .unwrap_or_default()
}

fn normalize_service_port(port: &ServicePort) -> (Option<&str>, i32, String, &str) {
    (
        port.name.as_deref(),
        port.port,
        // The API server defaults a missing target port to the port itself.
        match port.target_port.as_ref() {
            Some(IntOrString::Int(target)) => target.to_string(),
            Some(IntOrString::String(target)) => target.clone(),
            None => port.port.to_string(),
        },
        port.protocol.as_deref().unwrap_or(TCP),
    )
}

/// Compares every port of the two Services.
pub fn service_diff(live: &Service, desired: &Service) -> Diff {
    let mut diff = Diff::default();
    diff.check("ports", service_ports(live) != service_ports(desired));
    diff
}

/// Replaces the live port list with the desired one.
pub fn sync_service(live: &mut Service, desired: &Service) {
    let ports = desired.spec.as_ref().and_then(|s| s.ports.clone());
    live.spec.get_or_insert_with(Default::default).ports = ports;
}
