use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::ObjectMeta;

pub struct ObjectMetaBuilder {
    inner: ObjectMeta,
}

impl ObjectMetaBuilder {
    pub fn new() -> Self {
        Self {
            inner: Default::default(),
        }
    }

    pub fn name(mut self, name: String) -> Self {
        self.inner.name = Some(name);
        self
    }

    pub fn namespace<T: ToString>(mut self, namespace: T) -> Self {
        self.inner.namespace = Some(namespace.to_string());
        self
    }

    pub fn owned_by(mut self, oref: OwnerReference) -> Self {
        self.inner.owner_references = Some(vec![oref]);
        self
    }

    pub fn with_label<T: ToString, U: ToString>(mut self, label: T, value: U) -> Self {
        let mut labels = self.inner.labels.unwrap_or_default();

        labels.insert(label.to_string(), value.to_string());

        self.inner.labels = Some(labels);
        self
    }

    pub fn with_labels(mut self, labels: &BTreeMap<String, String>) -> Self {
        let mut current = self.inner.labels.unwrap_or_default();

        current.extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));

        self.inner.labels = Some(current);
        self
    }

    pub fn build(&self) -> ObjectMeta {
        self.inner.clone()
    }
}

impl Into<ObjectMeta> for ObjectMetaBuilder {
    fn into(self) -> ObjectMeta {
        self.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_merged() {
        let labels = BTreeMap::from([("app".to_string(), "madara".to_string())]);
        let meta: ObjectMeta = ObjectMetaBuilder::new()
            .name("chain".to_string())
            .namespace("default")
            .with_label("chain", "chain")
            .with_labels(&labels)
            .into();

        assert_eq!(meta.name.as_deref(), Some("chain"));
        assert_eq!(meta.namespace.as_deref(), Some("default"));
        let labels = meta.labels.unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels["app"], "madara");
    }
}
