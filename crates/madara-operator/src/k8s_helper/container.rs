use k8s_openapi::api::core::v1::{Container, ContainerPort};

pub const TCP: &str = "TCP";

pub struct ContainerBuilder {
    inner: Container,
}

impl ContainerBuilder {
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self {
            inner: Container {
                name: name.into(),
                ..Default::default()
            },
        }
    }

    pub fn pull_policy(mut self, policy: &str) -> Self {
        self.inner.image_pull_policy = Some(policy.into());
        self
    }

    pub fn image<T: Into<String>>(mut self, image: T) -> Self {
        self.inner.image = Some(image.into());
        self
    }

    pub fn args<I, T>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.inner.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Adds a TCP port. The protocol is set explicitly so the result compares
    /// equal to what the API server hands back.
    pub fn with_port(mut self, name: impl AsRef<str>, port: i32) -> Self {
        let port = ContainerPort {
            name: Some(name.as_ref().to_string()),
            container_port: port,
            protocol: Some(TCP.to_string()),
            ..Default::default()
        };
        let mut ports = self.inner.ports.unwrap_or_default();

        ports.push(port);

        self.inner.ports = Some(ports);
        self
    }
}

impl Into<Container> for ContainerBuilder {
    fn into(self) -> Container {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_container_with_ports_and_args() {
        let container: Container = ContainerBuilder::new("madara")
            .image("img:v1")
            .args(["--name", "abc"])
            .with_port("rpc", 80)
            .into();

        assert_eq!(container.name, "madara");
        assert_eq!(container.image.as_deref(), Some("img:v1"));
        assert_eq!(
            container.args,
            Some(vec!["--name".to_string(), "abc".to_string()])
        );
        let ports = container.ports.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].container_port, 80);
        assert_eq!(ports[0].protocol.as_deref(), Some("TCP"));
    }
}
