use std::fmt;

use serde::{Deserialize, Serialize};

use k8_types::core::pod::ContainerPortSpec;
use k8_types::core::service::{ServicePort, TargetPort};

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Sctp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "TCP"),
            Self::Udp => write!(f, "UDP"),
            Self::Sctp => write!(f, "SCTP"),
        }
    }
}

/// Port as declared in a process configuration. Every field is optional.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Port {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_port: Option<u16>,
}

impl Port {
    pub fn new(port: u16) -> Self {
        Self {
            port: Some(port),
            ..Default::default()
        }
    }

    pub fn named(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: Some(name.into()),
            port: Some(port),
            ..Default::default()
        }
    }

    /// Fill in defaults: TCP protocol, mirrored port/target port, name from protocol.
    /// Returns `None` when neither port nor target port is set.
    pub fn format(&self) -> Option<FormattedPort> {
        let protocol = self.protocol.unwrap_or_default();
        let (port, target_port) = match (self.port, self.target_port) {
            (Some(port), Some(target)) => (port, target),
            (Some(port), None) => (port, port),
            (None, Some(target)) => (target, target),
            (None, None) => return None,
        };

        let name = self
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| protocol.to_string().to_lowercase());

        Some(FormattedPort {
            name,
            protocol,
            port,
            target_port,
            node_port: self.node_port,
        })
    }
}

/// Port with every default resolved
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedPort {
    pub name: String,
    pub protocol: Protocol,
    pub port: u16,
    pub target_port: u16,
    /// `None` means no node port was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_port: Option<u16>,
}

impl FormattedPort {
    /// port opened on the container
    pub fn container_port(&self) -> ContainerPortSpec {
        ContainerPortSpec {
            container_port: self.target_port,
            name: Some(self.name.clone()),
            protocol: Some(self.protocol.to_string()),
        }
    }

    /// Port of the service forwarding to the container.
    /// Service ports carry no protocol and are TCP.
    pub fn service_port(&self) -> ServicePort {
        ServicePort {
            name: Some(self.name.clone()),
            node_port: self.node_port,
            port: self.port,
            target_port: Some(TargetPort::Number(self.target_port)),
        }
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_port_only_mirrors_target() {
        let formatted = Port::new(8080).format().expect("formatted");
        assert_eq!(formatted.port, 8080);
        assert_eq!(formatted.target_port, 8080);
        assert_eq!(formatted.protocol, Protocol::Tcp);
        assert_eq!(formatted.name, "tcp");
        assert_eq!(formatted.node_port, None);
    }

    #[test]
    fn test_target_only_mirrors_port() {
        let port = Port {
            target_port: Some(9000),
            protocol: Some(Protocol::Udp),
            ..Default::default()
        };
        let formatted = port.format().expect("formatted");
        assert_eq!(formatted.port, 9000);
        assert_eq!(formatted.target_port, 9000);
        assert_eq!(formatted.name, "udp");
    }

    #[test]
    fn test_explicit_values_kept() {
        let port = Port {
            name: Some("http".to_owned()),
            port: Some(80),
            target_port: Some(8080),
            node_port: Some(30080),
            ..Default::default()
        };
        let formatted = port.format().expect("formatted");
        assert_eq!(formatted.name, "http");
        assert_eq!(formatted.port, 80);
        assert_eq!(formatted.target_port, 8080);
        assert_eq!(formatted.node_port, Some(30080));
    }

    #[test]
    fn test_platform_ports() {
        let port = Port {
            name: Some("http".to_owned()),
            port: Some(80),
            target_port: Some(8080),
            node_port: Some(30080),
            ..Default::default()
        };
        let formatted = port.format().expect("formatted");

        let container = formatted.container_port();
        assert_eq!(container.container_port, 8080);
        assert_eq!(container.protocol.as_deref(), Some("TCP"));

        let service = formatted.service_port();
        assert_eq!(service.port, 80);
        assert_eq!(service.node_port, Some(30080));
        assert_eq!(service.target_port, Some(TargetPort::Number(8080)));
    }

    #[test]
    fn test_empty_port_is_skipped() {
        assert!(Port::default().format().is_none());
    }
}
