use k8_types::core::service::{LoadBalancerType, ServiceSpec, ServiceStatus};

use crate::health::Health;

/// Reachability of a service: a load balancer without an ingress address is still
/// pending, a service without ports can not be reached.
pub fn service_health(spec: &ServiceSpec, status: &ServiceStatus) -> Health {
    if spec.ports.is_empty() {
        return Health::Down;
    }
    match &spec.r#type {
        Some(LoadBalancerType::LoadBalancer)
            if status.load_balancer.find_any_ip_or_host().is_none() =>
        {
            Health::Pending
        }
        _ => Health::Up,
    }
}
