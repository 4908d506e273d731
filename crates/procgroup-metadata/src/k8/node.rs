use k8_types::core::node::NodeStatus;

use crate::health::Health;

/// Health of a cluster node from the containers scheduled on it.
///
/// A node that has not reported any address has not joined yet and is `Unknown`.
/// An idle node is `Up`; otherwise its containers are aggregated.
pub fn node_health<I>(status: &NodeStatus, containers: I) -> Health
where
    I: IntoIterator<Item = Health>,
{
    if status.addresses.is_empty() {
        return Health::Unknown;
    }
    let mut containers = containers.into_iter().peekable();
    if containers.peek().is_none() {
        Health::Up
    } else {
        Health::aggregate(containers)
    }
}
