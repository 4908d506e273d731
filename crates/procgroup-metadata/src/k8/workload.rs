use k8_types::core::pod::PodStatus;

use crate::health::Health;

/// node selector key pinning a pod to a named node
pub const HOSTNAME_LABEL: &str = "kubernetes.io/hostname";

/// Health of one container of a pod.
///
/// A running container is `Up` once ready and `Warning` before. A container that is
/// not running inside a running pod has exited or is restarting, which is `Down`.
/// Without a container report the pod phase decides.
pub fn container_health(status: &PodStatus, container: &str) -> Health {
    let phase = Health::from_pod_phase(&status.phase);
    let reported = status
        .container_statuses
        .iter()
        .find(|reported| reported.name == container);

    match reported {
        Some(reported) if reported.state.running.is_some() => {
            if reported.ready {
                Health::Up
            } else {
                Health::Warning
            }
        }
        Some(_) if phase.is_up() => Health::Down,
        _ => phase,
    }
}

#[cfg(test)]
mod test {

    use k8_types::core::pod::{ContainerState, ContainerStateRunning, ContainerStatus};

    use super::*;

    fn reported(running: bool, ready: bool) -> ContainerStatus {
        ContainerStatus {
            name: "web".to_owned(),
            state: ContainerState {
                running: running.then(|| ContainerStateRunning {
                    started_at: "2024-01-01T00:00:00Z".to_owned(),
                }),
            },
            ready,
            restart_count: 0,
            image: "nginx:1.25".to_owned(),
            image_id: String::new(),
            container_id: None,
        }
    }

    fn pod(phase: &str, containers: Vec<ContainerStatus>) -> PodStatus {
        PodStatus {
            phase: phase.to_owned(),
            container_statuses: containers,
            ..Default::default()
        }
    }

    #[test]
    fn test_container_health() {
        assert_eq!(
            container_health(&pod("Running", vec![reported(true, true)]), "web"),
            Health::Up
        );
        assert_eq!(
            container_health(&pod("Running", vec![reported(true, false)]), "web"),
            Health::Warning
        );
        assert_eq!(
            container_health(&pod("Running", vec![reported(false, false)]), "web"),
            Health::Down
        );
        assert_eq!(
            container_health(&pod("Pending", vec![reported(false, false)]), "web"),
            Health::Pending
        );
        assert_eq!(
            container_health(&pod("Succeeded", vec![reported(false, false)]), "web"),
            Health::Stop
        );
    }

    #[test]
    fn test_phase_fallback() {
        assert_eq!(container_health(&pod("Pending", vec![]), "web"), Health::Pending);
        assert_eq!(container_health(&PodStatus::default(), "web"), Health::Down);
    }

    #[test]
    fn test_status_from_platform_json() {
        let status: PodStatus = serde_json::from_value(serde_json::json!({
            "phase": "Running",
            "hostIP": "10.0.0.4",
            "podIP": "172.16.0.9",
            "startTime": "2024-01-01T00:00:00Z",
            "containerStatuses": [{
                "name": "web",
                "ready": true,
                "restartCount": 2,
                "image": "nginx:1.25",
                "imageID": "sha256:0",
                "state": { "running": { "startedAt": "2024-01-01T00:00:00Z" } }
            }, {
                "name": "worker",
                "ready": false,
                "restartCount": 7,
                "image": "busybox",
                "imageID": "sha256:1",
                "state": { "waiting": { "reason": "CrashLoopBackOff" } }
            }]
        }))
        .expect("deserialize");

        assert_eq!(status.host_ip, "10.0.0.4");
        assert_eq!(container_health(&status, "web"), Health::Up);
        assert_eq!(container_health(&status, "worker"), Health::Down);
    }
}
