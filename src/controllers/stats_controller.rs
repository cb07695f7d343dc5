use serde::Serialize;

use crate::error::ConcordError;
use crate::utils::docker_utils::DockerClient;

const RECENT_WINDOW_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize)]
pub struct ContainerStats {
    pub total: usize,
    pub running: usize,
    pub stopped: usize,
    /// containers created within the last 24 hours
    pub recent: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub containers: ContainerStats,
    pub images: usize,
    pub volumes: usize,
    pub last_updated: String,
}

/// Summary counts for the dashboard landing page, recomputed on every
/// poll from fresh listings.
pub async fn dashboard_stats(docker: &dyn DockerClient) -> Result<DashboardStats, ConcordError> {
    let (containers, images, volumes) = tokio::join!(
        docker.list_containers(),
        docker.list_images(),
        docker.list_volumes()
    );
    let containers = containers?;
    let images = images?;
    let volumes = volumes?;

    let now = chrono::Utc::now();
    let cutoff = now.timestamp() - RECENT_WINDOW_SECS;
    let running = containers
        .iter()
        .filter(|container| container.state.is_running())
        .count();

    Ok(DashboardStats {
        containers: ContainerStats {
            total: containers.len(),
            running,
            stopped: containers.len() - running,
            recent: containers
                .iter()
                .filter(|container| container.created >= cutoff)
                .count(),
        },
        images: images.len(),
        volumes: volumes.len(),
        last_updated: now.to_rfc3339(),
    })
}
