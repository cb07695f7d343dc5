use std::collections::HashSet;
use std::env;

use rand::Rng;

use crate::error::ConcordError;
use crate::models::container_models::{ContainerDetail, ContainerRecord, CreateContainerRequest};
use crate::models::image_models::ImageRecord;
use crate::utils::docker_utils::DockerClient;

const DEFAULT_PORT_RANGE: (u16, u16) = (20_000, 29_999);

/// Fetch fresh container and image snapshots in one round. The two
/// listings have no ordering dependency and are issued concurrently;
/// image `is_running` flags are derived from the container side.
pub async fn list_containers_and_images(
    docker: &dyn DockerClient,
) -> Result<(Vec<ContainerRecord>, Vec<ImageRecord>), ConcordError> {
    let (containers, images) = tokio::join!(docker.list_containers(), docker.list_images());
    let containers = containers?;
    let mut images = images?;

    let running_image_ids: HashSet<&str> = containers
        .iter()
        .filter(|container| container.state.is_running())
        .map(|container| container.image_id.as_str())
        .collect();
    for image in &mut images {
        image.is_running = running_image_ids.contains(image.id.as_str());
    }

    Ok((containers, images))
}

pub async fn inspect_container(
    docker: &dyn DockerClient,
    id: &str,
) -> Result<ContainerDetail, ConcordError> {
    docker.inspect_container(id).await
}

pub async fn start_container(docker: &dyn DockerClient, id: &str) -> Result<(), ConcordError> {
    tracing::info!(container = id, "starting container");
    docker.start_container(id).await
}

pub async fn stop_container(docker: &dyn DockerClient, id: &str) -> Result<(), ConcordError> {
    tracing::info!(container = id, "stopping container");
    docker.stop_container(id).await
}

/// Delete a stopped container. A running target is a caller error, never
/// silently coerced into stop+delete; no runtime mutation happens in that
/// case.
pub async fn delete_container(docker: &dyn DockerClient, id: &str) -> Result<(), ConcordError> {
    let containers = docker.list_containers().await?;
    let target = containers
        .iter()
        .find(|container| container.id == id)
        .ok_or_else(|| ConcordError::NotFound {
            target: format!("container {}", id),
        })?;

    if target.state.is_running() {
        return Err(ConcordError::Validation(format!(
            "container {} is running; stop it before deleting",
            target.name
        )));
    }

    tracing::info!(container = id, name = %target.name, "removing container");
    docker.remove_container(id, false).await
}

/// Create a container from an image. Image and name are required; when a
/// container port is requested, a host port is drawn at random from the
/// configured range to dodge collisions (placeholder allocation strategy,
/// not a port-management system).
pub async fn create_container(
    docker: &dyn DockerClient,
    mut request: CreateContainerRequest,
) -> Result<String, ConcordError> {
    if request.image.trim().is_empty() || request.name.trim().is_empty() {
        return Err(ConcordError::Validation(
            "image and name are required".to_string(),
        ));
    }

    if request.port.is_some() {
        let (start, end) = configured_port_range();
        request.host_port = Some(rand::thread_rng().gen_range(start..=end));
    }

    let id = docker.create_container(&request).await?;
    tracing::info!(
        container = %id,
        name = %request.name,
        image = %request.image,
        host_port = ?request.host_port,
        "created container"
    );
    Ok(id)
}

fn configured_port_range() -> (u16, u16) {
    let parse = |key: &str| {
        env::var(key)
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
    };
    match (
        parse("STARTING_PORT_RANGE"),
        parse("ENDING_PORT_RANGE"),
    ) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => DEFAULT_PORT_RANGE,
    }
}
