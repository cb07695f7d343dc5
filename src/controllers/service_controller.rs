use std::collections::BTreeMap;

use crate::controllers::container_controller;
use crate::error::{ConcordError, ErrorBody, StepOutcome};
use crate::models::container_models::ContainerRecord;
use crate::models::image_models::ImageRecord;
use crate::models::service_models::{RollbackReport, ServiceGroup, VersionEntry, VersionKey};
use crate::utils::docker_utils::DockerClient;
use crate::utils::label_utils;

/// Reconstruct the per-service version view from flat runtime listings.
/// Pure function of its inputs: groups are recomputed fresh on every
/// request, there is no cache to invalidate.
///
/// Containers are joined to images by exact id first, then by
/// "repository:tag"; a container whose image record is gone gets a
/// synthesized placeholder and never loses visibility.
pub fn build_groups(
    containers: &[ContainerRecord],
    images: &[ImageRecord],
) -> BTreeMap<String, ServiceGroup> {
    let mut groups: BTreeMap<String, ServiceGroup> = BTreeMap::new();

    for container in containers {
        let identity = label_utils::parse_identity(container);

        let image = images
            .iter()
            .find(|image| image.id == container.image_id)
            .or_else(|| {
                images
                    .iter()
                    .find(|image| container.image == format!("{}:{}", image.repository, image.tag))
            })
            .cloned()
            .unwrap_or_else(|| ImageRecord::placeholder(&container.image, &container.image_id));

        let entry = VersionEntry {
            is_running: container.state.is_running(),
            container: Some(container.clone()),
            image,
            version: identity.version,
            build: identity.build,
        };

        groups
            .entry(identity.service.clone())
            .or_insert_with(|| ServiceGroup {
                service_name: identity.service,
                versions: Vec::new(),
            })
            .versions
            .push(entry);
    }

    for group in groups.values_mut() {
        // Stable sort: comparator ties keep input order.
        group.versions.sort_by(|a, b| {
            VersionKey::parse(&a.version, a.build.as_deref())
                .cmp_newest_first(&VersionKey::parse(&b.version, b.build.as_deref()))
        });
    }

    groups
}

pub async fn list_services(
    docker: &dyn DockerClient,
) -> Result<Vec<ServiceGroup>, ConcordError> {
    let (containers, images) = container_controller::list_containers_and_images(docker).await?;
    Ok(build_groups(&containers, &images).into_values().collect())
}

pub async fn get_service(
    docker: &dyn DockerClient,
    service_name: &str,
) -> Result<ServiceGroup, ConcordError> {
    let (containers, images) = container_controller::list_containers_and_images(docker).await?;
    build_groups(&containers, &images)
        .remove(service_name)
        .ok_or_else(|| ConcordError::NotFound {
            target: format!("service {}", service_name),
        })
}

/// Switch the single running version of a service to the target entry.
///
/// Two-phase, best-effort protocol: gather the running siblings, stop
/// each one (every stop attempt resolves before the start begins, so two
/// versions never run past a settled rollback), then start the target
/// regardless of stop failures. Stop failures and a start failure are
/// reported distinctly; the runtime offers no cross-container
/// transaction to lean on.
pub async fn rollback(
    docker: &dyn DockerClient,
    service_name: &str,
    target_container_id: &str,
) -> Result<RollbackReport, ConcordError> {
    let group = get_service(docker, service_name).await?;

    let target_is_member = group.versions.iter().any(|entry| {
        entry
            .container
            .as_ref()
            .is_some_and(|container| container.id == target_container_id)
    });
    if !target_is_member {
        return Err(ConcordError::Validation(format!(
            "container {} does not belong to service {}",
            target_container_id, service_name
        )));
    }

    let siblings: Vec<String> = group
        .running_container_ids()
        .into_iter()
        .filter(|id| id != target_container_id)
        .collect();

    let mut stopped = Vec::with_capacity(siblings.len());
    for id in &siblings {
        match docker.stop_container(id).await {
            Ok(()) => {
                tracing::info!(service = service_name, container = %id, "stopped sibling version");
                stopped.push(StepOutcome::success(id.clone()));
            }
            Err(err) => {
                tracing::warn!(service = service_name, container = %id, error = %err, "sibling stop failed");
                stopped.push(StepOutcome::failure(id.clone(), err.to_string()));
            }
        }
    }

    // Stop phase has fully resolved; attempt the start no matter what.
    let (started, start_error) = match docker.start_container(target_container_id).await {
        Ok(()) => {
            tracing::info!(service = service_name, container = target_container_id, "rollback target started");
            (true, None)
        }
        Err(err) => {
            tracing::error!(service = service_name, container = target_container_id, error = %err, "rollback target failed to start");
            (false, Some(ErrorBody::from(&err)))
        }
    };

    Ok(RollbackReport {
        service_name: service_name.to_string(),
        target_container_id: target_container_id.to_string(),
        stopped,
        started,
        start_error,
    })
}

/// Stop one running version of a service.
pub async fn stop_version(docker: &dyn DockerClient, id: &str) -> Result<(), ConcordError> {
    container_controller::stop_container(docker, id).await
}

/// Delete a stopped version entry. Running entries are rejected with a
/// validation error before any runtime call is made.
pub async fn delete_version(docker: &dyn DockerClient, id: &str) -> Result<(), ConcordError> {
    container_controller::delete_container(docker, id).await
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::models::container_models::ContainerState;

    fn container(id: &str, name: &str, image: &str, image_id: &str, state: ContainerState) -> ContainerRecord {
        ContainerRecord {
            id: id.to_string(),
            name: name.to_string(),
            image: image.to_string(),
            image_id: image_id.to_string(),
            state,
            status: String::new(),
            created: 0,
            ports: vec![],
            volumes: vec![],
            labels: HashMap::new(),
            command: String::new(),
        }
    }

    fn image(id: &str, repository: &str, tag: &str) -> ImageRecord {
        ImageRecord {
            id: id.to_string(),
            repository: repository.to_string(),
            tag: tag.to_string(),
            size: "10.0MB".to_string(),
            created: "2 days ago".to_string(),
            is_running: false,
        }
    }

    #[test]
    fn versions_are_ordered_newest_first_with_build_tiebreak() {
        let containers = vec![
            container("c1", "svc-v1.0.0-100", "svc:v1.0.0", "i1", ContainerState::Exited),
            container("c2", "svc-v1.1.0-200", "svc:v1.1.0", "i2", ContainerState::Running),
            container("c3", "svc-v1.1.0-150", "svc:v1.1.0", "i2", ContainerState::Exited),
        ];
        let images = vec![image("i1", "svc", "v1.0.0"), image("i2", "svc", "v1.1.0")];

        let groups = build_groups(&containers, &images);
        let group = groups.get("svc").expect("svc group");
        let order: Vec<(&str, Option<&str>)> = group
            .versions
            .iter()
            .map(|v| (v.version.as_str(), v.build.as_deref()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("v1.1.0", Some("200")),
                ("v1.1.0", Some("150")),
                ("v1.0.0", Some("100")),
            ]
        );
    }

    #[test]
    fn image_join_prefers_exact_id_then_reference() {
        let containers = vec![
            container("c1", "api-v1.0.0", "api:v1.0.0", "i9", ContainerState::Exited),
            container("c2", "api-v2.0.0", "api:v2.0.0", "unknown", ContainerState::Exited),
        ];
        let images = vec![image("i9", "api", "v1.0.0"), image("i8", "api", "v2.0.0")];

        let groups = build_groups(&containers, &images);
        let group = groups.get("api").expect("api group");
        assert_eq!(group.versions.len(), 2);
        // c2 has no id match but "api:v2.0.0" matches i8 by reference
        let v2 = group.versions.iter().find(|v| v.version == "v2.0.0").unwrap();
        assert_eq!(v2.image.id, "i8");
    }

    #[test]
    fn unmatched_containers_get_placeholder_images() {
        let containers = vec![container(
            "c1",
            "ghost-v0.1.0",
            "ghost:v0.1.0",
            "gone00000000",
            ContainerState::Exited,
        )];

        let groups = build_groups(&containers, &[]);
        let group = groups.get("ghost").expect("container never dropped");
        let entry = &group.versions[0];
        assert!(entry.image.is_placeholder());
        assert_eq!(entry.image.repository, "ghost");
        assert_eq!(entry.image.tag, "v0.1.0");
        assert_eq!(entry.image.size, "Unknown");
    }

    #[test]
    fn containers_without_identity_still_group_by_best_effort_name() {
        let containers = vec![container(
            "c1",
            "registry.local/team/thing:prod",
            "img:prod",
            "i1",
            ContainerState::Running,
        )];
        let groups = build_groups(&containers, &[]);
        let group = groups.get("thing").expect("best-effort group");
        assert_eq!(group.versions[0].version, "latest");
        assert!(group.versions[0].is_running);
    }
}
