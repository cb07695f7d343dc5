use serde::Serialize;

use crate::controllers::container_controller;
use crate::error::{ConcordError, StepOutcome};
use crate::models::image_models::ImageRecord;
use crate::utils::docker_utils::DockerClient;

#[derive(Debug, Clone, Serialize)]
pub struct ImageRemovalReport {
    pub image_id: String,
    /// per-container outcomes of the cascade phase, empty without cascade
    pub removed_containers: Vec<StepOutcome>,
}

impl ImageRemovalReport {
    pub fn has_failures(&self) -> bool {
        self.removed_containers.iter().any(|step| !step.ok)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub deleted_count: usize,
    pub failures: Vec<StepOutcome>,
}

/// Image listing with derived `is_running` flags.
pub async fn list_images(docker: &dyn DockerClient) -> Result<Vec<ImageRecord>, ConcordError> {
    let (_, images) = container_controller::list_containers_and_images(docker).await?;
    Ok(images)
}

/// Delete an image. Without cascade, any container still referencing the
/// image blocks the deletion and the exact blocking ids are surfaced.
/// With cascade, every blocking container is stopped and force-removed
/// first, best-effort per container; one failed container never aborts
/// the batch. If the daemon still refuses because the image is tagged in
/// multiple repositories, the removal is retried once forced.
pub async fn remove_image(
    docker: &dyn DockerClient,
    image_id: &str,
    cascade: bool,
) -> Result<ImageRemovalReport, ConcordError> {
    let containers = docker.list_containers().await?;
    let blocking: Vec<_> = containers
        .iter()
        .filter(|container| ids_match(&container.image_id, image_id))
        .collect();

    if !blocking.is_empty() && !cascade {
        return Err(ConcordError::ResourceInUse {
            blocking: blocking.iter().map(|c| c.id.clone()).collect(),
            detail: format!(
                "image {} is referenced by {} container(s)",
                image_id,
                blocking.len()
            ),
        });
    }

    let mut removed_containers = Vec::with_capacity(blocking.len());
    for container in &blocking {
        // Stop may fail because the container is already stopped; removal
        // is forced, so only the remove outcome counts.
        if container.state.is_running() {
            if let Err(err) = docker.stop_container(&container.id).await {
                tracing::warn!(container = %container.id, error = %err, "cascade stop failed");
            }
        }
        match docker.remove_container(&container.id, true).await {
            Ok(()) => removed_containers.push(StepOutcome::success(container.id.clone())),
            Err(err) => {
                tracing::warn!(container = %container.id, error = %err, "cascade remove failed");
                removed_containers.push(StepOutcome::failure(container.id.clone(), err.to_string()));
            }
        }
    }

    match docker.remove_image(image_id, false).await {
        Ok(()) => {}
        Err(err) if needs_force(&err) => {
            tracing::info!(image = image_id, "retrying image removal with force");
            if let Err(err) = docker.remove_image(image_id, true).await {
                return Err(batch_failure(err, image_id, removed_containers));
            }
        }
        Err(err) => return Err(batch_failure(err, image_id, removed_containers)),
    }

    tracing::info!(image = image_id, cascade, "image removed");
    Ok(ImageRemovalReport {
        image_id: image_id.to_string(),
        removed_containers,
    })
}

/// Remove all dangling images, best-effort per image.
pub async fn cleanup_unused_images(
    docker: &dyn DockerClient,
) -> Result<CleanupReport, ConcordError> {
    let dangling = docker.list_dangling_image_ids().await?;
    let mut deleted_count = 0;
    let mut failures = Vec::new();
    for id in &dangling {
        match docker.remove_image(id, true).await {
            Ok(()) => deleted_count += 1,
            Err(err) => {
                tracing::warn!(image = %id, error = %err, "cleanup removal failed");
                failures.push(StepOutcome::failure(id.clone(), err.to_string()));
            }
        }
    }
    tracing::info!(deleted_count, failed = failures.len(), "dangling image cleanup finished");
    Ok(CleanupReport {
        deleted_count,
        failures,
    })
}

/// When the cascade phase already ran, a terminal image-removal failure
/// must keep the per-container accounting: the steps and the final
/// refusal are folded into one partial failure. With no prior steps the
/// error passes through unchanged.
fn batch_failure(
    err: ConcordError,
    image_id: &str,
    mut steps: Vec<StepOutcome>,
) -> ConcordError {
    if steps.is_empty() {
        return err;
    }
    steps.push(StepOutcome::failure(image_id, err.to_string()));
    ConcordError::PartialFailure { steps }
}

/// Ids may arrive truncated (12-char display form) or full; compare on
/// the common prefix.
fn ids_match(a: &str, b: &str) -> bool {
    let a = a.strip_prefix("sha256:").unwrap_or(a);
    let b = b.strip_prefix("sha256:").unwrap_or(b);
    !a.is_empty() && !b.is_empty() && (a.starts_with(b) || b.starts_with(a))
}

/// Daemon refusals that a forced retry is allowed to override: the image
/// exists but is referenced under more than one tag.
fn needs_force(err: &ConcordError) -> bool {
    let text = match err {
        ConcordError::ResourceInUse { detail, .. } => detail,
        ConcordError::Unknown(detail) => detail,
        _ => return false,
    };
    let lower = text.to_lowercase();
    lower.contains("must be forced") || lower.contains("multiple repositories")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_matching_tolerates_truncation_and_digest_prefix() {
        assert!(ids_match(
            "3f5dd6647bd1",
            "sha256:3f5dd6647bd1e5fcb1f56f3bb0472b426b644ea3510dc64d92e7fa24caf0b075"
        ));
        assert!(ids_match("abc123def456", "abc123def456"));
        assert!(!ids_match("abc123def456", "123abc"));
        assert!(!ids_match("", "abc"));
    }

    #[test]
    fn terminal_failure_after_cascade_steps_folds_into_partial_failure() {
        let steps = vec![
            StepOutcome::success("c1"),
            StepOutcome::failure("c2", "stuck"),
        ];
        let err = batch_failure(ConcordError::Unknown("refused".to_string()), "img1", steps);
        assert_eq!(err.code(), "PARTIAL_FAILURE");
        match err {
            ConcordError::PartialFailure { steps } => {
                assert_eq!(steps.len(), 3);
                assert_eq!(steps[2].resource_id, "img1");
                assert!(!steps[2].ok);
            }
            other => panic!("expected PartialFailure, got {:?}", other),
        }

        // No cascade steps means nothing to account for.
        let err = batch_failure(ConcordError::Unknown("refused".to_string()), "img1", vec![]);
        assert_eq!(err.code(), "UNKNOWN_FAILURE");
    }

    #[test]
    fn force_retry_only_for_multi_reference_refusals() {
        assert!(needs_force(&ConcordError::ResourceInUse {
            blocking: vec![],
            detail: "image is referenced in multiple repositories".to_string(),
        }));
        assert!(needs_force(&ConcordError::Unknown(
            "conflict: unable to delete, image must be forced".to_string()
        )));
        assert!(!needs_force(&ConcordError::Unknown("disk on fire".to_string())));
        assert!(!needs_force(&ConcordError::Validation("nope".to_string())));
    }
}
