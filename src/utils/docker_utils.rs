use std::collections::HashMap;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::image::{ListImagesOptions, RemoveImageOptions};
use bollard::secret::{
    ContainerInspectResponse, ContainerSummary, HostConfig, ImageSummary, PortBinding,
};
use bollard::volume::ListVolumesOptions;
use bollard::Docker;

use crate::error::ConcordError;
use crate::models::container_models::{
    ContainerDetail, ContainerRecord, ContainerState, CreateContainerRequest, MountRecord,
    PortMapping,
};
use crate::models::image_models::{self, ImageRecord};
use crate::models::volume_models::VolumeRecord;
use crate::utils::label_utils;

/// Seconds the daemon gets to stop a container gracefully before SIGKILL,
/// same grace the docker CLI uses.
const STOP_TIMEOUT_SECS: i64 = 10;

/// The runtime gateway. Every daemon interaction goes through this trait,
/// injected explicitly into controllers so the test suite can substitute
/// an in-memory double.
#[async_trait]
pub trait DockerClient: Send + Sync {
    async fn list_containers(&self) -> Result<Vec<ContainerRecord>, ConcordError>;
    async fn list_images(&self) -> Result<Vec<ImageRecord>, ConcordError>;
    async fn list_dangling_image_ids(&self) -> Result<Vec<String>, ConcordError>;
    async fn list_volumes(&self) -> Result<Vec<VolumeRecord>, ConcordError>;
    async fn inspect_container(&self, id: &str) -> Result<ContainerDetail, ConcordError>;
    async fn start_container(&self, id: &str) -> Result<(), ConcordError>;
    async fn stop_container(&self, id: &str) -> Result<(), ConcordError>;
    async fn remove_container(&self, id: &str, force: bool) -> Result<(), ConcordError>;
    async fn remove_image(&self, id: &str, force: bool) -> Result<(), ConcordError>;
    async fn create_container(
        &self,
        request: &CreateContainerRequest,
    ) -> Result<String, ConcordError>;
}

/// Production gateway backed by bollard over the local daemon socket.
pub struct BollardClient {
    docker: Docker,
}

impl BollardClient {
    pub fn connect() -> Result<Self, ConcordError> {
        let docker = Docker::connect_with_local_defaults().map_err(classify_error)?;
        Ok(BollardClient { docker })
    }
}

#[async_trait]
impl DockerClient for BollardClient {
    async fn list_containers(&self) -> Result<Vec<ContainerRecord>, ConcordError> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };
        let summaries = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(classify_error)?;

        let mut records = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let mut record = record_from_summary(summary);
            // Per-container enrichment is best-effort: a single failed
            // inspect degrades that record, never the whole listing.
            match self
                .docker
                .inspect_container(&record.id, None::<InspectContainerOptions>)
                .await
            {
                Ok(inspect) => enrich_record(&mut record, &inspect),
                Err(err) => {
                    tracing::debug!(container = %record.id, error = %err, "inspect enrichment failed");
                }
            }
            records.push(record);
        }
        Ok(records)
    }

    async fn list_images(&self) -> Result<Vec<ImageRecord>, ConcordError> {
        let summaries = self
            .docker
            .list_images(None::<ListImagesOptions<String>>)
            .await
            .map_err(classify_error)?;
        let now = chrono::Utc::now().timestamp();
        Ok(summaries
            .into_iter()
            .filter_map(|summary| image_from_summary(summary, now))
            .collect())
    }

    async fn list_dangling_image_ids(&self) -> Result<Vec<String>, ConcordError> {
        let mut filters = HashMap::new();
        filters.insert("dangling".to_string(), vec!["true".to_string()]);
        let options = ListImagesOptions::<String> {
            filters,
            ..Default::default()
        };
        let summaries = self
            .docker
            .list_images(Some(options))
            .await
            .map_err(classify_error)?;
        Ok(summaries.into_iter().map(|summary| summary.id).collect())
    }

    async fn list_volumes(&self) -> Result<Vec<VolumeRecord>, ConcordError> {
        let response = self
            .docker
            .list_volumes(None::<ListVolumesOptions<String>>)
            .await
            .map_err(classify_error)?;
        Ok(response
            .volumes
            .unwrap_or_default()
            .into_iter()
            .map(|volume| VolumeRecord {
                name: volume.name,
                driver: volume.driver,
                created: volume.created_at.unwrap_or_default(),
                mountpoint: volume.mountpoint,
                labels: volume.labels,
            })
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetail, ConcordError> {
        let inspect = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(classify_error)?;
        Ok(detail_from_inspect(inspect))
    }

    async fn start_container(&self, id: &str) -> Result<(), ConcordError> {
        match self
            .docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
        {
            Ok(()) => Ok(()),
            Err(err) if already_in_state(&err) => Ok(()),
            Err(err) => Err(classify_error(err)),
        }
    }

    async fn stop_container(&self, id: &str) -> Result<(), ConcordError> {
        let options = StopContainerOptions {
            t: STOP_TIMEOUT_SECS,
        };
        match self.docker.stop_container(id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(err) if already_in_state(&err) => Ok(()),
            Err(err) => Err(classify_error(err)),
        }
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<(), ConcordError> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };
        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(classify_error)
    }

    async fn remove_image(&self, id: &str, force: bool) -> Result<(), ConcordError> {
        let options = RemoveImageOptions {
            force,
            ..Default::default()
        };
        self.docker
            .remove_image(id, Some(options), None)
            .await
            .map_err(classify_error)?;
        Ok(())
    }

    async fn create_container(
        &self,
        request: &CreateContainerRequest,
    ) -> Result<String, ConcordError> {
        let options = CreateContainerOptions {
            name: request.name.clone(),
            ..Default::default()
        };

        let mut port_bindings = HashMap::new();
        let mut exposed_ports = HashMap::new();
        if let (Some(port), Some(host_port)) = (request.port, request.host_port) {
            let container_port = format!("{}/tcp", port);
            exposed_ports.insert(container_port.clone(), HashMap::new());
            port_bindings.insert(
                container_port,
                Some(vec![PortBinding {
                    host_ip: Some("0.0.0.0".to_string()),
                    host_port: Some(host_port.to_string()),
                }]),
            );
        }

        let host_config = HostConfig {
            port_bindings: if port_bindings.is_empty() {
                None
            } else {
                Some(port_bindings)
            },
            binds: request.volume.clone().map(|bind| vec![bind]),
            ..Default::default()
        };

        let config = Config {
            image: Some(request.image.clone()),
            labels: if request.labels.is_empty() {
                None
            } else {
                Some(request.labels.clone())
            },
            exposed_ports: if exposed_ports.is_empty() {
                None
            } else {
                Some(exposed_ports)
            },
            host_config: Some(host_config),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(classify_error)?;
        for warning in &response.warnings {
            tracing::warn!(container = %response.id, warning, "daemon warning on create");
        }
        Ok(response.id)
    }
}

/// The daemon answers 304 when a container is already in the requested
/// state; start and stop treat that as success so repeating a settled
/// operation stays a no-op.
fn already_in_state(err: &bollard::errors::Error) -> bool {
    matches!(
        err,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 304,
            ..
        }
    )
}

/// Classify a raw bollard error into the taxonomy. This is the only place
/// daemon error text is interpreted; callers above the gateway never
/// re-parse it.
pub fn classify_error(err: bollard::errors::Error) -> ConcordError {
    use bollard::errors::Error;

    match err {
        Error::DockerResponseServerError {
            status_code,
            message,
        } => match status_code {
            403 => ConcordError::PermissionDenied { detail: message },
            404 => ConcordError::NotFound { target: message },
            409 => ConcordError::ResourceInUse {
                blocking: vec![],
                detail: message,
            },
            _ => ConcordError::Unknown(format!("daemon returned {}: {}", status_code, message)),
        },
        Error::IOError { err } => {
            let detail = err.to_string();
            match err.kind() {
                std::io::ErrorKind::PermissionDenied => ConcordError::PermissionDenied { detail },
                std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused => {
                    ConcordError::RuntimeUnavailable { detail }
                }
                _ => ConcordError::Unknown(detail),
            }
        }
        other => {
            let detail = other.to_string();
            let lower = detail.to_lowercase();
            if lower.contains("permission denied") && lower.contains("docker.sock") {
                ConcordError::PermissionDenied { detail }
            } else if lower.contains("cannot connect to the docker daemon")
                || lower.contains("connection refused")
                || lower.contains("no such file or directory")
            {
                ConcordError::RuntimeUnavailable { detail }
            } else {
                ConcordError::Unknown(detail)
            }
        }
    }
}

fn record_from_summary(summary: ContainerSummary) -> ContainerRecord {
    let name = summary
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|name| name.trim_start_matches('/').to_string())
        .unwrap_or_else(|| "unnamed".to_string());

    let ports = summary
        .ports
        .unwrap_or_default()
        .into_iter()
        .map(|port| PortMapping {
            host_ip: port.ip,
            host_port: port.public_port.map(Into::into),
            container_port: port.private_port.into(),
            protocol: port
                .typ
                .map(|t| t.as_ref().to_string())
                .unwrap_or_else(|| "tcp".to_string()),
        })
        .collect();

    let volumes = summary
        .mounts
        .unwrap_or_default()
        .into_iter()
        .filter_map(|mount| mount.destination)
        .collect();

    ContainerRecord {
        id: summary.id.unwrap_or_default(),
        name,
        image: summary.image.unwrap_or_default(),
        image_id: summary
            .image_id
            .map(|id| image_models::short_id(&id))
            .unwrap_or_else(|| "unknown".to_string()),
        state: summary
            .state
            .as_deref()
            .map(ContainerState::parse)
            .unwrap_or(ContainerState::Unknown),
        status: summary.status.unwrap_or_default(),
        created: summary.created.unwrap_or_default(),
        ports,
        volumes,
        labels: summary.labels.unwrap_or_default(),
        command: summary.command.unwrap_or_default(),
    }
}

/// Overlay inspect-level config onto a summary record. The inspect view
/// is authoritative for labels; mounts fill in when the summary had none.
fn enrich_record(record: &mut ContainerRecord, inspect: &ContainerInspectResponse) {
    if let Some(config) = &inspect.config {
        if let Some(labels) = &config.labels {
            record.labels = labels.clone();
        }
    }
    if record.volumes.is_empty() {
        if let Some(mounts) = &inspect.mounts {
            record.volumes = mounts
                .iter()
                .filter_map(|mount| mount.destination.clone())
                .collect();
        }
    }
}

fn image_from_summary(summary: ImageSummary, now: i64) -> Option<ImageRecord> {
    // Untagged intermediates stay out of the dashboard listing.
    let reference = summary
        .repo_tags
        .iter()
        .find(|tag| tag.as_str() != "<none>:<none>")?
        .clone();
    let (repository, tag) = image_models::split_image_ref(&reference);
    Some(ImageRecord {
        id: image_models::short_id(&summary.id),
        repository,
        tag,
        size: image_models::human_size(summary.size),
        created: image_models::created_since(summary.created, now),
        is_running: false,
    })
}

fn detail_from_inspect(inspect: ContainerInspectResponse) -> ContainerDetail {
    let state = inspect
        .state
        .as_ref()
        .and_then(|state| state.status.as_ref())
        .map(|status| ContainerState::parse(status.as_ref()))
        .unwrap_or(ContainerState::Unknown);
    let (started_at, finished_at) = inspect
        .state
        .as_ref()
        .map(|s| (s.started_at.clone(), s.finished_at.clone()))
        .unwrap_or((None, None));

    let config = inspect.config.unwrap_or_default();
    let host_config = inspect.host_config.unwrap_or_default();
    let network = inspect.network_settings.unwrap_or_default();

    let labels = config.labels.unwrap_or_default();
    let service_label = labels.get(label_utils::SERVICE_LABEL).cloned();
    let version_label = labels.get(label_utils::VERSION_LABEL).cloned();
    let build_label = labels.get(label_utils::BUILD_LABEL).cloned();

    let mounts = inspect
        .mounts
        .unwrap_or_default()
        .into_iter()
        .map(|mount| MountRecord {
            mount_type: mount
                .typ
                .map(|t| t.as_ref().to_string())
                .unwrap_or_default(),
            source: mount.source.unwrap_or_default(),
            destination: mount.destination.unwrap_or_default(),
            mode: mount.mode.unwrap_or_default(),
            rw: mount.rw.unwrap_or(false),
        })
        .collect();

    ContainerDetail {
        id: inspect.id.unwrap_or_default(),
        name: inspect
            .name
            .map(|name| name.trim_start_matches('/').to_string())
            .unwrap_or_else(|| "unnamed".to_string()),
        image: config.image.unwrap_or_default(),
        state,
        created: inspect.created.unwrap_or_default(),
        env: config.env.unwrap_or_default(),
        cmd: config.cmd.unwrap_or_default(),
        working_dir: config.working_dir.unwrap_or_default(),
        user: config.user.unwrap_or_default(),
        network_mode: host_config
            .network_mode
            .unwrap_or_else(|| "default".to_string()),
        ip_address: network.ip_address.unwrap_or_default(),
        gateway: network.gateway.unwrap_or_default(),
        mounts,
        memory: host_config.memory.unwrap_or(0),
        cpu_shares: host_config.cpu_shares.unwrap_or(0),
        cpu_quota: host_config.cpu_quota.unwrap_or(0),
        cpu_period: host_config.cpu_period.unwrap_or(0),
        labels,
        service_label,
        version_label,
        build_label,
        restart_count: inspect.restart_count.unwrap_or(0),
        started_at,
        finished_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::errors::Error;

    #[test]
    fn daemon_status_codes_map_to_kinds() {
        let err = classify_error(Error::DockerResponseServerError {
            status_code: 404,
            message: "No such container: abc".to_string(),
        });
        assert!(matches!(err, ConcordError::NotFound { .. }));

        let err = classify_error(Error::DockerResponseServerError {
            status_code: 403,
            message: "access denied".to_string(),
        });
        assert!(matches!(err, ConcordError::PermissionDenied { .. }));

        let err = classify_error(Error::DockerResponseServerError {
            status_code: 409,
            message: "conflict".to_string(),
        });
        assert!(matches!(err, ConcordError::ResourceInUse { .. }));
    }

    #[test]
    fn not_modified_means_already_in_requested_state() {
        assert!(already_in_state(&Error::DockerResponseServerError {
            status_code: 304,
            message: "container already started".to_string(),
        }));
        assert!(!already_in_state(&Error::DockerResponseServerError {
            status_code: 409,
            message: "conflict".to_string(),
        }));
        assert!(!already_in_state(&Error::IOError {
            err: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "socket down"),
        }));
    }

    #[test]
    fn socket_errors_classify_by_io_kind() {
        let err = classify_error(Error::IOError {
            err: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "/var/run/docker.sock"),
        });
        assert!(matches!(err, ConcordError::PermissionDenied { .. }));
        assert!(!err.retryable());

        let err = classify_error(Error::IOError {
            err: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "socket down"),
        });
        assert!(matches!(err, ConcordError::RuntimeUnavailable { .. }));
        assert!(err.retryable());
    }

    #[test]
    fn unrecognized_errors_pass_through_raw_text() {
        let err = classify_error(Error::DockerResponseServerError {
            status_code: 500,
            message: "driver exploded".to_string(),
        });
        match err {
            ConcordError::Unknown(detail) => assert!(detail.contains("driver exploded")),
            other => panic!("expected Unknown, got {:?}", other),
        }
    }
}
