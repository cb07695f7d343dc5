use std::sync::Arc;

use bytes::Bytes;
use http::{header, Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::controllers::{
    container_controller, image_controller, service_controller, stats_controller,
};
use crate::error::{ConcordError, ErrorBody};
use crate::models::container_models::CreateContainerRequest;
use crate::utils::docker_utils::DockerClient;

#[derive(Debug, Deserialize)]
struct RollbackRequest {
    target: String,
}

/// Entry point for one HTTP request. The gateway is passed through
/// explicitly; there is no shared mutable state between requests.
pub async fn route(
    request: Request<Incoming>,
    docker: Arc<dyn DockerClient>,
) -> Response<Full<Bytes>> {
    let request_id = Uuid::new_v4().simple().to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let query = request.uri().query().map(str::to_string);
    tracing::info!(%request_id, %method, %path, "request received");

    let body = match request.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            return error_response(&ConcordError::Validation(format!(
                "failed to read request body: {}",
                err
            )))
        }
    };

    let segments: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    match dispatch(&method, &segments, query.as_deref(), &body, docker.as_ref()).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(%request_id, %method, %path, code = err.code(), error = %err, "request failed");
            error_response(&err)
        }
    }
}

async fn dispatch(
    method: &Method,
    segments: &[&str],
    query: Option<&str>,
    body: &Bytes,
    docker: &dyn DockerClient,
) -> Result<Response<Full<Bytes>>, ConcordError> {
    match (method.as_str(), segments) {
        ("GET", ["api", "docker", "containers"]) => {
            let (containers, images) =
                container_controller::list_containers_and_images(docker).await?;
            json(
                StatusCode::OK,
                &serde_json::json!({ "containers": containers, "images": images }),
            )
        }
        ("GET", ["api", "docker", "containers", id, "inspect"]) => {
            let detail = container_controller::inspect_container(docker, id).await?;
            json(StatusCode::OK, &detail)
        }
        ("POST", ["api", "docker", "containers", "create"]) => {
            let request: CreateContainerRequest = parse_body(body)?;
            let id = container_controller::create_container(docker, request).await?;
            json(
                StatusCode::CREATED,
                &serde_json::json!({ "success": true, "containerId": id }),
            )
        }
        ("POST", ["api", "docker", "containers", id, "start"]) => {
            container_controller::start_container(docker, id).await?;
            json(
                StatusCode::OK,
                &serde_json::json!({ "success": true, "message": format!("Container {} started", id) }),
            )
        }
        ("POST", ["api", "docker", "containers", id, "stop"]) => {
            container_controller::stop_container(docker, id).await?;
            json(
                StatusCode::OK,
                &serde_json::json!({ "success": true, "message": format!("Container {} stopped", id) }),
            )
        }
        ("DELETE", ["api", "docker", "containers", id]) => {
            service_controller::delete_version(docker, id).await?;
            json(
                StatusCode::OK,
                &serde_json::json!({ "success": true, "message": format!("Container {} deleted", id) }),
            )
        }
        ("GET", ["api", "docker", "images"]) => {
            let images = image_controller::list_images(docker).await?;
            json(StatusCode::OK, &images)
        }
        ("POST", ["api", "docker", "images", "cleanup"]) => {
            let report = image_controller::cleanup_unused_images(docker).await?;
            let status = if report.failures.is_empty() {
                StatusCode::OK
            } else {
                StatusCode::MULTI_STATUS
            };
            json(status, &report)
        }
        ("DELETE", ["api", "docker", "images", id]) => {
            let cascade = query_flag(query, "cascade");
            let report = image_controller::remove_image(docker, id, cascade).await?;
            let status = if report.has_failures() {
                StatusCode::MULTI_STATUS
            } else {
                StatusCode::OK
            };
            json(status, &report)
        }
        ("GET", ["api", "docker", "volumes"]) => {
            let volumes = docker.list_volumes().await?;
            json(StatusCode::OK, &volumes)
        }
        ("GET", ["api", "docker", "stats"]) => {
            let stats = stats_controller::dashboard_stats(docker).await?;
            json(StatusCode::OK, &stats)
        }
        ("GET", ["api", "services"]) => {
            let services = service_controller::list_services(docker).await?;
            json(StatusCode::OK, &services)
        }
        ("GET", ["api", "services", name]) => {
            let service = service_controller::get_service(docker, name).await?;
            json(StatusCode::OK, &service)
        }
        ("POST", ["api", "services", name, "rollback"]) => {
            let request: RollbackRequest = parse_body(body)?;
            let report = service_controller::rollback(docker, name, &request.target).await?;
            let status = if report.fully_succeeded() {
                StatusCode::OK
            } else {
                StatusCode::MULTI_STATUS
            };
            json(status, &report)
        }
        _ => Err(ConcordError::NotFound {
            target: format!("route {} {}", method, segments.join("/")),
        }),
    }
}

fn parse_body<T: for<'de> Deserialize<'de>>(body: &Bytes) -> Result<T, ConcordError> {
    serde_json::from_slice(body)
        .map_err(|err| ConcordError::Validation(format!("invalid request body: {}", err)))
}

fn query_flag(query: Option<&str>, key: &str) -> bool {
    query.is_some_and(|q| {
        q.split('&')
            .any(|pair| pair == format!("{}=true", key) || pair == key)
    })
}

fn status_for(err: &ConcordError) -> StatusCode {
    match err {
        ConcordError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
        ConcordError::RuntimeUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        ConcordError::NotFound { .. } => StatusCode::NOT_FOUND,
        ConcordError::ResourceInUse { .. } => StatusCode::CONFLICT,
        ConcordError::Validation(_) => StatusCode::BAD_REQUEST,
        ConcordError::PartialFailure { .. } => StatusCode::MULTI_STATUS,
        ConcordError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn json<T: Serialize>(
    status: StatusCode,
    payload: &T,
) -> Result<Response<Full<Bytes>>, ConcordError> {
    let body = serde_json::to_vec(payload).map_err(|err| ConcordError::Unknown(err.to_string()))?;
    Ok(Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap())
}

fn error_response(err: &ConcordError) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(&ErrorBody::from(err)).unwrap_or_default();
    Response::builder()
        .status(status_for(err))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}
