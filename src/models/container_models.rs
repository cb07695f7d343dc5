use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Container lifecycle state as reported by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unknown,
}

impl ContainerState {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "created" => ContainerState::Created,
            "running" => ContainerState::Running,
            "paused" => ContainerState::Paused,
            "restarting" => ContainerState::Restarting,
            "removing" => ContainerState::Removing,
            "exited" => ContainerState::Exited,
            "dead" => ContainerState::Dead,
            _ => ContainerState::Unknown,
        }
    }

    pub fn is_running(self) -> bool {
        self == ContainerState::Running
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Restarting => "restarting",
            ContainerState::Removing => "removing",
            ContainerState::Exited => "exited",
            ContainerState::Dead => "dead",
            ContainerState::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PortMapping {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_port: Option<i64>,
    pub container_port: i64,
    pub protocol: String,
}

/// One container as seen in a listing. Read-only snapshot owned by the
/// runtime; refreshed on every request, never cached.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    /// image reference the container was created from, e.g. "repo:tag"
    pub image: String,
    /// truncated display form of the image id, "unknown" when unresolved
    pub image_id: String,
    pub state: ContainerState,
    pub status: String,
    /// creation time, unix seconds
    pub created: i64,
    pub ports: Vec<PortMapping>,
    /// mount destinations inside the container
    pub volumes: Vec<String>,
    pub labels: HashMap<String, String>,
    pub command: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MountRecord {
    pub mount_type: String,
    pub source: String,
    pub destination: String,
    pub mode: String,
    pub rw: bool,
}

/// Inspect-level view of a single container.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerDetail {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
    pub created: String,

    pub env: Vec<String>,
    pub cmd: Vec<String>,
    pub working_dir: String,
    pub user: String,

    pub network_mode: String,
    pub ip_address: String,
    pub gateway: String,

    pub mounts: Vec<MountRecord>,

    pub memory: i64,
    pub cpu_shares: i64,
    pub cpu_quota: i64,
    pub cpu_period: i64,

    pub labels: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_label: Option<String>,

    pub restart_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

/// Creation request accepted by the create endpoint. `host_port` is filled
/// in by the controller when `port` asks for a published port.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateContainerRequest {
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// optional bind in "host_path:container_path" form
    pub volume: Option<String>,
    /// container port to publish
    pub port: Option<u16>,
    #[serde(skip)]
    pub host_port: Option<u16>,
}
