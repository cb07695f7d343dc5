use std::collections::HashMap;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct VolumeRecord {
    pub name: String,
    pub driver: String,
    pub created: String,
    pub mountpoint: String,
    pub labels: HashMap<String, String>,
}
