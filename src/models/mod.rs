pub mod container_models;
pub mod image_models;
pub mod service_models;
pub mod volume_models;
