pub mod container_controller;
pub mod image_controller;
pub mod service_controller;
pub mod stats_controller;
