pub mod docker_utils;
pub mod label_utils;
