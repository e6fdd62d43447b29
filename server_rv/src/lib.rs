//! Runs the rover: hardware backends, the HTTP control API, configuration, and bench checks

pub mod camera;
pub mod config;
pub mod diagnostics;
pub mod hardware;
pub mod http;
