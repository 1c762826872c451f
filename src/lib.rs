mod annotate;
mod detection;
mod detector;
mod ort_detector;
mod routes;
mod server;
mod store;
mod telemetry;

pub mod app;
pub mod config;

pub use app::start_app;
