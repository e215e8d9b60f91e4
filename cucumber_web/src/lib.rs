mod routes;
mod server;
mod telemetry;

pub mod app;
pub mod config;

pub use app::start_app;
