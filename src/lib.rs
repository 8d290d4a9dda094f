//! Trace-propagating call orchestrator library

pub mod client;
pub mod config;
pub mod context;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod orchestrator;

pub use config::schema::ServiceConfig;
pub use context::ContextCarrier;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use orchestrator::Orchestrator;
