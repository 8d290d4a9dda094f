//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (resolve correlation id + traceparent, attach carrier)
//!     → handlers.rs (local endpoints, pattern endpoints)
//!     → [orchestrator issues downstream calls]
//!     → response.rs (envelope, status)
//!     → request.rs (stamp X-Trace-ID)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::correlate;
pub use response::{Envelope, Reply};
pub use server::{AppState, HttpServer};
