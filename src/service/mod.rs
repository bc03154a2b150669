pub mod client;
pub mod protocol;
pub mod server;

pub use client::ServiceClient;
pub use protocol::{ErrorResponse, HealthStatus, Request, Response};
pub use server::{handle_request, serve};
