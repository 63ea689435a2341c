//! REST API Driving Adapter
//!
//! JSON endpoints under `/v1` plus the `/v1/events` server-sent event stream

pub mod events;
pub mod handlers;
pub mod router;
pub mod server;

pub use router::build_router;
pub use server::serve_on_tcp;
