//! Binary HTTP transport that shares one [`crate::CacheClient`] between
//! processes.
//!
//! | Endpoint | Methods | Body |
//! |----------|---------|------|
//! | `/quote` | GET, POST | [`crate::QuoteRequest`] → [`crate::QuoteBatch`] |
//! | `/chart` | GET, POST | [`crate::ChartRequest`] → [`crate::ChartBatch`] |
//! | `/health` | GET | JSON status |
//! | `/metrics` | GET | JSON metrics snapshot |
//!
//! Failed calls answer 400 with the error message as the body and the
//! error code in the `x-ponzi-error` header.

mod client;
mod server;

pub use client::RemoteClient;
pub use server::{bind, router, serve, ServerState};

pub const ERROR_HEADER: &str = "x-ponzi-error";
pub const BINARY_CONTENT_TYPE: &str = "application/octet-stream";
