//! # Application Layer Network Protocols
//!
//! Application layer (OSI Layer 7) clients built on the core network traits.
//!
//! - **[`http`]**: HTTP/1.1 client that carries wire requests to the
//!   ingestion endpoint
//!
//! ## Usage Pattern
//!
//! 1. Create a connection using your transport layer
//! 2. Wrap it with the protocol client
//! 3. Hand the client to the session as its [`Transport`](crate::network::Transport)

/// HTTP client implementation.
///
/// Provides a simple HTTP/1.1 client suitable for embedded systems,
/// supporting `Content-Length` and chunked request bodies.
pub mod http;
