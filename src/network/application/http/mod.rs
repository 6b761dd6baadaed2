//! HTTP/1.1 protocol implementation for embedded systems.
//!
//! This module provides a lightweight HTTP client designed for `no_std`
//! environments. It writes a [`RequestHead`](crate::wire::RequestHead) and
//! body onto any [`Connection`](crate::network::Connection) and parses the
//! reply into a [`WireResponse`](crate::wire::WireResponse).
//!
//! # Features
//!
//! - HTTP/1.1 request/response over a single persistent connection
//! - `Content-Length` and `Transfer-Encoding: chunked` request bodies
//! - `Content-Length`, chunked and read-to-close response bodies
//!
//! ```rust,no_run
//! use libiot_ingest::network::Transport;
//! use libiot_ingest::network::application::http::Client;
//! use libiot_ingest::wire::{Method, RequestHead};
//! # use libiot_ingest::network::Connection;
//! # struct MockConnection;
//! # impl Connection for MockConnection {}
//! # impl libiot_ingest::network::Read for MockConnection {
//! #     type Error = ();
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
//! # }
//! # impl libiot_ingest::network::Write for MockConnection {
//! #     type Error = ();
//! #     fn write(&mut self, _buf: &[u8]) -> Result<usize, Self::Error> { Ok(0) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl libiot_ingest::network::Close for MockConnection {
//! #     type Error = ();
//! #     fn close(self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//!
//! let mut client = Client::new(MockConnection);
//! let head = RequestHead::new(Method::Get, "/iot/api/v2/status", None).unwrap();
//! // let response = client.exchange(&head, &[])?;
//! ```

/// HTTP client implementation.
pub mod client;

pub use client::Client;
