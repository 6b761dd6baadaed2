//! A network abstraction layer for embedded systems
//!
//! Two levels of abstraction live here:
//!
//! - byte connections ([`Read`], [`Write`], [`Close`], [`Connection`]) that a
//!   platform implements over its TCP/TLS stack, and
//! - [`Transport`], one HTTP round trip carrying a [`RequestHead`] and a body,
//!   returning a decoded [`WireResponse`].
//!
//! [`application::http::Client`] bridges the two: it implements `Transport`
//! for any `Connection`.

#![allow(missing_docs)]
#![deny(unsafe_code)]

/// Common error types for network operations
pub mod error;

/// Application-layer protocol clients
pub mod application;

use crate::wire::{RequestHead, WireResponse};

/// Re-exports of common traits
pub mod prelude {
    pub use super::{Close, Connection, Read, Transport, Write};
}

// Core synchronous traits
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read data from the connection
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write data to the connection
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

pub trait Close {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Close the connection
    fn close(self) -> Result<(), Self::Error>;
}

/// A synchronous connection
pub trait Connection: Read + Write + Close {}

/// One HTTP round trip to the ingestion endpoint.
///
/// Every call blocks until the response is complete or the transport's
/// per-request time limit expires. A non-2xx response is still `Ok`; status
/// interpretation belongs to the caller.
pub trait Transport {
    /// Sends `head` with a `Content-Length` body and waits for the response.
    fn exchange(&mut self, head: &RequestHead, body: &[u8]) -> Result<WireResponse, error::Error>;

    /// Sends `head` announcing a chunked body. Chunks follow through
    /// [`Transport::send_chunk`].
    fn begin_chunked(&mut self, head: &RequestHead) -> Result<(), error::Error>;

    /// Sends one body chunk. Empty chunks are skipped.
    fn send_chunk(&mut self, chunk: &[u8]) -> Result<(), error::Error>;

    /// Terminates the chunked body and waits for the response.
    fn finish_chunked(&mut self) -> Result<WireResponse, error::Error>;

    /// Sets the wall-clock limit for each request.
    fn set_timeout(&mut self, _seconds: u32) {}
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn exchange(&mut self, head: &RequestHead, body: &[u8]) -> Result<WireResponse, error::Error> {
        (**self).exchange(head, body)
    }

    fn begin_chunked(&mut self, head: &RequestHead) -> Result<(), error::Error> {
        (**self).begin_chunked(head)
    }

    fn send_chunk(&mut self, chunk: &[u8]) -> Result<(), error::Error> {
        (**self).send_chunk(chunk)
    }

    fn finish_chunked(&mut self) -> Result<WireResponse, error::Error> {
        (**self).finish_chunked()
    }

    fn set_timeout(&mut self, seconds: u32) {
        (**self).set_timeout(seconds)
    }
}
