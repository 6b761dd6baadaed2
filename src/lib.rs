//! # libiot-ingest - cloud ingestion client for IoT agents
//!
//! A Rust library that lets an IoT device push metadata and payloads to a
//! cloud ingestion endpoint over HTTPS. It builds wire-exact multipart
//! request bodies under a bounded memory budget, decodes responses, and
//! drives the device's credential lifecycle (registration, access tokens,
//! key rotation) with automatic recovery from authorization failures.
//! The library supports `no_std` environments with an allocator.
//!
//! ## Features
//!
//! ### Wire codec
//! - **Multipart encoder**: single (metadata) and tuple (metadata plus
//!   payload) sections, atomic or driven part by part
//! - **Bounded buffers**: growth up to a ceiling, or a fixed buffer drained
//!   chunk by chunk for streaming
//! - **Response decoder**: status, raw header lines and payload
//!
//! ### Session lifecycle
//! - Onboarding, access-token refresh, key rotation
//! - One-shot retry of data exchange on authorization failures
//! - Credential persistence to flash/EEPROM through the storage traits
//!
//! ### Network
//! - HTTP/1.1 client over any byte [`network::Connection`]
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! libiot-ingest = "0.1.0"
//! ```
//!
//! ### Building a request body
//!
//! ```rust
//! use libiot_ingest::wire::{BufferPolicy, Method, RandomSource, RequestHead, WireRequest, content_type};
//!
//! struct Counter(u32);
//!
//! impl RandomSource for Counter {
//!     type Error = ();
//!     fn next_u32(&mut self) -> Result<u32, ()> {
//!         self.0 = self.0.wrapping_add(7);
//!         Ok(self.0)
//!     }
//! }
//!
//! let head = RequestHead::new(Method::Post, "/iot/api/v2/messages", None).unwrap();
//! let mut request = WireRequest::new(head, BufferPolicy::resizable(16 * 1024), Counter(0)).unwrap();
//! request.add_header("Content-Type", content_type::MULTIPART_MIXED).unwrap();
//! request.add_single(content_type::JSON, "m1", br#"{"temp":21.5}"#).unwrap();
//! request.add_tuple("m2", content_type::JSON, br#"{"name":"frame.bin"}"#,
//!                   content_type::OCTET_STREAM, &[0u8; 64]).unwrap();
//! request.finalize().unwrap();
//!
//! assert!(request.body().ends_with(b"--"));
//! ```
//!
//! ### Running a session
//!
//! ```rust,no_run
//! use libiot_ingest::network::application::http::Client;
//! use libiot_ingest::session::{Container, HttpBackend, Item, Session, SessionConfig, SessionHooks};
//! use libiot_ingest::wire::content_type;
//! # use libiot_ingest::network::Connection;
//! # use libiot_ingest::wire::RandomSource;
//! # struct MockConnection;
//! # impl Connection for MockConnection {}
//! # impl libiot_ingest::network::Read for MockConnection {
//! #     type Error = ();
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
//! # }
//! # impl libiot_ingest::network::Write for MockConnection {
//! #     type Error = ();
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl libiot_ingest::network::Close for MockConnection {
//! #     type Error = ();
//! #     fn close(self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # struct Rng;
//! # impl RandomSource for Rng {
//! #     type Error = ();
//! #     fn next_u32(&mut self) -> Result<u32, ()> { Ok(4) }
//! # }
//!
//! let config = SessionConfig::new("iot.example.com")?.with_bootstrap_token("bootstrap")?;
//! let backend = HttpBackend::new(Client::new(MockConnection), Rng);
//! let mut session = Session::new(backend);
//! session.init(config, SessionHooks::default())?;
//! session.onboard()?;
//!
//! let mut container = Container::new();
//! container.push(Item::single("m1", content_type::JSON, br#"{"temp":21.5}"#))?;
//! session.process(&mut container)?;
//! # Ok::<(), libiot_ingest::error::Error>(())
//! ```
//!
//! ## Platform Support
//!
//! This library is designed to work on:
//! - Embedded microcontrollers with a heap (ARM Cortex-M, RISC-V, etc.)
//! - Linux-based IoT devices (Raspberry Pi, etc.)
//! - Any platform supporting Rust's `core` and `alloc` libraries
//!
//! ## Optional Features
//!
//! - `std`: Enable standard library support and the file credential store (default: disabled)
//! - `defmt`: Enable defmt formatting of error types for embedded debugging

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]
#![doc(html_root_url = "https://shishir-dey.github.io/libiot/")]

extern crate alloc;

/// Crate-wide error type.
pub mod error;

/// Text values with explicit ownership and growable lists of them.
pub mod text;

/// Multipart wire format: request builder, response decoder, boundaries.
pub mod wire;

/// Network abstraction layer: byte connections, the HTTP transport, and
/// the HTTP/1.1 client that implements it.
pub mod network;

/// Storage abstraction layer used to persist device credentials.
///
/// Provides byte-addressed read, write and erase traits over Flash memory,
/// EEPROM and similar devices, plus a RAM-backed implementation.
pub mod storage;

/// Session lifecycle engine: configuration, credentials, onboarding,
/// token refresh, key rotation and data exchange.
pub mod session;
