//! # Multipart wire codec
//!
//! This module produces and parses the exact bytes exchanged with the
//! ingestion endpoint.
//!
//! An outbound body is a `multipart/mixed` document:
//!
//! ```text
//! --<BOUNDARY>\r\n
//! Content-Type: application/json\r\n
//! Content-ID: m1\r\n
//! \r\n
//! {"sensor":"t1"}\r\n
//! --<BOUNDARY>\r\n
//! Content-Type: multipart/related;boundary=<SUB>;charset=utf-8\r\n
//! Content-ID: m2\r\n
//! \r\n
//! --<SUB>\r\n
//! Content-Type: application/json\r\n
//! Content-ID: meta\r\n
//! \r\n
//! {"name":"frame.bin"}\r\n
//! --<SUB>\r\n
//! Content-Type: application/octet-stream\r\n
//! Content-ID: payload\r\n
//! \r\n
//! <payload bytes>\r\n
//! --<SUB>--\r\n
//! --<BOUNDARY>--
//! ```
//!
//! The first section above is a *single* (metadata only), the second a
//! *tuple* (metadata plus payload nested in its own `multipart/related`
//! block). [`WireRequest`] writes both shapes into a buffer that grows under a
//! [`BufferPolicy`]; [`WireResponse`] wraps what came back.
//!
//! Boundaries are 22 characters drawn from `[0-9a-zA-Z]` through an injected
//! [`RandomSource`], so encoding is deterministic under a seeded source.

#![allow(missing_docs)]
#![deny(unsafe_code)]

use alloc::format;
use alloc::string::String;

use crate::error::Error;
use crate::text::{Text, TextList};

pub mod boundary;
pub mod request;
pub mod response;

pub use boundary::{Boundary, RandomSource};
pub use request::{BufferPolicy, WireRequest};
pub use response::WireResponse;

/// Product token sent in every `User-Agent` header.
pub const USER_AGENT: &str = concat!("libiot-ingest/", env!("CARGO_PKG_VERSION"));

/// Header names used on the wire.
pub mod header {
    pub const AUTHORIZATION: &str = "Authorization";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const CONTENT_ID: &str = "Content-ID";
    pub const CONTENT_LENGTH: &str = "Content-Length";
    pub const TRANSFER_ENCODING: &str = "Transfer-Encoding";
    pub const USER_AGENT: &str = "User-Agent";
    pub const ACCEPT: &str = "Accept";
    pub const HOST: &str = "Host";
    pub const CONTENT_DISPOSITION: &str = "Content-Disposition";
    pub const RANGE: &str = "Range";
    pub const CONTENT_RANGE: &str = "Content-Range";
    pub const SERVER_TIME: &str = "Server-Time";
    pub const IF_MATCH: &str = "If-Match";
    pub const ETAG: &str = "ETag";
    pub const CORRELATION_ID: &str = "Correlation-ID";
}

/// Content types the codec knows about.
pub mod content_type {
    pub const MULTIPART_MIXED: &str = "multipart/mixed";
    pub const MULTIPART_RELATED: &str = "multipart/related";
    pub const JSON: &str = "application/json";
    pub const OCTET_STREAM: &str = "application/octet-stream";
    pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

    /// Returns `true` for any `multipart/*` value.
    pub fn is_multipart(value: &str) -> bool {
        value
            .get(..10)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("multipart/"))
    }
}

/// HTTP request methods used against the ingestion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }
}

/// Method, URI and header lines of an outbound request.
///
/// Header lines are stored pre-formatted as `name: value` so a transport can
/// write them out verbatim.
#[derive(Debug, Clone)]
pub struct RequestHead {
    method: Method,
    uri: String,
    headers: TextList<'static>,
}

impl RequestHead {
    /// Creates a head carrying the fixed `User-Agent` line.
    ///
    /// `user_agent_suffix` is appended to [`USER_AGENT`] after a space.
    pub fn new(method: Method, uri: &str, user_agent_suffix: Option<&str>) -> Result<Self, Error> {
        if uri.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let mut head = Self {
            method,
            uri: Text::copied(uri)?.into_string(),
            headers: TextList::new(),
        };
        match user_agent_suffix.filter(|suffix| !suffix.is_empty()) {
            Some(suffix) => {
                let value = format!("{USER_AGENT} {suffix}");
                head.add_header(header::USER_AGENT, &value)?;
            }
            None => head.add_header(header::USER_AGENT, USER_AGENT)?,
        }
        Ok(head)
    }

    /// Appends a `name: value` line.
    pub fn add_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        if name.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let mut line = String::new();
        line.try_reserve_exact(name.len() + 2 + value.len())?;
        line.push_str(name);
        line.push_str(": ");
        line.push_str(value);
        self.headers.add(Text::adopted(line))
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The header lines in insertion order.
    pub fn headers(&self) -> &TextList<'static> {
        &self.headers
    }

    /// Returns the value of the first header line named `name`, without the
    /// separating space.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|line| {
            let (line_name, value) = line.as_str().split_once(':')?;
            line_name
                .eq_ignore_ascii_case(name)
                .then(|| value.trim_start())
        })
    }
}
