//! Decoded server responses.

use alloc::vec::Vec;

use super::header;
use crate::error::Error;
use crate::text::TextList;

/// A completed response: status code, raw header lines and payload.
///
/// Header lines are kept exactly as received (`name: value`), and lookups
/// return everything after the first colon, leading space included.
///
/// ```rust
/// use libiot_ingest::text::{Text, TextList};
/// use libiot_ingest::wire::WireResponse;
///
/// let mut headers = TextList::new();
/// headers.add(Text::borrowed("Content-Type: application/json")).unwrap();
/// let response = WireResponse::new(200, headers, b"{}".to_vec());
///
/// assert_eq!(response.header("content-type").unwrap(), Some(" application/json"));
/// ```
#[derive(Debug, Clone)]
pub struct WireResponse {
    status: u16,
    headers: TextList<'static>,
    payload: Vec<u8>,
}

impl WireResponse {
    pub fn new(status: u16, headers: TextList<'static>, payload: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            payload,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &TextList<'static> {
        &self.headers
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Maps the status code onto [`Error`]; `Ok` for 2xx.
    pub fn check_status(&self) -> Result<(), Error> {
        Error::check_status(self.status)
    }

    /// Looks up a header by name.
    ///
    /// The first stored line that starts with `name` (ignoring ASCII case)
    /// is split once at its first colon and the remainder returned verbatim.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `name` is empty
    /// - [`Error::MalformedData`] if the matching line has no colon
    pub fn header(&self, name: &str) -> Result<Option<&str>, Error> {
        if name.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let line = self.headers.iter().find(|line| {
            line.as_str()
                .as_bytes()
                .get(..name.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(name.as_bytes()))
        });
        let Some(line) = line else {
            return Ok(None);
        };
        let mut parts = line.as_str().splitn(2, ':');
        parts.next();
        match parts.next() {
            Some(value) => Ok(Some(value)),
            None => Err(Error::MalformedData),
        }
    }

    /// The `Content-Length` header, if present.
    pub fn content_length(&self) -> Result<Option<usize>, Error> {
        self.parsed_header(header::CONTENT_LENGTH)
    }

    /// The `Server-Time` header, in the server's epoch units.
    pub fn server_time(&self) -> Result<Option<u64>, Error> {
        self.parsed_header(header::SERVER_TIME)
    }

    fn parsed_header<T: core::str::FromStr>(&self, name: &str) -> Result<Option<T>, Error> {
        match self.header(name)? {
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| Error::MalformedData),
            None => Ok(None),
        }
    }
}
