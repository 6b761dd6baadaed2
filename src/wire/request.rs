//! Incremental multipart request builder.
//!
//! [`WireRequest`] writes sections into a byte buffer whose size is governed
//! by a [`BufferPolicy`]. Before anything is written the builder computes the
//! exact number of bytes the append needs (framing lines, headers, content,
//! trailing CRLF) plus every closing line the request still owes, and only
//! then touches the buffer. An append that cannot fit therefore fails without
//! changing the write cursor, and the closing calls (`end_part`, `end_tuple`,
//! `finalize`) never fail for lack of space.

use alloc::vec::Vec;

use tracing::debug;

use super::boundary::{self, BOUNDARY_LEN, Boundary, RandomSource};
use super::{RequestHead, content_type, header};
use crate::error::Error;

/// Starting buffer size of a resizable request.
pub const INITIAL_CAPACITY: usize = 512;

/// Content-ID of the first part inside a tuple.
pub const META_PART_ID: &str = "meta";
/// Content-ID of the second part inside a tuple.
pub const PAYLOAD_PART_ID: &str = "payload";

const DASHES: &[u8] = b"--";
const CRLF: &[u8] = b"\r\n";
const CONTENT_TYPE_PREFIX: &[u8] = b"Content-Type: ";
const CONTENT_ID_PREFIX: &[u8] = b"Content-ID: ";
const BOUNDARY_PARAM: &[u8] = b";boundary=";
const CHARSET_PARAM: &[u8] = b";charset=utf-8";

/// Attempts at drawing a boundary not yet used in the request.
const BOUNDARY_ATTEMPTS: usize = 8;

/// `--B\r\n`
const fn delimiter_len() -> usize {
    DASHES.len() + BOUNDARY_LEN + CRLF.len()
}

/// `--B--`
const fn close_len() -> usize {
    DASHES.len() + BOUNDARY_LEN + DASHES.len()
}

/// `;boundary=<B>;charset=utf-8`
const fn multipart_params_len() -> usize {
    BOUNDARY_PARAM.len() + BOUNDARY_LEN + CHARSET_PARAM.len()
}

/// Header block of one section, including the blank line that ends it.
const fn part_headers_len(content_type: usize, content_id: usize) -> usize {
    CONTENT_TYPE_PREFIX.len()
        + content_type
        + CRLF.len()
        + CONTENT_ID_PREFIX.len()
        + content_id
        + CRLF.len()
        + CRLF.len()
}

/// Closing line of a tuple's inner block plus the outer section's CRLF.
const fn tuple_close_len() -> usize {
    close_len() + CRLF.len()
}

/// Framing of a single with empty type, id and content.
const SINGLE_OVERHEAD: usize = delimiter_len() + part_headers_len(0, 0) + CRLF.len();

/// Framing of a tuple with empty type, id and content.
const TUPLE_OVERHEAD: usize = delimiter_len()
    + part_headers_len(content_type::MULTIPART_RELATED.len() + multipart_params_len(), 0)
    + delimiter_len()
    + part_headers_len(0, META_PART_ID.len())
    + CRLF.len()
    + delimiter_len()
    + part_headers_len(0, PAYLOAD_PART_ID.len())
    + CRLF.len()
    + tuple_close_len();

/// Size limits for one request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPolicy {
    /// Hard upper bound on the body size in bytes.
    pub ceiling: usize,
    /// Whether the buffer may start small and grow up to `ceiling`.
    ///
    /// A fixed request allocates `ceiling` bytes once and never grows or
    /// shrinks.
    pub resizable: bool,
}

impl BufferPolicy {
    /// A buffer that starts at [`INITIAL_CAPACITY`] and grows up to `ceiling`.
    pub fn resizable(ceiling: usize) -> Self {
        Self {
            ceiling,
            resizable: true,
        }
    }

    /// A buffer of exactly `capacity` bytes.
    pub fn fixed(capacity: usize) -> Self {
        Self {
            ceiling: capacity,
            resizable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Section {
    /// Between top-level sections.
    Top,
    /// Inside a tuple, between its inner parts.
    Tuple { sub: Boundary, parts: u8 },
    /// Inside one inner part of a tuple.
    Part { sub: Boundary, parts: u8 },
}

/// One outbound multipart request.
///
/// # Examples
///
/// ```rust
/// use libiot_ingest::wire::{BufferPolicy, Method, RandomSource, RequestHead, WireRequest};
///
/// struct Counter(u32);
/// impl RandomSource for Counter {
///     type Error = ();
///     fn next_u32(&mut self) -> Result<u32, ()> {
///         self.0 = self.0.wrapping_add(7);
///         Ok(self.0)
///     }
/// }
///
/// let head = RequestHead::new(Method::Post, "/iot/api/v2/messages", None).unwrap();
/// let mut request = WireRequest::new(head, BufferPolicy::resizable(16 * 1024), Counter(0)).unwrap();
/// request.add_header("Content-Type", "multipart/mixed").unwrap();
/// request.add_single("application/json", "m1", br#"{"t":21.5}"#).unwrap();
/// request.add_tuple("m2", "application/json", b"{}", "application/octet-stream", &[0xde, 0xad]).unwrap();
/// request.finalize().unwrap();
///
/// assert!(request.body().ends_with(b"--"));
/// ```
#[derive(Debug)]
pub struct WireRequest<R: RandomSource> {
    head: RequestHead,
    body: Vec<u8>,
    capacity: usize,
    policy: BufferPolicy,
    boundary: Boundary,
    used: Vec<Boundary>,
    section: Section,
    /// Bytes of closing lines owed by the sections currently open.
    pending: usize,
    sections: usize,
    finalized: bool,
    rng: R,
}

impl<R: RandomSource> WireRequest<R> {
    /// Creates an empty request and draws its top-level boundary.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if the ceiling is zero
    /// - [`Error::OutOfMemory`] if the initial buffer cannot be allocated
    /// - [`Error::RandomSource`] if the boundary cannot be drawn
    pub fn new(head: RequestHead, policy: BufferPolicy, mut rng: R) -> Result<Self, Error> {
        if policy.ceiling == 0 {
            return Err(Error::InvalidArgument);
        }
        let capacity = if policy.resizable {
            INITIAL_CAPACITY.min(policy.ceiling)
        } else {
            policy.ceiling
        };
        let mut body = Vec::new();
        body.try_reserve_exact(capacity)?;

        let boundary = boundary::generate(&mut rng)?;
        let mut used = Vec::new();
        used.try_reserve(1)?;
        used.push(boundary.clone());

        Ok(Self {
            head,
            body,
            capacity,
            policy,
            boundary,
            used,
            section: Section::Top,
            pending: close_len(),
            sections: 0,
            finalized: false,
            rng,
        })
    }

    /// Appends a request header.
    ///
    /// A `Content-Type` whose value is `multipart/*` gets the request's
    /// boundary and charset appended.
    pub fn add_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        if name.eq_ignore_ascii_case(header::CONTENT_TYPE) && content_type::is_multipart(value) {
            let mut full = alloc::string::String::new();
            full.try_reserve_exact(value.len() + multipart_params_len())?;
            full.push_str(value);
            full.push_str(";boundary=");
            full.push_str(&self.boundary);
            full.push_str(";charset=utf-8");
            return self.head.add_header(name, &full);
        }
        self.head.add_header(name, value)
    }

    /// Appends a metadata-only section.
    pub fn add_single(
        &mut self,
        content_type: &str,
        content_id: &str,
        content: &[u8],
    ) -> Result<(), Error> {
        self.expect_top()?;
        check_token(content_type)?;
        check_token(content_id)?;

        let needed = delimiter_len()
            + part_headers_len(content_type.len(), content_id.len())
            + content.len()
            + CRLF.len();
        self.ensure(needed, 0)?;

        let boundary = self.boundary.clone();
        self.put_delimiter(&boundary);
        self.put_part_headers(content_type, None, content_id);
        self.put(content);
        self.put(CRLF);
        self.sections += 1;
        Ok(())
    }

    /// Appends a metadata + payload section in one call.
    pub fn add_tuple(
        &mut self,
        content_id: &str,
        meta_type: &str,
        meta: &[u8],
        payload_type: &str,
        payload: &[u8],
    ) -> Result<(), Error> {
        self.expect_top()?;
        check_token(content_id)?;
        check_token(meta_type)?;
        check_token(payload_type)?;

        let needed = delimiter_len()
            + part_headers_len(
                content_type::MULTIPART_RELATED.len() + multipart_params_len(),
                content_id.len(),
            )
            + delimiter_len()
            + part_headers_len(meta_type.len(), META_PART_ID.len())
            + meta.len()
            + CRLF.len()
            + delimiter_len()
            + part_headers_len(payload_type.len(), PAYLOAD_PART_ID.len())
            + payload.len()
            + CRLF.len()
            + tuple_close_len();
        self.ensure(needed, 0)?;
        let sub = self.fresh_boundary()?;
        self.remember(sub.clone())?;

        let boundary = self.boundary.clone();
        self.put_delimiter(&boundary);
        self.put_part_headers(content_type::MULTIPART_RELATED, Some(&sub), content_id);
        self.put_delimiter(&sub);
        self.put_part_headers(meta_type, None, META_PART_ID);
        self.put(meta);
        self.put(CRLF);
        self.put_delimiter(&sub);
        self.put_part_headers(payload_type, None, PAYLOAD_PART_ID);
        self.put(payload);
        self.put(CRLF);
        self.put_tuple_close(&sub);
        self.sections += 1;
        Ok(())
    }

    /// Opens a tuple whose parts are written with [`begin_part`],
    /// [`append_raw`] and [`end_part`], then closed with [`end_tuple`].
    ///
    /// [`begin_part`]: WireRequest::begin_part
    /// [`append_raw`]: WireRequest::append_raw
    /// [`end_part`]: WireRequest::end_part
    /// [`end_tuple`]: WireRequest::end_tuple
    pub fn begin_tuple(&mut self, content_id: &str) -> Result<(), Error> {
        self.expect_top()?;
        check_token(content_id)?;

        let needed = delimiter_len()
            + part_headers_len(
                content_type::MULTIPART_RELATED.len() + multipart_params_len(),
                content_id.len(),
            );
        self.ensure(needed, tuple_close_len())?;
        let sub = self.fresh_boundary()?;
        self.remember(sub.clone())?;

        let boundary = self.boundary.clone();
        self.put_delimiter(&boundary);
        self.put_part_headers(content_type::MULTIPART_RELATED, Some(&sub), content_id);
        self.pending += tuple_close_len();
        self.section = Section::Tuple { sub, parts: 0 };
        Ok(())
    }

    /// Opens the next inner part of the current tuple.
    ///
    /// The first part is the metadata part, the second the payload part.
    pub fn begin_part(&mut self, content_type: &str) -> Result<(), Error> {
        let (sub, parts) = match &self.section {
            Section::Tuple { sub, parts } if *parts < 2 && !self.finalized => (sub.clone(), *parts),
            _ => return Err(Error::InvalidState),
        };
        check_token(content_type)?;
        let content_id = if parts == 0 {
            META_PART_ID
        } else {
            PAYLOAD_PART_ID
        };

        let needed = delimiter_len() + part_headers_len(content_type.len(), content_id.len());
        self.ensure(needed, CRLF.len())?;

        self.put_delimiter(&sub);
        self.put_part_headers(content_type, None, content_id);
        self.pending += CRLF.len();
        self.section = Section::Part { sub, parts };
        Ok(())
    }

    /// Appends raw bytes to the open part.
    pub fn append_raw(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if !matches!(self.section, Section::Part { .. }) || self.finalized {
            return Err(Error::InvalidState);
        }
        self.ensure(bytes.len(), 0)?;
        self.put(bytes);
        Ok(())
    }

    /// Closes the open part.
    pub fn end_part(&mut self) -> Result<(), Error> {
        let (sub, parts) = match &self.section {
            Section::Part { sub, parts } => (sub.clone(), *parts),
            _ => return Err(Error::InvalidState),
        };
        self.put(CRLF);
        self.pending -= CRLF.len();
        self.section = Section::Tuple {
            sub,
            parts: parts + 1,
        };
        Ok(())
    }

    /// Closes the open tuple once both parts have been written.
    pub fn end_tuple(&mut self) -> Result<(), Error> {
        let sub = match &self.section {
            Section::Tuple { sub, parts: 2 } => sub.clone(),
            _ => return Err(Error::InvalidState),
        };
        self.put_tuple_close(&sub);
        self.pending -= tuple_close_len();
        self.section = Section::Top;
        self.sections += 1;
        Ok(())
    }

    /// Writes the closing boundary.
    ///
    /// A resizable request then releases any unused capacity; a fixed request
    /// keeps its buffer as is.
    pub fn finalize(&mut self) -> Result<(), Error> {
        self.expect_top()?;
        if self.sections == 0 {
            return Err(Error::InvalidState);
        }
        let boundary = self.boundary.clone();
        self.put(DASHES);
        self.put(boundary.as_bytes());
        self.put(DASHES);
        self.pending -= close_len();
        self.finalized = true;

        if self.policy.resizable {
            self.body.shrink_to_fit();
            self.capacity = self.body.len();
        }
        debug!(
            bytes = self.body.len(),
            sections = self.sections,
            "request finalized"
        );
        Ok(())
    }

    /// Hands the bytes written so far to `sink` and rewinds the write cursor.
    ///
    /// Only fixed requests can be drained; this is how a streamed body is
    /// pushed out chunk by chunk through one bounded buffer.
    pub fn drain_with<F>(&mut self, sink: F) -> Result<(), Error>
    where
        F: FnOnce(&[u8]) -> Result<(), Error>,
    {
        if self.policy.resizable {
            return Err(Error::InvalidState);
        }
        if self.body.is_empty() {
            return Ok(());
        }
        sink(&self.body)?;
        self.body.clear();
        Ok(())
    }

    /// Bytes a raw append can still take.
    pub fn available_raw(&self) -> usize {
        self.remaining()
    }

    /// Content bytes a tuple can still take, across type, id, meta and payload.
    pub fn available_tuple(&self) -> usize {
        self.remaining().saturating_sub(TUPLE_OVERHEAD)
    }

    /// Content bytes a single can still take, across type, id and content.
    pub fn available_single(&self) -> usize {
        self.remaining().saturating_sub(SINGLE_OVERHEAD)
    }

    pub fn head(&self) -> &RequestHead {
        &self.head
    }

    /// The bytes written so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Write cursor position.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Current buffer capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> BufferPolicy {
        self.policy
    }

    /// The top-level boundary token.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Completed top-level sections.
    pub fn sections(&self) -> usize {
        self.sections
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Returns `true` while a tuple opened with [`WireRequest::begin_tuple`]
    /// is still open.
    pub fn in_tuple(&self) -> bool {
        !matches!(self.section, Section::Top)
    }

    /// Splits into head and body for sending.
    pub fn into_parts(self) -> (RequestHead, Vec<u8>) {
        (self.head, self.body)
    }

    fn remaining(&self) -> usize {
        if self.finalized {
            return 0;
        }
        let limit = if self.policy.resizable {
            self.policy.ceiling
        } else {
            self.capacity
        };
        limit.saturating_sub(self.body.len() + self.pending)
    }

    fn expect_top(&self) -> Result<(), Error> {
        if self.finalized || self.section != Section::Top {
            return Err(Error::InvalidState);
        }
        Ok(())
    }

    /// Makes room for `write` bytes now plus `reserve` more closing bytes.
    fn ensure(&mut self, write: usize, reserve: usize) -> Result<(), Error> {
        let required = self.body.len() + self.pending + write + reserve;
        if required <= self.capacity {
            return Ok(());
        }
        if !self.policy.resizable || required > self.policy.ceiling {
            return Err(Error::NoMoreSpace);
        }
        let target = grown_capacity(self.capacity, required, self.policy.ceiling);
        self.body.try_reserve_exact(target - self.body.len())?;
        debug!(from = self.capacity, to = target, "request buffer grown");
        self.capacity = target;
        Ok(())
    }

    fn fresh_boundary(&mut self) -> Result<Boundary, Error> {
        for _ in 0..BOUNDARY_ATTEMPTS {
            let candidate = boundary::generate(&mut self.rng)?;
            if !self.used.contains(&candidate) {
                return Ok(candidate);
            }
        }
        Err(Error::RandomSource)
    }

    fn remember(&mut self, sub: Boundary) -> Result<(), Error> {
        self.used.try_reserve(1)?;
        self.used.push(sub);
        Ok(())
    }

    fn put(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    fn put_delimiter(&mut self, boundary: &Boundary) {
        self.put(DASHES);
        self.put(boundary.as_bytes());
        self.put(CRLF);
    }

    fn put_part_headers(&mut self, content_type: &str, sub: Option<&Boundary>, content_id: &str) {
        self.put(CONTENT_TYPE_PREFIX);
        self.put(content_type.as_bytes());
        if let Some(sub) = sub {
            self.put(BOUNDARY_PARAM);
            self.put(sub.as_bytes());
            self.put(CHARSET_PARAM);
        }
        self.put(CRLF);
        self.put(CONTENT_ID_PREFIX);
        self.put(content_id.as_bytes());
        self.put(CRLF);
        self.put(CRLF);
    }

    fn put_tuple_close(&mut self, sub: &Boundary) {
        self.put(DASHES);
        self.put(sub.as_bytes());
        self.put(DASHES);
        self.put(CRLF);
    }
}

/// Next capacity for a buffer of `current` bytes that must hold `required`.
///
/// The capacity is scaled by the rounded-up ratio of required to current and
/// then by 1.5, and clamped to `ceiling`. Callers guarantee
/// `required <= ceiling`.
pub fn grown_capacity(current: usize, required: usize, ceiling: usize) -> usize {
    let current = current.max(1);
    let ratio = required.div_ceil(current);
    let scaled = current.saturating_mul(ratio).saturating_mul(3) / 2;
    scaled.min(ceiling).max(required)
}

/// Header values written into the body must be non-empty and single-line.
fn check_token(value: &str) -> Result<(), Error> {
    if value.is_empty() || value.bytes().any(|b| b == b'\r' || b == b'\n') {
        return Err(Error::InvalidArgument);
    }
    Ok(())
}
