//! Data handed to a session for exchange.

use alloc::borrow::Cow;
use alloc::vec::Vec;
use core::fmt;

use crate::error::Error;
use crate::text::Text;
use crate::wire::WireResponse;

/// Incremental reader for payloads that are not held in memory.
pub trait PayloadSource {
    /// Reads up to `buf.len()` bytes; `Ok(0)` marks the end.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error>;

    /// Restarts the source from its first byte so a refused exchange can be
    /// sent again.
    ///
    /// Sources that cannot restart return [`Error::InvalidState`]; a session
    /// then gives up on the retry instead of sending a truncated payload.
    fn rewind(&mut self) -> Result<(), Error> {
        Err(Error::InvalidState)
    }
}

impl PayloadSource for &[u8] {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let n = buf.len().min(self.len());
        buf[..n].copy_from_slice(&self[..n]);
        *self = &self[n..];
        Ok(n)
    }
}

/// A rewindable source over bytes already in memory.
#[derive(Debug, Clone)]
pub struct ByteSource<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteSource<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }
}

impl PayloadSource for ByteSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let rest = &self.bytes[self.pos..];
        let n = buf.len().min(rest.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }

    fn rewind(&mut self) -> Result<(), Error> {
        self.pos = 0;
        Ok(())
    }
}

/// The payload half of a tuple item.
pub enum Payload<'a> {
    Bytes(&'a [u8]),
    Stream(&'a mut dyn PayloadSource),
}

impl fmt::Debug for Payload<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Payload::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// One message: metadata, optionally paired with a payload.
#[derive(Debug)]
pub struct Item<'a> {
    content_id: Text<'a>,
    meta_type: Text<'a>,
    meta: &'a [u8],
    payload: Option<(Text<'a>, Payload<'a>)>,
    /// A stream payload has been read from since the last rewind.
    consumed: bool,
    /// The server accepted a request carrying this item.
    delivered: bool,
}

impl<'a> Item<'a> {
    /// A metadata-only item, sent as a single section.
    pub fn single(content_id: &'a str, meta_type: &'a str, meta: &'a [u8]) -> Self {
        Self {
            content_id: Text::borrowed(content_id),
            meta_type: Text::borrowed(meta_type),
            meta,
            payload: None,
            consumed: false,
            delivered: false,
        }
    }

    /// A metadata plus payload item, sent as a tuple.
    pub fn tuple(
        content_id: &'a str,
        meta_type: &'a str,
        meta: &'a [u8],
        payload_type: &'a str,
        payload: Payload<'a>,
    ) -> Self {
        Self {
            content_id: Text::borrowed(content_id),
            meta_type: Text::borrowed(meta_type),
            meta,
            payload: Some((Text::borrowed(payload_type), payload)),
            consumed: false,
            delivered: false,
        }
    }

    pub fn content_id(&self) -> &str {
        self.content_id.as_str()
    }

    pub fn meta_type(&self) -> &str {
        self.meta_type.as_str()
    }

    pub fn meta(&self) -> &[u8] {
        self.meta
    }

    pub fn payload_type(&self) -> Option<&str> {
        self.payload.as_ref().map(|(kind, _)| kind.as_str())
    }

    pub fn is_tuple(&self) -> bool {
        self.payload.is_some()
    }

    /// The payload bytes when they are held in memory.
    pub fn payload_bytes(&self) -> Option<&'a [u8]> {
        match self.payload.as_ref() {
            Some((_, Payload::Bytes(bytes))) => Some(*bytes),
            _ => None,
        }
    }

    /// Reads the next chunk of a stream payload; `Ok(0)` marks the end.
    ///
    /// Fails with [`Error::InvalidState`] if the payload is not a stream.
    pub fn read_stream(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        match self.payload.as_mut() {
            Some((_, Payload::Stream(source))) => {
                self.consumed = true;
                source.read(buf)
            }
            _ => Err(Error::InvalidState),
        }
    }

    /// The whole payload in memory. A stream payload is read to its end.
    pub fn read_payload(&mut self) -> Result<Option<Cow<'a, [u8]>>, Error> {
        if !self.is_tuple() {
            return Ok(None);
        }
        if let Some(bytes) = self.payload_bytes() {
            return Ok(Some(Cow::Borrowed(bytes)));
        }
        let mut out = Vec::new();
        let mut chunk = [0u8; 256];
        loop {
            let n = self.read_stream(&mut chunk)?;
            if n == 0 {
                break;
            }
            out.try_reserve(n)?;
            out.extend_from_slice(&chunk[..n]);
        }
        Ok(Some(Cow::Owned(out)))
    }

    /// Whether a request carrying this item was accepted by the server.
    pub fn is_delivered(&self) -> bool {
        self.delivered
    }

    pub(crate) fn mark_delivered(&mut self) {
        self.delivered = true;
    }

    /// Restarts a consumed stream payload. In-memory payloads need nothing.
    fn rewind(&mut self) -> Result<(), Error> {
        if !self.consumed {
            return Ok(());
        }
        if let Some((_, Payload::Stream(source))) = self.payload.as_mut() {
            source.rewind()?;
        }
        self.consumed = false;
        Ok(())
    }
}

/// An ordered batch of items plus the responses the server sent for it.
#[derive(Debug, Default)]
pub struct Container<'a> {
    items: Vec<Item<'a>>,
    streamable: bool,
    correlation_id: Option<Text<'a>>,
    responses: Vec<WireResponse>,
}

impl<'a> Container<'a> {
    /// A container sent in memory-bounded requests that may split across
    /// several round trips.
    pub fn new() -> Self {
        Self::default()
    }

    /// A container sent as one chunked request through a fixed buffer.
    pub fn streaming() -> Self {
        Self {
            streamable: true,
            ..Self::default()
        }
    }

    pub fn with_correlation_id(mut self, id: &'a str) -> Self {
        self.correlation_id = Some(Text::borrowed(id));
        self
    }

    pub fn push(&mut self, item: Item<'a>) -> Result<(), Error> {
        self.items.try_reserve(1)?;
        self.items.push(item);
        Ok(())
    }

    pub fn items(&self) -> &[Item<'a>] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [Item<'a>] {
        &mut self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_streamable(&self) -> bool {
        self.streamable
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_ref().map(Text::as_str)
    }

    /// Responses collected by the last exchange, one per request sent.
    pub fn responses(&self) -> &[WireResponse] {
        &self.responses
    }

    pub fn take_responses(&mut self) -> Vec<WireResponse> {
        core::mem::take(&mut self.responses)
    }

    /// Appends a response received for this container.
    pub fn record_response(&mut self, response: WireResponse) -> Result<(), Error> {
        self.responses.try_reserve(1)?;
        self.responses.push(response);
        Ok(())
    }

    /// Items the server has not accepted yet.
    pub fn undelivered(&self) -> usize {
        self.items.iter().filter(|item| !item.delivered).count()
    }

    /// Forgets earlier deliveries and responses before a fresh exchange.
    pub(crate) fn restart(&mut self) {
        self.responses.clear();
        for item in &mut self.items {
            item.delivered = false;
        }
    }

    /// Prepares undelivered items to be sent again.
    ///
    /// Fails if a consumed stream payload cannot be restarted.
    pub(crate) fn rewind_undelivered(&mut self) -> Result<(), Error> {
        for item in self.items.iter_mut().filter(|item| !item.delivered) {
            item.rewind()?;
        }
        Ok(())
    }
}
