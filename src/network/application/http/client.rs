use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write as _;
use core::ops::Range;

use tracing::debug;

use crate::network::error::Error;
use crate::network::{Connection, Transport};
use crate::text::{Text, TextList};
use crate::wire::{Method, RequestHead, WireResponse, header};

/// Largest response head accepted, in bytes.
const MAX_HEAD_LEN: usize = 8 * 1024;
/// Largest response (head and body) accepted, in bytes.
const MAX_RESPONSE_LEN: usize = 256 * 1024;
const READ_CHUNK: usize = 512;

enum Framing {
    Length(usize),
    Chunked,
}

/// HTTP/1.1 client over a single persistent connection.
pub struct Client<C: Connection> {
    connection: C,
    timeout_seconds: u32,
    chunked_open: bool,
}

impl<C: Connection> Client<C> {
    pub fn new(connection: C) -> Self {
        Self {
            connection,
            timeout_seconds: 0,
            chunked_open: false,
        }
    }

    /// The per-request limit last set through [`Transport::set_timeout`].
    ///
    /// Enforcing it is up to the connection; platforms usually apply it as a
    /// socket read/write timeout.
    pub fn timeout_seconds(&self) -> u32 {
        self.timeout_seconds
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    /// Consumes the client, returning the connection.
    pub fn into_inner(self) -> C {
        self.connection
    }

    fn write_all(&mut self, mut bytes: &[u8]) -> Result<(), Error> {
        while !bytes.is_empty() {
            match self.connection.write(bytes) {
                Ok(0) => return Err(Error::WriteError),
                Ok(n) => bytes = &bytes[n..],
                Err(_) => return Err(Error::WriteError),
            }
        }
        Ok(())
    }

    fn write_head(&mut self, head: &RequestHead, framing: Framing) -> Result<(), Error> {
        // --- Build Request ---
        let mut request_buf: Vec<u8> = Vec::new();
        request_buf
            .try_reserve(head.uri().len() + head.headers().total_len() + 128)
            .map_err(|_| Error::WriteError)?;

        // Request line
        request_buf.extend_from_slice(head.method().as_str().as_bytes());
        request_buf.push(b' ');
        request_buf.extend_from_slice(head.uri().as_bytes());
        request_buf.extend_from_slice(b" HTTP/1.1\r\n");

        // Headers
        for line in head.headers().iter() {
            request_buf.extend_from_slice(line.as_str().as_bytes());
            request_buf.extend_from_slice(b"\r\n");
        }

        match framing {
            Framing::Length(0) if head.method() == Method::Get => {}
            Framing::Length(len) => {
                let mut len_str: heapless::String<24> = heapless::String::new();
                write!(len_str, "{}: {}", header::CONTENT_LENGTH, len)
                    .map_err(|_| Error::WriteError)?;
                request_buf.extend_from_slice(len_str.as_bytes());
                request_buf.extend_from_slice(b"\r\n");
            }
            Framing::Chunked => {
                request_buf.extend_from_slice(header::TRANSFER_ENCODING.as_bytes());
                request_buf.extend_from_slice(b": chunked\r\n");
            }
        }
        request_buf.extend_from_slice(b"\r\n");

        // --- Send Request ---
        self.write_all(&request_buf)
    }

    fn read_response(&mut self) -> Result<WireResponse, Error> {
        let mut inbound = Inbound::new(&mut self.connection);

        // --- Parse Response ---
        let status_line = inbound.line(MAX_HEAD_LEN)?;
        let status_line =
            core::str::from_utf8(inbound.slice(status_line)).map_err(|_| Error::ProtocolError)?;
        let mut status_parts = status_line.splitn(3, ' ');
        let version = status_parts.next().ok_or(Error::ProtocolError)?;
        if !version.starts_with("HTTP/1.") {
            return Err(Error::ProtocolError);
        }
        let status_code = status_parts
            .next()
            .ok_or(Error::ProtocolError)?
            .parse::<u16>()
            .map_err(|_| Error::ProtocolError)?;

        // Parse headers
        let mut response_headers = TextList::new();
        let mut content_length: Option<usize> = None;
        let mut chunked = false;
        loop {
            let range = inbound.line(MAX_HEAD_LEN)?;
            if range.is_empty() {
                break;
            }
            let line =
                core::str::from_utf8(inbound.slice(range)).map_err(|_| Error::ProtocolError)?;
            let (name, value) = line.split_once(':').ok_or(Error::ProtocolError)?;
            let name = name.trim();
            let value = value.trim();

            if name.eq_ignore_ascii_case(header::CONTENT_LENGTH) {
                content_length = Some(value.parse::<usize>().map_err(|_| Error::ProtocolError)?);
            } else if name.eq_ignore_ascii_case(header::TRANSFER_ENCODING)
                && value.to_ascii_lowercase().contains("chunked")
            {
                chunked = true;
            }

            let mut owned = String::new();
            owned
                .try_reserve_exact(line.len())
                .map_err(|_| Error::ProtocolError)?;
            owned.push_str(line);
            response_headers
                .add(Text::adopted(owned))
                .map_err(|_| Error::ProtocolError)?;
        }

        let body = if chunked {
            inbound.chunked_body()?
        } else if let Some(len) = content_length {
            let range = inbound.take(len)?;
            inbound.slice(range).to_vec()
        } else if status_code == 204 || status_code == 304 || (100..200).contains(&status_code) {
            Vec::new()
        } else {
            inbound.rest()?
        };

        debug!(status = status_code, bytes = body.len(), "response received");
        Ok(WireResponse::new(status_code, response_headers, body))
    }
}

impl<C: Connection> Transport for Client<C> {
    fn exchange(&mut self, head: &RequestHead, body: &[u8]) -> Result<WireResponse, Error> {
        if self.chunked_open {
            return Err(Error::ProtocolError);
        }
        self.write_head(head, Framing::Length(body.len()))?;
        self.write_all(body)?;
        self.connection.flush().map_err(|_| Error::WriteError)?;
        self.read_response()
    }

    fn begin_chunked(&mut self, head: &RequestHead) -> Result<(), Error> {
        if self.chunked_open {
            return Err(Error::ProtocolError);
        }
        self.write_head(head, Framing::Chunked)?;
        self.chunked_open = true;
        Ok(())
    }

    fn send_chunk(&mut self, chunk: &[u8]) -> Result<(), Error> {
        if !self.chunked_open {
            return Err(Error::NotOpen);
        }
        if chunk.is_empty() {
            return Ok(());
        }
        let mut size_line: heapless::String<20> = heapless::String::new();
        write!(size_line, "{:x}\r\n", chunk.len()).map_err(|_| Error::WriteError)?;
        self.write_all(size_line.as_bytes())?;
        self.write_all(chunk)?;
        self.write_all(b"\r\n")
    }

    fn finish_chunked(&mut self) -> Result<WireResponse, Error> {
        if !self.chunked_open {
            return Err(Error::NotOpen);
        }
        self.chunked_open = false;
        self.write_all(b"0\r\n\r\n")?;
        self.connection.flush().map_err(|_| Error::WriteError)?;
        self.read_response()
    }

    fn set_timeout(&mut self, seconds: u32) {
        self.timeout_seconds = seconds;
    }
}

impl<C: Connection> core::fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("timeout_seconds", &self.timeout_seconds)
            .field("chunked_open", &self.chunked_open)
            .finish_non_exhaustive()
    }
}

/// Bytes read from the connection that have not been consumed yet.
struct Inbound<'c, C: Connection> {
    connection: &'c mut C,
    buf: Vec<u8>,
    pos: usize,
}

impl<'c, C: Connection> Inbound<'c, C> {
    fn new(connection: &'c mut C) -> Self {
        Self {
            connection,
            buf: Vec::new(),
            pos: 0,
        }
    }

    fn slice(&self, range: Range<usize>) -> &[u8] {
        &self.buf[range]
    }

    /// Reads once more from the connection. Returns the number of new bytes.
    fn fill(&mut self) -> Result<usize, Error> {
        let mut temp_buf = [0u8; READ_CHUNK];
        let n = self
            .connection
            .read(&mut temp_buf)
            .map_err(|_| Error::ReadError)?;
        if self.buf.len() + n > MAX_RESPONSE_LEN {
            return Err(Error::ProtocolError);
        }
        self.buf.extend_from_slice(&temp_buf[..n]);
        Ok(n)
    }

    /// Consumes one CRLF-terminated line and returns its range without the CRLF.
    fn line(&mut self, limit: usize) -> Result<Range<usize>, Error> {
        loop {
            if let Some(offset) = find_slice(&self.buf[self.pos..], b"\r\n") {
                let range = self.pos..self.pos + offset;
                self.pos += offset + 2;
                return Ok(range);
            }
            if self.buf.len() - self.pos > limit {
                return Err(Error::ProtocolError);
            }
            if self.fill()? == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }

    /// Consumes exactly `len` bytes.
    fn take(&mut self, len: usize) -> Result<Range<usize>, Error> {
        while self.buf.len() - self.pos < len {
            if self.fill()? == 0 {
                return Err(Error::ConnectionClosed); // Prematurely closed
            }
        }
        let range = self.pos..self.pos + len;
        self.pos += len;
        Ok(range)
    }

    /// Consumes everything until the peer closes.
    fn rest(&mut self) -> Result<Vec<u8>, Error> {
        while self.fill()? > 0 {}
        let body = self.buf[self.pos..].to_vec();
        self.pos = self.buf.len();
        Ok(body)
    }

    fn chunked_body(&mut self) -> Result<Vec<u8>, Error> {
        let mut body = Vec::new();
        loop {
            let range = self.line(64)?;
            let size_line =
                core::str::from_utf8(self.slice(range)).map_err(|_| Error::ProtocolError)?;
            let size_field = size_line.split(';').next().unwrap_or("").trim();
            let size =
                usize::from_str_radix(size_field, 16).map_err(|_| Error::ProtocolError)?;
            if size == 0 {
                // Trailer section ends with an empty line.
                while !self.line(MAX_HEAD_LEN)?.is_empty() {}
                return Ok(body);
            }
            let data = self.take(size)?;
            body.extend_from_slice(&self.buf[data]);
            // The CRLF after the data may still be arriving.
            if !self.line(2)?.is_empty() {
                return Err(Error::ProtocolError);
            }
        }
    }
}

/// Finds the first occurrence of a slice in another slice and returns its starting position.
fn find_slice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
