//! Transport-level error types

use core::fmt;

/// A transport failure raised while performing one HTTP round trip.
///
/// These cover everything between "a request is ready" and "a response was
/// parsed": name resolution, connection setup, TLS, moving bytes, and framing
/// the response. Server rejections (4xx/5xx) are not transport failures; they
/// surface as [`crate::error::Error`] variants instead.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The remote host name could not be resolved.
    ResolveFailed,
    /// A connection attempt was refused or could not be established.
    ConnectionRefused,
    /// The TLS handshake failed.
    TlsFailed,
    /// An operation was attempted on a connection that is not open.
    NotOpen,
    /// An error occurred during a write operation.
    WriteError,
    /// An error occurred during a read operation.
    ReadError,
    /// The per-request time limit elapsed.
    Timeout,
    /// The connection was closed before the response was complete.
    ConnectionClosed,
    /// An invalid address was provided.
    InvalidAddress,
    /// The peer sent bytes that are not valid HTTP/1.1.
    ProtocolError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Error::ResolveFailed => "host name resolution failed",
            Error::ConnectionRefused => "connection refused",
            Error::TlsFailed => "TLS handshake failed",
            Error::NotOpen => "connection is not open",
            Error::WriteError => "write to connection failed",
            Error::ReadError => "read from connection failed",
            Error::Timeout => "request timed out",
            Error::ConnectionClosed => "connection closed by peer",
            Error::InvalidAddress => "invalid address",
            Error::ProtocolError => "malformed HTTP response",
        };
        f.write_str(text)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::ResolveFailed => defmt::write!(f, "ResolveFailed"),
            Error::ConnectionRefused => defmt::write!(f, "ConnectionRefused"),
            Error::TlsFailed => defmt::write!(f, "TlsFailed"),
            Error::NotOpen => defmt::write!(f, "NotOpen"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
            Error::InvalidAddress => defmt::write!(f, "InvalidAddress"),
            Error::ProtocolError => defmt::write!(f, "ProtocolError"),
        }
    }
}
