//! Crate-wide error type.
//!
//! Every fallible operation in the crate returns [`Error`]. Lower layers keep
//! their own narrower enums ([`network::error::Error`], [`storage::error::Error`])
//! which convert into this one with `?`.

use core::fmt;

use crate::network;
use crate::storage;

/// Errors produced by the wire codec and the session engine.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// An argument was empty, zero-length, or out of range.
    InvalidArgument,
    /// Growing a buffer or collection failed.
    OutOfMemory,
    /// The request cannot grow enough to hold the next append.
    NoMoreSpace,
    /// A builder call was made out of order (for example an append after
    /// finalize, or `end_part` with no open part).
    InvalidState,
    /// The session has not been initialized.
    NotInitialized,
    /// The session has no registration token yet.
    NotOnboarded,
    /// Onboarding was requested on a session that is already onboarded.
    AlreadyOnboarded,
    /// An exchange was requested without an access token.
    NoAccessTokenExists,
    /// An exchange was requested with an empty container.
    StoreIsEmpty,
    /// The injected random source failed.
    RandomSource,
    /// The transport failed to complete the round trip.
    Transport(network::error::Error),
    /// The server answered 401.
    Unauthorized,
    /// The server answered 400. On a token request this means the
    /// registration secret is stale.
    BadRequest,
    /// The server answered with a 5xx status.
    ServerFail,
    /// The server rejected the request with any other non-success status.
    Fail,
    /// Response data could not be parsed.
    MalformedData,
    /// The configured server certificate is unusable.
    BadCertificate,
    /// Credential persistence failed.
    Storage(storage::error::Error),
    /// Anything that should not happen.
    Internal,
}

impl Error {
    /// Returns `true` for the two failures that a fresh access token can fix.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Error::Unauthorized | Error::NoAccessTokenExists)
    }

    /// Maps an HTTP status code onto the server-rejection kinds.
    ///
    /// Returns `Ok(())` for any 2xx status.
    pub fn check_status(status: u16) -> Result<(), Error> {
        match status {
            200..=299 => Ok(()),
            400 => Err(Error::BadRequest),
            401 => Err(Error::Unauthorized),
            500..=599 => Err(Error::ServerFail),
            _ => Err(Error::Fail),
        }
    }
}

impl From<network::error::Error> for Error {
    fn from(err: network::error::Error) -> Self {
        Error::Transport(err)
    }
}

impl From<storage::error::Error> for Error {
    fn from(err: storage::error::Error) -> Self {
        Error::Storage(err)
    }
}

impl From<alloc::collections::TryReserveError> for Error {
    fn from(_: alloc::collections::TryReserveError) -> Self {
        Error::OutOfMemory
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument => f.write_str("invalid argument"),
            Error::OutOfMemory => f.write_str("out of memory"),
            Error::NoMoreSpace => f.write_str("no more space in request"),
            Error::InvalidState => f.write_str("operation not valid in current builder state"),
            Error::NotInitialized => f.write_str("session not initialized"),
            Error::NotOnboarded => f.write_str("session not onboarded"),
            Error::AlreadyOnboarded => f.write_str("session already onboarded"),
            Error::NoAccessTokenExists => f.write_str("no access token"),
            Error::StoreIsEmpty => f.write_str("container is empty"),
            Error::RandomSource => f.write_str("random source failed"),
            Error::Transport(err) => write!(f, "transport: {err}"),
            Error::Unauthorized => f.write_str("unauthorized"),
            Error::BadRequest => f.write_str("bad request"),
            Error::ServerFail => f.write_str("server failure"),
            Error::Fail => f.write_str("request rejected"),
            Error::MalformedData => f.write_str("malformed data"),
            Error::BadCertificate => f.write_str("bad certificate"),
            Error::Storage(err) => write!(f, "storage: {err}"),
            Error::Internal => f.write_str("internal failure"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::InvalidArgument => defmt::write!(f, "InvalidArgument"),
            Error::OutOfMemory => defmt::write!(f, "OutOfMemory"),
            Error::NoMoreSpace => defmt::write!(f, "NoMoreSpace"),
            Error::InvalidState => defmt::write!(f, "InvalidState"),
            Error::NotInitialized => defmt::write!(f, "NotInitialized"),
            Error::NotOnboarded => defmt::write!(f, "NotOnboarded"),
            Error::AlreadyOnboarded => defmt::write!(f, "AlreadyOnboarded"),
            Error::NoAccessTokenExists => defmt::write!(f, "NoAccessTokenExists"),
            Error::StoreIsEmpty => defmt::write!(f, "StoreIsEmpty"),
            Error::RandomSource => defmt::write!(f, "RandomSource"),
            Error::Transport(err) => defmt::write!(f, "Transport({})", err),
            Error::Unauthorized => defmt::write!(f, "Unauthorized"),
            Error::BadRequest => defmt::write!(f, "BadRequest"),
            Error::ServerFail => defmt::write!(f, "ServerFail"),
            Error::Fail => defmt::write!(f, "Fail"),
            Error::MalformedData => defmt::write!(f, "MalformedData"),
            Error::BadCertificate => defmt::write!(f, "BadCertificate"),
            Error::Storage(err) => defmt::write!(f, "Storage({})", err),
            Error::Internal => defmt::write!(f, "Internal"),
        }
    }
}
