//! Common error types for storage operations

use core::fmt;

/// A common error type for storage operations.
///
/// Kept small and `Copy` so it can travel inside [`crate::error::Error`]
/// on `no_std` targets.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// An operation was attempted on an address that is out of bounds.
    OutOfBounds,
    /// An error occurred during a write operation.
    WriteError,
    /// An error occurred during a read operation.
    ReadError,
    /// An error occurred during an erase operation.
    EraseError,
    /// The underlying storage is bad/unusable at a specific location
    StorageFault,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Error::OutOfBounds => "address out of bounds",
            Error::WriteError => "write failed",
            Error::ReadError => "read failed",
            Error::EraseError => "erase failed",
            Error::StorageFault => "storage fault",
        };
        f.write_str(text)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::OutOfBounds => defmt::write!(f, "OutOfBounds"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::EraseError => defmt::write!(f, "EraseError"),
            Error::StorageFault => defmt::write!(f, "StorageFault"),
        }
    }
}
