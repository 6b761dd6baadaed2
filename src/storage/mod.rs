//! # Storage abstraction layer for embedded systems
//!
//! Byte-addressed storage traits that a platform implements over its flash,
//! EEPROM or FRAM driver. The session layer persists device credentials
//! through them (see [`crate::session::StorageCredentialStore`]).
//!
//! # Core Traits
//!
//! - [`ReadStorage`]: Read data from storage
//! - [`Storage`]: Read and write operations
//! - [`BlockingErase`]: Synchronous erase operations
//!
//! [`MemoryStorage`] is a RAM-backed implementation, handy on hosts and in
//! tests.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use libiot_ingest::storage::{Storage, BlockingErase};
//!
//! fn replace_record<S: Storage + BlockingErase>(
//!     storage: &mut S,
//!     start_addr: u32,
//!     end_addr: u32,
//!     record: &[u8]
//! ) -> Result<(), S::Error> {
//!     // Erase the region first
//!     storage.erase(start_addr, end_addr)?;
//!     storage.write(start_addr, record)?;
//!     Ok(())
//! }
//! ```

#![allow(missing_docs)]
#![deny(unsafe_code)]

use alloc::vec;
use alloc::vec::Vec;

/// Common error types for storage operations
pub mod error;

use error::Error;

/// Re-exports of common traits for convenient importing
pub mod prelude {
    pub use super::{BlockingErase, ReadStorage, Storage};
}

/// Value an erased byte reads back as (flash memory convention).
pub const ERASED_BYTE: u8 = 0xFF;

/// Trait for reading data from storage devices.
///
/// # Examples
///
/// ```rust,no_run
/// use libiot_ingest::storage::ReadStorage;
///
/// fn read_record_len<S: ReadStorage>(storage: &mut S) -> Result<u32, S::Error> {
///     let mut len_bytes = [0u8; 4];
///     storage.read(0, &mut len_bytes)?;
///     Ok(u32::from_le_bytes(len_bytes))
/// }
/// ```
pub trait ReadStorage {
    /// Associated error type for read operations
    type Error: core::fmt::Debug;

    /// Read data from the storage device.
    ///
    /// Reads data from the specified offset into the provided buffer.
    /// The entire buffer will be filled unless an error occurs.
    ///
    /// # Errors
    ///
    /// - `OutOfBounds` if offset + buffer length exceeds device capacity
    /// - `ReadError` if hardware read operation fails
    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error>;

    /// Get the total capacity of the storage device in bytes.
    fn capacity(&self) -> usize;
}

/// Trait for storage devices that support both read and write operations.
pub trait Storage: ReadStorage {
    /// Write data to the storage device.
    ///
    /// The behavior when writing to already-written locations depends on the
    /// storage technology (some require erase, others support overwrites).
    ///
    /// # Errors
    ///
    /// - `OutOfBounds` if offset + data length exceeds device capacity
    /// - `WriteError` if hardware write operation fails
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error>;
}

/// Trait for storage devices that support erase operations.
///
/// Many storage technologies (especially flash memory) require explicit
/// erase operations before writing new data.
pub trait BlockingErase: Storage {
    /// Erase a region of storage.
    ///
    /// Erases all data in `from..to`. After erasing, the region reads as
    /// [`ERASED_BYTE`].
    ///
    /// # Errors
    ///
    /// - `OutOfBounds` if the address range is invalid
    /// - `EraseError` if the hardware erase operation fails
    /// - `StorageFault` if the storage area is damaged and cannot be erased
    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error>;
}

impl<S: ReadStorage + ?Sized> ReadStorage for &mut S {
    type Error = S::Error;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read(offset, bytes)
    }

    fn capacity(&self) -> usize {
        (**self).capacity()
    }
}

impl<S: Storage + ?Sized> Storage for &mut S {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        (**self).write(offset, bytes)
    }
}

impl<S: BlockingErase + ?Sized> BlockingErase for &mut S {
    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        (**self).erase(from, to)
    }
}

/// RAM-backed storage that starts out erased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStorage {
    memory: Vec<u8>,
}

impl MemoryStorage {
    pub fn new(capacity: usize) -> Self {
        Self {
            memory: vec![ERASED_BYTE; capacity],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.memory
    }

    fn range(&self, offset: u32, len: usize) -> Result<core::ops::Range<usize>, Error> {
        let start = offset as usize;
        let end = start.checked_add(len).ok_or(Error::OutOfBounds)?;
        if end > self.memory.len() {
            return Err(Error::OutOfBounds);
        }
        Ok(start..end)
    }
}

impl ReadStorage for MemoryStorage {
    type Error = Error;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let range = self.range(offset, bytes.len())?;
        bytes.copy_from_slice(&self.memory[range]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.memory.len()
    }
}

impl Storage for MemoryStorage {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let range = self.range(offset, bytes.len())?;
        self.memory[range].copy_from_slice(bytes);
        Ok(())
    }
}

impl BlockingErase for MemoryStorage {
    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if from > to {
            return Err(Error::OutOfBounds);
        }
        let range = self.range(from, (to - from) as usize)?;
        self.memory[range].fill(ERASED_BYTE);
        Ok(())
    }
}
