//! JSON helpers over `serde-json-core`.

use alloc::vec;
use alloc::vec::Vec;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Error;

/// Serializes `value` into a buffer starting at `hint` bytes, doubling until
/// it fits or `limit` is reached.
pub(crate) fn encode<T: Serialize>(value: &T, hint: usize, limit: usize) -> Result<Vec<u8>, Error> {
    let mut size = hint.clamp(64, limit.max(64));
    loop {
        let mut buf = Vec::new();
        buf.try_reserve_exact(size)?;
        buf.resize(size, 0);
        match serde_json_core::to_slice(value, &mut buf) {
            Ok(len) => {
                buf.truncate(len);
                return Ok(buf);
            }
            Err(serde_json_core::ser::Error::BufferFull) if size < limit => {
                size = size.saturating_mul(2).min(limit);
            }
            Err(_) => return Err(Error::NoMoreSpace),
        }
    }
}

/// Deserializes a complete JSON document. Escaped strings are supported.
pub(crate) fn decode<T: DeserializeOwned>(json: &[u8]) -> Result<T, Error> {
    let mut scratch = vec![0u8; json.len()];
    serde_json_core::from_slice_escaped::<T>(json, &mut scratch)
        .map(|(value, _)| value)
        .map_err(|_| Error::MalformedData)
}
