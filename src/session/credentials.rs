//! Session credentials and their persistence.
//!
//! The long-lived half of the credentials (client id, client secret,
//! registration token and URI) survives restarts through a
//! [`CredentialStore`]. Access tokens are short-lived and are never persisted.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use serde::{Deserialize, Serialize};

use super::json;
use crate::error::Error;
use crate::storage::{self, BlockingErase, Storage};

/// Largest serialized credential record.
pub const MAX_RECORD_LEN: usize = 4096;

/// Credentials held by a session.
///
/// The registration token and the access token are independent: a session
/// is onboarded once it holds the former and can exchange data once it also
/// holds the latter.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub registration_token: Option<String>,
    pub registration_uri: Option<String>,
    pub access_token: Option<String>,
    /// Server time of the last token grant, from the `Server-Time` header.
    pub last_token_time: u64,
    /// Token lifetime in seconds as granted by the server; 0 if unknown.
    pub token_lifetime: u32,
}

impl Credentials {
    pub fn is_onboarded(&self) -> bool {
        self.registration_token.is_some()
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// The part of the credentials that is written to a store.
    pub fn persisted(&self) -> PersistedCredentials {
        PersistedCredentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            registration_access_token: self.registration_token.clone(),
            registration_client_uri: self.registration_uri.clone(),
        }
    }

    /// Rebuilds in-memory credentials from a stored record. No access token
    /// is restored.
    pub fn from_persisted(record: PersistedCredentials) -> Self {
        Self {
            client_id: record.client_id,
            client_secret: record.client_secret,
            registration_token: record.registration_access_token,
            registration_uri: record.registration_client_uri,
            ..Self::default()
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| ".."))
            .field(
                "registration_token",
                &self.registration_token.as_ref().map(|_| ".."),
            )
            .field("registration_uri", &self.registration_uri)
            .field("access_token", &self.access_token.as_ref().map(|_| ".."))
            .field("last_token_time", &self.last_token_time)
            .field("token_lifetime", &self.token_lifetime)
            .finish()
    }
}

/// The stored credential record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedCredentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_client_uri: Option<String>,
}

impl PersistedCredentials {
    /// Serializes the record as JSON.
    pub fn to_json(&self) -> Result<Vec<u8>, Error> {
        let hint = [
            &self.client_id,
            &self.client_secret,
            &self.registration_access_token,
            &self.registration_client_uri,
        ]
        .iter()
        .map(|field| field.as_ref().map_or(0, |value| value.len() + 32))
        .sum::<usize>();
        json::encode(self, hint + 16, MAX_RECORD_LEN)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, Error> {
        json::decode(bytes)
    }
}

/// Load/save hooks for the long-lived credentials.
pub trait CredentialStore {
    /// Returns the stored record, or `None` if nothing has been saved yet.
    fn load(&mut self) -> Result<Option<PersistedCredentials>, Error>;

    /// Replaces the stored record.
    fn save(&mut self, credentials: &PersistedCredentials) -> Result<(), Error>;
}

impl<C: CredentialStore + ?Sized> CredentialStore for &mut C {
    fn load(&mut self) -> Result<Option<PersistedCredentials>, Error> {
        (**self).load()
    }

    fn save(&mut self, credentials: &PersistedCredentials) -> Result<(), Error> {
        (**self).save(credentials)
    }
}

const RECORD_HEADER_LEN: usize = 8;

/// Keeps the credential record in a region of byte-addressed storage.
///
/// Layout at `base`: record length (`u32` LE), CRC-32 of the record (`u32`
/// LE), then the JSON record. An erased header means "nothing stored".
#[derive(Debug)]
pub struct StorageCredentialStore<S: Storage + BlockingErase> {
    storage: S,
    base: u32,
    region_len: u32,
}

impl<S: Storage + BlockingErase> StorageCredentialStore<S> {
    /// Uses `region_len` bytes of `storage` starting at `base`.
    pub fn new(storage: S, base: u32, region_len: u32) -> Result<Self, Error> {
        let end = base
            .checked_add(region_len)
            .ok_or(Error::InvalidArgument)?;
        if (region_len as usize) <= RECORD_HEADER_LEN || end as usize > storage.capacity() {
            return Err(Error::InvalidArgument);
        }
        Ok(Self {
            storage,
            base,
            region_len,
        })
    }

    /// Erases the record.
    pub fn clear(&mut self) -> Result<(), Error> {
        self.storage
            .erase(self.base, self.base + self.region_len)
            .map_err(|_| Error::Storage(storage::error::Error::EraseError))
    }

    pub fn into_inner(self) -> S {
        self.storage
    }

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Error> {
        self.storage
            .read(offset, bytes)
            .map_err(|_| Error::Storage(storage::error::Error::ReadError))
    }
}

impl<S: Storage + BlockingErase> CredentialStore for StorageCredentialStore<S> {
    fn load(&mut self) -> Result<Option<PersistedCredentials>, Error> {
        let mut header = [0u8; RECORD_HEADER_LEN];
        self.read(self.base, &mut header)?;
        if header.iter().all(|&b| b == storage::ERASED_BYTE) {
            return Ok(None);
        }

        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if len == 0 || len > self.region_len as usize - RECORD_HEADER_LEN {
            return Err(Error::MalformedData);
        }

        let mut record = Vec::new();
        record.try_reserve_exact(len)?;
        record.resize(len, 0);
        self.read(self.base + RECORD_HEADER_LEN as u32, &mut record)?;
        if crc32fast::hash(&record) != crc {
            return Err(Error::MalformedData);
        }
        PersistedCredentials::from_json(&record).map(Some)
    }

    fn save(&mut self, credentials: &PersistedCredentials) -> Result<(), Error> {
        let record = credentials.to_json()?;
        if record.len() > self.region_len as usize - RECORD_HEADER_LEN {
            return Err(Error::NoMoreSpace);
        }

        let mut header = [0u8; RECORD_HEADER_LEN];
        header[..4].copy_from_slice(&(record.len() as u32).to_le_bytes());
        header[4..].copy_from_slice(&crc32fast::hash(&record).to_le_bytes());

        self.clear()?;
        self.storage
            .write(self.base + RECORD_HEADER_LEN as u32, &record)
            .and_then(|()| self.storage.write(self.base, &header))
            .map_err(|_| Error::Storage(storage::error::Error::WriteError))
    }
}

/// Keeps the credential record in a JSON file.
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: std::path::PathBuf,
}

#[cfg(feature = "std")]
impl FileCredentialStore {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A store at the configured `credential_path`, if any.
    pub fn from_config(config: &super::SessionConfig) -> Option<Self> {
        config
            .credential_path
            .as_ref()
            .map(|path| Self::new(path.as_str()))
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[cfg(feature = "std")]
impl CredentialStore for FileCredentialStore {
    fn load(&mut self) -> Result<Option<PersistedCredentials>, Error> {
        match std::fs::read(&self.path) {
            Ok(bytes) => PersistedCredentials::from_json(&bytes).map(Some),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(_) => Err(Error::Storage(storage::error::Error::ReadError)),
        }
    }

    fn save(&mut self, credentials: &PersistedCredentials) -> Result<(), Error> {
        let record = credentials.to_json()?;
        std::fs::write(&self.path, record)
            .map_err(|_| Error::Storage(storage::error::Error::WriteError))
    }
}
