//! Session configuration.
//!
//! A [`SessionConfig`] is copied into the session at `init` and stays
//! immutable from then on. It can be built in code or loaded from JSON:
//!
//! ```rust
//! use libiot_ingest::session::{SecurityProfile, SessionConfig};
//!
//! let config = SessionConfig::from_json(
//!     br#"{"host":"iot.example.com","security_profile":"asymmetric3072","timeout_seconds":60}"#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.port, 443);
//! assert_eq!(config.security_profile, SecurityProfile::Asymmetric3072);
//! assert!(config.validate().is_ok());
//! ```

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Smallest payload ceiling a session accepts, in bytes.
pub const MIN_PAYLOAD_CEILING: u32 = 400;
/// Payload ceiling used when none is configured.
pub const DEFAULT_PAYLOAD_CEILING: u32 = 16 * 1024;
/// Largest payload ceiling a session accepts, in bytes.
pub const MAX_PAYLOAD_CEILING: u32 = 256 * 1024;
/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT_SECONDS: u32 = 300;
pub const DEFAULT_PORT: u16 = 443;
/// Registration path used when none is configured.
pub const DEFAULT_REGISTRATION_ENDPOINT: &str = "/iot/api/v2/oauth2/register";

/// How the device authenticates once registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityProfile {
    /// The server hands out a client secret used with HTTP Basic auth.
    #[default]
    SharedSecret,
    /// The device registers a 3072-bit public key and signs client assertions.
    Asymmetric3072,
}

impl SecurityProfile {
    /// The `token_endpoint_auth_method` sent at registration.
    pub fn auth_method(&self) -> &'static str {
        match self {
            SecurityProfile::SharedSecret => "client_secret_basic",
            SecurityProfile::Asymmetric3072 => "private_key_jwt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    #[default]
    Http,
    Socks5,
}

/// Outbound proxy settings, handed to the transport as is.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub host: String<64>,
    pub port: u16,
    pub kind: ProxyKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String<32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String<64>>,
}

/// Everything a session needs to reach and authenticate against the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Server host name.
    pub host: String<64>,
    pub port: u16,
    /// Trusted server certificate (path or platform key name).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_certificate: Option<String<128>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
    pub security_profile: SecurityProfile,
    /// Largest request body the session builds, in bytes.
    pub payload_ceiling: u32,
    /// Wall-clock limit for each request.
    pub timeout_seconds: u32,
    /// Appended to the fixed `User-Agent` product token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent_suffix: Option<String<32>>,
    /// One-time token authorizing registration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap_token: Option<String<512>>,
    /// Path of the registration endpoint.
    pub registration_endpoint: String<128>,
    /// Tenant id; prefixes every service path with `/tenants/<id>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String<64>>,
    /// Where a file-backed credential store keeps its record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_path: Option<String<128>>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let mut registration_endpoint = String::new();
        // Fits by construction.
        let _ = registration_endpoint.push_str(DEFAULT_REGISTRATION_ENDPOINT);
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            server_certificate: None,
            proxy: None,
            security_profile: SecurityProfile::default(),
            payload_ceiling: DEFAULT_PAYLOAD_CEILING,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            user_agent_suffix: None,
            bootstrap_token: None,
            registration_endpoint,
            tenant: None,
            credential_path: None,
        }
    }
}

impl SessionConfig {
    /// A default configuration pointing at `host`.
    pub fn new(host: &str) -> Result<Self, Error> {
        let mut config = Self::default();
        config.host = bounded(host)?;
        Ok(config)
    }

    /// Parses a JSON document. Absent fields keep their defaults.
    pub fn from_json(json: &[u8]) -> Result<Self, Error> {
        super::json::decode(json)
    }

    /// Checks the ranges the session relies on.
    pub fn validate(&self) -> Result<(), Error> {
        if self.host.is_empty() || self.port == 0 || self.timeout_seconds == 0 {
            return Err(Error::InvalidArgument);
        }
        if !(MIN_PAYLOAD_CEILING..=MAX_PAYLOAD_CEILING).contains(&self.payload_ceiling) {
            return Err(Error::InvalidArgument);
        }
        if !self.registration_endpoint.starts_with('/') {
            return Err(Error::InvalidArgument);
        }
        if let Some(proxy) = &self.proxy {
            if proxy.host.is_empty() || proxy.port == 0 {
                return Err(Error::InvalidArgument);
            }
        }
        if self
            .tenant
            .as_ref()
            .is_some_and(|tenant| tenant.is_empty() || tenant.contains('/'))
        {
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    /// The payload ceiling as a buffer size.
    pub fn ceiling(&self) -> usize {
        self.payload_ceiling as usize
    }

    /// Sets the bootstrap token used by the next registration.
    pub fn with_bootstrap_token(mut self, token: &str) -> Result<Self, Error> {
        self.bootstrap_token = Some(bounded(token)?);
        Ok(self)
    }

    pub fn with_tenant(mut self, tenant: &str) -> Result<Self, Error> {
        self.tenant = Some(bounded(tenant)?);
        Ok(self)
    }

    pub fn with_security_profile(mut self, profile: SecurityProfile) -> Self {
        self.security_profile = profile;
        self
    }

    pub fn with_payload_ceiling(mut self, ceiling: u32) -> Self {
        self.payload_ceiling = ceiling;
        self
    }

    pub fn with_user_agent_suffix(mut self, suffix: &str) -> Result<Self, Error> {
        self.user_agent_suffix = Some(bounded(suffix)?);
        Ok(self)
    }
}

fn bounded<const N: usize>(value: &str) -> Result<String<N>, Error> {
    let mut out = String::new();
    out.push_str(value).map_err(|_| Error::InvalidArgument)?;
    Ok(out)
}
