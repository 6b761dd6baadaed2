//! Server round trips behind the session engine.
//!
//! [`Backend`] is the seam between the lifecycle engine and the network: one
//! method per round trip, each committing to the credentials only on
//! success. [`HttpBackend`] implements it against the ingestion REST API over
//! any [`Transport`].

use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::config::{SecurityProfile, SessionConfig};
use super::container::{Container, Item};
use super::credentials::Credentials;
use super::json;
use crate::error::Error;
use crate::network::Transport;
use crate::wire::{
    BufferPolicy, Method, RandomSource, RequestHead, WireRequest, WireResponse, content_type,
    header,
};

/// Path of the token endpoint.
pub const TOKEN_PATH: &str = "/iot/api/v2/oauth2/token";
/// Path messages are posted to.
pub const MESSAGES_PATH: &str = "/iot/api/v2/messages";

const GRANT_CLIENT_CREDENTIALS: &str = "grant_type=client_credentials";
const ASSERTION_TYPE_JWT: &str =
    "client_assertion_type=urn%3Aietf%3Aparams%3Aoauth%3Aclient-assertion-type%3Ajwt-bearer";
/// Largest JSON body sent to the registration endpoints.
const MAX_JSON_BODY: usize = 8 * 1024;
const STREAM_READ_CHUNK: usize = 256;

/// Round trips the session engine drives.
///
/// Implementations update `credentials` only when the round trip succeeds.
pub trait Backend {
    /// Registers the device using the bootstrap token.
    fn register(&mut self, config: &SessionConfig, credentials: &mut Credentials)
    -> Result<(), Error>;

    /// Re-registers with the registration token to obtain a fresh secret or key.
    fn rotate_key(
        &mut self,
        config: &SessionConfig,
        credentials: &mut Credentials,
    ) -> Result<(), Error>;

    /// Reads the current registration back from the server.
    fn update_security_information(
        &mut self,
        config: &SessionConfig,
        credentials: &mut Credentials,
    ) -> Result<(), Error>;

    /// Obtains an access token. A [`Error::BadRequest`] answer means the
    /// registration secret is stale.
    fn fetch_access_token(
        &mut self,
        config: &SessionConfig,
        credentials: &mut Credentials,
    ) -> Result<(), Error>;

    /// Sends a container in one or more memory-bounded requests.
    fn send_buffered(
        &mut self,
        config: &SessionConfig,
        credentials: &Credentials,
        container: &mut Container<'_>,
    ) -> Result<(), Error>;

    /// Sends a container as one chunked request.
    fn send_streaming(
        &mut self,
        config: &SessionConfig,
        credentials: &Credentials,
        container: &mut Container<'_>,
    ) -> Result<(), Error>;

    /// Applies the per-request time limit.
    fn set_timeout(&mut self, _seconds: u32) {}
}

/// Key material for the asymmetric security profile.
pub trait Signer {
    /// The device public key, encoded as the server expects it.
    fn public_key(&mut self) -> Result<String, Error>;

    /// Replaces the key pair before a key rotation.
    fn rotate(&mut self) -> Result<(), Error>;

    /// A signed client assertion for `client_id`, addressed to `audience`.
    fn client_assertion(&mut self, client_id: &str, audience: &str) -> Result<String, Error>;
}

/// Signer for the shared-secret profile, which never needs one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSigner;

impl Signer for NoSigner {
    fn public_key(&mut self) -> Result<String, Error> {
        Err(Error::InvalidState)
    }

    fn rotate(&mut self) -> Result<(), Error> {
        Err(Error::InvalidState)
    }

    fn client_assertion(&mut self, _client_id: &str, _audience: &str) -> Result<String, Error> {
        Err(Error::InvalidState)
    }
}

#[derive(Serialize)]
struct RegistrationRequest<'a> {
    token_endpoint_auth_method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    public_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct RegistrationResponse {
    client_id: String,
    #[serde(default)]
    client_secret: Option<String>,
    registration_access_token: String,
    registration_client_uri: String,
}

impl RegistrationResponse {
    fn apply(self, profile: SecurityProfile, credentials: &mut Credentials) -> Result<(), Error> {
        if profile == SecurityProfile::SharedSecret && self.client_secret.is_none() {
            return Err(Error::MalformedData);
        }
        credentials.client_id = Some(self.client_id);
        credentials.client_secret = self.client_secret;
        credentials.registration_token = Some(self.registration_access_token);
        credentials.registration_uri = Some(self.registration_client_uri);
        Ok(())
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u32>,
}

/// [`Backend`] speaking the ingestion REST API.
pub struct HttpBackend<T: Transport, S: Signer, R: RandomSource> {
    transport: T,
    signer: S,
    rng: R,
}

impl<T: Transport, R: RandomSource> HttpBackend<T, NoSigner, R> {
    /// A backend for the shared-secret profile.
    pub fn new(transport: T, rng: R) -> Self {
        Self::with_signer(transport, NoSigner, rng)
    }
}

impl<T: Transport, S: Signer, R: RandomSource> HttpBackend<T, S, R> {
    pub fn with_signer(transport: T, signer: S, rng: R) -> Self {
        Self {
            transport,
            signer,
            rng,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn signer_mut(&mut self) -> &mut S {
        &mut self.signer
    }

    /// Sends a registration request and parses the answer.
    fn registration_round_trip(
        &mut self,
        config: &SessionConfig,
        method: Method,
        uri: &str,
        bearer: &str,
        body: Option<&RegistrationRequest<'_>>,
    ) -> Result<RegistrationResponse, Error> {
        let mut head = new_head(config, method, uri)?;
        head.add_header(header::AUTHORIZATION, &format!("Bearer {bearer}"))?;
        head.add_header(header::ACCEPT, content_type::JSON)?;

        let payload = match body {
            Some(body) => {
                head.add_header(header::CONTENT_TYPE, content_type::JSON)?;
                json::encode(body, 256, MAX_JSON_BODY)?
            }
            None => Vec::new(),
        };

        let response = self.transport.exchange(&head, &payload)?;
        response.check_status()?;
        json::decode(response.payload())
    }
}

impl<T: Transport, S: Signer, R: RandomSource> Backend for HttpBackend<T, S, R> {
    fn register(
        &mut self,
        config: &SessionConfig,
        credentials: &mut Credentials,
    ) -> Result<(), Error> {
        let bootstrap = config
            .bootstrap_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or(Error::InvalidArgument)?;

        let public_key = match config.security_profile {
            SecurityProfile::SharedSecret => None,
            SecurityProfile::Asymmetric3072 => Some(self.signer.public_key()?),
        };
        let body = RegistrationRequest {
            token_endpoint_auth_method: config.security_profile.auth_method(),
            client_id: None,
            public_key: public_key.as_deref(),
        };

        let uri = service_path(config, &config.registration_endpoint)?;
        self.registration_round_trip(config, Method::Post, &uri, bootstrap, Some(&body))?
            .apply(config.security_profile, credentials)?;
        credentials.access_token = None;
        info!(
            client_id = credentials.client_id.as_deref().unwrap_or(""),
            "device registered"
        );
        Ok(())
    }

    fn rotate_key(
        &mut self,
        config: &SessionConfig,
        credentials: &mut Credentials,
    ) -> Result<(), Error> {
        let (uri, token) = registration_target(credentials)?;
        let client_id = credentials.client_id.clone();

        let public_key = match config.security_profile {
            SecurityProfile::SharedSecret => None,
            SecurityProfile::Asymmetric3072 => {
                self.signer.rotate()?;
                Some(self.signer.public_key()?)
            }
        };
        let body = RegistrationRequest {
            token_endpoint_auth_method: config.security_profile.auth_method(),
            client_id: client_id.as_deref(),
            public_key: public_key.as_deref(),
        };

        self.registration_round_trip(config, Method::Put, &uri, &token, Some(&body))?
            .apply(config.security_profile, credentials)?;
        // Tokens granted under the previous secret are void.
        credentials.access_token = None;
        info!("key rotated");
        Ok(())
    }

    fn update_security_information(
        &mut self,
        config: &SessionConfig,
        credentials: &mut Credentials,
    ) -> Result<(), Error> {
        let (uri, token) = registration_target(credentials)?;
        self.registration_round_trip(config, Method::Get, &uri, &token, None)?
            .apply(config.security_profile, credentials)?;
        debug!("security information refreshed");
        Ok(())
    }

    fn fetch_access_token(
        &mut self,
        config: &SessionConfig,
        credentials: &mut Credentials,
    ) -> Result<(), Error> {
        let client_id = credentials
            .client_id
            .as_deref()
            .ok_or(Error::NotOnboarded)?;

        let uri = service_path(config, TOKEN_PATH)?;
        let mut head = new_head(config, Method::Post, &uri)?;
        head.add_header(header::CONTENT_TYPE, content_type::FORM_URLENCODED)?;
        head.add_header(header::ACCEPT, content_type::JSON)?;

        let body = match config.security_profile {
            SecurityProfile::SharedSecret => {
                let secret = credentials
                    .client_secret
                    .as_deref()
                    .ok_or(Error::NotOnboarded)?;
                head.add_header(header::AUTHORIZATION, &basic_auth(client_id, secret)?)?;
                String::from(GRANT_CLIENT_CREDENTIALS)
            }
            SecurityProfile::Asymmetric3072 => {
                let assertion = self.signer.client_assertion(client_id, &uri)?;
                format!("{GRANT_CLIENT_CREDENTIALS}&{ASSERTION_TYPE_JWT}&client_assertion={assertion}")
            }
        };

        let response = self.transport.exchange(&head, body.as_bytes())?;
        response.check_status()?;
        let token: TokenResponse = json::decode(response.payload())?;

        credentials.access_token = Some(token.access_token);
        credentials.token_lifetime = token.expires_in.unwrap_or(0);
        if let Ok(Some(time)) = response.server_time() {
            credentials.last_token_time = time;
        }
        debug!(lifetime = credentials.token_lifetime, "access token granted");
        Ok(())
    }

    fn send_buffered(
        &mut self,
        config: &SessionConfig,
        credentials: &Credentials,
        container: &mut Container<'_>,
    ) -> Result<(), Error> {
        let token = credentials
            .access_token
            .as_deref()
            .ok_or(Error::NoAccessTokenExists)?;
        let policy = BufferPolicy::resizable(config.ceiling());
        let correlation_id = container.correlation_id().map(String::from);
        let correlation_id = correlation_id.as_deref();

        // Indices of the items written into the current request.
        let mut batch: Vec<usize> = Vec::new();
        let mut requests = 0usize;
        let mut request = message_request(config, token, correlation_id, policy, &mut self.rng)?;
        for index in 0..container.len() {
            let item = &mut container.items_mut()[index];
            if item.is_delivered() {
                continue;
            }
            let payload = item.read_payload()?;
            match write_item(&mut request, item, payload.as_deref()) {
                Ok(()) => {}
                Err(Error::NoMoreSpace) if request.sections() > 0 => {
                    // Ship what fits and start the next request with this item.
                    let response = send(&mut self.transport, request)?;
                    deliver(container, &mut batch, response)?;
                    requests += 1;
                    request =
                        message_request(config, token, correlation_id, policy, &mut self.rng)?;
                    write_item(&mut request, &container.items()[index], payload.as_deref())?;
                }
                Err(err) => return Err(err),
            }
            batch.try_reserve(1)?;
            batch.push(index);
        }
        if request.sections() > 0 {
            let response = send(&mut self.transport, request)?;
            deliver(container, &mut batch, response)?;
            requests += 1;
        }

        debug!(requests, "container sent");
        Ok(())
    }

    fn send_streaming(
        &mut self,
        config: &SessionConfig,
        credentials: &Credentials,
        container: &mut Container<'_>,
    ) -> Result<(), Error> {
        let token = credentials
            .access_token
            .as_deref()
            .ok_or(Error::NoAccessTokenExists)?;
        let policy = BufferPolicy::fixed(config.ceiling());
        let correlation_id = container.correlation_id().map(String::from);

        let mut request = message_request(
            config,
            token,
            correlation_id.as_deref(),
            policy,
            &mut self.rng,
        )?;
        self.transport.begin_chunked(request.head())?;

        let mut stream = Stream {
            request: &mut request,
            transport: &mut self.transport,
        };
        if let Err(err) = stream.container(container) {
            // Terminate the body so the connection stays usable.
            if let Err(close_err) = self.transport.finish_chunked() {
                warn!(error = %close_err, "failed to terminate chunked body");
            }
            return Err(err);
        }

        let response = self.transport.finish_chunked()?;
        response.check_status()?;
        debug!("container streamed");
        for item in container.items_mut() {
            item.mark_delivered();
        }
        container.record_response(response)
    }

    fn set_timeout(&mut self, seconds: u32) {
        self.transport.set_timeout(seconds);
    }
}

impl<T: Transport, S: Signer, R: RandomSource> fmt::Debug for HttpBackend<T, S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBackend").finish_non_exhaustive()
    }
}

/// A fixed-buffer request being pushed out as a chunked body.
struct Stream<'s, T: Transport, Q: RandomSource> {
    request: &'s mut WireRequest<Q>,
    transport: &'s mut T,
}

impl<T: Transport, Q: RandomSource> Stream<'_, T, Q> {
    fn flush(&mut self) -> Result<(), Error> {
        let transport = &mut *self.transport;
        self.request
            .drain_with(|bytes| transport.send_chunk(bytes).map_err(Error::from))
    }

    /// Runs a framing step, flushing once if the buffer is full.
    fn framed<F>(&mut self, mut step: F) -> Result<(), Error>
    where
        F: FnMut(&mut WireRequest<Q>) -> Result<(), Error>,
    {
        match step(&mut *self.request) {
            Err(Error::NoMoreSpace) if !self.request.is_empty() => {
                self.flush()?;
                step(&mut *self.request)
            }
            result => result,
        }
    }

    /// Appends content to the open part, flushing whenever the buffer fills.
    fn content(&mut self, mut bytes: &[u8]) -> Result<(), Error> {
        while !bytes.is_empty() {
            let room = self.request.available_raw();
            if room == 0 {
                if self.request.is_empty() {
                    return Err(Error::NoMoreSpace);
                }
                self.flush()?;
                continue;
            }
            let n = room.min(bytes.len());
            self.request.append_raw(&bytes[..n])?;
            bytes = &bytes[n..];
        }
        Ok(())
    }

    fn container(&mut self, container: &mut Container<'_>) -> Result<(), Error> {
        for item in container
            .items_mut()
            .iter_mut()
            .filter(|item| !item.is_delivered())
        {
            self.item(item)?;
        }
        self.request.finalize()?;
        self.flush()
    }

    fn item(&mut self, item: &mut Item<'_>) -> Result<(), Error> {
        let content_id = item.content_id();
        let meta_type = item.meta_type();
        let meta = item.meta();

        let Some(payload_type) = item.payload_type() else {
            return self.framed(|request| request.add_single(meta_type, content_id, meta));
        };

        self.framed(|request| request.begin_tuple(content_id))?;
        self.framed(|request| request.begin_part(meta_type))?;
        self.content(meta)?;
        self.request.end_part()?;
        self.framed(|request| request.begin_part(payload_type))?;

        match item.payload_bytes() {
            Some(bytes) => self.content(bytes)?,
            None => {
                let mut chunk = [0u8; STREAM_READ_CHUNK];
                loop {
                    let n = item.read_stream(&mut chunk)?;
                    if n == 0 {
                        break;
                    }
                    self.content(&chunk[..n])?;
                }
            }
        }

        self.request.end_part()?;
        self.request.end_tuple()
    }
}

/// `/tenants/<tenant><path>` when a tenant is configured, else `path`.
fn service_path(config: &SessionConfig, path: &str) -> Result<String, Error> {
    if !path.starts_with('/') {
        return Err(Error::InvalidArgument);
    }
    Ok(match &config.tenant {
        Some(tenant) => format!("/tenants/{}{}", tenant.as_str(), path),
        None => String::from(path),
    })
}

/// The request target of a registration URI the server handed out, which
/// may be absolute.
fn request_target(uri: &str) -> Result<&str, Error> {
    let rest = match uri.split_once("://") {
        Some((_, rest)) => rest,
        None if uri.starts_with('/') => return Ok(uri),
        None => return Err(Error::MalformedData),
    };
    Ok(rest.find('/').map_or("/", |start| &rest[start..]))
}

fn registration_target(credentials: &Credentials) -> Result<(String, String), Error> {
    let token = credentials
        .registration_token
        .as_deref()
        .ok_or(Error::NotOnboarded)?;
    let uri = credentials
        .registration_uri
        .as_deref()
        .ok_or(Error::NotOnboarded)?;
    Ok((String::from(request_target(uri)?), String::from(token)))
}

fn new_head(config: &SessionConfig, method: Method, uri: &str) -> Result<RequestHead, Error> {
    let mut head = RequestHead::new(method, uri, config.user_agent_suffix.as_deref())?;
    let host = if config.port == super::config::DEFAULT_PORT {
        String::from(config.host.as_str())
    } else {
        format!("{}:{}", config.host.as_str(), config.port)
    };
    head.add_header(header::HOST, &host)?;
    Ok(head)
}

fn basic_auth(client_id: &str, secret: &str) -> Result<String, Error> {
    let raw = format!("{client_id}:{secret}");
    let mut encoded = vec![0u8; Base64::encoded_len(raw.as_bytes())];
    let encoded = Base64::encode(raw.as_bytes(), &mut encoded).map_err(|_| Error::Internal)?;
    Ok(format!("Basic {encoded}"))
}

fn message_request<R: RandomSource>(
    config: &SessionConfig,
    access_token: &str,
    correlation_id: Option<&str>,
    policy: BufferPolicy,
    rng: R,
) -> Result<WireRequest<R>, Error> {
    let uri = service_path(config, MESSAGES_PATH)?;
    let mut head = new_head(config, Method::Post, &uri)?;
    head.add_header(header::AUTHORIZATION, &format!("Bearer {access_token}"))?;
    head.add_header(header::ACCEPT, content_type::JSON)?;
    if let Some(id) = correlation_id {
        head.add_header(header::CORRELATION_ID, id)?;
    }
    let mut request = WireRequest::new(head, policy, rng)?;
    request.add_header(header::CONTENT_TYPE, content_type::MULTIPART_MIXED)?;
    Ok(request)
}

fn write_item<R: RandomSource>(
    request: &mut WireRequest<R>,
    item: &Item<'_>,
    payload: Option<&[u8]>,
) -> Result<(), Error> {
    match (item.payload_type(), payload) {
        (Some(payload_type), Some(payload)) => request.add_tuple(
            item.content_id(),
            item.meta_type(),
            item.meta(),
            payload_type,
            payload,
        ),
        _ => request.add_single(item.meta_type(), item.content_id(), item.meta()),
    }
}

/// Marks the items of an accepted request as delivered and keeps the
/// server's response.
fn deliver(
    container: &mut Container<'_>,
    batch: &mut Vec<usize>,
    response: WireResponse,
) -> Result<(), Error> {
    for index in batch.drain(..) {
        container.items_mut()[index].mark_delivered();
    }
    container.record_response(response)
}

fn send<T: Transport, R: RandomSource>(
    transport: &mut T,
    mut request: WireRequest<R>,
) -> Result<WireResponse, Error> {
    request.finalize()?;
    let (head, body) = request.into_parts();
    let response = transport.exchange(&head, &body)?;
    response.check_status()?;
    Ok(response)
}
