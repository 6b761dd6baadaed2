//! # Session lifecycle engine
//!
//! A [`Session`] walks a device through its credential lifecycle and moves
//! data:
//!
//! ```text
//! Uninitialized --init--> Initialized --onboard--> Onboarded --token--> HasAccessToken
//!       ^                      |
//!       +--------deinit--------+
//! ```
//!
//! Every network round trip goes through a [`Backend`]; [`HttpBackend`] is the
//! one that talks to the ingestion REST API. Long-lived credentials are
//! loaded from a [`CredentialStore`] at `init` and saved after every
//! successful registration change.
//!
//! [`Session::process`] is the entry point for sending data: it exchanges the
//! container and, on an authorization failure, refreshes the access token
//! (rotating the key if the server rejects the registration secret) before
//! retrying exactly once.
//!
//! ```rust,no_run
//! use libiot_ingest::session::{
//!     Container, HttpBackend, Item, Session, SessionConfig, SessionHooks,
//! };
//! use libiot_ingest::wire::content_type;
//! # use libiot_ingest::network::Transport;
//! # use libiot_ingest::wire::RandomSource;
//! # fn run<T: Transport, R: RandomSource>(transport: T, rng: R) -> Result<(), libiot_ingest::error::Error> {
//!
//! let config = SessionConfig::new("iot.example.com")?.with_bootstrap_token("bootstrap")?;
//! let mut session = Session::new(HttpBackend::new(transport, rng));
//! session.init(config, SessionHooks::default())?;
//! session.onboard()?;
//!
//! let mut container = Container::new();
//! container.push(Item::single("m1", content_type::JSON, br#"{"temp":21.5}"#))?;
//! session.process(&mut container)?;
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]
#![deny(unsafe_code)]

use alloc::boxed::Box;

use tracing::{debug, warn};

pub mod backend;
pub mod config;
pub mod container;
pub mod credentials;
mod json;
pub mod lock;

pub use backend::{Backend, HttpBackend, NoSigner, Signer};
pub use config::{ProxyConfig, ProxyKind, SecurityProfile, SessionConfig};
pub use container::{ByteSource, Container, Item, Payload, PayloadSource};
#[cfg(feature = "std")]
pub use credentials::FileCredentialStore;
pub use credentials::{CredentialStore, Credentials, PersistedCredentials, StorageCredentialStore};
pub use lock::{CriticalSection, SectionGuard};

use crate::error::Error;

/// Optional collaborators supplied at `init`.
#[derive(Default)]
pub struct SessionHooks {
    /// Where long-lived credentials are loaded from and saved to.
    pub store: Option<Box<dyn CredentialStore>>,
    /// Entered around every state-mutating operation.
    pub lock: Option<Box<dyn CriticalSection>>,
}

impl SessionHooks {
    pub fn with_store(mut self, store: impl CredentialStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn with_lock(mut self, lock: impl CriticalSection + 'static) -> Self {
        self.lock = Some(Box::new(lock));
        self
    }
}

impl core::fmt::Debug for SessionHooks {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionHooks")
            .field("store", &self.store.is_some())
            .field("lock", &self.lock.is_some())
            .finish()
    }
}

/// State that exists only between `init` and `deinit`.
struct Active {
    config: SessionConfig,
    credentials: Credentials,
    store: Option<Box<dyn CredentialStore>>,
}

impl Active {
    fn persist(&mut self) -> Result<(), Error> {
        if let Some(store) = self.store.as_deref_mut() {
            store.save(&self.credentials.persisted())?;
            debug!("credentials saved");
        }
        Ok(())
    }

    fn onboarded(&mut self) -> Result<&mut Self, Error> {
        if !self.credentials.is_onboarded() {
            return Err(Error::NotOnboarded);
        }
        Ok(self)
    }
}

/// The lifecycle engine proper; [`Session`] wraps it in the caller's
/// critical section.
struct Engine<B: Backend> {
    backend: B,
    active: Option<Active>,
}

impl<B: Backend> Engine<B> {
    fn init(
        &mut self,
        config: SessionConfig,
        mut store: Option<Box<dyn CredentialStore>>,
    ) -> Result<(), Error> {
        if self.active.is_some() {
            return Err(Error::InvalidState);
        }
        config.validate()?;

        let credentials = match store.as_deref_mut() {
            Some(store) => store
                .load()?
                .map(Credentials::from_persisted)
                .unwrap_or_default(),
            None => Credentials::default(),
        };
        self.backend.set_timeout(config.timeout_seconds);
        debug!(
            host = config.host.as_str(),
            onboarded = credentials.is_onboarded(),
            "session initialized"
        );
        self.active = Some(Active {
            config,
            credentials,
            store,
        });
        Ok(())
    }

    fn onboard(&mut self) -> Result<(), Error> {
        let Some(active) = self.active.as_mut() else {
            return Err(Error::NotInitialized);
        };
        if active.credentials.is_onboarded() {
            refresh_access_token(&mut self.backend, active);
            return Err(Error::AlreadyOnboarded);
        }
        self.backend
            .register(&active.config, &mut active.credentials)?;
        active.persist()?;
        refresh_access_token(&mut self.backend, active);
        Ok(())
    }

    fn rotate_key(&mut self) -> Result<(), Error> {
        let Some(active) = self.active.as_mut() else {
            return Err(Error::NotInitialized);
        };
        let active = active.onboarded()?;
        self.backend
            .rotate_key(&active.config, &mut active.credentials)?;
        active.persist()?;
        refresh_access_token(&mut self.backend, active);
        Ok(())
    }

    fn update_security_information(&mut self) -> Result<(), Error> {
        let Some(active) = self.active.as_mut() else {
            return Err(Error::NotInitialized);
        };
        let active = active.onboarded()?;
        self.backend
            .update_security_information(&active.config, &mut active.credentials)?;
        active.persist()?;
        refresh_access_token(&mut self.backend, active);
        Ok(())
    }

    fn get_access_token(&mut self) -> Result<(), Error> {
        let Some(active) = self.active.as_mut() else {
            return Err(Error::NotInitialized);
        };
        let active = active.onboarded()?;
        self.backend
            .fetch_access_token(&active.config, &mut active.credentials)
    }

    /// Sends every item of `container`, forgetting earlier deliveries.
    fn exchange(&mut self, container: &mut Container<'_>) -> Result<(), Error> {
        container.restart();
        self.transmit(container)
    }

    /// Sends the items of `container` the server has not accepted yet.
    fn transmit(&mut self, container: &mut Container<'_>) -> Result<(), Error> {
        let Some(active) = self.active.as_mut() else {
            return Err(Error::NotInitialized);
        };
        let active = active.onboarded()?;
        if container.is_empty() {
            return Err(Error::StoreIsEmpty);
        }
        if !active.credentials.has_access_token() {
            return Err(Error::NoAccessTokenExists);
        }
        if container.undelivered() == 0 {
            return Ok(());
        }

        if container.is_streamable() {
            self.backend
                .send_streaming(&active.config, &active.credentials, container)
        } else {
            self.backend
                .send_buffered(&active.config, &active.credentials, container)
        }
    }

    fn process(&mut self, container: &mut Container<'_>) -> Result<(), Error> {
        let refused = match self.exchange(container) {
            Ok(()) => return Ok(()),
            Err(err) if err.is_auth_failure() => {
                debug!(error = %err, "exchange not authorized, refreshing access token");
                err
            }
            Err(err) => return Err(err),
        };

        match self.get_access_token() {
            Ok(()) => {}
            Err(Error::BadRequest) => {
                warn!("registration secret rejected, rotating key");
                self.rotate_key()?;
            }
            Err(err) => return Err(err),
        }

        // Items already accepted are not sent twice.
        if let Err(err) = container.rewind_undelivered() {
            warn!(error = %err, "payload cannot be replayed, exchange not retried");
            return Err(refused);
        }
        self.transmit(container)
    }
}

/// Fetches a fresh access token, logging rather than returning a failure.
fn refresh_access_token<B: Backend>(backend: &mut B, active: &mut Active) {
    if let Err(err) = backend.fetch_access_token(&active.config, &mut active.credentials) {
        warn!(error = %err, "access token refresh failed");
    }
}

/// A device session against the ingestion service.
///
/// Operations take `&mut self`; the session never locks internally. A
/// [`CriticalSection`] supplied through [`SessionHooks`] is entered around
/// every operation that mutates session state.
pub struct Session<B: Backend> {
    lock: Option<Box<dyn CriticalSection>>,
    engine: Engine<B>,
}

impl<B: Backend> Session<B> {
    /// An uninitialized session.
    pub fn new(backend: B) -> Self {
        Self {
            lock: None,
            engine: Engine {
                backend,
                active: None,
            },
        }
    }

    /// Validates and takes ownership of `config`, then loads stored
    /// credentials.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if the session is already initialized
    /// - [`Error::InvalidArgument`] if `config` fails validation
    /// - any error from the credential store
    pub fn init(&mut self, config: SessionConfig, hooks: SessionHooks) -> Result<(), Error> {
        if self.engine.active.is_some() {
            return Err(Error::InvalidState);
        }
        let SessionHooks { store, lock } = hooks;
        self.lock = lock;
        let _guard = SectionGuard::enter(self.lock.as_deref_mut());
        self.engine.init(config, store)
    }

    /// Drops configuration, credentials and hooks. The session can be
    /// initialized again afterwards.
    pub fn deinit(&mut self) {
        {
            let _guard = SectionGuard::enter(self.lock.as_deref_mut());
            self.engine.active = None;
        }
        self.lock = None;
        debug!("session deinitialized");
    }

    /// Registers the device.
    ///
    /// On success the credentials are saved and an access token is fetched
    /// on a best-effort basis.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] before `init`
    /// - [`Error::AlreadyOnboarded`] if a registration token exists; the
    ///   access token is still refreshed
    /// - any registration or persistence error
    pub fn onboard(&mut self) -> Result<(), Error> {
        let _guard = SectionGuard::enter(self.lock.as_deref_mut());
        self.engine.onboard()
    }

    /// Obtains a fresh client secret or key pair, saves it, and refreshes
    /// the access token on a best-effort basis.
    pub fn rotate_key(&mut self) -> Result<(), Error> {
        let _guard = SectionGuard::enter(self.lock.as_deref_mut());
        self.engine.rotate_key()
    }

    /// Re-reads the registration from the server, saves it, and refreshes
    /// the access token on a best-effort basis.
    pub fn update_security_information(&mut self) -> Result<(), Error> {
        let _guard = SectionGuard::enter(self.lock.as_deref_mut());
        self.engine.update_security_information()
    }

    /// Requests an access token. The backend's result is returned verbatim;
    /// [`Error::BadRequest`] means the registration secret is stale.
    pub fn get_access_token(&mut self) -> Result<(), Error> {
        let _guard = SectionGuard::enter(self.lock.as_deref_mut());
        self.engine.get_access_token()
    }

    /// Sends all of `container` once, streaming or buffered as it declares.
    ///
    /// Deliveries and responses from earlier exchanges of the same container
    /// are forgotten first.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] / [`Error::NotOnboarded`]
    /// - [`Error::StoreIsEmpty`] for an empty container
    /// - [`Error::NoAccessTokenExists`] without an access token
    /// - any encoding, transport or server error
    pub fn exchange(&mut self, container: &mut Container<'_>) -> Result<(), Error> {
        let _guard = SectionGuard::enter(self.lock.as_deref_mut());
        self.engine.exchange(container)
    }

    /// Sends `container`, recovering once from an authorization failure.
    ///
    /// 1. Exchange; success or any non-authorization error is returned.
    /// 2. On [`Error::Unauthorized`] or [`Error::NoAccessTokenExists`],
    ///    request an access token.
    /// 3. If that is refused with [`Error::BadRequest`], rotate the key;
    ///    a rotation failure is returned as is. Any other token error is
    ///    returned as is.
    /// 4. Send the items the server has not accepted yet once more and
    ///    return the result. Stream payloads are rewound first; if one
    ///    cannot be rewound the authorization error from step 1 is returned
    ///    instead.
    pub fn process(&mut self, container: &mut Container<'_>) -> Result<(), Error> {
        let _guard = SectionGuard::enter(self.lock.as_deref_mut());
        self.engine.process(container)
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.active.is_some()
    }

    pub fn is_onboarded(&self) -> bool {
        self.credentials().is_some_and(Credentials::is_onboarded)
    }

    pub fn has_access_token(&self) -> bool {
        self.credentials().is_some_and(Credentials::has_access_token)
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.engine.active.as_ref().map(|active| &active.credentials)
    }

    pub fn config(&self) -> Option<&SessionConfig> {
        self.engine.active.as_ref().map(|active| &active.config)
    }

    pub fn backend(&self) -> &B {
        &self.engine.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.engine.backend
    }
}

impl<B: Backend> core::fmt::Debug for Session<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("initialized", &self.is_initialized())
            .field("onboarded", &self.is_onboarded())
            .field("has_access_token", &self.has_access_token())
            .finish_non_exhaustive()
    }
}
