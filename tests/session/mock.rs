use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use libiot_ingest::error::Error;
use libiot_ingest::session::{
    Backend, Container, CredentialStore, Credentials, PersistedCredentials, SessionConfig,
};

/// Number of times each backend round trip was attempted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Calls {
    pub register: usize,
    pub rotate_key: usize,
    pub update: usize,
    pub fetch_token: usize,
    pub exchange: usize,
}

/// A backend whose answers are queued up front. An empty queue answers `Ok`.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    pub calls: Calls,
    pub register: VecDeque<Result<(), Error>>,
    pub rotate_key: VecDeque<Result<(), Error>>,
    pub update: VecDeque<Result<(), Error>>,
    pub fetch_token: VecDeque<Result<(), Error>>,
    pub exchange: VecDeque<Result<(), Error>>,
    pub streamed: usize,
    pub timeout: Option<u32>,
}

impl ScriptedBackend {
    pub fn reset_calls(&mut self) {
        self.calls = Calls::default();
    }
}

fn next(script: &mut VecDeque<Result<(), Error>>) -> Result<(), Error> {
    script.pop_front().unwrap_or(Ok(()))
}

impl Backend for ScriptedBackend {
    fn register(
        &mut self,
        _config: &SessionConfig,
        credentials: &mut Credentials,
    ) -> Result<(), Error> {
        self.calls.register += 1;
        next(&mut self.register)?;
        credentials.client_id = Some("dev-1".into());
        credentials.client_secret = Some(format!("secret-{}", self.calls.register));
        credentials.registration_token = Some("reg-token".into());
        credentials.registration_uri =
            Some("https://iot.example.com/iot/api/v2/oauth2/register/dev-1".into());
        credentials.access_token = None;
        Ok(())
    }

    fn rotate_key(
        &mut self,
        _config: &SessionConfig,
        credentials: &mut Credentials,
    ) -> Result<(), Error> {
        self.calls.rotate_key += 1;
        next(&mut self.rotate_key)?;
        credentials.client_secret = Some(format!("rotated-{}", self.calls.rotate_key));
        credentials.access_token = None;
        Ok(())
    }

    fn update_security_information(
        &mut self,
        _config: &SessionConfig,
        _credentials: &mut Credentials,
    ) -> Result<(), Error> {
        self.calls.update += 1;
        next(&mut self.update)
    }

    fn fetch_access_token(
        &mut self,
        _config: &SessionConfig,
        credentials: &mut Credentials,
    ) -> Result<(), Error> {
        self.calls.fetch_token += 1;
        next(&mut self.fetch_token)?;
        credentials.access_token = Some(format!("token-{}", self.calls.fetch_token));
        Ok(())
    }

    fn send_buffered(
        &mut self,
        _config: &SessionConfig,
        _credentials: &Credentials,
        _container: &mut Container<'_>,
    ) -> Result<(), Error> {
        self.calls.exchange += 1;
        next(&mut self.exchange)
    }

    fn send_streaming(
        &mut self,
        _config: &SessionConfig,
        _credentials: &Credentials,
        _container: &mut Container<'_>,
    ) -> Result<(), Error> {
        self.calls.exchange += 1;
        self.streamed += 1;
        next(&mut self.exchange)
    }

    fn set_timeout(&mut self, seconds: u32) {
        self.timeout = Some(seconds);
    }
}

/// In-memory credential store whose contents stay visible to the test.
#[derive(Debug, Default, Clone)]
pub struct SharedStore {
    pub record: Rc<RefCell<Option<PersistedCredentials>>>,
    pub saves: Rc<RefCell<usize>>,
}

impl SharedStore {
    pub fn onboarded() -> Self {
        let store = Self::default();
        *store.record.borrow_mut() = Some(PersistedCredentials {
            client_id: Some("dev-1".into()),
            client_secret: Some("s3cret".into()),
            registration_access_token: Some("reg-token".into()),
            registration_client_uri: Some(
                "https://iot.example.com/iot/api/v2/oauth2/register/dev-1".into(),
            ),
        });
        store
    }
}

impl CredentialStore for SharedStore {
    fn load(&mut self) -> Result<Option<PersistedCredentials>, Error> {
        Ok(self.record.borrow().clone())
    }

    fn save(&mut self, credentials: &PersistedCredentials) -> Result<(), Error> {
        *self.record.borrow_mut() = Some(credentials.clone());
        *self.saves.borrow_mut() += 1;
        Ok(())
    }
}
