use libiot_ingest::error::Error;
use libiot_ingest::network::error::Error as TransportError;
use libiot_ingest::session::{Container, Item, Session, SessionConfig, SessionHooks};
use libiot_ingest::wire::content_type;

mod mock;

use mock::{Calls, ScriptedBackend, SharedStore};

fn config() -> SessionConfig {
    SessionConfig::new("iot.example.com")
        .unwrap()
        .with_bootstrap_token("boot")
        .unwrap()
}

/// A session restored from a store and holding an access token, with the
/// call counters reset.
fn ready_session() -> Session<ScriptedBackend> {
    let mut session = Session::new(ScriptedBackend::default());
    session
        .init(config(), SessionHooks::default().with_store(SharedStore::onboarded()))
        .unwrap();
    session.get_access_token().unwrap();
    session.backend_mut().reset_calls();
    session
}

fn container<'a>() -> Container<'a> {
    let mut container = Container::new();
    container
        .push(Item::single("m1", content_type::JSON, br#"{"temp":21.5}"#))
        .unwrap();
    container
}

#[test]
fn test_process_succeeds_first_time() {
    let mut session = ready_session();

    session.process(&mut container()).unwrap();

    assert_eq!(
        session.backend().calls,
        Calls {
            exchange: 1,
            ..Calls::default()
        }
    );
}

#[test]
fn test_process_retries_after_token_refresh() {
    let mut session = ready_session();
    session.backend_mut().exchange.push_back(Err(Error::Unauthorized));

    session.process(&mut container()).unwrap();

    assert_eq!(
        session.backend().calls,
        Calls {
            exchange: 2,
            fetch_token: 1,
            ..Calls::default()
        }
    );
    assert!(session.has_access_token());
}

#[test]
fn test_process_rotates_key_when_secret_is_stale() {
    let mut session = ready_session();
    let backend = session.backend_mut();
    backend.exchange.push_back(Err(Error::Unauthorized));
    backend.fetch_token.push_back(Err(Error::BadRequest));

    session.process(&mut container()).unwrap();

    // One explicit token request, refused, plus the refresh that follows
    // every successful rotation.
    assert_eq!(
        session.backend().calls,
        Calls {
            exchange: 2,
            fetch_token: 2,
            rotate_key: 1,
            ..Calls::default()
        }
    );
    assert_eq!(
        session.credentials().unwrap().client_secret.as_deref(),
        Some("rotated-1")
    );
}

#[test]
fn test_process_returns_rotation_failure() {
    let mut session = ready_session();
    let backend = session.backend_mut();
    backend.exchange.push_back(Err(Error::Unauthorized));
    backend.fetch_token.push_back(Err(Error::BadRequest));
    backend.rotate_key.push_back(Err(Error::ServerFail));

    assert_eq!(session.process(&mut container()), Err(Error::ServerFail));

    assert_eq!(
        session.backend().calls,
        Calls {
            exchange: 1,
            fetch_token: 1,
            rotate_key: 1,
            ..Calls::default()
        }
    );
    // Credentials reflect the last successful step.
    assert_eq!(
        session.credentials().unwrap().client_secret.as_deref(),
        Some("s3cret")
    );
}

#[test]
fn test_process_returns_other_token_failures() {
    let mut session = ready_session();
    let backend = session.backend_mut();
    backend.exchange.push_back(Err(Error::Unauthorized));
    backend
        .fetch_token
        .push_back(Err(Error::Transport(TransportError::Timeout)));

    assert_eq!(
        session.process(&mut container()),
        Err(Error::Transport(TransportError::Timeout))
    );
    assert_eq!(session.backend().calls.exchange, 1);
    assert_eq!(session.backend().calls.rotate_key, 0);
}

#[test]
fn test_process_does_not_retry_other_exchange_failures() {
    let mut session = ready_session();
    session.backend_mut().exchange.push_back(Err(Error::ServerFail));

    assert_eq!(session.process(&mut container()), Err(Error::ServerFail));
    assert_eq!(
        session.backend().calls,
        Calls {
            exchange: 1,
            ..Calls::default()
        }
    );
}

#[test]
fn test_process_retries_at_most_once() {
    let mut session = ready_session();
    let backend = session.backend_mut();
    backend.exchange.push_back(Err(Error::Unauthorized));
    backend.exchange.push_back(Err(Error::Unauthorized));

    assert_eq!(session.process(&mut container()), Err(Error::Unauthorized));
    assert_eq!(session.backend().calls.exchange, 2);
    assert_eq!(session.backend().calls.fetch_token, 1);
}

#[test]
fn test_process_without_token_fetches_one() {
    let mut session = Session::new(ScriptedBackend::default());
    session
        .init(config(), SessionHooks::default().with_store(SharedStore::onboarded()))
        .unwrap();
    assert!(!session.has_access_token());

    session.process(&mut container()).unwrap();

    // The first exchange is refused locally with NoAccessTokenExists.
    assert_eq!(
        session.backend().calls,
        Calls {
            exchange: 1,
            fetch_token: 1,
            ..Calls::default()
        }
    );
}

#[test]
fn test_onboard_twice() {
    let store = SharedStore::default();
    let mut session = Session::new(ScriptedBackend::default());
    session
        .init(config(), SessionHooks::default().with_store(store.clone()))
        .unwrap();

    session.onboard().unwrap();
    assert!(session.is_onboarded());
    assert!(session.has_access_token());
    assert_eq!(*store.saves.borrow(), 1);

    assert_eq!(session.onboard(), Err(Error::AlreadyOnboarded));
    assert_eq!(
        session.backend().calls,
        Calls {
            register: 1,
            fetch_token: 2,
            ..Calls::default()
        }
    );
    assert_eq!(*store.saves.borrow(), 1);
}

#[test]
fn test_onboard_survives_token_failure() {
    let mut session = Session::new(ScriptedBackend::default());
    session
        .backend_mut()
        .fetch_token
        .push_back(Err(Error::ServerFail));
    session.init(config(), SessionHooks::default()).unwrap();

    session.onboard().unwrap();

    assert!(session.is_onboarded());
    assert!(!session.has_access_token());
}

#[test]
fn test_onboard_failure_leaves_session_unonboarded() {
    let store = SharedStore::default();
    let mut session = Session::new(ScriptedBackend::default());
    session.backend_mut().register.push_back(Err(Error::Unauthorized));
    session
        .init(config(), SessionHooks::default().with_store(store.clone()))
        .unwrap();

    assert_eq!(session.onboard(), Err(Error::Unauthorized));
    assert!(!session.is_onboarded());
    assert_eq!(session.backend().calls.fetch_token, 0);
    assert!(store.record.borrow().is_none());
}

#[test]
fn test_operations_before_init() {
    let mut session = Session::new(ScriptedBackend::default());

    assert_eq!(session.onboard(), Err(Error::NotInitialized));
    assert_eq!(session.rotate_key(), Err(Error::NotInitialized));
    assert_eq!(
        session.update_security_information(),
        Err(Error::NotInitialized)
    );
    assert_eq!(session.get_access_token(), Err(Error::NotInitialized));
    assert_eq!(
        session.exchange(&mut container()),
        Err(Error::NotInitialized)
    );
    assert_eq!(session.process(&mut container()), Err(Error::NotInitialized));
    assert_eq!(session.backend().calls, Calls::default());
}

#[test]
fn test_operations_before_onboarding() {
    let mut session = Session::new(ScriptedBackend::default());
    session.init(config(), SessionHooks::default()).unwrap();

    assert_eq!(session.rotate_key(), Err(Error::NotOnboarded));
    assert_eq!(
        session.update_security_information(),
        Err(Error::NotOnboarded)
    );
    assert_eq!(session.get_access_token(), Err(Error::NotOnboarded));
    assert_eq!(session.exchange(&mut container()), Err(Error::NotOnboarded));
    assert_eq!(session.backend().calls, Calls::default());
}

#[test]
fn test_exchange_preconditions() {
    let mut session = Session::new(ScriptedBackend::default());
    session
        .init(config(), SessionHooks::default().with_store(SharedStore::onboarded()))
        .unwrap();

    assert_eq!(
        session.exchange(&mut Container::new()),
        Err(Error::StoreIsEmpty)
    );
    assert_eq!(
        session.exchange(&mut container()),
        Err(Error::NoAccessTokenExists)
    );
    assert_eq!(session.backend().calls.exchange, 0);
}

#[test]
fn test_empty_container_is_not_retried() {
    let mut session = ready_session();

    assert_eq!(
        session.process(&mut Container::new()),
        Err(Error::StoreIsEmpty)
    );
    assert_eq!(session.backend().calls, Calls::default());
}

#[test]
fn test_exchange_dispatches_on_streamability() {
    let mut session = ready_session();
    let payload = [7u8; 64];

    let mut streaming = Container::streaming();
    streaming
        .push(Item::tuple(
            "m1",
            content_type::JSON,
            b"{}",
            content_type::OCTET_STREAM,
            libiot_ingest::session::Payload::Bytes(&payload),
        ))
        .unwrap();
    session.exchange(&mut streaming).unwrap();
    session.exchange(&mut container()).unwrap();

    assert_eq!(session.backend().calls.exchange, 2);
    assert_eq!(session.backend().streamed, 1);
}

#[test]
fn test_rotate_and_update_persist_and_refresh() {
    let store = SharedStore::onboarded();
    let mut session = Session::new(ScriptedBackend::default());
    session
        .init(config(), SessionHooks::default().with_store(store.clone()))
        .unwrap();

    session.rotate_key().unwrap();
    assert_eq!(
        store.record.borrow().as_ref().unwrap().client_secret.as_deref(),
        Some("rotated-1")
    );
    assert!(session.has_access_token());

    session.update_security_information().unwrap();
    assert_eq!(*store.saves.borrow(), 2);
    assert_eq!(
        session.backend().calls,
        Calls {
            rotate_key: 1,
            update: 1,
            fetch_token: 2,
            ..Calls::default()
        }
    );
}

#[test]
fn test_update_failure_is_propagated() {
    let mut session = Session::new(ScriptedBackend::default());
    session
        .init(config(), SessionHooks::default().with_store(SharedStore::onboarded()))
        .unwrap();
    session
        .backend_mut()
        .update
        .push_back(Err(Error::Transport(TransportError::ConnectionRefused)));

    assert_eq!(
        session.update_security_information(),
        Err(Error::Transport(TransportError::ConnectionRefused))
    );
    assert_eq!(session.backend().calls.fetch_token, 0);
}

#[test]
fn test_init_and_deinit() {
    let mut session = Session::new(ScriptedBackend::default());
    let config = config();
    let timeout = config.timeout_seconds;

    session.init(config.clone(), SessionHooks::default()).unwrap();
    assert!(session.is_initialized());
    assert_eq!(session.backend().timeout, Some(timeout));
    assert_eq!(
        session.init(config.clone(), SessionHooks::default()),
        Err(Error::InvalidState)
    );

    session.deinit();
    assert!(!session.is_initialized());
    assert!(session.credentials().is_none());
    session.init(config, SessionHooks::default()).unwrap();
}

#[test]
fn test_init_rejects_invalid_config() {
    let mut session = Session::new(ScriptedBackend::default());
    let config = config().with_payload_ceiling(10);

    assert_eq!(
        session.init(config, SessionHooks::default()),
        Err(Error::InvalidArgument)
    );
    assert!(!session.is_initialized());
}
