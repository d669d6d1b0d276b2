//! Pool and session lifecycle through the service, using `demo-console`.

use std::time::Duration;

use consolepool::error::SessionError;
use consolepool::{Credentials, Error, FixedPath, Service, ServiceBuilder, SessionId};
use tempfile::TempDir;

const CONSOLE: &str = env!("CARGO_BIN_EXE_demo-console");

fn builder(store: &TempDir) -> ServiceBuilder {
    let path = store.path().join("users.json");
    ServiceBuilder::new(CONSOLE)
        .locator(FixedPath::new(CONSOLE))
        .args(["--store", path.to_str().unwrap()])
        .termination_grace(Duration::from_secs(2))
}

async fn logged_in(service: &Service, username: &str) -> SessionId {
    service.register(username, "pw").await.unwrap();
    let session = service
        .login(Credentials::new(username, "pw"))
        .await
        .unwrap()
        .expect("login accepted");
    session.id().clone()
}

#[tokio::test]
async fn test_get_or_create_returns_same_handle() {
    let store = tempfile::tempdir().unwrap();
    let service = builder(&store).supervisor(false).build().await.unwrap();
    let session = SessionId::new("s1");

    let first = service.pool().get_or_create(&session).await.unwrap();
    let first_access = first.last_accessed();
    let second = service.pool().get_or_create(&session).await.unwrap();

    assert_eq!(first.id(), second.id());
    assert!(second.last_accessed() > first_access);
    assert_eq!(service.pool_stats().total, 1);
    service.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_get_or_create_binds_one_process() {
    let store = tempfile::tempdir().unwrap();
    let service = builder(&store).supervisor(false).build().await.unwrap();
    let session = SessionId::new("s1");

    let (a, b, c) = tokio::join!(
        service.pool().get_or_create(&session),
        service.pool().get_or_create(&session),
        service.pool().get_or_create(&session),
    );
    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

    assert_eq!(a.id(), b.id());
    assert_eq!(b.id(), c.id());
    assert!(!a.is_terminated());
    assert_eq!(service.pool().len(), 1);
    service.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_spawns_respect_process_cap() {
    let store = tempfile::tempdir().unwrap();
    let service = builder(&store)
        .max_processes(1)
        .supervisor(false)
        .build()
        .await
        .unwrap();

    let s1 = SessionId::new("s1");
    let s2 = SessionId::new("s2");
    let (a, b) = tokio::join!(
        service.pool().get_or_create(&s1),
        service.pool().get_or_create(&s2),
    );
    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    assert_eq!(service.pool_stats().total, 1);
    service.shutdown().await;
}

#[tokio::test]
async fn test_terminate_twice() {
    let store = tempfile::tempdir().unwrap();
    let service = builder(&store).supervisor(false).build().await.unwrap();
    let session = SessionId::new("s1");
    let handle = service.pool().get_or_create(&session).await.unwrap();

    assert!(service.pool().terminate(&session).await);
    assert!(!service.pool().terminate(&session).await);
    assert!(handle.is_terminated());
    assert!(!service.pool().contains(&session));
    service.shutdown().await;
}

#[tokio::test]
async fn test_idle_process_evicted_and_session_must_log_in_again() {
    let store = tempfile::tempdir().unwrap();
    let service = builder(&store)
        .idle_timeout(Duration::from_millis(200))
        .sweep_interval(Duration::from_millis(100))
        .build()
        .await
        .unwrap();
    let id = logged_in(&service, "alice").await;
    let before = service.pool().get(&id).unwrap().id();

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!service.pool().contains(&id));
    assert!(service.is_session_valid(&id));

    // The replacement process is not logged in, so session scripts refuse it
    let err = service.balance(&id).await.unwrap_err();
    assert!(matches!(err, Error::Session(SessionError::NotLoggedIn(_))));

    let verdict = service
        .establish(&id, Credentials::new("alice", "pw"))
        .await
        .unwrap();
    assert!(verdict.success);
    assert_ne!(service.pool().get(&id).unwrap().id(), before);
    assert_eq!(service.balance(&id).await.unwrap(), Some(0.0));
    service.shutdown().await;
}

#[tokio::test]
async fn test_idle_session_expiry_cascades() {
    let store = tempfile::tempdir().unwrap();
    let service = builder(&store)
        .session_timeout(Duration::from_millis(200))
        .sweep_interval(Duration::from_millis(100))
        .build()
        .await
        .unwrap();
    let id = logged_in(&service, "bob").await;
    assert_eq!(service.pool_stats().total, 1);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!service.is_session_valid(&id));
    assert_eq!(service.active_sessions(), 0);
    assert_eq!(service.pool_stats().total, 0);
    service.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_calls_on_one_session_are_serialized() {
    let store = tempfile::tempdir().unwrap();
    let service = builder(&store).supervisor(false).build().await.unwrap();
    let id = logged_in(&service, "carol").await;

    let (a, b, c) = tokio::join!(
        service.deposit(&id, 10.0),
        service.deposit(&id, 20.0),
        service.balance(&id),
    );
    assert!(a.unwrap().success);
    assert!(b.unwrap().success);
    assert!(c.unwrap().is_some());

    assert_eq!(service.balance(&id).await.unwrap(), Some(30.0));
    service.shutdown().await;
}

#[tokio::test]
async fn test_call_during_login_waits_for_it() {
    let store = tempfile::tempdir().unwrap();
    let service = builder(&store).supervisor(false).build().await.unwrap();
    service.register("ivan", "pw").await.unwrap();
    let session = service.create_session("ivan").await.unwrap();
    let id = session.id().clone();

    let (login, deposit) = tokio::join!(
        service.establish(&id, Credentials::new("ivan", "pw")),
        async {
            tokio::task::yield_now().await;
            service.deposit(&id, 10.0).await
        },
    );

    assert!(login.unwrap().success);
    match deposit {
        Ok(verdict) => assert!(verdict.success),
        Err(err) => assert!(matches!(err, Error::Session(SessionError::NotLoggedIn(_)))),
    }
    let handle = service.pool().get(&id).expect("logged-in process kept");
    assert_eq!(handle.username().as_deref(), Some("ivan"));
    assert!(service.balance(&id).await.unwrap().is_some());
    service.shutdown().await;
}

#[tokio::test]
async fn test_sessions_get_separate_processes() {
    let store = tempfile::tempdir().unwrap();
    let service = builder(&store).supervisor(false).build().await.unwrap();
    let dave = logged_in(&service, "dave").await;
    let erin = logged_in(&service, "erin").await;

    service.deposit(&dave, 5.0).await.unwrap();
    assert_eq!(service.balance(&dave).await.unwrap(), Some(5.0));
    assert_eq!(service.balance(&erin).await.unwrap(), Some(0.0));

    let handles = service.handles();
    assert_eq!(handles.len(), 2);
    assert_ne!(handles[0].pid, handles[1].pid);
    service.shutdown().await;
}

#[tokio::test]
async fn test_process_cap() {
    let store = tempfile::tempdir().unwrap();
    let service = builder(&store)
        .max_processes(1)
        .supervisor(false)
        .build()
        .await
        .unwrap();
    logged_in(&service, "frank").await;

    service.register("grace", "pw").await.unwrap();
    let err = service
        .login(Credentials::new("grace", "pw"))
        .await
        .unwrap_err();
    assert!(err.is_creation_failure());
    service.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_terminates_everything() {
    let store = tempfile::tempdir().unwrap();
    let service = builder(&store).build().await.unwrap();
    let id = logged_in(&service, "heidi").await;
    let handle = service.pool().get(&id).unwrap();

    service.shutdown().await;
    assert!(handle.is_terminated());
    assert_eq!(service.pool_stats().total, 0);
    assert_eq!(service.active_sessions(), 0);
    assert!(!service.is_supervised());
}
