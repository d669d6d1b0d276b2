//! End-to-end scripts against the `demo-console` binary.

use std::time::Duration;

use consolepool::{
    Credentials, FixedPath, Service, ServiceBuilder, SessionId, TransactionKind,
};
use tempfile::TempDir;

const CONSOLE: &str = env!("CARGO_BIN_EXE_demo-console");

async fn service(store: &TempDir) -> Service {
    let path = store.path().join("users.json");
    ServiceBuilder::new(CONSOLE)
        .locator(FixedPath::new(CONSOLE))
        .args(["--store", path.to_str().unwrap()])
        .termination_grace(Duration::from_secs(2))
        .supervisor(false)
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_register_deposit_withdraw_balance() {
    let store = tempfile::tempdir().unwrap();
    let service = service(&store).await;

    assert!(service.register("alice", "pw1").await.unwrap().success);
    assert!(service.authenticate("alice", "pw1").await.unwrap().success);

    let session = service.create_session("alice").await.unwrap();
    let id = session.id().clone();
    let login = service
        .establish(&id, Credentials::new("alice", "pw1"))
        .await
        .unwrap();
    assert!(login.success);
    assert!(!login.ambiguous);

    assert!(service.deposit(&id, 50.0).await.unwrap().success);
    assert_eq!(service.balance(&id).await.unwrap(), Some(50.0));

    assert!(service.withdraw(&id, 20.0).await.unwrap().success);
    assert_eq!(service.balance(&id).await.unwrap(), Some(30.0));

    let refused = service.withdraw(&id, 1000.0).await.unwrap();
    assert!(!refused.success);
    assert_eq!(service.balance(&id).await.unwrap(), Some(30.0));

    // Every call ran on the one process bound at login
    let stats = service.pool_stats();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.healthy, 1);
    assert_eq!(
        service.pool().get(&id).map(|h| h.id()),
        session.handle_id()
    );

    service.shutdown().await;
}

#[tokio::test]
async fn test_history_lists_transactions() {
    let store = tempfile::tempdir().unwrap();
    let service = service(&store).await;
    service.register("bob", "secret").await.unwrap();

    let session = service
        .login(Credentials::new("bob", "secret"))
        .await
        .unwrap()
        .expect("login accepted");
    let id = session.id();

    assert_eq!(service.history(id).await.unwrap(), Some(vec![]));

    service.deposit(id, 12.5).await.unwrap();
    service.withdraw(id, 2.5).await.unwrap();

    let history = service.history(id).await.unwrap().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].kind, TransactionKind::Deposit);
    assert_eq!(history[0].amount, 12.5);
    assert_eq!(history[1].kind, TransactionKind::Withdrawal);
    assert!(history.iter().all(|t| t.timestamp.is_some()));

    assert!(service.logout(id).await);
    assert_eq!(service.pool_stats().total, 0);
    service.shutdown().await;
}

#[tokio::test]
async fn test_rejected_credentials() {
    let store = tempfile::tempdir().unwrap();
    let service = service(&store).await;
    service.register("carol", "right").await.unwrap();

    assert!(!service.authenticate("carol", "wrong").await.unwrap().success);
    assert!(!service.authenticate("nobody", "right").await.unwrap().success);

    let session = service.create_session("carol").await.unwrap();
    let verdict = service
        .establish(session.id(), Credentials::new("carol", "wrong"))
        .await
        .unwrap();
    assert!(!verdict.success);
    assert!(session.handle_id().is_none());
    assert_eq!(service.pool_stats().total, 0);

    assert!(
        service
            .login(Credentials::new("carol", "wrong"))
            .await
            .unwrap()
            .is_none()
    );
    service.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_registration_fails() {
    let store = tempfile::tempdir().unwrap();
    let service = service(&store).await;

    assert!(service.register("dave", "pw").await.unwrap().success);
    assert!(!service.register("dave", "other").await.unwrap().success);
    service.shutdown().await;
}

#[tokio::test]
async fn test_credentialed_operations() {
    let store = tempfile::tempdir().unwrap();
    let service = service(&store).await;
    service.register("erin", "pw").await.unwrap();
    let creds = || Credentials::new("erin", "pw");

    assert!(service.deposit_once(creds(), 40.0).await.unwrap().success);
    assert!(!service.withdraw_once(creds(), 100.0).await.unwrap().success);
    assert!(service.withdraw_once(creds(), 15.0).await.unwrap().success);
    assert_eq!(service.balance_once(creds()).await.unwrap(), Some(25.0));
    assert_eq!(
        service.history_once(creds()).await.unwrap().map(|h| h.len()),
        Some(2)
    );

    // Wrong password never reaches the account menu
    assert_eq!(
        service
            .balance_once(Credentials::new("erin", "nope"))
            .await
            .unwrap(),
        None
    );
    assert_eq!(service.pool_stats().total, 0);
    service.shutdown().await;
}

#[tokio::test]
async fn test_coloured_output_is_sanitized() {
    let store = tempfile::tempdir().unwrap();
    let path = store.path().join("users.json");
    let service = ServiceBuilder::new(CONSOLE)
        .args(["--store", path.to_str().unwrap(), "--color"])
        .supervisor(false)
        .build()
        .await
        .unwrap();
    service.register("frank", "pw").await.unwrap();

    let session = service
        .login(Credentials::new("frank", "pw"))
        .await
        .unwrap()
        .expect("login accepted");
    assert!(service.deposit(session.id(), 5.0).await.unwrap().success);
    service.shutdown().await;
}

#[tokio::test]
async fn test_session_operation_requires_session() {
    let store = tempfile::tempdir().unwrap();
    let service = service(&store).await;

    let err = service
        .balance(&SessionId::new("missing"))
        .await
        .unwrap_err();
    assert!(!err.is_creation_failure());
    assert_eq!(service.pool_stats().total, 0);
    service.shutdown().await;
}
