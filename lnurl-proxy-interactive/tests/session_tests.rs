
use lnurl_proxy_interactive::{
    SessionError, SessionState, StatusCode, WithdrawProxyServer, WithdrawRequest,
};
use lnurl_proxy_lib::{codec, LnurlStatus, OfferRegistry, RegistryError};
use mock_implementations::MockWithdrawStream;
use std::time::Duration;
use tokio::task::JoinHandle;

type SessionHandle = JoinHandle<Result<SessionState, SessionError>>;

fn spawn_session(server: &WithdrawProxyServer, mut stream: MockWithdrawStream) -> SessionHandle {
    let server = server.clone();
    tokio::spawn(async move { server.lnurl_withdraw(&mut stream).await })
}

fn setup() -> (OfferRegistry, WithdrawProxyServer) {
    let registry = OfferRegistry::new("https://proxy.example");
    let server = WithdrawProxyServer::new(registry.clone());
    (registry, server)
}

#[tokio::test]
async fn test_myid_withdraw_end_to_end() {
    let (registry, server) = setup();
    let (stream, mut issuer) = MockWithdrawStream::pair();
    let session = spawn_session(&server, stream);

    issuer.open("myid", 123, 500, "mydesc").await;
    let lnurl = issuer.expect_bech_string().await;
    assert_eq!(
        codec::decode(&lnurl).unwrap(),
        "https://proxy.example/withdraw?id=myid"
    );

    let params = registry.lookup("myid").unwrap();
    assert_eq!(params.tag, "withdrawRequest");
    assert_eq!(params.k1, "myid");
    assert_eq!(params.callback, "https://proxy.example/invoice");
    assert_eq!(params.min_withdrawable, 123);
    assert_eq!(params.max_withdrawable, 500);
    assert_eq!(params.default_description, "mydesc");

    let wallet = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.resolve("myid", "lnbc500n1").await })
    };

    assert_eq!(issuer.expect_invoice().await, "lnbc500n1");
    issuer.send(WithdrawRequest::paid()).await;

    let outcome = wallet.await.unwrap();
    assert_eq!(outcome.status, LnurlStatus::Ok);
    assert_eq!(outcome.reason, None);
    assert_eq!(session.await.unwrap().unwrap(), SessionState::Done);
    assert!(registry.is_empty());

    let snapshot = server.metrics().snapshot();
    assert_eq!(snapshot.sessions_opened, 1);
    assert_eq!(snapshot.active_sessions, 0);
    assert_eq!(snapshot.offers_registered, 1);
    assert_eq!(snapshot.invoices_forwarded, 1);
    assert_eq!(snapshot.payments_succeeded, 1);
}

#[tokio::test]
async fn test_insufficient_funds_is_relayed_to_wallet() {
    let (registry, server) = setup();
    let (stream, mut issuer) = MockWithdrawStream::pair();
    let session = spawn_session(&server, stream);

    issuer.open("myid", 123, 500, "mydesc").await;
    issuer.expect_bech_string().await;

    let wallet = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.resolve("myid", "lnbc500n1").await })
    };
    issuer.expect_invoice().await;
    issuer
        .send(WithdrawRequest::payment_failed("insufficient funds"))
        .await;

    let outcome = wallet.await.unwrap();
    assert_eq!(outcome.status, LnurlStatus::Error);
    assert_eq!(outcome.reason.as_deref(), Some("insufficient funds"));

    let err = session.await.unwrap().unwrap_err();
    assert!(matches!(err, SessionError::PaymentFailed(ref reason) if reason == "insufficient funds"));
    assert_eq!(err.code(), StatusCode::Unknown);
    assert_eq!(server.metrics().snapshot().payments_failed, 1);
}

#[tokio::test]
async fn test_issuer_disconnect_removes_offer_without_error() {
    let (registry, server) = setup();
    let (stream, mut issuer) = MockWithdrawStream::pair();
    let session = spawn_session(&server, stream);

    issuer.open("myid", 1, 2, "").await;
    issuer.expect_bech_string().await;
    assert!(registry.contains("myid"));

    issuer.disconnect();

    assert_eq!(
        session.await.unwrap().unwrap(),
        SessionState::CallerCanceled
    );
    assert!(!registry.contains("myid"));

    let outcome = registry.resolve("myid", "lnbc1").await;
    assert_eq!(outcome.reason.as_deref(), Some("withdraw id does not exist"));
    assert_eq!(server.metrics().snapshot().canceled_by_issuer, 1);
}

#[tokio::test]
async fn test_server_shutdown_cancels_pending_session() {
    let (registry, server) = setup();
    let (stream, mut issuer) = MockWithdrawStream::pair();
    let session = spawn_session(&server, stream);

    issuer.open("myid", 1, 2, "").await;
    issuer.expect_bech_string().await;

    server.stop();

    let err = session.await.unwrap().unwrap_err();
    assert!(matches!(err, SessionError::CanceledByServer));
    assert_eq!(err.code(), StatusCode::Canceled);
    assert_eq!(err.to_string(), "canceled by server");
    assert_eq!(err.terminal_state(), SessionState::IssuerCanceled);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_shutdown_wins_over_simultaneous_disconnect() {
    let (_registry, server) = setup();
    let (stream, mut issuer) = MockWithdrawStream::pair();
    let session = spawn_session(&server, stream);

    issuer.open("myid", 1, 2, "").await;
    issuer.expect_bech_string().await;

    server.stop();
    issuer.disconnect();

    let err = session.await.unwrap().unwrap_err();
    assert!(matches!(err, SessionError::CanceledByServer));
}

#[tokio::test]
async fn test_duplicate_withdraw_id_is_rejected() {
    let (registry, server) = setup();
    let (first_stream, mut first) = MockWithdrawStream::pair();
    let first_session = spawn_session(&server, first_stream);
    first.open("dup", 1, 2, "first").await;
    first.expect_bech_string().await;

    let (second_stream, second) = MockWithdrawStream::pair();
    let second_session = spawn_session(&server, second_stream);
    second.open("dup", 3, 4, "second").await;

    let err = second_session.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        SessionError::Registry(RegistryError::DuplicateWithdrawId(_))
    ));
    assert_eq!(err.code(), StatusCode::AlreadyExists);
    assert_eq!(registry.lookup("dup").unwrap().default_description, "first");

    first.disconnect();
    first_session.await.unwrap().unwrap();
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_withdraw_id_can_be_reused_after_session_ends() {
    let (registry, server) = setup();

    let (stream, mut issuer) = MockWithdrawStream::pair();
    let session = spawn_session(&server, stream);
    issuer.open("again", 1, 2, "").await;
    issuer.expect_bech_string().await;
    issuer.disconnect();
    session.await.unwrap().unwrap();

    let (stream, mut issuer) = MockWithdrawStream::pair();
    let _session = spawn_session(&server, stream);
    issuer.open("again", 1, 2, "").await;
    issuer.expect_bech_string().await;
    assert!(registry.contains("again"));
}

#[tokio::test]
async fn test_first_message_must_be_open() {
    let (registry, server) = setup();
    let (stream, issuer) = MockWithdrawStream::pair();
    let session = spawn_session(&server, stream);

    issuer.send(WithdrawRequest::paid()).await;

    let err = session.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        SessionError::UnexpectedMessage {
            expected: "open",
            got: "pay"
        }
    ));
    assert_eq!(err.code(), StatusCode::Unknown);
    assert!(registry.is_empty());
    assert_eq!(server.metrics().snapshot().protocol_errors, 1);
}

#[tokio::test]
async fn test_empty_withdraw_id_is_invalid_argument() {
    let (_registry, server) = setup();
    let (stream, issuer) = MockWithdrawStream::pair();
    let session = spawn_session(&server, stream);

    issuer.open("", 1, 2, "").await;

    let err = session.await.unwrap().unwrap_err();
    assert_eq!(err.code(), StatusCode::InvalidArgument);
}

#[tokio::test]
async fn test_non_pay_reply_fails_wallet_with_internal_error() {
    let (registry, server) = setup();
    let (stream, mut issuer) = MockWithdrawStream::pair();
    let session = spawn_session(&server, stream);

    issuer.open("myid", 1, 2, "").await;
    issuer.expect_bech_string().await;

    let wallet = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.resolve("myid", "lnbc1").await })
    };
    issuer.expect_invoice().await;
    issuer.open("other", 1, 2, "").await;

    let outcome = wallet.await.unwrap();
    assert_eq!(outcome.status, LnurlStatus::Error);
    assert!(outcome.reason.unwrap().starts_with("internal error"));

    let err = session.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        SessionError::UnexpectedMessage {
            expected: "pay",
            got: "open"
        }
    ));
}

#[tokio::test]
async fn test_issuer_gone_while_settling_reports_closed_to_wallet() {
    let (registry, server) = setup();
    let (stream, mut issuer) = MockWithdrawStream::pair();
    let session = spawn_session(&server, stream);

    issuer.open("myid", 1, 2, "").await;
    issuer.expect_bech_string().await;

    let wallet = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.resolve("myid", "lnbc1").await })
    };
    issuer.expect_invoice().await;
    issuer.disconnect();

    let outcome = wallet.await.unwrap();
    assert_eq!(outcome.status, LnurlStatus::Error);
    assert_eq!(
        outcome.reason.as_deref(),
        Some("withdraw session closed before reporting a payment result")
    );

    let err = session.await.unwrap().unwrap_err();
    assert!(matches!(err, SessionError::Transport(_)));
    assert_eq!(err.terminal_state(), SessionState::Failed);
}

#[tokio::test]
async fn test_shutdown_before_open_ends_session() {
    let (registry, server) = setup();
    let (stream, _issuer) = MockWithdrawStream::pair();
    let session = spawn_session(&server, stream);

    // The issuer is connected but never sends `open`.
    tokio::task::yield_now().await;
    server.stop();

    let err = tokio::time::timeout(Duration::from_secs(2), session)
        .await
        .expect("session must observe shutdown while opening")
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, SessionError::CanceledByServer));
    assert_eq!(err.terminal_state(), SessionState::IssuerCanceled);
    assert!(registry.is_empty());
    assert_eq!(server.metrics().snapshot().canceled_by_server, 1);
}

#[tokio::test]
async fn test_shutdown_while_settling_fails_wallet_and_ends_session() {
    let (registry, server) = setup();
    let (stream, mut issuer) = MockWithdrawStream::pair();
    let session = spawn_session(&server, stream);

    issuer.open("stall", 1, 2, "").await;
    issuer.expect_bech_string().await;

    let wallet = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.resolve("stall", "lnbc1").await })
    };
    assert_eq!(issuer.expect_invoice().await, "lnbc1");

    // The issuer holds the invoice and never reports a result.
    server.stop();

    let outcome = tokio::time::timeout(Duration::from_secs(2), wallet)
        .await
        .expect("wallet must be released on shutdown")
        .unwrap();
    assert_eq!(outcome.status, LnurlStatus::Error);
    assert_eq!(
        outcome.reason.as_deref(),
        Some("withdraw session closed before reporting a payment result")
    );

    let err = session.await.unwrap().unwrap_err();
    assert!(matches!(err, SessionError::CanceledByServer));
    assert_eq!(err.code(), StatusCode::Canceled);
    assert!(registry.is_empty());

    let snapshot = server.metrics().snapshot();
    assert_eq!(snapshot.canceled_by_server, 1);
    assert_eq!(snapshot.payments_failed, 0);
}
