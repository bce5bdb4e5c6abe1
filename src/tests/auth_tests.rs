use super::helpers::MockBackend;
use crate::auth::*;
use crate::Error;
use hyper::StatusCode;

#[tokio::test]
async fn test_login_success_caches_identity() {
    let backend = MockBackend::start(|_, path| {
        assert_eq!(path, "/login");
        (
            StatusCode::OK,
            r#"{"status": "success", "message": "Autentificare reușită.", "user": {"username": "ana"}}"#
                .to_string(),
        )
    })
    .await;
    let auth = HttpAuthClient::new(&backend.config()).unwrap();
    assert_eq!(auth.current_user(), None);

    let identity = auth.login("ana", "secret").await.expect("Login failed");

    assert_eq!(identity.username, "ana");
    assert_eq!(auth.current_user(), Some(identity));
    assert_eq!(
        backend.requests()[0].json(),
        serde_json::json!({ "username": "ana", "password": "secret" })
    );
}

#[tokio::test]
async fn test_login_rejected() {
    let backend = MockBackend::start(|_, _| {
        (
            StatusCode::UNAUTHORIZED,
            r#"{"status": "error", "message": "Credentiale invalide."}"#.to_string(),
        )
    })
    .await;
    let auth = HttpAuthClient::new(&backend.config()).unwrap();

    let result = auth.login("ana", "wrong").await;

    assert!(matches!(result, Err(Error::Auth(text)) if text == "Credentiale invalide."));
    assert_eq!(auth.current_user(), None);
}

#[tokio::test]
async fn test_login_requires_credentials() {
    let backend = MockBackend::start(|_, _| (StatusCode::OK, "{}".to_string())).await;
    let auth = HttpAuthClient::new(&backend.config()).unwrap();

    let result = auth.login("   ", "secret").await;

    assert!(matches!(result, Err(Error::Validation(_))));
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_register_returns_user_id() {
    let backend = MockBackend::start(|_, path| {
        assert_eq!(path, "/register");
        (
            StatusCode::OK,
            r#"{"status": "success", "message": "Utilizator înregistrat.", "user_id": "65f0c1"}"#
                .to_string(),
        )
    })
    .await;
    let auth = HttpAuthClient::new(&backend.config()).unwrap();

    let user_id = auth.register("ion", "parola").await.expect("Register failed");

    assert_eq!(user_id.as_deref(), Some("65f0c1"));
    // Registering does not sign in
    assert_eq!(auth.current_user(), None);
}

#[tokio::test]
async fn test_register_existing_user() {
    let backend = MockBackend::start(|_, _| {
        (
            StatusCode::BAD_REQUEST,
            r#"{"status": "error", "message": "Utilizatorul există deja."}"#.to_string(),
        )
    })
    .await;
    let auth = HttpAuthClient::new(&backend.config()).unwrap();

    let result = auth.register("ion", "parola").await;
    assert!(matches!(result, Err(Error::Auth(text)) if text == "Utilizatorul există deja."));
}

#[tokio::test]
async fn test_logout_clears_identity() {
    let backend = MockBackend::start(|_, _| {
        (
            StatusCode::OK,
            r#"{"status": "success", "user": {"username": "ana"}}"#.to_string(),
        )
    })
    .await;
    let auth = HttpAuthClient::new(&backend.config()).unwrap();

    auth.login("ana", "secret").await.unwrap();
    assert!(auth.current_user().is_some());

    auth.logout();
    assert_eq!(auth.current_user(), None);
}

#[tokio::test]
async fn test_clones_share_identity() {
    let backend = MockBackend::start(|_, _| {
        (
            StatusCode::OK,
            r#"{"status": "success", "user": {"username": "ana"}}"#.to_string(),
        )
    })
    .await;
    let auth = HttpAuthClient::new(&backend.config()).unwrap();
    let shared = auth.clone();

    auth.login("ana", "secret").await.unwrap();
    assert_eq!(shared.current_user().unwrap().username, "ana");
}
