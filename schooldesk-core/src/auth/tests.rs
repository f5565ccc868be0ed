use crate::auth::jwt::{validate_token, JwtConfig};
use crate::auth::service::{login, register, LoginRequest, RegisterRequest};
use crate::error::AppError;
use crate::models::UserRole;
use crate::store::memory::MemoryStore;

fn jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "auth-service-test-secret".into(),
        expiry_hours: 24,
    }
}

fn register_request(email: &str) -> RegisterRequest {
    RegisterRequest {
        name: Some("Meera Iyer".into()),
        email: Some(email.into()),
        password: Some("s3cret!".into()),
        role: None,
    }
}

#[tokio::test]
async fn test_register_normalizes_email_and_defaults_role() {
    let store = MemoryStore::new();
    let user = register(&store, register_request("  Meera@School.TEST "))
        .await
        .unwrap();

    assert_eq!(user.email, "meera@school.test");
    assert_eq!(user.role, UserRole::Student);
    assert_ne!(user.password_hash, "s3cret!");
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_bad_input() {
    let store = MemoryStore::new();
    register(&store, register_request("meera@school.test"))
        .await
        .unwrap();

    let duplicate = register(&store, register_request("MEERA@school.test")).await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    let short = RegisterRequest {
        password: Some("12345".into()),
        ..register_request("other@school.test")
    };
    assert!(matches!(
        register(&store, short).await,
        Err(AppError::Validation(_))
    ));

    let bad_role = RegisterRequest {
        role: Some("principal".into()),
        ..register_request("third@school.test")
    };
    assert!(matches!(
        register(&store, bad_role).await,
        Err(AppError::Validation(_))
    ));

    let missing = RegisterRequest::default();
    assert!(matches!(
        register(&store, missing).await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn test_login_issues_token_for_valid_credentials() {
    let store = MemoryStore::new();
    let user = register(
        &store,
        RegisterRequest {
            role: Some("admin".into()),
            ..register_request("admin@school.test")
        },
    )
    .await
    .unwrap();

    let response = login(
        &store,
        &jwt_config(),
        LoginRequest {
            email: Some("Admin@School.test".into()),
            password: Some("s3cret!".into()),
        },
    )
    .await
    .unwrap();

    let claims = validate_token(&response.token, &jwt_config()).unwrap();
    assert_eq!(claims.sub, user.id);
    assert_eq!(claims.role, UserRole::Admin);
    assert_eq!(response.user.email, "admin@school.test");
}

#[tokio::test]
async fn test_login_rejects_bad_credentials_uniformly() {
    let store = MemoryStore::new();
    register(&store, register_request("meera@school.test"))
        .await
        .unwrap();

    let wrong_password = login(
        &store,
        &jwt_config(),
        LoginRequest {
            email: Some("meera@school.test".into()),
            password: Some("nope-nope".into()),
        },
    )
    .await
    .unwrap_err();

    let unknown = login(
        &store,
        &jwt_config(),
        LoginRequest {
            email: Some("ghost@school.test".into()),
            password: Some("s3cret!".into()),
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(wrong_password, AppError::Unauthorized(_)));
    assert_eq!(wrong_password.to_string(), unknown.to_string());
}
