//! Store-Backed Flow Tests
//!
//! Tests for the flows that need live collections: single-use exchange
//! redemption, social find-or-create, and refresh rotation. Ignored by
//! default; point TK_TEST_MONGO_URL at a MongoDB instance (default
//! localhost) and run with `cargo test -- --ignored`.

use std::sync::Arc;

use mongodb::bson::doc;

use tk_auth::social::{SocialProfile, SocialProvider};
use tk_auth::{
    create_strategy, Argon2Config, AuthError, AuthStrategy, PasswordPolicy, PasswordService,
    SessionRepository, SocialLoginService, StrategyKind, TokenLifetimes, TokenService,
    TsidGenerator, User, UserRepository, UserRole,
};

async fn test_database() -> mongodb::Database {
    let url = std::env::var("TK_TEST_MONGO_URL")
        .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let client = mongodb::Client::with_uri_str(&url).await.unwrap();
    client.database("turnkey-tests")
}

fn token_service() -> Arc<TokenService> {
    Arc::new(TokenService::new("store-flow-key", TokenLifetimes::default()))
}

fn social_service(
    db: &mongodb::Database,
) -> (SocialLoginService, Arc<UserRepository>, Arc<TokenService>) {
    let users = Arc::new(UserRepository::new(db));
    let sessions = Arc::new(SessionRepository::new(db));
    let tokens = token_service();
    let passwords = Arc::new(PasswordService::new(
        Argon2Config::testing(),
        PasswordPolicy::lenient(),
    ));
    let strategy = create_strategy(StrategyKind::Token, tokens.clone(), sessions, users.clone());
    (
        SocialLoginService::new(users.clone(), passwords, tokens.clone(), strategy),
        users,
        tokens,
    )
}

/// Per-run unique suffix, lowercased to survive username normalization.
fn unique_suffix() -> String {
    TsidGenerator::generate().to_lowercase()
}

fn github_profile(username: &str, provider_id: &str) -> SocialProfile {
    SocialProfile {
        provider_id: provider_id.to_string(),
        username: username.to_string(),
        email: None,
        avatar: None,
        introduction: None,
    }
}

#[tokio::test]
#[ignore] // Requires MongoDB
async fn test_exchange_token_redeems_exactly_once() {
    let db = test_database().await;
    let (service, users, _) = social_service(&db);

    let suffix = unique_suffix();
    let username = format!("octo-{}", suffix);
    let exchange_token = service
        .bridge_profile(
            SocialProvider::Github,
            github_profile(&username, &format!("gh-{}", suffix)),
        )
        .await
        .unwrap();

    let (user, issued) = service.redeem(&exchange_token).await.unwrap();
    assert_eq!(user.username, username);
    assert!(user.social_login_hash.is_none());
    assert!(!issued.access_token.is_empty());

    // The conditional update already cleared the correlation digest, so a
    // replay of the same token must fail.
    let err = service.redeem(&exchange_token).await.unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized { .. }));
    assert_eq!(err.public_message(), "Invalid username or key.");

    let stored = users.find_by_username(&username).await.unwrap().unwrap();
    assert!(stored.social_login_hash.is_none());
}

#[tokio::test]
#[ignore] // Requires MongoDB
async fn test_social_login_creates_restricted_user_once() {
    let db = test_database().await;
    let (service, users, _) = social_service(&db);

    let suffix = unique_suffix();
    let username = format!("newcomer-{}", suffix);
    let provider_id = format!("gh-{}", suffix);
    let profile = github_profile(&username, &provider_id);

    let first = service
        .bridge_profile(SocialProvider::Github, profile.clone())
        .await
        .unwrap();
    let created = users.find_by_username(&username).await.unwrap().unwrap();
    assert_eq!(created.role, UserRole::Restricted);
    assert!(created.enabled);
    assert_eq!(created.github_id.as_deref(), Some(provider_id.as_str()));

    // A repeat callback from the same identity reuses the account instead
    // of creating a sibling.
    let second = service
        .bridge_profile(SocialProvider::Github, profile)
        .await
        .unwrap();
    let count = db
        .collection::<User>("users")
        .count_documents(doc! { "username": &username })
        .await
        .unwrap();
    assert_eq!(count, 1);

    let again = users.find_by_username(&username).await.unwrap().unwrap();
    assert_eq!(again.id, created.id);

    // Each callback rotates the correlation key; only the latest token
    // redeems.
    let err = service.redeem(&first).await.unwrap_err();
    assert_eq!(err.public_message(), "Invalid username or key.");
    let (user, _) = service.redeem(&second).await.unwrap();
    assert_eq!(user.id, created.id);
}

#[tokio::test]
#[ignore] // Requires MongoDB
async fn test_find_or_create_username_match_wins_tie() {
    let db = test_database().await;
    let (service, users, tokens) = social_service(&db);

    let suffix = unique_suffix();
    let provider_id = format!("gh-{}", suffix);
    let by_name = User::new(format!("claimed-{}", suffix), "digest-a");
    let by_id = User::new(format!("linked-{}", suffix), "digest-b")
        .with_provider_id(SocialProvider::Github, provider_id.as_str());
    users.insert(&by_name).await.unwrap();
    users.insert(&by_id).await.unwrap();

    // The profile matches one account by username and another by external
    // id. The username match takes the login and gets the id linked.
    let token = service
        .bridge_profile(
            SocialProvider::Github,
            github_profile(&by_name.username, &provider_id),
        )
        .await
        .unwrap();

    let claims = tokens.verify_exchange(&token).unwrap();
    assert_eq!(claims.username, by_name.username);
    assert_eq!(claims.github_id.as_deref(), Some(provider_id.as_str()));

    let linked = users.find_by_id(&by_name.id).await.unwrap().unwrap();
    assert_eq!(linked.github_id.as_deref(), Some(provider_id.as_str()));
    assert!(linked.social_login_hash.is_some());
}

#[tokio::test]
#[ignore] // Requires MongoDB
async fn test_refresh_token_rotates_a_fresh_pair() {
    let db = test_database().await;
    let users = Arc::new(UserRepository::new(&db));
    let sessions = Arc::new(SessionRepository::new(&db));
    let tokens = token_service();
    let strategy = create_strategy(
        StrategyKind::Refresh,
        tokens.clone(),
        sessions,
        users.clone(),
    );

    let user = User::new(format!("rotator-{}", unique_suffix()), "digest");
    users.insert(&user).await.unwrap();

    let issued = strategy.issue(&user).await.unwrap();
    let refresh_token = issued.refresh_token.unwrap();

    // A valid refresh token walks the session path and mints a fresh
    // short access plus long refresh pair for the response headers.
    let identity = strategy.validate(&refresh_token).await.unwrap();
    assert_eq!(identity.user.id, user.id);
    assert!(identity.session.is_some());

    let access = identity.rotation.access_token.unwrap();
    let refresh = identity.rotation.refresh_token.unwrap();

    let claims = tokens.verify(&access).unwrap();
    assert_eq!(claims.exp - claims.iat, TokenLifetimes::default().short_secs);
    assert_eq!(claims.user.unwrap().id, user.id);

    // The rotated refresh token is itself good for another round.
    let again = strategy.validate(&refresh).await.unwrap();
    assert_eq!(again.user.id, user.id);
    assert!(again.rotation.access_token.is_some());
    assert!(again.rotation.refresh_token.is_some());
}
