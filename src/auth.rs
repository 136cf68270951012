//! Accounts, sessions, and sign-in
//!
//! Users register with email + password or arrive through an OAuth provider.
//! Passwords are stored salted and SHA-256 hashed; sessions are random bearer
//! tokens persisted in the database with a configurable lifetime, accepted
//! either as an `Authorization: Bearer` header or as the session cookie.
//! Sign-in and sign-out fan out on a broadcast channel so other parts of the
//! application can react to auth state changes.

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect},
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use rand::{distr::Alphanumeric, Rng};
use redb::{Database, ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::database::{AppState, EMAIL_INDEX, SESSIONS, USERS};
use crate::handler::internal_error;
use crate::middleware::{session_token, CurrentUser, SESSION_COOKIE};
use crate::store::StoreError;

/// A registered account.
///
/// OAuth-provisioned accounts have no password hash and carry the provider
/// name instead.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub salt: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub provider: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An active sign-in.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Auth state change published on the application's broadcast channel.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn { user_id: String },
    SignedOut { user_id: String },
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("email is already registered")]
    EmailTaken,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Profile returned by an OAuth provider after a successful code exchange.
#[derive(Debug, Clone)]
pub struct OAuthProfile {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct OAuthExchangeError(pub String);

/// Exchanges an OAuth authorization code for a user profile.
///
/// The protocol handshake itself lives behind this seam; the application only
/// sees the resulting profile.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn exchange_code(&self, code: &str) -> Result<OAuthProfile, OAuthExchangeError>;
}

/// Default provider: every exchange fails until a real one is installed.
pub struct DisabledOAuth;

#[async_trait]
impl OAuthProvider for DisabledOAuth {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn exchange_code(&self, _code: &str) -> Result<OAuthProfile, OAuthExchangeError> {
        Err(OAuthExchangeError(
            "no OAuth provider is configured".to_string(),
        ))
    }
}

fn random_key(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Salted SHA-256 digest, hex encoded.
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Form-level checks shared by sign-up and login.
fn validate_credentials_input(email: &str, password: &str) -> Result<(), &'static str> {
    if email.trim().is_empty() {
        return Err("Email is required");
    }
    if !looks_like_email(email.trim()) {
        return Err("Invalid email format");
    }
    if password.is_empty() {
        return Err("Password is required");
    }
    if password.len() < 6 {
        return Err("Password must be at least 6 characters");
    }
    Ok(())
}

fn lookup_user_id_by_email(db: &Database, email: &str) -> Result<Option<String>, StoreError> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(EMAIL_INDEX)?;
    Ok(table.get(email)?.map(|guard| guard.value().to_string()))
}

pub(crate) fn load_user(db: &Database, id: &str) -> Result<Option<User>, StoreError> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(USERS)?;
    match table.get(id)? {
        Some(guard) => Ok(Some(serde_json::from_str(guard.value())?)),
        None => Ok(None),
    }
}

/// Writes a new user and its email-index entry in one transaction.
///
/// Returns false without writing when the email is already registered.
fn persist_new_user(db: &Database, user: &User) -> Result<bool, StoreError> {
    let record = serde_json::to_string(user)?;

    let write_txn = db.begin_write()?;
    let created = {
        let mut emails = write_txn.open_table(EMAIL_INDEX)?;
        if emails.get(user.email.as_str())?.is_some() {
            false
        } else {
            emails.insert(user.email.as_str(), user.id.as_str())?;
            let mut users = write_txn.open_table(USERS)?;
            users.insert(user.id.as_str(), record.as_str())?;
            true
        }
    };
    write_txn.commit()?;

    Ok(created)
}

/// Registers a password account.
pub fn register_user(
    db: &Database,
    email: &str,
    password: &str,
    first_name: Option<String>,
    last_name: Option<String>,
) -> Result<User, AuthError> {
    let email = email.trim().to_lowercase();
    let salt = random_key(16);

    let user = User {
        id: random_key(12),
        email,
        password_hash: Some(hash_password(password, &salt)),
        salt: Some(salt),
        first_name,
        last_name,
        provider: None,
        created_at: Utc::now(),
    };

    if persist_new_user(db, &user)? {
        Ok(user)
    } else {
        Err(AuthError::EmailTaken)
    }
}

/// Checks a password sign-in. The error is the same whether the account is
/// unknown, has no password (OAuth account), or the password is wrong.
pub fn verify_credentials(db: &Database, email: &str, password: &str) -> Result<User, AuthError> {
    let email = email.trim().to_lowercase();

    let Some(id) = lookup_user_id_by_email(db, &email)? else {
        return Err(AuthError::InvalidCredentials);
    };
    let Some(user) = load_user(db, &id)? else {
        return Err(AuthError::InvalidCredentials);
    };

    match (&user.password_hash, &user.salt) {
        (Some(hash), Some(salt)) if hash_password(password, salt) == *hash => Ok(user),
        _ => Err(AuthError::InvalidCredentials),
    }
}

/// Looks up the account for an OAuth profile, provisioning it on first visit.
pub fn find_or_create_oauth_user(
    db: &Database,
    provider: &str,
    profile: OAuthProfile,
) -> Result<User, StoreError> {
    let email = profile.email.trim().to_lowercase();

    if let Some(id) = lookup_user_id_by_email(db, &email)? {
        if let Some(user) = load_user(db, &id)? {
            return Ok(user);
        }
    }

    let user = User {
        id: random_key(12),
        email,
        password_hash: None,
        salt: None,
        first_name: profile.first_name,
        last_name: profile.last_name,
        provider: Some(provider.to_string()),
        created_at: Utc::now(),
    };
    persist_new_user(db, &user)?;

    Ok(user)
}

fn persist_session(db: &Database, session: &Session) -> Result<(), StoreError> {
    let record = serde_json::to_string(session)?;

    let write_txn = db.begin_write()?;
    {
        let mut table = write_txn.open_table(SESSIONS)?;
        table.insert(session.token.as_str(), record.as_str())?;
    }
    write_txn.commit()?;

    Ok(())
}

/// Opens a session for a signed-in user.
pub fn create_session(db: &Database, user: &User, ttl_hours: i64) -> Result<Session, StoreError> {
    let now = Utc::now();
    let session = Session {
        token: random_key(32),
        user_id: user.id.clone(),
        email: user.email.clone(),
        created_at: now,
        expires_at: now + Duration::hours(ttl_hours),
    };
    persist_session(db, &session)?;

    Ok(session)
}

/// Resolves a token to its session; expired sessions read as absent.
pub fn load_session(db: &Database, token: &str) -> Result<Option<Session>, StoreError> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(SESSIONS)?;

    let Some(guard) = table.get(token)? else {
        return Ok(None);
    };
    let session: Session = serde_json::from_str(guard.value())?;

    if session.expires_at <= Utc::now() {
        return Ok(None);
    }
    Ok(Some(session))
}

/// Deletes a session (sign-out).
pub fn delete_session(db: &Database, token: &str) -> Result<(), StoreError> {
    let write_txn = db.begin_write()?;
    {
        let mut table = write_txn.open_table(SESSIONS)?;
        table.remove(token)?;
    }
    write_txn.commit()?;

    Ok(())
}

/// Account fields safe to expose to clients.
#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            id: user.id.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

/// Request payload for creating an account
#[derive(Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Request payload for password sign-in
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Query parameters of the OAuth callback route
#[derive(Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub redirect_to: Option<String>,
}

/// Creates an account and opens a session
///
/// # Response
///
/// - **201 Created** - `{ token, user }`
/// - **400 Bad Request** - Invalid email or too-short password
/// - **409 Conflict** - Email already registered
pub async fn sign_up(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> impl IntoResponse {
    if let Err(message) = validate_credentials_input(&payload.email, &payload.password) {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response();
    }

    let user = match register_user(
        &state.db,
        &payload.email,
        &payload.password,
        payload.first_name,
        payload.last_name,
    ) {
        Ok(user) => user,
        Err(AuthError::EmailTaken) => {
            return (
                StatusCode::CONFLICT,
                Json(json!({ "error": "An account with this email already exists." })),
            )
                .into_response()
        }
        Err(AuthError::InvalidCredentials) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Invalid email or password" })),
            )
                .into_response()
        }
        Err(AuthError::Store(err)) => return internal_error(err),
    };

    match create_session(&state.db, &user, state.config.session_ttl_hours) {
        Ok(session) => {
            let _ = state.auth_events.send(AuthEvent::SignedIn {
                user_id: user.id.clone(),
            });
            (
                StatusCode::CREATED,
                Json(json!({ "token": session.token, "user": UserResponse::from(&user) })),
            )
                .into_response()
        }
        Err(err) => internal_error(err),
    }
}

/// Password sign-in
///
/// # Response
///
/// - **200 OK** - `{ token, user }`
/// - **401 Unauthorized** - Unknown email or wrong password
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    let user = match verify_credentials(&state.db, &payload.email, &payload.password) {
        Ok(user) => user,
        Err(AuthError::Store(err)) => return internal_error(err),
        Err(_) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Invalid email or password" })),
            )
                .into_response()
        }
    };

    match create_session(&state.db, &user, state.config.session_ttl_hours) {
        Ok(session) => {
            let _ = state.auth_events.send(AuthEvent::SignedIn {
                user_id: user.id.clone(),
            });
            Json(json!({ "token": session.token, "user": UserResponse::from(&user) })).into_response()
        }
        Err(err) => internal_error(err),
    }
}

/// Ends the caller's session
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> impl IntoResponse {
    match delete_session(&state.db, &user.token) {
        Ok(()) => {
            let _ = state.auth_events.send(AuthEvent::SignedOut {
                user_id: user.id.clone(),
            });
            Json(json!({ "message": "Signed out successfully" })).into_response()
        }
        Err(err) => internal_error(err),
    }
}

/// Reports the current session's user, or null when not signed in
pub async fn current_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let Some(token) = session_token(&headers) else {
        return Json(json!({ "user": null })).into_response();
    };

    let session = match load_session(&state.db, &token) {
        Ok(Some(session)) => session,
        Ok(None) => return Json(json!({ "user": null })).into_response(),
        Err(err) => return internal_error(err),
    };

    match load_user(&state.db, &session.user_id) {
        Ok(Some(user)) => Json(json!({ "user": UserResponse::from(&user) })).into_response(),
        Ok(None) => Json(json!({ "user": null })).into_response(),
        Err(err) => internal_error(err),
    }
}

/// OAuth landing route
///
/// Exchanges the authorization code through the configured provider,
/// provisions the account on first visit, opens a session, and redirects.
/// Failures redirect back to the login page with an error marker.
pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> impl IntoResponse {
    let Some(code) = params.code else {
        return Redirect::temporary("/login?error=no_code").into_response();
    };

    let profile = match state.oauth.exchange_code(&code).await {
        Ok(profile) => profile,
        Err(err) => {
            tracing::error!(error = %err, provider = state.oauth.name(), "OAuth code exchange failed");
            return Redirect::temporary("/login?error=auth_error").into_response();
        }
    };

    let user = match find_or_create_oauth_user(&state.db, state.oauth.name(), profile) {
        Ok(user) => user,
        Err(err) => {
            tracing::error!(error = %err, "failed to provision OAuth user");
            return Redirect::temporary("/login?error=server_error").into_response();
        }
    };

    let session = match create_session(&state.db, &user, state.config.session_ttl_hours) {
        Ok(session) => session,
        Err(err) => {
            tracing::error!(error = %err, "failed to open session after OAuth sign-in");
            return Redirect::temporary("/login?error=server_error").into_response();
        }
    };

    let _ = state.auth_events.send(AuthEvent::SignedIn {
        user_id: user.id.clone(),
    });

    // Only same-site redirect targets; anything else falls back to the
    // default landing page.
    let target = params
        .redirect_to
        .filter(|t| t.starts_with('/'))
        .unwrap_or_else(|| "/residences".to_string());
    let cookie = format!(
        "{}={}; Path=/; Max-Age={}; SameSite=Lax",
        SESSION_COOKIE,
        session.token,
        state.config.session_ttl_hours * 3600
    );

    let mut response = Redirect::temporary(&target).into_response();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::init_db;
    use tempfile::NamedTempFile;

    fn test_db() -> (Database, NamedTempFile) {
        let file = NamedTempFile::new().unwrap();
        let db = init_db(file.path().to_str().unwrap()).unwrap();
        (db, file)
    }

    #[test]
    fn password_hash_depends_on_salt() {
        let a = hash_password("hunter22", "salt1");
        let b = hash_password("hunter22", "salt1");
        assert_eq!(a, b);

        let c = hash_password("hunter22", "salt2");
        assert_ne!(a, c);
    }

    #[test]
    fn email_shape_checks() {
        assert!(looks_like_email("user@example.com"));
        assert!(!looks_like_email("userexample.com"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("user@nodot"));
        assert!(!looks_like_email("user@.com"));
    }

    #[test]
    fn register_then_verify() {
        let (db, _file) = test_db();

        let user = register_user(&db, "Buyer@Example.com", "secret1", None, None).unwrap();
        // Emails are normalized to lowercase.
        assert_eq!(user.email, "buyer@example.com");

        let verified = verify_credentials(&db, "buyer@example.com", "secret1").unwrap();
        assert_eq!(verified.id, user.id);

        assert!(matches!(
            verify_credentials(&db, "buyer@example.com", "wrong"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            verify_credentials(&db, "nobody@example.com", "secret1"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let (db, _file) = test_db();

        register_user(&db, "owner@example.com", "secret1", None, None).unwrap();
        assert!(matches!(
            register_user(&db, "owner@example.com", "other66", None, None),
            Err(AuthError::EmailTaken)
        ));
    }

    #[test]
    fn session_round_trip_and_expiry() {
        let (db, _file) = test_db();
        let user = register_user(&db, "owner@example.com", "secret1", None, None).unwrap();

        let session = create_session(&db, &user, 24).unwrap();
        let loaded = load_session(&db, &session.token).unwrap().unwrap();
        assert_eq!(loaded.user_id, user.id);

        delete_session(&db, &session.token).unwrap();
        assert!(load_session(&db, &session.token).unwrap().is_none());

        // An expired session reads as absent.
        let expired = Session {
            token: "expiredtoken".to_string(),
            user_id: user.id.clone(),
            email: user.email.clone(),
            created_at: Utc::now() - Duration::hours(25),
            expires_at: Utc::now() - Duration::hours(1),
        };
        persist_session(&db, &expired).unwrap();
        assert!(load_session(&db, "expiredtoken").unwrap().is_none());
    }

    #[test]
    fn oauth_user_is_provisioned_once() {
        let (db, _file) = test_db();

        let profile = OAuthProfile {
            email: "Social@Example.com".to_string(),
            first_name: Some("Ada".to_string()),
            last_name: None,
        };
        let first = find_or_create_oauth_user(&db, "google", profile.clone()).unwrap();
        assert_eq!(first.provider.as_deref(), Some("google"));
        assert!(first.password_hash.is_none());

        let second = find_or_create_oauth_user(&db, "google", profile).unwrap();
        assert_eq!(second.id, first.id);

        // Password sign-in is not available for OAuth accounts.
        assert!(matches!(
            verify_credentials(&db, "social@example.com", "anything"),
            Err(AuthError::InvalidCredentials)
        ));
    }
}
