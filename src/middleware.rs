use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::auth::load_session;
use crate::database::AppState;
use crate::handler::internal_error;

/// Cookie carrying the session token for browser clients.
pub const SESSION_COOKIE: &str = "hf_session";

/// The authenticated caller, injected into protected handlers.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    /// Session token the request authenticated with.
    pub token: String,
}

/// Pulls the session token from the `Authorization: Bearer` header or, for
/// browser clients, from the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        if let Ok(raw) = value.to_str() {
            if let Some(token) = raw.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').map(str::trim).find_map(|part| {
        part.strip_prefix(SESSION_COOKIE)
            .and_then(|rest| rest.strip_prefix('='))
            .map(str::to_string)
    })
}

/// Middleware guarding the signed-in routes.
///
/// Resolves the token to a live session and injects [`CurrentUser`];
/// otherwise the request is rejected with a JSON 401.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let unauthorized = || {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Unauthorized",
                "message": "Invalid or missing session token"
            })),
        )
            .into_response()
    };

    let Some(token) = session_token(request.headers()) else {
        return Err(unauthorized());
    };

    let session = match load_session(&state.db, &token) {
        Ok(Some(session)) => session,
        Ok(None) => return Err(unauthorized()),
        Err(err) => return Err(internal_error(err)),
    };

    request.extensions_mut().insert(CurrentUser {
        id: session.user_id,
        email: session.email,
        token,
    });

    Ok(next.run(request).await)
}
