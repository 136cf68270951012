//! Route definitions for the listing API
//!
//! This module configures all HTTP routes and maps them to their respective
//! handlers. It creates the Axum router with the application state.

use axum::routing::{get, post, put};
use axum::Router;

use axum::middleware;

use crate::auth::{current_session, login, logout, oauth_callback, sign_up};
use crate::database::AppState;
use crate::handler::{
    create_posting, delete_posting, get_property, list_properties, locations, my_postings,
    serve_image, update_posting, upload_images,
};
use crate::middleware::require_session;

/// Creates and configures the Axum application router with all routes
///
/// # Route Definitions
///
/// Public:
/// - `GET /api/properties` - Search listings with filters and pagination
/// - `GET /api/properties/{id}` - Listing details
/// - `GET /api/locations` - Distinct cities and countries
/// - `POST /api/auth/signup`, `POST /api/auth/login` - Account creation / sign-in
/// - `GET /api/auth/session` - Current session's user
/// - `GET /auth/callback` - OAuth landing route
/// - `GET /images/{key}` - Stored listing images
///
/// Signed-in only (session middleware):
/// - `GET /api/postings`, `POST /api/postings` - The caller's listings
/// - `PUT /api/postings/{id}`, `DELETE /api/postings/{id}` - Edit / remove
/// - `POST /api/images` - Image upload
/// - `POST /api/auth/logout` - Sign out
pub fn create_app(state: AppState) -> Router {
    // Routes that require a signed-in caller
    let protected_routes = Router::new()
        .route("/postings", get(my_postings).post(create_posting))
        .route("/postings/{id}", put(update_posting).delete(delete_posting))
        .route("/images", post(upload_images))
        .route("/auth/logout", post(logout))
        .layer(middleware::from_fn_with_state(state.clone(), require_session));

    let api_routes = Router::new()
        .route("/properties", get(list_properties))
        .route("/properties/{id}", get(get_property))
        .route("/locations", get(locations))
        .route("/auth/signup", post(sign_up))
        .route("/auth/login", post(login))
        .route("/auth/session", get(current_session))
        .merge(protected_routes);

    Router::new()
        // Public image delivery - listing cards resolve their keys here
        .route("/images/{key}", get(serve_image))
        // OAuth providers land back on this route
        .route("/auth/callback", get(oauth_callback))
        // Mount API routes under /api
        .nest("/api", api_routes)
        // Inject the application state into all handlers
        .with_state(state)
}
