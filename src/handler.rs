//! HTTP request handlers for the listing API
//!
//! This module implements the property-facing endpoints:
//! - Searching listings with filters, sort, and pagination
//! - Fetching one listing's details
//! - The distinct city/country vocabulary for the filter bar
//! - The owner's "my postings" CRUD
//! - Image upload and serving
//!
//! Store and storage failures are logged with detail and surfaced to clients
//! as a generic message; empty results are a normal response, not an error.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use rand::{distr::Alphanumeric, Rng};
use serde_json::json;

use crate::database::AppState;
use crate::middleware::CurrentUser;
use crate::model::{PostingRequest, Property, PropertyResponse, SearchParams, MAX_IMAGES};
use crate::query::{FilterSelection, PropertyQuery, SortSpec};
use crate::storage::ImageError;
use crate::store::PropertyStore;

/// Logs the underlying failure and returns the generic 500 body.
///
/// The literal error never reaches the client.
pub(crate) fn internal_error(err: impl std::fmt::Display) -> Response {
    tracing::error!(error = %err, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "Something went wrong on our side. Please try again in a few minutes."
        })),
    )
        .into_response()
}

fn not_found(what: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": format!("{} not found", what),
            "code": "not_found"
        })),
    )
        .into_response()
}

fn forbidden(message: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "error": message,
            "code": "forbidden"
        })),
    )
        .into_response()
}

/// Searches listings
///
/// Composes the filter selection from the query string, runs it against the
/// store, and returns one page of matches plus the total count.
///
/// # Query Parameters
///
/// - `search` - free text, matched against city, country, and type
/// - `type`, `city`, `country` - exact-match filters
/// - `price`, `area` - bucket labels (e.g. "Under $100k", "100-200 m²")
/// - `featured` - restrict to curated listings
/// - `sort_by` ("price"|"area"), `order` ("asc"|"desc")
/// - `page` - page number, starts from 1
///
/// Sentinel labels ("Property Type", "Price", "Area", "All Cities",
/// "All Countries"), empty values, and absent parameters impose no filter.
///
/// # Response
///
/// ```json
/// {
///   "items": [...],
///   "total_count": 25,
///   "page": 1,
///   "total_pages": 3
/// }
/// ```
pub async fn list_properties(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    let selection = FilterSelection::from_params(&params);
    let sort = SortSpec::from_params(&params);
    let page = params.page.unwrap_or(1).max(1);

    let query = PropertyQuery::compose(&selection, sort, page, state.config.page_size);

    match state.store.search(&query).await {
        Ok(result) => {
            let items: Vec<PropertyResponse> = result
                .items
                .into_iter()
                .map(|property| PropertyResponse::from_property(property, &state.images))
                .collect();

            Json(json!({
                "items": items,
                "total_count": result.total_count,
                "page": result.page,
                "total_pages": result.total_pages
            }))
            .into_response()
        }
        Err(err) => internal_error(err),
    }
}

/// Fetches one listing's details
pub async fn get_property(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get(&id).await {
        Ok(Some(property)) => {
            Json(PropertyResponse::from_property(property, &state.images)).into_response()
        }
        Ok(None) => not_found("Property"),
        Err(err) => internal_error(err),
    }
}

/// Distinct cities and countries for the filter-bar dropdowns
pub async fn locations(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.known_locations().await {
        Ok(locations) => Json(locations).into_response(),
        Err(err) => internal_error(err),
    }
}

/// Lists the caller's own postings, newest first
pub async fn my_postings(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> impl IntoResponse {
    match state.store.list_by_owner(&user.id).await {
        Ok(properties) => {
            let items: Vec<PropertyResponse> = properties
                .into_iter()
                .map(|property| PropertyResponse::from_property(property, &state.images))
                .collect();
            Json(json!({ "items": items })).into_response()
        }
        Err(err) => internal_error(err),
    }
}

/// Creates a new posting owned by the caller
///
/// # Response
///
/// - **201 Created** - the stored listing
/// - **400 Bad Request** - a form constraint was violated
pub async fn create_posting(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<PostingRequest>,
) -> impl IntoResponse {
    if let Err(message) = payload.validate() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response();
    }

    // Random 12-character listing id
    let id: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();

    let property = Property {
        id,
        title: payload.title,
        description: payload.description,
        price: payload.price,
        city: payload.city,
        country: payload.country,
        area: payload.area,
        bedrooms: payload.bedrooms,
        bathrooms: payload.bathrooms,
        property_type: payload.property_type,
        images: payload.images,
        user_id: user.id,
        created_at: Utc::now(),
        // Curation only; owners cannot feature their own listings.
        is_featured: false,
    };

    match state.store.insert(property.clone()).await {
        Ok(()) => (
            StatusCode::CREATED,
            Json(PropertyResponse::from_property(property, &state.images)),
        )
            .into_response(),
        Err(err) => internal_error(err),
    }
}

/// Replaces a posting; owner only
///
/// Id, owner, creation time, and the featured flag are preserved from the
/// stored listing.
pub async fn update_posting(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(payload): Json<PostingRequest>,
) -> impl IntoResponse {
    if let Err(message) = payload.validate() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response();
    }

    let existing = match state.store.get(&id).await {
        Ok(Some(property)) => property,
        Ok(None) => return not_found("Property"),
        Err(err) => return internal_error(err),
    };

    if existing.user_id != user.id {
        return forbidden("You do not have permission to edit this property");
    }

    let updated = Property {
        id: existing.id,
        title: payload.title,
        description: payload.description,
        price: payload.price,
        city: payload.city,
        country: payload.country,
        area: payload.area,
        bedrooms: payload.bedrooms,
        bathrooms: payload.bathrooms,
        property_type: payload.property_type,
        images: payload.images,
        user_id: existing.user_id,
        created_at: existing.created_at,
        is_featured: existing.is_featured,
    };

    match state.store.update(updated.clone()).await {
        Ok(()) => Json(PropertyResponse::from_property(updated, &state.images)).into_response(),
        Err(err) => internal_error(err),
    }
}

/// Deletes a posting; owner only
pub async fn delete_posting(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let existing = match state.store.get(&id).await {
        Ok(Some(property)) => property,
        Ok(None) => return not_found("Property"),
        Err(err) => return internal_error(err),
    };

    if existing.user_id != user.id {
        return forbidden("You do not have permission to delete this property");
    }

    match state.store.delete(&id).await {
        Ok(()) => Json(json!({
            "message": "Property deleted successfully",
            "deleted_id": id
        }))
        .into_response(),
        Err(err) => internal_error(err),
    }
}

/// Uploads listing images
///
/// Accepts a multipart form of up to 5 image parts and returns the stored
/// keys plus their public URLs. The keys go into the listing's `images`
/// field; the URLs are for immediate preview.
///
/// # Response
///
/// ```json
/// {
///   "keys": ["a1B2c3D4e5F6g7H8.jpg"],
///   "urls": ["http://localhost:8080/images/a1B2c3D4e5F6g7H8.jpg"]
/// }
/// ```
pub async fn upload_images(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut uploads: Vec<(Option<String>, Vec<u8>)> = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": format!("Invalid upload: {}", err) })),
                )
                    .into_response()
            }
        };

        if uploads.len() == MAX_IMAGES {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "You can upload up to 5 images only." })),
            )
                .into_response();
        }

        let file_name = field.file_name().map(str::to_string);
        match field.bytes().await {
            Ok(bytes) => uploads.push((file_name, bytes.to_vec())),
            Err(err) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": format!("Invalid upload: {}", err) })),
                )
                    .into_response()
            }
        }
    }

    let mut keys = Vec::new();
    for (file_name, bytes) in &uploads {
        match state.images.save(file_name.as_deref(), bytes).await {
            Ok(key) => keys.push(key),
            Err(err) => return internal_error(err),
        }
    }

    let urls: Vec<String> = keys.iter().map(|key| state.images.public_url(key)).collect();
    (StatusCode::CREATED, Json(json!({ "keys": keys, "urls": urls }))).into_response()
}

/// Serves a stored image
pub async fn serve_image(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    match state.images.read(&key).await {
        Ok(Some(bytes)) => (
            [(header::CONTENT_TYPE, crate::storage::ImageStore::content_type(&key))],
            bytes,
        )
            .into_response(),
        Ok(None) | Err(ImageError::InvalidKey) => not_found("Image"),
        Err(err) => internal_error(err),
    }
}
