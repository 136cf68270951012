//! Integration tests for the "my postings" CRUD and image upload
//!
//! Every mutating operation is owner-scoped: another signed-in user must not
//! be able to edit or delete a listing, and a rejected operation leaves the
//! stored listing untouched.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::{NamedTempFile, TempDir};
use tower::ServiceExt;

use homefinder::config::Config;
use homefinder::database::{init_db, AppState};
use homefinder::route::create_app;

fn setup_test_app() -> (axum::Router, NamedTempFile, TempDir) {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let image_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = temp_db.path().to_str().unwrap();

    let db = init_db(db_path).expect("Failed to initialize test database");
    let config = Config {
        port: 8080,
        database_url: db_path.to_string(),
        image_dir: image_dir.path().to_path_buf(),
        public_url: "http://localhost:8080".to_string(),
        page_size: 10,
        session_ttl_hours: 24,
    };

    let state = AppState::new(db, config);
    (create_app(state), temp_db, image_dir)
}

/// Helper function to parse response body as JSON
async fn response_json(body: Body) -> Value {
    let bytes = body
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();

    serde_json::from_slice(&bytes).expect("Failed to parse JSON")
}

async fn sign_up(app: &axum::Router, email: &str) -> String {
    let payload = json!({ "email": email, "password": "secret1" });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/signup")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response.into_body()).await;
    body["token"].as_str().unwrap().to_string()
}

fn villa_body(title: &str) -> Value {
    json!({
        "title": title,
        "description": "Quiet street, close to the beach.",
        "price": 250_000,
        "city": "Bali",
        "country": "Indonesia",
        "area": 180,
        "bedrooms": 3,
        "bathrooms": 2,
        "type": "Villa",
        "images": ["abc123.jpg"]
    })
}

async fn send_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: &str,
    payload: &Value,
) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn get_detail(app: &axum::Router, id: &str) -> Value {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/api/properties/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response_json(response.into_body()).await
}

#[tokio::test]
async fn test_create_posting() {
    let (app, _db, _images) = setup_test_app();
    let token = sign_up(&app, "owner@example.com").await;

    let response = send_json(&app, "POST", "/api/postings", &token, &villa_body("Beach Villa")).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response_json(response.into_body()).await;
    assert_eq!(body["title"], "Beach Villa");
    assert_eq!(body["type"], "Villa");
    assert_eq!(body["images"], json!(["abc123.jpg"]));
    // Image keys come back resolved for display.
    assert_eq!(
        body["image_urls"],
        json!(["http://localhost:8080/images/abc123.jpg"])
    );
    assert_eq!(body["is_featured"], false);
    assert!(!body["id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_requires_session() {
    let (app, _db, _images) = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/postings")
                .header("content-type", "application/json")
                .body(Body::from(villa_body("Beach Villa").to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_validates_the_form_constraints() {
    let (app, _db, _images) = setup_test_app();
    let token = sign_up(&app, "owner@example.com").await;

    let mut body = villa_body("Cheap");
    body["price"] = json!(500);
    let response = send_json(&app, "POST", "/api/postings", &token, &body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["error"], "Price must be at least 1000");

    let mut body = villa_body("Too many images");
    body["images"] = json!(["1.jpg", "2.jpg", "3.jpg", "4.jpg", "5.jpg", "6.jpg"]);
    let response = send_json(&app, "POST", "/api/postings", &token, &body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["error"], "You can upload up to 5 images only.");

    let mut body = villa_body("");
    body["title"] = json!("   ");
    let response = send_json(&app, "POST", "/api/postings", &token, &body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["error"], "Title is required");
}

#[tokio::test]
async fn test_my_postings_lists_only_own_listings_newest_first() {
    let (app, _db, _images) = setup_test_app();
    let owner = sign_up(&app, "owner@example.com").await;
    let other = sign_up(&app, "other@example.com").await;

    send_json(&app, "POST", "/api/postings", &owner, &villa_body("First")).await;
    send_json(&app, "POST", "/api/postings", &owner, &villa_body("Second")).await;
    send_json(&app, "POST", "/api/postings", &other, &villa_body("Foreign")).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/postings")
                .header("Authorization", format!("Bearer {}", owner))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response.into_body()).await;
    let titles: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Second", "First"]);
}

#[tokio::test]
async fn test_update_is_owner_only() {
    let (app, _db, _images) = setup_test_app();
    let owner = sign_up(&app, "owner@example.com").await;
    let other = sign_up(&app, "other@example.com").await;

    let response = send_json(&app, "POST", "/api/postings", &owner, &villa_body("Beach Villa")).await;
    let id = response_json(response.into_body()).await["id"]
        .as_str()
        .unwrap()
        .to_string();

    // A different signed-in user cannot edit it...
    let mut hijack = villa_body("Hijacked");
    hijack["price"] = json!(1_000);
    let response = send_json(&app, "PUT", &format!("/api/postings/{}", id), &other, &hijack).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["error"], "You do not have permission to edit this property");

    // ...and the listing is untouched.
    let detail = get_detail(&app, &id).await;
    assert_eq!(detail["title"], "Beach Villa");
    assert_eq!(detail["price"], 250_000);

    // The owner can.
    let mut update = villa_body("Beach Villa, renovated");
    update["price"] = json!(275_000);
    let response = send_json(&app, "PUT", &format!("/api/postings/{}", id), &owner, &update).await;
    assert_eq!(response.status(), StatusCode::OK);

    let detail = get_detail(&app, &id).await;
    assert_eq!(detail["title"], "Beach Villa, renovated");
    assert_eq!(detail["price"], 275_000);

    // Unknown listing id
    let response = send_json(&app, "PUT", "/api/postings/missing", &owner, &update).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_is_owner_only() {
    let (app, _db, _images) = setup_test_app();
    let owner = sign_up(&app, "owner@example.com").await;
    let other = sign_up(&app, "other@example.com").await;

    let response = send_json(&app, "POST", "/api/postings", &owner, &villa_body("Beach Villa")).await;
    let id = response_json(response.into_body()).await["id"]
        .as_str()
        .unwrap()
        .to_string();

    let delete = |token: String, id: String| {
        let app = app.clone();
        async move {
            app.oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/postings/{}", id))
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
        }
    };

    let response = delete(other.clone(), id.clone()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["error"], "You do not have permission to delete this property");

    // Still there.
    get_detail(&app, &id).await;

    let response = delete(owner.clone(), id.clone()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["deleted_id"], id.as_str());

    // Gone from the detail route and from search results.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/api/properties/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = delete(owner, "missing".to_string()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

fn multipart_body(parts: usize) -> (String, String) {
    let boundary = "homefinder-test-boundary".to_string();
    let mut body = String::new();
    for i in 0..parts {
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"house{}.jpg\"\r\nContent-Type: image/jpeg\r\n\r\nFAKEJPEG{}\r\n",
            boundary, i, i
        ));
    }
    body.push_str(&format!("--{}--\r\n", boundary));
    (boundary, body)
}

#[tokio::test]
async fn test_image_upload_and_delivery() {
    let (app, _db, _images) = setup_test_app();
    let token = sign_up(&app, "owner@example.com").await;

    let (boundary, body) = multipart_body(2);
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/images")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={}", boundary),
                )
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response_json(response.into_body()).await;
    let keys = body["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 2);

    let key = keys[0].as_str().unwrap();
    assert!(key.ends_with(".jpg"));

    // The uploaded bytes come back from the public image route.
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/images/{}", key))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/jpeg"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..8], b"FAKEJPEG");
}

#[tokio::test]
async fn test_image_upload_caps_at_five() {
    let (app, _db, _images) = setup_test_app();
    let token = sign_up(&app, "owner@example.com").await;

    let (boundary, body) = multipart_body(6);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/images")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={}", boundary),
                )
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["error"], "You can upload up to 5 images only.");
}

#[tokio::test]
async fn test_unknown_image_is_not_found() {
    let (app, _db, _images) = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/images/missing.jpg")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
