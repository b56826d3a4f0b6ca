//! HTTP surface tests
//!
//! Drive the full router over the in-memory store: authentication, role
//! gating and the error taxonomy as seen by a client.

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use shared::role_ids;
use tower::ServiceExt;

use common::*;
use vineyard_backend::config::BootstrapConfig;
use vineyard_backend::services::AuthService;
use vineyard_backend::{create_app, AppState};

struct TestApp {
    router: Router,
    auth: AuthService,
}

impl TestApp {
    async fn new() -> Self {
        let storage = memory_storage();
        let mut config = test_config();
        config.bootstrap = BootstrapConfig {
            admin_identifier: Some("admin".to_string()),
            admin_secret: Some("admin-secret".to_string()),
            admin_email: None,
        };

        let auth = AuthService::new(storage.clone(), &config.jwt);
        auth.bootstrap_admin(&config.bootstrap).await.unwrap();

        Self {
            router: create_app(AppState::new(storage, config)),
            auth,
        }
    }

    fn token_for(&self, role: i32) -> String {
        self.auth.issue_token("tester", &[role]).unwrap()
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }
}

fn parcel_body(name: &str) -> Value {
    json!({
        "name": name,
        "location_description": "Colchagua",
        "longitude": "-71.2",
        "latitude": "-33.4"
    })
}

fn dimensions_body() -> Value {
    json!({ "surface": "1000", "length": "50", "width": "20", "slope": "5" })
}

fn soil_body() -> Value {
    json!({ "ph": "6.5", "humidity": "40", "temperature": "18" })
}

fn planting_body(parcel_id: &str) -> Value {
    json!({
        "parcel_id": parcel_id,
        "planting_date": "2024-09-15",
        "plant_count": 500,
        "technique": "trellis"
    })
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;
    let (status, _) = app.send(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_and_me() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "identifier": "admin", "secret": "admin-secret" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, me) = app
        .send(Method::GET, "/api/v1/auth/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["identifier"], "admin");
    assert_eq!(me["roles"], json!([role_ids::ADMIN]));

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "identifier": "admin", "secret": "wrong-secret" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_missing_and_invalid_tokens() {
    let app = TestApp::new().await;

    let (status, _) = app.send(Method::GET, "/api/v1/parcels", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(Method::GET, "/api/v1/parcels", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_role_gating() {
    let app = TestApp::new().await;
    let auditor = app.token_for(role_ids::AUDITOR);
    let manager = app.token_for(role_ids::FIELD_MANAGER);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/parcels",
            Some(&auditor),
            Some(parcel_body("Lot-7")),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_PERMISSIONS");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/parcels",
            Some(&manager),
            Some(parcel_body("Lot-7")),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Any role may read
    let (status, body) = app
        .send(Method::GET, "/api/v1/parcels", Some(&auditor), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["parcels"].as_array().unwrap().len(), 1);

    // Field managers cannot define grape types
    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/grape-types",
            Some(&manager),
            Some(json!({
                "name": "Carmenere",
                "ph": { "min": "5.5", "max": "7" },
                "humidity": { "min": "30", "max": "60" },
                "temperature": { "min": "10", "max": "30" },
                "harvest_duration_days": 180
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_register_requires_admin() {
    let app = TestApp::new().await;
    let admin = app.token_for(role_ids::ADMIN);
    let agronomist = app.token_for(role_ids::AGRONOMIST);

    let new_account = json!({
        "identifier": "agro1",
        "secret": "vines-and-roots",
        "first_name": "Ana",
        "last_name": "Rojas",
        "email": "ana@example.com",
        "roles": [role_ids::AGRONOMIST]
    });

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/auth/register",
            Some(&agronomist),
            Some(new_account.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/auth/register",
            Some(&admin),
            Some(new_account),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["roles"], json!([role_ids::AGRONOMIST]));

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "identifier": "agro1", "secret": "vines-and-roots" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_parcel_workflow_error_taxonomy() {
    let app = TestApp::new().await;
    let admin = app.token_for(role_ids::ADMIN);

    let (status, parcel) = app
        .send(
            Method::POST,
            "/api/v1/parcels",
            Some(&admin),
            Some(parcel_body("Lot-7")),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let parcel_id = parcel["id"].as_str().unwrap().to_string();

    // Duplicate name
    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/parcels",
            Some(&admin),
            Some(parcel_body("LOT-7")),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["field"], "name");

    // Soil control before dimensions
    let soil_uri = format!("/api/v1/parcels/{}/soil-controls", parcel_id);
    let (status, body) = app
        .send(Method::POST, &soil_uri, Some(&admin), Some(soil_body()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "PREREQUISITE_FAILED");

    let dims_uri = format!("/api/v1/parcels/{}/dimensions", parcel_id);
    let (status, _) = app
        .send(Method::POST, &dims_uri, Some(&admin), Some(dimensions_body()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app
        .send(Method::POST, &soil_uri, Some(&admin), Some(soil_body()))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, planting) = app
        .send(
            Method::POST,
            "/api/v1/plantings",
            Some(&admin),
            Some(planting_body(&parcel_id)),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(planting["state"], "active");

    // Second planting on the same parcel
    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/plantings",
            Some(&admin),
            Some(planting_body(&parcel_id)),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "PREREQUISITE_FAILED");

    // Dimensions are locked while the planting is active
    let (status, body) = app
        .send(Method::POST, &dims_uri, Some(&admin), Some(dimensions_body()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "PREREQUISITE_FAILED");

    let (status, active) = app
        .send(
            Method::GET,
            &format!("/api/v1/parcels/{}/plantings/active", parcel_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(active["id"], planting["id"]);

    let (status, view) = app
        .send(
            Method::GET,
            &format!("/api/v1/parcels/{}", parcel_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["name"], "Lot-7");
    assert!(view["current_dimensions"].is_object());
    assert!(view["planting"].is_object());
}

#[tokio::test]
async fn test_malformed_bodies_are_validation_errors() {
    let app = TestApp::new().await;
    let admin = app.token_for(role_ids::ADMIN);
    let parcel_id = uuid::Uuid::new_v4().to_string();

    let mut missing_date = planting_body(&parcel_id);
    missing_date.as_object_mut().unwrap().remove("planting_date");
    let (status, body) = app
        .send(Method::POST, "/api/v1/plantings", Some(&admin), Some(missing_date))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let mut wrong_type = planting_body(&parcel_id);
    wrong_type["plant_count"] = json!("x");
    let (status, body) = app
        .send(Method::POST, "/api/v1/plantings", Some(&admin), Some(wrong_type))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "identifier": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_role_checked_before_body() {
    let app = TestApp::new().await;
    let auditor = app.token_for(role_ids::AUDITOR);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/plantings",
            Some(&auditor),
            Some(json!({ "plant_count": "x" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_PERMISSIONS");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/parcels",
            Some(&auditor),
            Some(json!({ "name": 7 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_login_trims_identifier() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "identifier": "  admin ", "secret": "admin-secret" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["identifier"], "admin");
}

#[tokio::test]
async fn test_not_found_responses() {
    let app = TestApp::new().await;
    let admin = app.token_for(role_ids::ADMIN);

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/v1/parcels/{}", uuid::Uuid::new_v4()),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = app.send(Method::GET, "/api/v1/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
