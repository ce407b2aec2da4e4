use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Barrier;
use tower::ServiceExt;
use wallpaper_server::{
    auth::{ClerkIdentity, SessionClaims, SessionVerifier},
    config::{Config, StorageBackend},
    create_app,
    database::{MemoryDatabase, Repository},
    errors::Result,
    handlers::AppState,
    models::{NewWallpaper, User},
    services::{
        generator::{ImageGenerateParams, ImageGenerator, OpenAiGenerator},
        orders::StripeGateway,
        MetricsService,
    },
    storage::local::LocalStorage,
};
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const SESSION_SECRET: &str = "test-session-secret";
const ASSET_HOST: &str = "http://localhost:3000/assets";
const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-data";

struct TestApp {
    app: Router,
    db: Arc<MemoryDatabase>,
    upstream: MockServer,
    assets: TempDir,
}

fn session_token(user_id: &str) -> String {
    let claims = SessionClaims {
        sub: user_id.to_string(),
        exp: (Utc::now() + Duration::hours(1)).timestamp(),
        iat: Some(Utc::now().timestamp()),
        sid: Some("sess_test".to_string()),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SESSION_SECRET.as_ref())).unwrap()
}

/// Wires the app against an in-memory store, a temp asset directory and a
/// mock server standing in for the identity, model and payment APIs.
async fn spawn_app_with(generator: Option<Arc<dyn ImageGenerator>>) -> TestApp {
    let upstream = MockServer::start().await;
    let assets = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/users/user_ann"))
        .and(header("authorization", "Bearer sk_clerk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "user_ann",
            "email_addresses": [{"email_address": "ann@example.com"}],
            "first_name": "Ann",
            "image_url": "https://img.test/ann.png"
        })))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/user_nomail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "user_nomail",
            "email_addresses": [],
            "first_name": "Nobody"
        })))
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/images/generations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"url": format!("{}/oai/generated.png", upstream.uri())}]
        })))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/oai/generated.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(PNG_BYTES),
        )
        .mount(&upstream)
        .await;

    let config = Config {
        storage_backend: StorageBackend::Local,
        local_storage_dir: assets.path().to_string_lossy().to_string(),
        image_host: ASSET_HOST.to_string(),
        identity_retries: 2,
        identity_retry_backoff_ms: 1,
        ..Config::default()
    };

    let http = reqwest::Client::new();
    let db = Arc::new(MemoryDatabase::new());
    let identity = ClerkIdentity::new(
        http.clone(),
        &upstream.uri(),
        "sk_clerk",
        SessionVerifier::from_secret(SESSION_SECRET),
    );
    let generator: Arc<dyn ImageGenerator> = match generator {
        Some(generator) => generator,
        None => Arc::new(OpenAiGenerator::new(http.clone(), &upstream.uri(), "sk-openai")),
    };
    let storage = LocalStorage::new(assets.path(), ASSET_HOST).unwrap();
    let payments = StripeGateway::new(http.clone(), &upstream.uri(), "sk_stripe", "https://app.test");

    let state = AppState {
        config: Arc::new(config),
        database: db.clone(),
        identity: Arc::new(identity),
        generator,
        storage: Arc::new(storage),
        payments: Arc::new(payments),
        http,
        metrics: Arc::new(MetricsService::new().unwrap()),
    };

    TestApp {
        app: create_app(state),
        db,
        upstream,
        assets,
    }
}

async fn spawn_app() -> TestApp {
    spawn_app_with(None).await
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn seed_wallpapers(db: &MemoryDatabase, email: &str, count: usize) {
    let base = Utc::now() - Duration::hours(1);
    for i in 0..count {
        db.insert_wallpaper(&NewWallpaper {
            user_email: email.to_string(),
            img_description: format!("seed {}", i),
            img_size: "1792x1024".to_string(),
            img_url: format!("{}/wallpapers/seed%20{}.png", ASSET_HOST, i),
            llm_name: "dall-e-3".to_string(),
            llm_params: "{}".to_string(),
            created_at: base + Duration::seconds(i as i64),
        })
        .await
        .unwrap();
    }
}

async fn left_credits(app: &Router, token: &str) -> i64 {
    let (status, body) = send(app, post_json("/api/get-user-info", Some(token), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["credits"]["left_credits"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let test = spawn_app().await;

    let response = test
        .app
        .clone()
        .oneshot(Request::builder().uri("/health/live").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, body) = send(
        &test.app,
        Request::builder().uri("/health/ready").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_generate_without_session_is_unauthorized() {
    let test = spawn_app().await;

    let (status, body) = send(
        &test.app,
        post_json("/api/protected/gen-wallpaper", None, json!({"description": "sunset"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"code": -2, "message": "no auth"}));
    assert_eq!(test.db.user_count().await, 0);
    assert_eq!(test.db.wallpaper_count().await, 0);
}

#[tokio::test]
async fn test_forged_session_is_unauthorized() {
    let test = spawn_app().await;
    let forged = encode(
        &Header::default(),
        &SessionClaims {
            sub: "user_ann".to_string(),
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
            iat: None,
            sid: None,
        },
        &EncodingKey::from_secret(b"someone-else"),
    )
    .unwrap();

    let (status, _) = send(
        &test.app,
        post_json("/api/protected/gen-wallpaper", Some(&forged), json!({"description": "sunset"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_without_email_is_forbidden() {
    let test = spawn_app().await;
    let token = session_token("user_nomail");

    let (status, body) = send(&test.app, post_json("/api/get-user-info", Some(&token), json!({}))).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Email not verified");
    assert_eq!(test.db.user_count().await, 0);
}

#[tokio::test]
async fn test_generate_wallpaper_end_to_end() {
    let test = spawn_app().await;
    let token = session_token("user_ann");

    assert_eq!(left_credits(&test.app, &token).await, 3);

    let (status, body) = send(
        &test.app,
        post_json(
            "/api/protected/gen-wallpaper",
            Some(&token),
            json!({"description": "sunset over mountains"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert_eq!(body["message"], "ok");

    let wallpaper = &body["data"];
    assert_eq!(wallpaper["img_description"], "sunset over mountains");
    assert_eq!(wallpaper["img_size"], "1792x1024");
    assert_eq!(wallpaper["llm_name"], "dall-e-3");
    assert_eq!(
        wallpaper["img_url"],
        format!("{}/wallpapers/sunset%20over%20mountains.png", ASSET_HOST)
    );
    assert_eq!(wallpaper["created_user"]["email"], "ann@example.com");
    assert_eq!(wallpaper["created_user"]["nickname"], "Ann");

    let llm_params: Value = serde_json::from_str(wallpaper["llm_params"].as_str().unwrap()).unwrap();
    assert_eq!(
        llm_params["prompt"],
        "generate desktop wallpaper image about sunset over mountains"
    );

    let stored = std::fs::read(
        test.assets
            .path()
            .join("wallpapers")
            .join("sunset over mountains.png"),
    )
    .unwrap();
    assert_eq!(stored, PNG_BYTES);

    assert_eq!(left_credits(&test.app, &token).await, 2);
    assert_eq!(test.db.wallpaper_count().await, 1);
}

#[tokio::test]
async fn test_generated_asset_is_served() {
    let test = spawn_app().await;
    let token = session_token("user_ann");

    let (status, _) = send(
        &test.app,
        post_json("/api/protected/gen-wallpaper", Some(&token), json!({"description": "forest"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let response = test
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/assets/wallpapers/forest.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], PNG_BYTES);
}

#[tokio::test]
async fn test_returned_img_url_resolves_for_encoded_descriptions() {
    let test = spawn_app().await;
    let token = session_token("user_ann");

    let (status, body) = send(
        &test.app,
        post_json(
            "/api/protected/gen-wallpaper",
            Some(&token),
            json!({"description": "sunset over mountains"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let img_url = body["data"]["img_url"].as_str().unwrap();
    let asset_path = img_url.strip_prefix("http://localhost:3000").unwrap();
    assert_eq!(asset_path, "/assets/wallpapers/sunset%20over%20mountains.png");

    let response = test
        .app
        .clone()
        .oneshot(Request::builder().uri(asset_path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], PNG_BYTES);
}

#[tokio::test]
async fn test_insufficient_credits_is_business_error() {
    let test = spawn_app().await;
    let token = session_token("user_ann");
    seed_wallpapers(&test.db, "ann@example.com", 3).await;

    let (status, body) = send(
        &test.app,
        post_json("/api/protected/gen-wallpaper", Some(&token), json!({"description": "sunset"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"code": -1, "message": "credits not enough"}));
    assert_eq!(test.db.wallpaper_count().await, 3);

    let generation_calls = test
        .upstream
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/images/generations")
        .count();
    assert_eq!(generation_calls, 0);
}

#[tokio::test]
async fn test_empty_description_is_invalid() {
    let test = spawn_app().await;
    let token = session_token("user_ann");

    let (status, body) = send(
        &test.app,
        post_json("/api/protected/gen-wallpaper", Some(&token), json!({"description": ""})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"code": -1, "message": "invalid params"}));
    assert_eq!(test.db.wallpaper_count().await, 0);
}

#[tokio::test]
async fn test_generation_failure_writes_nothing() {
    let test = spawn_app().await;
    test.upstream.reset().await;
    Mock::given(method("GET"))
        .and(path("/users/user_ann"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "user_ann",
            "email_addresses": [{"email_address": "ann@example.com"}]
        })))
        .mount(&test.upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/images/generations"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model overloaded"))
        .mount(&test.upstream)
        .await;

    let token = session_token("user_ann");
    let (status, body) = send(
        &test.app,
        post_json("/api/protected/gen-wallpaper", Some(&token), json!({"description": "sunset"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], -1);
    assert_eq!(body["message"], "generate wallpaper failed");
    assert_eq!(test.db.wallpaper_count().await, 0);
}

#[tokio::test]
async fn test_gallery_pages_are_disjoint_and_newest_first() {
    let test = spawn_app().await;
    test.db
        .insert_user(&User::new("bob@example.com", "Bob", "https://img.test/bob.png"))
        .await
        .unwrap();
    seed_wallpapers(&test.db, "bob@example.com", 5).await;

    let mut seen = Vec::new();
    for page in 1..=3 {
        let (status, body) = send(
            &test.app,
            post_json("/api/get-wallpapers", None, json!({"page": page, "limit": 2})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let items = body["data"].as_array().unwrap().clone();
        assert_eq!(items.len(), if page < 3 { 2 } else { 1 });
        seen.extend(items);
    }

    let descriptions: Vec<&str> = seen
        .iter()
        .map(|w| w["img_description"].as_str().unwrap())
        .collect();
    assert_eq!(descriptions, vec!["seed 4", "seed 3", "seed 2", "seed 1", "seed 0"]);
    assert_eq!(seen[0]["created_user"]["nickname"], "Bob");

    let (_, body) = send(
        &test.app,
        post_json("/api/get-wallpapers", None, json!({"page": 4, "limit": 2})),
    )
    .await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_gallery_defaults_and_missing_owner() {
    let test = spawn_app().await;
    seed_wallpapers(&test.db, "ghost@example.com", 2).await;

    let (status, body) = send(&test.app, post_json("/api/get-wallpapers", None, json!({}))).await;

    assert_eq!(status, StatusCode::OK);
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items[0]["created_user"].is_null());
}

#[tokio::test]
async fn test_user_info_creates_user_once() {
    let test = spawn_app().await;
    let token = session_token("user_ann");

    let (status, body) = send(&test.app, post_json("/api/get-user-info", Some(&token), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "ann@example.com");
    assert_eq!(body["data"]["nickname"], "Ann");
    assert_eq!(body["data"]["credits"]["total_credits"], 3);

    send(&test.app, post_json("/api/get-user-info", Some(&token), json!({}))).await;
    assert_eq!(test.db.user_count().await, 1);
}

#[tokio::test]
async fn test_checkout_and_payment_grant_credits() {
    let test = spawn_app().await;
    let token = session_token("user_ann");
    seed_wallpapers(&test.db, "ann@example.com", 3).await;

    Mock::given(method("POST"))
        .and(path("/checkout/sessions"))
        .and(header("authorization", "Bearer sk_stripe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_1",
            "url": "https://checkout.stripe.test/cs_test_1"
        })))
        .mount(&test.upstream)
        .await;

    let (status, body) = send(
        &test.app,
        post_json(
            "/api/checkout",
            Some(&token),
            json!({"plan": "one-time", "amount": 500, "credits": 10}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["session_id"], "cs_test_1");
    let order_no = body["data"]["order_no"].as_str().unwrap().to_string();

    // Pending orders grant nothing.
    assert_eq!(left_credits(&test.app, &token).await, 0);

    Mock::given(method("GET"))
        .and(path("/checkout/sessions/cs_test_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_1",
            "metadata": {"order_no": order_no}
        })))
        .mount(&test.upstream)
        .await;

    let (status, body) = send(
        &test.app,
        post_json("/api/pay-success", None, json!({"session_id": "cs_test_1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);

    assert_eq!(left_credits(&test.app, &token).await, 10);
}

/// Holds every caller until `parties` generations are in flight.
struct BarrierGenerator {
    barrier: Barrier,
    url: String,
}

#[async_trait]
impl ImageGenerator for BarrierGenerator {
    async fn generate(&self, _params: &ImageGenerateParams) -> Result<Option<String>> {
        self.barrier.wait().await;
        Ok(Some(self.url.clone()))
    }
}

#[tokio::test]
async fn test_concurrent_requests_can_overspend_last_credit() {
    // The generator is built before the app's mock server exists.
    let source = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/race.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(PNG_BYTES),
        )
        .mount(&source)
        .await;

    let generator: Arc<dyn ImageGenerator> = Arc::new(BarrierGenerator {
        barrier: Barrier::new(2),
        url: format!("{}/race.png", source.uri()),
    });
    let test = spawn_app_with(Some(generator)).await;
    let token = session_token("user_ann");

    test.db
        .insert_user(&User::new("ann@example.com", "Ann", "https://img.test/ann.png"))
        .await
        .unwrap();
    seed_wallpapers(&test.db, "ann@example.com", 2).await;
    assert_eq!(left_credits(&test.app, &token).await, 1);

    let first = send(
        &test.app,
        post_json("/api/protected/gen-wallpaper", Some(&token), json!({"description": "race one"})),
    );
    let second = send(
        &test.app,
        post_json("/api/protected/gen-wallpaper", Some(&token), json!({"description": "race two"})),
    );
    let ((status_a, body_a), (status_b, body_b)) = tokio::join!(first, second);

    // Credits are checked, not reserved: both requests pass the check.
    assert_eq!(status_a, StatusCode::OK);
    assert_eq!(status_b, StatusCode::OK);
    assert_eq!(body_a["code"], 0);
    assert_eq!(body_b["code"], 0);
    assert_eq!(left_credits(&test.app, &token).await, -1);
}
