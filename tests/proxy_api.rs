use actix_web::{test, web, App};
use minichat_server::{configure_routes, AppState, InMemoryUserStore, LogMailer, Settings};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const IMAGE_PATH: &str = "/v1/generation/stable-diffusion-xl-1024-v1-0/text-to-image";

/// State whose providers all point at the mock server.
fn state_for(server: &MockServer, with_keys: bool) -> AppState {
    let mut config = Settings::for_test().expect("Failed to load test config");
    config.providers.openai_base_url = server.uri();
    config.providers.exchangerate_base_url = server.uri();
    config.providers.binance_base_url = server.uri();
    config.providers.stability_base_url = server.uri();
    if with_keys {
        config.providers.openai_api_key = Some("sk-chat".into());
        config.providers.exchangerate_api_key = Some("fx-key".into());
        config.providers.stability_api_key = Some("sk-img".into());
    }
    let mailer = Arc::new(LogMailer::new(&config.email));
    AppState::with_collaborators(config, Arc::new(InMemoryUserStore::new()), mailer)
        .expect("Failed to build state")
}

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .configure(configure_routes),
        )
        .await
    };
}

#[actix_web::test]
async fn test_chat_returns_reply_with_live_rates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v6/fx-key/latest/USD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "conversion_rates": { "USD": 1.0, "EUR": 0.5 }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/ticker/price"))
        .and(query_param("symbol", "BTCUSDT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "symbol": "BTCUSDT", "price": "50000"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "Rates look stable." } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = test_app!(state_for(&server, true));
    let response = test::TestRequest::post()
        .uri("/chat")
        .set_json(json!({ "prompt": "Convert 100 USD to EUR and BTC" }))
        .send_request(&app)
        .await;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = test::read_body_json(response).await;
    let reply = body["reply"].as_str().expect("reply should be a string");
    assert!(reply.starts_with("💵 Forex Rates (USD Base):\n"));
    assert!(reply.contains("| EUR | 50 |"));
    assert!(reply.contains("| BTC | 0.002 |"));
    assert!(reply.ends_with("Rates look stable."));
}

#[actix_web::test]
async fn test_chat_without_provider_keys_still_replies() {
    let server = MockServer::start().await;

    let app = test_app!(state_for(&server, false));
    let response = test::TestRequest::post()
        .uri("/chat")
        .set_json(json!({ "prompt": "Hello There" }))
        .send_request(&app)
        .await;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body, json!({ "reply": "AI fallback reply: hello there" }));
}

#[actix_web::test]
async fn test_generate_image_returns_data_uri() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(IMAGE_PATH))
        .and(header("authorization", "Bearer sk-img"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "artifacts": [{ "base64": "iVBORw0KGgo=" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = test_app!(state_for(&server, true));
    let response = test::TestRequest::post()
        .uri("/image/generate")
        .set_json(json!({ "prompt": "a lighthouse at dusk" }))
        .send_request(&app)
        .await;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body, json!({ "image_base64": "data:image/png;base64,iVBORw0KGgo=" }));
}

#[actix_web::test]
async fn test_generate_image_failure_is_reported_in_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(IMAGE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("engine overloaded"))
        .mount(&server)
        .await;

    let app = test_app!(state_for(&server, true));
    let response = test::TestRequest::post()
        .uri("/image/generate")
        .set_json(json!({ "prompt": "a lighthouse at dusk" }))
        .send_request(&app)
        .await;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = test::read_body_json(response).await;
    assert!(body.get("image_base64").is_none());
    let error = body["error"].as_str().expect("error should be a string");
    assert!(error.contains("engine overloaded"));

    // Missing key never reaches the provider
    let app = test_app!(state_for(&server, false));
    let response = test::TestRequest::post()
        .uri("/image/generate")
        .set_json(json!({ "prompt": "a lighthouse at dusk" }))
        .send_request(&app)
        .await;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body, json!({ "error": "API key not configured for stability" }));
}
