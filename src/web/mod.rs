//! HTTP surface: the studio page and the two JSON boundaries.

use std::num::NonZeroU16;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::RwLock;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::UpstreamConfig;
use crate::constants::MAX_REQUEST_BODY_BYTES;
use crate::error::MonkeyGenError;
use crate::openai::OpenAiClient;
use crate::orchestrator::Orchestrator;
use crate::studio::{Studio, StudioSettings, drive_run};

mod api;
pub(crate) mod flash;
mod prelude;
mod views;

use flash::FlashMessage;

#[derive(Clone)]
pub(crate) struct AppState {
    studio: Arc<RwLock<Studio>>,
    flash: Arc<RwLock<Option<FlashMessage>>>,
    orchestrator: Orchestrator,
    configured: bool,
    seed: Option<u64>,
}

impl AppState {
    pub(crate) fn new(orchestrator: Orchestrator, configured: bool, seed: Option<u64>) -> Self {
        Self {
            studio: Arc::new(RwLock::new(Studio::new())),
            flash: Arc::new(RwLock::new(None)),
            orchestrator,
            configured,
            seed,
        }
    }

    pub(crate) fn ensure_configured(&self) -> Result<(), MonkeyGenError> {
        if self.configured {
            Ok(())
        } else {
            Err(MonkeyGenError::NotConfigured)
        }
    }

    fn rng_for(&self, run_id: u64) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(run_id)),
            None => StdRng::seed_from_u64(rand::random()),
        }
    }

    /// Starts a background run and returns its id.
    pub(crate) async fn start_run(&self, settings: StudioSettings) -> Result<u64, MonkeyGenError> {
        let ticket = self.studio.write().await.begin_run(settings)?;
        let run_id = ticket.run_id;
        tokio::spawn(drive_run(
            self.studio.clone(),
            self.orchestrator.clone(),
            ticket,
            self.rng_for(run_id),
        ));
        Ok(run_id)
    }
}

fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(views::index_handler))
        .route("/static/styles.css", get(styles_handler))
        .route("/api/analyze", post(api::analyze_handler))
        .route("/api/generate", post(api::generate_handler))
        .route("/studio/image", post(views::upload_image_handler))
        .route("/studio/run", post(views::start_run_handler))
        .route("/studio/progress", get(views::progress_handler))
        .route("/studio/base-image", get(views::base_image_handler))
        .route(
            "/studio/outcomes/{index}/image",
            get(views::outcome_image_handler),
        )
        .route(
            "/studio/outcomes/{index}/download",
            get(views::outcome_download_handler),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
}

async fn styles_handler() -> impl IntoResponse {
    const STYLES: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/static/styles.css"));
    ([(CONTENT_TYPE, "text/css")], STYLES)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Builds the app around an OpenAI client and serves it until ctrl-c.
pub async fn setup_server(
    listen_addr: &str,
    port: NonZeroU16,
    upstream: UpstreamConfig,
    seed: Option<u64>,
) -> Result<(), anyhow::Error> {
    let configured = upstream.api_key.is_some();
    if !configured {
        warn!("OPENAI_API_KEY is not set, generation requests will fail");
    }
    info!("Upstream: {:?}", upstream);
    let client = Arc::new(OpenAiClient::new(upstream));
    let orchestrator = Orchestrator::new(client.clone(), client);
    let app = create_router().with_state(AppState::new(orchestrator, configured, seed));

    let addr = format!("{}:{}", listen_addr, port);
    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use axum::body::Body;
    use axum::http::header::{CONTENT_DISPOSITION, LOCATION};
    use axum::http::{Request, StatusCode};
    use base64::Engine;
    use base64::engine::general_purpose;
    use http_body_util::BodyExt;
    use image::ImageFormat;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::base_image::tests::sample_image_bytes;
    use crate::constants::{MAX_BASE_IMAGE_BYTES, TEST_STYLE};
    use crate::orchestrator::RunPhase;
    use crate::orchestrator::tests::{FakeAnalyzer, FakeGenerator};

    const BOUNDARY: &str = "monkeygen-test-boundary";

    fn test_state(generator: Arc<FakeGenerator>) -> AppState {
        AppState::new(
            Orchestrator::new(FakeAnalyzer::ok(TEST_STYLE), generator),
            true,
            Some(7),
        )
    }

    /// Generator that answers with a hosted image.
    struct HostedGenerator;

    #[async_trait::async_trait]
    impl crate::orchestrator::ImageGenerator for HostedGenerator {
        async fn generate_image(
            &self,
            _request: &crate::orchestrator::GenerationRequest<'_>,
        ) -> Result<crate::gallery::GeneratedImage, MonkeyGenError> {
            Ok(crate::gallery::GeneratedImage::Remote(
                url::Url::parse("https://cdn.example.com/nft-1.png").expect("url"),
            ))
        }
    }

    fn png_base64() -> String {
        general_purpose::STANDARD.encode(sample_image_bytes(ImageFormat::Png))
    }

    async fn read_body(response: axum::response::Response) -> String {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        String::from_utf8_lossy(&bytes).to_string()
    }

    async fn read_json(response: axum::response::Response) -> Value {
        serde_json::from_str(&read_body(response).await).expect("json body")
    }

    fn json_request(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    fn upload_request(content_type: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"monkey\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri("/studio/image")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request")
    }

    fn run_request(form: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/studio/run")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .expect("request")
    }

    async fn wait_for_run(state: &AppState) {
        for _ in 0..500 {
            if !state.studio.read().await.phase().is_active() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(
            !state.studio.read().await.phase().is_active(),
            "run did not finish"
        );
    }

    #[tokio::test]
    async fn analyze_reports_missing_key_before_anything_else() {
        let state = AppState::new(
            Orchestrator::new(FakeAnalyzer::ok(TEST_STYLE), FakeGenerator::ok()),
            false,
            None,
        );
        let app = create_router().with_state(state);

        let response = app
            .oneshot(json_request("/api/analyze", json!({})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert_eq!(
            body["error"],
            "OPENAI_API_KEY not set in environment variables"
        );
    }

    #[tokio::test]
    async fn analyze_without_image_is_a_client_error() {
        let app = create_router().with_state(test_state(FakeGenerator::ok()));
        let response = app
            .oneshot(json_request("/api/analyze", json!({"mimeType": "image/png"})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await["error"], "No image provided");
    }

    #[tokio::test]
    async fn analyze_returns_style_description() {
        let app = create_router().with_state(test_state(FakeGenerator::ok()));
        let response = app
            .oneshot(json_request(
                "/api/analyze",
                json!({"imageBase64": png_base64(), "mimeType": "image/png"}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["styleDescription"], TEST_STYLE);
    }

    #[tokio::test]
    async fn generate_needs_image_and_prompt() {
        let generator = FakeGenerator::ok();
        let app = create_router().with_state(test_state(generator.clone()));
        let response = app
            .oneshot(json_request(
                "/api/generate",
                json!({"imageBase64": png_base64(), "prompt": "   "}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            read_json(response).await["error"],
            "Missing imageBase64 or prompt"
        );
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn generate_returns_base64_payload() {
        let generator = FakeGenerator::ok();
        let app = create_router().with_state(test_state(generator.clone()));
        let response = app
            .oneshot(json_request(
                "/api/generate",
                json!({"imageBase64": png_base64(), "mimeType": "image/png", "prompt": "a monkey"}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body, json!({"b64": general_purpose::STANDARD.encode([1u8])}));
        assert_eq!(generator.prompts(), vec!["a monkey".to_string()]);
    }

    #[tokio::test]
    async fn generate_maps_rate_limit_to_429() {
        let generator = FakeGenerator::failing_on(vec![(1, MonkeyGenError::RateLimited)]);
        let app = create_router().with_state(test_state(generator));
        let response = app
            .oneshot(json_request(
                "/api/generate",
                json!({"imageBase64": png_base64(), "prompt": "a monkey"}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = read_json(response).await;
        assert!(
            body["error"]
                .as_str()
                .unwrap_or_default()
                .contains("wait a moment")
        );
    }

    #[tokio::test]
    async fn generate_passes_hosted_images_through_as_url() {
        let state = AppState::new(
            Orchestrator::new(FakeAnalyzer::ok(TEST_STYLE), Arc::new(HostedGenerator)),
            true,
            None,
        );
        let app = create_router().with_state(state);
        let response = app
            .oneshot(json_request(
                "/api/generate",
                json!({"imageBase64": png_base64(), "prompt": "a monkey"}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            read_json(response).await,
            json!({"url": "https://cdn.example.com/nft-1.png"})
        );
    }

    #[tokio::test]
    async fn oversized_image_is_rejected_with_413() {
        let analyzer = FakeAnalyzer::ok(TEST_STYLE);
        let state = AppState::new(
            Orchestrator::new(analyzer.clone(), FakeGenerator::ok()),
            true,
            None,
        );
        let app = create_router().with_state(state);
        let oversized = general_purpose::STANDARD.encode(vec![0u8; MAX_BASE_IMAGE_BYTES + 1]);
        let response = app
            .oneshot(json_request(
                "/api/analyze",
                json!({"imageBase64": oversized, "mimeType": "image/png"}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(read_json(response).await["error"], "Image is larger than 5MB");
        assert_eq!(analyzer.calls(), 0);
    }

    #[tokio::test]
    async fn unsupported_media_type_is_rejected_with_415() {
        let generator = FakeGenerator::ok();
        let app = create_router().with_state(test_state(generator.clone()));
        let response = app
            .oneshot(json_request(
                "/api/generate",
                json!({"imageBase64": png_base64(), "mimeType": "image/gif", "prompt": "a monkey"}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let body = read_json(response).await;
        assert!(
            body["error"]
                .as_str()
                .unwrap_or_default()
                .starts_with("Unsupported image type image/gif")
        );
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn studio_page_lists_traits_and_counts() {
        let app = create_router().with_state(test_state(FakeGenerator::ok()));
        let response = app.oneshot(get_request("/")).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_body(response).await;
        assert!(body.contains("MonkeyGen"));
        assert!(body.contains("name=\"trait\" value=\"hat\""));
        assert!(body.contains("value=\"20\""));
        assert!(body.contains("0.13"));
    }

    #[tokio::test]
    async fn rejected_upload_shows_up_as_flash() {
        let state = test_state(FakeGenerator::ok());
        let app = create_router().with_state(state.clone());

        let response = app
            .clone()
            .oneshot(upload_request("image/gif", b"GIF89a"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(state.studio.read().await.base_image().is_none());

        let body = read_body(app.oneshot(get_request("/")).await.expect("response")).await;
        assert!(body.contains("Unsupported image type"));
    }

    #[tokio::test]
    async fn run_without_image_is_refused() {
        let state = test_state(FakeGenerator::ok());
        let app = create_router().with_state(state.clone());
        let response = app
            .clone()
            .oneshot(run_request("count=3&trait=hat"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(state.studio.read().await.run_id(), 0);

        let body = read_body(app.oneshot(get_request("/")).await.expect("response")).await;
        assert!(body.contains("Upload a base image first"));
    }

    #[tokio::test]
    async fn studio_run_end_to_end() {
        let generator = FakeGenerator::failing_on(vec![(2, MonkeyGenError::ContentPolicy)]);
        let state = test_state(generator.clone());
        let app = create_router().with_state(state.clone());

        let response = app
            .clone()
            .oneshot(upload_request(
                "image/png",
                &sample_image_bytes(ImageFormat::Png),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = app
            .clone()
            .oneshot(run_request(
                "count=3&trait=background&trait=hat&extra_prompt=neon+glow",
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        wait_for_run(&state).await;

        let progress = read_json(
            app.clone()
                .oneshot(get_request("/studio/progress"))
                .await
                .expect("response"),
        )
        .await;
        assert_eq!(progress["phase"], "completed");
        assert_eq!(progress["progress"]["completed"], 3);
        assert_eq!(progress["progress"]["status"], "Done!");
        assert_eq!(progress["succeeded"], 2);
        assert_eq!(progress["styleDescription"], TEST_STYLE);
        assert_eq!(progress["outcomes"][1]["state"], "failed");
        assert!(generator.prompts().iter().all(|p| p.contains("neon glow")));

        let response = app
            .clone()
            .oneshot(get_request("/studio/outcomes/3/download"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_DISPOSITION).expect("header"),
            "attachment; filename=\"nft-003.png\""
        );

        let response = app
            .clone()
            .oneshot(get_request("/studio/outcomes/2/image"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = read_body(app.oneshot(get_request("/")).await.expect("response")).await;
        assert!(body.contains("nft-001.png"));
        assert!(body.contains(TEST_STYLE));
        assert!(body.contains("href=\"/studio/outcomes/1/image?run=1\""));
        assert!(body.contains(">View</a>"));
        assert!(body.contains("Additional style: neon glow."));
    }

    #[tokio::test]
    async fn aborted_run_leaves_no_pending_slots() {
        let state = AppState::new(
            Orchestrator::new(
                FakeAnalyzer::failing(MonkeyGenError::Upstream("vision down".to_string())),
                FakeGenerator::ok(),
            ),
            true,
            Some(7),
        );
        let app = create_router().with_state(state.clone());

        let response = app
            .clone()
            .oneshot(upload_request(
                "image/png",
                &sample_image_bytes(ImageFormat::Png),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let response = app
            .clone()
            .oneshot(run_request("count=5&trait=hat"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        wait_for_run(&state).await;
        assert!(matches!(
            state.studio.read().await.phase(),
            RunPhase::Failed(_)
        ));

        let body = read_body(app.oneshot(get_request("/")).await.expect("response")).await;
        assert!(body.contains("vision down"));
        assert!(!body.contains("placeholder pending"));
        assert!(!body.contains("class=\"slot"));
    }

    #[tokio::test]
    async fn remote_outcome_redirects() {
        let state = test_state(FakeGenerator::ok());
        {
            let mut studio = state.studio.write().await;
            studio
                .load_image(crate::base_image::tests::sample_png())
                .expect("load");
            let ticket = studio
                .begin_run(StudioSettings {
                    count: 1,
                    ..StudioSettings::default()
                })
                .expect("ticket");
            studio.apply(
                ticket.run_id,
                crate::studio::RunUpdate::Outcome {
                    outcome: crate::gallery::VariationOutcome {
                        index: 1,
                        image: Some(crate::gallery::GeneratedImage::Remote(
                            url::Url::parse("https://cdn.example.com/nft.png").expect("url"),
                        )),
                        prompt: "p".to_string(),
                    },
                    progress: crate::gallery::ProgressState::default(),
                    phase: RunPhase::Completed,
                },
            );
        }
        let app = create_router().with_state(state);
        let response = app
            .oneshot(get_request("/studio/outcomes/1/download"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers().get(LOCATION).expect("location"),
            "https://cdn.example.com/nft.png"
        );
    }

    #[tokio::test]
    async fn styles_are_served() {
        let app = create_router().with_state(test_state(FakeGenerator::ok()));
        let response = app
            .oneshot(get_request("/static/styles.css"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).expect("content type"),
            "text/css"
        );
    }
}
