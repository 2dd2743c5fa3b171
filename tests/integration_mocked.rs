/// Integration tests with mocked external APIs
/// Tests notifiers, the verification workflow and the HTTP routes without real mail/SMS gateways
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use moka::future::Cache;
use rust_kyc_api::api::errors::AppError;
use rust_kyc_api::api::handlers::{self, AppState};
use rust_kyc_api::config::{EmailRelayConfig, SmsConfig};
use rust_kyc_api::core::models::{
    DeepfakeMetrics, FaceSignal, FinalStatus, KycQuery, KycRecord, KycVerificationRequest,
};
use rust_kyc_api::core::verification::verify_and_record_workflow;
use rust_kyc_api::integrations::notify::{EmailNotifier, Notifier, SmsNotifier};
use rust_kyc_api::integrations::storage::{KycStore, MemoryKycStore};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper: email relay config pointing at the mock server
fn email_config(base_url: &str) -> EmailRelayConfig {
    EmailRelayConfig {
        url: format!("{}/send", base_url),
        token: "relay-token".to_string(),
        from: "kyc@example.com".to_string(),
    }
}

fn sms_config(base_url: &str) -> SmsConfig {
    SmsConfig {
        account_sid: "AC123".to_string(),
        auth_token: "secret".to_string(),
        from_number: "+15005550006".to_string(),
        base_url: base_url.to_string(),
    }
}

fn verified_request() -> KycVerificationRequest {
    KycVerificationRequest {
        email: "user@example.com".to_string(),
        phone: None,
        id_document_text: "GOVERNMENT OF INDIA\nDOB: 15/08/1990\nMale\n1234 5678 9012"
            .to_string(),
        tax_document_text: "INCOME TAX DEPARTMENT\nABCDE1234F".to_string(),
        selfie_text: String::new(),
        selfie_has_face: true,
        face: Some(FaceSignal::from_cosine(0.8, 0.6)),
        metrics: DeepfakeMetrics {
            sharpness: 200.0,
            noise_level: 25.0,
            artifact_score: 8.0,
            consistency_score: 1.0,
            color_variance: 45.0,
        },
    }
}

fn swapped_request() -> KycVerificationRequest {
    KycVerificationRequest {
        tax_document_text: String::new(),
        selfie_text: "INCOME TAX DEPARTMENT ABCDE1234F".to_string(),
        ..verified_request()
    }
}

fn app_state(store: Arc<dyn KycStore>, notifiers: Vec<Arc<dyn Notifier>>) -> Arc<AppState> {
    Arc::new(AppState {
        store,
        notifiers,
        recent_verifications: Cache::builder().max_capacity(100).build(),
    })
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .merge(handlers::api_routes())
        .with_state(state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

struct BrokenStore;

#[async_trait]
impl KycStore for BrokenStore {
    async fn insert(&self, _record: &KycRecord) -> Result<Uuid, AppError> {
        Err(AppError::InternalError("disk full".to_string()))
    }

    async fn find(&self, _query: &KycQuery) -> Result<Option<KycRecord>, AppError> {
        Ok(None)
    }
}

/// Memory store whose inserts take a while, so concurrent requests overlap.
#[derive(Default)]
struct SlowStore {
    inner: MemoryKycStore,
}

#[async_trait]
impl KycStore for SlowStore {
    async fn insert(&self, record: &KycRecord) -> Result<Uuid, AppError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.inner.insert(record).await
    }

    async fn find(&self, query: &KycQuery) -> Result<Option<KycRecord>, AppError> {
        self.inner.find(query).await
    }
}

#[tokio::test]
async fn test_email_notifier_posts_to_relay() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/send"))
        .and(header("authorization", "Bearer relay-token"))
        .and(body_partial_json(serde_json::json!({
            "from": "kyc@example.com",
            "to": "user@example.com",
            "subject": "Your KYC Verification Report"
        })))
        .and(body_string_contains("Final status: VERIFIED"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&mock_server)
        .await;

    let state = app_state(Arc::new(MemoryKycStore::new()), Vec::new());
    let response = verify_and_record_workflow(&state, &verified_request())
        .await
        .unwrap();

    let notifier = EmailNotifier::new(Some(email_config(&mock_server.uri()))).unwrap();
    let outcome = notifier.send(&response).await;

    assert!(outcome.sent);
    assert_eq!(outcome.channel, "email");
}

#[tokio::test]
async fn test_email_relay_error_is_reported_not_raised() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(500).set_body_string("relay down"))
        .mount(&mock_server)
        .await;

    let state = app_state(Arc::new(MemoryKycStore::new()), Vec::new());
    let response = verify_and_record_workflow(&state, &verified_request())
        .await
        .unwrap();

    let notifier = EmailNotifier::new(Some(email_config(&mock_server.uri()))).unwrap();
    let outcome = notifier.send(&response).await;

    assert!(!outcome.sent);
    assert!(outcome.detail.unwrap().contains("Email relay returned 500"));
}

#[tokio::test]
async fn test_sms_notifier_posts_to_twilio() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
        .and(body_string_contains("To=%2B919876543210"))
        .and(body_string_contains("Body=KYC+Verification+Complete"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(serde_json::json!({ "sid": "SM123" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = KycVerificationRequest {
        phone: Some("98765 43210".to_string()),
        ..verified_request()
    };
    let state = app_state(Arc::new(MemoryKycStore::new()), Vec::new());
    let response = verify_and_record_workflow(&state, &request).await.unwrap();

    let notifier = SmsNotifier::new(Some(sms_config(&mock_server.uri()))).unwrap();
    assert!(notifier.applies_to(&response));
    let outcome = notifier.send(&response).await;

    assert!(outcome.sent);
    assert_eq!(outcome.detail.as_deref(), Some("SMS sent to +919876543210"));
}

#[tokio::test]
async fn test_workflow_stores_notifies_and_dedupes_resubmission() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryKycStore::new());
    let notifiers: Vec<Arc<dyn Notifier>> = vec![
        Arc::new(EmailNotifier::new(Some(email_config(&mock_server.uri()))).unwrap()),
        Arc::new(SmsNotifier::new(None).unwrap()),
    ];
    let state = app_state(store.clone(), notifiers);

    let first = verify_and_record_workflow(&state, &verified_request())
        .await
        .unwrap();
    assert_eq!(first.final_status, FinalStatus::Verified);
    assert!(first.stored);
    // No phone given, so only the email channel is attempted.
    assert_eq!(first.notifications.len(), 1);
    assert!(first.notifications[0].sent);

    let second = verify_and_record_workflow(&state, &verified_request())
        .await
        .unwrap();
    assert_eq!(second.verification_id, first.verification_id);
    assert_eq!(store.len().await, 1);

    let record = store
        .find(&KycQuery::by_email("user@example.com"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.id, first.verification_id);
    assert_eq!(record.tax_id.as_deref(), Some("ABCDE1234F"));
}

#[tokio::test]
async fn test_concurrent_identical_requests_record_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(SlowStore::default());
    let notifiers: Vec<Arc<dyn Notifier>> = vec![Arc::new(
        EmailNotifier::new(Some(email_config(&mock_server.uri()))).unwrap(),
    )];
    let state = app_state(store.clone(), notifiers);

    let request = verified_request();
    let (first, second) = tokio::join!(
        verify_and_record_workflow(&state, &request),
        verify_and_record_workflow(&state, &request)
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(first.verification_id, second.verification_id);
    assert!(first.stored && second.stored);
    assert_eq!(store.inner.len().await, 1);
}

#[tokio::test]
async fn test_workflow_rejects_swapped_uploads_without_side_effects() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryKycStore::new());
    let notifiers: Vec<Arc<dyn Notifier>> = vec![Arc::new(
        EmailNotifier::new(Some(email_config(&mock_server.uri()))).unwrap(),
    )];
    let state = app_state(store.clone(), notifiers);

    let result = verify_and_record_workflow(&state, &swapped_request()).await;

    match result {
        Err(AppError::SlotMismatch(issues)) => assert_eq!(issues.len(), 2),
        other => panic!("Expected slot mismatch, got {:?}", other),
    }
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_storage_failure_does_not_fail_verification() {
    let state = app_state(Arc::new(BrokenStore), Vec::new());

    let response = verify_and_record_workflow(&state, &verified_request())
        .await
        .unwrap();

    assert!(!response.stored);
    assert_eq!(response.final_status, FinalStatus::Verified);
}

#[tokio::test]
async fn test_deepfake_selfie_is_rejected_and_recorded() {
    let store = Arc::new(MemoryKycStore::new());
    let state = app_state(store.clone(), Vec::new());
    let request = KycVerificationRequest {
        metrics: DeepfakeMetrics::default(),
        ..verified_request()
    };

    let response = verify_and_record_workflow(&state, &request).await.unwrap();

    assert_eq!(response.final_status, FinalStatus::RejectedDeepfake);
    assert!(response.deepfake_analysis.is_deepfake);
    assert_eq!(
        response.deepfake_analysis.status,
        "SUSPICIOUS - Potential Deepfake"
    );
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_router_verify_and_lookup() {
    let store = Arc::new(MemoryKycStore::new());
    let app = app(app_state(store, Vec::new()));

    let missing = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/kyc/user@example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let verify = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/kyc/verify")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::to_vec(&verified_request()).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(verify.status(), StatusCode::OK);
    let body = body_json(verify).await;
    assert_eq!(body["final_status"], "VERIFIED");
    assert_eq!(body["similarity"], 90.0);
    assert_eq!(body["stored"], true);

    let found = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/kyc/user@example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(found.status(), StatusCode::OK);
    let record = body_json(found).await;
    assert_eq!(record["id_number"], "123456789012");
    assert_eq!(record["final_status"], "VERIFIED");
}

#[tokio::test]
async fn test_router_reports_slot_issues() {
    let app = app(app_state(Arc::new(MemoryKycStore::new()), Vec::new()));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/kyc/verify")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&swapped_request()).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid / mismatched uploads");
    assert_eq!(body["issues"].as_array().unwrap().len(), 2);
    assert!(body["expected"]["selfie"].is_string());
}

#[tokio::test]
async fn test_router_extract_and_health() {
    let app = app(app_state(Arc::new(MemoryKycStore::new()), Vec::new()));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/kyc/extract")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "text": "D0B: 02-O1-1995\nFemale\n123456789012" })
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["date_of_birth"], "02/01/1995");
    assert_eq!(body["gender"], "Female");
    assert_eq!(body["id_number"], "123456789012");
    assert!(body["tax_id"].is_null());

    let health = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}
