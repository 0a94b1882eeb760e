//! Compliance backend client tests
//!
//! These tests use wiremock to serve the `/api/*` routes so the client's auth,
//! error mapping, caching and payloads are checked without a real backend.

use dossier_workflow::api::{ApiError, DocumentStatus, DossierApi, DossierClient};
use dossier_workflow::dossier::{DocType, UploadFile};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Compliance backend mock server
pub struct DossierApiMock {
    pub server: MockServer,
}

impl DossierApiMock {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn client(&self) -> DossierClient {
        DossierClient::new(self.server.uri(), "test-token").unwrap()
    }

    pub async fn mock_use_case(&self, usecase_id: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/api/usecases/{usecase_id}")))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_document(&self, usecase_id: &str, doc_type: &str, status: u16, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/api/dossiers/{usecase_id}/{doc_type}")))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }
}

#[tokio::test]
async fn fetch_use_case_sends_bearer_token() {
    let mock = DossierApiMock::new().await;
    mock.mock_use_case(
        "uc-1",
        json!({
            "id": "uc-1",
            "name": "Notation sociale",
            "company_id": "c-1",
            "risk_level": "unacceptable",
            "deployment_date": "2020-01-01"
        }),
    )
    .await;

    let use_case = mock.client().fetch_use_case("uc-1").await.unwrap();
    assert_eq!(use_case.name, "Notation sociale");
    assert!(use_case.is_unacceptable_risk());
    assert_eq!(use_case.deployment_date.as_deref(), Some("2020-01-01"));
}

#[tokio::test]
async fn missing_document_is_none() {
    let mock = DossierApiMock::new().await;
    mock.mock_document("uc-1", "stopping_proof", 404, json!({ "error": "Not found" }))
        .await;

    let document = mock
        .client()
        .fetch_document("uc-1", DocType::StoppingProof)
        .await
        .unwrap();
    assert!(document.is_none());
}

#[tokio::test]
async fn document_text_content_is_read_as_form_data() {
    let mock = DossierApiMock::new().await;
    mock.mock_document(
        "uc-1",
        "system_prompt",
        200,
        json!({
            "textContent": "{\"system_instructions\":\"Ne jamais noter les citoyens\"}",
            "fileUrl": null,
            "status": "complete"
        }),
    )
    .await;

    let document = mock
        .client()
        .fetch_document("uc-1", DocType::SystemPrompt)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(document.status, DocumentStatus::Complete);
    assert_eq!(
        document.text_field("system_instructions").as_deref(),
        Some("Ne jamais noter les citoyens")
    );
}

#[tokio::test]
async fn unauthorized_maps_to_session_error() {
    let mock = DossierApiMock::new().await;
    Mock::given(method("GET"))
        .and(path("/api/usecases/uc-1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "Unauthorized" })))
        .mount(&mock.server)
        .await;

    let err = mock.client().fetch_use_case("uc-1").await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
    assert!(err.hint().is_some());
}

#[tokio::test]
async fn backend_error_message_is_surfaced() {
    let mock = DossierApiMock::new().await;
    Mock::given(method("DELETE"))
        .and(path("/api/dossiers/uc-1/stopping_proof/upload"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "error": "Suppression impossible" })),
        )
        .mount(&mock.server)
        .await;

    let err = mock
        .client()
        .delete_upload("uc-1", DocType::StoppingProof)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Suppression impossible");
    assert_eq!(err.status().map(|s| s.as_u16()), Some(500));
}

#[tokio::test]
async fn save_document_posts_form_data_and_status() {
    let mock = DossierApiMock::new().await;
    Mock::given(method("POST"))
        .and(path("/api/dossiers/uc-2/system_prompt"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(json!({
            "formData": { "system_instructions": "Refuse toute notation sociale" },
            "status": "complete"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&mock.server)
        .await;

    let receipt = mock
        .client()
        .save_document(
            "uc-2",
            DocType::SystemPrompt,
            &json!({ "system_instructions": "Refuse toute notation sociale" }),
            DocumentStatus::Complete,
        )
        .await
        .unwrap();
    assert!(receipt.ok);
}

#[tokio::test]
async fn upload_returns_file_url_and_score_change() {
    let mock = DossierApiMock::new().await;
    Mock::given(method("PUT"))
        .and(path("/api/dossiers/uc-1/stopping_proof/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "fileUrl": "dossiers/c-1/uc-1/stopping_proof/attestation.pdf",
            "scoreChange": {
                "previousScore": 40.0,
                "newScore": 48.0,
                "pointsGained": 8.0,
                "reason": "Preuve d'arrêt fournie"
            }
        })))
        .expect(1)
        .mount(&mock.server)
        .await;

    let file = UploadFile::new("attestation.pdf", b"%PDF-1.7".to_vec());
    let receipt = mock
        .client()
        .upload_document("uc-1", DocType::StoppingProof, &file)
        .await
        .unwrap();

    assert_eq!(
        receipt.file_url.as_deref(),
        Some("dossiers/c-1/uc-1/stopping_proof/attestation.pdf")
    );
    assert_eq!(receipt.score_change.map(|c| c.points_gained), Some(8.0));
}

#[tokio::test]
async fn reads_are_cached_until_a_write_on_the_use_case() {
    let mock = DossierApiMock::new().await;
    Mock::given(method("GET"))
        .and(path("/api/dossiers/uc-1/stopping_proof"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "fileUrl": "p.pdf",
            "status": "complete"
        })))
        .expect(2)
        .mount(&mock.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/dossiers/uc-1/stopping_proof/upload"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock.server)
        .await;

    let client = mock.client();
    client.fetch_document("uc-1", DocType::StoppingProof).await.unwrap();
    client.fetch_document("uc-1", DocType::StoppingProof).await.unwrap();
    assert_eq!(client.metrics().snapshot().cache_hits, 1);

    client.delete_upload("uc-1", DocType::StoppingProof).await.unwrap();
    client.fetch_document("uc-1", DocType::StoppingProof).await.unwrap();
}

#[tokio::test]
async fn storage_usage_is_parsed() {
    let mock = DossierApiMock::new().await;
    Mock::given(method("GET"))
        .and(path("/api/storage/usage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "usedStorageMb": 120.5,
            "maxStorageMb": 250.0,
            "percentUsed": 48.2
        })))
        .mount(&mock.server)
        .await;

    let usage = mock.client().storage_usage().await.unwrap();
    assert_eq!(usage.used_storage_mb, 120.5);
    assert_eq!(usage.max_storage_mb, Some(250.0));
}

#[tokio::test]
async fn invalidation_leaves_other_use_cases_cached() {
    let mock = DossierApiMock::new().await;
    for usecase_id in ["uc-1", "uc-10"] {
        Mock::given(method("GET"))
            .and(path(format!("/api/dossiers/{usecase_id}/stopping_proof")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "complete" })))
            .expect(if usecase_id == "uc-1" { 2 } else { 1 })
            .mount(&mock.server)
            .await;
    }

    let client = mock.client();
    client.fetch_document("uc-1", DocType::StoppingProof).await.unwrap();
    client.fetch_document("uc-10", DocType::StoppingProof).await.unwrap();

    client.invalidate_usecase("uc-1").await;
    client.fetch_document("uc-1", DocType::StoppingProof).await.unwrap();
    client.fetch_document("uc-10", DocType::StoppingProof).await.unwrap();
    assert_eq!(client.metrics().snapshot().cache_hits, 1);
}

#[tokio::test]
async fn next_steps_are_parsed() {
    let mock = DossierApiMock::new().await;
    Mock::given(method("GET"))
        .and(path("/api/usecases/uc-1/nextsteps"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "evaluation": "Système de notation sociale interdit",
            "conclusion": "Arrêter le déploiement"
        })))
        .mount(&mock.server)
        .await;

    let next_steps = mock.client().fetch_next_steps("uc-1").await.unwrap().unwrap();
    assert_eq!(next_steps.evaluation.as_deref(), Some("Système de notation sociale interdit"));
    assert_eq!(next_steps.impact, None);
}

#[tokio::test]
async fn missing_next_steps_are_none() {
    let mock = DossierApiMock::new().await;
    Mock::given(method("GET"))
        .and(path("/api/usecases/uc-1/nextsteps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Value::Null))
        .mount(&mock.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/usecases/uc-2/nextsteps"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock.server)
        .await;

    let client = mock.client();
    assert!(client.fetch_next_steps("uc-1").await.unwrap().is_none());
    assert!(client.fetch_next_steps("uc-2").await.unwrap().is_none());
}
