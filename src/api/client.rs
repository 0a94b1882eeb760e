use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use moka::future::Cache;
use reqwest::{multipart, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::api::{
    ApiError, Company, Document, DocumentStatus, StorageUsage, UseCase, UseCaseNextSteps,
    WriteReceipt,
};
use crate::config::ApiConfig;
use crate::dossier::{DocType, UploadFile};
use crate::observability::DossierMetrics;

/// Operations consumed from the compliance REST backend.
///
/// The workflow controller and the dossier service only talk to this trait so
/// tests can swap in a mock.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DossierApi: Send + Sync {
    async fn fetch_use_case(&self, usecase_id: &str) -> Result<UseCase, ApiError>;
    async fn fetch_company(&self, company_id: &str) -> Result<Company, ApiError>;
    /// `Ok(None)` when the document has never been created.
    async fn fetch_document(
        &self,
        usecase_id: &str,
        doc_type: DocType,
    ) -> Result<Option<Document>, ApiError>;
    async fn save_document(
        &self,
        usecase_id: &str,
        doc_type: DocType,
        form_data: &Value,
        status: DocumentStatus,
    ) -> Result<WriteReceipt, ApiError>;
    async fn upload_document(
        &self,
        usecase_id: &str,
        doc_type: DocType,
        file: &UploadFile,
    ) -> Result<WriteReceipt, ApiError>;
    async fn delete_upload(&self, usecase_id: &str, doc_type: DocType) -> Result<(), ApiError>;
    async fn storage_usage(&self) -> Result<StorageUsage, ApiError>;
    async fn update_deployment_date(
        &self,
        usecase_id: &str,
        deployment_date: &str,
    ) -> Result<UseCase, ApiError>;
    /// `Ok(None)` when no recommendations were generated for the use case.
    async fn fetch_next_steps(&self, usecase_id: &str)
        -> Result<Option<UseCaseNextSteps>, ApiError>;
    /// Forget any locally held reads of a use case so the next fetches hit
    /// the backend. Implementations without a cache have nothing to do.
    async fn invalidate_usecase(&self, _usecase_id: &str) {}
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: Value,
}

/// Rate-limited, caching HTTP client for the compliance backend.
///
/// Clones share the rate limiter, the cache and the metrics.
#[derive(Debug, Clone)]
pub struct DossierClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    cache: Cache<String, CacheEntry>,
    metrics: Arc<DossierMetrics>,
}

impl DossierClient {
    /// Create a client with default limits (10 req/s, burst 20, 60s cache).
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, ApiError> {
        Self::build(
            base_url.into(),
            token.into(),
            10,
            20,
            Duration::from_secs(30),
            Duration::from_secs(60),
        )
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        let token = config
            .token
            .clone()
            .ok_or_else(|| ApiError::Config("no access token configured".to_string()))?;
        Self::build(
            config.base_url.clone(),
            token,
            config.rate_limit.requests_per_second,
            config.rate_limit.burst_capacity,
            Duration::from_secs(config.timeout_seconds),
            Duration::from_secs(config.cache_ttl_seconds),
        )
    }

    fn build(
        base_url: String,
        token: String,
        requests_per_second: u32,
        burst_capacity: u32,
        timeout: Duration,
        cache_ttl: Duration,
    ) -> Result<Self, ApiError> {
        let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::new(burst_capacity).unwrap_or(NonZeroU32::MIN));
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        let cache = Cache::builder()
            .max_capacity(500)
            .time_to_live(cache_ttl)
            .build();

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            rate_limiter,
            cache,
            metrics: Arc::new(DossierMetrics::new()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Counters shared by every clone; hand them to `DossierService::with_metrics`.
    pub fn metrics(&self) -> &Arc<DossierMetrics> {
        &self.metrics
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        if self.rate_limiter.check().is_err() {
            self.metrics.record_throttled();
            self.rate_limiter
                .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(50)))
                .await;
        }
        self.metrics.record_request();
        debug!(%method, path, "Calling compliance API");

        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
    }

    /// Send and read the whole body, mapping non-2xx statuses to `ApiError::Http`.
    async fn send(&self, builder: RequestBuilder, fallback: &str) -> Result<String, ApiError> {
        let response = builder
            .send()
            .await
            .inspect_err(|_| self.metrics.record_backend_error())?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            self.metrics.record_backend_error();
            warn!(status = status.as_u16(), "Compliance API returned an error");
            return Err(ApiError::from_response_body(status, &body, fallback));
        }
        Ok(body)
    }

    async fn get_cached<T: DeserializeOwned>(&self, path: &str, fallback: &str) -> Result<T, ApiError> {
        let cached = self.cache.get(path).await;
        self.metrics.record_cache_lookup(cached.is_some());
        if let Some(cached) = cached {
            debug!(path, "Cache hit");
            return Ok(serde_json::from_value(cached.data)?);
        }

        let builder = self.request(Method::GET, path).await;
        let body = self.send(builder, fallback).await?;
        let data: Value = serde_json::from_str(&body)?;
        let parsed = serde_json::from_value(data.clone())?;
        self.cache.insert(path.to_string(), CacheEntry { data }).await;
        Ok(parsed)
    }

    fn parse_receipt(body: &str) -> Result<WriteReceipt, ApiError> {
        if body.trim().is_empty() {
            return Ok(WriteReceipt {
                ok: true,
                ..WriteReceipt::default()
            });
        }
        Ok(serde_json::from_str(body)?)
    }
}

fn document_path(usecase_id: &str, doc_type: DocType) -> String {
    format!("/api/dossiers/{usecase_id}/{}", doc_type.as_str())
}

#[async_trait]
impl DossierApi for DossierClient {
    async fn fetch_use_case(&self, usecase_id: &str) -> Result<UseCase, ApiError> {
        self.get_cached(&format!("/api/usecases/{usecase_id}"), "Erreur lors du chargement du cas d'usage")
            .await
    }

    async fn fetch_company(&self, company_id: &str) -> Result<Company, ApiError> {
        self.get_cached(&format!("/api/companies/{company_id}"), "Erreur lors du chargement de l'entreprise")
            .await
    }

    async fn fetch_document(
        &self,
        usecase_id: &str,
        doc_type: DocType,
    ) -> Result<Option<Document>, ApiError> {
        match self
            .get_cached::<Document>(&document_path(usecase_id, doc_type), "Erreur lors du chargement du document")
            .await
        {
            Ok(document) => Ok(Some(document)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn save_document(
        &self,
        usecase_id: &str,
        doc_type: DocType,
        form_data: &Value,
        status: DocumentStatus,
    ) -> Result<WriteReceipt, ApiError> {
        let builder = self
            .request(Method::POST, &document_path(usecase_id, doc_type))
            .await
            .json(&json!({ "formData": form_data, "status": status }));
        let result = self.send(builder, "Erreur lors de l'enregistrement").await;
        self.invalidate_usecase(usecase_id).await;
        Self::parse_receipt(&result?)
    }

    async fn upload_document(
        &self,
        usecase_id: &str,
        doc_type: DocType,
        file: &UploadFile,
    ) -> Result<WriteReceipt, ApiError> {
        let part = multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(file.mime_type())?;
        let form = multipart::Form::new().part("file", part);

        let path = format!("{}/upload", document_path(usecase_id, doc_type));
        let builder = self.request(Method::PUT, &path).await.multipart(form);
        let result = self.send(builder, "Erreur lors de l'upload").await;
        self.invalidate_usecase(usecase_id).await;
        Self::parse_receipt(&result?)
    }

    async fn delete_upload(&self, usecase_id: &str, doc_type: DocType) -> Result<(), ApiError> {
        let path = format!("{}/upload", document_path(usecase_id, doc_type));
        let builder = self.request(Method::DELETE, &path).await;
        let result = self.send(builder, "Erreur lors de la suppression").await;
        self.invalidate_usecase(usecase_id).await;
        result.map(|_| ())
    }

    async fn storage_usage(&self) -> Result<StorageUsage, ApiError> {
        let builder = self.request(Method::GET, "/api/storage/usage").await;
        let body = self
            .send(builder, "Erreur lors du calcul du stockage")
            .await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn update_deployment_date(
        &self,
        usecase_id: &str,
        deployment_date: &str,
    ) -> Result<UseCase, ApiError> {
        let builder = self
            .request(Method::PUT, &format!("/api/usecases/{usecase_id}"))
            .await
            .json(&json!({ "deployment_date": deployment_date }));
        let result = self
            .send(builder, "Erreur lors de la mise à jour de la date")
            .await;
        self.invalidate_usecase(usecase_id).await;
        Ok(serde_json::from_str(&result?)?)
    }

    async fn fetch_next_steps(
        &self,
        usecase_id: &str,
    ) -> Result<Option<UseCaseNextSteps>, ApiError> {
        match self
            .get_cached::<Option<UseCaseNextSteps>>(
                &format!("/api/usecases/{usecase_id}/nextsteps"),
                "Erreur lors du chargement des recommandations",
            )
            .await
        {
            Err(err) if err.is_not_found() => Ok(None),
            other => other,
        }
    }

    /// Drop every cached read under `/{usecase_id}` or `/{usecase_id}/...`.
    async fn invalidate_usecase(&self, usecase_id: &str) {
        let exact = format!("/{usecase_id}");
        let nested = format!("/{usecase_id}/");
        let keys_to_remove: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| key.ends_with(&exact) || key.contains(&nested))
            .map(|(key, _)| key.as_ref().clone())
            .collect();

        for key in keys_to_remove {
            self.cache.invalidate(&key).await;
        }
        debug!(usecase_id, "Invalidated cached reads");
    }
}
