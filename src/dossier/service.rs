use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{ApiError, Document, DocumentStatus, DossierApi, ScoreChange, WriteReceipt};
use crate::dossier::{validate_upload, DocType, DocumentForm, DossierError, StorageQuota, UploadFile};
use crate::observability::DossierMetrics;

/// Result of a confirmed write on a dossier document.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub doc_type: DocType,
    /// Document as the backend now holds it
    pub document: Document,
    /// False when the post-write refetch failed and `document` was rebuilt
    /// from the write acknowledgement instead
    pub refreshed: bool,
    pub score_change: Option<ScoreChange>,
}

/// Save, upload and delete handlers shared by the dossier pages and the
/// unacceptable-case workflow.
///
/// Every write is followed by a refetch of the document so callers hold
/// server-confirmed state.
#[derive(Debug)]
pub struct DossierService<A> {
    api: A,
    quota: StorageQuota,
    metrics: Arc<DossierMetrics>,
}

impl<A: DossierApi> DossierService<A> {
    pub fn new(api: A, quota: StorageQuota) -> Self {
        Self {
            api,
            quota,
            metrics: Arc::new(DossierMetrics::new()),
        }
    }

    /// Record into counters shared with the client.
    pub fn with_metrics(mut self, metrics: Arc<DossierMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn metrics(&self) -> &DossierMetrics {
        &self.metrics
    }

    pub async fn load_document(
        &self,
        usecase_id: &str,
        doc_type: DocType,
    ) -> Result<Option<Document>, ApiError> {
        self.api.fetch_document(usecase_id, doc_type).await
    }

    pub async fn save_form(
        &self,
        usecase_id: &str,
        form: &DocumentForm,
    ) -> Result<ActionOutcome, DossierError> {
        let doc_type = form.doc_type();
        let status = form.status();
        let receipt = self
            .api
            .save_document(usecase_id, doc_type, &form.form_data(), status)
            .await?;
        info!(usecase_id, %doc_type, %status, "Document text saved");

        Ok(self
            .refetch(usecase_id, doc_type, form.acknowledged_document(), receipt)
            .await)
    }

    pub async fn upload_file(
        &self,
        usecase_id: &str,
        doc_type: DocType,
        file: &UploadFile,
    ) -> Result<ActionOutcome, DossierError> {
        validate_upload(doc_type, file).inspect_err(|_| self.metrics.record_rejected_upload())?;

        match self.api.storage_usage().await {
            Ok(usage) => self
                .quota
                .check(&usage, file.size_mb())
                .inspect_err(|_| self.metrics.record_quota_refusal())?,
            Err(err) => {
                self.metrics.record_quota_check_skipped();
                warn!(error = %err, "Storage usage unavailable, skipping quota check");
            }
        }

        let receipt = self.api.upload_document(usecase_id, doc_type, file).await?;
        info!(
            usecase_id,
            %doc_type,
            file_name = %file.file_name,
            size_bytes = file.bytes.len(),
            "Document file uploaded"
        );

        let acknowledged = Document {
            form_data: None,
            file_url: receipt.file_url.clone(),
            status: DocumentStatus::Complete,
            updated_at: None,
        };
        Ok(self.refetch(usecase_id, doc_type, acknowledged, receipt).await)
    }

    pub async fn delete_file(
        &self,
        usecase_id: &str,
        doc_type: DocType,
    ) -> Result<ActionOutcome, DossierError> {
        self.api.delete_upload(usecase_id, doc_type).await?;
        info!(usecase_id, %doc_type, "Document file deleted");

        Ok(self
            .refetch(usecase_id, doc_type, Document::default(), WriteReceipt::default())
            .await)
    }

    /// Read back a document after a confirmed write.
    ///
    /// A failed read keeps the write: the document is rebuilt from what the
    /// backend acknowledged. This applies to every document type alike.
    async fn refetch(
        &self,
        usecase_id: &str,
        doc_type: DocType,
        acknowledged: Document,
        receipt: WriteReceipt,
    ) -> ActionOutcome {
        let (document, refreshed) = match self.api.fetch_document(usecase_id, doc_type).await {
            Ok(Some(document)) => (document, true),
            Ok(None) => (Document::default(), true),
            Err(err) => {
                self.metrics.record_refetch_fallback();
                warn!(
                    usecase_id,
                    %doc_type,
                    error = %err,
                    "Refetch after write failed, using acknowledged document"
                );
                (acknowledged, false)
            }
        };

        ActionOutcome {
            doc_type,
            document,
            refreshed,
            score_change: receipt.score_change,
        }
    }
}
