use std::path::Path;

use crate::api::StorageUsage;
use crate::dossier::{DocType, ValidationError};

/// Server-side upload ceiling, mirrored so oversized files never leave the client.
pub const MAX_UPLOAD_MB: u64 = 10;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A file picked by the user, held in memory until it is uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        Ok(Self { file_name, bytes })
    }

    /// Lowercased extension including the dot, or an empty string.
    pub fn extension(&self) -> String {
        match self.file_name.rfind('.') {
            Some(idx) if idx > 0 => self.file_name[idx..].to_lowercase(),
            _ => String::new(),
        }
    }

    pub fn size_mb(&self) -> f64 {
        self.bytes.len() as f64 / BYTES_PER_MB
    }

    /// MIME type sent on the multipart part, derived from the extension.
    pub fn mime_type(&self) -> &'static str {
        match self.extension().as_str() {
            ".pdf" => "application/pdf",
            ".png" => "image/png",
            ".jpg" | ".jpeg" => "image/jpeg",
            ".gif" => "image/gif",
            ".txt" => "text/plain",
            ".md" => "text/markdown",
            ".docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            ".xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            _ => "application/octet-stream",
        }
    }
}

/// Check format and size of a file against the accepted-format table.
pub fn validate_upload(doc_type: DocType, file: &UploadFile) -> Result<(), ValidationError> {
    if !doc_type.accepts_uploads() {
        return Err(ValidationError::UploadsNotAccepted(doc_type));
    }

    let extension = file.extension();
    if !doc_type.accepted_extensions().contains(&extension.as_str()) {
        return Err(ValidationError::UnsupportedFormat {
            doc_type,
            allowed: doc_type.formats_description(),
        });
    }

    let size_mb = file.size_mb();
    if size_mb > MAX_UPLOAD_MB as f64 {
        return Err(ValidationError::FileTooLarge {
            size_mb,
            max_mb: MAX_UPLOAD_MB,
        });
    }

    Ok(())
}

/// Plan-defined storage ceiling used for the pre-upload quota check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageQuota {
    pub max_storage_mb: f64,
}

impl StorageQuota {
    pub fn new(max_storage_mb: f64) -> Self {
        Self { max_storage_mb }
    }

    /// The backend's reported ceiling wins over the configured plan limit.
    pub fn check(&self, usage: &StorageUsage, file_mb: f64) -> Result<(), ValidationError> {
        let limit_mb = usage.max_storage_mb.unwrap_or(self.max_storage_mb);
        if usage.used_storage_mb + file_mb > limit_mb {
            return Err(ValidationError::StorageQuotaExceeded {
                used_mb: usage.used_storage_mb,
                file_mb,
                limit_mb,
            });
        }
        Ok(())
    }
}

impl Default for StorageQuota {
    fn default() -> Self {
        Self::new(250.0)
    }
}
