pub mod doc_type;
pub mod errors;
pub mod forms;
pub mod service;
pub mod upload;

pub use doc_type::{DocType, InputKind, UnknownDocType};
pub use errors::{DossierError, ValidationError};
pub use forms::DocumentForm;
pub use service::{ActionOutcome, DossierService};
pub use upload::{validate_upload, StorageQuota, UploadFile, MAX_UPLOAD_MB};
