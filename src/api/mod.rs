pub mod client;
pub mod errors;
pub mod types;

pub use client::{DossierApi, DossierClient};
pub use errors::ApiError;
pub use types::{
    Company, Document, DocumentStatus, ScoreChange, StorageUsage, UseCase, UseCaseNextSteps,
    WriteReceipt, UNACCEPTABLE_RISK_LEVEL,
};

#[cfg(any(test, feature = "testing"))]
pub use client::MockDossierApi;
