// Dossier Workflow Library - AI Act compliance dossiers
// This exposes the core components for testing and integration

pub mod api;
pub mod config;
pub mod dossier;
pub mod observability;
pub mod telemetry;
pub mod todo;
pub mod workflow;

// Re-export key types for easy access
pub use api::{
    ApiError, Company, Document, DocumentStatus, DossierApi, DossierClient, UseCase,
    UseCaseNextSteps,
};
pub use config::{config, DossierConfig};
pub use dossier::{
    ActionOutcome, DocType, DocumentForm, DossierError, DossierService, StorageQuota, UploadFile,
    ValidationError,
};
pub use observability::{ActionTimer, DossierMetrics, MetricsSnapshot};
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry};
pub use todo::{completion_ratio, todos_for, TodoItem, COMPLIANCE_DOCUMENT_TYPES};
pub use workflow::{
    DateBranch, UnacceptableCaseWorkflow, WorkflowError, WorkflowEvent, WorkflowSnapshot,
    WorkflowStep,
};
