use serde_json::{json, Value};

use crate::api::{Document, DocumentStatus};
use crate::dossier::DocType;

/// Text payloads that can be saved on a dossier document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentForm {
    SystemPrompt { instructions: String },
    TransparencyMarking { description: String },
    HumanOversight { name: String, role: String, email: String },
}

impl DocumentForm {
    pub fn doc_type(&self) -> DocType {
        match self {
            DocumentForm::SystemPrompt { .. } => DocType::SystemPrompt,
            DocumentForm::TransparencyMarking { .. } => DocType::TransparencyMarking,
            DocumentForm::HumanOversight { .. } => DocType::HumanOversight,
        }
    }

    /// `formData` body sent to `POST /api/dossiers/{usecaseId}/{docType}`
    pub fn form_data(&self) -> Value {
        match self {
            DocumentForm::SystemPrompt { instructions } => {
                json!({ "system_instructions": instructions })
            }
            DocumentForm::TransparencyMarking { description } => {
                json!({ "marking_description": description })
            }
            DocumentForm::HumanOversight { name, role, email } => json!({
                "supervisorName": name,
                "supervisorRole": role,
                "supervisorEmail": email,
            }),
        }
    }

    /// Complete iff every required text is non-blank.
    pub fn status(&self) -> DocumentStatus {
        let filled = match self {
            DocumentForm::SystemPrompt { instructions } => !instructions.trim().is_empty(),
            DocumentForm::TransparencyMarking { description } => !description.trim().is_empty(),
            DocumentForm::HumanOversight { name, role, email } => [name, role, email]
                .iter()
                .all(|field| !field.trim().is_empty()),
        };
        if filled {
            DocumentStatus::Complete
        } else {
            DocumentStatus::Incomplete
        }
    }

    /// Rebuild the editable form from a fetched document, if the type has one.
    pub fn from_document(doc_type: DocType, document: &Document) -> Option<Self> {
        let field = |key: &str| document.text_field(key).unwrap_or_default();
        match doc_type {
            DocType::SystemPrompt => Some(DocumentForm::SystemPrompt {
                instructions: field("system_instructions"),
            }),
            DocType::TransparencyMarking => Some(DocumentForm::TransparencyMarking {
                description: field("marking_description"),
            }),
            DocType::HumanOversight => Some(DocumentForm::HumanOversight {
                name: field("supervisorName"),
                role: field("supervisorRole"),
                email: field("supervisorEmail"),
            }),
            _ => None,
        }
    }

    /// Document the backend holds once this form has been accepted.
    pub fn acknowledged_document(&self) -> Document {
        Document {
            form_data: Some(self.form_data()),
            file_url: None,
            status: self.status(),
            updated_at: None,
        }
    }
}
