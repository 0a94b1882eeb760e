//! To-do list derivation for a use case's compliance dossier.

use chrono::NaiveDate;
use serde::Serialize;

use crate::api::{Company, DocumentStatus, UseCase};
use crate::dossier::DocType;
use crate::workflow::{required_document, Documents};

/// Dossier documents expected from use cases that are not unacceptable, by priority.
pub const COMPLIANCE_DOCUMENT_TYPES: [DocType; 8] = [
    DocType::SystemPrompt,
    DocType::HumanOversight,
    DocType::TechnicalDocumentation,
    DocType::TransparencyMarking,
    DocType::DataQuality,
    DocType::RiskManagement,
    DocType::ContinuousMonitoring,
    DocType::TrainingCensus,
];

const REGISTRY_ACTION_POINTS: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TodoItem {
    pub doc_type: DocType,
    pub text: &'static str,
    pub completed: bool,
    /// Score points shown next to the action
    pub points: u32,
}

pub fn is_todo_completed(status: Option<DocumentStatus>) -> bool {
    status.is_some_and(DocumentStatus::is_done)
}

/// Fixed points displayed for a document action, 0 when none are shown.
pub fn action_points(doc_type: DocType) -> u32 {
    match doc_type {
        DocType::HumanOversight | DocType::TechnicalDocumentation | DocType::TransparencyMarking => 8,
        DocType::RiskManagement | DocType::ContinuousMonitoring => 4,
        DocType::RegistryProof => REGISTRY_ACTION_POINTS,
        _ => 0,
    }
}

/// Build the to-do list of a use case.
///
/// An unacceptable case only lists the document its deployment date requires.
/// Every other case lists the compliance documents plus the registry action,
/// which the company can satisfy once for all its use cases.
pub fn todos_for(
    use_case: &UseCase,
    company: Option<&Company>,
    documents: &Documents,
    today: NaiveDate,
) -> Vec<TodoItem> {
    let item = |doc_type: DocType| TodoItem {
        doc_type,
        text: doc_type.todo_text(),
        completed: is_todo_completed(documents.get(&doc_type).map(|doc| doc.status)),
        points: action_points(doc_type),
    };

    if use_case.is_unacceptable_risk() {
        return required_document(use_case, today)
            .map(item)
            .into_iter()
            .collect();
    }

    let mut items: Vec<TodoItem> = COMPLIANCE_DOCUMENT_TYPES.iter().copied().map(item).collect();

    let mut registry = item(DocType::RegistryProof);
    registry.completed |= company.is_some_and(|company| company.maydai_as_registry);
    items.push(registry);
    items
}

/// Share of completed items as a rounded percentage. An empty list counts as 0.
pub fn completion_ratio(items: &[TodoItem]) -> u32 {
    if items.is_empty() {
        return 0;
    }
    let completed = items.iter().filter(|item| item.completed).count();
    ((completed as f64 / items.len() as f64) * 100.0).round() as u32
}
