use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::{Document, UseCase};
use crate::dossier::DocType;

/// Steps of the unacceptable-case workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowStep {
    #[default]
    ConfirmDate,
    EditDate,
    UploadProof,
    FutureDeploymentWarning,
}

impl WorkflowStep {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStep::ConfirmDate => "confirm-date",
            WorkflowStep::EditDate => "edit-date",
            WorkflowStep::UploadProof => "upload-proof",
            WorkflowStep::FutureDeploymentWarning => "future-deployment-warning",
        }
    }
}

impl std::fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of today the deployment date falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateBranch {
    /// Already deployed: the system must be stopped and proven so
    Past,
    /// Deployment planned today or later: system instructions must be documented
    Future,
}

impl DateBranch {
    pub fn classify(deployment_date: NaiveDate, today: NaiveDate) -> Self {
        if deployment_date < today {
            DateBranch::Past
        } else {
            DateBranch::Future
        }
    }

    pub fn required_document(self) -> DocType {
        match self {
            DateBranch::Past => DocType::StoppingProof,
            DateBranch::Future => DocType::SystemPrompt,
        }
    }

    /// Step the workflow lands on once the date is confirmed.
    pub fn step(self) -> WorkflowStep {
        match self {
            DateBranch::Past => WorkflowStep::UploadProof,
            DateBranch::Future => WorkflowStep::FutureDeploymentWarning,
        }
    }
}

/// Parse a deployment date as stored by the backend (`YYYY-MM-DD` or RFC 3339).
pub fn parse_deployment_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| raw.get(..10).and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()))
}

/// Format a stored deployment date for the date input (`YYYY-MM-DD`).
pub fn format_date_for_input(raw: Option<&str>) -> String {
    raw.and_then(parse_deployment_date)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Unacceptable risk level together with a declared deployment date.
pub fn is_unacceptable_case(use_case: &UseCase) -> bool {
    use_case.is_unacceptable_risk()
        && use_case
            .deployment_date
            .as_deref()
            .is_some_and(|date| !date.trim().is_empty())
}

pub fn date_branch(use_case: &UseCase, today: NaiveDate) -> Option<DateBranch> {
    let date = use_case.deployment_date.as_deref().and_then(parse_deployment_date)?;
    Some(DateBranch::classify(date, today))
}

/// Document an unacceptable case must provide, `None` for any other use case.
pub fn required_document(use_case: &UseCase, today: NaiveDate) -> Option<DocType> {
    if !use_case.is_unacceptable_risk() {
        return None;
    }
    date_branch(use_case, today).map(DateBranch::required_document)
}

/// Whether the document required by `branch` counts as provided.
///
/// Past branch: the stopping proof is complete or validated. Future branch: the
/// system prompt is complete or validated, or carries an uploaded file.
pub fn proof_uploaded(branch: DateBranch, document: Option<&Document>) -> bool {
    let Some(document) = document else {
        return false;
    };
    match branch {
        DateBranch::Past => document.status.is_done(),
        DateBranch::Future => document.status.is_done() || document.file_url.is_some(),
    }
}

/// Fetched documents of a dossier, keyed by type.
pub type Documents = BTreeMap<DocType, Document>;

/// Workflow expectation derived purely from fetched data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowSnapshot {
    pub branch: Option<DateBranch>,
    pub required_doc: Option<DocType>,
    pub proof_uploaded: bool,
}

impl WorkflowSnapshot {
    pub fn derive(use_case: &UseCase, documents: &Documents, today: NaiveDate) -> Self {
        let branch = date_branch(use_case, today);
        let required_doc = branch.map(DateBranch::required_document);
        let proof_uploaded = match (branch, required_doc) {
            (Some(branch), Some(doc_type)) => proof_uploaded(branch, documents.get(&doc_type)),
            _ => false,
        };
        Self {
            branch,
            required_doc,
            proof_uploaded,
        }
    }

    /// Step to open on: straight to the branch step when the proof is already there.
    pub fn entry_step(&self) -> WorkflowStep {
        match self.branch {
            Some(branch) if self.proof_uploaded => branch.step(),
            _ => WorkflowStep::ConfirmDate,
        }
    }
}
