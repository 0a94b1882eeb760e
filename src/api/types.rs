use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Risk level label that routes a use case into the unacceptable-case workflow.
pub const UNACCEPTABLE_RISK_LEVEL: &str = "unacceptable";

/// AI system use case as returned by `GET /api/usecases/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseCase {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub deployment_date: Option<String>,
    #[serde(default)]
    pub score_final: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

impl UseCase {
    pub fn is_unacceptable_risk(&self) -> bool {
        self.risk_level
            .as_deref()
            .is_some_and(|level| level.eq_ignore_ascii_case(UNACCEPTABLE_RISK_LEVEL))
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "Cas d'usage"
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub maydai_as_registry: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Incomplete,
    Complete,
    Validated,
}

impl DocumentStatus {
    /// Complete and validated both count as done.
    pub fn is_done(self) -> bool {
        matches!(self, DocumentStatus::Complete | DocumentStatus::Validated)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Incomplete => "incomplete",
            DocumentStatus::Complete => "complete",
            DocumentStatus::Validated => "validated",
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One compliance document of a dossier (per use case, per doc type).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default, alias = "textContent")]
    pub form_data: Option<Value>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub status: DocumentStatus,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Document {
    /// Read a string field out of `formData`.
    ///
    /// The backend stores form data as a JSON column and some routes return it
    /// serialized as a string, so both shapes are accepted.
    pub fn text_field(&self, key: &str) -> Option<String> {
        match self.form_data.as_ref()? {
            Value::Object(map) => map.get(key).and_then(Value::as_str).map(str::to_string),
            Value::String(raw) => serde_json::from_str::<Value>(raw)
                .ok()?
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    }

    pub fn has_file(&self) -> bool {
        self.file_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}

/// Score delta reported by the backend when a write flips a questionnaire answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreChange {
    pub previous_score: f64,
    pub new_score: f64,
    pub points_gained: f64,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Body of a successful POST/PUT on a dossier document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteReceipt {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub score_change: Option<ScoreChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageUsage {
    pub used_storage_mb: f64,
    #[serde(default)]
    pub max_storage_mb: Option<f64>,
    #[serde(default)]
    pub percent_used: Option<f64>,
}

/// Generated recommendations of `GET /api/usecases/{id}/nextsteps`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UseCaseNextSteps {
    #[serde(default)]
    pub evaluation: Option<String>,
    #[serde(default)]
    pub introduction: Option<String>,
    #[serde(default)]
    pub impact: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
}

impl UseCaseNextSteps {
    /// Non-empty sections in reading order, with their French headings.
    pub fn sections(&self) -> Vec<(&'static str, &str)> {
        [
            ("Évaluation", &self.evaluation),
            ("Introduction", &self.introduction),
            ("Impact", &self.impact),
            ("Conclusion", &self.conclusion),
        ]
        .into_iter()
        .filter_map(|(heading, text)| {
            text.as_deref()
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(|text| (heading, text))
        })
        .collect()
    }
}
