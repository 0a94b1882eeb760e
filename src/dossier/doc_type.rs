use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How a document is captured in the dossier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Free text, optionally replaced by a text file
    Text,
    File,
    /// Structured fields (supervisor designation)
    Form,
    /// Description text plus an optional illustrative file
    Mixed,
}

/// Document kinds of a compliance dossier.
///
/// The table of accepted formats is declared client-side; the backend enforces
/// the same list but is never asked for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    SystemPrompt,
    TechnicalDocumentation,
    HumanOversight,
    TransparencyMarking,
    RiskManagement,
    DataQuality,
    ContinuousMonitoring,
    TrainingCensus,
    StoppingProof,
    RegistryProof,
}

impl DocType {
    pub const ALL: [DocType; 10] = [
        DocType::SystemPrompt,
        DocType::TechnicalDocumentation,
        DocType::HumanOversight,
        DocType::TransparencyMarking,
        DocType::RiskManagement,
        DocType::DataQuality,
        DocType::ContinuousMonitoring,
        DocType::TrainingCensus,
        DocType::StoppingProof,
        DocType::RegistryProof,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DocType::SystemPrompt => "system_prompt",
            DocType::TechnicalDocumentation => "technical_documentation",
            DocType::HumanOversight => "human_oversight",
            DocType::TransparencyMarking => "transparency_marking",
            DocType::RiskManagement => "risk_management",
            DocType::DataQuality => "data_quality",
            DocType::ContinuousMonitoring => "continuous_monitoring",
            DocType::TrainingCensus => "training_census",
            DocType::StoppingProof => "stopping_proof",
            DocType::RegistryProof => "registry_proof",
        }
    }

    pub fn input_kind(self) -> InputKind {
        match self {
            DocType::SystemPrompt => InputKind::Text,
            DocType::HumanOversight => InputKind::Form,
            DocType::TransparencyMarking => InputKind::Mixed,
            _ => InputKind::File,
        }
    }

    /// Lowercase extensions (dot included) accepted for uploads of this type.
    pub fn accepted_extensions(self) -> &'static [&'static str] {
        match self {
            DocType::SystemPrompt => &[".txt", ".md"],
            DocType::TechnicalDocumentation => &[".pdf", ".docx", ".md"],
            DocType::TransparencyMarking => &[".png", ".jpg", ".jpeg", ".gif"],
            DocType::RiskManagement => &[".pdf", ".docx", ".xlsx"],
            DocType::DataQuality | DocType::ContinuousMonitoring => &[".pdf", ".docx"],
            DocType::StoppingProof | DocType::RegistryProof => &[".pdf", ".png", ".jpg", ".jpeg"],
            DocType::HumanOversight | DocType::TrainingCensus => &[],
        }
    }

    pub fn accepts_uploads(self) -> bool {
        !self.accepted_extensions().is_empty()
    }

    pub fn formats_description(self) -> String {
        let extensions = self.accepted_extensions().join(", ");
        match self {
            DocType::SystemPrompt => format!("Fichiers texte ({extensions})"),
            DocType::TransparencyMarking => format!("Images ({extensions})"),
            DocType::StoppingProof | DocType::RegistryProof => {
                format!("Documents et images ({extensions})")
            }
            _ => format!("Documents ({extensions})"),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DocType::StoppingProof => "Preuve d'arrêt du système",
            DocType::SystemPrompt => "Instructions système",
            DocType::TechnicalDocumentation => "Documentation technique du système",
            DocType::HumanOversight => "Responsable de la surveillance humaine",
            DocType::TransparencyMarking => "Marquage de transparence IA",
            DocType::RiskManagement => "Plan de gestion des risques",
            DocType::DataQuality => "Procédure de qualité des données",
            DocType::ContinuousMonitoring => "Plan de surveillance continue",
            DocType::TrainingCensus => "Recensement des formations AI Act",
            DocType::RegistryProof => "Preuve d'usage d'un registre centralisé",
        }
    }

    pub fn todo_text(self) -> &'static str {
        match self {
            DocType::StoppingProof => "Compléter la preuve d'arrêt du système",
            DocType::SystemPrompt => "Définir les instructions système & prompts",
            DocType::TechnicalDocumentation => "Importer la documentation technique",
            DocType::HumanOversight => "Désigner le(s) responsable(s) de surveillance",
            DocType::TransparencyMarking => "Renseigner le marquage de transparence",
            DocType::RiskManagement => "Joindre le plan de gestion des risques",
            DocType::DataQuality => "Justifier la qualité des données (Procédure)",
            DocType::ContinuousMonitoring => "Établir le plan de surveillance continue",
            DocType::TrainingCensus => "Recenser les formations AI Act",
            DocType::RegistryProof => "Prouver l'usage d'un registre centralisé",
        }
    }
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Type de document inconnu : {0}")]
pub struct UnknownDocType(pub String);

impl FromStr for DocType {
    type Err = UnknownDocType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocType::ALL
            .into_iter()
            .find(|doc_type| doc_type.as_str() == s)
            .ok_or_else(|| UnknownDocType(s.to_string()))
    }
}
