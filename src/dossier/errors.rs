use thiserror::Error;

use crate::api::ApiError;
use crate::dossier::DocType;

/// Client-side validation failures. No request is sent when one of these is raised.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Veuillez saisir une date de déploiement")]
    MissingDate,
    #[error("Date de déploiement invalide : {0}")]
    InvalidDate(String),
    #[error("Aucune date de déploiement n'est définie pour ce cas d'usage")]
    NoDeploymentDate,
    #[error("Veuillez sélectionner un fichier")]
    MissingFile,
    #[error("Veuillez saisir un texte avant d'enregistrer")]
    EmptyText,
    #[error("Format de fichier non accepté. Formats autorisés : {allowed}")]
    UnsupportedFormat { doc_type: DocType, allowed: String },
    #[error("Le document {0} n'accepte pas de fichier")]
    UploadsNotAccepted(DocType),
    #[error(
        "Le fichier est trop volumineux ({size_mb:.2} Mo). La taille maximale autorisée est de {max_mb} Mo."
    )]
    FileTooLarge { size_mb: f64, max_mb: u64 },
    #[error(
        "Limite de stockage dépassée.\n\nStockage actuel : {used_mb:.2} Mo\nFichier : {file_mb:.2} Mo\nLimite du plan : {limit_mb} Mo\n\nPour augmenter votre limite de stockage, veuillez passer à un plan supérieur."
    )]
    StorageQuotaExceeded { used_mb: f64, file_mb: f64, limit_mb: f64 },
    #[error(
        "Vous avez saisi un texte et sélectionné un fichier. Veuillez vider l'un des deux avant d'enregistrer."
    )]
    TextAndFileConflict,
}

/// Failure of a dossier document action (save, upload, delete).
#[derive(Debug, Error)]
pub enum DossierError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl DossierError {
    /// Human-readable French message for inline display.
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, DossierError::Validation(_))
    }
}
