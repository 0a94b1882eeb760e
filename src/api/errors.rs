use reqwest::StatusCode;
use thiserror::Error;

/// Failures talking to the compliance backend.
///
/// `Display` yields the French message shown inline next to the acting control.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    #[error("Session expirée")]
    Unauthorized,
    #[error("Erreur réseau : {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Réponse invalide du serveur : {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Erreur de lecture du fichier : {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration de l'API invalide : {0}")]
    Config(String),
}

impl ApiError {
    /// Build an HTTP error from a non-2xx body, preferring the backend's `error` field.
    pub fn from_response_body(status: StatusCode, body: &str, fallback: &str) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            return ApiError::Unauthorized;
        }

        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                value
                    .get("error")
                    .and_then(|e| e.as_str())
                    .map(str::to_string)
            })
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string());

        ApiError::Http { status, message }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            ApiError::Transport(err) => err.status(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// Operator-facing hint printed by the CLI under the error message.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ApiError::Unauthorized => {
                Some("→ Set a fresh token: export DOSSIER_API_TOKEN=<access token>")
            }
            ApiError::Http { status, .. } => match status.as_u16() {
                403 => Some("→ The token's user does not own this use case"),
                404 => Some("→ Check the use case id and the API base URL"),
                413 => Some("→ The file exceeds the server upload limit (10 MB)"),
                500..=599 => Some("→ Backend failure, retry the action later"),
                _ => None,
            },
            ApiError::Transport(_) => {
                Some("→ Check DOSSIER_WORKFLOW_API__BASE_URL and network connectivity")
            }
            ApiError::Config(_) => Some("→ Review dossier-workflow.toml or DOSSIER_WORKFLOW_* variables"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_field_is_used_as_message() {
        let err = ApiError::from_response_body(
            StatusCode::BAD_REQUEST,
            r#"{"error":"Format de fichier non accepté"}"#,
            "Erreur lors de l'upload",
        );
        assert_eq!(err.to_string(), "Format de fichier non accepté");
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn unparseable_body_falls_back_to_default_message() {
        let err = ApiError::from_response_body(
            StatusCode::INTERNAL_SERVER_ERROR,
            "<html>oops</html>",
            "Erreur lors de l'enregistrement",
        );
        assert_eq!(err.to_string(), "Erreur lors de l'enregistrement");
        assert!(err.hint().is_some());
    }

    #[test]
    fn unauthorized_maps_to_expired_session() {
        let err = ApiError::from_response_body(StatusCode::UNAUTHORIZED, "{}", "ignored");
        assert!(matches!(err, ApiError::Unauthorized));
        assert_eq!(err.to_string(), "Session expirée");
    }
}
