//! Fehlertypen fuer das Gateway
//!
//! Die Taxonomie folgt der Fehlerbehandlung an der Aussengrenze:
//! Auth-Fehler lehnen die Verbindung ab, Autorisierungs- und
//! Validierungsfehler gehen als Antwort an genau einen Aufrufer, Speicher-
//! Fehler unterdruecken den Broadcast. Kein Fehler einer Verbindung ist
//! fuer andere Verbindungen sichtbar.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use plausch_chat::ChatError;
use thiserror::Error;

use crate::auth::AuthError;

/// Fehlertyp fuer das Gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Token fehlt, ist ungueltig oder abgelaufen
    #[error("Authentifizierung fehlgeschlagen: {0}")]
    Auth(#[from] AuthError),

    /// Aktion ist dem Benutzer nicht erlaubt (z.B. fremde Nachricht loeschen)
    #[error("Zugriff verweigert: {0}")]
    ZugriffVerweigert(String),

    /// Fehlerhafte Anfrage (leerer Inhalt, fehlende Parameter)
    #[error("Ungueltige Anfrage: {0}")]
    Validierung(String),

    /// Ressource existiert nicht
    #[error("Nicht gefunden: {0}")]
    NichtGefunden(String),

    /// Persistenz-Operation fehlgeschlagen
    #[error("Speicher-Fehler: {0}")]
    Speicher(String),
}

impl From<ChatError> for GatewayError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::NachrichtNichtGefunden(msg) => Self::NichtGefunden(msg),
            ChatError::KeineBerechtigung(msg) => Self::ZugriffVerweigert(msg),
            ChatError::UngueltigeEingabe(msg) => Self::Validierung(msg),
            ChatError::DatenbankFehler(e) => Self::Speicher(e.to_string()),
        }
    }
}

impl GatewayError {
    /// HTTP-Status fuer die REST-Antwort
    fn status(&self) -> StatusCode {
        match self {
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::ZugriffVerweigert(_) => StatusCode::FORBIDDEN,
            Self::Validierung(_) => StatusCode::BAD_REQUEST,
            Self::NichtGefunden(_) => StatusCode::NOT_FOUND,
            Self::Speicher(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Result-Typ fuer das Gateway
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_fehler_werden_abgebildet() {
        let e: GatewayError = ChatError::KeineBerechtigung("test".into()).into();
        assert!(matches!(e, GatewayError::ZugriffVerweigert(_)));
        assert_eq!(e.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn auth_fehler_ist_401() {
        let e: GatewayError = AuthError::TokenAbgelaufen.into();
        assert_eq!(e.status(), StatusCode::UNAUTHORIZED);
    }
}
