//! Fehlertypen fuer das Chat-Crate

use thiserror::Error;

/// Chat-Fehlertypen
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Nachricht nicht gefunden: {0}")]
    NachrichtNichtGefunden(String),

    #[error("Keine Berechtigung: {0}")]
    KeineBerechtigung(String),

    #[error("Ungueltige Eingabe: {0}")]
    UngueltigeEingabe(String),

    #[error("Datenbank-Fehler: {0}")]
    DatenbankFehler(#[from] plausch_db::DbError),
}

pub type ChatResult<T> = Result<T, ChatError>;
