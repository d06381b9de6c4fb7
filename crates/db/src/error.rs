//! Fehlertypen fuer das Persistenz-Gateway

use thiserror::Error;

/// Fehler an der Dokumenten-Store-Grenze
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Dokument nicht gefunden: {0}")]
    NichtGefunden(String),

    #[error("Speicher-Fehler: {0}")]
    Speicher(String),
}

/// Result-Typ fuer das Persistenz-Gateway
pub type DbResult<T> = Result<T, DbError>;
