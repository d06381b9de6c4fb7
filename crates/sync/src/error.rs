//! Fehlertypen fuer die Sync-Engine

use thiserror::Error;

/// Fehler der Client-Seite
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transienter Netzwerkfehler – loest den Reconnect-Backoff aus
    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    /// Alle Reconnect-Versuche aufgebraucht, Endzustand
    #[error("Verbindungsaufbau endgueltig gescheitert nach {versuche} Versuchen")]
    VerbindungGescheitert { versuche: u32 },

    /// Keine offene Verbindung fuer diese Operation
    #[error("Nicht verbunden")]
    NichtVerbunden,

    /// Fehler auf dem Request/Response-Pfad
    #[error("HTTP-Fehler: {0}")]
    Http(#[from] reqwest::Error),

    /// Server hat mit einem Fehlerstatus geantwortet
    #[error("Server-Fehler ({status}): {meldung}")]
    Server { status: u16, meldung: String },

    #[error("Cache-Fehler: {0}")]
    Cache(String),

    #[error("Serialisierungs-Fehler: {0}")]
    Serialisierung(#[from] serde_json::Error),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

/// Result-Typ fuer die Sync-Engine
pub type SyncResult<T> = Result<T, SyncError>;
