//! plausch-chat – Nachrichten-Service
//!
//! Dieses Crate implementiert die Geschaeftslogik rund um Chat-Nachrichten:
//! - Senden mit Validierung (leerer Inhalt, Maximallaenge)
//! - Reaktionen mit der Invariante "ein Emoji pro Benutzer pro Nachricht"
//! - Weiches Loeschen (nur der Verfasser, Flag statt physischem Entfernen)
//! - History-Laden pro Raum
//!
//! Die Persistenz laeuft ueber die Dokumenten-Store-Grenze aus `plausch-db`;
//! Broadcasting an verbundene Clients ist Sache des Gateways.

pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use error::{ChatError, ChatResult};
pub use service::{ChatService, SendeAnfrage};
pub use types::ChatNachricht;
