//! plausch-sync – Client-Sync-Engine
//!
//! Erzeugt aus drei Quellen eine einzige, deduplizierte, chronologisch
//! sortierte Sicht auf die Nachrichten eines Raums:
//!
//! 1. Lokaler Cache – sofort gerendert, veraltet-aber-schnell
//! 2. Dauerhafte History ueber den Request/Response-Pfad – massgeblich
//!    fuer Existenz und Erstellungs-Felder
//! 3. Live-Events ueber die persistente Verbindung – massgeblich fuer
//!    die veraenderlichen Felder (Reaktionen, Loesch-Flag)
//!
//! Dazu kommt der Verbindungs-Lebenszyklus: expliziter Zustandsautomat
//! mit exponentiellem Reconnect-Backoff, Keepalive-Ping und Tipp-Timern,
//! die beim Raumwechsel alle synchron gestoppt werden.

pub mod api;
pub mod befehle;
pub mod cache;
pub mod engine;
pub mod error;
pub mod merge;
pub mod typing;
pub mod verbindung;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use api::{AbrufPfad, ApiClient, ApiSendeAnfrage};
pub use befehle::ReaktionsBefehl;
pub use cache::{DateiCache, LokalerCache};
pub use engine::{RaumSitzung, SitzungsBefehl, SyncEngine, SyncEreignis, VerbindungsStatus};
pub use error::{SyncError, SyncResult};
pub use merge::NachrichtenSpeicher;
pub use typing::TippAnzeiger;
pub use verbindung::{FrameTransport, TransportVerbinder, WsVerbinder};
