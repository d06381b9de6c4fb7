//! plausch-gateway – WebSocket-Gateway und Raum-Broadcast
//!
//! Dieses Crate implementiert die Echtzeit-Seite des Servers: es nimmt
//! WebSocket-Verbindungen an, prueft Raum-Parameter und Bearer-Token vor
//! dem Upgrade, dekodiert eingehende Frames genau einmal und verteilt
//! Ereignisse ueber die Raum-Registry an alle Verbindungen eines Raums.
//!
//! ## Architektur
//!
//! ```text
//! Axum Router (/ws + /api/...)
//!     |
//!     v
//! ClientVerbindung (pro WebSocket ein Task)
//!     |  State Machine: Verbindet -> Authentifiziert -> Aktiv -> Schliessend -> Geschlossen
//!     |
//!     v
//! FrameDispatcher
//!     |
//!     +-- message   (persistieren, Echo an den ganzen Raum)
//!     +-- reaction  (ein Emoji pro Benutzer, Raum ausser Ausloeser)
//!     +-- typing    (ephemer, Raum ausser Ausloeser)
//!     +-- deletion  (nur Verfasser, nie mit Original-Inhalt)
//!     +-- ping      (Pong nur an den Absender)
//!
//! RaumRegistry    – Raum -> Verbindungen, Broadcast mit einmaliger Serialisierung
//! PresenceManager – Wer ist online, in welchem Raum, last-seen
//! TokenPruefer    – Grenze zum externen Auth-Dienst
//! ```

pub mod auth;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod presence;
pub mod registry;
pub mod routes;
pub mod server_state;

// Bequeme Re-Exporte
pub use auth::{AuthError, TokenClaims, TokenPruefer, TokenStore};
pub use connection::ClientVerbindung;
pub use dispatcher::FrameDispatcher;
pub use error::{GatewayError, GatewayResult};
pub use presence::PresenceManager;
pub use registry::RaumRegistry;
pub use routes::router;
pub use server_state::GatewayState;
