//! plausch-core – Gemeinsame Typen fuer Plausch
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Plausch-Crates gemeinsam genutzt werden: ID-Newtypes und die
//! deterministische Raum-ID-Ableitung.

pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use types::{ConnectionId, MessageId, RoomId, UserId};
