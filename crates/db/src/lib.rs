//! plausch-db – Persistenz-Gateway fuer Plausch
//!
//! Die Speicher-Engine selbst ist ein externer Kollaborateur: ein
//! Dokumenten-Store der ueber einfache get/put/update-field-Operationen
//! erreichbar ist. Dieses Crate definiert die Grenze als Trait
//! ([`MessageRepository`]) und liefert [`MemoryDb`] als In-Memory-
//! Implementierung fuer Server-Betrieb ohne externe Datenbank und fuer
//! Tests.

pub mod error;
pub mod memory;
pub mod models;
pub mod repository;

// Bequeme Re-Exporte
pub use error::{DbError, DbResult};
pub use memory::MemoryDb;
pub use models::{NachrichtRecord, NeueNachricht, ReaktionsMap, ZustellStatus};
pub use repository::MessageRepository;
