//! Repository-Trait-Definition fuer die Dokumenten-Store-Grenze
//!
//! Das Repository-Pattern entkoppelt die Geschaeftslogik von der konkreten
//! Speicher-Implementierung. Alle Operationen entsprechen einfachen
//! Dokumenten-Store-Primitiven: create, get, Feld-Update. Der Trait ist
//! objektsicher, damit Services ein `Arc<dyn MessageRepository>` injiziert
//! bekommen koennen.

use async_trait::async_trait;
use plausch_core::types::{MessageId, RoomId};

use crate::error::DbResult;
use crate::models::{NachrichtRecord, NeueNachricht, ReaktionsMap};

/// Repository fuer Nachrichten-Datenzugriffe
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Legt eine neue Nachricht an und vergibt ID und Timestamp
    async fn create(&self, neu: NeueNachricht) -> DbResult<NachrichtRecord>;

    /// Laedt eine Nachricht anhand ihrer ID
    async fn get_by_id(&self, id: MessageId) -> DbResult<Option<NachrichtRecord>>;

    /// Laedt die komplette History eines Raums, aufsteigend nach Timestamp
    ///
    /// Geloeschte Nachrichten sind enthalten – die Render-Schicht der
    /// Clients entscheidet ueber die Darstellung.
    async fn history_by_room(&self, room: &RoomId) -> DbResult<Vec<NachrichtRecord>>;

    /// Setzt das `deleted`-Flag (monoton, ein erneutes Setzen ist ein No-Op)
    ///
    /// Gibt `false` zurueck wenn die Nachricht nicht existiert.
    async fn set_deleted(&self, id: MessageId) -> DbResult<bool>;

    /// Ersetzt die Reaktions-Map einer Nachricht (Feld-Update)
    async fn update_reactions(&self, id: MessageId, reactions: &ReaktionsMap) -> DbResult<()>;
}
