//! In-Memory-Implementierung des Dokumenten-Stores
//!
//! Haelt alle Nachrichten in einer DashMap plus einem Insertion-Order-Index
//! pro Raum. Gedacht fuer Betrieb ohne externe Datenbank und fuer Tests –
//! die Operationen entsprechen exakt der Trait-Grenze, sodass eine echte
//! Dokumenten-Datenbank spaeter transparent eingesetzt werden kann.

use async_trait::async_trait;
use dashmap::DashMap;
use plausch_core::types::{MessageId, RoomId};

use crate::error::{DbError, DbResult};
use crate::models::{NachrichtRecord, NeueNachricht, ReaktionsMap};
use crate::repository::MessageRepository;

/// In-Memory-Dokumenten-Store fuer Nachrichten
///
/// Thread-safe via DashMap. Clone teilt keinen Zustand – der Store wird
/// als `Arc<MemoryDb>` zwischen Tasks geteilt.
#[derive(Debug, Default)]
pub struct MemoryDb {
    /// Alle Nachrichten, indiziert nach MessageId
    nachrichten: DashMap<MessageId, NachrichtRecord>,
    /// Einfuege-Reihenfolge pro Raum (fuer stabile History-Sortierung)
    raum_index: DashMap<RoomId, Vec<MessageId>>,
}

impl MemoryDb {
    /// Erstellt einen neuen leeren Store
    pub fn neu() -> Self {
        Self::default()
    }

    /// Gibt die Gesamtzahl gespeicherter Nachrichten zurueck
    pub fn anzahl(&self) -> usize {
        self.nachrichten.len()
    }
}

#[async_trait]
impl MessageRepository for MemoryDb {
    async fn create(&self, neu: NeueNachricht) -> DbResult<NachrichtRecord> {
        let record = NachrichtRecord {
            id: MessageId::new(),
            room_id: neu.room_id.clone(),
            sender_id: neu.sender_id,
            content: neu.content,
            timestamp: chrono::Utc::now().timestamp(),
            is_group: neu.is_group,
            status: neu.status,
            attachment_url: neu.attachment_url,
            attachment_type: neu.attachment_type,
            reply_to_id: neu.reply_to_id,
            deleted: false,
            reactions: ReaktionsMap::new(),
        };

        self.raum_index
            .entry(neu.room_id)
            .or_default()
            .push(record.id);
        self.nachrichten.insert(record.id, record.clone());

        tracing::trace!(message_id = %record.id, room_id = %record.room_id, "Nachricht angelegt");
        Ok(record)
    }

    async fn get_by_id(&self, id: MessageId) -> DbResult<Option<NachrichtRecord>> {
        Ok(self.nachrichten.get(&id).map(|e| e.clone()))
    }

    async fn history_by_room(&self, room: &RoomId) -> DbResult<Vec<NachrichtRecord>> {
        let ids = match self.raum_index.get(room) {
            Some(ids) => ids.clone(),
            None => return Ok(Vec::new()),
        };

        let mut records: Vec<NachrichtRecord> = ids
            .iter()
            .filter_map(|id| self.nachrichten.get(id).map(|e| e.clone()))
            .collect();

        // Stabil: Gleichstand im Timestamp behaelt die Einfuege-Reihenfolge
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }

    async fn set_deleted(&self, id: MessageId) -> DbResult<bool> {
        match self.nachrichten.get_mut(&id) {
            Some(mut record) => {
                record.deleted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_reactions(&self, id: MessageId, reactions: &ReaktionsMap) -> DbResult<()> {
        match self.nachrichten.get_mut(&id) {
            Some(mut record) => {
                record.reactions = reactions.clone();
                Ok(())
            }
            None => Err(DbError::NichtGefunden(id.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ZustellStatus;
    use plausch_core::types::UserId;

    fn neue_nachricht(raum: &RoomId, inhalt: &str) -> NeueNachricht {
        NeueNachricht {
            room_id: raum.clone(),
            sender_id: UserId::new(),
            content: inhalt.into(),
            is_group: true,
            status: ZustellStatus::Sent,
            attachment_url: None,
            attachment_type: None,
            reply_to_id: None,
        }
    }

    #[tokio::test]
    async fn create_vergibt_id_und_timestamp() {
        let db = MemoryDb::neu();
        let raum = RoomId::gruppe("general");

        let record = db.create(neue_nachricht(&raum, "hallo")).await.unwrap();
        assert!(record.timestamp > 0);
        assert!(!record.deleted);
        assert!(record.reactions.is_empty());
        assert_eq!(db.anzahl(), 1);
    }

    #[tokio::test]
    async fn history_enthaelt_geloeschte_und_ist_sortiert() {
        let db = MemoryDb::neu();
        let raum = RoomId::gruppe("general");

        let erste = db.create(neue_nachricht(&raum, "erste")).await.unwrap();
        let zweite = db.create(neue_nachricht(&raum, "zweite")).await.unwrap();
        db.set_deleted(erste.id).await.unwrap();

        let history = db.history_by_room(&raum).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, erste.id, "Einfuege-Reihenfolge bei Gleichstand");
        assert_eq!(history[1].id, zweite.id);
        assert!(history[0].deleted);
    }

    #[tokio::test]
    async fn history_fremder_raum_ist_leer() {
        let db = MemoryDb::neu();
        let raum = RoomId::gruppe("general");
        db.create(neue_nachricht(&raum, "hallo")).await.unwrap();

        let andere = db.history_by_room(&RoomId::gruppe("anderswo")).await.unwrap();
        assert!(andere.is_empty());
    }

    #[tokio::test]
    async fn set_deleted_ist_monoton() {
        let db = MemoryDb::neu();
        let raum = RoomId::gruppe("general");
        let record = db.create(neue_nachricht(&raum, "weg damit")).await.unwrap();

        assert!(db.set_deleted(record.id).await.unwrap());
        // Erneutes Loeschen ist ein No-Op, das Flag bleibt gesetzt
        assert!(db.set_deleted(record.id).await.unwrap());
        let geladen = db.get_by_id(record.id).await.unwrap().unwrap();
        assert!(geladen.deleted);
    }

    #[tokio::test]
    async fn set_deleted_unbekannte_id() {
        let db = MemoryDb::neu();
        assert!(!db.set_deleted(MessageId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn update_reactions_ersetzt_feld() {
        let db = MemoryDb::neu();
        let raum = RoomId::gruppe("general");
        let record = db.create(neue_nachricht(&raum, "reagier mal")).await.unwrap();

        let nutzer = UserId::new();
        let mut reaktionen = ReaktionsMap::new();
        reaktionen.insert("👍".into(), vec![nutzer]);
        db.update_reactions(record.id, &reaktionen).await.unwrap();

        let geladen = db.get_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(geladen.reactions, reaktionen);
    }

    #[tokio::test]
    async fn update_reactions_unbekannte_id_schlaegt_fehl() {
        let db = MemoryDb::neu();
        let result = db.update_reactions(MessageId::new(), &ReaktionsMap::new()).await;
        assert!(matches!(result, Err(DbError::NichtGefunden(_))));
    }
}
