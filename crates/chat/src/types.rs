//! Oeffentliche Typen fuer den Chat-Service

use plausch_core::types::{MessageId, RoomId, UserId};
use plausch_db::models::{NachrichtRecord, ReaktionsMap, ZustellStatus};
use serde::{Deserialize, Serialize};

/// Maximale Nachrichtenlaenge in Zeichen
pub const NACHRICHT_MAX_LAENGE: usize = 4096;

/// Eine Chat-Nachricht (Domain-Typ, nicht DB-Record)
///
/// `deleted` ist monoton: einmal gesetzt wird es nie zurueckgenommen. Der
/// Inhalt bleibt erhalten, die Render-Schicht blendet ihn aus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatNachricht {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub content: String,
    /// Sekunden seit Epoch
    pub timestamp: i64,
    pub is_group: bool,
    pub status: ZustellStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<MessageId>,
    pub deleted: bool,
    #[serde(default)]
    pub reactions: ReaktionsMap,
}

impl ChatNachricht {
    /// Prueft ob der angegebene Benutzer irgendeine Reaktion haelt
    pub fn hat_reaktion_von(&self, user_id: &UserId) -> bool {
        self.reactions.values().any(|nutzer| nutzer.contains(user_id))
    }
}

/// Konvertiert einen DB-Record in den Domain-Typ
pub(crate) fn record_zu_nachricht(record: NachrichtRecord) -> ChatNachricht {
    ChatNachricht {
        id: record.id,
        room_id: record.room_id,
        sender_id: record.sender_id,
        content: record.content,
        timestamp: record.timestamp,
        is_group: record.is_group,
        status: record.status,
        attachment_url: record.attachment_url,
        attachment_type: record.attachment_type,
        reply_to_id: record.reply_to_id,
        deleted: record.deleted,
        reactions: record.reactions,
    }
}
