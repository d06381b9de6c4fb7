//! Datensatz-Modelle des Dokumenten-Stores

use plausch_core::types::{MessageId, RoomId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reaktions-Map einer Nachricht: Emoji -> Benutzer die damit reagiert haben
///
/// Invariante (vom ChatService durchgesetzt): jeder Benutzer steht in
/// hoechstens einem Emoji-Eintrag, leere Eintraege werden entfernt.
pub type ReaktionsMap = HashMap<String, Vec<UserId>>;

/// Zustellstatus einer Nachricht – reiner Client-Hinweis, nicht konsistent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZustellStatus {
    #[default]
    Sent,
    Delivered,
    Read,
}

/// Persistierter Nachrichten-Datensatz
///
/// Nachrichten werden nie physisch geloescht, nur ueber das `deleted`-Flag
/// markiert. Der Inhalt bleibt serverseitig erhalten; die Render-Schicht
/// blendet ihn aus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NachrichtRecord {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub content: String,
    /// Sekunden seit Epoch, vom Gateway beim Anlegen vergeben
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
    #[serde(default, skip_serializing_if = "ReaktionsMap::is_empty")]
    pub reactions: ReaktionsMap,
}

/// Daten zum Anlegen einer neuen Nachricht
///
/// ID und Timestamp vergibt das Gateway beim Anlegen, nicht der Aufrufer.
#[derive(Debug, Clone)]
pub struct NeueNachricht {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub content: String,
    pub is_group: bool,
    pub status: ZustellStatus,
    pub attachment_url: Option<String>,
    pub attachment_type: Option<String>,
    pub reply_to_id: Option<MessageId>,
}
