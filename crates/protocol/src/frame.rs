//! Frame-Definitionen fuer die persistente Verbindung
//!
//! Sechs Frame-Arten in beide Richtungen: `message`, `typing`, `reaction`,
//! `deletion`, `ping`/`pong` und `error`. Feldnamen und Optionalitaet
//! entsprechen dem JSON-Wire-Format (optionale Felder werden beim
//! Serialisieren weggelassen).
//!
//! ## Design
//! - Internally-tagged Enum: `{"type": "message", ...}`
//! - Dekodierung genau einmal an der Verbindungsgrenze via [`Frame::aus_json`]
//! - Unbekannte `type`-Werte schlagen beim Dekodieren fehl; der Absender
//!   bekommt ein `error`-Frame, die Verbindung bleibt offen

use plausch_core::types::{MessageId, RoomId, UserId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// Ein einzelnes Ereignis auf der persistenten Verbindung
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    /// Chat-Nachricht (Client -> Server und Server -> Client)
    Message(MessageFrame),
    /// Tipp-Indikator, ephemer, wird nie persistiert
    Typing(TypingFrame),
    /// Reaktion hinzufuegen oder entfernen
    Reaction(ReactionFrame),
    /// Loeschung einer Nachricht – traegt nie den Original-Inhalt
    Deletion(DeletionFrame),
    /// Keepalive vom Client
    Ping,
    /// Keepalive-Antwort vom Server
    Pong,
    /// Fehlermeldung an genau eine Verbindung
    Error(ErrorFrame),
}

impl Frame {
    /// Dekodiert ein Frame aus JSON-Text
    pub fn aus_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Serialisiert das Frame als JSON-Text
    pub fn als_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Erstellt ein `error`-Frame mit der angegebenen Meldung
    pub fn error(meldung: impl Into<String>) -> Self {
        Frame::Error(ErrorFrame {
            error: meldung.into(),
        })
    }
}

// ---------------------------------------------------------------------------
// Frame-Inhalte
// ---------------------------------------------------------------------------

/// Inhalt eines `message`-Frames
///
/// `message_id` und `timestamp` fehlen bei einem frischen Client-Send und
/// werden vom Server nach der Persistierung gesetzt. Das Echo an den
/// Absender traegt immer die kanonische Server-ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<MessageId>,
}

/// Inhalt eines `typing`-Frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingFrame {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub username: String,
    pub is_typing: bool,
}

/// Aktion eines `reaction`-Frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReaktionsAktion {
    Add,
    Remove,
}

/// Inhalt eines `reaction`-Frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionFrame {
    pub message_id: MessageId,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub emoji: String,
    pub action: ReaktionsAktion,
}

/// Inhalt eines `deletion`-Frames
///
/// Bewusst ohne `content`: Clients die die Nachricht als verborgen
/// darstellen sollen duerfen den Original-Text nicht erneut erhalten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionFrame {
    pub message_id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
}

/// Inhalt eines `error`-Frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
