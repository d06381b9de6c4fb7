//! Gemeinsame Identifikationstypen fuer Plausch
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen. Raum-IDs sind
//! keine UUIDs sondern deterministisch abgeleitete Strings, damit beide
//! Teilnehmer eines Privat-Chats unabhaengig voneinander denselben Raum
//! berechnen koennen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige Benutzer-ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Erstellt eine neue zufaellige UserId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

/// Eindeutige Nachrichten-ID
///
/// Wird ausschliesslich vom Persistenz-Gateway beim Anlegen vergeben.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Erstellt eine neue zufaellige MessageId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "msg:{}", self.0)
    }
}

/// Eindeutige ID einer einzelnen Verbindung
///
/// Verbindungen sind ephemer: ein Benutzer kann mehrere Verbindungen
/// halten (zwei Browser-Tabs), daher ist die UserId als Registry-Schluessel
/// ungeeignet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Raum-ID – deterministischer String statt UUID
///
/// Zwei Formen:
/// - Privat-Chat: `private_{a}_{b}` mit den beiden UserIds aufsteigend
///   sortiert. Dadurch ergibt jedes Paar unabhaengig von der
///   Beitritts-Reihenfolge dieselbe Raum-ID.
/// - Gruppen-Chat: `group_{name}` mit dem Namen kleingeschrieben und
///   Whitespace durch Unterstriche ersetzt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Uebernimmt eine rohe Raum-ID (z.B. aus einem Query-Parameter)
    pub fn neu(roh: impl Into<String>) -> Self {
        Self(roh.into())
    }

    /// Leitet die Raum-ID fuer einen Privat-Chat zwischen zwei Benutzern ab
    ///
    /// Symmetrisch: `privat(a, b) == privat(b, a)`.
    pub fn privat(a: UserId, b: UserId) -> Self {
        let (kleiner, groesser) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("private_{}_{}", kleiner.inner(), groesser.inner()))
    }

    /// Leitet die Raum-ID fuer einen Gruppen-Chat aus dem Anzeigenamen ab
    pub fn gruppe(name: &str) -> Self {
        let teile: Vec<&str> = name.split_whitespace().collect();
        Self(format!("group_{}", teile.join("_").to_lowercase()))
    }

    /// Prueft ob dieser Raum ein Gruppen-Raum ist
    pub fn ist_gruppe(&self) -> bool {
        self.0.starts_with("group_")
    }

    /// Gibt die ID als String-Slice zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RoomId {
    fn from(roh: String) -> Self {
        Self(roh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_eindeutig() {
        let a = UserId::new();
        let b = UserId::new();
        assert_ne!(a, b, "Zwei neue UserIds muessen verschieden sein");
    }

    #[test]
    fn privat_raum_id_symmetrisch() {
        let a = UserId::new();
        let b = UserId::new();
        assert_eq!(RoomId::privat(a, b), RoomId::privat(b, a));
    }

    #[test]
    fn privat_raum_id_format() {
        let a = UserId(Uuid::nil());
        let b = UserId::new();
        let raum = RoomId::privat(a, b);
        assert!(raum.as_str().starts_with("private_"));
        assert!(!raum.ist_gruppe());
    }

    #[test]
    fn gruppen_raum_id_slug() {
        let raum = RoomId::gruppe("Rust  Anfaenger Treff");
        assert_eq!(raum.as_str(), "group_rust_anfaenger_treff");
        assert!(raum.ist_gruppe());
    }

    #[test]
    fn ids_sind_serde_kompatibel() {
        let uid = UserId::new();
        let json = serde_json::to_string(&uid).unwrap();
        let uid2: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(uid, uid2);
    }

    #[test]
    fn raum_id_serde_transparent() {
        let raum = RoomId::gruppe("general");
        let json = serde_json::to_string(&raum).unwrap();
        assert_eq!(json, "\"group_general\"");
    }
}
