//! Presence-Manager – Wer ist online, in welchem Raum
//!
//! Haelt den ephemeren Online-Zustand aller verbundenen Benutzer plus
//! einen Last-Seen-Zeitstempel der beim Trennen gesetzt wird. Nichts
//! davon wird persistiert.

use dashmap::DashMap;
use plausch_core::types::{RoomId, UserId};
use serde::Serialize;
use std::sync::Arc;

/// Presence-Info eines verbundenen Benutzers
#[derive(Debug, Clone, Serialize)]
pub struct BenutzerPresence {
    pub user_id: UserId,
    pub username: String,
    pub room_id: RoomId,
}

/// Verwaltet den Online-Status aller verbundenen Benutzer
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct PresenceManager {
    inner: Arc<PresenceManagerInner>,
}

struct PresenceManagerInner {
    /// Alle online Benutzer, indiziert nach UserId
    online: DashMap<UserId, BenutzerPresence>,
    /// Raum -> Benutzer in diesem Raum
    raum_benutzer: DashMap<RoomId, Vec<UserId>>,
    /// Letzter Kontakt (Sekunden seit Epoch), gesetzt beim Trennen
    last_seen: DashMap<UserId, i64>,
}

impl PresenceManager {
    /// Erstellt einen neuen PresenceManager
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(PresenceManagerInner {
                online: DashMap::new(),
                raum_benutzer: DashMap::new(),
                last_seen: DashMap::new(),
            }),
        }
    }

    /// Markiert einen Benutzer als online in einem Raum
    ///
    /// Ein Raumwechsel ohne sauberen Abbau raeumt den alten Raum-Eintrag
    /// mit auf.
    pub fn benutzer_verbunden(&self, presence: BenutzerPresence) {
        let user_id = presence.user_id;
        let room_id = presence.room_id.clone();

        if let Some(alte) = self.inner.online.insert(user_id, presence) {
            if alte.room_id != room_id {
                self.aus_raum_entfernen_intern(&user_id, &alte.room_id);
            }
        }

        let mut mitglieder = self.inner.raum_benutzer.entry(room_id.clone()).or_default();
        if !mitglieder.contains(&user_id) {
            mitglieder.push(user_id);
        }
        drop(mitglieder);

        tracing::info!(user_id = %user_id, room_id = %room_id, "Benutzer online");
    }

    /// Entfernt einen Benutzer und merkt sich den letzten Kontakt
    pub fn benutzer_getrennt(&self, user_id: &UserId) {
        if let Some((_, presence)) = self.inner.online.remove(user_id) {
            self.aus_raum_entfernen_intern(user_id, &presence.room_id);
            self.inner
                .last_seen
                .insert(*user_id, chrono::Utc::now().timestamp());
            tracing::info!(user_id = %user_id, "Benutzer offline");
        }
    }

    /// Gibt alle online Benutzer eines Raums zurueck
    pub fn online_in_raum(&self, room_id: &RoomId) -> Vec<BenutzerPresence> {
        let user_ids = match self.inner.raum_benutzer.get(room_id) {
            Some(ids) => ids.clone(),
            None => return Vec::new(),
        };

        user_ids
            .iter()
            .filter_map(|uid| self.inner.online.get(uid).map(|e| e.clone()))
            .collect()
    }

    /// Gibt alle online Benutzer zurueck
    pub fn alle_online(&self) -> Vec<BenutzerPresence> {
        self.inner.online.iter().map(|e| e.value().clone()).collect()
    }

    /// Prueft ob ein Benutzer online ist (egal in welchem Raum)
    pub fn ist_online(&self, user_id: &UserId) -> bool {
        self.inner.online.contains_key(user_id)
    }

    /// Gibt den letzten Kontakt eines Benutzers zurueck (Sekunden seit Epoch)
    pub fn letzter_kontakt(&self, user_id: &UserId) -> Option<i64> {
        self.inner.last_seen.get(user_id).map(|e| *e)
    }

    /// Gibt die Anzahl der online Benutzer zurueck
    pub fn online_anzahl(&self) -> usize {
        self.inner.online.len()
    }

    // -----------------------------------------------------------------------
    // Interne Hilfsmethoden
    // -----------------------------------------------------------------------

    fn aus_raum_entfernen_intern(&self, user_id: &UserId, room_id: &RoomId) {
        if let Some(mut mitglieder) = self.inner.raum_benutzer.get_mut(room_id) {
            mitglieder.retain(|uid| uid != user_id);
            let ist_leer = mitglieder.is_empty();
            drop(mitglieder);
            if ist_leer {
                self.inner.raum_benutzer.remove(room_id);
            }
        }
    }
}

impl Default for PresenceManager {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
