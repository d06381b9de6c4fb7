//! Raum-Registry – Verteilt Events an alle Verbindungen eines Raums
//!
//! Die Registry ist die einzige zwischen allen Verbindungen geteilte
//! Struktur. Sie verwaltet die Send-Queues aller Verbindungen und die
//! Zuordnung Raum -> Verbindungen.
//!
//! ## Broadcast-Semantik
//! - Das Frame wird pro Broadcast genau einmal serialisiert, alle
//!   Empfaenger teilen sich den Puffer (`Arc<str>`).
//! - Schreiben ist nicht-blockierend (`try_send`): eine langsame
//!   Verbindung staut nur ihre eigene Queue, nie den Broadcast.
//! - Verbindungen deren Queue voll oder geschlossen ist werden nach dem
//!   Durchlauf entfernt – ein toter Empfaenger bricht den Broadcast an
//!   die uebrigen nie ab.
//! - Leere Raeume werden ausgetragen, damit inaktive Raeume keinen
//!   Speicher binden.

use dashmap::DashMap;
use plausch_core::types::{ConnectionId, RoomId, UserId};
use plausch_protocol::Frame;
use std::sync::Arc;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Groesse der Send-Queue pro Verbindung
const SENDE_QUEUE_GROESSE: usize = 64;

/// Ein bereits serialisiertes Frame, geteilt zwischen allen Empfaengern
pub type BroadcastText = Arc<str>;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue einer verbundenen Verbindung
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub room_id: RoomId,
    tx: mpsc::Sender<BroadcastText>,
}

impl ClientSender {
    /// Reiht einen Text nicht-blockierend in die Send-Queue ein
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    fn senden(&self, text: BroadcastText) -> bool {
        match self.tx.try_send(text) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    connection_id = %self.connection_id,
                    user_id = %self.user_id,
                    "Send-Queue voll – Frame verworfen"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(
                    connection_id = %self.connection_id,
                    "Send-Queue geschlossen (Verbindung getrennt)"
                );
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RaumRegistry
// ---------------------------------------------------------------------------

/// Zentrale Registry: Raum -> verbundene Verbindungen
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct RaumRegistry {
    inner: Arc<RaumRegistryInner>,
}

struct RaumRegistryInner {
    /// Alle Verbindungen, indiziert nach ConnectionId
    verbindungen: DashMap<ConnectionId, ClientSender>,
    /// Raum-Mitgliedschaft: room_id -> Verbindungen in Beitritts-Reihenfolge
    raum_mitglieder: DashMap<RoomId, Vec<ConnectionId>>,
}

impl RaumRegistry {
    /// Erstellt eine neue leere Registry
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(RaumRegistryInner {
                verbindungen: DashMap::new(),
                raum_mitglieder: DashMap::new(),
            }),
        }
    }

    /// Registriert eine Verbindung in einem Raum und gibt ihre
    /// Empfangs-Queue zurueck
    ///
    /// Der Raum-Eintrag wird bei Bedarf angelegt. Die `ClientVerbindung`
    /// liest aus dieser Queue und schreibt auf den WebSocket.
    pub fn beitreten(
        &self,
        room_id: RoomId,
        connection_id: ConnectionId,
        user_id: UserId,
    ) -> mpsc::Receiver<BroadcastText> {
        let (tx, rx) = mpsc::channel(SENDE_QUEUE_GROESSE);
        let sender = ClientSender {
            connection_id,
            user_id,
            room_id: room_id.clone(),
            tx,
        };

        self.inner.verbindungen.insert(connection_id, sender);
        self.inner
            .raum_mitglieder
            .entry(room_id.clone())
            .or_default()
            .push(connection_id);

        tracing::debug!(
            connection_id = %connection_id,
            user_id = %user_id,
            room_id = %room_id,
            "Verbindung dem Raum beigetreten"
        );
        rx
    }

    /// Entfernt eine Verbindung aus der Registry
    ///
    /// Wird der Raum dadurch leer, wird sein Eintrag ausgetragen.
    pub fn verlassen(&self, connection_id: &ConnectionId) {
        let Some((_, sender)) = self.inner.verbindungen.remove(connection_id) else {
            return;
        };

        if let Some(mut mitglieder) = self.inner.raum_mitglieder.get_mut(&sender.room_id) {
            mitglieder.retain(|cid| cid != connection_id);
            let ist_leer = mitglieder.is_empty();
            drop(mitglieder);
            if ist_leer {
                self.inner.raum_mitglieder.remove(&sender.room_id);
            }
        }

        tracing::debug!(
            connection_id = %connection_id,
            room_id = %sender.room_id,
            "Verbindung aus dem Raum entfernt"
        );
    }

    /// Sendet ein Frame an alle Verbindungen eines Raums
    ///
    /// Gibt die Anzahl der erfolgreich eingereihten Sendungen zurueck.
    pub fn an_raum_senden(&self, room_id: &RoomId, frame: &Frame) -> usize {
        self.broadcast(room_id, frame, None)
    }

    /// Sendet ein Frame an alle Verbindungen eines Raums ausser einer
    ///
    /// Wird fuer Reaktionen und Tipp-Indikatoren genutzt: der Ausloeser
    /// hat die Aenderung bereits lokal angewendet.
    pub fn an_raum_ausser_senden(
        &self,
        room_id: &RoomId,
        ausgeschlossen: &ConnectionId,
        frame: &Frame,
    ) -> usize {
        self.broadcast(room_id, frame, Some(ausgeschlossen))
    }

    fn broadcast(
        &self,
        room_id: &RoomId,
        frame: &Frame,
        ausgeschlossen: Option<&ConnectionId>,
    ) -> usize {
        // Einmal serialisieren, alle Empfaenger teilen sich den Puffer
        let text: BroadcastText = match frame.als_json() {
            Ok(json) => Arc::from(json.as_str()),
            Err(e) => {
                tracing::error!(room_id = %room_id, fehler = %e, "Frame-Serialisierung fehlgeschlagen");
                return 0;
            }
        };

        let mitglieder = match self.inner.raum_mitglieder.get(room_id) {
            Some(ids) => ids.clone(),
            None => return 0,
        };

        let mut gesendet = 0;
        let mut tote: Vec<ConnectionId> = Vec::new();

        for connection_id in &mitglieder {
            if Some(connection_id) == ausgeschlossen {
                continue;
            }
            match self.inner.verbindungen.get(connection_id) {
                Some(sender) => {
                    if sender.senden(Arc::clone(&text)) {
                        gesendet += 1;
                    } else {
                        tote.push(*connection_id);
                    }
                }
                None => tote.push(*connection_id),
            }
        }

        // Tote Verbindungen erst nach dem Durchlauf austragen
        for connection_id in &tote {
            self.verlassen(connection_id);
        }

        gesendet
    }

    /// Gibt die Anzahl der Verbindungen in einem Raum zurueck
    pub fn verbindungen_in_raum(&self, room_id: &RoomId) -> usize {
        self.inner
            .raum_mitglieder
            .get(room_id)
            .map(|ids| ids.len())
            .unwrap_or(0)
    }

    /// Prueft ob eine Verbindung registriert ist
    pub fn ist_registriert(&self, connection_id: &ConnectionId) -> bool {
        self.inner.verbindungen.contains_key(connection_id)
    }

    /// Gibt die Anzahl aktiver Raeume zurueck
    pub fn raum_anzahl(&self) -> usize {
        self.inner.raum_mitglieder.len()
    }
}

impl Default for RaumRegistry {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
