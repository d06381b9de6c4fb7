//! Optimistische Befehle – lokal anwenden, Vor-Bild merken, bei Fehler
//! zuruecksetzen
//!
//! Eine Reaktion wird sofort im lokalen Speicher sichtbar. Schlaegt die
//! Bestaetigung beim Server fehl, wird das gemerkte Vor-Bild wieder
//! eingespielt statt den Fehlerzustand stehen zu lassen.

use plausch_core::types::{MessageId, UserId};
use plausch_db::models::ReaktionsMap;
use plausch_protocol::ReaktionsAktion;

use crate::merge::NachrichtenSpeicher;

/// Optimistisch angewendete Reaktion mit Vor-Bild
#[derive(Debug)]
pub struct ReaktionsBefehl {
    message_id: MessageId,
    /// Reaktions-Map vor der Anwendung; `None` wenn die Nachricht lokal
    /// unbekannt war und nichts angewendet wurde
    vorher: Option<ReaktionsMap>,
}

impl ReaktionsBefehl {
    /// Wendet die Reaktion lokal an und merkt sich das Vor-Bild
    pub fn anwenden(
        speicher: &mut NachrichtenSpeicher,
        message_id: MessageId,
        user_id: UserId,
        emoji: &str,
        aktion: ReaktionsAktion,
    ) -> Self {
        let vorher = speicher.nach_id(&message_id).map(|n| n.reactions.clone());
        if vorher.is_some() {
            speicher.reaktion_anwenden(message_id, user_id, emoji, aktion);
        }
        Self { message_id, vorher }
    }

    /// Prueft ob die Anwendung den Speicher tatsaechlich veraendert hat
    pub fn wurde_angewendet(&self) -> bool {
        self.vorher.is_some()
    }

    /// Spielt das Vor-Bild zurueck (Bestaetigung fehlgeschlagen)
    pub fn zuruecksetzen(self, speicher: &mut NachrichtenSpeicher) {
        if let Some(vorher) = self.vorher {
            tracing::debug!(message_id = %self.message_id, "Reaktion zurueckgesetzt");
            speicher.reaktionen_setzen(self.message_id, vorher);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
