//! Nachrichten-Speicher – Abgleich von Cache, History und Live-Events
//!
//! Der Speicher ist die eine Stelle an der alle drei Quellen
//! zusammenlaufen. Merge-Regeln bei gleicher Nachrichten-ID:
//!
//! - Erstellungs-Felder (Absender, Original-Timestamp, Inhalt, Anhang)
//!   sind unveraenderlich sobald gesetzt – es gibt kein Edit-Event, nur
//!   Loeschen.
//! - Veraenderliche Felder (Reaktions-Map, Loesch-Flag) uebernimmt das
//!   jeweils neuere Ereignis; das Loesch-Flag ist dabei monoton.
//! - Jede Anwendung ist idempotent und replay-sicher: dasselbe Event
//!   zweimal anzuwenden aendert nichts mehr.
//!
//! Sortiert wird stabil nach Timestamp aufsteigend; Gleichstand behaelt
//! die Ankunfts-Reihenfolge.

use plausch_chat::ChatNachricht;
use plausch_core::types::{MessageId, UserId};
use plausch_db::models::ReaktionsMap;
use plausch_protocol::ReaktionsAktion;
use std::collections::HashMap;

/// Dedupliziertes, chronologisch sortiertes Abbild eines Raums
#[derive(Debug, Default)]
pub struct NachrichtenSpeicher {
    eintraege: Vec<ChatNachricht>,
    /// MessageId -> Position in `eintraege`
    index: HashMap<MessageId, usize>,
}

impl NachrichtenSpeicher {
    /// Erstellt einen neuen leeren Speicher
    pub fn neu() -> Self {
        Self::default()
    }

    /// Uebernimmt Cache-Eintraege (Schritt 1: sofort rendern)
    pub fn aus_cache_laden(&mut self, nachrichten: Vec<ChatNachricht>) {
        for nachricht in nachrichten {
            self.einfuegen_oder_mischen(nachricht);
        }
    }

    /// Uebernimmt die dauerhafte History (Schritt 2: massgeblich)
    ///
    /// Fuer bereits bekannte IDs gelten die normalen Merge-Regeln, neue
    /// IDs werden eingefuegt.
    pub fn history_uebernehmen(&mut self, nachrichten: Vec<ChatNachricht>) {
        for nachricht in nachrichten {
            self.einfuegen_oder_mischen(nachricht);
        }
        self.sortieren();
    }

    /// Fuegt eine Nachricht ein oder mischt sie in den bestehenden Eintrag
    ///
    /// Shallow-Merge: Reaktions-Map und Loesch-Flag kommen vom neuen
    /// Datensatz, alle Erstellungs-Felder bleiben vom bestehenden erhalten.
    pub fn einfuegen_oder_mischen(&mut self, neu: ChatNachricht) {
        match self.index.get(&neu.id) {
            Some(&pos) => {
                let bestehend = &mut self.eintraege[pos];
                bestehend.reactions = neu.reactions;
                // Monoton: einmal geloescht bleibt geloescht
                bestehend.deleted = bestehend.deleted || neu.deleted;
            }
            None => {
                self.index.insert(neu.id, self.eintraege.len());
                self.eintraege.push(neu);
            }
        }
    }

    /// Wendet ein Live-Message-Event an
    ///
    /// Message-Frames tragen keine Reaktions-Daten, deshalb gilt hier
    /// reine Deduplizierung: bekannte IDs bleiben unveraendert, nur neue
    /// werden eingefuegt.
    pub fn message_event(&mut self, nachricht: ChatNachricht) -> bool {
        if self.index.contains_key(&nachricht.id) {
            return false;
        }
        self.index.insert(nachricht.id, self.eintraege.len());
        self.eintraege.push(nachricht);
        true
    }

    /// Wendet ein Reaktions-Event an (idempotent)
    ///
    /// `Add` setzt die Invariante "ein Emoji pro Benutzer" lokal genauso
    /// durch wie der Server. Events fuer unbekannte Nachrichten sind ein
    /// No-Op.
    pub fn reaktion_anwenden(
        &mut self,
        message_id: MessageId,
        user_id: UserId,
        emoji: &str,
        aktion: ReaktionsAktion,
    ) -> bool {
        let Some(&pos) = self.index.get(&message_id) else {
            return false;
        };
        let nachricht = &mut self.eintraege[pos];

        match aktion {
            ReaktionsAktion::Add => {
                for nutzer in nachricht.reactions.values_mut() {
                    nutzer.retain(|uid| uid != &user_id);
                }
                nachricht.reactions.retain(|_, nutzer| !nutzer.is_empty());
                nachricht
                    .reactions
                    .entry(emoji.to_string())
                    .or_default()
                    .push(user_id);
            }
            ReaktionsAktion::Remove => {
                if let Some(nutzer) = nachricht.reactions.get_mut(emoji) {
                    nutzer.retain(|uid| uid != &user_id);
                    if nutzer.is_empty() {
                        nachricht.reactions.remove(emoji);
                    }
                }
            }
        }
        true
    }

    /// Ersetzt die Reaktions-Map einer Nachricht komplett
    ///
    /// Wird vom Befehls-Zuruecksetzen genutzt um ein Vor-Bild
    /// wiederherzustellen.
    pub fn reaktionen_setzen(&mut self, message_id: MessageId, reaktionen: ReaktionsMap) {
        if let Some(&pos) = self.index.get(&message_id) {
            self.eintraege[pos].reactions = reaktionen;
        }
    }

    /// Wendet ein Loesch-Event an (monoton, idempotent)
    pub fn loeschung_anwenden(&mut self, message_id: MessageId) -> bool {
        let Some(&pos) = self.index.get(&message_id) else {
            return false;
        };
        self.eintraege[pos].deleted = true;
        true
    }

    /// Sortiert stabil nach Timestamp aufsteigend
    ///
    /// Mehrfaches Sortieren derselben Eingabe ist deterministisch; ein
    /// bereits sortierter Speicher bleibt unveraendert.
    pub fn sortieren(&mut self) {
        self.eintraege.sort_by_key(|n| n.timestamp);
        self.index = self
            .eintraege
            .iter()
            .enumerate()
            .map(|(pos, n)| (n.id, pos))
            .collect();
    }

    /// Gibt eine Nachricht anhand ihrer ID zurueck
    pub fn nach_id(&self, message_id: &MessageId) -> Option<&ChatNachricht> {
        self.index.get(message_id).map(|&pos| &self.eintraege[pos])
    }

    /// Gibt alle Nachrichten in aktueller Reihenfolge zurueck
    pub fn alle(&self) -> &[ChatNachricht] {
        &self.eintraege
    }

    /// Kopie des aktuellen Stands (fuer Cache-Persistierung und UI)
    pub fn schnappschuss(&self) -> Vec<ChatNachricht> {
        self.eintraege.clone()
    }

    pub fn len(&self) -> usize {
        self.eintraege.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eintraege.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use plausch_core::types::RoomId;
    use plausch_db::models::ZustellStatus;

    fn nachricht(timestamp: i64, inhalt: &str) -> ChatNachricht {
        ChatNachricht {
            id: MessageId::new(),
            room_id: RoomId::gruppe("general"),
            sender_id: UserId::new(),
            content: inhalt.into(),
            timestamp,
            is_group: true,
            status: ZustellStatus::Sent,
            attachment_url: None,
            attachment_type: None,
            reply_to_id: None,
            deleted: false,
            reactions: ReaktionsMap::new(),
        }
    }

    #[test]
    fn dedup_gleiche_id_aus_history_und_live() {
        let mut speicher = NachrichtenSpeicher::neu();
        let n = nachricht(100, "hello");

        speicher.history_uebernehmen(vec![n.clone()]);
        let eingefuegt = speicher.message_event(n);

        assert!(!eingefuegt, "Bekannte ID darf nicht erneut eingefuegt werden");
        assert_eq!(speicher.len(), 1);
    }

    #[test]
    fn message_event_ueberschreibt_keine_reaktionen() {
        let mut speicher = NachrichtenSpeicher::neu();
        let n = nachricht(100, "hello");
        let id = n.id;
        speicher.history_uebernehmen(vec![n.clone()]);

        let reagierer = UserId::new();
        speicher.reaktion_anwenden(id, reagierer, "👍", ReaktionsAktion::Add);

        // Dasselbe Message-Event trifft verspaetet nochmal ein
        speicher.message_event(n);
        assert_eq!(
            speicher.nach_id(&id).unwrap().reactions.get("👍"),
            Some(&vec![reagierer])
        );
    }

    #[test]
    fn reaktion_anwenden_ist_idempotent() {
        let mut speicher = NachrichtenSpeicher::neu();
        let n = nachricht(100, "m1");
        let id = n.id;
        speicher.history_uebernehmen(vec![n]);

        let reagierer = UserId::new();
        speicher.reaktion_anwenden(id, reagierer, "👍", ReaktionsAktion::Add);
        speicher.reaktion_anwenden(id, reagierer, "👍", ReaktionsAktion::Add);

        assert_eq!(
            speicher.nach_id(&id).unwrap().reactions.get("👍").map(Vec::len),
            Some(1),
            "Doppeltes Anwenden darf keinen doppelten Eintrag erzeugen"
        );
    }

    #[test]
    fn ein_emoji_pro_benutzer() {
        let mut speicher = NachrichtenSpeicher::neu();
        let n = nachricht(100, "m1");
        let id = n.id;
        speicher.history_uebernehmen(vec![n]);

        let reagierer = UserId::new();
        speicher.reaktion_anwenden(id, reagierer, "👍", ReaktionsAktion::Add);
        speicher.reaktion_anwenden(id, reagierer, "😂", ReaktionsAktion::Add);

        let reaktionen = &speicher.nach_id(&id).unwrap().reactions;
        assert!(reaktionen.get("👍").is_none());
        assert_eq!(reaktionen.get("😂"), Some(&vec![reagierer]));
    }

    #[test]
    fn reaktion_fuer_unbekannte_nachricht_ist_noop() {
        let mut speicher = NachrichtenSpeicher::neu();
        let angewendet =
            speicher.reaktion_anwenden(MessageId::new(), UserId::new(), "👍", ReaktionsAktion::Add);
        assert!(!angewendet);
        assert!(speicher.is_empty());
    }

    #[test]
    fn loeschung_ist_monoton() {
        let mut speicher = NachrichtenSpeicher::neu();
        let mut n = nachricht(100, "weg");
        let id = n.id;
        speicher.history_uebernehmen(vec![n.clone()]);

        speicher.loeschung_anwenden(id);
        assert!(speicher.nach_id(&id).unwrap().deleted);

        // Ein verspaeteter Datensatz mit deleted=false darf das Flag
        // nicht zuruecksetzen
        n.deleted = false;
        speicher.einfuegen_oder_mischen(n);
        assert!(speicher.nach_id(&id).unwrap().deleted);
    }

    #[test]
    fn merge_bewahrt_erstellungs_felder() {
        let mut speicher = NachrichtenSpeicher::neu();
        let n = nachricht(100, "original");
        let id = n.id;
        let absender = n.sender_id;
        speicher.history_uebernehmen(vec![n.clone()]);

        // Spaeterer Datensatz mit abweichenden Erstellungs-Feldern
        let mut verfaelscht = n;
        verfaelscht.content = "manipuliert".into();
        verfaelscht.sender_id = UserId::new();
        verfaelscht.timestamp = 999;
        let reagierer = UserId::new();
        verfaelscht.reactions.insert("👍".into(), vec![reagierer]);
        speicher.einfuegen_oder_mischen(verfaelscht);

        let gemischt = speicher.nach_id(&id).unwrap();
        assert_eq!(gemischt.content, "original");
        assert_eq!(gemischt.sender_id, absender);
        assert_eq!(gemischt.timestamp, 100);
        // Veraenderliche Felder kommen vom neuen Datensatz
        assert_eq!(gemischt.reactions.get("👍"), Some(&vec![reagierer]));
    }

    #[test]
    fn sortierung_ist_stabil() {
        let mut speicher = NachrichtenSpeicher::neu();
        let a = nachricht(200, "a");
        let b = nachricht(100, "b");
        let c = nachricht(200, "c");
        speicher.aus_cache_laden(vec![a.clone(), b.clone(), c.clone()]);

        speicher.sortieren();
        let erste_runde: Vec<MessageId> = speicher.alle().iter().map(|n| n.id).collect();
        assert_eq!(erste_runde, vec![b.id, a.id, c.id], "Gleichstand behaelt Ankunfts-Reihenfolge");

        // Erneutes Sortieren ist ein No-Op
        speicher.sortieren();
        let zweite_runde: Vec<MessageId> = speicher.alle().iter().map(|n| n.id).collect();
        assert_eq!(erste_runde, zweite_runde);
    }

    #[test]
    fn schnappschuss_entspricht_dem_stand() {
        let mut speicher = NachrichtenSpeicher::neu();
        speicher.history_uebernehmen(vec![nachricht(1, "a"), nachricht(2, "b")]);
        assert_eq!(speicher.schnappschuss().len(), 2);
    }
}
