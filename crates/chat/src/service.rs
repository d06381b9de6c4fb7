//! ChatService – Nachrichten senden, Reaktionen, Loeschen, History

use std::sync::Arc;

use plausch_core::types::{MessageId, RoomId, UserId};
use plausch_db::models::{NeueNachricht, ReaktionsMap, ZustellStatus};
use plausch_db::MessageRepository;

use crate::error::{ChatError, ChatResult};
use crate::types::{record_zu_nachricht, ChatNachricht, NACHRICHT_MAX_LAENGE};

/// Daten zum Senden einer neuen Nachricht
#[derive(Debug, Clone)]
pub struct SendeAnfrage {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub content: String,
    pub is_group: bool,
    pub attachment_url: Option<String>,
    pub attachment_type: Option<String>,
    pub reply_to_id: Option<MessageId>,
}

/// ChatService verwaltet Text-Nachrichten in Raeumen
///
/// Das Repository wird injiziert; welche Dokumenten-Datenbank dahinter
/// steht ist fuer die Geschaeftslogik unsichtbar.
pub struct ChatService {
    repo: Arc<dyn MessageRepository>,
}

impl ChatService {
    /// Erstellt einen neuen ChatService
    pub fn neu(repo: Arc<dyn MessageRepository>) -> Arc<Self> {
        Arc::new(Self { repo })
    }

    /// Nachricht in einem Raum senden
    ///
    /// ID und Timestamp vergibt das Persistenz-Gateway. Leere Nachrichten
    /// sind nur mit Anhang erlaubt.
    pub async fn nachricht_senden(&self, anfrage: SendeAnfrage) -> ChatResult<ChatNachricht> {
        if anfrage.content.trim().is_empty() && anfrage.attachment_url.is_none() {
            return Err(ChatError::UngueltigeEingabe("Leere Nachricht".into()));
        }

        if anfrage.content.len() > NACHRICHT_MAX_LAENGE {
            return Err(ChatError::UngueltigeEingabe(format!(
                "Nachricht zu lang: {} Zeichen (Maximum: {})",
                anfrage.content.len(),
                NACHRICHT_MAX_LAENGE
            )));
        }

        let record = self
            .repo
            .create(NeueNachricht {
                room_id: anfrage.room_id,
                sender_id: anfrage.sender_id,
                content: anfrage.content,
                is_group: anfrage.is_group,
                status: ZustellStatus::Sent,
                attachment_url: anfrage.attachment_url,
                attachment_type: anfrage.attachment_type,
                reply_to_id: anfrage.reply_to_id,
            })
            .await?;

        Ok(record_zu_nachricht(record))
    }

    /// Reaktion hinzufuegen
    ///
    /// Durchgesetzte Invariante: ein Benutzer haelt pro Nachricht hoechstens
    /// ein Emoji. Der Benutzer wird in einem Schritt aus allen anderen
    /// Emoji-Eintraegen entfernt und dem Ziel-Emoji hinzugefuegt, dann wird
    /// die komplette Map als Feld-Update persistiert.
    pub async fn reaktion_hinzufuegen(
        &self,
        message_id: MessageId,
        user_id: UserId,
        emoji: &str,
    ) -> ChatResult<ChatNachricht> {
        if emoji.trim().is_empty() {
            return Err(ChatError::UngueltigeEingabe("Leeres Emoji".into()));
        }

        let mut record = self
            .repo
            .get_by_id(message_id)
            .await?
            .ok_or_else(|| ChatError::NachrichtNichtGefunden(message_id.to_string()))?;

        // Benutzer aus allen Eintraegen entfernen, dann dem Ziel hinzufuegen
        benutzer_entfernen(&mut record.reactions, &user_id);
        record
            .reactions
            .entry(emoji.to_string())
            .or_default()
            .push(user_id);

        self.repo.update_reactions(message_id, &record.reactions).await?;

        tracing::debug!(
            message_id = %message_id,
            user_id = %user_id,
            emoji = %emoji,
            "Reaktion hinzugefuegt"
        );
        Ok(record_zu_nachricht(record))
    }

    /// Reaktion entfernen
    ///
    /// Entfernt den Benutzer nur aus dem genannten Emoji-Eintrag. Ein
    /// Entfernen ohne vorhandene Reaktion ist ein No-Op.
    pub async fn reaktion_entfernen(
        &self,
        message_id: MessageId,
        user_id: UserId,
        emoji: &str,
    ) -> ChatResult<ChatNachricht> {
        let mut record = self
            .repo
            .get_by_id(message_id)
            .await?
            .ok_or_else(|| ChatError::NachrichtNichtGefunden(message_id.to_string()))?;

        if let Some(nutzer) = record.reactions.get_mut(emoji) {
            nutzer.retain(|uid| uid != &user_id);
            if nutzer.is_empty() {
                record.reactions.remove(emoji);
            }
        }

        self.repo.update_reactions(message_id, &record.reactions).await?;
        Ok(record_zu_nachricht(record))
    }

    /// Nachricht weich loeschen (Soft-Delete)
    ///
    /// Nur der Verfasser darf loeschen. Das Flag ist monoton, ein erneutes
    /// Loeschen der eigenen Nachricht ist ein No-Op.
    pub async fn nachricht_loeschen(
        &self,
        message_id: MessageId,
        requester_id: UserId,
    ) -> ChatResult<ChatNachricht> {
        let mut record = self
            .repo
            .get_by_id(message_id)
            .await?
            .ok_or_else(|| ChatError::NachrichtNichtGefunden(message_id.to_string()))?;

        if record.sender_id != requester_id {
            return Err(ChatError::KeineBerechtigung(
                "Nur der Verfasser kann die Nachricht loeschen".into(),
            ));
        }

        let gefunden = self.repo.set_deleted(message_id).await?;
        if !gefunden {
            return Err(ChatError::NachrichtNichtGefunden(message_id.to_string()));
        }

        record.deleted = true;
        tracing::debug!(message_id = %message_id, user_id = %requester_id, "Nachricht geloescht");
        Ok(record_zu_nachricht(record))
    }

    /// Nachrichten-History eines Raums laden (aufsteigend nach Timestamp)
    pub async fn history_laden(&self, room_id: &RoomId) -> ChatResult<Vec<ChatNachricht>> {
        let records = self.repo.history_by_room(room_id).await?;
        Ok(records.into_iter().map(record_zu_nachricht).collect())
    }

    /// Laedt eine einzelne Nachricht
    pub async fn nachricht_laden(&self, message_id: MessageId) -> ChatResult<ChatNachricht> {
        let record = self
            .repo
            .get_by_id(message_id)
            .await?
            .ok_or_else(|| ChatError::NachrichtNichtGefunden(message_id.to_string()))?;
        Ok(record_zu_nachricht(record))
    }
}

/// Entfernt einen Benutzer aus allen Emoji-Eintraegen und raeumt leere auf
fn benutzer_entfernen(reaktionen: &mut ReaktionsMap, user_id: &UserId) {
    for nutzer in reaktionen.values_mut() {
        nutzer.retain(|uid| uid != user_id);
    }
    reaktionen.retain(|_, nutzer| !nutzer.is_empty());
}
