//! Request/Response-Pfad des Clients
//!
//! Der Sync-Engine ist egal, dass dahinter HTTP steckt – er spricht nur
//! [`AbrufPfad`]. `ApiClient` ist die reqwest-Implementierung gegen die
//! `/api`-Routen des Gateways. Der Pfad dient dem History-Fetch und als
//! einzelner Fallback-Hop wenn die persistente Verbindung beim Senden
//! versagt.

use async_trait::async_trait;
use plausch_chat::ChatNachricht;
use plausch_core::types::{MessageId, RoomId};
use plausch_protocol::ReaktionsAktion;
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Daten zum Senden einer Nachricht ueber den Request/Response-Pfad
#[derive(Debug, Clone, Serialize)]
pub struct ApiSendeAnfrage {
    pub room_id: RoomId,
    pub content: String,
    pub is_group: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<MessageId>,
}

/// Grenze zum Request/Response-Pfad (History, Senden, Reaktionen, Loeschen)
#[async_trait]
pub trait AbrufPfad: Send + Sync {
    /// Laedt die dauerhafte History eines Raums
    async fn history_laden(&self, room_id: &RoomId) -> SyncResult<Vec<ChatNachricht>>;

    /// Sendet eine Nachricht; die Antwort traegt die kanonische ID
    async fn nachricht_senden(&self, anfrage: ApiSendeAnfrage) -> SyncResult<ChatNachricht>;

    /// Persistiert eine Reaktion
    async fn reaktion_senden(
        &self,
        message_id: MessageId,
        emoji: &str,
        aktion: ReaktionsAktion,
    ) -> SyncResult<()>;

    /// Loescht eine eigene Nachricht (Soft-Delete)
    async fn nachricht_loeschen(&self, message_id: MessageId) -> SyncResult<()>;
}

// ---------------------------------------------------------------------------
// HTTP-Implementierung
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct HistoryDto {
    messages: Vec<ChatNachricht>,
}

#[derive(Debug, Deserialize)]
struct SendeDto {
    message_id: MessageId,
    timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct FehlerDto {
    error: String,
}

#[derive(Debug, Serialize)]
struct ReaktionsKoerper<'a> {
    message_id: MessageId,
    emoji: &'a str,
}

#[derive(Debug, Serialize)]
struct LoeschKoerper {
    message_id: MessageId,
}

/// HTTP-Client gegen die `/api`-Routen des Gateways
pub struct ApiClient {
    http: reqwest::Client,
    basis_url: String,
    token: String,
    user_id: plausch_core::types::UserId,
}

impl ApiClient {
    /// Erstellt einen neuen Client
    ///
    /// `basis_url` ohne Pfad, z.B. `http://localhost:8080`.
    pub fn neu(
        basis_url: impl Into<String>,
        token: impl Into<String>,
        user_id: plausch_core::types::UserId,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            basis_url: basis_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            user_id,
        }
    }

    /// Prueft den HTTP-Status und extrahiert die Server-Fehlermeldung
    async fn fehler_pruefen(antwort: reqwest::Response) -> SyncResult<reqwest::Response> {
        let status = antwort.status();
        if status.is_success() {
            return Ok(antwort);
        }

        let meldung = antwort
            .json::<FehlerDto>()
            .await
            .map(|f| f.error)
            .unwrap_or_else(|_| status.to_string());
        Err(SyncError::Server {
            status: status.as_u16(),
            meldung,
        })
    }
}

#[async_trait]
impl AbrufPfad for ApiClient {
    async fn history_laden(&self, room_id: &RoomId) -> SyncResult<Vec<ChatNachricht>> {
        let antwort = self
            .http
            .get(format!("{}/api/messages", self.basis_url))
            .query(&[("room_id", room_id.as_str())])
            .bearer_auth(&self.token)
            .send()
            .await?;

        let dto: HistoryDto = Self::fehler_pruefen(antwort).await?.json().await?;
        tracing::debug!(room_id = %room_id, anzahl = dto.messages.len(), "History geladen");
        Ok(dto.messages)
    }

    async fn nachricht_senden(&self, anfrage: ApiSendeAnfrage) -> SyncResult<ChatNachricht> {
        let antwort = self
            .http
            .post(format!("{}/api/messages", self.basis_url))
            .bearer_auth(&self.token)
            .json(&anfrage)
            .send()
            .await?;

        let dto: SendeDto = Self::fehler_pruefen(antwort).await?.json().await?;
        Ok(ChatNachricht {
            id: dto.message_id,
            room_id: anfrage.room_id,
            sender_id: self.user_id,
            content: anfrage.content,
            timestamp: dto.timestamp,
            is_group: anfrage.is_group,
            status: Default::default(),
            attachment_url: anfrage.attachment_url,
            attachment_type: anfrage.attachment_type,
            reply_to_id: anfrage.reply_to_id,
            deleted: false,
            reactions: Default::default(),
        })
    }

    async fn reaktion_senden(
        &self,
        message_id: MessageId,
        emoji: &str,
        aktion: ReaktionsAktion,
    ) -> SyncResult<()> {
        let pfad = match aktion {
            ReaktionsAktion::Add => "/api/reactions/add",
            ReaktionsAktion::Remove => "/api/reactions/remove",
        };

        let antwort = self
            .http
            .post(format!("{}{}", self.basis_url, pfad))
            .bearer_auth(&self.token)
            .json(&ReaktionsKoerper { message_id, emoji })
            .send()
            .await?;

        Self::fehler_pruefen(antwort).await?;
        Ok(())
    }

    async fn nachricht_loeschen(&self, message_id: MessageId) -> SyncResult<()> {
        let antwort = self
            .http
            .post(format!("{}/api/messages/delete", self.basis_url))
            .bearer_auth(&self.token)
            .json(&LoeschKoerper { message_id })
            .send()
            .await?;

        Self::fehler_pruefen(antwort).await?;
        Ok(())
    }
}
