//! Lokaler Cache – veraltet-aber-schnell
//!
//! Pro (Benutzer, Raum) ein Eintrag, damit ein Reload sofort den letzten
//! bekannten Stand zeigt bevor der History-Fetch zurueck ist. Eintraege
//! gelten ab dem letzten Schreiben fuer sieben Tage, danach werden sie
//! als veraltet verworfen.

use async_trait::async_trait;
use chrono::Utc;
use plausch_chat::ChatNachricht;
use plausch_core::types::{RoomId, UserId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{SyncError, SyncResult};

/// Maximales Cache-Alter: 7 Tage
const CACHE_MAX_ALTER_SEK: i64 = 7 * 24 * 60 * 60;

/// Persistenz-Grenze des lokalen Caches
#[async_trait]
pub trait LokalerCache: Send + Sync {
    /// Laedt den Cache-Stand fuer (Benutzer, Raum); leer wenn nichts da
    /// oder der Eintrag veraltet ist
    async fn laden(&self, user_id: &UserId, room_id: &RoomId) -> SyncResult<Vec<ChatNachricht>>;

    /// Persistiert den aktuellen Stand fuer (Benutzer, Raum)
    async fn speichern(
        &self,
        user_id: &UserId,
        room_id: &RoomId,
        nachrichten: &[ChatNachricht],
    ) -> SyncResult<()>;
}

/// Umschlag mit Schreib-Zeitstempel fuer die Alters-Pruefung
#[derive(Debug, Serialize, Deserialize)]
struct CacheUmschlag {
    messages: Vec<ChatNachricht>,
    /// Sekunden seit Epoch, Zeitpunkt des letzten Schreibens
    timestamp: i64,
}

/// Datei-basierter Cache: eine JSON-Datei pro (Benutzer, Raum)
#[derive(Debug, Clone)]
pub struct DateiCache {
    verzeichnis: PathBuf,
}

impl DateiCache {
    /// Erstellt einen Cache unterhalb des angegebenen Verzeichnisses
    pub fn neu(verzeichnis: impl Into<PathBuf>) -> Self {
        Self {
            verzeichnis: verzeichnis.into(),
        }
    }

    fn datei_pfad(&self, user_id: &UserId, room_id: &RoomId) -> PathBuf {
        self.verzeichnis
            .join(format!("chat_history_{}_{}.json", user_id.inner(), room_id))
    }
}

#[async_trait]
impl LokalerCache for DateiCache {
    async fn laden(&self, user_id: &UserId, room_id: &RoomId) -> SyncResult<Vec<ChatNachricht>> {
        let pfad = self.datei_pfad(user_id, room_id);
        let inhalt = match tokio::fs::read_to_string(&pfad).await {
            Ok(inhalt) => inhalt,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let umschlag: CacheUmschlag = match serde_json::from_str(&inhalt) {
            Ok(umschlag) => umschlag,
            // Kaputte Cache-Dateien sind kein Fehler, nur wertlos
            Err(e) => {
                tracing::warn!(pfad = %pfad.display(), fehler = %e, "Cache-Datei nicht lesbar");
                return Ok(Vec::new());
            }
        };

        if Utc::now().timestamp() - umschlag.timestamp > CACHE_MAX_ALTER_SEK {
            tracing::debug!(room_id = %room_id, "Cache-Eintrag veraltet – verworfen");
            return Ok(Vec::new());
        }

        Ok(umschlag.messages)
    }

    async fn speichern(
        &self,
        user_id: &UserId,
        room_id: &RoomId,
        nachrichten: &[ChatNachricht],
    ) -> SyncResult<()> {
        verzeichnis_anlegen(&self.verzeichnis).await?;

        let umschlag = CacheUmschlag {
            messages: nachrichten.to_vec(),
            timestamp: Utc::now().timestamp(),
        };
        let json = serde_json::to_string(&umschlag)?;

        let pfad = self.datei_pfad(user_id, room_id);
        tokio::fs::write(&pfad, json).await?;
        Ok(())
    }
}

async fn verzeichnis_anlegen(pfad: &Path) -> SyncResult<()> {
    tokio::fs::create_dir_all(pfad)
        .await
        .map_err(|e| SyncError::Cache(format!("Cache-Verzeichnis nicht anlegbar: {}", e)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use plausch_core::types::MessageId;
    use plausch_db::models::{ReaktionsMap, ZustellStatus};

    fn nachricht(inhalt: &str) -> ChatNachricht {
        ChatNachricht {
            id: MessageId::new(),
            room_id: RoomId::gruppe("general"),
            sender_id: UserId::new(),
            content: inhalt.into(),
            timestamp: 100,
            is_group: true,
            status: ZustellStatus::Sent,
            attachment_url: None,
            attachment_type: None,
            reply_to_id: None,
            deleted: false,
            reactions: ReaktionsMap::new(),
        }
    }

    #[tokio::test]
    async fn speichern_und_laden() {
        let verzeichnis = tempfile::tempdir().expect("Temp-Verzeichnis");
        let cache = DateiCache::neu(verzeichnis.path());
        let benutzer = UserId::new();
        let raum = RoomId::gruppe("general");

        let nachrichten = vec![nachricht("hallo"), nachricht("welt")];
        cache.speichern(&benutzer, &raum, &nachrichten).await.unwrap();

        let geladen = cache.laden(&benutzer, &raum).await.unwrap();
        assert_eq!(geladen, nachrichten);
    }

    #[tokio::test]
    async fn fehlende_datei_ergibt_leeren_stand() {
        let verzeichnis = tempfile::tempdir().unwrap();
        let cache = DateiCache::neu(verzeichnis.path());

        let geladen = cache
            .laden(&UserId::new(), &RoomId::gruppe("general"))
            .await
            .unwrap();
        assert!(geladen.is_empty());
    }

    #[tokio::test]
    async fn eintraege_sind_pro_benutzer_und_raum_getrennt() {
        let verzeichnis = tempfile::tempdir().unwrap();
        let cache = DateiCache::neu(verzeichnis.path());
        let benutzer = UserId::new();
        let raum_a = RoomId::gruppe("raum a");
        let raum_b = RoomId::gruppe("raum b");

        cache.speichern(&benutzer, &raum_a, &[nachricht("nur a")]).await.unwrap();

        assert_eq!(cache.laden(&benutzer, &raum_a).await.unwrap().len(), 1);
        assert!(cache.laden(&benutzer, &raum_b).await.unwrap().is_empty());
        assert!(cache.laden(&UserId::new(), &raum_a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn veralteter_eintrag_wird_verworfen() {
        let verzeichnis = tempfile::tempdir().unwrap();
        let cache = DateiCache::neu(verzeichnis.path());
        let benutzer = UserId::new();
        let raum = RoomId::gruppe("general");

        // Umschlag mit Schreib-Zeitpunkt jenseits des Aufbewahrungsfensters
        let umschlag = CacheUmschlag {
            messages: vec![nachricht("uralt")],
            timestamp: Utc::now().timestamp() - CACHE_MAX_ALTER_SEK - 1,
        };
        let pfad = cache.datei_pfad(&benutzer, &raum);
        tokio::fs::create_dir_all(verzeichnis.path()).await.unwrap();
        tokio::fs::write(&pfad, serde_json::to_string(&umschlag).unwrap())
            .await
            .unwrap();

        assert!(cache.laden(&benutzer, &raum).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn kaputte_datei_ist_kein_fehler() {
        let verzeichnis = tempfile::tempdir().unwrap();
        let cache = DateiCache::neu(verzeichnis.path());
        let benutzer = UserId::new();
        let raum = RoomId::gruppe("general");

        let pfad = cache.datei_pfad(&benutzer, &raum);
        tokio::fs::create_dir_all(verzeichnis.path()).await.unwrap();
        tokio::fs::write(&pfad, "kein json").await.unwrap();

        assert!(cache.laden(&benutzer, &raum).await.unwrap().is_empty());
    }
}
