//! Transport der persistenten Verbindung
//!
//! Die Engine spricht [`FrameTransport`] statt direkt WebSockets, damit
//! der Verbindungs-Lebenszyklus ohne Netz testbar bleibt. `WsVerbinder`
//! ist die echte Implementierung auf tokio-tungstenite; Raum und Token
//! gehen als Query-Parameter in den Verbindungsaufbau.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use plausch_core::types::RoomId;
use plausch_protocol::Frame;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsNachricht;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::{SyncError, SyncResult};

/// Eine offene persistente Verbindung
#[async_trait]
pub trait FrameTransport: Send {
    /// Sendet ein Frame
    async fn senden(&mut self, frame: &Frame) -> SyncResult<()>;

    /// Empfaengt das naechste Frame; `None` heisst Verbindung beendet
    async fn empfangen(&mut self) -> Option<SyncResult<Frame>>;

    /// Schliesst die Verbindung sauber (Fehler werden ignoriert)
    async fn schliessen(&mut self);
}

/// Baut neue Verbindungen auf – einmal pro (Re-)Connect-Versuch
#[async_trait]
pub trait TransportVerbinder: Send + Sync {
    type Transport: FrameTransport + 'static;

    /// Oeffnet eine Verbindung fuer den angegebenen Raum
    async fn verbinden(&self, room_id: &RoomId) -> SyncResult<Self::Transport>;
}

// ---------------------------------------------------------------------------
// WebSocket-Implementierung
// ---------------------------------------------------------------------------

/// Verbinder auf tokio-tungstenite
pub struct WsVerbinder {
    basis_url: String,
    token: String,
}

impl WsVerbinder {
    /// Erstellt einen Verbinder
    ///
    /// `basis_url` ohne Pfad, z.B. `ws://localhost:8080`.
    pub fn neu(basis_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            basis_url: basis_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl TransportVerbinder for WsVerbinder {
    type Transport = WsTransport;

    async fn verbinden(&self, room_id: &RoomId) -> SyncResult<WsTransport> {
        let url = format!(
            "{}/ws?room={}&token={}",
            self.basis_url, room_id, self.token
        );

        tracing::debug!(room_id = %room_id, "Baue WebSocket-Verbindung auf");
        let (stream, _antwort) = connect_async(&url)
            .await
            .map_err(|e| SyncError::Verbindung(e.to_string()))?;

        Ok(WsTransport { stream })
    }
}

/// Offene WebSocket-Verbindung
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FrameTransport for WsTransport {
    async fn senden(&mut self, frame: &Frame) -> SyncResult<()> {
        let json = frame.als_json()?;
        self.stream
            .send(WsNachricht::Text(json))
            .await
            .map_err(|e| SyncError::Verbindung(e.to_string()))
    }

    async fn empfangen(&mut self) -> Option<SyncResult<Frame>> {
        loop {
            match self.stream.next().await {
                None => return None,
                Some(Err(e)) => return Some(Err(SyncError::Verbindung(e.to_string()))),
                Some(Ok(WsNachricht::Text(text))) => {
                    return Some(Frame::aus_json(&text).map_err(SyncError::from));
                }
                Some(Ok(WsNachricht::Close(_))) => return None,
                // WS-Level-Pings und Binary-Frames ueberspringen
                Some(Ok(_)) => continue,
            }
        }
    }

    async fn schliessen(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
