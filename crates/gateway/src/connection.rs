//! Client-Verbindung – Verwaltet einen einzelnen WebSocket
//!
//! Jede Verbindung bekommt eine `ClientVerbindung` in einem eigenen
//! tokio-Task. Raum und Bearer-Token kommen als Query-Parameter des
//! Verbindungsaufbaus und werden VOR dem Upgrade geprueft – eine
//! Verbindung erreicht diesen Code nur authentifiziert.
//!
//! ## State Machine
//! ```text
//! Verbindet -> Authentifiziert -> Aktiv -> Schliessend -> Geschlossen
//! ```
//!
//! Eine Verbindung gehoert fuer ihre Lebensdauer genau einem Raum und
//! einem Benutzer. Raumwechsel bedeutet: Client baut ab und neu auf.
//! Nach einem unsauberen Abbruch passiert serverseitig nichts ausser der
//! Deregistrierung – Reconnect ist allein Sache des Clients.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use plausch_core::types::{ConnectionId, RoomId};
use plausch_protocol::Frame;
use std::sync::Arc;

use crate::auth::TokenClaims;
use crate::dispatcher::{FrameDispatcher, VerbindungsKontext};
use crate::presence::BenutzerPresence;
use crate::server_state::GatewayState;

// ---------------------------------------------------------------------------
// Verbindungszustand
// ---------------------------------------------------------------------------

/// Zustand einer WebSocket-Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsZustand {
    /// Upgrade laeuft, Token noch nicht geprueft
    Verbindet,
    /// Token geprueft, Registry-Eintrag steht noch aus
    Authentifiziert,
    /// Im Raum registriert, Frames werden verarbeitet
    Aktiv,
    /// Abbau laeuft
    Schliessend,
    /// Abgebaut und deregistriert
    Geschlossen,
}

// ---------------------------------------------------------------------------
// ClientVerbindung
// ---------------------------------------------------------------------------

/// Verarbeitet eine einzelne WebSocket-Verbindung
///
/// Liest eingehende Frames, dekodiert sie genau einmal und reicht sie an
/// den [`FrameDispatcher`] weiter. Broadcasts aus der Registry-Queue
/// werden auf den Socket geschrieben. Laeuft in einem eigenen tokio-Task.
pub struct ClientVerbindung {
    state: Arc<GatewayState>,
    kontext: VerbindungsKontext,
    zustand: VerbindungsZustand,
}

impl ClientVerbindung {
    /// Erstellt eine neue ClientVerbindung fuer geprueften Token und Raum
    pub fn neu(state: Arc<GatewayState>, claims: TokenClaims, room_id: RoomId) -> Self {
        Self {
            state,
            kontext: VerbindungsKontext {
                connection_id: ConnectionId::new(),
                user_id: claims.user_id,
                username: claims.username,
                room_id,
            },
            zustand: VerbindungsZustand::Authentifiziert,
        }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis der Client die Verbindung schliesst, der Socket stirbt
    /// oder die Registry die Verbindung austraegt.
    pub async fn verarbeiten(mut self, socket: WebSocket) {
        let connection_id = self.kontext.connection_id;
        let user_id = self.kontext.user_id;
        let room_id = self.kontext.room_id.clone();

        let (mut ws_tx, mut ws_rx) = socket.split();

        // Registry-Eintrag + Presence, danach ist die Verbindung Aktiv
        let mut broadcast_rx =
            self.state
                .registry
                .beitreten(room_id.clone(), connection_id, user_id);
        self.state.presence.benutzer_verbunden(BenutzerPresence {
            user_id,
            username: self.kontext.username.clone(),
            room_id: room_id.clone(),
        });
        self.zustand = VerbindungsZustand::Aktiv;
        tracing::info!(
            connection_id = %connection_id,
            user_id = %user_id,
            room_id = %room_id,
            "Verbindung aktiv"
        );

        let dispatcher = FrameDispatcher::neu(Arc::clone(&self.state));
        let mut sauber_geschlossen = false;

        loop {
            tokio::select! {
                // Eingehendes Frame vom Client
                eingehend = ws_rx.next() => {
                    match eingehend {
                        Some(Ok(Message::Text(text))) => {
                            let antwort = match Frame::aus_json(&text) {
                                Ok(frame) => dispatcher.dispatch(frame, &self.kontext).await,
                                // Unbekannter Typ: Fehler an den Absender,
                                // Verbindung bleibt offen
                                Err(e) => {
                                    tracing::debug!(
                                        connection_id = %connection_id,
                                        fehler = %e,
                                        "Frame nicht dekodierbar"
                                    );
                                    Some(Frame::error(format!(
                                        "Unbekannter oder fehlerhafter Ereignistyp: {}",
                                        e
                                    )))
                                }
                            };

                            if let Some(frame) = antwort {
                                if self.antwort_senden(&mut ws_tx, &frame).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!(connection_id = %connection_id, "Verbindung vom Client geschlossen");
                            sauber_geschlossen = true;
                            break;
                        }
                        // Binary-Frames und WS-Level-Pings ignorieren
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(connection_id = %connection_id, fehler = %e, "Socket-Lesefehler");
                            break;
                        }
                        None => break,
                    }
                }

                // Broadcast aus der Registry-Queue
                ausgehend = broadcast_rx.recv() => {
                    match ausgehend {
                        Some(text) => {
                            if let Err(e) = ws_tx.send(Message::Text(text.to_string())).await {
                                tracing::warn!(
                                    connection_id = %connection_id,
                                    fehler = %e,
                                    "Broadcast-Senden fehlgeschlagen"
                                );
                                break;
                            }
                        }
                        // Registry hat diese Verbindung bereits ausgetragen
                        None => break,
                    }
                }
            }
        }

        // Abbau: deregistrieren, Presence austragen, fertig
        self.zustand = VerbindungsZustand::Schliessend;
        self.state.registry.verlassen(&connection_id);
        self.state.presence.benutzer_getrennt(&user_id);
        self.zustand = VerbindungsZustand::Geschlossen;

        tracing::info!(
            connection_id = %connection_id,
            room_id = %room_id,
            sauber = sauber_geschlossen,
            zustand = ?self.zustand,
            "Verbindungs-Task beendet"
        );
    }

    /// Sendet eine Dispatcher-Antwort (Pong, Fehler) nur an diese Verbindung
    async fn antwort_senden(
        &self,
        ws_tx: &mut (impl futures_util::Sink<Message, Error = axum::Error> + Unpin),
        frame: &Frame,
    ) -> Result<(), ()> {
        let json = match frame.als_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(fehler = %e, "Antwort-Serialisierung fehlgeschlagen");
                return Ok(());
            }
        };

        ws_tx.send(Message::Text(json)).await.map_err(|e| {
            tracing::warn!(
                connection_id = %self.kontext.connection_id,
                fehler = %e,
                "Antwort-Senden fehlgeschlagen"
            );
        })
    }
}
