//! Frame-Dispatcher – Routet dekodierte Frames an die richtigen Ablaeufe
//!
//! Der Dispatcher bekommt ein bereits dekodiertes [`Frame`] von einer
//! `ClientVerbindung`, validiert es gegen den Verbindungs-Kontext, stoesst
//! Persistenz-Seiteneffekte an und bittet die Raum-Registry um den
//! Broadcast.
//!
//! ## Echo-Policy
//! - `message` und `deletion` gehen an den ganzen Raum inklusive Absender:
//!   das Echo traegt die kanonische Server-ID, mit der der Client seinen
//!   optimistischen Eintrag abgleicht.
//! - `reaction` und `typing` gehen an den Raum ausser dem Ausloeser: der
//!   hat die Aenderung bereits lokal angewendet.
//!
//! Waehrend Persistenz-Aufrufen haelt der Dispatcher keinerlei Sperren;
//! die Registry sperrt nur fuer den In-Memory-Broadcast-Schritt.

use plausch_chat::{ChatError, ChatNachricht, SendeAnfrage};
use plausch_core::types::{ConnectionId, RoomId, UserId};
use plausch_protocol::{
    DeletionFrame, Frame, MessageFrame, ReactionFrame, ReaktionsAktion, TypingFrame,
};
use std::sync::Arc;

use crate::server_state::GatewayState;

/// Kontext der Verbindung die das Frame eingeliefert hat
#[derive(Debug, Clone)]
pub struct VerbindungsKontext {
    pub connection_id: ConnectionId,
    /// Authentifizierte User-ID – massgeblich, nicht die Felder im Frame
    pub user_id: UserId,
    pub username: String,
    /// Raum an den diese Verbindung gebunden ist
    pub room_id: RoomId,
}

/// Zentraler Frame-Dispatcher
///
/// Gibt `Some(frame)` zurueck wenn eine Antwort an genau den Absender
/// gehen soll (Pong, Fehlermeldungen), sonst `None`.
pub struct FrameDispatcher {
    state: Arc<GatewayState>,
}

impl FrameDispatcher {
    /// Erstellt einen neuen Dispatcher
    pub fn neu(state: Arc<GatewayState>) -> Self {
        Self { state }
    }

    /// Verarbeitet ein eingehendes Frame
    pub async fn dispatch(&self, frame: Frame, ctx: &VerbindungsKontext) -> Option<Frame> {
        match frame {
            // -------------------------------------------------------------------
            // Keepalive – darf keine anderen Timer beruehren
            // -------------------------------------------------------------------
            Frame::Ping => Some(Frame::Pong),

            Frame::Pong => {
                tracing::trace!(connection_id = %ctx.connection_id, "Pong empfangen");
                None
            }

            Frame::Message(m) => self.message_verarbeiten(m, ctx).await,

            Frame::Reaction(r) => self.reaction_verarbeiten(r, ctx).await,

            Frame::Typing(t) => self.typing_verarbeiten(t, ctx),

            Frame::Deletion(d) => self.deletion_verarbeiten(d, ctx).await,

            // Ein error-Frame vom Client ist eine Server->Client-Nachricht
            Frame::Error(e) => {
                tracing::warn!(
                    connection_id = %ctx.connection_id,
                    meldung = %e.error,
                    "Unerwartetes error-Frame vom Client"
                );
                Some(Frame::error("Unerwartete Nachricht"))
            }
        }
    }

    /// Chat-Nachricht: persistieren (falls noch ohne ID), dann Echo an alle
    async fn message_verarbeiten(
        &self,
        m: MessageFrame,
        ctx: &VerbindungsKontext,
    ) -> Option<Frame> {
        if let Some(fehler) = raum_pruefen(&m.room_id, ctx) {
            return Some(fehler);
        }

        // Traegt das Frame bereits eine ID, wurde die Nachricht ueber den
        // REST-Pfad gespeichert – nur noch weiterverteilen, nicht doppelt
        // persistieren.
        if m.message_id.is_some() {
            tracing::debug!(
                connection_id = %ctx.connection_id,
                message_id = ?m.message_id,
                "Nachricht mit vorhandener ID – Persistierung uebersprungen"
            );
            self.state.registry.an_raum_senden(&ctx.room_id, &Frame::Message(m));
            return None;
        }

        let anfrage = SendeAnfrage {
            room_id: ctx.room_id.clone(),
            // Absender ist immer die authentifizierte Verbindung
            sender_id: ctx.user_id,
            content: m.content,
            is_group: m.is_group,
            attachment_url: m.attachment_url,
            attachment_type: m.attachment_type,
            reply_to_id: m.reply_to_id,
        };

        match self.state.chat_service.nachricht_senden(anfrage).await {
            Ok(nachricht) => {
                let empfaenger = self
                    .state
                    .registry
                    .an_raum_senden(&ctx.room_id, &nachricht_als_frame(&nachricht));
                tracing::debug!(
                    message_id = %nachricht.id,
                    room_id = %ctx.room_id,
                    empfaenger,
                    "Nachricht verteilt"
                );
                None
            }
            // Speicher-Fehler: nichts broadcasten, nur den Absender informieren
            Err(ChatError::DatenbankFehler(e)) => {
                tracing::warn!(
                    connection_id = %ctx.connection_id,
                    fehler = %e,
                    "Nachricht konnte nicht gespeichert werden"
                );
                Some(Frame::error("Nachricht konnte nicht gespeichert werden"))
            }
            Err(e) => Some(Frame::error(e.to_string())),
        }
    }

    /// Reaktion: persistieren, dann an den Raum ausser dem Ausloeser
    async fn reaction_verarbeiten(
        &self,
        r: ReactionFrame,
        ctx: &VerbindungsKontext,
    ) -> Option<Frame> {
        if let Some(fehler) = raum_pruefen(&r.room_id, ctx) {
            return Some(fehler);
        }

        let ergebnis = match r.action {
            ReaktionsAktion::Add => {
                self.state
                    .chat_service
                    .reaktion_hinzufuegen(r.message_id, ctx.user_id, &r.emoji)
                    .await
            }
            ReaktionsAktion::Remove => {
                self.state
                    .chat_service
                    .reaktion_entfernen(r.message_id, ctx.user_id, &r.emoji)
                    .await
            }
        };

        match ergebnis {
            Ok(_) => {
                let frame = Frame::Reaction(ReactionFrame {
                    message_id: r.message_id,
                    room_id: ctx.room_id.clone(),
                    user_id: ctx.user_id,
                    emoji: r.emoji,
                    action: r.action,
                });
                self.state
                    .registry
                    .an_raum_ausser_senden(&ctx.room_id, &ctx.connection_id, &frame);
                None
            }
            Err(ChatError::DatenbankFehler(e)) => {
                tracing::warn!(fehler = %e, "Reaktion konnte nicht gespeichert werden");
                Some(Frame::error("Reaktion konnte nicht gespeichert werden"))
            }
            Err(e) => Some(Frame::error(e.to_string())),
        }
    }

    /// Tipp-Indikator: ephemer, keine Persistenz, keine Ordnungs-Garantien
    fn typing_verarbeiten(&self, t: TypingFrame, ctx: &VerbindungsKontext) -> Option<Frame> {
        if let Some(fehler) = raum_pruefen(&t.room_id, ctx) {
            return Some(fehler);
        }

        let frame = Frame::Typing(TypingFrame {
            room_id: ctx.room_id.clone(),
            user_id: ctx.user_id,
            username: ctx.username.clone(),
            is_typing: t.is_typing,
        });
        self.state
            .registry
            .an_raum_ausser_senden(&ctx.room_id, &ctx.connection_id, &frame);
        None
    }

    /// Loeschung: nur der Verfasser, Broadcast ohne Original-Inhalt
    async fn deletion_verarbeiten(
        &self,
        d: DeletionFrame,
        ctx: &VerbindungsKontext,
    ) -> Option<Frame> {
        if let Some(fehler) = raum_pruefen(&d.room_id, ctx) {
            return Some(fehler);
        }

        match self
            .state
            .chat_service
            .nachricht_loeschen(d.message_id, ctx.user_id)
            .await
        {
            Ok(nachricht) => {
                let frame = Frame::Deletion(DeletionFrame {
                    message_id: nachricht.id,
                    room_id: nachricht.room_id.clone(),
                    sender_id: nachricht.sender_id,
                });
                self.state.registry.an_raum_senden(&nachricht.room_id, &frame);
                None
            }
            Err(ChatError::DatenbankFehler(e)) => {
                tracing::warn!(fehler = %e, "Loeschung konnte nicht gespeichert werden");
                Some(Frame::error("Loeschung konnte nicht gespeichert werden"))
            }
            Err(e) => {
                tracing::debug!(
                    connection_id = %ctx.connection_id,
                    message_id = %d.message_id,
                    fehler = %e,
                    "Loeschung abgelehnt"
                );
                Some(Frame::error(e.to_string()))
            }
        }
    }
}

/// Prueft dass das Frame zum Raum der Verbindung gehoert
///
/// Jede Verbindung ist fuer ihre Lebensdauer an genau einen Raum gebunden;
/// Frames fuer fremde Raeume werden als Validierungsfehler beantwortet
/// statt sie dorthin zu verteilen.
fn raum_pruefen(frame_raum: &RoomId, ctx: &VerbindungsKontext) -> Option<Frame> {
    if frame_raum != &ctx.room_id {
        tracing::warn!(
            connection_id = %ctx.connection_id,
            frame_raum = %frame_raum,
            verbindungs_raum = %ctx.room_id,
            "Frame fuer fremden Raum abgelehnt"
        );
        return Some(Frame::error("Frame gehoert nicht zum Raum dieser Verbindung"));
    }
    None
}

/// Baut das Broadcast-Frame zu einer persistierten Nachricht
pub(crate) fn nachricht_als_frame(n: &ChatNachricht) -> Frame {
    Frame::Message(MessageFrame {
        message_id: Some(n.id),
        room_id: n.room_id.clone(),
        sender_id: n.sender_id,
        content: n.content.clone(),
        timestamp: Some(n.timestamp),
        is_group: n.is_group,
        attachment_url: n.attachment_url.clone(),
        attachment_type: n.attachment_type.clone(),
        reply_to_id: n.reply_to_id,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenStore;
    use plausch_chat::ChatService;
    use plausch_db::MemoryDb;
    use tokio::sync::mpsc;

    fn test_state() -> Arc<GatewayState> {
        let chat_service = ChatService::neu(Arc::new(MemoryDb::neu()));
        GatewayState::neu(chat_service, TokenStore::neu())
    }

    fn kontext(raum: &RoomId) -> VerbindungsKontext {
        VerbindungsKontext {
            connection_id: ConnectionId::new(),
            user_id: UserId::new(),
            username: "testuser".into(),
            room_id: raum.clone(),
        }
    }

    /// Traegt den Kontext in der Registry ein und liefert seine Queue
    fn beitreten(
        state: &GatewayState,
        ctx: &VerbindungsKontext,
    ) -> mpsc::Receiver<crate::registry::BroadcastText> {
        state
            .registry
            .beitreten(ctx.room_id.clone(), ctx.connection_id, ctx.user_id)
    }

    fn empfangenes_frame(rx: &mut mpsc::Receiver<crate::registry::BroadcastText>) -> Frame {
        let text = rx.try_recv().expect("Frame muss vorhanden sein");
        Frame::aus_json(&text).expect("Broadcast muss dekodierbar sein")
    }

    #[tokio::test]
    async fn nachricht_wird_an_beide_verteilt() {
        let state = test_state();
        let ctx_a = kontext(&RoomId::gruppe("general"));
        let ctx_b = VerbindungsKontext {
            connection_id: ConnectionId::new(),
            user_id: UserId::new(),
            username: "b".into(),
            room_id: ctx_a.room_id.clone(),
        };
        let mut rx_a = beitreten(&state, &ctx_a);
        let mut rx_b = beitreten(&state, &ctx_b);

        let dispatcher = FrameDispatcher::neu(Arc::clone(&state));
        let antwort = dispatcher
            .dispatch(
                Frame::Message(MessageFrame {
                    message_id: None,
                    room_id: ctx_a.room_id.clone(),
                    sender_id: ctx_a.user_id,
                    content: "hello".into(),
                    timestamp: None,
                    is_group: true,
                    attachment_url: None,
                    attachment_type: None,
                    reply_to_id: None,
                }),
                &ctx_a,
            )
            .await;
        assert!(antwort.is_none());

        // Echo an den Absender UND Zustellung an den anderen Teilnehmer,
        // beide mit derselben kanonischen Server-ID
        let frame_a = empfangenes_frame(&mut rx_a);
        let frame_b = empfangenes_frame(&mut rx_b);
        match (frame_a, frame_b) {
            (Frame::Message(a), Frame::Message(b)) => {
                assert_eq!(a.content, "hello");
                assert!(a.message_id.is_some(), "Echo traegt die Server-ID");
                assert!(a.timestamp.is_some());
                assert_eq!(a.message_id, b.message_id);
            }
            andere => panic!("Erwartet Message-Frames, erhalten {:?}", andere),
        }
    }

    #[tokio::test]
    async fn leere_nachricht_nur_fehler_an_absender() {
        let state = test_state();
        let ctx = kontext(&RoomId::gruppe("general"));
        let mut rx = beitreten(&state, &ctx);

        let dispatcher = FrameDispatcher::neu(Arc::clone(&state));
        let antwort = dispatcher
            .dispatch(
                Frame::Message(MessageFrame {
                    message_id: None,
                    room_id: ctx.room_id.clone(),
                    sender_id: ctx.user_id,
                    content: "   ".into(),
                    timestamp: None,
                    is_group: true,
                    attachment_url: None,
                    attachment_type: None,
                    reply_to_id: None,
                }),
                &ctx,
            )
            .await;

        assert!(matches!(antwort, Some(Frame::Error(_))));
        assert!(rx.try_recv().is_err(), "Fehlerhafte Frames werden nie verteilt");
    }

    #[tokio::test]
    async fn reaktion_ueberspringt_ausloeser() {
        let state = test_state();
        let ctx_a = kontext(&RoomId::gruppe("general"));
        let mut ctx_b = kontext(&ctx_a.room_id);
        ctx_b.username = "b".into();
        let mut rx_a = beitreten(&state, &ctx_a);
        let mut rx_b = beitreten(&state, &ctx_b);

        let nachricht = state
            .chat_service
            .nachricht_senden(SendeAnfrage {
                room_id: ctx_a.room_id.clone(),
                sender_id: ctx_b.user_id,
                content: "m1".into(),
                is_group: true,
                attachment_url: None,
                attachment_type: None,
                reply_to_id: None,
            })
            .await
            .unwrap();

        let dispatcher = FrameDispatcher::neu(Arc::clone(&state));
        let antwort = dispatcher
            .dispatch(
                Frame::Reaction(ReactionFrame {
                    message_id: nachricht.id,
                    room_id: ctx_a.room_id.clone(),
                    user_id: ctx_a.user_id,
                    emoji: "👍".into(),
                    action: ReaktionsAktion::Add,
                }),
                &ctx_a,
            )
            .await;
        assert!(antwort.is_none());

        assert!(rx_a.try_recv().is_err(), "Ausloeser bekommt kein Reaktions-Echo");
        match empfangenes_frame(&mut rx_b) {
            Frame::Reaction(r) => {
                assert_eq!(r.user_id, ctx_a.user_id);
                assert_eq!(r.emoji, "👍");
            }
            andere => panic!("Erwartet Reaction, erhalten {:?}", andere),
        }
    }

    #[tokio::test]
    async fn fremde_nachricht_loeschen_wird_abgelehnt() {
        let state = test_state();
        let ctx_a = kontext(&RoomId::gruppe("general"));
        let ctx_b = kontext(&ctx_a.room_id);
        let mut rx_a = beitreten(&state, &ctx_a);
        let _rx_b = beitreten(&state, &ctx_b);

        let nachricht = state
            .chat_service
            .nachricht_senden(SendeAnfrage {
                room_id: ctx_a.room_id.clone(),
                sender_id: ctx_a.user_id,
                content: "meins".into(),
                is_group: true,
                attachment_url: None,
                attachment_type: None,
                reply_to_id: None,
            })
            .await
            .unwrap();

        let dispatcher = FrameDispatcher::neu(Arc::clone(&state));
        let antwort = dispatcher
            .dispatch(
                Frame::Deletion(DeletionFrame {
                    message_id: nachricht.id,
                    room_id: ctx_a.room_id.clone(),
                    sender_id: ctx_b.user_id,
                }),
                &ctx_b,
            )
            .await;

        assert!(matches!(antwort, Some(Frame::Error(_))));
        assert!(rx_a.try_recv().is_err(), "Abgelehnte Loeschung wird nie verteilt");

        let geladen = state.chat_service.nachricht_laden(nachricht.id).await.unwrap();
        assert!(!geladen.deleted, "Zustand bleibt unveraendert");
    }

    #[tokio::test]
    async fn loeschung_durch_verfasser_geht_an_alle() {
        let state = test_state();
        let ctx_a = kontext(&RoomId::gruppe("general"));
        let ctx_b = kontext(&ctx_a.room_id);
        let mut rx_a = beitreten(&state, &ctx_a);
        let mut rx_b = beitreten(&state, &ctx_b);

        let nachricht = state
            .chat_service
            .nachricht_senden(SendeAnfrage {
                room_id: ctx_a.room_id.clone(),
                sender_id: ctx_a.user_id,
                content: "geheim".into(),
                is_group: true,
                attachment_url: None,
                attachment_type: None,
                reply_to_id: None,
            })
            .await
            .unwrap();

        let dispatcher = FrameDispatcher::neu(Arc::clone(&state));
        dispatcher
            .dispatch(
                Frame::Deletion(DeletionFrame {
                    message_id: nachricht.id,
                    room_id: ctx_a.room_id.clone(),
                    sender_id: ctx_a.user_id,
                }),
                &ctx_a,
            )
            .await;

        for rx in [&mut rx_a, &mut rx_b] {
            match empfangenes_frame(rx) {
                Frame::Deletion(d) => {
                    assert_eq!(d.message_id, nachricht.id);
                }
                andere => panic!("Erwartet Deletion, erhalten {:?}", andere),
            }
        }

        // Das Deletion-Frame traegt nie den Original-Inhalt
        let json = Frame::Deletion(DeletionFrame {
            message_id: nachricht.id,
            room_id: nachricht.room_id.clone(),
            sender_id: nachricht.sender_id,
        })
        .als_json()
        .unwrap();
        assert!(!json.contains("geheim"));
    }

    #[tokio::test]
    async fn ping_ergibt_pong() {
        let state = test_state();
        let ctx = kontext(&RoomId::gruppe("general"));
        let dispatcher = FrameDispatcher::neu(state);

        let antwort = dispatcher.dispatch(Frame::Ping, &ctx).await;
        assert_eq!(antwort, Some(Frame::Pong));
    }

    #[tokio::test]
    async fn frame_fuer_fremden_raum_wird_abgelehnt() {
        let state = test_state();
        let ctx = kontext(&RoomId::gruppe("general"));
        let mut rx = beitreten(&state, &ctx);

        let dispatcher = FrameDispatcher::neu(Arc::clone(&state));
        let antwort = dispatcher
            .dispatch(
                Frame::Typing(TypingFrame {
                    room_id: RoomId::gruppe("anderswo"),
                    user_id: ctx.user_id,
                    username: ctx.username.clone(),
                    is_typing: true,
                }),
                &ctx,
            )
            .await;

        assert!(matches!(antwort, Some(Frame::Error(_))));
        assert!(rx.try_recv().is_err());
    }
}
