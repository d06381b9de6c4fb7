//! HTTP-Routen des Gateways
//!
//! `/ws` ist der Einstieg fuer die persistente Verbindung; die `/api`-
//! Routen sind der Request/Response-Pfad den der Sync-Client fuer
//! History-Fetch und als Einzel-Fallback beim Senden nutzt. Beide Pfade
//! muenden in denselben ChatService und dieselbe Registry, damit REST-
//! Aenderungen genauso im Raum landen wie WebSocket-Frames.
//!
//! Register/Login/Profil/Suche gehoeren dem externen Auth-Dienst und
//! tauchen hier bewusst nicht auf.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use plausch_chat::{ChatNachricht, SendeAnfrage};
use plausch_core::types::{MessageId, RoomId, UserId};
use plausch_db::models::ReaktionsMap;
use plausch_protocol::{DeletionFrame, Frame, ReactionFrame, ReaktionsAktion};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::TokenClaims;
use crate::connection::ClientVerbindung;
use crate::dispatcher::nachricht_als_frame;
use crate::error::{GatewayError, GatewayResult};
use crate::presence::BenutzerPresence;
use crate::server_state::GatewayState;

/// Baut den Axum-Router des Gateways
pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/ws", get(ws_verbinden))
        .route("/api/messages", get(chat_history).post(nachricht_senden))
        .route("/api/messages/delete", post(nachricht_loeschen))
        .route("/api/reactions/add", post(reaktion_hinzufuegen))
        .route("/api/reactions/remove", post(reaktion_entfernen))
        .route("/api/online", get(online_benutzer))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// WebSocket-Einstieg
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WsParams {
    room: Option<String>,
    token: Option<String>,
}

/// Nimmt eine WebSocket-Verbindung an
///
/// Raum und Token sind Pflicht-Query-Parameter. Fehlt einer oder ist der
/// Token ungueltig, wird die Verbindung VOR dem Upgrade abgelehnt – der
/// Client bekommt eine HTTP-Fehlerantwort statt eines Sockets.
async fn ws_verbinden(
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let (room_id, token) = match ws_parameter_pruefen(params) {
        Ok(geprueft) => geprueft,
        Err(e) => return e.into_response(),
    };

    let claims = match state.token_pruefer.pruefen(&token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::info!(fehler = %e, "WebSocket-Verbindung abgelehnt");
            return GatewayError::Auth(e).into_response();
        }
    };

    ws.on_upgrade(move |socket| {
        ClientVerbindung::neu(state, claims, room_id).verarbeiten(socket)
    })
}

/// Prueft die Pflicht-Query-Parameter des Verbindungsaufbaus
fn ws_parameter_pruefen(params: WsParams) -> GatewayResult<(RoomId, String)> {
    let raum = params
        .room
        .filter(|r| !r.is_empty())
        .ok_or_else(|| GatewayError::Validierung("room-Parameter fehlt".into()))?;
    let token = params
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GatewayError::Validierung("token-Parameter fehlt".into()))?;
    Ok((RoomId::neu(raum), token))
}

// ---------------------------------------------------------------------------
// REST: Nachrichten
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SendeNachrichtAnfrage {
    room_id: String,
    content: String,
    #[serde(default)]
    is_group: bool,
    #[serde(default)]
    attachment_url: Option<String>,
    #[serde(default)]
    attachment_type: Option<String>,
    #[serde(default)]
    reply_to_id: Option<MessageId>,
}

#[derive(Debug, Serialize)]
struct SendeNachrichtAntwort {
    status: &'static str,
    message_id: MessageId,
    timestamp: i64,
    room_id: RoomId,
    sender_id: UserId,
}

/// Nachricht ueber den Request/Response-Pfad senden
///
/// Persistiert und verteilt die Nachricht genauso wie der WebSocket-Pfad,
/// inklusive Echo an die eigenen Verbindungen des Absenders.
async fn nachricht_senden(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(anfrage): Json<SendeNachrichtAnfrage>,
) -> GatewayResult<Json<SendeNachrichtAntwort>> {
    let claims = authentifizieren(&state, &headers)?;

    if anfrage.room_id.is_empty() {
        return Err(GatewayError::Validierung("room_id fehlt".into()));
    }

    let nachricht = state
        .chat_service
        .nachricht_senden(SendeAnfrage {
            room_id: RoomId::neu(anfrage.room_id),
            sender_id: claims.user_id,
            content: anfrage.content,
            is_group: anfrage.is_group,
            attachment_url: anfrage.attachment_url,
            attachment_type: anfrage.attachment_type,
            reply_to_id: anfrage.reply_to_id,
        })
        .await?;

    state
        .registry
        .an_raum_senden(&nachricht.room_id, &nachricht_als_frame(&nachricht));

    Ok(Json(SendeNachrichtAntwort {
        status: "Nachricht gespeichert",
        message_id: nachricht.id,
        timestamp: nachricht.timestamp,
        room_id: nachricht.room_id,
        sender_id: nachricht.sender_id,
    }))
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    room_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct HistoryAntwort {
    messages: Vec<ChatNachricht>,
    total_count: usize,
    room_id: RoomId,
}

/// Komplette Nachrichten-History eines Raums, aufsteigend nach Timestamp
async fn chat_history(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Query(params): Query<HistoryParams>,
) -> GatewayResult<Json<HistoryAntwort>> {
    authentifizieren(&state, &headers)?;

    let room_id = params
        .room_id
        .filter(|r| !r.is_empty())
        .map(RoomId::neu)
        .ok_or_else(|| GatewayError::Validierung("room_id fehlt".into()))?;

    let messages = state.chat_service.history_laden(&room_id).await?;
    Ok(Json(HistoryAntwort {
        total_count: messages.len(),
        messages,
        room_id,
    }))
}

#[derive(Debug, Deserialize)]
struct LoeschAnfrage {
    message_id: MessageId,
}

#[derive(Debug, Serialize)]
struct StatusAntwort {
    status: &'static str,
}

/// Eigene Nachricht loeschen (Soft-Delete) und die Loeschung verteilen
async fn nachricht_loeschen(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(anfrage): Json<LoeschAnfrage>,
) -> GatewayResult<Json<StatusAntwort>> {
    let claims = authentifizieren(&state, &headers)?;

    let nachricht = state
        .chat_service
        .nachricht_loeschen(anfrage.message_id, claims.user_id)
        .await?;

    state.registry.an_raum_senden(
        &nachricht.room_id,
        &Frame::Deletion(DeletionFrame {
            message_id: nachricht.id,
            room_id: nachricht.room_id.clone(),
            sender_id: nachricht.sender_id,
        }),
    );

    Ok(Json(StatusAntwort {
        status: "Nachricht geloescht",
    }))
}

// ---------------------------------------------------------------------------
// REST: Reaktionen
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ReaktionsAnfrage {
    message_id: MessageId,
    emoji: String,
}

#[derive(Debug, Serialize)]
struct ReaktionsAntwort {
    status: &'static str,
    reactions: ReaktionsMap,
}

async fn reaktion_hinzufuegen(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(anfrage): Json<ReaktionsAnfrage>,
) -> GatewayResult<Json<ReaktionsAntwort>> {
    reaktion_verarbeiten(state, headers, anfrage, ReaktionsAktion::Add).await
}

async fn reaktion_entfernen(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(anfrage): Json<ReaktionsAnfrage>,
) -> GatewayResult<Json<ReaktionsAntwort>> {
    reaktion_verarbeiten(state, headers, anfrage, ReaktionsAktion::Remove).await
}

/// Gemeinsamer Pfad fuer Reaktion hinzufuegen/entfernen
///
/// Ueber REST gibt es keine ausloesende Verbindung, deshalb geht der
/// Broadcast an den ganzen Raum – der Client wendet Reaktions-Events
/// idempotent an, das eigene Echo ist dadurch harmlos.
async fn reaktion_verarbeiten(
    state: Arc<GatewayState>,
    headers: HeaderMap,
    anfrage: ReaktionsAnfrage,
    action: ReaktionsAktion,
) -> GatewayResult<Json<ReaktionsAntwort>> {
    let claims = authentifizieren(&state, &headers)?;

    let nachricht = match action {
        ReaktionsAktion::Add => {
            state
                .chat_service
                .reaktion_hinzufuegen(anfrage.message_id, claims.user_id, &anfrage.emoji)
                .await?
        }
        ReaktionsAktion::Remove => {
            state
                .chat_service
                .reaktion_entfernen(anfrage.message_id, claims.user_id, &anfrage.emoji)
                .await?
        }
    };

    state.registry.an_raum_senden(
        &nachricht.room_id,
        &Frame::Reaction(ReactionFrame {
            message_id: nachricht.id,
            room_id: nachricht.room_id.clone(),
            user_id: claims.user_id,
            emoji: anfrage.emoji,
            action,
        }),
    );

    Ok(Json(ReaktionsAntwort {
        status: match action {
            ReaktionsAktion::Add => "Reaktion hinzugefuegt",
            ReaktionsAktion::Remove => "Reaktion entfernt",
        },
        reactions: nachricht.reactions,
    }))
}

// ---------------------------------------------------------------------------
// REST: Presence
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct OnlineParams {
    room_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct OnlineAntwort {
    users: Vec<BenutzerPresence>,
    total_count: usize,
}

/// Online-Benutzer, optional auf einen Raum eingeschraenkt
async fn online_benutzer(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Query(params): Query<OnlineParams>,
) -> GatewayResult<Json<OnlineAntwort>> {
    authentifizieren(&state, &headers)?;

    let users = match params.room_id.filter(|r| !r.is_empty()) {
        Some(raum) => state.presence.online_in_raum(&RoomId::neu(raum)),
        None => state.presence.alle_online(),
    };

    Ok(Json(OnlineAntwort {
        total_count: users.len(),
        users,
    }))
}

// ---------------------------------------------------------------------------
// Hilfsfunktionen
// ---------------------------------------------------------------------------

/// Extrahiert den Bearer-Token aus dem Authorization-Header
fn bearer_token(headers: &HeaderMap) -> GatewayResult<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|wert| wert.to_str().ok())
        .and_then(|wert| wert.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| GatewayError::Validierung("Authorization-Header fehlt".into()))
}

/// Prueft den Bearer-Token der Anfrage
fn authentifizieren(state: &GatewayState, headers: &HeaderMap) -> GatewayResult<TokenClaims> {
    let token = bearer_token(headers)?;
    Ok(state.token_pruefer.pruefen(token)?)
}
