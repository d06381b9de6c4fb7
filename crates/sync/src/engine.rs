//! Sync-Engine – Raum-Sitzungen mit explizitem Verbindungs-Zustandsautomaten
//!
//! Pro betretenem Raum laeuft genau eine Sitzung in einem eigenen
//! tokio-Task. Ablauf:
//!
//! 1. Cache laden und sofort als ersten Stand melden
//! 2. Dauerhafte History abrufen und einmischen (Fallback: Cache-Stand)
//! 3. Persistente Verbindung oeffnen und Live-Events einmischen
//!
//! Der Verbindungszustand ist ein expliziter Automat
//! (`Idle -> Verbindet -> Offen -> Reconnect(versuch) -> Gescheitert`);
//! der Versuchszaehler ist Teil des Zustands statt eines geteilten
//! Zaehlers in Closures. Nach dem Raum-Abbau sind keine Seiteneffekte
//! mehr beobachtbar: Frame-Verarbeitung, Reconnects, Ping- und
//! Tipp-Timer enden mit der Sitzung.

use plausch_chat::ChatNachricht;
use plausch_core::types::{MessageId, RoomId, UserId};
use plausch_protocol::{Frame, MessageFrame, ReaktionsAktion, TypingFrame};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::{AbrufPfad, ApiSendeAnfrage};
use crate::befehle::ReaktionsBefehl;
use crate::cache::LokalerCache;
use crate::error::{SyncError, SyncResult};
use crate::merge::NachrichtenSpeicher;
use crate::typing::TippAnzeiger;
use crate::verbindung::{FrameTransport, TransportVerbinder};

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Maximale Verbindungsversuche bevor der Endzustand erreicht ist
const MAX_VERBINDUNGS_VERSUCHE: u32 = 5;

/// Basis-Verzoegerung des exponentiellen Backoffs (1s, 2s, 4s, ...)
const RECONNECT_BASIS: Duration = Duration::from_secs(1);

/// Keepalive-Intervall auf der offenen Verbindung
const PING_INTERVALL: Duration = Duration::from_secs(30);

/// Pruef-Intervall fuer ablaufende Tipp-Eintraege
const TIPP_PRUEF_INTERVALL: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Oeffentliche Typen
// ---------------------------------------------------------------------------

/// Verbindungszustand einer Raum-Sitzung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsStatus {
    /// Keine Sitzung aktiv (Endzustand nach sauberem Abbau)
    Idle,
    /// Erster Verbindungsaufbau laeuft
    Verbindet,
    /// Verbindung steht, Live-Events fliessen
    Offen,
    /// Verbindung verloren, erneuter Versuch steht an
    Reconnect { versuch: u32 },
    /// Alle Versuche aufgebraucht – Endzustand, wird der UI gemeldet
    Gescheitert,
}

/// Ereignisse an die UI-Schicht
#[derive(Debug, Clone)]
pub enum SyncEreignis {
    /// Neuer konsolidierter Nachrichten-Stand (dedupliziert, sortiert)
    NachrichtenAktualisiert(Vec<ChatNachricht>),
    /// Verbindungszustand hat sich geaendert
    StatusGeaendert(VerbindungsStatus),
    /// Wer gerade tippt hat sich geaendert
    TippendeGeaendert(Vec<(UserId, String)>),
    /// Fehler der der UI gezeigt werden soll
    Fehler(String),
}

/// Befehle der UI an eine laufende Raum-Sitzung
#[derive(Debug)]
pub enum SitzungsBefehl {
    NachrichtSenden {
        content: String,
        attachment_url: Option<String>,
        attachment_type: Option<String>,
    },
    ReaktionSenden {
        message_id: MessageId,
        emoji: String,
        aktion: ReaktionsAktion,
    },
    NachrichtLoeschen {
        message_id: MessageId,
    },
    TippStatus {
        is_typing: bool,
    },
    /// Sitzung sauber beenden (Raumwechsel, Ansicht geschlossen)
    Schliessen,
}

// ---------------------------------------------------------------------------
// SyncEngine
// ---------------------------------------------------------------------------

/// Fabrik fuer Raum-Sitzungen
///
/// Haelt die Abhaengigkeiten (Transport-Verbinder, Request/Response-Pfad,
/// lokaler Cache) und die Identitaet des angemeldeten Benutzers.
pub struct SyncEngine<V: TransportVerbinder> {
    verbinder: Arc<V>,
    abruf: Arc<dyn AbrufPfad>,
    cache: Arc<dyn LokalerCache>,
    user_id: UserId,
    username: String,
}

impl<V> SyncEngine<V>
where
    V: TransportVerbinder + 'static,
    V::Transport: Send,
{
    /// Erstellt eine neue Engine
    pub fn neu(
        verbinder: V,
        abruf: Arc<dyn AbrufPfad>,
        cache: Arc<dyn LokalerCache>,
        user_id: UserId,
        username: impl Into<String>,
    ) -> Self {
        Self {
            verbinder: Arc::new(verbinder),
            abruf,
            cache,
            user_id,
            username: username.into(),
        }
    }

    /// Betritt einen Raum und startet dessen Sitzungs-Task
    ///
    /// Beim Raumwechsel muss die vorherige Sitzung zuerst mit
    /// [`RaumSitzung::verlassen`] beendet werden – erst danach die neue
    /// betreten, sonst kaempfen zwei Reconnect-Schleifen gegeneinander.
    pub fn raum_betreten(&self, room_id: RoomId) -> RaumSitzung {
        let (befehl_tx, befehl_rx) = mpsc::channel(32);
        let (ereignis_tx, ereignis_rx) = mpsc::channel(64);

        let laeufer = RaumLaeufer {
            verbinder: Arc::clone(&self.verbinder),
            abruf: Arc::clone(&self.abruf),
            cache: Arc::clone(&self.cache),
            user_id: self.user_id,
            username: self.username.clone(),
            room_id,
            befehle: befehl_rx,
            ereignisse: ereignis_tx,
        };
        let task = tokio::spawn(laeufer.ausfuehren());

        RaumSitzung {
            befehle: befehl_tx,
            ereignisse: ereignis_rx,
            task,
        }
    }
}

/// Handle auf eine laufende Raum-Sitzung
pub struct RaumSitzung {
    befehle: mpsc::Sender<SitzungsBefehl>,
    ereignisse: mpsc::Receiver<SyncEreignis>,
    task: JoinHandle<()>,
}

impl RaumSitzung {
    /// Schickt einen Befehl an die Sitzung
    pub async fn befehl(&self, befehl: SitzungsBefehl) -> SyncResult<()> {
        self.befehle
            .send(befehl)
            .await
            .map_err(|_| SyncError::NichtVerbunden)
    }

    /// Liefert das naechste Ereignis fuer die UI
    pub async fn naechstes_ereignis(&mut self) -> Option<SyncEreignis> {
        self.ereignisse.recv().await
    }

    /// Beendet die Sitzung und wartet auf den vollstaendigen Abbau
    ///
    /// Nach der Rueckkehr laufen weder Frame-Verarbeitung noch
    /// Reconnect-Versuche, Ping- oder Tipp-Timer weiter.
    pub async fn verlassen(self) {
        let _ = self.befehle.send(SitzungsBefehl::Schliessen).await;
        let _ = self.task.await;
    }
}

// ---------------------------------------------------------------------------
// Sitzungs-Task
// ---------------------------------------------------------------------------

/// Ergebnis der inneren Sitzungs-Schleife
enum SchleifenEnde {
    /// Gewollter Abbau (Schliessen-Befehl oder UI weg)
    Abbau,
    /// Transport gestorben – Reconnect-Automat uebernimmt
    VerbindungVerloren,
}

struct RaumLaeufer<V: TransportVerbinder> {
    verbinder: Arc<V>,
    abruf: Arc<dyn AbrufPfad>,
    cache: Arc<dyn LokalerCache>,
    user_id: UserId,
    username: String,
    room_id: RoomId,
    befehle: mpsc::Receiver<SitzungsBefehl>,
    ereignisse: mpsc::Sender<SyncEreignis>,
}

impl<V> RaumLaeufer<V>
where
    V: TransportVerbinder + 'static,
    V::Transport: Send,
{
    async fn ausfuehren(mut self) {
        let mut speicher = NachrichtenSpeicher::neu();
        let mut tippende = TippAnzeiger::neu();

        // Schritt 1: Cache-Stand sofort melden (veraltet-aber-schnell)
        match self.cache.laden(&self.user_id, &self.room_id).await {
            Ok(nachrichten) if !nachrichten.is_empty() => {
                speicher.aus_cache_laden(nachrichten);
                speicher.sortieren();
                self.emit(SyncEreignis::NachrichtenAktualisiert(speicher.schnappschuss()))
                    .await;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(room_id = %self.room_id, fehler = %e, "Cache nicht lesbar"),
        }

        // Schritt 2: massgebliche History; bei Fehler bleibt der Cache-Stand
        match self.abruf.history_laden(&self.room_id).await {
            Ok(history) => {
                speicher.history_uebernehmen(history);
                self.stand_persistieren(&speicher).await;
                self.emit(SyncEreignis::NachrichtenAktualisiert(speicher.schnappschuss()))
                    .await;
            }
            Err(e) => {
                tracing::warn!(room_id = %self.room_id, fehler = %e, "History-Abruf fehlgeschlagen");
                self.emit(SyncEreignis::Fehler(format!(
                    "History-Abruf fehlgeschlagen: {}",
                    e
                )))
                .await;
            }
        }

        // Schritt 3: Verbindungs-Zustandsautomat
        let mut versuch: u32 = 0;
        let mut endgueltig_gescheitert = false;

        loop {
            if versuch == 0 {
                self.emit(SyncEreignis::StatusGeaendert(VerbindungsStatus::Verbindet))
                    .await;
            } else {
                if versuch >= MAX_VERBINDUNGS_VERSUCHE {
                    self.emit(SyncEreignis::StatusGeaendert(VerbindungsStatus::Gescheitert))
                        .await;
                    self.emit(SyncEreignis::Fehler(
                        SyncError::VerbindungGescheitert { versuche: versuch }.to_string(),
                    ))
                    .await;
                    endgueltig_gescheitert = true;
                    break;
                }
                self.emit(SyncEreignis::StatusGeaendert(VerbindungsStatus::Reconnect {
                    versuch,
                }))
                .await;
                if self.backoff_warten(versuch).await {
                    break;
                }
            }

            match self.verbinder.verbinden(&self.room_id).await {
                Ok(transport) => {
                    versuch = 0;
                    self.emit(SyncEreignis::StatusGeaendert(VerbindungsStatus::Offen))
                        .await;
                    match self
                        .sitzung_fahren(transport, &mut speicher, &mut tippende)
                        .await
                    {
                        SchleifenEnde::Abbau => break,
                        SchleifenEnde::VerbindungVerloren => versuch = 1,
                    }
                }
                Err(e) => {
                    versuch += 1;
                    tracing::warn!(
                        room_id = %self.room_id,
                        versuch,
                        fehler = %e,
                        "Verbindungsaufbau fehlgeschlagen"
                    );
                }
            }
        }

        // Abbau: ab hier keine beobachtbaren Seiteneffekte mehr
        tippende.leeren();
        if !endgueltig_gescheitert {
            self.emit(SyncEreignis::StatusGeaendert(VerbindungsStatus::Idle))
                .await;
        }
        tracing::debug!(room_id = %self.room_id, "Raum-Sitzung beendet");
    }

    /// Wartet den Backoff ab, bleibt aber auf Abbau-Befehle ansprechbar
    ///
    /// Gibt `true` zurueck wenn die Sitzung beendet werden soll.
    async fn backoff_warten(&mut self, versuch: u32) -> bool {
        let verzoegerung = RECONNECT_BASIS * 2u32.saturating_pow(versuch - 1);
        tracing::info!(
            room_id = %self.room_id,
            versuch,
            verzoegerung_ms = verzoegerung.as_millis() as u64,
            "Warte vor erneutem Verbindungsversuch"
        );

        let schlafen = tokio::time::sleep(verzoegerung);
        tokio::pin!(schlafen);
        loop {
            tokio::select! {
                _ = &mut schlafen => return false,
                befehl = self.befehle.recv() => match befehl {
                    None | Some(SitzungsBefehl::Schliessen) => return true,
                    Some(_) => {
                        self.emit(SyncEreignis::Fehler(SyncError::NichtVerbunden.to_string()))
                            .await;
                    }
                },
            }
        }
    }

    /// Innere Schleife auf einer offenen Verbindung
    async fn sitzung_fahren(
        &mut self,
        mut transport: V::Transport,
        speicher: &mut NachrichtenSpeicher,
        tippende: &mut TippAnzeiger,
    ) -> SchleifenEnde {
        let mut ping_intervall = tokio::time::interval_at(
            tokio::time::Instant::now() + PING_INTERVALL,
            PING_INTERVALL,
        );
        let mut tipp_intervall = tokio::time::interval(TIPP_PRUEF_INTERVALL);
        let mut tippende_sichtbar = tippende.aktive();

        loop {
            tokio::select! {
                befehl = self.befehle.recv() => match befehl {
                    None | Some(SitzungsBefehl::Schliessen) => {
                        transport.schliessen().await;
                        return SchleifenEnde::Abbau;
                    }
                    Some(befehl) => {
                        self.befehl_verarbeiten(befehl, &mut transport, speicher).await;
                    }
                },

                eingehend = transport.empfangen() => match eingehend {
                    None => {
                        tracing::info!(room_id = %self.room_id, "Verbindung beendet");
                        return SchleifenEnde::VerbindungVerloren;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(room_id = %self.room_id, fehler = %e, "Empfang fehlgeschlagen");
                        return SchleifenEnde::VerbindungVerloren;
                    }
                    Some(Ok(frame)) => {
                        self.frame_anwenden(frame, speicher, tippende).await;
                    }
                },

                // Keepalive – beruehrt keine anderen Timer
                _ = ping_intervall.tick() => {
                    if transport.senden(&Frame::Ping).await.is_err() {
                        return SchleifenEnde::VerbindungVerloren;
                    }
                }

                // Weicher Ablauf der Tipp-Eintraege
                _ = tipp_intervall.tick() => {
                    let aktive = tippende.aktive();
                    if aktive != tippende_sichtbar {
                        tippende_sichtbar = aktive.clone();
                        self.emit(SyncEreignis::TippendeGeaendert(aktive)).await;
                    }
                }
            }
        }
    }

    /// Verarbeitet einen UI-Befehl auf der offenen Verbindung
    async fn befehl_verarbeiten(
        &mut self,
        befehl: SitzungsBefehl,
        transport: &mut V::Transport,
        speicher: &mut NachrichtenSpeicher,
    ) {
        match befehl {
            SitzungsBefehl::NachrichtSenden {
                content,
                attachment_url,
                attachment_type,
            } => {
                let frame = Frame::Message(MessageFrame {
                    message_id: None,
                    room_id: self.room_id.clone(),
                    sender_id: self.user_id,
                    content: content.clone(),
                    timestamp: None,
                    is_group: self.room_id.ist_gruppe(),
                    attachment_url: attachment_url.clone(),
                    attachment_type: attachment_type.clone(),
                    reply_to_id: None,
                });

                // Live-Pfad zuerst; das Echo bringt die kanonische ID
                if transport.senden(&frame).await.is_ok() {
                    return;
                }

                // Genau ein Fallback-Hop auf den Request/Response-Pfad,
                // danach wird der Fehler der UI gemeldet
                tracing::warn!(room_id = %self.room_id, "Live-Senden fehlgeschlagen – Fallback auf REST");
                match self
                    .abruf
                    .nachricht_senden(ApiSendeAnfrage {
                        room_id: self.room_id.clone(),
                        content,
                        is_group: self.room_id.ist_gruppe(),
                        attachment_url,
                        attachment_type,
                        reply_to_id: None,
                    })
                    .await
                {
                    Ok(nachricht) => {
                        if speicher.message_event(nachricht) {
                            speicher.sortieren();
                            self.stand_persistieren(speicher).await;
                            self.emit(SyncEreignis::NachrichtenAktualisiert(
                                speicher.schnappschuss(),
                            ))
                            .await;
                        }
                    }
                    Err(e) => {
                        self.emit(SyncEreignis::Fehler(format!("Senden fehlgeschlagen: {}", e)))
                            .await;
                    }
                }
            }

            SitzungsBefehl::ReaktionSenden {
                message_id,
                emoji,
                aktion,
            } => {
                // Optimistisch anwenden, Vor-Bild merken
                let befehl = ReaktionsBefehl::anwenden(
                    speicher,
                    message_id,
                    self.user_id,
                    &emoji,
                    aktion,
                );
                if befehl.wurde_angewendet() {
                    self.stand_persistieren(speicher).await;
                    self.emit(SyncEreignis::NachrichtenAktualisiert(speicher.schnappschuss()))
                        .await;
                }

                // Bestaetigen: Live-Pfad, dann ein REST-Hop
                let frame = Frame::Reaction(plausch_protocol::ReactionFrame {
                    message_id,
                    room_id: self.room_id.clone(),
                    user_id: self.user_id,
                    emoji: emoji.clone(),
                    action: aktion,
                });
                let bestaetigt = if transport.senden(&frame).await.is_ok() {
                    true
                } else {
                    self.abruf
                        .reaktion_senden(message_id, &emoji, aktion)
                        .await
                        .is_ok()
                };

                if !bestaetigt {
                    // Commit fehlgeschlagen: Vor-Bild wieder einspielen
                    befehl.zuruecksetzen(speicher);
                    self.stand_persistieren(speicher).await;
                    self.emit(SyncEreignis::NachrichtenAktualisiert(speicher.schnappschuss()))
                        .await;
                    self.emit(SyncEreignis::Fehler("Reaktion fehlgeschlagen".into()))
                        .await;
                }
            }

            SitzungsBefehl::NachrichtLoeschen { message_id } => {
                // Autorisierung liegt beim Server; das Loesch-Event kommt
                // als Broadcast zurueck und wird dort eingemischt
                if let Err(e) = self.abruf.nachricht_loeschen(message_id).await {
                    self.emit(SyncEreignis::Fehler(format!("Loeschen fehlgeschlagen: {}", e)))
                        .await;
                }
            }

            SitzungsBefehl::TippStatus { is_typing } => {
                let frame = Frame::Typing(TypingFrame {
                    room_id: self.room_id.clone(),
                    user_id: self.user_id,
                    username: self.username.clone(),
                    is_typing,
                });
                // Ephemer: Sendefehler sind kein Grund fuer Reconnect-Drama
                if let Err(e) = transport.senden(&frame).await {
                    tracing::debug!(fehler = %e, "Tipp-Status nicht gesendet");
                }
            }

            // Wird bereits in der Sitzungs-Schleife behandelt
            SitzungsBefehl::Schliessen => {}
        }
    }

    /// Mischt ein Live-Frame in den Speicher und meldet Aenderungen
    async fn frame_anwenden(
        &mut self,
        frame: Frame,
        speicher: &mut NachrichtenSpeicher,
        tippende: &mut TippAnzeiger,
    ) {
        match frame {
            Frame::Message(m) => {
                let Some(message_id) = m.message_id else {
                    tracing::warn!("Message-Event ohne ID verworfen");
                    return;
                };
                let nachricht = ChatNachricht {
                    id: message_id,
                    room_id: m.room_id,
                    sender_id: m.sender_id,
                    content: m.content,
                    timestamp: m
                        .timestamp
                        .unwrap_or_else(|| chrono::Utc::now().timestamp()),
                    is_group: m.is_group,
                    status: Default::default(),
                    attachment_url: m.attachment_url,
                    attachment_type: m.attachment_type,
                    reply_to_id: m.reply_to_id,
                    deleted: false,
                    reactions: Default::default(),
                };

                if speicher.message_event(nachricht) {
                    speicher.sortieren();
                    self.stand_persistieren(speicher).await;
                    self.emit(SyncEreignis::NachrichtenAktualisiert(speicher.schnappschuss()))
                        .await;
                }
            }

            Frame::Reaction(r) => {
                if speicher.reaktion_anwenden(r.message_id, r.user_id, &r.emoji, r.action) {
                    self.stand_persistieren(speicher).await;
                    self.emit(SyncEreignis::NachrichtenAktualisiert(speicher.schnappschuss()))
                        .await;
                }
            }

            Frame::Deletion(d) => {
                if speicher.loeschung_anwenden(d.message_id) {
                    self.stand_persistieren(speicher).await;
                    self.emit(SyncEreignis::NachrichtenAktualisiert(speicher.schnappschuss()))
                        .await;
                }
            }

            Frame::Typing(t) => {
                // Eigenes Tippen wird nicht angezeigt
                if t.user_id == self.user_id {
                    return;
                }
                if t.is_typing {
                    tippende.tippt(t.user_id, &t.username);
                } else {
                    tippende.gestoppt(&t.user_id);
                }
                self.emit(SyncEreignis::TippendeGeaendert(tippende.aktive()))
                    .await;
            }

            Frame::Pong => {
                tracing::trace!(room_id = %self.room_id, "Pong empfangen");
            }

            Frame::Ping => {
                tracing::trace!("Ping vom Server ignoriert");
            }

            Frame::Error(e) => {
                self.emit(SyncEreignis::Fehler(e.error)).await;
            }
        }
    }

    /// Persistiert den aktuellen Stand in den lokalen Cache
    async fn stand_persistieren(&self, speicher: &NachrichtenSpeicher) {
        if let Err(e) = self
            .cache
            .speichern(&self.user_id, &self.room_id, speicher.alle())
            .await
        {
            tracing::warn!(room_id = %self.room_id, fehler = %e, "Cache-Schreiben fehlgeschlagen");
        }
    }

    async fn emit(&self, ereignis: SyncEreignis) {
        // UI weg ist kein Fehler – die Sitzung endet ueber den Befehls-Kanal
        let _ = self.ereignisse.send(ereignis).await;
    }
}
