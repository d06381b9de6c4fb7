//! Gemeinsamer Gateway-Zustand
//!
//! Haelt alle geteilten Services als Arc-Referenzen, die sicher zwischen
//! tokio-Tasks geteilt werden koennen. Registry und Presence sind die
//! einzigen zwischen Verbindungen geteilten veraenderlichen Strukturen.

use plausch_chat::ChatService;
use std::sync::Arc;
use std::time::Instant;

use crate::auth::TokenPruefer;
use crate::presence::PresenceManager;
use crate::registry::RaumRegistry;

/// Gemeinsamer Gateway-Zustand (thread-safe, Arc-geteilt)
pub struct GatewayState {
    /// Chat-Service (Nachrichten, Reaktionen, Loeschen, History)
    pub chat_service: Arc<ChatService>,
    /// Raum-Registry (Broadcast an Verbindungen)
    pub registry: RaumRegistry,
    /// Presence-Manager (wer ist online, in welchem Raum)
    pub presence: PresenceManager,
    /// Grenze zum externen Auth-Dienst
    pub token_pruefer: Arc<dyn TokenPruefer>,
    /// Startzeitpunkt (fuer Uptime-Angaben)
    pub start_zeit: Instant,
}

impl GatewayState {
    /// Erstellt einen neuen GatewayState
    pub fn neu(chat_service: Arc<ChatService>, token_pruefer: Arc<dyn TokenPruefer>) -> Arc<Self> {
        Arc::new(Self {
            chat_service,
            registry: RaumRegistry::neu(),
            presence: PresenceManager::neu(),
            token_pruefer,
            start_zeit: Instant::now(),
        })
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_zeit.elapsed().as_secs()
    }
}
