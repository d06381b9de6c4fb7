//! plausch-server – Zusammenbau und Start des Chat-Servers
//!
//! Verdrahtet Dokumenten-Store, ChatService, Token-Store und Gateway und
//! startet den Axum-Listener mit sauberem Shutdown auf Ctrl-C.

pub mod config;

use std::sync::Arc;

use anyhow::Result;
use plausch_chat::ChatService;
use plausch_core::types::UserId;
use plausch_db::MemoryDb;
use plausch_gateway::{GatewayState, TokenPruefer, TokenStore};

use crate::config::ServerConfig;

/// Der zusammengebaute Plausch-Server
pub struct Server {
    config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server mit der angegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet den Server und blockiert bis zum Shutdown
    pub async fn starten(self) -> Result<()> {
        // Persistenz: In-Memory-Dokumenten-Store (externe Engine austauschbar)
        let db = Arc::new(MemoryDb::neu());
        let chat_service = ChatService::neu(db);

        // Auth-Grenze: In-Memory-Token-Store mit Cleanup-Task
        let token_store = TokenStore::neu_mit_cleanup();
        for benutzer in &self.config.auth.demo_benutzer {
            let user_id = UserId::new();
            let token = token_store.ausstellen(user_id, benutzer);
            tracing::info!(
                benutzer = %benutzer,
                user_id = %user_id,
                token = %token,
                "Demo-Token ausgestellt"
            );
        }

        let state = GatewayState::neu(
            chat_service,
            Arc::clone(&token_store) as Arc<dyn TokenPruefer>,
        );
        let app = plausch_gateway::router(state);

        let adresse = format!(
            "{}:{}",
            self.config.netzwerk.bind_adresse, self.config.netzwerk.port
        );
        let listener = tokio::net::TcpListener::bind(&adresse).await?;
        tracing::info!(
            server = %self.config.server.name,
            adresse = %adresse,
            "Plausch-Gateway lauscht"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server beendet");
        Ok(())
    }
}

/// Wartet auf Ctrl-C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(fehler = %e, "Shutdown-Signal nicht verfuegbar");
        return;
    }
    tracing::info!("Shutdown-Signal empfangen");
}
