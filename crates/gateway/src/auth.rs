//! Auth-Grenze – Bearer-Token-Pruefung
//!
//! Token-Ausstellung (Registrierung, Login, Passwort-Handling) gehoert dem
//! externen Auth-Dienst. Das Gateway braucht nur die Pruefung: Token rein,
//! Claims raus. [`TokenPruefer`] ist diese Grenze; [`TokenStore`] ist die
//! In-Memory-Implementierung fuer Betrieb ohne externen Dienst und fuer
//! Tests.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use plausch_core::types::UserId;
use rand::RngCore;
use std::sync::Arc;
use thiserror::Error;

/// Standard-Token-Lebensdauer: 24 Stunden
const TOKEN_TTL_SEKUNDEN: i64 = 24 * 60 * 60;

/// Intervall fuer den automatischen Cleanup-Task: 15 Minuten
const CLEANUP_INTERVALL: std::time::Duration = std::time::Duration::from_secs(15 * 60);

/// Fehler bei der Token-Pruefung
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Token ungueltig")]
    TokenUngueltig,

    #[error("Token abgelaufen")]
    TokenAbgelaufen,
}

/// Claims eines gueltigen Tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub user_id: UserId,
    pub username: String,
    pub laeuft_ab_am: DateTime<Utc>,
}

impl TokenClaims {
    /// Gibt `true` zurueck wenn der Token noch gueltig ist
    pub fn ist_gueltig(&self) -> bool {
        Utc::now() < self.laeuft_ab_am
    }
}

/// Grenze zum externen Auth-Dienst
pub trait TokenPruefer: Send + Sync {
    /// Prueft einen Bearer-Token und gibt die Claims zurueck
    fn pruefen(&self, token: &str) -> Result<TokenClaims, AuthError>;
}

/// In-Memory Token-Store mit TTL
///
/// Steht stellvertretend fuer den externen Auth-Dienst: stellt Tokens aus
/// und prueft sie. Abgelaufene Tokens raeumt ein Hintergrund-Task auf.
#[derive(Debug, Default)]
pub struct TokenStore {
    tokens: DashMap<String, TokenClaims>,
}

impl TokenStore {
    /// Erstellt einen neuen leeren Token-Store
    pub fn neu() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Erstellt einen Token-Store und startet den Cleanup-Task
    pub fn neu_mit_cleanup() -> Arc<Self> {
        let store = Self::neu();
        let store_klon = Arc::clone(&store);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(CLEANUP_INTERVALL).await;
                let entfernt = store_klon.cleanup_abgelaufene();
                if entfernt > 0 {
                    tracing::debug!(anzahl = entfernt, "Abgelaufene Tokens bereinigt");
                }
            }
        });
        store
    }

    /// Stellt einen neuen Token fuer den angegebenen Benutzer aus
    pub fn ausstellen(&self, user_id: UserId, username: impl Into<String>) -> String {
        let token = token_generieren();
        let claims = TokenClaims {
            user_id,
            username: username.into(),
            laeuft_ab_am: Utc::now() + Duration::seconds(TOKEN_TTL_SEKUNDEN),
        };
        self.tokens.insert(token.clone(), claims);
        tracing::debug!(user_id = %user_id, "Token ausgestellt");
        token
    }

    /// Stellt einen Token mit explizitem Ablaufzeitpunkt aus (fuer Tests)
    pub fn ausstellen_mit_ablauf(
        &self,
        user_id: UserId,
        username: impl Into<String>,
        laeuft_ab_am: DateTime<Utc>,
    ) -> String {
        let token = token_generieren();
        self.tokens.insert(
            token.clone(),
            TokenClaims {
                user_id,
                username: username.into(),
                laeuft_ab_am,
            },
        );
        token
    }

    /// Entfernt alle abgelaufenen Tokens und gibt die Anzahl zurueck
    pub fn cleanup_abgelaufene(&self) -> usize {
        let vorher = self.tokens.len();
        self.tokens.retain(|_, claims| claims.ist_gueltig());
        vorher - self.tokens.len()
    }
}

impl TokenPruefer for TokenStore {
    fn pruefen(&self, token: &str) -> Result<TokenClaims, AuthError> {
        match self.tokens.get(token) {
            None => Err(AuthError::TokenUngueltig),
            Some(claims) if !claims.ist_gueltig() => Err(AuthError::TokenAbgelaufen),
            Some(claims) => Ok(claims.clone()),
        }
    }
}

/// Generiert einen URL-sicheren zufaelligen Token (32 Bytes Entropie)
fn token_generieren() -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ausstellen_und_pruefen() {
        let store = TokenStore::neu();
        let uid = UserId::new();

        let token = store.ausstellen(uid, "erika");
        let claims = store.pruefen(&token).expect("Token muss gueltig sein");
        assert_eq!(claims.user_id, uid);
        assert_eq!(claims.username, "erika");
    }

    #[test]
    fn unbekannter_token_wird_abgelehnt() {
        let store = TokenStore::neu();
        assert_eq!(store.pruefen("gibtsnicht"), Err(AuthError::TokenUngueltig));
    }

    #[test]
    fn abgelaufener_token_wird_abgelehnt() {
        let store = TokenStore::neu();
        let token = store.ausstellen_mit_ablauf(
            UserId::new(),
            "erika",
            Utc::now() - Duration::seconds(1),
        );
        assert_eq!(store.pruefen(&token), Err(AuthError::TokenAbgelaufen));
    }

    #[test]
    fn cleanup_entfernt_nur_abgelaufene() {
        let store = TokenStore::neu();
        store.ausstellen(UserId::new(), "bleibt");
        store.ausstellen_mit_ablauf(UserId::new(), "weg", Utc::now() - Duration::seconds(1));

        assert_eq!(store.cleanup_abgelaufene(), 1);
        assert_eq!(store.cleanup_abgelaufene(), 0);
    }

    #[test]
    fn tokens_sind_eindeutig() {
        let store = TokenStore::neu();
        let uid = UserId::new();
        let a = store.ausstellen(uid, "erika");
        let b = store.ausstellen(uid, "erika");
        assert_ne!(a, b);
    }
}
