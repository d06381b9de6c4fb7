//! Tipp-Indikator – weiche Ablauf-Zeitfenster pro Benutzer
//!
//! Tipp-Zustand ist ephemer und wird nie persistiert. Jeder Eintrag
//! verfaellt automatisch nach einem kurzen Inaktivitaets-Fenster falls
//! kein explizites "tippt nicht mehr" eintrifft – ein weicher Timeout,
//! keine harte Garantie. Erneutes Tippen setzt den Timer zurueck,
//! explizites Stoppen raeumt sofort auf.

use plausch_core::types::UserId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Standard-Ablauf-Fenster: 3 Sekunden ohne Aktualisierung
const TIPP_ABLAUF: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
struct TippEintrag {
    username: String,
    laeuft_ab: Instant,
}

/// Verfolgt wer gerade tippt, mit weichem Ablauf pro Benutzer
#[derive(Debug)]
pub struct TippAnzeiger {
    eintraege: HashMap<UserId, TippEintrag>,
    ablauf: Duration,
}

impl TippAnzeiger {
    /// Erstellt einen Anzeiger mit dem Standard-Fenster
    pub fn neu() -> Self {
        Self::mit_ablauf(TIPP_ABLAUF)
    }

    /// Erstellt einen Anzeiger mit eigenem Ablauf-Fenster
    pub fn mit_ablauf(ablauf: Duration) -> Self {
        Self {
            eintraege: HashMap::new(),
            ablauf,
        }
    }

    /// Benutzer tippt – legt den Eintrag an oder setzt seinen Timer zurueck
    pub fn tippt(&mut self, user_id: UserId, username: &str) {
        self.eintraege.insert(
            user_id,
            TippEintrag {
                username: username.to_string(),
                laeuft_ab: Instant::now() + self.ablauf,
            },
        );
    }

    /// Explizites "tippt nicht mehr" – raeumt sofort auf
    pub fn gestoppt(&mut self, user_id: &UserId) {
        self.eintraege.remove(user_id);
    }

    /// Gibt alle aktuell Tippenden zurueck, abgelaufene zuerst entfernt
    pub fn aktive(&mut self) -> Vec<(UserId, String)> {
        let jetzt = Instant::now();
        self.eintraege.retain(|_, eintrag| eintrag.laeuft_ab > jetzt);

        let mut aktive: Vec<(UserId, String)> = self
            .eintraege
            .iter()
            .map(|(uid, eintrag)| (*uid, eintrag.username.clone()))
            .collect();
        // Deterministische Reihenfolge fuer die Anzeige
        aktive.sort_by(|a, b| a.1.cmp(&b.1));
        aktive
    }

    /// Verwirft alle Eintraege (Raum-Abbau)
    pub fn leeren(&mut self) {
        self.eintraege.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.eintraege.is_empty()
    }
}

impl Default for TippAnzeiger {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
