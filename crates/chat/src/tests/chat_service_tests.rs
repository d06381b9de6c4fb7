//! Unit-Tests fuer den ChatService

use std::sync::Arc;

use plausch_core::types::{RoomId, UserId};
use plausch_db::MemoryDb;

use crate::error::ChatError;
use crate::service::{ChatService, SendeAnfrage};

fn test_service() -> Arc<ChatService> {
    ChatService::neu(Arc::new(MemoryDb::neu()))
}

fn sende_anfrage(raum: &RoomId, sender: UserId, inhalt: &str) -> SendeAnfrage {
    SendeAnfrage {
        room_id: raum.clone(),
        sender_id: sender,
        content: inhalt.into(),
        is_group: false,
        attachment_url: None,
        attachment_type: None,
        reply_to_id: None,
    }
}

#[tokio::test]
async fn test_nachricht_senden_erfolgreich() {
    let service = test_service();
    let sender = UserId::new();
    let raum = RoomId::privat(sender, UserId::new());

    let nachricht = service
        .nachricht_senden(sende_anfrage(&raum, sender, "hello"))
        .await
        .expect("Nachricht senden fehlgeschlagen");

    assert_eq!(nachricht.content, "hello");
    assert_eq!(nachricht.room_id, raum);
    assert_eq!(nachricht.sender_id, sender);
    assert!(nachricht.timestamp > 0, "Timestamp muss vergeben sein");
    assert!(!nachricht.deleted);
    assert!(nachricht.reactions.is_empty());
}

#[tokio::test]
async fn test_leere_nachricht_abgelehnt() {
    let service = test_service();
    let sender = UserId::new();
    let raum = RoomId::gruppe("general");

    let result = service
        .nachricht_senden(sende_anfrage(&raum, sender, "   "))
        .await;

    assert!(matches!(result, Err(ChatError::UngueltigeEingabe(_))));
}

#[tokio::test]
async fn test_leere_nachricht_mit_anhang_erlaubt() {
    let service = test_service();
    let sender = UserId::new();
    let raum = RoomId::gruppe("general");

    let mut anfrage = sende_anfrage(&raum, sender, "");
    anfrage.attachment_url = Some("https://example.org/bild.png".into());
    anfrage.attachment_type = Some("image/png".into());

    let nachricht = service
        .nachricht_senden(anfrage)
        .await
        .expect("Anhang-Nachricht senden fehlgeschlagen");
    assert_eq!(nachricht.attachment_type.as_deref(), Some("image/png"));
}

#[tokio::test]
async fn test_zu_lange_nachricht_abgelehnt() {
    let service = test_service();
    let sender = UserId::new();
    let raum = RoomId::gruppe("general");

    let zu_lang = "x".repeat(4097);
    let result = service
        .nachricht_senden(sende_anfrage(&raum, sender, &zu_lang))
        .await;

    assert!(matches!(result, Err(ChatError::UngueltigeEingabe(_))));
}

#[tokio::test]
async fn test_reaktion_hinzufuegen_idempotent() {
    let service = test_service();
    let sender = UserId::new();
    let raum = RoomId::gruppe("general");
    let nachricht = service
        .nachricht_senden(sende_anfrage(&raum, sender, "reagier mal"))
        .await
        .unwrap();

    let reagierer = UserId::new();
    service
        .reaktion_hinzufuegen(nachricht.id, reagierer, "👍")
        .await
        .expect("Erste Reaktion fehlgeschlagen");
    let zweite = service
        .reaktion_hinzufuegen(nachricht.id, reagierer, "👍")
        .await
        .expect("Zweite Reaktion fehlgeschlagen");

    // Doppeltes Hinzufuegen erzeugt keinen doppelten Eintrag
    assert_eq!(zweite.reactions.get("👍").map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_ein_emoji_pro_benutzer() {
    let service = test_service();
    let sender = UserId::new();
    let raum = RoomId::gruppe("general");
    let nachricht = service
        .nachricht_senden(sende_anfrage(&raum, sender, "m1"))
        .await
        .unwrap();

    let reagierer = UserId::new();
    service
        .reaktion_hinzufuegen(nachricht.id, reagierer, "👍")
        .await
        .unwrap();
    let danach = service
        .reaktion_hinzufuegen(nachricht.id, reagierer, "😂")
        .await
        .unwrap();

    // Das neue Emoji verdraengt das alte komplett
    assert!(danach.reactions.get("👍").is_none());
    assert_eq!(danach.reactions.get("😂"), Some(&vec![reagierer]));
    assert!(danach.hat_reaktion_von(&reagierer));
    assert!(!danach.hat_reaktion_von(&sender));
}

#[tokio::test]
async fn test_reaktion_entfernen_raeumt_leere_eintraege() {
    let service = test_service();
    let sender = UserId::new();
    let raum = RoomId::gruppe("general");
    let nachricht = service
        .nachricht_senden(sende_anfrage(&raum, sender, "m1"))
        .await
        .unwrap();

    let reagierer = UserId::new();
    service
        .reaktion_hinzufuegen(nachricht.id, reagierer, "👍")
        .await
        .unwrap();
    let danach = service
        .reaktion_entfernen(nachricht.id, reagierer, "👍")
        .await
        .unwrap();

    assert!(danach.reactions.is_empty());
}

#[tokio::test]
async fn test_reaktion_entfernen_nur_genanntes_emoji() {
    let service = test_service();
    let sender = UserId::new();
    let raum = RoomId::gruppe("general");
    let nachricht = service
        .nachricht_senden(sende_anfrage(&raum, sender, "m1"))
        .await
        .unwrap();

    let a = UserId::new();
    let b = UserId::new();
    service.reaktion_hinzufuegen(nachricht.id, a, "👍").await.unwrap();
    service.reaktion_hinzufuegen(nachricht.id, b, "😂").await.unwrap();

    // Entfernen eines fremden Emojis laesst das eigene unberuehrt
    let danach = service.reaktion_entfernen(nachricht.id, a, "😂").await.unwrap();
    assert_eq!(danach.reactions.get("👍"), Some(&vec![a]));
    assert_eq!(danach.reactions.get("😂"), Some(&vec![b]));
}

#[tokio::test]
async fn test_reaktion_auf_unbekannte_nachricht() {
    let service = test_service();
    let result = service
        .reaktion_hinzufuegen(plausch_core::types::MessageId::new(), UserId::new(), "👍")
        .await;
    assert!(matches!(result, Err(ChatError::NachrichtNichtGefunden(_))));
}

#[tokio::test]
async fn test_loeschen_durch_verfasser() {
    let service = test_service();
    let sender = UserId::new();
    let raum = RoomId::gruppe("general");
    let nachricht = service
        .nachricht_senden(sende_anfrage(&raum, sender, "weg damit"))
        .await
        .unwrap();

    let geloescht = service
        .nachricht_loeschen(nachricht.id, sender)
        .await
        .expect("Loeschen fehlgeschlagen");
    assert!(geloescht.deleted);

    // Erneutes Loeschen ist ein No-Op, das Flag bleibt gesetzt
    let nochmal = service.nachricht_loeschen(nachricht.id, sender).await.unwrap();
    assert!(nochmal.deleted);
}

#[tokio::test]
async fn test_loeschen_durch_fremden_abgelehnt() {
    let service = test_service();
    let sender = UserId::new();
    let fremder = UserId::new();
    let raum = RoomId::privat(sender, fremder);
    let nachricht = service
        .nachricht_senden(sende_anfrage(&raum, sender, "meins"))
        .await
        .unwrap();

    let result = service.nachricht_loeschen(nachricht.id, fremder).await;
    assert!(matches!(result, Err(ChatError::KeineBerechtigung(_))));

    // Zustand unveraendert: Flag bleibt false
    let geladen = service.nachricht_laden(nachricht.id).await.unwrap();
    assert!(!geladen.deleted);
}

#[tokio::test]
async fn test_history_sortiert_und_vollstaendig() {
    let service = test_service();
    let sender = UserId::new();
    let raum = RoomId::gruppe("general");

    let erste = service
        .nachricht_senden(sende_anfrage(&raum, sender, "erste"))
        .await
        .unwrap();
    let zweite = service
        .nachricht_senden(sende_anfrage(&raum, sender, "zweite"))
        .await
        .unwrap();
    service.nachricht_loeschen(erste.id, sender).await.unwrap();

    let history = service.history_laden(&raum).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, erste.id);
    assert_eq!(history[1].id, zweite.id);
    assert!(history[0].deleted, "Geloeschte Nachrichten bleiben in der History");
}
