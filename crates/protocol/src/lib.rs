//! plausch-protocol – Wire-Protokoll der persistenten Verbindung
//!
//! Jedes Frame ist ein einzelnes JSON-Objekt, diskriminiert ueber das
//! `type`-Feld. Die Frames werden genau einmal an der Verbindungsgrenze
//! dekodiert und danach ausschliesslich als getaggtes Enum weitergereicht –
//! kein String-Vergleich im Dispatch.

pub mod frame;

// Bequeme Re-Exporte
pub use frame::{
    DeletionFrame, ErrorFrame, Frame, MessageFrame, ReactionFrame, ReaktionsAktion, TypingFrame,
};
