//! Notification channel vocabulary: wire messages, typed server events,
//! reload decisions and connection state.

mod connection;
mod message;
mod reload;

pub use connection::{
    vocabulary_warning, ConnectionStatus, CONNECTED_MESSAGE, DISCONNECTED_MESSAGE,
};
pub use message::{
    external_topic, AdminEvent, AdminEventKind, Audience, ContentUpdate, Notification,
    NotificationKind, ServerEvent, WebsocketMessage, CONTENT_UPDATE, VOCABULARIES_UPDATED,
};
pub use reload::{Identity, ReloadAction, ReloadContext, ReloadDecision, ReloadPolicy};
