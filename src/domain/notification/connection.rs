//! Connection state of the notification channel as shown to the user.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::message::ServerEvent;
use super::reload::Identity;

pub const CONNECTED_MESSAGE: &str = "Connected to Notification Server!";
pub const DISCONNECTED_MESSAGE: &str = "Disconnected from Notification Server!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Unknown,
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    pub fn message(&self) -> Option<&'static str> {
        match self {
            ConnectionStatus::Unknown => None,
            ConnectionStatus::Connected => Some(CONNECTED_MESSAGE),
            ConnectionStatus::Disconnected => Some(DISCONNECTED_MESSAGE),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Unknown => "unknown",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

/// Warning shown when someone else changed a vocabulary.
pub fn vocabulary_warning(event: &ServerEvent, identity: Option<&Identity>) -> Option<String> {
    let ServerEvent::VocabularyUpdated { vocabulary, user } = event else {
        return None;
    };
    let by_me = matches!((user, identity), (Some(user), Some(me)) if *user == me.user_id);
    if by_me {
        return None;
    }
    Some(format!(
        "{vocabulary} vocabulary has been updated. Please re-login to see updated vocabulary values"
    ))
}
