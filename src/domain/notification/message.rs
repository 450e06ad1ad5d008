//! Messages pushed by the notification server and their typed form.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::changes::ResourceChange;
use crate::domain::foundation::{DomainError, Timestamp, ValidationError};

/// The only event name every listener may observe without being addressed.
pub const CONTENT_UPDATE: &str = "content:update";
pub const VOCABULARIES_UPDATED: &str = "vocabularies:updated";

const EXTERNAL_EVENT_PREFIX: &str = "websocket-event--";

// ════════════════════════════════════════════════════════════════════════════
// Wire message
// ════════════════════════════════════════════════════════════════════════════

/// A frame received on the notification socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebsocketMessage {
    pub event: String,

    #[serde(default)]
    pub extra: Value,

    #[serde(rename = "_created", default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,

    #[serde(rename = "_process", default, skip_serializing_if = "Option::is_none")]
    pub process: Option<Value>,
}

impl WebsocketMessage {
    pub fn new(event: impl Into<String>, extra: Value) -> Self {
        Self {
            event: event.into(),
            extra,
            created: None,
            process: None,
        }
    }

    /// Decodes a text frame.
    pub fn parse(text: &str) -> Result<Self, DomainError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn created_at(&self) -> Option<Timestamp> {
        self.created.as_deref().and_then(Timestamp::parse_rfc3339)
    }

    /// Who may observe this message outside the internal bus.
    pub fn audience(&self) -> Audience {
        if self.event == CONTENT_UPDATE {
            return Audience::Public;
        }
        match self.extra.get("extension").and_then(Value::as_str) {
            Some(extension) => Audience::Extension(extension.to_string()),
            None => Audience::Internal,
        }
    }

    /// Name of the external topic this message is published on, if any.
    pub fn external_topic(&self) -> Option<String> {
        match self.audience() {
            Audience::Public => Some(external_topic(&self.event, None)),
            Audience::Extension(extension) => Some(external_topic(&self.event, Some(&extension))),
            Audience::Internal => None,
        }
    }

    /// Typed view of the message.
    pub fn classify(&self) -> Result<ServerEvent, ValidationError> {
        if let Some(change) = ResourceChange::from_message(&self.event, &self.extra)? {
            return Ok(ServerEvent::ResourceChanged(change));
        }
        if self.event == CONTENT_UPDATE {
            return Ok(ServerEvent::ContentUpdate(ContentUpdate::from_extra(&self.extra)));
        }
        if self.event == VOCABULARIES_UPDATED {
            return Ok(ServerEvent::VocabularyUpdated {
                vocabulary: string_field(&self.extra, "vocabulary").unwrap_or_default(),
                user: string_field(&self.extra, "user"),
            });
        }
        if let Some(kind) = AdminEventKind::from_event(&self.event) {
            return Ok(ServerEvent::Admin(AdminEvent {
                kind,
                extra: self.extra.clone(),
            }));
        }
        Ok(ServerEvent::Other {
            event: self.event.clone(),
            extra: self.extra.clone(),
        })
    }
}

/// External topic name for an event, optionally scoped to one extension.
pub fn external_topic(event: &str, extension: Option<&str>) -> String {
    match extension {
        Some(extension) => format!("{EXTERNAL_EVENT_PREFIX}{event}--{extension}"),
        None => format!("{EXTERNAL_EVENT_PREFIX}{event}"),
    }
}

/// Visibility of a message beyond the internal bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Audience {
    Public,
    Extension(String),
    Internal,
}

// ════════════════════════════════════════════════════════════════════════════
// Typed events
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    ResourceChanged(ResourceChange),
    ContentUpdate(ContentUpdate),
    VocabularyUpdated {
        vocabulary: String,
        user: Option<String>,
    },
    Admin(AdminEvent),
    Other {
        event: String,
        extra: Value,
    },
}

/// Items, desks and stages touched by a content change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentUpdate {
    pub user: Option<String>,
    pub items: BTreeSet<String>,
    pub desks: BTreeSet<String>,
    pub stages: BTreeSet<String>,
}

impl ContentUpdate {
    fn from_extra(extra: &Value) -> Self {
        Self {
            user: string_field(extra, "user"),
            items: key_set(extra.get("items")),
            desks: key_set(extra.get("desks")),
            stages: key_set(extra.get("stages")),
        }
    }
}

/// Administrative events that may invalidate the whole client state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminEventKind {
    UserDisabled,
    UserInactivated,
    UserRoleChanged,
    UserTypeChanged,
    UserPrivilegesRevoked,
    RolePrivilegesRevoked,
    DeskMembershipRevoked,
    Desk,
    Stage,
    StageVisibilityUpdated,
}

impl AdminEventKind {
    pub const ALL: [AdminEventKind; 10] = [
        AdminEventKind::UserDisabled,
        AdminEventKind::UserInactivated,
        AdminEventKind::UserRoleChanged,
        AdminEventKind::UserTypeChanged,
        AdminEventKind::UserPrivilegesRevoked,
        AdminEventKind::RolePrivilegesRevoked,
        AdminEventKind::DeskMembershipRevoked,
        AdminEventKind::Desk,
        AdminEventKind::Stage,
        AdminEventKind::StageVisibilityUpdated,
    ];

    pub fn from_event(event: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == event)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdminEventKind::UserDisabled => "user_disabled",
            AdminEventKind::UserInactivated => "user_inactivated",
            AdminEventKind::UserRoleChanged => "user_role_changed",
            AdminEventKind::UserTypeChanged => "user_type_changed",
            AdminEventKind::UserPrivilegesRevoked => "user_privileges_revoked",
            AdminEventKind::RolePrivilegesRevoked => "role_privileges_revoked",
            AdminEventKind::DeskMembershipRevoked => "desk_membership_revoked",
            AdminEventKind::Desk => "desk",
            AdminEventKind::Stage => "stage",
            AdminEventKind::StageVisibilityUpdated => "stage_visibility_updated",
        }
    }

    /// Text shown to the user when the event forces a reload.
    pub fn message(&self) -> &'static str {
        match self {
            AdminEventKind::UserDisabled => "User is disabled",
            AdminEventKind::UserInactivated => "User is inactivated",
            AdminEventKind::UserRoleChanged => "User role is changed",
            AdminEventKind::UserTypeChanged => "User type is changed",
            AdminEventKind::UserPrivilegesRevoked => "User privileges are revoked",
            AdminEventKind::RolePrivilegesRevoked => "Role privileges are revoked",
            AdminEventKind::DeskMembershipRevoked => "User removed from desk",
            AdminEventKind::Desk => "Desk is deleted/updated",
            AdminEventKind::Stage => "Stage is created/updated/deleted",
            AdminEventKind::StageVisibilityUpdated => "Stage visibility change",
        }
    }
}

impl fmt::Display for AdminEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdminEvent {
    pub kind: AdminEventKind,
    pub extra: Value,
}

// ════════════════════════════════════════════════════════════════════════════
// Bus notifications
// ════════════════════════════════════════════════════════════════════════════

/// What the notification bus carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Connected,
    Disconnected,
    Server {
        message: Arc<WebsocketMessage>,
        event: ServerEvent,
    },
    /// Published in addition to `Server` for administrative events.
    Reload(AdminEvent),
}

impl Notification {
    /// Builds the `Server` notification for a decoded frame. Malformed
    /// resource events degrade to `ServerEvent::Other`.
    pub fn from_message(message: impl Into<Arc<WebsocketMessage>>) -> Self {
        let message = message.into();
        let event = message.classify().unwrap_or_else(|_| ServerEvent::Other {
            event: message.event.clone(),
            extra: message.extra.clone(),
        });
        Notification::Server { message, event }
    }

    /// The admin event to re-publish as `Reload`, if any.
    pub fn admin_event(&self) -> Option<&AdminEvent> {
        match self {
            Notification::Server {
                event: ServerEvent::Admin(admin),
                ..
            } => Some(admin),
            _ => None,
        }
    }

    pub fn kind(&self) -> NotificationKind {
        match self {
            Notification::Connected => NotificationKind::Connected,
            Notification::Disconnected => NotificationKind::Disconnected,
            Notification::Server { message, .. } => NotificationKind::Event(message.event.clone()),
            Notification::Reload(_) => NotificationKind::Reload,
        }
    }

    pub fn resource_change(&self) -> Option<&ResourceChange> {
        match self {
            Notification::Server {
                event: ServerEvent::ResourceChanged(change),
                ..
            } => Some(change),
            _ => None,
        }
    }
}

/// Dispatch key of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Connected,
    Disconnected,
    Reload,
    Event(String),
}

impl NotificationKind {
    pub fn event(name: impl Into<String>) -> Self {
        NotificationKind::Event(name.into())
    }
}

fn string_field(extra: &Value, key: &str) -> Option<String> {
    extra.get(key).and_then(Value::as_str).map(str::to_string)
}

fn key_set(raw: Option<&Value>) -> BTreeSet<String> {
    match raw {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => BTreeSet::new(),
    }
}
