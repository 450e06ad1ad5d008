//! Decides whether an administrative event invalidates the running client.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::{AdminEvent, AdminEventKind};

/// The logged-in user as far as reload decisions are concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    #[serde(default)]
    pub role: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// Where the user is and what they work with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadContext {
    pub user_desks: BTreeSet<String>,
    pub active_desk: Option<String>,
    /// Current route, e.g. `/search` or `/authoring/urn:1`.
    pub location: String,
    /// An editor with possibly unsaved work is open.
    pub authoring: bool,
}

impl ReloadContext {
    fn is_member_of(&self, desk: &str) -> bool {
        self.user_desks.contains(desk)
    }

    fn on_search(&self) -> bool {
        self.location.contains("/search")
    }

    fn on_authoring(&self) -> bool {
        self.location.contains("/authoring/")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadDecision {
    pub reload: bool,
    pub message: Option<&'static str>,
}

impl ReloadDecision {
    fn keep() -> Self {
        Self::default()
    }

    fn reload(kind: AdminEventKind) -> Self {
        Self {
            reload: true,
            message: Some(kind.message()),
        }
    }
}

/// What the client should do about a positive decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadAction {
    /// Ask the user to save their work first.
    SaveWork(&'static str),
    Reload,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReloadPolicy;

impl ReloadPolicy {
    pub fn evaluate(
        &self,
        event: &AdminEvent,
        identity: &Identity,
        context: &ReloadContext,
    ) -> ReloadDecision {
        let extra = &event.extra;
        let desk = extra.get("desk_id").and_then(Value::as_str);

        let reload = match event.kind {
            AdminEventKind::UserDisabled
            | AdminEventKind::UserInactivated
            | AdminEventKind::UserRoleChanged
            | AdminEventKind::UserTypeChanged
            | AdminEventKind::UserPrivilegesRevoked => {
                contains(extra.get("user_id"), &identity.user_id)
            }
            AdminEventKind::RolePrivilegesRevoked => identity
                .role
                .as_deref()
                .is_some_and(|role| contains(extra.get("role_id"), role)),
            AdminEventKind::DeskMembershipRevoked | AdminEventKind::Desk => {
                desk.is_some_and(|desk| context.is_member_of(desk))
                    && contains(extra.get("user_ids"), &identity.user_id)
            }
            AdminEventKind::Stage => desk.is_some_and(|desk| {
                context.is_member_of(desk) && context.active_desk.as_deref() == Some(desk)
            }),
            AdminEventKind::StageVisibilityUpdated => desk.is_some_and(|desk| {
                (!context.is_member_of(desk) && context.on_search()) || context.on_authoring()
            }),
        };

        if reload {
            ReloadDecision::reload(event.kind)
        } else {
            ReloadDecision::keep()
        }
    }

    pub fn action(&self, decision: &ReloadDecision, context: &ReloadContext) -> Option<ReloadAction> {
        if !decision.reload {
            return None;
        }
        match decision.message {
            Some(message) if context.authoring => Some(ReloadAction::SaveWork(message)),
            _ => Some(ReloadAction::Reload),
        }
    }
}

/// `extra` ids arrive either as a list or as a single string.
fn contains(raw: Option<&Value>, id: &str) -> bool {
    match raw {
        Some(Value::Array(ids)) => ids.iter().any(|value| value.as_str() == Some(id)),
        Some(Value::String(value)) => value == id,
        _ => false,
    }
}
