//! Session configuration
//!
//! The client does not log in by itself; a session token obtained elsewhere
//! can be supplied so the binary starts authenticated.

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::notification::Identity;
use crate::ports::Session;

#[derive(Debug, Deserialize, Default)]
pub struct AuthConfig {
    /// Bearer token of an existing session
    pub token: Option<Secret<String>>,

    /// Session id reported by the server
    pub session_id: Option<String>,

    /// Id of the logged-in user
    pub user_id: Option<String>,

    /// Role of the logged-in user
    pub role: Option<String>,
}

impl AuthConfig {
    /// Builds the configured session, if a token is present.
    pub fn session(&self) -> Option<Session> {
        let token = self.token.as_ref()?;
        let mut identity = Identity::new(self.user_id.clone().unwrap_or_default());
        if let Some(role) = &self.role {
            identity = identity.with_role(role.clone());
        }
        Some(Session::new(
            self.session_id.clone().unwrap_or_default(),
            identity,
            token.expose_secret().clone(),
        ))
    }

    /// A token without a user cannot be matched against server events.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.token {
            Some(token) if token.expose_secret().is_empty() => {
                Err(ValidationError::MissingRequired("AUTH__TOKEN"))
            }
            Some(_) if self.user_id.as_deref().map_or(true, str::is_empty) => {
                Err(ValidationError::MissingRequired("AUTH__USER_ID"))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_token(token: &str) -> AuthConfig {
        AuthConfig {
            token: Some(Secret::new(token.to_string())),
            session_id: Some("s1".to_string()),
            user_id: Some("u1".to_string()),
            role: Some("editor".to_string()),
        }
    }

    #[test]
    fn test_no_token_means_no_session() {
        let config = AuthConfig::default();
        assert!(config.session().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_session_from_config() {
        let session = with_token("abc").session().unwrap();
        assert_eq!(session.token(), "abc");
        assert_eq!(session.identity.user_id, "u1");
        assert_eq!(session.identity.role.as_deref(), Some("editor"));
    }

    #[test]
    fn test_token_requires_user() {
        let config = AuthConfig {
            user_id: None,
            ..with_token("abc")
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("AUTH__USER_ID"))
        );
        assert!(with_token("").validate().is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let rendered = format!("{:?}", with_token("very-secret"));
        assert!(!rendered.contains("very-secret"));
    }
}
