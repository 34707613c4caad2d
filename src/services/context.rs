use crate::config::ServerConfig;
use crate::models::UserId;

/// Server address and credentials of the active connection.
///
/// Authentication flows live elsewhere; this only answers what is
/// currently known.
pub trait ConnectionContext: Send + Sync {
    fn server_base(&self) -> Option<String>;
    fn access_token(&self) -> Option<String>;
    fn user_id(&self) -> Option<UserId>;
}

/// Context with fixed values, usually built from the config file
#[derive(Debug, Clone, Default)]
pub struct StaticConnectionContext {
    base_url: Option<String>,
    access_token: Option<String>,
    user_id: Option<UserId>,
}

impl StaticConnectionContext {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            base_url: non_empty(base_url.into()),
            access_token: non_empty(access_token.into()),
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<UserId>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            base_url: non_empty(config.base_url.clone()),
            access_token: config.access_token.clone().and_then(non_empty),
            user_id: config
                .user_id
                .clone()
                .and_then(non_empty)
                .map(UserId::new),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl ConnectionContext for StaticConnectionContext {
    fn server_base(&self) -> Option<String> {
        self.base_url.clone()
    }

    fn access_token(&self) -> Option<String> {
        self.access_token.clone()
    }

    fn user_id(&self) -> Option<UserId> {
        self.user_id.clone()
    }
}
