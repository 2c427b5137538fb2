//! Auth provider seam.
//!
//! The bridge never logs in by itself. A provider tells it whether a user is
//! signed in and hands out a fresh access token for every connection attempt.

use async_trait::async_trait;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    fn is_authenticated(&self) -> bool;

    /// Fetch a token just in time. May be slow (network, refresh).
    async fn access_token(&self) -> anyhow::Result<String>;
}

/// A fixed token handed over by the host.
#[derive(Clone, Debug, Default)]
pub struct StaticToken {
    token: Option<String>,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            token: (!token.is_empty()).then_some(token),
        }
    }

    /// A provider for a signed-out user.
    pub fn none() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl AuthProvider for StaticToken {
    fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    async fn access_token(&self) -> anyhow::Result<String> {
        self.token
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no access token"))
    }
}

/// Reads the token from an environment variable on every fetch, so a
/// refreshed value is picked up by the next reconnect.
#[derive(Clone, Debug)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    fn read(&self) -> Option<String> {
        std::env::var(&self.var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

#[async_trait]
impl AuthProvider for EnvToken {
    fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    async fn access_token(&self) -> anyhow::Result<String> {
        self.read()
            .ok_or_else(|| anyhow::anyhow!("{} is not set", self.var))
    }
}
