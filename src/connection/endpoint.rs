use crate::error::BridgeError;
use std::fmt;
use url::Url;

/// Server route of one remote pty session, e.g. `/ws/terminal/box-1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    path: String,
}

impl Endpoint {
    pub fn new(path: impl Into<String>) -> Result<Self, BridgeError> {
        let path = path.into();
        if !path.starts_with('/')
            || path.contains(['?', '#'])
            || path.contains(char::is_whitespace)
        {
            return Err(BridgeError::InvalidEndpoint(path));
        }
        Ok(Self { path })
    }

    /// Shell of a box.
    pub fn box_shell(box_id: &str) -> Self {
        Self {
            path: format!("/ws/terminal/{}", box_id),
        }
    }

    /// Install/configure console of an agent.
    pub fn agent_console(agent_id: &str) -> Self {
        Self {
            path: format!("/ws/install-tui/{}", agent_id),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Build the transport URL: the API origin with its scheme rewritten to
    /// ws/wss, this path appended, and the token as a query credential.
    pub fn url(&self, api_url: &str, token: &str) -> Result<Url, BridgeError> {
        let mut url = Url::parse(api_url.trim())
            .map_err(|e| BridgeError::InvalidUrl(format!("{}: {}", api_url, e)))?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(BridgeError::InvalidUrl(format!(
                    "unsupported scheme '{}'",
                    other
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| BridgeError::InvalidUrl(api_url.to_string()))?;

        let path = format!("{}{}", url.path().trim_end_matches('/'), self.path);
        url.set_path(&path);
        url.set_fragment(None);
        url.query_pairs_mut().clear().append_pair("token", token);
        Ok(url)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_shapes() {
        assert_eq!(Endpoint::box_shell("box-1").path(), "/ws/terminal/box-1");
        assert_eq!(Endpoint::agent_console("a-7").path(), "/ws/install-tui/a-7");
    }

    #[test]
    fn test_endpoint_validation() {
        assert!(Endpoint::new("/ws/terminal/x").is_ok());
        assert!(Endpoint::new("ws/terminal/x").is_err());
        assert!(Endpoint::new("/ws/terminal/x?token=1").is_err());
        assert!(Endpoint::new("").is_err());
    }

    #[test]
    fn test_url_rewrites_scheme() {
        let ep = Endpoint::box_shell("box-1");
        let url = ep.url("https://api.example.com", "abc").unwrap();
        assert_eq!(url.as_str(), "wss://api.example.com/ws/terminal/box-1?token=abc");

        let url = ep.url("http://localhost:8000/", "abc").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8000/ws/terminal/box-1?token=abc");
    }

    #[test]
    fn test_url_keeps_base_path_and_encodes_token() {
        let ep = Endpoint::agent_console("a1");
        let url = ep.url("https://example.com/api/", "a+b/c=").unwrap();
        assert_eq!(url.path(), "/api/ws/install-tui/a1");
        assert_eq!(url.query(), Some("token=a%2Bb%2Fc%3D"));
    }

    #[test]
    fn test_url_rejects_bad_origin() {
        let ep = Endpoint::box_shell("b");
        assert!(matches!(ep.url("", "t"), Err(BridgeError::InvalidUrl(_))));
        assert!(matches!(ep.url("ftp://x", "t"), Err(BridgeError::InvalidUrl(_))));
    }
}
