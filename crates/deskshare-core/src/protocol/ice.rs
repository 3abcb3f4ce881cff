//! STUN/TURN relay-server configuration.
//!
//! # STUN and TURN (for beginners)
//!
//! Most machines sit behind a NAT router, so their local address is useless
//! to a remote peer.  A **STUN** server tells a client which public address
//! it appears to have.  When both sides are behind restrictive NATs even
//! that is not enough, and media is relayed through a **TURN** server.  TURN
//! relays cost bandwidth, so they require a username and credential.
//!
//! The configuration mirrors the browser's `RTCIceServer`:
//! `{urls, username, credential}` where `urls` is a single string or a list.

use serde::{Deserialize, Deserializer, Serialize};

use crate::protocol::ProtocolError;

/// The relay server used when nothing else is configured.
pub const DEFAULT_TURN_URL: &str = "turn:121.41.76.43:3478";
const DEFAULT_TURN_USERNAME: &str = "huang";
const DEFAULT_TURN_CREDENTIAL: &str = "123456";

const ALLOWED_SCHEMES: [&str; 4] = ["stun", "stuns", "turn", "turns"];

/// One STUN or TURN server entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    #[serde(deserialize_with = "one_or_many")]
    pub urls: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(url) => vec![url],
        OneOrMany::Many(urls) => urls,
    })
}

fn scheme_of(url: &str) -> Option<&str> {
    url.split_once(':').map(|(scheme, _)| scheme)
}

impl IceServer {
    /// A credential-less STUN server.
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    /// A TURN server with long-term credentials.
    pub fn turn(
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            urls: vec![url.into()],
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }

    /// Returns `true` if any URL is a TURN relay.
    pub fn is_turn(&self) -> bool {
        self.urls
            .iter()
            .any(|u| matches!(scheme_of(u), Some("turn") | Some("turns")))
    }

    /// Checks the entry before it is handed to a peer connection.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::InvalidIceServer`] if the URL list is empty, a URL has
    /// a scheme other than `stun:`, `stuns:`, `turn:` or `turns:`, or a TURN
    /// entry lacks its username or credential.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.urls.is_empty() {
            return Err(ProtocolError::InvalidIceServer("no urls".into()));
        }
        for url in &self.urls {
            match scheme_of(url) {
                Some(scheme) if ALLOWED_SCHEMES.contains(&scheme) => {}
                _ => {
                    return Err(ProtocolError::InvalidIceServer(format!(
                        "unsupported url {url:?}"
                    )))
                }
            }
        }
        if self.is_turn() {
            let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
            if !has(&self.username) || !has(&self.credential) {
                return Err(ProtocolError::InvalidIceServer(format!(
                    "{} requires username and credential",
                    self.urls.join(",")
                )));
            }
        }
        Ok(())
    }
}

/// The full relay-server list for a peer connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IceConfig {
    pub servers: Vec<IceServer>,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            servers: vec![IceServer::turn(
                DEFAULT_TURN_URL,
                DEFAULT_TURN_USERNAME,
                DEFAULT_TURN_CREDENTIAL,
            )],
        }
    }
}

impl IceConfig {
    pub fn new(servers: Vec<IceServer>) -> Self {
        Self { servers }
    }

    /// Validates every entry; the first failure wins.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        self.servers.iter().try_for_each(IceServer::validate)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config_is_single_valid_turn_server() {
        let cfg = IceConfig::default();
        assert_eq!(cfg.servers.len(), 1);
        assert_eq!(cfg.servers[0].urls, vec![DEFAULT_TURN_URL.to_string()]);
        assert!(cfg.servers[0].is_turn());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_urls_accepts_single_string() {
        let server: IceServer =
            serde_json::from_value(json!({"urls": "stun:stun.example.org:3478"})).unwrap();
        assert_eq!(server.urls, vec!["stun:stun.example.org:3478".to_string()]);
        assert!(server.validate().is_ok());
    }

    #[test]
    fn test_urls_accepts_list() {
        let server: IceServer = serde_json::from_value(json!({
            "urls": ["turn:relay.example.org:3478", "turns:relay.example.org:5349"],
            "username": "u",
            "credential": "c"
        }))
        .unwrap();
        assert_eq!(server.urls.len(), 2);
        assert!(server.validate().is_ok());
    }

    #[test]
    fn test_turn_without_credential_is_rejected() {
        // Arrange
        let server = IceServer {
            urls: vec!["turn:relay.example.org".into()],
            username: Some("u".into()),
            credential: None,
        };

        // Act
        let result = server.validate();

        // Assert
        assert!(matches!(result, Err(ProtocolError::InvalidIceServer(_))));
    }

    #[test]
    fn test_turn_with_empty_username_is_rejected() {
        let server = IceServer::turn("turn:relay.example.org", "", "secret");
        assert!(server.validate().is_err());
    }

    #[test]
    fn test_http_scheme_is_rejected() {
        let server = IceServer::stun("https://relay.example.org");
        assert!(server.validate().is_err());
    }

    #[test]
    fn test_empty_url_list_is_rejected() {
        let server = IceServer {
            urls: vec![],
            username: None,
            credential: None,
        };
        assert!(server.validate().is_err());
    }

    #[test]
    fn test_config_validation_reports_first_bad_entry() {
        let cfg = IceConfig::new(vec![
            IceServer::stun("stun:ok.example.org"),
            IceServer::stun("ftp:bad.example.org"),
        ]);
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("ftp:bad.example.org"));
    }

    #[test]
    fn test_stun_server_serializes_without_credentials() {
        let value = serde_json::to_value(IceServer::stun("stun:s.example.org")).unwrap();
        assert_eq!(value, json!({"urls": ["stun:s.example.org"]}));
    }
}
