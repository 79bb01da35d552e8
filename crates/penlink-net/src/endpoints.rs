//! URL derivation from the backend's HTTP origin.

use penlink_shared::constants::{API_PREFIX, WS_NOTIFICATIONS_PATH};
use penlink_shared::types::UserId;

use crate::error::NetError;

/// REST and socket base URLs for one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    api_base: String,
    ws_base: String,
}

impl Endpoints {
    /// Build from an `http://` or `https://` origin. The socket scheme
    /// follows the HTTP one (`ws` / `wss`).
    pub fn from_backend_url(url: &str) -> Result<Self, NetError> {
        let origin = url.trim().trim_end_matches('/');

        let ws_origin = if let Some(host) = origin.strip_prefix("https://") {
            format!("wss://{host}")
        } else if let Some(host) = origin.strip_prefix("http://") {
            format!("ws://{host}")
        } else {
            return Err(NetError::InvalidUrl(format!(
                "{url}: must start with http:// or https://"
            )));
        };

        if ws_origin.ends_with("://") {
            return Err(NetError::InvalidUrl(format!("{url}: missing host")));
        }

        Ok(Self {
            api_base: format!("{origin}{API_PREFIX}"),
            ws_base: ws_origin,
        })
    }

    /// Absolute URL of an API path such as `/conversations`.
    pub fn api(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// The user's dedicated event stream.
    pub fn notifications_socket(&self, user_id: &UserId) -> String {
        format!("{}{}/{}", self.ws_base, WS_NOTIFICATIONS_PATH, user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_plain_and_tls_urls() {
        let e = Endpoints::from_backend_url("http://localhost:8001/").unwrap();
        assert_eq!(e.api("/messages"), "http://localhost:8001/api/messages");
        assert_eq!(
            e.notifications_socket(&UserId::from("u1")),
            "ws://localhost:8001/ws/notifications/u1"
        );

        let e = Endpoints::from_backend_url("https://penlink.example").unwrap();
        assert_eq!(
            e.notifications_socket(&UserId::from("u1")),
            "wss://penlink.example/ws/notifications/u1"
        );
    }

    #[test]
    fn rejects_other_schemes() {
        assert!(Endpoints::from_backend_url("ftp://host").is_err());
        assert!(Endpoints::from_backend_url("localhost:8001").is_err());
        assert!(Endpoints::from_backend_url("https://").is_err());
    }
}
