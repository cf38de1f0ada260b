//! Client configuration supplied by the embedding application.

/// Static identity and connection settings for one signaling session.
///
/// Everything here comes from the host application's login/identity layer;
/// the client never mutates it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint of the signaling server.
    pub server_url: String,
    pub account_id: String,
    pub api_key: String,
    /// Country code of the logged-in contact.
    pub contact_cc: String,
    /// Phone number of the logged-in contact.
    pub contact_phone: String,
    /// Contact unique identifier of the logged-in contact.
    pub contact_cuid: String,
    pub auth_token: String,
    pub jwt: String,
    /// Platform tag sent in the authentication message.
    pub platform: String,
    /// When set, every outgoing call must carry a call token.
    pub ecta_enabled: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            account_id: String::new(),
            api_key: String::new(),
            contact_cc: String::new(),
            contact_phone: String::new(),
            contact_cuid: String::new(),
            auth_token: String::new(),
            jwt: String::new(),
            platform: "rust".to_string(),
            ecta_enabled: false,
        }
    }
}
