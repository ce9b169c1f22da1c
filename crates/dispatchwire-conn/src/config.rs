use std::time::Duration;

use dispatchwire_frame::{FrameConfig, MAX_PAYLOAD};

/// When outbound frames carry the process credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum CredentialMode {
    /// Attach credentials to the header of every frame.
    #[default]
    EverySend,
    /// Attach credentials to the first frame only. Enough for servers that
    /// authenticate once per connection.
    FirstSend,
    /// Never attach credentials.
    Disabled,
}

impl CredentialMode {
    /// Whether the next frame should carry credentials.
    pub fn should_attach(self, already_sent: bool) -> bool {
        match self {
            CredentialMode::EverySend => true,
            CredentialMode::FirstSend => !already_sent,
            CredentialMode::Disabled => false,
        }
    }
}

/// Per-connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct ConnectionConfig {
    /// Largest payload accepted in either direction. An inbound frame above
    /// this limit ends the session.
    pub max_payload_size: usize,
    /// Write timeout for [`crate::Connection::send`]. `None` blocks until the
    /// peer drains its socket buffer.
    pub write_timeout: Option<Duration>,
    /// Credential attachment policy.
    pub credentials: CredentialMode,
    /// Name of the background I/O thread. Defaults to `dispatchwire-io`.
    pub thread_name: Option<String>,
}

impl ConnectionConfig {
    pub(crate) const DEFAULT_THREAD_NAME: &'static str = "dispatchwire-io";

    /// Framing settings derived from this configuration.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_payload_size: self.max_payload_size,
            write_timeout: self.write_timeout,
        }
    }

    pub(crate) fn thread_name(&self) -> String {
        self.thread_name
            .clone()
            .unwrap_or_else(|| Self::DEFAULT_THREAD_NAME.to_string())
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD,
            write_timeout: None,
            credentials: CredentialMode::default(),
            thread_name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_mode_policies() {
        assert!(CredentialMode::EverySend.should_attach(false));
        assert!(CredentialMode::EverySend.should_attach(true));
        assert!(CredentialMode::FirstSend.should_attach(false));
        assert!(!CredentialMode::FirstSend.should_attach(true));
        assert!(!CredentialMode::Disabled.should_attach(false));
    }

    #[test]
    fn defaults_cover_full_length_range() {
        let config = ConnectionConfig::default();
        assert_eq!(config.max_payload_size, u32::MAX as usize);
        assert_eq!(config.credentials, CredentialMode::EverySend);
        assert_eq!(config.thread_name(), "dispatchwire-io");
        assert_eq!(config.frame_config().max_payload_size, u32::MAX as usize);
    }

    #[test]
    #[cfg(feature = "serde")]
    fn deserializes_partial_config() {
        let config: ConnectionConfig = serde_json::from_str(
            r#"{"credentials": "first_send", "write_timeout": {"secs": 2, "nanos": 0}}"#,
        )
        .unwrap();

        assert_eq!(config.credentials, CredentialMode::FirstSend);
        assert_eq!(config.write_timeout, Some(Duration::from_secs(2)));
        assert_eq!(config.max_payload_size, MAX_PAYLOAD);
    }
}
